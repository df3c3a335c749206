// src/main.rs

//! Command-line driver for the PFCP simulator.

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use rs_pfcpsim::client::N4Client;
use rs_pfcpsim::config::SimConfig;
use rs_pfcpsim::controller::{CreateSessionRequest, ModifySessionRequest};
use rs_pfcpsim::service::{Response, Service};
use std::net::Ipv4Addr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "PFCP control-plane simulator", long_about = None)]
struct Cli {
    /// Network interface PFCP is sourced from
    #[arg(short, long, default_value = "lo")]
    interface: String,

    /// PFCP peer, host or host:port
    #[arg(long, default_value = "127.0.0.1")]
    remote_peer: String,

    /// N3 address of the target UPF
    #[arg(long, default_value = "127.0.0.1")]
    upf_n3: String,

    /// YAML file overriding the connection flags
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct SessionArgs {
    /// First base identifier; session k occupies [base_id + 10k, base_id + 10k + 10)
    #[arg(long, default_value_t = 1)]
    base_id: u32,

    /// Number of sessions in the batch
    #[arg(long, default_value_t = 1)]
    count: u32,

    /// CIDR pool UE addresses are drawn from
    #[arg(long, default_value = "10.60.0.0/24")]
    ue_pool: String,

    /// Access-side tunnel endpoint (eNodeB/gNodeB)
    #[arg(long, default_value = "192.168.0.1")]
    gnb_address: Ipv4Addr,

    /// Core-side tunnel peer for uplink traffic
    #[arg(long)]
    ul_tunnel_dst: Option<Ipv4Addr>,

    /// Downlink tunnel destination, defaults to the gNodeB address
    #[arg(long)]
    dl_tunnel_dst: Option<Ipv4Addr>,

    /// Let the UPF allocate uplink TEIDs
    #[arg(long)]
    teid_alloc: bool,

    #[arg(long, default_value_t = 9)]
    qfi: u8,

    /// Application filter such as 'allow ip any to 8.8.8.8/32; precedence=100',
    /// repeatable up to five times
    #[arg(long = "app-filter")]
    app_filters: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Set up the PFCP association and release it again
    Associate,
    /// Establish sessions and leave them installed on the UPF
    Create(SessionArgs),
    /// Full lifecycle: establish, modify the downlink path, delete
    Cycle {
        #[command(flatten)]
        session: SessionArgs,

        /// Switch the downlink to buffering during the modify phase
        #[arg(long)]
        buffer: bool,

        /// Ask the UPF to notify the CP about buffered downlink traffic
        #[arg(long)]
        notify_cp: bool,

        /// Send GTP-U end markers on the old downlink path
        #[arg(long)]
        end_marker: bool,

        /// Skip the delete phase and keep the sessions installed
        #[arg(long)]
        keep: bool,
    },
}

fn create_request(args: &SessionArgs) -> CreateSessionRequest {
    CreateSessionRequest {
        base_id: args.base_id,
        count: args.count,
        node_b_address: args.gnb_address,
        ue_address_pool: args.ue_pool.clone(),
        ul_tunnel_dst: args.ul_tunnel_dst,
        dl_tunnel_dst: args.dl_tunnel_dst,
        teid_allocation: args.teid_alloc,
        qfi: args.qfi,
        app_filters: args.app_filters.clone(),
    }
}

fn check(response: Response) -> Result<()> {
    if response.is_ok() {
        log::info!("{}", response.message);
        Ok(())
    } else {
        bail!("{:?}: {}", response.code, response.message)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        log::Level::Debug
    } else {
        log::Level::Info
    };
    simple_logger::init_with_level(level)?;

    let (remote_peer, upf_n3, interface) = match &cli.config {
        Some(path) => {
            let config = SimConfig::load(path)?;
            (
                config.remote_peer,
                config.upf_n3.to_string(),
                config.interface,
            )
        }
        None => (cli.remote_peer, cli.upf_n3, cli.interface),
    };

    let service = Service::new(N4Client::new());
    check(service.configure(&remote_peer, &upf_n3, &interface))?;
    check(service.associate())?;

    match cli.command {
        Command::Associate => {
            check(service.disassociate())?;
        }
        Command::Create(args) => {
            check(service.create_session(&create_request(&args)))?;
            log::info!("sessions left installed, association kept open until exit");
        }
        Command::Cycle {
            session,
            buffer,
            notify_cp,
            end_marker,
            keep,
        } => {
            check(service.create_session(&create_request(&session)))?;
            check(service.modify_session(&ModifySessionRequest {
                base_id: session.base_id,
                count: session.count,
                node_b_address: session.gnb_address,
                buffer,
                notify_cp,
                end_marker,
                app_filters: session.app_filters.clone(),
            }))?;
            if !keep {
                check(service.delete_session(session.base_id, session.count))?;
            }
            check(service.disassociate())?;
        }
    }
    Ok(())
}
