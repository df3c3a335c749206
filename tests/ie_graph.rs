// tests/ie_graph.rs

//! Properties of the assembled IE graphs: deterministic identifier bands,
//! disjoint ID sets, monotonic UE address allocation.

mod fixtures;

use fixtures::*;
use rs_pfcp::ie::IeType;
use rs_pfcpsim::controller::CreateSessionRequest;
use std::collections::BTreeSet;

fn request(base_id: u32, count: u32, filters: &[&str]) -> CreateSessionRequest {
    CreateSessionRequest {
        base_id,
        count,
        node_b_address: "140.0.0.1".parse().unwrap(),
        ue_address_pool: "17.0.0.0/24".to_string(),
        ul_tunnel_dst: None,
        dl_tunnel_dst: None,
        teid_allocation: false,
        qfi: 9,
        app_filters: filters.iter().map(|f| f.to_string()).collect(),
    }
}

/// Every rule identifier used by one recorded establishment.
fn rule_ids(session: &Established) -> BTreeSet<u32> {
    let mut ids = BTreeSet::new();
    for pdr in &session.pdrs {
        ids.insert(u16_payload(&find_child(pdr, IeType::PdrId).unwrap()) as u32);
    }
    for far in &session.fars {
        ids.insert(u32_payload(&find_child(far, IeType::FarId).unwrap()));
    }
    for qer in &session.qers {
        ids.insert(u32_payload(&find_child(qer, IeType::QerId).unwrap()));
    }
    for urr in &session.urrs {
        ids.insert(u32_payload(&find_child(urr, IeType::UrrId).unwrap()));
    }
    ids
}

fn marshal_all(session: &Established) -> Vec<u8> {
    let mut bytes = Vec::new();
    for ie in session
        .pdrs
        .iter()
        .chain(&session.fars)
        .chain(&session.qers)
        .chain(&session.urrs)
    {
        bytes.extend_from_slice(&ie.marshal());
    }
    bytes
}

#[test]
fn test_id_sets_follow_the_band_scheme() {
    let (mut controller, state) = associated_controller();
    let filters = ["allow ip any to 8.8.8.8/32", "deny udp any to 1.1.1.1/32"];
    controller.create_session(&request(20, 3, &filters)).unwrap();

    let state = state.borrow();
    assert_eq!(state.established.len(), 3);

    for (session, base) in state.established.iter().zip([20u32, 30, 40]) {
        // Two filters: identifier pairs {base, base+1} and {base+2, base+3},
        // plus the session QER at 0.
        let expected: BTreeSet<u32> =
            [0, base, base + 1, base + 2, base + 3].into_iter().collect();
        assert_eq!(rule_ids(session), expected);

        // The band TEID doubles as the uplink TEID of every uplink PDR.
        for pdr in [&session.pdrs[0], &session.pdrs[2]] {
            let pdi = find_child(pdr, IeType::Pdi).unwrap();
            let fteid = find_child(&pdi, IeType::Fteid).unwrap();
            assert_eq!(
                u32::from_be_bytes(fteid.payload[1..5].try_into().unwrap()),
                base
            );
        }
    }
}

#[test]
fn test_rebuild_with_same_inputs_is_byte_identical() {
    let filters = ["allow tcp any to 9.9.9.9/32; precedence=50"];
    let run = || {
        let (mut controller, state) = associated_controller();
        controller.create_session(&request(1, 2, &filters)).unwrap();
        let state = state.borrow();
        state.established.iter().map(marshal_all).collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_disjoint_bands_produce_disjoint_ids() {
    let (mut controller, state) = associated_controller();
    controller.create_session(&request(1, 2, &[])).unwrap();
    controller.create_session(&request(100, 2, &[])).unwrap();

    let state = state.borrow();
    let first: BTreeSet<u32> = state.established[..2].iter().flat_map(rule_ids).collect();
    let second: BTreeSet<u32> = state.established[2..].iter().flat_map(rule_ids).collect();
    // The session QER at 0 is per-session and excluded from the band claim.
    let overlap: Vec<_> = first.intersection(&second).filter(|id| **id != 0).collect();
    assert!(overlap.is_empty(), "band overlap: {overlap:?}");
}

#[test]
fn test_ue_allocation_is_monotonic_and_filter_independent() {
    let (mut controller, state) = associated_controller();
    let filters = ["allow ip any to any", "allow udp any to any"];
    controller.create_session(&request(1, 3, &filters)).unwrap();

    let state = state.borrow();
    let mut previous = 0u32;
    for session in &state.established {
        // Both downlink PDRs of a session carry the same UE address.
        let mut addresses = BTreeSet::new();
        for pdr in [&session.pdrs[1], &session.pdrs[3]] {
            let pdi = find_child(pdr, IeType::Pdi).unwrap();
            let ue = find_child(&pdi, IeType::UeIpAddress).unwrap();
            addresses.insert(u32::from_be_bytes(ue.payload[1..5].try_into().unwrap()));
        }
        assert_eq!(addresses.len(), 1);
        let address = *addresses.iter().next().unwrap();
        assert!(address > previous, "UE addresses must increase");
        previous = address;
    }
}

#[test]
fn test_uplink_far_tunnels_only_when_peer_given() {
    let (mut controller, state) = associated_controller();
    let mut req = request(1, 1, &[]);
    req.ul_tunnel_dst = Some("172.16.0.9".parse().unwrap());
    controller.create_session(&req).unwrap();

    let state = state.borrow();
    let session = &state.established[0];

    let uplink_far = &session.fars[0];
    let params = find_child(uplink_far, IeType::ForwardingParameters).unwrap();
    let ohc = find_child(&params, IeType::OuterHeaderCreation).unwrap();
    assert_eq!(&ohc.payload[6..10], &[172, 16, 0, 9]);

    // Downlink FAR tunnels toward the gNodeB with the odd TEID.
    let downlink_far = &session.fars[1];
    let params = find_child(downlink_far, IeType::ForwardingParameters).unwrap();
    let ohc = find_child(&params, IeType::OuterHeaderCreation).unwrap();
    assert_eq!(&ohc.payload[2..6], &[0, 0, 0, 2]);
    assert_eq!(&ohc.payload[6..10], &[140, 0, 0, 1]);
}

#[test]
fn test_untunneled_uplink_far_has_no_outer_header() {
    let (mut controller, state) = associated_controller();
    controller.create_session(&request(1, 1, &[])).unwrap();

    let state = state.borrow();
    let uplink_far = &state.established[0].fars[0];
    let params = find_child(uplink_far, IeType::ForwardingParameters).unwrap();
    assert!(find_child(&params, IeType::OuterHeaderCreation).is_none());
}

#[test]
fn test_teid_allocation_sets_choose_flag() {
    let (mut controller, state) = associated_controller();
    let mut req = request(1, 1, &[]);
    req.teid_allocation = true;
    controller.create_session(&req).unwrap();

    let state = state.borrow();
    let pdi = find_child(&state.established[0].pdrs[0], IeType::Pdi).unwrap();
    let fteid = find_child(&pdi, IeType::Fteid).unwrap();
    // CH flag, bit 2 of the flags octet.
    assert_ne!(fteid.payload[0] & 0x04, 0);
}

#[test]
fn test_deny_filter_closes_app_qer_gate() {
    let (mut controller, state) = associated_controller();
    controller
        .create_session(&request(1, 1, &["deny ip any to any"]))
        .unwrap();

    let state = state.borrow();
    let session = &state.established[0];

    // Session QER stays open, the app QER is gated shut in both directions.
    let session_qer = &session.qers[0];
    assert_eq!(
        find_child(session_qer, IeType::GateStatus).unwrap().payload,
        vec![0]
    );
    let app_qer = &session.qers[1];
    assert_eq!(
        find_child(app_qer, IeType::GateStatus).unwrap().payload,
        vec![0b11]
    );

    // The SDF filter still rides along on the PDRs.
    let pdi = find_child(&session.pdrs[0], IeType::Pdi).unwrap();
    let sdf = find_child(&pdi, IeType::SdfFilter).unwrap();
    assert_eq!(
        String::from_utf8(sdf.payload).unwrap(),
        "permit out ip from any to any"
    );
}
