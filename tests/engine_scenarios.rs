use bgpkit_routingtables::collab::{NullPublisher, RecordingPublisher};
use bgpkit_routingtables::config::Config;
use bgpkit_routingtables::engine::metrics::{InMemoryMetricsSink, NullMetricsSink};
use bgpkit_routingtables::engine::Engine;
use bgpkit_routingtables::models::{
    Asn, AsPath, AsPathSegment, DumpPos, DumpType, Element, OriginAsn, PeerState, Prefix, Record,
    RecordStatus,
};
use bgpkit_routingtables::view::StateFilter;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

fn aspath(asns: &[u32]) -> AsPath {
    AsPath::new(vec![AsPathSegment::Sequence(
        asns.iter().map(|a| Asn::new(*a)).collect(),
    )])
}

fn rib_record(collector: &str, t: u32, pos: DumpPos, elements: Vec<Element>) -> Record {
    Record::new("test-project", collector, DumpType::Rib, pos, t, t, RecordStatus::Valid, elements)
}

fn update_record(collector: &str, t: u32, elements: Vec<Element>) -> Record {
    Record::new("test-project", collector, DumpType::Update, DumpPos::Middle, t, t, RecordStatus::Valid, elements)
}

fn find_peer<'a>(
    engine: &'a Engine,
    ip: IpAddr,
    asn: Asn,
) -> Option<(bgpkit_routingtables::view::PeerId, &'a bgpkit_routingtables::view::PeerRecord)> {
    engine
        .view
        .peers(StateFilter::ALL_VALID)
        .find(|(_, p)| p.peer_ip == ip && p.peer_asn == asn)
        .map(|(id, p)| (*id, p))
}

#[test]
fn ipv6_rib_promotion_activates_peer_and_prefix() {
    let mut engine: Engine = Engine::new(Config::default());
    let peer_ip = IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1));
    let prefix: Prefix = "2001:db8:1::/48".parse().unwrap();
    let elem = Element::rib_entry(peer_ip, Asn::new(64500), prefix, aspath(&[64500, 64501]));

    engine.process_record(&rib_record("rrc00", 10, DumpPos::Start, vec![elem]));
    engine.process_record(&rib_record("rrc00", 10, DumpPos::End, vec![]));

    let (peer_id, peer) = find_peer(&engine, peer_ip, Asn::new(64500)).expect("peer recorded");
    assert!(peer.active);
    let cell = engine.view.pfx_peer(&prefix, peer_id).unwrap();
    assert!(cell.active);
    assert_eq!(cell.origin_asn, OriginAsn::Asn(Asn::new(64501)));
}

#[test]
fn corrupted_source_record_does_not_touch_other_collectors() {
    let mut engine: Engine = Engine::new(Config::default());
    let peer_a = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));
    let peer_b = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 2));
    let prefix: Prefix = "10.0.0.0/24".parse().unwrap();

    let elem_a = Element::rib_entry(peer_a, Asn::new(1), prefix, aspath(&[1, 2, 3]));
    engine.process_record(&rib_record("rrc00", 100, DumpPos::Start, vec![elem_a]));
    engine.process_record(&rib_record("rrc00", 100, DumpPos::End, vec![]));

    let elem_b = Element::rib_entry(peer_b, Asn::new(2), prefix, aspath(&[2, 3, 4]));
    engine.process_record(&rib_record("rrc01", 100, DumpPos::Start, vec![elem_b]));
    engine.process_record(&rib_record("rrc01", 100, DumpPos::End, vec![]));

    let corrupted = Record::new(
        "test-project",
        "rrc00",
        DumpType::Update,
        DumpPos::Middle,
        150,
        150,
        RecordStatus::CorruptedRecord,
        vec![],
    );
    engine.process_record(&corrupted);

    let (_, peer_rrc00) = find_peer(&engine, peer_a, Asn::new(1)).unwrap();
    assert!(!peer_rrc00.active);
    let (peer_id_b, peer_rrc01) = find_peer(&engine, peer_b, Asn::new(2)).unwrap();
    assert!(peer_rrc01.active);
    let cell_b = engine.view.pfx_peer(&prefix, peer_id_b).unwrap();
    assert!(cell_b.active);
}

#[test]
fn full_feed_filter_admits_peers_over_threshold() {
    let mut config = Config::default();
    config.ipv4_fullfeed_th = 3;
    let mut engine: Engine = Engine::new(config);

    let peer_ip = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 9));
    let prefixes = ["10.0.0.0/24", "10.0.1.0/24", "10.0.2.0/24", "10.0.3.0/24"];
    let elems: Vec<Element> = prefixes
        .iter()
        .map(|p| Element::rib_entry(peer_ip, Asn::new(64500), p.parse().unwrap(), aspath(&[64500])))
        .collect();
    engine.process_record(&rib_record("rrc00", 10, DumpPos::Start, elems));
    engine.process_record(&rib_record("rrc00", 10, DumpPos::End, vec![]));

    let mut publisher = RecordingPublisher::default();
    let mut sink = NullMetricsSink;
    engine.interval_start(10);
    engine.interval_end(10, Some(&mut publisher), &mut sink);

    assert_eq!(publisher.calls.len(), 1);
    assert_eq!(publisher.calls[0], (10, 1));
}

#[test]
fn peer_down_then_up_resets_and_reactivates() {
    let mut engine: Engine = Engine::new(Config::default());
    let peer_ip = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 5));
    let prefix: Prefix = "10.0.0.0/24".parse().unwrap();

    let elem = Element::rib_entry(peer_ip, Asn::new(1), prefix, aspath(&[1, 2, 3]));
    engine.process_record(&rib_record("rrc00", 100, DumpPos::Start, vec![elem]));
    engine.process_record(&rib_record("rrc00", 100, DumpPos::End, vec![]));

    let down = Element::peer_state(peer_ip, Asn::new(1), PeerState::Idle);
    engine.process_record(&update_record("rrc00", 200, vec![down]));
    let (_, peer) = find_peer(&engine, peer_ip, Asn::new(1)).unwrap();
    assert!(!peer.active);

    let up = Element::peer_state(peer_ip, Asn::new(1), PeerState::Established);
    engine.process_record(&update_record("rrc00", 300, vec![up]));
    let (_, peer) = find_peer(&engine, peer_ip, Asn::new(1)).unwrap();
    assert!(peer.active);
    assert_eq!(peer.fsm_state, PeerState::Established);
    assert_eq!(peer.ref_rib_start, 300);
}

#[test]
fn metrics_dump_includes_configured_prefix_and_collector_namespace() {
    let mut config = Config::default();
    config.metric_prefix = "acme.routingtables".to_string();
    let mut engine: Engine = Engine::new(config);

    let peer_ip = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 7));
    let prefix: Prefix = "10.0.0.0/24".parse().unwrap();
    let elem = Element::rib_entry(peer_ip, Asn::new(1), prefix, aspath(&[1, 2, 3]));
    engine.process_record(&rib_record("rrc00", 50, DumpPos::Start, vec![elem]));
    engine.process_record(&rib_record("rrc00", 50, DumpPos::End, vec![]));

    let mut sink = InMemoryMetricsSink::default();
    engine.interval_start(50);
    engine.interval_end::<NullPublisher, _>(50, None, &mut sink);

    assert!(sink
        .entries
        .iter()
        .any(|(name, _, _)| name.starts_with("acme-routingtables.test-project.rrc00.")));
}
