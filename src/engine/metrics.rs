//! The metrics surface (spec §2 "Metrics Surface", §4.4, §4.5): per-interval
//! counters exported into a key-package ("kp") collaborator, keyed by a
//! graphite-safe dotted path.

use super::Engine;
use crate::collab::PeerSigMap;
use std::borrow::Cow;

/// The "key-package" collaborator named in spec §6: accepts
/// `(metric_name, value, timestamp)` triples.
pub trait MetricsSink {
    fn set(&mut self, name: &str, value: i64, time: u32);
}

/// No-op sink for tests/dev that don't care about metrics output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMetricsSink;

impl MetricsSink for NullMetricsSink {
    fn set(&mut self, _name: &str, _value: i64, _time: u32) {}
}

/// Buffers every `(name, value, time)` triple; used by tests and the CLI in
/// place of a real time-series backend (the original links against CAIDA's
/// `libtimeseries`, out of scope here).
#[derive(Debug, Default)]
pub struct InMemoryMetricsSink {
    pub entries: Vec<(String, i64, u32)>,
}

impl MetricsSink for InMemoryMetricsSink {
    fn set(&mut self, name: &str, value: i64, time: u32) {
        self.entries.push((name.to_string(), value, time));
    }
}

/// Replaces `.`/`*` with `-` so a string is safe to use as a graphite metric
/// path component (spec §9 "Graphite name escaping"); a pure total function
/// invoked only at this metrics boundary.
pub fn graphite_safe(s: &str) -> Cow<'_, str> {
    if s.contains(['.', '*']) {
        Cow::Owned(s.replace(['.', '*'], "-"))
    } else {
        Cow::Borrowed(s)
    }
}

/// Emits one interval's worth of counters into `sink` under
/// `<metric_prefix>.<project>.<collector>.` and, per peer, under
/// `<metric_prefix>.<project>.<collector>.<peer.metric_path()>.` (spec
/// §4.4/§4.5). Per-interval sets are cleared by the caller
/// ([`Engine::interval_end`]) right after this call, per the "cleared at
/// dump_metrics time" decision recorded in DESIGN.md.
pub fn dump_metrics<P, V, U, W, M>(engine: &Engine<P, V, U, W>, sink: &mut M, at_time: u32)
where
    P: PeerSigMap,
    M: MetricsSink,
{
    let prefix = graphite_safe(&engine.config().metric_prefix);

    for collector in engine.collectors() {
        let base = format!("{prefix}.{}", collector.metric_namespace());

        sink.set(&format!("{base}.valid_record_cnt"), collector.valid_record_cnt as i64, at_time);
        sink.set(
            &format!("{base}.corrupted_record_cnt"),
            collector.corrupted_record_cnt as i64,
            at_time,
        );
        sink.set(&format!("{base}.empty_record_cnt"), collector.empty_record_cnt as i64, at_time);
        sink.set(
            &format!("{base}.active_peers_cnt"),
            collector.active_peers_cnt as i64,
            at_time,
        );
        sink.set(&format!("{base}.state"), collector.state.metric_code(), at_time);

        for peer_id in &collector.peers {
            let Some(peer) = engine.view.peer(*peer_id) else { continue };
            let peer_base = format!("{base}.{}", peer.metric_path());

            sink.set(&format!("{peer_base}.rib_messages_cnt"), peer.rib_messages as i64, at_time);
            sink.set(&format!("{peer_base}.state_messages_cnt"), peer.state_messages as i64, at_time);
            sink.set(
                &format!("{peer_base}.pfx_announcements_cnt"),
                peer.pfx_announcements as i64,
                at_time,
            );
            sink.set(
                &format!("{peer_base}.pfx_withdrawals_cnt"),
                peer.pfx_withdrawals as i64,
                at_time,
            );
            sink.set(
                &format!("{peer_base}.rib_positive_mismatches_cnt"),
                peer.rib_positive_mismatches as i64,
                at_time,
            );
            sink.set(
                &format!("{peer_base}.rib_negative_mismatches_cnt"),
                peer.rib_negative_mismatches as i64,
                at_time,
            );
            sink.set(
                &format!("{peer_base}.announcing_ases_cnt"),
                peer.interval.announcing_asns.len() as i64,
                at_time,
            );
            sink.set(
                &format!("{peer_base}.announced_v4_pfxs_cnt"),
                peer.interval.announced_v4_pfxs.len() as i64,
                at_time,
            );
            sink.set(
                &format!("{peer_base}.withdrawn_v4_pfxs_cnt"),
                peer.interval.withdrawn_v4_pfxs.len() as i64,
                at_time,
            );
            sink.set(
                &format!("{peer_base}.announced_v6_pfxs_cnt"),
                peer.interval.announced_v6_pfxs.len() as i64,
                at_time,
            );
            sink.set(
                &format!("{peer_base}.withdrawn_v6_pfxs_cnt"),
                peer.interval.withdrawn_v6_pfxs.len() as i64,
                at_time,
            );
        }
    }
}
