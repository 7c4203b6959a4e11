//! The routing-table reconstruction engine (spec §4.3): per-collector state
//! plus the record-dispatch, update/withdraw, peer-state, corrupted-record,
//! and UC-RIB promotion/abort logic that together keep a [`View`] in sync
//! with an interleaved stream of RIB/update records.

pub mod metrics;

use crate::collab::{InternMap, PeerSigMap, Publisher, ViewSnapshot};
use crate::config::Config;
use crate::models::asn::{Asn, OriginAsn};
use crate::models::prefix::{Family, Prefix};
use crate::models::record::{DumpPos, DumpType, Element, ElemType, PeerState, Record, RecordStatus};
use crate::view::{PeerId, StateFilter, View};
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// Grace period (seconds) during which a live update is still considered
/// more authoritative than a RIB dump that started after it (spec §4.3.7).
pub const BACKLOG_WINDOW: u32 = 60;
/// Seconds a peer may go unreferenced before it's declared lost at RIB
/// promotion time (spec §4.3.7).
pub const MAX_INACTIVE_TIME: u32 = 3600;
/// Not present in `original_source/` (only `ROUTINGTABLES_COLLECTOR_WALL_UPDATE_FR`
/// is referenced, never `#define`d in the excerpted files) — a documented
/// default rather than a recovered constant; see DESIGN.md.
pub const WALL_UPDATE_THRESHOLD: u32 = 3600;

fn wall_time_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// Collector-level liveness state (spec §3 Data Model, §4.3.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorFsm {
    Unknown,
    Down,
    Up,
}

impl CollectorFsm {
    /// `{0=unknown,1=down,2=up}`, per the metrics surface (spec §4.4).
    pub fn metric_code(&self) -> i64 {
        match self {
            CollectorFsm::Unknown => 0,
            CollectorFsm::Down => 1,
            CollectorFsm::Up => 2,
        }
    }
}

/// Per-collector state (spec §3 Data Model "Collector State").
#[derive(Debug, Clone)]
pub struct CollectorState {
    pub project: String,
    pub name: String,
    pub peers: HashSet<PeerId>,
    pub bgp_time_last: u32,
    pub wall_time_last: u32,
    pub ref_rib_dump_time: u32,
    pub ref_rib_start_time: u32,
    pub uc_rib_dump_time: u32,
    pub uc_rib_start_time: u32,
    pub state: CollectorFsm,
    pub active_peers_cnt: usize,
    pub valid_record_cnt: u64,
    pub corrupted_record_cnt: u64,
    pub empty_record_cnt: u64,
    pub publish_flag: bool,
    pub active_asns: HashSet<Asn>,
}

impl CollectorState {
    fn new(project: String, name: String) -> Self {
        CollectorState {
            project,
            name,
            peers: HashSet::new(),
            bgp_time_last: 0,
            wall_time_last: 0,
            ref_rib_dump_time: 0,
            ref_rib_start_time: 0,
            uc_rib_dump_time: 0,
            uc_rib_start_time: 0,
            state: CollectorFsm::Unknown,
            active_peers_cnt: 0,
            valid_record_cnt: 0,
            corrupted_record_cnt: 0,
            empty_record_cnt: 0,
            publish_flag: false,
            active_asns: HashSet::new(),
        }
    }

    /// `<project>.<collector>`, graphite-escaped at the metrics boundary only.
    pub fn metric_namespace(&self) -> String {
        format!(
            "{}.{}",
            metrics::graphite_safe(&self.project),
            metrics::graphite_safe(&self.name)
        )
    }
}

/// The routing-table reconstruction engine. Generic over the
/// [`PeerSigMap`] implementation (`P`, default [`InternMap`]) and the three
/// opaque user-data slots the underlying [`View`] carries (`V` at view
/// granularity, `U` per peer, `W` per pfx-peer cell).
pub struct Engine<P = InternMap, V = (), U = (), W = ()> {
    pub view: View<V, U, W>,
    collectors: std::collections::HashMap<String, CollectorState>,
    peer_sigs: P,
    config: Config,
    interval_wall_start: u32,
}

impl<V, U, W> Engine<InternMap, V, U, W> {
    pub fn new(config: Config) -> Self {
        Engine {
            view: View::new(),
            collectors: std::collections::HashMap::new(),
            peer_sigs: InternMap::new(),
            config,
            interval_wall_start: 0,
        }
    }
}

impl<P: PeerSigMap, V, U, W> Engine<P, V, U, W> {
    pub fn with_peer_sigs(config: Config, peer_sigs: P) -> Self {
        Engine {
            view: View::new(),
            collectors: std::collections::HashMap::new(),
            peer_sigs,
            config,
            interval_wall_start: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn collector(&self, name: &str) -> Option<&CollectorState> {
        self.collectors.get(name)
    }

    pub fn collectors(&self) -> impl Iterator<Item = &CollectorState> {
        self.collectors.values()
    }

    /// Dispatches one record (spec §4.3.1).
    pub fn process_record(&mut self, record: &Record) {
        self.collectors
            .entry(record.collector.clone())
            .or_insert_with(|| CollectorState::new(record.project.clone(), record.collector.clone()));

        let (uc_active, ref_rib_start, uc_rib_start) = {
            let c = &self.collectors[&record.collector];
            (c.uc_rib_start_time > 0, c.ref_rib_start_time, c.uc_rib_start_time)
        };
        let discard = if uc_active {
            record.record_time < uc_rib_start
        } else {
            record.record_time < ref_rib_start
        };
        if discard {
            return;
        }

        match record.status {
            RecordStatus::Valid => {
                self.process_valid_record(record);
                if let Some(c) = self.collectors.get_mut(&record.collector) {
                    c.valid_record_cnt += 1;
                }
            }
            RecordStatus::CorruptedSource | RecordStatus::CorruptedRecord => {
                self.handle_corrupted_record(record);
                if let Some(c) = self.collectors.get_mut(&record.collector) {
                    c.corrupted_record_cnt += 1;
                }
            }
            RecordStatus::FilteredSource | RecordStatus::EmptySource => {
                if let Some(c) = self.collectors.get_mut(&record.collector) {
                    // Preserved as specified even though it reads inverted
                    // versus the VALID path (spec §9 Open Question a).
                    if record.record_time < c.bgp_time_last {
                        c.bgp_time_last = record.record_time;
                    }
                    c.empty_record_cnt += 1;
                }
            }
        }

        self.recompute_collector_state(&record.collector, record.record_time);
    }

    fn recompute_collector_state(&mut self, collector_name: &str, record_time: u32) {
        let peer_ids: Vec<PeerId> = match self.collectors.get(collector_name) {
            Some(c) => c.peers.iter().cloned().collect(),
            None => return,
        };

        {
            let c = self.collectors.get_mut(collector_name).unwrap();
            if record_time > c.bgp_time_last {
                if record_time > c.bgp_time_last + WALL_UPDATE_THRESHOLD {
                    c.wall_time_last = wall_time_now();
                }
                c.bgp_time_last = record_time;
            }
        }

        let mut any_active = false;
        let mut all_unknown = true;
        let mut active_cnt = 0usize;
        for peer_id in &peer_ids {
            if let Some(peer) = self.view.peer(*peer_id) {
                if peer.active {
                    any_active = true;
                    active_cnt += 1;
                }
                if peer.fsm_state != PeerState::Unknown {
                    all_unknown = false;
                }
            }
        }

        let c = self.collectors.get_mut(collector_name).unwrap();
        c.active_peers_cnt = active_cnt;
        c.state = if any_active {
            CollectorFsm::Up
        } else if all_unknown {
            CollectorFsm::Unknown
        } else {
            CollectorFsm::Down
        };
    }

    /// Valid-record processing (spec §4.3.2).
    fn process_valid_record(&mut self, record: &Record) {
        if record.dump_type == DumpType::Rib && record.dump_pos == DumpPos::Start {
            let uc_was_active = self
                .collectors
                .get(&record.collector)
                .map(|c| c.uc_rib_start_time > 0)
                .unwrap_or(false);
            if uc_was_active {
                self.stop_uc_process(&record.collector);
            }
            if let Some(c) = self.collectors.get_mut(&record.collector) {
                c.uc_rib_dump_time = record.dump_time;
                c.uc_rib_start_time = record.record_time;
            }
        }

        if record.dump_type == DumpType::Rib {
            let dump_time_matches = self
                .collectors
                .get(&record.collector)
                .map(|c| c.uc_rib_dump_time == record.dump_time)
                .unwrap_or(false);
            if !dump_time_matches {
                return;
            }
        }

        for elem in &record.elements {
            self.process_element(record, elem);
        }

        if record.dump_type == DumpType::Rib && record.dump_pos == DumpPos::End {
            self.end_of_valid_rib(&record.collector);
        }
    }

    fn process_element(&mut self, record: &Record, elem: &Element) {
        if matches!(elem.elem_type, ElemType::Rib | ElemType::Announcement) {
            if let Some(path) = &elem.aspath {
                if path.route_len() == 0 {
                    return;
                }
                if let Some(first) = path.first_hop_asn() {
                    if first != elem.peer_asn {
                        return;
                    }
                }
            }
        }

        let peer_id = self
            .peer_sigs
            .get_or_intern(&record.collector, elem.peer_ip, elem.peer_asn);
        self.view
            .ensure_peer(peer_id, &record.collector, elem.peer_ip, elem.peer_asn);
        if let Some(p) = self.view.peer_mut(peer_id) {
            p.last_ts = record.record_time;
        }
        if let Some(c) = self.collectors.get_mut(&record.collector) {
            c.peers.insert(peer_id);
        }

        match elem.elem_type {
            ElemType::Announcement | ElemType::Withdrawal => {
                let Some(prefix) = elem.prefix else { return };
                let origin = match elem.elem_type {
                    ElemType::Withdrawal => OriginAsn::Down,
                    _ => elem.aspath.as_ref().map(|p| p.origin()).unwrap_or(OriginAsn::Down),
                };
                self.apply_update(record.record_time, elem.elem_type, prefix, origin, peer_id);
            }
            ElemType::Rib => {
                let Some(prefix) = elem.prefix else { return };
                let origin = elem.aspath.as_ref().map(|p| p.origin()).unwrap_or(OriginAsn::Down);
                self.apply_rib_element(record.record_time, prefix, origin, peer_id);
            }
            ElemType::PeerState => {
                let Some(new_state) = elem.new_state else { return };
                self.apply_peer_state(record.record_time, new_state, peer_id);
            }
        }
    }

    /// Update / withdraw application for the live stream (spec §4.3.3).
    fn apply_update(&mut self, ts: u32, elem_type: ElemType, prefix: Prefix, origin: OriginAsn, peer_id: PeerId) {
        self.view.ensure_pfx_peer(prefix, peer_id);

        let stale = self
            .view
            .pfx_peer(&prefix, peer_id)
            .map(|c| ts < c.bgp_time_last_ts)
            .unwrap_or(false);

        if let Some(cell) = self.view.pfx_peer_mut(&prefix, peer_id) {
            match elem_type {
                ElemType::Announcement => cell.announcements += 1,
                ElemType::Withdrawal => cell.withdrawals += 1,
                _ => {}
            }
        }
        if let Some(peer) = self.view.peer_mut(peer_id) {
            match elem_type {
                ElemType::Announcement => peer.pfx_announcements += 1,
                ElemType::Withdrawal => peer.pfx_withdrawals += 1,
                _ => {}
            }
        }

        if stale {
            return;
        }

        if let Some(cell) = self.view.pfx_peer_mut(&prefix, peer_id) {
            cell.bgp_time_last_ts = ts;
            cell.origin_asn = origin;
        }

        let peer_active = self.view.peer(peer_id).map(|p| p.active).unwrap_or(false);
        let fsm_unknown = self
            .view
            .peer(peer_id)
            .map(|p| p.fsm_state == PeerState::Unknown)
            .unwrap_or(true);
        let uc_active = self.view.peer(peer_id).map(|p| p.uc_active()).unwrap_or(false);

        if peer_active {
            match elem_type {
                ElemType::Announcement => self.view.set_pfx_peer_active(&prefix, peer_id, true),
                ElemType::Withdrawal => self.view.set_pfx_peer_active(&prefix, peer_id, false),
                _ => {}
            }
        } else if fsm_unknown && uc_active {
            // Absorbed into the next RIB promotion; cell stays inactive.
        } else if fsm_unknown && !uc_active {
            // Orphan update before the peer's existence is confirmed: roll back.
            if let Some(cell) = self.view.pfx_peer_mut(&prefix, peer_id) {
                cell.bgp_time_last_ts = 0;
                cell.origin_asn = OriginAsn::Down;
                match elem_type {
                    ElemType::Announcement => cell.announcements = cell.announcements.saturating_sub(1),
                    ElemType::Withdrawal => cell.withdrawals = cell.withdrawals.saturating_sub(1),
                    _ => {}
                }
            }
            if let Some(peer) = self.view.peer_mut(peer_id) {
                match elem_type {
                    ElemType::Announcement => peer.pfx_announcements = peer.pfx_announcements.saturating_sub(1),
                    ElemType::Withdrawal => peer.pfx_withdrawals = peer.pfx_withdrawals.saturating_sub(1),
                    _ => {}
                }
            }
            return;
        } else {
            // Peer inactive, FSM known: implicit peer-up.
            self.view.activate_peer(peer_id);
            if let Some(peer) = self.view.peer_mut(peer_id) {
                peer.fsm_state = PeerState::Established;
                peer.ref_rib_start = ts;
                peer.ref_rib_end = ts;
            }
            if matches!(elem_type, ElemType::Announcement) {
                self.view.set_pfx_peer_active(&prefix, peer_id, true);
            }
        }

        if let Some(peer) = self.view.peer_mut(peer_id) {
            match elem_type {
                ElemType::Announcement => {
                    if let OriginAsn::Asn(a) = origin {
                        peer.interval.announcing_asns.insert(a);
                    }
                    match prefix.family() {
                        Family::V4 => {
                            peer.interval.announced_v4_pfxs.insert(prefix);
                        }
                        Family::V6 => {
                            peer.interval.announced_v6_pfxs.insert(prefix);
                        }
                    }
                }
                ElemType::Withdrawal => match prefix.family() {
                    Family::V4 => {
                        peer.interval.withdrawn_v4_pfxs.insert(prefix);
                    }
                    Family::V6 => {
                        peer.interval.withdrawn_v6_pfxs.insert(prefix);
                    }
                },
                _ => {}
            }
        }
    }

    /// A `RIB` element observed while a UC RIB is being assembled (spec §4.3.3).
    fn apply_rib_element(&mut self, ts: u32, prefix: Prefix, origin: OriginAsn, peer_id: PeerId) {
        self.view.ensure_pfx_peer(prefix, peer_id);
        if let Some(peer) = self.view.peer_mut(peer_id) {
            peer.rib_messages += 1;
            if peer.uc_rib_start == 0 {
                peer.uc_rib_start = ts;
            }
            peer.uc_rib_end = ts;
        }
        let uc_start = self.view.peer(peer_id).map(|p| p.uc_rib_start).unwrap_or(ts);
        if let Some(cell) = self.view.pfx_peer_mut(&prefix, peer_id) {
            cell.uc_delta_ts = ts.saturating_sub(uc_start);
            cell.uc_origin_asn = origin;
        }
    }

    /// Peer-state application (spec §4.3.4).
    fn apply_peer_state(&mut self, ts: u32, new_state: PeerState, peer_id: PeerId) {
        if let Some(peer) = self.view.peer_mut(peer_id) {
            // Bumped unconditionally, before the FSM-class dispatch (SPEC_FULL §4.3).
            peer.state_messages += 1;
        }

        let old_established = self
            .view
            .peer(peer_id)
            .map(|p| p.fsm_state.is_established())
            .unwrap_or(false);
        let new_established = new_state.is_established();

        if old_established && !new_established {
            if let Some(peer) = self.view.peer_mut(peer_id) {
                peer.fsm_state = new_state;
            }
            let uc_start = self.view.peer(peer_id).map(|p| p.uc_rib_start).unwrap_or(0);
            let mut uc_reset = false;
            if uc_start > 0 && ts >= uc_start {
                if let Some(peer) = self.view.peer_mut(peer_id) {
                    peer.uc_rib_start = 0;
                    peer.uc_rib_end = 0;
                }
                uc_reset = true;
            }
            self.reset_peer_pfxs(peer_id, uc_reset);
            self.view.deactivate_peer(peer_id);
        } else if !old_established && new_established {
            if let Some(peer) = self.view.peer_mut(peer_id) {
                peer.fsm_state = new_state;
                peer.ref_rib_start = ts;
                peer.ref_rib_end = ts;
            }
            self.view.activate_peer(peer_id);
        } else if let Some(peer) = self.view.peer_mut(peer_id) {
            peer.fsm_state = new_state;
        }
    }

    /// Clears every pfx-peer cell belonging to `peer_id`: withdraws live
    /// reachability and, if `also_uc`, the UC-RIB observation too.
    fn reset_peer_pfxs(&mut self, peer_id: PeerId, also_uc: bool) {
        let prefixes: Vec<(Family, Prefix)> = self
            .view
            .peer(peer_id)
            .map(|p| p.prefixes.iter().cloned().collect())
            .unwrap_or_default();
        for (_, pfx) in prefixes {
            if let Some(cell) = self.view.pfx_peer_mut(&pfx, peer_id) {
                cell.bgp_time_last_ts = 0;
                cell.origin_asn = OriginAsn::Down;
                cell.active = false;
                if also_uc {
                    cell.uc_delta_ts = 0;
                    cell.uc_origin_asn = OriginAsn::Down;
                }
            }
        }
    }

    /// Corrupted-record handling (spec §4.3.5).
    fn handle_corrupted_record(&mut self, record: &Record) {
        let peer_ids: Vec<PeerId> = match self.collectors.get(&record.collector) {
            Some(c) => c.peers.iter().cloned().collect(),
            None => return,
        };
        let record_time = record.record_time;

        for peer_id in peer_ids {
            let (active_affected, uc_affected) = match self.view.peer(peer_id) {
                Some(peer) => (
                    peer.ref_rib_start > 0 && record_time >= peer.ref_rib_start,
                    peer.uc_rib_start > 0 && record_time >= peer.uc_rib_start,
                ),
                None => continue,
            };
            if !active_affected && !uc_affected {
                continue;
            }

            let prefixes: Vec<(Family, Prefix)> = self
                .view
                .peer(peer_id)
                .map(|p| p.prefixes.iter().cloned().collect())
                .unwrap_or_default();

            for (_, pfx) in prefixes {
                if active_affected {
                    let hit = self
                        .view
                        .pfx_peer(&pfx, peer_id)
                        .map(|c| c.bgp_time_last_ts <= record_time)
                        .unwrap_or(false);
                    if hit {
                        if let Some(cell) = self.view.pfx_peer_mut(&pfx, peer_id) {
                            cell.bgp_time_last_ts = 0;
                            cell.origin_asn = OriginAsn::Down;
                            cell.active = false;
                        }
                    }
                }
                if uc_affected {
                    if let Some(cell) = self.view.pfx_peer_mut(&pfx, peer_id) {
                        cell.uc_delta_ts = 0;
                        cell.uc_origin_asn = OriginAsn::Down;
                    }
                }
            }

            if let Some(peer) = self.view.peer_mut(peer_id) {
                if active_affected {
                    peer.fsm_state = PeerState::Unknown;
                    peer.ref_rib_start = 0;
                    peer.ref_rib_end = 0;
                }
                if uc_affected {
                    peer.uc_rib_start = 0;
                    peer.uc_rib_end = 0;
                }
            }
            if active_affected {
                self.view.deactivate_peer(peer_id);
            }
        }
    }

    /// Abort an in-progress UC RIB (spec §4.3.7 "Abort"/`stop_uc`).
    fn stop_uc_process(&mut self, collector_name: &str) {
        let peer_ids: Vec<PeerId> = match self.collectors.get(collector_name) {
            Some(c) => c.peers.iter().cloned().collect(),
            None => return,
        };

        for peer_id in peer_ids {
            let peer_inactive = self.view.peer(peer_id).map(|p| !p.active).unwrap_or(true);
            let prefixes: Vec<(Family, Prefix)> = self
                .view
                .peer(peer_id)
                .map(|p| p.prefixes.iter().cloned().collect())
                .unwrap_or_default();
            for (_, pfx) in prefixes {
                if let Some(cell) = self.view.pfx_peer_mut(&pfx, peer_id) {
                    cell.uc_delta_ts = 0;
                    cell.uc_origin_asn = OriginAsn::Down;
                    // Clears regardless of whether this timestamp originated
                    // from the UC RIB or a prior live update (spec §9 Open
                    // Question c, preserved as-specified).
                    if peer_inactive {
                        cell.bgp_time_last_ts = 0;
                        cell.origin_asn = OriginAsn::Down;
                    }
                }
            }
            if let Some(peer) = self.view.peer_mut(peer_id) {
                peer.uc_rib_start = 0;
                peer.uc_rib_end = 0;
            }
        }

        if let Some(c) = self.collectors.get_mut(collector_name) {
            c.uc_rib_dump_time = 0;
            c.uc_rib_start_time = 0;
        }
    }

    /// Promote a completed UC RIB into the reference view (spec §4.3.7
    /// "Promote"/`end_of_valid_rib`).
    fn end_of_valid_rib(&mut self, collector_name: &str) {
        let (collector_bgp_time_last, peer_ids) = match self.collectors.get(collector_name) {
            Some(c) => (c.bgp_time_last, c.peers.iter().cloned().collect::<Vec<_>>()),
            None => return,
        };

        for peer_id in &peer_ids {
            let peer_id = *peer_id;
            let (uc_rib_start, uc_rib_end) = match self.view.peer(peer_id) {
                Some(p) if p.uc_rib_start > 0 => (p.uc_rib_start, p.uc_rib_end),
                _ => continue,
            };

            let prefixes: Vec<(Family, Prefix)> = self
                .view
                .peer(peer_id)
                .map(|p| p.prefixes.iter().cloned().collect())
                .unwrap_or_default();
            let mut peer_touched = false;

            for (_, pfx) in prefixes {
                let Some(cell) = self.view.pfx_peer(&pfx, peer_id) else { continue };
                let uc_delta_ts = cell.uc_delta_ts;
                let uc_origin = cell.uc_origin_asn;
                let bgp_time_last_ts = cell.bgp_time_last_ts;
                let cell_was_active = cell.active;
                let origin_was_reachable = cell.origin_asn.is_reachable();
                let uc_ts = uc_delta_ts + uc_rib_start;

                let rib_supersedes =
                    uc_ts > bgp_time_last_ts && !(bgp_time_last_ts > uc_rib_start.saturating_sub(BACKLOG_WINDOW));

                if rib_supersedes {
                    if uc_origin.is_reachable() {
                        if bgp_time_last_ts != 0 && !origin_was_reachable {
                            if let Some(peer) = self.view.peer_mut(peer_id) {
                                peer.rib_negative_mismatches += 1;
                            }
                        }
                        if let Some(cell) = self.view.pfx_peer_mut(&pfx, peer_id) {
                            cell.origin_asn = uc_origin;
                            cell.bgp_time_last_ts = uc_ts;
                            cell.active = true;
                        }
                        peer_touched = true;
                    } else {
                        if cell_was_active {
                            if let Some(peer) = self.view.peer_mut(peer_id) {
                                peer.rib_positive_mismatches += 1;
                            }
                        }
                        if let Some(cell) = self.view.pfx_peer_mut(&pfx, peer_id) {
                            cell.bgp_time_last_ts = 0;
                            cell.origin_asn = OriginAsn::Down;
                            cell.active = false;
                        }
                    }
                } else if origin_was_reachable {
                    if let Some(cell) = self.view.pfx_peer_mut(&pfx, peer_id) {
                        cell.active = true;
                    }
                    peer_touched = true;
                }

                if let Some(cell) = self.view.pfx_peer_mut(&pfx, peer_id) {
                    cell.uc_delta_ts = 0;
                    cell.uc_origin_asn = OriginAsn::Down;
                }
            }

            if peer_touched {
                self.view.activate_peer(peer_id);
                if let Some(peer) = self.view.peer_mut(peer_id) {
                    peer.fsm_state = PeerState::Established;
                    peer.ref_rib_start = uc_rib_start;
                    peer.ref_rib_end = uc_rib_end;
                }
            }
        }

        for peer_id in peer_ids {
            let Some(peer) = self.view.peer(peer_id) else { continue };
            let was_established = peer.fsm_state.is_established();
            let last_ts = peer.last_ts;
            let uc_rib_start = peer.uc_rib_start;
            let demote = uc_rib_start == 0
                && was_established
                && last_ts < collector_bgp_time_last.saturating_sub(MAX_INACTIVE_TIME);

            if demote {
                if let Some(peer) = self.view.peer_mut(peer_id) {
                    peer.fsm_state = PeerState::Unknown;
                }
                self.reset_peer_pfxs(peer_id, true);
                self.view.deactivate_peer(peer_id);
            }
            if let Some(peer) = self.view.peer_mut(peer_id) {
                peer.uc_rib_start = 0;
                peer.uc_rib_end = 0;
            }
        }

        if let Some(c) = self.collectors.get_mut(collector_name) {
            c.publish_flag = true;
            c.ref_rib_dump_time = c.uc_rib_dump_time;
            c.ref_rib_start_time = c.uc_rib_start_time;
            c.uc_rib_dump_time = 0;
            c.uc_rib_start_time = 0;
        }
    }

    /// Starts an interval: sets the view's notion of "now" and records the
    /// wall-clock start time (spec §4.4).
    pub fn interval_start(&mut self, t: u32) {
        self.view.set_time(t);
        self.interval_wall_start = wall_time_now();
    }

    /// Peers admitted by the full-feed filter (spec §6 "Publishable view").
    fn admitted_peers(&self) -> Vec<PeerId> {
        self.view
            .peer_ids()
            .cloned()
            .filter(|&pid| {
                let v4 = self.view.peer_pfx_cnt(pid, Family::V4, StateFilter::ACTIVE) as u32;
                let v6 = self.view.peer_pfx_cnt(pid, Family::V6, StateFilter::ACTIVE) as u32;
                v4 >= self.config.ipv4_fullfeed_th || v6 >= self.config.ipv6_fullfeed_th
            })
            .collect()
    }

    /// Ends an interval: offers an admitted-peer snapshot to `publisher` (if
    /// any), logs elapsed wall time, and flushes metrics into `sink` (spec
    /// §4.4). Publisher failures are logged and otherwise swallowed (spec §7).
    pub fn interval_end<Pub, M>(&mut self, t: u32, publisher: Option<&mut Pub>, sink: &mut M)
    where
        Pub: Publisher<V, U, W>,
        M: metrics::MetricsSink,
    {
        if let Some(publisher) = publisher {
            let admitted_peers = self.admitted_peers();
            let snapshot = ViewSnapshot {
                view: &self.view,
                admitted_peers,
                time: t,
            };
            if let Err(e) = publisher.publish(&snapshot) {
                log::warn!("view publish failed at t={t}: {e}");
            }
        }

        let elapsed = wall_time_now().saturating_sub(self.interval_wall_start);
        log::info!("interval ended at t={t}, elapsed wall time {elapsed}s");

        metrics::dump_metrics(self, sink, t);
        self.view.reset_interval_counters();
        for c in self.collectors.values_mut() {
            c.valid_record_cnt = 0;
            c.corrupted_record_cnt = 0;
            c.empty_record_cnt = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::asn::Asn;
    use crate::models::aspath::{AsPath, AsPathSegment};
    use crate::models::record::{DumpPos, DumpType, Element, RecordStatus};
    use std::net::{IpAddr, Ipv4Addr};

    fn peer_ip() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))
    }

    fn aspath(asns: &[u32]) -> AsPath {
        AsPath::new(vec![AsPathSegment::Sequence(
            asns.iter().map(|a| Asn::new(*a)).collect(),
        )])
    }

    fn rib_record(dump_time: u32, record_time: u32, pos: DumpPos, elements: Vec<Element>) -> Record {
        Record::new(
            "test-project",
            "rrc00",
            DumpType::Rib,
            pos,
            dump_time,
            record_time,
            RecordStatus::Valid,
            elements,
        )
    }

    fn update_record(record_time: u32, elements: Vec<Element>) -> Record {
        Record::new(
            "test-project",
            "rrc00",
            DumpType::Update,
            DumpPos::Middle,
            record_time,
            record_time,
            RecordStatus::Valid,
            elements,
        )
    }

    fn prefix() -> Prefix {
        "10.0.0.0/24".parse().unwrap()
    }

    #[test]
    fn scenario_1_rib_only() {
        let mut engine: Engine = Engine::new(Config::default());
        let elem = Element::rib_entry(peer_ip(), Asn::new(1), prefix(), aspath(&[1, 2, 3]));
        engine.process_record(&rib_record(100, 100, DumpPos::Start, vec![elem.clone()]));
        engine.process_record(&rib_record(100, 100, DumpPos::End, vec![]));

        let peer_id = engine.peer_sigs.get_or_intern("rrc00", peer_ip(), Asn::new(1));
        let peer = engine.view.peer(peer_id).unwrap();
        assert!(peer.active);
        assert_eq!(peer.fsm_state, PeerState::Established);
        assert_eq!(peer.ref_rib_start, 100);

        let cell = engine.view.pfx_peer(&prefix(), peer_id).unwrap();
        assert!(cell.active);
        assert_eq!(cell.origin_asn, OriginAsn::Asn(Asn::new(3)));

        let collector = engine.collector("rrc00").unwrap();
        assert_eq!(collector.state, CollectorFsm::Up);
    }

    #[test]
    fn scenario_2_update_supersedes_rib() {
        let mut engine: Engine = Engine::new(Config::default());
        let elem = Element::rib_entry(peer_ip(), Asn::new(1), prefix(), aspath(&[1, 2, 3]));
        engine.process_record(&rib_record(100, 100, DumpPos::Start, vec![elem]));
        engine.process_record(&rib_record(100, 100, DumpPos::End, vec![]));

        let announce = Element::announcement(peer_ip(), Asn::new(1), prefix(), aspath(&[1, 2, 9]));
        engine.process_record(&update_record(200, vec![announce]));

        let peer_id = engine.peer_sigs.get_or_intern("rrc00", peer_ip(), Asn::new(1));
        let cell = engine.view.pfx_peer(&prefix(), peer_id).unwrap();
        assert_eq!(cell.origin_asn, OriginAsn::Asn(Asn::new(9)));
        assert_eq!(cell.bgp_time_last_ts, 200);
    }

    #[test]
    fn scenario_3_stale_update_is_ignored() {
        let mut engine: Engine = Engine::new(Config::default());
        let elem = Element::rib_entry(peer_ip(), Asn::new(1), prefix(), aspath(&[1, 2, 3]));
        engine.process_record(&rib_record(100, 100, DumpPos::Start, vec![elem]));
        engine.process_record(&rib_record(100, 100, DumpPos::End, vec![]));
        let announce = Element::announcement(peer_ip(), Asn::new(1), prefix(), aspath(&[1, 2, 9]));
        engine.process_record(&update_record(200, vec![announce]));

        let stale = Element::announcement(peer_ip(), Asn::new(1), prefix(), aspath(&[1, 2, 5]));
        engine.process_record(&update_record(150, vec![stale]));

        let peer_id = engine.peer_sigs.get_or_intern("rrc00", peer_ip(), Asn::new(1));
        let cell = engine.view.pfx_peer(&prefix(), peer_id).unwrap();
        assert_eq!(cell.origin_asn, OriginAsn::Asn(Asn::new(9)));
    }

    #[test]
    fn scenario_4_withdraw_then_rib_replay_counts_negative_mismatch() {
        let mut engine: Engine = Engine::new(Config::default());
        let elem = Element::rib_entry(peer_ip(), Asn::new(1), prefix(), aspath(&[1, 2, 3]));
        engine.process_record(&rib_record(100, 100, DumpPos::Start, vec![elem]));
        engine.process_record(&rib_record(100, 100, DumpPos::End, vec![]));

        let withdraw = Element::withdrawal(peer_ip(), Asn::new(1), prefix());
        engine.process_record(&update_record(300, vec![withdraw]));

        let rib_entry = Element::rib_entry(peer_ip(), Asn::new(1), prefix(), aspath(&[1, 2, 7]));
        engine.process_record(&rib_record(400, 400, DumpPos::Start, vec![rib_entry]));
        engine.process_record(&rib_record(400, 400, DumpPos::End, vec![]));

        let peer_id = engine.peer_sigs.get_or_intern("rrc00", peer_ip(), Asn::new(1));
        let cell = engine.view.pfx_peer(&prefix(), peer_id).unwrap();
        assert_eq!(cell.origin_asn, OriginAsn::Asn(Asn::new(7)));
        assert!(cell.active);
        let peer = engine.view.peer(peer_id).unwrap();
        assert_eq!(peer.rib_negative_mismatches, 1);
    }

    #[test]
    fn scenario_5_backlog_tolerance_keeps_live_state() {
        let mut engine: Engine = Engine::new(Config::default());
        let elem = Element::rib_entry(peer_ip(), Asn::new(1), prefix(), aspath(&[1, 2, 3]));
        engine.process_record(&rib_record(100, 100, DumpPos::Start, vec![elem]));
        engine.process_record(&rib_record(100, 100, DumpPos::End, vec![]));

        let announce = Element::announcement(peer_ip(), Asn::new(1), prefix(), aspath(&[1, 2, 11]));
        engine.process_record(&update_record(405, vec![announce]));

        let rib_entry = Element::rib_entry(peer_ip(), Asn::new(1), prefix(), aspath(&[1, 2, 7]));
        engine.process_record(&rib_record(410, 410, DumpPos::Start, vec![rib_entry]));
        engine.process_record(&rib_record(410, 410, DumpPos::End, vec![]));

        let peer_id = engine.peer_sigs.get_or_intern("rrc00", peer_ip(), Asn::new(1));
        let cell = engine.view.pfx_peer(&prefix(), peer_id).unwrap();
        assert_eq!(cell.origin_asn, OriginAsn::Asn(Asn::new(11)));
    }

    #[test]
    fn scenario_6_peer_down_flushes_pfx_peers() {
        let mut engine: Engine = Engine::new(Config::default());
        let elem = Element::rib_entry(peer_ip(), Asn::new(1), prefix(), aspath(&[1, 2, 3]));
        engine.process_record(&rib_record(100, 100, DumpPos::Start, vec![elem]));
        engine.process_record(&rib_record(100, 100, DumpPos::End, vec![]));

        let state = Element::peer_state(peer_ip(), Asn::new(1), PeerState::Idle);
        engine.process_record(&update_record(500, vec![state]));

        let peer_id = engine.peer_sigs.get_or_intern("rrc00", peer_ip(), Asn::new(1));
        let peer = engine.view.peer(peer_id).unwrap();
        assert!(!peer.active);
        let cell = engine.view.pfx_peer(&prefix(), peer_id).unwrap();
        assert_eq!(cell.origin_asn, OriginAsn::Down);
        assert!(!cell.active);
    }

    #[test]
    fn corrupted_record_deactivates_affected_pfx_peers() {
        let mut engine: Engine = Engine::new(Config::default());
        let elem = Element::rib_entry(peer_ip(), Asn::new(1), prefix(), aspath(&[1, 2, 3]));
        engine.process_record(&rib_record(100, 100, DumpPos::Start, vec![elem]));
        engine.process_record(&rib_record(100, 100, DumpPos::End, vec![]));

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

        let peer_id = engine.peer_sigs.get_or_intern("rrc00", peer_ip(), Asn::new(1));
        let cell = engine.view.pfx_peer(&prefix(), peer_id).unwrap();
        assert!(!cell.active);
        assert_eq!(cell.origin_asn, OriginAsn::Down);
    }

    #[test]
    fn local_origin_and_route_server_filters_skip_elements() {
        let mut engine: Engine = Engine::new(Config::default());
        let local_origin = Element::announcement(peer_ip(), Asn::new(1), prefix(), AsPath::new(vec![]));
        engine.process_record(&update_record(100, vec![local_origin]));
        assert_eq!(engine.view.peer_count(), 0);

        let route_server = Element::announcement(peer_ip(), Asn::new(1), prefix(), aspath(&[2, 3]));
        engine.process_record(&update_record(100, vec![route_server]));
        assert_eq!(engine.view.peer_count(), 0);
    }
}
