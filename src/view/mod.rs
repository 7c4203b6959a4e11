//! The two-level peer / (prefix, peer) index sitting on top of the trie.

use crate::models::asn::{Asn, OriginAsn};
use crate::models::prefix::{Family, Prefix};
use crate::models::record::PeerState;
use crate::trie::{NodeId, PatriciaTree};
use bitflags::bitflags;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

/// A non-zero integer interning `(collector, peer-ip, peer-asn)`, stable
/// for the process lifetime. Allocation itself is the [`crate::collab::PeerSigMap`]
/// collaborator's job; the view only ever receives already-minted IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub std::num::NonZeroU32);

bitflags! {
    /// Filters over the activation state of a peer or pfx-peer cell.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StateFilter: u8 {
        const ACTIVE = 0b01;
        const INACTIVE = 0b10;
        const ALL_VALID = Self::ACTIVE.bits() | Self::INACTIVE.bits();
    }
}

impl StateFilter {
    fn matches(&self, active: bool) -> bool {
        if active {
            self.contains(StateFilter::ACTIVE)
        } else {
            self.contains(StateFilter::INACTIVE)
        }
    }
}

/// Per-interval counters and sets reset at [`View::reset_interval_counters`].
#[derive(Debug, Clone, Default)]
pub struct IntervalStats {
    pub announcing_asns: HashSet<Asn>,
    pub announced_v4_pfxs: HashSet<Prefix>,
    pub withdrawn_v4_pfxs: HashSet<Prefix>,
    pub announced_v6_pfxs: HashSet<Prefix>,
    pub withdrawn_v6_pfxs: HashSet<Prefix>,
}

/// Per-peer state within a view, per the Peer Record data model (spec §3).
#[derive(Debug, Clone)]
pub struct PeerRecord<U = ()> {
    pub collector: String,
    pub peer_ip: IpAddr,
    pub peer_asn: Asn,
    pub fsm_state: PeerState,
    pub active: bool,
    pub ref_rib_start: u32,
    pub ref_rib_end: u32,
    pub uc_rib_start: u32,
    pub uc_rib_end: u32,
    pub last_ts: u32,
    pub rib_messages: u64,
    pub state_messages: u64,
    pub pfx_announcements: u64,
    pub pfx_withdrawals: u64,
    pub rib_positive_mismatches: u64,
    pub rib_negative_mismatches: u64,
    pub interval: IntervalStats,
    /// Prefixes this peer has a pfx-peer cell for, kept so engine-wide
    /// per-peer sweeps (UC promotion/abort, corrupted-record handling)
    /// don't need a full trie walk. Not part of the original spec's data
    /// model by name, but required to realize "two-level index" lookups by
    /// peer without quadratic scans.
    pub(crate) prefixes: HashSet<(Family, Prefix)>,
    pub user: Option<U>,
}

impl<U> PeerRecord<U> {
    fn new(collector: String, peer_ip: IpAddr, peer_asn: Asn) -> Self {
        PeerRecord {
            collector,
            peer_ip,
            peer_asn,
            fsm_state: PeerState::Unknown,
            active: false,
            ref_rib_start: 0,
            ref_rib_end: 0,
            uc_rib_start: 0,
            uc_rib_end: 0,
            last_ts: 0,
            rib_messages: 0,
            state_messages: 0,
            pfx_announcements: 0,
            pfx_withdrawals: 0,
            rib_positive_mismatches: 0,
            rib_negative_mismatches: 0,
            interval: IntervalStats::default(),
            prefixes: HashSet::new(),
            user: None,
        }
    }

    pub fn uc_active(&self) -> bool {
        self.uc_rib_start > 0
    }

    /// Graphite-safe metric path component for this peer, per Design Note
    /// "Graphite name escaping": `peer_asn.<ASN>.ipv<4|6>_peer.__IP_<addr>`.
    pub fn metric_path(&self) -> String {
        let ip_version = if self.peer_ip.is_ipv4() { 4 } else { 6 };
        format!(
            "peer_asn.{}.ipv{}_peer.__IP_{}",
            self.peer_asn,
            ip_version,
            crate::engine::metrics::graphite_safe(&self.peer_ip.to_string())
        )
    }
}

/// Per-(prefix, peer) cell, per the Pfx-Peer Record data model (spec §3).
#[derive(Debug, Clone)]
pub struct PfxPeerRecord<W = ()> {
    pub origin_asn: OriginAsn,
    pub bgp_time_last_ts: u32,
    pub uc_delta_ts: u32,
    pub uc_origin_asn: OriginAsn,
    pub announcements: u64,
    pub withdrawals: u64,
    pub active: bool,
    pub user: Option<W>,
}

impl<W> Default for PfxPeerRecord<W> {
    fn default() -> Self {
        PfxPeerRecord {
            origin_asn: OriginAsn::Down,
            bgp_time_last_ts: 0,
            uc_delta_ts: 0,
            uc_origin_asn: OriginAsn::Down,
            announcements: 0,
            withdrawals: 0,
            active: false,
            user: None,
        }
    }
}

type PfxPeerMap<W> = HashMap<PeerId, PfxPeerRecord<W>>;

/// The two-level view: peer ID → peer record, (prefix, peer ID) → pfx-peer
/// record, backed by one [`PatriciaTree`] per address family whose node
/// payload is the map of peers reachable for that prefix.
pub struct View<V = (), U = (), W = ()> {
    time: u32,
    peers: HashMap<PeerId, PeerRecord<U>>,
    trie_v4: PatriciaTree<PfxPeerMap<W>>,
    trie_v6: PatriciaTree<PfxPeerMap<W>>,
    pub user: Option<V>,
}

impl<V, U, W> Default for View<V, U, W> {
    fn default() -> Self {
        View {
            time: 0,
            peers: HashMap::new(),
            trie_v4: PatriciaTree::new(),
            trie_v6: PatriciaTree::new(),
            user: None,
        }
    }
}

impl<V, U, W> View<V, U, W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_time(&mut self, t: u32) {
        self.time = t;
    }

    pub fn get_time(&self) -> u32 {
        self.time
    }

    fn trie(&self, family: Family) -> &PatriciaTree<PfxPeerMap<W>> {
        match family {
            Family::V4 => &self.trie_v4,
            Family::V6 => &self.trie_v6,
        }
    }

    fn trie_mut(&mut self, family: Family) -> &mut PatriciaTree<PfxPeerMap<W>> {
        match family {
            Family::V4 => &mut self.trie_v4,
            Family::V6 => &mut self.trie_v6,
        }
    }

    /// Ensures a peer record exists for `peer_id`, creating it idempotently
    /// (spec §4.2: `add_peer(...) → peer_id (idempotent)`; the actual ID
    /// allocation is the interning collaborator's job, see [`crate::collab::PeerSigMap`]).
    pub fn ensure_peer(
        &mut self,
        peer_id: PeerId,
        collector: &str,
        peer_ip: IpAddr,
        peer_asn: Asn,
    ) -> &mut PeerRecord<U> {
        self.peers
            .entry(peer_id)
            .or_insert_with(|| PeerRecord::new(collector.to_string(), peer_ip, peer_asn))
    }

    pub fn peer(&self, peer_id: PeerId) -> Option<&PeerRecord<U>> {
        self.peers.get(&peer_id)
    }

    pub fn peer_mut(&mut self, peer_id: PeerId) -> Option<&mut PeerRecord<U>> {
        self.peers.get_mut(&peer_id)
    }

    pub fn activate_peer(&mut self, peer_id: PeerId) {
        if let Some(p) = self.peers.get_mut(&peer_id) {
            p.active = true;
        }
    }

    pub fn deactivate_peer(&mut self, peer_id: PeerId) {
        if let Some(p) = self.peers.get_mut(&peer_id) {
            p.active = false;
        }
    }

    pub fn peers(&self, filter: StateFilter) -> impl Iterator<Item = (&PeerId, &PeerRecord<U>)> {
        self.peers.iter().filter(move |(_, p)| filter.matches(p.active))
    }

    pub fn peer_ids(&self) -> impl Iterator<Item = &PeerId> {
        self.peers.keys()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Ensures a (prefix, peer) cell exists, inactive, with zeroed counters
    /// if newly created (spec §3 Lifecycle).
    pub fn ensure_pfx_peer(&mut self, prefix: Prefix, peer_id: PeerId) -> &mut PfxPeerRecord<W> {
        let family = prefix.family();
        let node_id = self.trie_mut(family).insert(prefix);
        if self.trie(family).node_user(node_id).is_none() {
            self.trie_mut(family).set_user(node_id, Some(HashMap::new()));
        }
        if let Some(peer) = self.peers.get_mut(&peer_id) {
            peer.prefixes.insert((family, prefix));
        }
        self.trie_mut(family)
            .node_user_mut(node_id)
            .unwrap()
            .entry(peer_id)
            .or_default()
    }

    pub fn pfx_peer(&self, prefix: &Prefix, peer_id: PeerId) -> Option<&PfxPeerRecord<W>> {
        let node_id = self.trie(prefix.family()).search_exact(prefix)?;
        self.trie(prefix.family())
            .node_user(node_id)
            .and_then(|m| m.get(&peer_id))
    }

    pub fn pfx_peer_mut(
        &mut self,
        prefix: &Prefix,
        peer_id: PeerId,
    ) -> Option<&mut PfxPeerRecord<W>> {
        let family = prefix.family();
        let node_id = self.trie(family).search_exact(prefix)?;
        self.trie_mut(family).node_user_mut(node_id)?.get_mut(&peer_id)
    }

    pub fn set_pfx_peer_active(&mut self, prefix: &Prefix, peer_id: PeerId, active: bool) {
        if let Some(cell) = self.pfx_peer_mut(prefix, peer_id) {
            cell.active = active;
        }
    }

    /// Node identifier for a prefix's trie entry, if any; exposed so the
    /// engine can reuse trie overlap/enumeration queries without re-deriving
    /// the family split.
    pub fn trie_node(&self, prefix: &Prefix) -> Option<NodeId> {
        self.trie(prefix.family()).search_exact(prefix)
    }

    /// All (prefix, pfx-peer) cells belonging to `peer_id` matching `filter`.
    pub fn pfx_peers_for_peer(
        &self,
        peer_id: PeerId,
        filter: StateFilter,
    ) -> Vec<(Family, Prefix)> {
        let Some(peer) = self.peers.get(&peer_id) else {
            return Vec::new();
        };
        peer.prefixes
            .iter()
            .filter(|(_, pfx)| {
                self.pfx_peer(pfx, peer_id)
                    .map(|cell| filter.matches(cell.active))
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Count of a peer's active/inactive pfx-peer cells for one family.
    pub fn peer_pfx_cnt(&self, peer_id: PeerId, family: Family, filter: StateFilter) -> usize {
        let Some(peer) = self.peers.get(&peer_id) else {
            return 0;
        };
        peer.prefixes
            .iter()
            .filter(|(f, _)| *f == family)
            .filter(|(_, pfx)| {
                self.pfx_peer(pfx, peer_id)
                    .map(|cell| filter.matches(cell.active))
                    .unwrap_or(false)
            })
            .count()
    }

    pub fn reset_interval_counters(&mut self) {
        for peer in self.peers.values_mut() {
            peer.interval = IntervalStats::default();
        }
    }

    pub fn clear(&mut self) {
        self.peers.clear();
        self.trie_v4.clear();
        self.trie_v6.clear();
        self.user = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::num::NonZeroU32;

    fn pid(n: u32) -> PeerId {
        PeerId(NonZeroU32::new(n).unwrap())
    }

    #[test]
    fn test_ensure_peer_idempotent() {
        let mut view: View = View::new();
        let ip = IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4));
        view.ensure_peer(pid(1), "rrc00", ip, Asn::new(100));
        view.ensure_peer(pid(1), "rrc00", ip, Asn::new(100));
        assert_eq!(view.peer_count(), 1);
    }

    #[test]
    fn test_ensure_pfx_peer_starts_inactive() {
        let mut view: View = View::new();
        let prefix: Prefix = "10.0.0.0/24".parse().unwrap();
        let cell = view.ensure_pfx_peer(prefix, pid(1));
        assert!(!cell.active);
        assert_eq!(cell.origin_asn, OriginAsn::Down);
    }

    #[test]
    fn test_state_filter_matches() {
        assert!(StateFilter::ACTIVE.matches(true));
        assert!(!StateFilter::ACTIVE.matches(false));
        assert!(StateFilter::ALL_VALID.matches(true));
        assert!(StateFilter::ALL_VALID.matches(false));
    }

    #[test]
    fn test_peer_pfx_cnt() {
        let mut view: View = View::new();
        let ip = IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4));
        view.ensure_peer(pid(1), "rrc00", ip, Asn::new(100));
        let p1: Prefix = "10.0.0.0/24".parse().unwrap();
        let p2: Prefix = "10.0.1.0/24".parse().unwrap();
        view.ensure_pfx_peer(p1, pid(1)).active = true;
        view.ensure_pfx_peer(p2, pid(1)).active = false;
        assert_eq!(view.peer_pfx_cnt(pid(1), Family::V4, StateFilter::ACTIVE), 1);
        assert_eq!(
            view.peer_pfx_cnt(pid(1), Family::V4, StateFilter::ALL_VALID),
            2
        );
    }
}
