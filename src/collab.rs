//! Collaborator interfaces named, but not implemented, by spec §6: the
//! peer-signature registry, and the RPC/broker publisher. Both are traits
//! plus a minimal concrete implementation so the engine is testable
//! end-to-end without a mock in every test; no network implementation ships
//! (out of scope per spec §1).

use crate::error::PublishError;
use crate::models::asn::Asn;
use crate::view::{PeerId, View};
use std::collections::HashMap;
use std::net::IpAddr;
use std::num::NonZeroU32;

/// Interns `(collector, peer-ip, peer-asn)` triples into stable, non-zero
/// [`PeerId`]s (spec §6's peer-signature map collaborator).
pub trait PeerSigMap {
    fn get_or_intern(&mut self, collector: &str, peer_ip: IpAddr, peer_asn: Asn) -> PeerId;
    fn get_signature(&self, peer_id: PeerId) -> Option<(String, IpAddr, Asn)>;
}

/// A simple in-process, bijective interning map. Not synchronized; per
/// Design Notes §9/spec §5, sharing one across engines requires the
/// implementation to provide its own synchronization — this one doesn't, so
/// it's single-engine only.
#[derive(Debug, Default)]
pub struct InternMap {
    forward: HashMap<(String, IpAddr, Asn), PeerId>,
    backward: Vec<(String, IpAddr, Asn)>,
}

impl InternMap {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PeerSigMap for InternMap {
    fn get_or_intern(&mut self, collector: &str, peer_ip: IpAddr, peer_asn: Asn) -> PeerId {
        let key = (collector.to_string(), peer_ip, peer_asn);
        if let Some(id) = self.forward.get(&key) {
            return *id;
        }
        self.backward.push(key.clone());
        let id = PeerId(NonZeroU32::new(self.backward.len() as u32).unwrap());
        self.forward.insert(key, id);
        id
    }

    fn get_signature(&self, peer_id: PeerId) -> Option<(String, IpAddr, Asn)> {
        self.backward.get((peer_id.0.get() - 1) as usize).cloned()
    }
}

/// A read-only snapshot of the view offered to a [`Publisher`] at
/// `interval_end`, restricted to the peers the full-feed filter admits
/// (spec §6 "Publishable view").
pub struct ViewSnapshot<'v, V, U, W> {
    pub view: &'v View<V, U, W>,
    pub admitted_peers: Vec<PeerId>,
    pub time: u32,
}

/// The RPC/broker publisher collaborator (spec §6). Invoked synchronously at
/// `interval_end`; a failure is logged and swallowed by the caller, never
/// propagated into engine state (spec §5/§7).
pub trait Publisher<V, U, W> {
    fn publish(&mut self, snapshot: &ViewSnapshot<V, U, W>) -> Result<(), PublishError>;
}

/// No-op publisher; the engine's default when no broker endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPublisher;

impl<V, U, W> Publisher<V, U, W> for NullPublisher {
    fn publish(&mut self, _snapshot: &ViewSnapshot<V, U, W>) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Test double that records how many peers were admitted at each call,
/// without holding onto the view itself (the view's lifetime doesn't outlive
/// the call).
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    pub calls: Vec<(u32, usize)>,
}

impl<V, U, W> Publisher<V, U, W> for RecordingPublisher {
    fn publish(&mut self, snapshot: &ViewSnapshot<V, U, W>) -> Result<(), PublishError> {
        self.calls.push((snapshot.time, snapshot.admitted_peers.len()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_intern_map_is_idempotent_and_stable() {
        let mut m = InternMap::new();
        let ip = IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4));
        let id1 = m.get_or_intern("rrc00", ip, Asn::new(100));
        let id2 = m.get_or_intern("rrc00", ip, Asn::new(100));
        assert_eq!(id1, id2);
        let id3 = m.get_or_intern("rrc01", ip, Asn::new(100));
        assert_ne!(id1, id3);
        assert_eq!(
            m.get_signature(id1),
            Some(("rrc00".to_string(), ip, Asn::new(100)))
        );
    }
}
