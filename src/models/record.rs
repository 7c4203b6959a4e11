use crate::models::asn::Asn;
use crate::models::aspath::AsPath;
use crate::models::prefix::Prefix;
use std::net::IpAddr;

/// BGP session FSM state, per RFC 4271 §8 and the Peer Record data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PeerState {
    Unknown,
    Idle,
    Connect,
    Active,
    OpenSent,
    OpenConfirm,
    Established,
}

impl PeerState {
    pub fn is_established(&self) -> bool {
        matches!(self, PeerState::Established)
    }
}

/// The kind of element carried by a record; `Rib` elements appear only
/// inside RIB-dump records and feed the under-construction reconciliation
/// path (§4.3.3), while `Announcement`/`Withdrawal` drive the live path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElemType {
    Rib,
    Announcement,
    Withdrawal,
    PeerState,
}

/// A single parsed BGP fact: one (peer, prefix) observation or one
/// peer-state transition. This is the engine's unit of work — the minimal
/// vocabulary §6 names, not a full wire-level decode.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Element {
    pub elem_type: ElemType,
    pub peer_ip: IpAddr,
    pub peer_asn: Asn,
    pub prefix: Option<Prefix>,
    pub aspath: Option<AsPath>,
    pub new_state: Option<PeerState>,
}

impl Element {
    pub fn announcement(peer_ip: IpAddr, peer_asn: Asn, prefix: Prefix, aspath: AsPath) -> Self {
        Element {
            elem_type: ElemType::Announcement,
            peer_ip,
            peer_asn,
            prefix: Some(prefix),
            aspath: Some(aspath),
            new_state: None,
        }
    }

    pub fn withdrawal(peer_ip: IpAddr, peer_asn: Asn, prefix: Prefix) -> Self {
        Element {
            elem_type: ElemType::Withdrawal,
            peer_ip,
            peer_asn,
            prefix: Some(prefix),
            aspath: None,
            new_state: None,
        }
    }

    pub fn rib_entry(peer_ip: IpAddr, peer_asn: Asn, prefix: Prefix, aspath: AsPath) -> Self {
        Element {
            elem_type: ElemType::Rib,
            peer_ip,
            peer_asn,
            prefix: Some(prefix),
            aspath: Some(aspath),
            new_state: None,
        }
    }

    pub fn peer_state(peer_ip: IpAddr, peer_asn: Asn, new_state: PeerState) -> Self {
        Element {
            elem_type: ElemType::PeerState,
            peer_ip,
            peer_asn,
            prefix: None,
            aspath: None,
            new_state: Some(new_state),
        }
    }
}

/// Whether a record belongs to a RIB-dump or a live update stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DumpType {
    Rib,
    Update,
}

/// Position of a record within a multi-record RIB dump; `Middle` covers any
/// record that is neither the first nor the last of a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DumpPos {
    Start,
    Middle,
    End,
}

/// Source-level record status, decided upstream of the engine (by the
/// broker/data-source layer that is out of scope for this crate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RecordStatus {
    Valid,
    CorruptedSource,
    CorruptedRecord,
    FilteredSource,
    EmptySource,
}

/// A single unit handed to the engine by the (out-of-scope) record source.
///
/// `elements` stands in for the "lazy element iterator" of §6: callers that
/// want streaming behavior can build one incrementally, but nothing in the
/// engine requires laziness, so a plain `Vec` keeps this crate free of
/// custom iterator plumbing.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Record {
    pub project: String,
    pub collector: String,
    pub dump_type: DumpType,
    pub dump_pos: DumpPos,
    pub dump_time: u32,
    pub record_time: u32,
    pub status: RecordStatus,
    pub elements: Vec<Element>,
}

impl Record {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project: impl Into<String>,
        collector: impl Into<String>,
        dump_type: DumpType,
        dump_pos: DumpPos,
        dump_time: u32,
        record_time: u32,
        status: RecordStatus,
        elements: Vec<Element>,
    ) -> Self {
        Record {
            project: project.into(),
            collector: collector.into(),
            dump_type,
            dump_pos,
            dump_time,
            record_time,
            status,
            elements,
        }
    }
}
