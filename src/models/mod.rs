//! Minimal, already-parsed BGP vocabulary the engine consumes.
//!
//! This crate never decodes MRT/BGP/BMP wire formats itself (that is an
//! explicit Non-goal); these types are the seam a decoder sits behind.

pub mod aspath;
pub mod asn;
pub mod prefix;
pub mod record;

pub use aspath::{AsPath, AsPathSegment};
pub use asn::{Asn, OriginAsn};
pub use prefix::{Family, Prefix};
pub use record::{DumpPos, DumpType, Element, ElemType, PeerState, Record, RecordStatus};
