use crate::models::asn::{Asn, OriginAsn};
use smallvec::SmallVec;
use std::fmt::{Display, Formatter};

/// One segment of an AS path.
///
/// Mirrors the teacher's `AsPathSegment`, trimmed to what the engine needs:
/// we never re-encode or re-serialize paths, only walk them for the origin
/// and for the route-server/local-origin checks in record dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AsPathSegment {
    Sequence(SmallVec<[Asn; 8]>),
    Set(SmallVec<[Asn; 8]>),
    ConfedSequence(SmallVec<[Asn; 8]>),
    ConfedSet(SmallVec<[Asn; 8]>),
}

impl AsPathSegment {
    fn is_confed(&self) -> bool {
        matches!(
            self,
            AsPathSegment::ConfedSequence(_) | AsPathSegment::ConfedSet(_)
        )
    }

    /// Number of ASN hops this segment contributes to path length, per §4.3.2:
    /// a plain sequence counts every hop, a set counts as one hop, and
    /// confederation segments count as zero (they're intra-confederation).
    fn route_len(&self) -> usize {
        match self {
            AsPathSegment::Sequence(v) => v.len(),
            AsPathSegment::Set(_) => 1,
            AsPathSegment::ConfedSequence(_) | AsPathSegment::ConfedSet(_) => 0,
        }
    }
}

/// A full AS path as a sequence of segments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AsPath {
    segments: Vec<AsPathSegment>,
}

impl AsPath {
    pub fn new(segments: Vec<AsPathSegment>) -> Self {
        AsPath { segments }
    }

    pub fn segments(&self) -> &[AsPathSegment] {
        &self.segments
    }

    /// Path length used for local-origin detection (§4.3.2: "skip if AS-path
    /// length is 0"), summing [`AsPathSegment::route_len`] across non-confed
    /// segments.
    pub fn route_len(&self) -> usize {
        self.segments.iter().map(AsPathSegment::route_len).sum()
    }

    /// The first non-confederation segment, used for the route-server
    /// filter (§4.3.2: "skip if the first path segment is an ASN different
    /// from the advertising peer's ASN").
    pub fn first_hop_asn(&self) -> Option<Asn> {
        self.segments
            .iter()
            .find(|s| !s.is_confed())
            .and_then(|s| match s {
                AsPathSegment::Sequence(v) | AsPathSegment::Set(v) => v.first().copied(),
                _ => None,
            })
    }

    /// Effective origin ASN per §4.3.3: numeric ASN from the last segment's
    /// trailing hop, CONF/SET for a non-sequence trailing segment, LOCAL for
    /// an empty path or a trailing hop equal to the reserved zero ASN.
    pub fn origin(&self) -> OriginAsn {
        match self.segments.last() {
            None => OriginAsn::Local,
            Some(AsPathSegment::Sequence(v)) => match v.last() {
                None => OriginAsn::Local,
                Some(asn) if *asn == Asn::RESERVED => OriginAsn::Local,
                Some(asn) => OriginAsn::Asn(*asn),
            },
            Some(AsPathSegment::Set(_))
            | Some(AsPathSegment::ConfedSequence(_))
            | Some(AsPathSegment::ConfedSet(_)) => OriginAsn::ConfSet,
        }
    }
}

impl Display for AsPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .segments
            .iter()
            .map(|s| match s {
                AsPathSegment::Sequence(v) => {
                    v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(" ")
                }
                AsPathSegment::Set(v) => format!(
                    "{{{}}}",
                    v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(",")
                ),
                AsPathSegment::ConfedSequence(v) => format!(
                    "({})",
                    v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(" ")
                ),
                AsPathSegment::ConfedSet(v) => format!(
                    "[{}]",
                    v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(",")
                ),
            })
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}
