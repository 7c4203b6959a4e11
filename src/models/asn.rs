use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// An Autonomous System Number.
///
/// Equality and ordering only ever compare the numeric value; whether the
/// wire encoding was 2-byte or 4-byte is metadata carried along for
/// serialization purposes and plays no role in routing-table semantics.
#[derive(Clone, Copy, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Asn(u32);

impl Asn {
    pub const RESERVED: Self = Asn(0);

    #[inline]
    pub const fn new(asn: u32) -> Self {
        Asn(asn)
    }

    #[inline]
    pub const fn to_u32(&self) -> u32 {
        self.0
    }
}

impl Ord for Asn {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for Asn {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Asn {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Hash for Asn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl Default for Asn {
    fn default() -> Self {
        Asn::RESERVED
    }
}

impl From<u32> for Asn {
    fn from(v: u32) -> Self {
        Asn(v)
    }
}

impl From<Asn> for u32 {
    fn from(value: Asn) -> Self {
        value.0
    }
}

impl Display for Asn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Debug for Asn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Asn {
    type Err = <u32 as FromStr>::Err;

    fn from_str(mut s: &str) -> Result<Self, Self::Err> {
        if let Some(number) = s.strip_prefix("AS") {
            s = number;
        }
        Ok(Asn(u32::from_str(s)?))
    }
}

/// The effective origin attributed to a (prefix, peer) cell.
///
/// The original C engine represents this as a plain `uint32_t` ASN with three
/// reserved sentinel values above the IANA range (`BGPSTREAM_UTILS_ORIGIN_ASN_LOCAL`
/// and friends). Rust lets us say the same thing as a sum type instead, per
/// the design note about flag-heavy records: a numbered origin, a locally
/// originated route (zero-length AS path), a set/confederation segment that
/// doesn't name a single ASN, or "down" (withdrawn / never reachable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OriginAsn {
    Asn(Asn),
    Local,
    ConfSet,
    Down,
}

impl OriginAsn {
    /// `true` for every variant other than [`OriginAsn::Down`].
    pub fn is_reachable(&self) -> bool {
        !matches!(self, OriginAsn::Down)
    }
}

impl Display for OriginAsn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OriginAsn::Asn(asn) => write!(f, "{asn}"),
            OriginAsn::Local => write!(f, "LOCAL"),
            OriginAsn::ConfSet => write!(f, "CONF/SET"),
            OriginAsn::Down => write!(f, "DOWN"),
        }
    }
}
