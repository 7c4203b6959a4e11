/*!
error module defines the error types used by the routing-table engine.
*/
use std::error::Error;
use std::fmt::{Display, Formatter};

/// The taxonomy of failure modes named in the error-handling design (engine
/// §7): allocation failure, broken invariants, publisher I/O, and input
/// mismatches. Most of §7 resolves to counters rather than `Err`s — see the
/// per-variant notes below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingTablesError {
    /// Reserved: the original's allocation-failure path. Rust's allocator
    /// aborts the process instead of returning an error here, so this
    /// variant is never constructed; it documents the taxonomy completely.
    Alloc,
    /// A programmer-error invariant check that's better surfaced as a
    /// `Result` than a panic (e.g. a caller-supplied peer ID that was never
    /// minted by the interning collaborator).
    ViewInvariant(String),
    /// A publisher (RPC broker) call failed. Logged by the caller and
    /// otherwise non-fatal: it never cancels interval processing or mutates
    /// engine state.
    Publish(String),
    /// Never actually constructed as an `Err` — RIB/live mismatches are
    /// *counters* (`rib_positive_mismatches`/`rib_negative_mismatches`), not
    /// failures. Kept so the enum documents the full taxonomy §7 describes.
    Mismatch(String),
}

impl Display for RoutingTablesError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutingTablesError::Alloc => write!(f, "allocation failure"),
            RoutingTablesError::ViewInvariant(s) => write!(f, "view invariant violated: {s}"),
            RoutingTablesError::Publish(s) => write!(f, "publish failed: {s}"),
            RoutingTablesError::Mismatch(s) => write!(f, "mismatch: {s}"),
        }
    }
}

impl Error for RoutingTablesError {}

/// Error returned by a [`crate::collab::Publisher`] implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishError(pub String);

impl Display for PublishError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for PublishError {}
