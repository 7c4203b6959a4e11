//! Engine-wide configuration (spec §6: "Configuration").

/// Defaults recovered from the original's `ROUTINGTABLES_DEFAULT_*` macros,
/// whose concrete values are not present in `original_source/` (only the
/// macro names are referenced, never `#define`d in the excerpted files).
/// Treated as an Open Question resolved in DESIGN.md rather than guessed at
/// silently: these numbers are a reasonable, documented choice, not a fact
/// recovered from the source.
pub const DEFAULT_METRIC_PREFIX: &str = "routingtables";
pub const DEFAULT_IPV4_FULLFEED_THRESHOLD: u32 = 400_000;
pub const DEFAULT_IPV6_FULLFEED_THRESHOLD: u32 = 10_000;

/// Per-engine configuration (spec §6 and §9 "global mutable collector map" —
/// the metrics prefix is per-engine, not a process-wide singleton).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Graphite metric namespace root, must be graphite-safe and at most 256
    /// bytes (spec §6).
    pub metric_prefix: String,
    /// Full-feed threshold for active IPv4 pfx count (spec §6's
    /// `filter_ff_peers` predicate).
    pub ipv4_fullfeed_th: u32,
    /// Full-feed threshold for active IPv6 pfx count.
    pub ipv6_fullfeed_th: u32,
    /// RPC broker endpoint for the out-of-scope publisher collaborator; the
    /// engine only ever threads this through to `Publisher` implementations,
    /// it never dials it itself.
    pub publisher_uri: Option<String>,
    pub publisher_identity: Option<String>,
}

impl Config {
    /// `metric_prefix` must not exceed 256 bytes (spec §6).
    pub fn is_valid(&self) -> bool {
        self.metric_prefix.len() <= 256
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            metric_prefix: DEFAULT_METRIC_PREFIX.to_string(),
            ipv4_fullfeed_th: DEFAULT_IPV4_FULLFEED_THRESHOLD,
            ipv6_fullfeed_th: DEFAULT_IPV6_FULLFEED_THRESHOLD,
            publisher_uri: None,
            publisher_identity: None,
        }
    }
}
