/*!
`bgpkit-routingtables` reconstructs per-collector BGP routing tables from an
interleaved stream of RIB dumps and live update/peer-state records.

Feed it [`models::Record`]s, one at a time and in non-decreasing
`record_time` order per collector, through an [`engine::Engine`]. The engine
keeps a [`view::View`] — the two-level peer / (prefix, peer) index backed by
a [`trie::PatriciaTree`] per address family — in sync with the stream: RIB
dumps are assembled under construction and only promoted into the reference
view once fully received, live updates are applied immediately and can
outrun a RIB dump still in flight, and disconnected or corrupted peers are
rolled back without discarding the rest of the view.

# Example

```no_run
use bgpkit_routingtables::config::Config;
use bgpkit_routingtables::engine::Engine;
use bgpkit_routingtables::engine::metrics::NullMetricsSink;
use bgpkit_routingtables::models::{DumpPos, DumpType, Element, Record, RecordStatus};
use bgpkit_routingtables::models::{Asn, Prefix};

let mut engine: Engine = Engine::new(Config::default());
let mut sink = NullMetricsSink;

let prefix: Prefix = "192.0.2.0/24".parse().unwrap();
let elem = Element::rib_entry(
    "10.0.0.1".parse().unwrap(),
    Asn::new(64500),
    prefix,
    Default::default(),
);
let rib_start = Record::new("routeviews", "route-views2", DumpType::Rib, DumpPos::Start, 0, 0, RecordStatus::Valid, vec![elem]);
let rib_end = Record::new("routeviews", "route-views2", DumpType::Rib, DumpPos::End, 0, 0, RecordStatus::Valid, vec![]);

engine.interval_start(0);
engine.process_record(&rib_start);
engine.process_record(&rib_end);
engine.interval_end::<bgpkit_routingtables::collab::NullPublisher, _>(0, None, &mut sink);
```

# Modules

- [`models`]: the already-parsed BGP vocabulary the engine consumes (prefixes, AS paths, records).
- [`trie`]: the generic Patricia trie prefixes are indexed by.
- [`view`]: the peer / (prefix, peer) index sitting on top of the trie.
- [`engine`]: the reconstruction engine and its metrics surface.
- [`collab`]: the interning and publishing collaborator seams the engine is generic over.
- [`config`]: engine-wide configuration.
- [`error`]: the crate's error taxonomy.

# Command Line Tool

Behind the `cli` feature, `bgpkit-routingtables` is bundled with a small
binary that replays a newline-delimited JSON stream of [`models::Record`]s
through an [`engine::Engine`] and prints periodic metrics. Run
`bgpkit-routingtables --help` for the full option list.
*/

#![doc(
    html_logo_url = "https://raw.githubusercontent.com/bgpkit/assets/main/logos/icon-transparent.png",
    html_favicon_url = "https://raw.githubusercontent.com/bgpkit/assets/main/logos/favicon.ico"
)]

pub mod collab;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod trie;
pub mod view;

pub use engine::Engine;
pub use error::RoutingTablesError;
pub use view::View;
