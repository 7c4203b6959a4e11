use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use bgpkit_routingtables::collab::NullPublisher;
use bgpkit_routingtables::config::Config;
use bgpkit_routingtables::engine::metrics::InMemoryMetricsSink;
use bgpkit_routingtables::engine::Engine;
use bgpkit_routingtables::models::Record;
use clap::Parser;

/// bgpkit-routingtables-cli replays a newline-delimited JSON stream of BGP
/// records through the routing-table reconstruction engine and prints
/// periodic metrics.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Opts {
    /// File path to a newline-delimited JSON record stream, or "-" for stdin.
    #[clap(name = "FILE")]
    file_path: PathBuf,

    /// Graphite metric namespace root.
    #[clap(long)]
    metric_prefix: Option<String>,

    /// Full-feed threshold for active IPv4 prefix count.
    #[clap(long)]
    ipv4_fullfeed_threshold: Option<u32>,

    /// Full-feed threshold for active IPv6 prefix count.
    #[clap(long)]
    ipv6_fullfeed_threshold: Option<u32>,

    /// Interval (in bgp record-time seconds) between metric dumps.
    #[clap(short, long, default_value_t = 60)]
    interval: u32,

    /// Output metrics as JSON instead of plain `name value time` lines.
    #[clap(long)]
    json: bool,
}

fn build_config(opts: &Opts) -> Config {
    let mut config = Config::default();
    if let Some(prefix) = &opts.metric_prefix {
        config.metric_prefix = prefix.clone();
    }
    if let Some(th) = opts.ipv4_fullfeed_threshold {
        config.ipv4_fullfeed_th = th;
    }
    if let Some(th) = opts.ipv6_fullfeed_threshold {
        config.ipv6_fullfeed_th = th;
    }
    config
}

fn main() {
    env_logger::init();
    let opts: Opts = Opts::parse();

    let config = build_config(&opts);
    if !config.is_valid() {
        eprintln!("Error: invalid configuration (metric_prefix too long)");
        std::process::exit(1);
    }

    let reader: Box<dyn BufRead> = if opts.file_path.as_os_str() == "-" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        match std::fs::File::open(&opts.file_path) {
            Ok(f) => Box::new(BufReader::new(f)),
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        }
    };

    let mut engine: Engine = Engine::new(config);
    let mut sink = InMemoryMetricsSink::default();
    let mut interval_floor: Option<u32> = None;

    for line in reader.lines() {
        let line = match line {
            Ok(l) if l.trim().is_empty() => continue,
            Ok(l) => l,
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        };

        let record: Record = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("skipping malformed record: {e}");
                continue;
            }
        };

        let floor = interval_floor.get_or_insert(record.record_time);
        if record.record_time >= *floor + opts.interval {
            engine.interval_start(*floor);
            engine.interval_end::<NullPublisher, _>(*floor, None, &mut sink);
            *floor += opts.interval;
        }

        engine.process_record(&record);
    }

    if let Some(floor) = interval_floor {
        engine.interval_start(floor);
        engine.interval_end::<NullPublisher, _>(floor, None, &mut sink);
    }

    for (name, value, time) in &sink.entries {
        if opts.json {
            println!(
                "{}",
                serde_json::json!({"name": name, "value": value, "time": time})
            );
        } else {
            println!("{name} {value} {time}");
        }
    }
}
