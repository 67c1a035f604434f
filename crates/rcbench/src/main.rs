//! rcbench - synthetic block-cache workload over the radixcache backends

mod workload;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use radixcache::{RcArray, RcHashMap, RcRadixTree};
use tracing::info;

use crate::workload::{sparse_key, Block, Recycler, Workload};

/// Store backing the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Dense array indexed by block number
    Array,
    /// Sharded hash map
    Hash,
    /// Radix tree
    Radix,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend to drive
    #[arg(short, long, value_enum, default_value_t = Backend::Radix)]
    backend: Backend,

    /// LRU ring slots
    #[arg(short, long, default_value_t = 256)]
    ring_size: usize,

    /// Distinct block numbers in the workload
    #[arg(short, long, default_value_t = 4096)]
    keys: u64,

    /// Number of block lookups
    #[arg(short, long, default_value_t = 1_000_000)]
    ops: u64,

    /// Share of lookups that go to the hot tenth of the blocks
    #[arg(long, default_value_t = 0.8)]
    hot_fraction: f64,

    /// Blocks a reader keeps pinned at once
    #[arg(long, default_value_t = 4)]
    pinned: usize,

    /// Shards for the hash backend
    #[arg(long, default_value_t = 16)]
    shards: usize,

    /// RNG seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    anyhow::ensure!(args.keys > 0, "--keys must be at least 1");
    anyhow::ensure!(
        (0.0..=1.0).contains(&args.hot_fraction),
        "--hot-fraction must be between 0 and 1"
    );

    info!("Starting rcbench v{}", env!("CARGO_PKG_VERSION"));
    info!("Backend: {:?}", args.backend);
    info!("Ring size: {}", args.ring_size);
    info!("Blocks: {}, lookups: {}", args.keys, args.ops);

    let workload = Workload {
        keys: args.keys,
        ops: args.ops,
        hot_fraction: args.hot_fraction,
        pinned: args.pinned,
        ring_size: args.ring_size,
        seed: args.seed,
    };
    let recycler = Recycler::default();

    let report = match args.backend {
        Backend::Array => {
            let len = usize::try_from(args.keys)?;
            let store = RcArray::<Block>::new(len, recycler.callback())?;
            workload.run("array", store, |block| block, &recycler)?
        }
        Backend::Hash => {
            let store = RcHashMap::<Block>::new(args.shards, recycler.callback())?;
            workload.run("hash", store, sparse_key, &recycler)?
        }
        Backend::Radix => {
            let store = RcRadixTree::<Block>::new(recycler.callback());
            workload.run("radix", store, sparse_key, &recycler)?
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print();
    }

    Ok(())
}
