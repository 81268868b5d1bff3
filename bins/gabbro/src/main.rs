//! gabbro: shared-memory KV request server.
//!
//! Creates the shared ring file, then runs worker threads that drain
//! requests and write replies back into the region. Clients map the same
//! file via `gabbro-icc` and submit GET/PUT descriptors.
//!
//! Usage: `gabbro -n <thread_count> -s <table_size> [-c <config.toml>]`

use gabbro_config::GabbroConfig;
use gabbro_engine::KvEngine;
use gabbro_icc::{Descriptor, RequestChannel, RingConfig};
use gabbro_store::KvStore;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

struct CliArgs {
    threads: usize,
    table_size: usize,
    config_path: Option<String>,
}

fn usage_and_exit() -> ! {
    eprintln!("usage: gabbro -n <thread_count> -s <table_size> [-c <config.toml>]");
    process::exit(1);
}

/// Parses `-n`/`-s`/`-c`. Missing, unparsable, or non-positive values are
/// fatal: the process exits non-zero with a usage message.
fn parse_args() -> CliArgs {
    let mut threads: Option<usize> = None;
    let mut table_size: Option<usize> = None;
    let mut config_path: Option<String> = None;

    let mut args = std::env::args().skip(1);
    while let Some(flag) = args.next() {
        let Some(value) = args.next() else {
            usage_and_exit();
        };
        match flag.as_str() {
            "-n" => threads = value.parse().ok(),
            "-s" => table_size = value.parse().ok(),
            "-c" => config_path = Some(value),
            _ => usage_and_exit(),
        }
    }

    match (threads, table_size) {
        (Some(threads), Some(table_size)) if threads > 0 && table_size > 0 => CliArgs {
            threads,
            table_size,
            config_path,
        },
        _ => usage_and_exit(),
    }
}

fn main() {
    let args = parse_args();

    let config = match &args.config_path {
        Some(path) => match GabbroConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("gabbro: {e}");
                process::exit(1);
            }
        },
        None => GabbroConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let reply_bytes = config.reply_slots * std::mem::size_of::<Descriptor>();
    let channel = match RequestChannel::create(
        &config.shm_file_path,
        RingConfig::new(config.ring_capacity),
        reply_bytes,
    ) {
        Ok(channel) => Arc::new(channel),
        Err(e) => {
            tracing::error!(error = %e, path = %config.shm_file_path, "failed to create shared ring");
            process::exit(1);
        }
    };

    tracing::info!(
        path = %config.shm_file_path,
        capacity = config.ring_capacity,
        region_bytes = channel.region_len(),
        workers = args.threads,
        table_size = args.table_size,
        "gabbro serving"
    );

    let store = Arc::new(KvStore::new(args.table_size));
    let engine = Arc::new(KvEngine::new(channel, store));

    for handle in engine.spawn_workers(args.threads) {
        // Workers serve forever; a join returning means one panicked.
        if handle.join().is_err() {
            tracing::error!("worker thread panicked");
            process::exit(1);
        }
    }
}
