///
/// strand-stress - Contention harness for the strand primitives
///
/// Commands:
/// - strand-stress atomics: interlocked counters under contention
/// - strand-stress mutex: FastMutex-protected counter
/// - strand-stress rwlock / spin-rwlock: readers and writers interleaved
/// - strand-stress events: auto-reset ping-pong
/// - strand-stress all: every workload in sequence
///
/// Exits non-zero when any workload observes a broken invariant.
///

mod workloads;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use strand_threads::{SyncConfig, declare_main_thread};
use workloads::{Report, Workload};

#[derive(Parser)]
#[command(name = "strand-stress")]
#[command(author, version, about = "Stress the strand thread primitives", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Worker threads per workload
    #[arg(long, global = true, default_value_t = 4)]
    threads: usize,

    /// Operations per worker thread
    #[arg(long, global = true, default_value_t = 100_000)]
    iterations: u32,

    /// TOML file with primitive tuning (stack size, spin limits, name length)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interlocked increment, decrement and compare-exchange
    Atomics,

    /// FastMutex guarding a shared counter
    Mutex,

    /// Blocking RWLock with writer preference
    Rwlock,

    /// Busy-wait SpinRWLock
    SpinRwlock,

    /// Auto-reset event ping-pong
    Events,

    /// Run every workload
    All,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        match SyncConfig::load(path) {
            Ok(config) => {
                strand_core::config::install(config);
                info!(path = %path.display(), "loaded config");
            }
            Err(e) => {
                error!("{}", e);
                std::process::exit(2);
            }
        }
    }

    if let Err(e) = declare_main_thread() {
        warn!("{}", e);
    }

    let selected: &[Workload] = match cli.command {
        Commands::Atomics => &[Workload::Atomics],
        Commands::Mutex => &[Workload::Mutex],
        Commands::Rwlock => &[Workload::RwLock],
        Commands::SpinRwlock => &[Workload::SpinRwLock],
        Commands::Events => &[Workload::Events],
        Commands::All => Workload::ALL,
    };

    let threads = cli.threads.max(1);
    let mut failed = 0;
    for workload in selected {
        match workload.run(threads, cli.iterations) {
            Ok(report) => {
                log_report(&report);
                if !report.passed {
                    failed += 1;
                }
            }
            Err(e) => {
                error!(workload = workload.name(), "{}", e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        error!(failed, "stress run failed");
        std::process::exit(1);
    }
}

fn log_report(report: &Report) {
    if report.passed {
        info!(
            workload = report.name,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "{}",
            report.detail
        );
    } else {
        error!(workload = report.name, "{}", report.detail);
    }
}
