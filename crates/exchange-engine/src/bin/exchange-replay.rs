//! Rebuild engine state from a journal and print what it contains.
//!
//! ```text
//! exchange-replay --journal data/events.journal --dump-assets --dump-book
//! exchange-replay --journal data/events.journal --expect-digest <hex>
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use exchange_engine::{TradingEngine, telemetry};
use exchange_sequencer::JournalEventStore;
use exchange_types::{EngineConfig, ExchangeError, Result};

#[derive(Parser)]
#[command(name = "exchange-replay")]
#[command(about = "Replay an exchange event journal and report the resulting state")]
struct Cli {
    /// JSON config file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Journal to replay; overrides `sequencer.journal_path` from the config.
    #[arg(short, long)]
    journal: Option<PathBuf>,
    /// Fail unless the final state digest equals this value.
    #[arg(long)]
    expect_digest: Option<String>,
    /// Print every non-zero balance.
    #[arg(long)]
    dump_assets: bool,
    /// Print the price ladder.
    #[arg(long)]
    dump_book: bool,
    /// Log filter used when RUST_LOG is unset.
    #[arg(long)]
    log_level: Option<String>,
    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let log_level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    telemetry::init(log_level, cli.json_logs || config.log_json)?;

    let journal = cli
        .journal
        .or_else(|| config.sequencer.journal_path.as_ref().map(PathBuf::from))
        .ok_or_else(|| {
            ExchangeError::Configuration("no journal given and sequencer.journal_path unset".into())
        })?;
    let store = JournalEventStore::open(&journal)?;

    let mut engine = TradingEngine::new(&config);
    let applied = engine.replay_store(&store)?;
    let digest = engine.state_digest();

    println!("journal:     {}", journal.display());
    println!("market:      {}", config.market.symbol());
    println!("events:      {applied}");
    println!("sequence id: {}", engine.sequence_id());
    println!("digest:      {digest}");
    if cli.dump_book {
        println!();
        print!("{}", engine.match_engine());
    }
    if cli.dump_assets {
        println!();
        print!("{}", engine.assets().dump());
    }

    if let Some(expected) = cli.expect_digest {
        if !expected.eq_ignore_ascii_case(&digest) {
            return Err(ExchangeError::DeterminismViolation {
                expected,
                actual: digest,
            });
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("exchange-replay: {err}");
            ExitCode::FAILURE
        }
    }
}
