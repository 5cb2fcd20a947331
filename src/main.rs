//! Spot signal simulator.
//!
//! Replays channel messages against an in-process paper venue. Each announced
//! price becomes the paper quote before the signal is handled, so fills land
//! at the price the message reports. Ledger and audit files are real.
//!
//! Usage: `spot-sim [SCRIPT | -]`. A script holds messages separated by `---` lines;
//! `-` reads it from stdin.

use anyhow::{anyhow, Context};
use rust_decimal_macros::dec;
use spot_executor::*;
use std::sync::mpsc;
use std::thread;

const DEMO_SCRIPT: [&str; 7] = [
    "\u{1F680} BTC/USDT LONG on BINANCE\n\u{2705} BUYING COMPLETED\n\u{1F4C8} AVERAGE PRICE: 64000 USDT",
    "\u{1F680} ETH/USDT LONG on BINANCE\n\u{2705} BUYING COMPLETED\n\u{1F4C8} AVERAGE PRICE: 3100,50 USDT",
    "good morning everyone",
    "\u{1F680} DOGE/USDT LONG on BINANCE\n\u{2705} BUYING COMPLETED\n\u{1F4C8} AVERAGE PRICE: 0.12 USDT",
    "\u{274C} BTC/USDT on BINANCE\n\u{1F191} POSITION CLOSED\n\u{1F4C9} AVERAGE PRICE: 65250 USDT",
    "\u{274C} ETH/USDT on BINANCE\n\u{1F191} POSITION CLOSED\n\u{1F4C9} AVERAGE PRICE: 3050 USDT",
    "\u{274C} XRP/USDT on BINANCE\n\u{1F191} POSITION CLOSED\n\u{1F4C9} AVERAGE PRICE: 0.61 USDT",
];

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ExecutorConfig::from_env().context("loading configuration")?;
    let messages = match std::env::args().nth(1) {
        Some(path) => load_script(&path)?,
        None => DEMO_SCRIPT.iter().map(|m| m.to_string()).collect(),
    };

    println!("Spot Signal Simulator");
    println!("  symbols: {}", config.spot_symbols.join(", "));
    println!("  trade amount: {} {}", config.trade_amount, config.quote_coin);
    println!("  ledger: {}", config.positions_json.display());
    println!("  audit: {}\n", config.trades_csv.display());

    let quote_coin = config.quote_coin.clone();
    let venue = PaperVenue::new(&quote_coin).with_balance(&quote_coin, dec!(1500));
    let mut executor = Executor::open(config, venue).context("opening ledger and audit files")?;

    // the executor lives on one thread; everything else talks to it through the channel
    let (tx, rx) = mpsc::channel::<String>();
    let worker = thread::spawn(move || {
        let mut outcomes = Vec::new();
        for text in rx {
            let outcome = match parse_signal(&text) {
                Some(signal) => {
                    if let Some(price) = signal.price {
                        executor
                            .venue_mut()
                            .set_quote(&signal.symbol, PaperQuote::flat(price));
                    }
                    executor.handle_signal(&signal)
                }
                None => SignalOutcome::Ignored,
            };
            outcomes.push((text, outcome));
        }
        (executor, outcomes)
    });

    for message in messages {
        tx.send(message).context("executor thread stopped early")?;
    }
    drop(tx);

    let (executor, outcomes) = worker
        .join()
        .map_err(|_| anyhow!("executor thread panicked"))?;

    for (i, (text, outcome)) in outcomes.iter().enumerate() {
        let headline = text.lines().next().unwrap_or_default();
        println!("  [{}] {:<40} {}", i + 1, headline, describe(outcome));
    }

    let snapshot = executor.ledger().snapshot().context("reading ledger")?;
    println!("\nLedger");
    for symbol in snapshot.symbols() {
        if let Some(instrument) = snapshot.get(symbol) {
            println!(
                "  {symbol}: long {} short {} realized {}",
                instrument.long_qty(),
                instrument.short_qty(),
                instrument.realized_pnl_total
            );
        }
    }
    println!(
        "\n  paper {} balance: {}",
        quote_coin,
        executor.venue().balance(&quote_coin)
    );

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn load_script(path: &str) -> anyhow::Result<Vec<String>> {
    let text = if path == "-" {
        std::io::read_to_string(std::io::stdin()).context("reading script from stdin")?
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading script {path}"))?
    };
    let mut messages = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        if line.trim() == "---" {
            messages.push(std::mem::take(&mut current));
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    messages.push(current);
    Ok(messages.into_iter().filter(|m| !m.trim().is_empty()).collect())
}

fn describe(outcome: &SignalOutcome) -> String {
    match outcome {
        SignalOutcome::Ignored => "ignored".to_string(),
        SignalOutcome::Applied {
            fills,
            realized_total,
        } => format!("{fills} fill(s), realized total {realized_total}"),
        SignalOutcome::Skipped(note) => format!("skipped: {note}"),
        SignalOutcome::Failed(note) => format!("failed: {note}"),
    }
}
