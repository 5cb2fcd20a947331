// spot-executor: executes spot trade signals and keeps a FIFO realized-PnL ledger.
// every quantity, price and pnl is a Decimal. venue replies are untyped json trees.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Side, OrderIntent, OrderSizing, Fill, lenient decimals
//   2.x  precision.rs: round-down to per-symbol fractional digits
//   3.x  ledger.rs: FIFO lots, realized pnl, fee policy
//   4.x  store.rs: ledger json file, atomic save, single-writer Ledger handle
//   5.x  resolver.rs: fills out of arbitrary replies, quote fallback, order ids
//   6.x  venue.rs: Venue/QuoteSource traits, paper venue (mocked)
//   6.2  balance.rs: wallet balance extraction
//   7.x  audit.rs: trade csv rows and sinks
//   8.x  signal.rs: channel message parser
//   9.x  config.rs: executor settings from env
//   10.x executor/: buy flow, close flow, fill application

// core bookkeeping
pub mod ledger;
pub mod precision;
pub mod store;
pub mod types;

// venue integration
pub mod balance;
pub mod resolver;
pub mod venue;

// signal handling
pub mod audit;
pub mod config;
pub mod executor;
pub mod signal;

pub use audit::{AuditError, AuditSink, CsvAuditLog, Note, TradeRecord};
pub use config::{ConfigError, ExecutorConfig};
pub use executor::{ExecError, Executor, SignalOutcome};
pub use ledger::{FeePolicy, FillApplication, InstrumentLedger, LedgerError, LedgerStore, Lot};
pub use precision::{round_down, PrecisionTable};
pub use resolver::{FillResolver, FillSource, Resolution};
pub use signal::{parse_signal, Signal};
pub use store::{Ledger, LedgerFile, StoreError};
pub use types::{Fill, OrderIntent, OrderSizing, Side};
pub use venue::{PaperQuote, PaperVenue, QuoteSource, ReplyStyle, Venue, VenueError};
