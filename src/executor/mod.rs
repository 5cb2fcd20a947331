// 10.0: signal executor. one signal in, at most one order out, every outcome audited.
// owns the only ledger handle, so fills are applied strictly one after another.

mod core;
mod orders;
mod results;

pub use self::core::Executor;
pub use self::results::{ExecError, SignalOutcome};
