// 4.0: durable ledger state. the whole LedgerStore is one json document.
// every mutation is load -> apply -> save of the entire document.
// 4.2 Ledger is the single writer: mutation needs &mut, and exactly one owner exists.

use crate::ledger::{FeePolicy, FillApplication, LedgerError, LedgerStore};
use crate::types::{Fill, Side};
use rust_decimal::Decimal;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// 4.1: decimals persist as strings. reading is lenient: numbers are accepted and
// anything unparseable loads as zero so a damaged file still opens.
pub mod decimal_str {
    use crate::types::decimal_or_zero;
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(decimal_or_zero(&value))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read ledger {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("ledger {path:?} is not valid json: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to encode ledger: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write ledger {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Apply(#[from] LedgerError),
}

#[derive(Debug, Clone)]
pub struct LedgerFile {
    path: PathBuf,
}

impl LedgerFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    // missing or blank file = empty store
    pub fn load(&self) -> Result<LedgerStore, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LedgerStore::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if text.trim().is_empty() {
            return Ok(LedgerStore::new());
        }

        let mut store: LedgerStore =
            serde_json::from_str(&text).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;

        let before = store.clone();
        store.normalize();
        if store != before {
            warn!(path = ?self.path, "ledger contained non-positive lots, dropped on load");
        }
        Ok(store)
    }

    pub fn save(&self, store: &LedgerStore) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(store)?;
        write_atomic(&self.path, &bytes).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

// temp file in the same directory, then rename over the target
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&temp_path, path)
}

/// 4.2: the only handle that mutates the ledger file.
///
/// State is re-read before each fill so external readers (and edits between
/// signals) are picked up, then written back whole. Holding `&mut Ledger` for
/// the whole cycle is what keeps two fills from interleaving their
/// read-modify-write.
#[derive(Debug)]
pub struct Ledger {
    file: LedgerFile,
    fee_policy: FeePolicy,
}

impl Ledger {
    pub fn open(path: impl Into<PathBuf>, fee_policy: FeePolicy) -> Self {
        Self {
            file: LedgerFile::new(path),
            fee_policy,
        }
    }

    pub fn fee_policy(&self) -> FeePolicy {
        self.fee_policy
    }

    // fails the same way the next fill would, without touching the file
    pub fn ensure_readable(&self) -> Result<(), StoreError> {
        self.file.load().map(|_| ())
    }

    // caller guarantees fill.qty > 0
    pub fn apply_fill(
        &mut self,
        symbol: &str,
        side: Side,
        fill: &Fill,
    ) -> Result<FillApplication, StoreError> {
        let mut store = self.file.load()?;
        let applied = store.apply_fill(symbol, side, fill.price, fill.qty, fill.fee, self.fee_policy)?;
        self.file.save(&store)?;

        debug!(
            symbol,
            side = %side,
            price = %fill.price,
            qty = %fill.qty,
            closed = %applied.closed_qty,
            opened = %applied.opened_qty,
            realized_total = %applied.realized_total,
            "fill applied to ledger"
        );
        Ok(applied)
    }

    pub fn snapshot(&self) -> Result<LedgerStore, StoreError> {
        self.file.load()
    }

    pub fn long_qty(&self, symbol: &str) -> Result<Decimal, StoreError> {
        Ok(self
            .snapshot()?
            .get(symbol)
            .map(|l| l.long_qty())
            .unwrap_or(Decimal::ZERO))
    }

    pub fn short_qty(&self, symbol: &str) -> Result<Decimal, StoreError> {
        Ok(self
            .snapshot()?
            .get(symbol)
            .map(|l| l.short_qty())
            .unwrap_or(Decimal::ZERO))
    }

    pub fn realized_pnl(&self, symbol: &str) -> Result<Decimal, StoreError> {
        Ok(self.snapshot()?.realized_pnl(symbol))
    }
}
