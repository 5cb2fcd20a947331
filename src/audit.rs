// 7.0: audit trail. one csv row per applied fill, one sentinel row per no-op.
// rows are append-only; the header is written once when the file is created.

use crate::types::{Fill, Side};
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::PathBuf;

pub const HEADER: [&str; 10] = [
    "timestamp",
    "symbol",
    "side",
    "order_id",
    "exec_price",
    "exec_qty",
    "fee",
    "fee_currency",
    "realized_pnl",
    "notes",
];

// free-text outcome column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Note {
    Ok,
    ClosedBySignal,
    NoBalance,
    NothingToClose,
    NoFillsNoPrice,
    ZeroQtyAfterRounding,
    CloseError(String),
    PlaceOrderError(String),
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Note::Ok => f.write_str("ok"),
            Note::ClosedBySignal => f.write_str("closed_by_signal"),
            Note::NoBalance => f.write_str("no_balance"),
            Note::NothingToClose => f.write_str("nothing_to_close"),
            Note::NoFillsNoPrice => f.write_str("no_fills_no_price"),
            Note::ZeroQtyAfterRounding => f.write_str("zero_qty_after_rounding"),
            Note::CloseError(detail) => write!(f, "close_error: {detail}"),
            Note::PlaceOrderError(detail) => write!(f, "place_order_error: {detail}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    pub order_id: Option<String>,
    pub exec_price: Option<Decimal>,
    pub exec_qty: Option<Decimal>,
    pub fee: Option<Decimal>,
    pub fee_currency: Option<String>,
    pub realized_pnl: Option<Decimal>,
    pub notes: Note,
}

impl TradeRecord {
    pub fn fill(
        timestamp: DateTime<Utc>,
        symbol: &str,
        side: Side,
        fill: &Fill,
        fee_currency: &str,
        realized_pnl: Decimal,
        notes: Note,
    ) -> Self {
        Self {
            timestamp,
            symbol: symbol.to_string(),
            side,
            order_id: fill.order_id.clone(),
            exec_price: Some(fill.price),
            exec_qty: Some(fill.qty),
            fee: Some(fill.fee),
            fee_currency: Some(
                fill.fee_currency
                    .clone()
                    .unwrap_or_else(|| fee_currency.to_string()),
            ),
            realized_pnl: Some(realized_pnl),
            notes,
        }
    }

    // the venue executed this fill but the ledger could not take it
    pub fn unrecorded_fill(
        timestamp: DateTime<Utc>,
        symbol: &str,
        side: Side,
        fill: &Fill,
        fee_currency: &str,
        notes: Note,
    ) -> Self {
        Self {
            realized_pnl: None,
            ..Self::fill(timestamp, symbol, side, fill, fee_currency, Decimal::ZERO, notes)
        }
    }

    // no execution happened; only the identifying columns are filled
    pub fn sentinel(
        timestamp: DateTime<Utc>,
        symbol: &str,
        side: Side,
        order_id: Option<String>,
        notes: Note,
    ) -> Self {
        Self {
            timestamp,
            symbol: symbol.to_string(),
            side,
            order_id,
            exec_price: None,
            exec_qty: None,
            fee: None,
            fee_currency: None,
            realized_pnl: None,
            notes,
        }
    }

    pub fn to_row(&self) -> [String; 10] {
        let opt = |v: &Option<Decimal>| v.map(|d| d.to_string()).unwrap_or_default();
        [
            self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, false),
            self.symbol.clone(),
            self.side.as_str().to_string(),
            self.order_id.clone().unwrap_or_default(),
            opt(&self.exec_price),
            opt(&self.exec_qty),
            opt(&self.fee),
            self.fee_currency.clone().unwrap_or_default(),
            opt(&self.realized_pnl),
            self.notes.to_string(),
        ]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit log {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("audit log {path:?}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
}

/// Accepts finished trade records.
pub trait AuditSink {
    fn record(&mut self, record: &TradeRecord) -> Result<(), AuditError>;
}

// in-memory sink, handy for tests and dry runs
impl AuditSink for Vec<TradeRecord> {
    fn record(&mut self, record: &TradeRecord) -> Result<(), AuditError> {
        self.push(record.clone());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CsvAuditLog {
    path: PathBuf,
}

impl CsvAuditLog {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let path = path.into();
        if !path.exists() {
            let file = File::create(&path).map_err(|source| AuditError::Io {
                path: path.clone(),
                source,
            })?;
            let mut writer = csv::Writer::from_writer(file);
            writer
                .write_record(HEADER)
                .and_then(|_| writer.flush().map_err(csv::Error::from))
                .map_err(|source| AuditError::Csv {
                    path: path.clone(),
                    source,
                })?;
        }
        Ok(Self { path })
    }
}

impl AuditSink for CsvAuditLog {
    fn record(&mut self, record: &TradeRecord) -> Result<(), AuditError> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|source| AuditError::Io {
                path: self.path.clone(),
                source,
            })?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer
            .write_record(record.to_row())
            .and_then(|_| writer.flush().map_err(csv::Error::from))
            .map_err(|source| AuditError::Csv {
                path: self.path.clone(),
                source,
            })
    }
}
