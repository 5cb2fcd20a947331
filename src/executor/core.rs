// 10.0.1: executor struct, entry points and fill application.

use super::results::{ExecError, SignalOutcome};
use crate::audit::{AuditSink, CsvAuditLog, Note, TradeRecord};
use crate::config::ExecutorConfig;
use crate::resolver::{FillSource, Resolution};
use crate::signal::{parse_signal, Signal};
use crate::store::Ledger;
use crate::types::{OrderIntent, Side};
use crate::venue::Venue;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

pub struct Executor<V: Venue, A: AuditSink> {
    pub(super) config: ExecutorConfig,
    pub(super) venue: V,
    pub(super) ledger: Ledger,
    pub(super) audit: A,
}

impl<V: Venue> Executor<V, CsvAuditLog> {
    /// Opens the ledger and audit files named in the config.
    pub fn open(config: ExecutorConfig, venue: V) -> Result<Self, ExecError> {
        let audit = CsvAuditLog::open(&config.trades_csv)?;
        Ok(Self::new(config, venue, audit))
    }
}

impl<V: Venue, A: AuditSink> Executor<V, A> {
    pub fn new(config: ExecutorConfig, venue: V, audit: A) -> Self {
        let ledger = Ledger::open(&config.positions_json, config.fee_policy);
        Self {
            config,
            venue,
            ledger,
            audit,
        }
    }

    pub fn venue(&self) -> &V {
        &self.venue
    }

    pub fn venue_mut(&mut self) -> &mut V {
        &mut self.venue
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn audit(&self) -> &A {
        &self.audit
    }

    /// Parses a channel message and handles it if it is a signal.
    pub fn handle_message(&mut self, text: &str) -> SignalOutcome {
        match parse_signal(text) {
            Some(signal) => self.handle_signal(&signal),
            None => {
                debug!("message is not a signal");
                SignalOutcome::Ignored
            }
        }
    }

    // 10.1: never panics, never returns an error. failures become audit rows.
    pub fn handle_signal(&mut self, signal: &Signal) -> SignalOutcome {
        if !self.config.is_tradable(&signal.symbol) {
            warn!(symbol = %signal.symbol, "symbol not in tradable list, ignoring signal");
            return SignalOutcome::Ignored;
        }

        let result = match signal.side {
            Side::Buy => self.open_long(signal),
            Side::Sell => self.close_long(signal),
        };

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                let note = error_note(signal.side, &e);
                error!(symbol = %signal.symbol, side = %signal.side, error = %e, "signal handling failed");
                let record = TradeRecord::sentinel(Utc::now(), &signal.symbol, signal.side, None, note.clone());
                if let Err(audit_err) = self.audit.record(&record) {
                    error!(symbol = %signal.symbol, error = %audit_err, "could not write error row");
                }
                SignalOutcome::Failed(note)
            }
        }
    }

    // 10.3: applies resolved fills in order. each fill gets its own ledger cycle and row.
    pub(super) fn apply_resolution(
        &mut self,
        intent: &OrderIntent,
        resolution: Resolution,
        note: Note,
    ) -> Result<SignalOutcome, ExecError> {
        let (fills, source, order_id) = match resolution {
            Resolution::Fills {
                fills,
                source,
                order_id,
            } => (fills, source, order_id),
            Resolution::Unresolved { order_id } => {
                warn!(symbol = %intent.symbol, order_id = ?order_id, "no fills and no price, ledger untouched");
                return self.skip(&intent.symbol, intent.side, order_id, Note::NoFillsNoPrice);
            }
        };

        if source == FillSource::Derived {
            info!(symbol = %intent.symbol, "no execution detail in reply, using derived fill");
        }

        let mut applied = 0;
        let mut realized_total = Decimal::ZERO;
        let mut failed = None;
        for fill in &fills {
            if !fill.is_executable() {
                let id = fill.order_id.clone().or_else(|| order_id.clone());
                warn!(symbol = %intent.symbol, price = %fill.price, "fill qty is zero, not applied");
                self.write(TradeRecord::sentinel(Utc::now(), &intent.symbol, intent.side, id, Note::ZeroQtyAfterRounding))?;
                continue;
            }

            // the order already executed: a ledger failure still leaves a row with the fill
            let application = match self.ledger.apply_fill(&intent.symbol, intent.side, fill) {
                Ok(application) => application,
                Err(e) => {
                    let e = ExecError::from(e);
                    error!(symbol = %intent.symbol, price = %fill.price, qty = %fill.qty, error = %e, "executed fill not in ledger");
                    let note = error_note(intent.side, &e);
                    self.write(TradeRecord::unrecorded_fill(
                        Utc::now(),
                        &intent.symbol,
                        intent.side,
                        fill,
                        &self.config.quote_coin,
                        note.clone(),
                    ))?;
                    failed.get_or_insert(note);
                    continue;
                }
            };
            self.write(TradeRecord::fill(
                Utc::now(),
                &intent.symbol,
                intent.side,
                fill,
                &self.config.quote_coin,
                application.realized_total,
                note.clone(),
            ))?;

            info!(
                symbol = %intent.symbol,
                side = %intent.side,
                price = %fill.price,
                qty = %fill.qty,
                realized = %application.realized_delta,
                realized_total = %application.realized_total,
                "fill recorded"
            );
            applied += 1;
            realized_total = application.realized_total;
        }

        if let Some(note) = failed {
            return Ok(SignalOutcome::Failed(note));
        }
        if applied == 0 {
            return Ok(SignalOutcome::Skipped(Note::ZeroQtyAfterRounding));
        }
        Ok(SignalOutcome::Applied {
            fills: applied,
            realized_total,
        })
    }

    // sentinel row plus the matching outcome
    pub(super) fn skip(
        &mut self,
        symbol: &str,
        side: Side,
        order_id: Option<String>,
        note: Note,
    ) -> Result<SignalOutcome, ExecError> {
        self.write(TradeRecord::sentinel(Utc::now(), symbol, side, order_id, note.clone()))?;
        Ok(SignalOutcome::Skipped(note))
    }

    fn write(&mut self, record: TradeRecord) -> Result<(), ExecError> {
        self.audit.record(&record)?;
        Ok(())
    }
}

fn error_note(side: Side, e: &ExecError) -> Note {
    match side {
        Side::Buy => Note::PlaceOrderError(e.to_string()),
        Side::Sell => Note::CloseError(e.to_string()),
    }
}
