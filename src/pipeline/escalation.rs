//! Error escalation with relaxing backoff.
//!
//! Every invocation reports its outcome here exactly once. Failures are
//! recorded in a persisted [`ErrorLedger`]; an error email goes out only when
//! enough days have passed since the previous one, per the
//! [`EscalationSchedule`]. A successful run wipes the ledger so the next
//! failure streak starts from the front of the schedule.
//!
//! ## Ledger file
//!
//! ```text
//! {"error": ["2026-03-01T09:00:00+01:00", ...], "error_sent": [...]}
//! ```
//!
//! `error_sent` is always a time-ordered subsequence of `error`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::fs::{read_or_empty, write_atomic};

/// Day thresholds between consecutive error emails. The N-th send (0-based)
/// needs `schedule[N]` days since the previous send; past the end the last
/// entry repeats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationSchedule(Vec<u32>);

impl EscalationSchedule {
    pub fn new(days: Vec<u32>) -> Result<Self> {
        if days.is_empty() {
            return Err(AppError::config("escalation schedule is empty"));
        }
        if days.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(AppError::config(format!(
                "escalation schedule {days:?} must be non-decreasing"
            )));
        }
        Ok(Self(days))
    }

    /// Days required before the send following `sends_made` earlier sends.
    pub fn threshold(&self, sends_made: usize) -> u32 {
        self.0
            .get(sends_made)
            .or_else(|| self.0.last())
            .copied()
            .unwrap_or(0)
    }
}

impl Default for EscalationSchedule {
    fn default() -> Self {
        Self(vec![0, 1, 2, 4, 7, 15])
    }
}

/// Persisted failure history since the last successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLedger {
    /// Every failed run
    #[serde(default)]
    pub error: Vec<DateTime<Local>>,

    /// Every error email actually sent
    #[serde(default)]
    pub error_sent: Vec<DateTime<Local>>,
}

impl ErrorLedger {
    pub fn is_empty(&self) -> bool {
        self.error.is_empty() && self.error_sent.is_empty()
    }

    /// Whole calendar days between the last send and `now`; 0 before any send.
    pub fn days_since_last_send(&self, now: DateTime<Local>) -> i64 {
        self.error_sent
            .last()
            .map(|last| (now.date_naive() - last.date_naive()).num_days())
            .unwrap_or(0)
    }
}

/// Content of one error email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationNotice {
    /// Failed runs since the last success, this one included
    pub error_count: usize,
    /// The failure with its cause chain
    pub error_text: String,
}

impl EscalationNotice {
    pub fn body(&self) -> String {
        format!(
            "The script has failed {} time(s) since the last successful run.\n\nLatest error:\n{}",
            self.error_count, self.error_text
        )
    }
}

/// What a call to [`ErrorEscalationTracker::record`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationDecision {
    /// Successful run; ledger cleared
    Reset,
    /// Error email sent and recorded
    Sent { error_count: usize, sends: usize },
    /// Failure recorded, email not due yet
    Deferred {
        error_count: usize,
        days_since_last_send: i64,
        threshold: u32,
    },
}

/// Decides whether a failure is worth an email, and keeps the ledger.
#[derive(Debug, Clone)]
pub struct ErrorEscalationTracker {
    path: PathBuf,
    schedule: EscalationSchedule,
}

impl ErrorEscalationTracker {
    pub fn new(path: impl Into<PathBuf>, schedule: EscalationSchedule) -> Self {
        Self {
            path: path.into(),
            schedule,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record this invocation's outcome at the current time.
    pub fn record<F>(&self, failure: Option<&AppError>, send: F) -> Result<EscalationDecision>
    where
        F: FnOnce(&EscalationNotice) -> Result<()>,
    {
        self.record_at(failure, Local::now(), send)
    }

    /// Record an outcome at `now`.
    ///
    /// - `None` clears the ledger; nothing is sent.
    /// - A failure is appended. If the schedule says an email is due, `send`
    ///   is called; on success the send is recorded and the ledger saved.
    /// - If `send` fails the ledger file is not touched at all and
    ///   [`AppError::EscalationSend`] is returned.
    /// - If no email is due the failure is still saved.
    pub fn record_at<F>(
        &self,
        failure: Option<&AppError>,
        now: DateTime<Local>,
        send: F,
    ) -> Result<EscalationDecision>
    where
        F: FnOnce(&EscalationNotice) -> Result<()>,
    {
        let mut ledger = self.load()?;

        let Some(failure) = failure else {
            if !ledger.is_empty() {
                log::info!(
                    "Run succeeded after {} failure(s); clearing error ledger",
                    ledger.error.len()
                );
            }
            self.save(&ErrorLedger::default())?;
            return Ok(EscalationDecision::Reset);
        };

        let days_since_last_send = ledger.days_since_last_send(now);
        ledger.error.push(now);
        let error_count = ledger.error.len();
        let threshold = self.schedule.threshold(ledger.error_sent.len());

        if days_since_last_send < i64::from(threshold) {
            log::info!(
                "Error email not due: {days_since_last_send} day(s) since last send, {threshold} required"
            );
            self.save(&ledger)?;
            return Ok(EscalationDecision::Deferred {
                error_count,
                days_since_last_send,
                threshold,
            });
        }

        let notice = EscalationNotice {
            error_count,
            error_text: failure.report(),
        };
        if let Err(e) = send(&notice) {
            log::error!("Error sending error email: {}", e.report());
            return Err(AppError::EscalationSend {
                source: Box::new(e),
            });
        }

        ledger.error_sent.push(now);
        self.save(&ledger)?;
        log::info!(
            "Error email sent ({} sent, {error_count} failure(s) this streak)",
            ledger.error_sent.len()
        );
        Ok(EscalationDecision::Sent {
            error_count,
            sends: ledger.error_sent.len(),
        })
    }

    /// Read the ledger. Missing or empty yields an empty ledger; an unreadable
    /// one is truncated so the next run starts clean, and the error returned.
    pub fn load(&self) -> Result<ErrorLedger> {
        let parsed = read_or_empty(&self.path).and_then(|content| {
            if content.trim().is_empty() {
                return Ok(ErrorLedger::default());
            }
            let ledger: ErrorLedger = serde_json::from_str(&content)?;
            if ledger.error_sent.len() > ledger.error.len() {
                return Err(AppError::config("more sends than errors recorded"));
            }
            Ok(ledger)
        });

        parsed.map_err(|e| {
            log::error!("Error ledger {} unreadable: {e}", self.path.display());
            if let Err(truncate) = fs::write(&self.path, "") {
                log::error!("Failed to truncate {}: {truncate}", self.path.display());
            }
            AppError::EscalationPersistence {
                path: self.path.clone(),
                message: e.to_string(),
            }
        })
    }

    fn save(&self, ledger: &ErrorLedger) -> Result<()> {
        let bytes = serde_json::to_vec(ledger)?;
        write_atomic(&self.path, &bytes)
    }
}
