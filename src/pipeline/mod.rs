//! Pipeline entry points for a monitored invocation.
//!
//! - `PaginationWalker`: collect entities across the pages of each search
//! - `SnapshotDiffer`: compare against the previous run
//! - `NotificationComposer`: format change reports and error emails
//! - `ErrorEscalationTracker`: decide when failures are emailed
//! - `Watcher`, `run_with_escalation`: tie it together

pub mod compose;
pub mod diff;
pub mod escalation;
pub mod run;
pub mod walk;

pub use compose::{Notification, NotificationComposer};
pub use diff::{SnapshotDiffer, changed_entities};
pub use escalation::{
    ErrorEscalationTracker, ErrorLedger, EscalationDecision, EscalationNotice, EscalationSchedule,
};
pub use run::{RunOutcome, RunReport, Watcher, prune, run_with_escalation};
pub use walk::PaginationWalker;
