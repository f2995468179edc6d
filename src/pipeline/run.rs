// src/pipeline/run.rs

//! One monitored invocation: walk, diff, notify, then escalation bookkeeping.

use std::path::Path;

use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::{Config, SearchSpec};
use crate::notify::{MailMessage, Notifier, PushNotifier};
use crate::pipeline::compose::NotificationComposer;
use crate::pipeline::diff::SnapshotDiffer;
use crate::pipeline::escalation::{
    ErrorEscalationTracker, EscalationDecision, EscalationSchedule,
};
use crate::pipeline::walk::PaginationWalker;
use crate::services::{PageFetcher, build_extractor};
use crate::storage::HistoryArchive;
use crate::utils::fs::{ensure_files, prune_old_files};

/// What a successful run observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub searches: usize,
    pub entities: usize,
    pub changed: usize,
    pub pruned: usize,
}

/// Result of a run plus its escalation bookkeeping.
#[derive(Debug)]
pub struct RunOutcome {
    pub run: Result<RunReport>,
    pub escalation: Result<EscalationDecision>,
}

impl RunOutcome {
    /// 0 on success, 1 when the run failed, 2 when escalation itself failed.
    pub fn exit_code(&self) -> i32 {
        match (&self.run, &self.escalation) {
            (_, Err(_)) => 2,
            (Err(_), Ok(_)) => 1,
            (Ok(_), Ok(_)) => 0,
        }
    }
}

/// The change-detection pass over every configured search.
pub struct Watcher<'a> {
    config: &'a Config,
    fetcher: &'a dyn PageFetcher,
    mailer: Option<&'a dyn Notifier>,
    push: Option<&'a dyn PushNotifier>,
}

impl<'a> Watcher<'a> {
    pub fn new(config: &'a Config, fetcher: &'a dyn PageFetcher) -> Self {
        Self {
            config,
            fetcher,
            mailer: None,
            push: None,
        }
    }

    pub fn with_mailer(mut self, mailer: &'a dyn Notifier) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn with_push(mut self, push: &'a dyn PushNotifier) -> Self {
        self.push = Some(push);
        self
    }

    /// Walk all searches, diff against the snapshot, and report changes.
    ///
    /// Missing notification channels fail the run before anything is fetched
    /// or persisted.
    pub fn run_once(&self) -> Result<RunReport> {
        let config = self.config;
        let paths = &config.paths;

        let push = if config.notify.push_notifications {
            Some(self.push.ok_or_else(|| {
                AppError::config("Pushover api token and user key required")
            })?)
        } else {
            None
        };
        let mailer = if config.notify.email_notifications {
            Some(
                self.mailer
                    .ok_or_else(|| AppError::config("email notifications on but no mailer"))?,
            )
        } else {
            None
        };

        ensure_files([
            paths.snapshot_file.as_path(),
            paths.history_file.as_path(),
            paths.ledger_file.as_path(),
        ])?;

        let searches = SearchSpec::load_all(&paths.searches_file)?;
        log::info!("Loaded {} search(es)", searches.len());

        let extractor = build_extractor(&config.site)?;
        let walker = PaginationWalker::new(
            self.fetcher,
            extractor.as_ref(),
            config.site.effective_max_pages(),
        );
        let entities = walker.walk_all(&searches)?;

        let differ = SnapshotDiffer::new(
            &paths.snapshot_file,
            config.site.effective_include_changes(),
        );
        let changed = differ.diff(&entities)?.unwrap_or_default();

        if !changed.is_empty() {
            let composer = NotificationComposer::new(
                &config.site.name,
                config.notify.max_notif_entries,
                config.notify.email_html,
            );
            let notification = composer.compose(&changed, &searches, extractor.as_ref());

            if let Some(push) = push {
                push.push(&notification.body)?;
            }
            if let Some(mailer) = mailer {
                mailer.send(&MailMessage {
                    recipient: config.notify.email.clone(),
                    subject: notification.subject.clone(),
                    body: notification.body.clone(),
                    html: composer.is_html(),
                    attachments: Vec::new(),
                })?;
            }
            HistoryArchive::new(&paths.history_file).append(&notification.links)?;
        }

        let pruned = self.prune()?;

        Ok(RunReport {
            searches: searches.len(),
            entities: entities.len(),
            changed: changed.len(),
            pruned,
        })
    }

    fn prune(&self) -> Result<usize> {
        let retention = &self.config.retention;
        let Some(dir) = &retention.dir else {
            return Ok(0);
        };
        let pattern = retention.pattern.as_deref().map(Regex::new).transpose()?;
        prune(dir, retention.max_age_days, pattern.as_ref())
    }
}

/// Remove old files, logging the count.
pub fn prune(dir: &Path, max_age_days: u64, pattern: Option<&Regex>) -> Result<usize> {
    let removed = prune_old_files(dir, max_age_days, pattern)?;
    if removed > 0 {
        log::info!(
            "Removed {removed} file(s) older than {max_age_days} day(s) from {}",
            dir.display()
        );
    }
    Ok(removed)
}

/// Run `run`, log any failure, then record the outcome with the escalation
/// tracker exactly once. Error emails go through `mailer`.
pub fn run_with_escalation<F>(config: &Config, mailer: Option<&dyn Notifier>, run: F) -> RunOutcome
where
    F: FnOnce() -> Result<RunReport>,
{
    let run = run();
    match &run {
        Ok(report) => log::info!(
            "Run finished: {} entities, {} new or changed",
            report.entities,
            report.changed
        ),
        Err(e) => log::error!("Run failed: {}", e.report()),
    }

    let escalation = EscalationSchedule::new(config.escalation.schedule.clone()).and_then(
        |schedule| {
            let tracker = ErrorEscalationTracker::new(&config.paths.ledger_file, schedule);
            let composer = NotificationComposer::new(
                &config.site.name,
                config.notify.max_notif_entries,
                false,
            );
            tracker.record(run.as_ref().err(), |notice| {
                let mailer = mailer
                    .ok_or_else(|| AppError::config("no mailer available for error email"))?;
                mailer.send(&composer.escalation(
                    &config.notify.email,
                    notice,
                    config.paths.log_file.as_deref(),
                ))
            })
        },
    );
    if let Err(e) = &escalation {
        log::error!("Escalation failed: {}", e.report());
    }

    RunOutcome { run, escalation }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(run_ok: bool, escalation_ok: bool) -> RunOutcome {
        RunOutcome {
            run: if run_ok {
                Ok(RunReport::default())
            } else {
                Err(AppError::config("run"))
            },
            escalation: if escalation_ok {
                Ok(EscalationDecision::Reset)
            } else {
                Err(AppError::config("escalation"))
            },
        }
    }

    #[test]
    fn exit_codes() {
        assert_eq!(outcome(true, true).exit_code(), 0);
        assert_eq!(outcome(false, true).exit_code(), 1);
        assert_eq!(outcome(false, false).exit_code(), 2);
        assert_eq!(outcome(true, false).exit_code(), 2);
    }
}
