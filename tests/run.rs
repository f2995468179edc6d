//! End-to-end runs against canned pages, with no network.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use pagewatch::error::{AppError, Result};
use pagewatch::models::{Config, FieldSelector, ListingSelectors};
use pagewatch::notify::{MailMessage, Notifier};
use pagewatch::pipeline::{
    ErrorEscalationTracker, EscalationDecision, EscalationSchedule, Watcher, run_with_escalation,
};
use pagewatch::services::{Page, PageFetcher, PageKind};
use tempfile::TempDir;
use url::Url;

struct FakeFetcher {
    pages: HashMap<String, String>,
}

impl FakeFetcher {
    fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, html)| (url.to_string(), html.to_string()))
                .collect(),
        }
    }
}

impl PageFetcher for FakeFetcher {
    fn fetch(&self, url: &str, _kind: PageKind) -> Result<Page> {
        let html = self
            .pages
            .get(url)
            .ok_or_else(|| AppError::config(format!("no canned page for {url}")))?;
        Ok(Page::html(Url::parse(url)?, html))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: RefCell<Vec<MailMessage>>,
}

impl Notifier for RecordingNotifier {
    fn send(&self, message: &MailMessage) -> Result<()> {
        self.sent.borrow_mut().push(message.clone());
        Ok(())
    }
}

struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn send(&self, _message: &MailMessage) -> Result<()> {
        Err(AppError::mail("connection refused"))
    }
}

const PAGE_1: &str = r#"<html><body>
    <article><a href="/ad/1">Red bike</a><span class="price">100</span></article>
    <article><a href="/ad/2">Blue bike</a><span class="price">200</span></article>
    <a class="next" href="/bikes?page=2">Next</a>
</body></html>"#;

const PAGE_2: &str = r#"<html><body>
    <article><a href="/ad/3">Green bike</a><span class="price">300</span></article>
</body></html>"#;

fn setup(tmp: &TempDir) -> Config {
    let root = tmp.path();
    fs::write(
        root.join("searches.toml"),
        r#"
        [[searches]]
        search_url = "https://market.example.com/bikes?page=1"
        display_url = "https://market.example.com/bikes"
        title = "bikes"
        "#,
    )
    .unwrap();

    let mut config = Config::default();
    config.site.name = "market".into();
    config.site.listing = ListingSelectors {
        next_page_selector: Some("a.next".into()),
        fields: vec![FieldSelector {
            name: "price".into(),
            selector: ".price".into(),
            attr: None,
        }],
        ..ListingSelectors::default()
    };
    config.notify.email = "owner@example.com".into();
    config.notify.email_html = false;
    config.paths.searches_file = root.join("searches.toml");
    config.paths.snapshot_file = root.join("data/elements.json");
    config.paths.history_file = root.join("logs/history.txt");
    config.paths.ledger_file = root.join("data/error_email.json");
    config
}

fn fetcher() -> FakeFetcher {
    FakeFetcher::new(&[
        ("https://market.example.com/bikes?page=1", PAGE_1),
        ("https://market.example.com/bikes?page=2", PAGE_2),
    ])
}

fn ledger_len(path: &Path) -> (usize, usize) {
    let tracker = ErrorEscalationTracker::new(path, EscalationSchedule::default());
    let ledger = tracker.load().unwrap();
    (ledger.error.len(), ledger.error_sent.len())
}

#[test]
fn first_run_reports_everything_then_nothing() {
    let tmp = TempDir::new().unwrap();
    let config = setup(&tmp);
    let fetcher = fetcher();
    let mailer = RecordingNotifier::default();

    let outcome = run_with_escalation(&config, Some(&mailer), || {
        Watcher::new(&config, &fetcher).with_mailer(&mailer).run_once()
    });
    assert_eq!(outcome.exit_code(), 0);
    let report = outcome.run.unwrap();
    assert_eq!(report.entities, 3);
    assert_eq!(report.changed, 3);
    assert_eq!(outcome.escalation.unwrap(), EscalationDecision::Reset);

    {
        let sent = mailer.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "New results for your market search");
        assert_eq!(sent[0].recipient, "owner@example.com");
        assert!(sent[0].body.contains("Red bike (https://market.example.com/ad/1)"));
        assert!(sent[0].body.contains("price: 300"));
    }

    let history = fs::read_to_string(&config.paths.history_file).unwrap();
    assert!(history.contains("\n– https://market.example.com/ad/1\n– https://market.example.com/ad/2\n– https://market.example.com/ad/3\n\n"));

    // Nothing changed on the site.
    let outcome = run_with_escalation(&config, Some(&mailer), || {
        Watcher::new(&config, &fetcher).with_mailer(&mailer).run_once()
    });
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(outcome.run.unwrap().changed, 0);
    assert_eq!(mailer.sent.borrow().len(), 1);
}

#[test]
fn failure_is_escalated_with_backoff() {
    let tmp = TempDir::new().unwrap();
    let mut config = setup(&tmp);
    config.paths.searches_file = tmp.path().join("missing.toml");
    let fetcher = fetcher();
    let mailer = RecordingNotifier::default();

    let outcome = run_with_escalation(&config, Some(&mailer), || {
        Watcher::new(&config, &fetcher).with_mailer(&mailer).run_once()
    });
    assert_eq!(outcome.exit_code(), 1);
    assert!(matches!(outcome.run, Err(AppError::Config(_))));
    assert!(matches!(
        outcome.escalation,
        Ok(EscalationDecision::Sent { error_count: 1, sends: 1 })
    ));
    {
        let sent = mailer.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Error while running the market scraper");
        assert!(sent[0].body.contains("does not exist"));
    }

    // Same day: recorded, not re-sent.
    let outcome = run_with_escalation(&config, Some(&mailer), || {
        Watcher::new(&config, &fetcher).with_mailer(&mailer).run_once()
    });
    assert_eq!(outcome.exit_code(), 1);
    assert!(matches!(
        outcome.escalation,
        Ok(EscalationDecision::Deferred { error_count: 2, .. })
    ));
    assert_eq!(mailer.sent.borrow().len(), 1);
    assert_eq!(ledger_len(&config.paths.ledger_file), (2, 1));
}

#[test]
fn success_after_failures_resets_ledger() {
    let tmp = TempDir::new().unwrap();
    let config = setup(&tmp);
    let fetcher = fetcher();
    let mailer = RecordingNotifier::default();

    let outcome = run_with_escalation(&config, Some(&mailer), || {
        Err(AppError::config("transient"))
    });
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(ledger_len(&config.paths.ledger_file), (1, 1));

    let outcome = run_with_escalation(&config, Some(&mailer), || {
        Watcher::new(&config, &fetcher).with_mailer(&mailer).run_once()
    });
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(ledger_len(&config.paths.ledger_file), (0, 0));
}

#[test]
fn failed_error_email_exits_2_and_leaves_ledger() {
    let tmp = TempDir::new().unwrap();
    let config = setup(&tmp);
    fs::create_dir_all(tmp.path().join("data")).unwrap();
    fs::write(&config.paths.ledger_file, "").unwrap();

    let outcome = run_with_escalation(&config, Some(&FailingNotifier), || {
        Err(AppError::config("boom"))
    });

    assert_eq!(outcome.exit_code(), 2);
    assert!(matches!(
        outcome.escalation,
        Err(AppError::EscalationSend { .. })
    ));
    assert_eq!(fs::read_to_string(&config.paths.ledger_file).unwrap(), "");
}

#[test]
fn pagination_limit_fails_the_run() {
    let tmp = TempDir::new().unwrap();
    let mut config = setup(&tmp);
    config.site.max_pages = Some(1);
    let fetcher = fetcher();
    let mailer = RecordingNotifier::default();

    let outcome = run_with_escalation(&config, Some(&mailer), || {
        Watcher::new(&config, &fetcher).with_mailer(&mailer).run_once()
    });

    assert!(matches!(
        outcome.run,
        Err(AppError::PaginationLimitExceeded { max_pages: 1, .. })
    ));
    assert_eq!(outcome.exit_code(), 1);
}

#[test]
fn push_without_channel_is_config_error() {
    let tmp = TempDir::new().unwrap();
    let mut config = setup(&tmp);
    config.notify.push_notifications = true;
    let fetcher = fetcher();
    let mailer = RecordingNotifier::default();

    let err = Watcher::new(&config, &fetcher)
        .with_mailer(&mailer)
        .run_once()
        .unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
    assert!(!config.paths.snapshot_file.exists());
    assert!(mailer.sent.borrow().is_empty());

    // Once the channel problem is fixed, nothing has been swallowed.
    config.notify.push_notifications = false;
    let report = Watcher::new(&config, &fetcher)
        .with_mailer(&mailer)
        .run_once()
        .unwrap();
    assert_eq!(report.changed, 3);
    assert_eq!(mailer.sent.borrow().len(), 1);
}

#[test]
fn email_without_mailer_keeps_snapshot_untouched() {
    let tmp = TempDir::new().unwrap();
    let mut config = setup(&tmp);
    config.notify.email_notifications = true;
    let fetcher = fetcher();

    let err = Watcher::new(&config, &fetcher).run_once().unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
    assert!(!config.paths.snapshot_file.exists());
    assert!(!config.paths.history_file.exists());
}
