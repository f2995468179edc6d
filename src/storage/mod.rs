//! Append-only records kept beside the snapshot and ledger.
//!
//! ```text
//! logs/
//! └── history.txt      # every reported link, one block per run
//! ```

pub mod history;

pub use history::HistoryArchive;
