// src/lib.rs

//! pagewatch: poll pages, report what changed, and escalate failures politely.

pub mod error;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
