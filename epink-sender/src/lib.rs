//! # epink-sender — panel update sender
//!
//! Loads a rendered frame, runs it through the `epink-core` pipeline and
//! publishes the sealed chunks to the panel gateway's MQTT topic.
//!
//! ## Modes
//!
//! - **Live**: connect to the configured broker and deliver.
//! - **Dry run**: deliver into an in-memory sink and report what would
//!   have been sent (`--dry-run`).

pub mod canvas;
pub mod config;
pub mod session;
