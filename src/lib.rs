//! Cultivar — recipe execution core for farmer/sprout configuration management.
//!
//! Validated step graphs, six-way requisite semantics, concurrent cooking
//! with a single-writer completion stream and an append-only JSONL job log.

pub mod cli;
pub mod core;
pub mod ingredients;
pub mod joblog;
