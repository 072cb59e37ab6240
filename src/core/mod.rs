//! Core recipe logic — step model, graph validation, readiness, cooking.

pub mod engine;
pub mod graph;
pub mod parser;
pub mod ready;
pub mod tree;
pub mod types;
