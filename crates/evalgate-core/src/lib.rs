// Public fallible APIs in this crate share one concrete error contract (`EvalError`).
#![allow(
    clippy::missing_errors_doc,
    reason = "crate-wide fallible API uses one explicit error type; per-item boilerplate would duplicate contract"
)]

pub mod audit;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluator;
pub mod extract;
pub mod gate;
pub(crate) mod jsonl;
pub(crate) mod llm_io;
pub mod model_client;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod sample;
pub(crate) mod text;

pub use error::{EvalError, Result};
