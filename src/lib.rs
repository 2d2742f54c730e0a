// cloudspend library crate
// Exposes modules for the binary and integration testing

pub mod analysis;
pub mod cli;
pub mod commands;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod models;
pub mod output;

pub use engine::{AccountReport, Engine, EngineReport};
pub use error::{EngineError, EngineResult};
