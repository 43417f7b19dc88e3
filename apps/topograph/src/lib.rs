//! # topograph
//!
//! The host agent around `topograph-core`: configuration, external command
//! execution, host bootstrap, interface discovery, the periodic snapshot
//! collector and the CLI.

pub mod agent;
pub mod cli;
pub mod collector;
pub mod config;
pub mod host;
pub mod interfaces;
pub mod runner;

pub use agent::Agent;
pub use collector::{CollectionReport, Collector, CollectorHandle};
pub use config::AgentConfig;
pub use runner::{CommandRunner, SystemRunner};
