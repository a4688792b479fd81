//! Operator tool for store-aware replica placement.
//!
//! Loads a recorded cluster scenario and prints, as JSON:
//! - The verdict for each unassigned replica (`decide`)
//! - The recoveries cancelled in favour of a no-op recovery (`reconcile`)

pub mod commands;
pub mod config;
pub mod scenario;

pub use commands::{Command, CommandResult};
pub use config::CliConfig;
pub use scenario::Scenario;
