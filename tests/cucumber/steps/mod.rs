// Cucumber Step Definitions Module
//
// Step definitions grouped by feature area.

pub mod cli;
pub mod common;
pub mod connections;
pub mod requests;

pub use common::ApiWorld;
