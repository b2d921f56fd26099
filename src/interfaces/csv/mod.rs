//! CSV adapters for the CLI: command intake, directory seeding, and the
//! balance report.

pub mod balance_writer;
pub mod command_reader;
pub mod directory_reader;
