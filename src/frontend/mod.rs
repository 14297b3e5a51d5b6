//! Command-line front end for the demonstration run

pub mod cli;

pub use cli::main as cli_main;
