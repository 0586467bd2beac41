//! # Mnemo
//!
//! Command-line front end for the mnemo object store. The engine lives in
//! `mnemo-core`; this crate adds configuration loading and the CLI commands.

pub mod cli;
pub mod config;
