//! CLI module for the approval engine
//!
//! - `serve`: HTTP API over an in-memory store
//! - `demo`: runs a reference approval scenario and prints the action log

pub mod demo;
pub mod serve;

use clap::{Parser, Subcommand};

/// Approval Engine - multi-stage approval workflows
#[derive(Parser)]
#[command(name = "approval-engine")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API server
    Serve,

    /// Run the reference scenario against the in-memory store
    Demo(demo::DemoArgs),
}
