//! CLI module for the research workflow
//!
//! Provides subcommands:
//! - `research`: answer one question and print the report

pub mod research;

use clap::{Parser, Subcommand};

/// Research workflow - decompose a question, search the web, synthesize a cited answer
#[derive(Parser)]
#[command(name = "research-workflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the research pipeline for one question
    Research(research::ResearchArgs),
}
