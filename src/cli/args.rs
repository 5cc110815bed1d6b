//! Defines the command-line arguments and subcommands for the pegtrace CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "pegtrace",
    version,
    about = "Run PEG grammars plainly, step by step, or as schema reports."
)]
pub struct PegArgs {
    /// Log more: -v for debug, -vv for trace. Overrides PEGTRACE_LOG.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// YAML engine configuration.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Where the subject text comes from. Standard input when neither is given.
#[derive(Debug, Args)]
pub struct InputArgs {
    /// File holding the text to parse.
    #[arg(conflicts_with = "text")]
    pub input: Option<PathBuf>,

    /// Text to parse, given inline.
    #[arg(short = 'e', long)]
    pub text: Option<String>,

    /// Rule to start from; defaults to the configured or first rule.
    #[arg(short, long)]
    pub rule: Option<String>,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse text with the plain interpreter and print the value tree.
    Parse {
        /// The grammar file.
        grammar: PathBuf,
        #[command(flatten)]
        input: InputArgs,
        /// Print the value as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Parse text with the step interpreter and print every trace event.
    Trace {
        /// The grammar file.
        grammar: PathBuf,
        #[command(flatten)]
        input: InputArgs,
        /// Print events as JSON lines.
        #[arg(long)]
        json: bool,
        /// Print the final node tree instead of the events.
        #[arg(long)]
        tree: bool,
    },
    /// Print the grammar's syntax tree.
    Ast {
        /// The grammar file.
        grammar: PathBuf,
        /// Print the tree as JSON instead of normalized grammar text.
        #[arg(long)]
        json: bool,
    },
    /// Print the type declarations of the values each rule produces.
    Schema {
        /// The grammar file.
        grammar: PathBuf,
        /// Name of the rule-name field.
        #[arg(long)]
        tag_field: Option<String>,
        /// Leave out the `$from`/`$to` offsets.
        #[arg(long)]
        no_offsets: bool,
        /// Truncate lines to this width.
        #[arg(long)]
        max_width: Option<usize>,
        /// Print the descriptions as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Check a grammar for references to undeclared rules.
    Check {
        /// The grammar file.
        grammar: PathBuf,
    },
    /// Print the meta-grammar grammar files are written in.
    Meta,
}
