//! The pegtrace Command-Line Interface.
//!
//! This module is the main entry point for all CLI commands and orchestrates
//! the core library functions.

use std::io::{self, Read};
use std::path::Path;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::args::{Command, InputArgs, PegArgs};
use crate::compiler::types::describe;
use crate::engine::{read_file, Engine, EngineConfig};
use crate::runtime::nodes::NodeTree;
use crate::syntax::meta::META_GRAMMAR;
use crate::syntax::parser::parse_grammar_named;
use crate::{err_ctx, PegError};

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() {
    let args = PegArgs::parse();
    init_logging(args.verbose);

    if let Err(e) = dispatch(args) {
        output::print_error(e);
        process::exit(1);
    }
}

/// Installs the stderr log subscriber. `-v` flags win over `PEGTRACE_LOG`.
fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env("PEGTRACE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("pegtrace=debug"),
        _ => EnvFilter::new("pegtrace=trace"),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .try_init();
}

fn dispatch(args: PegArgs) -> Result<(), PegError> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    match args.command {
        Command::Parse {
            grammar,
            input,
            json,
        } => handle_parse(&grammar, input, json, config),
        Command::Trace {
            grammar,
            input,
            json,
            tree,
        } => handle_trace(&grammar, input, json, tree, config),
        Command::Ast { grammar, json } => handle_ast(&grammar, json),
        Command::Schema {
            grammar,
            tag_field,
            no_offsets,
            max_width,
            json,
        } => {
            let mut config = config;
            if let Some(tag_field) = tag_field {
                config.schema.tag_field = tag_field;
            }
            if no_offsets {
                config.schema.include_offsets = false;
            }
            if max_width.is_some() {
                config.schema.max_width = max_width;
            }
            handle_schema(&grammar, json, config)
        }
        Command::Check { grammar } => handle_check(&grammar, config),
        Command::Meta => {
            print!("{}", META_GRAMMAR);
            Ok(())
        }
    }
}

// ============================================================================
// COMMAND HANDLERS
// ============================================================================

/// Handles the `parse` subcommand.
fn handle_parse(
    grammar: &Path,
    input: InputArgs,
    json: bool,
    mut config: EngineConfig,
) -> Result<(), PegError> {
    let text = read_input(&input)?;
    if input.rule.is_some() {
        config.start_rule = input.rule;
    }
    let engine = Engine::from_file(grammar, config)?;
    let value = engine.parse(&text)?;
    output::print_value(&value, json);
    Ok(())
}

/// Handles the `trace` subcommand. Events are printed as the session
/// produces them, so a failing parse still shows how far it got.
fn handle_trace(
    grammar: &Path,
    input: InputArgs,
    json: bool,
    tree: bool,
    mut config: EngineConfig,
) -> Result<(), PegError> {
    let text = read_input(&input)?;
    if input.rule.is_some() {
        config.start_rule = input.rule;
    }
    let engine = Engine::from_file(grammar, config)?;
    let mut out = output::stdout();
    let mut nodes = NodeTree::new();
    let mut session = engine.session(&text)?;
    let mut index = 0;
    while let Some(event) = session.step()? {
        if tree {
            nodes.apply(&event);
        } else {
            output::print_event(&mut out, index, &event, json);
        }
        index += 1;
    }
    if tree {
        println!("{}", nodes.render());
    }
    if let Some(verdict) = session.verdict() {
        output::print_verdict(&mut out, &verdict, json);
    }
    match session.outcome() {
        Some(result) => result.map(|_| ()),
        None => Ok(()),
    }
}

/// Handles the `ast` subcommand.
fn handle_ast(grammar: &Path, json: bool) -> Result<(), PegError> {
    let text = read_file(grammar)?;
    let ast = parse_grammar_named(&grammar.display().to_string(), &text)?;
    if json {
        let encoded = serde_json::to_string_pretty(&ast).map_err(|e| PegError::Internal {
            message: "cannot encode grammar".to_string(),
            ctx: Default::default(),
            source: Some(Box::new(e)),
        })?;
        println!("{}", encoded);
    } else {
        print!("{}", ast);
    }
    Ok(())
}

/// Handles the `schema` subcommand.
fn handle_schema(grammar: &Path, json: bool, config: EngineConfig) -> Result<(), PegError> {
    let engine = Engine::from_file(grammar, config)?;
    if json {
        let encoded =
            serde_json::to_string_pretty(&describe(engine.grammar())).map_err(|e| PegError::Internal {
                message: "cannot encode schema".to_string(),
                ctx: Default::default(),
                source: Some(Box::new(e)),
            })?;
        println!("{}", encoded);
    } else {
        print!("{}", engine.schema_report());
    }
    Ok(())
}

/// Handles the `check` subcommand.
fn handle_check(grammar: &Path, config: EngineConfig) -> Result<(), PegError> {
    let engine = Engine::from_file(grammar, config)?;
    let missing = engine.unresolved_references();
    let mut out = output::stdout();
    match missing.first() {
        None => {
            output::print_success(
                &mut out,
                &format!("ok: {} rules, every reference resolves", engine.grammar().rules.len()),
            );
            Ok(())
        }
        Some(first) => {
            output::print_unresolved(&mut out, &missing);
            Err(err_ctx!(
                UnresolvedRule,
                &first.name,
                engine.source(),
                first.span,
                format!("{} reference(s) to undeclared rules", missing.len())
            ))
        }
    }
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn read_input(input: &InputArgs) -> Result<String, PegError> {
    if let Some(text) = &input.text {
        return Ok(text.clone());
    }
    if let Some(path) = &input.input {
        return read_file(path);
    }
    let mut text = String::new();
    io::stdin().read_to_string(&mut text).map_err(|e| PegError::Io {
        message: "cannot read standard input".to_string(),
        ctx: Default::default(),
        source: Some(Box::new(e)),
    })?;
    Ok(text)
}
