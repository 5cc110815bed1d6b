//! Handles all user-facing output for the CLI.
//!
//! This module is responsible for pretty-printing, colorizing output,
//! formatting errors, and generating JSON. Colors are only used when stdout
//! is a terminal.

use std::io::{self, IsTerminal, Write};

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::ast::value::Value;
use crate::ast::Ident;
use crate::runtime::trace::{TraceEvent, Verdict};
use crate::PegError;

// ============================================================================
// STREAMS
// ============================================================================

/// Stdout, colored only when it is a terminal.
pub fn stdout() -> StandardStream {
    let choice = if io::stdout().is_terminal() {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

fn print_colored(out: &mut StandardStream, color: Option<Color>, bold: bool, text: &str) {
    let _ = out.set_color(ColorSpec::new().set_fg(color).set_bold(bold));
    let _ = write!(out, "{}", text);
    let _ = out.reset();
    let _ = writeln!(out);
}

// ============================================================================
// CORE OUTPUT FUNCTIONS: User-facing CLI output utilities
// ============================================================================

/// Prints a parse result as a value tree or JSON.
pub fn print_value(value: &Value, json: bool) {
    if json {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Error: cannot encode value: {}", e),
        }
    } else {
        println!("{}", value);
    }
}

/// Prints one trace event, numbered, colored by kind.
pub fn print_event(out: &mut StandardStream, index: usize, event: &TraceEvent, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(event) {
            let _ = writeln!(out, "{}", line);
        }
        return;
    }
    let (color, bold) = match event {
        TraceEvent::RuleEnter { .. } => (Some(Color::Green), true),
        TraceEvent::RuleExit { .. } => (Some(Color::Green), false),
        TraceEvent::Consume { .. } => (Some(Color::Cyan), false),
        TraceEvent::Rollback { .. } => (Some(Color::Red), true),
        TraceEvent::SourceSpan { .. } => (Some(Color::Yellow), false),
        _ => (None, false),
    };
    print_colored(out, color, bold, &format!("{:>6}  {}", index, event));
}

/// Prints the final verdict of a trace.
pub fn print_verdict(out: &mut StandardStream, verdict: &Verdict, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(verdict) {
            let _ = writeln!(out, "{}", line);
        }
        return;
    }
    match verdict {
        Verdict::Accepted { consumed } => print_colored(
            out,
            Some(Color::Green),
            true,
            &format!("accepted: {} bytes consumed", consumed),
        ),
        Verdict::Rejected { position, matched } => {
            let reason = if *matched {
                "stopped before the end"
            } else {
                "no match"
            };
            print_colored(
                out,
                Some(Color::Red),
                true,
                &format!("rejected at offset {}: {}", position, reason),
            )
        }
    }
}

/// Prints the undeclared references a grammar check found.
pub fn print_unresolved(out: &mut StandardStream, missing: &[&Ident]) {
    for ident in missing {
        print_colored(
            out,
            Some(Color::Yellow),
            false,
            &format!("undeclared rule '{}' at {}", ident.name, ident.span),
        );
    }
}

/// Prints a success message in green.
pub fn print_success(out: &mut StandardStream, message: &str) {
    print_colored(out, Some(Color::Green), false, message);
}

/// Renders an error as a miette report on stderr.
pub fn print_error(err: PegError) {
    eprintln!("{:?}", miette::Report::new(err));
}
