//! High-level entry point: one grammar, loaded once, run under every
//! interpretation.
//!
//! ```rust
//! use pegtrace::engine::{Engine, EngineConfig};
//! let engine = Engine::from_source(
//!     "greeting.peg",
//!     "greeting = \"hi\" _ name:$[a-z]+ ;\n_ = [ ]*;",
//!     EngineConfig::default(),
//! )
//! .unwrap();
//! let value = engine.parse("hi alice").unwrap();
//! assert_eq!(value.get("name").and_then(|v| v.as_text()), Some("alice"));
//! assert!(engine.trace("hi alice").unwrap().verdict.is_accepted());
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ast::value::Value;
use crate::ast::{Grammar, Ident};
use crate::compiler::types::{describe, render_report, TypeDecl};
use crate::compiler::{self, Compiled};
use crate::diagnostics::{to_error_source, SourceArc};
use crate::runtime::context::DEFAULT_MAX_DEPTH;
use crate::runtime::interp::Interpreter;
use crate::runtime::step::{StepSession, Stepper};
use crate::runtime::trace::Trace;
use crate::syntax::parser::parse_grammar_named;
use crate::{err_msg, PegError};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Options of the schema report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemaConfig {
    /// Name of the field holding a record's rule name.
    pub tag_field: String,
    /// Whether records list their `$from`/`$to` offsets.
    pub include_offsets: bool,
    /// Truncate report lines longer than this many characters.
    pub max_width: Option<usize>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            tag_field: "type".to_string(),
            include_offsets: true,
            max_width: None,
        }
    }
}

/// Engine configuration, usually read from YAML.
///
/// ```yaml
/// start_rule: greeting
/// max_depth: 256
/// schema:
///   tag_field: kind
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Rule to parse with; the grammar's first rule when unset.
    pub start_rule: Option<String>,
    /// Limit on nested rule calls.
    pub max_depth: usize,
    pub schema: SchemaConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            start_rule: None,
            max_depth: DEFAULT_MAX_DEPTH,
            schema: SchemaConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml(text: &str) -> Result<Self, PegError> {
        let config: EngineConfig = serde_yaml::from_str(text).map_err(|e| PegError::Config {
            message: "invalid configuration".to_string(),
            ctx: Default::default(),
            source: Some(Box::new(e)),
        })?;
        if config.max_depth == 0 {
            return Err(err_msg!(Config, "max_depth must be at least 1"));
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, PegError> {
        let text = read_file(path)?;
        Self::from_yaml(&text)
    }
}

pub(crate) fn read_file(path: &Path) -> Result<String, PegError> {
    fs::read_to_string(path).map_err(|e| PegError::Io {
        message: format!("cannot read {}", path.display()),
        ctx: Default::default(),
        source: Some(Box::new(e)),
    })
}

// ============================================================================
// ENGINE
// ============================================================================

/// A loaded grammar with both interpretations compiled.
pub struct Engine {
    source: SourceArc,
    grammar: Grammar,
    config: EngineConfig,
    start_rule: String,
    plain: Compiled<Interpreter>,
    stepper: Compiled<Stepper>,
}

impl Engine {
    /// Loads grammar text, naming it `name` in diagnostics.
    pub fn from_source(name: &str, text: &str, config: EngineConfig) -> Result<Self, PegError> {
        let source = to_error_source(name, text);
        let grammar = parse_grammar_named(name, text)?;
        Self::from_grammar(grammar, source, config)
    }

    /// Loads a grammar file.
    pub fn from_file(path: &Path, config: EngineConfig) -> Result<Self, PegError> {
        let text = read_file(path)?;
        Self::from_source(&path.display().to_string(), &text, config)
    }

    fn from_grammar(
        grammar: Grammar,
        source: SourceArc,
        config: EngineConfig,
    ) -> Result<Self, PegError> {
        let attach = |e: PegError| e.with_source(&source);
        compiler::require_rules(&grammar).map_err(attach)?;
        let plain = compiler::compile(&grammar, Interpreter)
            .map_err(attach)?
            .with_max_depth(config.max_depth);
        let stepper = compiler::compile(&grammar, Stepper)
            .map_err(attach)?
            .with_max_depth(config.max_depth);
        let start_rule = match &config.start_rule {
            Some(rule) if grammar.rule(rule).is_some() => rule.clone(),
            Some(rule) => {
                return Err(err_msg!(Config, "unknown start rule '{}'", rule).with_help(format!(
                    "declared rules: {}",
                    grammar.rule_names().collect::<Vec<_>>().join(", ")
                )))
            }
            None => plain
                .first_rule()
                .ok_or_else(|| err_msg!(Internal, "compiled grammar has no rules"))?
                .to_string(),
        };
        tracing::debug!(start = %start_rule, rules = grammar.rules.len(), "engine ready");
        Ok(Self {
            source,
            grammar,
            config,
            start_rule,
            plain,
            stepper,
        })
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The grammar text and its name.
    pub fn source(&self) -> &SourceArc {
        &self.source
    }

    pub fn start_rule(&self) -> &str {
        &self.start_rule
    }

    pub fn interpreter(&self) -> &Compiled<Interpreter> {
        &self.plain
    }

    pub fn stepper(&self) -> &Compiled<Stepper> {
        &self.stepper
    }

    /// Parses `input` in full with the start rule.
    pub fn parse(&self, input: &str) -> Result<Value, PegError> {
        self.plain.parse(&self.start_rule, input)
    }

    /// Parses `input` in full with an arbitrary rule.
    pub fn parse_rule(&self, rule: &str, input: &str) -> Result<Value, PegError> {
        self.plain.parse(rule, input)
    }

    /// Starts a step session over `input` with the start rule.
    pub fn session<'a>(&'a self, input: &'a str) -> Result<StepSession<'a>, PegError> {
        self.stepper.session(&self.start_rule, input)
    }

    /// Runs the step interpreter to the end.
    pub fn trace(&self, input: &str) -> Result<Trace, PegError> {
        self.stepper.trace(&self.start_rule, input)
    }

    /// Static type descriptions of every rule.
    pub fn schema(&self) -> Vec<TypeDecl> {
        describe(&self.grammar)
    }

    /// The schema report, rendered with the configured options.
    pub fn schema_report(&self) -> String {
        render_report(&self.schema(), &self.config.schema)
    }

    /// References to rules the grammar never declares.
    pub fn unresolved_references(&self) -> Vec<&Ident> {
        compiler::unresolved_references(&self.grammar)
    }
}

#[cfg(test)]
mod engine_tests {
    use super::*;
    use crate::diagnostics::ErrorType;

    #[test]
    fn test_config_from_yaml() {
        let config = EngineConfig::from_yaml("start_rule: b\nschema:\n  include_offsets: false\n").unwrap();
        assert_eq!(config.start_rule.as_deref(), Some("b"));
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(!config.schema.include_offsets);
        assert_eq!(config.schema.tag_field, "type");
    }

    #[test]
    fn test_config_rejects_unknown_keys() {
        let err = EngineConfig::from_yaml("max_dept: 3\n").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
        assert!(EngineConfig::from_yaml("max_depth: 0\n").is_err());
    }

    #[test]
    fn test_unknown_start_rule() {
        let config = EngineConfig {
            start_rule: Some("missing".into()),
            ..EngineConfig::default()
        };
        let err = Engine::from_source("g", "a = 'x';", config).err().unwrap();
        assert_eq!(err.error_type(), ErrorType::Config);
    }

    #[test]
    fn test_empty_grammar_is_rejected() {
        let err = Engine::from_source("g", "\n", EngineConfig::default()).err().unwrap();
        assert_eq!(err.error_type(), ErrorType::Grammar);
    }

    #[test]
    fn test_start_rule_defaults_to_first() {
        let engine = Engine::from_source("g", "b = a; a = 'x';", EngineConfig::default()).unwrap();
        assert_eq!(engine.start_rule(), "b");
        assert!(engine.parse("x").is_ok());
        let value = engine.parse_rule("a", "x").unwrap();
        assert_eq!(value.as_record().unwrap().tag.as_deref(), Some("a"));
    }
}
