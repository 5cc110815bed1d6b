//! # pegtrace Test Helpers
//!
//! Grammars shared by the integration tests, and shortcuts for loading them.

#![allow(dead_code)]

use pegtrace::engine::{Engine, EngineConfig};

/// `greeting = "hi" _ name:$[a-z]+ ;` with a whitespace rule.
pub const GREETING: &str = "greeting = \"hi\" _ name:$[a-z]+ ;\n_ = [ ]*;\n";

/// The same greeting, capturing the name as a list of characters.
///
/// Departs on purpose from the documented greeting example, where the
/// capture is written without `$` yet yields `"alice"`: an unstringified
/// class repetition yields one text per character, and `$` yields the text.
pub const GREETING_CHARS: &str = "greeting = \"hi\" _ name:[a-z]+ ;\n_ = [ ]*;\n";

/// A union tried in order: `ref` first, then `klass`.
pub const TERMS: &str = r#"term : ref klass;
ref = name:$[a-z]+ "!";
klass = "[" body:$[a-z]* "]";
"#;

/// A small arithmetic-like grammar with recursion, optionals and lists.
pub const LISTS: &str = r#"list = "(" _ items:item* ")" _;
item : list atom;
atom = text:$[a-z0-9]+ _ mark:"?"?;
_ = [ \t\n]*;
"#;

pub fn engine(grammar: &str) -> Engine {
    Engine::from_source("test.peg", grammar, EngineConfig::default())
        .unwrap_or_else(|e| panic!("grammar failed to load: {e:?}"))
}

pub fn engine_from(grammar: &str, start: &str) -> Engine {
    let config = EngineConfig {
        start_rule: Some(start.to_string()),
        ..EngineConfig::default()
    };
    Engine::from_source("test.peg", grammar, config)
        .unwrap_or_else(|e| panic!("grammar failed to load: {e:?}"))
}
