//! The meta-grammar: the grammar of grammar documents.
//!
//! [`META_GRAMMAR`] is its textual form. [`build`] constructs the same grammar
//! by hand, directly against the algebra, which is how the engine reads its
//! first grammar before any compiler output exists. Compiling the parsed
//! [`META_GRAMMAR`] reproduces [`build`]'s behavior exactly, so either
//! instance parses grammar text into the same AST.

use crate::algebra::{Algebra, CharClass};
use crate::compiler::Compiled;
use crate::PegError;

/// The rule a grammar document is parsed from.
pub const START_RULE: &str = "grammar";

/// Textual form of the meta-grammar.
pub const META_GRAMMAR: &str = r#"grammar = _ rules:rule+;
rule : union sequence;
union = name:ident ":" _ cases:kase+ ";" _;
kase = kase:ident;
sequence = name:ident "=" _ parts:part+ ";" _;
part = field:field? stringify:"$"? term:term suffix:suffix?;
field = name:ident ":" _;
suffix = suffix:[+*?] _;
term : ref klass string1 string2;
ref = name:ident;
klass = "[" inverted:inverted? parts:classPart* "]" _;
inverted = "^";
classPart : range single;
range = from:classChar "-" to:classChar;
single = char:classChar;
classChar : classCharEscape classCharSimple;
classCharSimple = char:[^\\\[\]];
classCharEscape = "\\" char:[\\\[\]rnt^-];
string1 = "'" chars:string1Char* "'" _;
string1Char : string1CharEscape string1CharSimple;
string1CharSimple = char:[^'\\\r\n\t];
string1CharEscape = "\\" char:['\\rnt];
string2 = '"' chars:string2Char* '"' _;
string2Char : string2CharEscape string2CharSimple;
string2CharSimple = char:[^"\\\r\n\t];
string2CharEscape = "\\" char:["\\rnt];
ident = name:$identName _;
identName = [a-zA-Z_] [a-zA-Z0-9_]*;
_ = [ \t\r\n]*;
"#;

type Parts<T> = Vec<(Option<&'static str>, T)>;

struct MetaBuilder<'a, A: Algebra> {
    alg: &'a A,
    rules: Vec<(&'static str, A::Term)>,
}

impl<'a, A: Algebra> MetaBuilder<'a, A> {
    fn sequence(&mut self, name: &'static str, parts: Parts<A::Term>) {
        let alg = self.alg;
        let body = parts
            .into_iter()
            .fold(alg.empty(), |acc, (field, term)| match field {
                Some(field) => alg.sequence_append_named(acc, field, term),
                None => alg.sequence_append(acc, term),
            });
        self.rules.push((name, alg.tagged_rule(name, body)));
    }

    fn union(&mut self, name: &'static str, cases: &[&str]) {
        let alg = self.alg;
        let body = cases
            .iter()
            .fold(alg.never_match(), |acc, case| alg.or_else(acc, alg.rule_call(case)));
        self.rules.push((name, alg.untagged_rule(name, body)));
    }

    fn call(&self, name: &str) -> A::Term {
        self.alg.rule_call(name)
    }

    fn lit(&self, value: &str) -> A::Term {
        self.alg.literal(value)
    }

    fn class(&self, class: CharClass) -> A::Term {
        self.alg.char_class(class)
    }

    /// `"<open>" chars:<char_rule>* "<close>" _`
    fn quoted(&mut self, name: &'static str, quote: &str, char_rule: &str) {
        let alg = self.alg;
        let parts = vec![
            (None, self.lit(quote)),
            (Some("chars"), alg.zero_or_more(self.call(char_rule))),
            (None, self.lit(quote)),
            (None, self.call("_")),
        ];
        self.sequence(name, parts);
    }

    /// `<name> = char:[<class>];`
    fn char_rule(&mut self, name: &'static str, class: CharClass) {
        let parts = vec![(Some("char"), self.class(class))];
        self.sequence(name, parts);
    }

    /// `<name> = "\\" char:[<class>];`
    fn escape_rule(&mut self, name: &'static str, class: CharClass) {
        let parts = vec![(None, self.lit("\\")), (Some("char"), self.class(class))];
        self.sequence(name, parts);
    }
}

/// Builds the meta-grammar against `algebra`.
pub fn build<A: Algebra>(algebra: A) -> Result<Compiled<A>, PegError> {
    let rules = {
        let mut m = MetaBuilder {
            alg: &algebra,
            rules: Vec::new(),
        };
        let alg = &algebra;

        let parts = vec![
            (None, m.call("_")),
            (Some("rules"), alg.one_or_more(m.call("rule"))),
        ];
        m.sequence("grammar", parts);
        m.union("rule", &["union", "sequence"]);
        let parts = vec![
            (Some("name"), m.call("ident")),
            (None, m.lit(":")),
            (None, m.call("_")),
            (Some("cases"), alg.one_or_more(m.call("kase"))),
            (None, m.lit(";")),
            (None, m.call("_")),
        ];
        m.sequence("union", parts);
        let parts = vec![(Some("kase"), m.call("ident"))];
        m.sequence("kase", parts);
        let parts = vec![
            (Some("name"), m.call("ident")),
            (None, m.lit("=")),
            (None, m.call("_")),
            (Some("parts"), alg.one_or_more(m.call("part"))),
            (None, m.lit(";")),
            (None, m.call("_")),
        ];
        m.sequence("sequence", parts);
        let parts = vec![
            (Some("field"), alg.optional(m.call("field"))),
            (Some("stringify"), alg.optional(m.lit("$"))),
            (Some("term"), m.call("term")),
            (Some("suffix"), alg.optional(m.call("suffix"))),
        ];
        m.sequence("part", parts);
        let parts = vec![
            (Some("name"), m.call("ident")),
            (None, m.lit(":")),
            (None, m.call("_")),
        ];
        m.sequence("field", parts);
        let parts = vec![
            (Some("suffix"), m.class(CharClass::new().chars("+*?"))),
            (None, m.call("_")),
        ];
        m.sequence("suffix", parts);
        m.union("term", &["ref", "klass", "string1", "string2"]);
        let parts = vec![(Some("name"), m.call("ident"))];
        m.sequence("ref", parts);

        let parts = vec![
            (None, m.lit("[")),
            (Some("inverted"), alg.optional(m.call("inverted"))),
            (Some("parts"), alg.zero_or_more(m.call("classPart"))),
            (None, m.lit("]")),
            (None, m.call("_")),
        ];
        m.sequence("klass", parts);
        let parts = vec![(None, m.lit("^"))];
        m.sequence("inverted", parts);
        m.union("classPart", &["range", "single"]);
        let parts = vec![
            (Some("from"), m.call("classChar")),
            (None, m.lit("-")),
            (Some("to"), m.call("classChar")),
        ];
        m.sequence("range", parts);
        let parts = vec![(Some("char"), m.call("classChar"))];
        m.sequence("single", parts);
        m.union("classChar", &["classCharEscape", "classCharSimple"]);
        m.char_rule("classCharSimple", CharClass::new().chars("\\[]").negated());
        m.escape_rule("classCharEscape", CharClass::new().chars("\\[]rnt^-"));

        m.quoted("string1", "'", "string1Char");
        m.union("string1Char", &["string1CharEscape", "string1CharSimple"]);
        m.char_rule("string1CharSimple", CharClass::new().chars("'\\\r\n\t").negated());
        m.escape_rule("string1CharEscape", CharClass::new().chars("'\\rnt"));
        m.quoted("string2", "\"", "string2Char");
        m.union("string2Char", &["string2CharEscape", "string2CharSimple"]);
        m.char_rule("string2CharSimple", CharClass::new().chars("\"\\\r\n\t").negated());
        m.escape_rule("string2CharEscape", CharClass::new().chars("\"\\rnt"));

        let parts = vec![
            (Some("name"), alg.stringify(m.call("identName"))),
            (None, m.call("_")),
        ];
        m.sequence("ident", parts);
        let parts = vec![
            (None, m.class(CharClass::new().range('a', 'z').range('A', 'Z').chars("_"))),
            (
                None,
                alg.zero_or_more(m.class(
                    CharClass::new()
                        .range('a', 'z')
                        .range('A', 'Z')
                        .range('0', '9')
                        .chars("_"),
                )),
            ),
        ];
        m.sequence("identName", parts);
        let parts = vec![(None, alg.zero_or_more(m.class(CharClass::new().chars(" \t\r\n"))))];
        m.sequence("_", parts);

        m.rules
    };
    tracing::debug!(rules = rules.len(), "meta-grammar built");
    Compiled::from_terms(algebra, rules)
}

#[cfg(test)]
mod meta_tests {
    use super::*;
    use crate::runtime::interp::Interpreter;

    #[test]
    fn test_meta_rules_match_text() {
        let meta = build(Interpreter).unwrap();
        let declared: Vec<&str> = META_GRAMMAR
            .lines()
            .filter_map(|line| line.split([' ', '=', ':']).next())
            .filter(|name| !name.is_empty())
            .collect();
        assert_eq!(meta.names().collect::<Vec<_>>(), declared);
        assert!(meta.rules().is_complete());
    }

    #[test]
    fn test_meta_accepts_small_grammar() {
        let meta = build(Interpreter).unwrap();
        let value = meta.parse(START_RULE, "a = \"x\" b:[^\\]]*; b : a;").unwrap();
        assert_eq!(value.as_record().unwrap().tag.as_deref(), Some("grammar"));
        assert_eq!(value.get("rules").unwrap().as_list().unwrap().len(), 2);
    }
}
