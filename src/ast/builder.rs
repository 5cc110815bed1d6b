//! # AST Builder Module
//!
//! ## Purpose
//! Lowers the value tree the meta-grammar produces into the typed [`Grammar`]
//! AST. Field names follow the meta-grammar's captures (`rules`, `name`,
//! `cases`, `parts`, `field`, `stringify`, `term`, `suffix`, ...).
//!
//! ## Invariants
//! - Every node's span is the span of the record it was built from, except
//!   identifiers, whose span covers the name only (not trailing whitespace).
//! - A value tree that does not have the meta-grammar's shape is an
//!   [`PegError::Internal`] error, never a panic.

use crate::ast::value::{Record, Value};
use crate::ast::{
    ClassPart, ClassTerm, Grammar, Ident, LiteralTerm, Part, Quote, Rule, SequenceRule,
    SourceChar, Span, Suffix, Term, UnionRule,
};
use crate::{err_msg, PegError};

/// Builds a grammar AST from the value of the meta-grammar's start rule.
pub fn grammar_from_value(value: &Value) -> Result<Grammar, PegError> {
    let rec = record(value, &["grammar"])?;
    let rules = list(field(rec, "rules")?)?
        .iter()
        .map(rule)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Grammar {
        rules,
        span: span_of(rec),
    })
}

// ============================================================================
// NODE BUILDERS
// ============================================================================

fn rule(value: &Value) -> Result<Rule, PegError> {
    let rec = record(value, &["union", "sequence"])?;
    let name = ident(field(rec, "name")?)?;
    let span = span_of(rec);
    if rec.tag.as_deref() == Some("union") {
        let cases = list(field(rec, "cases")?)?
            .iter()
            .map(|case| ident(field(record(case, &["kase"])?, "kase")?))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Rule::Union(UnionRule { name, cases, span }))
    } else {
        let parts = list(field(rec, "parts")?)?
            .iter()
            .map(part)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Rule::Sequence(SequenceRule { name, parts, span }))
    }
}

fn part(value: &Value) -> Result<Part, PegError> {
    let rec = record(value, &["part"])?;
    let field_name = match field(rec, "field")? {
        Value::Absent => None,
        other => Some(ident(field(record(other, &["field"])?, "name")?)?),
    };
    let suffix = match field(rec, "suffix")? {
        Value::Absent => None,
        other => Some(suffix(text(field(record(other, &["suffix"])?, "suffix")?)?)?),
    };
    Ok(Part {
        field: field_name,
        stringify: !field(rec, "stringify")?.is_absent(),
        term: term(field(rec, "term")?)?,
        suffix,
        span: span_of(rec),
    })
}

fn suffix(symbol: &str) -> Result<Suffix, PegError> {
    match symbol {
        "+" => Ok(Suffix::OneOrMore),
        "*" => Ok(Suffix::ZeroOrMore),
        "?" => Ok(Suffix::Optional),
        other => Err(err_msg!(Internal, "unknown repetition suffix '{}'", other)),
    }
}

fn term(value: &Value) -> Result<Term, PegError> {
    let rec = record(value, &["ref", "klass", "string1", "string2"])?;
    let span = span_of(rec);
    match rec.tag.as_deref() {
        Some("ref") => Ok(Term::Ref(ident(field(rec, "name")?)?)),
        Some("klass") => {
            let parts = list(field(rec, "parts")?)?
                .iter()
                .map(class_part)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Term::Class(ClassTerm {
                inverted: !field(rec, "inverted")?.is_absent(),
                parts,
                span,
            }))
        }
        _ => {
            let quote = if rec.tag.as_deref() == Some("string1") {
                Quote::Single
            } else {
                Quote::Double
            };
            let chars = list(field(rec, "chars")?)?
                .iter()
                .map(source_char)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Term::Literal(LiteralTerm { quote, chars, span }))
        }
    }
}

fn class_part(value: &Value) -> Result<ClassPart, PegError> {
    let rec = record(value, &["range", "single"])?;
    if rec.tag.as_deref() == Some("range") {
        Ok(ClassPart::Range {
            from: source_char(field(rec, "from")?)?,
            to: source_char(field(rec, "to")?)?,
            span: span_of(rec),
        })
    } else {
        Ok(ClassPart::Single(source_char(field(rec, "char")?)?))
    }
}

/// A class or string character: the `*Simple` rules yield raw characters, the
/// `*Escape` rules the character after the backslash.
fn source_char(value: &Value) -> Result<SourceChar, PegError> {
    let rec = record(
        value,
        &[
            "classCharSimple",
            "classCharEscape",
            "string1CharSimple",
            "string1CharEscape",
            "string2CharSimple",
            "string2CharEscape",
        ],
    )?;
    let raw = text(field(rec, "char")?)?;
    let mut chars = raw.chars();
    let ch = match (chars.next(), chars.next()) {
        (Some(ch), None) => ch,
        _ => return Err(err_msg!(Internal, "expected a single character, found {:?}", raw)),
    };
    let span = span_of(rec);
    if rec.tag.as_deref().is_some_and(|tag| tag.ends_with("Escape")) {
        Ok(SourceChar::escaped(ch, span))
    } else {
        Ok(SourceChar::raw(ch, span))
    }
}

fn ident(value: &Value) -> Result<Ident, PegError> {
    let rec = record(value, &["ident"])?;
    let name = text(field(rec, "name")?)?.to_string();
    let start = span_of(rec).start;
    Ok(Ident {
        span: Span::new(start, start + name.len()),
        name,
    })
}

// ============================================================================
// VALUE ACCESS
// ============================================================================

fn record<'v>(value: &'v Value, tags: &[&str]) -> Result<&'v Record, PegError> {
    match value {
        Value::Record(rec) if rec.tag.as_deref().is_some_and(|t| tags.contains(&t)) => Ok(rec),
        other => Err(err_msg!(
            Internal,
            "malformed grammar value: expected {}, found {}",
            tags.join(" or "),
            describe(other)
        )),
    }
}

fn field<'v>(rec: &'v Record, name: &str) -> Result<&'v Value, PegError> {
    rec.get(name).ok_or_else(|| {
        err_msg!(
            Internal,
            "malformed grammar value: {} has no field '{}'",
            rec.tag.as_deref().unwrap_or("record"),
            name
        )
    })
}

fn list(value: &Value) -> Result<&[Value], PegError> {
    value
        .as_list()
        .ok_or_else(|| err_msg!(Internal, "malformed grammar value: expected a list, found {}", describe(value)))
}

fn text(value: &Value) -> Result<&str, PegError> {
    value
        .as_text()
        .ok_or_else(|| err_msg!(Internal, "malformed grammar value: expected text, found {}", describe(value)))
}

fn span_of(rec: &Record) -> Span {
    rec.span.unwrap_or_default()
}

fn describe(value: &Value) -> String {
    match value {
        Value::Record(Record { tag: Some(tag), .. }) => format!("record '{tag}'"),
        other => other.type_name().to_lowercase(),
    }
}

#[cfg(test)]
mod builder_tests {
    use super::*;

    fn tagged(tag: &str, from: usize, to: usize, fields: Vec<(&str, Value)>) -> Value {
        let mut rec = Record::new();
        for (name, value) in fields {
            rec.insert(name, value);
        }
        rec.tag = Some(tag.to_string());
        rec.span = Some(Span::new(from, to));
        Value::Record(rec)
    }

    fn ident_value(name: &str, from: usize) -> Value {
        tagged(
            "ident",
            from,
            from + name.len() + 1,
            vec![("name", Value::Text(name.to_string()))],
        )
    }

    #[test]
    fn test_union_rule() {
        let union = tagged(
            "union",
            0,
            8,
            vec![
                ("name", ident_value("t", 0)),
                (
                    "cases",
                    Value::List(vec![tagged("kase", 4, 6, vec![("kase", ident_value("a", 4))])]),
                ),
            ],
        );
        let grammar = tagged("grammar", 0, 8, vec![("rules", Value::List(vec![union]))]);
        let grammar = grammar_from_value(&grammar).unwrap();
        match &grammar.rules[0] {
            Rule::Union(u) => {
                assert_eq!(u.name.span, Span::new(0, 1));
                assert_eq!(u.cases[0].name, "a");
            }
            other => panic!("expected union, got {other:?}"),
        }
    }

    #[test]
    fn test_wrong_shape_is_internal_error() {
        let err = grammar_from_value(&Value::Text("x".into())).unwrap_err();
        assert_eq!(err.error_type(), crate::diagnostics::ErrorType::Internal);
        assert!(err.message().contains("expected grammar"));
    }

    #[test]
    fn test_escaped_char() {
        let value = tagged(
            "string2CharEscape",
            3,
            5,
            vec![("char", Value::Text("n".into()))],
        );
        let ch = source_char(&value).unwrap();
        assert!(ch.escaped);
        assert_eq!(ch.value(), '\n');
        assert_eq!(ch.span, Span::new(3, 5));
    }
}
