// tests/compiler_tests.rs

mod common;

use common::{engine, GREETING, LISTS};
use miette::Report;
use pegtrace::ast::value::Value;
use pegtrace::ast::{Rule, Span, Term};
use pegtrace::compiler::types::{describe, FieldType, TypeDecl};
use pegtrace::compiler::{compile, unresolved_references};
use pegtrace::engine::{Engine, EngineConfig, SchemaConfig};
use pegtrace::runtime::interp::Interpreter;
use pegtrace::runtime::step::Stepper;
use pegtrace::syntax::meta::{self, META_GRAMMAR, START_RULE};
use pegtrace::syntax::parser::{bootstrap, parse_grammar, parse_grammar_with};
use pegtrace::ErrorType;

// ---
// Bootstrap
// ---

#[test]
fn test_meta_grammar_is_a_fixed_point() {
    let hand_built = bootstrap().unwrap();
    let first = parse_grammar_with(&hand_built, "meta", META_GRAMMAR).unwrap();
    let compiled = compile(&first, Interpreter).unwrap();
    let second = parse_grammar_with(&compiled, "meta", META_GRAMMAR).unwrap();
    assert_eq!(first, second);

    let recompiled = compile(&second, Interpreter).unwrap();
    let third = parse_grammar_with(&recompiled, "meta", META_GRAMMAR).unwrap();
    assert_eq!(second, third);
}

#[test]
fn test_meta_grammar_prints_back_verbatim() {
    let grammar = parse_grammar(META_GRAMMAR).unwrap();
    assert_eq!(grammar.to_string(), META_GRAMMAR);
}

#[test]
fn test_meta_grammar_under_the_stepper() {
    let hand_built = meta::build(Stepper).unwrap();
    let trace = hand_built.trace(START_RULE, META_GRAMMAR).unwrap();
    assert!(trace.verdict.is_accepted());

    let compiled = compile(&parse_grammar(META_GRAMMAR).unwrap(), Stepper).unwrap();
    let again = compiled.trace(START_RULE, META_GRAMMAR).unwrap();
    assert_eq!(again.verdict, trace.verdict);
}

#[test]
fn test_grammar_spans_point_into_text() {
    let text = "greeting = \"hi\" _ name:$[a-z]+ ;\n_ = [ ]*;\n";
    let grammar = parse_grammar(text).unwrap();
    let Rule::Sequence(seq) = &grammar.rules[0] else {
        panic!("expected a sequence");
    };
    assert_eq!(seq.name.span, Span::new(0, 8));
    let name = &seq.parts[2];
    let field = name.field.as_ref().unwrap();
    assert_eq!(&text[field.span.start..field.span.end], "name");
    assert!(matches!(name.term, Term::Class(_)));
    assert!(text[name.span.start..name.span.end].starts_with("name:$[a-z]+"));
}

// ---
// Compile errors
// ---

#[test]
fn test_duplicate_rule_reported_against_grammar_text() {
    let err = Engine::from_source("dup.peg", "a = 'x';\na = 'y';\n", EngineConfig::default())
        .err()
        .unwrap();
    assert_eq!(err.error_type(), ErrorType::Grammar);
    assert_eq!(err.span(), Some(Span::new(9, 10)));
    let rendered = format!("{:?}", Report::new(err));
    assert!(rendered.contains("first declared here"));
    assert!(rendered.contains("dup.peg"));
}

#[test]
fn test_inverted_range_reported_with_part_span() {
    let err = Engine::from_source("g", "a = [z-a];\n", EngineConfig::default())
        .err()
        .unwrap();
    assert_eq!(err.error_type(), ErrorType::Grammar);
    assert_eq!(err.span(), Some(Span::new(5, 8)));
}

#[test]
fn test_syntax_error_names_the_grammar_file() {
    let err = Engine::from_source("broken.peg", "a = 'x'\n", EngineConfig::default())
        .err()
        .unwrap();
    assert_eq!(err.error_type(), ErrorType::Parse);
    assert!(format!("{:?}", Report::new(err)).contains("broken.peg"));
}

#[test]
fn test_unresolved_references_do_not_block_compilation() {
    let grammar = parse_grammar("a = b c;\nb = 'x';\n").unwrap();
    let missing: Vec<_> = unresolved_references(&grammar)
        .into_iter()
        .map(|i| i.name.clone())
        .collect();
    assert_eq!(missing, vec!["c"]);
    let compiled = compile(&grammar, Interpreter).unwrap();
    assert_eq!(compiled.names().collect::<Vec<_>>(), vec!["a", "b"]);
    assert!(compiled.rule("a").is_ok());
    assert!(compiled.rule("c").is_err());
}

// ---
// Type descriptions
// ---

#[test]
fn test_describe_greeting() {
    let grammar = parse_grammar(GREETING).unwrap();
    let decls = describe(&grammar);
    assert_eq!(
        decls[0],
        TypeDecl::Record {
            rule: "greeting".into(),
            fields: vec![pegtrace::compiler::types::Field {
                name: "name".into(),
                ty: FieldType::Text,
            }],
        }
    );
    assert!(decls[1].field_names().is_empty());
}

#[test]
fn test_describe_suffixes_and_unions() {
    let grammar = parse_grammar(LISTS).unwrap();
    let decls = describe(&grammar);
    let list = decls.iter().find(|d| d.rule() == "list").unwrap();
    let TypeDecl::Record { fields, .. } = list else {
        panic!("expected a record");
    };
    assert_eq!(fields[0].ty, FieldType::List(Box::new(FieldType::Ref("item".into()))));
    let item = decls.iter().find(|d| d.rule() == "item").unwrap();
    assert_eq!(
        item,
        &TypeDecl::Union {
            rule: "item".into(),
            cases: vec!["list".into(), "atom".into()],
        }
    );
}

fn check_fields(value: &Value, decls: &[TypeDecl]) {
    match value {
        Value::Record(record) => {
            let tag = record.tag.as_deref().unwrap();
            let decl = decls.iter().find(|d| d.rule() == tag).unwrap();
            assert_eq!(record.field_names(), decl.field_names(), "fields of {tag}");
            for (_, child) in record.fields() {
                check_fields(child, decls);
            }
        }
        Value::List(items) => items.iter().for_each(|v| check_fields(v, decls)),
        _ => {}
    }
}

#[test]
fn test_described_fields_match_parsed_fields() {
    let engine = engine(LISTS);
    let value = engine.parse("(a (b c?) (d) e?)").unwrap();
    check_fields(&value, &engine.schema());

    let meta_value = bootstrap().unwrap().parse(START_RULE, META_GRAMMAR).unwrap();
    check_fields(&meta_value, &describe(&parse_grammar(META_GRAMMAR).unwrap()));
}

#[test]
fn test_schema_report() {
    let config = EngineConfig {
        schema: SchemaConfig {
            include_offsets: false,
            ..SchemaConfig::default()
        },
        ..EngineConfig::default()
    };
    let engine = Engine::from_source("g", "pair = k:$key \"=\" v:value?;\nkey = [a-z];\nvalue : key;\n", config).unwrap();
    assert_eq!(
        engine.schema_report(),
        "export interface Pair {\n    type: \"pair\";\n    k: string;\n    v: Value | null;\n}\n\n\
         export interface Key {\n    type: \"key\";\n}\n\n\
         export type Value = Key;\n"
    );
}

#[test]
fn test_field_named_like_the_tag() {
    let engine = engine("a = type:\"x\";");
    assert_eq!(
        engine.parse("x").unwrap().to_json(),
        r#"{"type":"x","$from":0,"$to":1}"#
    );
    let report = engine.schema_report();
    assert!(report.contains("    type: string;\n"));
    assert!(!report.contains("\"a\""));
}
