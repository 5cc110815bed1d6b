//! Static field-type descriptions of a grammar, and the schema report built
//! from them.
//!
//! [`describe`] walks the AST exactly like the execution compiler, so the
//! fields of each [`TypeDecl::Record`] are the fields the plain interpreter
//! captures for that rule.

use std::fmt;

use serde::Serialize;

use crate::ast::value::{FROM_KEY, TO_KEY};
use crate::ast::{Grammar, Part, Rule, Suffix, Term};
use crate::engine::SchemaConfig;

/// The static type of one captured field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "of", rename_all = "lowercase")]
pub enum FieldType {
    /// Matched or stringified text.
    Text,
    /// The value of another rule.
    Ref(String),
    List(Box<FieldType>),
    Optional(Box<FieldType>),
    /// A byte offset (`$from`, `$to`).
    Offset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
}

/// The type produced by one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypeDecl {
    /// A sequence rule: a tagged record.
    Record { rule: String, fields: Vec<Field> },
    /// A union rule: one of the cases' types.
    Union { rule: String, cases: Vec<String> },
}

impl TypeDecl {
    pub fn rule(&self) -> &str {
        match self {
            TypeDecl::Record { rule, .. } | TypeDecl::Union { rule, .. } => rule,
        }
    }

    /// Field names of a record declaration, in capture order.
    pub fn field_names(&self) -> Vec<&str> {
        match self {
            TypeDecl::Record { fields, .. } => fields.iter().map(|f| f.name.as_str()).collect(),
            TypeDecl::Union { .. } => Vec::new(),
        }
    }
}

/// Describes the value type of every rule, in declaration order.
pub fn describe(grammar: &Grammar) -> Vec<TypeDecl> {
    grammar.rules.iter().map(describe_rule).collect()
}

fn describe_rule(rule: &Rule) -> TypeDecl {
    match rule {
        Rule::Sequence(seq) => {
            let mut fields: Vec<Field> = Vec::new();
            for (name, ty) in seq.parts.iter().filter_map(describe_part) {
                // A repeated field name overwrites the earlier capture in place.
                match fields.iter_mut().find(|f| f.name == name) {
                    Some(field) => field.ty = ty,
                    None => fields.push(Field { name, ty }),
                }
            }
            TypeDecl::Record {
                rule: seq.name.name.clone(),
                fields,
            }
        }
        Rule::Union(union) => TypeDecl::Union {
            rule: union.name.name.clone(),
            cases: union.cases.iter().map(|c| c.name.clone()).collect(),
        },
    }
}

fn describe_part(part: &Part) -> Option<(String, FieldType)> {
    let field = part.field.as_ref()?;
    if part.stringify {
        return Some((field.name.clone(), FieldType::Text));
    }
    let base = match &part.term {
        Term::Ref(ident) => FieldType::Ref(ident.name.clone()),
        Term::Class(_) | Term::Literal(_) => FieldType::Text,
    };
    let ty = match part.suffix {
        Some(Suffix::OneOrMore) | Some(Suffix::ZeroOrMore) => FieldType::List(Box::new(base)),
        Some(Suffix::Optional) => FieldType::Optional(Box::new(base)),
        None => base,
    };
    Some((field.name.clone(), ty))
}

// ============================================================================
// REPORT
// ============================================================================

/// The type name a rule is declared under: its name with the first letter
/// upper-cased.
pub fn type_name(rule: &str) -> String {
    let mut chars = rule.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Text => write!(f, "string"),
            FieldType::Offset => write!(f, "number"),
            FieldType::Ref(rule) => write!(f, "{}", type_name(rule)),
            FieldType::List(item) => match **item {
                FieldType::Optional(_) => write!(f, "({item})[]"),
                _ => write!(f, "{item}[]"),
            },
            FieldType::Optional(inner) => write!(f, "{inner} | null"),
        }
    }
}

/// Renders declarations as TypeScript-like source.
///
/// ```rust
/// use pegtrace::compiler::types::{render_report, TypeDecl};
/// use pegtrace::engine::SchemaConfig;
/// let decls = vec![TypeDecl::Union { rule: "term".into(), cases: vec!["ref".into(), "klass".into()] }];
/// let report = render_report(&decls, &SchemaConfig::default());
/// assert_eq!(report, "export type Term = Ref | Klass;\n");
/// ```
pub fn render_report(decls: &[TypeDecl], config: &SchemaConfig) -> String {
    let mut lines = Vec::new();
    for (i, decl) in decls.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        match decl {
            TypeDecl::Record { rule, fields } => {
                lines.push(format!("export interface {} {{", type_name(rule)));
                // A field sharing a reserved key replaces the tag; the offsets replace the field.
                if !fields.iter().any(|f| f.name == config.tag_field) {
                    lines.push(format!("    {}: {:?};", config.tag_field, rule));
                }
                for field in fields {
                    if config.include_offsets && (field.name == FROM_KEY || field.name == TO_KEY) {
                        continue;
                    }
                    lines.push(format!("    {}: {};", field.name, field.ty));
                }
                if config.include_offsets {
                    lines.push(format!("    $from: {};", FieldType::Offset));
                    lines.push(format!("    $to: {};", FieldType::Offset));
                }
                lines.push("}".to_string());
            }
            TypeDecl::Union { rule, cases } => {
                let cases: Vec<String> = cases.iter().map(|c| type_name(c)).collect();
                lines.push(format!("export type {} = {};", type_name(rule), cases.join(" | ")));
            }
        }
    }
    let mut out = String::new();
    for line in lines {
        out.push_str(&truncate(&line, config.max_width));
        out.push('\n');
    }
    out
}

fn truncate(line: &str, max_width: Option<usize>) -> String {
    match max_width {
        Some(width) if line.chars().count() > width => {
            let keep = width.saturating_sub(3);
            let mut cut: String = line.chars().take(keep).collect();
            cut.push_str("...");
            cut
        }
        _ => line.to_string(),
    }
}
