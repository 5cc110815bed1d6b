use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::fmt;

use crate::ast::Span;

/// A value produced by the plain interpreter.
///
/// # Examples
///
/// ```rust
/// use pegtrace::ast::value::Value;
/// let v = Value::Text("hi".to_string());
/// assert_eq!(v.type_name(), "Text");
/// assert_eq!(v.as_text(), Some("hi"));
/// assert!(Value::default().is_absent());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    /// An optional part that did not match.
    #[default]
    Absent,
    /// Matched text: a literal, a class character, or a stringified span.
    Text(String),
    /// The results of a repetition.
    List(Vec<Value>),
    /// The fields of a sequence, tagged once a rule wraps it.
    Record(Record),
}

/// Named fields captured by a sequence.
///
/// Fields keep their insertion order. A rule wrapping the sequence adds the
/// `tag` (rule name) and the `span` the rule matched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    pub tag: Option<String>,
    pub span: Option<Span>,
    fields: Vec<(String, Value)>,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Absent => "Absent",
            Value::Text(_) => "Text",
            Value::List(_) => "List",
            Value::Record(_) => "Record",
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Converts the value into a record; any other value yields an empty one.
    pub fn into_record(self) -> Record {
        match self {
            Value::Record(record) => record,
            _ => Record::default(),
        }
    }

    /// Looks up a field if this value is a record.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.as_record().and_then(|r| r.get(field))
    }

    /// Renders the value as compact JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field. A field with the same name is replaced in place.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// Records serialize as `{type, ...fields, $from, $to}`.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Absent => serializer.serialize_none(),
            Value::Text(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Record(record) => record.serialize(serializer),
        }
    }
}

/// Keys the record shape writes besides its fields.
pub const TAG_KEY: &str = "type";
pub const FROM_KEY: &str = "$from";
pub const TO_KEY: &str = "$to";

// A field named like the tag replaces it; the span replaces fields named like
// its bounds. Every key is written once.
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(tag) = &self.tag {
            if self.get(TAG_KEY).is_none() {
                map.serialize_entry(TAG_KEY, tag)?;
            }
        }
        for (name, value) in &self.fields {
            if self.span.is_some() && (name == FROM_KEY || name == TO_KEY) {
                continue;
            }
            map.serialize_entry(name, value)?;
        }
        if let Some(span) = self.span {
            map.serialize_entry(FROM_KEY, &span.start)?;
            map.serialize_entry(TO_KEY, &span.end)?;
        }
        map.end()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Absent => write!(f, "null"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Record(record) => {
                if let Some(tag) = &record.tag {
                    write!(f, "{tag} ")?;
                }
                write!(f, "{{")?;
                for (i, (name, value)) in record.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {name}: {value}")?;
                }
                if !record.fields.is_empty() {
                    write!(f, " ")?;
                }
                write!(f, "}}")
            }
        }
    }
}
