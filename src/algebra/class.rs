//! Character classes: `[a-z_]`, `[^"\\]`.

use std::fmt;

/// One member of a character class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassItem {
    Single(char),
    /// Inclusive on both ends.
    Range(char, char),
}

/// A set of characters, optionally negated, matching exactly one character.
///
/// # Examples
///
/// ```rust
/// use pegtrace::algebra::CharClass;
/// let ident_start = CharClass::new().range('a', 'z').range('A', 'Z').chars("_");
/// assert!(ident_start.matches('q'));
/// assert!(ident_start.matches('_'));
/// assert!(!ident_start.matches('1'));
///
/// let not_quote = CharClass::new().chars("\"\\").negated();
/// assert!(not_quote.matches('x'));
/// assert!(!not_quote.matches('"'));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CharClass {
    negated: bool,
    items: Vec<ClassItem>,
}

impl CharClass {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every character of `set` as a single member.
    pub fn chars(mut self, set: &str) -> Self {
        self.items.extend(set.chars().map(ClassItem::Single));
        self
    }

    /// Adds an inclusive range. Callers are responsible for `from <= to`;
    /// an inverted range matches nothing.
    pub fn range(mut self, from: char, to: char) -> Self {
        self.items.push(ClassItem::Range(from, to));
        self
    }

    pub fn item(mut self, item: ClassItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn negated(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn items(&self) -> &[ClassItem] {
        &self.items
    }

    pub fn matches(&self, ch: char) -> bool {
        let hit = self.items.iter().any(|item| match *item {
            ClassItem::Single(c) => c == ch,
            ClassItem::Range(from, to) => from <= ch && ch <= to,
        });
        hit != self.negated
    }
}

fn write_class_char(f: &mut fmt::Formatter<'_>, ch: char) -> fmt::Result {
    match ch {
        '\\' | '[' | ']' | '^' | '-' => write!(f, "\\{ch}"),
        '\r' => write!(f, "\\r"),
        '\n' => write!(f, "\\n"),
        '\t' => write!(f, "\\t"),
        other => write!(f, "{other}"),
    }
}

/// Renders the class in grammar syntax, escaping where needed.
impl fmt::Display for CharClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        if self.negated {
            write!(f, "^")?;
        }
        for item in &self.items {
            match *item {
                ClassItem::Single(c) => write_class_char(f, c)?,
                ClassItem::Range(from, to) => {
                    write_class_char(f, from)?;
                    write!(f, "-")?;
                    write_class_char(f, to)?;
                }
            }
        }
        write!(f, "]")
    }
}
