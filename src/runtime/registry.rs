//!
//! Rule registry: binds rule names to the terms of one interpretation.
//!
//! ## Two-phase population
//! 1. Every rule name is **declared** first, leaving an empty, once-initialized
//!    slot behind.
//! 2. Each rule's term is then **defined** into its slot. Terms refer to other
//!    rules only by name (see [`Algebra::rule_call`](crate::algebra::Algebra::rule_call)),
//!    so the order of definition does not matter and recursion needs no
//!    special handling.
//!
//! ## Registry Invariant
//! Once every declared slot is defined, the registry is read-only. Lookups of
//! unknown or still-undefined names fail with [`PegError::UnresolvedRule`] at
//! the moment a rule call executes, never while terms are being built.
//!
//! ```rust
//! use pegtrace::runtime::registry::RuleRegistry;
//! let mut registry: RuleRegistry<u32> = RuleRegistry::new();
//! registry.declare("a").unwrap();
//! registry.declare("b").unwrap();
//! registry.define("b", 2).unwrap();
//! assert!(!registry.is_complete());
//! registry.define("a", 1).unwrap();
//! assert_eq!(*registry.resolve("a").unwrap(), 1);
//! assert!(registry.resolve("c").is_err());
//! ```

use std::collections::HashMap;

use once_cell::unsync::OnceCell;

use crate::{err_msg, PegError};

/// Name → once-initialized term, in declaration order.
#[derive(Debug)]
pub struct RuleRegistry<T> {
    slots: HashMap<String, OnceCell<T>>,
    order: Vec<String>,
}

impl<T> Default for RuleRegistry<T> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
            order: Vec::new(),
        }
    }
}

// ============================================================================
// Public API Implementation
// ============================================================================

impl<T> RuleRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a rule name, leaving its term undefined.
    ///
    /// # Errors
    /// Returns a [`PegError::Grammar`] if the name is already declared.
    pub fn declare(&mut self, name: &str) -> Result<(), PegError> {
        if self.slots.contains_key(name) {
            return Err(err_msg!(Grammar, "duplicate rule '{}'", name));
        }
        self.slots.insert(name.to_string(), OnceCell::new());
        self.order.push(name.to_string());
        Ok(())
    }

    /// Defines the term of a declared rule. Each rule is defined exactly once.
    pub fn define(&self, name: &str, term: T) -> Result<(), PegError> {
        let slot = self
            .slots
            .get(name)
            .ok_or_else(|| err_msg!(Internal, "rule '{}' defined before being declared", name))?;
        slot.set(term)
            .map_err(|_| err_msg!(Grammar, "rule '{}' is defined twice", name))?;
        tracing::trace!(rule = name, "rule defined");
        Ok(())
    }

    /// Resolves a rule name to its term.
    ///
    /// # Errors
    /// Returns a [`PegError::UnresolvedRule`] if the name was never declared
    /// or its term has not been defined yet.
    pub fn resolve(&self, name: &str) -> Result<&T, PegError> {
        let unresolved = || PegError::UnresolvedRule {
            message: name.to_string(),
            ctx: crate::ErrorContext::none(),
            source: None,
        };
        self.slots
            .get(name)
            .and_then(OnceCell::get)
            .ok_or_else(unresolved)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// True once every declared rule has a term.
    pub fn is_complete(&self) -> bool {
        self.slots.values().all(|slot| slot.get().is_some())
    }

    /// Rule names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
