//! Run inputs: symbols, portfolios and tasks
//!
//! All three are immutable once constructed and cheap to clone, so they can
//! be handed to every worker of a run without copying the underlying text.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Maximum accepted length of a normalized symbol
const MAX_SYMBOL_LEN: usize = 32;

/// A case-normalized ticker identifier
///
/// # Example
///
/// ```
/// use hedge_core::Symbol;
///
/// let symbol = Symbol::parse(" nvda ").unwrap();
/// assert_eq!(symbol.as_str(), "NVDA");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Normalize and validate a raw ticker string
    ///
    /// Surrounding whitespace is trimmed and letters are upper-cased. The
    /// result must be non-empty, at most 32 characters, and made only of
    /// ASCII letters, digits and `. - ^ = /`.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_ascii_uppercase();

        if normalized.is_empty() {
            return Err(Error::InvalidSymbol("symbol is empty".to_string()));
        }

        if normalized.len() > MAX_SYMBOL_LEN {
            return Err(Error::InvalidSymbol(format!(
                "'{normalized}' exceeds {MAX_SYMBOL_LEN} characters"
            )));
        }

        if let Some(bad) = normalized
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=' | '/')))
        {
            return Err(Error::InvalidSymbol(format!(
                "'{normalized}' contains invalid character {bad:?}"
            )));
        }

        Ok(Self(normalized.into()))
    }

    /// Get the normalized ticker text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Symbol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0.to_string()
    }
}

/// An ordered, duplicate-free, non-empty set of symbols
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Portfolio {
    symbols: Vec<Symbol>,
}

impl Portfolio {
    /// Build a portfolio from raw ticker strings, preserving input order
    ///
    /// Fails with [`Error::InvalidSymbol`] when an entry cannot be
    /// normalized, and with [`Error::InvalidPortfolio`] when the list is
    /// empty or two entries normalize to the same symbol.
    pub fn new<I, S>(raw: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let symbols = raw
            .into_iter()
            .map(|s| Symbol::parse(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::from_symbols(symbols)
    }

    /// Build a portfolio from already-normalized symbols
    pub fn from_symbols(symbols: Vec<Symbol>) -> Result<Self> {
        if symbols.is_empty() {
            return Err(Error::InvalidPortfolio("portfolio is empty".to_string()));
        }

        let mut seen = HashSet::with_capacity(symbols.len());
        for symbol in &symbols {
            if !seen.insert(symbol) {
                return Err(Error::InvalidPortfolio(format!(
                    "duplicate symbol {symbol}"
                )));
            }
        }

        Ok(Self { symbols })
    }

    /// Symbols in the order they were supplied
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.symbols.contains(symbol)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Symbol> {
        self.symbols.iter()
    }
}

impl<'a> IntoIterator for &'a Portfolio {
    type Item = &'a Symbol;
    type IntoIter = std::slice::Iter<'a, Symbol>;

    fn into_iter(self) -> Self::IntoIter {
        self.symbols.iter()
    }
}

/// The natural-language instruction shared by every symbol of a run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Task(Arc<str>);

impl Task {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into().into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Task {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<&str> for Task {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<Task> for String {
    fn from(task: Task) -> Self {
        task.0.to_string()
    }
}
