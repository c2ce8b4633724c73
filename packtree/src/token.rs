//! Terminal matchers: literal strings, compiled regular expressions, and
//! user-supplied scanner callbacks.

use std::fmt::{self, Debug};

use regex::Regex;

/// Signature of a user-supplied scanner: given the whole input and a byte
/// offset, return the number of bytes matched, or [None] for no match.
pub type ScanFn = Box<dyn Fn(&str, usize) -> Option<usize> + Send + Sync>;

/// How a terminal recognizes input at an offset.
pub enum Matcher {
    /// A static string, matched by prefix equality.
    Literal(String),
    /// A compiled regular expression, anchored at the current offset.
    Pattern(Regex),
    /// A host-language callback.
    Scan(ScanFn),
}

impl Matcher {
    /// Compile `pattern` into an anchored regex matcher.
    ///
    /// The pattern is wrapped as `\A(?:pattern)` so that matching against
    /// the input tail can never skip ahead of the offset.
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        let anchored = format!(r"\A(?:{})", pattern);
        Ok(Matcher::Pattern(Regex::new(&anchored)?))
    }

    /// Scan the input at `offset`.
    ///
    /// Returns the length of the matched region, which is always positive:
    /// zero-length matches count as failure, so a nullable pattern cannot
    /// loop under repetition.
    pub fn scan(&self, input: &str, offset: usize) -> Option<usize> {
        let len = match self {
            Matcher::Literal(lit) => input[offset..].starts_with(lit.as_str()).then(|| lit.len()),
            Matcher::Pattern(re) => re.find(&input[offset..]).map(|m| m.end()),
            // The callback's answer is taken verbatim, clamped to the input.
            Matcher::Scan(f) => f(input, offset).map(|n| n.min(input.len() - offset)),
        };

        len.filter(|&n| n > 0)
    }
}

impl Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Literal(lit) => write!(f, "Literal({:?})", lit),
            Matcher::Pattern(re) => write!(f, "Pattern({:?})", re.as_str()),
            Matcher::Scan(_) => write!(f, "Scan(..)"),
        }
    }
}
