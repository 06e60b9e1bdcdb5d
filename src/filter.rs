//! URL filtering.
//!
//! Decides whether an exchange is logged at all by matching its reconstructed
//! URL against an ignore set and an allow set.

use regex::Regex;

use crate::error::ConfigError;

/// A single match rule.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Unanchored regular expression search
    Regex(Regex),
    /// Plain substring containment
    Literal(String),
}

impl Pattern {
    /// Compile `pattern` as a regular expression.
    pub fn regex(pattern: &str) -> Result<Self, ConfigError> {
        Regex::new(pattern)
            .map(Pattern::Regex)
            .map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    /// Match `text` literally, without interpreting regex metacharacters.
    pub fn literal(text: impl Into<String>) -> Self {
        Pattern::Literal(text.into())
    }

    pub fn is_match(&self, url: &str) -> bool {
        match self {
            Pattern::Regex(re) => re.is_match(url),
            Pattern::Literal(text) => url.contains(text.as_str()),
        }
    }
}

impl From<Regex> for Pattern {
    fn from(re: Regex) -> Self {
        Pattern::Regex(re)
    }
}

/// Ordered collection of patterns.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile every entry of `patterns` as a regular expression.
    ///
    /// Fails on the first pattern that does not compile.
    pub fn from_regexes<I, P>(patterns: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Pattern::regex(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn push(&mut self, pattern: Pattern) {
        self.patterns.push(pattern);
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// True if any pattern matches `url`.
    pub fn matches(&self, url: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(url))
    }
}

impl FromIterator<Pattern> for PatternSet {
    fn from_iter<T: IntoIterator<Item = Pattern>>(iter: T) -> Self {
        Self {
            patterns: iter.into_iter().collect(),
        }
    }
}

/// Ignore/allow decision over a URL.
///
/// The ignore set always wins. An empty allow set lets everything through.
#[derive(Debug, Clone, Copy)]
pub struct UrlFilter<'a> {
    pub ignore: &'a PatternSet,
    pub only: &'a PatternSet,
}

impl UrlFilter<'_> {
    pub fn should_log(&self, url: &str) -> bool {
        if self.ignore.matches(url) {
            return false;
        }
        self.only.is_empty() || self.only.matches(url)
    }
}
