use crate::ConfigError;
use regex::Regex;

/// Ordered allow-list of link patterns
///
/// Each pattern is a regular expression anchored at the start of the URL, the
/// same way Python's `re.match` behaves: `https://example\.com/` matches every
/// URL beginning with that prefix, while the pattern is free to match only part
/// of the URL. A URL passes when any pattern matches. An empty list matches
/// everything.
///
/// # Examples
///
/// ```
/// use soup_scraper::url::LinkPatterns;
///
/// let patterns = LinkPatterns::compile(&["https://example\\.com/.*"]).unwrap();
/// assert!(patterns.is_match("https://example.com/a"));
/// assert!(!patterns.is_match("https://other.com/https://example.com/"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct LinkPatterns {
    patterns: Vec<Regex>,
}

impl LinkPatterns {
    /// Compiles the given patterns, anchoring each one at the start of the input
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(&format!("^(?:{})", pattern)).map_err(|e| {
                    ConfigError::InvalidPattern {
                        pattern: pattern.to_string(),
                        message: e.to_string(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    /// A pattern list that accepts every URL
    pub fn match_all() -> Self {
        Self::default()
    }

    /// Returns true if any pattern matches the start of `url`
    pub fn is_match(&self, url: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|p| p.is_match(url))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
