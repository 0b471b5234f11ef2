//! Pattern matching for expect operations

mod matcher;

pub use matcher::{ExactMatcher, Match, Matcher, RegexMatcher};

use crate::result::PatternError;

/// Something an expect call can wait for.
///
/// An expect call takes an ordered list of patterns. On every pass over the
/// output buffer the text patterns are tried in declaration order and the
/// **lowest index** with any match wins, regardless of where in the buffer
/// each pattern would match.
///
/// # Pattern Types
///
/// - **Exact**: literal bytes, found with Boyer-Moore-Horspool
/// - **Regex**: regular expression with capture groups
/// - **Eof**: satisfied once the process has ended
/// - **Timeout**: accepted for symmetry with `Eof`; the deadline itself is
///   always enforced, so this marker never changes the outcome of a call
///
/// # Examples
///
/// ```
/// use ptyexpect::Pattern;
///
/// let prompt = Pattern::exact(">>> ");
/// let number = Pattern::regex(r"\d+").unwrap();
/// let patterns = [prompt, number, Pattern::Eof];
/// assert!(patterns[2].is_special());
/// ```
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Exact byte-string match.
    Exact(ExactMatcher),

    /// Regular expression match.
    Regex(RegexMatcher),

    /// The process has ended.
    ///
    /// When matched, the entire remaining buffer is returned as `before`.
    Eof,

    /// The deadline has passed.
    Timeout,
}

impl Pattern {
    /// Create an exact string pattern.
    ///
    /// An empty string is allowed; it matches immediately with an empty
    /// `before`.
    pub fn exact(s: impl Into<String>) -> Self {
        Pattern::Exact(ExactMatcher::new(s.into().into_bytes()))
    }

    /// Create a regex pattern.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::InvalidRegex`] if `pattern` does not compile.
    ///
    /// ```
    /// use ptyexpect::Pattern;
    ///
    /// assert!(Pattern::regex(r"(?i)password:").is_ok());
    /// assert!(Pattern::regex(r"(unclosed").is_err());
    /// ```
    pub fn regex(pattern: &str) -> Result<Self, PatternError> {
        Ok(Pattern::Regex(RegexMatcher::new(pattern)?))
    }

    /// The matcher for text patterns, `None` for `Eof` and `Timeout`.
    pub fn matcher(&self) -> Option<&dyn Matcher> {
        match self {
            Pattern::Exact(m) => Some(m),
            Pattern::Regex(m) => Some(m),
            Pattern::Eof | Pattern::Timeout => None,
        }
    }

    /// Check if this is a marker pattern (`Eof` or `Timeout`).
    pub fn is_special(&self) -> bool {
        matches!(self, Pattern::Eof | Pattern::Timeout)
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        Pattern::exact(s)
    }
}

/// Find the lowest-indexed text pattern with a match in `haystack`.
///
/// Markers are skipped. Returns the pattern index and where it matched.
pub fn scan(patterns: &[Pattern], haystack: &[u8]) -> Option<(usize, Match)> {
    patterns.iter().enumerate().find_map(|(idx, pattern)| {
        pattern
            .matcher()
            .and_then(|matcher| matcher.find(haystack))
            .map(|m| (idx, m))
    })
}

/// Index of the first `Pattern::Eof` in the list.
pub fn eof_index(patterns: &[Pattern]) -> Option<usize> {
    patterns.iter().position(|p| matches!(p, Pattern::Eof))
}
