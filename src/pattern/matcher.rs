//! Pattern matcher implementations

use crate::result::PatternError;
use regex::bytes::Regex;

/// Location of a match within a haystack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Start offset of the match
    pub start: usize,
    /// End offset of the match (exclusive)
    pub end: usize,
    /// Captured groups (regex only)
    pub captures: Vec<String>,
}

/// Trait for text matchers run against the output buffer
pub trait Matcher: Send + Sync {
    /// Find the earliest match in `haystack`.
    fn find(&self, haystack: &[u8]) -> Option<Match>;
}

/// Exact byte-string matcher using Boyer-Moore-Horspool.
///
/// An empty needle matches the empty span at offset 0.
#[derive(Debug, Clone)]
pub struct ExactMatcher {
    needle: Vec<u8>,
    bad_char_table: [usize; 256],
}

impl ExactMatcher {
    /// Build the shift table for `needle`.
    pub fn new(needle: impl Into<Vec<u8>>) -> Self {
        let needle = needle.into();

        let mut bad_char_table = [needle.len(); 256];
        for (i, &byte) in needle.iter().enumerate().take(needle.len().saturating_sub(1)) {
            bad_char_table[byte as usize] = needle.len() - 1 - i;
        }

        Self {
            needle,
            bad_char_table,
        }
    }

    /// The bytes this matcher searches for.
    pub fn needle(&self) -> &[u8] {
        &self.needle
    }
}

impl Matcher for ExactMatcher {
    fn find(&self, haystack: &[u8]) -> Option<Match> {
        let len = self.needle.len();
        if len == 0 {
            return Some(Match {
                start: 0,
                end: 0,
                captures: vec![],
            });
        }

        let mut pos = 0;
        while pos + len <= haystack.len() {
            if haystack[pos..pos + len] == self.needle[..] {
                return Some(Match {
                    start: pos,
                    end: pos + len,
                    captures: vec![],
                });
            }

            let shift_byte = haystack[pos + len - 1];
            pos += self.bad_char_table[shift_byte as usize];
        }

        None
    }
}

/// Regex matcher over raw bytes.
///
/// Output from a terminal is not guaranteed to be valid UTF-8, so the search
/// runs on bytes and only the reported captures are decoded (lossily).
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    /// Compile `pattern`.
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    /// The source pattern.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl Matcher for RegexMatcher {
    fn find(&self, haystack: &[u8]) -> Option<Match> {
        let captures = self.regex.captures(haystack)?;
        let full_match = captures.get(0)?;

        let captures = captures
            .iter()
            .map(|group| {
                group
                    .map(|g| String::from_utf8_lossy(g.as_bytes()).into_owned())
                    .unwrap_or_default()
            })
            .collect();

        Some(Match {
            start: full_match.start(),
            end: full_match.end(),
            captures,
        })
    }
}
