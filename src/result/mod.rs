//! Result types for expect operations

mod error;

pub use error::{ExpectError, PatternError};

/// Result of a successful expect call.
///
/// The bytes described by `before` and `matched` have been removed from the
/// session's output buffer; whatever followed the match stays buffered for
/// the next call.
///
/// # Examples
///
/// ```no_run
/// use ptyexpect::{Pattern, Session};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let session = Session::spawn("python3 -i")?;
/// session.expect(Pattern::exact(">>> ")).await?;
/// session.send_line("print(3 * 7)").await?;
///
/// let result = session.expect(Pattern::exact(">>> ")).await?;
/// // The echoed command and its output
/// println!("{}", result.before);
/// # Ok(())
/// # }
/// ```
///
/// # Regex Captures
///
/// ```no_run
/// use ptyexpect::{Pattern, Session};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let session = Session::spawn("echo user@example.com")?;
/// let pattern = Pattern::regex(r"(\w+)@(\w+)\.(\w+)")?;
/// let result = session.expect(pattern).await?;
///
/// // captures[0] is the full match
/// println!("User: {}", result.captures[1]);
/// println!("Domain: {}", result.captures[2]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Index of the pattern that matched, into the list passed to the call.
    pub pattern_index: usize,

    /// Output that preceded the match.
    ///
    /// When the match is a `Pattern::Eof`, this is everything that was left
    /// in the buffer when the process ended.
    pub before: String,

    /// The matched text. Empty for `Pattern::Eof` and for empty-span matches.
    pub matched: String,

    /// Captured groups (regex patterns only).
    ///
    /// Index 0 is the full match, 1+ are the groups. Groups that did not
    /// participate in the match are empty strings. Empty for other patterns.
    pub captures: Vec<String>,
}
