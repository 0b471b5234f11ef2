//! Named sessions with a designated current one

use crate::result::ExpectError;
use crate::session::Session;
use std::collections::HashMap;
use std::sync::Arc;

/// Explicit name → session map.
///
/// Callers that route requests to "the" session (a tool server, a REPL
/// front-end) keep one of these and pass it around; there is no global
/// session. The most recently inserted session becomes current.
///
/// # Examples
///
/// ```no_run
/// use ptyexpect::{Pattern, Session, SessionRegistry};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut registry = SessionRegistry::new();
/// registry.insert("repl", Session::spawn("python3 -i")?).await;
///
/// if let Some(child) = registry.current() {
///     child.expect(Pattern::exact(">>>")).await?;
/// }
///
/// registry.close_all().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, Arc<Session>>,
    current: Option<String>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session` under `name` and make it current.
    ///
    /// A session already registered under `name` is closed first.
    pub async fn insert(&mut self, name: impl Into<String>, session: Session) -> Arc<Session> {
        let name = name.into();
        let session = Arc::new(session);

        if let Some(previous) = self.sessions.insert(name.clone(), Arc::clone(&session)) {
            if let Err(e) = previous.close().await {
                tracing::warn!(session = %name, error = %e, "failed to close replaced session");
            }
        }

        tracing::debug!(session = %name, "session registered");
        self.current = Some(name);
        session
    }

    /// Look up a session by name.
    pub fn get(&self, name: &str) -> Result<Arc<Session>, ExpectError> {
        self.sessions
            .get(name)
            .cloned()
            .ok_or_else(|| ExpectError::UnknownSession(name.to_string()))
    }

    /// The current session, if any.
    pub fn current(&self) -> Option<Arc<Session>> {
        self.current
            .as_deref()
            .and_then(|name| self.sessions.get(name))
            .cloned()
    }

    /// Name of the current session, if any.
    pub fn current_name(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Make the session registered under `name` current.
    pub fn set_current(&mut self, name: &str) -> Result<(), ExpectError> {
        if !self.sessions.contains_key(name) {
            return Err(ExpectError::UnknownSession(name.to_string()));
        }
        self.current = Some(name.to_string());
        Ok(())
    }

    /// Close and forget the session registered under `name`.
    pub async fn remove(&mut self, name: &str) -> Result<(), ExpectError> {
        let session = self
            .sessions
            .remove(name)
            .ok_or_else(|| ExpectError::UnknownSession(name.to_string()))?;

        if self.current.as_deref() == Some(name) {
            self.current = None;
        }
        session.close().await
    }

    /// Close and forget every session.
    ///
    /// All sessions are closed even if some fail; the first error is returned.
    pub async fn close_all(&mut self) -> Result<(), ExpectError> {
        self.current = None;
        let mut first_error = None;
        for (name, session) in self.sessions.drain() {
            if let Err(e) = session.close().await {
                tracing::warn!(session = %name, error = %e, "failed to close session");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sessions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
