//! Punctuation restoration interface.
//!
//! Final-pass text arrives unpunctuated from the recognizer; a punctuator
//! restores sentence structure before the result is emitted. Per-session
//! continuity (context for mid-session commas vs full stops) lives in a
//! [`PunctCache`] owned by the session.

use crate::error::{Result, VoxError};

/// Per-session punctuation cache.
///
/// Persists across utterances within a session so the model keeps discourse
/// context, and resets only on an explicit end-of-utterance stop.
#[derive(Debug, Clone, Default)]
pub struct PunctCache {
    /// Trailing context from prior utterances.
    pub(crate) context: String,
    /// Calls made against this cache.
    pub(crate) calls: u64,
}

impl PunctCache {
    /// Reset to initial state.
    pub fn reset(&mut self) {
        *self = PunctCache::default();
    }
}

/// Trait for punctuation restoration.
pub trait Punctuator: Send + Sync {
    /// Punctuate recognized text, updating the session's cache.
    fn punctuate(&self, text: &str, cache: &mut PunctCache) -> Result<String>;
}

/// Minimal rule-based punctuator.
///
/// Capitalizes the first letter and guarantees terminal punctuation. Stands
/// in for a real model; deployments substitute their own [`Punctuator`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RulePunctuator;

impl Punctuator for RulePunctuator {
    fn punctuate(&self, text: &str, cache: &mut PunctCache) -> Result<String> {
        cache.calls += 1;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(String::new());
        }

        let mut chars = trimmed.chars();
        let mut result = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        };

        if !result.ends_with(['.', '!', '?', '，', '。', '！', '？']) {
            result.push('.');
        }

        cache.context = result.clone();
        Ok(result)
    }
}

/// Scripted punctuator for tests.
#[derive(Debug, Clone, Default)]
pub struct MockPunctuator {
    suffix: String,
    should_fail: bool,
}

impl MockPunctuator {
    pub fn new() -> Self {
        Self {
            suffix: ".".to_string(),
            should_fail: false,
        }
    }

    /// Append this suffix instead of the default period.
    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.suffix = suffix.to_string();
        self
    }

    /// Fail every call.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

impl Punctuator for MockPunctuator {
    fn punctuate(&self, text: &str, cache: &mut PunctCache) -> Result<String> {
        if self.should_fail {
            return Err(VoxError::Punctuation {
                message: "scripted punctuator failure".to_string(),
            });
        }
        cache.calls += 1;
        Ok(format!("{}{}", text, self.suffix))
    }
}
