use crate::PrivacyLevel;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

/// Result of one sanitization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizeOutcome {
    pub sanitized_text: String,
    pub pii_found: bool,

    /// Rule name → number of replacements made.
    #[serde(default)]
    pub replacement_counts: BTreeMap<String, usize>,
}

/// PII redaction collaborator.
///
/// The pipeline treats this as a black box: after the sanitize stage runs,
/// no raw unsanitized field is read again.
pub trait Sanitizer: Send + Sync {
    fn sanitize(&self, text: &str, level: PrivacyLevel) -> SanitizeOutcome;
}

/// Identity sanitizer for tests and local-only runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughSanitizer;

impl Sanitizer for PassthroughSanitizer {
    fn sanitize(&self, text: &str, _level: PrivacyLevel) -> SanitizeOutcome {
        SanitizeOutcome {
            sanitized_text: text.to_string(),
            pii_found: false,
            replacement_counts: BTreeMap::new(),
        }
    }
}

/// Source of recent process log lines.
///
/// Returned lines are raw; the caller sanitizes before including them in
/// any outbound payload.
pub trait LogSource: Send + Sync {
    /// Up to `n` most recent lines, oldest first.
    fn recent(&self, n: usize) -> Vec<String>;
}

/// Bounded in-memory ring buffer of log lines.
///
/// The production log capture lives outside this workspace; this is the
/// stand-in used by tests and the CLI.
#[derive(Debug)]
pub struct MemoryLogSource {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl MemoryLogSource {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn push(&self, line: impl Into<String>) {
        let mut lines = self.lines.lock().expect("log buffer mutex poisoned");
        while lines.len() >= self.capacity.max(1) {
            lines.pop_front();
        }
        lines.push_back(line.into());
    }
}

impl LogSource for MemoryLogSource {
    fn recent(&self, n: usize) -> Vec<String> {
        let lines = self.lines.lock().expect("log buffer mutex poisoned");
        let skip = lines.len().saturating_sub(n);
        lines.iter().skip(skip).cloned().collect()
    }
}
