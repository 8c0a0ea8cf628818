//! Error-pattern matcher registry.
//!
//! A registered function table, not a plugin loader: built-ins are
//! installed at startup and third parties go through an explicit
//! [`install_registry`] call with a pre-vetted table. Lookups read an
//! immutable snapshot; refreshes swap the whole snapshot.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Human-facing classification of a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Stable id of the pattern that matched.
    pub pattern_id: String,
    pub title: String,
    pub advice: String,
}

/// A matcher inspects sanitized trace text and may produce a suggestion.
pub type MatcherFn = fn(&str) -> Option<Suggestion>;

/// Ordered function table; first match wins.
#[derive(Clone)]
pub struct MatcherRegistry {
    entries: Vec<(&'static str, MatcherFn)>,
}

impl MatcherRegistry {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The built-in pattern set shipped with the pipeline.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("out_of_memory", match_out_of_memory);
        registry.register("file_not_found", match_file_not_found);
        registry.register("shape_mismatch", match_shape_mismatch);
        registry.register("missing_dependency", match_missing_dependency);
        registry
    }

    pub fn register(&mut self, id: &'static str, matcher: MatcherFn) {
        self.entries.push((id, matcher));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First suggestion produced by the table, in registration order.
    pub fn first_match(&self, text: &str) -> Option<Suggestion> {
        self.entries.iter().find_map(|(id, matcher)| {
            let suggestion = matcher(text);
            if suggestion.is_some() {
                log::debug!("pattern '{id}' matched");
            }
            suggestion
        })
    }
}

static REGISTRY: OnceCell<RwLock<Arc<MatcherRegistry>>> = OnceCell::new();

fn registry_cell() -> &'static RwLock<Arc<MatcherRegistry>> {
    REGISTRY.get_or_init(|| RwLock::new(Arc::new(MatcherRegistry::builtin())))
}

/// Current immutable snapshot of the registry.
pub fn registry() -> Arc<MatcherRegistry> {
    registry_cell()
        .read()
        .expect("matcher registry lock poisoned")
        .clone()
}

/// Replace the registry with a new snapshot. Readers holding the previous
/// snapshot finish on it undisturbed.
pub fn install_registry(registry: MatcherRegistry) {
    *registry_cell()
        .write()
        .expect("matcher registry lock poisoned") = Arc::new(registry);
}

/// Back to the built-in table. Test isolation only.
pub fn reset_registry() {
    install_registry(MatcherRegistry::builtin());
}

fn suggestion(pattern_id: &str, title: &str, advice: &str) -> Option<Suggestion> {
    Some(Suggestion {
        pattern_id: pattern_id.to_string(),
        title: title.to_string(),
        advice: advice.to_string(),
    })
}

fn match_out_of_memory(text: &str) -> Option<Suggestion> {
    let lower = text.to_ascii_lowercase();
    if lower.contains("out of memory") || lower.contains("allocation failed") {
        return suggestion(
            "out_of_memory",
            "The device ran out of memory",
            "Lower the resolution or batch size, or unload unused models before rerunning.",
        );
    }
    None
}

fn match_file_not_found(text: &str) -> Option<Suggestion> {
    let lower = text.to_ascii_lowercase();
    if lower.contains("filenotfounderror") || lower.contains("no such file or directory") {
        return suggestion(
            "file_not_found",
            "A referenced file is missing",
            "Check that the model or asset path in the failing node points to an existing file.",
        );
    }
    None
}

fn match_shape_mismatch(text: &str) -> Option<Suggestion> {
    let lower = text.to_ascii_lowercase();
    if lower.contains("shape mismatch") || lower.contains("size mismatch") {
        return suggestion(
            "shape_mismatch",
            "Tensor shapes do not line up",
            "An upstream node produces a different resolution or channel count than this node expects.",
        );
    }
    None
}

fn match_missing_dependency(text: &str) -> Option<Suggestion> {
    let lower = text.to_ascii_lowercase();
    if lower.contains("modulenotfounderror") || lower.contains("importerror") {
        return suggestion(
            "missing_dependency",
            "A required package is not installed",
            "Install the extension's requirements into the editor's environment and restart.",
        );
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builtin_patterns_match_their_traces() {
        let registry = MatcherRegistry::builtin();
        let hit = registry
            .first_match("RuntimeError: CUDA error: out of memory")
            .unwrap();
        assert_eq!(hit.pattern_id, "out_of_memory");

        let hit = registry
            .first_match("FileNotFoundError: [Errno 2] No such file or directory: 'x.ckpt'")
            .unwrap();
        assert_eq!(hit.pattern_id, "file_not_found");

        assert!(registry.first_match("SyntaxError: invalid syntax").is_none());
    }

    #[test]
    fn registration_order_breaks_ties() {
        fn always(_: &str) -> Option<Suggestion> {
            Some(Suggestion {
                pattern_id: "always".to_string(),
                title: String::new(),
                advice: String::new(),
            })
        }

        let mut registry = MatcherRegistry::builtin();
        registry.register("always", always);
        let hit = registry
            .first_match("RuntimeError: CUDA error: out of memory")
            .unwrap();
        assert_eq!(
            hit.pattern_id, "out_of_memory",
            "earlier registrations win over later ones"
        );
    }

    #[test]
    fn installed_snapshot_replaces_builtins() {
        install_registry(MatcherRegistry::empty());
        assert!(registry().is_empty());
        reset_registry();
        assert_eq!(registry().len(), MatcherRegistry::builtin().len());
    }
}
