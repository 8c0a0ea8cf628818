//! Process-wide tokenizer encoding cache.
//!
//! Encodings are loaded lazily from `$TRIAGE_TOKENIZER_DIR/<profile>.json`
//! and shared read-only across calls. Load failures are cached too, so a
//! missing asset costs one filesystem probe per process, not one per
//! estimate.

use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokenizers::Tokenizer;

/// Directory holding one `<profile>.json` tokenizer asset per encoding
/// profile.
pub const TOKENIZER_DIR_ENV: &str = "TRIAGE_TOKENIZER_DIR";

type EncodingMap = HashMap<String, Option<Arc<Tokenizer>>>;

static ENCODINGS: OnceCell<RwLock<EncodingMap>> = OnceCell::new();

fn cache() -> &'static RwLock<EncodingMap> {
    ENCODINGS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Collapse a declared model family onto the small set of encoding
/// profiles we ship assets for. Unknown families get the most common
/// profile rather than an error; estimation falls back to the char ratio
/// if the asset is absent anyway.
pub fn normalize_model_family(model_family: &str) -> &'static str {
    let family = model_family.trim().to_ascii_lowercase();
    if family.contains("gpt-4o")
        || family.starts_with("o1")
        || family.starts_with("o3")
        || family.starts_with("o4")
    {
        "o200k_base"
    } else if family.contains("claude") {
        "claude"
    } else if family.contains("llama") || family.contains("mistral") || family.contains("qwen") {
        "llama"
    } else {
        "cl100k_base"
    }
}

/// Cached tokenizer for `profile`, loading it on first use.
///
/// `None` means the asset is unavailable (no directory configured, file
/// missing, or parse failure); callers fall back to the heuristic path.
pub fn encoding_for(profile: &str) -> Option<Arc<Tokenizer>> {
    if let Some(cached) = cache()
        .read()
        .expect("encoding cache lock poisoned")
        .get(profile)
    {
        return cached.clone();
    }

    let loaded = load_encoding(profile);
    let mut map = cache().write().expect("encoding cache lock poisoned");
    // A racing loader may have inserted first; keep the existing snapshot
    // so every caller sees the same instance.
    map.entry(profile.to_string())
        .or_insert(loaded)
        .clone()
}

fn load_encoding(profile: &str) -> Option<Arc<Tokenizer>> {
    let dir = match std::env::var(TOKENIZER_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => {
            log::debug!("{TOKENIZER_DIR_ENV} not set; token estimates use the fallback ratio");
            return None;
        }
    };

    let path = dir.join(format!("{profile}.json"));
    match Tokenizer::from_file(&path) {
        Ok(tokenizer) => {
            log::debug!("loaded tokenizer profile '{profile}' from {}", path.display());
            Some(Arc::new(tokenizer))
        }
        Err(err) => {
            log::warn!(
                "tokenizer profile '{profile}' unavailable at {}: {err}; using fallback ratio",
                path.display()
            );
            None
        }
    }
}

/// Drop every cached encoding. Test isolation only: the next estimate
/// reloads from the environment.
pub fn reset_encoding_cache() {
    if let Some(lock) = ENCODINGS.get() {
        lock.write().expect("encoding cache lock poisoned").clear();
    }
}
