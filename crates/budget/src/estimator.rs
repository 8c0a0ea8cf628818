use crate::encoding::{encoding_for, normalize_model_family};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which path produced an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateMethod {
    Exact,
    Fallback,
}

/// One token estimate with enough detail for the observability report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenEstimate {
    pub tokens: usize,
    pub method: EstimateMethod,

    /// Multiplier applied on top of the raw ratio; 1.0 on the exact path.
    pub safety_multiplier: f64,

    pub chars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Declared model family, normalized to an encoding profile.
    pub model_family: String,

    /// Fallback ratio; ~4 chars per token holds for English text and code.
    pub chars_per_token: f64,

    /// Fallback headroom so the hard ceiling survives estimation error.
    pub safety_multiplier: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            model_family: "gpt-4".to_string(),
            chars_per_token: 4.0,
            safety_multiplier: 1.15,
        }
    }
}

/// Converts text into approximate token counts.
///
/// Stateless apart from the process-wide encoding cache; safe to share
/// across concurrent calls.
#[derive(Debug, Clone, Default)]
pub struct TokenEstimator {
    config: EstimatorConfig,
}

impl TokenEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    /// Estimate `text`. Exact when the encoding asset is available,
    /// otherwise the over-estimating char-ratio fallback.
    pub fn estimate(&self, text: &str) -> TokenEstimate {
        let chars = text.chars().count();
        let profile = normalize_model_family(&self.config.model_family);

        if let Some(tokenizer) = encoding_for(profile) {
            match tokenizer.encode(text, false) {
                Ok(encoding) => {
                    return TokenEstimate {
                        tokens: encoding.get_ids().len(),
                        method: EstimateMethod::Exact,
                        safety_multiplier: 1.0,
                        chars,
                    };
                }
                Err(err) => {
                    log::warn!("exact tokenization failed ({err}); using fallback ratio");
                }
            }
        }

        self.fallback(chars)
    }

    fn fallback(&self, chars: usize) -> TokenEstimate {
        let chars_per_token = if self.config.chars_per_token > 0.0 {
            self.config.chars_per_token
        } else {
            4.0
        };
        let tokens = (chars as f64 / chars_per_token * self.config.safety_multiplier).ceil();
        TokenEstimate {
            tokens: tokens as usize,
            method: EstimateMethod::Fallback,
            safety_multiplier: self.config.safety_multiplier,
            chars,
        }
    }

    /// Batch form over a name → text map, for per-section breakdowns.
    pub fn estimate_section_map(
        &self,
        sections: &BTreeMap<String, String>,
    ) -> BTreeMap<String, TokenEstimate> {
        sections
            .iter()
            .map(|(name, text)| (name.clone(), self.estimate(text)))
            .collect()
    }
}
