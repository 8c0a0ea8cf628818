//! # Triage Budget
//!
//! Token estimation and budget enforcement for the diagnostic payload.
//!
//! ```text
//! DiagnosticPayload + BudgetConfig
//!     │
//!     ├──> per-section token estimate (+ fixed overhead reserve)
//!     │      ├─ exact: tokenizers encoding for the model family
//!     │      └─ fallback: ceil(chars / 4.0 * 1.15), over-estimating
//!     │
//!     └──> ordered trimming loop (one action per iteration, re-estimate)
//!            prune standard → prune aggressive → prune minimal
//!            → drop environment → truncate trace
//! ```
//!
//! The loop stops as soon as the effective limit is met (hard ceiling under
//! `remote_strict`, soft under `local_soft`) or the action list is
//! exhausted, in which case the payload is returned over-budget with
//! `degraded` set. Applied actions are never undone, and the caller's
//! payload is never mutated.

mod budget;
mod encoding;
mod estimator;
mod payload;

pub use budget::{enforce, BudgetConfig, BudgetOutcome, BudgetPolicy, BudgetStep};
pub use encoding::{normalize_model_family, reset_encoding_cache, TOKENIZER_DIR_ENV};
pub use estimator::{EstimateMethod, EstimatorConfig, TokenEstimate, TokenEstimator};
pub use payload::DiagnosticPayload;
