use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw environment snapshot captured by the host at failure time.
///
/// This is the unreduced input shape; the pipeline turns it into
/// [`SystemInfo`] before anything leaves the process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EnvironmentInfo {
    pub os: String,
    pub runtime_version: String,
    pub accelerator: Option<String>,
    pub accelerator_version: Option<String>,

    /// Full installed package name → version map, unbounded.
    #[serde(default)]
    pub packages: BTreeMap<String, String>,
}

/// One package entry of the canonical system section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
}

/// Canonical environment shape included in the bundle: exact versions, plus
/// a capped, priority-ordered package list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SystemInfo {
    pub os: String,
    pub runtime_version: String,
    pub accelerator: Option<String>,
    pub accelerator_version: Option<String>,

    /// Ordered: packages referenced by the error text first, then the
    /// baseline set, then the rest, capped by the caller.
    pub packages: Vec<PackageInfo>,
}
