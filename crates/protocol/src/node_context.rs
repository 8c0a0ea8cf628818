use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Structured location of the failing node, as far as it could be recovered.
///
/// Every field is optional because each comes from a different source (the
/// trace, the workflow export, the node registry); the record is usable as
/// soon as any one of them is known.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NodeContext {
    /// Id of the node in the workflow export.
    pub node_id: Option<String>,

    /// Human-facing title, if the user renamed the node.
    pub display_name: Option<String>,

    /// Registered class/type name.
    pub class_type: Option<String>,

    /// Path of the extension that registered the node type, when it is not
    /// a built-in.
    pub extension_path: Option<String>,
}

impl NodeContext {
    /// True iff at least one identifying field is non-empty.
    pub fn is_valid(&self) -> bool {
        [
            &self.node_id,
            &self.display_name,
            &self.class_type,
            &self.extension_path,
        ]
        .into_iter()
        .any(|field| field.as_deref().is_some_and(|v| !v.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_blank_contexts_are_invalid() {
        assert!(!NodeContext::default().is_valid());
        assert!(!NodeContext {
            node_id: Some(String::new()),
            ..Default::default()
        }
        .is_valid());
    }

    #[test]
    fn any_populated_field_is_valid() {
        assert!(NodeContext {
            class_type: Some("KSampler".to_string()),
            ..Default::default()
        }
        .is_valid());
    }
}
