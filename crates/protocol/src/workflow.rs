use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Node identifier as exported by the host editor.
///
/// The editor uses stringified integers today, but nothing here depends on
/// that; ids are compared and sorted as plain strings.
pub type NodeId = String;

/// Reference to another node's output: `(source node id, output index)`.
///
/// Serialized as a two-element array, matching the host export format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NodeLink(pub NodeId, pub u32);

impl NodeLink {
    pub fn source(&self) -> &str {
        &self.0
    }

    pub fn output_index(&self) -> u32 {
        self.1
    }
}

/// One input slot of a workflow node: either an inline literal or a link to
/// an upstream node's output.
///
/// A two-element `[string, unsigned]` array always deserializes as a link;
/// the host export reserves that shape for links, so a literal can never
/// collide with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum InputValue {
    Link(NodeLink),
    Literal(serde_json::Value),
}

impl InputValue {
    pub fn as_link(&self) -> Option<&NodeLink> {
        match self {
            Self::Link(link) => Some(link),
            Self::Literal(_) => None,
        }
    }
}

/// One node of the exported workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowNode {
    /// Registered class/type name of the node.
    #[serde(rename = "type")]
    pub node_type: String,

    /// Input-name → value map. `BTreeMap` so inputs always iterate in
    /// sorted name order.
    #[serde(default)]
    pub inputs: BTreeMap<String, InputValue>,
}

impl WorkflowNode {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            inputs: BTreeMap::new(),
        }
    }

    /// Upstream node ids this node references, in sorted input-name order.
    pub fn upstream_ids(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .values()
            .filter_map(|input| input.as_link().map(NodeLink::source))
    }
}

/// The workflow export: a node-id → node map.
///
/// Serialized transparently as the bare map, which is exactly the shape the
/// host editor emits. Consumers never mutate a received graph; transforms
/// return new filtered copies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct WorkflowGraph {
    pub nodes: BTreeMap<NodeId, WorkflowNode>,
}

impl WorkflowGraph {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.get(id)
    }

    /// Node ids in sort order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// New graph restricted to `ids`, preserving node contents verbatim.
    pub fn restricted_to<'a, I>(&self, ids: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut nodes = BTreeMap::new();
        for id in ids {
            if let Some(node) = self.nodes.get(id) {
                nodes.insert(id.to_string(), node.clone());
            }
        }
        Self { nodes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn link_roundtrips_as_two_element_array() {
        let raw = json!(["7", 0]);
        let input: InputValue = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(input, InputValue::Link(NodeLink("7".to_string(), 0)));
        assert_eq!(serde_json::to_value(&input).unwrap(), raw);
    }

    #[test]
    fn non_link_arrays_stay_literal() {
        let input: InputValue = serde_json::from_value(json!([1, 2, 3])).unwrap();
        assert!(input.as_link().is_none());

        let input: InputValue = serde_json::from_value(json!("checkpoint.safetensors")).unwrap();
        assert!(input.as_link().is_none());
    }

    #[test]
    fn graph_parses_host_export_shape() {
        let graph: WorkflowGraph = serde_json::from_value(json!({
            "1": {"type": "Loader", "inputs": {"path": "model.bin"}},
            "2": {"type": "Sampler", "inputs": {"model": ["1", 0], "steps": 20}},
        }))
        .unwrap();

        assert_eq!(graph.len(), 2);
        let sampler = graph.get("2").unwrap();
        assert_eq!(
            sampler.upstream_ids().collect::<Vec<_>>(),
            vec!["1"],
            "only link inputs count as upstream references"
        );
    }

    #[test]
    fn restricted_to_copies_without_mutating() {
        let graph: WorkflowGraph = serde_json::from_value(json!({
            "1": {"type": "A", "inputs": {}},
            "2": {"type": "B", "inputs": {"x": ["1", 0]}},
        }))
        .unwrap();

        let subset = graph.restricted_to(["2", "missing"]);
        assert_eq!(subset.node_ids().collect::<Vec<_>>(), vec!["2"]);
        assert_eq!(graph.len(), 2);
    }
}
