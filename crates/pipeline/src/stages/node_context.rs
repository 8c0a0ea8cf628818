use crate::context::AnalysisContext;
use crate::error::Result;
use crate::stage::Stage;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use triage_protocol::NodeContext;

/// Host-editor execution banner: `Error occurred when executing node 12`
/// with an optional parenthesized display name.
static NODE_BANNER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)error occurred when executing node (?P<id>[\w./-]+)(?:\s+\((?P<name>[^)]+)\))?")
        .expect("node banner regex")
});

/// Bracketed marker some runners emit per log line: `[node 12]`.
static NODE_BRACKET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[node (?P<id>[^\]\s]+)\]").expect("node bracket regex"));

/// Recovers the failing node's location from the trace and the workflow.
///
/// Precedence: an id reported by the host in the request settings beats
/// anything scanned out of the trace. The workflow export then fills in
/// the class type, and a namespaced class (`pack.Node`) yields the
/// extension path.
pub struct NodeContextStage;

impl NodeContextStage {
    fn scan_trace(text: &str) -> (Option<String>, Option<String>) {
        if let Some(caps) = NODE_BANNER.captures(text) {
            return (
                caps.name("id").map(|m| m.as_str().to_string()),
                caps.name("name").map(|m| m.as_str().to_string()),
            );
        }
        let id = NODE_BRACKET
            .captures(text)
            .and_then(|caps| caps.name("id").map(|m| m.as_str().to_string()));
        (id, None)
    }
}

impl Stage for NodeContextStage {
    fn id(&self) -> &'static str {
        "extract.node_context"
    }

    fn requires(&self) -> &'static [&'static str] {
        &["sanitized_trace|raw_trace"]
    }

    fn provides(&self) -> &'static [&'static str] {
        &["node_context", "metadata.error_node_id"]
    }

    fn process(&self, ctx: &mut AnalysisContext) -> Result<()> {
        let text = ctx.sanitized_trace.as_deref().unwrap_or(&ctx.raw_trace);
        let (scanned_id, scanned_name) = Self::scan_trace(text);
        let node_id = ctx.settings.error_node_id.clone().or(scanned_id);

        let class_type = node_id.as_deref().and_then(|id| {
            ctx.raw_workflow
                .as_ref()
                .and_then(|graph| graph.get(id))
                .map(|node| node.node_type.clone())
        });
        let extension_path = class_type
            .as_deref()
            .and_then(|class| class.rsplit_once('.'))
            .map(|(prefix, _)| prefix.to_string());

        let node_context = NodeContext {
            node_id,
            display_name: scanned_name,
            class_type,
            extension_path,
        };

        if node_context.is_valid() {
            if let Some(id) = &node_context.node_id {
                ctx.metadata.insert("error_node_id".to_string(), json!(id));
            }
            ctx.node_context = Some(node_context);
        } else {
            log::debug!("no node location recoverable from trace or settings");
        }
        Ok(())
    }
}
