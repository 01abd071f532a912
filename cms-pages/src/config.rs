use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One node of the declarative page tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageConfigNode {
    /// A `page://` URI for root nodes; `module://` or `context://` for children.
    pub def: String,
    /// Modules and contexts only: must be fully loaded before the page renders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_critical: Option<bool>,
    /// Pages and modules only: forwarded to the rendered component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<PageConfigChildren>,
}

/// Flat list for contexts, slot map for pages and modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageConfigChildren {
    List(Vec<PageConfigNode>),
    Slots(BTreeMap<String, Vec<PageConfigNode>>),
}
