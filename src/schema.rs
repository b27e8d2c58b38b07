//!
//! Form schema extraction and rendering
//! ------------------------------------
//! Walks a definition's primary instance joined with its `bind` and body
//! `repeat` declarations into a nested field-type tree, and renders that tree
//! as either a nested JSON structure or a flattened path-keyed list. The walk
//! is best-effort over the declared schema: binds that name paths absent from
//! the instance are skipped, untyped leaves default to `string`. This is not
//! an XForms validator.
//!
//! Child order everywhere equals document declaration order; the flattened
//! output is the pre-order leaf traversal of the nested one. Downstream
//! consumers depend on that ordering.

use std::collections::{HashMap, HashSet};

use roxmltree::{Document, Node};
use serde::Serialize;
use serde_json::{json, Value};

use crate::definition::{attr_local, primary_instance_data};
use crate::error::{AppError, AppResult};

/// One node of the extracted field tree. The synthetic root has no name and
/// only ever renders through its children.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `string`, `int`, `structure`, `repeat`, or any other primitive the
    /// definition declares.
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<SchemaNode>>,
}

impl SchemaNode {
    fn leaf(name: &str, node_type: String) -> Self {
        SchemaNode { name: Some(name.to_string()), node_type, children: None }
    }

    fn group(name: &str, node_type: String, children: Vec<SchemaNode>) -> Self {
        SchemaNode { name: Some(name.to_string()), node_type, children: Some(children) }
    }
}

/// Derive the schema tree from raw definition text. Definitions are stored
/// with their identity already verified, so failures here only occur when
/// called with bytes that never passed `definition::parse`.
pub fn extract(xml: &str) -> AppResult<SchemaNode> {
    let doc = Document::parse(xml).map_err(|_| AppError::malformed(xml.len()))?;
    let data = primary_instance_data(&doc).ok_or_else(|| AppError::missing_identity("formId"))?;

    let binds = collect_binds(&doc);
    let repeats = collect_repeats(&doc);

    let root_name = data.tag_name().name().to_string();
    let mut path = vec![root_name];
    let children = walk_children(&data, &mut path, &binds, &repeats);

    Ok(SchemaNode { name: None, node_type: "structure".into(), children: Some(children) })
}

/// Map of absolute nodeset path (`/data/meta/instanceID`) to declared type.
fn collect_binds(doc: &Document) -> HashMap<String, String> {
    let mut binds = HashMap::new();
    for node in doc.descendants().filter(|n| n.is_element() && n.tag_name().name() == "bind") {
        let Some(nodeset) = attr_local(&node, "nodeset").or_else(|| attr_local(&node, "ref")) else {
            continue;
        };
        // Relative refs are not resolvable without a full XPath model; skip.
        if !nodeset.starts_with('/') {
            continue;
        }
        if let Some(ty) = attr_local(&node, "type") {
            binds.insert(nodeset.to_string(), strip_type_prefix(ty).to_string());
        }
    }
    binds
}

/// Nodesets declared as `<repeat>` in the body section.
fn collect_repeats(doc: &Document) -> HashSet<String> {
    let mut repeats = HashSet::new();
    let Some(body) = doc
        .root_element()
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "body")
    else {
        return repeats;
    };
    for node in body.descendants().filter(|n| n.is_element() && n.tag_name().name() == "repeat") {
        if let Some(nodeset) = attr_local(&node, "nodeset").or_else(|| attr_local(&node, "ref")) {
            repeats.insert(nodeset.to_string());
        }
    }
    repeats
}

/// Bind types sometimes carry an `xsd:` style prefix; the tree stores the
/// bare primitive name.
fn strip_type_prefix(ty: &str) -> &str {
    ty.rsplit(':').next().unwrap_or(ty)
}

fn walk_children(
    node: &Node,
    path: &mut Vec<String>,
    binds: &HashMap<String, String>,
    repeats: &HashSet<String>,
) -> Vec<SchemaNode> {
    let mut out = Vec::new();
    for child in node.children().filter(|n| n.is_element()) {
        let name = child.tag_name().name();
        path.push(name.to_string());
        let abs = format!("/{}", path.join("/"));
        let has_element_children = child.children().any(|n| n.is_element());
        if has_element_children {
            let node_type = if repeats.contains(&abs) { "repeat" } else { "structure" };
            let children = walk_children(&child, path, binds, repeats);
            out.push(SchemaNode::group(name, node_type.into(), children));
        } else {
            let node_type = binds.get(&abs).cloned().unwrap_or_else(|| "string".to_string());
            out.push(SchemaNode::leaf(name, node_type));
        }
        path.pop();
    }
    out
}

/// Nested rendering: the root's children as `{name, type[, children]}`.
pub fn render_nested(root: &SchemaNode) -> Value {
    json!(root.children.as_deref().unwrap_or(&[]))
}

/// Flattened rendering: pre-order leaves as `{path: [segments...], type}`,
/// the root excluded from paths.
pub fn render_flattened(root: &SchemaNode) -> Value {
    let mut rows = Vec::new();
    let mut prefix = Vec::new();
    flatten_into(root.children.as_deref().unwrap_or(&[]), &mut prefix, &mut rows);
    Value::Array(rows)
}

fn flatten_into(nodes: &[SchemaNode], prefix: &mut Vec<String>, rows: &mut Vec<Value>) {
    for node in nodes {
        let name = node.name.clone().unwrap_or_default();
        prefix.push(name);
        match &node.children {
            Some(children) => flatten_into(children, prefix, rows),
            None => rows.push(json!({ "path": prefix, "type": node.node_type })),
        }
        prefix.pop();
    }
}
