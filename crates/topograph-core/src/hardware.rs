//! # Hardware Tree Reclassifier
//!
//! Re-keys a generic hardware description (as printed by `lshw -json`) so
//! that every child carrying both a string `class` and a string `id` moves
//! out of `children` into a list named after its class:
//!
//! ```text
//! {children: [{class: "disk", id: "d1"}, {other: 2}]}
//!   => {disk: [{"d1": {class: "disk", id: "d1"}}], children: [{other: 2}]}
//! ```
//!
//! Children missing either field stay in `children`. The transform recurses
//! into every relocated child, so depth is bounded by the input depth.

use serde_json::{Map, Value};
use tracing::trace;

const CHILDREN: &str = "children";

/// Reclassify one labelled node in place.
///
/// A node without a `children` sequence is a leaf and is left untouched.
pub fn reclassify(node: &mut Map<String, Value>) {
    if !matches!(node.get(CHILDREN), Some(Value::Array(_))) {
        return;
    }
    let Some(Value::Array(children)) = node.remove(CHILDREN) else {
        return;
    };

    let mut remaining = Vec::new();
    let mut relocated = 0usize;
    for child in children {
        match classify(node, child) {
            Ok(()) => relocated += 1,
            Err(child) => remaining.push(child),
        }
    }

    if relocated > 0 {
        trace!("relocated {} children", relocated);
    }
    if !remaining.is_empty() || relocated == 0 {
        node.insert(CHILDREN.to_string(), Value::Array(remaining));
    }
}

/// Reclassify a whole document: a single node or a top-level list of nodes.
pub fn reclassify_value(value: &mut Value) {
    match value {
        Value::Object(node) => reclassify(node),
        Value::Array(nodes) => nodes.iter_mut().for_each(reclassify_value),
        _ => {}
    }
}

/// Move `child` under `parent[class]`, or hand it back when it cannot be
/// relocated.
fn classify(parent: &mut Map<String, Value>, child: Value) -> Result<(), Value> {
    let Value::Object(mut fields) = child else {
        return Err(child);
    };

    let identity = match (fields.get("class"), fields.get("id")) {
        (Some(Value::String(class)), Some(Value::String(id)))
            if !class.is_empty() && !id.is_empty() && class != CHILDREN =>
        {
            Some((class.clone(), id.clone()))
        }
        _ => None,
    };
    let Some((class, id)) = identity else {
        return Err(Value::Object(fields));
    };

    let slot = parent
        .entry(class)
        .or_insert_with(|| Value::Array(Vec::new()));
    let Value::Array(entries) = slot else {
        // The class collides with a scalar field of the parent.
        return Err(Value::Object(fields));
    };

    reclassify(&mut fields);
    let mut entry = Map::new();
    entry.insert(id, Value::Object(fields));
    entries.push(Value::Object(entry));
    Ok(())
}
