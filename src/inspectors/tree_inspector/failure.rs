//! Failure location over the generic tree
//!
//! The failing node is the deepest REVERT, the first one in step order
//! when several share the greatest depth. Its path is recovered by a
//! depth-first search from the roots.

use crate::types::*;

/// Finds the deepest revert and its root-to-node path
///
/// # Arguments
/// * `nodes` - Node arena in step order
/// * `roots` - Arena indices of the roots
///
/// # Returns
/// * `Some(FailureInfo)` - Failing node id, path of ids and decoded payload
/// * `None` - No REVERT node present
pub fn find_failure(nodes: &[GenericTraceNode], roots: &[NodeId]) -> Option<FailureInfo> {
    let (failing, node) = nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| node.node_type == OpKind::Revert)
        .fold(None, |deepest: Option<(NodeId, &GenericTraceNode)>, (idx, node)| {
            match deepest {
                Some((_, best)) if best.depth >= node.depth => deepest,
                _ => Some((idx, node)),
            }
        })?;

    let mut path = Vec::new();
    let failing_path = roots
        .iter()
        .find(|root| path_to(nodes, **root, failing, &mut path))
        .map(|_| path.iter().map(|idx| nodes[*idx].id.clone()).collect())
        .unwrap_or_else(|| vec![node.id.clone()]);

    let decoded_error = node.decoded_error.clone().unwrap_or(DecodedError::Unknown);
    Some(FailureInfo {
        failing_node_id: node.id.clone(),
        failing_path,
        revert_data: node.revert_data.clone().unwrap_or_default(),
        error_kind: decoded_error.kind(),
        decoded_reason: decoded_error.reason().map(str::to_string),
        panic_code: match &decoded_error {
            DecodedError::Panic { code } => Some(*code),
            _ => None,
        },
        custom_error_selector: match &decoded_error {
            DecodedError::CustomError { selector, .. } => Some(*selector),
            _ => None,
        },
        custom_error_name: match &decoded_error {
            DecodedError::CustomError { name, .. } => name.clone(),
            _ => None,
        },
        decoded_error,
    })
}

/// Pushes the path from `current` to `target` onto `path`
fn path_to(nodes: &[GenericTraceNode], current: NodeId, target: NodeId, path: &mut Vec<NodeId>) -> bool {
    let Some(node) = nodes.get(current) else {
        return false;
    };
    path.push(current);
    if current == target {
        return true;
    }
    if node
        .children
        .iter()
        .any(|child| path_to(nodes, *child, target, path))
    {
        return true;
    }
    path.pop();
    false
}
