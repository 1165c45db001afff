//! Instance-tree expansion by `parentId` (spec.md §4.5), used by the
//! subscription engine (§4.6) to turn a registered root element id into
//! the full set of element ids a subscription should monitor.
//!
//! This is deliberately distinct from the `HasComponent`-edge recursion
//! used by recursive *value* retrieval (`i3x_datasource::retrieval`):
//! here the tree is defined by physical parentage (`parentId == root`),
//! matching the reference prototype's
//! `subscriptions.py::collect_instance_tree`.

use std::collections::{HashMap, HashSet};

use ahash::AHashMap;
use i3x_datasource::DataSourceError;
use i3x_model::ObjectInstance;

/// Collect `root_id` plus, when it's a composition and depth allows, its
/// `parentId`-children recursively. `max_depth == 0` is unbounded,
/// `max_depth == 1` returns only the root, `N > 1` recurses `N - 1` more
/// levels.
pub fn expand_instance_tree(
    all_instances: &[ObjectInstance],
    root_id: &str,
    max_depth: u32,
) -> Result<Vec<String>, DataSourceError> {
    let by_id: AHashMap<&str, &ObjectInstance> = all_instances.iter().map(|i| (i.element_id.as_str(), i)).collect();
    if !by_id.contains_key(root_id) {
        return Err(DataSourceError::not_found(root_id));
    }

    let mut children_of: HashMap<&str, Vec<&str>> = HashMap::new();
    for instance in all_instances {
        children_of
            .entry(instance.parent_id.as_str())
            .or_default()
            .push(instance.element_id.as_str());
    }

    let mut visited = HashSet::new();
    let mut out = Vec::new();
    collect(&by_id, &children_of, root_id, max_depth, &mut visited, &mut out);
    Ok(out)
}

fn collect<'a>(
    by_id: &AHashMap<&'a str, &'a ObjectInstance>,
    children_of: &HashMap<&'a str, Vec<&'a str>>,
    element_id: &'a str,
    depth: u32,
    visited: &mut HashSet<&'a str>,
    out: &mut Vec<String>,
) {
    if !visited.insert(element_id) {
        return;
    }
    out.push(element_id.to_string());

    let Some(instance) = by_id.get(element_id) else { return };
    if !instance.is_composition || !(depth == 0 || depth > 1) {
        return;
    }
    let next_depth = if depth == 0 { 0 } else { depth - 1 };
    if let Some(children) = children_of.get(element_id) {
        for child in children {
            collect(by_id, children_of, child, next_depth, visited, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inst(id: &str, parent: &str, composition: bool) -> ObjectInstance {
        ObjectInstance::new(id, id, "ns", "type", parent, composition)
    }

    #[test]
    fn max_depth_one_returns_only_root() {
        let instances = vec![inst("root", "/", true), inst("child", "root", false)];
        let ids = expand_instance_tree(&instances, "root", 1).unwrap();
        assert_eq!(ids, vec!["root".to_string()]);
    }

    #[test]
    fn unbounded_depth_collects_whole_subtree() {
        let instances = vec![
            inst("root", "/", true),
            inst("mid", "root", true),
            inst("leaf", "mid", false),
        ];
        let mut ids = expand_instance_tree(&instances, "root", 0).unwrap();
        ids.sort();
        assert_eq!(ids, vec!["leaf".to_string(), "mid".to_string(), "root".to_string()]);
    }

    #[test]
    fn non_composition_root_never_recurses() {
        let instances = vec![inst("root", "/", false), inst("child", "root", false)];
        let ids = expand_instance_tree(&instances, "root", 0).unwrap();
        assert_eq!(ids, vec!["root".to_string()]);
    }

    #[test]
    fn unknown_root_is_not_found() {
        let instances = vec![inst("root", "/", true)];
        assert!(expand_instance_tree(&instances, "ghost", 0).is_err());
    }
}
