//! Path resolution over the directory graph.
//!
//! Walks one path component at a time, scanning each directory's own
//! child/sibling chain for a name match, rather than accumulating and
//! comparing path substrings against the whole tree.

use crate::directory::DirectoryGraph;
use crate::layout::ROOT_INODE_ID;

/// Resolves `path` to an inode id, or `None` if any component is missing.
pub fn resolve(graph: &DirectoryGraph, path: &str) -> Option<u64> {
    if path == "/" {
        return Some(ROOT_INODE_ID);
    }
    let mut current = ROOT_INODE_ID;
    for component in path.split('/').filter(|c| !c.is_empty()) {
        let mut child = graph.get(current)?.child;
        let mut found = None;
        while let Some(c) = child {
            let node = graph.get(c)?;
            if node.name == component {
                found = Some(c);
                break;
            }
            child = node.sibling;
        }
        current = found?;
    }
    Some(current)
}

/// Resolves the inode id of `path`'s parent directory. The root has no
/// parent.
pub fn resolve_parent(graph: &DirectoryGraph, path: &str) -> Option<u64> {
    let parent_path = parent_path_of(path)?;
    resolve(graph, &parent_path)
}

/// The final path component, i.e. the name an entry would be created or
/// looked up under.
pub fn entry_name_of(path: &str) -> &str {
    if path == "/" {
        return "/";
    }
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}

fn parent_path_of(path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => Some("/".to_string()),
        Some(pos) => Some(trimmed[..pos].to_string()),
        None => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_graph() -> DirectoryGraph {
        let mut g = DirectoryGraph::new();
        g.allocate(0, "/".to_string());
        g.allocate(1, "a".to_string());
        g.allocate(2, "b".to_string());
        g.insert_child(0, 1);
        g.insert_child(1, 2);
        g
    }

    #[test]
    fn resolves_root() {
        let g = sample_graph();
        assert_eq!(resolve(&g, "/"), Some(0));
    }

    #[test]
    fn resolves_nested_path() {
        let g = sample_graph();
        assert_eq!(resolve(&g, "/a"), Some(1));
        assert_eq!(resolve(&g, "/a/b"), Some(2));
    }

    #[test]
    fn missing_component_is_none() {
        let g = sample_graph();
        assert_eq!(resolve(&g, "/a/missing"), None);
        assert_eq!(resolve(&g, "/missing"), None);
    }

    #[test]
    fn resolves_parent_and_root_has_none() {
        let g = sample_graph();
        assert_eq!(resolve_parent(&g, "/a/b"), Some(1));
        assert_eq!(resolve_parent(&g, "/a"), Some(0));
        assert_eq!(resolve_parent(&g, "/"), None);
    }

    #[test]
    fn entry_name_extraction() {
        assert_eq!(entry_name_of("/a/b"), "b");
        assert_eq!(entry_name_of("/a"), "a");
        assert_eq!(entry_name_of("/"), "/");
    }
}
