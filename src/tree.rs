//! In-memory directory tree
//!
//! The node graph synthesized from a full prefix listing. Nodes live in an
//! arena addressed by [`NodeId`]; each node stores its parent's id and each
//! directory keeps a name-to-id map of its children, so the tree carries
//! both up and down links without reference cycles. All operations here are
//! local; the tree is a derived, rebuildable cache of the remote listing.

use std::collections::BTreeMap;

use tracing::debug;

use crate::client::ObjectMetadata;
use crate::error::{Error, Result};
use crate::path::ObjectPath;

/// Stable handle to a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// The root directory. Its name is empty and it is never pruned.
pub const ROOT_ID: NodeId = NodeId(0);

/// Kind-specific payload of a node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Directory {
        children: BTreeMap<String, NodeId>,
    },
    File {
        metadata: ObjectMetadata,
    },
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    kind: NodeKind,
}

impl Node {
    fn directory(name: String, parent: Option<NodeId>) -> Self {
        Self {
            name,
            parent,
            kind: NodeKind::Directory {
                children: BTreeMap::new(),
            },
        }
    }

    fn file(name: String, parent: NodeId, metadata: ObjectMetadata) -> Self {
        Self {
            name,
            parent: Some(parent),
            kind: NodeKind::File { metadata },
        }
    }
}

/// Arena of directory and file nodes, populated by replaying a listing.
#[derive(Debug)]
pub struct DirectoryTree {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
}

impl Default for DirectoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(Node::directory(String::new(), None))],
            free: Vec::new(),
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)?.as_ref()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)?.as_mut()
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        if let Some(slot) = self.nodes.get_mut(id.0) {
            *slot = None;
            self.free.push(id.0);
        }
    }

    fn children_map(&self, id: NodeId) -> Option<&BTreeMap<String, NodeId>> {
        match &self.node(id)?.kind {
            NodeKind::Directory { children } => Some(children),
            NodeKind::File { .. } => None,
        }
    }

    /// Attach a child into a directory's map. The caller guarantees `dir`
    /// is a live directory node.
    fn attach(&mut self, dir: NodeId, name: &str, child: NodeId) {
        if let Some(Node {
            kind: NodeKind::Directory { children },
            ..
        }) = self.node_mut(dir)
        {
            children.insert(name.to_string(), child);
        }
    }

    fn detach(&mut self, dir: NodeId, name: &str) -> Option<NodeId> {
        match self.node_mut(dir) {
            Some(Node {
                kind: NodeKind::Directory { children },
                ..
            }) => children.remove(name),
            _ => None,
        }
    }

    /// Walk `path` from the root, segment by segment.
    ///
    /// Every non-final segment must resolve to a directory; if it resolves to
    /// a file the path is invalid, and if it is absent it is either created
    /// (`create_dirs`) or the walk ends with `None`. The final segment is
    /// returned as-is, except that an absent final segment is created as a
    /// directory when `create_final_dir` is set.
    pub fn resolve(
        &mut self,
        path: &ObjectPath,
        create_dirs: bool,
        create_final_dir: bool,
    ) -> Result<Option<NodeId>> {
        let segments = path.segments();
        let mut current = ROOT_ID;
        for (i, segment) in segments.iter().enumerate() {
            let last = i == segments.len() - 1;
            let existing = self
                .children_map(current)
                .and_then(|children| children.get(segment))
                .copied();
            if !last {
                match existing {
                    Some(next) if self.is_dir(next) => current = next,
                    Some(_) => {
                        return Err(Error::invalid_path(format!(
                            "path {} is invalid, {} is not a directory",
                            path, segment
                        )))
                    }
                    None if create_dirs => {
                        let next =
                            self.alloc(Node::directory(segment.clone(), Some(current)));
                        self.attach(current, segment, next);
                        debug!(path = %self.full_path_string(next), "create directory node");
                        current = next;
                    }
                    None => return Ok(None),
                }
            } else {
                match existing {
                    Some(found) => return Ok(Some(found)),
                    None if create_final_dir => {
                        let next =
                            self.alloc(Node::directory(segment.clone(), Some(current)));
                        self.attach(current, segment, next);
                        debug!(path = %self.full_path_string(next), "create directory node");
                        return Ok(Some(next));
                    }
                    None => return Ok(None),
                }
            }
        }
        Ok(Some(current))
    }

    /// Read-only walk: no intermediate or final creation.
    pub fn find(&self, path: &ObjectPath) -> Result<Option<NodeId>> {
        let segments = path.segments();
        let mut current = ROOT_ID;
        for (i, segment) in segments.iter().enumerate() {
            let last = i == segments.len() - 1;
            match self
                .children_map(current)
                .and_then(|children| children.get(segment))
                .copied()
            {
                Some(next) if last => return Ok(Some(next)),
                Some(next) if self.is_dir(next) => current = next,
                Some(_) => {
                    return Err(Error::invalid_path(format!(
                        "path {} is invalid, {} is not a directory",
                        path, segment
                    )))
                }
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Insert a file node at `path`, auto-creating intermediate directories.
    /// Idempotent over replay order: existing directories are reused, and a
    /// re-listed key overwrites its own metadata.
    pub fn insert_file(&mut self, path: &ObjectPath, metadata: ObjectMetadata) -> Result<NodeId> {
        let parent = match path.parent() {
            Some(parent_path) => match self.resolve(&parent_path, true, true)? {
                Some(id) if self.is_dir(id) => id,
                _ => {
                    return Err(Error::invalid_path(format!(
                        "path {} is invalid, {} is not a directory",
                        path, parent_path
                    )))
                }
            },
            None => ROOT_ID,
        };
        let name = path.file_name();
        if let Some(existing) = self.children_map(parent).and_then(|c| c.get(name)).copied() {
            match self.node_mut(existing) {
                Some(Node {
                    kind: NodeKind::File { metadata: slot },
                    ..
                }) => {
                    *slot = metadata;
                    return Ok(existing);
                }
                _ => {
                    return Err(Error::invalid_path(format!(
                        "path {} is invalid, a directory with that name exists",
                        path
                    )))
                }
            }
        }
        let id = self.alloc(Node::file(name.to_string(), parent, metadata));
        self.attach(parent, name, id);
        debug!(path = %path, "create file node");
        Ok(id)
    }

    /// Remove the file at `path`, then prune now-empty ancestor directories
    /// up to but excluding the root.
    pub fn remove_file(&mut self, path: &ObjectPath) -> Result<()> {
        debug!(path = %path, "delete file node");
        let id = self
            .find(path)?
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        if self.is_dir(id) {
            return Err(Error::NotAFile(path.to_string()));
        }
        let mut parent = match self.node(id).and_then(|n| n.parent) {
            Some(parent) => parent,
            None => return Ok(()),
        };
        self.detach(parent, path.file_name());
        self.release(id);
        while parent != ROOT_ID {
            match self.node(parent) {
                Some(node) if self.children_map(parent).is_some_and(BTreeMap::is_empty) => {
                    let name = node.name.clone();
                    let grandparent = match node.parent {
                        Some(gp) => gp,
                        None => break,
                    };
                    self.detach(grandparent, &name);
                    self.release(parent);
                    parent = grandparent;
                }
                _ => break,
            }
        }
        Ok(())
    }

    /// Drop every node below the root. Local cache invalidation only; the
    /// remote side is handled by the batch executor.
    pub fn clear(&mut self) {
        debug!("clear all nodes");
        self.nodes.clear();
        self.free.clear();
        self.nodes
            .push(Some(Node::directory(String::new(), None)));
    }

    pub fn is_dir(&self, id: NodeId) -> bool {
        matches!(
            self.node(id),
            Some(Node {
                kind: NodeKind::Directory { .. },
                ..
            })
        )
    }

    pub fn is_file(&self, id: NodeId) -> bool {
        matches!(
            self.node(id),
            Some(Node {
                kind: NodeKind::File { .. },
                ..
            })
        )
    }

    /// File metadata, or `None` for directories and stale ids.
    pub fn metadata(&self, id: NodeId) -> Option<&ObjectMetadata> {
        match &self.node(id)?.kind {
            NodeKind::File { metadata } => Some(metadata),
            NodeKind::Directory { .. } => None,
        }
    }

    /// Child names of a directory, in name order.
    pub fn child_names(&self, id: NodeId) -> Option<Vec<String>> {
        Some(self.children_map(id)?.keys().cloned().collect())
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.children_map(id).map_or(0, BTreeMap::len)
    }

    /// Concatenation of segment names from the root to `id`. Always agrees
    /// with the key the node was indexed under.
    pub fn full_path(&self, id: NodeId) -> Option<ObjectPath> {
        if id == ROOT_ID {
            return None;
        }
        let mut segments = Vec::new();
        let mut current = id;
        while current != ROOT_ID {
            let node = self.node(current)?;
            segments.push(node.name.clone());
            current = node.parent?;
        }
        segments.reverse();
        ObjectPath::from_segments(segments).ok()
    }

    fn full_path_string(&self, id: NodeId) -> String {
        self.full_path(id).map_or_else(String::new, |p| p.encode())
    }

    /// True when nothing but the root exists.
    pub fn is_empty(&self) -> bool {
        self.child_count(ROOT_ID) == 0
    }

    /// Number of live nodes, the root included.
    pub fn len(&self) -> usize {
        self.nodes.iter().flatten().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(size: u64) -> ObjectMetadata {
        ObjectMetadata {
            size,
            put_time: 15_900_000_000_000_000,
        }
    }

    fn path(key: &str) -> ObjectPath {
        ObjectPath::parse(key).unwrap()
    }

    fn populated() -> DirectoryTree {
        let mut tree = DirectoryTree::new();
        tree.insert_file(&path("b/c.txt"), meta(1)).unwrap();
        tree.insert_file(&path("b/d.txt"), meta(2)).unwrap();
        tree.insert_file(&path("e.txt"), meta(3)).unwrap();
        tree
    }

    #[test]
    fn test_populate_builds_directories_from_keys() {
        let tree = populated();
        assert_eq!(
            tree.child_names(ROOT_ID).unwrap(),
            vec!["b".to_string(), "e.txt".to_string()]
        );
        let b = tree.find(&path("b")).unwrap().unwrap();
        assert!(tree.is_dir(b));
        assert_eq!(
            tree.child_names(b).unwrap(),
            vec!["c.txt".to_string(), "d.txt".to_string()]
        );
        let c = tree.find(&path("b/c.txt")).unwrap().unwrap();
        assert!(tree.is_file(c));
        assert_eq!(tree.metadata(c).unwrap().size, 1);
    }

    #[test]
    fn test_populate_is_order_independent() {
        let mut reversed = DirectoryTree::new();
        reversed.insert_file(&path("e.txt"), meta(3)).unwrap();
        reversed.insert_file(&path("b/d.txt"), meta(2)).unwrap();
        reversed.insert_file(&path("b/c.txt"), meta(1)).unwrap();
        let forward = populated();
        assert_eq!(
            forward.child_names(ROOT_ID),
            reversed.child_names(ROOT_ID)
        );
        assert_eq!(forward.len(), reversed.len());
    }

    #[test]
    fn test_reinserting_a_key_updates_metadata_in_place() {
        let mut tree = populated();
        let before = tree.len();
        tree.insert_file(&path("b/c.txt"), meta(42)).unwrap();
        assert_eq!(tree.len(), before);
        let c = tree.find(&path("b/c.txt")).unwrap().unwrap();
        assert_eq!(tree.metadata(c).unwrap().size, 42);
    }

    #[test]
    fn test_remove_file_prunes_empty_directories() {
        let mut tree = populated();
        tree.remove_file(&path("b/c.txt")).unwrap();
        // b still holds d.txt
        assert!(tree.find(&path("b")).unwrap().is_some());
        tree.remove_file(&path("b/d.txt")).unwrap();
        // b is now empty and pruned
        assert_eq!(tree.find(&path("b")).unwrap(), None);
        assert_eq!(tree.child_names(ROOT_ID).unwrap(), vec!["e.txt".to_string()]);
    }

    #[test]
    fn test_prune_stops_at_root() {
        let mut tree = DirectoryTree::new();
        tree.insert_file(&path("a/b/c/file.bin"), meta(1)).unwrap();
        tree.remove_file(&path("a/b/c/file.bin")).unwrap();
        assert!(tree.is_empty());
        assert!(tree.is_dir(ROOT_ID));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_prune_keeps_nonempty_ancestors() {
        let mut tree = DirectoryTree::new();
        tree.insert_file(&path("a/b/deep/file.bin"), meta(1)).unwrap();
        tree.insert_file(&path("a/keep.txt"), meta(2)).unwrap();
        tree.remove_file(&path("a/b/deep/file.bin")).unwrap();
        assert_eq!(tree.find(&path("a/b")).unwrap(), None);
        let a = tree.find(&path("a")).unwrap().unwrap();
        assert_eq!(tree.child_names(a).unwrap(), vec!["keep.txt".to_string()]);
    }

    #[test]
    fn test_remove_file_rejects_directories() {
        let mut tree = populated();
        assert!(matches!(
            tree.remove_file(&path("b")),
            Err(Error::NotAFile(_))
        ));
        assert!(matches!(
            tree.remove_file(&path("missing.txt")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_file_as_intermediate_segment_is_invalid() {
        let tree = populated();
        assert!(matches!(
            tree.find(&path("e.txt/child")),
            Err(Error::InvalidPath(_))
        ));
        let mut tree = tree;
        assert!(matches!(
            tree.resolve(&path("e.txt/child"), true, false),
            Err(Error::InvalidPath(_))
        ));
    }

    #[test]
    fn test_resolve_creates_final_directory_on_request() {
        let mut tree = DirectoryTree::new();
        let id = tree
            .resolve(&path("x/y"), true, true)
            .unwrap()
            .unwrap();
        assert!(tree.is_dir(id));
        assert_eq!(tree.full_path(id).unwrap().encode(), "x/y");
    }

    #[test]
    fn test_full_path_agrees_with_indexed_key() {
        let tree = populated();
        let c = tree.find(&path("b/c.txt")).unwrap().unwrap();
        assert_eq!(tree.full_path(c).unwrap().encode(), "b/c.txt");
    }

    #[test]
    fn test_clear_resets_to_root_only() {
        let mut tree = populated();
        tree.clear();
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_arena_slots_are_reused_after_prune() {
        let mut tree = DirectoryTree::new();
        tree.insert_file(&path("a/b/c.bin"), meta(1)).unwrap();
        let before = tree.len();
        tree.remove_file(&path("a/b/c.bin")).unwrap();
        tree.insert_file(&path("x/y/z.bin"), meta(2)).unwrap();
        assert_eq!(tree.len(), before);
    }
}
