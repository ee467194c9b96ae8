use std::fmt;

use generational_arena::{Arena, Index};
use plist::Dictionary;
use tracing::instrument;

use crate::domain::entities::{Bookmark, Folder};
use crate::domain::error::{DomainError, DomainResult};

/// Stable opaque identifier of a node within one loaded tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Index);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (slot, generation) = self.0.into_raw_parts();
        write!(f, "{}:{}", slot, generation)
    }
}

/// Payload of a tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Folder(Folder),
    Bookmark(Bookmark),
    /// Leaf the model does not understand; carried through rewrites untouched
    Opaque,
}

/// Tree node in the arena-based hierarchy structure.
#[derive(Debug)]
pub struct TreeNode {
    pub kind: NodeKind,
    /// Store keys not modelled by `kind`, kept for lossless rewrites
    pub attributes: Dictionary,
    /// Parent folder, None only for the root
    pub parent: Option<NodeId>,
    /// Ordered child nodes (folders only)
    pub children: Vec<NodeId>,
}

impl TreeNode {
    pub fn is_folder(&self) -> bool {
        matches!(self.kind, NodeKind::Folder(_))
    }

    pub fn as_bookmark(&self) -> Option<&Bookmark> {
        match &self.kind {
            NodeKind::Bookmark(bookmark) => Some(bookmark),
            _ => None,
        }
    }

    pub fn as_folder(&self) -> Option<&Folder> {
        match &self.kind {
            NodeKind::Folder(folder) => Some(folder),
            _ => None,
        }
    }
}

/// Arena-based bookmark tree with exactly one root folder.
///
/// Children are owned through their parent's `children` list; the parent link
/// is a plain id used for path reconstruction only.
#[derive(Debug)]
pub struct BookmarkTree {
    arena: Arena<TreeNode>,
    root: NodeId,
}

impl Default for BookmarkTree {
    fn default() -> Self {
        Self::new()
    }
}

impl BookmarkTree {
    pub fn new() -> Self {
        Self::with_root_attributes(Dictionary::new())
    }

    pub fn with_root_attributes(attributes: Dictionary) -> Self {
        let mut arena = Arena::new();
        let root = NodeId(arena.insert(TreeNode {
            kind: NodeKind::Folder(Folder::new("")),
            attributes,
            parent: None,
            children: Vec::new(),
        }));
        Self { arena, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    #[instrument(level = "trace", skip(self, attributes))]
    pub fn insert_node(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        attributes: Dictionary,
    ) -> DomainResult<NodeId> {
        match self.get_node(parent) {
            Some(node) if node.is_folder() => {}
            Some(_) => return Err(DomainError::InvalidParent(parent)),
            None => return Err(DomainError::NodeNotFound(parent)),
        }

        let id = NodeId(self.arena.insert(TreeNode {
            kind,
            attributes,
            parent: Some(parent),
            children: Vec::new(),
        }));
        if let Some(parent_node) = self.arena.get_mut(parent.0) {
            parent_node.children.push(id);
        }
        Ok(id)
    }

    pub fn add_folder(&mut self, parent: NodeId, name: impl Into<String>) -> DomainResult<NodeId> {
        self.insert_node(parent, NodeKind::Folder(Folder::new(name)), Dictionary::new())
    }

    pub fn add_bookmark(&mut self, parent: NodeId, bookmark: Bookmark) -> DomainResult<NodeId> {
        self.insert_node(parent, NodeKind::Bookmark(bookmark), Dictionary::new())
    }

    pub fn get_node(&self, id: NodeId) -> Option<&TreeNode> {
        self.arena.get(id.0)
    }

    pub fn bookmark(&self, id: NodeId) -> Option<&Bookmark> {
        self.get_node(id).and_then(TreeNode::as_bookmark)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id).and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get_node(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children(self.root).is_empty()
    }

    /// Folder names from the root down to `id`.
    ///
    /// The root contributes no name. A folder's own name is the last element;
    /// a bookmark's path ends with its containing folder.
    #[instrument(level = "trace", skip(self))]
    pub fn full_path(&self, id: NodeId) -> Vec<String> {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.get_node(node_id) else {
                break;
            };
            if node_id != self.root {
                if let NodeKind::Folder(folder) = &node.kind {
                    names.push(folder.name.clone());
                }
            }
            current = node.parent;
        }
        names.reverse();
        names
    }

    /// Depth-first pre-order traversal in stored child order.
    pub fn iter(&self) -> TreeIterator<'_> {
        TreeIterator::new(self)
    }

    pub fn bookmarks(&self) -> impl Iterator<Item = (NodeId, &Bookmark)> + Clone + '_ {
        self.iter()
            .filter_map(|(id, node)| node.as_bookmark().map(|bookmark| (id, bookmark)))
    }

    pub fn bookmark_count(&self) -> usize {
        self.bookmarks().count()
    }

    /// Detach `id` from its parent and drop it together with its subtree.
    ///
    /// Remaining siblings keep their relative order.
    #[instrument(level = "trace", skip(self))]
    pub fn remove(&mut self, id: NodeId) -> DomainResult<()> {
        if id == self.root {
            return Err(DomainError::RootRemoval);
        }
        let parent = self
            .get_node(id)
            .ok_or(DomainError::NodeNotFound(id))?
            .parent;
        if let Some(parent_node) = parent.and_then(|p| self.arena.get_mut(p.0)) {
            parent_node.children.retain(|child| *child != id);
        }

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.arena.remove(current.0) {
                stack.extend(node.children);
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct TreeIterator<'a> {
    tree: &'a BookmarkTree,
    stack: Vec<NodeId>,
}

impl<'a> TreeIterator<'a> {
    fn new(tree: &'a BookmarkTree) -> Self {
        Self {
            tree,
            stack: vec![tree.root()],
        }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (NodeId, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current) = self.stack.pop() {
            if let Some(node) = self.tree.get_node(current) {
                // Push children in reverse order for left-to-right traversal
                for &child in node.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some((current, node));
            }
        }
        None
    }
}
