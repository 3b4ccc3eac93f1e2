// src/utils/tree.rs

//! A generic n-ary tree stored in an arena.
//!
//! Nodes are addressed by [`NodeId`] handles that carry a generation counter.
//! Once a node is removed its slot may be reused, but old handles to it stop
//! resolving instead of silently aliasing the new occupant. Re-parenting checks
//! the ancestor chain first, so the tree can never contain a cycle.

use crate::utils::error::{Result, RiffError};
use std::collections::VecDeque;

/// A handle to a node in a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// Visit order for traversals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// A node is yielded before its descendants.
    TopDown,
    /// A node is yielded after its descendants.
    BottomUp,
}

#[derive(Debug, Clone)]
struct Node<T> {
    value: T,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    node: Option<Node<T>>,
}

/// Arena-backed tree. A `Tree` may hold several disjoint roots; a freshly
/// inserted node is a root until it is given a parent.
#[derive(Debug, Clone)]
pub struct Tree<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for Tree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Tree<T> {
    pub fn new() -> Self {
        Tree {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Number of live nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Adds a detached node and returns its handle.
    pub fn insert(&mut self, value: T) -> NodeId {
        let node = Node {
            value,
            parent: None,
            children: Vec::new(),
        };
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    /// Inserts `value` as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, value: T) -> Result<NodeId> {
        self.node(parent)?;
        let id = self.insert(value);
        self.link(id, parent);
        Ok(id)
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.slot_node(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.slot_node(id).map(|n| &n.value)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.slot_node_mut(id).map(|n| &mut n.value)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slot_node(id).and_then(|n| n.parent)
    }

    /// Children in insertion order. Empty for a stale handle.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.slot_node(id).map_or(&[], |n| n.children.as_slice())
    }

    /// Distance from the root; a root has depth 0.
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    /// Iterates parent, grandparent, ... up to the root.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_, T> {
        Ancestors {
            tree: self,
            next: self.parent(id),
        }
    }

    /// Returns `true` if `ancestor` lies on the parent chain of `id`, or is `id` itself.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        id == ancestor || self.ancestors(id).any(|a| a == ancestor)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.children(self.parent(id)?);
        let position = siblings.iter().position(|&c| c == id)?;
        position.checked_sub(1).map(|p| siblings[p])
    }

    /// Moves `id` under `new_parent` (appended last), or detaches it when
    /// `new_parent` is `None`.
    ///
    /// A node that already has the requested parent is left where it is.
    /// Fails if either handle is stale or if `new_parent` is `id` or one of
    /// its descendants.
    pub fn set_parent(&mut self, id: NodeId, new_parent: Option<NodeId>) -> Result<()> {
        let old_parent = self.node(id)?.parent;
        if let Some(parent) = new_parent {
            self.node(parent)?;
            if self.is_ancestor_or_self(id, parent) {
                return Err(RiffError::InvalidOperation(
                    "re-parenting a node under itself or its descendant would create a cycle"
                        .to_string(),
                ));
            }
        }
        if old_parent == new_parent {
            return Ok(());
        }

        if let Some(old) = old_parent {
            self.unlink(id, old);
        }
        if let Some(parent) = new_parent {
            self.link(id, parent);
        }
        Ok(())
    }

    /// Detaches `id` and frees it together with its whole subtree, returning
    /// the value that was stored at `id`.
    pub fn remove(&mut self, id: NodeId) -> Result<T> {
        if let Some(parent) = self.node(id)?.parent {
            self.unlink(id, parent);
        }

        let mut pending: Vec<NodeId> = self.children(id).to_vec();
        while let Some(child) = pending.pop() {
            pending.extend_from_slice(self.children(child));
            self.free_slot(child);
        }
        self.free_slot(id)
            .ok_or_else(|| RiffError::InvalidOperation("node vanished during removal".to_string()))
    }

    /// Removes the first occurrence of `target` below `root`.
    ///
    /// `root`'s immediate children are searched first; only then is each
    /// child's subtree searched in order. Returns whether anything was removed.
    pub fn deep_remove(&mut self, root: NodeId, target: NodeId) -> bool {
        match self.find_below(root, target) {
            Some(found) => self.remove(found).is_ok(),
            None => false,
        }
    }

    fn find_below(&self, root: NodeId, target: NodeId) -> Option<NodeId> {
        let children = self.children(root);
        if children.contains(&target) {
            return Some(target);
        }
        children.iter().find_map(|&c| self.find_below(c, target))
    }

    /// Lazily walks the subtree rooted at `id`, depth first.
    pub fn depth_first(&self, id: NodeId, direction: Direction) -> DepthFirst<'_, T> {
        let stack = if self.contains(id) {
            vec![(id, false)]
        } else {
            Vec::new()
        };
        DepthFirst {
            tree: self,
            direction,
            stack,
        }
    }

    /// Walks the subtree rooted at `id` level by level.
    ///
    /// `BottomUp` is the exact reverse of the `TopDown` order: deepest level
    /// first, and within a level right to left. It is reversed level order,
    /// not a leaves-first search.
    pub fn breadth_first(&self, id: NodeId, direction: Direction) -> BreadthFirst<'_, T> {
        let mut queue = VecDeque::new();
        if self.contains(id) {
            queue.push_back(id);
        }
        let top_down = BreadthFirst::TopDown { tree: self, queue };
        match direction {
            Direction::TopDown => top_down,
            Direction::BottomUp => {
                let mut order: Vec<NodeId> = top_down.collect();
                order.reverse();
                BreadthFirst::Reversed(order.into_iter())
            }
        }
    }

    fn slot_node(&self, id: NodeId) -> Option<&Node<T>> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
    }

    fn slot_node_mut(&mut self, id: NodeId) -> Option<&mut Node<T>> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
    }

    fn node(&self, id: NodeId) -> Result<&Node<T>> {
        self.slot_node(id).ok_or_else(|| {
            RiffError::InvalidOperation(format!("stale or unknown node handle {:?}", id))
        })
    }

    // Callers have checked both handles.
    fn link(&mut self, id: NodeId, parent: NodeId) {
        if let Some(p) = self.slot_node_mut(parent) {
            p.children.push(id);
        }
        if let Some(n) = self.slot_node_mut(id) {
            n.parent = Some(parent);
        }
    }

    fn unlink(&mut self, id: NodeId, parent: NodeId) {
        if let Some(p) = self.slot_node_mut(parent) {
            p.children.retain(|&c| c != id);
        }
        if let Some(n) = self.slot_node_mut(id) {
            n.parent = None;
        }
    }

    fn free_slot(&mut self, id: NodeId) -> Option<T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(node.value)
    }
}

pub struct Ancestors<'a, T> {
    tree: &'a Tree<T>,
    next: Option<NodeId>,
}

impl<T> Iterator for Ancestors<'_, T> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}

/// Depth-first traversal. Cloning the iterator restarts from the clone point.
pub struct DepthFirst<'a, T> {
    tree: &'a Tree<T>,
    direction: Direction,
    // (node, children already expanded)
    stack: Vec<(NodeId, bool)>,
}

impl<T> Clone for DepthFirst<'_, T> {
    fn clone(&self) -> Self {
        DepthFirst {
            tree: self.tree,
            direction: self.direction,
            stack: self.stack.clone(),
        }
    }
}

impl<T> Iterator for DepthFirst<'_, T> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        match self.direction {
            Direction::TopDown => {
                let (id, _) = self.stack.pop()?;
                self.stack
                    .extend(self.tree.children(id).iter().rev().map(|&c| (c, false)));
                Some(id)
            }
            Direction::BottomUp => loop {
                let (id, expanded) = self.stack.pop()?;
                if expanded {
                    return Some(id);
                }
                self.stack.push((id, true));
                self.stack
                    .extend(self.tree.children(id).iter().rev().map(|&c| (c, false)));
            },
        }
    }
}

/// Breadth-first traversal, see [`Tree::breadth_first`].
pub enum BreadthFirst<'a, T> {
    TopDown {
        tree: &'a Tree<T>,
        queue: VecDeque<NodeId>,
    },
    Reversed(std::vec::IntoIter<NodeId>),
}

impl<T> Clone for BreadthFirst<'_, T> {
    fn clone(&self) -> Self {
        match self {
            BreadthFirst::TopDown { tree, queue } => BreadthFirst::TopDown {
                tree: *tree,
                queue: queue.clone(),
            },
            BreadthFirst::Reversed(order) => BreadthFirst::Reversed(order.clone()),
        }
    }
}

impl<T> Iterator for BreadthFirst<'_, T> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        match self {
            BreadthFirst::TopDown { tree, queue } => {
                let id = queue.pop_front()?;
                queue.extend(tree.children(id).iter().copied());
                Some(id)
            }
            BreadthFirst::Reversed(order) => order.next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // root
    // ├── a
    // │   ├── a1
    // │   └── a2
    // └── b
    //     └── b1
    fn sample() -> (Tree<&'static str>, Vec<NodeId>) {
        let mut tree = Tree::new();
        let root = tree.insert("root");
        let a = tree.append(root, "a").unwrap();
        let b = tree.append(root, "b").unwrap();
        let a1 = tree.append(a, "a1").unwrap();
        let a2 = tree.append(a, "a2").unwrap();
        let b1 = tree.append(b, "b1").unwrap();
        (tree, vec![root, a, b, a1, a2, b1])
    }

    fn names(tree: &Tree<&'static str>, ids: impl Iterator<Item = NodeId>) -> Vec<&'static str> {
        ids.map(|id| *tree.get(id).unwrap()).collect()
    }

    #[test]
    fn test_depth_and_parent_links() {
        let (tree, ids) = sample();
        assert_eq!(tree.depth(ids[0]), 0);
        assert_eq!(tree.depth(ids[1]), 1);
        assert_eq!(tree.depth(ids[3]), 2);
        assert_eq!(tree.parent(ids[3]), Some(ids[1]));
        assert_eq!(tree.children(ids[0]), &[ids[1], ids[2]]);
        assert_eq!(tree.previous_sibling(ids[2]), Some(ids[1]));
        assert_eq!(tree.previous_sibling(ids[1]), None);
    }

    #[test]
    fn test_depth_first_orders() {
        let (tree, ids) = sample();
        let top_down = names(&tree, tree.depth_first(ids[0], Direction::TopDown));
        assert_eq!(top_down, ["root", "a", "a1", "a2", "b", "b1"]);
        let bottom_up = names(&tree, tree.depth_first(ids[0], Direction::BottomUp));
        assert_eq!(bottom_up, ["a1", "a2", "a", "b1", "b", "root"]);
    }

    #[test]
    fn test_depth_first_is_restartable() {
        let (tree, ids) = sample();
        let walk = tree.depth_first(ids[0], Direction::TopDown);
        let first: Vec<_> = walk.clone().collect();
        let second: Vec<_> = walk.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_breadth_first_bottom_up_is_reversed_level_order() {
        let (tree, ids) = sample();
        let top_down: Vec<_> = tree.breadth_first(ids[0], Direction::TopDown).collect();
        assert_eq!(
            names(&tree, top_down.iter().copied()),
            ["root", "a", "b", "a1", "a2", "b1"]
        );
        let mut bottom_up: Vec<_> = tree.breadth_first(ids[0], Direction::BottomUp).collect();
        assert_eq!(
            names(&tree, bottom_up.iter().copied()),
            ["b1", "a2", "a1", "b", "a", "root"]
        );
        bottom_up.reverse();
        assert_eq!(bottom_up, top_down);
    }

    #[test]
    fn test_set_parent_moves_node() {
        let (mut tree, ids) = sample();
        let (a, b, a2) = (ids[1], ids[2], ids[4]);
        tree.set_parent(a2, Some(b)).unwrap();
        assert_eq!(tree.parent(a2), Some(b));
        assert_eq!(tree.children(a), &[ids[3]]);
        assert_eq!(tree.children(b), &[ids[5], a2]);

        // Already parented: nothing moves.
        tree.set_parent(ids[5], Some(b)).unwrap();
        assert_eq!(tree.children(b), &[ids[5], a2]);

        tree.set_parent(a2, None).unwrap();
        assert_eq!(tree.parent(a2), None);
        assert_eq!(tree.children(b), &[ids[5]]);
        assert!(tree.contains(a2));
    }

    #[test]
    fn test_set_parent_rejects_cycles() {
        let (mut tree, ids) = sample();
        let (root, a, a1) = (ids[0], ids[1], ids[3]);
        assert!(matches!(
            tree.set_parent(a, Some(a1)),
            Err(RiffError::InvalidOperation(_))
        ));
        assert!(matches!(
            tree.set_parent(root, Some(root)),
            Err(RiffError::InvalidOperation(_))
        ));
        // The failed attempt left the links alone.
        assert_eq!(tree.parent(a), Some(root));
        assert_eq!(tree.parent(a1), Some(a));
    }

    #[test]
    fn test_remove_frees_subtree_and_invalidates_handles() {
        let (mut tree, ids) = sample();
        assert_eq!(tree.len(), 6);
        assert_eq!(tree.remove(ids[1]).unwrap(), "a");
        assert_eq!(tree.len(), 3);
        assert!(!tree.contains(ids[1]));
        assert!(!tree.contains(ids[3]));
        assert_eq!(tree.children(ids[0]), &[ids[2]]);

        // A reused slot does not resurrect the old handle.
        let fresh = tree.insert("fresh");
        assert!(tree.contains(fresh));
        assert!(!tree.contains(ids[1]) && !tree.contains(ids[3]) && !tree.contains(ids[4]));
        assert!(tree.get(ids[4]).is_none());
        assert!(tree.set_parent(ids[4], Some(ids[0])).is_err());
    }

    #[test]
    fn test_deep_remove() {
        let (mut tree, ids) = sample();
        assert!(tree.deep_remove(ids[0], ids[5]));
        assert!(tree.children(ids[2]).is_empty());
        assert!(!tree.deep_remove(ids[0], ids[5]));
        // The root itself is never a match.
        assert!(!tree.deep_remove(ids[0], ids[0]));
        assert!(tree.deep_remove(ids[0], ids[1]));
        assert_eq!(tree.len(), 2);
    }
}
