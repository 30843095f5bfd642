//! Roster and spanning tree
//!
//! A roster is the ordered list of cosigners for a round; its order fixes
//! the signing indices and the participation mask layout. The spanning
//! tree over a roster is deterministic: breadth-first numbering in roster
//! order, left child first.

use serde::{Deserialize, Serialize};

use crate::suite::Point;
use crate::{Error, Result};

/// One cosigner: where to reach it and its public key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerIdentity {
    /// Reachable `host:port` address
    pub address: String,
    /// Long-term public key
    pub public: Point,
}

/// Ordered, non-empty list of cosigners
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    servers: Vec<ServerIdentity>,
}

impl Roster {
    pub fn new(servers: Vec<ServerIdentity>) -> Result<Self> {
        if servers.is_empty() {
            return Err(Error::EmptyRoster);
        }
        Ok(Roster { servers })
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ServerIdentity> {
        self.servers.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServerIdentity> {
        self.servers.iter()
    }

    /// Public keys in roster order
    pub fn publics(&self) -> Vec<Point> {
        self.servers.iter().map(|server| server.public).collect()
    }

    /// Signing index of the cosigner holding `public`, if present
    pub fn index_of(&self, public: &Point) -> Option<usize> {
        self.servers.iter().position(|server| server.public == *public)
    }
}

/// Spanning tree over the roster indices `0..n`
#[derive(Clone, Debug)]
pub struct Tree {
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    root: usize,
}

impl Tree {
    /// The deterministic binary tree: node `i` has children `2i+1` and
    /// `2i+2`, root at index 0
    pub fn binary(count: usize) -> Result<Self> {
        if count == 0 {
            return Err(Error::EmptyRoster);
        }
        let parents = (0..count)
            .map(|i| if i == 0 { None } else { Some((i - 1) / 2) })
            .collect();
        let children = (0..count)
            .map(|i| (2 * i + 1..=2 * i + 2).filter(|&c| c < count).collect())
            .collect();
        Ok(Tree {
            parents,
            children,
            root: 0,
        })
    }

    /// Build an arbitrary tree from per-node parent links. Exactly one
    /// node must have no parent, and every node must descend from it.
    pub fn from_parents(parents: Vec<Option<usize>>) -> Result<Self> {
        let count = parents.len();
        if count == 0 {
            return Err(Error::EmptyRoster);
        }
        let mut root = None;
        let mut children = vec![Vec::new(); count];
        for (node, parent) in parents.iter().enumerate() {
            match parent {
                None => {
                    if root.replace(node).is_some() {
                        return Err(Error::Transport("tree has more than one root".into()));
                    }
                }
                Some(parent) => {
                    if *parent >= count {
                        return Err(Error::Transport(format!(
                            "parent {parent} out of range for {count} nodes"
                        )));
                    }
                    children[*parent].push(node);
                }
            }
        }
        let root = root.ok_or_else(|| Error::Transport("tree has no root".into()))?;
        // every node must be reachable from the root
        let mut stack = vec![root];
        let mut seen = vec![false; count];
        seen[root] = true;
        while let Some(node) = stack.pop() {
            for &child in &children[node] {
                if seen[child] {
                    return Err(Error::Transport("tree contains a cycle".into()));
                }
                seen[child] = true;
                stack.push(child);
            }
        }
        if seen.iter().any(|reached| !reached) {
            return Err(Error::Transport("tree is not connected".into()));
        }
        Ok(Tree {
            parents,
            children,
            root,
        })
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn parent(&self, node: usize) -> Option<usize> {
        self.parents.get(node).copied().flatten()
    }

    pub fn children(&self, node: usize) -> &[usize] {
        &self.children[node]
    }

    pub fn is_root(&self, node: usize) -> bool {
        node == self.root
    }

    pub fn is_leaf(&self, node: usize) -> bool {
        self.children[node].is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_tree_shape() {
        let tree = Tree::binary(13).unwrap();
        assert_eq!(tree.len(), 13);
        assert_eq!(tree.root(), 0);
        assert_eq!(tree.children(0), &[1, 2]);
        assert_eq!(tree.children(5), &[11, 12]);
        assert!(tree.is_leaf(12));
        assert_eq!(tree.parent(12), Some(5));
        // every non-root node points back at its parent
        for node in 1..13 {
            let parent = tree.parent(node).unwrap();
            assert!(tree.children(parent).contains(&node));
        }
    }

    #[test]
    fn single_node_tree_is_root_and_leaf() {
        let tree = Tree::binary(1).unwrap();
        assert!(tree.is_root(0));
        assert!(tree.is_leaf(0));
        assert!(tree.parent(0).is_none());
    }

    #[test]
    fn empty_tree_rejected() {
        assert!(matches!(Tree::binary(0), Err(Error::EmptyRoster)));
    }

    #[test]
    fn chain_from_parents() {
        let tree = Tree::from_parents(vec![None, Some(0), Some(1)]).unwrap();
        assert_eq!(tree.root(), 0);
        assert_eq!(tree.children(0), &[1]);
        assert_eq!(tree.children(1), &[2]);
        assert!(tree.is_leaf(2));
    }

    #[test]
    fn malformed_parent_links_rejected() {
        assert!(Tree::from_parents(vec![Some(1), Some(0)]).is_err());
        assert!(Tree::from_parents(vec![None, None]).is_err());
        assert!(Tree::from_parents(vec![None, Some(9)]).is_err());
    }
}
