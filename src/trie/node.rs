use crate::models::prefix::{Family, Prefix};

/// Arena index into a [`super::PatriciaTree`]'s node storage.
///
/// Using an index instead of a pointer sidesteps the parent/child/sibling
/// reference cycles the original's doubly-linked node graph would require
/// `Rc<RefCell<_>>` for, and makes [`super::PatriciaTree::clear`] a single
/// buffer reset instead of a recursive free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(super) u32);

#[derive(Debug)]
pub(super) struct Node<T> {
    /// Bit position: for a real node this is the prefix's mask length; for a
    /// glue node it is the longest common prefix length of its descendants.
    pub bit: u8,
    pub family: Family,
    /// `Some` for a real node, `None` for a glue node.
    pub prefix: Option<Prefix>,
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
    pub parent: Option<NodeId>,
    pub user: Option<T>,
}

impl<T> Node<T> {
    pub fn is_real(&self) -> bool {
        self.prefix.is_some()
    }
}
