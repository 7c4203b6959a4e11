//! Binary Patricia (radix) trie over IPv4/IPv6 prefixes.
//!
//! Grounded on `bgpstream_utils_patricia.c`'s insertion/removal/overlap
//! algorithms, re-expressed with arena-indexed nodes (see
//! [`node::NodeId`]) instead of raw parent/child/sibling pointers, and with
//! an owned per-node `T` slot instead of a `void *user` plus a registered
//! destructor callback — `Drop` does that job in Rust.

mod node;

use crate::models::prefix::{Family, Prefix};
use bitflags::bitflags;
use node::Node;
pub use node::NodeId;

bitflags! {
    /// Result of [`PatriciaTree::overlap_info`]: which kind of overlapping
    /// prefix exists for a queried prefix.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OverlapInfo: u8 {
        const LESS_SPECIFIC = 0b01;
        const MORE_SPECIFIC = 0b10;
    }
}

fn top_mask(bits: u8) -> u128 {
    if bits == 0 {
        0
    } else if bits >= 128 {
        u128::MAX
    } else {
        !(u128::MAX >> bits)
    }
}

/// First bit position (0 = MSB) at which `a` and `b` differ, within the
/// first `check_bit` bits; `check_bit` itself if they don't differ there.
fn first_differing_bit(a: u128, b: u128, check_bit: u8) -> u8 {
    let relevant = (a ^ b) & top_mask(check_bit);
    if relevant == 0 {
        check_bit
    } else {
        relevant.leading_zeros() as u8
    }
}

fn bits_equal_under_mask(a: u128, b: u128, mask_len: u8) -> bool {
    (a ^ b) & top_mask(mask_len) == 0
}

/// A Patricia tree over both IPv4 and IPv6 address spaces (disjoint roots),
/// with an opaque per-node payload `T`.
pub struct PatriciaTree<T> {
    arena: Vec<Option<Node<T>>>,
    free: Vec<NodeId>,
    head4: Option<NodeId>,
    head6: Option<NodeId>,
    count4: u64,
    count6: u64,
}

impl<T> Default for PatriciaTree<T> {
    fn default() -> Self {
        PatriciaTree {
            arena: Vec::new(),
            free: Vec::new(),
            head4: None,
            head6: None,
            count4: 0,
            count6: 0,
        }
    }
}

impl<T> PatriciaTree<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&self, id: NodeId) -> &Node<T> {
        self.arena[id.0 as usize]
            .as_ref()
            .expect("dangling NodeId in PatriciaTree")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<T> {
        self.arena[id.0 as usize]
            .as_mut()
            .expect("dangling NodeId in PatriciaTree")
    }

    fn head(&self, family: Family) -> Option<NodeId> {
        match family {
            Family::V4 => self.head4,
            Family::V6 => self.head6,
        }
    }

    fn set_head(&mut self, family: Family, id: Option<NodeId>) {
        match family {
            Family::V4 => self.head4 = id,
            Family::V6 => self.head6 = id,
        }
    }

    fn inc_count(&mut self, family: Family) {
        match family {
            Family::V4 => self.count4 += 1,
            Family::V6 => self.count6 += 1,
        }
    }

    fn dec_count(&mut self, family: Family) {
        match family {
            Family::V4 => self.count4 -= 1,
            Family::V6 => self.count6 -= 1,
        }
    }

    fn alloc(&mut self, node: Node<T>) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.arena[id.0 as usize] = Some(node);
            id
        } else {
            let id = NodeId(self.arena.len() as u32);
            self.arena.push(Some(node));
            id
        }
    }

    fn free_node(&mut self, id: NodeId) {
        self.arena[id.0 as usize] = None;
        self.free.push(id);
    }

    /// Replaces `old` with `new` in whichever of `parent`'s child slots
    /// holds it.
    fn replace_child(&mut self, parent: NodeId, old: NodeId, new: Option<NodeId>) {
        let p = self.node_mut(parent);
        if p.right == Some(old) {
            p.right = new;
        } else {
            debug_assert_eq!(p.left, Some(old));
            p.left = new;
        }
    }

    /// Number of real (non-glue) nodes for `family`.
    pub fn pfx_count(&self, family: Family) -> u64 {
        match family {
            Family::V4 => self.count4,
            Family::V6 => self.count6,
        }
    }

    pub fn node_prefix(&self, id: NodeId) -> Option<Prefix> {
        self.node(id).prefix
    }

    pub fn node_user(&self, id: NodeId) -> Option<&T> {
        self.node(id).user.as_ref()
    }

    pub fn node_user_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.node_mut(id).user.as_mut()
    }

    pub fn set_user(&mut self, id: NodeId, user: Option<T>) {
        self.node_mut(id).user = user;
    }

    /// Inserts `pfx`, returning the (possibly pre-existing) node for it.
    pub fn insert(&mut self, pfx: Prefix) -> NodeId {
        let family = pfx.family();
        let bitlen = pfx.mask_len();
        let pfx_bits = pfx.bits();

        let Some(head) = self.head(family) else {
            let id = self.alloc(Node {
                bit: bitlen,
                family,
                prefix: Some(pfx),
                left: None,
                right: None,
                parent: None,
                user: None,
            });
            self.set_head(family, Some(id));
            self.inc_count(family);
            return id;
        };

        // Descend until we run out of tree or land on a real node whose
        // mask is at least as long as the prefix being inserted.
        let mut node_it = head;
        loop {
            let n = self.node(node_it);
            if !(n.bit < bitlen || !n.is_real()) {
                break;
            }
            let go_right = n.bit < family.max_bits() && pfx.bit_at(n.bit).unwrap_or(false);
            let child = if go_right { n.right } else { n.left };
            match child {
                None => break,
                Some(c) => node_it = c,
            }
        }

        let stopped_bits = self.node(node_it).prefix.map(|p| p.bits()).unwrap_or(0);
        let check_bit = self.node(node_it).bit.min(bitlen);
        let mut differ_bit = first_differing_bit(pfx_bits, stopped_bits, check_bit);
        if differ_bit > check_bit {
            differ_bit = check_bit;
        }

        // Walk back up past ancestors whose bit is at or beyond differ_bit:
        // they branch no earlier than where we need to attach.
        while let Some(parent) = self.node(node_it).parent {
            if self.node(parent).bit >= differ_bit {
                node_it = parent;
            } else {
                break;
            }
        }

        if differ_bit == bitlen && self.node(node_it).bit == bitlen {
            if self.node(node_it).is_real() {
                return node_it;
            }
            // Upgrade the glue node in place.
            self.node_mut(node_it).prefix = Some(pfx);
            self.inc_count(family);
            return node_it;
        }

        let new_node = self.alloc(Node {
            bit: bitlen,
            family,
            prefix: Some(pfx),
            left: None,
            right: None,
            parent: None,
            user: None,
        });
        self.inc_count(family);

        let stopped_bit = self.node(node_it).bit;
        if stopped_bit == differ_bit {
            // Attach as a direct child of node_it.
            self.node_mut(new_node).parent = Some(node_it);
            let go_right = stopped_bit < family.max_bits() && pfx.bit_at(stopped_bit).unwrap_or(false);
            let n = self.node_mut(node_it);
            if go_right {
                debug_assert!(n.right.is_none());
                n.right = Some(new_node);
            } else {
                debug_assert!(n.left.is_none());
                n.left = Some(new_node);
            }
            return new_node;
        }

        if bitlen == differ_bit {
            // new_node becomes the parent of node_it.
            let stopped_prefix_bit =
                bitlen < family.max_bits() && (stopped_bits >> (127 - bitlen)) & 1 == 1;
            if stopped_prefix_bit {
                self.node_mut(new_node).right = Some(node_it);
            } else {
                self.node_mut(new_node).left = Some(node_it);
            }
            let old_parent = self.node(node_it).parent;
            self.node_mut(new_node).parent = old_parent;
            match old_parent {
                None => self.set_head(family, Some(new_node)),
                Some(p) => self.replace_child(p, node_it, Some(new_node)),
            }
            self.node_mut(node_it).parent = Some(new_node);
            return new_node;
        }

        // Neither endpoint matches differ_bit exactly: splice in a glue node.
        let glue = self.alloc(Node {
            bit: differ_bit,
            family,
            prefix: None,
            left: None,
            right: None,
            parent: None,
            user: None,
        });
        let new_goes_right = differ_bit < family.max_bits() && pfx.bit_at(differ_bit).unwrap_or(false);
        {
            let g = self.node_mut(glue);
            if new_goes_right {
                g.right = Some(new_node);
                g.left = Some(node_it);
            } else {
                g.right = Some(node_it);
                g.left = Some(new_node);
            }
        }
        self.node_mut(new_node).parent = Some(glue);
        let old_parent = self.node(node_it).parent;
        self.node_mut(glue).parent = old_parent;
        match old_parent {
            None => self.set_head(family, Some(glue)),
            Some(p) => self.replace_child(p, node_it, Some(glue)),
        }
        self.node_mut(node_it).parent = Some(glue);
        new_node
    }

    pub fn search_exact(&self, pfx: &Prefix) -> Option<NodeId> {
        let family = pfx.family();
        let mut node_it = self.head(family)?;
        let bitlen = pfx.mask_len();
        loop {
            let n = self.node(node_it);
            if n.bit >= bitlen {
                break;
            }
            let go_right = pfx.bit_at(n.bit).unwrap_or(false);
            let child = if go_right { n.right } else { n.left };
            node_it = child?;
        }
        let n = self.node(node_it);
        if n.bit > bitlen || !n.is_real() {
            return None;
        }
        let real = n.prefix.unwrap();
        if bits_equal_under_mask(real.bits(), pfx.bits(), bitlen) {
            Some(node_it)
        } else {
            None
        }
    }

    pub fn remove(&mut self, pfx: &Prefix) {
        if let Some(id) = self.search_exact(pfx) {
            self.remove_node(id);
        }
    }

    /// Removes a real node. Glue nodes cannot be removed directly (matching
    /// the original, which silently no-ops on such a request).
    pub fn remove_node(&mut self, id: NodeId) {
        if !self.node(id).is_real() {
            return;
        }
        let family = self.node(id).family;
        let (left, right, parent) = {
            let n = self.node(id);
            (n.left, n.right, n.parent)
        };

        if left.is_some() && right.is_some() {
            // Degrade to a glue node; children remain.
            self.node_mut(id).prefix = None;
            self.dec_count(family);
            return;
        }

        if left.is_none() && right.is_none() {
            self.free_node(id);
            self.dec_count(family);
            let Some(parent) = parent else {
                self.set_head(family, None);
                return;
            };
            let sibling = {
                let p = self.node_mut(parent);
                if p.right == Some(id) {
                    p.right = None;
                    p.left
                } else {
                    p.left = None;
                    p.right
                }
            };
            if self.node(parent).is_real() {
                return;
            }
            // Glue parent left with a single child: collapse it away.
            let child = sibling.expect("glue node must have had two children");
            let grandparent = self.node(parent).parent;
            match grandparent {
                None => self.set_head(family, Some(child)),
                Some(gp) => self.replace_child(gp, parent, Some(child)),
            }
            self.node_mut(child).parent = grandparent;
            self.free_node(parent);
            return;
        }

        // Exactly one child.
        let child = left.or(right).unwrap();
        self.node_mut(child).parent = parent;
        self.free_node(id);
        self.dec_count(family);
        match parent {
            None => self.set_head(family, Some(child)),
            Some(p) => self.replace_child(p, id, Some(child)),
        }
    }

    fn find_more_specific(&self, id: Option<NodeId>) -> bool {
        match id {
            None => false,
            Some(i) => {
                let n = self.node(i);
                n.is_real() || self.find_more_specific(n.left) || self.find_more_specific(n.right)
            }
        }
    }

    fn node_overlap_info(&self, id: NodeId) -> OverlapInfo {
        let mut mask = OverlapInfo::empty();
        let mut ancestor = self.node(id).parent;
        while let Some(a) = ancestor {
            if self.node(a).is_real() {
                mask |= OverlapInfo::LESS_SPECIFIC;
                break;
            }
            ancestor = self.node(a).parent;
        }
        let n = self.node(id);
        if self.find_more_specific(n.left) || self.find_more_specific(n.right) {
            mask |= OverlapInfo::MORE_SPECIFIC;
        }
        mask
    }

    /// 2-bit overlap classification for `pfx`, whether or not it is
    /// currently in the tree. For a prefix not present, this simulates an
    /// insertion, reads the mask, then rolls the insertion back.
    pub fn overlap_info(&mut self, pfx: &Prefix) -> OverlapInfo {
        if let Some(id) = self.search_exact(pfx) {
            self.node_overlap_info(id)
        } else {
            let id = self.insert(*pfx);
            let mask = self.node_overlap_info(id);
            self.remove_node(id);
            mask
        }
    }

    fn add_more_specifics(&self, id: Option<NodeId>, full: bool, out: &mut Vec<NodeId>) {
        let Some(i) = id else { return };
        let n = self.node(i);
        if n.is_real() {
            out.push(i);
            if !full {
                return;
            }
        }
        self.add_more_specifics(n.left, full, out);
        self.add_more_specifics(n.right, full, out);
    }

    /// Real descendants of `id`, excluding `id` itself. `full = true` walks
    /// the whole subtree; `full = false` stops at the first layer of real
    /// nodes found along each branch (used by [`Self::minimum_coverage`]).
    pub fn more_specifics(&self, id: NodeId, full: bool) -> Vec<NodeId> {
        let n = self.node(id);
        let mut out = Vec::new();
        self.add_more_specifics(n.left, full, &mut out);
        self.add_more_specifics(n.right, full, &mut out);
        out
    }

    /// Real ancestors of `id`, nearest first, excluding `id` itself.
    pub fn less_specifics(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut node_it = self.node(id).parent;
        while let Some(i) = node_it {
            let n = self.node(i);
            if n.is_real() {
                out.push(i);
            }
            node_it = n.parent;
        }
        out
    }

    /// The shallowest real nodes covering `family`'s whole tree.
    pub fn minimum_coverage(&self, family: Family) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.add_more_specifics(self.head(family), false, &mut out);
        out
    }

    fn count_subnets_rec(&self, id: Option<NodeId>, subnet_bits: u8) -> u64 {
        let Some(i) = id else { return 0 };
        let n = self.node(i);
        if !n.is_real() {
            if n.bit >= subnet_bits {
                1
            } else {
                self.count_subnets_rec(n.left, subnet_bits)
                    .saturating_add(self.count_subnets_rec(n.right, subnet_bits))
            }
        } else {
            let mask_len = n.prefix.unwrap().mask_len();
            if mask_len >= subnet_bits {
                1
            } else {
                let diff = subnet_bits - mask_len;
                if diff >= 64 {
                    u64::MAX
                } else {
                    1u64 << diff
                }
            }
        }
    }

    /// Count of non-overlapping `/subnet_bits` subnets covered by real
    /// prefixes in `family`'s tree (e.g. `count_subnets(V4, 24)`).
    pub fn count_subnets(&self, family: Family, subnet_bits: u8) -> u64 {
        self.count_subnets_rec(self.head(family), subnet_bits)
    }

    fn merge_subtree(&mut self, src: &PatriciaTree<T>, id: Option<NodeId>) {
        let Some(i) = id else { return };
        let n = src.node(i);
        if let Some(pfx) = n.prefix {
            self.insert(pfx);
        }
        self.merge_subtree(src, n.left);
        self.merge_subtree(src, n.right);
    }

    /// Copies every real prefix from `src` into `self`; user data is not
    /// carried over (the original only ever merges prefixes, never the
    /// opaque payload).
    pub fn merge_from(&mut self, src: &PatriciaTree<T>) {
        self.merge_subtree(src, src.head4);
        self.merge_subtree(src, src.head6);
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.free.clear();
        self.head4 = None;
        self.head6 = None;
        self.count4 = 0;
        self.count6 = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> PatriciaTree<()> {
        PatriciaTree::new()
    }

    fn pfx(s: &str) -> Prefix {
        s.parse().unwrap()
    }

    #[test]
    fn test_insert_and_search_exact() {
        let mut t = tree();
        let set = ["10.0.0.0/8", "10.0.0.0/24", "10.1.0.0/16", "192.168.0.0/16"];
        for p in &set {
            t.insert(pfx(p));
        }
        for p in &set {
            assert!(t.search_exact(&pfx(p)).is_some(), "missing {p}");
        }
        assert!(t.search_exact(&pfx("10.2.0.0/16")).is_none());
        assert_eq!(t.pfx_count(Family::V4), 4);
    }

    #[test]
    fn test_insert_order_independent_reachability() {
        let set = ["10.0.0.0/8", "10.0.0.0/24", "10.128.0.0/9", "10.64.0.0/10"];
        let mut forward = tree();
        for p in &set {
            forward.insert(pfx(p));
        }
        let mut reverse = tree();
        for p in set.iter().rev() {
            reverse.insert(pfx(p));
        }
        for p in &set {
            assert!(forward.search_exact(&pfx(p)).is_some());
            assert!(reverse.search_exact(&pfx(p)).is_some());
        }
    }

    #[test]
    fn test_insert_then_remove_is_identity_on_count() {
        let mut t = tree();
        t.insert(pfx("10.0.0.0/8"));
        t.insert(pfx("10.0.0.0/24"));
        assert_eq!(t.pfx_count(Family::V4), 2);
        t.remove(&pfx("10.0.0.0/24"));
        assert_eq!(t.pfx_count(Family::V4), 1);
        assert!(t.search_exact(&pfx("10.0.0.0/24")).is_none());
        assert!(t.search_exact(&pfx("10.0.0.0/8")).is_some());
        t.remove(&pfx("10.0.0.0/8"));
        assert_eq!(t.pfx_count(Family::V4), 0);
    }

    #[test]
    fn test_remove_with_two_children_degrades_to_glue() {
        let mut t = tree();
        // 10.0.0.0/8 is inserted, then two more-specifics force it to stay
        // reachable as a glue node once removed directly.
        let mid = t.insert(pfx("10.0.0.0/8"));
        t.insert(pfx("10.0.0.0/9"));
        t.insert(pfx("10.128.0.0/9"));
        t.remove_node(mid);
        assert_eq!(t.pfx_count(Family::V4), 2);
        assert!(t.search_exact(&pfx("10.0.0.0/8")).is_none());
        assert!(t.search_exact(&pfx("10.0.0.0/9")).is_some());
        assert!(t.search_exact(&pfx("10.128.0.0/9")).is_some());
    }

    #[test]
    fn test_overlap_info() {
        let mut t = tree();
        t.insert(pfx("10.0.0.0/8"));
        t.insert(pfx("10.0.0.0/24"));

        let info = t.overlap_info(&pfx("10.0.0.0/16"));
        assert!(info.contains(OverlapInfo::LESS_SPECIFIC));
        assert!(info.contains(OverlapInfo::MORE_SPECIFIC));

        let info = t.overlap_info(&pfx("10.0.0.0/8"));
        assert!(!info.contains(OverlapInfo::LESS_SPECIFIC));
        assert!(info.contains(OverlapInfo::MORE_SPECIFIC));

        let info = t.overlap_info(&pfx("11.0.0.0/8"));
        assert!(info.is_empty());
    }

    #[test]
    fn test_count_subnets_dedup() {
        let mut t = tree();
        t.insert(pfx("10.0.0.0/8"));
        assert_eq!(t.count_subnets(Family::V4, 24), 1 << 16);
        t.insert(pfx("10.0.0.0/24"));
        assert_eq!(t.count_subnets(Family::V4, 24), 1 << 16);
    }

    #[test]
    fn test_merge_from() {
        let mut src = tree();
        src.insert(pfx("10.0.0.0/8"));
        src.insert(pfx("192.168.0.0/16"));

        let mut dst = tree();
        dst.insert(pfx("172.16.0.0/12"));
        dst.merge_from(&src);

        assert!(dst.search_exact(&pfx("10.0.0.0/8")).is_some());
        assert!(dst.search_exact(&pfx("192.168.0.0/16")).is_some());
        assert!(dst.search_exact(&pfx("172.16.0.0/12")).is_some());
    }

    #[test]
    fn test_more_specifics_and_less_specifics() {
        let mut t = tree();
        let root = t.insert(pfx("10.0.0.0/8"));
        t.insert(pfx("10.0.0.0/16"));
        t.insert(pfx("10.1.0.0/16"));

        let more = t.more_specifics(root, true);
        assert_eq!(more.len(), 2);

        let leaf = t.search_exact(&pfx("10.0.0.0/16")).unwrap();
        let less = t.less_specifics(leaf);
        assert_eq!(less, vec![root]);
    }

    #[test]
    fn test_minimum_coverage() {
        let mut t = tree();
        t.insert(pfx("10.0.0.0/8"));
        t.insert(pfx("192.168.0.0/16"));
        let roots = t.minimum_coverage(Family::V4);
        assert_eq!(roots.len(), 2);
    }

    #[test]
    fn test_user_data_round_trip() {
        let mut t: PatriciaTree<&'static str> = PatriciaTree::new();
        let id = t.insert(pfx("10.0.0.0/8"));
        t.set_user(id, Some("payload"));
        assert_eq!(t.node_user(id), Some(&"payload"));
    }

    #[test]
    fn test_clear_resets_counts() {
        let mut t = tree();
        t.insert(pfx("10.0.0.0/8"));
        t.insert(pfx("2001:db8::/32"));
        t.clear();
        assert_eq!(t.pfx_count(Family::V4), 0);
        assert_eq!(t.pfx_count(Family::V6), 0);
        assert!(t.search_exact(&pfx("10.0.0.0/8")).is_none());
    }
}
