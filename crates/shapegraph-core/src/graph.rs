/*! Nodes, cells and the unification engine.
 *
 * Nodes live in an append-only arena owned by the `Graph` and are addressed by `NodeId`. A merged
 * node is never removed: it keeps a forward pointer `(node, offset)` to the node that absorbed it,
 * so every `Cell` minted before the merge still resolves. Resolution follows forward pointers,
 * summing offsets, and then normalizes the offset for the canonical node (collapsed nodes use
 * offset 0, array nodes wrap around their element stride).
 *
 * Link unification can cascade through arbitrarily long and cyclic points-to chains. Pending cell
 * pairs are queued on a worklist and drained at the end of every public mutating call, so a merge
 * never observes a half-merged node and recursion depth stays constant.
 */

use crate::{
    config::GraphConfig,
    flags::NodeFlags,
    interner::{TypeId, TypeInterner, TypeSetId},
    types::Type,
    GraphError, Result,
};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Adds a forward or field offset to `base`.
///
/// Offsets are byte positions inside one memory object and never approach `u32::MAX` in a sane
/// graph. Overflow is an invariant break: debug builds panic, release builds clamp to `u32::MAX`.
fn shift(base: u32, delta: u32) -> u32 {
    let sum = base.checked_add(delta);
    debug_assert!(sum.is_some(), "offset overflow: {base} + {delta}");
    sum.unwrap_or(u32::MAX)
}

/// A byte offset into the memory object represented by a node.
///
/// Cells are plain values. The node they name may have been merged away since the cell was
/// created; use `Graph::resolve` (or `Cell::get_node` / `Cell::get_offset`) to see where the cell
/// points now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Cell {
    node: Option<NodeId>,
    offset: u32,
}

impl Cell {
    pub const fn null() -> Self {
        Self {
            node: None,
            offset: 0,
        }
    }

    pub fn new(node: NodeId, offset: u32) -> Self {
        Self {
            node: Some(node),
            offset,
        }
    }

    pub fn is_null(&self) -> bool {
        self.node.is_none()
    }

    /// The node as recorded in the cell, without following forwards.
    pub fn raw_node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn raw_offset(&self) -> u32 {
        self.offset
    }

    pub fn get_node(&self, graph: &Graph) -> Option<NodeId> {
        graph.resolve(*self).node
    }

    pub fn get_offset(&self, graph: &Graph) -> u32 {
        graph.resolve(*self).offset
    }

    /// Re-targets the cell at `offset` of `node`, normalized for the canonical node.
    pub fn point_to(&mut self, graph: &Graph, node: NodeId, offset: u32) {
        *self = graph.resolve(Cell::new(node, offset));
    }

    /// Rewrites the cell in place to its canonical form.
    pub fn normalize(&mut self, graph: &Graph) {
        *self = graph.resolve(*self);
    }

    /// Makes both cells denote the same offset of the same node.
    pub fn unify(&self, graph: &mut Graph, other: Cell) {
        graph.unify_cells(*self, other);
    }

    pub fn has_link(&self, graph: &Graph, offset: u32) -> bool {
        match self.node {
            Some(node) => graph.has_link(node, shift(self.offset, offset)),
            None => false,
        }
    }

    pub fn get_link(&self, graph: &Graph, offset: u32) -> Result<Cell> {
        let node = self.node.ok_or(GraphError::NullCell)?;
        graph.get_link(node, shift(self.offset, offset))
    }

    pub fn set_link(&self, graph: &mut Graph, offset: u32, target: Cell) -> Result<()> {
        let node = self.node.ok_or(GraphError::NullCell)?;
        graph.set_link(node, shift(self.offset, offset), target)
    }

    pub fn add_link(&self, graph: &mut Graph, offset: u32, target: Cell) -> Result<()> {
        let node = self.node.ok_or(GraphError::NullCell)?;
        graph.add_link(node, shift(self.offset, offset), target);
        Ok(())
    }

    pub fn swap(&mut self, other: &mut Cell) {
        std::mem::swap(self, other);
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node {
            Some(node) => write!(f, "{}+{}", node, self.offset),
            None => write!(f, "null"),
        }
    }
}

/// One equivalence class of memory objects.
///
/// Only canonical (non-forwarding) nodes carry meaningful fields; a forwarded node is an inert
/// husk whose state was moved into the node it forwards to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Node {
    flags: NodeFlags,
    stride: u32,
    size: u32,
    types: BTreeMap<u32, TypeSetId>,
    links: BTreeMap<u32, Cell>,
    forward: Option<(NodeId, u32)>,
}

impl Node {
    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Element stride of an array node.
    pub fn stride(&self) -> Option<u32> {
        self.is_array().then_some(self.stride.max(1))
    }

    pub fn is_array(&self) -> bool {
        self.flags.contains(NodeFlags::ARRAY)
    }

    pub fn is_collapsed(&self) -> bool {
        self.flags.contains(NodeFlags::COLLAPSED)
    }

    pub fn is_forwarding(&self) -> bool {
        self.forward.is_some()
    }

    pub fn forward(&self) -> Option<Cell> {
        self.forward.map(|(node, offset)| Cell::new(node, offset))
    }

    pub fn types(&self) -> impl Iterator<Item = (u32, TypeSetId)> + '_ {
        self.types.iter().map(|(&offset, &set)| (offset, set))
    }

    pub fn links(&self) -> impl Iterator<Item = (u32, Cell)> + '_ {
        self.links.iter().map(|(&offset, &cell)| (offset, cell))
    }

    pub fn is_void(&self) -> bool {
        self.types.is_empty()
    }

    pub fn is_empty_type(&self) -> bool {
        self.types.values().all(|set| *set == TypeSetId::EMPTY)
    }

    /// Offset used to index the field and link maps.
    ///
    /// Array nodes wrap at their element stride, which is fixed when the node is marked. The
    /// result is periodic in the stride, not in `size()`: growing an array past one element does
    /// not change how offsets fold.
    pub fn adjust_offset(&self, offset: u32) -> u32 {
        if self.is_collapsed() {
            0
        } else if self.is_array() {
            offset % self.stride.max(1)
        } else {
            offset
        }
    }

    fn grow(&mut self, size: u32) {
        if size > self.size {
            self.size = size;
        }
    }

    fn check_invariants(&self) {
        debug_assert!(
            !self.is_forwarding() || (self.types.is_empty() && self.links.is_empty()),
            "forwarded node still holds fields"
        );
        debug_assert!(
            !self.is_collapsed()
                || (self.types.keys().all(|&o| o == 0) && self.links.keys().all(|&o| o == 0)),
            "collapsed node has fields away from offset 0"
        );
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    config: GraphConfig,
    interner: TypeInterner,
    nodes: Vec<Node>,
    pending: Vec<(Cell, Cell)>,
}

impl Graph {
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            config,
            interner: TypeInterner::new(),
            nodes: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn interner(&self) -> &TypeInterner {
        &self.interner
    }

    pub fn interner_mut(&mut self) -> &mut TypeInterner {
        &mut self.interner
    }

    pub fn create_node(&mut self) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::default());
        id
    }

    /// Total number of nodes ever created, forwarded ones included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every node ever created, forwarded ones included.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn live_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| !node.is_forwarding())
            .map(|(idx, _)| NodeId(idx as u32))
    }

    pub fn is_forwarding(&self, id: NodeId) -> bool {
        self.nodes[id.index()].is_forwarding()
    }

    /// The canonical node `id` currently stands for.
    pub fn node(&self, id: NodeId) -> &Node {
        let (root, _) = self.canonical(id);
        &self.nodes[root.index()]
    }

    pub fn resolve(&self, cell: Cell) -> Cell {
        match cell.node {
            Some(node) => {
                let (root, delta) = self.canonical(node);
                let offset =
                    self.nodes[root.index()].adjust_offset(shift(cell.offset, delta));
                Cell::new(root, offset)
            }
            None => cell,
        }
    }

    /// Both cells are non-null and belong to the same canonical node.
    pub fn may_alias(&self, a: Cell, b: Cell) -> bool {
        match (self.resolve(a).node, self.resolve(b).node) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    pub fn same_cell(&self, a: Cell, b: Cell) -> bool {
        !a.is_null() && self.resolve(a) == self.resolve(b)
    }

    pub fn ty(&self, id: TypeId) -> &Type {
        self.interner.ty(id)
    }

    pub fn type_set(&self, set: TypeSetId) -> impl Iterator<Item = &Type> + '_ {
        self.interner
            .types(set)
            .iter()
            .map(move |&id| self.interner.ty(id))
    }

    pub fn type_set_contains(&self, set: TypeSetId, ty: &Type) -> bool {
        self.interner
            .lookup_type(ty)
            .map(|id| self.interner.contains(set, id))
            .unwrap_or(false)
    }

    pub fn set_attribute(&mut self, id: NodeId, flag: NodeFlags, value: bool) {
        let (root, _) = self.find(id);
        if value && flag.contains(NodeFlags::COLLAPSED) {
            self.collapse_node(root, "requested");
        }
        if value && flag.contains(NodeFlags::ARRAY) && !self.nodes[root.index()].is_array() {
            let stride = self.nodes[root.index()].size;
            self.mark_array(root, stride);
        }
        if !value && flag.intersects(NodeFlags::STRUCTURAL) {
            debug!(node = %root, ?flag, "ignoring attempt to clear a structural flag");
        }
        self.nodes[root.index()]
            .flags
            .set(flag.difference(NodeFlags::STRUCTURAL), value);
        self.drain_pending();
    }

    pub fn has_attribute(&self, id: NodeId, flag: NodeFlags) -> bool {
        self.node(id).flags.contains(flag)
    }

    pub fn is_array(&self, id: NodeId) -> bool {
        self.node(id).is_array()
    }

    pub fn is_collapsed(&self, id: NodeId) -> bool {
        self.node(id).is_collapsed()
    }

    /// Marks the node as an array of `element_size`-byte elements.
    ///
    /// Fields already recorded are folded into the first element.
    pub fn set_array(&mut self, id: NodeId, element_size: u32) {
        let (root, _) = self.find(id);
        self.mark_array(root, element_size);
        self.drain_pending();
    }

    pub fn size(&self, id: NodeId) -> u32 {
        self.node(id).size
    }

    pub fn grow_size(&mut self, id: NodeId, size: u32) {
        let (root, delta) = self.find(id);
        self.nodes[root.index()].grow(shift(delta, size));
    }

    /// Grows the node to hold a field of type `ty` at `offset`.
    pub fn grow_size_for(&mut self, id: NodeId, offset: u32, ty: &Type) {
        let bytes = self.config.data_layout.store_size(ty);
        if bytes == 0 {
            return;
        }
        let (root, delta) = self.find(id);
        let node = &mut self.nodes[root.index()];
        let offset = node.adjust_offset(shift(delta, offset));
        node.grow(shift(offset, bytes));
    }

    pub fn add_type(&mut self, id: NodeId, offset: u32, ty: Type) {
        let ty = self.interner.intern_type(ty);
        let (root, delta) = self.find(id);
        self.insert_type(root, shift(delta, offset), ty);
    }

    pub fn add_type_set(&mut self, id: NodeId, offset: u32, set: TypeSetId) {
        let (root, delta) = self.find(id);
        let members = self.interner.types(set).to_vec();
        for ty in members {
            self.insert_type(root, shift(delta, offset), ty);
        }
    }

    pub fn has_type(&self, id: NodeId, offset: u32) -> bool {
        let (node, slot) = self.locate(id, offset);
        node.types
            .get(&slot)
            .map(|set| !self.interner.is_empty(*set))
            .unwrap_or(false)
    }

    pub fn get_type(&self, id: NodeId, offset: u32) -> Result<TypeSetId> {
        let (node, slot) = self.locate(id, offset);
        node.types
            .get(&slot)
            .copied()
            .ok_or(GraphError::MissingType { node: id, offset })
    }

    /// Records that `offset` of the node points to `target`.
    ///
    /// A link already present at that offset is unified with `target`.
    pub fn add_link(&mut self, id: NodeId, offset: u32, target: Cell) {
        if target.is_null() {
            return;
        }
        let (root, delta) = self.find(id);
        self.insert_link(root, shift(delta, offset), target);
        self.drain_pending();
    }

    pub fn has_link(&self, id: NodeId, offset: u32) -> bool {
        let (node, slot) = self.locate(id, offset);
        node.links.contains_key(&slot)
    }

    pub fn get_link(&self, id: NodeId, offset: u32) -> Result<Cell> {
        let (node, slot) = self.locate(id, offset);
        node.links
            .get(&slot)
            .copied()
            .ok_or(GraphError::MissingLink { node: id, offset })
    }

    /// Overwrites an existing link without unifying.
    pub fn set_link(&mut self, id: NodeId, offset: u32, target: Cell) -> Result<()> {
        let (root, delta) = self.find(id);
        let node = &mut self.nodes[root.index()];
        let slot = node.adjust_offset(shift(delta, offset));
        match node.links.get_mut(&slot) {
            Some(link) => {
                *link = target;
                Ok(())
            }
            None => Err(GraphError::MissingLink { node: id, offset }),
        }
    }

    /// Drops field sensitivity: every offset of the node becomes offset 0.
    pub fn collapse(&mut self, id: NodeId) {
        let (root, _) = self.find(id);
        self.collapse_node(root, "requested");
        self.drain_pending();
    }

    pub fn unify(&mut self, a: NodeId, b: NodeId) {
        self.unify_at(a, b, 0);
    }

    /// Merges `src` so that its offset 0 coincides with `offset` of `dst`.
    pub fn unify_at(&mut self, src: NodeId, dst: NodeId, offset: u32) {
        self.unify_cells(Cell::new(src, 0), Cell::new(dst, offset));
    }

    /// Makes `a` and `b` denote the same memory.
    ///
    /// The node holding the smaller offset is embedded into the other one at the offset
    /// difference; on a tie the node of `a` is absorbed.
    pub fn unify_cells(&mut self, a: Cell, b: Cell) {
        self.pending.push((a, b));
        self.drain_pending();
    }

    fn drain_pending(&mut self) {
        while let Some((a, b)) = self.pending.pop() {
            self.unify_pair(a, b);
        }
    }

    fn unify_pair(&mut self, a: Cell, b: Cell) {
        if a.is_null() || b.is_null() {
            return;
        }
        let a = self.find_cell(a);
        let b = self.find_cell(b);
        if a == b {
            return;
        }
        let (Some(n1), Some(n2)) = (a.node, b.node) else {
            return;
        };
        if n1 == n2 {
            self.collapse_node(n1, "unified with itself at a different offset");
            return;
        }
        if a.offset <= b.offset {
            self.merge(n1, n2, b.offset - a.offset);
        } else {
            self.merge(n2, n1, a.offset - b.offset);
        }
    }

    /// Moves everything `src` knows into `dst` at `delta` and forwards `src` there.
    fn merge(&mut self, src: NodeId, dst: NodeId, delta: u32) {
        debug_assert_ne!(src, dst);
        debug_assert!(!self.is_forwarding(src) && !self.is_forwarding(dst));

        let delta = match self.placement(src, dst, delta) {
            Ok(delta) => delta,
            Err(reason) => {
                self.collapse_node(dst, reason);
                self.collapse_node(src, reason);
                0
            }
        };

        trace!(src = %src, dst = %dst, delta, "merging nodes");

        let husk = std::mem::take(&mut self.nodes[src.index()]);
        self.nodes[src.index()].forward = Some((dst, delta));

        let target = &mut self.nodes[dst.index()];
        target.flags.join(husk.flags);
        target.grow(shift(delta, husk.size));

        for (offset, set) in husk.types {
            let members = self.interner.types(set).to_vec();
            for ty in members {
                self.insert_type(dst, shift(delta, offset), ty);
            }
        }
        for (offset, cell) in husk.links {
            self.insert_link(dst, shift(delta, offset), cell);
        }

        self.nodes[dst.index()].check_invariants();
    }

    /// Decides where `src` lands inside `dst`, or why both must collapse.
    fn placement(
        &mut self,
        src: NodeId,
        dst: NodeId,
        delta: u32,
    ) -> std::result::Result<u32, &'static str> {
        let s = &self.nodes[src.index()];
        let d = &self.nodes[dst.index()];

        match (s.is_collapsed(), d.is_collapsed()) {
            (true, true) => return Ok(0),
            (true, false) | (false, true) => return Err("merging with a collapsed node"),
            (false, false) => {}
        }

        match (s.stride(), d.stride()) {
            (Some(s_stride), Some(d_stride)) => {
                if s_stride != d_stride {
                    Err("array strides differ")
                } else if delta % d_stride != 0 {
                    Err("array embedded off an element boundary")
                } else {
                    Ok(0)
                }
            }
            (None, Some(d_stride)) => {
                let within = delta % d_stride;
                if within.saturating_add(s.size) > d_stride {
                    Err("object straddles array elements")
                } else {
                    Ok(within)
                }
            }
            (Some(s_stride), None) => {
                if delta != 0 || d.size > s_stride {
                    Err("array embedded into a larger object")
                } else {
                    self.mark_array(dst, s_stride);
                    Ok(0)
                }
            }
            (None, None) => Ok(delta),
        }
    }

    fn mark_array(&mut self, root: NodeId, element_size: u32) {
        let stride = element_size.max(1);
        let node = &self.nodes[root.index()];
        if node.is_collapsed() {
            return;
        }
        if let Some(current) = node.stride() {
            if current != stride {
                self.collapse_node(root, "array stride changed");
            }
            return;
        }

        debug!(node = %root, stride, "marking node as array");
        let node = &mut self.nodes[root.index()];
        node.flags.insert(NodeFlags::ARRAY);
        node.stride = stride;
        node.grow(stride);
        let types = std::mem::take(&mut node.types);
        let links = std::mem::take(&mut node.links);

        for (offset, set) in types {
            let slot = offset % stride;
            let current = self.nodes[root.index()]
                .types
                .get(&slot)
                .copied()
                .unwrap_or(TypeSetId::EMPTY);
            let joined = self.interner.union(current, set);
            self.nodes[root.index()].types.insert(slot, joined);
        }
        for (offset, cell) in links {
            self.insert_link(root, offset, cell);
        }
    }

    fn collapse_node(&mut self, root: NodeId, reason: &'static str) {
        let node = &mut self.nodes[root.index()];
        if node.is_collapsed() {
            return;
        }
        debug!(node = %root, reason, "collapsing node");

        node.flags.insert(NodeFlags::COLLAPSED);
        let types = std::mem::take(&mut node.types);
        let links = std::mem::take(&mut node.links);

        let merged = types
            .into_values()
            .fold(TypeSetId::EMPTY, |acc, set| self.interner.union(acc, set));
        let node = &mut self.nodes[root.index()];
        if merged != TypeSetId::EMPTY {
            node.types.insert(0, merged);
        }

        let mut links = links.into_values();
        if let Some(first) = links.next() {
            node.links.insert(0, first);
            for other in links {
                self.pending.push((first, other));
            }
        }

        self.nodes[root.index()].check_invariants();
    }

    fn insert_type(&mut self, root: NodeId, offset: u32, ty: TypeId) {
        let bytes = self.config.data_layout.store_size(self.interner.ty(ty));
        let node = &mut self.nodes[root.index()];
        let offset = node.adjust_offset(offset);
        node.grow(shift(offset, bytes));
        let current = node.types.get(&offset).copied().unwrap_or(TypeSetId::EMPTY);
        let joined = self.interner.insert(current, ty);
        self.nodes[root.index()].types.insert(offset, joined);
    }

    fn insert_link(&mut self, root: NodeId, offset: u32, target: Cell) {
        let node = &mut self.nodes[root.index()];
        let offset = node.adjust_offset(offset);
        match node.links.get(&offset).copied() {
            Some(existing) => {
                trace!(node = %root, offset, %existing, %target, "unifying links");
                self.pending.push((existing, target));
            }
            None => {
                node.links.insert(offset, target);
            }
        }
    }

    /// Follows forwards without modifying the graph.
    fn canonical(&self, id: NodeId) -> (NodeId, u32) {
        let mut current = id;
        let mut delta = 0u32;
        while let Some((next, offset)) = self.nodes[current.index()].forward {
            debug_assert_ne!(next, current, "node forwards to itself");
            current = next;
            delta = shift(delta, offset);
        }
        (current, delta)
    }

    /// Like `canonical`, compressing the forward chain behind it.
    fn find(&mut self, id: NodeId) -> (NodeId, u32) {
        let (root, delta) = self.canonical(id);
        if self.config.compress_paths {
            let mut current = id;
            let mut remaining = delta;
            while current != root {
                let Some((next, offset)) = self.nodes[current.index()].forward else {
                    break;
                };
                self.nodes[current.index()].forward = Some((root, remaining));
                remaining = remaining.saturating_sub(offset);
                current = next;
            }
        }
        (root, delta)
    }

    fn find_cell(&mut self, cell: Cell) -> Cell {
        match cell.node {
            Some(node) => {
                let (root, delta) = self.find(node);
                let offset =
                    self.nodes[root.index()].adjust_offset(shift(cell.offset, delta));
                Cell::new(root, offset)
            }
            None => cell,
        }
    }

    /// Canonical node for `id` and the map slot `offset` lands in.
    fn locate(&self, id: NodeId, offset: u32) -> (&Node, u32) {
        let (root, delta) = self.canonical(id);
        let node = &self.nodes[root.index()];
        (node, node.adjust_offset(shift(offset, delta)))
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
