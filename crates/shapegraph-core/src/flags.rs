use bitflags::bitflags;

bitflags! {
    /// Semantic marks on a node.
    ///
    /// Marks only accumulate: merging two nodes takes the union of their flags.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct NodeFlags: u32 {
        const SHADOW = 1 << 0;
        /// Stack allocated.
        const ALLOCA = 1 << 1;
        const HEAP = 1 << 2;
        const GLOBAL = 1 << 3;
        const EXTERN_FUNC = 1 << 4;
        const EXTERN_GLOBAL = 1 << 5;
        /// Provenance not known to the analysis.
        const UNKNOWN = 1 << 6;
        const INCOMPLETE = 1 << 7;
        const MODIFIED = 1 << 8;
        const READ = 1 << 9;
        /// Offsets wrap around the element stride.
        const ARRAY = 1 << 10;
        /// Field sensitivity lost; every offset is 0.
        const COLLAPSED = 1 << 11;
        /// Reachable from code outside the analyzed unit.
        const EXTERNAL = 1 << 12;
        const INT_TO_PTR = 1 << 13;
        const PTR_TO_INT = 1 << 14;
        const VA_START = 1 << 15;
        const DEAD = 1 << 16;
    }
}

impl NodeFlags {
    /// Flags that change how offsets are interpreted. They are only ever set through
    /// `Graph::collapse` / `Graph::set_array`, never cleared.
    pub const STRUCTURAL: NodeFlags = NodeFlags::ARRAY.union(NodeFlags::COLLAPSED);

    pub fn join(&mut self, other: NodeFlags) {
        *self |= other;
    }
}
