/*! Memory shape graphs for points-to analysis.
 *
 * Single import for analyses that build a shape graph: create nodes for the objects a program
 * allocates, record the types and pointers found in their fields, and unify cells whenever two
 * pointers may alias. Alias queries then reduce to asking whether two cells resolve to the same
 * node.
 */

pub use shapegraph_core as core;

pub use shapegraph_core::{
    Cell, DataLayout, Graph, GraphConfig, GraphError, Node, NodeFlags, NodeId, Result, Type,
    TypeId, TypeInterner, TypeSetId,
};
