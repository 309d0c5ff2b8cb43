/*! Field-sensitive memory shape graphs for points-to analysis.
 *
 * Memory objects a program may allocate are grouped into nodes; cells are byte offsets into those
 * nodes and carry the points-to edges. A driving analysis mints nodes and unifies cells whenever it
 * learns two of them denote the same memory. Unification merges type and link information, and a
 * node whose fields can no longer be told apart collapses to a single untyped field.
 */

pub mod config;
pub mod flags;
pub mod graph;
pub mod interner;
pub mod types;

pub use config::GraphConfig;
pub use flags::NodeFlags;
pub use graph::{Cell, Graph, Node, NodeId};
pub use interner::{TypeId, TypeInterner, TypeSetId};
pub use types::{DataLayout, Type};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("No type at offset {offset} of node {node}")]
    MissingType { node: NodeId, offset: u32 },
    #[error("No link at offset {offset} of node {node}")]
    MissingLink { node: NodeId, offset: u32 },
    #[error("Operation on a null cell")]
    NullCell,
    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests;
