// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::types::NodeId;

/// Errors reported by structural document operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// The identifier does not refer to a live node.
    #[error("node {0:?} is not alive in this document")]
    StaleNode(NodeId),
    /// The insertion would make a node its own ancestor.
    #[error("cannot insert {child:?} under {parent:?}: it would become its own ancestor")]
    HierarchyRequest {
        /// Prospective parent.
        parent: NodeId,
        /// Node being inserted.
        child: NodeId,
    },
    /// The reference node is not a child of the given parent.
    #[error("{reference:?} is not a child of {parent:?}")]
    NotAChild {
        /// Parent that was searched.
        parent: NodeId,
        /// Node that was expected among its children.
        reference: NodeId,
    },
    /// Only elements can hold children.
    #[error("{0:?} is not an element and cannot have children")]
    NotAnElement(NodeId),
}
