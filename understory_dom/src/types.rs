// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the document: node identifiers, node kinds, and events.

use alloc::rc::Rc;
use alloc::string::String;

/// Identifier for a node in the document (generational).
///
/// A `NodeId` stays valid until the node is destroyed. Once its slot is
/// reused the old identifier is stale and every query on it answers `None`
/// (or fails with [`DomError::StaleNode`](crate::DomError::StaleNode)).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// What a node is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// An element with a tag name (for example `div`).
    Element {
        /// Lowercase tag name.
        tag: String,
    },
    /// A comment node. Used for placeholders and view-container anchors.
    Comment(String),
    /// A text node.
    Text(String),
}

impl NodeKind {
    /// Returns true for [`NodeKind::Element`].
    pub fn is_element(&self) -> bool {
        matches!(self, Self::Element { .. })
    }
}

/// Identifier of a registered event listener.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Kinds of events the document can route.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EventKind {
    /// Primary button click.
    Click,
    /// Auxiliary (middle) button click.
    AuxClick,
    /// Context menu request.
    ContextMenu,
    /// Pointer pressed.
    PointerDown,
    /// Key pressed.
    KeyDown,
    /// A CSS transition finished.
    TransitionEnd,
}

/// An event routed through the document.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DomEvent {
    /// Event kind.
    pub kind: EventKind,
    /// The node the event was dispatched to.
    pub target: NodeId,
}

impl DomEvent {
    /// Create an event of `kind` targeting `target`.
    pub const fn new(kind: EventKind, target: NodeId) -> Self {
        Self { kind, target }
    }
}

/// Shared event listener callback.
pub type Listener = Rc<dyn Fn(&DomEvent)>;
