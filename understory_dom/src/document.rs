// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core document implementation: structure, presentation state, listeners.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use hashbrown::HashMap;
use kurbo::Rect;
use smallvec::SmallVec;

use crate::error::DomError;
use crate::types::{EventKind, Listener, ListenerId, NodeId, NodeKind};

/// An arena-backed document tree.
///
/// Nodes are created detached and become part of the rendered tree once they
/// are linked under [`Document::body`] (directly or through ancestors).
/// Structural edits take effect immediately; there is no commit step.
///
/// ## Example
///
/// ```rust
/// use understory_dom::Document;
///
/// let mut doc = Document::new();
/// let body = doc.body();
/// let panel = doc.create_element("div");
/// doc.append_child(body, panel).unwrap();
/// doc.add_class(panel, "panel");
///
/// assert_eq!(doc.parent_of(panel), Some(body));
/// assert!(doc.has_class(panel, "panel"));
/// ```
pub struct Document {
    /// slots
    nodes: Vec<Option<Node>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
    body: NodeId,
    next_listener: u64,
}

impl core::fmt::Debug for Document {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        f.debug_struct("Document")
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &self.free_list.len())
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

struct Node {
    generation: u32,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
    classes: SmallVec<[String; 4]>,
    styles: HashMap<String, String>,
    attributes: HashMap<String, String>,
    bounds: Rect,
    listeners: SmallVec<[(ListenerId, EventKind, Listener); 1]>,
}

impl Node {
    fn new(generation: u32, kind: NodeKind) -> Self {
        Self {
            generation,
            parent: None,
            children: Vec::new(),
            kind,
            classes: SmallVec::new(),
            styles: HashMap::new(),
            attributes: HashMap::new(),
            bounds: Rect::ZERO,
            listeners: SmallVec::new(),
        }
    }
}

impl Document {
    /// Create a document containing only a `body` element.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            body: NodeId::new(0, 0),
            next_listener: 1,
        };
        doc.body = doc.alloc(NodeKind::Element {
            tag: "body".to_string(),
        });
        doc
    }

    /// The root `body` element.
    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
        })
    }

    /// Create a detached comment node.
    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Comment(text.to_string()))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Text(text.to_string()))
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(Node::new(generation, kind));
            (idx, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(Node::new(generation, kind)));
            self.generations.push(generation);
            (self.nodes.len() - 1, generation)
        };
        #[allow(
            clippy::cast_possible_truncation,
            reason = "NodeId stores 32-bit slot indices."
        )]
        NodeId::new(idx as u32, generation)
    }

    /// Returns true if `id` refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live nodes, including `body`.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Kind of a live node.
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.get(id).map(|n| &n.kind)
    }

    /// Tag name of a live element.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element { tag } => Some(tag.as_str()),
            _ => None,
        }
    }

    /// Text of a live comment or text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Comment(text) | NodeKind::Text(text) => Some(text.as_str()),
            NodeKind::Element { .. } => None,
        }
    }

    // --- structure ---

    /// Returns the parent of a node, or `None` for detached nodes, `body`, or stale ids.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    /// Children of a node in document order, or an empty slice if the node is stale.
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// First child of a node.
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children_of(id).first().copied()
    }

    /// Last child of a node.
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children_of(id).last().copied()
    }

    /// Sibling immediately after `id`.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent_of(id)?;
        let siblings = self.children_of(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        siblings.get(pos + 1).copied()
    }

    /// Sibling immediately before `id`.
    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent_of(id)?;
        let siblings = self.children_of(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        pos.checked_sub(1).and_then(|p| siblings.get(p).copied())
    }

    /// Returns true if `node` is `ancestor` or one of its descendants.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        if !self.is_alive(ancestor) {
            return false;
        }
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent_of(id);
        }
        false
    }

    /// Returns true if the node is reachable from [`Document::body`].
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(self.body, id)
    }

    /// Append `child` as the last child of `parent`, moving it if it is already linked elsewhere.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` under `parent` immediately before `reference` (or last when `None`).
    ///
    /// The child is unlinked from its current parent first.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.check_insertion(parent, child)?;
        if let Some(r) = reference {
            if r == child {
                return Ok(());
            }
            if self.parent_of(r) != Some(parent) {
                return Err(DomError::NotAChild {
                    parent,
                    reference: r,
                });
            }
        }
        self.unlink(child);
        let p = self.node_mut(parent)?;
        let at = reference
            .and_then(|r| p.children.iter().position(|&c| c == r))
            .unwrap_or(p.children.len());
        p.children.insert(at, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Put `new` in the tree position currently held by `old`, leaving `old` detached.
    pub fn replace_with(&mut self, old: NodeId, new: NodeId) -> Result<(), DomError> {
        if !self.is_alive(old) {
            return Err(DomError::StaleNode(old));
        }
        if old == new {
            return Ok(());
        }
        let Some(parent) = self.parent_of(old) else {
            // Nothing to take the place of; mirror the DOM and do nothing.
            return Ok(());
        };
        self.check_insertion(parent, new)?;
        self.unlink(new);
        let p = self.node_mut(parent)?;
        let Some(at) = p.children.iter().position(|&c| c == old) else {
            return Err(DomError::NotAChild {
                parent,
                reference: old,
            });
        };
        p.children[at] = new;
        self.node_mut(new)?.parent = Some(parent);
        self.node_mut(old)?.parent = None;
        Ok(())
    }

    /// Unlink a node from its parent, keeping it (and its subtree) alive.
    ///
    /// Returns the former parent, if any.
    pub fn detach(&mut self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent_of(id)?;
        self.unlink(id);
        Some(parent)
    }

    /// Unlink a node and free it together with its whole subtree.
    ///
    /// Listeners registered on freed nodes are dropped. Destroying `body` is ignored.
    pub fn destroy(&mut self, id: NodeId) {
        if !self.is_alive(id) || id == self.body {
            return;
        }
        self.unlink(id);
        let mut stack = alloc::vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes[current.idx()].take() {
                stack.extend(node.children);
                self.free_list.push(current.idx());
            }
        }
    }

    // --- presentation state ---

    /// Add a class; returns true if it was not present.
    pub fn add_class(&mut self, id: NodeId, class: &str) -> bool {
        let Some(n) = self.get_mut(id) else {
            return false;
        };
        if class.is_empty() || n.classes.iter().any(|c| c == class) {
            return false;
        }
        n.classes.push(class.to_string());
        true
    }

    /// Remove a class; returns true if it was present.
    pub fn remove_class(&mut self, id: NodeId, class: &str) -> bool {
        let Some(n) = self.get_mut(id) else {
            return false;
        };
        let before = n.classes.len();
        n.classes.retain(|c| c != class);
        n.classes.len() != before
    }

    /// Returns true if the node carries `class`.
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.get(id)
            .is_some_and(|n| n.classes.iter().any(|c| c == class))
    }

    /// Classes of a node in insertion order.
    pub fn classes(&self, id: NodeId) -> &[String] {
        self.get(id).map(|n| n.classes.as_slice()).unwrap_or(&[])
    }

    /// Set an inline style property. An empty value removes the property.
    pub fn set_style(&mut self, id: NodeId, property: &str, value: &str) {
        let Some(n) = self.get_mut(id) else {
            return;
        };
        if value.is_empty() {
            n.styles.remove(property);
        } else {
            n.styles.insert(property.to_string(), value.to_string());
        }
    }

    /// Remove an inline style property.
    pub fn remove_style(&mut self, id: NodeId, property: &str) {
        if let Some(n) = self.get_mut(id) {
            n.styles.remove(property);
        }
    }

    /// Read an inline style property.
    pub fn style(&self, id: NodeId, property: &str) -> Option<&str> {
        self.get(id)
            .and_then(|n| n.styles.get(property))
            .map(String::as_str)
    }

    /// Set an attribute.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(n) = self.get_mut(id) {
            n.attributes.insert(name.to_string(), value.to_string());
        }
    }

    /// Remove an attribute.
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if let Some(n) = self.get_mut(id) {
            n.attributes.remove(name);
        }
    }

    /// Read an attribute.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.get(id)
            .and_then(|n| n.attributes.get(name))
            .map(String::as_str)
    }

    /// Record the measured bounds of a node (written by an external layout pass).
    pub fn set_bounds(&mut self, id: NodeId, bounds: Rect) {
        if let Some(n) = self.get_mut(id) {
            n.bounds = bounds;
        }
    }

    /// Measured bounds of a node; [`Rect::ZERO`] until measured.
    pub fn bounds(&self, id: NodeId) -> Option<Rect> {
        self.get(id).map(|n| n.bounds)
    }

    // --- listeners ---

    /// Register a listener for `kind` events on `id`.
    ///
    /// Returns `None` if the node is stale.
    pub fn add_listener(
        &mut self,
        id: NodeId,
        kind: EventKind,
        listener: Listener,
    ) -> Option<ListenerId> {
        let lid = ListenerId(self.next_listener);
        let n = self.get_mut(id)?;
        n.listeners.push((lid, kind, listener));
        self.next_listener += 1;
        Some(lid)
    }

    /// Remove a listener; returns true if it was registered on `id`.
    pub fn remove_listener(&mut self, id: NodeId, listener: ListenerId) -> bool {
        let Some(n) = self.get_mut(id) else {
            return false;
        };
        let before = n.listeners.len();
        n.listeners.retain(|(l, _, _)| *l != listener);
        n.listeners.len() != before
    }

    /// Number of listeners registered directly on a node.
    pub fn listener_count(&self, id: NodeId) -> usize {
        self.get(id).map(|n| n.listeners.len()).unwrap_or(0)
    }

    /// Listeners for `kind` from `target` up to the root, in bubble order.
    pub fn bubble_listeners(&self, target: NodeId, kind: EventKind) -> Vec<Listener> {
        let mut out = Vec::new();
        let mut current = Some(target);
        while let Some(id) = current {
            let Some(n) = self.get(id) else {
                break;
            };
            out.extend(
                n.listeners
                    .iter()
                    .filter(|(_, k, _)| *k == kind)
                    .map(|(_, _, l)| l.clone()),
            );
            current = n.parent;
        }
        out
    }

    // --- internals ---

    fn get(&self, id: NodeId) -> Option<&Node> {
        let n = self.nodes.get(id.idx())?.as_ref()?;
        (n.generation == id.1).then_some(n)
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let n = self.nodes.get_mut(id.idx())?.as_mut()?;
        (n.generation == id.1).then_some(n)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.get_mut(id).ok_or(DomError::StaleNode(id))
    }

    fn check_insertion(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let Some(p) = self.get(parent) else {
            return Err(DomError::StaleNode(parent));
        };
        if !self.is_alive(child) {
            return Err(DomError::StaleNode(child));
        }
        if !p.kind.is_element() {
            return Err(DomError::NotAnElement(parent));
        }
        if self.contains(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        Ok(())
    }

    fn unlink(&mut self, id: NodeId) {
        let Some(parent) = self.parent_of(id) else {
            return;
        };
        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|c| *c != id);
        }
        if let Some(n) = self.get_mut(id) {
            n.parent = None;
        }
    }
}
