// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Routing of document-level input to attached overlays.
//!
//! Both dispatchers are registries of the overlays that are currently attached,
//! in stacking order (last added is topmost). Overlays add themselves on attach
//! and remove themselves on detach and dispose. Registries hold weak references,
//! so a dropped overlay simply stops receiving events.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use understory_dom::{EventKind, NodeId};

use crate::overlay_ref::OverlayRef;

bitflags::bitflags! {
    /// Modifier keys held during a key event.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        /// Shift.
        const SHIFT = 0b0000_0001;
        /// Control.
        const CTRL  = 0b0000_0010;
        /// Alt / Option.
        const ALT   = 0b0000_0100;
        /// Meta / Command.
        const META  = 0b0000_1000;
    }
}

/// A key press.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyboardEvent {
    /// Key name, e.g. `"Escape"`.
    pub key: String,
    /// Held modifiers.
    pub modifiers: Modifiers,
}

impl KeyboardEvent {
    /// A key press without modifiers.
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            modifiers: Modifiers::empty(),
        }
    }

    /// Add modifiers.
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// A pointer event as seen by the outside-click dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointerEvent {
    /// `Click`, `AuxClick`, or `ContextMenu`.
    pub kind: EventKind,
    /// Node the event was dispatched to.
    pub target: NodeId,
    /// Node the matching pointer-down happened on, if known. A drag that
    /// started inside a pane and ended outside is not an outside click.
    pub origin: Option<NodeId>,
}

impl PointerEvent {
    /// A click on `target`.
    pub const fn click(target: NodeId) -> Self {
        Self {
            kind: EventKind::Click,
            target,
            origin: None,
        }
    }

    /// Record where the pointer went down.
    pub const fn with_origin(mut self, origin: NodeId) -> Self {
        self.origin = Some(origin);
        self
    }
}

#[derive(Default)]
struct Registry {
    overlays: RefCell<Vec<Weak<OverlayRef>>>,
}

impl Registry {
    fn add(&self, overlay: &Rc<OverlayRef>) {
        self.remove(overlay);
        self.overlays.borrow_mut().push(Rc::downgrade(overlay));
    }

    fn remove(&self, overlay: &OverlayRef) -> bool {
        let mut overlays = self.overlays.borrow_mut();
        let before = overlays.len();
        overlays.retain(|w| w.strong_count() > 0 && !core::ptr::eq(w.as_ptr(), overlay));
        overlays.len() != before
    }

    /// Live overlays, topmost first.
    fn topmost_first(&self) -> Vec<Rc<OverlayRef>> {
        self.overlays
            .borrow()
            .iter()
            .rev()
            .filter_map(Weak::upgrade)
            .collect()
    }

    fn len(&self) -> usize {
        self.overlays
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }
}

/// Sends key events to the topmost overlay that listens for them.
#[derive(Clone, Default)]
pub struct KeyboardDispatcher {
    registry: Rc<Registry>,
}

impl fmt::Debug for KeyboardDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyboardDispatcher")
            .field("overlays", &self.registry.len())
            .finish()
    }
}

impl KeyboardDispatcher {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `overlay` as topmost.
    pub fn add(&self, overlay: &Rc<OverlayRef>) {
        self.registry.add(overlay);
    }

    /// Unregister `overlay`. Returns false if it was not registered.
    pub fn remove(&self, overlay: &OverlayRef) -> bool {
        self.registry.remove(overlay)
    }

    /// Returns true while any overlay is registered.
    pub fn is_listening(&self) -> bool {
        self.registry.len() > 0
    }

    /// Number of registered overlays.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to the topmost overlay with keydown observers.
    ///
    /// Returns true if some overlay received it.
    pub fn dispatch(&self, event: &KeyboardEvent) -> bool {
        let Some(overlay) = self
            .registry
            .topmost_first()
            .into_iter()
            .find(|o| o.keydown_subject().has_observers())
        else {
            return false;
        };
        tracing::trace!(key = %event.key, host = ?overlay.host_element(), "keydown routed");
        overlay.keydown_subject().emit(event);
        true
    }
}

/// Notifies overlays of pointer events that land outside their pane.
#[derive(Clone, Default)]
pub struct OutsideClickDispatcher {
    registry: Rc<Registry>,
}

impl fmt::Debug for OutsideClickDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutsideClickDispatcher")
            .field("overlays", &self.registry.len())
            .finish()
    }
}

impl OutsideClickDispatcher {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `overlay` as topmost.
    pub fn add(&self, overlay: &Rc<OverlayRef>) {
        self.registry.add(overlay);
    }

    /// Unregister `overlay`. Returns false if it was not registered.
    pub fn remove(&self, overlay: &OverlayRef) -> bool {
        self.registry.remove(overlay)
    }

    /// Returns true while any overlay is registered.
    pub fn is_listening(&self) -> bool {
        self.registry.len() > 0
    }

    /// Number of registered overlays.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Walk overlays from the top and notify each one `event` is outside of.
    ///
    /// Overlays without outside-pointer observers are skipped. The walk stops
    /// at the first overlay whose pane contains the target or the origin, so
    /// overlays underneath a clicked overlay are not notified.
    ///
    /// Returns the number of overlays notified.
    pub fn dispatch(&self, event: &PointerEvent) -> usize {
        let mut notified = 0;
        for overlay in self.registry.topmost_first() {
            if !overlay.outside_pointer_subject().has_observers() {
                continue;
            }
            let inside = {
                let doc = overlay.document().borrow();
                let pane = overlay.overlay_element();
                doc.contains(pane, event.target)
                    || event.origin.is_some_and(|origin| doc.contains(pane, origin))
            };
            if inside {
                break;
            }
            overlay.outside_pointer_subject().emit(event);
            notified += 1;
        }
        notified
    }
}
