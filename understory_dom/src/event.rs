// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bubbling event dispatch over a shared document.

use core::cell::RefCell;

use crate::document::Document;
use crate::types::DomEvent;

/// Dispatch `event` to listeners on its target and every ancestor (bubble order).
///
/// Listeners are collected while the document is borrowed and invoked after the
/// borrow is released, so a listener may freely mutate the document (including
/// removing the node it was registered on). Listener changes made during
/// dispatch take effect for the next event.
///
/// Returns the number of listeners invoked.
///
/// ```rust
/// use core::cell::{Cell, RefCell};
/// use std::rc::Rc;
/// use understory_dom::{Document, DomEvent, EventKind, dispatch_event};
///
/// let doc = RefCell::new(Document::new());
/// let button = doc.borrow_mut().create_element("button");
/// let body = doc.borrow().body();
/// doc.borrow_mut().append_child(body, button).unwrap();
///
/// let clicks = Rc::new(Cell::new(0));
/// let seen = clicks.clone();
/// doc.borrow_mut()
///     .add_listener(body, EventKind::Click, Rc::new(move |_| seen.set(seen.get() + 1)));
///
/// let invoked = dispatch_event(&doc, DomEvent::new(EventKind::Click, button));
/// assert_eq!(invoked, 1);
/// assert_eq!(clicks.get(), 1);
/// ```
pub fn dispatch_event(document: &RefCell<Document>, event: DomEvent) -> usize {
    let listeners = document.borrow().bubble_listeners(event.target, event.kind);
    for listener in &listeners {
        listener(&event);
    }
    listeners.len()
}
