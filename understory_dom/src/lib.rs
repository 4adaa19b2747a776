// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory DOM: a small arena document for portals and overlays.
//!
//! Portals move content between render locations and overlays stack floating
//! panels over a page. Both need a tree they can restructure, decorate, and
//! listen to. This crate provides that tree without a browser:
//!
//! - Element, comment, and text nodes addressed by generational [`NodeId`]s.
//! - Structural edits that mirror the DOM: [`Document::append_child`],
//!   [`Document::insert_before`], [`Document::replace_with`],
//!   [`Document::detach`], and [`Document::destroy`].
//! - Presentation state: classes, inline styles, attributes, and measured
//!   bounds ([`kurbo::Rect`]) recorded by an external layout pass.
//! - Listeners with bubbling dispatch through [`dispatch_event`].
//!
//! ## Not a layout or rendering engine
//!
//! Styles and classes are stored, never interpreted. Bounds are whatever the
//! embedder measured and wrote back with [`Document::set_bounds`].
//!
//! ## Sharing
//!
//! Outlets and overlays hold a document as `Rc<RefCell<Document>>`. Event
//! dispatch releases the borrow before calling listeners, so listeners may edit
//! the tree.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod document;
mod error;
mod event;
mod types;

pub use document::Document;
pub use error::DomError;
pub use event::dispatch_event;
pub use types::{DomEvent, EventKind, Listener, ListenerId, NodeId, NodeKind};
