// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_portal --heading-base-level=0

//! Understory Portal: content that renders somewhere else.
//!
//! A [`Portal`] wraps content that is not yet rendered: a component type, a
//! template with a context, or an existing node to relocate. A [`PortalOutlet`]
//! is a place that can render one portal at a time.
//!
//! - [`Portal::attach`] renders the portal into an outlet and returns what it
//!   produced ([`AttachedContent`]).
//! - [`Portal::detach`] and [`PortalOutlet::detach`] undo exactly what the
//!   attach did.
//! - [`PortalOutlet::dispose`] tears down for good; later attaches fail.
//!
//! ## Guarantees
//!
//! - An outlet holds at most one portal, and a portal sits in at most one
//!   outlet. Violations are reported as [`PortalError`]s and leave both sides
//!   untouched.
//! - Each successful attach arms one teardown, which runs exactly once across
//!   any sequence of detach and dispose calls.
//! - A failed attach rolls back completely.
//!
//! ## Outlets
//!
//! [`BasePortalOutlet`] enforces the rules above and dispatches on
//! [`PortalKind`] to an [`OutletBackend`]. Two backends are provided:
//!
//! - [`DomOutletBackend`] renders into an arbitrary element
//!   ([`DomPortalOutlet`]).
//! - [`ViewContainerOutlet`] renders at a [`ViewContainerRef`] and reports
//!   each attach.
//!
//! ## Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use understory_dom::Document;
//! use understory_portal::{DomOutletBackend, DomPortal, Portal, PortalOutlet};
//!
//! let doc = Rc::new(RefCell::new(Document::new()));
//! let (card, target) = {
//!     let mut d = doc.borrow_mut();
//!     let body = d.body();
//!     let card = d.create_element("div");
//!     let target = d.create_element("aside");
//!     d.append_child(body, card).unwrap();
//!     d.append_child(body, target).unwrap();
//!     (card, target)
//! };
//!
//! let outlet = DomOutletBackend::new(doc.clone(), target).into_outlet();
//! let portal: Portal = DomPortal::new(card).into();
//!
//! portal.attach(&*outlet).unwrap();
//! assert_eq!(doc.borrow().parent_of(card), Some(target));
//!
//! portal.detach().unwrap();
//! assert_eq!(doc.borrow().first_child(doc.borrow().body()), Some(card));
//! assert!(!outlet.has_attached());
//! ```

mod dom_outlet;
mod error;
mod injector;
pub mod notify;
mod outlet;
mod portal;
mod slot_outlet;
pub mod view;

pub use dom_outlet::{DomOutletBackend, DomPortalOutlet};
pub use error::PortalError;
pub use injector::{Injector, InjectorBuilder};
pub use notify::{EventStream, Subject, Subscription};
pub use outlet::{AttachedContent, Attachment, BasePortalOutlet, DisposeFn, OutletBackend, PortalOutlet};
pub use portal::{ComponentPortal, DomPortal, Portal, PortalKind, TemplatePortal};
pub use slot_outlet::{ViewContainerBackend, ViewContainerOutlet};
pub use view::{
    ApplicationRoot, ComponentFactory, ComponentFactoryResolver, ComponentRef, ComponentRegistry,
    ComponentType, Context, EmbeddedViewRef, SharedDocument, TemplateInput, TemplateRef,
    ViewContainerRef, ViewRef,
};
