// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_overlay --heading-base-level=0

//! Understory Overlay: floating panes on top of everything else.
//!
//! An [`OverlayRef`] owns a host element, a pane inside it, an optional
//! backdrop, and a [`PortalOutlet`](understory_portal::PortalOutlet) that
//! renders into the pane. [`Overlay::create`] builds all of this inside a
//! shared container under `body`.
//!
//! - [`OverlayRef::attach`] renders a portal, applies size, direction, and
//!   panel classes, shows the backdrop, and registers with the dispatchers.
//! - [`OverlayRef::detach`] reverses that; the host leaves the document once
//!   the pane is empty.
//! - [`OverlayRef::dispose`] tears everything down immediately.
//!
//! Deferred work runs on a [`Scheduler`], a deterministic model of the event
//! loop: drive it with [`Scheduler::render_frame`], [`Scheduler::run_microtasks`],
//! and [`Scheduler::advance`].
//!
//! Placement and scroll handling are pluggable through [`PositionStrategy`]
//! and [`ScrollStrategy`]. Key events and outside clicks are routed by
//! [`KeyboardDispatcher`] and [`OutsideClickDispatcher`].
//!
//! ## Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use understory_dom::Document;
//! use understory_overlay::{classes, Overlay, OverlayConfig, OverlayServices};
//! use understory_portal::{DomPortal, Portal};
//!
//! let doc = Rc::new(RefCell::new(Document::new()));
//! let services = OverlayServices::new(doc.clone());
//! let scheduler = services.scheduler.clone();
//! let overlays = Overlay::new(services);
//!
//! let menu = {
//!     let mut d = doc.borrow_mut();
//!     let body = d.body();
//!     let menu = d.create_element("ul");
//!     d.append_child(body, menu).unwrap();
//!     menu
//! };
//!
//! let overlay = overlays
//!     .create(OverlayConfig::default().with_backdrop(true))
//!     .unwrap();
//! overlay.attach(&Portal::from(DomPortal::new(menu))).unwrap();
//! assert_eq!(doc.borrow().parent_of(menu), Some(overlay.overlay_element()));
//!
//! let backdrop = overlay.backdrop_element().unwrap();
//! scheduler.render_frame();
//! assert!(doc.borrow().has_class(backdrop, classes::BACKDROP_SHOWING));
//!
//! overlay.dispose();
//! assert!(!doc.borrow().is_alive(overlay.host_element()));
//! assert!(!doc.borrow().is_alive(backdrop));
//! ```

pub mod classes;
mod config;
mod dispatchers;
mod location;
mod overlay;
mod overlay_ref;
mod scheduler;
mod strategy;

pub use config::{
    ClassList, Dimension, Direction, DirectionSource, OverlayConfig, OverlaySizeConfig,
    coerce_css_pixel_value,
};
pub use dispatchers::{
    KeyboardDispatcher, KeyboardEvent, Modifiers, OutsideClickDispatcher, PointerEvent,
};
pub use location::Location;
pub use overlay::{Overlay, OverlayContainer, OverlayServices};
pub use overlay_ref::{BACKDROP_FALLBACK_MS, OverlayRef};
pub use scheduler::{Scheduler, TaskId};
pub use strategy::{
    Align, BlockScrollStrategy, GlobalPositionStrategy, NoopScrollStrategy, OverlayTarget,
    PositionStrategy, ScrollStrategy,
};
