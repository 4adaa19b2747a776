// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pluggable positioning and scroll handling.
//!
//! Strategies are shared handles (`Rc<dyn …>`) so a configuration stays cheap to
//! clone; implementations keep their own state behind interior mutability.

use std::cell::{Cell, RefCell};
use std::fmt;

use kurbo::{Point, Rect, Size};
use understory_dom::NodeId;
use understory_portal::SharedDocument;

use crate::classes;

/// The elements a strategy works on.
#[derive(Clone)]
pub struct OverlayTarget {
    /// The document both elements live in.
    pub document: SharedDocument,
    /// The positioned wrapper.
    pub host: NodeId,
    /// The pane holding the content.
    pub pane: NodeId,
}

impl fmt::Debug for OverlayTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayTarget")
            .field("host", &self.host)
            .field("pane", &self.pane)
            .finish_non_exhaustive()
    }
}

/// Computes and applies the pane's position.
pub trait PositionStrategy {
    /// Bind to an overlay. Called on every attach.
    fn attach(&self, target: &OverlayTarget);

    /// Place the pane.
    fn apply(&self);

    /// The overlay's content was detached.
    fn detach(&self) {}

    /// The overlay is going away, or switched to another strategy.
    fn dispose(&self);
}

/// Decides how page scrolling affects an open overlay.
pub trait ScrollStrategy {
    /// Bind to an overlay. Called on every attach.
    fn attach(&self, target: &OverlayTarget);

    /// Start handling scroll.
    fn enable(&self);

    /// Stop handling scroll.
    fn disable(&self);

    /// Unbind from the overlay.
    fn detach(&self) {}
}

/// Leaves scrolling alone.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopScrollStrategy;

impl ScrollStrategy for NoopScrollStrategy {
    fn attach(&self, _target: &OverlayTarget) {}
    fn enable(&self) {}
    fn disable(&self) {}
}

/// Blocks page scrolling while enabled by marking `body` with
/// [`classes::SCROLL_BLOCK`].
#[derive(Debug, Default)]
pub struct BlockScrollStrategy {
    target: RefCell<Option<OverlayTarget>>,
    enabled: Cell<bool>,
}

impl BlockScrollStrategy {
    /// An unbound strategy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while scrolling is blocked by this strategy.
    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }
}

impl ScrollStrategy for BlockScrollStrategy {
    fn attach(&self, target: &OverlayTarget) {
        *self.target.borrow_mut() = Some(target.clone());
    }

    fn enable(&self) {
        if self.enabled.get() {
            return;
        }
        if let Some(target) = &*self.target.borrow() {
            let mut doc = target.document.borrow_mut();
            let body = doc.body();
            doc.add_class(body, classes::SCROLL_BLOCK);
            self.enabled.set(true);
        }
    }

    fn disable(&self) {
        if !self.enabled.replace(false) {
            return;
        }
        if let Some(target) = &*self.target.borrow() {
            let mut doc = target.document.borrow_mut();
            let body = doc.body();
            doc.remove_class(body, classes::SCROLL_BLOCK);
        }
    }

    fn detach(&self) {
        self.disable();
        self.target.borrow_mut().take();
    }
}

/// Alignment of the pane along one axis of the viewport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Align {
    /// Offset from the start edge.
    Start(f64),
    /// Centred.
    Center,
    /// Offset from the end edge.
    End(f64),
}

impl Align {
    fn resolve(self, start: f64, available: f64, extent: f64) -> f64 {
        match self {
            Self::Start(offset) => start + offset,
            Self::Center => start + (available - extent) / 2.0,
            Self::End(offset) => start + available - extent - offset,
        }
    }
}

/// Positions the pane relative to a fixed viewport rectangle.
///
/// The pane's measured size comes from [`understory_dom::Document::bounds`];
/// an unmeasured pane is treated as zero-sized. The result is written as
/// `position`, `left`, and `top` styles on the pane.
#[derive(Debug)]
pub struct GlobalPositionStrategy {
    viewport: Cell<Rect>,
    horizontal: Cell<Align>,
    vertical: Cell<Align>,
    target: RefCell<Option<OverlayTarget>>,
    last: Cell<Option<Point>>,
}

impl GlobalPositionStrategy {
    /// Centre the pane in `viewport`.
    pub fn new(viewport: Rect) -> Self {
        Self {
            viewport: Cell::new(viewport),
            horizontal: Cell::new(Align::Center),
            vertical: Cell::new(Align::Center),
            target: RefCell::new(None),
            last: Cell::new(None),
        }
    }

    /// Set horizontal alignment.
    pub fn horizontal(self, align: Align) -> Self {
        self.horizontal.set(align);
        self
    }

    /// Set vertical alignment.
    pub fn vertical(self, align: Align) -> Self {
        self.vertical.set(align);
        self
    }

    /// Replace the viewport, e.g. after a resize. Takes effect on the next apply.
    pub fn set_viewport(&self, viewport: Rect) {
        self.viewport.set(viewport);
    }

    /// Where the pane was last placed.
    pub fn last_position(&self) -> Option<Point> {
        self.last.get()
    }

    /// Top-left corner for a pane of `size`.
    pub fn origin_for(&self, size: Size) -> Point {
        let viewport = self.viewport.get();
        Point::new(
            self.horizontal
                .get()
                .resolve(viewport.x0, viewport.width(), size.width),
            self.vertical
                .get()
                .resolve(viewport.y0, viewport.height(), size.height),
        )
    }
}

impl PositionStrategy for GlobalPositionStrategy {
    fn attach(&self, target: &OverlayTarget) {
        *self.target.borrow_mut() = Some(target.clone());
    }

    fn apply(&self) {
        let target = self.target.borrow();
        let Some(target) = target.as_ref() else {
            return;
        };
        let mut doc = target.document.borrow_mut();
        if !doc.is_alive(target.pane) {
            return;
        }
        let size = doc.bounds(target.pane).map_or(Size::ZERO, |b| b.size());
        let origin = self.origin_for(size);
        doc.set_style(target.pane, "position", "absolute");
        doc.set_style(target.pane, "left", &format!("{}px", origin.x));
        doc.set_style(target.pane, "top", &format!("{}px", origin.y));
        self.last.set(Some(origin));
    }

    fn dispose(&self) {
        if let Some(target) = self.target.borrow_mut().take() {
            let mut doc = target.document.borrow_mut();
            for property in ["position", "left", "top"] {
                doc.remove_style(target.pane, property);
            }
        }
        self.last.set(None);
    }
}
