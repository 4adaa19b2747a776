// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The outlet capability and the shared dispatch logic behind every outlet.
//!
//! [`BasePortalOutlet`] owns the single-attachment and disposal rules. Concrete
//! rendering is delegated to an [`OutletBackend`], which returns the attached
//! content together with the closure that reverses exactly what it did.
//!
//! ## Lifecycle
//!
//! ```text
//! created -> (attach <-> detach)* -> dispose (terminal)
//! ```
//!
//! - `attach` is rejected while a portal is attached, once disposed, and for a
//!   portal that another outlet holds. A backend failure rolls the outlet back
//!   to empty.
//! - `detach` releases the portal and fires the pending teardown. With nothing
//!   attached and nothing armed it does nothing.
//! - `dispose` detaches, fires any teardown still armed, runs the backend's
//!   dispose hook, and rejects every later attach.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use understory_dom::NodeId;

use crate::error::PortalError;
use crate::notify::Subscription;
use crate::portal::{ComponentPortal, DomPortal, Portal, PortalKind, TemplatePortal};
use crate::view::{ComponentRef, EmbeddedViewRef};

/// What an attach produced.
#[derive(Clone, Debug)]
pub enum AttachedContent {
    /// A component instance.
    Component(ComponentRef),
    /// An embedded template view.
    Template(EmbeddedViewRef),
    /// The relocated node.
    Dom(NodeId),
}

impl AttachedContent {
    /// The component instance, if this is one.
    pub fn as_component(&self) -> Option<&ComponentRef> {
        match self {
            Self::Component(c) => Some(c),
            _ => None,
        }
    }

    /// The embedded view, if this is one.
    pub fn as_template(&self) -> Option<&EmbeddedViewRef> {
        match self {
            Self::Template(v) => Some(v),
            _ => None,
        }
    }

    /// Observe the content destroying itself.
    ///
    /// Relocated nodes have no destruction signal and return `None`.
    pub fn on_destroy(&self, f: impl Fn() + 'static) -> Option<Subscription> {
        match self {
            Self::Component(c) => Some(c.on_destroy(f)),
            Self::Template(v) => Some(v.on_destroy(f)),
            Self::Dom(_) => None,
        }
    }
}

/// A rendering location that holds at most one portal.
pub trait PortalOutlet {
    /// Render `portal` here.
    fn attach(&self, portal: &Portal) -> Result<AttachedContent, PortalError>;

    /// Remove whatever is attached, returning the portal that was held.
    fn detach(&self) -> Option<Portal>;

    /// Detach and permanently reject further attaches.
    fn dispose(&self);

    /// Returns true while a portal is attached.
    fn has_attached(&self) -> bool;

    /// The attached portal.
    fn attached_portal(&self) -> Option<Portal>;

    /// Returns true once disposed.
    fn is_disposed(&self) -> bool;
}

/// A successful concrete attach: the content and its teardown.
pub struct Attachment {
    /// What the attach produced.
    pub content: AttachedContent,
    /// Reverses exactly the mutations the attach performed.
    pub teardown: Box<dyn FnOnce()>,
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("content", &self.content)
            .finish_non_exhaustive()
    }
}

impl Attachment {
    /// Pair `content` with its `teardown`.
    pub fn new(content: AttachedContent, teardown: impl FnOnce() + 'static) -> Self {
        Self {
            content,
            teardown: Box::new(teardown),
        }
    }
}

/// Concrete rendering for one kind of outlet.
pub trait OutletBackend {
    /// Instantiate a component portal.
    fn attach_component(&self, portal: &ComponentPortal) -> Result<Attachment, PortalError>;

    /// Render a template portal.
    fn attach_template(&self, portal: &TemplatePortal) -> Result<Attachment, PortalError>;

    /// Relocate a DOM portal's node.
    fn attach_dom(&self, portal: &DomPortal) -> Result<Attachment, PortalError>;

    /// Called once when the outlet is disposed, after the final teardown.
    fn on_dispose(&self) {}
}

/// A one-shot teardown slot.
#[derive(Default)]
pub enum DisposeFn {
    /// Nothing registered.
    #[default]
    Empty,
    /// Registered and not yet run.
    Armed(Box<dyn FnOnce()>),
    /// Ran; stays here until re-armed.
    Fired,
}

impl fmt::Debug for DisposeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Empty => "Empty",
            Self::Armed(_) => "Armed",
            Self::Fired => "Fired",
        })
    }
}

impl DisposeFn {
    /// Register `f`, replacing anything not yet run.
    pub fn arm(&mut self, f: Box<dyn FnOnce()>) {
        *self = Self::Armed(f);
    }

    /// Move `Armed` to `Fired` and hand out the closure.
    pub fn take(&mut self) -> Option<Box<dyn FnOnce()>> {
        match core::mem::take(self) {
            Self::Armed(f) => {
                *self = Self::Fired;
                Some(f)
            }
            other => {
                *self = other;
                None
            }
        }
    }

    /// Returns true while a closure is waiting to run.
    pub fn is_armed(&self) -> bool {
        matches!(self, Self::Armed(_))
    }
}

#[derive(Debug, Default)]
struct OutletState {
    attached: Option<Portal>,
    dispose_fn: DisposeFn,
    disposed: bool,
}

/// Dispatches portals to an [`OutletBackend`] and enforces the outlet rules.
pub struct BasePortalOutlet<B> {
    this: Weak<dyn PortalOutlet>,
    state: RefCell<OutletState>,
    backend: B,
}

impl<B: fmt::Debug> fmt::Debug for BasePortalOutlet<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("BasePortalOutlet")
            .field("attached", &state.attached.is_some())
            .field("dispose_fn", &state.dispose_fn)
            .field("disposed", &state.disposed)
            .field("backend", &self.backend)
            .finish()
    }
}

impl<B: OutletBackend + 'static> BasePortalOutlet<B> {
    /// Create an outlet rendering through `backend`.
    pub fn new(backend: B) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<Self>| {
            let this: Weak<dyn PortalOutlet> = this.clone();
            Self {
                this,
                state: RefCell::new(OutletState::default()),
                backend,
            }
        })
    }

    /// The rendering backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Register the teardown run by the next detach or dispose.
    pub fn set_dispose_fn(&self, f: impl FnOnce() + 'static) {
        self.state.borrow_mut().dispose_fn.arm(Box::new(f));
    }

    /// Returns true while a teardown is waiting to run.
    pub fn has_dispose_fn(&self) -> bool {
        self.state.borrow().dispose_fn.is_armed()
    }

    fn fire_dispose_fn(&self) {
        let teardown = self.state.borrow_mut().dispose_fn.take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }
}

impl<B: OutletBackend + 'static> PortalOutlet for BasePortalOutlet<B> {
    fn attach(&self, portal: &Portal) -> Result<AttachedContent, PortalError> {
        {
            let state = self.state.borrow();
            if state.attached.is_some() {
                return Err(PortalError::OutletAlreadyAttached);
            }
            if state.disposed {
                return Err(PortalError::OutletDisposed);
            }
        }
        if portal.is_attached() {
            return Err(PortalError::PortalAlreadyAttached);
        }

        // Occupied before rendering so reentrant `has_attached` checks see it.
        self.state.borrow_mut().attached = Some(portal.clone());
        portal.set_attached_host(Some(self.this.clone()));

        let result = match portal.kind() {
            PortalKind::Component(p) => self.backend.attach_component(p),
            PortalKind::Template(p) => self.backend.attach_template(p),
            PortalKind::Dom(p) => self.backend.attach_dom(p),
        };
        match result {
            Ok(Attachment { content, teardown }) => {
                self.state.borrow_mut().dispose_fn.arm(teardown);
                tracing::debug!(content = ?content, "portal attached");
                Ok(content)
            }
            Err(err) => {
                let released = {
                    let mut state = self.state.borrow_mut();
                    if state.attached.as_ref().is_some_and(|p| p.ptr_eq(portal)) {
                        state.attached.take()
                    } else {
                        None
                    }
                };
                if released.is_some() {
                    portal.set_attached_host(None);
                }
                tracing::debug!(error = %err, "portal attach rolled back");
                Err(err)
            }
        }
    }

    fn detach(&self) -> Option<Portal> {
        let portal = self.state.borrow_mut().attached.take();
        if let Some(portal) = &portal {
            portal.set_attached_host(None);
            tracing::debug!("portal detached");
        }
        self.fire_dispose_fn();
        portal
    }

    fn dispose(&self) {
        if self.state.borrow().disposed {
            return;
        }
        if self.has_attached() {
            self.detach();
        }
        self.fire_dispose_fn();
        self.backend.on_dispose();
        self.state.borrow_mut().disposed = true;
        tracing::debug!("outlet disposed");
    }

    fn has_attached(&self) -> bool {
        self.state.borrow().attached.is_some()
    }

    fn attached_portal(&self) -> Option<Portal> {
        self.state.borrow().attached.clone()
    }

    fn is_disposed(&self) -> bool {
        self.state.borrow().disposed
    }
}
