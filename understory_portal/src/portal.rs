// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Relocatable content handles.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use understory_dom::NodeId;

use crate::error::PortalError;
use crate::injector::Injector;
use crate::outlet::{AttachedContent, PortalOutlet};
use crate::view::{ComponentFactoryResolver, ComponentType, Context, TemplateRef, ViewContainerRef};

/// Content that instantiates a component type.
#[derive(Clone)]
pub struct ComponentPortal {
    /// The component to instantiate.
    pub component: ComponentType,
    /// Logical placement in an existing tree. Without one, outlets place the
    /// component manually and register it with their application root.
    pub view_container: Option<ViewContainerRef>,
    /// Providers for the component.
    pub injector: Option<Injector>,
    /// Resolver that overrides the outlet's default.
    pub resolver: Option<Rc<dyn ComponentFactoryResolver>>,
}

impl fmt::Debug for ComponentPortal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentPortal")
            .field("component", &self.component)
            .field("view_container", &self.view_container)
            .field("has_resolver", &self.resolver.is_some())
            .finish_non_exhaustive()
    }
}

impl ComponentPortal {
    /// A portal for `component` with no placement hints.
    pub fn new(component: ComponentType) -> Self {
        Self {
            component,
            view_container: None,
            injector: None,
            resolver: None,
        }
    }

    /// Instantiate inside `container`.
    pub fn with_view_container(mut self, container: ViewContainerRef) -> Self {
        self.view_container = Some(container);
        self
    }

    /// Create the component with `injector`.
    pub fn with_injector(mut self, injector: Injector) -> Self {
        self.injector = Some(injector);
        self
    }

    /// Resolve the factory through `resolver` instead of the outlet's.
    pub fn with_resolver(mut self, resolver: Rc<dyn ComponentFactoryResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }
}

/// Content that renders a template with an optional context.
pub struct TemplatePortal {
    /// The template to render.
    pub template: TemplateRef,
    /// Where the view is created.
    pub view_container: ViewContainerRef,
    /// Providers for the view.
    pub injector: Option<Injector>,
    context: RefCell<Option<Context>>,
}

impl fmt::Debug for TemplatePortal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplatePortal")
            .field("template", &self.template)
            .field("view_container", &self.view_container)
            .field("has_context", &self.context.borrow().is_some())
            .finish_non_exhaustive()
    }
}

impl TemplatePortal {
    /// A portal rendering `template` at `view_container`.
    pub fn new(template: TemplateRef, view_container: ViewContainerRef) -> Self {
        Self {
            template,
            view_container,
            injector: None,
            context: RefCell::new(None),
        }
    }

    /// Set the initial context.
    pub fn with_context(self, context: Context) -> Self {
        *self.context.borrow_mut() = Some(context);
        self
    }

    /// Create the view with `injector`.
    pub fn with_injector(mut self, injector: Injector) -> Self {
        self.injector = Some(injector);
        self
    }

    /// The context the next attach renders with.
    pub fn context(&self) -> Option<Context> {
        self.context.borrow().clone()
    }

    /// Replace the stored context.
    pub fn set_context(&self, context: Option<Context>) {
        *self.context.borrow_mut() = context;
    }
}

/// Content that relocates an existing node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DomPortal {
    /// The node to move. It must have a parent when attached.
    pub element: NodeId,
}

impl DomPortal {
    /// A portal relocating `element`.
    pub const fn new(element: NodeId) -> Self {
        Self { element }
    }
}

/// The closed set of portal variants.
#[derive(Debug)]
pub enum PortalKind {
    /// See [`ComponentPortal`].
    Component(ComponentPortal),
    /// See [`TemplatePortal`].
    Template(TemplatePortal),
    /// See [`DomPortal`].
    Dom(DomPortal),
}

struct PortalInner {
    kind: PortalKind,
    host: RefCell<Option<Weak<dyn PortalOutlet>>>,
}

/// A shared handle to content that can be rendered in one outlet at a time.
///
/// Clones refer to the same portal. The outlet holding the portal is tracked
/// through a weak back-reference that outlets maintain while attached.
#[derive(Clone)]
pub struct Portal {
    inner: Rc<PortalInner>,
}

impl fmt::Debug for Portal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Portal")
            .field("kind", &self.inner.kind)
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl Portal {
    /// Wrap a portal variant.
    pub fn new(kind: PortalKind) -> Self {
        Self {
            inner: Rc::new(PortalInner {
                kind,
                host: RefCell::new(None),
            }),
        }
    }

    /// The portal's variant.
    pub fn kind(&self) -> &PortalKind {
        &self.inner.kind
    }

    /// The template variant, if this is one.
    pub fn as_template(&self) -> Option<&TemplatePortal> {
        match &self.inner.kind {
            PortalKind::Template(t) => Some(t),
            _ => None,
        }
    }

    /// Attach to `outlet`.
    ///
    /// Fails if this portal is already attached somewhere or if `outlet`
    /// already holds a portal.
    pub fn attach(&self, outlet: &dyn PortalOutlet) -> Result<AttachedContent, PortalError> {
        if self.is_attached() {
            return Err(PortalError::PortalAlreadyAttached);
        }
        if outlet.has_attached() {
            return Err(PortalError::OutletAlreadyAttached);
        }
        outlet.attach(self)
    }

    /// Attach to `outlet`, first replacing a template portal's stored context
    /// when `context` is given. Other variants ignore `context`.
    pub fn attach_with_context(
        &self,
        outlet: &dyn PortalOutlet,
        context: Option<Context>,
    ) -> Result<AttachedContent, PortalError> {
        if let (Some(template), Some(context)) = (self.as_template(), context) {
            template.set_context(Some(context));
        }
        self.attach(outlet)
    }

    /// Detach from the current host, which detaches whatever it holds.
    ///
    /// A template portal forgets its context, so a later attach without an
    /// explicit context renders with none.
    pub fn detach(&self) -> Result<Option<Portal>, PortalError> {
        let host = self.attached_host().ok_or(PortalError::NotAttached)?;
        if let Some(template) = self.as_template() {
            template.set_context(None);
        }
        self.set_attached_host(None);
        Ok(host.detach())
    }

    /// Returns true if a live outlet currently holds this portal.
    pub fn is_attached(&self) -> bool {
        self.attached_host()
            .and_then(|host| host.attached_portal())
            .is_some_and(|p| p.ptr_eq(self))
    }

    /// The outlet currently recorded as this portal's host.
    pub fn attached_host(&self) -> Option<Rc<dyn PortalOutlet>> {
        self.inner.host.borrow().as_ref().and_then(Weak::upgrade)
    }

    /// Overwrite the host back-reference without any protocol checks.
    ///
    /// Outlets call this from their own attach and detach bookkeeping.
    pub fn set_attached_host(&self, host: Option<Weak<dyn PortalOutlet>>) {
        *self.inner.host.borrow_mut() = host;
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl From<PortalKind> for Portal {
    fn from(kind: PortalKind) -> Self {
        Self::new(kind)
    }
}

impl From<ComponentPortal> for Portal {
    fn from(portal: ComponentPortal) -> Self {
        Self::new(PortalKind::Component(portal))
    }
}

impl From<TemplatePortal> for Portal {
    fn from(portal: TemplatePortal) -> Self {
        Self::new(PortalKind::Template(portal))
    }
}

impl From<DomPortal> for Portal {
    fn from(portal: DomPortal) -> Self {
        Self::new(PortalKind::Dom(portal))
    }
}
