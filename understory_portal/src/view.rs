// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The rendering model portals carry and outlets instantiate.
//!
//! - [`TemplateRef`] renders root nodes from an optional context; instances are
//!   [`EmbeddedViewRef`]s.
//! - [`ComponentType`] names a component; a [`ComponentFactoryResolver`] maps it
//!   to a [`ComponentFactory`]; instances are [`ComponentRef`]s.
//! - [`ViewContainerRef`] is a logical insertion point in an existing tree:
//!   views are placed before its anchor comment, in index order.
//! - [`ApplicationRoot`] is the change-detection root for views that were
//!   created outside any container.
//!
//! Views own their root nodes. Destroying a view frees its nodes wherever they
//! currently live, removes it from its container, and notifies
//! [`ViewRef::on_destroy`] observers exactly once.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use hashbrown::HashMap;
use understory_dom::{Document, DomError, NodeId};

use crate::injector::Injector;
use crate::notify::{Subject, Subscription};

/// A document shared between outlets, views and overlays.
pub type SharedDocument = Rc<RefCell<Document>>;

/// Data visible inside a rendered template.
pub type Context = Rc<dyn Any>;

/// What a template sees when it renders.
#[derive(Clone, Copy)]
pub struct TemplateInput<'a> {
    /// The context the view was created with, if any.
    pub context: Option<&'a dyn Any>,
    /// Providers available to the view.
    pub injector: &'a Injector,
}

impl fmt::Debug for TemplateInput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateInput")
            .field("has_context", &self.context.is_some())
            .field("injector", self.injector)
            .finish()
    }
}

type RenderFn = dyn Fn(&mut Document, &TemplateInput<'_>) -> Result<Vec<NodeId>, DomError>;
type CheckFn = dyn Fn(&Document, &[NodeId], &TemplateInput<'_>);

/// A renderable template handle.
#[derive(Clone)]
pub struct TemplateRef {
    name: Rc<str>,
    render: Rc<RenderFn>,
    check: Option<Rc<CheckFn>>,
}

impl fmt::Debug for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateRef")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl TemplateRef {
    /// Create a template from a render function returning the view's root nodes.
    ///
    /// Root nodes should be created detached; the container places them.
    pub fn new(
        name: &str,
        render: impl Fn(&mut Document, &TemplateInput<'_>) -> Result<Vec<NodeId>, DomError> + 'static,
    ) -> Self {
        Self {
            name: Rc::from(name),
            render: Rc::new(render),
            check: None,
        }
    }

    /// Attach a change-detection hook, run by [`EmbeddedViewRef::detect_changes`].
    pub fn with_check(
        mut self,
        check: impl Fn(&Document, &[NodeId], &TemplateInput<'_>) + 'static,
    ) -> Self {
        self.check = Some(Rc::new(check));
        self
    }

    /// Template name, for diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }
}

struct EmbeddedView {
    document: SharedDocument,
    template: TemplateRef,
    root_nodes: Vec<NodeId>,
    context: Option<Context>,
    injector: Injector,
    container: RefCell<Option<Weak<ContainerInner>>>,
    destroyed: Cell<bool>,
    checks: Cell<u32>,
    destroyed_events: Subject<()>,
}

/// An instantiated template.
#[derive(Clone)]
pub struct EmbeddedViewRef {
    inner: Rc<EmbeddedView>,
}

impl fmt::Debug for EmbeddedViewRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedViewRef")
            .field("template", &self.inner.template.name())
            .field("root_nodes", &self.inner.root_nodes)
            .field("destroyed", &self.inner.destroyed.get())
            .finish_non_exhaustive()
    }
}

impl EmbeddedViewRef {
    fn render(
        document: &SharedDocument,
        template: &TemplateRef,
        context: Option<Context>,
        injector: Injector,
    ) -> Result<Self, DomError> {
        let root_nodes = {
            let input = TemplateInput {
                context: context.as_deref(),
                injector: &injector,
            };
            (template.render)(&mut document.borrow_mut(), &input)?
        };
        Ok(Self {
            inner: Rc::new(EmbeddedView {
                document: Rc::clone(document),
                template: template.clone(),
                root_nodes,
                context,
                injector,
                container: RefCell::new(None),
                destroyed: Cell::new(false),
                checks: Cell::new(0),
                destroyed_events: Subject::new(),
            }),
        })
    }

    /// The view's top-level nodes, in order.
    pub fn root_nodes(&self) -> &[NodeId] {
        &self.inner.root_nodes
    }

    /// The context the view was rendered with.
    pub fn context(&self) -> Option<Context> {
        self.inner.context.clone()
    }

    /// Run the template's change-detection hook against the current tree.
    pub fn detect_changes(&self) {
        if self.inner.destroyed.get() {
            return;
        }
        self.inner.checks.set(self.inner.checks.get() + 1);
        if let Some(check) = &self.inner.template.check {
            let input = TemplateInput {
                context: self.inner.context.as_deref(),
                injector: &self.inner.injector,
            };
            check(&self.inner.document.borrow(), &self.inner.root_nodes, &input);
        }
    }

    /// How many times change detection has run on this view.
    pub fn check_count(&self) -> u32 {
        self.inner.checks.get()
    }

    /// Free the view's nodes and leave its container. Idempotent.
    pub fn destroy(&self) {
        if self.inner.destroyed.replace(true) {
            return;
        }
        let container = self.inner.container.borrow_mut().take();
        if let Some(container) = container.and_then(|w| w.upgrade()) {
            container.forget(&ViewRef::Embedded(self.clone()));
        }
        {
            let mut doc = self.inner.document.borrow_mut();
            for &node in &self.inner.root_nodes {
                doc.destroy(node);
            }
        }
        self.inner.destroyed_events.emit(&());
        self.inner.destroyed_events.complete();
    }

    /// Returns true once the view has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// Observe the view's destruction.
    pub fn on_destroy(&self, f: impl Fn() + 'static) -> Subscription {
        self.inner.destroyed_events.stream().subscribe(move |()| f())
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Name of a component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComponentType(&'static str);

impl ComponentType {
    /// Declare a component type.
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The component's name.
    pub const fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Creates instances of one component type.
pub trait ComponentFactory {
    /// Build the component's host node (detached) and its content.
    fn create(&self, document: &mut Document, injector: &Injector) -> Result<NodeId, DomError>;

    /// Change-detection hook.
    fn check(&self, _document: &Document, _host: NodeId) {}
}

impl<F> ComponentFactory for F
where
    F: Fn(&mut Document, &Injector) -> Result<NodeId, DomError>,
{
    fn create(&self, document: &mut Document, injector: &Injector) -> Result<NodeId, DomError> {
        self(document, injector)
    }
}

/// Maps component types to factories.
pub trait ComponentFactoryResolver {
    /// Factory for `component`, if one is known.
    fn resolve(&self, component: ComponentType) -> Option<Rc<dyn ComponentFactory>>;
}

/// A map-backed [`ComponentFactoryResolver`].
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    factories: HashMap<ComponentType, Rc<dyn ComponentFactory>>,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

impl ComponentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` for `component`, replacing any earlier entry.
    pub fn with(mut self, component: ComponentType, factory: impl ComponentFactory + 'static) -> Self {
        self.factories.insert(component, Rc::new(factory));
        self
    }
}

impl ComponentFactoryResolver for ComponentRegistry {
    fn resolve(&self, component: ComponentType) -> Option<Rc<dyn ComponentFactory>> {
        self.factories.get(&component).cloned()
    }
}

struct ComponentView {
    document: SharedDocument,
    component: ComponentType,
    factory: Rc<dyn ComponentFactory>,
    host: NodeId,
    injector: Injector,
    container: RefCell<Option<Weak<ContainerInner>>>,
    destroyed: Cell<bool>,
    checks: Cell<u32>,
    destroyed_events: Subject<()>,
}

/// An instantiated component.
#[derive(Clone)]
pub struct ComponentRef {
    inner: Rc<ComponentView>,
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRef")
            .field("component", &self.inner.component)
            .field("host", &self.inner.host)
            .field("destroyed", &self.inner.destroyed.get())
            .finish_non_exhaustive()
    }
}

impl ComponentRef {
    /// Instantiate `component` through `factory`, outside any container.
    pub fn create(
        document: &SharedDocument,
        component: ComponentType,
        factory: Rc<dyn ComponentFactory>,
        injector: Injector,
    ) -> Result<Self, DomError> {
        let host = factory.create(&mut document.borrow_mut(), &injector)?;
        Ok(Self {
            inner: Rc::new(ComponentView {
                document: Rc::clone(document),
                component,
                factory,
                host,
                injector,
                container: RefCell::new(None),
                destroyed: Cell::new(false),
                checks: Cell::new(0),
                destroyed_events: Subject::new(),
            }),
        })
    }

    /// The component's host node.
    pub fn host(&self) -> NodeId {
        self.inner.host
    }

    /// The component's type.
    pub fn component(&self) -> ComponentType {
        self.inner.component
    }

    /// Providers the component was created with.
    pub fn injector(&self) -> &Injector {
        &self.inner.injector
    }

    /// Run the factory's change-detection hook.
    pub fn detect_changes(&self) {
        if self.inner.destroyed.get() {
            return;
        }
        self.inner.checks.set(self.inner.checks.get() + 1);
        self.inner
            .factory
            .check(&self.inner.document.borrow(), self.inner.host);
    }

    /// How many times change detection has run on this component.
    pub fn check_count(&self) -> u32 {
        self.inner.checks.get()
    }

    /// Free the host subtree and leave the container. Idempotent.
    pub fn destroy(&self) {
        if self.inner.destroyed.replace(true) {
            return;
        }
        let container = self.inner.container.borrow_mut().take();
        if let Some(container) = container.and_then(|w| w.upgrade()) {
            container.forget(&ViewRef::Component(self.clone()));
        }
        self.inner.document.borrow_mut().destroy(self.inner.host);
        self.inner.destroyed_events.emit(&());
        self.inner.destroyed_events.complete();
    }

    /// Returns true once the component has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// Observe the component's destruction.
    pub fn on_destroy(&self, f: impl Fn() + 'static) -> Subscription {
        self.inner.destroyed_events.stream().subscribe(move |()| f())
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Either kind of view.
#[derive(Clone, Debug)]
pub enum ViewRef {
    /// A template instance.
    Embedded(EmbeddedViewRef),
    /// A component instance.
    Component(ComponentRef),
}

impl ViewRef {
    /// Top-level nodes of the view.
    pub fn root_nodes(&self) -> Vec<NodeId> {
        match self {
            Self::Embedded(v) => v.root_nodes().to_vec(),
            Self::Component(c) => vec![c.host()],
        }
    }

    /// Run change detection.
    pub fn detect_changes(&self) {
        match self {
            Self::Embedded(v) => v.detect_changes(),
            Self::Component(c) => c.detect_changes(),
        }
    }

    /// Destroy the view.
    pub fn destroy(&self) {
        match self {
            Self::Embedded(v) => v.destroy(),
            Self::Component(c) => c.destroy(),
        }
    }

    /// Returns true once destroyed.
    pub fn is_destroyed(&self) -> bool {
        match self {
            Self::Embedded(v) => v.is_destroyed(),
            Self::Component(c) => c.is_destroyed(),
        }
    }

    /// Observe destruction.
    pub fn on_destroy(&self, f: impl Fn() + 'static) -> Subscription {
        match self {
            Self::Embedded(v) => v.on_destroy(f),
            Self::Component(c) => c.on_destroy(f),
        }
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Embedded(a), Self::Embedded(b)) => a.ptr_eq(b),
            (Self::Component(a), Self::Component(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    fn set_container(&self, container: Weak<ContainerInner>) {
        let slot = match self {
            Self::Embedded(v) => &v.inner.container,
            Self::Component(c) => &c.inner.container,
        };
        *slot.borrow_mut() = Some(container);
    }
}

struct ContainerInner {
    document: SharedDocument,
    anchor: NodeId,
    views: RefCell<Vec<ViewRef>>,
}

impl ContainerInner {
    fn forget(&self, view: &ViewRef) {
        self.views.borrow_mut().retain(|v| !v.ptr_eq(view));
    }
}

/// A logical insertion point in an existing tree.
///
/// Views are inserted into the anchor's parent, before the anchor, in index
/// order. A container whose anchor is detached still tracks views but places
/// no nodes.
#[derive(Clone)]
pub struct ViewContainerRef {
    inner: Rc<ContainerInner>,
}

impl fmt::Debug for ViewContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewContainerRef")
            .field("anchor", &self.inner.anchor)
            .field("len", &self.len())
            .finish()
    }
}

impl ViewContainerRef {
    /// Wrap an existing anchor node.
    pub fn new(document: &SharedDocument, anchor: NodeId) -> Self {
        Self {
            inner: Rc::new(ContainerInner {
                document: Rc::clone(document),
                anchor,
                views: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Create an anchor comment as the last child of `parent` and wrap it.
    pub fn append_to(document: &SharedDocument, parent: NodeId) -> Result<Self, DomError> {
        let anchor = {
            let mut doc = document.borrow_mut();
            let anchor = doc.create_comment("container");
            doc.append_child(parent, anchor)?;
            anchor
        };
        Ok(Self::new(document, anchor))
    }

    /// The anchor node.
    pub fn anchor(&self) -> NodeId {
        self.inner.anchor
    }

    /// The document this container renders into.
    pub fn document(&self) -> &SharedDocument {
        &self.inner.document
    }

    /// The node views are inserted into (the anchor's parent).
    pub fn element(&self) -> Option<NodeId> {
        self.inner.document.borrow().parent_of(self.inner.anchor)
    }

    /// Number of views.
    pub fn len(&self) -> usize {
        self.inner.views.borrow().len()
    }

    /// Returns true if the container holds no views.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// View at `index`.
    pub fn get(&self, index: usize) -> Option<ViewRef> {
        self.inner.views.borrow().get(index).cloned()
    }

    /// Position of `view`, if it belongs to this container.
    pub fn index_of(&self, view: &ViewRef) -> Option<usize> {
        self.inner.views.borrow().iter().position(|v| v.ptr_eq(view))
    }

    /// Render `template` and insert the view at `index` (or last).
    pub fn create_embedded_view(
        &self,
        template: &TemplateRef,
        context: Option<Context>,
        injector: Option<Injector>,
        index: Option<usize>,
    ) -> Result<EmbeddedViewRef, DomError> {
        let view = EmbeddedViewRef::render(
            &self.inner.document,
            template,
            context,
            injector.unwrap_or_default(),
        )?;
        self.insert(ViewRef::Embedded(view.clone()), index)?;
        Ok(view)
    }

    /// Instantiate a component and insert it at `index` (or last).
    pub fn create_component(
        &self,
        component: ComponentType,
        factory: Rc<dyn ComponentFactory>,
        injector: Option<Injector>,
        index: Option<usize>,
    ) -> Result<ComponentRef, DomError> {
        let component = ComponentRef::create(
            &self.inner.document,
            component,
            factory,
            injector.unwrap_or_default(),
        )?;
        self.insert(ViewRef::Component(component.clone()), index)?;
        Ok(component)
    }

    /// Destroy the view at `index`. Returns false if there is none.
    pub fn remove(&self, index: usize) -> bool {
        let view = {
            let mut views = self.inner.views.borrow_mut();
            if index >= views.len() {
                return false;
            }
            views.remove(index)
        };
        view.destroy();
        true
    }

    /// Destroy every view, last first.
    pub fn clear(&self) {
        let views = core::mem::take(&mut *self.inner.views.borrow_mut());
        for view in views.into_iter().rev() {
            view.destroy();
        }
    }

    fn insert(&self, view: ViewRef, index: Option<usize>) -> Result<(), DomError> {
        let at = {
            let views = self.inner.views.borrow();
            index.unwrap_or(views.len()).min(views.len())
        };
        {
            let mut doc = self.inner.document.borrow_mut();
            if let Some(parent) = doc.parent_of(self.inner.anchor) {
                let reference = self.inner.views.borrow()[at..]
                    .iter()
                    .flat_map(ViewRef::root_nodes)
                    .find(|&n| doc.parent_of(n) == Some(parent))
                    .unwrap_or(self.inner.anchor);
                for node in view.root_nodes() {
                    doc.insert_before(parent, node, Some(reference))?;
                }
            }
        }
        view.set_container(Rc::downgrade(&self.inner));
        self.inner.views.borrow_mut().insert(at, view);
        Ok(())
    }
}

/// Change-detection root for views created outside any container.
#[derive(Clone, Default)]
pub struct ApplicationRoot {
    views: Rc<RefCell<Vec<ViewRef>>>,
}

impl fmt::Debug for ApplicationRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationRoot")
            .field("views", &self.view_count())
            .finish()
    }
}

impl ApplicationRoot {
    /// An empty root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Include `view` in every [`ApplicationRoot::tick`].
    pub fn attach_view(&self, view: ViewRef) {
        let mut views = self.views.borrow_mut();
        if !views.iter().any(|v| v.ptr_eq(&view)) {
            views.push(view);
        }
    }

    /// Stop checking `view`. Returns false if it was not attached.
    pub fn detach_view(&self, view: &ViewRef) -> bool {
        let mut views = self.views.borrow_mut();
        let before = views.len();
        views.retain(|v| !v.ptr_eq(view));
        views.len() != before
    }

    /// Run change detection over every attached view.
    pub fn tick(&self) {
        let views = self.views.borrow().clone();
        for view in views {
            view.detect_changes();
        }
    }

    /// Number of attached views.
    pub fn view_count(&self) -> usize {
        self.views.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> SharedDocument {
        Rc::new(RefCell::new(Document::new()))
    }

    fn label(text: &'static str) -> TemplateRef {
        TemplateRef::new(text, move |doc, _| Ok(vec![doc.create_text(text)]))
    }

    #[test]
    fn views_are_placed_before_anchor_in_index_order() {
        let doc = doc();
        let body = doc.borrow().body();
        let vc = ViewContainerRef::append_to(&doc, body).unwrap();
        let b = vc.create_embedded_view(&label("b"), None, None, None).unwrap();
        let a = vc.create_embedded_view(&label("a"), None, None, Some(0)).unwrap();
        let expected = vec![a.root_nodes()[0], b.root_nodes()[0], vc.anchor()];
        assert_eq!(doc.borrow().children_of(body), expected.as_slice());
        assert_eq!(vc.len(), 2);
        assert_eq!(vc.index_of(&ViewRef::Embedded(b)), Some(1));
    }

    #[test]
    fn destroy_leaves_container_and_frees_nodes() {
        let doc = doc();
        let body = doc.borrow().body();
        let vc = ViewContainerRef::append_to(&doc, body).unwrap();
        let view = vc.create_embedded_view(&label("x"), None, None, None).unwrap();
        let node = view.root_nodes()[0];
        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        let _sub = view.on_destroy(move || f.set(f.get() + 1));

        view.destroy();
        view.destroy();
        assert!(vc.is_empty());
        assert!(!doc.borrow().is_alive(node));
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn context_reaches_the_template() {
        let doc = doc();
        let body = doc.borrow().body();
        let vc = ViewContainerRef::append_to(&doc, body).unwrap();
        let greet = TemplateRef::new("greet", |doc, input| {
            let name = input
                .context
                .and_then(|c| c.downcast_ref::<String>())
                .map(String::as_str)
                .unwrap_or("nobody");
            Ok(vec![doc.create_text(&format!("hello {name}"))])
        });
        let ctx: Context = Rc::new(String::from("ada"));
        let view = vc
            .create_embedded_view(&greet, Some(ctx), None, None)
            .unwrap();
        assert_eq!(doc.borrow().text(view.root_nodes()[0]), Some("hello ada"));
    }

    #[test]
    fn application_root_ticks_attached_views() {
        let doc = doc();
        let factory: Rc<dyn ComponentFactory> =
            Rc::new(|doc: &mut Document, _: &Injector| Ok(doc.create_element("x-card")));
        let card = ComponentRef::create(
            &doc,
            ComponentType::new("Card"),
            factory,
            Injector::empty(),
        )
        .unwrap();
        let root = ApplicationRoot::new();
        root.attach_view(ViewRef::Component(card.clone()));
        root.attach_view(ViewRef::Component(card.clone()));
        assert_eq!(root.view_count(), 1);
        root.tick();
        assert_eq!(card.check_count(), 1);
        assert!(root.detach_view(&ViewRef::Component(card.clone())));
        root.tick();
        assert_eq!(card.check_count(), 1);
    }

    #[test]
    fn clear_destroys_everything() {
        let doc = doc();
        let body = doc.borrow().body();
        let vc = ViewContainerRef::append_to(&doc, body).unwrap();
        let one = vc.create_embedded_view(&label("1"), None, None, None).unwrap();
        let two = vc.create_embedded_view(&label("2"), None, None, None).unwrap();
        vc.clear();
        assert!(one.is_destroyed() && two.is_destroyed());
        assert_eq!(doc.borrow().children_of(body), &[vc.anchor()]);
    }
}
