// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! An outlet bound to a view container, declared in place in a template.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::dom_outlet::{relocate_dom_node, resolve_factory};
use crate::error::PortalError;
use crate::notify::{EventStream, Subject};
use crate::outlet::{AttachedContent, Attachment, BasePortalOutlet, OutletBackend, PortalOutlet};
use crate::portal::{ComponentPortal, DomPortal, Portal, TemplatePortal};
use crate::view::{ComponentFactoryResolver, ViewContainerRef};

/// Renders portals at its own view container.
pub struct ViewContainerBackend {
    container: ViewContainerRef,
    resolver: Option<Rc<dyn ComponentFactoryResolver>>,
    attached_ref: Rc<RefCell<Option<AttachedContent>>>,
    attached: Subject<AttachedContent>,
}

impl fmt::Debug for ViewContainerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewContainerBackend")
            .field("container", &self.container)
            .field("attached_ref", &self.attached_ref.borrow())
            .finish_non_exhaustive()
    }
}

impl ViewContainerBackend {
    fn record(&self, content: &AttachedContent) {
        *self.attached_ref.borrow_mut() = Some(content.clone());
        self.attached.emit(content);
    }

    fn forget_on_teardown(&self, teardown: impl FnOnce() + 'static) -> impl FnOnce() + 'static {
        let attached_ref = Rc::clone(&self.attached_ref);
        move || {
            attached_ref.borrow_mut().take();
            teardown();
        }
    }
}

impl OutletBackend for ViewContainerBackend {
    fn attach_component(&self, portal: &ComponentPortal) -> Result<Attachment, PortalError> {
        let factory = resolve_factory(portal, self.resolver.as_ref())?;
        let container = portal.view_container.as_ref().unwrap_or(&self.container);
        let instance = container.create_component(
            portal.component,
            factory,
            portal.injector.clone(),
            Some(container.len()),
        )?;
        let content = AttachedContent::Component(instance.clone());
        self.record(&content);
        Ok(Attachment::new(
            content,
            self.forget_on_teardown(move || instance.destroy()),
        ))
    }

    fn attach_template(&self, portal: &TemplatePortal) -> Result<Attachment, PortalError> {
        let view = self.container.create_embedded_view(
            &portal.template,
            portal.context(),
            portal.injector.clone(),
            None,
        )?;
        view.detect_changes();
        let content = AttachedContent::Template(view);
        self.record(&content);
        let container = self.container.clone();
        Ok(Attachment::new(
            content,
            self.forget_on_teardown(move || container.clear()),
        ))
    }

    fn attach_dom(&self, portal: &DomPortal) -> Result<Attachment, PortalError> {
        let target = self
            .container
            .element()
            .ok_or(PortalError::MissingParent(self.container.anchor()))?;
        let Attachment { content, teardown } =
            relocate_dom_node(self.container.document(), target, portal.element)?;
        *self.attached_ref.borrow_mut() = Some(content.clone());
        Ok(Attachment::new(content, self.forget_on_teardown(teardown)))
    }

    fn on_dispose(&self) {
        self.attached_ref.borrow_mut().take();
        self.attached.complete();
    }
}

/// A directive-style outlet: content renders where the container's anchor sits.
///
/// Besides the [`PortalOutlet`] protocol it tracks the last attached content
/// and announces each component or template attach on [`Self::attached`].
#[derive(Debug)]
pub struct ViewContainerOutlet {
    outlet: Rc<BasePortalOutlet<ViewContainerBackend>>,
}

impl ViewContainerOutlet {
    /// An outlet rendering at `container`.
    pub fn new(
        container: ViewContainerRef,
        resolver: Option<Rc<dyn ComponentFactoryResolver>>,
    ) -> Self {
        Self {
            outlet: BasePortalOutlet::new(ViewContainerBackend {
                container,
                resolver,
                attached_ref: Rc::new(RefCell::new(None)),
                attached: Subject::new(),
            }),
        }
    }

    /// The underlying outlet, for [`Portal::attach`].
    pub fn outlet(&self) -> &Rc<BasePortalOutlet<ViewContainerBackend>> {
        &self.outlet
    }

    /// The portal currently shown.
    pub fn portal(&self) -> Option<Portal> {
        self.outlet.attached_portal()
    }

    /// Swap the shown portal. `None` just clears the outlet.
    pub fn set_portal(&self, portal: Option<&Portal>) -> Result<Option<AttachedContent>, PortalError> {
        if self.outlet.has_attached() {
            self.outlet.detach();
        }
        portal.map(|p| self.outlet.attach(p)).transpose()
    }

    /// Content produced by the latest attach, until it is torn down.
    pub fn attached_ref(&self) -> Option<AttachedContent> {
        self.outlet.backend().attached_ref.borrow().clone()
    }

    /// Fires after each component or template attach.
    pub fn attached(&self) -> EventStream<AttachedContent> {
        self.outlet.backend().attached.stream()
    }
}

impl PortalOutlet for ViewContainerOutlet {
    fn attach(&self, portal: &Portal) -> Result<AttachedContent, PortalError> {
        self.outlet.attach(portal)
    }

    fn detach(&self) -> Option<Portal> {
        self.outlet.detach()
    }

    fn dispose(&self) {
        self.outlet.dispose();
    }

    fn has_attached(&self) -> bool {
        self.outlet.has_attached()
    }

    fn attached_portal(&self) -> Option<Portal> {
        self.outlet.attached_portal()
    }

    fn is_disposed(&self) -> bool {
        self.outlet.is_disposed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use understory_dom::Document;

    use crate::view::{Context, SharedDocument, TemplateRef};

    fn fixture() -> (SharedDocument, ViewContainerRef) {
        let doc = Rc::new(RefCell::new(Document::new()));
        let body = doc.borrow().body();
        let vc = ViewContainerRef::append_to(&doc, body).unwrap();
        (doc, vc)
    }

    fn greeting() -> TemplateRef {
        TemplateRef::new("greeting", |doc, input| {
            let who = input
                .context
                .and_then(|c| c.downcast_ref::<&str>())
                .copied()
                .unwrap_or("-");
            Ok(vec![doc.create_text(who)])
        })
    }

    #[test]
    fn set_portal_swaps_content_and_announces() {
        let (doc, vc) = fixture();
        let outlet = ViewContainerOutlet::new(vc.clone(), None);
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let _sub = outlet.attached().subscribe(move |_| h.set(h.get() + 1));

        let ctx: Context = Rc::new("one");
        let first: Portal = TemplatePortal::new(greeting(), vc.clone()).with_context(ctx).into();
        let second: Portal = TemplatePortal::new(greeting(), vc.clone()).into();

        outlet.set_portal(Some(&first)).unwrap();
        let view = outlet.attached_ref().unwrap().as_template().unwrap().clone();
        assert_eq!(doc.borrow().text(view.root_nodes()[0]), Some("one"));

        outlet.set_portal(Some(&second)).unwrap();
        assert!(view.is_destroyed());
        assert!(outlet.portal().unwrap().ptr_eq(&second));
        assert_eq!(vc.len(), 1);
        assert_eq!(hits.get(), 2);

        outlet.set_portal(None).unwrap();
        assert!(outlet.attached_ref().is_none());
        assert!(vc.is_empty());
    }

    #[test]
    fn dom_portal_moves_next_to_anchor() {
        let (doc, vc) = fixture();
        let (holder, node) = {
            let mut d = doc.borrow_mut();
            let holder = d.create_element("section");
            let node = d.create_element("p");
            let body = d.body();
            d.append_child(body, holder).unwrap();
            d.append_child(holder, node).unwrap();
            (holder, node)
        };
        let outlet = ViewContainerOutlet::new(vc, None);
        let portal: Portal = DomPortal::new(node).into();
        portal.attach(&outlet).unwrap();
        assert_eq!(doc.borrow().parent_of(node), Some(doc.borrow().body()));
        portal.detach().unwrap();
        assert_eq!(doc.borrow().children_of(holder), &[node]);
    }
}
