// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! An outlet that renders into an arbitrary element.

use std::fmt;
use std::rc::Rc;

use understory_dom::NodeId;

use crate::error::PortalError;
use crate::injector::Injector;
use crate::outlet::{AttachedContent, Attachment, BasePortalOutlet, OutletBackend};
use crate::portal::{ComponentPortal, DomPortal, TemplatePortal};
use crate::view::{
    ApplicationRoot, ComponentFactory, ComponentFactoryResolver, ComponentRef, ComponentType,
    SharedDocument, ViewRef,
};

/// A [`BasePortalOutlet`] rendering into an element through [`DomOutletBackend`].
pub type DomPortalOutlet = BasePortalOutlet<DomOutletBackend>;

/// Renders portals as children of a target element.
///
/// - Components go to the portal's view container when it has one, otherwise
///   they are created directly and registered with the application root.
///   Either way the host node ends up as the last child of the outlet element.
/// - Templates are rendered at the portal's view container, then their root
///   nodes are moved into the outlet element before change detection runs.
/// - DOM nodes leave a placeholder comment at their original position, which
///   teardown swaps back for the node.
pub struct DomOutletBackend {
    document: SharedDocument,
    outlet_element: NodeId,
    resolver: Option<Rc<dyn ComponentFactoryResolver>>,
    app_root: Option<ApplicationRoot>,
    injector: Injector,
}

impl fmt::Debug for DomOutletBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomOutletBackend")
            .field("outlet_element", &self.outlet_element)
            .field("has_resolver", &self.resolver.is_some())
            .field("app_root", &self.app_root)
            .finish_non_exhaustive()
    }
}

impl DomOutletBackend {
    /// Render into `outlet_element` of `document`.
    pub fn new(document: SharedDocument, outlet_element: NodeId) -> Self {
        Self {
            document,
            outlet_element,
            resolver: None,
            app_root: None,
            injector: Injector::empty(),
        }
    }

    /// Default resolver for component portals that bring none.
    pub fn with_resolver(mut self, resolver: Rc<dyn ComponentFactoryResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Change-detection root for manually placed components.
    pub fn with_application_root(mut self, app_root: ApplicationRoot) -> Self {
        self.app_root = Some(app_root);
        self
    }

    /// Fallback injector for manually placed components.
    pub fn with_injector(mut self, injector: Injector) -> Self {
        self.injector = injector;
        self
    }

    /// The element portals render into.
    pub fn outlet_element(&self) -> NodeId {
        self.outlet_element
    }

    /// The document this outlet writes to.
    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    /// Build the outlet.
    pub fn into_outlet(self) -> Rc<DomPortalOutlet> {
        BasePortalOutlet::new(self)
    }
}

pub(crate) fn resolve_factory(
    portal: &ComponentPortal,
    fallback: Option<&Rc<dyn ComponentFactoryResolver>>,
) -> Result<Rc<dyn ComponentFactory>, PortalError> {
    let component = portal.component;
    let resolver = portal
        .resolver
        .as_ref()
        .or(fallback)
        .ok_or(PortalError::MissingResolver(component))?;
    resolver
        .resolve(component)
        .ok_or(PortalError::MissingComponentFactory(component))
}

/// Move `element` under `target`, leaving a placeholder where it was.
pub(crate) fn relocate_dom_node(
    document: &SharedDocument,
    target: NodeId,
    element: NodeId,
) -> Result<Attachment, PortalError> {
    let anchor = {
        let mut doc = document.borrow_mut();
        if !doc.is_alive(element) {
            return Err(understory_dom::DomError::StaleNode(element).into());
        }
        let parent = doc.parent_of(element).ok_or(PortalError::MissingParent(element))?;
        let anchor = doc.create_comment("dom-portal");
        doc.insert_before(parent, anchor, Some(element))?;
        if let Err(err) = doc.append_child(target, element) {
            doc.destroy(anchor);
            return Err(err.into());
        }
        anchor
    };
    let document = Rc::clone(document);
    Ok(Attachment::new(AttachedContent::Dom(element), move || {
        let mut doc = document.borrow_mut();
        if doc.parent_of(anchor).is_some() {
            if let Err(err) = doc.replace_with(anchor, element) {
                tracing::debug!(error = %err, "could not restore DOM portal node");
            }
        }
        doc.destroy(anchor);
    }))
}

impl DomOutletBackend {
    fn place(&self, component: &ComponentRef) -> Result<(), PortalError> {
        self.document
            .borrow_mut()
            .append_child(self.outlet_element, component.host())?;
        Ok(())
    }

    fn manual_component(
        &self,
        component: ComponentType,
        factory: Rc<dyn ComponentFactory>,
        injector: Injector,
    ) -> Result<Attachment, PortalError> {
        let app_root = self
            .app_root
            .clone()
            .ok_or(PortalError::MissingApplicationRoot(component))?;
        let instance = ComponentRef::create(&self.document, component, factory, injector)?;
        let view = ViewRef::Component(instance.clone());
        app_root.attach_view(view.clone());
        if let Err(err) = self.place(&instance) {
            app_root.detach_view(&view);
            instance.destroy();
            return Err(err);
        }
        Ok(Attachment::new(
            AttachedContent::Component(instance.clone()),
            move || {
                app_root.detach_view(&view);
                instance.destroy();
            },
        ))
    }
}

impl OutletBackend for DomOutletBackend {
    fn attach_component(&self, portal: &ComponentPortal) -> Result<Attachment, PortalError> {
        let factory = resolve_factory(portal, self.resolver.as_ref())?;
        let injector = portal
            .injector
            .clone()
            .unwrap_or_else(|| self.injector.clone());
        let Some(container) = &portal.view_container else {
            return self.manual_component(portal.component, factory, injector);
        };
        let instance =
            container.create_component(portal.component, factory, Some(injector), Some(container.len()))?;
        if let Err(err) = self.place(&instance) {
            instance.destroy();
            return Err(err);
        }
        Ok(Attachment::new(
            AttachedContent::Component(instance.clone()),
            move || instance.destroy(),
        ))
    }

    fn attach_template(&self, portal: &TemplatePortal) -> Result<Attachment, PortalError> {
        let container = portal.view_container.clone();
        let view = container.create_embedded_view(
            &portal.template,
            portal.context(),
            portal.injector.clone(),
            Some(container.len()),
        )?;
        let moved = {
            let mut doc = self.document.borrow_mut();
            view.root_nodes()
                .iter()
                .try_for_each(|&node| doc.append_child(self.outlet_element, node))
        };
        if let Err(err) = moved {
            view.destroy();
            return Err(err.into());
        }
        // Hooks observe the nodes at their final location.
        view.detect_changes();
        let handle = view.clone();
        Ok(Attachment::new(AttachedContent::Template(view), move || {
            if let Some(index) = container.index_of(&ViewRef::Embedded(handle.clone())) {
                container.remove(index);
            }
        }))
    }

    fn attach_dom(&self, portal: &DomPortal) -> Result<Attachment, PortalError> {
        relocate_dom_node(&self.document, self.outlet_element, portal.element)
    }

    fn on_dispose(&self) {
        self.document.borrow_mut().detach(self.outlet_element);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use understory_dom::{Document, DomError};

    use crate::outlet::PortalOutlet;
    use crate::portal::Portal;
    use crate::view::{ComponentRegistry, ViewContainerRef};

    fn setup() -> (SharedDocument, NodeId) {
        let doc = Rc::new(RefCell::new(Document::new()));
        let target = {
            let mut d = doc.borrow_mut();
            let target = d.create_element("div");
            let body = d.body();
            d.append_child(body, target).unwrap();
            target
        };
        (doc, target)
    }

    const CARD: ComponentType = ComponentType::new("Card");

    fn registry() -> Rc<dyn ComponentFactoryResolver> {
        Rc::new(ComponentRegistry::new().with(
            CARD,
            |doc: &mut Document, _: &Injector| -> Result<NodeId, DomError> {
                Ok(doc.create_element("x-card"))
            },
        ))
    }

    #[test]
    fn manual_component_is_registered_with_app_root() {
        let (doc, target) = setup();
        let root = ApplicationRoot::new();
        let outlet = DomOutletBackend::new(doc.clone(), target)
            .with_resolver(registry())
            .with_application_root(root.clone())
            .into_outlet();
        let portal: Portal = ComponentPortal::new(CARD).into();
        let content = portal.attach(&*outlet).unwrap();
        let card = content.as_component().unwrap().clone();
        assert_eq!(doc.borrow().parent_of(card.host()), Some(target));
        assert_eq!(root.view_count(), 1);

        outlet.detach();
        assert_eq!(root.view_count(), 0);
        assert!(card.is_destroyed());
        assert!(doc.borrow().children_of(target).is_empty());
    }

    #[test]
    fn missing_app_root_is_reported() {
        let (doc, target) = setup();
        let outlet = DomOutletBackend::new(doc, target)
            .with_resolver(registry())
            .into_outlet();
        let portal: Portal = ComponentPortal::new(CARD).into();
        assert_eq!(
            portal.attach(&*outlet).unwrap_err(),
            PortalError::MissingApplicationRoot(CARD)
        );
        assert!(!outlet.has_attached());
    }

    #[test]
    fn component_in_view_container_moves_to_outlet() {
        let (doc, target) = setup();
        let body = doc.borrow().body();
        let vc = ViewContainerRef::append_to(&doc, body).unwrap();
        let outlet = DomOutletBackend::new(doc.clone(), target).into_outlet();
        let portal: Portal = ComponentPortal::new(CARD)
            .with_view_container(vc.clone())
            .with_resolver(registry())
            .into();
        let content = portal.attach(&*outlet).unwrap();
        let host = content.as_component().unwrap().host();
        assert_eq!(doc.borrow().parent_of(host), Some(target));
        assert_eq!(vc.len(), 1);
        outlet.detach();
        assert!(vc.is_empty());
    }

    #[test]
    fn dispose_removes_outlet_element() {
        let (doc, target) = setup();
        let outlet = DomOutletBackend::new(doc.clone(), target).into_outlet();
        outlet.dispose();
        assert_eq!(doc.borrow().parent_of(target), None);
        assert!(doc.borrow().is_alive(target));
    }
}
