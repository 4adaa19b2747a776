// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use understory_dom::{DomError, NodeId};
use understory_portal::{
    ApplicationRoot, ComponentFactoryResolver, DomOutletBackend, Injector, SharedDocument,
};

use crate::classes;
use crate::config::OverlayConfig;
use crate::dispatchers::{KeyboardDispatcher, OutsideClickDispatcher};
use crate::location::Location;
use crate::overlay_ref::OverlayRef;
use crate::scheduler::Scheduler;

/// Everything an overlay collaborates with.
///
/// Cloning shares the underlying document, scheduler, dispatchers, and
/// location.
#[derive(Clone, Debug)]
pub struct OverlayServices {
    /// The document overlays render into.
    pub document: SharedDocument,
    /// Deferred work.
    pub scheduler: Scheduler,
    /// Routes key events to the topmost overlay.
    pub keyboard: KeyboardDispatcher,
    /// Routes outside clicks.
    pub outside_click: OutsideClickDispatcher,
    /// Location for `dispose_on_navigation`.
    pub location: Location,
    /// Skip backdrop transitions.
    pub animations_disabled: bool,
}

impl OverlayServices {
    /// Fresh collaborators around `document`.
    pub fn new(document: SharedDocument) -> Self {
        Self {
            document,
            scheduler: Scheduler::new(),
            keyboard: KeyboardDispatcher::new(),
            outside_click: OutsideClickDispatcher::new(),
            location: Location::default(),
            animations_disabled: false,
        }
    }

    /// Use `scheduler` instead of a fresh one.
    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Use `location` instead of a fresh one.
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Disable backdrop transitions.
    pub fn with_animations_disabled(mut self, disabled: bool) -> Self {
        self.animations_disabled = disabled;
        self
    }
}

/// The element every overlay host is placed in, created on first use.
#[derive(Debug)]
pub struct OverlayContainer {
    document: SharedDocument,
    element: Cell<Option<NodeId>>,
}

impl OverlayContainer {
    /// A container that will live under `document`'s body.
    pub fn new(document: SharedDocument) -> Self {
        Self {
            document,
            element: Cell::new(None),
        }
    }

    /// The container element, creating it if needed.
    ///
    /// A container that was removed from the document is replaced.
    pub fn element(&self) -> Result<NodeId, DomError> {
        let mut doc = self.document.borrow_mut();
        if let Some(element) = self.element.get() {
            if doc.is_connected(element) {
                return Ok(element);
            }
        }
        let element = doc.create_element("div");
        doc.add_class(element, classes::CONTAINER);
        let body = doc.body();
        doc.append_child(body, element)?;
        self.element.set(Some(element));
        Ok(element)
    }
}

/// Creates overlays.
pub struct Overlay {
    services: OverlayServices,
    container: OverlayContainer,
    resolver: Option<Rc<dyn ComponentFactoryResolver>>,
    app_root: Option<ApplicationRoot>,
    injector: Option<Injector>,
    next_id: Cell<u32>,
    created: RefCell<Vec<Weak<OverlayRef>>>,
}

impl fmt::Debug for Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overlay")
            .field("container", &self.container)
            .field("resolver", &self.resolver.is_some())
            .field("app_root", &self.app_root.is_some())
            .field("next_id", &self.next_id.get())
            .finish_non_exhaustive()
    }
}

impl Overlay {
    /// A factory over `services`.
    pub fn new(services: OverlayServices) -> Self {
        let container = OverlayContainer::new(Rc::clone(&services.document));
        Self {
            services,
            container,
            resolver: None,
            app_root: None,
            injector: None,
            next_id: Cell::new(0),
            created: RefCell::new(Vec::new()),
        }
    }

    /// Resolver for component portals that carry none.
    pub fn with_resolver(mut self, resolver: Rc<dyn ComponentFactoryResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Root used for component portals without a view container.
    pub fn with_application_root(mut self, app_root: ApplicationRoot) -> Self {
        self.app_root = Some(app_root);
        self
    }

    /// Injector for component portals that carry none.
    pub fn with_injector(mut self, injector: Injector) -> Self {
        self.injector = Some(injector);
        self
    }

    /// The shared collaborators.
    pub fn services(&self) -> &OverlayServices {
        &self.services
    }

    /// The container element, creating it if needed.
    pub fn container_element(&self) -> Result<NodeId, DomError> {
        self.container.element()
    }

    /// Create a detached overlay.
    ///
    /// A host element is appended to the container with a pane inside it whose
    /// `id` is `overlay-N`, with `N` counting up from zero per factory.
    pub fn create(&self, config: OverlayConfig) -> Result<Rc<OverlayRef>, DomError> {
        let container = self.container.element()?;
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let (host, pane) = {
            let mut doc = self.services.document.borrow_mut();
            let host = doc.create_element("div");
            doc.append_child(container, host)?;
            let pane = doc.create_element("div");
            doc.add_class(pane, classes::PANE);
            doc.set_attribute(pane, "id", &format!("overlay-{id}"));
            doc.append_child(host, pane)?;
            (host, pane)
        };

        let mut backend = DomOutletBackend::new(Rc::clone(&self.services.document), pane);
        if let Some(resolver) = &self.resolver {
            backend = backend.with_resolver(Rc::clone(resolver));
        }
        if let Some(app_root) = &self.app_root {
            backend = backend.with_application_root(app_root.clone());
        }
        if let Some(injector) = &self.injector {
            backend = backend.with_injector(injector.clone());
        }

        let overlay = OverlayRef::new(
            backend.into_outlet(),
            host,
            pane,
            config,
            self.services.clone(),
        );
        let mut created = self.created.borrow_mut();
        created.retain(|o| o.strong_count() > 0);
        created.push(Rc::downgrade(&overlay));
        tracing::debug!(?host, ?pane, "overlay created");
        Ok(overlay)
    }

    /// Live overlays created by this factory that are not disposed.
    pub fn open_overlays(&self) -> Vec<Rc<OverlayRef>> {
        self.created
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|o| !o.is_disposed())
            .collect()
    }
}
