// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Attach, detach, and dispose of overlays, including the backdrop fade and
//! deferred host removal.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use kurbo::Rect;
use tracing_subscriber::util::SubscriberInitExt;
use understory_dom::{Document, DomError, DomEvent, EventKind, NodeId, dispatch_event};
use understory_overlay::{
    BACKDROP_FALLBACK_MS, BlockScrollStrategy, Dimension, Direction, GlobalPositionStrategy, Overlay,
    OverlayConfig, OverlayRef, OverlayServices, OverlaySizeConfig, Scheduler, classes,
};
use understory_portal::{
    ApplicationRoot, ComponentPortal, ComponentRegistry, ComponentType, DomOutletBackend,
    DomPortal, Injector, Portal, PortalError, SharedDocument, TemplatePortal, TemplateRef,
    ViewContainerRef,
};

const MENU: ComponentType = ComponentType::new("Menu");

struct Fixture {
    doc: SharedDocument,
    scheduler: Scheduler,
    overlays: Overlay,
}

impl Fixture {
    fn new() -> Self {
        Self::with(|services| services)
    }

    fn with(configure: impl FnOnce(OverlayServices) -> OverlayServices) -> Self {
        let doc = Rc::new(RefCell::new(Document::new()));
        let services = configure(OverlayServices::new(doc.clone()));
        let scheduler = services.scheduler.clone();
        Self {
            doc,
            scheduler,
            overlays: Overlay::new(services),
        }
    }

    fn create(&self, config: OverlayConfig) -> Rc<OverlayRef> {
        self.overlays.create(config).unwrap()
    }

    /// A template portal rendering one `<p>` from a container under `body`.
    fn template_portal(&self) -> Portal {
        let body = self.doc.borrow().body();
        let container = ViewContainerRef::append_to(&self.doc, body).unwrap();
        let template = TemplateRef::new("item", |doc: &mut Document, _| {
            Ok(vec![doc.create_element("p")])
        });
        TemplatePortal::new(template, container).into()
    }

    fn dom_portal(&self) -> (Portal, NodeId) {
        let mut doc = self.doc.borrow_mut();
        let body = doc.body();
        let node = doc.create_element("ul");
        doc.append_child(body, node).unwrap();
        (DomPortal::new(node).into(), node)
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.doc.borrow().has_class(node, class)
    }
}

fn menu_registry() -> Rc<ComponentRegistry> {
    Rc::new(ComponentRegistry::new().with(
        MENU,
        |doc: &mut Document, _: &Injector| -> Result<NodeId, DomError> {
            Ok(doc.create_element("menu"))
        },
    ))
}

fn counter() -> (Rc<Cell<u32>>, impl Fn(&()) + 'static) {
    let count = Rc::new(Cell::new(0));
    let c = count.clone();
    (count, move |_: &()| c.set(c.get() + 1))
}

#[test]
fn backdrop_shows_after_one_frame() {
    let f = Fixture::new();
    let overlay = f.create(OverlayConfig::default().with_backdrop(true));
    let (attached, on_attach) = counter();
    let _sub = overlay.attachments().subscribe(on_attach);

    overlay.attach(&f.template_portal()).unwrap();

    let backdrop = overlay.backdrop_element().unwrap();
    assert_eq!(
        f.doc.borrow().previous_sibling(overlay.host_element()),
        Some(backdrop)
    );
    assert!(f.has_class(backdrop, classes::BACKDROP));
    assert!(f.has_class(backdrop, classes::DARK_BACKDROP));
    assert!(!f.has_class(backdrop, classes::BACKDROP_SHOWING));
    assert!(overlay.has_attached());
    assert_eq!(attached.get(), 1);

    f.scheduler.render_frame();
    assert!(f.has_class(backdrop, classes::BACKDROP_SHOWING));
    assert_eq!(attached.get(), 1);
}

#[test]
fn detach_fades_backdrop_until_transition_end() {
    let f = Fixture::new();
    let overlay = f.create(OverlayConfig::default().with_backdrop(true));
    let (detached, on_detach) = counter();
    let _sub = overlay.detachments().subscribe(on_detach);
    overlay.attach(&f.template_portal()).unwrap();
    f.scheduler.render_frame();
    let backdrop = overlay.backdrop_element().unwrap();

    assert!(overlay.detach().is_some());
    assert_eq!(detached.get(), 1);
    assert!(!f.has_class(backdrop, classes::BACKDROP_SHOWING));
    assert_eq!(f.doc.borrow().style(backdrop, "pointer-events"), Some("none"));
    assert!(f.doc.borrow().is_alive(backdrop));

    dispatch_event(&f.doc, DomEvent::new(EventKind::TransitionEnd, backdrop));
    assert!(!f.doc.borrow().is_alive(backdrop));
    assert_eq!(overlay.backdrop_element(), None);
    assert_eq!(f.scheduler.pending_timers(), 0, "fallback timer cancelled");
    assert_eq!(detached.get(), 1);
}

#[test]
fn backdrop_is_removed_after_fallback_without_transition_end() {
    let f = Fixture::new();
    let overlay = f.create(OverlayConfig::default().with_backdrop(true));
    overlay.attach(&f.template_portal()).unwrap();
    let backdrop = overlay.backdrop_element().unwrap();
    overlay.detach();

    f.scheduler.advance(BACKDROP_FALLBACK_MS - 1);
    assert!(f.doc.borrow().is_alive(backdrop));
    f.scheduler.advance(1);
    assert!(!f.doc.borrow().is_alive(backdrop));
    assert_eq!(overlay.backdrop_element(), None);
}

#[test]
fn stale_backdrop_timer_spares_the_replacement() {
    let f = Fixture::new();
    let overlay = f.create(OverlayConfig::default().with_backdrop(true));
    let portal = f.template_portal();
    overlay.attach(&portal).unwrap();
    let first = overlay.backdrop_element().unwrap();
    overlay.detach();

    overlay.attach(&portal).unwrap();
    let second = overlay.backdrop_element().unwrap();
    assert_ne!(first, second);

    f.scheduler.advance(BACKDROP_FALLBACK_MS);
    assert!(!f.doc.borrow().is_alive(first));
    assert!(f.doc.borrow().is_alive(second));
    assert_eq!(overlay.backdrop_element(), Some(second));

    // The fading backdrop never gets the showing class back.
    f.scheduler.render_frame();
    assert!(f.has_class(second, classes::BACKDROP_SHOWING));
}

#[test]
fn backdrop_click_is_forwarded() {
    let f = Fixture::new();
    let overlay = f.create(OverlayConfig::default().with_backdrop(true));
    let clicks = Rc::new(RefCell::new(Vec::new()));
    let seen = clicks.clone();
    let _sub = overlay
        .backdrop_click()
        .subscribe(move |e: &DomEvent| seen.borrow_mut().push(e.target));
    overlay.attach(&f.template_portal()).unwrap();
    let backdrop = overlay.backdrop_element().unwrap();

    dispatch_event(&f.doc, DomEvent::new(EventKind::Click, backdrop));
    assert_eq!(*clicks.borrow(), [backdrop]);
}

#[test]
fn disabled_animations_skip_the_fade() {
    let f = Fixture::with(|s| s.with_animations_disabled(true));
    let overlay = f.create(OverlayConfig::default().with_backdrop(true));
    overlay.attach(&f.template_portal()).unwrap();
    let backdrop = overlay.backdrop_element().unwrap();
    assert!(f.has_class(backdrop, classes::BACKDROP_NOOP_ANIMATION));
    assert!(f.has_class(backdrop, classes::BACKDROP_SHOWING));

    overlay.detach();
    assert!(!f.doc.borrow().is_alive(backdrop));
    assert_eq!(f.scheduler.pending_timers(), 0);
}

#[test]
fn backdrop_shows_synchronously_without_animation_frames() {
    let f = Fixture::with(|s| s.with_scheduler(Scheduler::without_animation_frames()));
    let overlay = f.create(OverlayConfig::default().with_backdrop(true));
    overlay.attach(&f.template_portal()).unwrap();
    let backdrop = overlay.backdrop_element().unwrap();
    assert!(f.has_class(backdrop, classes::BACKDROP_SHOWING));
    assert!(!f.has_class(backdrop, classes::BACKDROP_NOOP_ANIMATION));
}

#[test]
fn host_leaves_when_pane_empties_and_returns_on_reattach() {
    let f = Fixture::new();
    let overlay = f.create(OverlayConfig::default().panel_class("menu-panel"));
    let container = f.overlays.container_element().unwrap();
    let host = overlay.host_element();
    let pane = overlay.overlay_element();
    let (portal, node) = f.dom_portal();

    overlay.attach(&portal).unwrap();
    assert!(f.has_class(pane, "menu-panel"));
    assert_eq!(f.doc.borrow().style(pane, "pointer-events"), None);

    overlay.detach();
    assert_eq!(f.doc.borrow().style(pane, "pointer-events"), Some("none"));
    assert_eq!(f.doc.borrow().parent_of(node), Some(f.doc.borrow().body()));
    // Removal waits for the next stable point.
    assert_eq!(f.doc.borrow().parent_of(host), Some(container));
    assert!(f.has_class(pane, "menu-panel"));

    f.scheduler.run_microtasks();
    assert_eq!(f.doc.borrow().parent_of(host), None);
    assert!(!f.has_class(pane, "menu-panel"));

    overlay.attach(&portal).unwrap();
    assert_eq!(f.doc.borrow().parent_of(host), Some(container));
    assert_eq!(f.doc.borrow().parent_of(node), Some(pane));
}

#[test]
fn host_stays_while_pane_has_content() {
    let f = Fixture::new();
    let overlay = f.create(OverlayConfig::default());
    let host = overlay.host_element();
    let pane = overlay.overlay_element();
    overlay.attach(&f.template_portal()).unwrap();
    overlay.detach();

    let lingering = f.doc.borrow_mut().create_element("span");
    f.doc.borrow_mut().append_child(pane, lingering).unwrap();
    f.scheduler.run_microtasks();
    assert!(f.doc.borrow().parent_of(host).is_some());

    f.doc.borrow_mut().destroy(lingering);
    f.scheduler.run_microtasks();
    assert_eq!(f.doc.borrow().parent_of(host), None);
}

#[test]
fn reattach_cancels_pending_host_removal() {
    let f = Fixture::new();
    let overlay = f.create(OverlayConfig::default());
    let portal = f.template_portal();
    overlay.attach(&portal).unwrap();
    overlay.detach();
    overlay.attach(&portal).unwrap();

    f.scheduler.run_microtasks();
    assert!(f.doc.borrow().parent_of(overlay.host_element()).is_some());
    assert!(overlay.has_attached());
}

#[test]
fn dispose_tears_down_synchronously() {
    let f = Fixture::new();
    let overlay = f.create(OverlayConfig::default().with_backdrop(true));
    let (detached, on_detach) = counter();
    let completed = Rc::new(Cell::new(0_u32));
    let done = completed.clone();
    let _detach_sub = overlay
        .detachments()
        .subscribe_with_complete(on_detach, move || done.set(done.get() + 1));
    let done = completed.clone();
    let _attach_sub = overlay
        .attachments()
        .subscribe_with_complete(|_| {}, move || done.set(done.get() + 1));
    overlay.attach(&f.template_portal()).unwrap();
    let backdrop = overlay.backdrop_element().unwrap();

    overlay.dispose();
    assert!(!overlay.has_attached());
    assert!(overlay.is_disposed());
    assert!(!f.doc.borrow().is_alive(overlay.host_element()));
    assert!(!f.doc.borrow().is_alive(overlay.overlay_element()));
    assert!(!f.doc.borrow().is_alive(backdrop));
    assert_eq!(detached.get(), 1);
    assert_eq!(completed.get(), 2);
    assert!(overlay.keydown_events().is_completed());
    assert!(overlay.outside_pointer_events().is_completed());
    assert!(overlay.backdrop_click().is_completed());

    overlay.dispose();
    assert_eq!(detached.get(), 1);
    assert!(matches!(
        overlay.attach(&f.template_portal()),
        Err(PortalError::OutletDisposed)
    ));
}

#[test]
fn dispose_while_detached_sends_no_detachment() {
    let f = Fixture::new();
    let overlay = f.create(OverlayConfig::default());
    let (detached, on_detach) = counter();
    let _sub = overlay.detachments().subscribe(on_detach);
    overlay.dispose();
    assert_eq!(detached.get(), 0);
    assert!(overlay.detachments().is_completed());
}

#[test]
fn detach_without_content_is_a_no_op() {
    let f = Fixture::new();
    let overlay = f.create(OverlayConfig::default());
    let (detached, on_detach) = counter();
    let _sub = overlay.detachments().subscribe(on_detach);
    assert!(overlay.detach().is_none());
    assert_eq!(detached.get(), 0);
}

#[test]
fn component_without_application_root_fails_cleanly() {
    let doc = Rc::new(RefCell::new(Document::new()));
    let overlays = Overlay::new(OverlayServices::new(doc.clone())).with_resolver(menu_registry());
    let overlay = overlays.create(OverlayConfig::default()).unwrap();

    let portal: Portal = ComponentPortal::new(MENU).into();
    assert_eq!(
        overlay.attach(&portal).unwrap_err(),
        PortalError::MissingApplicationRoot(MENU)
    );
    assert!(!overlay.has_attached());
    assert!(!portal.is_attached());
}

#[test]
fn component_is_attached_through_application_root() {
    let doc = Rc::new(RefCell::new(Document::new()));
    let app_root = ApplicationRoot::new();
    let overlays = Overlay::new(OverlayServices::new(doc.clone()))
        .with_resolver(menu_registry())
        .with_application_root(app_root.clone());
    let overlay = overlays.create(OverlayConfig::default()).unwrap();

    let content = overlay.attach(&ComponentPortal::new(MENU).into()).unwrap();
    let component = content.as_component().unwrap();
    assert_eq!(
        doc.borrow().parent_of(component.host()),
        Some(overlay.overlay_element())
    );
    assert_eq!(app_root.view_count(), 1);

    overlay.detach();
    assert_eq!(app_root.view_count(), 0);
}

#[test]
fn orphan_dom_portal_is_rejected() {
    let f = Fixture::new();
    let overlay = f.create(OverlayConfig::default());
    let orphan = f.doc.borrow_mut().create_element("div");
    assert_eq!(
        overlay.attach(&DomPortal::new(orphan).into()).unwrap_err(),
        PortalError::MissingParent(orphan)
    );
    assert!(!overlay.has_attached());
    assert_eq!(f.doc.borrow().parent_of(orphan), None);
}

#[test]
fn content_destroying_itself_detaches_the_overlay() {
    let f = Fixture::new();
    let overlay = f.create(OverlayConfig::default());
    let (detached, on_detach) = counter();
    let _sub = overlay.detachments().subscribe(on_detach);
    let content = overlay.attach(&f.template_portal()).unwrap();

    content.as_template().unwrap().destroy();
    assert!(overlay.has_attached(), "detach is deferred");
    f.scheduler.run_microtasks();
    assert!(!overlay.has_attached());
    assert_eq!(detached.get(), 1);
}

#[test]
fn size_and_direction_are_applied() {
    let f = Fixture::new();
    let overlay = f.create(
        OverlayConfig::default()
            .width(320.0)
            .height("50vh")
            .direction(Direction::Rtl),
    );
    let pane = overlay.overlay_element();
    let host = overlay.host_element();
    overlay.attach(&f.template_portal()).unwrap();
    assert_eq!(f.doc.borrow().style(pane, "width"), Some("320px"));
    assert_eq!(f.doc.borrow().style(pane, "height"), Some("50vh"));
    assert_eq!(f.doc.borrow().attribute(host, "dir"), Some("rtl"));

    overlay.update_size(OverlaySizeConfig {
        max_width: Some(Dimension::Px(600.0)),
        ..OverlaySizeConfig::default()
    });
    assert_eq!(f.doc.borrow().style(pane, "width"), Some("320px"));
    assert_eq!(f.doc.borrow().style(pane, "max-width"), Some("600px"));

    overlay.set_direction(Direction::Ltr);
    assert_eq!(f.doc.borrow().attribute(host, "dir"), Some("ltr"));
    assert_eq!(overlay.direction(), Direction::Ltr);

    overlay.add_panel_class(["a", "b"]);
    overlay.remove_panel_class("a");
    assert!(!f.has_class(pane, "a"));
    assert!(f.has_class(pane, "b"));
}

#[test]
fn newly_attached_overlay_is_stacked_last() {
    let f = Fixture::new();
    let first = f.create(OverlayConfig::default());
    let second = f.create(OverlayConfig::default());
    let container = f.overlays.container_element().unwrap();
    assert_eq!(
        f.doc.borrow().last_child(container),
        Some(second.host_element())
    );

    first.attach(&f.template_portal()).unwrap();
    assert_eq!(
        f.doc.borrow().last_child(container),
        Some(first.host_element())
    );
}

#[test]
fn panes_get_sequential_ids() {
    let f = Fixture::new();
    let a = f.create(OverlayConfig::default());
    let b = f.create(OverlayConfig::default());
    let doc = f.doc.borrow();
    assert_eq!(doc.attribute(a.overlay_element(), "id"), Some("overlay-0"));
    assert_eq!(doc.attribute(b.overlay_element(), "id"), Some("overlay-1"));
    assert!(doc.has_class(a.overlay_element(), classes::PANE));
    assert_eq!(doc.parent_of(a.overlay_element()), Some(a.host_element()));
}

#[test]
fn position_update_runs_after_render_while_attached() {
    let f = Fixture::new();
    let strategy = Rc::new(GlobalPositionStrategy::new(Rect::new(0.0, 0.0, 800.0, 600.0)));
    let overlay = f.create(OverlayConfig::default().position_strategy(strategy.clone()));

    overlay.attach(&f.template_portal()).unwrap();
    assert_eq!(strategy.last_position(), None);
    f.scheduler.render_frame();
    assert!(strategy.last_position().is_some());
    assert_eq!(
        f.doc.borrow().style(overlay.overlay_element(), "position"),
        Some("absolute")
    );
}

#[test]
fn position_update_is_skipped_after_detach() {
    let f = Fixture::new();
    let strategy = Rc::new(GlobalPositionStrategy::new(Rect::new(0.0, 0.0, 800.0, 600.0)));
    let overlay = f.create(OverlayConfig::default().position_strategy(strategy.clone()));

    overlay.attach(&f.template_portal()).unwrap();
    overlay.detach();
    f.scheduler.render_frame();
    assert_eq!(strategy.last_position(), None);
}

#[test]
fn switching_scroll_strategy_while_attached_enables_it() {
    let f = Fixture::new();
    let overlay = f.create(OverlayConfig::default());
    overlay.attach(&f.template_portal()).unwrap();

    let block = Rc::new(BlockScrollStrategy::new());
    overlay.update_scroll_strategy(block.clone());
    let body = f.doc.borrow().body();
    assert!(block.is_enabled());
    assert!(f.has_class(body, classes::SCROLL_BLOCK));

    overlay.detach();
    assert!(!block.is_enabled());
    assert!(!f.has_class(body, classes::SCROLL_BLOCK));

    overlay.attach(&f.template_portal()).unwrap();
    assert!(block.is_enabled());
    overlay.dispose();
    assert!(!f.has_class(body, classes::SCROLL_BLOCK));
}

#[test]
fn switching_position_strategy_disposes_the_old_one() {
    let f = Fixture::new();
    let viewport = Rect::new(0.0, 0.0, 400.0, 400.0);
    let old = Rc::new(GlobalPositionStrategy::new(viewport));
    let overlay = f.create(OverlayConfig::default().position_strategy(old.clone()));
    overlay.attach(&f.template_portal()).unwrap();
    f.scheduler.render_frame();
    assert!(old.last_position().is_some());

    let new = Rc::new(GlobalPositionStrategy::new(viewport));
    overlay.update_position_strategy(new.clone());
    assert_eq!(old.last_position(), None);
    assert!(new.last_position().is_some(), "applied immediately while attached");
}

#[test]
fn lifecycle_emits_tracing_events() {
    let _guard = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .set_default();
    let f = Fixture::new();
    let overlay = f.create(OverlayConfig::default().with_backdrop(true));
    overlay.attach(&f.template_portal()).unwrap();
    overlay.detach();
    f.scheduler.advance(BACKDROP_FALLBACK_MS);
    overlay.dispose();
    assert!(overlay.is_disposed());
}

#[test]
fn scroll_strategy_switched_while_detached_is_enabled_on_attach() {
    let f = Fixture::new();
    let overlay = f.create(OverlayConfig::default());
    let block = Rc::new(BlockScrollStrategy::new());
    overlay.update_scroll_strategy(block.clone());
    assert!(!block.is_enabled());

    overlay.attach(&f.template_portal()).unwrap();
    let body = f.doc.borrow().body();
    assert!(block.is_enabled());
    assert!(f.has_class(body, classes::SCROLL_BLOCK));
}

#[test]
fn backdrop_without_host_parent_fails_before_rendering() {
    let f = Fixture::new();
    let (host, pane) = {
        let mut doc = f.doc.borrow_mut();
        let host = doc.create_element("div");
        let pane = doc.create_element("div");
        doc.append_child(host, pane).unwrap();
        (host, pane)
    };
    let outlet = DomOutletBackend::new(f.doc.clone(), pane).into_outlet();
    let services = f.overlays.services().clone();
    let overlay = OverlayRef::new(
        outlet,
        host,
        pane,
        OverlayConfig::default().with_backdrop(true),
        services.clone(),
    );
    let (portal, node) = f.dom_portal();

    assert_eq!(
        overlay.attach(&portal).unwrap_err(),
        PortalError::MissingParent(host)
    );
    assert!(!overlay.has_attached());
    assert!(!portal.is_attached());
    assert_eq!(f.doc.borrow().parent_of(node), Some(f.doc.borrow().body()));
    assert!(f.doc.borrow().children_of(pane).is_empty());
    assert_eq!(overlay.backdrop_element(), None);
    assert!(services.keyboard.is_empty());
    assert!(services.outside_click.is_empty());

    // The portal is free to go elsewhere.
    let other = f.create(OverlayConfig::default());
    other.attach(&portal).unwrap();
    assert_eq!(f.doc.borrow().parent_of(node), Some(other.overlay_element()));
}
