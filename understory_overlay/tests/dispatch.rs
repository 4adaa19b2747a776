// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Keyboard and outside-click routing, and dispose on navigation.

use std::cell::RefCell;
use std::rc::Rc;

use understory_dom::{Document, EventKind, NodeId};
use understory_overlay::{
    KeyboardEvent, Modifiers, Overlay, OverlayConfig, OverlayRef, OverlayServices, PointerEvent,
};
use understory_portal::{DomPortal, Portal, SharedDocument, Subscription};

struct Fixture {
    doc: SharedDocument,
    services: OverlayServices,
    overlays: Overlay,
}

fn fixture() -> Fixture {
    let doc = Rc::new(RefCell::new(Document::new()));
    let services = OverlayServices::new(doc.clone());
    Fixture {
        doc,
        overlays: Overlay::new(services.clone()),
        services,
    }
}

impl Fixture {
    fn element(&self) -> NodeId {
        let mut doc = self.doc.borrow_mut();
        let body = doc.body();
        let node = doc.create_element("div");
        doc.append_child(body, node).unwrap();
        node
    }

    /// An attached overlay showing a fresh element; returns the element too.
    fn open(&self, config: OverlayConfig) -> (Rc<OverlayRef>, NodeId) {
        let overlay = self.overlays.create(config).unwrap();
        let content = self.element();
        overlay
            .attach(&Portal::from(DomPortal::new(content)))
            .unwrap();
        (overlay, content)
    }
}

type KeyLog = Rc<RefCell<Vec<(&'static str, String)>>>;

fn record_keys(overlay: &OverlayRef, log: &KeyLog, name: &'static str) -> Subscription {
    let log = log.clone();
    overlay
        .keydown_events()
        .subscribe(move |e: &KeyboardEvent| log.borrow_mut().push((name, e.key.clone())))
}

fn record_outside(
    overlay: &OverlayRef,
    log: &Rc<RefCell<Vec<&'static str>>>,
    name: &'static str,
) -> Subscription {
    let log = log.clone();
    overlay
        .outside_pointer_events()
        .subscribe(move |_: &PointerEvent| log.borrow_mut().push(name))
}

#[test]
fn keys_go_to_the_topmost_listening_overlay() {
    let f = fixture();
    let (lower, _) = f.open(OverlayConfig::default());
    let (upper, _) = f.open(OverlayConfig::default());
    let log = Rc::new(RefCell::new(Vec::new()));
    let _lower = record_keys(&lower, &log, "lower");
    let upper_sub = record_keys(&upper, &log, "upper");

    assert!(f.services.keyboard.is_listening());
    assert_eq!(f.services.keyboard.len(), 2);
    assert!(f.services.keyboard.dispatch(&KeyboardEvent::new("Escape")));

    drop(upper_sub);
    let event = KeyboardEvent::new("k").with_modifiers(Modifiers::CTRL | Modifiers::SHIFT);
    assert!(f.services.keyboard.dispatch(&event));
    assert_eq!(
        *log.borrow(),
        [("upper", "Escape".to_string()), ("lower", "k".to_string())]
    );
}

#[test]
fn detached_overlays_stop_receiving_keys() {
    let f = fixture();
    let (overlay, _) = f.open(OverlayConfig::default());
    let log = Rc::new(RefCell::new(Vec::new()));
    let _sub = record_keys(&overlay, &log, "only");

    overlay.detach();
    assert!(!f.services.keyboard.is_listening());
    assert!(!f.services.keyboard.dispatch(&KeyboardEvent::new("Escape")));
    assert!(log.borrow().is_empty());
}

#[test]
fn reattaching_moves_an_overlay_to_the_top() {
    let f = fixture();
    let (first, content) = f.open(OverlayConfig::default());
    let (second, _) = f.open(OverlayConfig::default());
    let log = Rc::new(RefCell::new(Vec::new()));
    let _a = record_keys(&first, &log, "first");
    let _b = record_keys(&second, &log, "second");

    first.detach();
    first
        .attach(&Portal::from(DomPortal::new(content)))
        .unwrap();
    f.services.keyboard.dispatch(&KeyboardEvent::new("Tab"));
    assert_eq!(*log.borrow(), [("first", "Tab".to_string())]);
}

#[test]
fn outside_clicks_stop_at_the_clicked_overlay() {
    let f = fixture();
    let (lower, lower_content) = f.open(OverlayConfig::default());
    let (upper, upper_content) = f.open(OverlayConfig::default());
    let log = Rc::new(RefCell::new(Vec::new()));
    let _lower = record_outside(&lower, &log, "lower");
    let _upper = record_outside(&upper, &log, "upper");
    let elsewhere = f.element();

    assert_eq!(
        f.services
            .outside_click
            .dispatch(&PointerEvent::click(elsewhere)),
        2
    );
    assert_eq!(*log.borrow(), ["upper", "lower"]);
    log.borrow_mut().clear();

    assert_eq!(
        f.services
            .outside_click
            .dispatch(&PointerEvent::click(upper_content)),
        0
    );
    assert!(log.borrow().is_empty());

    assert_eq!(
        f.services
            .outside_click
            .dispatch(&PointerEvent::click(lower_content)),
        1
    );
    assert_eq!(*log.borrow(), ["upper"]);
}

#[test]
fn drag_that_started_inside_is_not_an_outside_click() {
    let f = fixture();
    let (overlay, content) = f.open(OverlayConfig::default());
    let log = Rc::new(RefCell::new(Vec::new()));
    let _sub = record_outside(&overlay, &log, "overlay");
    let elsewhere = f.element();

    let event = PointerEvent {
        kind: EventKind::AuxClick,
        ..PointerEvent::click(elsewhere).with_origin(content)
    };
    assert_eq!(f.services.outside_click.dispatch(&event), 0);
    assert!(log.borrow().is_empty());
}

#[test]
fn overlays_without_observers_are_skipped() {
    let f = fixture();
    let (lower, _) = f.open(OverlayConfig::default());
    let (_upper, upper_content) = f.open(OverlayConfig::default());
    let log = Rc::new(RefCell::new(Vec::new()));
    let _lower = record_outside(&lower, &log, "lower");

    // The upper overlay does not listen, so it does not stop the walk either.
    assert_eq!(
        f.services
            .outside_click
            .dispatch(&PointerEvent::click(upper_content)),
        1
    );
    assert_eq!(*log.borrow(), ["lower"]);
}

#[test]
fn navigation_disposes_opted_in_overlays() {
    let f = fixture();
    let (sticky, _) = f.open(OverlayConfig::default());
    let (transient, _) = f.open(OverlayConfig::default().dispose_on_navigation(true));

    f.services.location.navigate("/settings");
    assert!(transient.is_disposed());
    assert!(!f.doc.borrow().is_alive(transient.host_element()));
    assert!(!sticky.is_disposed());
    assert!(sticky.has_attached());
    assert_eq!(f.services.location.path(), "/settings");
    assert_eq!(f.overlays.open_overlays().len(), 1);
}

#[test]
fn navigation_after_detach_leaves_overlay_alone() {
    let f = fixture();
    let (overlay, _) = f.open(OverlayConfig::default().dispose_on_navigation(true));
    overlay.detach();
    f.services.location.navigate("/elsewhere");
    assert!(!overlay.is_disposed());
}

#[test]
fn dropped_overlays_leave_the_registries() {
    let f = fixture();
    let (overlay, _) = f.open(OverlayConfig::default());
    assert_eq!(f.services.outside_click.len(), 1);
    overlay.dispose();
    assert!(f.services.outside_click.is_empty());
    assert!(f.services.keyboard.is_empty());
}
