// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One floating overlay: host, pane, optional backdrop, and an inner outlet.
//!
//! ## States
//!
//! ```text
//! Detached --attach--> Attached --detach--> Detached ... --dispose--> Disposed
//! ```
//!
//! ## Deferred work
//!
//! Everything in [`OverlayRef::attach`] and [`OverlayRef::detach`] runs
//! synchronously except:
//!
//! - the post-attach position update (after the next render, skipped if the
//!   overlay was detached meanwhile),
//! - the backdrop fade-in (next animation frame),
//! - the backdrop fade-out (transition end or [`BACKDROP_FALLBACK_MS`],
//!   whichever comes first),
//! - host removal after detach (next stable point at which the pane is empty).
//!
//! Within one [`Scheduler::render_frame`], the fade-in runs before the position
//! update.
//!
//! [`Scheduler::render_frame`]: crate::Scheduler::render_frame

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use understory_dom::{DomEvent, EventKind, ListenerId, NodeId};
use understory_portal::{
    AttachedContent, EventStream, Portal, PortalError, PortalOutlet, SharedDocument, Subject,
    Subscription,
};

use crate::classes;
use crate::config::{ClassList, Direction, DirectionSource, OverlayConfig, OverlaySizeConfig};
use crate::dispatchers::{KeyboardEvent, PointerEvent};
use crate::overlay::OverlayServices;
use crate::scheduler::TaskId;
use crate::strategy::{OverlayTarget, PositionStrategy, ScrollStrategy};

/// How long a detached backdrop waits for its transition to end before it is
/// removed anyway, in milliseconds.
pub const BACKDROP_FALLBACK_MS: u64 = 500;

#[derive(Debug)]
struct FadingBackdrop {
    element: NodeId,
    timer: TaskId,
    transition_listener: Option<ListenerId>,
}

#[derive(Default)]
struct State {
    config: OverlayConfig,
    backdrop: Option<NodeId>,
    fading: Vec<FadingBackdrop>,
    previous_host_parent: Option<NodeId>,
    host_removal: Option<TaskId>,
    location_changes: Option<Subscription>,
    content_destroyed: Option<Subscription>,
    disposed: bool,
}

/// A managed floating overlay.
///
/// Created by [`crate::Overlay::create`], or directly through
/// [`OverlayRef::new`] with elements and an outlet built elsewhere.
pub struct OverlayRef {
    this: Weak<Self>,
    services: OverlayServices,
    outlet: Rc<dyn PortalOutlet>,
    host: NodeId,
    pane: NodeId,
    state: RefCell<State>,
    attachments: Subject<()>,
    detachments: Subject<()>,
    backdrop_click: Subject<DomEvent>,
    keydown: Subject<KeyboardEvent>,
    outside_pointer: Subject<PointerEvent>,
}

impl fmt::Debug for OverlayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("OverlayRef")
            .field("host", &self.host)
            .field("pane", &self.pane)
            .field("attached", &self.outlet.has_attached())
            .field("backdrop", &state.backdrop)
            .field("fading", &state.fading)
            .field("disposed", &state.disposed)
            .field("config", &state.config)
            .finish_non_exhaustive()
    }
}

impl OverlayRef {
    /// Wrap existing `host` and `pane` elements; `outlet` renders into the pane.
    ///
    /// The host is expected to be in the document already, with the pane
    /// inside it. The configured scroll strategy is bound immediately.
    pub fn new(
        outlet: Rc<dyn PortalOutlet>,
        host: NodeId,
        pane: NodeId,
        config: OverlayConfig,
        services: OverlayServices,
    ) -> Rc<Self> {
        let scroll = config.scroll_strategy.clone();
        let overlay = Rc::new_cyclic(|this| Self {
            this: this.clone(),
            services,
            outlet,
            host,
            pane,
            state: RefCell::new(State {
                config,
                ..State::default()
            }),
            attachments: Subject::new(),
            detachments: Subject::new(),
            backdrop_click: Subject::new(),
            keydown: Subject::new(),
            outside_pointer: Subject::new(),
        });
        if let Some(scroll) = scroll {
            scroll.attach(&overlay.target());
        }
        overlay
    }

    fn target(&self) -> OverlayTarget {
        OverlayTarget {
            document: Rc::clone(&self.services.document),
            host: self.host,
            pane: self.pane,
        }
    }

    fn position_strategy(&self) -> Option<Rc<dyn PositionStrategy>> {
        self.state.borrow().config.position_strategy.clone()
    }

    fn scroll_strategy(&self) -> Option<Rc<dyn ScrollStrategy>> {
        self.state.borrow().config.scroll_strategy.clone()
    }

    /// Render `portal` in the pane.
    ///
    /// Returns what the inner outlet produced. Fails with the outlet's error if
    /// the portal cannot be attached, or with [`PortalError::MissingParent`] if
    /// a backdrop is configured but the host is not in the document. On failure
    /// the overlay stays detached and the portal is released.
    pub fn attach(&self, portal: &Portal) -> Result<AttachedContent, PortalError> {
        let previous_parent = self.state.borrow().previous_host_parent;
        if let Some(parent) = previous_parent {
            let mut doc = self.services.document.borrow_mut();
            if doc.parent_of(self.host).is_none() {
                doc.append_child(parent, self.host)?;
            }
        }

        let has_backdrop = self.state.borrow().config.has_backdrop;
        if has_backdrop
            && self
                .services
                .document
                .borrow()
                .parent_of(self.host)
                .is_none()
        {
            return Err(PortalError::MissingParent(self.host));
        }

        let content = self.outlet.attach(portal)?;

        if let Some(position) = self.position_strategy() {
            position.attach(&self.target());
        }
        if let Err(err) = self.update_stacking_order() {
            self.abort_attach();
            return Err(err);
        }
        self.update_element_size();
        self.update_element_direction();
        if let Some(scroll) = self.scroll_strategy() {
            scroll.attach(&self.target());
            scroll.enable();
        }

        let weak = self.this.clone();
        self.services.scheduler.after_next_render(move || {
            if let Some(overlay) = weak.upgrade() {
                if overlay.has_attached() {
                    overlay.update_position();
                }
            }
        });

        self.toggle_pointer_events(true);
        let (panel_class, dispose_on_navigation) = {
            let state = self.state.borrow();
            (
                state.config.panel_class.clone(),
                state.config.dispose_on_navigation,
            )
        };
        if has_backdrop {
            if let Err(err) = self.attach_backdrop() {
                self.abort_attach();
                return Err(err);
            }
        }
        self.toggle_classes(self.pane, &panel_class, true);

        self.cancel_host_removal();
        tracing::debug!(host = ?self.host, "overlay attached");
        self.attachments.emit(&());

        let Some(this) = self.this.upgrade() else {
            return Ok(content);
        };
        self.services.keyboard.add(&this);
        if dispose_on_navigation {
            let weak = self.this.clone();
            let subscription = self.services.location.changes().subscribe(move |_| {
                if let Some(overlay) = weak.upgrade() {
                    overlay.dispose();
                }
            });
            let previous = self
                .state
                .borrow_mut()
                .location_changes
                .replace(subscription);
            drop(previous);
        }
        self.services.outside_click.add(&this);

        let weak = self.this.clone();
        let scheduler = self.services.scheduler.clone();
        let destroyed = content.on_destroy(move || {
            let Some(overlay) = weak.upgrade() else {
                return;
            };
            if overlay.has_attached() {
                let weak = weak.clone();
                scheduler.queue_microtask(move || {
                    if let Some(overlay) = weak.upgrade() {
                        overlay.detach();
                    }
                });
            }
        });
        let previous = core::mem::replace(&mut self.state.borrow_mut().content_destroyed, destroyed);
        drop(previous);

        Ok(content)
    }

    /// Undo a partially applied attach; nothing has been announced yet.
    fn abort_attach(&self) {
        tracing::debug!(host = ?self.host, "overlay attach rolled back");
        self.toggle_pointer_events(false);
        if let Some(position) = self.position_strategy() {
            position.detach();
        }
        if let Some(scroll) = self.scroll_strategy() {
            scroll.disable();
        }
        self.outlet.detach();
    }

    /// Remove the content, returning the portal that was attached.
    ///
    /// Does nothing when nothing is attached. The host leaves the document at
    /// the next stable point at which the pane is empty.
    pub fn detach(&self) -> Option<Portal> {
        if !self.has_attached() {
            return None;
        }
        self.detach_backdrop();
        self.toggle_pointer_events(false);
        if let Some(position) = self.position_strategy() {
            position.detach();
        }
        if let Some(scroll) = self.scroll_strategy() {
            scroll.disable();
        }

        let detached = self.outlet.detach();
        let destroyed = self.state.borrow_mut().content_destroyed.take();
        drop(destroyed);

        tracing::debug!(host = ?self.host, "overlay detached");
        self.detachments.emit(&());
        self.services.keyboard.remove(self);
        self.detach_content_when_stable();
        let location = self.state.borrow_mut().location_changes.take();
        drop(location);
        self.services.outside_click.remove(self);
        detached
    }

    /// Tear everything down immediately. Later calls do nothing.
    ///
    /// If content was attached, observers of [`OverlayRef::detachments`] get
    /// one final notification before every channel completes.
    pub fn dispose(&self) {
        if self.state.borrow().disposed {
            return;
        }
        self.state.borrow_mut().disposed = true;
        let was_attached = self.has_attached();

        if let Some(position) = self.position_strategy() {
            position.dispose();
        }
        self.dispose_scroll_strategy();
        self.dispose_backdrops();
        let location = self.state.borrow_mut().location_changes.take();
        drop(location);
        self.services.keyboard.remove(self);
        self.cancel_host_removal();

        self.outlet.dispose();

        self.attachments.complete();
        self.backdrop_click.complete();
        self.keydown.complete();
        self.outside_pointer.complete();
        self.services.outside_click.remove(self);

        {
            let mut doc = self.services.document.borrow_mut();
            doc.destroy(self.pane);
            doc.destroy(self.host);
        }
        let destroyed = {
            let mut state = self.state.borrow_mut();
            state.previous_host_parent = None;
            state.content_destroyed.take()
        };
        drop(destroyed);

        tracing::debug!(host = ?self.host, was_attached, "overlay disposed");
        if was_attached {
            self.detachments.emit(&());
        }
        self.detachments.complete();
    }

    /// Returns true while content is attached.
    pub fn has_attached(&self) -> bool {
        self.outlet.has_attached()
    }

    /// Returns true once [`OverlayRef::dispose`] ran.
    pub fn is_disposed(&self) -> bool {
        self.state.borrow().disposed
    }

    /// The positioned wrapper element.
    pub fn host_element(&self) -> NodeId {
        self.host
    }

    /// The pane element content renders into.
    pub fn overlay_element(&self) -> NodeId {
        self.pane
    }

    /// The current backdrop, including one that is fading out.
    pub fn backdrop_element(&self) -> Option<NodeId> {
        self.state.borrow().backdrop
    }

    /// The document the overlay lives in.
    pub fn document(&self) -> &SharedDocument {
        &self.services.document
    }

    /// A snapshot of the current configuration.
    pub fn config(&self) -> OverlayConfig {
        self.state.borrow().config.clone()
    }

    /// The current layout direction.
    pub fn direction(&self) -> Direction {
        self.state.borrow().config.direction.value()
    }

    /// Fires after each attach, once the overlay is fully configured.
    pub fn attachments(&self) -> EventStream<()> {
        self.attachments.stream()
    }

    /// Fires after each detach, and once more on dispose if content was attached.
    pub fn detachments(&self) -> EventStream<()> {
        self.detachments.stream()
    }

    /// Clicks on the backdrop.
    pub fn backdrop_click(&self) -> EventStream<DomEvent> {
        self.backdrop_click.stream()
    }

    /// Key events routed to this overlay by the keyboard dispatcher.
    pub fn keydown_events(&self) -> EventStream<KeyboardEvent> {
        self.keydown.stream()
    }

    /// Pointer events outside the pane, routed by the outside-click dispatcher.
    pub fn outside_pointer_events(&self) -> EventStream<PointerEvent> {
        self.outside_pointer.stream()
    }

    pub(crate) fn keydown_subject(&self) -> &Subject<KeyboardEvent> {
        &self.keydown
    }

    pub(crate) fn outside_pointer_subject(&self) -> &Subject<PointerEvent> {
        &self.outside_pointer
    }

    /// Re-run the position strategy.
    pub fn update_position(&self) {
        if let Some(position) = self.position_strategy() {
            position.apply();
        }
    }

    /// Merge `size` into the configuration and apply it to the pane.
    pub fn update_size(&self, size: OverlaySizeConfig) {
        self.state.borrow_mut().config.size.merge(size);
        self.update_element_size();
    }

    /// Change the layout direction.
    pub fn set_direction(&self, direction: impl Into<DirectionSource>) {
        self.state.borrow_mut().config.direction = direction.into();
        self.update_element_direction();
    }

    /// Add classes to the pane.
    pub fn add_panel_class(&self, classes: impl Into<ClassList>) {
        self.toggle_classes(self.pane, &classes.into(), true);
    }

    /// Remove classes from the pane.
    pub fn remove_panel_class(&self, classes: impl Into<ClassList>) {
        self.toggle_classes(self.pane, &classes.into(), false);
    }

    /// Switch position strategies. The old one is disposed; when attached, the
    /// new one is bound and applied right away.
    pub fn update_position_strategy(&self, strategy: Rc<dyn PositionStrategy>) {
        let old = self.position_strategy();
        if old.as_ref().is_some_and(|old| Rc::ptr_eq(old, &strategy)) {
            return;
        }
        if let Some(old) = old {
            old.dispose();
        }
        self.state.borrow_mut().config.position_strategy = Some(Rc::clone(&strategy));
        if self.has_attached() {
            strategy.attach(&self.target());
            self.update_position();
        }
    }

    /// Switch scroll strategies. The old one is disabled and unbound; the new
    /// one is bound, and enabled when attached.
    pub fn update_scroll_strategy(&self, strategy: Rc<dyn ScrollStrategy>) {
        let old = self.scroll_strategy();
        if old.as_ref().is_some_and(|old| Rc::ptr_eq(old, &strategy)) {
            return;
        }
        self.dispose_scroll_strategy();
        self.state.borrow_mut().config.scroll_strategy = Some(Rc::clone(&strategy));
        if self.has_attached() {
            strategy.attach(&self.target());
            strategy.enable();
        }
    }

    fn dispose_scroll_strategy(&self) {
        if let Some(scroll) = self.scroll_strategy() {
            scroll.disable();
            scroll.detach();
        }
    }

    fn update_stacking_order(&self) -> Result<(), PortalError> {
        let mut doc = self.services.document.borrow_mut();
        if doc.next_sibling(self.host).is_some() {
            if let Some(parent) = doc.parent_of(self.host) {
                doc.append_child(parent, self.host)?;
            }
        }
        Ok(())
    }

    fn update_element_size(&self) {
        let styles = self.state.borrow().config.size.styles();
        let mut doc = self.services.document.borrow_mut();
        for (property, value) in styles {
            doc.set_style(self.pane, property, &value);
        }
    }

    fn update_element_direction(&self) {
        let direction = self.direction();
        self.services
            .document
            .borrow_mut()
            .set_attribute(self.host, "dir", direction.as_str());
    }

    fn toggle_pointer_events(&self, enable: bool) {
        let value = if enable { "" } else { "none" };
        self.services
            .document
            .borrow_mut()
            .set_style(self.pane, "pointer-events", value);
    }

    fn toggle_classes(&self, element: NodeId, classes: &ClassList, add: bool) {
        let mut doc = self.services.document.borrow_mut();
        for class in classes.iter() {
            if add {
                doc.add_class(element, class);
            } else {
                doc.remove_class(element, class);
            }
        }
    }

    fn cancel_host_removal(&self) {
        let pending = self.state.borrow_mut().host_removal.take();
        if let Some(id) = pending {
            self.services.scheduler.cancel(id);
        }
    }

    fn detach_content_when_stable(&self) {
        self.cancel_host_removal();
        let weak = self.this.clone();
        let id = self.services.scheduler.when_stable(move || {
            if let Some(overlay) = weak.upgrade() {
                overlay.remove_host_if_empty();
            }
        });
        self.state.borrow_mut().host_removal = Some(id);
    }

    fn remove_host_if_empty(&self) {
        let (disposed, panel_class) = {
            let mut state = self.state.borrow_mut();
            state.host_removal = None;
            (state.disposed, state.config.panel_class.clone())
        };
        if disposed {
            return;
        }
        if !self
            .services
            .document
            .borrow()
            .children_of(self.pane)
            .is_empty()
        {
            // Content is still animating out; look again at the next stable point.
            self.detach_content_when_stable();
            return;
        }
        self.toggle_classes(self.pane, &panel_class, false);
        let parent = self.services.document.borrow_mut().detach(self.host);
        if let Some(parent) = parent {
            self.state.borrow_mut().previous_host_parent = Some(parent);
            tracing::trace!(host = ?self.host, "overlay host removed");
        }
    }
}

// Backdrop lifecycle.
impl OverlayRef {
    fn attach_backdrop(&self) -> Result<(), PortalError> {
        let animations_disabled = self.services.animations_disabled;
        let backdrop_class = self.state.borrow().config.backdrop_class.clone();
        let element = {
            let mut doc = self.services.document.borrow_mut();
            let parent = doc
                .parent_of(self.host)
                .ok_or(PortalError::MissingParent(self.host))?;
            let element = doc.create_element("div");
            doc.add_class(element, classes::BACKDROP);
            if animations_disabled {
                doc.add_class(element, classes::BACKDROP_NOOP_ANIMATION);
            }
            for class in backdrop_class.iter() {
                doc.add_class(element, class);
            }
            if let Err(err) = doc.insert_before(parent, element, Some(self.host)) {
                doc.destroy(element);
                return Err(err.into());
            }
            let weak = self.this.clone();
            doc.add_listener(
                element,
                EventKind::Click,
                Rc::new(move |event: &DomEvent| {
                    if let Some(overlay) = weak.upgrade() {
                        overlay.backdrop_click.emit(event);
                    }
                }),
            );
            element
        };
        self.state.borrow_mut().backdrop = Some(element);

        if animations_disabled {
            self.show_backdrop(element);
            return Ok(());
        }
        let weak = self.this.clone();
        let scheduled = self.services.scheduler.request_animation_frame(move || {
            if let Some(overlay) = weak.upgrade() {
                overlay.show_backdrop(element);
            }
        });
        if scheduled.is_none() {
            self.show_backdrop(element);
        }
        Ok(())
    }

    fn show_backdrop(&self, element: NodeId) {
        {
            let state = self.state.borrow();
            let fading = state.fading.iter().any(|f| f.element == element);
            if state.backdrop != Some(element) || fading {
                return;
            }
        }
        self.services
            .document
            .borrow_mut()
            .add_class(element, classes::BACKDROP_SHOWING);
    }

    /// Fade out and remove the current backdrop.
    ///
    /// The backdrop stops intercepting input immediately and is removed on its
    /// transition end, or after [`BACKDROP_FALLBACK_MS`] if none arrives. With
    /// animations disabled it is removed at once.
    pub fn detach_backdrop(&self) {
        let element = {
            let state = self.state.borrow();
            match state.backdrop {
                Some(element) if !state.fading.iter().any(|f| f.element == element) => element,
                _ => return,
            }
        };
        if self.services.animations_disabled {
            self.dispose_backdrop(element);
            return;
        }

        let weak = self.this.clone();
        let transition_listener = {
            let mut doc = self.services.document.borrow_mut();
            doc.remove_class(element, classes::BACKDROP_SHOWING);
            doc.set_style(element, "pointer-events", "none");
            doc.add_listener(
                element,
                EventKind::TransitionEnd,
                Rc::new(move |_: &DomEvent| {
                    if let Some(overlay) = weak.upgrade() {
                        overlay.dispose_backdrop(element);
                    }
                }),
            )
        };
        let weak = self.this.clone();
        let timer = self
            .services
            .scheduler
            .set_timeout(BACKDROP_FALLBACK_MS, move || {
                if let Some(overlay) = weak.upgrade() {
                    overlay.dispose_backdrop(element);
                }
            });
        self.state.borrow_mut().fading.push(FadingBackdrop {
            element,
            timer,
            transition_listener,
        });
        tracing::trace!(host = ?self.host, backdrop = ?element, "backdrop fading out");
    }

    /// Remove `element` now. Safe to call for a backdrop that is already gone.
    fn dispose_backdrop(&self, element: NodeId) {
        let fading = {
            let mut state = self.state.borrow_mut();
            state
                .fading
                .iter()
                .position(|f| f.element == element)
                .map(|at| state.fading.remove(at))
        };
        if let Some(fading) = fading {
            self.services.scheduler.cancel(fading.timer);
            if let Some(listener) = fading.transition_listener {
                self.services
                    .document
                    .borrow_mut()
                    .remove_listener(element, listener);
            }
        }
        self.services.document.borrow_mut().destroy(element);
        let mut state = self.state.borrow_mut();
        // A newer attach may already have installed a replacement.
        if state.backdrop == Some(element) {
            state.backdrop = None;
            tracing::trace!(host = ?self.host, backdrop = ?element, "backdrop removed");
        } else {
            tracing::trace!(backdrop = ?element, "stale backdrop removed");
        }
    }

    fn dispose_backdrops(&self) {
        let elements: Vec<NodeId> = {
            let state = self.state.borrow();
            state
                .backdrop
                .into_iter()
                .chain(state.fading.iter().map(|f| f.element))
                .collect()
        };
        for element in elements {
            self.dispose_backdrop(element);
        }
    }
}
