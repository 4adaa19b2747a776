// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A deterministic model of the event loop overlays defer work onto.
//!
//! Nothing runs until the embedder turns the loop:
//!
//! - [`Scheduler::run_microtasks`] drains microtasks, then runs the watchers
//!   registered with [`Scheduler::when_stable`] once, then drains any
//!   microtasks those queued. A watcher registered while watchers run waits for
//!   the next stable point.
//! - [`Scheduler::render_frame`] runs animation-frame callbacks, then
//!   after-render hooks, then a microtask turn.
//! - [`Scheduler::advance`] moves the virtual clock and fires due timers in due
//!   order, each followed by a microtask turn.
//!
//! Callbacks never run while the scheduler is borrowed, so they may schedule or
//! cancel freely.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// Handle to a scheduled callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

type Task = Box<dyn FnOnce()>;

struct Timer {
    id: TaskId,
    due: u64,
    task: Task,
}

struct State {
    next_id: u64,
    now: u64,
    frames_available: bool,
    microtasks: VecDeque<(TaskId, Task)>,
    frames: Vec<(TaskId, Task)>,
    after_render: Vec<(TaskId, Task)>,
    stable: Vec<(TaskId, Task)>,
    timers: Vec<Timer>,
}

impl State {
    fn id(&mut self) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        id
    }
}

/// Shared handle to the event-loop model. Clones refer to the same loop.
#[derive(Clone)]
pub struct Scheduler {
    state: Rc<RefCell<State>>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.state.borrow();
        f.debug_struct("Scheduler")
            .field("now", &s.now)
            .field("frames_available", &s.frames_available)
            .field("microtasks", &s.microtasks.len())
            .field("frames", &s.frames.len())
            .field("after_render", &s.after_render.len())
            .field("stable", &s.stable.len())
            .field("timers", &s.timers.len())
            .finish()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// An idle loop at time zero with animation frames available.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                next_id: 1,
                now: 0,
                frames_available: true,
                microtasks: VecDeque::new(),
                frames: Vec::new(),
                after_render: Vec::new(),
                stable: Vec::new(),
                timers: Vec::new(),
            })),
        }
    }

    /// A loop without animation-frame support.
    pub fn without_animation_frames() -> Self {
        let scheduler = Self::new();
        scheduler.state.borrow_mut().frames_available = false;
        scheduler
    }

    /// Returns true if [`Scheduler::request_animation_frame`] can schedule.
    pub fn animation_frames_available(&self) -> bool {
        self.state.borrow().frames_available
    }

    /// Current virtual time in milliseconds.
    pub fn now(&self) -> u64 {
        self.state.borrow().now
    }

    /// Run `f` at the next microtask turn.
    pub fn queue_microtask(&self, f: impl FnOnce() + 'static) -> TaskId {
        let mut s = self.state.borrow_mut();
        let id = s.id();
        s.microtasks.push_back((id, Box::new(f)));
        id
    }

    /// Run `f` at the start of the next rendered frame.
    ///
    /// Returns `None` when frames are unavailable; nothing is scheduled.
    pub fn request_animation_frame(&self, f: impl FnOnce() + 'static) -> Option<TaskId> {
        let mut s = self.state.borrow_mut();
        if !s.frames_available {
            return None;
        }
        let id = s.id();
        s.frames.push((id, Box::new(f)));
        Some(id)
    }

    /// Run `f` once the next frame has been laid out.
    pub fn after_next_render(&self, f: impl FnOnce() + 'static) -> TaskId {
        let mut s = self.state.borrow_mut();
        let id = s.id();
        s.after_render.push((id, Box::new(f)));
        id
    }

    /// Run `f` after `delay_ms` of virtual time.
    pub fn set_timeout(&self, delay_ms: u64, f: impl FnOnce() + 'static) -> TaskId {
        let mut s = self.state.borrow_mut();
        let id = s.id();
        let due = s.now.saturating_add(delay_ms);
        s.timers.push(Timer {
            id,
            due,
            task: Box::new(f),
        });
        id
    }

    /// Run `f` at the next stable point, once the microtask queue is empty.
    pub fn when_stable(&self, f: impl FnOnce() + 'static) -> TaskId {
        let mut s = self.state.borrow_mut();
        let id = s.id();
        s.stable.push((id, Box::new(f)));
        id
    }

    /// Drop a pending callback. Returns false if it already ran or never existed.
    pub fn cancel(&self, id: TaskId) -> bool {
        // Tasks are dropped outside the borrow.
        let removed: Option<Task> = {
            let mut guard = self.state.borrow_mut();
            let s = &mut *guard;
            if let Some(at) = s.microtasks.iter().position(|(t, _)| *t == id) {
                s.microtasks.remove(at).map(|(_, task)| task)
            } else if let Some(at) = s.timers.iter().position(|t| t.id == id) {
                Some(s.timers.remove(at).task)
            } else {
                [&mut s.frames, &mut s.after_render, &mut s.stable]
                    .into_iter()
                    .find_map(|queue| {
                        let at = queue.iter().position(|(t, _)| *t == id)?;
                        Some(queue.remove(at).1)
                    })
            }
        };
        removed.is_some()
    }

    /// Returns true if `id` is still waiting to run.
    pub fn is_pending(&self, id: TaskId) -> bool {
        let s = self.state.borrow();
        s.microtasks.iter().any(|(t, _)| *t == id)
            || s.frames.iter().any(|(t, _)| *t == id)
            || s.after_render.iter().any(|(t, _)| *t == id)
            || s.stable.iter().any(|(t, _)| *t == id)
            || s.timers.iter().any(|t| t.id == id)
    }

    /// Number of timers not yet fired.
    pub fn pending_timers(&self) -> usize {
        self.state.borrow().timers.len()
    }

    /// Drain microtasks, run stable watchers once, and drain again.
    pub fn run_microtasks(&self) {
        self.drain_microtasks();
        let watchers = core::mem::take(&mut self.state.borrow_mut().stable);
        if watchers.is_empty() {
            return;
        }
        for (_, task) in watchers {
            task();
        }
        self.drain_microtasks();
    }

    fn drain_microtasks(&self) {
        loop {
            let next = self.state.borrow_mut().microtasks.pop_front();
            let Some((_, task)) = next else {
                break;
            };
            task();
        }
    }

    /// Render one frame: animation frames, then after-render hooks, then microtasks.
    pub fn render_frame(&self) {
        let frames = core::mem::take(&mut self.state.borrow_mut().frames);
        for (_, task) in frames {
            task();
        }
        let hooks = core::mem::take(&mut self.state.borrow_mut().after_render);
        for (_, task) in hooks {
            task();
        }
        self.run_microtasks();
    }

    /// Advance virtual time by `ms`, firing every timer that falls due.
    pub fn advance(&self, ms: u64) {
        let target = self.state.borrow().now.saturating_add(ms);
        loop {
            let next = {
                let mut s = self.state.borrow_mut();
                let due = s
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= target)
                    .min_by_key(|(_, t)| (t.due, t.id))
                    .map(|(at, _)| at);
                due.map(|at| {
                    let timer = s.timers.remove(at);
                    s.now = s.now.max(timer.due);
                    timer.task
                })
            };
            let Some(task) = next else {
                break;
            };
            task();
            self.run_microtasks();
        }
        self.state.borrow_mut().now = target;
    }
}
