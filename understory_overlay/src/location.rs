// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use understory_portal::{EventStream, Subject};

/// The current location and a stream of changes to it.
///
/// Overlays configured with `dispose_on_navigation` subscribe while attached.
#[derive(Clone)]
pub struct Location {
    path: Rc<RefCell<String>>,
    changes: Subject<String>,
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Location")
            .field("path", &*self.path.borrow())
            .field("observers", &self.changes.observer_count())
            .finish()
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Location {
    /// Start at `path`.
    pub fn new(path: &str) -> Self {
        Self {
            path: Rc::new(RefCell::new(path.to_string())),
            changes: Subject::new(),
        }
    }

    /// The current path.
    pub fn path(&self) -> String {
        self.path.borrow().clone()
    }

    /// Move to `path` and notify observers.
    pub fn navigate(&self, path: &str) {
        *self.path.borrow_mut() = path.to_string();
        tracing::trace!(path, "location changed");
        self.changes.emit(&path.to_string());
    }

    /// Future location changes.
    pub fn changes(&self) -> EventStream<String> {
        self.changes.stream()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigate_updates_path_and_notifies() {
        let location = Location::default();
        assert_eq!(location.path(), "/");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let _sub = location
            .changes()
            .subscribe(move |p: &String| log.borrow_mut().push(p.clone()));
        location.clone().navigate("/a");
        assert_eq!(location.path(), "/a");
        assert_eq!(*seen.borrow(), ["/a"]);
    }
}
