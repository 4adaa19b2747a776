// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Class names the overlay system writes to the document.

/// The element all overlay hosts live in.
pub const CONTAINER: &str = "overlay-container";
/// Each overlay's pane.
pub const PANE: &str = "overlay-pane";
/// Every backdrop.
pub const BACKDROP: &str = "overlay-backdrop";
/// Present while a backdrop is shown; its removal starts the fade-out.
pub const BACKDROP_SHOWING: &str = "overlay-backdrop-showing";
/// Marks backdrops of overlays with animations disabled.
pub const BACKDROP_NOOP_ANIMATION: &str = "overlay-backdrop-noop-animation";
/// Default configured backdrop class.
pub const DARK_BACKDROP: &str = "overlay-dark-backdrop";
/// Added to `body` by [`crate::BlockScrollStrategy`].
pub const SCROLL_BLOCK: &str = "overlay-scroll-block";
