// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Overlay configuration.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::classes;
use crate::strategy::{NoopScrollStrategy, PositionStrategy, ScrollStrategy};

/// A CSS length: a pixel count or a pre-formatted value such as `"50%"`.
#[derive(Clone, Debug, PartialEq)]
pub enum Dimension {
    /// Pixels.
    Px(f64),
    /// Used verbatim.
    Css(String),
}

impl From<f64> for Dimension {
    fn from(px: f64) -> Self {
        Self::Px(px)
    }
}

impl From<&str> for Dimension {
    fn from(css: &str) -> Self {
        Self::Css(css.to_string())
    }
}

impl From<String> for Dimension {
    fn from(css: String) -> Self {
        Self::Css(css)
    }
}

/// Format a dimension for a style property; `None` yields the empty string,
/// which clears the property.
///
/// ```
/// use understory_overlay::{coerce_css_pixel_value, Dimension};
///
/// assert_eq!(coerce_css_pixel_value(Some(&Dimension::Px(120.0))), "120px");
/// assert_eq!(coerce_css_pixel_value(Some(&"80vh".into())), "80vh");
/// assert_eq!(coerce_css_pixel_value(None), "");
/// ```
pub fn coerce_css_pixel_value(value: Option<&Dimension>) -> String {
    match value {
        None => String::new(),
        Some(Dimension::Px(px)) => format!("{px}px"),
        Some(Dimension::Css(css)) => css.clone(),
    }
}

/// One or more class names. Empty names are dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassList(SmallVec<[String; 2]>);

impl ClassList {
    /// No classes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if there are no classes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The class names in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<&str> for ClassList {
    fn from(class: &str) -> Self {
        Self::from_iter([class])
    }
}

impl<'a> FromIterator<&'a str> for ClassList {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

impl<const N: usize> From<[&str; N]> for ClassList {
    fn from(classes: [&str; N]) -> Self {
        Self::from_iter(classes)
    }
}

/// Layout direction written to the host's `dir` attribute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    /// Left to right.
    #[default]
    Ltr,
    /// Right to left.
    Rtl,
}

impl Direction {
    /// The attribute value.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ltr => "ltr",
            Self::Rtl => "rtl",
        }
    }
}

/// Where an overlay reads its direction from.
#[derive(Clone, Debug)]
pub enum DirectionSource {
    /// A fixed direction.
    Fixed(Direction),
    /// A shared, changeable direction; read whenever the overlay applies it.
    Live(Rc<Cell<Direction>>),
}

impl Default for DirectionSource {
    fn default() -> Self {
        Self::Fixed(Direction::Ltr)
    }
}

impl DirectionSource {
    /// The current direction.
    pub fn value(&self) -> Direction {
        match self {
            Self::Fixed(dir) => *dir,
            Self::Live(dir) => dir.get(),
        }
    }
}

impl From<Direction> for DirectionSource {
    fn from(dir: Direction) -> Self {
        Self::Fixed(dir)
    }
}

/// Pane size bounds. `None` leaves a property unset.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverlaySizeConfig {
    /// `width`.
    pub width: Option<Dimension>,
    /// `height`.
    pub height: Option<Dimension>,
    /// `min-width`.
    pub min_width: Option<Dimension>,
    /// `min-height`.
    pub min_height: Option<Dimension>,
    /// `max-width`.
    pub max_width: Option<Dimension>,
    /// `max-height`.
    pub max_height: Option<Dimension>,
}

impl OverlaySizeConfig {
    /// Overwrite the fields `update` sets; keep the rest.
    pub fn merge(&mut self, update: Self) {
        let Self {
            width,
            height,
            min_width,
            min_height,
            max_width,
            max_height,
        } = update;
        for (slot, value) in [
            (&mut self.width, width),
            (&mut self.height, height),
            (&mut self.min_width, min_width),
            (&mut self.min_height, min_height),
            (&mut self.max_width, max_width),
            (&mut self.max_height, max_height),
        ] {
            if value.is_some() {
                *slot = value;
            }
        }
    }

    /// Style properties in application order.
    pub(crate) fn styles(&self) -> [(&'static str, String); 6] {
        [
            ("width", coerce_css_pixel_value(self.width.as_ref())),
            ("height", coerce_css_pixel_value(self.height.as_ref())),
            ("min-width", coerce_css_pixel_value(self.min_width.as_ref())),
            ("min-height", coerce_css_pixel_value(self.min_height.as_ref())),
            ("max-width", coerce_css_pixel_value(self.max_width.as_ref())),
            ("max-height", coerce_css_pixel_value(self.max_height.as_ref())),
        ]
    }
}

/// Configuration for one overlay.
///
/// Fields are public; start from [`OverlayConfig::default`] and use struct
/// update or the chained setters.
///
/// ```
/// use understory_overlay::{Dimension, OverlayConfig};
///
/// let config = OverlayConfig::default()
///     .with_backdrop(true)
///     .panel_class("menu")
///     .width(320.0);
/// assert!(config.has_backdrop);
/// assert_eq!(config.size.width, Some(Dimension::Px(320.0)));
/// ```
#[derive(Clone)]
pub struct OverlayConfig {
    /// Pane size bounds.
    pub size: OverlaySizeConfig,
    /// Show a backdrop behind the pane.
    pub has_backdrop: bool,
    /// Classes added to the backdrop.
    pub backdrop_class: ClassList,
    /// Classes added to the pane while attached.
    pub panel_class: ClassList,
    /// Host direction.
    pub direction: DirectionSource,
    /// Dispose the overlay when the location changes.
    pub dispose_on_navigation: bool,
    /// Places the pane.
    pub position_strategy: Option<Rc<dyn PositionStrategy>>,
    /// Reacts to page scrolling.
    pub scroll_strategy: Option<Rc<dyn ScrollStrategy>>,
}

impl fmt::Debug for OverlayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayConfig")
            .field("size", &self.size)
            .field("has_backdrop", &self.has_backdrop)
            .field("backdrop_class", &self.backdrop_class)
            .field("panel_class", &self.panel_class)
            .field("direction", &self.direction)
            .field("dispose_on_navigation", &self.dispose_on_navigation)
            .field("position_strategy", &self.position_strategy.is_some())
            .field("scroll_strategy", &self.scroll_strategy.is_some())
            .finish()
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            size: OverlaySizeConfig::default(),
            has_backdrop: false,
            backdrop_class: ClassList::from(classes::DARK_BACKDROP),
            panel_class: ClassList::new(),
            direction: DirectionSource::default(),
            dispose_on_navigation: false,
            position_strategy: None,
            scroll_strategy: Some(Rc::new(NoopScrollStrategy)),
        }
    }
}

impl OverlayConfig {
    /// Toggle the backdrop.
    pub fn with_backdrop(mut self, has_backdrop: bool) -> Self {
        self.has_backdrop = has_backdrop;
        self
    }

    /// Replace the backdrop classes.
    pub fn backdrop_class(mut self, classes: impl Into<ClassList>) -> Self {
        self.backdrop_class = classes.into();
        self
    }

    /// Replace the panel classes.
    pub fn panel_class(mut self, classes: impl Into<ClassList>) -> Self {
        self.panel_class = classes.into();
        self
    }

    /// Pane `width`.
    pub fn width(mut self, width: impl Into<Dimension>) -> Self {
        self.size.width = Some(width.into());
        self
    }

    /// Pane `height`.
    pub fn height(mut self, height: impl Into<Dimension>) -> Self {
        self.size.height = Some(height.into());
        self
    }

    /// Host direction.
    pub fn direction(mut self, direction: impl Into<DirectionSource>) -> Self {
        self.direction = direction.into();
        self
    }

    /// Dispose on location changes.
    pub fn dispose_on_navigation(mut self, dispose: bool) -> Self {
        self.dispose_on_navigation = dispose;
        self
    }

    /// Position strategy.
    pub fn position_strategy(mut self, strategy: Rc<dyn PositionStrategy>) -> Self {
        self.position_strategy = Some(strategy);
        self
    }

    /// Scroll strategy.
    pub fn scroll_strategy(mut self, strategy: Rc<dyn ScrollStrategy>) -> Self {
        self.scroll_strategy = Some(strategy);
        self
    }
}
