// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use understory_dom::{DomError, NodeId};

use crate::view::ComponentType;

/// Protocol violations reported by portals and outlets.
///
/// Every variant is a caller bug. A failed operation leaves the portal and the
/// outlet in the state they were in before the call.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PortalError {
    /// The portal is already attached to an outlet.
    #[error("cannot attach a portal that is already attached to an outlet")]
    PortalAlreadyAttached,
    /// The outlet already holds a portal.
    #[error("the outlet already has a portal attached")]
    OutletAlreadyAttached,
    /// The portal is not attached to any outlet.
    #[error("cannot detach a portal that is not attached to an outlet")]
    NotAttached,
    /// The outlet has been disposed.
    #[error("cannot attach to an outlet that has been disposed")]
    OutletDisposed,
    /// Neither the portal nor the outlet supplied a component factory resolver.
    #[error("no component factory resolver available for {0}")]
    MissingResolver(ComponentType),
    /// The resolver knows no factory for the component.
    #[error("no component factory registered for {0}")]
    MissingComponentFactory(ComponentType),
    /// Manual component placement needs an application root for change detection.
    #[error("attaching {0} without a view container requires an application root")]
    MissingApplicationRoot(ComponentType),
    /// A DOM portal's node has no parent, so its position cannot be restored.
    #[error("DOM portal node {0:?} has no parent")]
    MissingParent(NodeId),
    /// A document operation failed.
    #[error(transparent)]
    Dom(#[from] DomError),
}
