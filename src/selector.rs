//! Which backend serves a fetch.

use crate::throttle::Throttler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Query the primary backend and replace the snapshot. `forced` is set
    /// when nothing is cached yet, in which case the primary budget was not
    /// consulted at all.
    UsePrimary { forced: bool },
    /// Patch the snapshot from the legacy backend.
    UseSecondary,
    /// Serve the snapshot as is.
    UseCache,
}

/// How a fetch could fall back to the legacy backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryRoute {
    /// The legacy payload cannot express this resource.
    Unavailable,
    /// One legacy call per controller to refresh.
    Controllers(u32),
}

/// Picks a backend. Only checks budgets; the caller marks whatever it
/// ends up spending.
///
/// TODO: a first fetch with an empty primary budget is still forced
/// through; revisit whether that should surface a rate-limit error.
pub fn select(
    cached: bool,
    primary: &mut Throttler,
    secondary: &mut Throttler,
    route: SecondaryRoute,
) -> Decision {
    if !cached {
        return Decision::UsePrimary { forced: true };
    }
    if primary.check(1) {
        return Decision::UsePrimary { forced: false };
    }
    match route {
        SecondaryRoute::Controllers(cost) if secondary.check(cost) => Decision::UseSecondary,
        _ => Decision::UseCache,
    }
}
