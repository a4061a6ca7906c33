//! Screen navigation: the route tree, the auth-gated root flow, and the
//! persisted tab selection.

pub mod gate;
pub mod navigator;
pub mod tabs;

pub use gate::{AuthGate, AuthPhase};
pub use navigator::{DetailParams, NavState, NavigationError, Navigator, Route};
pub use tabs::{Tab, TabStore};
