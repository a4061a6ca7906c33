use crate::nav::navigator::Navigator;
use crate::nav::tabs::Tab;

/// Which root flow is mounted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthPhase {
    /// No auth event seen yet; nothing is rendered.
    #[default]
    Initializing,
    Unauthenticated,
    Authenticated,
}

/// Picks the root flow from auth change events. It never polls: the phase
/// only moves when [`AuthGate::on_auth_change`] is called.
#[derive(Debug, Default)]
pub struct AuthGate {
    phase: AuthPhase,
}

impl AuthGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> AuthPhase {
        self.phase
    }

    /// Apply an auth change. Remounts the navigator when the phase flips and
    /// returns whether it did. Repeated events for the same phase (token
    /// refreshes, profile updates) leave the mounted tree alone.
    ///
    /// The authenticated flow starts on the catalog and then moves to
    /// `active_tab` if that is somewhere else.
    pub fn on_auth_change(&mut self, signed_in: bool, navigator: &Navigator, active_tab: Tab) -> bool {
        let next = if signed_in {
            AuthPhase::Authenticated
        } else {
            AuthPhase::Unauthenticated
        };
        if next == self.phase {
            return false;
        }
        tracing::info!(from = ?self.phase, to = ?next, "auth phase changed");
        self.phase = next;

        match next {
            AuthPhase::Authenticated => {
                navigator.mount_authenticated();
                if active_tab != Tab::Catalog
                    && let Err(e) = navigator.navigate(active_tab.route())
                {
                    tracing::warn!(tab = %active_tab, error = %e, "failed to restore tab");
                }
            }
            AuthPhase::Unauthenticated => navigator.mount_unauthenticated(),
            AuthPhase::Initializing => {}
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::navigator::Route;

    #[test]
    fn starts_initializing_with_nothing_mounted() {
        let gate = AuthGate::new();
        let nav = Navigator::new();
        assert_eq!(gate.phase(), AuthPhase::Initializing);
        assert!(!nav.is_ready());
    }

    #[test]
    fn signed_out_startup_event_mounts_login() {
        let mut gate = AuthGate::new();
        let nav = Navigator::new();
        assert!(gate.on_auth_change(false, &nav, Tab::Catalog));
        assert_eq!(gate.phase(), AuthPhase::Unauthenticated);
        assert_eq!(nav.current(), Some(Route::Login));
    }

    #[test]
    fn sign_in_mounts_tabs_and_restores_tab() {
        let mut gate = AuthGate::new();
        let nav = Navigator::new();
        gate.on_auth_change(false, &nav, Tab::Team);
        assert!(gate.on_auth_change(true, &nav, Tab::Team));

        assert!(nav.is_authenticated());
        assert_eq!(nav.root_routes(), Some(vec!["Home"]));
        assert_eq!(nav.current(), Some(Route::Team));
    }

    #[test]
    fn repeated_phase_does_not_remount() {
        let mut gate = AuthGate::new();
        let nav = Navigator::new();
        gate.on_auth_change(true, &nav, Tab::Catalog);
        nav.navigate(Route::Settings).unwrap();

        assert!(!gate.on_auth_change(true, &nav, Tab::Catalog));
        assert_eq!(nav.current(), Some(Route::Settings));
    }

    #[test]
    fn sign_out_returns_to_login() {
        let mut gate = AuthGate::new();
        let nav = Navigator::new();
        gate.on_auth_change(true, &nav, Tab::Catalog);
        assert!(gate.on_auth_change(false, &nav, Tab::Catalog));
        assert!(!nav.is_authenticated());
        assert_eq!(nav.current(), Some(Route::Login));
    }
}
