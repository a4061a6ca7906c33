//! Delivers deep-link intents to the navigator once it can take them.
//!
//! An intent can arrive before the navigator has mounted anything (cold
//! start) or while only the login flow is mounted. Each delivery runs as its
//! own task that:
//!
//! 1. waits for the navigator to become ready, retrying with backoff;
//! 2. for detail intents, waits for the authenticated flow to mount, lets it
//!    settle, then navigates;
//! 3. for any other screen, navigates by name and logs failures.
//!
//! Every delivery navigates at most once, and all of them stop when the
//! app's cancellation token fires.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::nav::{NavState, NavigationError, Navigator, Route};
use crate::notify::intent::NavigationIntent;

/// The navigator operations the reconciler needs.
pub trait NavigationTarget: Clone + Send + Sync + 'static {
    fn is_ready(&self) -> bool;
    fn is_authenticated(&self) -> bool;
    fn navigate(&self, route: Route) -> Result<(), NavigationError>;
    fn navigate_named(&self, screen: &str) -> Result<(), NavigationError>;
    fn subscribe(&self) -> watch::Receiver<NavState>;
}

impl NavigationTarget for Navigator {
    fn is_ready(&self) -> bool {
        Navigator::is_ready(self)
    }

    fn is_authenticated(&self) -> bool {
        Navigator::is_authenticated(self)
    }

    fn navigate(&self, route: Route) -> Result<(), NavigationError> {
        Navigator::navigate(self, route)
    }

    fn navigate_named(&self, screen: &str) -> Result<(), NavigationError> {
        Navigator::navigate_named(self, screen, None)
    }

    fn subscribe(&self) -> watch::Receiver<NavState> {
        Navigator::subscribe(self)
    }
}

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Exponential backoff for the readiness wait.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1600),
            factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Successive retry delays, growing by `factor` up to `max_delay`.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let factor = if self.factor.is_finite() {
            self.factor.clamp(1.0, 10.0)
        } else {
            1.0
        };
        let max = self.max_delay.max(self.initial_delay);
        std::iter::successors(Some(self.initial_delay), move |d| {
            Some(d.mul_f64(factor).min(max))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcilerConfig {
    pub readiness: RetryPolicy,
    /// Pause between the authenticated flow mounting and the navigation,
    /// so the freshly mounted flow finishes its own initial navigation.
    pub settle_delay: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            readiness: RetryPolicy::default(),
            settle_delay: Duration::from_millis(300),
        }
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Navigated,
    Failed(NavigationError),
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct DeepLinkReconciler<N> {
    navigator: N,
    config: ReconcilerConfig,
    cancel: CancellationToken,
}

impl<N: NavigationTarget> DeepLinkReconciler<N> {
    pub fn new(navigator: N, config: ReconcilerConfig, cancel: CancellationToken) -> Self {
        Self {
            navigator,
            config,
            cancel,
        }
    }

    /// Spawn the delivery of one intent.
    pub fn deliver(&self, intent: NavigationIntent) -> JoinHandle<Outcome> {
        let this = self.clone();
        tokio::spawn(async move {
            let screen = intent.screen().to_string();
            let outcome = this.run(intent).await;
            match &outcome {
                Outcome::Navigated => tracing::info!(%screen, "deep link delivered"),
                Outcome::Failed(e) => tracing::error!(%screen, error = %e, "navigation error"),
                Outcome::Cancelled => tracing::debug!(%screen, "deep link abandoned"),
            }
            outcome
        })
    }

    async fn run(&self, intent: NavigationIntent) -> Outcome {
        if !self.wait_until_ready().await {
            return Outcome::Cancelled;
        }

        match intent {
            NavigationIntent::PokemonDetails(params) => {
                let route = Route::PokemonDetails(params);
                if self.navigator.is_authenticated() {
                    return self.navigate(route);
                }
                tracing::debug!("deferring detail deep link until signed in");
                if !self.wait_until_authenticated().await || !self.pause(self.config.settle_delay).await {
                    return Outcome::Cancelled;
                }
                self.navigate(route)
            }
            NavigationIntent::Screen(screen) => match self.navigator.navigate_named(&screen) {
                Ok(()) => Outcome::Navigated,
                Err(e) => Outcome::Failed(e),
            },
        }
    }

    fn navigate(&self, route: Route) -> Outcome {
        match self.navigator.navigate(route) {
            Ok(()) => Outcome::Navigated,
            Err(e) => Outcome::Failed(e),
        }
    }

    async fn wait_until_ready(&self) -> bool {
        let mut delays = self.config.readiness.delays();
        while !self.navigator.is_ready() {
            let delay = delays.next().unwrap_or(self.config.readiness.max_delay);
            tracing::trace!(?delay, "navigator not ready, retrying");
            if !self.pause(delay).await {
                return false;
            }
        }
        true
    }

    /// One-shot listener: resolves on the first state where the
    /// authenticated flow is mounted and then drops its subscription.
    async fn wait_until_authenticated(&self) -> bool {
        let mut rx = self.navigator.subscribe();
        loop {
            if rx.borrow_and_update().is_authenticated() {
                return true;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                changed = rx.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    /// Sleep unless cancelled first. Returns `false` on cancellation.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::nav::DetailParams;

    /// Navigator wrapper that records every navigate call.
    #[derive(Clone)]
    struct Recording {
        inner: Navigator,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Recording {
        fn new() -> Self {
            Self {
                inner: Navigator::new(),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl NavigationTarget for Recording {
        fn is_ready(&self) -> bool {
            self.inner.is_ready()
        }

        fn is_authenticated(&self) -> bool {
            self.inner.is_authenticated()
        }

        fn navigate(&self, route: Route) -> Result<(), NavigationError> {
            self.calls.lock().unwrap().push(route.name().to_string());
            self.inner.navigate(route)
        }

        fn navigate_named(&self, screen: &str) -> Result<(), NavigationError> {
            self.calls.lock().unwrap().push(screen.to_string());
            self.inner.navigate_named(screen, None)
        }

        fn subscribe(&self) -> watch::Receiver<NavState> {
            self.inner.subscribe()
        }
    }

    fn pikachu() -> NavigationIntent {
        NavigationIntent::PokemonDetails(DetailParams {
            url: "https://pokeapi.co/api/v2/pokemon/25/".into(),
            name: "pikachu".into(),
        })
    }

    fn reconciler(nav: &Recording) -> (DeepLinkReconciler<Recording>, CancellationToken) {
        let cancel = CancellationToken::new();
        (
            DeepLinkReconciler::new(nav.clone(), ReconcilerConfig::default(), cancel.clone()),
            cancel,
        )
    }

    #[test]
    fn backoff_grows_to_cap() {
        let delays: Vec<u64> = RetryPolicy::default()
            .delays()
            .take(7)
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1600, 1600, 1600]);
    }

    #[test]
    fn fixed_interval_when_factor_is_one() {
        let policy = RetryPolicy {
            factor: 1.0,
            ..RetryPolicy::default()
        };
        assert!(policy.delays().take(5).all(|d| d == Duration::from_millis(100)));
    }

    #[tokio::test(start_paused = true)]
    async fn authenticated_navigator_gets_exactly_one_immediate_navigation() {
        let nav = Recording::new();
        nav.inner.mount_authenticated();
        let (reconciler, _cancel) = reconciler(&nav);

        let start = tokio::time::Instant::now();
        let outcome = reconciler.deliver(pikachu()).await.unwrap();

        assert_eq!(outcome, Outcome::Navigated);
        assert_eq!(nav.calls(), vec!["PokemonDetails"]);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(nav.inner.current().map(|r| r.name()), Some("PokemonDetails"));
    }

    #[tokio::test(start_paused = true)]
    async fn unauthenticated_navigator_defers_until_sign_in_then_fires_once() {
        let nav = Recording::new();
        nav.inner.mount_unauthenticated();
        let (reconciler, _cancel) = reconciler(&nav);

        let handle = reconciler.deliver(pikachu());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(nav.calls().is_empty());

        let signed_in_at = tokio::time::Instant::now();
        nav.inner.mount_authenticated();
        assert_eq!(handle.await.unwrap(), Outcome::Navigated);
        assert!(signed_in_at.elapsed() >= Duration::from_millis(300));
        assert_eq!(nav.calls(), vec!["PokemonDetails"]);

        // Later auth flips must not navigate again.
        nav.inner.mount_unauthenticated();
        nav.inner.mount_authenticated();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(nav.calls(), vec!["PokemonDetails"]);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_navigator_to_become_ready() {
        let nav = Recording::new();
        let (reconciler, _cancel) = reconciler(&nav);

        let handle = reconciler.deliver(NavigationIntent::Screen("Team".into()));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(nav.calls().is_empty());

        nav.inner.mount_authenticated();
        assert_eq!(handle.await.unwrap(), Outcome::Navigated);
        assert_eq!(nav.inner.current(), Some(Route::Team));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_pending_delivery() {
        let nav = Recording::new();
        let (reconciler, cancel) = reconciler(&nav);

        let handle = reconciler.deliver(pikachu());
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        assert_eq!(handle.await.unwrap(), Outcome::Cancelled);
        nav.inner.mount_authenticated();
        assert!(nav.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_auth_wait() {
        let nav = Recording::new();
        nav.inner.mount_unauthenticated();
        let (reconciler, cancel) = reconciler(&nav);

        let handle = reconciler.deliver(pikachu());
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        assert_eq!(handle.await.unwrap(), Outcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_screen_fails_without_panicking() {
        let nav = Recording::new();
        nav.inner.mount_authenticated();
        let (reconciler, _cancel) = reconciler(&nav);

        let outcome = reconciler
            .deliver(NavigationIntent::Screen("Pokedex".into()))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Failed(NavigationError::UnknownRoute("Pokedex".into()))
        );
        assert_eq!(nav.inner.current(), Some(Route::Home));
    }
}
