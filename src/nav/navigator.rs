use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NavigationError {
    #[error("navigator is not ready")]
    NotReady,
    #[error("no route named {0:?} in the mounted navigator")]
    UnknownRoute(String),
    #[error("route {0:?} requires url and name parameters")]
    MissingParams(String),
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// Parameters of the detail screen: which record to show and its title.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DetailParams {
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Signup,
    Home,
    Team,
    Settings,
    PokemonDetails(DetailParams),
}

impl Route {
    pub const DETAILS: &'static str = "PokemonDetails";

    pub fn name(&self) -> &'static str {
        match self {
            Route::Login => "Login",
            Route::Signup => "Signup",
            Route::Home => "Home",
            Route::Team => "Team",
            Route::Settings => "Settings",
            Route::PokemonDetails(_) => Self::DETAILS,
        }
    }

    /// Resolve a route by its external name.
    pub fn from_name(name: &str, params: Option<DetailParams>) -> Result<Self, NavigationError> {
        match name {
            "Login" => Ok(Route::Login),
            "Signup" => Ok(Route::Signup),
            "Home" => Ok(Route::Home),
            "Team" => Ok(Route::Team),
            "Settings" => Ok(Route::Settings),
            Self::DETAILS => params
                .map(Route::PokemonDetails)
                .ok_or_else(|| NavigationError::MissingParams(name.to_string())),
            other => Err(NavigationError::UnknownRoute(other.to_string())),
        }
    }

    fn in_auth_flow(&self) -> bool {
        matches!(self, Route::Login | Route::Signup)
    }
}

// ---------------------------------------------------------------------------
// Route tree
// ---------------------------------------------------------------------------

/// Which flow is mounted and its screen stack (bottom first).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RouteTree {
    #[default]
    Unmounted,
    Unauthenticated(Vec<Route>),
    Authenticated(Vec<Route>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavState {
    pub tree: RouteTree,
}

impl NavState {
    pub fn is_ready(&self) -> bool {
        !matches!(self.tree, RouteTree::Unmounted)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.tree, RouteTree::Authenticated(_))
    }

    /// Names of the root navigator's routes, `None` before anything mounts.
    /// The authenticated flow hangs off a single root route named `Home`.
    pub fn root_routes(&self) -> Option<Vec<&'static str>> {
        match &self.tree {
            RouteTree::Unmounted => None,
            RouteTree::Unauthenticated(stack) => Some(stack.iter().map(Route::name).collect()),
            RouteTree::Authenticated(_) => Some(vec![Route::Home.name()]),
        }
    }

    pub fn stack(&self) -> &[Route] {
        match &self.tree {
            RouteTree::Unmounted => &[],
            RouteTree::Unauthenticated(stack) | RouteTree::Authenticated(stack) => stack,
        }
    }

    pub fn current(&self) -> Option<&Route> {
        self.stack().last()
    }

    /// Apply a navigation. Returns whether the stack changed.
    fn navigate(&mut self, route: Route) -> Result<bool, NavigationError> {
        let stack = match &mut self.tree {
            RouteTree::Unmounted => return Err(NavigationError::NotReady),
            RouteTree::Unauthenticated(stack) if route.in_auth_flow() => stack,
            RouteTree::Authenticated(stack) if !route.in_auth_flow() => stack,
            _ => return Err(NavigationError::UnknownRoute(route.name().to_string())),
        };

        if let Route::PokemonDetails(_) = route {
            return Ok(match stack.last_mut() {
                Some(top) if *top == route => false,
                Some(top @ Route::PokemonDetails(_)) => {
                    *top = route;
                    true
                }
                _ => {
                    stack.push(route);
                    true
                }
            });
        }

        // Navigating to a screen already in the stack returns to it.
        match stack.iter().position(|r| r.name() == route.name()) {
            Some(pos) if pos + 1 == stack.len() => Ok(false),
            Some(pos) => {
                stack.truncate(pos + 1);
                Ok(true)
            }
            None => {
                stack.push(route);
                Ok(true)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Navigator handle
// ---------------------------------------------------------------------------

/// Shared handle to the route tree. Every change is broadcast to
/// subscribers, which is how the event loop and deferred deep links observe
/// navigation.
#[derive(Debug, Clone)]
pub struct Navigator {
    state: Arc<watch::Sender<NavState>>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(NavState::default());
        Self {
            state: Arc::new(sender),
        }
    }

    pub fn snapshot(&self) -> NavState {
        self.state.borrow().clone()
    }

    pub fn current(&self) -> Option<Route> {
        self.state.borrow().current().cloned()
    }

    pub fn is_ready(&self) -> bool {
        self.state.borrow().is_ready()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn root_routes(&self) -> Option<Vec<&'static str>> {
        self.state.borrow().root_routes()
    }

    /// Receiver that wakes on every subsequent change.
    pub fn subscribe(&self) -> watch::Receiver<NavState> {
        self.state.subscribe()
    }

    /// Mount the login/signup flow, discarding whatever was mounted.
    pub fn mount_unauthenticated(&self) {
        tracing::debug!("mounting unauthenticated flow");
        self.state.send_replace(NavState {
            tree: RouteTree::Unauthenticated(vec![Route::Login]),
        });
    }

    /// Mount the tabbed app rooted at the catalog screen.
    pub fn mount_authenticated(&self) {
        tracing::debug!("mounting authenticated flow");
        self.state.send_replace(NavState {
            tree: RouteTree::Authenticated(vec![Route::Home]),
        });
    }

    pub fn navigate(&self, route: Route) -> Result<(), NavigationError> {
        let mut outcome = Ok(());
        self.state.send_if_modified(|state| match state.navigate(route) {
            Ok(changed) => changed,
            Err(e) => {
                outcome = Err(e);
                false
            }
        });
        outcome
    }

    /// Navigate by external route name, as deep links do.
    pub fn navigate_named(
        &self,
        name: &str,
        params: Option<DetailParams>,
    ) -> Result<(), NavigationError> {
        self.navigate(Route::from_name(name, params)?)
    }

    /// Pop the top screen. The root screen is never popped.
    pub fn go_back(&self) -> bool {
        self.state.send_if_modified(|state| match &mut state.tree {
            RouteTree::Unauthenticated(stack) | RouteTree::Authenticated(stack)
                if stack.len() > 1 =>
            {
                stack.pop();
                true
            }
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pikachu() -> DetailParams {
        DetailParams {
            url: "https://pokeapi.co/api/v2/pokemon/25/".into(),
            name: "pikachu".into(),
        }
    }

    fn names(nav: &Navigator) -> Vec<&'static str> {
        nav.snapshot().stack().iter().map(Route::name).collect()
    }

    #[test]
    fn not_ready_until_mounted() {
        let nav = Navigator::new();
        assert!(!nav.is_ready());
        assert_eq!(nav.root_routes(), None);
        assert_eq!(nav.navigate(Route::Home), Err(NavigationError::NotReady));

        nav.mount_unauthenticated();
        assert!(nav.is_ready());
        assert_eq!(nav.root_routes(), Some(vec!["Login"]));
    }

    #[test]
    fn authenticated_root_is_home() {
        let nav = Navigator::new();
        nav.mount_authenticated();
        assert!(nav.is_authenticated());
        assert_eq!(nav.root_routes(), Some(vec!["Home"]));

        nav.navigate(Route::Team).unwrap();
        assert_eq!(nav.root_routes(), Some(vec!["Home"]));
        assert_eq!(nav.current(), Some(Route::Team));
    }

    #[test]
    fn routes_outside_the_mounted_flow_are_unknown() {
        let nav = Navigator::new();
        nav.mount_unauthenticated();
        assert_eq!(
            nav.navigate(Route::Team),
            Err(NavigationError::UnknownRoute("Team".into()))
        );
        nav.navigate(Route::Signup).unwrap();
        assert_eq!(nav.root_routes(), Some(vec!["Login", "Signup"]));

        nav.mount_authenticated();
        assert_eq!(
            nav.navigate(Route::Login),
            Err(NavigationError::UnknownRoute("Login".into()))
        );
    }

    #[test]
    fn navigating_to_existing_screen_returns_to_it() {
        let nav = Navigator::new();
        nav.mount_authenticated();
        nav.navigate(Route::Team).unwrap();
        nav.navigate(Route::Settings).unwrap();
        nav.navigate(Route::Home).unwrap();
        assert_eq!(names(&nav), vec!["Home"]);
    }

    #[test]
    fn details_replace_details_on_top() {
        let nav = Navigator::new();
        nav.mount_authenticated();
        nav.navigate(Route::PokemonDetails(pikachu())).unwrap();
        let raichu = DetailParams {
            url: "https://pokeapi.co/api/v2/pokemon/26/".into(),
            name: "raichu".into(),
        };
        nav.navigate(Route::PokemonDetails(raichu.clone())).unwrap();
        assert_eq!(names(&nav), vec!["Home", "PokemonDetails"]);
        assert_eq!(nav.current(), Some(Route::PokemonDetails(raichu)));

        assert!(nav.go_back());
        assert!(!nav.go_back());
        assert_eq!(nav.current(), Some(Route::Home));
    }

    #[test]
    fn named_navigation_validates_params() {
        let nav = Navigator::new();
        nav.mount_authenticated();
        assert_eq!(
            nav.navigate_named("PokemonDetails", None),
            Err(NavigationError::MissingParams("PokemonDetails".into()))
        );
        assert_eq!(
            nav.navigate_named("Pokedex", None),
            Err(NavigationError::UnknownRoute("Pokedex".into()))
        );
        nav.navigate_named("PokemonDetails", Some(pikachu())).unwrap();
        assert_eq!(nav.current(), Some(Route::PokemonDetails(pikachu())));
    }

    #[tokio::test]
    async fn subscribers_see_changes_but_not_no_ops() {
        let nav = Navigator::new();
        let mut rx = nav.subscribe();
        nav.mount_authenticated();
        assert!(rx.has_changed().unwrap());
        let _ = rx.borrow_and_update();

        nav.navigate(Route::Home).unwrap();
        assert!(!rx.has_changed().unwrap());

        nav.navigate(Route::Settings).unwrap();
        assert!(rx.has_changed().unwrap());
    }
}
