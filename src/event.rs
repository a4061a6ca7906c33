use color_eyre::eyre::OptionExt;
use crossterm::event::Event as CrosstermEvent;
use futures::{FutureExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::types::{Page, PokemonDetails, Species};
use crate::auth::AuthUser;
use crate::nav::{DetailParams, Tab};
use crate::notify::RemoteMessage;

/// Representation of all possible events.
#[derive(Clone, Debug)]
pub enum Event {
    /// An event that is emitted on a regular schedule.
    Tick,
    /// Crossterm events from the terminal.
    Crossterm(CrosstermEvent),
    /// Application-level events.
    App(Box<AppEvent>),
}

/// Which auth operation failed, for the alert text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthAction {
    SignIn,
    GoogleSignIn,
    SignUp,
    SignOut,
}

impl AuthAction {
    pub fn failure_prefix(self) -> &'static str {
        match self {
            AuthAction::SignIn => "Sign in failed: ",
            AuthAction::GoogleSignIn => "Google Sign-In failed: ",
            AuthAction::SignUp => "Sign up failed: ",
            AuthAction::SignOut => "Sign out failed: ",
        }
    }
}

/// Application events for navigation, API requests, and API responses.
#[derive(Clone, Debug)]
pub enum AppEvent {
    // -- Navigation --
    Quit,
    SelectTab(Tab),
    OpenDetails(DetailParams),
    Back,
    /// The navigator's route tree changed.
    RouteChanged,

    // -- API request triggers --
    FetchPage {
        offset: u32,
        /// Background revalidation of a page that is already shown.
        refresh: bool,
    },
    FetchDetail {
        url: String,
    },
    FetchSpecies {
        url: String,
    },

    // -- API response events (sent from async tasks back to the event loop) --
    PageLoaded {
        offset: u32,
        refresh: bool,
        result: ApiResult<Page>,
    },
    DetailLoaded {
        url: String,
        result: Box<ApiResult<PokemonDetails>>,
    },
    SpeciesLoaded {
        url: String,
        result: ApiResult<Species>,
    },

    // -- Auth --
    AuthChanged(Option<AuthUser>),
    SignIn {
        email: String,
        password: String,
    },
    SignUp {
        email: String,
        password: String,
        confirm_password: String,
    },
    SignInWithGoogle,
    SignOut,
    AuthFailed {
        action: AuthAction,
        message: String,
    },

    // -- Notifications --
    NotificationReceived(RemoteMessage),
    NotificationsUnavailable(String),
}

/// API result type using `Arc<String>` so errors are `Clone`.
pub type ApiResult<T> = Result<T, Arc<String>>;

/// Terminal event handler.
///
/// Spawns a background task that emits tick and crossterm events, and exposes
/// an unbounded channel for application events.
#[derive(Debug)]
pub struct EventHandler {
    /// Event sender channel.
    sender: mpsc::UnboundedSender<Event>,
    /// Event receiver channel.
    receiver: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    /// Constructs a new instance of [`EventHandler`] and spawns the event task.
    pub fn new(tick_rate_fps: f64) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let actor = EventTask::new(sender.clone(), tick_rate_fps);
        tokio::spawn(async { actor.run().await });
        Self { sender, receiver }
    }

    /// Handler without the terminal task, for driving the app in tests.
    #[cfg(test)]
    pub fn detached() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self { sender, receiver }
    }

    /// Receives the next event, blocking until one is available.
    pub async fn next(&mut self) -> color_eyre::Result<Event> {
        self.receiver
            .recv()
            .await
            .ok_or_eyre("Failed to receive event")
    }

    /// Take an already queued event without waiting.
    #[cfg(test)]
    pub fn try_next(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }

    /// Queue an app event to be processed by the event loop.
    pub fn send(&self, app_event: AppEvent) {
        let _ = self.sender.send(Event::App(Box::new(app_event)));
    }

    /// Clone the underlying sender for use in spawned async tasks.
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.sender.clone()
    }
}

/// Background task that reads crossterm events and emits ticks.
struct EventTask {
    sender: mpsc::UnboundedSender<Event>,
    tick_rate: Duration,
}

impl EventTask {
    fn new(sender: mpsc::UnboundedSender<Event>, tick_rate_fps: f64) -> Self {
        let fps = if tick_rate_fps.is_finite() {
            tick_rate_fps.clamp(1.0, 240.0)
        } else {
            30.0
        };
        Self {
            sender,
            tick_rate: Duration::from_secs_f64(1.0 / fps),
        }
    }

    async fn run(self) -> color_eyre::Result<()> {
        let mut reader = crossterm::event::EventStream::new();
        let mut tick = tokio::time::interval(self.tick_rate);
        loop {
            let tick_delay = tick.tick();
            let crossterm_event = reader.next().fuse();
            tokio::select! {
                _ = self.sender.closed() => {
                    break;
                }
                _ = tick_delay => {
                    self.send(Event::Tick);
                }
                Some(Ok(evt)) = crossterm_event => {
                    self.send(Event::Crossterm(evt));
                }
            };
        }
        Ok(())
    }

    fn send(&self, event: Event) {
        let _ = self.sender.send(event);
    }
}

// ---------------------------------------------------------------------------
// Forwarders
// ---------------------------------------------------------------------------

/// Turn a watch channel into app events: the current value first, then one
/// event per observed change. Stops on cancellation or when either side
/// goes away.
pub fn forward_changes<T, F>(
    sender: mpsc::UnboundedSender<Event>,
    mut rx: watch::Receiver<T>,
    cancel: CancellationToken,
    map: F,
) -> JoinHandle<()>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T) -> AppEvent + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let value = rx.borrow_and_update().clone();
            if sender.send(Event::App(Box::new(map(value)))).is_err() {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    })
}

/// Relay messages from the notification listener into the event loop.
pub fn forward_messages(
    sender: mpsc::UnboundedSender<Event>,
    mut rx: mpsc::UnboundedReceiver<RemoteMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let event = Event::App(Box::new(AppEvent::NotificationReceived(message)));
            if sender.send(event).is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_event(event: Event) -> AppEvent {
        match event {
            Event::App(e) => *e,
            other => panic!("expected app event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn forwards_current_value_then_changes() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let (tx, rx) = watch::channel(None::<AuthUser>);
        let cancel = CancellationToken::new();
        let task = forward_changes(sender, rx, cancel.clone(), AppEvent::AuthChanged);

        assert!(matches!(
            app_event(receiver.recv().await.unwrap()),
            AppEvent::AuthChanged(None)
        ));

        let user = AuthUser {
            local_id: "uid".into(),
            email: Some("brock@pewter.gym".into()),
            display_name: None,
            photo_url: None,
            id_token: "id".into(),
            refresh_token: "r".into(),
            expires_at: None,
        };
        tx.send_replace(Some(user.clone()));
        match app_event(receiver.recv().await.unwrap()) {
            AppEvent::AuthChanged(Some(u)) => assert_eq!(u, user),
            other => panic!("unexpected event: {other:?}"),
        }

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn relays_notifications() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = forward_messages(sender, rx);

        tx.send(RemoteMessage::default()).unwrap();
        drop(tx);
        assert!(matches!(
            app_event(receiver.recv().await.unwrap()),
            AppEvent::NotificationReceived(_)
        ));
        task.await.unwrap();
    }

    #[test]
    fn failure_prefixes() {
        assert_eq!(AuthAction::SignIn.failure_prefix(), "Sign in failed: ");
        assert_eq!(
            AuthAction::GoogleSignIn.failure_prefix(),
            "Google Sign-In failed: "
        );
        assert_eq!(AuthAction::SignUp.failure_prefix(), "Sign up failed: ");
    }
}
