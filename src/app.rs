use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::DefaultTerminal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::PokeApiClient;
use crate::api::types::{Page, PokemonDetails, Species};
use crate::auth::{AuthService, AuthUser};
use crate::catalog::CatalogFeed;
use crate::command::{self, Command, PokemonRef};
use crate::config::{self, AppConfig};
use crate::event::{self, ApiResult, AppEvent, AuthAction, Event, EventHandler};
use crate::nav::{AuthGate, AuthPhase, DetailParams, Navigator, Route, Tab, TabStore};
use crate::notify::{DeepLinkReconciler, NotificationListener, NotifyError, RemoteMessage};
use crate::query::{Lookup, QueryCache, QueryState, QueryStore};
use crate::store::SharedStore;
use crate::ui;

/// How close to the end of the list the selection must get before the next
/// page is requested.
const END_REACHED_THRESHOLD: usize = 3;

const EVICT_INTERVAL: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Long-lived collaborators, built once in `main`.
pub struct AppContext {
    pub config: AppConfig,
    pub api: Arc<PokeApiClient>,
    pub auth: AuthService,
    pub navigator: Navigator,
    pub store: SharedStore,
    /// Fired when the app exits; stops listeners and pending deep links.
    pub cancel: CancellationToken,
}

// ---------------------------------------------------------------------------
// Catalog state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct CatalogState {
    pub feed: CatalogFeed,
    pub selected_index: usize,
    /// Last page fetch failure, cleared by the next successful page.
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Login / signup form
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FormField {
    #[default]
    Email,
    Password,
    ConfirmPassword,
}

#[derive(Debug, Default)]
pub struct AuthForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub focus: FormField,
    pub submitting: bool,
}

impl AuthForm {
    fn fields(signup: bool) -> &'static [FormField] {
        if signup {
            &[
                FormField::Email,
                FormField::Password,
                FormField::ConfirmPassword,
            ]
        } else {
            &[FormField::Email, FormField::Password]
        }
    }

    fn cycle(&mut self, signup: bool, forward: bool) {
        let fields = Self::fields(signup);
        let pos = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        let next = if forward {
            (pos + 1) % fields.len()
        } else {
            (pos + fields.len() - 1) % fields.len()
        };
        self.focus = fields[next];
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            FormField::Email => &mut self.email,
            FormField::Password => &mut self.password,
            FormField::ConfirmPassword => &mut self.confirm_password,
        }
    }

    fn clear_secrets(&mut self) {
        self.password.clear();
        self.confirm_password.clear();
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsItem {
    Profile,
    Notifications,
    SignOut,
    Theme,
    About,
}

impl SettingsItem {
    pub const ALL: [SettingsItem; 5] = [
        SettingsItem::Profile,
        SettingsItem::Notifications,
        SettingsItem::SignOut,
        SettingsItem::Theme,
        SettingsItem::About,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SettingsItem::Profile => "Profile",
            SettingsItem::Notifications => "Notifications",
            SettingsItem::SignOut => "Sign Out",
            SettingsItem::Theme => "Theme",
            SettingsItem::About => "About",
        }
    }

    pub fn section(self) -> &'static str {
        match self {
            SettingsItem::Profile | SettingsItem::Notifications | SettingsItem::SignOut => {
                "Account"
            }
            SettingsItem::Theme | SettingsItem::About => "App",
        }
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertAction {
    /// Open the config file in the user's editor.
    OpenSettings,
}

/// Blocking message box. Input goes to the alert until it is dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub action: Option<AlertAction>,
}

// ---------------------------------------------------------------------------
// App mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppMode {
    Normal,
    Command,
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct App {
    pub running: bool,
    pub events: EventHandler,
    pub ctx: AppContext,
    pub mode: AppMode,

    // Navigation
    pub gate: AuthGate,
    pub tabs: TabStore,
    reconciler: DeepLinkReconciler<Navigator>,
    pending_notification: Option<RemoteMessage>,

    // Data state
    pub user: Option<AuthUser>,
    pub catalog: CatalogState,
    page_cache: QueryCache<Page>,
    pub details: QueryStore<PokemonDetails>,
    pub species: QueryStore<Species>,
    last_eviction: Instant,

    // View state
    pub auth_form: AuthForm,
    pub settings_index: usize,
    pub stats_open: bool,
    pub show_help: bool,
    detail_url: Option<String>,

    // Input state
    pub command_input: String,

    // Status
    pub alert: Option<Alert>,
    pub status_message: Option<String>,
}

impl App {
    pub fn new(ctx: AppContext) -> Self {
        let events = EventHandler::new(ctx.config.tick_rate_fps);
        Self::with_events(ctx, events)
    }

    pub fn with_events(ctx: AppContext, events: EventHandler) -> Self {
        let tabs = TabStore::restore(ctx.store.clone());
        let reconciler = DeepLinkReconciler::new(
            ctx.navigator.clone(),
            ctx.config.reconciler(),
            ctx.cancel.clone(),
        );
        let policy = ctx.config.cache_policy();

        Self {
            running: true,
            events,
            mode: AppMode::Normal,
            gate: AuthGate::new(),
            tabs,
            reconciler,
            pending_notification: None,
            user: None,
            catalog: CatalogState::default(),
            page_cache: QueryCache::new(policy),
            details: QueryStore::new(policy),
            species: QueryStore::new(policy),
            last_eviction: Instant::now(),
            auth_form: AuthForm::default(),
            settings_index: 0,
            stats_open: false,
            show_help: false,
            detail_url: None,
            command_input: String::new(),
            alert: None,
            status_message: None,
            ctx,
        }
    }

    /// The notification the app was launched from, if any.
    pub fn with_initial_notification(mut self, message: Option<RemoteMessage>) -> Self {
        self.pending_notification = message;
        self
    }

    // -- Main event loop ----------------------------------------------------

    pub async fn run(mut self, mut terminal: DefaultTerminal) -> color_eyre::Result<()> {
        self.start();

        while self.running {
            terminal.draw(|frame| self.draw(frame))?;
            match self.events.next().await? {
                Event::Tick => self.tick(),
                Event::Crossterm(event) => {
                    if let crossterm::event::Event::Key(key) = event
                        && key.kind == crossterm::event::KeyEventKind::Press
                    {
                        self.handle_key_event(key);
                    }
                }
                Event::App(app_event) => self.handle_app_event(*app_event),
            }
        }

        self.ctx.cancel.cancel();
        Ok(())
    }

    /// Wire the collaborators into the event loop.
    fn start(&mut self) {
        let cancel = self.ctx.cancel.clone();
        event::forward_changes(
            self.events.sender(),
            self.ctx.auth.subscribe(),
            cancel.clone(),
            AppEvent::AuthChanged,
        );
        event::forward_changes(
            self.events.sender(),
            self.ctx.navigator.subscribe(),
            cancel.clone(),
            |_| AppEvent::RouteChanged,
        );
        self.spawn_notification_listener();

        // Cold start: the launching notification is delivered whatever its
        // kind, like an opened one.
        if let Some(message) = self.pending_notification.take() {
            self.deliver_notification(message);
        }
    }

    fn spawn_notification_listener(&self) {
        let port = self.ctx.config.notification_port;
        let sender = self.events.sender();
        let cancel = self.ctx.cancel.clone();

        tokio::spawn(async move {
            match NotificationListener::bind(port).await {
                Ok(listener) => {
                    let (tx, rx) = mpsc::unbounded_channel();
                    event::forward_messages(sender, rx);
                    listener.run(tx, cancel).await;
                }
                Err(e @ NotifyError::PermissionDenied { .. }) => {
                    tracing::warn!(error = %e, "notifications unavailable");
                    let event = AppEvent::NotificationsUnavailable(e.to_string());
                    let _ = sender.send(Event::App(Box::new(event)));
                }
                Err(e) => tracing::error!(error = %e, "notification listener failed"),
            }
        });
    }

    fn draw(&self, frame: &mut ratatui::Frame) {
        ui::draw(frame, self);
    }

    fn tick(&mut self) {
        let now = Instant::now();
        if now.duration_since(self.last_eviction) >= EVICT_INTERVAL {
            self.last_eviction = now;
            let evicted = self.page_cache.evict_expired(now)
                + self.details.evict_expired(now)
                + self.species.evict_expired(now);
            if evicted > 0 {
                tracing::debug!(
                    evicted,
                    cached_pages = self.page_cache.len(),
                    "evicted expired queries"
                );
            }
        }
    }

    // -- Accessors ----------------------------------------------------------

    pub fn route(&self) -> Option<Route> {
        self.ctx.navigator.current()
    }

    pub fn phase(&self) -> AuthPhase {
        self.gate.phase()
    }

    pub fn active_tab(&self) -> Tab {
        self.tabs.active()
    }

    pub fn detail_state(&self, url: &str) -> QueryState<'_, PokemonDetails> {
        self.details.state(url, Instant::now())
    }

    pub fn species_state(&self, url: &str) -> QueryState<'_, Species> {
        self.species.state(url, Instant::now())
    }

    fn on_signup(&self) -> bool {
        matches!(self.route(), Some(Route::Signup))
    }

    // -- Key event routing --------------------------------------------------

    fn handle_key_event(&mut self, key: KeyEvent) {
        // Ctrl-C always quits.
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c' | 'C'))
        {
            self.events.send(AppEvent::Quit);
            return;
        }

        if self.alert.is_some() {
            self.handle_alert_key(key);
            return;
        }

        if self.show_help {
            if matches!(
                key.code,
                KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')
            ) {
                self.show_help = false;
            }
            return;
        }

        match self.phase() {
            AuthPhase::Initializing => {}
            AuthPhase::Unauthenticated => self.handle_auth_form_key(key),
            AuthPhase::Authenticated => match self.mode {
                AppMode::Normal => self.handle_normal_key(key),
                AppMode::Command => self.handle_command_key(key),
            },
        }
    }

    fn handle_alert_key(&mut self, key: KeyEvent) {
        let action = self.alert.as_ref().and_then(|a| a.action);
        match key.code {
            KeyCode::Esc | KeyCode::Enter => {
                self.alert = None;
            }
            KeyCode::Char('o') if action == Some(AlertAction::OpenSettings) => {
                self.alert = None;
                self.open_settings_file();
            }
            _ => {}
        }
    }

    fn handle_auth_form_key(&mut self, key: KeyEvent) {
        if self.auth_form.submitting {
            return;
        }
        let signup = self.on_signup();
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Esc => {
                if signup {
                    self.events.send(AppEvent::Back);
                } else {
                    self.events.send(AppEvent::Quit);
                }
            }
            KeyCode::Tab | KeyCode::Down => self.auth_form.cycle(signup, true),
            KeyCode::BackTab | KeyCode::Up => self.auth_form.cycle(signup, false),
            KeyCode::Enter => self.submit_auth_form(signup),
            KeyCode::Char('g') if ctrl && !signup => {
                self.auth_form.submitting = true;
                self.events.send(AppEvent::SignInWithGoogle);
            }
            KeyCode::Char('n') if ctrl => {
                self.auth_form.clear_secrets();
                self.auth_form.focus = FormField::Email;
                if signup {
                    self.events.send(AppEvent::Back);
                } else if let Err(e) = self.ctx.navigator.navigate(Route::Signup) {
                    tracing::warn!(error = %e, "cannot open signup");
                }
            }
            KeyCode::Backspace => {
                self.auth_form.focused_mut().pop();
            }
            KeyCode::Char(c) if !ctrl => {
                self.auth_form.focused_mut().push(c);
            }
            _ => {}
        }
    }

    fn submit_auth_form(&mut self, signup: bool) {
        let form = &mut self.auth_form;
        if signup {
            if form.password != form.confirm_password {
                self.alert = Some(Alert {
                    title: "Error".into(),
                    message: "Passwords do not match".into(),
                    action: None,
                });
                return;
            }
            form.submitting = true;
            self.events.send(AppEvent::SignUp {
                email: form.email.clone(),
                password: form.password.clone(),
                confirm_password: form.confirm_password.clone(),
            });
        } else {
            form.submitting = true;
            self.events.send(AppEvent::SignIn {
                email: form.email.clone(),
                password: form.password.clone(),
            });
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) {
        let route = self.route();

        if self.stats_open {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('s') | KeyCode::Char('q')) {
                self.stats_open = false;
            }
            return;
        }

        // Keys shared by every authenticated screen.
        match key.code {
            KeyCode::Char('1') => return self.events.send(AppEvent::SelectTab(Tab::ALL[0])),
            KeyCode::Char('2') => return self.events.send(AppEvent::SelectTab(Tab::ALL[1])),
            KeyCode::Char('3') => return self.events.send(AppEvent::SelectTab(Tab::ALL[2])),
            KeyCode::Tab => {
                let pos = Tab::ALL
                    .iter()
                    .position(|t| *t == self.active_tab())
                    .unwrap_or(0);
                let next = Tab::ALL[(pos + 1) % Tab::ALL.len()];
                return self.events.send(AppEvent::SelectTab(next));
            }
            KeyCode::Char(':') => {
                self.mode = AppMode::Command;
                self.command_input.clear();
                return;
            }
            KeyCode::Char('?') => {
                self.show_help = true;
                return;
            }
            _ => {}
        }

        match route {
            Some(Route::Home) => self.handle_catalog_key(key),
            Some(Route::Settings) => self.handle_settings_key(key),
            Some(Route::PokemonDetails(params)) => self.handle_details_key(key, &params),
            _ => {
                if matches!(key.code, KeyCode::Char('q')) {
                    self.events.send(AppEvent::Quit);
                }
            }
        }
    }

    fn handle_catalog_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.events.send(AppEvent::Quit),
            KeyCode::Char('j') | KeyCode::Down => self.move_selection_down(),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection_up(),
            KeyCode::Char('g') | KeyCode::Home => self.catalog.selected_index = 0,
            KeyCode::Char('G') | KeyCode::End => {
                self.catalog.selected_index = self.catalog.feed.len().saturating_sub(1);
                self.on_end_reached();
            }
            KeyCode::Enter => self.open_selected(),
            KeyCode::Char('n') => self.load_more(),
            KeyCode::Char('r') => self.retry_selected(),
            KeyCode::Char('L') => self.events.send(AppEvent::SignOut),
            _ => {}
        }
    }

    fn handle_settings_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.events.send(AppEvent::Quit),
            KeyCode::Char('j') | KeyCode::Down => {
                if self.settings_index + 1 < SettingsItem::ALL.len() {
                    self.settings_index += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.settings_index = self.settings_index.saturating_sub(1);
            }
            KeyCode::Enter => match SettingsItem::ALL.get(self.settings_index) {
                Some(SettingsItem::SignOut) => self.events.send(AppEvent::SignOut),
                Some(item) => {
                    self.status_message = Some(format!("{} is not available yet", item.label()));
                }
                None => {}
            },
            _ => {}
        }
    }

    fn handle_details_key(&mut self, key: KeyEvent, params: &DetailParams) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc | KeyCode::Backspace => {
                self.events.send(AppEvent::Back)
            }
            KeyCode::Char('s') => {
                if self.details.get(&params.url, Instant::now()).is_some() {
                    self.stats_open = true;
                }
            }
            KeyCode::Char('r') => {
                if self.details.retry(&params.url) {
                    self.events.send(AppEvent::FetchDetail {
                        url: params.url.clone(),
                    });
                }
            }
            _ => {}
        }
    }

    fn handle_command_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.mode = AppMode::Normal;
                self.command_input.clear();
            }
            KeyCode::Enter => {
                self.execute_command();
                self.mode = AppMode::Normal;
            }
            KeyCode::Backspace => {
                self.command_input.pop();
            }
            KeyCode::Char(c) => {
                self.command_input.push(c);
            }
            _ => {}
        }
    }

    // -- Command execution --------------------------------------------------

    fn execute_command(&mut self) {
        let input = self.command_input.clone();
        match command::parse_command(&input) {
            Some(Command::Tab(tab)) => self.events.send(AppEvent::SelectTab(tab)),
            Some(Command::Open(reference)) => match command::parse_pokemon_ref(&reference) {
                Some(PokemonRef::Name(name)) => {
                    let url = self.ctx.api.pokemon_url(&name);
                    self.events.send(AppEvent::OpenDetails(DetailParams { url, name }));
                }
                Some(PokemonRef::Url(url)) => {
                    let name = command::name_from_url(&url);
                    self.events.send(AppEvent::OpenDetails(DetailParams { url, name }));
                }
                None => {
                    self.status_message = Some(format!("Invalid Pokemon reference: {reference}"));
                }
            },
            Some(Command::Logout) => self.events.send(AppEvent::SignOut),
            Some(Command::Help) => self.show_help = true,
            Some(Command::Quit) => self.events.send(AppEvent::Quit),
            None => {
                self.status_message = Some(format!("Unknown command: {input}"));
            }
        }
        self.command_input.clear();
    }

    // -- Selection helpers --------------------------------------------------

    fn move_selection_down(&mut self) {
        if self.catalog.selected_index + 1 < self.catalog.feed.len() {
            self.catalog.selected_index += 1;
        }
        self.on_end_reached();
    }

    fn move_selection_up(&mut self) {
        self.catalog.selected_index = self.catalog.selected_index.saturating_sub(1);
    }

    /// Request the next page once the selection nears the end of the list.
    fn on_end_reached(&mut self) {
        let len = self.catalog.feed.len();
        if len > 0
            && self.catalog.selected_index + END_REACHED_THRESHOLD >= len
            && self.catalog.feed.has_more()
        {
            self.load_more();
        }
    }

    fn open_selected(&mut self) {
        if let Some(item) = self.catalog.feed.get(self.catalog.selected_index) {
            let params = DetailParams {
                url: item.url.clone(),
                name: item.name.clone(),
            };
            self.events.send(AppEvent::OpenDetails(params));
        }
    }

    /// Retry whatever failed under the cursor: the selected card, or the
    /// page fetch when the list itself errored.
    fn retry_selected(&mut self) {
        if let Some(item) = self.catalog.feed.get(self.catalog.selected_index) {
            let url = item.url.clone();
            if self.details.retry(&url) {
                self.events.send(AppEvent::FetchDetail { url });
                return;
            }
        }
        if self.catalog.error.is_some() {
            self.load_more();
        }
    }

    // -- Data loading -------------------------------------------------------

    fn page_key(&self, offset: u32) -> String {
        format!(
            "pokemon:list:limit={}:offset={offset}",
            self.ctx.config.page_limit()
        )
    }

    /// Claim the next page and serve it from cache or the network.
    fn load_more(&mut self) {
        let Some(offset) = self.catalog.feed.load_more() else {
            return;
        };
        let key = self.page_key(offset);
        let cached = match self.page_cache.lookup(&key, Instant::now()) {
            Lookup::Fresh(page) => Some((page.clone(), false)),
            Lookup::Stale(page) => Some((page.clone(), true)),
            Lookup::Miss => None,
        };
        match cached {
            Some((page, stale)) => {
                tracing::debug!(offset, stale, "catalog page served from cache");
                self.apply_page(offset, Ok(page));
                if stale {
                    self.events.send(AppEvent::FetchPage {
                        offset,
                        refresh: true,
                    });
                }
            }
            None => self.events.send(AppEvent::FetchPage {
                offset,
                refresh: false,
            }),
        }
    }

    /// Network result for a page. Only these reset the page's freshness.
    fn on_page_loaded(&mut self, offset: u32, refresh: bool, result: ApiResult<Page>) {
        if let Ok(page) = &result {
            self.page_cache
                .insert(self.page_key(offset), page.clone(), Instant::now());
        }

        if refresh {
            match result {
                Ok(page) => {
                    let urls = page_urls(&page);
                    if self.catalog.feed.refresh(offset, page) {
                        self.ensure_details(urls);
                    }
                }
                Err(e) => tracing::warn!(offset, error = %e, "catalog page refresh failed"),
            }
            return;
        }
        self.apply_page(offset, result);
    }

    fn apply_page(&mut self, offset: u32, result: ApiResult<Page>) {
        let urls = result.as_ref().map(page_urls).unwrap_or_default();
        match self.catalog.feed.complete(offset, result) {
            Ok(()) => {
                tracing::debug!(
                    offset,
                    pages = self.catalog.feed.page_count(),
                    items = self.catalog.feed.len(),
                    "catalog page loaded"
                );
                self.catalog.error = None;
                self.ensure_details(urls);
            }
            Err(e) => {
                tracing::warn!(offset, error = %e, "catalog page failed");
                self.catalog.error = Some(e.to_string());
            }
        }
    }

    fn ensure_details(&mut self, urls: Vec<String>) {
        let now = Instant::now();
        for url in urls {
            if self.details.ensure(&url, now) {
                self.events.send(AppEvent::FetchDetail { url });
            }
        }
    }

    fn ensure_species_for(&mut self, detail_url: &str) {
        let now = Instant::now();
        let Some(url) = self
            .details
            .get(detail_url, now)
            .and_then(|d| d.species.as_ref())
            .map(|s| s.url.clone())
        else {
            return;
        };
        if self.species.ensure(&url, now) {
            self.events.send(AppEvent::FetchSpecies { url });
        }
    }

    fn on_route_changed(&mut self) {
        let state = self.ctx.navigator.snapshot();
        tracing::debug!(
            roots = ?self.ctx.navigator.root_routes(),
            depth = state.stack().len(),
            "route changed"
        );
        match state.current().cloned() {
            Some(Route::PokemonDetails(params)) => {
                if self.detail_url.as_deref() != Some(params.url.as_str()) {
                    self.stats_open = false;
                    self.detail_url = Some(params.url.clone());
                }
                self.ensure_details(vec![params.url.clone()]);
                self.ensure_species_for(&params.url);
            }
            Some(Route::Home) => {
                self.detail_url = None;
                self.stats_open = false;
                let urls = self.catalog.feed.items().map(|r| r.url.clone()).collect();
                self.ensure_details(urls);
            }
            _ => {
                self.detail_url = None;
                self.stats_open = false;
            }
        }
    }

    // -- Notifications ------------------------------------------------------

    fn on_notification(&mut self, message: RemoteMessage) {
        if message.kind.navigates() {
            self.deliver_notification(message);
        } else {
            tracing::info!(kind = %message.kind, data = ?message.data, "message received");
        }
    }

    fn deliver_notification(&mut self, message: RemoteMessage) {
        match message.intent() {
            Ok(intent) => {
                tracing::info!(screen = intent.screen(), "notification opened app");
                self.reconciler.deliver(intent);
            }
            Err(e) => tracing::warn!(error = %e, "ignoring notification without a target"),
        }
    }

    fn open_settings_file(&mut self) {
        let Some(path) = config::config_path() else {
            self.status_message = Some("No home directory for the settings file".into());
            return;
        };
        if let Err(e) = config::ensure_config_file(&path, &self.ctx.config) {
            tracing::warn!(error = %e, "cannot create settings file");
        }
        if let Err(e) = open::that(&path) {
            tracing::warn!(error = %e, "failed to open settings");
            self.status_message = Some(format!("Open {} to change settings", path.display()));
        }
    }

    // -- Auth ---------------------------------------------------------------

    fn on_auth_changed(&mut self, user: Option<AuthUser>) {
        let signed_in = user.is_some();
        self.user = user;
        let remounted =
            self.gate
                .on_auth_change(signed_in, &self.ctx.navigator, self.tabs.active());
        if !remounted {
            return;
        }

        self.auth_form = AuthForm::default();
        self.catalog = CatalogState::default();
        self.stats_open = false;
        self.detail_url = None;
        self.mode = AppMode::Normal;
        if signed_in {
            self.load_more();
        }
    }

    fn spawn_auth_task<F>(&self, action: AuthAction, fut: F)
    where
        F: Future<Output = Result<AuthUser, crate::auth::AuthError>> + Send + 'static,
    {
        let sender = self.events.sender();
        tokio::spawn(async move {
            if let Err(e) = fut.await {
                tracing::warn!(?action, error = %e, "auth request failed");
                let event = AppEvent::AuthFailed {
                    action,
                    message: e.to_string(),
                };
                let _ = sender.send(Event::App(Box::new(event)));
            }
        });
    }

    // -- App event handling -------------------------------------------------

    pub fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            // Navigation
            AppEvent::Quit => {
                self.running = false;
            }
            AppEvent::SelectTab(tab) => {
                // Persistence runs in the background.
                drop(self.tabs.select(tab, &self.ctx.navigator));
            }
            AppEvent::OpenDetails(params) => {
                if let Err(e) = self.ctx.navigator.navigate(Route::PokemonDetails(params)) {
                    tracing::error!(error = %e, "navigation error");
                }
            }
            AppEvent::Back => {
                self.ctx.navigator.go_back();
            }
            AppEvent::RouteChanged => self.on_route_changed(),

            // API request triggers -> dispatch to async tasks.
            ref evt @ (AppEvent::FetchPage { .. }
            | AppEvent::FetchDetail { .. }
            | AppEvent::FetchSpecies { .. }) => {
                self.dispatch_api_request(evt.clone());
            }

            // API response events
            AppEvent::PageLoaded {
                offset,
                refresh,
                result,
            } => self.on_page_loaded(offset, refresh, result),
            AppEvent::DetailLoaded { url, result } => {
                self.details.resolve(&url, *result, Instant::now());
                if self.detail_url.as_deref() == Some(url.as_str()) {
                    self.ensure_species_for(&url);
                }
            }
            AppEvent::SpeciesLoaded { url, result } => {
                self.species.resolve(&url, result, Instant::now());
            }

            // Auth
            AppEvent::AuthChanged(user) => self.on_auth_changed(user),
            AppEvent::SignIn { email, password } => {
                let auth = self.ctx.auth.clone();
                self.spawn_auth_task(AuthAction::SignIn, async move {
                    auth.sign_in_with_password(&email, &password).await
                });
            }
            AppEvent::SignUp {
                email,
                password,
                confirm_password,
            } => {
                let auth = self.ctx.auth.clone();
                self.spawn_auth_task(AuthAction::SignUp, async move {
                    auth.sign_up(&email, &password, &confirm_password).await
                });
            }
            AppEvent::SignInWithGoogle => {
                let auth = self.ctx.auth.clone();
                self.spawn_auth_task(AuthAction::GoogleSignIn, async move {
                    auth.sign_in_with_google().await
                });
            }
            AppEvent::SignOut => {
                if let Err(e) = self.ctx.auth.sign_out() {
                    tracing::error!(error = %e, "error signing out");
                    self.status_message = Some(format!("{}{e}", AuthAction::SignOut.failure_prefix()));
                }
            }
            AppEvent::AuthFailed { action, message } => {
                self.auth_form.submitting = false;
                self.auth_form.clear_secrets();
                self.alert = Some(Alert {
                    title: "Error".into(),
                    message: format!("{}{message}", action.failure_prefix()),
                    action: None,
                });
            }

            // Notifications
            AppEvent::NotificationReceived(message) => self.on_notification(message),
            AppEvent::NotificationsUnavailable(detail) => {
                tracing::debug!(%detail, "showing notification permission alert");
                self.alert = Some(Alert {
                    title: "Notifications Disabled".into(),
                    message: "You won't receive important updates. \
                              You can enable notifications in the settings file."
                        .into(),
                    action: Some(AlertAction::OpenSettings),
                });
            }
        }
    }

    // -- API dispatch -------------------------------------------------------

    fn dispatch_api_request(&self, event: AppEvent) {
        let client = Arc::clone(&self.ctx.api);
        let sender = self.events.sender();
        let limit = self.ctx.config.page_limit();

        tokio::spawn(async move {
            let loaded = match event {
                AppEvent::FetchPage { offset, refresh } => {
                    let result = client.list_pokemon(limit, offset).await;
                    AppEvent::PageLoaded {
                        offset,
                        refresh,
                        result: result.map_err(|e| Arc::new(e.to_string())),
                    }
                }
                AppEvent::FetchDetail { url } => {
                    let result = client.get_details(&url).await;
                    AppEvent::DetailLoaded {
                        url,
                        result: Box::new(result.map_err(|e| Arc::new(e.to_string()))),
                    }
                }
                AppEvent::FetchSpecies { url } => {
                    let result = client.get_species(&url).await;
                    AppEvent::SpeciesLoaded {
                        url,
                        result: result.map_err(|e| Arc::new(e.to_string())),
                    }
                }
                _ => return,
            };
            let _ = sender.send(Event::App(Box::new(loaded)));
        });
    }
}

fn page_urls(page: &Page) -> Vec<String> {
    page.results.iter().map(|r| r.url.clone()).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::api::types::ListReference;
    use crate::auth::AuthSettings;
    use crate::auth::credentials::CredentialSet;
    use crate::nav::tabs::ACTIVE_TAB_KEY;
    use crate::notify::MessageKind;
    use crate::store::{KeyValueStore, MemoryStore};

    fn context(store: Arc<MemoryStore>) -> AppContext {
        AppContext {
            config: AppConfig::default(),
            api: Arc::new(PokeApiClient::new("http://127.0.0.1:9")),
            auth: AuthService::new(AuthSettings {
                identity_base_url: "http://127.0.0.1:9".into(),
                credentials: CredentialSet::default(),
                oauth_callback_port: 0,
                session_path: None,
            }),
            navigator: Navigator::new(),
            store,
            cancel: CancellationToken::new(),
        }
    }

    fn app() -> App {
        App::with_events(context(Arc::new(MemoryStore::new())), EventHandler::detached())
    }

    fn ash() -> AuthUser {
        AuthUser {
            local_id: "uid-1".into(),
            email: Some("ash@pallet.town".into()),
            display_name: None,
            photo_url: None,
            id_token: "id".into(),
            refresh_token: "refresh".into(),
            expires_at: None,
        }
    }

    fn drain(app: &mut App) -> Vec<AppEvent> {
        let mut out = Vec::new();
        while let Some(event) = app.events.try_next() {
            if let Event::App(e) = event {
                out.push(*e);
            }
        }
        out
    }

    fn page(names: &[&str], next: Option<&str>) -> Page {
        Page {
            count: None,
            next: next.map(str::to_string),
            previous: None,
            results: names
                .iter()
                .map(|n| ListReference {
                    name: n.to_string(),
                    url: format!("https://pokeapi.co/api/v2/pokemon/{n}/"),
                })
                .collect(),
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn opened(screen: &str, url: Option<&str>, name: Option<&str>) -> RemoteMessage {
        RemoteMessage::to_screen(
            MessageKind::Opened,
            screen,
            url.map(str::to_string),
            name.map(str::to_string),
        )
    }

    #[tokio::test]
    async fn sign_in_mounts_tabs_and_requests_first_page() {
        let mut app = app();
        app.handle_app_event(AppEvent::AuthChanged(None));
        assert_eq!(app.phase(), AuthPhase::Unauthenticated);
        assert_eq!(app.route(), Some(Route::Login));
        assert!(drain(&mut app).is_empty());

        app.handle_app_event(AppEvent::AuthChanged(Some(ash())));
        assert_eq!(app.phase(), AuthPhase::Authenticated);
        assert_eq!(app.route(), Some(Route::Home));
        let queued = drain(&mut app);
        assert!(matches!(
            queued.as_slice(),
            [AppEvent::FetchPage {
                offset: 0,
                refresh: false
            }]
        ));
    }

    #[tokio::test]
    async fn persisted_tab_is_restored_on_sign_in() {
        let store = Arc::new(MemoryStore::new());
        store.set(ACTIVE_TAB_KEY, "settings").unwrap();
        let mut app = App::with_events(context(store), EventHandler::detached());

        app.handle_app_event(AppEvent::AuthChanged(Some(ash())));
        assert_eq!(app.active_tab(), Tab::Settings);
        assert_eq!(app.route(), Some(Route::Settings));
    }

    #[tokio::test]
    async fn page_load_fetches_each_card_independently() {
        let mut app = app();
        app.handle_app_event(AppEvent::AuthChanged(Some(ash())));
        drain(&mut app);

        app.handle_app_event(AppEvent::PageLoaded {
            offset: 0,
            refresh: false,
            result: Ok(page(
                &["bulbasaur", "ivysaur"],
                Some("https://pokeapi.co/api/v2/pokemon?offset=10&limit=10"),
            )),
        });
        let fetches: Vec<String> = drain(&mut app)
            .into_iter()
            .filter_map(|e| match e {
                AppEvent::FetchDetail { url } => Some(url),
                _ => None,
            })
            .collect();
        assert_eq!(fetches.len(), 2);

        let ivysaur = "https://pokeapi.co/api/v2/pokemon/ivysaur/";
        app.handle_app_event(AppEvent::DetailLoaded {
            url: ivysaur.into(),
            result: Box::new(Err(Arc::new("boom".into()))),
        });
        assert!(matches!(app.detail_state(ivysaur), QueryState::Failed("boom")));
        assert!(matches!(
            app.detail_state("https://pokeapi.co/api/v2/pokemon/bulbasaur/"),
            QueryState::Loading
        ));

        // Retry the failed card from the list.
        app.catalog.selected_index = 1;
        app.handle_key_event(key(KeyCode::Char('r')));
        assert!(matches!(
            drain(&mut app).as_slice(),
            [AppEvent::FetchDetail { url }] if url == ivysaur
        ));
    }

    #[tokio::test]
    async fn failed_page_keeps_list_and_is_retriable() {
        let mut app = app();
        app.handle_app_event(AppEvent::AuthChanged(Some(ash())));
        drain(&mut app);

        app.handle_app_event(AppEvent::PageLoaded {
            offset: 0,
            refresh: false,
            result: Err(Arc::new("offline".into())),
        });
        assert_eq!(app.catalog.error.as_deref(), Some("offline"));
        assert!(app.catalog.feed.is_empty());
        assert!(app.catalog.feed.has_more());

        app.handle_key_event(key(KeyCode::Char('r')));
        assert!(matches!(
            drain(&mut app).as_slice(),
            [AppEvent::FetchPage { offset: 0, .. }]
        ));
    }

    #[tokio::test]
    async fn cached_pages_are_reused_after_sign_out_and_back_in() {
        let mut app = app();
        app.handle_app_event(AppEvent::AuthChanged(Some(ash())));
        drain(&mut app);
        app.handle_app_event(AppEvent::PageLoaded {
            offset: 0,
            refresh: false,
            result: Ok(page(&["pidgey"], None)),
        });
        drain(&mut app);

        app.handle_app_event(AppEvent::AuthChanged(None));
        assert!(app.catalog.feed.is_empty());
        app.handle_app_event(AppEvent::AuthChanged(Some(ash())));

        // Served from cache: no page request, list filled immediately.
        assert_eq!(app.catalog.feed.len(), 1);
        assert!(
            !drain(&mut app)
                .iter()
                .any(|e| matches!(e, AppEvent::FetchPage { .. }))
        );
    }

    #[tokio::test]
    async fn serving_a_stale_page_does_not_make_it_fresh() {
        let mut ctx = context(Arc::new(MemoryStore::new()));
        ctx.config.stale_time_secs = 1;
        let mut app = App::with_events(ctx, EventHandler::detached());
        let key = app.page_key(0);
        let written = Instant::now()
            .checked_sub(Duration::from_secs(5))
            .unwrap();
        app.page_cache.insert(key.clone(), page(&["pidgey"], None), written);

        app.handle_app_event(AppEvent::AuthChanged(Some(ash())));

        assert_eq!(app.catalog.feed.len(), 1);
        assert!(matches!(
            app.page_cache.lookup(&key, Instant::now()),
            Lookup::Stale(_)
        ));
        assert!(
            drain(&mut app)
                .iter()
                .any(|e| matches!(e, AppEvent::FetchPage { offset: 0, refresh: true }))
        );

        // Only the network response renews the entry.
        app.handle_app_event(AppEvent::PageLoaded {
            offset: 0,
            refresh: true,
            result: Ok(page(&["pidgey"], None)),
        });
        assert!(matches!(
            app.page_cache.lookup(&key, Instant::now()),
            Lookup::Fresh(_)
        ));
    }

    #[tokio::test]
    async fn foreground_and_background_messages_do_not_navigate() {
        let mut app = app();
        app.handle_app_event(AppEvent::AuthChanged(Some(ash())));

        for kind in [MessageKind::Foreground, MessageKind::Background] {
            let message = RemoteMessage {
                kind,
                data: HashMap::from([("Screen".to_string(), "Settings".to_string())]),
            };
            app.handle_app_event(AppEvent::NotificationReceived(message));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(app.route(), Some(Route::Home));
    }

    #[tokio::test(start_paused = true)]
    async fn opened_detail_message_waits_for_sign_in() {
        let mut app = app();
        app.handle_app_event(AppEvent::AuthChanged(None));

        let url = "https://pokeapi.co/api/v2/pokemon/25/";
        app.handle_app_event(AppEvent::NotificationReceived(opened(
            "PokemonDetails",
            Some(url),
            Some("pikachu"),
        )));
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(app.route(), Some(Route::Login));

        app.handle_app_event(AppEvent::AuthChanged(Some(ash())));
        assert_eq!(app.route(), Some(Route::Home));
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(
            app.route(),
            Some(Route::PokemonDetails(DetailParams {
                url: url.into(),
                name: "pikachu".into(),
            }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cold_start_notification_is_delivered_once_ready() {
        let mut app = app().with_initial_notification(Some(RemoteMessage {
            kind: MessageKind::Background,
            data: HashMap::from([("Screen".to_string(), "Team".to_string())]),
        }));
        if let Some(message) = app.pending_notification.take() {
            app.deliver_notification(message);
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(app.route(), None);

        app.handle_app_event(AppEvent::AuthChanged(Some(ash())));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(app.route(), Some(Route::Team));
    }

    #[tokio::test]
    async fn listener_failure_raises_settings_alert() {
        let mut app = app();
        app.handle_app_event(AppEvent::NotificationsUnavailable("port busy".into()));
        let alert = app.alert.clone().unwrap();
        assert_eq!(alert.title, "Notifications Disabled");
        assert_eq!(alert.action, Some(AlertAction::OpenSettings));

        // Input goes to the alert until dismissed.
        app.handle_app_event(AppEvent::AuthChanged(Some(ash())));
        drain(&mut app);
        app.handle_key_event(key(KeyCode::Char('3')));
        assert!(drain(&mut app).is_empty());
        app.handle_key_event(key(KeyCode::Esc));
        assert!(app.alert.is_none());
    }

    #[tokio::test]
    async fn signup_password_mismatch_never_reaches_backend() {
        let mut app = app();
        app.handle_app_event(AppEvent::AuthChanged(None));
        app.ctx.navigator.navigate(Route::Signup).unwrap();

        for c in "ash@pallet.town".chars() {
            app.handle_key_event(key(KeyCode::Char(c)));
        }
        app.handle_key_event(key(KeyCode::Tab));
        app.handle_key_event(key(KeyCode::Char('a')));
        app.handle_key_event(key(KeyCode::Tab));
        app.handle_key_event(key(KeyCode::Char('b')));
        app.handle_key_event(key(KeyCode::Enter));

        assert_eq!(app.auth_form.email, "ash@pallet.town");
        assert_eq!(
            app.alert.as_ref().map(|a| a.message.as_str()),
            Some("Passwords do not match")
        );
        assert!(drain(&mut app).is_empty());
        assert!(!app.auth_form.submitting);
    }

    #[tokio::test]
    async fn auth_failure_is_prefixed_in_alert() {
        let mut app = app();
        app.handle_app_event(AppEvent::AuthChanged(None));
        app.auth_form.submitting = true;
        app.handle_app_event(AppEvent::AuthFailed {
            action: AuthAction::GoogleSignIn,
            message: "access_denied".into(),
        });
        assert!(!app.auth_form.submitting);
        assert_eq!(
            app.alert.map(|a| a.message),
            Some("Google Sign-In failed: access_denied".to_string())
        );
    }

    #[tokio::test]
    async fn settings_sign_out_returns_to_login() {
        let mut app = app();
        app.handle_app_event(AppEvent::AuthChanged(Some(ash())));
        app.handle_app_event(AppEvent::SelectTab(Tab::Settings));
        drain(&mut app);

        app.settings_index = SettingsItem::ALL
            .iter()
            .position(|i| *i == SettingsItem::SignOut)
            .unwrap();
        app.handle_key_event(key(KeyCode::Enter));
        let queued = drain(&mut app);
        assert!(matches!(queued.as_slice(), [AppEvent::SignOut]));

        app.handle_app_event(AppEvent::SignOut);
        assert!(app.ctx.auth.current_user().is_none());
        // The auth service's change event drives the remount.
        app.handle_app_event(AppEvent::AuthChanged(None));
        assert_eq!(app.route(), Some(Route::Login));
    }

    #[tokio::test]
    async fn open_command_navigates_to_details() {
        let mut app = app();
        app.handle_app_event(AppEvent::AuthChanged(Some(ash())));
        drain(&mut app);

        app.handle_key_event(key(KeyCode::Char(':')));
        for c in "open Pikachu".chars() {
            app.handle_key_event(key(KeyCode::Char(c)));
        }
        app.handle_key_event(key(KeyCode::Enter));
        for event in drain(&mut app) {
            app.handle_app_event(event);
        }
        app.handle_app_event(AppEvent::RouteChanged);

        assert_eq!(
            app.route(),
            Some(Route::PokemonDetails(DetailParams {
                url: "http://127.0.0.1:9/pokemon/pikachu/".into(),
                name: "pikachu".into(),
            }))
        );
        assert!(matches!(
            drain(&mut app).as_slice(),
            [AppEvent::FetchDetail { url }] if url == "http://127.0.0.1:9/pokemon/pikachu/"
        ));
    }
}
