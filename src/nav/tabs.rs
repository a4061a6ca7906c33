use std::fmt;
use std::str::FromStr;

use tokio::sync::watch;

use crate::nav::navigator::{Navigator, Route};
use crate::store::SharedStore;

/// Storage key holding the selected tab.
pub const ACTIVE_TAB_KEY: &str = "activeTab";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Tab {
    #[default]
    Catalog,
    Team,
    Settings,
}

impl Tab {
    /// Tab bar order.
    pub const ALL: [Tab; 3] = [Tab::Team, Tab::Catalog, Tab::Settings];

    pub fn as_str(self) -> &'static str {
        match self {
            Tab::Catalog => "catalog",
            Tab::Team => "team",
            Tab::Settings => "settings",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tab::Catalog => "Catch",
            Tab::Team => "Team",
            Tab::Settings => "Settings",
        }
    }

    pub fn route(self) -> Route {
        match self {
            Tab::Catalog => Route::Home,
            Tab::Team => Route::Team,
            Tab::Settings => Route::Settings,
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTab(pub String);

impl FromStr for Tab {
    type Err = UnknownTab;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            // "catch" is what older builds wrote.
            "catalog" | "catch" => Ok(Tab::Catalog),
            "team" => Ok(Tab::Team),
            "settings" => Ok(Tab::Settings),
            _ => Err(UnknownTab(s.to_string())),
        }
    }
}

/// Owns the selected tab. The in-memory value is authoritative; storage is
/// a best-effort copy for the next launch.
pub struct TabStore {
    active: Tab,
    storage: SharedStore,
    writer: Option<TabWriter>,
}

impl TabStore {
    /// Read the persisted tab, defaulting to the catalog when nothing usable
    /// is stored.
    pub fn restore(storage: SharedStore) -> Self {
        let active = match storage.get(ACTIVE_TAB_KEY) {
            Ok(Some(raw)) => raw.parse::<Tab>().unwrap_or_else(|UnknownTab(value)| {
                tracing::warn!(%value, "ignoring unknown persisted tab");
                Tab::default()
            }),
            Ok(None) => Tab::default(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load tab state");
                Tab::default()
            }
        };
        tracing::debug!(tab = %active, "restored active tab");
        Self {
            active,
            storage,
            writer: None,
        }
    }

    pub fn active(&self) -> Tab {
        self.active
    }

    /// Select `tab`: update the in-memory value, navigate to its route, and
    /// queue a background write. The returned future resolves once this
    /// selection (or a later one) has been written; dropping it does not
    /// cancel the write.
    pub fn select(&mut self, tab: Tab, navigator: &Navigator) -> impl Future<Output = ()> + use<> {
        self.active = tab;
        if let Err(e) = navigator.navigate(tab.route()) {
            tracing::warn!(tab = %tab, error = %e, "tab navigation failed");
        }
        let writer = self
            .writer
            .get_or_insert_with(|| TabWriter::spawn(self.storage.clone(), tab));
        writer.persist(tab)
    }
}

// ---------------------------------------------------------------------------
// Background writer
// ---------------------------------------------------------------------------

/// Single task that writes selections in order. Selections made while a
/// write is running collapse into the latest one.
struct TabWriter {
    generation: u64,
    requests: watch::Sender<(u64, Tab)>,
    written: watch::Receiver<u64>,
}

impl TabWriter {
    fn spawn(storage: SharedStore, initial: Tab) -> Self {
        let (requests, pending) = watch::channel((0, initial));
        let (done, written) = watch::channel(0);
        tokio::spawn(write_tabs(storage, pending, done));
        Self {
            generation: 0,
            requests,
            written,
        }
    }

    fn persist(&mut self, tab: Tab) -> impl Future<Output = ()> + use<> {
        self.generation += 1;
        let generation = self.generation;
        self.requests.send_replace((generation, tab));
        let mut written = self.written.clone();
        async move {
            // Err only when the writer is gone, which means nothing is pending.
            let _ = written.wait_for(|done| *done >= generation).await;
        }
    }
}

async fn write_tabs(
    storage: SharedStore,
    mut pending: watch::Receiver<(u64, Tab)>,
    done: watch::Sender<u64>,
) {
    while pending.changed().await.is_ok() {
        let (generation, tab) = *pending.borrow_and_update();
        let storage = storage.clone();
        let result =
            tokio::task::spawn_blocking(move || storage.set(ACTIVE_TAB_KEY, tab.as_str())).await;
        match result {
            Ok(Ok(())) => tracing::debug!(tab = %tab, "saved tab state"),
            Ok(Err(e)) => tracing::error!(error = %e, "error saving tab state"),
            Err(e) => tracing::error!(error = %e, "tab state writer failed"),
        }
        done.send_replace(generation);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::store::{KeyValueStore, MemoryStore, StorageError};

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Io(std::io::Error::other("disk gone")))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Io(std::io::Error::other("disk gone")))
        }
    }

    #[test]
    fn parses_persisted_values() {
        assert_eq!("team".parse::<Tab>(), Ok(Tab::Team));
        assert_eq!("catch".parse::<Tab>(), Ok(Tab::Catalog));
        assert_eq!("Settings".parse::<Tab>(), Ok(Tab::Settings));
        assert!("pokedex".parse::<Tab>().is_err());
    }

    #[test]
    fn defaults_to_catalog() {
        let empty: SharedStore = Arc::new(MemoryStore::new());
        assert_eq!(TabStore::restore(empty).active(), Tab::Catalog);

        let garbage = MemoryStore::new();
        garbage.set(ACTIVE_TAB_KEY, "pokedex").unwrap();
        assert_eq!(TabStore::restore(Arc::new(garbage)).active(), Tab::Catalog);

        assert_eq!(TabStore::restore(Arc::new(BrokenStore)).active(), Tab::Catalog);
    }

    #[tokio::test]
    async fn select_updates_memory_navigates_and_persists() {
        let storage = Arc::new(MemoryStore::new());
        let navigator = Navigator::new();
        navigator.mount_authenticated();

        let mut tabs = TabStore::restore(storage.clone());
        let write = tabs.select(Tab::Team, &navigator);

        // Visible before the write lands.
        assert_eq!(tabs.active(), Tab::Team);
        assert_eq!(navigator.current(), Some(Route::Team));

        write.await;
        assert_eq!(storage.get(ACTIVE_TAB_KEY).unwrap().as_deref(), Some("team"));

        let next_launch = TabStore::restore(storage);
        assert_eq!(next_launch.active(), Tab::Team);
    }

    #[tokio::test]
    async fn persistence_failure_keeps_in_memory_value() {
        let navigator = Navigator::new();
        navigator.mount_authenticated();

        let mut tabs = TabStore::restore(Arc::new(BrokenStore));
        tabs.select(Tab::Settings, &navigator).await;

        assert_eq!(tabs.active(), Tab::Settings);
        assert_eq!(navigator.current(), Some(Route::Settings));
    }

    /// Writing "team" takes a while, so a later selection can overtake it
    /// if writes are not ordered.
    #[derive(Default)]
    struct SlowTeamStore {
        values: Mutex<HashMap<String, String>>,
    }

    impl KeyValueStore for SlowTeamStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if value == "team" {
                std::thread::sleep(Duration::from_millis(200));
            }
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn latest_selection_wins_when_an_earlier_write_is_slow() {
        let storage = Arc::new(SlowTeamStore::default());
        let navigator = Navigator::new();
        navigator.mount_authenticated();

        let mut tabs = TabStore::restore(storage.clone());
        drop(tabs.select(Tab::Team, &navigator));
        tokio::time::sleep(Duration::from_millis(20)).await;
        tabs.select(Tab::Settings, &navigator).await;

        assert_eq!(tabs.active(), Tab::Settings);
        assert_eq!(
            storage.get(ACTIVE_TAB_KEY).unwrap().as_deref(),
            Some("settings")
        );
        assert_eq!(TabStore::restore(storage).active(), Tab::Settings);
    }
}
