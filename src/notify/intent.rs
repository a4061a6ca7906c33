use std::collections::HashMap;

use thiserror::Error;

use crate::nav::{DetailParams, Route};

/// Data key naming the target screen.
pub const SCREEN_KEY: &str = "Screen";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentParseError {
    #[error("message carries no {SCREEN_KEY:?} entry")]
    MissingScreen,
    #[error("message {SCREEN_KEY:?} entry is empty")]
    EmptyScreen,
}

/// A validated request to navigate, parsed once from a message's data map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationIntent {
    /// Open the detail screen for one record. Needs the authenticated flow.
    PokemonDetails(DetailParams),
    /// Navigate to a screen by name.
    Screen(String),
}

impl NavigationIntent {
    /// Detail intents need both `url` and `name`; a detail screen without
    /// them is passed through as a plain screen name and will fail to
    /// navigate.
    pub fn parse(data: &HashMap<String, String>) -> Result<Self, IntentParseError> {
        let screen = data
            .get(SCREEN_KEY)
            .ok_or(IntentParseError::MissingScreen)?
            .trim();
        if screen.is_empty() {
            return Err(IntentParseError::EmptyScreen);
        }

        let non_empty = |key: &str| data.get(key).filter(|v| !v.is_empty()).cloned();
        if screen == Route::DETAILS
            && let (Some(url), Some(name)) = (non_empty("url"), non_empty("name"))
        {
            return Ok(NavigationIntent::PokemonDetails(DetailParams { url, name }));
        }

        Ok(NavigationIntent::Screen(screen.to_string()))
    }

    pub fn screen(&self) -> &str {
        match self {
            NavigationIntent::PokemonDetails(_) => Route::DETAILS,
            NavigationIntent::Screen(name) => name,
        }
    }
}
