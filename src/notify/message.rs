use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::notify::intent::{IntentParseError, NavigationIntent, SCREEN_KEY};

/// How a message reached the app.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Received while the app is in front. Observed only.
    Foreground,
    /// Received while the app is not in front. Observed only.
    Background,
    /// The user opened the app from the notification.
    #[default]
    Opened,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Foreground => "foreground",
            MessageKind::Background => "background",
            MessageKind::Opened => "opened",
        }
    }

    /// Whether a message of this kind should navigate.
    pub fn navigates(self) -> bool {
        matches!(self, MessageKind::Opened)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "foreground" => Ok(MessageKind::Foreground),
            "background" => Ok(MessageKind::Background),
            "opened" | "open" => Ok(MessageKind::Opened),
            other => Err(format!("unknown message kind: {other}")),
        }
    }
}

/// A push message as it travels over the wire: one JSON object per line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMessage {
    #[serde(default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

impl RemoteMessage {
    /// Build a message targeting `screen`, with the optional detail payload.
    pub fn to_screen(
        kind: MessageKind,
        screen: &str,
        url: Option<String>,
        name: Option<String>,
    ) -> Self {
        let mut data = HashMap::new();
        data.insert(SCREEN_KEY.to_string(), screen.to_string());
        if let Some(url) = url {
            data.insert("url".to_string(), url);
        }
        if let Some(name) = name {
            data.insert("name".to_string(), name);
        }
        Self { kind, data }
    }

    pub fn intent(&self) -> Result<NavigationIntent, IntentParseError> {
        NavigationIntent::parse(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::DetailParams;

    #[test]
    fn kind_defaults_to_opened() {
        let msg: RemoteMessage =
            serde_json::from_str(r#"{"data":{"Screen":"Settings"}}"#).unwrap();
        assert_eq!(msg.kind, MessageKind::Opened);
        assert_eq!(msg.intent(), Ok(NavigationIntent::Screen("Settings".into())));
    }

    #[test]
    fn wire_format_is_lowercase_kind_and_flat_data() {
        let msg = RemoteMessage::to_screen(
            MessageKind::Background,
            "PokemonDetails",
            Some("https://pokeapi.co/api/v2/pokemon/1/".into()),
            Some("bulbasaur".into()),
        );
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["kind"], "background");
        assert_eq!(json["data"]["Screen"], "PokemonDetails");
        assert_eq!(json["data"]["name"], "bulbasaur");

        assert_eq!(
            msg.intent(),
            Ok(NavigationIntent::PokemonDetails(DetailParams {
                url: "https://pokeapi.co/api/v2/pokemon/1/".into(),
                name: "bulbasaur".into(),
            }))
        );
    }

    #[test]
    fn only_opened_messages_navigate() {
        assert!(MessageKind::Opened.navigates());
        assert!(!MessageKind::Foreground.navigates());
        assert!(!MessageKind::Background.navigates());
        assert_eq!("Foreground".parse::<MessageKind>(), Ok(MessageKind::Foreground));
        assert!("silent".parse::<MessageKind>().is_err());
    }
}
