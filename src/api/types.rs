use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Catalog list
// ---------------------------------------------------------------------------

/// Lightweight pointer to a detail record, as returned by list endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListReference {
    pub name: String,
    pub url: String,
}

/// One page of the catalog. `next` is an absolute URL carrying the offset
/// of the following page, or `None` once the list is exhausted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub results: Vec<ListReference>,
}

// ---------------------------------------------------------------------------
// Pokemon detail record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokemonDetails {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub sprites: Sprites,
    #[serde(default)]
    pub types: Vec<TypeSlot>,
    /// Decimetres.
    #[serde(default)]
    pub height: u32,
    /// Hectograms.
    #[serde(default)]
    pub weight: u32,
    #[serde(default)]
    pub abilities: Vec<AbilitySlot>,
    #[serde(default)]
    pub stats: Vec<StatSlot>,
    #[serde(default)]
    pub moves: Vec<MoveSlot>,
    #[serde(default)]
    pub species: Option<NamedResource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sprites {
    #[serde(default)]
    pub front_default: Option<String>,
    #[serde(default)]
    pub back_default: Option<String>,
    #[serde(default)]
    pub front_shiny: Option<String>,
    #[serde(default)]
    pub back_shiny: Option<String>,
    #[serde(default)]
    pub other: Option<OtherSprites>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OtherSprites {
    #[serde(rename = "official-artwork", default)]
    pub official_artwork: Option<Artwork>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artwork {
    #[serde(default)]
    pub front_default: Option<String>,
}

/// `{ name, url }` as used throughout PokeAPI for linked resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedResource {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSlot {
    #[serde(rename = "type")]
    pub type_: NamedResource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilitySlot {
    pub ability: NamedResource,
    #[serde(default)]
    pub is_hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatSlot {
    pub base_stat: u32,
    pub stat: NamedResource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveSlot {
    #[serde(rename = "move")]
    pub move_: NamedResource,
}

/// Highest base stat in the games; stat bars are scaled against it.
pub const MAX_BASE_STAT: u32 = 255;

impl PokemonDetails {
    /// Official artwork, falling back to the default front sprite.
    pub fn primary_image(&self) -> Option<&str> {
        self.sprites
            .other
            .as_ref()
            .and_then(|o| o.official_artwork.as_ref())
            .and_then(|a| a.front_default.as_deref())
            .filter(|s| !s.is_empty())
            .or(self.sprites.front_default.as_deref())
    }

    pub fn type_names(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.type_.name.as_str()).collect()
    }

    /// Named sprite variants that are present, in display order.
    pub fn sprite_variants(&self) -> Vec<(&'static str, &str)> {
        [
            ("Front", &self.sprites.front_default),
            ("Back", &self.sprites.back_default),
            ("Shiny Front", &self.sprites.front_shiny),
            ("Shiny Back", &self.sprites.back_shiny),
        ]
        .into_iter()
        .filter_map(|(label, url)| url.as_deref().map(|u| (label, u)))
        .collect()
    }
}

/// Height in metres, e.g. `7` -> `"0.7 m"`.
pub fn format_height(decimetres: u32) -> String {
    format!("{} m", f64::from(decimetres) / 10.0)
}

/// Weight in kilograms, e.g. `69` -> `"6.9 kg"`.
pub fn format_weight(hectograms: u32) -> String {
    format!("{} kg", f64::from(hectograms) / 10.0)
}

/// Stat names come hyphenated (`special-attack`); only the first hyphen
/// is replaced.
pub fn format_stat_name(name: &str) -> String {
    name.replacen('-', " ", 1)
}

// ---------------------------------------------------------------------------
// Species
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    #[serde(default)]
    pub flavor_text_entries: Vec<FlavorText>,
    #[serde(default)]
    pub color: Option<NamedResource>,
    #[serde(default)]
    pub habitat: Option<NamedResource>,
    #[serde(default)]
    pub generation: Option<NamedResource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlavorText {
    pub flavor_text: String,
    pub language: NamedResource,
}

impl Species {
    /// First English flavor text with form feeds turned into spaces.
    pub fn english_description(&self) -> Option<String> {
        self.flavor_text_entries
            .iter()
            .find(|entry| entry.language.name == "en")
            .map(|entry| entry.flavor_text.replace('\u{c}', " "))
    }
}

/// Description line for the detail screen, covering the missing-species case.
pub fn describe(species: Option<&Species>) -> String {
    match species {
        None => "No description available".to_string(),
        Some(s) => s
            .english_description()
            .unwrap_or_else(|| "No English description available".to_string()),
    }
}
