use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::api::types::{Page, PokemonDetails, Species};
use crate::api::{ApiClientError, PokeApiClient};

/// Percent-encoding set for path segments (encode everything except unreserved chars).
const SEGMENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

impl PokeApiClient {
    /// Fetch one page of the catalog starting at `offset`.
    pub async fn list_pokemon(&self, limit: u32, offset: u32) -> Result<Page, ApiClientError> {
        let url = self.url(&format!("/pokemon?limit={limit}&offset={offset}"));
        self.get(&url).await
    }

    /// Fetch a full detail record from the URL carried by a list reference.
    pub async fn get_details(&self, url: &str) -> Result<PokemonDetails, ApiClientError> {
        if url.is_empty() {
            return Err(ApiClientError::InvalidUrl("empty detail URL".into()));
        }
        self.get(url).await
    }

    /// Fetch a species record (flavor text, habitat, generation).
    pub async fn get_species(&self, url: &str) -> Result<Species, ApiClientError> {
        if url.is_empty() {
            return Err(ApiClientError::InvalidUrl("empty species URL".into()));
        }
        self.get(url).await
    }

    /// Detail URL for a name or numeric id, in the same shape list
    /// references use.
    pub fn pokemon_url(&self, name_or_id: &str) -> String {
        let segment = name_or_id.trim().to_lowercase();
        let encoded = utf8_percent_encode(&segment, SEGMENT_ENCODE_SET);
        self.url(&format!("/pokemon/{encoded}/"))
    }
}
