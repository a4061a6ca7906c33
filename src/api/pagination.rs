use url::Url;

/// Query parameter carrying the list cursor.
pub const OFFSET_PARAM: &str = "offset";

/// Extract the offset cursor from a page's `next` URL.
///
/// Returns `None` when there is no next page, the URL does not parse, or the
/// offset parameter is missing or not an integer.
pub fn next_offset(next: Option<&str>) -> Option<u32> {
    let url = Url::parse(next?).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == OFFSET_PARAM)
        .and_then(|(_, value)| value.parse().ok())
}
