//! Media reference extraction from fetched article pages

use regex::Regex;
use std::sync::LazyLock;

static VOICE_FILEID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"voice_encode_fileid="(.+?)""#).expect("voice_encode_fileid pattern is valid")
});

/// Collect every `voice_encode_fileid="..."` value in order of appearance.
///
/// Duplicates are kept; no match yields an empty vector.
pub fn media_references(content: &str) -> Vec<String> {
    VOICE_FILEID
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}
