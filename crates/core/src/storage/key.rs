//! File naming and object key helpers.

use chrono::Utc;
use percent_encoding::percent_decode_str;
use url::Url;
use uuid::Uuid;

use super::error::StorageError;

/// Sanitize a display file name.
///
/// Every whitespace run becomes a single underscore and path separators
/// become underscores, so the name is safe as the last segment of a path or
/// key. Applying it twice changes nothing.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    let mut in_whitespace = false;

    for c in name.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                sanitized.push('_');
            }
            in_whitespace = true;
        } else {
            in_whitespace = false;
            sanitized.push(if c == '/' || c == '\\' { '_' } else { c });
        }
    }

    sanitized
}

/// Longest name part kept in a physical name, so the whole name stays
/// under the usual 255-byte filesystem limit.
const MAX_PHYSICAL_NAME_PART: usize = 180;

/// Physical name for a sanitized file name.
///
/// Format: `{unix_millis}-{uuid_v4}-{name}`. The random part keeps
/// concurrent uploads of the same name for the same owner apart. Long names
/// are cut at a character boundary; the display name is unaffected.
#[must_use]
pub fn physical_name(safe_name: &str) -> String {
    let mut end = safe_name.len().min(MAX_PHYSICAL_NAME_PART);
    while !safe_name.is_char_boundary(end) {
        end -= 1;
    }

    format!(
        "{}-{}-{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4(),
        &safe_name[..end]
    )
}

/// Reject owner ids that would escape their namespace.
pub fn validate_owner_id(owner_id: &str) -> Result<(), StorageError> {
    if owner_id.is_empty()
        || owner_id == "."
        || owner_id == ".."
        || owner_id.contains(['/', '\\'])
    {
        return Err(StorageError::invalid_key(format!(
            "owner id {owner_id:?} is not a valid path segment"
        )));
    }
    Ok(())
}

/// Public URL of `key` in `bucket`, path-style: `{endpoint}/{bucket}/{key}`.
///
/// A trailing slash on the endpoint is ignored and every key segment is
/// percent-encoded.
pub fn object_url(endpoint: &str, bucket: &str, key: &str) -> Result<String, StorageError> {
    let mut url = Url::parse(endpoint).map_err(|e| {
        StorageError::configuration(format!("invalid endpoint URL {endpoint:?}: {e}"))
    })?;

    url.path_segments_mut()
        .map_err(|()| {
            StorageError::configuration(format!("endpoint URL {endpoint:?} cannot hold a path"))
        })?
        .pop_if_empty()
        .push(bucket)
        .extend(key.split('/'));

    Ok(url.to_string())
}

/// Object key of a stored path.
///
/// Stored paths are full URLs when written by [`object_url`], but older or
/// hand-entered records may hold `s3://bucket/key`, `bucket/key` or a bare
/// key. Returns `None` only for an empty path.
#[must_use]
pub fn extract_object_key(stored_path: &str, bucket: &str) -> Option<String> {
    if stored_path.is_empty() {
        return None;
    }

    let bucket_prefix = format!("{bucket}/");

    if let Ok(url) = Url::parse(stored_path) {
        let decoded = percent_decode_str(url.path()).decode_utf8_lossy();
        let path = decoded.strip_prefix('/').unwrap_or(&decoded);
        let key = path.strip_prefix(&bucket_prefix).unwrap_or(path);
        return Some(key.to_string());
    }

    let value = stored_path.strip_prefix("s3://").unwrap_or(stored_path);
    if let Some(key) = value.strip_prefix(&bucket_prefix) {
        return Some(key.to_string());
    }
    if let Some(key) = value.strip_prefix('/') {
        return Some(key.to_string());
    }
    Some(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Informe turno AM", "Informe_turno_AM")]
    #[case("a  \t b", "a_b")]
    #[case(" leading", "_leading")]
    #[case("report.pdf", "report.pdf")]
    #[case("../../etc/passwd", ".._.._etc_passwd")]
    #[case("dir\\file.txt", "dir_file.txt")]
    #[case("", "")]
    fn test_sanitize_file_name(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize_file_name(input), expected);
    }

    #[test]
    fn test_physical_name_format() {
        let name = physical_name("a.txt");
        let (millis, rest) = name.split_once('-').expect("timestamp prefix");
        assert!(millis.parse::<i64>().is_ok());
        assert!(rest.ends_with("-a.txt"));
        let uuid = &rest[..rest.len() - "-a.txt".len()];
        assert!(Uuid::parse_str(uuid).is_ok());
    }

    #[test]
    fn test_physical_name_caps_long_names() {
        let long = "ñ".repeat(200);
        let name = physical_name(&long);

        assert!(name.len() < 255);
        assert!(name.ends_with(&"ñ".repeat(MAX_PHYSICAL_NAME_PART / 2)));
    }

    #[test]
    fn test_physical_names_differ() {
        assert_ne!(physical_name("a.txt"), physical_name("a.txt"));
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("a/b")]
    #[case("a\\b")]
    fn test_validate_owner_id_rejects(#[case] owner: &str) {
        assert!(matches!(
            validate_owner_id(owner),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_validate_owner_id_accepts() {
        assert!(validate_owner_id("o1").is_ok());
        assert!(validate_owner_id("550e8400-e29b-41d4-a716-446655440000").is_ok());
    }

    #[test]
    fn test_object_url() {
        let url = object_url("https://storage.example.com", "fleet", "o1/123-x-a.txt")
            .expect("valid url");
        assert_eq!(url, "https://storage.example.com/fleet/o1/123-x-a.txt");
    }

    #[test]
    fn test_object_url_trailing_slash() {
        let url = object_url("https://storage.example.com/", "fleet", "o1/a.txt")
            .expect("valid url");
        assert_eq!(url, "https://storage.example.com/fleet/o1/a.txt");
    }

    #[test]
    fn test_object_url_endpoint_with_path() {
        let url = object_url("https://example.com/s3/", "fleet", "o1/a.txt").expect("valid url");
        assert_eq!(url, "https://example.com/s3/fleet/o1/a.txt");
    }

    #[test]
    fn test_object_url_encodes_segments() {
        let url = object_url("https://example.com", "fleet", "o1/a#1?.txt").expect("valid url");
        assert_eq!(url, "https://example.com/fleet/o1/a%231%3F.txt");
    }

    #[test]
    fn test_object_url_invalid_endpoint() {
        assert!(matches!(
            object_url("not a url", "fleet", "k"),
            Err(StorageError::Configuration(_))
        ));
    }

    #[rstest]
    #[case("https://storage.railway.app/fleet/o1/a.png", "o1/a.png")]
    #[case("https://storage.railway.app/other/o1/a.png", "other/o1/a.png")]
    #[case("https://example.com/fleet/o1/a%20b.png", "o1/a b.png")]
    #[case("s3://fleet/o1/a.png", "o1/a.png")]
    #[case("fleet/o1/a.png", "o1/a.png")]
    #[case("/o1/a.png", "o1/a.png")]
    #[case("o1/a.png", "o1/a.png")]
    fn test_extract_object_key(#[case] stored_path: &str, #[case] expected: &str) {
        assert_eq!(
            extract_object_key(stored_path, "fleet").as_deref(),
            Some(expected)
        );
    }

    #[test]
    fn test_extract_object_key_empty() {
        assert_eq!(extract_object_key("", "fleet"), None);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn segment() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_-]([A-Za-z0-9._ -]{0,14}[A-Za-z0-9_-])?"
    }

    fn key() -> impl Strategy<Value = String> {
        prop::collection::vec(segment(), 1..4).prop_map(|segments| segments.join("/"))
    }

    // Extraction undoes URL construction for any bucket and key.
    proptest! {
        #[test]
        fn prop_extract_inverts_object_url(
            bucket in "[a-z0-9][a-z0-9-]{2,20}",
            key in key(),
            trailing_slash in any::<bool>(),
        ) {
            let endpoint = if trailing_slash {
                "https://storage.example.com/"
            } else {
                "https://storage.example.com"
            };
            let url = object_url(endpoint, &bucket, &key).expect("valid url");
            prop_assert_eq!(extract_object_key(&url, &bucket), Some(key));
        }
    }

    // Bare `bucket/key` and `s3://bucket/key` forms resolve to the same key.
    proptest! {
        #[test]
        fn prop_extract_bare_forms(
            bucket in "[a-z0-9][a-z0-9-]{2,20}",
            key in key(),
        ) {
            prop_assert_eq!(
                extract_object_key(&format!("{bucket}/{key}"), &bucket),
                Some(key.clone())
            );
            prop_assert_eq!(
                extract_object_key(&format!("s3://{bucket}/{key}"), &bucket),
                Some(key)
            );
        }
    }

    // Sanitizing is idempotent and leaves no whitespace or separators.
    proptest! {
        #[test]
        fn prop_sanitize_idempotent(name in ".*") {
            let once = sanitize_file_name(&name);
            prop_assert_eq!(sanitize_file_name(&once), once.clone());
            prop_assert!(!once.chars().any(|c| c.is_whitespace() || c == '/' || c == '\\'));
        }
    }
}
