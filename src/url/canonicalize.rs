use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use unicode_normalization::UnicodeNormalization;
use url::{form_urlencoded, Url};

/// Ad-click identifiers removed during canonicalization (every `utm_*` key is removed too)
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "gbraid", "wbraid", "msclkid", "yclid", "twclid", "ttclid",
    "li_fat_id", "mc_cid", "mc_eid", "igshid", "_ga", "_gl",
];

/// Characters left unescaped inside a path segment: RFC 3986 unreserved and sub-delims, ':' and '@'.
/// Everything else, including '/' and '%', is escaped so decode/encode round-trips exactly.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b':')
    .remove(b'@');

/// Canonicalizes a raw URL into the stable key used for deduplication
///
/// # Canonicalization Steps
///
/// 1. Percent-decode each path segment and query component
/// 2. Unicode-normalize decoded text to NFC
/// 3. Strip the fragment
/// 4. Remove tracking query parameters (`utm_*` and ad-click IDs)
/// 5. Lowercase the host
/// 6. Strip trailing slashes from a non-root path
/// 7. Re-encode the path with a fixed escape set
///
/// The function is total: input that cannot be parsed as a hierarchical URL is
/// returned unchanged. A bad URL only costs deduplication quality and must
/// never block a fetch.
///
/// Applying it twice yields the same string as applying it once.
///
/// # Examples
///
/// ```
/// use seedline::url::canonicalize;
///
/// assert_eq!(
///     canonicalize("https://EXAMPLE.com/a/?utm_source=x&id=1#top"),
///     "https://example.com/a?id=1"
/// );
/// assert_eq!(canonicalize("not a url"), "not a url");
/// ```
pub fn canonicalize(raw: &str) -> String {
    match try_canonicalize(raw) {
        Some(canonical) => canonical,
        None => {
            tracing::debug!(url = raw, "URL could not be canonicalized, keeping it as-is");
            raw.to_string()
        }
    }
}

fn try_canonicalize(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;

    if url.cannot_be_a_base() {
        return None;
    }

    let host = url.host_str()?.to_lowercase();
    url.set_host(Some(&host)).ok()?;

    url.set_fragment(None);

    let path = canonical_path(url.path());
    url.set_path(&path);

    if let Some(query) = url.query() {
        let query = canonical_query(query);
        url.set_query(query.as_deref());
    }

    Some(url.to_string())
}

/// Drops tracking parameters and re-encodes the rest in their original order
///
/// A bare key (`?flag`) is written back without `=`.
fn canonical_query(query: &str) -> Option<String> {
    let parts: Vec<String> = query
        .split('&')
        .filter(|piece| !piece.is_empty())
        .filter_map(|piece| {
            let (raw_key, raw_value) = match piece.split_once('=') {
                Some((key, value)) => (key, Some(value)),
                None => (piece, None),
            };

            let key = decode_query_component(raw_key);
            if is_tracking_param(&key) {
                return None;
            }

            let key = encode_query_component(&key);
            Some(match raw_value {
                Some(value) => {
                    let value = decode_query_component(value);
                    format!("{}={}", key, encode_query_component(&value))
                }
                None => key,
            })
        })
        .collect();

    (!parts.is_empty()).then(|| parts.join("&"))
}

/// Form-decodes a query key or value and composes it to NFC
fn decode_query_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().nfc().collect()
}

fn encode_query_component(text: &str) -> String {
    form_urlencoded::byte_serialize(text.as_bytes()).collect()
}

/// Decodes, NFC-normalizes and re-encodes every segment of a path
fn canonical_path(path: &str) -> String {
    let mut segments: Vec<String> = Vec::new();

    for (index, segment) in path.split('/').enumerate() {
        let decoded = percent_decode_str(segment).decode_utf8_lossy();
        let composed: String = decoded.nfc().collect();

        match composed.as_str() {
            "." => continue,
            ".." => {
                if segments.len() > 1 {
                    segments.pop();
                }
            }
            _ if index == 0 => segments.push(String::new()),
            _ => segments.push(utf8_percent_encode(&composed, PATH_SEGMENT).to_string()),
        }
    }

    let mut joined = segments.join("/");

    while joined.len() > 1 && joined.ends_with('/') {
        joined.pop();
    }

    if !joined.starts_with('/') {
        joined.insert(0, '/');
    }

    joined
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_idempotent(raw: &str) {
        let once = canonicalize(raw);
        let twice = canonicalize(&once);
        assert_eq!(once, twice, "canonicalize is not idempotent for {}", raw);
    }

    #[test]
    fn test_strips_tracking_keeps_other_params() {
        assert_eq!(
            canonicalize("https://example.com/a?utm_source=x&id=1"),
            "https://example.com/a?id=1"
        );
    }

    #[test]
    fn test_strips_ad_click_ids() {
        assert_eq!(
            canonicalize("https://example.com/p?gclid=1&fbclid=2&msclkid=3&UTM_Medium=m"),
            "https://example.com/p"
        );
    }

    #[test]
    fn test_keeps_parameter_order() {
        assert_eq!(
            canonicalize("https://example.com/p?b=2&utm_term=t&a=1"),
            "https://example.com/p?b=2&a=1"
        );
    }

    #[test]
    fn test_lowercases_host_not_path() {
        assert_eq!(
            canonicalize("https://EXAMPLE.COM/Page"),
            "https://example.com/Page"
        );
    }

    #[test]
    fn test_strips_fragment() {
        assert_eq!(
            canonicalize("https://example.com/page#section"),
            "https://example.com/page"
        );
    }

    #[test]
    fn test_strips_trailing_slash_except_root() {
        assert_eq!(
            canonicalize("https://example.com/page/"),
            "https://example.com/page"
        );
        assert_eq!(canonicalize("https://example.com/"), "https://example.com/");
        assert_eq!(canonicalize("https://example.com"), "https://example.com/");
    }

    #[test]
    fn test_repeated_trailing_slashes() {
        assert_eq!(
            canonicalize("https://example.com/a//"),
            "https://example.com/a"
        );
    }

    #[test]
    fn test_decodes_unreserved_escapes() {
        assert_eq!(
            canonicalize("https://example.com/%7Euser/%61bc"),
            "https://example.com/~user/abc"
        );
    }

    #[test]
    fn test_encoded_slash_stays_inside_segment() {
        assert_eq!(
            canonicalize("https://example.com/a%2Fb/c"),
            "https://example.com/a%2Fb/c"
        );
    }

    #[test]
    fn test_unicode_nfc_normalization() {
        // "e" + COMBINING ACUTE ACCENT composes to U+00E9
        let decomposed = canonicalize("https://example.com/cafe%CC%81");
        let composed = canonicalize("https://example.com/caf%C3%A9");
        assert_eq!(decomposed, composed);
        assert_eq!(composed, "https://example.com/caf%C3%A9");
    }

    #[test]
    fn test_lowercase_escapes_are_uppercased() {
        assert_eq!(
            canonicalize("https://example.com/caf%c3%a9"),
            "https://example.com/caf%C3%A9"
        );
    }

    #[test]
    fn test_empty_query_removed() {
        assert_eq!(
            canonicalize("https://example.com/a?"),
            "https://example.com/a"
        );
    }

    #[test]
    fn test_malformed_input_fails_soft() {
        assert_eq!(canonicalize("not a url"), "not a url");
        assert_eq!(canonicalize(""), "");
        assert_eq!(canonicalize("http://"), "http://");
        assert_eq!(canonicalize("mailto:someone@example.com"), "mailto:someone@example.com");
    }

    #[test]
    fn test_idempotence_over_varied_inputs() {
        for raw in [
            "https://example.com/a?utm_source=x&id=1",
            "https://EXAMPLE.com/A/b/?q=hello world&utm_campaign=c#frag",
            "https://example.com/a%2Fb/%25252F/c",
            "https://example.com/path%20with%20spaces/",
            "https://example.com/a?v=100%25&w=%2526",
            "https://example.com/cafe%CC%81?name=Jos%C3%A9",
            "https://example.com/a/b/%2e%2e/c",
            "http://example.com:80/x//y//",
            "https://[::1]:8443/ipv6/",
            "https://example.com/?flag",
            "https://example.com/a?flag&utm_source=x&id=1",
            "not a url",
        ] {
            assert_idempotent(raw);
        }

        assert_eq!(canonicalize("https://example.com/?flag"), "https://example.com/?flag");
        assert_eq!(
            canonicalize("https://example.com/a?flag&utm_source=x&id=1"),
            "https://example.com/a?flag&id=1"
        );
        assert_eq!(
            canonicalize("https://example.com/a?empty=&flag"),
            "https://example.com/a?empty=&flag"
        );
    }
}
