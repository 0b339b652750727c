//! Query-string helpers for results carried in redirect URLs.

use std::collections::BTreeMap;

/// Parse a query string into a sorted parameter map.
///
/// Accepts a full URL, a bare query, or a query with a leading `?`.
/// Fragments are ignored. Repeated keys keep the last value.
pub fn parse(input: &str) -> BTreeMap<String, String> {
    let without_fragment = input.split('#').next().unwrap_or_default();
    let query = match without_fragment.split_once('?') {
        Some((_, query)) => query,
        None if without_fragment.contains('=') => without_fragment,
        None => return BTreeMap::new(),
    };

    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .map(|pairs| pairs.into_iter().collect())
        .unwrap_or_default()
}

/// Encode parameters as `application/x-www-form-urlencoded`.
pub fn stringify(params: &BTreeMap<String, String>) -> String {
    serde_urlencoded::to_string(params).unwrap_or_default()
}

/// Append parameters to a URL, using `?` or `&` as appropriate.
pub fn queryify(url: &str, params: &BTreeMap<String, String>) -> String {
    if params.is_empty() {
        return url.to_string();
    }

    if let Ok(mut parsed) = url::Url::parse(url) {
        parsed.query_pairs_mut().extend_pairs(params.iter());
        return parsed.into();
    }

    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, separator, stringify(params))
}

/// Convert parsed parameters into a JSON object payload.
pub fn to_payload(params: BTreeMap<String, String>) -> serde_json::Value {
    serde_json::Value::Object(
        params
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect(),
    )
}
