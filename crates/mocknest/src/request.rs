//! Normalized view of an inbound request, shared by the condition evaluator,
//! the response resolver, and the script sandbox.

use std::collections::HashMap;

/// Request data captured once per request, before any suspension point.
#[derive(Debug, Clone, Default)]
pub struct RequestView {
    /// Uppercased HTTP method.
    pub method: String,
    /// Remainder path after service-prefix stripping.
    pub path: String,
    /// Query parameters decoded from the URL.
    pub query: HashMap<String, String>,
    /// Headers with lowercased keys.
    pub headers: HashMap<String, String>,
    /// Raw request body text.
    pub body: String,
    /// Body parsed as JSON, when the content family allows it.
    pub body_json: Option<serde_json::Value>,
    /// Form fields decoded from an urlencoded body.
    pub form: HashMap<String, String>,
    /// Path parameters bound by the parameterized matching pass.
    pub path_params: HashMap<String, String>,
}

impl RequestView {
    pub fn new(
        method: &str,
        path: &str,
        query_string: Option<&str>,
        headers: &hyper::HeaderMap,
        body: &str,
    ) -> Self {
        let headers_map: HashMap<String, String> = headers
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|val| (k.as_str().to_lowercase(), val.to_string()))
            })
            .collect();

        let content_type = headers_map
            .get("content-type")
            .map(String::as_str)
            .unwrap_or("");

        // Decode the body by content family: JSON bodies feed body-source
        // conditions and scripts, urlencoded bodies feed the form namespace.
        let body_json = if content_type.contains("json") || body.trim_start().starts_with(['{', '['])
        {
            serde_json::from_str(body).ok()
        } else {
            None
        };
        let form = if content_type.contains("application/x-www-form-urlencoded") {
            parse_urlencoded(body)
        } else {
            HashMap::new()
        };

        Self {
            method: method.to_uppercase(),
            path: path.to_string(),
            query: parse_urlencoded(query_string.unwrap_or("")),
            headers: headers_map,
            body: body.to_string(),
            body_json,
            form,
            path_params: HashMap::new(),
        }
    }

    pub fn header(&self, key: &str) -> Option<&String> {
        self.headers.get(&key.to_lowercase())
    }

    /// Look up a body value by key. JSON bodies support dotted paths into
    /// nested objects; urlencoded bodies are flat key lookups.
    pub fn body_value(&self, key: &str) -> Option<String> {
        if let Some(ref json) = self.body_json {
            let pointer = format!("/{}", key.replace('.', "/"));
            return json.pointer(&pointer).map(json_leaf_to_string);
        }
        self.form.get(key).cloned()
    }
}

fn json_leaf_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Decode `k=v&k2=v2` pairs, percent-decoding both sides.
pub fn parse_urlencoded(input: &str) -> HashMap<String, String> {
    input
        .split('&')
        .filter(|s| !s.is_empty())
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next().unwrap_or("");
            Some((
                urlencoding::decode(key).unwrap_or_default().into_owned(),
                urlencoding::decode(value).unwrap_or_default().into_owned(),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_pairs() {
        let query = parse_urlencoded("page=2&q=hello%20world&flag");
        assert_eq!(query.get("page"), Some(&"2".to_string()));
        assert_eq!(query.get("q"), Some(&"hello world".to_string()));
        assert!(!query.contains_key("flag"));
    }

    #[test]
    fn json_body_supports_dotted_lookup() {
        let mut headers = hyper::HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        let view = RequestView::new(
            "post",
            "/orders",
            None,
            &headers,
            r#"{"user": {"id": 42}, "kind": "express"}"#,
        );
        assert_eq!(view.method, "POST");
        assert_eq!(view.body_value("kind"), Some("express".to_string()));
        assert_eq!(view.body_value("user.id"), Some("42".to_string()));
        assert_eq!(view.body_value("missing"), None);
    }

    #[test]
    fn urlencoded_body_feeds_form_namespace() {
        let mut headers = hyper::HeaderMap::new();
        headers.insert(
            "content-type",
            "application/x-www-form-urlencoded".parse().unwrap(),
        );
        let view = RequestView::new("POST", "/login", None, &headers, "user=alice&role=admin");
        assert_eq!(view.body_value("role"), Some("admin".to_string()));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut headers = hyper::HeaderMap::new();
        headers.insert("X-Api-Key", "secret".parse().unwrap());
        let view = RequestView::new("GET", "/", None, &headers, "");
        assert_eq!(view.header("x-api-key"), Some(&"secret".to_string()));
        assert_eq!(view.header("X-API-KEY"), Some(&"secret".to_string()));
    }
}
