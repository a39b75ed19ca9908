//! Two-pass rule matching: exact urls first, then `:param` urls.

use crate::model::Rule;
use std::collections::HashMap;

/// Find the first rule in `rules` matching the method and remainder path.
///
/// Pass 1 considers only literal urls, so an exact route can never be
/// shadowed by a parameterized one declared earlier. Pass 2 tries `:name`
/// urls in declaration order; the extracted parameters are returned for the
/// pathParam namespace.
pub fn find_matching_rule<'a>(
    rules: &'a [Rule],
    method: &str,
    path: &str,
) -> Option<(&'a Rule, HashMap<String, String>)> {
    let method = method.to_uppercase();

    // Exact pass.
    for rule in rules {
        if !eligible(rule, &method) {
            continue;
        }
        let url = normalize_url(&rule.url);
        if url.contains(':') {
            continue;
        }
        if url == path {
            return Some((rule, HashMap::new()));
        }
    }

    // Parameterized pass.
    let actual: Vec<&str> = segments(path);
    for rule in rules {
        if !eligible(rule, &method) {
            continue;
        }
        let url = normalize_url(&rule.url);
        if !url.contains(':') {
            continue;
        }
        if let Some(params) = match_segments(&segments(&url), &actual) {
            return Some((rule, params));
        }
    }

    None
}

fn eligible(rule: &Rule, method: &str) -> bool {
    rule.active && rule.method.to_uppercase() == method
}

fn normalize_url(url: &str) -> String {
    if url.starts_with('/') {
        url.to_string()
    } else {
        format!("/{url}")
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// A pattern matches only with identical segment counts; `:name` segments
/// bind unconditionally, literal segments must match verbatim.
fn match_segments(pattern: &[&str], actual: &[&str]) -> Option<HashMap<String, String>> {
    if pattern.len() != actual.len() {
        return None;
    }
    let mut params = HashMap::new();
    for (p, a) in pattern.iter().zip(actual.iter()) {
        if let Some(name) = p.strip_prefix(':') {
            params.insert(name.to_string(), a.to_string());
        } else if p != a {
            return None;
        }
    }
    Some(params)
}
