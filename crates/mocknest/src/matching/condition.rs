//! Evaluation of a single typed condition against a request view.

use crate::model::{Condition, ConditionOperator, ConditionSource};
use crate::request::RequestView;
use tracing::debug;

/// Evaluate one condition. Matching is fail-closed: a missing value, a
/// malformed regex, or a non-numeric operand for gt/lt all evaluate to
/// `false`, never to an error.
pub fn evaluate_condition(condition: &Condition, view: &RequestView) -> bool {
    let actual = lookup(condition.source, &condition.key, view);

    if condition.operator == ConditionOperator::Exists {
        // The value field is ignored for existence checks.
        return actual.is_some();
    }

    let Some(actual) = actual else {
        return false;
    };

    match condition.operator {
        ConditionOperator::Equals => actual == condition.value,
        ConditionOperator::Contains => actual.contains(&condition.value),
        ConditionOperator::Regex => match regex::Regex::new(&condition.value) {
            Ok(re) => re.is_match(&actual),
            Err(e) => {
                debug!("Invalid condition regex '{}': {}", condition.value, e);
                false
            }
        },
        ConditionOperator::Gt => numeric(&actual, &condition.value)
            .map(|(a, b)| a > b)
            .unwrap_or(false),
        ConditionOperator::Lt => numeric(&actual, &condition.value)
            .map(|(a, b)| a < b)
            .unwrap_or(false),
        ConditionOperator::Exists => unreachable!("handled above"),
    }
}

fn lookup(source: ConditionSource, key: &str, view: &RequestView) -> Option<String> {
    match source {
        ConditionSource::Query => view.query.get(key).cloned(),
        ConditionSource::Header => view.header(key).cloned(),
        ConditionSource::Body => view.body_value(key),
        ConditionSource::PathParam => view.path_params.get(key).cloned(),
    }
}

fn numeric(a: &str, b: &str) -> Option<(f64, f64)> {
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn view() -> RequestView {
        let mut headers = hyper::HeaderMap::new();
        headers.insert("x-api-key", "secret".parse().unwrap());
        headers.insert("content-type", "application/json".parse().unwrap());
        let mut view = RequestView::new(
            "GET",
            "/users/42",
            Some("page=2&limit=50"),
            &headers,
            r#"{"kind": "express", "total": 17}"#,
        );
        view.path_params = HashMap::from([("id".to_string(), "42".to_string())]);
        view
    }

    fn cond(
        source: ConditionSource,
        key: &str,
        operator: ConditionOperator,
        value: &str,
    ) -> Condition {
        Condition {
            source,
            key: key.to_string(),
            operator,
            value: value.to_string(),
        }
    }

    #[test]
    fn equals_on_each_source() {
        let v = view();
        assert!(evaluate_condition(
            &cond(ConditionSource::Query, "page", ConditionOperator::Equals, "2"),
            &v
        ));
        assert!(evaluate_condition(
            &cond(
                ConditionSource::Header,
                "X-Api-Key",
                ConditionOperator::Equals,
                "secret"
            ),
            &v
        ));
        assert!(evaluate_condition(
            &cond(
                ConditionSource::Body,
                "kind",
                ConditionOperator::Equals,
                "express"
            ),
            &v
        ));
        assert!(evaluate_condition(
            &cond(
                ConditionSource::PathParam,
                "id",
                ConditionOperator::Equals,
                "42"
            ),
            &v
        ));
    }

    #[test]
    fn exists_ignores_value_field() {
        let v = view();
        assert!(evaluate_condition(
            &cond(
                ConditionSource::Query,
                "page",
                ConditionOperator::Exists,
                "ignored"
            ),
            &v
        ));
        assert!(!evaluate_condition(
            &cond(ConditionSource::Query, "missing", ConditionOperator::Exists, ""),
            &v
        ));
    }

    #[test]
    fn gt_lt_coerce_numbers_and_fail_closed() {
        let v = view();
        assert!(evaluate_condition(
            &cond(ConditionSource::Query, "limit", ConditionOperator::Gt, "10"),
            &v
        ));
        assert!(evaluate_condition(
            &cond(ConditionSource::Body, "total", ConditionOperator::Lt, "20"),
            &v
        ));
        // Non-numeric operand fails closed.
        assert!(!evaluate_condition(
            &cond(ConditionSource::Body, "kind", ConditionOperator::Gt, "10"),
            &v
        ));
    }

    #[test]
    fn malformed_regex_fails_closed() {
        let v = view();
        assert!(!evaluate_condition(
            &cond(
                ConditionSource::Query,
                "page",
                ConditionOperator::Regex,
                "[invalid"
            ),
            &v
        ));
        assert!(evaluate_condition(
            &cond(
                ConditionSource::Query,
                "page",
                ConditionOperator::Regex,
                r"^\d+$"
            ),
            &v
        ));
    }

    #[test]
    fn contains_on_missing_key_is_false() {
        let v = view();
        assert!(!evaluate_condition(
            &cond(
                ConditionSource::Header,
                "authorization",
                ConditionOperator::Contains,
                "Bearer"
            ),
            &v
        ));
    }
}
