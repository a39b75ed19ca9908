//! Data-faking template expansion for JSON response bodies.
//!
//! A template is an ordinary JSON document whose leaves encode generation
//! directives, expanded into randomized values at response time:
//!
//! - Object keys may carry a count/range suffix: `"items|3"` or `"items|1-5"`.
//!   With an array value the first element is the item template, repeated N
//!   times; with a number value a random integer in the range is generated;
//!   with a string value the string is repeated N times.
//! - String leaves may be placeholder tokens: `@name`, `@email`, `@uuid`,
//!   `@word`, `@sentence`, `@city`, `@phone`, `@boolean`, `@datetime`,
//!   `@int(min,max)`. Unknown tokens pass through unchanged.
//!
//! Expansion never fails: a malformed template is reported to the caller as
//! `None` so the raw body can be sent instead.

use fake::faker::address::en::CityName;
use fake::faker::internet::en::FreeEmail;
use fake::faker::lorem::en::{Sentence, Word};
use fake::faker::name::en::Name;
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use rand::Rng;
use serde_json::{Map, Value};

/// Expand a JSON template body. Returns `None` when the body is not valid
/// JSON; the response pipeline then degrades to the raw body.
pub fn expand_template(body: &str) -> Option<String> {
    let template: Value = serde_json::from_str(body).ok()?;
    let expanded = expand_value(&template);
    serde_json::to_string(&expanded).ok()
}

fn expand_value(value: &Value) -> Value {
    match value {
        Value::Object(obj) => expand_object(obj),
        Value::Array(arr) => Value::Array(arr.iter().map(expand_value).collect()),
        Value::String(s) => expand_string(s),
        other => other.clone(),
    }
}

fn expand_object(obj: &Map<String, Value>) -> Value {
    let mut out = Map::new();
    for (key, value) in obj {
        match parse_directive(key) {
            Some((plain_key, min, max)) => {
                let count = random_in(min, max);
                let generated = match value {
                    Value::Array(items) => {
                        let template = items.first().cloned().unwrap_or(Value::Null);
                        Value::Array((0..count).map(|_| expand_value(&template)).collect())
                    }
                    Value::Number(_) => Value::Number(random_in(min, max).into()),
                    Value::String(s) => Value::String(s.repeat(count as usize)),
                    other => expand_value(other),
                };
                out.insert(plain_key, generated);
            }
            None => {
                out.insert(key.clone(), expand_value(value));
            }
        }
    }
    Value::Object(out)
}

/// Parse a `key|min-max` or `key|count` directive. Malformed suffixes are
/// treated as literal keys.
fn parse_directive(key: &str) -> Option<(String, i64, i64)> {
    let (name, spec) = key.rsplit_once('|')?;
    if name.is_empty() {
        return None;
    }
    if let Some((lo, hi)) = spec.split_once('-') {
        let lo: i64 = lo.trim().parse().ok()?;
        let hi: i64 = hi.trim().parse().ok()?;
        if lo > hi {
            return None;
        }
        return Some((name.to_string(), lo, hi));
    }
    let count: i64 = spec.trim().parse().ok()?;
    Some((name.to_string(), count, count))
}

fn random_in(min: i64, max: i64) -> i64 {
    if min >= max {
        min
    } else {
        rand::thread_rng().gen_range(min..=max)
    }
}

fn expand_string(s: &str) -> Value {
    match s {
        "@name" => Value::String(Name().fake()),
        "@email" => Value::String(FreeEmail().fake()),
        "@uuid" => Value::String(uuid::Uuid::new_v4().to_string()),
        "@word" => Value::String(Word().fake()),
        "@sentence" => Value::String(Sentence(3..8).fake()),
        "@city" => Value::String(CityName().fake()),
        "@phone" => Value::String(PhoneNumber().fake()),
        "@boolean" => Value::Bool(rand::random()),
        "@datetime" => Value::String(chrono::Utc::now().to_rfc3339()),
        other => {
            if let Some(args) = other.strip_prefix("@int(").and_then(|r| r.strip_suffix(')')) {
                if let Some((lo, hi)) = args.split_once(',') {
                    if let (Ok(lo), Ok(hi)) = (lo.trim().parse::<i64>(), hi.trim().parse::<i64>()) {
                        return Value::Number(random_in(lo, hi).into());
                    }
                }
            }
            Value::String(other.to_string())
        }
    }
}
