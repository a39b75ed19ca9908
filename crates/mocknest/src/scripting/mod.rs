//! Sandboxed execution of user-authored response scripts.
//!
//! Scripts run in their own rhai engine and scope, created per invocation so
//! live edits take effect immediately and no state leaks between requests.
//! The isolated scope sees exactly three things: the `req` map passed to the
//! entry function, a `faker` object, and `print`/`debug` routed to tracing.
//! Every failure (compile, top-level eval, entry call) is returned as an
//! error for the caller to convert into a response; nothing can crash the
//! listener.

use crate::request::RequestView;
use anyhow::{anyhow, Result};
use fake::faker::address::en::CityName;
use fake::faker::internet::en::FreeEmail;
use fake::faker::lorem::en::{Sentence, Word};
use fake::faker::name::en::Name;
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use rhai::{Dynamic, Engine, EvalAltResult, Map, Scope};
use serde_json::Value;
use tracing::{debug, info};

/// Well-known entry symbol a script must define.
pub const ENTRY_FUNCTION: &str = "main";

/// Data-faking helper exposed to scripts as the second entry-function argument.
#[derive(Debug, Clone, Default)]
pub struct ScriptFaker;

/// Run a response script against an HTTP request view. The entry function's
/// return value is converted to JSON.
pub fn run_http_script(source: &str, view: &RequestView) -> Result<Value> {
    run_script(source, request_map(view))
}

/// Run a response script against a WebSocket message. The `req` map carries
/// the inbound text and the opaque client id.
pub fn run_ws_script(source: &str, message: &str, client_id: &str) -> Result<Value> {
    let mut req = Map::new();
    req.insert("message".into(), Dynamic::from(message.to_string()));
    req.insert("clientId".into(), Dynamic::from(client_id.to_string()));
    run_script(source, req)
}

fn run_script(source: &str, req: Map) -> Result<Value> {
    let engine = create_engine();
    let ast = engine
        .compile(source)
        .map_err(|e| anyhow!("Failed to compile script: {e}"))?;

    let mut scope = Scope::new();
    let result: Dynamic = engine
        .call_fn(&mut scope, &ast, ENTRY_FUNCTION, (req, ScriptFaker))
        .map_err(|e| match *e {
            EvalAltResult::ErrorFunctionNotFound(ref signature, _)
                if signature.starts_with(ENTRY_FUNCTION) =>
            {
                anyhow!("Script entry function '{ENTRY_FUNCTION}' is not defined")
            }
            _ => anyhow!("Script execution error: {e}"),
        })?;

    Ok(dynamic_to_json(result))
}

fn create_engine() -> Engine {
    let mut engine = Engine::new();

    engine
        .register_type_with_name::<ScriptFaker>("Faker")
        .register_fn("name", |_: &mut ScriptFaker| -> String { Name().fake() })
        .register_fn("email", |_: &mut ScriptFaker| -> String { FreeEmail().fake() })
        .register_fn("uuid", |_: &mut ScriptFaker| -> String {
            uuid::Uuid::new_v4().to_string()
        })
        .register_fn("word", |_: &mut ScriptFaker| -> String { Word().fake() })
        .register_fn("sentence", |_: &mut ScriptFaker| -> String {
            Sentence(3..8).fake()
        })
        .register_fn("city", |_: &mut ScriptFaker| -> String { CityName().fake() })
        .register_fn("phone", |_: &mut ScriptFaker| -> String {
            PhoneNumber().fake()
        })
        .register_fn("int", |_: &mut ScriptFaker, lo: i64, hi: i64| -> i64 {
            if lo >= hi {
                lo
            } else {
                use rand::Rng;
                rand::thread_rng().gen_range(lo..=hi)
            }
        })
        .register_fn("boolean", |_: &mut ScriptFaker| -> bool { rand::random() });

    // Script console output lands in the server log, never on the response.
    engine.on_print(|text| info!(target: "mocknest::script", "{text}"));
    engine.on_debug(|text, _, pos| debug!(target: "mocknest::script", "{pos:?} {text}"));

    engine
}

fn request_map(view: &RequestView) -> Map {
    let mut req = Map::new();
    req.insert("method".into(), Dynamic::from(view.method.clone()));
    req.insert("path".into(), Dynamic::from(view.path.clone()));

    let mut query = Map::new();
    for (k, v) in &view.query {
        query.insert(k.clone().into(), Dynamic::from(v.clone()));
    }
    req.insert("query".into(), Dynamic::from(query));

    let mut headers = Map::new();
    for (k, v) in &view.headers {
        headers.insert(k.clone().into(), Dynamic::from(v.clone()));
    }
    req.insert("headers".into(), Dynamic::from(headers));

    let mut params = Map::new();
    for (k, v) in &view.path_params {
        params.insert(k.clone().into(), Dynamic::from(v.clone()));
    }
    req.insert("params".into(), Dynamic::from(params));

    let body = match &view.body_json {
        Some(json) => json_to_dynamic(json.clone()),
        None => Dynamic::from(view.body.clone()),
    };
    req.insert("body".into(), body);

    req
}

pub(crate) fn json_to_dynamic(value: Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Dynamic::from(i)
            } else if let Some(f) = n.as_f64() {
                Dynamic::from(f)
            } else {
                Dynamic::UNIT
            }
        }
        Value::String(s) => Dynamic::from(s),
        Value::Array(arr) => {
            let vec: Vec<Dynamic> = arr.into_iter().map(json_to_dynamic).collect();
            Dynamic::from(vec)
        }
        Value::Object(obj) => {
            let mut map = Map::new();
            for (k, v) in obj {
                map.insert(k.into(), json_to_dynamic(v));
            }
            Dynamic::from(map)
        }
    }
}

pub(crate) fn dynamic_to_json(value: Dynamic) -> Value {
    if value.is_unit() {
        Value::Null
    } else if let Ok(b) = value.as_bool() {
        Value::Bool(b)
    } else if let Ok(i) = value.as_int() {
        Value::Number(i.into())
    } else if let Ok(f) = value.as_float() {
        Value::Number(serde_json::Number::from_f64(f).unwrap_or_else(|| 0.into()))
    } else if let Some(s) = value.clone().try_cast::<String>() {
        Value::String(s)
    } else if let Some(arr) = value.clone().try_cast::<Vec<Dynamic>>() {
        Value::Array(arr.into_iter().map(dynamic_to_json).collect())
    } else if let Some(map) = value.clone().try_cast::<Map>() {
        let mut obj = serde_json::Map::new();
        for (k, v) in map {
            obj.insert(k.to_string(), dynamic_to_json(v));
        }
        Value::Object(obj)
    } else {
        Value::String(format!("{value}"))
    }
}
