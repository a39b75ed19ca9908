//! Response resolution: pick the effective response descriptor for a matched
//! rule, then render it.
//!
//! The three override layers are an explicit priority order, first applicable
//! wins, and each layer fully overrides mode/type/body/status:
//!
//! 1. the first expectation whose conditions all hold,
//! 2. the active response preset, if one is selected and present,
//! 3. the rule's own defaults (status implicitly 200).

use crate::error::RenderError;
use crate::matching::evaluate_condition;
use crate::model::{ResponseMode, Rule};
use crate::request::RequestView;
use crate::scripting;
use crate::template;
use bytes::Bytes;
use std::path::Path;
use tracing::{debug, warn};

/// Content types rendered as binary file downloads in basic mode.
const BINARY_CONTENT_TYPES: [&str; 5] = [
    "application/pdf",
    "application/zip",
    "application/octet-stream",
    "video/mp4",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// Which override layer produced the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Expectation(usize),
    Preset,
    RuleDefault,
}

/// The effective response configuration after layer resolution.
#[derive(Debug, Clone)]
pub struct ResponseDescriptor {
    pub status_code: u16,
    pub mode: ResponseMode,
    pub content_type: String,
    pub body_basic: String,
    pub body_script: String,
    pub source: ResponseSource,
}

/// A fully rendered response body with its final status and content type.
#[derive(Debug)]
pub struct RenderedResponse {
    pub status_code: u16,
    pub content_type: String,
    pub body: Bytes,
    /// Set for binary file responses.
    pub content_disposition: Option<String>,
}

/// Pick the effective response descriptor for a matched rule.
pub fn resolve_descriptor(rule: &Rule, view: &RequestView) -> ResponseDescriptor {
    for (index, expectation) in rule.expectations.iter().enumerate() {
        if expectation.conditions.is_empty() {
            continue;
        }
        let holds = expectation
            .conditions
            .iter()
            .all(|c| evaluate_condition(c, view));
        if holds {
            debug!("Expectation {} matched for rule '{}'", index, rule.id);
            return ResponseDescriptor {
                status_code: expectation.status_code,
                mode: expectation.response_mode,
                content_type: expectation.response_type.clone(),
                body_basic: expectation.response_basic.clone(),
                body_script: expectation.response_advanced.clone(),
                source: ResponseSource::Expectation(index),
            };
        }
    }

    if let Some(ref preset_id) = rule.active_preset_id {
        if let Some(preset) = rule.response_presets.iter().find(|p| &p.id == preset_id) {
            return ResponseDescriptor {
                status_code: preset.status_code,
                mode: preset.response_mode,
                content_type: preset.response_type.clone(),
                body_basic: preset.response_basic.clone(),
                body_script: preset.response_advanced.clone(),
                source: ResponseSource::Preset,
            };
        }
        debug!(
            "Active preset '{}' not found on rule '{}', using defaults",
            preset_id, rule.id
        );
    }

    ResponseDescriptor {
        status_code: 200,
        mode: rule.response_mode,
        content_type: rule.response_type.clone(),
        body_basic: rule.response_basic.clone(),
        body_script: rule.response_advanced.clone(),
        source: ResponseSource::RuleDefault,
    }
}

/// Render a resolved descriptor into response bytes.
///
/// `mockjs_enabled` and `response_file` come from the rule, not the layer:
/// overrides replace the body, not the rule's file path or faking flag.
pub async fn render(
    descriptor: &ResponseDescriptor,
    rule: &Rule,
    view: &RequestView,
) -> Result<RenderedResponse, RenderError> {
    match descriptor.mode {
        ResponseMode::Advanced => render_script(descriptor, view),
        ResponseMode::Basic => {
            if is_binary_content_type(&descriptor.content_type) {
                render_file(descriptor, rule).await
            } else {
                Ok(render_text(descriptor, rule))
            }
        }
    }
}

pub fn is_binary_content_type(content_type: &str) -> bool {
    BINARY_CONTENT_TYPES
        .iter()
        .any(|t| content_type.eq_ignore_ascii_case(t))
}

fn render_script(
    descriptor: &ResponseDescriptor,
    view: &RequestView,
) -> Result<RenderedResponse, RenderError> {
    let value = scripting::run_http_script(&descriptor.body_script, view)
        .map_err(|e| RenderError::Script(e.to_string()))?;
    let body = serde_json::to_string(&value).unwrap_or_else(|_| "null".to_string());
    Ok(RenderedResponse {
        status_code: descriptor.status_code,
        content_type: "application/json".to_string(),
        body: Bytes::from(body),
        content_disposition: None,
    })
}

async fn render_file(
    descriptor: &ResponseDescriptor,
    rule: &Rule,
) -> Result<RenderedResponse, RenderError> {
    let path = rule.response_file.trim();
    if path.is_empty() {
        return Err(RenderError::MissingFilePath);
    }
    if !Path::new(path).is_file() {
        return Err(RenderError::FileNotFound(path.to_string()));
    }
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| RenderError::FileRead(path.to_string(), e.to_string()))?;

    let filename = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());

    Ok(RenderedResponse {
        status_code: descriptor.status_code,
        content_type: descriptor.content_type.clone(),
        body: Bytes::from(bytes),
        content_disposition: Some(format!("attachment; filename=\"{filename}\"")),
    })
}

fn render_text(descriptor: &ResponseDescriptor, rule: &Rule) -> RenderedResponse {
    let mut body = descriptor.body_basic.clone();

    if rule.mockjs_enabled && descriptor.content_type.contains("json") {
        match template::expand_template(&body) {
            Some(expanded) => body = expanded,
            None => {
                // Degrade to the raw body: the static text is still a valid
                // response even when it is not a valid template.
                warn!("Template expansion failed for rule '{}', sending raw body", rule.id);
            }
        }
    }

    RenderedResponse {
        status_code: descriptor.status_code,
        content_type: descriptor.content_type.clone(),
        body: Bytes::from(body),
        content_disposition: None,
    }
}
