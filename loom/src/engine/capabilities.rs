//! Capabilities merge: connector-declared flags plus a user override map (§4.3, §2).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `vision` may be a plain boolean or a format string (e.g. `"base64"`); both
/// are accepted for wire compatibility with legacy connectors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VisionCapability {
    Enabled(bool),
    Format(String),
}

impl VisionCapability {
    pub fn is_enabled(&self) -> bool {
        match self {
            VisionCapability::Enabled(b) => *b,
            VisionCapability::Format(s) => !s.is_empty(),
        }
    }
}

/// Boolean capability flags a connector (and thus a turn) may support.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vision: Option<VisionCapability>,
    #[serde(default)]
    pub tool_calls: bool,
    #[serde(default)]
    pub audio: bool,
    #[serde(default)]
    pub reasoning: bool,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub multimodal: bool,
}

/// Merges connector-declared capabilities with a user-provided override map:
/// any flag explicitly present in `overrides` wins outright.
pub struct CapabilityResolver;

impl CapabilityResolver {
    pub fn resolve(declared: &Capabilities, overrides: &HashMap<String, bool>) -> Capabilities {
        let mut resolved = declared.clone();
        if let Some(v) = overrides.get("vision") {
            resolved.vision = Some(VisionCapability::Enabled(*v));
        }
        if let Some(v) = overrides.get("tool_calls") {
            resolved.tool_calls = *v;
        }
        if let Some(v) = overrides.get("audio") {
            resolved.audio = *v;
        }
        if let Some(v) = overrides.get("reasoning") {
            resolved.reasoning = *v;
        }
        if let Some(v) = overrides.get("streaming") {
            resolved.streaming = *v;
        }
        if let Some(v) = overrides.get("json") {
            resolved.json = *v;
        }
        if let Some(v) = overrides.get("multimodal") {
            resolved.multimodal = *v;
        }
        resolved
    }
}
