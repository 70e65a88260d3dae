//! The submission document and the pure filter passes applied to it.
//!
//! A document maps section names (one per checkin module, plus
//! `plugin_results`) to arbitrary JSON. Map-shaped sections conventionally
//! carry `messages` (a list of `{text, ...}` objects) and `facts` (a map).
//! Every pass here returns whether it changed anything so callers can skip
//! redundant saves.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Section holding normalized plugin output.
pub const PLUGIN_RESULTS_SECTION: &str = "plugin_results";
/// Section the agent itself contributes (authentication key, version).
pub const SAL_SECTION: &str = "Sal";
pub const DEFAULT_RUN_TYPE: &str = "custom";

/// Accumulated checkin payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionDocument(Map<String, Value>);

impl SubmissionDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, section: &str) -> Option<&Value> {
        self.0.get(section)
    }

    /// Replace a section wholesale.
    pub fn set(&mut self, section: impl Into<String>, value: Value) {
        self.0.insert(section.into(), value);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Run type reported by the Munki checkin module, if any.
    #[must_use]
    pub fn run_type(&self) -> Option<&str> {
        self.extra_data_str("Munki", "runtype")
    }

    /// Serial number reported by the machine checkin module, if any.
    #[must_use]
    pub fn serial(&self) -> Option<&str> {
        self.extra_data_str("Machine", "serial")
    }

    fn extra_data_str(&self, section: &str, field: &str) -> Option<&str> {
        self.0
            .get(section)?
            .get("extra_data")?
            .get(field)?
            .as_str()
            .filter(|s| !s.is_empty())
    }

    /// Drop every message whose `text` matches any of `patterns`.
    ///
    /// Sections that are not maps are left alone. A message without a `text`
    /// string is tested as the empty string.
    pub fn remove_blacklisted_messages(&mut self, patterns: &[Regex]) -> bool {
        if patterns.is_empty() {
            return false;
        }
        let mut changed = false;
        for section in self.0.values_mut() {
            let Some(Value::Array(messages)) =
                section.as_object_mut().and_then(|s| s.get_mut("messages"))
            else {
                continue;
            };
            let before = messages.len();
            messages.retain(|message| {
                let text = message.get("text").and_then(Value::as_str).unwrap_or("");
                !patterns.iter().any(|p| p.is_match(text))
            });
            changed |= messages.len() != before;
        }
        changed
    }

    /// Remove each named fact from every map-shaped section's `facts`.
    pub fn remove_skipped_facts(&mut self, skip: &[String]) -> bool {
        if skip.is_empty() {
            return false;
        }
        let mut changed = false;
        for section in self.0.values_mut() {
            let Some(Value::Object(facts)) =
                section.as_object_mut().and_then(|s| s.get_mut("facts"))
            else {
                continue;
            };
            for name in skip {
                changed |= facts.remove(name).is_some();
            }
        }
        changed
    }

    /// Strip NUL characters from every string and key.
    ///
    /// Equivalent to removing `\u0000` escapes from the serialized form and
    /// reparsing, without the risk of splitting an escaped backslash.
    pub fn strip_null_bytes(&mut self) -> bool {
        let mut changed = false;
        let taken = std::mem::take(&mut self.0);
        self.0 = strip_map(taken, &mut changed);
        changed
    }
}

fn strip_map(map: Map<String, Value>, changed: &mut bool) -> Map<String, Value> {
    map.into_iter()
        .map(|(k, v)| (strip_str(k, changed), strip_value(v, changed)))
        .collect()
}

fn strip_value(value: Value, changed: &mut bool) -> Value {
    match value {
        Value::String(s) => Value::String(strip_str(s, changed)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| strip_value(v, changed))
                .collect(),
        ),
        Value::Object(map) => Value::Object(strip_map(map, changed)),
        other => other,
    }
}

fn strip_str(s: String, changed: &mut bool) -> String {
    if s.contains('\0') {
        *changed = true;
        s.replace('\0', "")
    } else {
        s
    }
}

/// The section the agent contributes on its own behalf.
#[must_use]
pub fn sal_section(key: &str, version: &str) -> Value {
    json!({
        "extra_data": { "key": key, "sal_version": version },
        "facts": { "checkin_module_version": version },
    })
}
