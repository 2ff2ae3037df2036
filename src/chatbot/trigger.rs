//! Logic triggers: side-effect features (lead forms, link buttons, meeting
//! booking) that a chatbot shows when a user's message calls for them.
//!
//! Trigger definitions arrive as loosely-typed configuration. They are parsed
//! once, at load time, into [`Trigger`] values whose per-feature payload is a
//! strongly-typed [`FeatureConfig`] variant.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureType {
    LeadCollection,
    LinkButton,
    ScheduleMeeting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerKind {
    Keyword,
    Always,
    Manual,
    EndOfConversation,
    MessageCount,
    TimeDelay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadField {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadCollectionConfig {
    #[serde(default = "default_lead_title")]
    pub title: String,
    #[serde(default)]
    pub fields: Vec<LeadField>,
    #[serde(default)]
    pub submit_label: Option<String>,
}

fn default_lead_title() -> String {
    "Leave your details".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkButtonConfig {
    pub label: String,
    pub url: String,
    #[serde(default = "default_true")]
    pub open_in_new_tab: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleMeetingConfig {
    #[serde(default)]
    pub provider: String,
    pub booking_url: String,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

/// Per-feature payload, tagged by feature type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "feature_type", content = "config", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureConfig {
    LeadCollection(LeadCollectionConfig),
    LinkButton(LinkButtonConfig),
    ScheduleMeeting(ScheduleMeetingConfig),
}

impl FeatureConfig {
    pub fn feature_type(&self) -> FeatureType {
        match self {
            FeatureConfig::LeadCollection(_) => FeatureType::LeadCollection,
            FeatureConfig::LinkButton(_) => FeatureType::LinkButton,
            FeatureConfig::ScheduleMeeting(_) => FeatureType::ScheduleMeeting,
        }
    }

    /// Sentence telling the model which feature the UI is about to show.
    pub fn hint(&self) -> String {
        match self {
            FeatureConfig::LeadCollection(_) => {
                "The user may be interested in sharing their contact details; a contact form will be shown."
                    .to_string()
            }
            FeatureConfig::LinkButton(cfg) => format!(
                "A helpful link button labelled '{}' will be shown to the user.",
                cfg.label
            ),
            FeatureConfig::ScheduleMeeting(_) => {
                "The user might want to schedule a meeting; a booking calendar will be shown."
                    .to_string()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trigger {
    pub id: String,
    pub trigger_kind: TriggerKind,
    /// Lowercased, trimmed, non-empty.
    pub keywords: Vec<String>,
    #[serde(flatten)]
    pub feature: FeatureConfig,
}

impl Trigger {
    pub fn feature_type(&self) -> FeatureType {
        self.feature.feature_type()
    }

    /// Whether this trigger fires for `utterance`.
    ///
    /// Only keyword triggers are decided here; the other kinds are driven by
    /// the UI layer (timers, message counters, explicit user action).
    pub fn matches(&self, utterance: &str) -> bool {
        match self.trigger_kind {
            TriggerKind::Keyword => {
                let haystack = utterance.to_lowercase();
                self.keywords.iter().any(|k| haystack.contains(k.as_str()))
            }
            TriggerKind::Always
            | TriggerKind::Manual
            | TriggerKind::EndOfConversation
            | TriggerKind::MessageCount
            | TriggerKind::TimeDelay => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum TriggerParseError {
    #[error("trigger '{id}': unknown feature type '{value}'")]
    UnknownFeature { id: String, value: String },

    #[error("trigger '{id}': unknown trigger kind '{value}'")]
    UnknownKind { id: String, value: String },

    #[error("trigger '{id}': malformed keyword list: {reason}")]
    Keywords { id: String, reason: String },

    #[error("trigger '{id}': malformed {feature:?} config: {reason}")]
    Config {
        id: String,
        feature: FeatureType,
        reason: String,
    },
}

/// Trigger definition as written in configuration.
///
/// `keywords` may be a list, a comma-separated string, or a JSON-encoded
/// array string (the form stored by the builder UI).
#[derive(Debug, Clone, Deserialize)]
pub struct RawTrigger {
    #[serde(default)]
    pub id: String,
    pub feature_type: String,
    pub trigger_kind: String,
    #[serde(default)]
    pub keywords: Value,
    #[serde(default)]
    pub config: Value,
}

impl RawTrigger {
    pub fn parse(self) -> Result<Trigger, TriggerParseError> {
        let id = self.id;

        let feature_type: FeatureType = parse_enum(&self.feature_type).ok_or_else(|| {
            TriggerParseError::UnknownFeature {
                id: id.clone(),
                value: self.feature_type.clone(),
            }
        })?;
        let trigger_kind: TriggerKind = parse_enum(&self.trigger_kind).ok_or_else(|| {
            TriggerParseError::UnknownKind {
                id: id.clone(),
                value: self.trigger_kind.clone(),
            }
        })?;

        let keywords = parse_keywords(&self.keywords).map_err(|reason| {
            TriggerParseError::Keywords {
                id: id.clone(),
                reason,
            }
        })?;

        let config = if self.config.is_null() {
            Value::Object(Default::default())
        } else {
            self.config
        };
        let config_error = |e: serde_json::Error| TriggerParseError::Config {
            id: id.clone(),
            feature: feature_type,
            reason: e.to_string(),
        };
        let feature = match feature_type {
            FeatureType::LeadCollection => {
                FeatureConfig::LeadCollection(serde_json::from_value(config).map_err(config_error)?)
            }
            FeatureType::LinkButton => {
                FeatureConfig::LinkButton(serde_json::from_value(config).map_err(config_error)?)
            }
            FeatureType::ScheduleMeeting => {
                FeatureConfig::ScheduleMeeting(serde_json::from_value(config).map_err(config_error)?)
            }
        };

        Ok(Trigger {
            id,
            trigger_kind,
            keywords,
            feature,
        })
    }
}

fn parse_enum<T: serde::de::DeserializeOwned>(raw: &str) -> Option<T> {
    let normalized = raw.trim().to_uppercase().replace(['-', ' '], "_");
    serde_json::from_value(Value::String(normalized)).ok()
}

fn parse_keywords(raw: &Value) -> Result<Vec<String>, String> {
    let items: Vec<String> = match raw {
        Value::Null => Vec::new(),
        Value::Array(values) => values
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| format!("expected string keyword, got {}", v))
            })
            .collect::<Result<_, _>>()?,
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.starts_with('[') {
                serde_json::from_str::<Vec<String>>(trimmed).map_err(|e| e.to_string())?
            } else {
                trimmed.split(',').map(str::to_string).collect()
            }
        }
        other => return Err(format!("unsupported keyword value {}", other)),
    };

    Ok(items
        .into_iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect())
}
