//! Wire payload types delivered to subscribed clients.

use serde::{Deserialize, Serialize};

/// Lifecycle event kind carried by a refresh payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Destroy,
}

impl Action {
    /// All three lifecycle kinds, the default trigger set for a rule.
    pub const ALL: [Action; 3] = [Action::Create, Action::Update, Action::Destroy];
}

/// A payload broadcast on a stream.
///
/// `Refresh` tells subscribers their view is stale and carries no data
/// beyond provenance; `Message` carries arbitrary data with no implied
/// reload. The two variants do not share fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Payload {
    Refresh {
        model: String,
        id: Option<i64>,
        action: Action,
        timestamp: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        extra: Option<serde_json::Value>,
    },
    Message {
        data: serde_json::Value,
    },
}

impl Payload {
    /// Build a refresh payload stamped with the current time.
    pub fn refresh(
        model: impl Into<String>,
        id: Option<i64>,
        action: Action,
        extra: Option<serde_json::Value>,
    ) -> Self {
        Payload::Refresh {
            model: model.into(),
            id,
            action,
            timestamp: chrono::Utc::now().to_rfc3339(),
            extra,
        }
    }

    /// Build a message payload.
    pub fn message(data: serde_json::Value) -> Self {
        Payload::Message { data }
    }

    /// The action carried by a refresh payload, if any.
    pub fn action(&self) -> Option<Action> {
        match self {
            Payload::Refresh { action, .. } => Some(*action),
            Payload::Message { .. } => None,
        }
    }
}
