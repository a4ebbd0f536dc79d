//! Snapshot of the items the backend already knows about.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::sanitize::{num_opt, progress};

/// An item (dataset, model or TTS voice) reported by the downloader.
///
/// Only `progress` and `size` are interpreted; every other field is kept
/// as-is for the consumer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Progress percentage, always finite and within `[0, 100]`.
    pub progress: f64,
    /// Size as reported by the backend, if it is a finite number.
    pub size: Option<f64>,
    /// Remaining fields, untouched.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Item {
    /// Sanitize one raw item.
    ///
    /// Non-object items produce an item with no extra fields.
    pub fn sanitize(raw: &Value) -> Self {
        let mut fields = raw.as_object().cloned().unwrap_or_default();
        let raw_progress = fields.remove("progress").unwrap_or(Value::Null);
        let raw_size = fields.remove("size").unwrap_or(Value::Null);

        Self {
            progress: progress(&raw_progress),
            size: num_opt(&raw_size),
            fields,
        }
    }

    /// Look up an opaque field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// The three item buckets reported by `downloader/status`.
///
/// Replaced wholesale on every successful sync.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemsSnapshot {
    /// Known datasets.
    pub datasets: Vec<Item>,
    /// Known models.
    pub models: Vec<Item>,
    /// Known TTS voices.
    pub tts: Vec<Item>,
}

impl ItemsSnapshot {
    /// Build a snapshot from an untrusted `items` object.
    ///
    /// A bucket that is missing or not an array becomes empty.
    pub fn from_value(raw: &Value) -> Self {
        Self {
            datasets: bucket(raw, "datasets"),
            models: bucket(raw, "models"),
            tts: bucket(raw, "tts"),
        }
    }

    /// Total number of items across all buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.datasets.len() + self.models.len() + self.tts.len()
    }

    /// Whether all buckets are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn bucket(raw: &Value, key: &str) -> Vec<Item> {
    raw.get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().map(Item::sanitize).collect())
        .unwrap_or_default()
}
