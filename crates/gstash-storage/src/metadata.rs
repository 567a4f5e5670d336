//! Upload metadata and its merge policy.
//!
//! Effective metadata for an upload is built in three layers, later layers
//! overriding earlier ones key by key:
//! 1. built-in `cacheControl`
//! 2. the client's configured defaults
//! 3. the metadata passed to the call

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

/// Metadata attached to an uploaded object, keyed by object resource field.
pub type ObjectMetadata = BTreeMap<String, Value>;

pub const CACHE_CONTROL_KEY: &str = "cacheControl";
pub const CONTENT_TYPE_KEY: &str = "contentType";

/// Cache-Control applied to every upload unless overridden.
pub const DEFAULT_CACHE_CONTROL: &str = "public, max-age=86400";

/// Merge the three metadata layers.
pub fn merge_metadata(
    defaults: &HashMap<String, String>,
    per_call: &ObjectMetadata,
) -> ObjectMetadata {
    let mut merged = ObjectMetadata::new();
    merged.insert(
        CACHE_CONTROL_KEY.to_string(),
        Value::String(DEFAULT_CACHE_CONTROL.to_string()),
    );

    for (key, value) in defaults {
        merged.insert(key.clone(), Value::String(value.clone()));
    }

    for (key, value) in per_call {
        merged.insert(key.clone(), value.clone());
    }

    merged
}

/// Object resource fields understood by the store. Any other key is custom
/// metadata.
const RESOURCE_FIELDS: [&str; 6] = [
    CACHE_CONTROL_KEY,
    CONTENT_TYPE_KEY,
    "contentEncoding",
    "contentDisposition",
    "contentLanguage",
    "storageClass",
];

/// Metadata split into resource fields and custom key/value pairs.
#[derive(Debug, Default, PartialEq)]
pub struct SplitMetadata {
    pub resource: BTreeMap<String, Value>,
    pub custom: BTreeMap<String, String>,
}

impl SplitMetadata {
    pub fn resource_str(&self, key: &str) -> Option<String> {
        self.resource.get(key).map(value_as_string)
    }
}

/// Separate resource fields from custom metadata. A nested `metadata` object
/// is flattened into the custom map.
pub fn split_metadata(metadata: &ObjectMetadata) -> SplitMetadata {
    let mut split = SplitMetadata::default();

    for (key, value) in metadata {
        if RESOURCE_FIELDS.contains(&key.as_str()) {
            split.resource.insert(key.clone(), value.clone());
        } else if key == "metadata" {
            if let Value::Object(map) = value {
                for (k, v) in map {
                    split.custom.insert(k.clone(), value_as_string(v));
                }
            }
        } else {
            split.custom.insert(key.clone(), value_as_string(value));
        }
    }

    split
}

/// Render a metadata value as the plain string stored on the object.
pub fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
