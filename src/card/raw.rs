//! Loosely-typed raw card record as decoded from the image payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const SPEC_V1: &str = "chara_card_v1";
pub const SPEC_V2: &str = "chara_card_v2";
pub const SPEC_V3: &str = "chara_card_v3";

/// Which schema shape a raw record uses, read from its `spec` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecShape {
    /// `chara_card_v1`, missing, or unrecognized: fields live at the top level.
    Flat,
    /// `chara_card_v2` / `chara_card_v3`: fields nested under `data`.
    Nested,
}

/// Raw card record: every top-level key of the payload, order preserved.
///
/// `spec`, `spec_version` and `data` are read through accessors; all other keys (legacy v1
/// fields, `char_name`, `avatar`, vendor extras) stay in the same map untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharRawData(Map<String, Value>);

impl CharRawData {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Raw record with v1 defaults (`spec`, `spec_version`, empty `data`) under `fields`.
    /// Keys present in `fields` win.
    pub fn with_v1_defaults(fields: Map<String, Value>) -> Self {
        let mut out = Map::new();
        out.insert("spec".to_string(), Value::from(SPEC_V1));
        out.insert("spec_version".to_string(), Value::from("1.0"));
        out.insert("data".to_string(), Value::Object(Map::new()));
        out.extend(fields);
        Self(out)
    }

    pub fn spec(&self) -> Option<&str> {
        self.0.get("spec").and_then(Value::as_str)
    }

    pub fn spec_version(&self) -> Option<&str> {
        self.0.get("spec_version").and_then(Value::as_str)
    }

    pub fn shape(&self) -> SpecShape {
        match self.spec() {
            Some(SPEC_V2) | Some(SPEC_V3) => SpecShape::Nested,
            _ => SpecShape::Flat,
        }
    }

    /// Nested `data` object, if the record has one.
    pub fn data(&self) -> Option<&Map<String, Value>> {
        self.0.get("data").and_then(Value::as_object)
    }

    /// Non-null top-level field.
    pub fn top(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// Non-null field under `data`.
    pub fn nested(&self, key: &str) -> Option<&Value> {
        self.data()?.get(key).filter(|v| !v.is_null())
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for CharRawData {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}
