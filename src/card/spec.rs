//! Canonical field accessors and v1/v2/v3 projections.
//!
//! Every projected field is resolved through one ordered lookup: canonical accessor, then raw
//! top-level field, then raw `data` field. Which raw keys feed each target field is declared in
//! the `*_FIELDS` tables below.

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Map, Value};

use crate::card::merge::merge_objects;
use crate::card::raw::{SpecShape, SPEC_V2, SPEC_V3};
use crate::card::CharacterCard;
use crate::error::Error;

/// Placeholder for missing text fields.
pub const UNKNOWN: &str = "unknown";

/// Target schema version for projections and clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecVersion {
    V1,
    V2,
    V3,
}

impl FromStr for SpecVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v1" => Ok(SpecVersion::V1),
            "v2" => Ok(SpecVersion::V2),
            "v3" => Ok(SpecVersion::V3),
            other => Err(Error::UnsupportedVersion(other.to_string())),
        }
    }
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SpecVersion::V1 => "v1",
            SpecVersion::V2 => "v2",
            SpecVersion::V3 => "v3",
        })
    }
}

/// Fields that have a canonical, spec-aware accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalField {
    Name,
    Description,
    FirstMessage,
    Personality,
    Scenario,
    MessageExample,
    CreateDate,
    Tags,
    AlternateGreetings,
    CharacterBook,
    Avatar,
}

impl CanonicalField {
    /// Accessor for a field name, if one exists. Note `first_mes` / `mes_example` are raw
    /// keys, not accessor names.
    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "name" => CanonicalField::Name,
            "description" => CanonicalField::Description,
            "first_message" => CanonicalField::FirstMessage,
            "personality" => CanonicalField::Personality,
            "scenario" => CanonicalField::Scenario,
            "message_example" => CanonicalField::MessageExample,
            "create_date" => CanonicalField::CreateDate,
            "tags" => CanonicalField::Tags,
            "alternate_greetings" => CanonicalField::AlternateGreetings,
            "character_book" => CanonicalField::CharacterBook,
            "avatar" => CanonicalField::Avatar,
            _ => return None,
        })
    }

    /// Raw record key the accessor reads.
    pub fn raw_key(self) -> &'static str {
        match self {
            CanonicalField::Name => "name",
            CanonicalField::Description => "description",
            CanonicalField::FirstMessage => "first_mes",
            CanonicalField::Personality => "personality",
            CanonicalField::Scenario => "scenario",
            CanonicalField::MessageExample => "mes_example",
            CanonicalField::CreateDate => "create_date",
            CanonicalField::Tags => "tags",
            CanonicalField::AlternateGreetings => "alternate_greetings",
            CanonicalField::CharacterBook => "character_book",
            CanonicalField::Avatar => "avatar",
        }
    }
}

/// Where a projected value came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<'a> {
    Canonical(Value),
    TopLevel(&'a Value),
    Nested(&'a Value),
}

impl Resolved<'_> {
    pub fn into_value(self) -> Value {
        match self {
            Resolved::Canonical(v) => v,
            Resolved::TopLevel(v) | Resolved::Nested(v) => v.clone(),
        }
    }
}

/// One target field and the keys tried, in order, to fill it.
#[derive(Debug, Clone, Copy)]
pub struct FieldSource {
    pub target: &'static str,
    pub keys: &'static [&'static str],
}

const fn field(target: &'static str, keys: &'static [&'static str]) -> FieldSource {
    FieldSource { target, keys }
}

/// SpecV1 `TavernCard` (flat).
pub const V1_FIELDS: &[FieldSource] = &[
    field("name", &["name", "char_name"]),
    field("description", &["description"]),
    field("personality", &["personality"]),
    field("scenario", &["scenario"]),
    field("first_mes", &["first_mes"]),
    field("mes_example", &["mes_example"]),
];

/// SpecV2 `data` object.
pub const V2_DATA_FIELDS: &[FieldSource] = &[
    field("name", &["name", "char_name"]),
    field("description", &["description"]),
    field("mes_example", &["mes_example"]),
    field("first_mes", &["first_mes"]),
    field("personality", &["personality"]),
    field("scenario", &["scenario"]),
    field("creator_notes", &["creator_notes"]),
    field("system_prompt", &["system_prompt"]),
    field("post_history_instructions", &["post_history_instructions"]),
    field("alternate_greetings", &["alternate_greetings"]),
    field("character_book", &["character_book"]),
    field("tags", &["tags"]),
    field("creator", &["creator"]),
    field("character_version", &["character_version"]),
    field("extensions", &["extensions"]),
];

/// SpecV3 `data` object.
pub const V3_DATA_FIELDS: &[FieldSource] = &[
    field("name", &["name", "char_name"]),
    field("description", &["description"]),
    field("tags", &["tags"]),
    field("creator", &["creator"]),
    field("character_version", &["character_version"]),
    field("mes_example", &["mes_example"]),
    field("extensions", &["extensions"]),
    field("system_prompt", &["system_prompt"]),
    field("post_history_instructions", &["post_history_instructions"]),
    field("first_mes", &["first_mes"]),
    field("alternate_greetings", &["alternate_greetings"]),
    field("personality", &["personality"]),
    field("scenario", &["scenario"]),
    field("creator_notes", &["creator_notes"]),
    field("character_book", &["character_book"]),
    field("assets", &["assets"]),
    field("nickname", &["nickname"]),
    field("creator_notes_multilingual", &["creator_notes_multilingual"]),
    field("source", &["source"]),
    field("group_only_greetings", &["group_only_greetings"]),
    field("creation_date", &["create_date", "creation_date"]),
    field("modification_date", &["modify_date", "modification_date"]),
];

/// Image references accepted for avatars.
pub fn is_valid_image_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://") || url.starts_with("data:")
}

fn value_to_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => UNKNOWN.to_string(),
        other => other.to_string(),
    }
}

fn string_list(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

impl CharacterCard {
    /// Spec-aware lookup behind every canonical accessor.
    ///
    /// v2/v3 records read `data.<field>` then the top-level field and yield `None` when both
    /// are missing. Other records read the top-level field (`name` falls back to `char_name`)
    /// and substitute a default.
    pub fn canonical(&self, field: CanonicalField) -> Option<Value> {
        if field == CanonicalField::Avatar {
            let avatar = self.avatar();
            return (!avatar.is_empty()).then(|| Value::String(avatar));
        }
        let raw = self.raw();
        let key = field.raw_key();
        match raw.shape() {
            SpecShape::Nested => raw.nested(key).or_else(|| raw.top(key)).cloned(),
            SpecShape::Flat => {
                let found = match field {
                    CanonicalField::Name => raw.top("name").or_else(|| raw.top("char_name")),
                    _ => raw.top(key),
                };
                Some(found.cloned().unwrap_or_else(|| self.flat_default(field)))
            }
        }
    }

    fn flat_default(&self, field: CanonicalField) -> Value {
        match field {
            CanonicalField::Tags | CanonicalField::AlternateGreetings => Value::Array(Vec::new()),
            CanonicalField::CharacterBook => json!({
                "entries": [],
                "name": self.name(),
                "extensions": {},
            }),
            _ => Value::from(UNKNOWN),
        }
    }

    fn text(&self, field: CanonicalField) -> String {
        self.canonical(field)
            .map(value_to_text)
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub fn spec(&self) -> &str {
        self.raw().spec().filter(|s| !s.is_empty()).unwrap_or(UNKNOWN)
    }

    pub fn spec_version(&self) -> &str {
        self.raw()
            .spec_version()
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN)
    }

    pub fn name(&self) -> String {
        self.text(CanonicalField::Name)
    }

    pub fn description(&self) -> String {
        self.text(CanonicalField::Description)
    }

    pub fn first_message(&self) -> String {
        self.text(CanonicalField::FirstMessage)
    }

    pub fn personality(&self) -> String {
        self.text(CanonicalField::Personality)
    }

    pub fn scenario(&self) -> String {
        self.text(CanonicalField::Scenario)
    }

    pub fn message_example(&self) -> String {
        self.text(CanonicalField::MessageExample)
    }

    pub fn create_date(&self) -> String {
        self.text(CanonicalField::CreateDate)
    }

    /// String tags; non-string items are skipped.
    pub fn tags(&self) -> Vec<String> {
        string_list(self.canonical(CanonicalField::Tags))
    }

    pub fn alternate_greetings(&self) -> Vec<String> {
        string_list(self.canonical(CanonicalField::AlternateGreetings))
    }

    /// Raw character book object; an empty book named after the card when absent.
    pub fn character_book(&self) -> Value {
        match self.canonical(CanonicalField::CharacterBook) {
            Some(book @ Value::Object(_)) => book,
            _ => self.flat_default(CanonicalField::CharacterBook),
        }
    }

    /// First valid image reference among `avatar`, `data.avatar` and the fallback avatar.
    pub fn avatar(&self) -> String {
        self.avatar_candidates(true)
    }

    /// Like [`avatar`](Self::avatar) but never returns the data-URI fallback.
    pub fn avatar_without_fallback(&self) -> String {
        self.avatar_candidates(false)
    }

    fn avatar_candidates(&self, with_fallback: bool) -> String {
        let raw = self.raw();
        let embedded = [raw.top("avatar"), raw.nested("avatar")];
        embedded
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .chain(with_fallback.then(|| self.fallback_avatar()))
            .find(|url| is_valid_image_url(url))
            .unwrap_or_default()
            .to_string()
    }

    /// Generic ordered lookup: canonical accessor, raw top-level field, raw `data` field.
    ///
    /// A key with a canonical accessor is answered by the accessor alone: it already reads
    /// `data` and the top level for v2/v3 records and substitutes a default for the others.
    pub fn resolve(&self, key: &str) -> Option<Resolved<'_>> {
        if let Some(field) = CanonicalField::from_key(key) {
            return self.canonical(field).map(Resolved::Canonical);
        }
        let raw = self.raw();
        raw.top(key)
            .map(Resolved::TopLevel)
            .or_else(|| raw.nested(key).map(Resolved::Nested))
    }

    fn project(&self, fields: &[FieldSource]) -> Map<String, Value> {
        let mut out = Map::new();
        for f in fields {
            if let Some(found) = f.keys.iter().find_map(|k| self.resolve(k)) {
                out.insert(f.target.to_string(), found.into_value());
            }
        }
        out
    }

    fn project_nested(&self, spec: &str, version: &str, fields: &[FieldSource]) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert("spec".to_string(), Value::from(spec));
        out.insert("spec_version".to_string(), Value::from(version));
        out.insert("data".to_string(), Value::Object(self.project(fields)));
        out
    }

    /// SpecV1 `TavernCard`: `{name, description, personality, scenario, first_mes, mes_example}`.
    pub fn to_spec_v1(&self) -> Value {
        Value::Object(self.project(V1_FIELDS))
    }

    /// SpecV2: `{spec: "chara_card_v2", spec_version: "2.0", data: {...}}`.
    pub fn to_spec_v2(&self) -> Value {
        Value::Object(self.project_nested(SPEC_V2, "2.0", V2_DATA_FIELDS))
    }

    /// SpecV3: `{spec: "chara_card_v3", spec_version: "3.0", data: {...}}`.
    pub fn to_spec_v3(&self) -> Value {
        Value::Object(self.project_nested(SPEC_V3, "3.0", V3_DATA_FIELDS))
    }

    pub fn to_spec(&self, version: SpecVersion) -> Value {
        match version {
            SpecVersion::V1 => self.to_spec_v1(),
            SpecVersion::V2 => self.to_spec_v2(),
            SpecVersion::V3 => self.to_spec_v3(),
        }
    }

    /// v1, v2 and v3 projections merged key by key, later versions winning.
    /// See [`merge_objects`] for the array and null rules.
    pub fn to_max_compatible_spec(&self) -> Value {
        let v1 = self.project(V1_FIELDS);
        let v2 = self.project_nested(SPEC_V2, "2.0", V2_DATA_FIELDS);
        let v3 = self.project_nested(SPEC_V3, "3.0", V3_DATA_FIELDS);
        Value::Object(merge_objects(&[&v1, &v2, &v3]))
    }
}
