//! Lorebook (character book): construction from card or lorebook JSON and keyword scanning.

mod entry;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::card::{CharRawData, UNKNOWN};
use crate::error::{Error, Result};

pub use entry::{split_keys, LorebookEntry, KEY_SEPARATORS};

/// Default number of scan passes.
pub const DEFAULT_SCAN_DEPTH: u32 = 10;

/// A set of keyword-triggered entries plus book-level settings.
///
/// Entries are owned copies of the source JSON; mutating the book never touches the record it
/// was built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lorebook {
    pub name: String,
    pub description: String,
    pub scan_depth: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_budget: Option<u64>,
    pub recursive_scanning: bool,
    pub extensions: Map<String, Value>,
    pub entries: Vec<LorebookEntry>,
}

impl Default for Lorebook {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Lorebook {
    /// Book with default settings. Packed keys in `entries` are split.
    pub fn new(entries: Vec<LorebookEntry>) -> Self {
        let mut book = Self {
            name: UNKNOWN.to_string(),
            description: String::new(),
            scan_depth: DEFAULT_SCAN_DEPTH,
            token_budget: None,
            recursive_scanning: true,
            extensions: Map::new(),
            entries,
        };
        book.fix_keys();
        book
    }

    /// Build from a bare entry list, a lorebook object (`{entries: [...]}`) or a card record
    /// (`{data: {character_book: {entries: [...]}}}`).
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Array(items) => Ok(Self::new(decode_entries(items))),
            Value::Object(fields) => Ok(Self::from_object(fields)),
            other => Err(Error::InvalidBook(format!(
                "expected an object or array, got {}",
                json_kind(other)
            ))),
        }
    }

    /// Build from a raw card record's `data.character_book`.
    pub fn from_card(raw: &CharRawData) -> Self {
        Self::from_object(raw.fields())
    }

    fn from_object(fields: &Map<String, Value>) -> Self {
        let card_book = fields
            .get("data")
            .and_then(|d| d.get("character_book"))
            .and_then(Value::as_object);

        let entries = fields
            .get("entries")
            .and_then(Value::as_array)
            .or_else(|| card_book.and_then(|b| b.get("entries")).and_then(Value::as_array))
            .map(|items| decode_entries(items.as_slice()))
            .unwrap_or_default();

        let settings = fields
            .get("character_book")
            .and_then(Value::as_object)
            .or(card_book)
            .unwrap_or(fields);

        let mut book = Self::new(entries);
        if let Some(name) = settings.get("name").and_then(Value::as_str) {
            book.name = name.to_string();
        }
        if let Some(description) = settings.get("description").and_then(Value::as_str) {
            book.description = description.to_string();
        }
        if let Some(recursive) = settings.get("recursive_scanning").and_then(Value::as_bool) {
            book.recursive_scanning = recursive;
        }
        if let Some(depth) = settings.get("scan_depth").and_then(Value::as_u64) {
            book.scan_depth = u32::try_from(depth).unwrap_or(u32::MAX);
        }
        book.token_budget = settings.get("token_budget").and_then(Value::as_u64);
        if let Some(extensions) = settings.get("extensions").and_then(Value::as_object) {
            book.extensions = extensions.clone();
        }
        book
    }

    /// Split separator-packed keys in every entry. Idempotent.
    pub fn fix_keys(&mut self) {
        for entry in &mut self.entries {
            entry.fix_keys();
        }
    }

    /// Entries whose keys occur in `context`, in order of first match.
    pub fn scan(&self, context: &str) -> Vec<&LorebookEntry> {
        self.scan_from(context, Vec::new(), 1)
            .into_iter()
            .filter_map(|i| self.entries.get(i))
            .collect()
    }

    /// Scan continuing from an earlier result.
    ///
    /// `matched` holds entry indices already matched; they are never re-added. Returns the
    /// de-duplicated indices in order of first match. Nothing new is matched once `depth`
    /// reaches `scan_depth`. The context does not grow between passes, so a pass that adds
    /// nothing ends the scan.
    pub fn scan_from(&self, context: &str, mut matched: Vec<usize>, depth: u32) -> Vec<usize> {
        let mut depth = depth;
        loop {
            if depth >= self.scan_depth {
                break;
            }
            let before = matched.len();
            let pending: Vec<usize> = (0..self.entries.len())
                .filter(|i| !matched.contains(i))
                .collect();
            if pending.is_empty() {
                break;
            }
            for i in pending {
                if self.entries[i].matches(context) {
                    matched.push(i);
                }
            }
            tracing::trace!(depth, new = matched.len() - before, "lorebook scan pass");
            if !self.recursive_scanning || matched.len() == before {
                break;
            }
            depth += 1;
        }
        dedup_in_order(matched)
    }
}

/// Decode entry objects. Fields decode leniently, so only items that are not objects are
/// skipped.
fn decode_entries(items: &[Value]) -> Vec<LorebookEntry> {
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            if !item.is_object() {
                tracing::warn!(index = i, kind = json_kind(item), "skipping non-object lorebook entry");
                return None;
            }
            match LorebookEntry::deserialize(item) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(index = i, error = %e, "skipping undecodable lorebook entry");
                    None
                }
            }
        })
        .collect()
}

fn dedup_in_order(indices: Vec<usize>) -> Vec<usize> {
    let mut seen = HashSet::new();
    indices.into_iter().filter(|i| seen.insert(*i)).collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
