//! Card normalization: accessors, avatar resolution, projections and merge.

use charcard::card::{encode_card_text, merge_objects};
use charcard::png::PNG_SIGNATURE;
use charcard::{load_batch, CharRawData, CharacterCard, Error, ImageFormat, SpecVersion};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};

fn raw(value: Value) -> CharRawData {
    serde_json::from_value(value).unwrap()
}

fn card(value: Value) -> CharacterCard {
    CharacterCard::from_json(raw(value), "")
}

fn png_with_text(keyword: &str, text: &str) -> Vec<u8> {
    let mut data = PNG_SIGNATURE.to_vec();
    let mut body = keyword.as_bytes().to_vec();
    body.push(0);
    body.extend_from_slice(text.as_bytes());
    data.extend_from_slice(&(body.len() as u32).to_be_bytes());
    data.extend_from_slice(b"tEXt");
    data.extend_from_slice(&body);
    data.extend_from_slice(&0u32.to_be_bytes());
    data
}

fn card_png(value: Value) -> Vec<u8> {
    png_with_text("chara", &encode_card_text(&raw(value)).unwrap())
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(m) => m,
        other => panic!("expected object, got {other}"),
    }
}

#[test]
fn v2_reads_nested_fields() {
    let c = card(json!({
        "spec": "chara_card_v2",
        "spec_version": "2.0",
        "data": {"name": "Alice", "first_mes": "Hi!", "tags": ["a", 1, "b"]}
    }));
    assert_eq!(c.name(), "Alice");
    assert_eq!(c.first_message(), "Hi!");
    assert_eq!(c.tags(), vec!["a", "b"]);
    assert_eq!(c.spec(), "chara_card_v2");
    assert_eq!(c.spec_version(), "2.0");
}

#[test]
fn v2_falls_back_to_top_level() {
    let c = card(json!({
        "spec": "chara_card_v2",
        "name": "Top",
        "data": {"description": "nested"}
    }));
    assert_eq!(c.name(), "Top");
    assert_eq!(c.description(), "nested");
    assert_eq!(c.scenario(), "unknown");
}

#[test]
fn legacy_char_name() {
    let c = card(json!({"char_name": "Bob"}));
    assert_eq!(c.name(), "Bob");
    assert_eq!(c.spec(), "unknown");
}

#[test]
fn v1_defaults() {
    let c = card(json!({"spec": "chara_card_v1", "name": "Solo"}));
    assert_eq!(c.description(), "unknown");
    assert!(c.tags().is_empty());
    assert!(c.alternate_greetings().is_empty());
    assert_eq!(
        c.character_book(),
        json!({"entries": [], "name": "Solo", "extensions": {}})
    );
}

#[test]
fn avatar_precedence() {
    let fallback = "data:image/png;base64,AAAA";
    let c = CharacterCard::from_json(
        raw(json!({
            "spec": "chara_card_v2",
            "avatar": "none",
            "data": {"avatar": "https://example.com/b.png"}
        })),
        fallback,
    );
    assert_eq!(c.avatar(), "https://example.com/b.png");

    let c = CharacterCard::from_json(
        raw(json!({
            "avatar": "http://example.com/a.png",
            "data": {"avatar": "https://example.com/b.png"}
        })),
        fallback,
    );
    assert_eq!(c.avatar(), "http://example.com/a.png");

    let c = CharacterCard::from_json(raw(json!({"avatar": "none"})), fallback);
    assert_eq!(c.avatar(), fallback);
    assert_eq!(c.avatar_without_fallback(), "");

    let c = card(json!({"avatar": "none"}));
    assert_eq!(c.avatar(), "");
}

#[test]
fn fallback_avatar_is_source_data_uri() {
    let data = card_png(json!({"spec": "chara_card_v2", "data": {"name": "P"}}));
    let c = CharacterCard::from_bytes(&data).unwrap();
    assert!(c.fallback_avatar().starts_with("data:image/png;base64,iVBORw0KGgo"));
    assert_eq!(c.avatar(), c.fallback_avatar());
}

#[test]
fn v1_projection_has_exact_keys() {
    let c = card(json!({
        "spec": "chara_card_v2",
        "data": {
            "name": "Alice",
            "description": "d",
            "personality": "p",
            "scenario": "s",
            "first_mes": "f",
            "mes_example": "m",
            "creator": "someone"
        }
    }));
    assert_eq!(
        c.to_spec_v1(),
        json!({
            "name": "Alice",
            "description": "d",
            "personality": "p",
            "scenario": "s",
            "first_mes": "f",
            "mes_example": "m"
        })
    );
}

#[test]
fn v2_projection_of_v1_card() {
    let c = card(json!({
        "spec": "chara_card_v1",
        "name": "Old",
        "description": "legacy",
        "first_mes": "hey",
        "creator": "me"
    }));
    let v2 = c.to_spec_v2();
    assert_eq!(v2["spec"], "chara_card_v2");
    assert_eq!(v2["spec_version"], "2.0");
    assert_eq!(v2["data"]["name"], "Old");
    assert_eq!(v2["data"]["first_mes"], "hey");
    assert_eq!(v2["data"]["creator"], "me");
    assert_eq!(v2["data"]["tags"], json!([]));
    assert!(v2["data"].get("system_prompt").is_none());
}

#[test]
fn v3_projection_renames_dates() {
    let c = card(json!({
        "spec": "chara_card_v3",
        "spec_version": "3.0",
        "data": {
            "name": "Nova",
            "create_date": "2024-01-01",
            "modification_date": 1700000000,
            "nickname": "N",
            "assets": [{"type": "icon", "uri": "ccdefault:", "name": "main", "ext": "png"}]
        }
    }));
    let v3 = c.to_spec_v3();
    assert_eq!(v3["spec"], "chara_card_v3");
    assert_eq!(v3["data"]["creation_date"], "2024-01-01");
    assert_eq!(v3["data"]["modification_date"], 1700000000);
    assert_eq!(v3["data"]["nickname"], "N");
    assert_eq!(v3["data"]["assets"][0]["type"], "icon");
    assert_eq!(c.create_date(), "2024-01-01");
}

#[test]
fn projection_is_a_copy() {
    let c = card(json!({"spec": "chara_card_v2", "data": {"name": "A", "tags": ["x"]}}));
    let mut v2 = c.to_spec_v2();
    v2["data"]["tags"] = json!(["changed"]);
    assert_eq!(c.tags(), vec!["x"]);
}

#[test]
fn max_compatible_of_v1_card_keeps_v1_values() {
    let c = card(json!({
        "spec": "chara_card_v1",
        "name": "Vee",
        "description": "one",
        "personality": "calm",
        "scenario": "park",
        "first_mes": "hello",
        "mes_example": "<START>"
    }));
    let v1 = object(c.to_spec_v1());
    let merged = object(c.to_max_compatible_spec());
    for (key, value) in &v1 {
        assert_eq!(merged.get(key), Some(value), "key {key}");
    }
    assert_eq!(merged["spec"], "chara_card_v3");
    assert_eq!(merged["spec_version"], "3.0");
    assert_eq!(merged["data"]["name"], "Vee");
}

#[test]
fn max_compatible_merges_nested_objects() {
    let c = card(json!({
        "spec": "chara_card_v3",
        "data": {
            "name": "Deep",
            "extensions": {"depth_prompt": {"depth": 4}},
            "character_book": {"name": "B", "entries": [{"keys": ["k"], "content": "c"}]},
            "group_only_greetings": ["hi all"]
        }
    }));
    let merged = c.to_max_compatible_spec();
    assert_eq!(merged["data"]["extensions"]["depth_prompt"]["depth"], 4);
    assert_eq!(merged["data"]["character_book"]["entries"][0]["content"], "c");
    assert_eq!(merged["data"]["group_only_greetings"], json!(["hi all"]));
    assert_eq!(merged["name"], "Deep");
}

#[test]
fn merge_keeps_non_empty_array() {
    let a = object(json!({"tags": ["x"], "n": 1, "o": {"p": 1}}));
    let b = object(json!({"tags": [], "n": null, "o": {"q": 2}}));
    let merged = merge_objects(&[&a, &b]);
    assert_eq!(
        Value::Object(merged),
        json!({"tags": ["x"], "n": 1, "o": {"p": 1, "q": 2}})
    );
}

#[test]
fn clone_as_other_version() {
    let data = card_png(json!({"spec": "chara_card_v1", "name": "Shift", "first_mes": "yo"}));
    let original = CharacterCard::from_bytes(&data).unwrap();
    let v3 = original.clone_as(SpecVersion::V3);
    assert_eq!(v3.spec(), "chara_card_v3");
    assert_eq!(v3.spec_version(), "3.0");
    assert_eq!(v3.name(), "Shift");
    assert_eq!(v3.first_message(), "yo");
    assert_eq!(v3.fallback_avatar(), original.fallback_avatar());
    assert_eq!(v3.source_format(), Some(ImageFormat::Png));
    assert_eq!(original.spec(), "chara_card_v1");
}

#[test]
fn unknown_version_is_rejected() {
    assert!(matches!(
        "v9".parse::<SpecVersion>(),
        Err(Error::UnsupportedVersion(_))
    ));
}

#[test]
fn loader_fills_v1_defaults() {
    let data = card_png(json!({"name": "Bare"}));
    let c = CharacterCard::from_bytes(&data).unwrap();
    assert_eq!(c.spec(), "chara_card_v1");
    assert_eq!(c.spec_version(), "1.0");
    assert_eq!(c.raw().data(), Some(&Map::new()));
    assert_eq!(c.name(), "Bare");
}

#[test]
fn missing_and_corrupt_cards_differ() {
    let none = png_with_text("Software", "x");
    let err = CharacterCard::from_bytes(&none).unwrap_err();
    assert!(err.is_card_missing());
    assert!(!err.is_corrupt_card());

    let corrupt = png_with_text("chara", "!!!!");
    let err = CharacterCard::from_bytes(&corrupt).unwrap_err();
    assert!(err.is_corrupt_card());
    assert!(!err.is_card_missing());

    let array = png_with_text("chara", "WzEsMl0=");
    assert!(matches!(
        CharacterCard::from_bytes(&array),
        Err(Error::Decode(charcard::DecodeError::NotAnObject))
    ));
}

#[test]
fn or_default_for_image_without_card() {
    let none = png_with_text("Software", "x");
    let c = CharacterCard::from_bytes_or_default(&none).unwrap();
    assert_eq!(c.spec(), "chara_card_v1");
    assert_eq!(c.name(), "unknown");
    assert!(c.avatar().starts_with("data:image/png;base64,"));

    assert!(matches!(
        CharacterCard::from_bytes_or_default(b"GIF89a"),
        Err(Error::UnsupportedFormat)
    ));
    assert!(CharacterCard::from_bytes_or_default(&png_with_text("chara", "!!!!")).is_err());
}

#[test]
fn batch_loading_keeps_order() {
    let items = vec![
        ("good", card_png(json!({"spec": "chara_card_v2", "data": {"name": "One"}}))),
        ("empty", png_with_text("Software", "x")),
        ("junk", b"not an image".to_vec()),
    ];
    let results = load_batch(items);
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].path_or_id, "good");
    assert_eq!(results[0].result.as_ref().unwrap().name(), "One");
    assert!(matches!(results[1].result, Err(Error::CardNotFound(ImageFormat::Png))));
    assert!(matches!(results[2].result, Err(Error::UnsupportedFormat)));
}
