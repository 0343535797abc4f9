//! End-to-end tests for the schema-less path.
//!
//! Buffers are built with prost's own encoding helpers so the wire layout is
//! exactly what a real serializer would emit.

use bytes::Bytes;
use pretty_assertions::assert_eq;
use prost::encoding::{encode_key, encode_varint, WireType as ProstWireType};
use rudnik_core::{
    Capture, ClassifiedItem, Classifier, ClassifierConfig, ItemValue, Pipeline, WireType,
};

fn string_field(buf: &mut Vec<u8>, field_number: u32, value: &[u8]) {
    encode_key(field_number, ProstWireType::LengthDelimited, buf);
    encode_varint(value.len() as u64, buf);
    buf.extend_from_slice(value);
}

fn double_field(buf: &mut Vec<u8>, field_number: u32, value: f64) {
    encode_key(field_number, ProstWireType::SixtyFourBit, buf);
    buf.extend_from_slice(&value.to_le_bytes());
}

fn float_field(buf: &mut Vec<u8>, field_number: u32, value: f32) {
    encode_key(field_number, ProstWireType::ThirtyTwoBit, buf);
    buf.extend_from_slice(&value.to_le_bytes());
}

fn varint_field(buf: &mut Vec<u8>, field_number: u32, value: u64) {
    encode_key(field_number, ProstWireType::Varint, buf);
    encode_varint(value, buf);
}

fn extract(buf: Vec<u8>) -> Vec<ClassifiedItem> {
    Classifier::new().extract(&Bytes::from(buf))
}

fn text(field_number: u64, value: &str) -> ClassifiedItem {
    ClassifiedItem {
        field_number,
        parent_field_number: None,
        enclosing_field_number: None,
        depth: 0,
        value: ItemValue::Text {
            value: value.to_string(),
        },
    }
}

#[test]
fn top_level_text() {
    let mut buf = Vec::new();
    string_field(&mut buf, 1, b"Central Gym");

    assert_eq!(extract(buf), vec![text(1, "Central Gym")]);
}

#[test]
fn fixed64_coordinate() {
    let mut buf = Vec::new();
    double_field(&mut buf, 9, 40.4093);

    let items = extract(buf);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].field_number, 9);
    assert_eq!(
        items[0].value,
        ItemValue::Coordinate {
            value: 40.4093,
            wire_type: WireType::Fixed64
        }
    );
}

#[test]
fn fixed32_out_of_range_is_dropped() {
    let mut buf = Vec::new();
    float_field(&mut buf, 9, 200.0);
    assert!(extract(buf).is_empty());

    let mut buf = Vec::new();
    float_field(&mut buf, 9, -180.0);
    assert_eq!(extract(buf)[0].as_coordinate(), Some(-180.0));
}

#[test]
fn varints_and_short_strings_are_discarded() {
    let mut buf = Vec::new();
    varint_field(&mut buf, 1, 150);
    string_field(&mut buf, 2, b"ab");
    string_field(&mut buf, 3, b"");
    assert!(extract(buf).is_empty());
}

#[test]
fn nested_place_record() {
    let mut place = Vec::new();
    string_field(&mut place, 1, b"Central Gym");
    double_field(&mut place, 3, 40.4093);
    double_field(&mut place, 4, -3.7038);
    varint_field(&mut place, 5, 42);

    let mut buf = Vec::new();
    string_field(&mut buf, 2, b"Madrid");
    string_field(&mut buf, 7, &place);
    string_field(&mut buf, 8, b"trailer");

    let items = extract(buf);
    let summary: Vec<_> = items
        .iter()
        .map(|i| (i.field_number, i.parent_field_number, i.depth))
        .collect();
    assert_eq!(
        summary,
        vec![
            (2, None, 0),
            (1, Some(7), 1),
            (3, Some(7), 1),
            (4, Some(7), 1),
            (8, None, 0),
        ]
    );
    assert_eq!(items[1].as_text(), Some("Central Gym"));
    assert_eq!(items[3].as_coordinate(), Some(-3.7038));
}

#[test]
fn parent_is_the_top_level_ancestor() {
    let mut inner = Vec::new();
    string_field(&mut inner, 1, b"Puerta del Sol");

    let mut middle = Vec::new();
    string_field(&mut middle, 4, &inner);

    let mut buf = Vec::new();
    string_field(&mut buf, 6, &middle);

    assert_eq!(
        extract(buf),
        vec![ClassifiedItem {
            field_number: 1,
            parent_field_number: Some(6),
            enclosing_field_number: Some(4),
            depth: 2,
            value: ItemValue::Text {
                value: "Puerta del Sol".to_string()
            },
        }]
    );
}

#[test]
fn invisible_characters_are_not_text() {
    let mut buf = Vec::new();
    string_field(&mut buf, 1, "Central Gym\u{E0041}".as_bytes());
    string_field(&mut buf, 2, "\u{0600}Plaza Mayor".as_bytes());
    string_field(&mut buf, 3, "Gran Via\u{F0000}".as_bytes());
    string_field(&mut buf, 4, "Sol\u{0378}".as_bytes());

    assert!(extract(buf).iter().all(|item| item.as_text().is_none()));
}

#[test]
fn resyncs_past_garbage() {
    // 0x0F is field 1 with wire type 7; the walker skips it one byte at a time
    let mut buf = vec![0x0F, 0x0F];
    string_field(&mut buf, 1, b"Central Gym");

    let classifier = Classifier::new();
    let data = Bytes::from(buf);
    let mut items = classifier.items(&data);
    let collected: Vec<_> = items.by_ref().collect();

    assert_eq!(collected, vec![text(1, "Central Gym")]);
    assert_eq!(items.resyncs(), 2);
}

#[test]
fn corrupt_field_between_valid_fields() {
    let mut buf = Vec::new();
    string_field(&mut buf, 1, b"Central Gym");
    // Field 3 claiming 127 bytes that are not there
    buf.extend_from_slice(&[0x1A, 0x7F]);
    string_field(&mut buf, 3, b"Plaza Mayor");

    let texts: Vec<_> = extract(buf)
        .into_iter()
        .filter_map(|i| i.as_text().map(str::to_owned))
        .collect();
    assert_eq!(texts.first().map(String::as_str), Some("Central Gym"));
    assert_eq!(texts.last().map(String::as_str), Some("Plaza Mayor"));
}

#[test]
fn truncated_tail_still_yields_earlier_items() {
    let mut buf = Vec::new();
    string_field(&mut buf, 1, b"Central Gym");
    double_field(&mut buf, 2, 12.5);
    // Length says 50 bytes, only 3 follow
    buf.extend_from_slice(&[0x1A, 50, b'a', b'b', b'c']);

    let items = extract(buf);
    assert_eq!(items[0].as_text(), Some("Central Gym"));
    assert_eq!(items[1].as_coordinate(), Some(12.5));
}

#[test]
fn retained_bytes_share_the_capture() {
    let mut buf = Vec::new();
    string_field(&mut buf, 5, &[0x00, 0xFF, 0x01]);

    let data = Bytes::from(buf);
    let classifier = Classifier::with_config(ClassifierConfig::new().retain_opaque_spans(true));
    let items = classifier.extract(&data);

    match &items[0].value {
        ItemValue::Bytes { span, length } => {
            assert_eq!(*length, 3);
            assert_eq!(span.as_ref(), &[0x00, 0xFF, 0x01]);
            assert_eq!(span.as_ptr(), data[2..].as_ptr());
        }
        other => panic!("expected bytes, got {:?}", other),
    }
}

#[test]
fn max_depth_stops_descent() {
    let mut inner = Vec::new();
    string_field(&mut inner, 1, b"Central Gym");
    let mut buf = Vec::new();
    string_field(&mut buf, 2, &inner);

    let classifier = Classifier::with_config(ClassifierConfig::new().max_depth(Some(0)));
    assert!(classifier.extract(&Bytes::from(buf)).is_empty());
}

#[test]
fn probe_serializes_flat_items() {
    let mut buf = Vec::new();
    string_field(&mut buf, 1, b"Central Gym");
    double_field(&mut buf, 9, 40.4093);

    let result = Pipeline::new().probe(&Capture::new("search_1.pbf", buf));
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(
        json,
        serde_json::json!({
            "source_identifier": "search_1.pbf",
            "byte_length": 22,
            "items": [
                {"field_number": 1, "depth": 0, "type": "text", "value": "Central Gym"},
                {"field_number": 9, "depth": 0, "type": "coordinate", "value": 40.4093, "wire_type": "FIXED64"},
            ]
        })
    );
}

#[test]
fn probe_all_keeps_input_order() {
    let captures: Vec<_> = (0..32)
        .map(|i| {
            let mut buf = Vec::new();
            string_field(&mut buf, 1, format!("Place number {}", i).as_bytes());
            Capture::new(format!("capture_{}.pbf", i), buf)
        })
        .collect();

    let results = Pipeline::new().probe_all(&captures);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.source_identifier, format!("capture_{}.pbf", i));
        assert_eq!(
            result.items[0].as_text().map(str::to_owned),
            Some(format!("Place number {}", i))
        );
    }
}
