//! Heuristic labelling of schema-less fields.
//!
//! Without a schema a length-delimited payload could be text, an embedded
//! message, or opaque bytes, and a fixed-width number could be anything. The
//! [`Classifier`] applies a fixed rule order to each field:
//!
//! 1. Length-delimited: strict UTF-8, every char printable, more than
//!    [`ClassifierConfig::min_text_chars`] chars → text. Otherwise the span
//!    is opaque.
//! 2. Fixed64 / fixed32 within `±coordinate_bound` → coordinate. Out of range
//!    values are dropped.
//! 3. Opaque spans longer than [`ClassifierConfig::min_nested_span`] are
//!    walked as nested messages and their items surface annotated with both the
//!    top-level ancestor and the directly enclosing field number.
//! 4. Everything else is discarded, or kept as raw bytes when
//!    [`ClassifierConfig::retain_opaque_spans`] is set.
//!
//! Nesting is processed with an explicit stack of walkers, so arbitrarily
//! deep (or adversarial) input costs heap, not call stack.

use crate::field::{DecodedField, Payload};
use crate::walker::{walk, FieldWalker};
use crate::wire::WireType;
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, trace};
use unicode_general_category::{get_general_category, GeneralCategory};

/// Text must have more than this many chars
pub const DEFAULT_MIN_TEXT_CHARS: usize = 2;

/// Opaque spans must be longer than this many bytes to be descended into
pub const DEFAULT_MIN_NESTED_SPAN: usize = 10;

/// Largest magnitude a number may have to count as a coordinate
pub const DEFAULT_COORDINATE_BOUND: f64 = 180.0;

/// Configuration for the classifier
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    /// Text must have strictly more chars than this
    pub min_text_chars: usize,
    /// Opaque spans must be strictly longer than this to be walked
    pub min_nested_span: usize,
    /// Coordinates lie in `[-coordinate_bound, coordinate_bound]`
    pub coordinate_bound: f64,
    /// Require at least one alphabetic char in text
    pub require_letter: bool,
    /// Keep opaque spans that are not walked as raw byte items
    pub retain_opaque_spans: bool,
    /// Deepest nesting level to descend into (`None` = unbounded)
    pub max_depth: Option<usize>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
            min_nested_span: DEFAULT_MIN_NESTED_SPAN,
            coordinate_bound: DEFAULT_COORDINATE_BOUND,
            require_letter: false,
            retain_opaque_spans: false,
            max_depth: None,
        }
    }
}

impl ClassifierConfig {
    /// Creates a new classifier config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the text length threshold
    pub fn min_text_chars(mut self, chars: usize) -> Self {
        self.min_text_chars = chars;
        self
    }

    /// Sets the nested span length threshold
    pub fn min_nested_span(mut self, len: usize) -> Self {
        self.min_nested_span = len;
        self
    }

    /// Sets the coordinate magnitude bound
    pub fn coordinate_bound(mut self, bound: f64) -> Self {
        self.coordinate_bound = bound;
        self
    }

    /// Sets whether text needs an alphabetic char
    pub fn require_letter(mut self, require: bool) -> Self {
        self.require_letter = require;
        self
    }

    /// Sets whether opaque spans are kept as byte items
    pub fn retain_opaque_spans(mut self, retain: bool) -> Self {
        self.retain_opaque_spans = retain;
        self
    }

    /// Caps how deep nested spans are walked
    pub fn max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }
}

/// What a classified field turned out to be
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemValue {
    /// Printable text
    Text {
        /// The decoded string
        value: String,
    },
    /// A number in coordinate range
    Coordinate {
        /// The value, widened to `f64` for fixed32 fields
        value: f64,
        /// Whether it came from a fixed64 or fixed32 field
        wire_type: WireType,
    },
    /// An opaque span kept verbatim
    Bytes {
        /// The span, sharing the capture's allocation
        span: Bytes,
        /// Span length in bytes
        length: usize,
    },
}

/// One labelled field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedItem {
    /// Field number the item was decoded from
    pub field_number: u64,
    /// Field number of the top-level field the item was nested under
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_field_number: Option<u64>,
    /// Field number of the length-delimited field directly around the item
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enclosing_field_number: Option<u64>,
    /// Nesting level (0 for top-level fields)
    pub depth: usize,
    /// The classified value
    #[serde(flatten)]
    pub value: ItemValue,
}

impl ClassifiedItem {
    /// Returns the text if this is a text item
    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            ItemValue::Text { value } => Some(value),
            _ => None,
        }
    }

    /// Returns the number if this is a coordinate item
    pub fn as_coordinate(&self) -> Option<f64> {
        match self.value {
            ItemValue::Coordinate { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// Outcome of applying the rules to a single field
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict<'a> {
    /// Rule 1
    Text(String),
    /// Rule 2
    Coordinate(f64, WireType),
    /// Rule 3: walk this span as a nested message
    Descend(&'a [u8]),
    /// An opaque span to keep as bytes
    Opaque(&'a [u8]),
    /// Rule 4
    Discard,
}

/// Heuristic field classifier
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    /// Creates a classifier with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a classifier with custom configuration
    pub fn with_config(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Returns the active configuration
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Apply the rules to one field, without descending.
    pub fn judge<'a>(&self, field: &DecodedField<'a>) -> Verdict<'a> {
        match field.payload {
            Payload::LengthDelimited(span) => match self.as_text(span) {
                Some(text) => Verdict::Text(text.to_owned()),
                None if span.len() > self.config.min_nested_span => Verdict::Descend(span),
                None => self.opaque(span),
            },
            Payload::Fixed64(value) => self.coordinate(value, WireType::Fixed64),
            Payload::Fixed32(value) => self.coordinate(f64::from(value), WireType::Fixed32),
            Payload::Varint(_) => Verdict::Discard,
        }
    }

    /// Classify a single field in isolation.
    ///
    /// Spans that would be walked as nested messages yield `None` here; use
    /// [`Classifier::extract`] to follow them.
    pub fn classify(&self, field: &DecodedField<'_>) -> Option<ClassifiedItem> {
        let value = match self.judge(field) {
            Verdict::Text(value) => ItemValue::Text { value },
            Verdict::Coordinate(value, wire_type) => ItemValue::Coordinate { value, wire_type },
            Verdict::Opaque(span) => ItemValue::Bytes {
                span: Bytes::copy_from_slice(span),
                length: span.len(),
            },
            Verdict::Descend(_) | Verdict::Discard => return None,
        };

        Some(ClassifiedItem {
            field_number: field.field_number,
            parent_field_number: None,
            enclosing_field_number: None,
            depth: 0,
            value,
        })
    }

    /// Lazily walk and classify `buf`, descending into nested spans.
    pub fn items<'c, 'a>(&'c self, buf: &'a Bytes) -> Items<'c, 'a> {
        Items::new(self, buf)
    }

    /// Walk and classify all of `buf`.
    pub fn extract(&self, buf: &Bytes) -> Vec<ClassifiedItem> {
        let mut items = self.items(buf);
        let collected: Vec<_> = items.by_ref().collect();
        debug!(
            "Extracted {} items from {} bytes ({} resyncs)",
            collected.len(),
            buf.len(),
            items.resyncs()
        );
        collected
    }

    fn as_text<'a>(&self, span: &'a [u8]) -> Option<&'a str> {
        let text = std::str::from_utf8(span).ok()?;

        let mut chars = 0;
        let mut has_letter = false;
        for c in text.chars() {
            if !is_printable(c) {
                return None;
            }
            has_letter |= c.is_alphabetic();
            chars += 1;
        }

        if chars <= self.config.min_text_chars || (self.config.require_letter && !has_letter) {
            return None;
        }

        Some(text)
    }

    fn coordinate<'a>(&self, value: f64, wire_type: WireType) -> Verdict<'a> {
        let bound = self.config.coordinate_bound;
        if (-bound..=bound).contains(&value) {
            Verdict::Coordinate(value, wire_type)
        } else {
            Verdict::Discard
        }
    }

    fn opaque<'a>(&self, span: &'a [u8]) -> Verdict<'a> {
        if self.config.retain_opaque_spans {
            Verdict::Opaque(span)
        } else {
            Verdict::Discard
        }
    }
}

/// Printable in the sense of "renders as visible text".
///
/// Decided by Unicode general category: controls, format characters,
/// surrogates, private use, unassigned code points and every separator
/// except the ASCII space disqualify a string from being text.
pub fn is_printable(c: char) -> bool {
    match get_general_category(c) {
        GeneralCategory::SpaceSeparator => c == ' ',
        GeneralCategory::Control
        | GeneralCategory::Format
        | GeneralCategory::Surrogate
        | GeneralCategory::PrivateUse
        | GeneralCategory::Unassigned
        | GeneralCategory::LineSeparator
        | GeneralCategory::ParagraphSeparator => false,
        _ => true,
    }
}

struct Frame<'a> {
    walker: FieldWalker<'a>,
    /// Top-level ancestor, inherited unchanged by deeper frames
    parent_field_number: Option<u64>,
    enclosing_field_number: Option<u64>,
    depth: usize,
}

/// Depth-first iterator over the classified items of a buffer.
///
/// Items come out in the order a recursive descent would produce them: a
/// nested span's items appear where its enclosing field sits.
pub struct Items<'c, 'a> {
    classifier: &'c Classifier,
    root: &'a Bytes,
    stack: Vec<Frame<'a>>,
    resyncs: usize,
}

impl<'c, 'a> Items<'c, 'a> {
    fn new(classifier: &'c Classifier, root: &'a Bytes) -> Self {
        Self {
            classifier,
            root,
            stack: vec![Frame {
                walker: walk(root),
                parent_field_number: None,
                enclosing_field_number: None,
                depth: 0,
            }],
            resyncs: 0,
        }
    }

    /// Resyncs performed by all walkers that have finished so far
    pub fn resyncs(&self) -> usize {
        self.resyncs
    }

    fn may_descend(&self, depth: usize) -> bool {
        self.classifier
            .config
            .max_depth
            .map_or(true, |max| depth < max)
    }
}

impl Iterator for Items<'_, '_> {
    type Item = ClassifiedItem;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            let Some(field) = frame.walker.next() else {
                self.resyncs += frame.walker.resyncs();
                self.stack.pop();
                continue;
            };
            let parent_field_number = frame.parent_field_number;
            let enclosing_field_number = frame.enclosing_field_number;
            let depth = frame.depth;

            let mut verdict = self.classifier.judge(&field);
            if let Verdict::Descend(span) = verdict {
                if self.may_descend(depth) {
                    trace!(
                        "Descending into field {} ({} bytes) at depth {}",
                        field.field_number,
                        span.len(),
                        depth
                    );
                    self.stack.push(Frame {
                        walker: walk(span),
                        parent_field_number: parent_field_number.or(Some(field.field_number)),
                        enclosing_field_number: Some(field.field_number),
                        depth: depth + 1,
                    });
                    continue;
                }
                verdict = self.classifier.opaque(span);
            }

            let value = match verdict {
                Verdict::Text(value) => ItemValue::Text { value },
                Verdict::Coordinate(value, wire_type) => {
                    ItemValue::Coordinate { value, wire_type }
                }
                Verdict::Opaque(span) => ItemValue::Bytes {
                    span: self.root.slice_ref(span),
                    length: span.len(),
                },
                Verdict::Descend(_) | Verdict::Discard => continue,
            };

            return Some(ClassifiedItem {
                field_number: field.field_number,
                parent_field_number,
                enclosing_field_number,
                depth,
                value,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn len_field(field_number: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![(field_number << 3) | 2, payload.len() as u8];
        out.extend_from_slice(payload);
        out
    }

    fn text(
        field_number: u64,
        parent: Option<u64>,
        enclosing: Option<u64>,
        depth: usize,
        value: &str,
    ) -> ClassifiedItem {
        ClassifiedItem {
            field_number,
            parent_field_number: parent,
            enclosing_field_number: enclosing,
            depth,
            value: ItemValue::Text {
                value: value.to_string(),
            },
        }
    }

    #[test]
    fn test_config_builder() {
        let config = ClassifierConfig::new()
            .min_text_chars(4)
            .min_nested_span(32)
            .coordinate_bound(90.0)
            .require_letter(true)
            .retain_opaque_spans(true)
            .max_depth(Some(3));

        assert_eq!(config.min_text_chars, 4);
        assert_eq!(config.min_nested_span, 32);
        assert_eq!(config.coordinate_bound, 90.0);
        assert!(config.require_letter);
        assert!(config.retain_opaque_spans);
        assert_eq!(config.max_depth, Some(3));
    }

    #[test]
    fn test_text_length_boundary() {
        let classifier = Classifier::new();
        let two = DecodedField::new(1, Payload::LengthDelimited(b"ab"));
        let three = DecodedField::new(1, Payload::LengthDelimited(b"abc"));
        assert_eq!(classifier.judge(&two), Verdict::Discard);
        assert_eq!(classifier.judge(&three), Verdict::Text("abc".into()));
    }

    #[test]
    fn test_text_counts_chars_not_bytes() {
        let classifier = Classifier::new();
        // Two chars, four bytes
        let field = DecodedField::new(1, Payload::LengthDelimited("ÄÖ".as_bytes()));
        assert_eq!(classifier.judge(&field), Verdict::Discard);
        let field = DecodedField::new(1, Payload::LengthDelimited("Café".as_bytes()));
        assert_eq!(classifier.judge(&field), Verdict::Text("Café".into()));
    }

    #[test]
    fn test_non_printable_is_not_text() {
        let classifier = Classifier::new();
        let payloads: [&[u8]; 4] = [
            b"ab\ncd",
            b"tab\there",
            b"nul\0!",
            "zero\u{200B}width".as_bytes(),
        ];
        for payload in payloads {
            let field = DecodedField::new(1, Payload::LengthDelimited(payload));
            assert!(!matches!(classifier.judge(&field), Verdict::Text(_)));
        }
    }

    #[test]
    fn test_invalid_utf8_is_not_text() {
        let classifier = Classifier::new();
        let field = DecodedField::new(1, Payload::LengthDelimited(&[0xC3, 0x28, 0x41, 0x42]));
        assert_eq!(classifier.judge(&field), Verdict::Discard);
    }

    #[test]
    fn test_require_letter() {
        let classifier = Classifier::with_config(ClassifierConfig::new().require_letter(true));
        let digits = DecodedField::new(1, Payload::LengthDelimited(b"12345"));
        assert_eq!(classifier.judge(&digits), Verdict::Discard);
        assert!(Classifier::new().classify(&digits).is_some());
    }

    #[test]
    fn test_coordinate_range_is_inclusive() {
        let classifier = Classifier::new();
        for value in [-180.0, 0.0, 40.4093, 180.0] {
            let field = DecodedField::new(2, Payload::Fixed64(value));
            assert_eq!(
                classifier.judge(&field),
                Verdict::Coordinate(value, WireType::Fixed64)
            );
        }
        for value in [-180.0001, 180.0001, f64::NAN, f64::INFINITY] {
            let field = DecodedField::new(2, Payload::Fixed64(value));
            assert_eq!(classifier.judge(&field), Verdict::Discard);
        }
    }

    #[test]
    fn test_fixed32_out_of_range_dropped() {
        let field = DecodedField::new(3, Payload::Fixed32(200.0));
        assert!(Classifier::new().classify(&field).is_none());
    }

    #[test]
    fn test_varints_discarded() {
        let field = DecodedField::new(3, Payload::Varint(42));
        assert_eq!(Classifier::new().judge(&field), Verdict::Discard);
    }

    #[test]
    fn test_nested_span_length_boundary() {
        let classifier = Classifier::new();
        let ten = [0xFFu8; 10];
        let eleven = [0xFFu8; 11];
        assert_eq!(
            classifier.judge(&DecodedField::new(1, Payload::LengthDelimited(&ten))),
            Verdict::Discard
        );
        assert_eq!(
            classifier.judge(&DecodedField::new(1, Payload::LengthDelimited(&eleven))),
            Verdict::Descend(&eleven)
        );
    }

    #[test]
    fn test_extract_descends_and_annotates() {
        // field 4 { field 1: "Central Gym", field 2 { field 3: "Madrid" } }
        let mut inner = len_field(1, b"Central Gym");
        inner.extend(len_field(2, &len_field(3, b"Madrid Centro")));
        let data = Bytes::from(len_field(4, &inner));

        let items = Classifier::new().extract(&data);
        assert_eq!(
            items,
            vec![
                text(1, Some(4), Some(4), 1, "Central Gym"),
                text(3, Some(4), Some(2), 2, "Madrid Centro"),
            ]
        );
    }

    #[test]
    fn test_extract_preserves_document_order() {
        let mut data = len_field(1, b"first");
        data.extend(len_field(2, &len_field(1, b"second one")));
        data.extend(len_field(3, b"third"));
        let items = Classifier::new().extract(&Bytes::from(data));
        let texts: Vec<_> = items.iter().filter_map(|i| i.as_text()).collect();
        assert_eq!(texts, vec!["first", "second one", "third"]);
    }

    #[test]
    fn test_max_depth_stops_descent() {
        let data = Bytes::from(len_field(4, &len_field(1, b"Central Gym")));
        let classifier = Classifier::with_config(ClassifierConfig::new().max_depth(Some(0)));
        assert!(classifier.extract(&data).is_empty());

        let retaining = Classifier::with_config(
            ClassifierConfig::new()
                .max_depth(Some(0))
                .retain_opaque_spans(true),
        );
        let items = retaining.extract(&data);
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0].value, ItemValue::Bytes { length: 13, .. }));
    }

    #[test]
    fn test_retained_span_shares_allocation() {
        let data = Bytes::from(len_field(7, &[0x00, 0x01, 0x02]));
        let classifier = Classifier::with_config(ClassifierConfig::new().retain_opaque_spans(true));
        let items = classifier.extract(&data);
        match &items[0].value {
            ItemValue::Bytes { span, length } => {
                assert_eq!(*length, 3);
                assert_eq!(span.as_ref(), &[0x00, 0x01, 0x02]);
                assert_eq!(span.as_ptr(), data[2..].as_ptr());
            }
            other => panic!("expected bytes item, got {:?}", other),
        }
    }

    #[test]
    fn test_deep_nesting_does_not_overflow() {
        // 20_000 levels of field 1 wrapping field 1 ... wrapping a short text
        let mut data = len_field(2, b"bottom text");
        for _ in 0..20_000 {
            let mut wrapped = vec![0x0A];
            let mut len = data.len() as u64;
            loop {
                let byte = (len & 0x7F) as u8;
                len >>= 7;
                if len == 0 {
                    wrapped.push(byte);
                    break;
                }
                wrapped.push(byte | 0x80);
            }
            wrapped.extend(data);
            data = wrapped;
        }

        let items = Classifier::new().extract(&Bytes::from(data));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_text(), Some("bottom text"));
        assert_eq!(items[0].depth, 20_000);
        assert_eq!(items[0].parent_field_number, Some(1));
        assert_eq!(items[0].enclosing_field_number, Some(1));
    }

    #[test]
    fn test_is_printable() {
        assert!(is_printable(' '));
        assert!(is_printable('é'));
        assert!(is_printable('東'));
        assert!(!is_printable('\t'));
        assert!(!is_printable('\u{00A0}'));
        assert!(!is_printable('\u{FEFF}'));
        assert!(!is_printable('\u{2028}'));
    }

    #[test]
    fn test_invisible_and_unassigned_are_not_printable() {
        // Arabic number sign, end of ayah, Kaithi number sign
        assert!(!is_printable('\u{0600}'));
        assert!(!is_printable('\u{06DD}'));
        assert!(!is_printable('\u{110BD}'));
        // Language tag and tag letter
        assert!(!is_printable('\u{E0001}'));
        assert!(!is_printable('\u{E0041}'));
        // Supplementary private use and an unassigned code point
        assert!(!is_printable('\u{F0000}'));
        assert!(!is_printable('\u{0378}'));
        // Marks and symbols stay printable
        assert!(is_printable('\u{0301}'));
        assert!(is_printable('€'));
    }

    #[test]
    fn test_tag_character_disqualifies_text() {
        let classifier = Classifier::new();
        let data = "Gym\u{E0041}".as_bytes();
        assert_eq!(
            classifier.judge(&DecodedField::new(1, Payload::LengthDelimited(data))),
            Verdict::Discard
        );
    }
}
