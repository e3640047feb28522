//! Extraction of coordinate pairs from a parsed document.

use thiserror::Error;

use crate::{
    error::TypeMismatch,
    value::{JsonArray, JsonKind, JsonValue},
};

/// Two points on the sphere, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(any(test, feature = "serde"), derive(serde::Serialize))]
pub struct HaversinePair {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    #[error("expected an array of pairs or an object with \"pairs\", found {0}")]
    UnsupportedShape(JsonKind),
    #[error("pair {index} has no field `{field}`")]
    MissingField { index: usize, field: &'static str },
    #[error("pair {index}: {source}")]
    TypeMismatch {
        index: usize,
        #[source]
        source: TypeMismatch,
    },
}

const FIELDS: [&str; 4] = ["x0", "y0", "x1", "y1"];

/// Returns the array holding the pairs: either the document itself or its
/// `"pairs"` member.
///
/// # Errors
///
/// Returns [`DecodeError::UnsupportedShape`] for any other layout.
pub fn pairs_array<'v, 'a>(document: &'v JsonValue<'a>) -> Result<&'v JsonArray<'a>, DecodeError> {
    match document {
        JsonValue::Array(items) => Ok(items),
        JsonValue::Object(object) => match object.get("pairs") {
            Some(JsonValue::Array(items)) => Ok(items),
            Some(other) => Err(DecodeError::UnsupportedShape(other.kind())),
            None => Err(DecodeError::UnsupportedShape(JsonKind::Object)),
        },
        other => Err(DecodeError::UnsupportedShape(other.kind())),
    }
}

/// Decodes every element of the pairs array.
///
/// # Errors
///
/// Fails on the first element that is not an object with four numeric
/// fields `x0`, `y0`, `x1`, `y1`.
pub fn decode_pairs(document: &JsonValue<'_>) -> Result<Vec<HaversinePair>, DecodeError> {
    let items = pairs_array(document)?;
    tracing::debug!(count = items.len(), "decoding haversine pairs");

    items
        .iter()
        .enumerate()
        .map(|(index, item)| decode_pair(index, item))
        .collect()
}

fn decode_pair(index: usize, item: &JsonValue<'_>) -> Result<HaversinePair, DecodeError> {
    let object = item
        .as_object()
        .map_err(|source| DecodeError::TypeMismatch { index, source })?;

    let mut coords = [0.0; 4];
    for (slot, field) in coords.iter_mut().zip(FIELDS) {
        *slot = object
            .get(field)
            .ok_or(DecodeError::MissingField { index, field })?
            .as_f64()
            .map_err(|source| DecodeError::TypeMismatch { index, source })?;
    }

    let [x0, y0, x1, y1] = coords;
    Ok(HaversinePair { x0, y0, x1, y1 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Arena, ParserOptions, parse};

    fn decode(input: &str) -> Result<Vec<HaversinePair>, DecodeError> {
        let arena = Arena::with_capacity(1024);
        let document = parse(input.as_bytes(), &arena, ParserOptions::default()).unwrap();
        decode_pairs(&document)
    }

    #[test]
    fn accepts_bare_array_and_pairs_object() {
        let expected = vec![HaversinePair {
            x0: 1.0,
            y0: 2.0,
            x1: 3.0,
            y1: 4.0,
        }];
        let bare = r#"[{"x0": 1, "y0": 2, "x1": 3, "y1": 4}]"#;
        let wrapped = r#"{"pairs": [{"y1": 4, "x1": 3, "y0": 2, "x0": 1}]}"#;
        assert_eq!(decode(bare), Ok(expected.clone()));
        assert_eq!(decode(wrapped), Ok(expected));
        assert_eq!(decode("[]"), Ok(vec![]));
    }

    #[test]
    fn pairs_serialize_as_flat_objects() {
        let pair = HaversinePair {
            x0: 1.5,
            y0: -2.0,
            x1: 0.0,
            y1: 80.0,
        };
        assert_eq!(
            serde_json::to_value(pair).unwrap(),
            serde_json::json!({"x0": 1.5, "y0": -2.0, "x1": 0.0, "y1": 80.0})
        );
    }

    #[test]
    fn rejects_other_shapes() {
        assert_eq!(
            decode("42"),
            Err(DecodeError::UnsupportedShape(JsonKind::Number))
        );
        assert_eq!(
            decode(r#"{"points": []}"#),
            Err(DecodeError::UnsupportedShape(JsonKind::Object))
        );
        assert_eq!(
            decode(r#"{"pairs": "none"}"#),
            Err(DecodeError::UnsupportedShape(JsonKind::String))
        );
    }

    #[test]
    fn reports_the_offending_pair() {
        let missing = r#"[{"x0": 1, "y0": 2, "x1": 3, "y1": 4}, {"x0": 1, "y0": 2, "x1": 3}]"#;
        assert_eq!(
            decode(missing),
            Err(DecodeError::MissingField {
                index: 1,
                field: "y1"
            })
        );

        let wrong = r#"[{"x0": "1", "y0": 2, "x1": 3, "y1": 4}]"#;
        assert_eq!(
            decode(wrong).unwrap_err().to_string(),
            "pair 0: expected number, found string"
        );
        assert!(matches!(
            decode("[null]"),
            Err(DecodeError::TypeMismatch { index: 0, .. })
        ));
    }
}
