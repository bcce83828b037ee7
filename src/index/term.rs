//! Index field names and the order-preserving term encoding.
//!
//! A term key is `field 0x00 tag value`. Keys of one field are contiguous in
//! the term dictionary and, within a field, byte order equals value order for
//! values of the same type.

use std::ops::Bound;
use chrono::{DateTime, TimeZone, Utc};
use crate::core::types::PropertyValue;

pub const URI: &str = "uri";
pub const NAME: &str = "name";
pub const TYPE: &str = "type";
pub const OWNER: &str = "_owner";
pub const ACL_READ: &str = "_acl_read";
pub const PUBLISHED: &str = "_published";
pub const UNPUBLISHED_COLLECTION: &str = "_unpublished_collection";

// Stored-field keys of the system fields
pub const STORED_URI: &str = "_uri";
pub const STORED_NAME: &str = "_name";
pub const STORED_TYPE: &str = "_type";
pub const STORED_ACL: &str = "_acl";

const SEPARATOR: u8 = 0x00;

const TAG_STRING: u8 = b's';
const TAG_INTEGER: u8 = b'i';
const TAG_BOOLEAN: u8 = b'b';
const TAG_DATE: u8 = b'd';
const TAG_JSON: u8 = b'j';

/// Field holding the analyzed tokens of a string-valued field.
pub fn text_field(field: &str) -> String {
    format!("{}#text", field)
}

/// Field holding one top-level attribute of complex values.
pub fn attribute_field(field: &str, attribute: &str) -> String {
    format!("{}@{}", field, attribute)
}

pub fn field_prefix(field: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(field.len() + 1);
    key.extend_from_slice(field.as_bytes());
    key.push(SEPARATOR);
    key
}

/// Exclusive upper bound of every key of `field`.
pub fn field_end(field: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(field.len() + 1);
    key.extend_from_slice(field.as_bytes());
    key.push(SEPARATOR + 1);
    key
}

pub fn term_key(field: &str, encoded: &[u8]) -> Vec<u8> {
    let mut key = field_prefix(field);
    key.extend_from_slice(encoded);
    key
}

pub fn encode_value(value: &PropertyValue) -> Vec<u8> {
    match value {
        PropertyValue::String(s) => encode_str(s),
        PropertyValue::Integer(v) => encode_signed(TAG_INTEGER, *v),
        PropertyValue::Boolean(b) => vec![TAG_BOOLEAN, u8::from(*b)],
        PropertyValue::Date(d) => encode_signed(TAG_DATE, d.timestamp_millis()),
        PropertyValue::Json(text) => {
            let mut bytes = vec![TAG_JSON];
            bytes.extend_from_slice(text.as_bytes());
            bytes
        }
    }
}

pub fn encode_str(s: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(s.len() + 1);
    bytes.push(TAG_STRING);
    bytes.extend_from_slice(s.as_bytes());
    bytes
}

pub fn encode_bool(b: bool) -> Vec<u8> {
    encode_value(&PropertyValue::Boolean(b))
}

// Flipping the sign bit makes big-endian two's complement sort numerically
fn encode_signed(tag: u8, v: i64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(9);
    bytes.push(tag);
    bytes.extend_from_slice(&((v as u64) ^ (1 << 63)).to_be_bytes());
    bytes
}

fn decode_signed(bytes: &[u8]) -> Option<i64> {
    let raw: [u8; 8] = bytes.try_into().ok()?;
    Some((u64::from_be_bytes(raw) ^ (1 << 63)) as i64)
}

pub fn decode_value(bytes: &[u8]) -> Option<PropertyValue> {
    let (&tag, rest) = bytes.split_first()?;
    match tag {
        TAG_STRING => std::str::from_utf8(rest).ok().map(PropertyValue::from),
        TAG_INTEGER => decode_signed(rest).map(PropertyValue::Integer),
        TAG_BOOLEAN => rest.first().map(|b| PropertyValue::Boolean(*b != 0)),
        TAG_DATE => {
            let millis = decode_signed(rest)?;
            let date: DateTime<Utc> = Utc.timestamp_millis_opt(millis).single()?;
            Some(PropertyValue::Date(date))
        }
        TAG_JSON => std::str::from_utf8(rest).ok().map(|s| PropertyValue::Json(s.to_string())),
        _ => None,
    }
}

/// String payload of an encoded string term.
pub fn decode_str(bytes: &[u8]) -> Option<&str> {
    match bytes.split_first() {
        Some((&TAG_STRING, rest)) => std::str::from_utf8(rest).ok(),
        _ => None,
    }
}

/// Case-folded form of an encoded value; non-strings are returned as-is.
pub fn fold_case(bytes: &[u8]) -> Vec<u8> {
    match decode_str(bytes) {
        Some(s) => encode_str(&s.to_lowercase()),
        None => bytes.to_vec(),
    }
}

fn type_tag(value: &PropertyValue) -> u8 {
    match value {
        PropertyValue::String(_) => TAG_STRING,
        PropertyValue::Integer(_) => TAG_INTEGER,
        PropertyValue::Boolean(_) => TAG_BOOLEAN,
        PropertyValue::Date(_) => TAG_DATE,
        PropertyValue::Json(_) => TAG_JSON,
    }
}

/// Key-space bounds for a value range within `field`. An open side stops at
/// the edge of the other bound's value type, so `>= 2` never reaches strings.
pub fn range_bounds(
    field: &str,
    lower: Option<&PropertyValue>,
    upper: Option<&PropertyValue>,
    include_lower: bool,
    include_upper: bool,
) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
    let tag = lower.or(upper).map(type_tag);
    let lower_key = match (lower, tag) {
        (Some(v), _) if include_lower => Bound::Included(term_key(field, &encode_value(v))),
        (Some(v), _) => Bound::Excluded(term_key(field, &encode_value(v))),
        (None, Some(tag)) => Bound::Included(term_key(field, &[tag])),
        (None, None) => Bound::Included(field_prefix(field)),
    };
    let upper_key = match (upper, tag) {
        (Some(v), _) if include_upper => Bound::Included(term_key(field, &encode_value(v))),
        (Some(v), _) => Bound::Excluded(term_key(field, &encode_value(v))),
        (None, Some(tag)) => Bound::Excluded(term_key(field, &[tag + 1])),
        (None, None) => Bound::Excluded(field_end(field)),
    };
    (lower_key, upper_key)
}
