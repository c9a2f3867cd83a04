//! Mapping between attribute values and fixed-width DBF cells.

use chrono::NaiveDate;
use encoding_rs::Encoding;
use tracing::{debug, warn};

use geoshp_core::config::OverflowPolicy;
use geoshp_core::error::{Result, ShpError};
use geoshp_core::models::{AttributeDescriptor, AttributeKind, AttributeValue};

use super::{DbaseField, FieldType, MAX_DOUBLE_WIDTH, MAX_INTEGER_WIDTH, MAX_LONG_WIDTH, MAX_TEXT_WIDTH};

/// A value that was shortened to fit its field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbaseWarning {
    pub field: String,
    pub value: String,
    pub written: String,
}

/// DBF column for an attribute; `None` for columns the format cannot hold
pub fn field_for(descriptor: &AttributeDescriptor) -> Option<DbaseField> {
    let capped = |default: usize, max: usize| descriptor.length.unwrap_or(default).clamp(1, max);

    let field = match descriptor.kind {
        AttributeKind::Geometry => return None,
        AttributeKind::Integer => {
            DbaseField::new(&descriptor.name, FieldType::Numeric, capped(MAX_INTEGER_WIDTH, MAX_INTEGER_WIDTH), 0)
        }
        AttributeKind::Long => {
            DbaseField::new(&descriptor.name, FieldType::Numeric, capped(MAX_LONG_WIDTH, MAX_LONG_WIDTH), 0)
        }
        AttributeKind::Double => {
            let length = capped(MAX_DOUBLE_WIDTH, MAX_DOUBLE_WIDTH).max(3);
            let decimals = descriptor.decimals.unwrap_or(length - 2).min(length - 2);
            DbaseField::new(&descriptor.name, FieldType::Numeric, length, decimals)
        }
        AttributeKind::Date => DbaseField::new(&descriptor.name, FieldType::Date, 8, 0),
        AttributeKind::Boolean => DbaseField::new(&descriptor.name, FieldType::Logical, 1, 0),
        AttributeKind::Text => {
            DbaseField::new(&descriptor.name, FieldType::Character, capped(MAX_TEXT_WIDTH, MAX_TEXT_WIDTH), 0)
        }
    };
    Some(field)
}

/// Attribute kind reported for a DBF column
pub fn kind_for(field: &DbaseField) -> AttributeKind {
    match field.field_type {
        FieldType::Character => AttributeKind::Text,
        FieldType::Date => AttributeKind::Date,
        FieldType::Logical => AttributeKind::Boolean,
        FieldType::Numeric if field.decimals == 0 && field.length < MAX_INTEGER_WIDTH => AttributeKind::Integer,
        FieldType::Numeric if field.decimals == 0 && field.length <= MAX_LONG_WIDTH => AttributeKind::Long,
        FieldType::Numeric | FieldType::Float => AttributeKind::Double,
    }
}

/// Formats one cell, exactly `field.length` bytes wide
pub fn format_value(
    field: &DbaseField,
    value: &AttributeValue,
    encoding: &'static Encoding,
    policy: OverflowPolicy,
) -> Result<(Vec<u8>, Option<DbaseWarning>)> {
    if value.is_null() {
        let fill = if field.field_type == FieldType::Logical { b'?' } else { b' ' };
        return Ok((vec![fill; field.length], None));
    }

    match field.field_type {
        FieldType::Character => format_text(field, &value.to_string(), encoding, policy),
        FieldType::Numeric | FieldType::Float => format_number(field, value, policy),
        FieldType::Date => {
            let date = match value {
                AttributeValue::Date(d) => *d,
                AttributeValue::Text(s) => parse_date(s.trim()).ok_or_else(|| mismatch(field, value))?,
                _ => return Err(mismatch(field, value)),
            };
            Ok((date.format("%Y%m%d").to_string().into_bytes(), None))
        }
        FieldType::Logical => {
            let flag = match value {
                AttributeValue::Boolean(true) => b'T',
                AttributeValue::Boolean(false) => b'F',
                AttributeValue::Text(s) => match parse_logical(s.trim()) {
                    Some(true) => b'T',
                    Some(false) => b'F',
                    None => return Err(mismatch(field, value)),
                },
                _ => return Err(mismatch(field, value)),
            };
            Ok((vec![flag], None))
        }
    }
}

fn mismatch(field: &DbaseField, value: &AttributeValue) -> ShpError {
    ShpError::UnsupportedAttribute {
        name: field.name.clone(),
        kind: format!("value '{}' for a {} column", value, field.field_type),
    }
}

fn overflow(
    field: &DbaseField,
    original: &str,
    written: String,
    policy: OverflowPolicy,
) -> Result<Option<DbaseWarning>> {
    match policy {
        OverflowPolicy::Fail => Err(ShpError::FieldOverflow {
            field: field.name.clone(),
            value: original.to_string(),
            width: field.length,
        }),
        OverflowPolicy::Truncate => {
            warn!("Value '{}' truncated to '{}' to fit field {} (width {})", original, written, field.name, field.length);
            Ok(Some(DbaseWarning { field: field.name.clone(), value: original.to_string(), written }))
        }
    }
}

fn format_text(
    field: &DbaseField,
    text: &str,
    encoding: &'static Encoding,
    policy: OverflowPolicy,
) -> Result<(Vec<u8>, Option<DbaseWarning>)> {
    let (encoded, _, unmappable) = encoding.encode(text);
    if unmappable {
        debug!("Field {}: characters of '{}' not representable in {}", field.name, text, encoding.name());
    }

    let mut warning = None;
    let mut bytes = encoded.into_owned();
    if bytes.len() > field.length {
        // shorten on character boundaries so multi-byte encodings stay valid
        let mut kept = String::new();
        let mut kept_bytes = Vec::new();
        for c in text.chars() {
            let mut candidate = kept.clone();
            candidate.push(c);
            let (enc, _, _) = encoding.encode(&candidate);
            if enc.len() > field.length {
                break;
            }
            kept_bytes = enc.into_owned();
            kept = candidate;
        }
        warning = overflow(field, text, kept, policy)?;
        bytes = kept_bytes;
    }

    bytes.resize(field.length, b' ');
    Ok((bytes, warning))
}

fn format_number(
    field: &DbaseField,
    value: &AttributeValue,
    policy: OverflowPolicy,
) -> Result<(Vec<u8>, Option<DbaseWarning>)> {
    let number = match value {
        AttributeValue::Integer(i) => Number::Integer(*i),
        AttributeValue::Double(d) if d.is_finite() => Number::Double(*d),
        AttributeValue::Text(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Number::Integer(i)
            } else {
                match s.parse::<f64>() {
                    Ok(d) if d.is_finite() => Number::Double(d),
                    _ => return Err(mismatch(field, value)),
                }
            }
        }
        AttributeValue::Boolean(b) => Number::Integer(*b as i64),
        _ => return Err(mismatch(field, value)),
    };

    // rounding away fractional digits is not an overflow
    if let Some(text) = (0..=field.decimals)
        .rev()
        .map(|decimals| number.render(decimals))
        .find(|candidate| candidate.len() <= field.length)
    {
        return Ok((format!("{:>width$}", text, width = field.length).into_bytes(), None));
    }

    // the integer part alone is too wide: fill with the dBASE overflow marker
    let written = "*".repeat(field.length);
    let warning = overflow(field, &number.render(0), written.clone(), policy)?;
    Ok((written.into_bytes(), warning))
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Integer(i64),
    Double(f64),
}

impl Number {
    fn render(&self, decimals: usize) -> String {
        match self {
            Number::Integer(i) if decimals == 0 => i.to_string(),
            Number::Integer(i) => format!("{:.*}", decimals, *i as f64),
            Number::Double(d) => format!("{:.*}", decimals, d),
        }
    }
}

/// Parse one cell. Blank cells and unreadable numbers are null.
pub fn parse_value(field: &DbaseField, cell: &[u8], encoding: &'static Encoding) -> AttributeValue {
    match field.field_type {
        FieldType::Character => {
            let (text, _) = encoding.decode_without_bom_handling(cell);
            AttributeValue::Text(text.trim_end_matches(is_padding).to_string())
        }
        FieldType::Numeric | FieldType::Float => {
            let text = String::from_utf8_lossy(cell);
            let text = text.trim_matches(is_padding);
            if text.is_empty() {
                return AttributeValue::Null;
            }
            if field.is_integral() {
                if let Ok(i) = text.parse::<i64>() {
                    return AttributeValue::Integer(i);
                }
            }
            match text.parse::<f64>() {
                Ok(d) if field.is_integral() && d.fract() == 0.0 && d.abs() < i64::MAX as f64 => {
                    AttributeValue::Integer(d as i64)
                }
                Ok(d) => AttributeValue::Double(d),
                Err(_) => {
                    debug!("Unreadable number '{}' in field {}", text, field.name);
                    AttributeValue::Null
                }
            }
        }
        FieldType::Date => {
            let text = String::from_utf8_lossy(cell);
            parse_date(text.trim_matches(is_padding)).map_or(AttributeValue::Null, AttributeValue::Date)
        }
        FieldType::Logical => {
            let text = String::from_utf8_lossy(cell);
            parse_logical(text.trim()).map_or(AttributeValue::Null, AttributeValue::Boolean)
        }
    }
}

fn is_padding(c: char) -> bool {
    c == ' ' || c == '\0'
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    if text.is_empty() || text.chars().all(|c| c == '0') {
        return None;
    }
    NaiveDate::parse_from_str(text, "%Y%m%d").or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d")).ok()
}

fn parse_logical(text: &str) -> Option<bool> {
    match text.chars().next()? {
        'T' | 't' | 'Y' | 'y' => Some(true),
        'F' | 'f' | 'N' | 'n' => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{UTF_8, WINDOWS_1252};

    fn numeric(length: usize, decimals: usize) -> DbaseField {
        DbaseField::new("value", FieldType::Numeric, length, decimals)
    }

    #[test]
    fn test_field_mapping_caps() {
        let integer = field_for(&AttributeDescriptor::new("n", AttributeKind::Integer).with_length(40)).unwrap();
        assert_eq!((integer.field_type, integer.length, integer.decimals), (FieldType::Numeric, 10, 0));

        let long = field_for(&AttributeDescriptor::new("n", AttributeKind::Long)).unwrap();
        assert_eq!(long.length, 19);

        let double = field_for(&AttributeDescriptor::new("d", AttributeKind::Double)).unwrap();
        assert_eq!((double.length, double.decimals), (33, 31));

        let text = field_for(&AttributeDescriptor::new("t", AttributeKind::Text).with_length(500)).unwrap();
        assert_eq!((text.field_type, text.length), (FieldType::Character, 254));

        assert_eq!(field_for(&AttributeDescriptor::new("d", AttributeKind::Date)).unwrap().length, 8);
        assert_eq!(field_for(&AttributeDescriptor::new("b", AttributeKind::Boolean)).unwrap().field_type, FieldType::Logical);
        assert!(field_for(&AttributeDescriptor::new("the_geom", AttributeKind::Geometry)).is_none());
    }

    #[test]
    fn test_numbers_are_right_justified() {
        let (bytes, warning) =
            format_value(&numeric(6, 0), &AttributeValue::Integer(42), WINDOWS_1252, OverflowPolicy::Fail).unwrap();
        assert_eq!(bytes, b"    42");
        assert!(warning.is_none());

        let (bytes, _) =
            format_value(&numeric(8, 2), &AttributeValue::Double(3.14159), WINDOWS_1252, OverflowPolicy::Fail)
                .unwrap();
        assert_eq!(bytes, b"    3.14");
    }

    #[test]
    fn test_text_is_left_justified() {
        let field = DbaseField::new("name", FieldType::Character, 5, 0);
        let (bytes, _) = format_value(&field, &"ab".into(), WINDOWS_1252, OverflowPolicy::Fail).unwrap();
        assert_eq!(bytes, b"ab   ");
    }

    #[test]
    fn test_numeric_overflow_strict() {
        let err = format_value(&numeric(4, 0), &AttributeValue::Integer(123456), WINDOWS_1252, OverflowPolicy::Fail)
            .unwrap_err();
        assert!(matches!(err, ShpError::FieldOverflow { width: 4, .. }));
    }

    #[test]
    fn test_numeric_overflow_lenient() {
        let (bytes, warning) =
            format_value(&numeric(4, 0), &AttributeValue::Integer(123456), WINDOWS_1252, OverflowPolicy::Truncate)
                .unwrap();
        assert_eq!(bytes, b"****");
        assert_eq!(parse_value(&numeric(4, 0), &bytes, WINDOWS_1252), AttributeValue::Null);
        let warning = warning.unwrap();
        assert_eq!(warning.value, "123456");
        assert_eq!(warning.written, "****");
    }

    #[test]
    fn test_fractional_digits_are_rounded_away() {
        for policy in [OverflowPolicy::Fail, OverflowPolicy::Truncate] {
            let (bytes, warning) =
                format_value(&numeric(6, 2), &AttributeValue::Double(1234.567), WINDOWS_1252, policy).unwrap();
            assert_eq!(bytes, b"1234.6");
            assert!(warning.is_none());
        }

        let default_double = field_for(&AttributeDescriptor::new("d", AttributeKind::Double)).unwrap();
        for value in [12.5, -1.5, 123456789.25] {
            let (bytes, warning) =
                format_value(&default_double, &AttributeValue::Double(value), WINDOWS_1252, OverflowPolicy::Fail)
                    .unwrap();
            assert_eq!(bytes.len(), 33);
            assert!(warning.is_none());
            assert_eq!(parse_value(&default_double, &bytes, WINDOWS_1252), AttributeValue::Double(value));
        }
    }

    #[test]
    fn test_text_overflow_keeps_whole_characters() {
        let field = DbaseField::new("name", FieldType::Character, 4, 0);
        let (bytes, warning) = format_value(&field, &"aéé".into(), UTF_8, OverflowPolicy::Truncate).unwrap();
        assert_eq!(bytes, "aé ".as_bytes());
        assert_eq!(warning.unwrap().written, "aé");

        assert!(format_value(&field, &"abcdef".into(), UTF_8, OverflowPolicy::Fail).is_err());
    }

    #[test]
    fn test_nulls_and_parsing() {
        let (bytes, _) = format_value(&numeric(3, 0), &AttributeValue::Null, WINDOWS_1252, OverflowPolicy::Fail).unwrap();
        assert_eq!(bytes, b"   ");
        assert_eq!(parse_value(&numeric(3, 0), &bytes, WINDOWS_1252), AttributeValue::Null);

        assert_eq!(parse_value(&numeric(5, 0), b"  -17", WINDOWS_1252), AttributeValue::Integer(-17));
        assert_eq!(parse_value(&numeric(6, 2), b"  2.50", WINDOWS_1252), AttributeValue::Double(2.5));
        assert_eq!(parse_value(&numeric(4, 0), b"****", WINDOWS_1252), AttributeValue::Null);

        let date = DbaseField::new("d", FieldType::Date, 8, 0);
        assert_eq!(
            parse_value(&date, b"20240229", WINDOWS_1252),
            AttributeValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert_eq!(parse_value(&date, b"00000000", WINDOWS_1252), AttributeValue::Null);

        let flag = DbaseField::new("b", FieldType::Logical, 1, 0);
        assert_eq!(parse_value(&flag, b"Y", WINDOWS_1252), AttributeValue::Boolean(true));
        assert_eq!(parse_value(&flag, b"?", WINDOWS_1252), AttributeValue::Null);
    }

    #[test]
    fn test_latin1_text() {
        let field = DbaseField::new("name", FieldType::Character, 6, 0);
        let (bytes, _) = format_value(&field, &"Zürich".into(), WINDOWS_1252, OverflowPolicy::Fail).unwrap();
        assert_eq!(bytes[1], 0xFC);
        assert_eq!(parse_value(&field, &bytes, WINDOWS_1252), AttributeValue::Text("Zürich".to_string()));
    }

    #[test]
    fn test_kind_for_widths() {
        assert_eq!(kind_for(&numeric(9, 0)), AttributeKind::Integer);
        assert_eq!(kind_for(&numeric(10, 0)), AttributeKind::Long);
        assert_eq!(kind_for(&numeric(19, 0)), AttributeKind::Long);
        assert_eq!(kind_for(&numeric(20, 0)), AttributeKind::Double);
        assert_eq!(kind_for(&numeric(8, 3)), AttributeKind::Double);
    }
}
