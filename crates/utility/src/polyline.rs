//! Decoder for the encoded polyline format used by most routing services.
//!
//! Every coordinate is stored as the delta to its predecessor, scaled by `1e5`,
//! zig-zag encoded and split into 5-bit chunks offset by 63.

use std::{error::Error, fmt};

const PRECISION: f64 = 1e5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolylineError {
    /// The input ended in the middle of a value.
    Truncated { position: usize },
    /// A byte outside of the encoding alphabet.
    InvalidCharacter { position: usize, character: char },
    /// A value with more chunks than fit into 64 bits.
    Overflow { position: usize },
}

impl fmt::Display for PolylineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { position } => {
                write!(f, "polyline ends unexpectedly at position {}", position)
            }
            Self::InvalidCharacter {
                position,
                character,
            } => write!(
                f,
                "invalid character '{}' in polyline at position {}",
                character, position
            ),
            Self::Overflow { position } => {
                write!(f, "polyline value overflows at position {}", position)
            }
        }
    }
}

impl Error for PolylineError {}

/// Decodes an encoded polyline into `(latitude, longitude)` pairs.
pub fn decode(encoded: &str) -> Result<Vec<(f64, f64)>, PolylineError> {
    let bytes = encoded.as_bytes();
    let mut position = 0;
    let mut latitude: i64 = 0;
    let mut longitude: i64 = 0;
    let mut coordinates = vec![];

    while position < bytes.len() {
        latitude = latitude.wrapping_add(next_value(bytes, &mut position)?);
        longitude = longitude.wrapping_add(next_value(bytes, &mut position)?);
        coordinates.push((latitude as f64 / PRECISION, longitude as f64 / PRECISION));
    }

    Ok(coordinates)
}

fn next_value(bytes: &[u8], position: &mut usize) -> Result<i64, PolylineError> {
    let mut result: i64 = 0;
    let mut shift = 0;
    loop {
        let byte = *bytes
            .get(*position)
            .ok_or(PolylineError::Truncated {
                position: *position,
            })?;
        if !(63..=126).contains(&byte) {
            return Err(PolylineError::InvalidCharacter {
                position: *position,
                character: byte as char,
            });
        }
        if shift > 60 {
            return Err(PolylineError::Overflow {
                position: *position,
            });
        }
        let chunk = (byte - 63) as i64;
        *position += 1;
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }
    Ok(if result & 1 != 0 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: (f64, f64), expected: (f64, f64)) {
        assert!(
            (actual.0 - expected.0).abs() < 1e-9 && (actual.1 - expected.1).abs() < 1e-9,
            "{:?} != {:?}",
            actual,
            expected
        );
    }

    #[test]
    fn decodes_reference_polyline() {
        let points = decode("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
        assert_eq!(points.len(), 3);
        assert_close(points[0], (38.5, -120.2));
        assert_close(points[1], (40.7, -120.95));
        assert_close(points[2], (43.252, -126.453));
    }

    #[test]
    fn empty_input_is_an_empty_route() {
        assert_eq!(decode("").unwrap(), vec![]);
    }

    #[test]
    fn missing_longitude_is_truncated() {
        assert_eq!(
            decode("_p~iF"),
            Err(PolylineError::Truncated { position: 5 })
        );
    }

    #[test]
    fn rejects_characters_outside_alphabet() {
        assert!(matches!(
            decode("_p~iF ps|U"),
            Err(PolylineError::InvalidCharacter { position: 5, .. })
        ));
    }
}
