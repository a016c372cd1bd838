//! Parameter values: the scalar and range shapes a telemetry field may take
//!
//! Values are stored as their original wire text. Numeric and boolean views
//! are computed lazily and degrade to `NaN` / `false` on malformed tokens:
//! upstream hardware occasionally emits garbage mid-stream and a single bad
//! token must never abort the sample.

use super::params::ParameterId;

/// The two shapes a parameter value may take on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueShape {
    /// A single bare token
    Scalar { value: String },
    /// A (min, value, max) triple
    ///
    /// Always stored three-sided: the legacy two-token `value/max` wire form
    /// is normalized on parse with `min = "0"`.
    Range {
        min: String,
        value: String,
        max: String,
    },
}

/// One parsed `parameter=value` entry of a sensor sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterValue {
    pub id: ParameterId,
    pub shape: ValueShape,
}

/// Outcome of parsing one value token.
pub(crate) enum ValueToken {
    Ok(ValueShape),
    Malformed,
}

fn parse_f64(s: &str) -> f64 {
    s.trim().parse::<f64>().unwrap_or(f64::NAN)
}

impl ValueShape {
    /// Parse a raw value token, applying the `/` splitting rules.
    ///
    /// - 1 sub-token: scalar.
    /// - 2 sub-tokens: legacy `value/max` range, `min` implied `"0"`.
    /// - 3 sub-tokens: either all tagged (`b:`/`v:`/`m:` in any order) or all
    ///   positional `min/value/max`. Mixed or duplicate tags, unknown tags and
    ///   more than three sub-tokens are malformed.
    pub(crate) fn parse_token(token: &str) -> ValueToken {
        let chunks: Vec<&str> = token.split('/').collect();
        match chunks.len() {
            1 => ValueToken::Ok(ValueShape::Scalar {
                value: chunks[0].to_string(),
            }),
            2 => ValueToken::Ok(ValueShape::Range {
                min: "0".to_string(),
                value: chunks[0].to_string(),
                max: chunks[1].to_string(),
            }),
            3 => Self::parse_triple(&chunks),
            _ => ValueToken::Malformed,
        }
    }

    fn parse_triple(chunks: &[&str]) -> ValueToken {
        // A sub-token "carries a tag" when its second byte is ':'. Unknown tag
        // letters still count here so that they are rejected below rather than
        // silently treated as positional values.
        let tagged = chunks
            .iter()
            .filter(|c| c.as_bytes().get(1) == Some(&b':'))
            .count();
        if tagged == 0 {
            // Positional fallback: min/value/max
            return ValueToken::Ok(ValueShape::Range {
                min: chunks[0].to_string(),
                value: chunks[1].to_string(),
                max: chunks[2].to_string(),
            });
        }
        if tagged != 3 {
            return ValueToken::Malformed;
        }
        let mut min = None;
        let mut value = None;
        let mut max = None;
        for chunk in chunks {
            let slot = match chunk.as_bytes()[0] {
                b'b' => &mut min,
                b'v' => &mut value,
                b'm' => &mut max,
                _ => return ValueToken::Malformed,
            };
            if slot.replace(chunk[2..].to_string()).is_some() {
                // Duplicate tag
                return ValueToken::Malformed;
            }
        }
        match (min, value, max) {
            (Some(min), Some(value), Some(max)) => {
                ValueToken::Ok(ValueShape::Range { min, value, max })
            }
            _ => ValueToken::Malformed,
        }
    }
}

impl ParameterValue {
    /// A scalar value for `id`.
    pub fn scalar(id: ParameterId, value: impl Into<String>) -> Self {
        Self {
            id,
            shape: ValueShape::Scalar {
                value: value.into(),
            },
        }
    }

    /// A three-sided range value for `id`.
    pub fn range(
        id: ParameterId,
        min: impl Into<String>,
        value: impl Into<String>,
        max: impl Into<String>,
    ) -> Self {
        Self {
            id,
            shape: ValueShape::Range {
                min: min.into(),
                value: value.into(),
                max: max.into(),
            },
        }
    }

    /// The value's original text.
    pub fn value_str(&self) -> &str {
        match &self.shape {
            ValueShape::Scalar { value } => value,
            ValueShape::Range { value, .. } => value,
        }
    }

    /// The value as an `f64`; `NaN` if it does not parse.
    pub fn value_f64(&self) -> f64 {
        parse_f64(self.value_str())
    }

    /// The value as a `bool`; `false` if it does not parse.
    pub fn value_bool(&self) -> bool {
        self.value_str().trim().parse::<bool>().unwrap_or(false)
    }

    /// Range minimum as an `f64`; `NaN` for scalars or malformed tokens.
    pub fn min_f64(&self) -> f64 {
        match &self.shape {
            ValueShape::Scalar { .. } => f64::NAN,
            ValueShape::Range { min, .. } => parse_f64(min),
        }
    }

    /// Range maximum as an `f64`; `NaN` for scalars or malformed tokens.
    pub fn max_f64(&self) -> f64 {
        match &self.shape {
            ValueShape::Scalar { .. } => f64::NAN,
            ValueShape::Range { max, .. } => parse_f64(max),
        }
    }

    /// Position of the value inside its range, scaled to 0..100.
    ///
    /// `(value - min) / (max - min) * 100`; `NaN` for scalars, when any
    /// component fails to parse, or when `max == min`.
    pub fn normalized(&self) -> f64 {
        let (min, value, max) = (self.min_f64(), self.value_f64(), self.max_f64());
        if max == min {
            return f64::NAN;
        }
        (value - min) / (max - min) * 100.0
    }

    /// Re-encode this value as a wire token.
    ///
    /// Legacy-form input (`min == "0"`) round-trips back to `value/max`;
    /// other ranges use the tagged form.
    pub fn to_wire_token(&self) -> String {
        match &self.shape {
            ValueShape::Scalar { value } => value.clone(),
            ValueShape::Range { min, value, max } if min == "0" => {
                format!("{}/{}", value, max)
            }
            ValueShape::Range { min, value, max } => {
                format!("b:{}/v:{}/m:{}", min, value, max)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(token: &str) -> Option<ValueShape> {
        match ValueShape::parse_token(token) {
            ValueToken::Ok(shape) => Some(shape),
            ValueToken::Malformed => None,
        }
    }

    #[test]
    fn scalar_token() {
        assert_eq!(
            parse("true"),
            Some(ValueShape::Scalar {
                value: "true".into()
            })
        );
    }

    #[test]
    fn legacy_range_implies_zero_min() {
        assert_eq!(
            parse("42/100"),
            Some(ValueShape::Range {
                min: "0".into(),
                value: "42".into(),
                max: "100".into()
            })
        );
    }

    #[test]
    fn tagged_range_any_order() {
        let expected = ValueShape::Range {
            min: "-90".into(),
            value: "15".into(),
            max: "90".into(),
        };
        assert_eq!(parse("b:-90/v:15/m:90"), Some(expected.clone()));
        assert_eq!(parse("m:90/b:-90/v:15"), Some(expected.clone()));
        assert_eq!(parse("v:15/m:90/b:-90"), Some(expected));
    }

    #[test]
    fn positional_triple_fallback() {
        assert_eq!(
            parse("-90/15/90"),
            Some(ValueShape::Range {
                min: "-90".into(),
                value: "15".into(),
                max: "90".into()
            })
        );
    }

    #[test]
    fn malformed_triples() {
        // Mixed tagged and untagged
        assert!(parse("b:-90/15/m:90").is_none());
        // Duplicate tag
        assert!(parse("b:-90/b:15/m:90").is_none());
        // Unknown tag
        assert!(parse("b:-90/x:15/m:90").is_none());
        // Too many sub-tokens
        assert!(parse("1/2/3/4").is_none());
    }

    #[test]
    fn numeric_views_degrade_to_nan() {
        let v = ParameterValue::scalar(ParameterId::GazeX, "abc");
        assert!(v.value_f64().is_nan());
        assert!(!v.value_bool());
        assert!(v.min_f64().is_nan());
        assert!(v.normalized().is_nan());
    }

    #[test]
    fn normalized_math() {
        let v = ParameterValue::range(ParameterId::HeadPosYaw, "-90", "0", "90");
        assert!((v.normalized() - 50.0).abs() < 1e-9);

        let legacy = ParameterValue::range(ParameterId::MouthAperture, "0", "42", "100");
        assert!((legacy.normalized() - 42.0).abs() < 1e-9);

        // Degenerate span is undefined, not a division panic
        let flat = ParameterValue::range(ParameterId::MouthAperture, "5", "5", "5");
        assert!(flat.normalized().is_nan());
    }

    #[test]
    fn wire_token_round_trip() {
        let legacy = ParameterValue::range(ParameterId::MouthAperture, "0", "42", "100");
        assert_eq!(legacy.to_wire_token(), "42/100");

        let tagged = ParameterValue::range(ParameterId::HeadPosYaw, "-90", "15", "90");
        assert_eq!(tagged.to_wire_token(), "b:-90/v:15/m:90");

        for token in ["42/100", "b:-90/v:15/m:90"] {
            let shape = parse(token).unwrap();
            let v = ParameterValue {
                id: ParameterId::HeadPosYaw,
                shape,
            };
            assert_eq!(v.to_wire_token(), token);
        }
    }
}
