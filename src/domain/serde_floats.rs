//! JSON has no representation for `Inf`/`NaN`, so non-finite floats are
//! written as `null` (or a signed marker for sample infinities) and restored
//! on load.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

fn to_option(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

/// Standard errors: `null` restores to `+∞` (not estimable).
pub mod errors {
    use super::*;

    pub fn serialize<S: Serializer>(values: &[f64], s: S) -> Result<S::Ok, S::Error> {
        let out: Vec<Option<f64>> = values.iter().copied().map(to_option).collect();
        out.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
        let raw: Vec<Option<f64>> = Vec::deserialize(d)?;
        Ok(raw.into_iter().map(|v| v.unwrap_or(f64::INFINITY)).collect())
    }
}

/// A single standard error.
pub mod error {
    use super::*;

    pub fn serialize<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
        to_option(*value).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::INFINITY))
    }
}

/// Intensity samples: `null` restores to `NaN`, infinities keep their sign
/// as `"inf"` / `"-inf"`.
pub mod samples {
    use super::*;
    use serde::de::Error as _;

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Sample {
        Number(f64),
        Text(String),
    }

    fn encode(v: f64) -> Option<Sample> {
        if v.is_finite() {
            Some(Sample::Number(v))
        } else if v.is_nan() {
            None
        } else if v > 0.0 {
            Some(Sample::Text("inf".to_string()))
        } else {
            Some(Sample::Text("-inf".to_string()))
        }
    }

    pub fn serialize<S: Serializer>(values: &[f64], s: S) -> Result<S::Ok, S::Error> {
        let out: Vec<Option<Sample>> = values.iter().copied().map(encode).collect();
        out.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
        let raw: Vec<Option<Sample>> = Vec::deserialize(d)?;
        raw.into_iter()
            .map(|v| match v {
                None => Ok(f64::NAN),
                Some(Sample::Number(v)) => Ok(v),
                Some(Sample::Text(t)) if t == "inf" => Ok(f64::INFINITY),
                Some(Sample::Text(t)) if t == "-inf" => Ok(f64::NEG_INFINITY),
                Some(Sample::Text(t)) => Err(D::Error::custom(format!("unknown sample value '{t}'"))),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Window {
        #[serde(with = "super::samples")]
        intensity: Vec<f64>,
        #[serde(with = "super::errors")]
        errors: Vec<f64>,
    }

    #[test]
    fn sample_infinities_keep_their_sign() {
        let window = Window {
            intensity: vec![0.5, f64::INFINITY, f64::NEG_INFINITY, f64::NAN],
            errors: vec![0.1, f64::NAN],
        };
        let json = serde_json::to_string(&window).unwrap();
        assert_eq!(
            json,
            r#"{"intensity":[0.5,"inf","-inf",null],"errors":[0.1,null]}"#
        );

        let back: Window = serde_json::from_str(&json).unwrap();
        assert_eq!(back.intensity[0], 0.5);
        assert_eq!(back.intensity[1], f64::INFINITY);
        assert_eq!(back.intensity[2], f64::NEG_INFINITY);
        assert!(back.intensity[3].is_nan());
        assert_eq!(back.errors[1], f64::INFINITY);
    }

    #[test]
    fn unknown_sample_text_is_rejected() {
        let json = r#"{"intensity":[1.0,"huge"],"errors":[]}"#;
        assert!(serde_json::from_str::<Window>(json).is_err());
    }
}
