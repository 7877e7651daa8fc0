use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Tag recorded in a block's `label` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    /// Root of the chain. Never produced by a classifier.
    Genesis,
    /// The clip was judged to be a genuine recording.
    Real,
    /// The clip was judged to be synthetic.
    Fake,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Genesis => "GENESIS",
            Self::Real => "REAL",
            Self::Fake => "FAKE",
        }
    }

    /// Returns `true` for labels a classifier may emit.
    pub fn is_verdict(&self) -> bool {
        !matches!(self, Self::Genesis)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GENESIS" => Ok(Self::Genesis),
            "REAL" => Ok(Self::Real),
            "FAKE" => Ok(Self::Fake),
            _ => Err(TypeError::UnknownLabel(s.to_string())),
        }
    }
}

/// Classifier confidence in `[0, 1]`, held at four-decimal fixed precision.
///
/// Stored as basis points so the canonical digest form never depends on
/// float formatting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Confidence(u16);

impl Confidence {
    const SCALE: u16 = 10_000;

    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(Self::SCALE);

    /// Round `value` to four decimals. Rejects NaN and values outside `[0, 1]`.
    pub fn new(value: f64) -> Result<Self, TypeError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(TypeError::ConfidenceOutOfRange(value.to_string()));
        }
        Ok(Self((value * f64::from(Self::SCALE)).round() as u16))
    }

    /// Binary flag form: `1` when set, `0` otherwise.
    pub fn from_flag(flag: bool) -> Self {
        if flag {
            Self::ONE
        } else {
            Self::ZERO
        }
    }

    pub fn from_basis_points(bp: u16) -> Result<Self, TypeError> {
        if bp > Self::SCALE {
            return Err(TypeError::ConfidenceOutOfRange(format!("{bp}bp")));
        }
        Ok(Self(bp))
    }

    pub fn basis_points(&self) -> u16 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        f64::from(self.0) / f64::from(Self::SCALE)
    }

    /// Shortest decimal form: `0`, `1`, `0.5`, `0.1234`.
    pub fn canonical(&self) -> String {
        match self.0 {
            0 => "0".to_string(),
            Self::SCALE => "1".to_string(),
            bp => {
                let frac = format!("{bp:04}");
                format!("0.{}", frac.trim_end_matches('0'))
            }
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl FromStr for Confidence {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| TypeError::ConfidenceOutOfRange(s.to_string()))?;
        Self::new(value)
    }
}

impl Serialize for Confidence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Confidence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Self::new(value).map_err(serde::de::Error::custom)
    }
}

/// A classifier's output for one uploaded clip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: Label,
    pub confidence: Confidence,
}

impl Verdict {
    /// Build a verdict. The genesis label is reserved and rejected.
    pub fn new(label: Label, confidence: Confidence) -> Result<Self, TypeError> {
        if !label.is_verdict() {
            return Err(TypeError::ReservedLabel(label.to_string()));
        }
        Ok(Self { label, confidence })
    }

    /// Binary verdict: `REAL` with confidence 1, or `FAKE` with confidence 0.
    pub fn from_prediction(is_real: bool) -> Self {
        if is_real {
            Self {
                label: Label::Real,
                confidence: Confidence::ONE,
            }
        } else {
            Self {
                label: Label::Fake,
                confidence: Confidence::ZERO,
            }
        }
    }

    pub fn is_real(&self) -> bool {
        self.label == Label::Real
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn label_parse_is_case_insensitive() {
        assert_eq!("real".parse::<Label>().unwrap(), Label::Real);
        assert_eq!(" Fake ".parse::<Label>().unwrap(), Label::Fake);
        assert_eq!("GENESIS".parse::<Label>().unwrap(), Label::Genesis);
        assert!(matches!(
            "maybe".parse::<Label>(),
            Err(TypeError::UnknownLabel(_))
        ));
    }

    #[test]
    fn label_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Label::Real).unwrap(), "\"REAL\"");
        assert_eq!(serde_json::to_string(&Label::Genesis).unwrap(), "\"GENESIS\"");
    }

    #[test]
    fn confidence_canonical_forms() {
        assert_eq!(Confidence::ZERO.canonical(), "0");
        assert_eq!(Confidence::ONE.canonical(), "1");
        assert_eq!(Confidence::new(0.5).unwrap().canonical(), "0.5");
        assert_eq!(Confidence::new(0.1234).unwrap().canonical(), "0.1234");
        assert_eq!(Confidence::new(0.05).unwrap().canonical(), "0.05");
        assert_eq!(Confidence::new(0.00001).unwrap().canonical(), "0");
    }

    #[test]
    fn confidence_rejects_out_of_range() {
        assert!(Confidence::new(1.5).is_err());
        assert!(Confidence::new(-0.1).is_err());
        assert!(Confidence::new(f64::NAN).is_err());
        assert!(Confidence::from_basis_points(10_001).is_err());
    }

    #[test]
    fn confidence_from_flag() {
        assert_eq!(Confidence::from_flag(true), Confidence::ONE);
        assert_eq!(Confidence::from_flag(false), Confidence::ZERO);
    }

    #[test]
    fn confidence_survives_bincode() {
        let c = Confidence::new(0.8765).unwrap();
        let bytes = bincode::serialize(&c).unwrap();
        let parsed: Confidence = bincode::deserialize(&bytes).unwrap();
        assert_eq!(parsed, c);
    }

    #[test]
    fn verdict_rejects_genesis_label() {
        let err = Verdict::new(Label::Genesis, Confidence::ZERO).unwrap_err();
        assert_eq!(err, TypeError::ReservedLabel("GENESIS".into()));
    }

    #[test]
    fn prediction_maps_to_binary_confidence() {
        let real = Verdict::from_prediction(true);
        assert_eq!(real.label, Label::Real);
        assert_eq!(real.confidence, Confidence::ONE);

        let fake = Verdict::from_prediction(false);
        assert_eq!(fake.label, Label::Fake);
        assert_eq!(fake.confidence, Confidence::ZERO);
    }

    proptest! {
        #[test]
        fn canonical_form_parses_back(bp in 0u16..=10_000) {
            let c = Confidence::from_basis_points(bp).unwrap();
            let parsed: Confidence = c.canonical().parse().unwrap();
            prop_assert_eq!(parsed, c);
        }
    }
}
