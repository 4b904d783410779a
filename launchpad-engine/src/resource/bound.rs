//! Upper bounds that may be absent.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// The textual spellings accepted for an unbounded value.
const UNBOUNDED_SPELLINGS: &[&str] = &["infinity", "inf", "unlimited", ""];

/// An upper bound on a resource dimension.
///
/// Every source that constrains a dimension (the image, the resource policy,
/// the available capacity and the platform ceiling) reports one of these. An
/// [`Unbounded`](Bound::Unbounded) source places no constraint at all; it is
/// never treated as zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBound", into = "RawBound")]
pub enum Bound {
    /// A finite, non-negative bound.
    Finite(f64),

    /// No bound.
    #[default]
    Unbounded,
}

impl Bound {
    /// Gets the finite value, if there is one.
    pub fn finite(self) -> Option<f64> {
        match self {
            Bound::Finite(value) => Some(value),
            Bound::Unbounded => None,
        }
    }

    /// Whether this bound places no constraint.
    pub fn is_unbounded(self) -> bool {
        matches!(self, Bound::Unbounded)
    }

    /// Returns the tighter of two bounds.
    pub fn tightest(self, other: Bound) -> Bound {
        match (self, other) {
            (Bound::Finite(a), Bound::Finite(b)) => Bound::Finite(a.min(b)),
            (Bound::Finite(a), Bound::Unbounded) | (Bound::Unbounded, Bound::Finite(a)) => {
                Bound::Finite(a)
            }
            (Bound::Unbounded, Bound::Unbounded) => Bound::Unbounded,
        }
    }

    /// Subtracts a used amount from the bound, saturating at zero.
    pub fn remaining(self, used: f64) -> Bound {
        match self {
            Bound::Finite(value) => Bound::Finite((value - used).max(0.0)),
            Bound::Unbounded => Bound::Unbounded,
        }
    }
}

impl From<f64> for Bound {
    fn from(value: f64) -> Self {
        if value.is_finite() {
            Bound::Finite(value.max(0.0))
        } else {
            Bound::Unbounded
        }
    }
}

impl From<Option<f64>> for Bound {
    fn from(value: Option<f64>) -> Self {
        value.map(Bound::from).unwrap_or_default()
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Finite(value) => write!(f, "{value}"),
            Bound::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// The serialized representation of a [`Bound`].
///
/// Brokers report bounds either as numbers or as strings (including the
/// spelled out `"Infinity"`).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
enum RawBound {
    /// A plain number.
    Number(f64),

    /// A textual number or an unbounded spelling.
    Text(String),
}

impl TryFrom<RawBound> for Bound {
    type Error = String;

    fn try_from(raw: RawBound) -> Result<Self, Self::Error> {
        let value = match raw {
            RawBound::Number(value) => value,
            RawBound::Text(text) => {
                let text = text.trim();

                if UNBOUNDED_SPELLINGS
                    .iter()
                    .any(|spelling| text.eq_ignore_ascii_case(spelling))
                {
                    return Ok(Bound::Unbounded);
                }

                text.parse::<f64>()
                    .map_err(|_| format!("`{text}` is not a valid resource bound"))?
            }
        };

        if value.is_nan() {
            return Err(String::from("a resource bound cannot be NaN"));
        }

        if value < 0.0 {
            return Err(format!("a resource bound cannot be negative (found {value})"));
        }

        Ok(Bound::from(value))
    }
}

impl From<Bound> for RawBound {
    fn from(bound: Bound) -> Self {
        match bound {
            Bound::Finite(value) => RawBound::Number(value),
            Bound::Unbounded => RawBound::Text(String::from("Infinity")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tightest_ignores_unbounded() {
        assert_eq!(
            Bound::Unbounded.tightest(Bound::Finite(4.0)),
            Bound::Finite(4.0)
        );
        assert_eq!(
            Bound::Finite(8.0).tightest(Bound::Finite(4.0)),
            Bound::Finite(4.0)
        );
        assert_eq!(Bound::Unbounded.tightest(Bound::Unbounded), Bound::Unbounded);
    }

    #[test]
    fn infinity_is_unbounded() {
        assert_eq!(Bound::from(f64::INFINITY), Bound::Unbounded);
        assert_eq!(Bound::from(None), Bound::Unbounded);
        assert_eq!(Bound::from(Some(2.0)), Bound::Finite(2.0));
    }

    #[test]
    fn deserializes_numbers_and_spellings() {
        let bounds: Vec<Bound> =
            serde_json::from_str(r#"[4, "8", "Infinity", "inf", "unlimited"]"#).unwrap();
        assert_eq!(
            bounds,
            vec![
                Bound::Finite(4.0),
                Bound::Finite(8.0),
                Bound::Unbounded,
                Bound::Unbounded,
                Bound::Unbounded,
            ]
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(serde_json::from_str::<Bound>(r#""lots""#).is_err());
        assert!(serde_json::from_str::<Bound>("-1").is_err());
    }

    #[test]
    fn remaining_saturates() {
        assert_eq!(Bound::Finite(3.0).remaining(5.0), Bound::Finite(0.0));
        assert_eq!(Bound::Unbounded.remaining(5.0), Bound::Unbounded);
    }
}
