use std::str::FromStr;

use garde::Validate;
use serde::{Deserialize, Serialize};

/// A single 1-5 category score (punctuality, professionalism, quality or
/// communication) as submitted with a rating.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Validate, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[garde(transparent)]
pub struct Score(#[garde(range(min = 1, max = 5))] i16);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidScore {
    #[error("score must be a whole number")]
    NotAnInteger,
    #[error("score {0} is out of range 1-5")]
    OutOfRange(i64),
}

impl Score {
    pub const MIN: i16 = 1;
    pub const MAX: i16 = 5;

    pub fn value(self) -> i16 {
        self.0
    }
}

impl TryFrom<i64> for Score {
    type Error = InvalidScore;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Score(value as i16))
        } else {
            Err(InvalidScore::OutOfRange(value))
        }
    }
}

impl FromStr for Score {
    type Err = InvalidScore;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s.trim().parse().map_err(|_| InvalidScore::NotAnInteger)?;
        value.try_into()
    }
}

impl From<Score> for i16 {
    fn from(value: Score) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use quickcheck::Arbitrary;
    use quickcheck_macros::quickcheck;

    use super::*;

    impl Arbitrary for Score {
        fn arbitrary(g: &mut quickcheck::Gen) -> Self {
            *g.choose(&[Score(1), Score(2), Score(3), Score(4), Score(5)])
                .unwrap()
        }
    }

    #[quickcheck]
    fn test_score_arbitrary_is_valid(score: Score) {
        assert!(score.validate().is_ok());
        assert!((Score::MIN..=Score::MAX).contains(&score.value()));
    }

    #[test]
    fn test_score_bounds() {
        for v in 1..=5 {
            let score = Score::try_from(v).unwrap();
            assert_eq!(score.value(), v as i16);
        }

        assert_eq!(Score::try_from(0), Err(InvalidScore::OutOfRange(0)));
        assert_eq!(Score::try_from(6), Err(InvalidScore::OutOfRange(6)));
        assert_eq!(Score::try_from(-3), Err(InvalidScore::OutOfRange(-3)));
    }

    #[test]
    fn test_score_from_str() {
        let score = Score::from_str("4").unwrap();
        assert_eq!(score.value(), 4);

        assert_eq!(Score::from_str("4.5"), Err(InvalidScore::NotAnInteger));
        assert_eq!(Score::from_str("great"), Err(InvalidScore::NotAnInteger));
        assert_eq!(Score::from_str("7"), Err(InvalidScore::OutOfRange(7)));
    }

    #[test]
    fn test_score_cheated_out_of_range_fails_validation() {
        // cheat on creation, e.g. via deserialization
        let score = Score(0);
        assert!(score.validate().is_err());
    }
}
