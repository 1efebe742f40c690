use crate::errors::{EconomyError, EconomyResult};
use crate::games::random::RandomSource;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_POCKET: u32 = 36;

const RED_POCKETS: [u32; 18] = [1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36];

/// European wheel colour, for display only
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RouletteColor {
    Green,
    Red,
    Black,
}

impl fmt::Display for RouletteColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouletteColor::Green => write!(f, "Green"),
            RouletteColor::Red => write!(f, "Red"),
            RouletteColor::Black => write!(f, "Black"),
        }
    }
}

pub fn classify(pocket: u32) -> RouletteColor {
    if pocket == 0 {
        RouletteColor::Green
    } else if RED_POCKETS.contains(&pocket) {
        RouletteColor::Red
    } else {
        RouletteColor::Black
    }
}

/// Check a caller-supplied straight-up number
pub fn validate_pocket(number: i64) -> EconomyResult<u32> {
    u32::try_from(number)
        .ok()
        .filter(|n| *n <= MAX_POCKET)
        .ok_or(EconomyError::InvalidNumber(number))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouletteSpin {
    pub number: u32,
    pub result: u32,
    pub color: RouletteColor,
    pub won: bool,
}

impl RouletteSpin {
    /// Signed balance change: `bet * multiplier` on a hit, `-bet` otherwise
    pub fn delta(&self, bet: u64, multiplier: u64) -> i128 {
        if self.won {
            bet as i128 * multiplier as i128
        } else {
            -(bet as i128)
        }
    }
}

/// Spin once, uniformly over `0..=36`
pub fn spin(number: u32, rng: &mut dyn RandomSource) -> RouletteSpin {
    let result = rng.roll(0, MAX_POCKET);
    RouletteSpin {
        number,
        result,
        color: classify(result),
        won: result == number,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::random::SequenceRandom;

    #[test]
    fn test_colour_assignment() {
        assert_eq!(classify(0), RouletteColor::Green);
        assert_eq!(classify(17), RouletteColor::Black);
        assert_eq!(classify(32), RouletteColor::Red);
        let reds = (1..=36).filter(|n| classify(*n) == RouletteColor::Red).count();
        assert_eq!(reds, 18);
    }

    #[test]
    fn test_spin_payouts() {
        let mut rng = SequenceRandom::new([17, 17]);
        let hit = spin(17, &mut rng);
        assert!(hit.won);
        assert_eq!(hit.color, RouletteColor::Black);
        assert_eq!(hit.delta(10, 36), 360);

        let miss = spin(5, &mut rng);
        assert!(!miss.won);
        assert_eq!(miss.delta(10, 36), -10);
    }

    #[test]
    fn test_pocket_validation() {
        assert_eq!(validate_pocket(0).unwrap(), 0);
        assert_eq!(validate_pocket(36).unwrap(), 36);
        assert!(matches!(validate_pocket(37), Err(EconomyError::InvalidNumber(37))));
        assert!(matches!(validate_pocket(-1), Err(EconomyError::InvalidNumber(-1))));
    }
}
