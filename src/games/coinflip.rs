use crate::errors::EconomyError;
use crate::games::random::RandomSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coin side, used both for the player's call and the draw
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CoinSide {
    Heads,
    Tails,
}

impl fmt::Display for CoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoinSide::Heads => write!(f, "heads"),
            CoinSide::Tails => write!(f, "tails"),
        }
    }
}

impl FromStr for CoinSide {
    type Err = EconomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "heads" => Ok(CoinSide::Heads),
            "tails" => Ok(CoinSide::Tails),
            _ => Err(EconomyError::InvalidChoice(s.to_string())),
        }
    }
}

/// Outcome of one flip
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoinFlipOutcome {
    pub call: CoinSide,
    pub draw: CoinSide,
    pub won: bool,
}

impl CoinFlipOutcome {
    /// Signed balance change for a stake of `bet`
    pub fn delta(&self, bet: u64) -> i128 {
        if self.won {
            bet as i128
        } else {
            -(bet as i128)
        }
    }
}

/// Draw heads (0) or tails (1) uniformly and compare with the call
pub fn flip(call: CoinSide, rng: &mut dyn RandomSource) -> CoinFlipOutcome {
    let draw = if rng.roll(0, 1) == 0 {
        CoinSide::Heads
    } else {
        CoinSide::Tails
    };
    CoinFlipOutcome {
        call,
        draw,
        won: call == draw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::random::SequenceRandom;

    #[test]
    fn test_flip_against_fixed_draw() {
        let mut rng = SequenceRandom::new([0, 0]);
        let win = flip(CoinSide::Heads, &mut rng);
        assert_eq!(win.draw, CoinSide::Heads);
        assert!(win.won);
        assert_eq!(win.delta(50), 50);

        let loss = flip(CoinSide::Tails, &mut rng);
        assert!(!loss.won);
        assert_eq!(loss.delta(50), -50);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("HEADS".parse::<CoinSide>().unwrap(), CoinSide::Heads);
        assert_eq!(" tails ".parse::<CoinSide>().unwrap(), CoinSide::Tails);
        assert!(matches!("edge".parse::<CoinSide>(), Err(EconomyError::InvalidChoice(_))));
    }
}
