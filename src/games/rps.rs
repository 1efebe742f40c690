//! Rock, paper, scissors moves

use crate::errors::EconomyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Move {
    Rock,
    Paper,
    Scissors,
}

/// Result of comparing two moves, from the first mover's side
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Showdown {
    FirstWins,
    SecondWins,
    Tie,
}

impl Move {
    pub const ALL: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    /// The one move this move defeats
    pub fn beats(self) -> Move {
        match self {
            Move::Rock => Move::Scissors,
            Move::Paper => Move::Rock,
            Move::Scissors => Move::Paper,
        }
    }

    pub fn against(self, other: Move) -> Showdown {
        if self == other {
            Showdown::Tie
        } else if self.beats() == other {
            Showdown::FirstWins
        } else {
            Showdown::SecondWins
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Move::Rock => "🪨",
            Move::Paper => "📄",
            Move::Scissors => "✂️",
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Move::Rock => write!(f, "rock"),
            Move::Paper => write!(f, "paper"),
            Move::Scissors => write!(f, "scissors"),
        }
    }
}

impl FromStr for Move {
    type Err = EconomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rock" | "r" | "🪨" => Ok(Move::Rock),
            "paper" | "p" | "📄" => Ok(Move::Paper),
            "scissors" | "s" | "✂️" | "✂" => Ok(Move::Scissors),
            _ => Err(EconomyError::InvalidChoice(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_cycle() {
        for m in Move::ALL {
            assert_ne!(m.beats(), m);
            assert_eq!(m.beats().beats().beats(), m);
            assert_eq!(m.against(m), Showdown::Tie);
            assert_eq!(m.against(m.beats()), Showdown::FirstWins);
            assert_eq!(m.beats().against(m), Showdown::SecondWins);
        }
    }

    #[test]
    fn test_parse_words_and_emoji() {
        assert_eq!("Rock".parse::<Move>().unwrap(), Move::Rock);
        assert_eq!("✂️".parse::<Move>().unwrap(), Move::Scissors);
        assert_eq!(Move::Paper.emoji().parse::<Move>().unwrap(), Move::Paper);
        assert!("lizard".parse::<Move>().is_err());
    }
}
