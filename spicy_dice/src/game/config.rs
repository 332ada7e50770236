//! Betting rule configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dice::DEFAULT_DICE_SIDES;

/// Betting constraints handed to the play engine at construction time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Smallest accepted stake
    pub min_bet: Decimal,

    /// Largest accepted stake
    pub max_bet: Decimal,

    /// Faces on the die
    pub dice_sides: u8,
}

impl GameConfig {
    /// Check the rules are internally consistent
    ///
    /// # Errors
    ///
    /// Returns `GameConfigError` describing the first violated rule
    pub fn validate(&self) -> Result<(), GameConfigError> {
        if self.min_bet <= Decimal::ZERO {
            return Err(GameConfigError::NonPositiveMinimum(self.min_bet));
        }
        if self.max_bet < self.min_bet {
            return Err(GameConfigError::InvertedRange {
                min: self.min_bet,
                max: self.max_bet,
            });
        }
        if self.dice_sides < 2 {
            return Err(GameConfigError::TooFewSides(self.dice_sides));
        }
        Ok(())
    }

    /// Whether `amount` lies inside `[min_bet, max_bet]`
    pub fn accepts(&self, amount: Decimal) -> bool {
        amount >= self.min_bet && amount <= self.max_bet
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_bet: Decimal::from(10),
            max_bet: Decimal::from(100),
            dice_sides: DEFAULT_DICE_SIDES,
        }
    }
}

/// Invalid betting rules
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameConfigError {
    #[error("Minimum bet must be positive, got {0}")]
    NonPositiveMinimum(Decimal),

    #[error("Maximum bet {max} is below minimum bet {min}")]
    InvertedRange { min: Decimal, max: Decimal },

    #[error("A die needs at least 2 sides, got {0}")]
    TooFewSides(u8),

    #[error("Configured for a {configured}-sided die but the die has {actual} sides")]
    DiceMismatch { configured: u8, actual: u8 },
}
