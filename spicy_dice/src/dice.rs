//! Randomness source for die rolls.
//!
//! Production rolls draw directly from the operating system's entropy source so
//! that outcomes cannot be predicted or replayed by a client. Tests plug in a
//! [`LoadedDice`] through the [`DiceRoller`] trait.

use rand::{TryRngCore, rngs::OsRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// Face value of a rolled die (1-based).
pub type DieFace = u8;

/// Number of sides on the standard die.
pub const DEFAULT_DICE_SIDES: u8 = 6;

/// Randomness source errors
#[derive(Debug, Error)]
pub enum DiceError {
    /// The entropy source failed
    #[error("Entropy source failure: {0}")]
    Entropy(String),

    /// A die needs at least two sides
    #[error("Invalid number of sides: {0}")]
    InvalidSides(u8),
}

/// Result type for dice operations
pub type DiceResult<T> = Result<T, DiceError>;

/// Anything that can produce a uniform roll in `1..=sides`.
pub trait DiceRoller: Send + Sync {
    /// Roll the die once.
    fn roll(&self) -> DiceResult<DieFace>;

    /// Number of faces on the die.
    fn sides(&self) -> u8;
}

/// Cryptographically sourced die backed by [`OsRng`].
#[derive(Debug, Clone, Copy)]
pub struct Dice {
    sides: u8,
}

impl Dice {
    /// Create a die with the given number of sides
    ///
    /// # Errors
    ///
    /// * `DiceError::InvalidSides` - Fewer than two sides
    pub fn new(sides: u8) -> DiceResult<Self> {
        if sides < 2 {
            return Err(DiceError::InvalidSides(sides));
        }
        Ok(Self { sides })
    }
}

impl Default for Dice {
    fn default() -> Self {
        Self {
            sides: DEFAULT_DICE_SIDES,
        }
    }
}

impl DiceRoller for Dice {
    fn roll(&self) -> DiceResult<DieFace> {
        let sides = u32::from(self.sides);
        // Rejection sampling: discard the tail of the u32 range that would bias
        // the modulo towards low faces.
        let zone = u32::MAX - (u32::MAX % sides);
        loop {
            let value = OsRng
                .try_next_u32()
                .map_err(|e| DiceError::Entropy(e.to_string()))?;
            if value < zone {
                return Ok((value % sides) as DieFace + 1);
            }
        }
    }

    fn sides(&self) -> u8 {
        self.sides
    }
}

/// Deterministic die that replays a fixed sequence of faces, cycling when it
/// runs out.
#[derive(Debug)]
pub struct LoadedDice {
    faces: Vec<DieFace>,
    sides: u8,
    cursor: AtomicUsize,
}

impl LoadedDice {
    /// Die that always lands on `face`.
    pub fn always(face: DieFace) -> Self {
        Self::sequence(vec![face])
    }

    /// Die that lands on each face in order, then starts over.
    pub fn sequence(faces: Vec<DieFace>) -> Self {
        let sides = faces
            .iter()
            .copied()
            .max()
            .unwrap_or(DEFAULT_DICE_SIDES)
            .max(DEFAULT_DICE_SIDES);
        Self {
            faces,
            sides,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl DiceRoller for LoadedDice {
    fn roll(&self) -> DiceResult<DieFace> {
        if self.faces.is_empty() {
            return Err(DiceError::Entropy("loaded dice has no faces".to_string()));
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.faces.len();
        Ok(self.faces[index])
    }

    fn sides(&self) -> u8 {
        self.sides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roll_stays_in_range() {
        let dice = Dice::default();
        for _ in 0..1_000 {
            let face = dice.roll().unwrap();
            assert!((1..=6).contains(&face), "face {face} out of range");
        }
    }

    #[test]
    fn test_roll_hits_every_face() {
        let dice = Dice::new(4).unwrap();
        let mut seen = [false; 4];
        for _ in 0..2_000 {
            seen[usize::from(dice.roll().unwrap() - 1)] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_single_sided_die_rejected() {
        assert!(matches!(Dice::new(1), Err(DiceError::InvalidSides(1))));
        assert!(matches!(Dice::new(0), Err(DiceError::InvalidSides(0))));
    }

    #[test]
    fn test_loaded_dice_cycles() {
        let dice = LoadedDice::sequence(vec![2, 5]);
        assert_eq!(dice.roll().unwrap(), 2);
        assert_eq!(dice.roll().unwrap(), 5);
        assert_eq!(dice.roll().unwrap(), 2);
    }

    #[test]
    fn test_empty_loaded_dice_fails() {
        let dice = LoadedDice::sequence(Vec::new());
        assert!(matches!(dice.roll(), Err(DiceError::Entropy(_))));
    }
}
