//! Sound banks, volume levels and the note table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Sample file names for each key, lowest (F3) first.
pub const NOTE_NAMES: [&str; 39] = [
    "1f", "1fsharp", "1g", "1gsharp", //
    "2a", "2asharp", "2b", "2c", "2csharp", "2d", "2dsharp", "2e", "2f", "2fsharp", "2g",
    "2gsharp", //
    "3a", "3asharp", "3b", "3c", "3csharp", "3d", "3dsharp", "3e", "3f", "3fsharp", "3g",
    "3gsharp", //
    "4a", "4asharp", "4b", "4c", "4csharp", "4d", "4dsharp", "4e", "4f", "4fsharp", "4g",
];

/// Number of playable keys.
pub const NOTE_COUNT: usize = NOTE_NAMES.len();

/// Frequency of note index 0 (F3) in Hz.
pub const BASE_FREQUENCY: f64 = 174.61;

/// Equal-tempered frequency of a note index: `BASE_FREQUENCY * 2^(index/12)`.
pub fn note_frequency(note: usize) -> f64 {
    BASE_FREQUENCY * (2.0_f64).powf(note as f64 / 12.0)
}

/// One of the four sample-based layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BankId {
    P1,
    P2,
    W1,
    W2,
}

impl BankId {
    /// All sample banks in load order.
    pub const ALL: [BankId; 4] = [BankId::P1, BankId::P2, BankId::W1, BankId::W2];

    /// Lowercase identifier used in sample file names.
    pub fn id(self) -> &'static str {
        match self {
            BankId::P1 => "p1",
            BankId::P2 => "p2",
            BankId::W1 => "w1",
            BankId::W2 => "w2",
        }
    }

    /// Display label shown while the bank is loading.
    pub fn label(self) -> &'static str {
        match self {
            BankId::P1 => "P1",
            BankId::P2 => "P2",
            BankId::W1 => "W1",
            BankId::W2 => "W2",
        }
    }

    /// Position of this bank in [`BankId::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether this bank's loop samples get a tail crossfade at load time.
    pub fn crossfades_loops(self) -> bool {
        matches!(self, BankId::P1 | BankId::P2)
    }
}

impl fmt::Display for BankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BankId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "p1" => Ok(BankId::P1),
            "p2" => Ok(BankId::P2),
            "w1" => Ok(BankId::W1),
            "w2" => Ok(BankId::W2),
            _ => Err(EngineError::UnknownName {
                kind: "sound bank",
                name: s.to_string(),
            }),
        }
    }
}

/// Three-position volume switch shared by every bank. The gain of each
/// position comes from [`VolumeGains`](crate::config::VolumeGains).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeLevel {
    #[default]
    Off,
    Low,
    High,
}

impl FromStr for VolumeLevel {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(VolumeLevel::Off),
            "low" => Ok(VolumeLevel::Low),
            "high" => Ok(VolumeLevel::High),
            _ => Err(EngineError::UnknownName {
                kind: "volume level",
                name: s.to_string(),
            }),
        }
    }
}

/// Which recording of a key a buffer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleVariant {
    OneShot,
    Loop,
}

/// Structured key of a decoded sample buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleKey {
    pub bank: BankId,
    pub note: usize,
    pub variant: SampleVariant,
}

impl SampleKey {
    pub fn new(bank: BankId, note: usize, variant: SampleVariant) -> Self {
        SampleKey {
            bank,
            note,
            variant,
        }
    }

    /// File name without extension, e.g. `p1-2csharp` or `w2-1f-loop`.
    /// Returns `None` for an out-of-range note.
    pub fn file_stem(&self) -> Option<String> {
        let name = NOTE_NAMES.get(self.note)?;
        Some(match self.variant {
            SampleVariant::OneShot => format!("{}-{}", self.bank.id(), name),
            SampleVariant::Loop => format!("{}-{}-loop", self.bank.id(), name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_note_is_f3() {
        assert_eq!(note_frequency(0), 174.61);
    }

    #[test]
    fn octave_doubles_frequency() {
        let f = note_frequency(12);
        assert!((f - 349.22).abs() < 1e-9, "note 12 should be 349.22Hz, got {f}");
        let f = note_frequency(24);
        assert!((f - 698.44).abs() < 1e-9, "note 24 should be 698.44Hz, got {f}");
    }

    #[test]
    fn note_table_spans_f3_to_g6() {
        assert_eq!(NOTE_COUNT, 39);
        assert_eq!(NOTE_NAMES[0], "1f");
        assert_eq!(NOTE_NAMES[12], "2f");
        assert_eq!(NOTE_NAMES[NOTE_COUNT - 1], "4g");
    }

    #[test]
    fn bank_parsing() {
        assert_eq!("p1".parse::<BankId>().unwrap(), BankId::P1);
        assert_eq!("W2".parse::<BankId>().unwrap(), BankId::W2);
        assert!("x9".parse::<BankId>().is_err());
        assert!("loud".parse::<VolumeLevel>().is_err());
    }

    #[test]
    fn only_p_banks_crossfade() {
        let fading: Vec<_> = BankId::ALL
            .iter()
            .filter(|b| b.crossfades_loops())
            .collect();
        assert_eq!(fading, vec![&BankId::P1, &BankId::P2]);
    }

    #[test]
    fn file_stems() {
        let key = SampleKey::new(BankId::P1, 7, SampleVariant::OneShot);
        assert_eq!(key.file_stem().as_deref(), Some("p1-2c"));
        let key = SampleKey::new(BankId::W2, 0, SampleVariant::Loop);
        assert_eq!(key.file_stem().as_deref(), Some("w2-1f-loop"));
        let key = SampleKey::new(BankId::W2, NOTE_COUNT, SampleVariant::Loop);
        assert_eq!(key.file_stem(), None);
    }
}
