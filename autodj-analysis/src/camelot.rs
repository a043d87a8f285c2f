//! Key labels and their positions on the Camelot wheel
//!
//! Numbers 1-12 follow the circle of fifths. Minor keys carry the letter A,
//! major keys the letter B, and relative keys share a number.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Returned for labels that have no Camelot position
pub const UNKNOWN_CAMELOT: &str = "Unknown";

/// Note names used in key labels, indexed by pitch class (0 = C)
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Camelot number of each major key, indexed by root pitch class
const MAJOR_WHEEL: [u8; 12] = [8, 3, 10, 5, 12, 7, 2, 9, 4, 11, 6, 1];
/// Camelot number of each minor key, indexed by root pitch class
const MINOR_WHEEL: [u8; 12] = [5, 12, 7, 2, 9, 4, 11, 6, 1, 8, 3, 10];

/// One of the 12 major or 12 minor keys, flat spelling in variant names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MusicalKey {
    CMajor,
    DbMajor,
    DMajor,
    EbMajor,
    EMajor,
    FMajor,
    GbMajor,
    GMajor,
    AbMajor,
    AMajor,
    BbMajor,
    BMajor,
    CMinor,
    DbMinor,
    DMinor,
    EbMinor,
    EMinor,
    FMinor,
    GbMinor,
    GMinor,
    AbMinor,
    AMinor,
    BbMinor,
    BMinor,
}

impl MusicalKey {
    /// All 24 keys, majors first, each mode ordered by root pitch class
    pub const ALL: [MusicalKey; 24] = {
        use MusicalKey::*;
        [
            CMajor, DbMajor, DMajor, EbMajor, EMajor, FMajor, GbMajor, GMajor, AbMajor, AMajor,
            BbMajor, BMajor, CMinor, DbMinor, DMinor, EbMinor, EMinor, FMinor, GbMinor, GMinor,
            AbMinor, AMinor, BbMinor, BMinor,
        ]
    };

    /// Root as a pitch class, C = 0
    pub fn root_pitch_class(&self) -> u8 {
        (*self as u8) % 12
    }

    pub fn is_major(&self) -> bool {
        (*self as u8) < 12
    }

    /// Major key on a root; the pitch class is taken mod 12
    pub fn major_from_pitch_class(pc: u8) -> Self {
        Self::ALL[(pc % 12) as usize]
    }

    pub fn minor_from_pitch_class(pc: u8) -> Self {
        Self::ALL[12 + (pc % 12) as usize]
    }

    /// Label such as "C Major" or "F# Minor" (sharp spelling)
    pub fn label(&self) -> String {
        let mode = if self.is_major() { "Major" } else { "Minor" };
        format!("{} {}", NOTE_NAMES[self.root_pitch_class() as usize], mode)
    }

    /// Parse a label like "C# Major" or "Bb Minor"
    ///
    /// Sharp and flat spellings are both accepted; anything else is `None`.
    pub fn parse_label(label: &str) -> Option<Self> {
        let mut parts = label.split_whitespace();
        let note = parts.next()?;
        let mode = parts.next()?;
        if parts.next().is_some() {
            return None;
        }

        let pc = note_pitch_class(note)?;
        match mode {
            "Major" => Some(Self::major_from_pitch_class(pc)),
            "Minor" => Some(Self::minor_from_pitch_class(pc)),
            _ => None,
        }
    }
}

fn note_pitch_class(note: &str) -> Option<u8> {
    let pc = match note {
        "C" => 0,
        "C#" | "Db" => 1,
        "D" => 2,
        "D#" | "Eb" => 3,
        "E" => 4,
        "F" => 5,
        "F#" | "Gb" => 6,
        "G" => 7,
        "G#" | "Ab" => 8,
        "A" => 9,
        "A#" | "Bb" => 10,
        "B" => 11,
        _ => return None,
    };
    Some(pc)
}

impl fmt::Display for MusicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A position on the wheel, written "8A" (A minor) or "8B" (C major)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CamelotKey {
    /// 1..=12
    pub number: u8,
    /// Letter B when set, A otherwise
    pub is_major: bool,
}

impl CamelotKey {
    /// `None` unless `number` is in 1..=12
    pub fn new(number: u8, is_major: bool) -> Option<Self> {
        if (1..=12).contains(&number) {
            Some(Self { number, is_major })
        } else {
            None
        }
    }

    /// Wheel position of a key
    pub fn from_musical_key(key: MusicalKey) -> Self {
        let pc = key.root_pitch_class() as usize;
        let is_major = key.is_major();
        let number = if is_major {
            MAJOR_WHEEL[pc]
        } else {
            MINOR_WHEEL[pc]
        };
        CamelotKey { number, is_major }
    }

    /// Number followed by the letter, as in "12B"
    pub fn display(&self) -> String {
        format!("{}{}", self.number, if self.is_major { 'B' } else { 'A' })
    }

    /// Inverse of [`CamelotKey::display`]; the letter may be lowercase
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.len() < 2 {
            return None;
        }

        let is_major = match s.chars().last()?.to_ascii_uppercase() {
            'B' => true,
            'A' => false,
            _ => return None,
        };
        let number: u8 = s[..s.len() - 1].parse().ok()?;

        Self::new(number, is_major)
    }

    /// Keys that blend without a clash: the same number in either letter,
    /// or a neighbouring number in the same letter
    pub fn is_compatible(&self, other: &CamelotKey) -> bool {
        if self.number == other.number {
            return true;
        }
        self.is_major == other.is_major && self.number_distance(other) == 1
    }

    /// Shortest distance between the two numbers around the wheel (0-6)
    fn number_distance(&self, other: &CamelotKey) -> u8 {
        let d = self.number.abs_diff(other.number);
        d.min(12 - d)
    }

    /// Steps around the wheel, plus one when the letters differ
    pub fn wheel_distance(&self, other: &CamelotKey) -> u8 {
        let mode_diff = u8::from(self.is_major != other.is_major);
        self.number_distance(other) + mode_diff
    }
}

impl fmt::Display for CamelotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Camelot notation for a key label, or `"Unknown"` if the label has no entry
pub fn camelot_for_label(label: &str) -> String {
    MusicalKey::parse_label(label)
        .map(|key| CamelotKey::from_musical_key(key).display())
        .unwrap_or_else(|| UNKNOWN_CAMELOT.to_string())
}
