//! Note names, MIDI numbers, frequencies and chord tables.
//!
//! Pure and stateless. MIDI 60 is `C4` and MIDI 69 is `A4` = 440 Hz
//! (twelve-tone equal temperament). Output spelling always uses sharps; flats
//! are accepted on input by enharmonic equivalence.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::engine::EvalError;

/// Sharp spelling of the twelve pitch classes, indexed by semitone above C.
pub const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Octave used when a note name carries no octave digit.
pub const DEFAULT_OCTAVE: i32 = 4;

const A4_MIDI: i32 = 69;
const A4_FREQ: f64 = 440.0;

fn note_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?<letter>[A-G])(?<accidental>[#b])?(?<octave>[0-9])?$")
            .expect("note name regex must compile")
    })
}

/// A parsed note name: spelled pitch class plus its MIDI number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Note {
    /// Pitch class as written (`"C"`, `"F#"`, `"Bb"`), without octave.
    pub name: String,
    pub midi: i32,
}

/// Parse `[A-G](#|b)?` with an optional single octave digit (default 4).
pub fn parse_note(text: &str) -> Result<Note, EvalError> {
    let caps = note_re()
        .captures(text)
        .ok_or_else(|| EvalError::InvalidNoteName(text.to_string()))?;

    let base = match &caps["letter"] {
        "C" => 0,
        "D" => 2,
        "E" => 4,
        "F" => 5,
        "G" => 7,
        "A" => 9,
        _ => 11,
    };
    let accidental = match caps.name("accidental").map(|m| m.as_str()) {
        Some("#") => 1,
        Some(_) => -1,
        None => 0,
    };
    let octave = caps
        .name("octave")
        .and_then(|m| m.as_str().parse::<i32>().ok())
        .unwrap_or(DEFAULT_OCTAVE);

    let name = match caps.name("accidental") {
        Some(acc) => format!("{}{}", &caps["letter"], acc.as_str()),
        None => caps["letter"].to_string(),
    };

    Ok(Note {
        name,
        midi: (octave + 1) * 12 + base + accidental,
    })
}

/// MIDI number of a note name such as `"C4"`, `"F#"` or `"Bb3"`.
pub fn parse_note_name(text: &str) -> Result<i32, EvalError> {
    parse_note(text).map(|note| note.midi)
}

/// Equal-tempered frequency in Hz of a MIDI note number.
pub fn midi_to_freq(midi: i32) -> f64 {
    A4_FREQ * 2f64.powf(f64::from(midi - A4_MIDI) / 12.0)
}

/// Sharp spelling with octave, e.g. `60 -> "C4"`, `70 -> "A#4"`.
pub fn midi_to_note_name(midi: i32) -> String {
    let pitch = PITCH_CLASSES[midi.rem_euclid(12) as usize];
    let octave = midi.div_euclid(12) - 1;
    format!("{}{}", pitch, octave)
}

/// Harmonic category of a chord.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
    MajorSeventh,
    MinorSeventh,
    DominantSeventh,
    DiminishedSeventh,
    HalfDiminishedSeventh,
    Sus2,
    Sus4,
}

/// Immutable chord table entry.
#[derive(Debug, PartialEq, Eq)]
pub struct ChordDefinition {
    /// Semitones above the root, ascending.
    pub intervals: &'static [i32],
    /// Suffix appended to the root in the chord symbol.
    pub symbol: &'static str,
    pub name: &'static str,
}

struct ChordEntry {
    key: &'static str,
    quality: ChordQuality,
    definition: ChordDefinition,
}

const CHORD_TYPES: &[ChordEntry] = &[
    ChordEntry {
        key: "maj",
        quality: ChordQuality::Major,
        definition: ChordDefinition {
            intervals: &[0, 4, 7],
            symbol: "",
            name: "Major",
        },
    },
    ChordEntry {
        key: "min",
        quality: ChordQuality::Minor,
        definition: ChordDefinition {
            intervals: &[0, 3, 7],
            symbol: "m",
            name: "Minor",
        },
    },
    ChordEntry {
        key: "dim",
        quality: ChordQuality::Diminished,
        definition: ChordDefinition {
            intervals: &[0, 3, 6],
            symbol: "dim",
            name: "Diminished",
        },
    },
    ChordEntry {
        key: "aug",
        quality: ChordQuality::Augmented,
        definition: ChordDefinition {
            intervals: &[0, 4, 8],
            symbol: "aug",
            name: "Augmented",
        },
    },
    ChordEntry {
        key: "maj7",
        quality: ChordQuality::MajorSeventh,
        definition: ChordDefinition {
            intervals: &[0, 4, 7, 11],
            symbol: "maj7",
            name: "Major Seventh",
        },
    },
    ChordEntry {
        key: "min7",
        quality: ChordQuality::MinorSeventh,
        definition: ChordDefinition {
            intervals: &[0, 3, 7, 10],
            symbol: "m7",
            name: "Minor Seventh",
        },
    },
    ChordEntry {
        key: "7",
        quality: ChordQuality::DominantSeventh,
        definition: ChordDefinition {
            intervals: &[0, 4, 7, 10],
            symbol: "7",
            name: "Dominant Seventh",
        },
    },
    ChordEntry {
        key: "dim7",
        quality: ChordQuality::DiminishedSeventh,
        definition: ChordDefinition {
            intervals: &[0, 3, 6, 9],
            symbol: "dim7",
            name: "Diminished Seventh",
        },
    },
    ChordEntry {
        key: "half-dim7",
        quality: ChordQuality::HalfDiminishedSeventh,
        definition: ChordDefinition {
            intervals: &[0, 3, 6, 10],
            symbol: "ø7",
            name: "Half-Diminished Seventh",
        },
    },
    ChordEntry {
        key: "sus2",
        quality: ChordQuality::Sus2,
        definition: ChordDefinition {
            intervals: &[0, 2, 7],
            symbol: "sus2",
            name: "Suspended Second",
        },
    },
    ChordEntry {
        key: "sus4",
        quality: ChordQuality::Sus4,
        definition: ChordDefinition {
            intervals: &[0, 5, 7],
            symbol: "sus4",
            name: "Suspended Fourth",
        },
    },
];

/// Formula spellings of every chord quality, in table order.
pub fn quality_names() -> Vec<&'static str> {
    CHORD_TYPES.iter().map(|entry| entry.key).collect()
}

impl ChordQuality {
    fn entry(self) -> &'static ChordEntry {
        CHORD_TYPES
            .iter()
            .find(|entry| entry.quality == self)
            .expect("every chord quality has a table entry")
    }

    pub fn definition(self) -> &'static ChordDefinition {
        &self.entry().definition
    }

    /// The spelling used in formulas (`"maj7"`, `"half-dim7"`, ...).
    pub fn key(self) -> &'static str {
        self.entry().key
    }
}

impl FromStr for ChordQuality {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CHORD_TYPES
            .iter()
            .find(|entry| entry.key == s)
            .map(|entry| entry.quality)
            .ok_or_else(|| EvalError::InvalidChordQuality(s.to_string()))
    }
}

impl fmt::Display for ChordQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// MIDI numbers of a chord built on `root`.
pub fn chord_midi(root: i32, quality: ChordQuality) -> Vec<i32> {
    quality
        .definition()
        .intervals
        .iter()
        .map(|interval| root + interval)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_note_name_defaults_to_octave_four() {
        assert_eq!(parse_note_name("C").unwrap(), 60);
        assert_eq!(parse_note_name("A").unwrap(), 69);
        assert_eq!(parse_note_name("B").unwrap(), 71);
        assert_eq!(parse_note_name("C#").unwrap(), 61);
    }

    #[test]
    fn test_parse_note_name_with_octave_and_flats() {
        assert_eq!(parse_note_name("C3").unwrap(), 48);
        assert_eq!(parse_note_name("A5").unwrap(), 81);
        assert_eq!(parse_note_name("Bb3").unwrap(), 58);
        assert_eq!(parse_note_name("Eb").unwrap(), parse_note_name("D#").unwrap());
    }

    #[test]
    fn test_parse_note_name_rejects_garbage() {
        for bad in ["", "H", "c", "C##", "C10", "Cx", "#C"] {
            assert_eq!(
                parse_note_name(bad),
                Err(EvalError::InvalidNoteName(bad.to_string())),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_midi_to_freq_reference_points() {
        assert_eq!(midi_to_freq(69), 440.0);
        assert!((midi_to_freq(81) - 880.0).abs() < 1e-9);
        assert!((midi_to_freq(57) - 220.0).abs() < 1e-9);
        assert!((midi_to_freq(60) - 261.625_565).abs() < 1e-5);
    }

    #[test]
    fn test_midi_to_note_name() {
        assert_eq!(midi_to_note_name(60), "C4");
        assert_eq!(midi_to_note_name(70), "A#4");
        assert_eq!(midi_to_note_name(0), "C-1");
        assert_eq!(midi_to_note_name(127), "G9");
    }

    #[test]
    fn test_note_name_round_trip_is_stable() {
        for pitch in ["C", "C#", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B"] {
            for octave in 0..=9 {
                let text = format!("{pitch}{octave}");
                let midi = parse_note_name(&text).unwrap();
                let spelled = midi_to_note_name(midi);
                assert_eq!(parse_note_name(&spelled).unwrap(), midi, "{text} -> {spelled}");
            }
        }
    }

    #[test]
    fn test_chord_table_intervals() {
        assert_eq!(ChordQuality::MajorSeventh.definition().intervals, &[0, 4, 7, 11]);
        assert_eq!(ChordQuality::HalfDiminishedSeventh.definition().intervals, &[0, 3, 6, 10]);
        assert_eq!(ChordQuality::Sus4.definition().intervals, &[0, 5, 7]);
        assert_eq!(quality_names().len(), 11);
    }

    #[test]
    fn test_chord_quality_from_str() {
        assert_eq!("7".parse::<ChordQuality>(), Ok(ChordQuality::DominantSeventh));
        assert_eq!("min".parse::<ChordQuality>(), Ok(ChordQuality::Minor));
        assert!("Maj".parse::<ChordQuality>().is_err());
        assert_eq!(ChordQuality::Minor.to_string(), "min");
    }

    #[test]
    fn test_chord_midi() {
        assert_eq!(chord_midi(60, ChordQuality::Major), vec![60, 64, 67]);
        assert_eq!(chord_midi(62, ChordQuality::MinorSeventh), vec![62, 65, 69, 72]);
    }
}
