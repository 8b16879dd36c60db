//! Evaluated cell values.
//!
//! [`CellValue`] is a closed set: every consumer matches it exhaustively, so
//! a new variant is a compile error at each site rather than a runtime NaN.

use super::range::{CellRange, SequenceMode};
use super::resolve::parse_float_prefix;
use super::trigger::{Listener, Trigger, TriggerBus};
use super::CellError;
use crate::music::ChordQuality;

/// The value of one cell after evaluation.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Number(f64),
    String(String),
    /// Empty cell.
    Null,
    Error(CellError),
    Structured(StructuredCell),
}

impl CellValue {
    /// Short lowercase name of the variant, as shown to scripts.
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Number(_) => "number",
            CellValue::String(_) => "string",
            CellValue::Null => "null",
            CellValue::Error(_) => "error",
            CellValue::Structured(cell) => cell.type_name(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CellValue::Error(_))
    }

    /// Numeric reading of a scalar: numbers as-is, strings by their leading
    /// numeric prefix. Everything else has no numeric reading.
    pub fn coerce_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if !n.is_nan() => Some(*n),
            CellValue::String(s) => parse_float_prefix(s),
            CellValue::Number(_)
            | CellValue::Null
            | CellValue::Error(_)
            | CellValue::Structured(_) => None,
        }
    }

    /// Like [`coerce_number`](Self::coerce_number) but zero also counts as
    /// missing, for parameters whose default replaces any falsy input.
    pub fn nonzero_number(&self) -> Option<f64> {
        self.coerce_number().filter(|n| *n != 0.0)
    }

    /// The trigger capability of a `Beat` or `Sequence` cell.
    pub fn as_trigger(&self) -> Option<&dyn Trigger> {
        match self {
            CellValue::Structured(StructuredCell::Beat(beat)) => Some(beat as &dyn Trigger),
            CellValue::Structured(StructuredCell::Sequence(seq)) => Some(seq as &dyn Trigger),
            _ => None,
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<StructuredCell> for CellValue {
    fn from(cell: StructuredCell) -> Self {
        CellValue::Structured(cell)
    }
}

/// Domain objects produced by the music builtins.
#[derive(Clone, Debug, PartialEq)]
pub enum StructuredCell {
    Oscillator(Oscillator),
    Waveform(Waveform),
    Beat(Beat),
    Metronome(Metronome),
    Time(Time),
    Adsr(Adsr),
    Audio(Audio),
    Sequence(Sequence),
    Chord(Chord),
}

impl StructuredCell {
    pub fn type_name(&self) -> &'static str {
        match self {
            StructuredCell::Oscillator(_) => "oscillator",
            StructuredCell::Waveform(_) => "waveform",
            StructuredCell::Beat(_) => "beat",
            StructuredCell::Metronome(_) => "metronome",
            StructuredCell::Time(_) => "time",
            StructuredCell::Adsr(_) => "adsr",
            StructuredCell::Audio(_) => "audio",
            StructuredCell::Sequence(_) => "sequence",
            StructuredCell::Chord(_) => "chord",
        }
    }
}

fn beat_duration(bpm: f64) -> f64 {
    60.0 / bpm
}

#[derive(Clone, Debug, PartialEq)]
pub struct Oscillator {
    pub wave_type: String,
    pub freq: f64,
    pub phase: f64,
    pub amplitude: f64,
}

/// Where a waveform display takes its shape from.
#[derive(Clone, Debug, PartialEq)]
pub enum WaveformSource {
    Oscillator(Oscillator),
    Parameters { freq: f64, amplitude: f64, phase: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Waveform {
    pub source: WaveformSource,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Beat {
    pub bpm: f64,
    pub pattern: String,
    pub bus: TriggerBus,
}

impl Beat {
    /// Seconds per beat.
    pub fn step_duration(&self) -> f64 {
        beat_duration(self.bpm)
    }
}

impl Trigger for Beat {
    fn bus(&self) -> &TriggerBus {
        &self.bus
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Metronome {
    pub bpm: f64,
}

impl Metronome {
    pub fn step_duration(&self) -> f64 {
        beat_duration(self.bpm)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Time {
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Adsr {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

/// A voice that sounds whenever its source cell triggers.
#[derive(Clone, Debug, PartialEq)]
pub struct Audio {
    pub frequency: f64,
    pub wave_type: String,
    /// Bus of the `Beat` or `Sequence` this voice is bound to.
    pub source: TriggerBus,
}

impl Audio {
    /// Listen to the source cell's triggers.
    pub fn subscribe(&self, listener: Listener) {
        self.source.subscribe(listener);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SequenceMetadata {
    pub mode: SequenceMode,
    pub range: CellRange,
    pub bpm: f64,
}

/// Stepped values read from a range, with a playback cursor.
#[derive(Clone, Debug, PartialEq)]
pub struct Sequence {
    pub values: Vec<Option<f64>>,
    pub current_step: usize,
    pub total_steps: usize,
    pub bpm: f64,
    pub bus: TriggerBus,
    pub metadata: SequenceMetadata,
}

impl Sequence {
    pub fn get_current_value(&self) -> Option<f64> {
        self.values.get(self.current_step).copied().flatten()
    }

    /// Move the cursor one step, wrapping at the end, and return the value
    /// under it.
    pub fn advance(&mut self) -> Option<f64> {
        if self.total_steps > 0 {
            self.current_step = (self.current_step + 1) % self.total_steps;
        }
        self.get_current_value()
    }

    pub fn step_duration(&self) -> f64 {
        beat_duration(self.bpm)
    }
}

impl Trigger for Sequence {
    fn bus(&self) -> &TriggerBus {
        &self.bus
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Chord {
    /// Root pitch class as written, e.g. `"C"` or `"Bb"`.
    pub root: String,
    pub quality: ChordQuality,
    pub midi: Vec<i32>,
    pub frequencies: Vec<f64>,
    pub notes: Vec<String>,
    /// Root plus quality suffix, e.g. `"Cmaj7"`.
    pub symbol: String,
}

impl Chord {
    pub fn name(&self) -> &'static str {
        self.quality.definition().name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CellRef, ErrorKind};

    fn sequence(values: Vec<Option<f64>>) -> Sequence {
        let total_steps = values.len();
        Sequence {
            values,
            current_step: 0,
            total_steps,
            bpm: 120.0,
            bus: TriggerBus::new(),
            metadata: SequenceMetadata {
                mode: SequenceMode::Vertical,
                range: CellRange::new(CellRef::new(0, 0), CellRef::new(total_steps - 1, 0)),
                bpm: 120.0,
            },
        }
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(CellValue::Number(2.5).coerce_number(), Some(2.5));
        assert_eq!(CellValue::from("12abc").coerce_number(), Some(12.0));
        assert_eq!(CellValue::from("x").coerce_number(), None);
        assert_eq!(CellValue::Null.coerce_number(), None);
        assert_eq!(
            CellValue::Error(CellError::new(ErrorKind::Parse, "bad")).coerce_number(),
            None
        );
        assert_eq!(CellValue::Number(0.0).nonzero_number(), None);
    }

    #[test]
    fn test_sequence_cursor_wraps() {
        let mut seq = sequence(vec![Some(1.0), None, Some(3.0)]);
        assert_eq!(seq.get_current_value(), Some(1.0));
        assert_eq!(seq.advance(), None);
        assert_eq!(seq.advance(), Some(3.0));
        assert_eq!(seq.advance(), Some(1.0));
        assert_eq!(seq.step_duration(), 0.5);
    }

    #[test]
    fn test_audio_subscribes_to_source_bus() {
        let beat = Beat {
            bpm: 90.0,
            pattern: "x.x.".into(),
            bus: TriggerBus::new(),
        };
        let audio = Audio {
            frequency: 440.0,
            wave_type: "sine".into(),
            source: beat.bus.clone(),
        };
        audio.subscribe(Box::new(|_| {}));
        assert_eq!(beat.bus.listener_count(), 1);

        let value = CellValue::Structured(StructuredCell::Beat(beat));
        assert!(value.as_trigger().is_some());
        assert_eq!(value.type_name(), "beat");
    }
}
