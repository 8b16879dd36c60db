use super::value::{StructuredCell, WaveformSource};
use super::CellValue;

/// Format a cell value for display.
pub fn format_value(value: &CellValue) -> String {
    match value {
        CellValue::Number(n) => format_number(*n),
        CellValue::String(s) => s.clone(),
        CellValue::Null => String::new(),
        CellValue::Error(err) => format!("#ERR: {}", err.message),
        CellValue::Structured(cell) => format_structured(cell),
    }
}

/// Format a number for display.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "#NAN!".to_string()
    } else if n.is_infinite() {
        "#INF!".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e10 {
        format!("{:.0}", n)
    } else {
        format!("{:.2}", n)
    }
}

/// Text of a value used as a string argument (separator, wave type,
/// pattern). Numbers keep full precision.
pub fn to_text(value: &CellValue) -> String {
    match value {
        CellValue::Number(n) => n.to_string(),
        CellValue::String(s) => s.clone(),
        CellValue::Null => String::new(),
        CellValue::Error(err) => err.message.clone(),
        CellValue::Structured(cell) => format_structured(cell),
    }
}

fn format_structured(cell: &StructuredCell) -> String {
    match cell {
        StructuredCell::Oscillator(osc) => {
            format!("OSC {} {}Hz", osc.wave_type, format_number(osc.freq))
        }
        StructuredCell::Waveform(waveform) => match &waveform.source {
            WaveformSource::Oscillator(osc) => {
                format!("WAVEFORM {} {}Hz", osc.wave_type, format_number(osc.freq))
            }
            WaveformSource::Parameters { freq, amplitude, .. } => format!(
                "WAVEFORM {}Hz x{}",
                format_number(*freq),
                format_number(*amplitude)
            ),
        },
        StructuredCell::Beat(beat) => {
            format!("BEAT {}bpm {}", format_number(beat.bpm), beat.pattern)
        }
        StructuredCell::Metronome(m) => format!("METRONOME {}bpm", format_number(m.bpm)),
        StructuredCell::Time(t) => format!("TIME {}", format_number(t.value)),
        StructuredCell::Adsr(adsr) => format!(
            "ADSR {}/{}/{}/{}",
            adsr.attack, adsr.decay, adsr.sustain, adsr.release
        ),
        StructuredCell::Audio(audio) => format!(
            "AUDIO {} {}Hz",
            audio.wave_type,
            format_number(audio.frequency)
        ),
        StructuredCell::Sequence(seq) => format!(
            "SEQ {} steps @ {}bpm",
            seq.total_steps,
            format_number(seq.bpm)
        ),
        StructuredCell::Chord(chord) => format!("{} ({})", chord.symbol, chord.notes.join(" ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::value::{Adsr, Metronome};
    use crate::engine::{CellError, ErrorKind};

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(14.0), "14");
        assert_eq!(format_number(0.5), "0.50");
        assert_eq!(format_number(f64::NAN), "#NAN!");
        assert_eq!(format_number(f64::INFINITY), "#INF!");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&CellValue::Null), "");
        assert_eq!(
            format_value(&CellValue::Error(CellError::new(ErrorKind::Arithmetic, "Division by zero"))),
            "#ERR: Division by zero"
        );
        assert_eq!(
            format_value(&CellValue::Structured(StructuredCell::Metronome(Metronome { bpm: 90.0 }))),
            "METRONOME 90bpm"
        );
        assert_eq!(
            format_value(&CellValue::Structured(StructuredCell::Adsr(Adsr {
                attack: 0.1,
                decay: 0.2,
                sustain: 0.5,
                release: 1.0,
            }))),
            "ADSR 0.1/0.2/0.5/1"
        );
    }

    #[test]
    fn test_to_text_keeps_precision() {
        assert_eq!(to_text(&CellValue::Number(0.25)), "0.25");
        assert_eq!(to_text(&CellValue::Number(3.0)), "3");
        assert_eq!(to_text(&CellValue::from("sine")), "sine");
    }
}
