//! Built-in formula functions and their metadata.
//!
//! Conventions:
//! - Formula-facing names are matched case-insensitively (`osc` == `OSC`).
//! - Each handler validates its own arity and fails fast with a message that
//!   names the expected arguments.
//! - A handler receives the tokens after its name, e.g. `( 440 , A1 )`.
//! - If you add a builtin, add a `Builtin` entry to `BUILTINS`.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::debug;

use crate::engine::value::{
    Adsr, Audio, Beat, Chord, Metronome, Oscillator, Sequence, SequenceMetadata, Time, Waveform,
    WaveformSource,
};
use crate::engine::{
    CellRef, CellValue, DEFAULT_TEMPO, EvalError, SequenceMode, Sheet, StructuredCell, TriggerBus,
    bare_tokens, parse_range, split_arguments, to_text,
};
use crate::music::{ChordQuality, chord_midi, midi_to_freq, midi_to_note_name, parse_note};
use crate::script::ScriptScope;

/// One invocation of a builtin.
pub struct Call<'a> {
    /// Tokens after the builtin name.
    pub tokens: &'a [String],
    /// Source text after the builtin name, untokenized.
    pub source: &'a str,
    /// The cell whose formula is being evaluated.
    pub caller: CellRef,
    /// Nesting depth of this handler within the formula.
    pub depth: usize,
}

impl Call<'_> {
    fn arguments(&self) -> Vec<String> {
        split_arguments(self.tokens)
    }

    fn resolve(&self, sheet: &mut Sheet, arg: &str) -> Result<CellValue, EvalError> {
        sheet.resolve_argument(arg, self.caller, self.depth)
    }

    fn number_or(&self, sheet: &mut Sheet, arg: &str, default: f64) -> Result<f64, EvalError> {
        Ok(self.resolve(sheet, arg)?.coerce_number().unwrap_or(default))
    }

    /// Zero and non-numeric values both fall back to `default`.
    fn nonzero_or(&self, sheet: &mut Sheet, arg: &str, default: f64) -> Result<f64, EvalError> {
        Ok(self.resolve(sheet, arg)?.nonzero_number().unwrap_or(default))
    }

    /// Text of an argument. An upstream error value fails the call with the
    /// upstream message instead of becoming text.
    fn text(&self, sheet: &mut Sheet, arg: &str) -> Result<String, EvalError> {
        match self.resolve(sheet, arg)? {
            CellValue::Error(upstream) => Err(EvalError::Referenced(upstream)),
            value => Ok(to_text(&value)),
        }
    }
}

type Handler = fn(&mut Sheet, &Call<'_>) -> Result<CellValue, EvalError>;

pub struct Builtin {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub usage: &'static str,
    #[allow(dead_code)]
    pub description: &'static str,
    pub(crate) handler: Handler,
}

pub const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "WAVEFORM",
        aliases: &[],
        usage: "WAVEFORM(oscillator) | WAVEFORM(freq, amplitude, [phase])",
        description: "Waveform display of an oscillator cell or explicit parameters",
        handler: waveform,
    },
    Builtin {
        name: "OSC",
        aliases: &["OSCILLATOR"],
        usage: "OSC(waveType, freq, phase, amplitude)",
        description: "Oscillator definition",
        handler: oscillator,
    },
    Builtin {
        name: "BEAT",
        aliases: &[],
        usage: "BEAT(bpm, pattern)",
        description: "Triggerable beat pattern",
        handler: beat,
    },
    Builtin {
        name: "METRONOME",
        aliases: &[],
        usage: "METRONOME([bpm])",
        description: "Metronome at the given or global tempo",
        handler: metronome,
    },
    Builtin {
        name: "TIME",
        aliases: &[],
        usage: "TIME()",
        description: "Current playback time",
        handler: time,
    },
    Builtin {
        name: "CONCAT",
        aliases: &[],
        usage: "CONCAT(separator, value, ...)",
        description: "Join resolved values with a separator",
        handler: concat,
    },
    Builtin {
        name: "ADSR",
        aliases: &[],
        usage: "ADSR(attack, decay, sustain, release)",
        description: "Envelope definition",
        handler: adsr,
    },
    Builtin {
        name: "AUDIO",
        aliases: &[],
        usage: "AUDIO(frequency, trigger, [waveType])",
        description: "Voice that sounds when a beat or sequence cell triggers",
        handler: audio,
    },
    Builtin {
        name: "SEQ",
        aliases: &[],
        usage: "SEQ(range, bpm, [mode])",
        description: "Step sequence read from a range",
        handler: sequence,
    },
    Builtin {
        name: "CHORD",
        aliases: &[],
        usage: "CHORD(root, [quality])",
        description: "Chord notes, MIDI numbers and frequencies",
        handler: chord,
    },
    Builtin {
        name: "JS",
        aliases: &[],
        usage: "JS(code)",
        description: "Evaluate a script in the sandbox",
        handler: script,
    },
];

/// Look a builtin up by name or alias, ignoring case.
pub fn find_builtin(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| {
        b.name.eq_ignore_ascii_case(name) || b.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    })
}

fn waveform(sheet: &mut Sheet, call: &Call<'_>) -> Result<CellValue, EvalError> {
    let args = bare_tokens(call.tokens);
    let source = match args.as_slice() {
        [reference] => match call.resolve(sheet, reference)? {
            CellValue::Structured(StructuredCell::Oscillator(osc)) => {
                WaveformSource::Oscillator(osc)
            }
            _ => return Err(EvalError::InvalidOscillator),
        },
        [freq, amplitude, rest @ ..] if rest.len() <= 1 => {
            let phase = match rest.first() {
                Some(phase) => call.nonzero_or(sheet, phase, 0.0)?,
                None => 0.0,
            };
            WaveformSource::Parameters {
                freq: call.nonzero_or(sheet, freq, 1.0)?,
                amplitude: call.nonzero_or(sheet, amplitude, 1.0)?,
                phase,
            }
        }
        _ => return Err(EvalError::arity("Waveform requires 1, 2, or 3 arguments")),
    };
    Ok(StructuredCell::Waveform(Waveform { source }).into())
}

fn oscillator(sheet: &mut Sheet, call: &Call<'_>) -> Result<CellValue, EvalError> {
    let args = call.arguments();
    let [wave_type, freq, phase, amplitude] = args.as_slice() else {
        return Err(EvalError::arity("Oscillator requires 4 arguments"));
    };
    Ok(StructuredCell::Oscillator(Oscillator {
        wave_type: call.text(sheet, wave_type)?,
        freq: call.number_or(sheet, freq, 0.0)?,
        phase: call.number_or(sheet, phase, 0.0)?,
        amplitude: call.number_or(sheet, amplitude, 0.0)?,
    })
    .into())
}

fn beat(sheet: &mut Sheet, call: &Call<'_>) -> Result<CellValue, EvalError> {
    let args = call.arguments();
    let [bpm, pattern] = args.as_slice() else {
        return Err(EvalError::arity("Beat requires 2 arguments"));
    };
    Ok(StructuredCell::Beat(Beat {
        bpm: call.nonzero_or(sheet, bpm, DEFAULT_TEMPO)?,
        pattern: call.text(sheet, pattern)?.trim().to_string(),
        bus: TriggerBus::new(),
    })
    .into())
}

fn metronome(sheet: &mut Sheet, call: &Call<'_>) -> Result<CellValue, EvalError> {
    let args = call.arguments();
    let bpm = match args.as_slice() {
        [] => sheet.tempo(),
        [bpm] => {
            let tempo = sheet.tempo();
            call.nonzero_or(sheet, bpm, tempo)?
        }
        _ => return Err(EvalError::arity("Metronome requires zero or one argument")),
    };
    Ok(StructuredCell::Metronome(Metronome { bpm }).into())
}

fn time(sheet: &mut Sheet, call: &Call<'_>) -> Result<CellValue, EvalError> {
    if !call.arguments().is_empty() {
        return Err(EvalError::arity("Time takes no arguments"));
    }
    Ok(StructuredCell::Time(Time {
        value: sheet.time(),
    })
    .into())
}

fn concat(sheet: &mut Sheet, call: &Call<'_>) -> Result<CellValue, EvalError> {
    let args = call.arguments();
    let [separator, values @ ..] = args.as_slice() else {
        return Err(EvalError::arity("Concat requires at least 2 arguments"));
    };
    if values.is_empty() {
        return Err(EvalError::arity("Concat requires at least 2 arguments"));
    }

    let separator = call.text(sheet, separator)?;
    let mut parts = Vec::with_capacity(values.len());
    for arg in values {
        parts.push(call.text(sheet, arg)?);
    }
    Ok(CellValue::String(parts.join(&separator)))
}

fn adsr(sheet: &mut Sheet, call: &Call<'_>) -> Result<CellValue, EvalError> {
    let args = call.arguments();
    let [attack, decay, sustain, release] = args.as_slice() else {
        return Err(EvalError::arity("ADSR requires 4 arguments"));
    };
    Ok(StructuredCell::Adsr(Adsr {
        attack: call.number_or(sheet, attack, 0.0)?,
        decay: call.number_or(sheet, decay, 0.0)?,
        sustain: call.number_or(sheet, sustain, 0.0)?,
        release: call.number_or(sheet, release, 0.0)?,
    })
    .into())
}

fn audio(sheet: &mut Sheet, call: &Call<'_>) -> Result<CellValue, EvalError> {
    let args = call.arguments();
    let (frequency, trigger, wave_type) = match args.as_slice() {
        [frequency, trigger] => (frequency, trigger, None),
        [frequency, trigger, wave_type] => (frequency, trigger, Some(wave_type)),
        _ => {
            return Err(EvalError::arity(
                "Audio requires 2 or 3 arguments (frequency, trigger, [waveType])",
            ));
        }
    };

    let frequency = call.nonzero_or(sheet, frequency, 440.0)?;
    let source = call
        .resolve(sheet, trigger)?
        .as_trigger()
        .map(|t| t.bus().clone())
        .ok_or(EvalError::InvalidTrigger)?;
    let wave_type = match wave_type {
        Some(arg) => call.text(sheet, arg)?,
        None => "sine".to_string(),
    };

    Ok(StructuredCell::Audio(Audio {
        frequency,
        wave_type,
        source,
    })
    .into())
}

fn sequence(sheet: &mut Sheet, call: &Call<'_>) -> Result<CellValue, EvalError> {
    let args = call.arguments();
    let (range, bpm, mode) = match args.as_slice() {
        [range, bpm] => (range, bpm, None),
        [range, bpm, mode] => (range, bpm, Some(mode)),
        _ => {
            return Err(EvalError::arity(
                "Sequence requires 2 or 3 arguments: range, bpm, [mode]",
            ));
        }
    };

    let range = parse_range(range)?;
    let bpm = call.nonzero_or(sheet, bpm, DEFAULT_TEMPO)?;
    let mode = match mode {
        Some(arg) => call.text(sheet, arg)?.parse::<SequenceMode>()?,
        None => SequenceMode::default(),
    };

    let values = sheet.extract_range(range, mode)?;
    debug!(cell = %call.caller, %range, %mode, steps = values.len(), "sequence extracted");
    Ok(StructuredCell::Sequence(Sequence {
        total_steps: values.len(),
        values,
        current_step: 0,
        bpm,
        bus: TriggerBus::new(),
        metadata: SequenceMetadata { mode, range, bpm },
    })
    .into())
}

/// Upper-case the first letter so `c`, `f#` and `bb` read as note names.
fn normalize_root(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn chord(sheet: &mut Sheet, call: &Call<'_>) -> Result<CellValue, EvalError> {
    let args = call.arguments();
    let (root, quality) = match args.as_slice() {
        [root] => (root, None),
        [root, quality] => (root, Some(quality)),
        _ => {
            return Err(EvalError::arity(
                "CHORD requires root note and optional quality (e.g., CHORD(\"C\", \"maj7\"))",
            ));
        }
    };

    let root = normalize_root(&call.text(sheet, root)?.replace('\'', ""));
    let note = parse_note(&root)?;
    let quality = match quality {
        Some(arg) => call.text(sheet, arg)?.replace('\'', "").parse::<ChordQuality>()?,
        None => ChordQuality::Major,
    };

    let midi = chord_midi(note.midi, quality);
    Ok(StructuredCell::Chord(Chord {
        symbol: format!("{}{}", note.name, quality.definition().symbol),
        root: note.name,
        quality,
        frequencies: midi.iter().map(|&m| midi_to_freq(m)).collect(),
        notes: midi.iter().map(|&m| midi_to_note_name(m)).collect(),
        midi,
    })
    .into())
}

/// `getValue("B2")` calls with a literal address; only these are looked up
/// before a script runs.
fn get_value_call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\bgetValue\(\s*"(?<address>[A-Z]+[0-9]+)"\s*\)"#)
            .expect("getValue regex must compile")
    })
}

/// Remove the call's own parentheses, `(code)` -> `code`, when the first
/// `(` closes at the very end.
fn strip_call_parens(source: &str) -> &str {
    let Some(inner) = source
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    else {
        return source;
    };

    let mut depth = 0i32;
    let mut in_quotes = false;
    for ch in inner.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => {
                depth -= 1;
                if depth < 0 {
                    return source;
                }
            }
            _ => {}
        }
    }
    inner.trim()
}

fn script(sheet: &mut Sheet, call: &Call<'_>) -> Result<CellValue, EvalError> {
    let code = strip_call_parens(call.source.trim());

    let mut values = HashMap::new();
    for caps in get_value_call_re().captures_iter(code) {
        let Some(cell) = CellRef::from_str(&caps["address"]) else {
            continue;
        };
        if values.contains_key(&cell) {
            continue;
        }
        let value = sheet
            .get_evaluated_cell_value(cell)
            .unwrap_or_else(|err| CellValue::Error(err.into()));
        values.insert(cell, value);
    }

    let scope = ScriptScope {
        caller: call.caller,
        values,
        tempo: sheet.tempo(),
        time: sheet.time(),
    };
    let outcome = sheet
        .script_host()
        .evaluate(code, scope)
        .map_err(EvalError::External)?;

    sheet.pending_writes.extend(outcome.writes);
    sheet.audio_events.extend(outcome.events);
    Ok(outcome.value)
}
