//! Script cells (`=JS(...)`) and the Rhai sandbox that runs them.
//!
//! The grid talks to scripts only through [`ScriptHost`]. A script sees the
//! values of the cells its code mentions, the tempo and the playback time,
//! and may queue raw-cell writes and audio events. Nothing a script does
//! touches the grid until the pass that ran it has finished.

use rand::Rng;
use rhai::{Dynamic, Engine, EvalAltResult, Map, Position};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::engine::value::{StructuredCell, WaveformSource};
use crate::engine::{CellRef, CellValue};

/// Upper bound on Rhai operations per script evaluation.
const MAX_SCRIPT_OPERATIONS: u64 = 1_000_000;

/// Audio-adjacent side effect requested by a script.
#[derive(Clone, Debug, PartialEq)]
pub enum AudioEvent {
    PlayNote { frequency: f64, duration: f64 },
    CreateOscillator { wave_type: String, frequency: f64 },
}

/// Everything a script may read.
#[derive(Clone, Debug)]
pub struct ScriptScope {
    pub caller: CellRef,
    /// Values of the cells mentioned in the code, looked up before the
    /// script runs. Failed lookups are stored as error values.
    pub values: HashMap<CellRef, CellValue>,
    pub tempo: f64,
    pub time: f64,
}

/// Result of one script evaluation.
#[derive(Clone, Debug)]
pub struct ScriptOutcome {
    pub value: CellValue,
    /// Raw text to store after the pass, in call order.
    pub writes: Vec<(CellRef, String)>,
    pub events: Vec<AudioEvent>,
}

impl ScriptOutcome {
    pub fn new(value: CellValue) -> ScriptOutcome {
        ScriptOutcome {
            value,
            writes: Vec::new(),
            events: Vec::new(),
        }
    }
}

/// Evaluates the code of `JS` cells.
pub trait ScriptHost: Send + Sync {
    /// Run `code` for `scope.caller`. The error string is shown in the cell
    /// as is.
    fn evaluate(&self, code: &str, scope: ScriptScope) -> Result<ScriptOutcome, String>;
}

/// [`ScriptHost`] backed by a fresh Rhai engine per evaluation.
#[derive(Clone, Debug, Default)]
pub struct RhaiScriptHost {
    custom_functions: Option<String>,
}

impl RhaiScriptHost {
    pub fn new() -> RhaiScriptHost {
        RhaiScriptHost::default()
    }

    /// A host whose scripts can call the functions defined in `script`.
    /// The script is compiled once here so syntax errors surface early.
    pub fn with_functions(script: &str) -> Result<RhaiScriptHost, String> {
        Engine::new()
            .compile(script)
            .map_err(|e| format!("Error in custom functions: {}", e))?;
        Ok(RhaiScriptHost {
            custom_functions: Some(script.to_string()),
        })
    }

    pub fn custom_functions(&self) -> Option<&str> {
        self.custom_functions.as_deref()
    }
}

impl ScriptHost for RhaiScriptHost {
    fn evaluate(&self, code: &str, scope: ScriptScope) -> Result<ScriptOutcome, String> {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let events = Arc::new(Mutex::new(Vec::new()));
        let engine = create_script_engine(&scope, writes.clone(), events.clone());

        let result = match &self.custom_functions {
            Some(script) => engine.eval::<Dynamic>(&format!("{}\n{}", script, code)),
            None => engine.eval::<Dynamic>(code),
        };
        let value = result.map_err(|e| format!("JS Error: {}", e))?;

        let mut outcome = ScriptOutcome::new(dynamic_to_value(value));
        outcome.writes = std::mem::take(&mut *lock(&writes));
        outcome.events = std::mem::take(&mut *lock(&events));
        Ok(outcome)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn runtime_error(message: impl Into<String>) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(
        Dynamic::from(message.into()),
        Position::NONE,
    ))
}

/// Read an INT or FLOAT argument as f64.
fn number(value: &Dynamic, what: &str) -> Result<f64, Box<EvalAltResult>> {
    if let Ok(n) = value.as_float() {
        Ok(n)
    } else if let Ok(n) = value.as_int() {
        Ok(n as f64)
    } else {
        Err(runtime_error(format!(
            "{} must be a number, got {}",
            what,
            value.type_name()
        )))
    }
}

fn parse_cell(address: &str) -> Result<CellRef, Box<EvalAltResult>> {
    CellRef::from_str(address)
        .ok_or_else(|| runtime_error(format!("Invalid cell address: {}", address)))
}

/// Register the sandbox API over a snapshot of `scope`.
fn create_script_engine(
    scope: &ScriptScope,
    writes: Arc<Mutex<Vec<(CellRef, String)>>>,
    events: Arc<Mutex<Vec<AudioEvent>>>,
) -> Engine {
    let mut engine = Engine::new();
    engine.set_max_operations(MAX_SCRIPT_OPERATIONS);

    let values = Arc::new(scope.values.clone());
    engine.register_fn(
        "getValue",
        move |address: &str| -> Result<Dynamic, Box<EvalAltResult>> {
            let cell = parse_cell(address)?;
            match values.get(&cell) {
                Some(CellValue::Error(err)) => Err(runtime_error(err.message.clone())),
                Some(value) => Ok(value_to_dynamic(value)),
                None => Err(runtime_error(format!(
                    "Cell {} is not available to this script",
                    address
                ))),
            }
        },
    );

    engine.register_fn(
        "setValue",
        move |address: &str, value: Dynamic| -> Result<(), Box<EvalAltResult>> {
            let cell = parse_cell(address)?;
            lock(&writes).push((cell, dynamic_to_raw(value)));
            Ok(())
        },
    );

    let tempo = scope.tempo;
    engine.register_fn("getBPM", move || tempo);
    let time = scope.time;
    engine.register_fn("getCurrentTime", move || time);

    let note_events = events.clone();
    engine.register_fn(
        "playNote",
        move |frequency: Dynamic, duration: Dynamic| -> Result<(), Box<EvalAltResult>> {
            let frequency = number(&frequency, "frequency")?;
            let duration = number(&duration, "duration")?;
            info!(frequency, duration, "playNote");
            lock(&note_events).push(AudioEvent::PlayNote {
                frequency,
                duration,
            });
            Ok(())
        },
    );

    engine.register_fn(
        "createOscillator",
        move |wave_type: &str, frequency: Dynamic| -> Result<(), Box<EvalAltResult>> {
            let frequency = number(&frequency, "frequency")?;
            info!(wave_type, frequency, "createOscillator");
            lock(&events).push(AudioEvent::CreateOscillator {
                wave_type: wave_type.to_string(),
                frequency,
            });
            Ok(())
        },
    );

    engine.register_fn(
        "random",
        |min: Dynamic, max: Dynamic| -> Result<f64, Box<EvalAltResult>> {
            let min = number(&min, "min")?;
            let max = number(&max, "max")?;
            Ok(min + rand::thread_rng().r#gen::<f64>() * (max - min))
        },
    );

    engine.register_fn(
        "scale",
        |value: Dynamic,
         in_min: Dynamic,
         in_max: Dynamic,
         out_min: Dynamic,
         out_max: Dynamic|
         -> Result<f64, Box<EvalAltResult>> {
            let value = number(&value, "value")?;
            let in_min = number(&in_min, "inMin")?;
            let in_max = number(&in_max, "inMax")?;
            let out_min = number(&out_min, "outMin")?;
            let out_max = number(&out_max, "outMax")?;
            Ok((value - in_min) * (out_max - out_min) / (in_max - in_min) + out_min)
        },
    );

    engine
}

/// Script-side view of a cell value. Text that is a whole number reads as a
/// number so that `getValue("A1") * 2` works on typed-in values.
fn value_to_dynamic(value: &CellValue) -> Dynamic {
    match value {
        CellValue::Number(n) => Dynamic::from(*n),
        CellValue::String(s) => match s.trim().parse::<f64>() {
            Ok(n) => Dynamic::from(n),
            Err(_) => Dynamic::from(s.clone()),
        },
        CellValue::Null => Dynamic::UNIT,
        CellValue::Error(err) => Dynamic::from(err.message.clone()),
        CellValue::Structured(cell) => Dynamic::from_map(structured_to_map(cell)),
    }
}

fn structured_to_map(cell: &StructuredCell) -> Map {
    let mut map = Map::new();
    map.insert("type".into(), Dynamic::from(cell.type_name().to_string()));
    let mut put = |key: &str, value: Dynamic| {
        map.insert(key.into(), value);
    };
    match cell {
        StructuredCell::Oscillator(osc) => {
            put("waveType", Dynamic::from(osc.wave_type.clone()));
            put("freq", Dynamic::from(osc.freq));
            put("phase", Dynamic::from(osc.phase));
            put("amplitude", Dynamic::from(osc.amplitude));
        }
        StructuredCell::Waveform(waveform) => match &waveform.source {
            WaveformSource::Oscillator(osc) => {
                put("source", Dynamic::from("oscillator".to_string()));
                put("waveType", Dynamic::from(osc.wave_type.clone()));
                put("freq", Dynamic::from(osc.freq));
            }
            WaveformSource::Parameters {
                freq,
                amplitude,
                phase,
            } => {
                put("source", Dynamic::from("parameters".to_string()));
                put("freq", Dynamic::from(*freq));
                put("amplitude", Dynamic::from(*amplitude));
                put("phase", Dynamic::from(*phase));
            }
        },
        StructuredCell::Beat(beat) => {
            put("bpm", Dynamic::from(beat.bpm));
            put("pattern", Dynamic::from(beat.pattern.clone()));
        }
        StructuredCell::Metronome(m) => put("bpm", Dynamic::from(m.bpm)),
        StructuredCell::Time(t) => put("value", Dynamic::from(t.value)),
        StructuredCell::Adsr(adsr) => {
            put("attack", Dynamic::from(adsr.attack));
            put("decay", Dynamic::from(adsr.decay));
            put("sustain", Dynamic::from(adsr.sustain));
            put("release", Dynamic::from(adsr.release));
        }
        StructuredCell::Audio(audio) => {
            put("frequency", Dynamic::from(audio.frequency));
            put("waveType", Dynamic::from(audio.wave_type.clone()));
        }
        StructuredCell::Sequence(seq) => {
            let values: rhai::Array = seq
                .values
                .iter()
                .map(|v| v.map_or(Dynamic::UNIT, Dynamic::from))
                .collect();
            put("values", Dynamic::from_array(values));
            put("currentStep", Dynamic::from(seq.current_step as i64));
            put("totalSteps", Dynamic::from(seq.total_steps as i64));
            put("bpm", Dynamic::from(seq.bpm));
        }
        StructuredCell::Chord(chord) => {
            put("root", Dynamic::from(chord.root.clone()));
            put("quality", Dynamic::from(chord.quality.key().to_string()));
            put("symbol", Dynamic::from(chord.symbol.clone()));
            let notes: rhai::Array = chord.notes.iter().map(|n| Dynamic::from(n.clone())).collect();
            let frequencies: rhai::Array =
                chord.frequencies.iter().map(|&f| Dynamic::from(f)).collect();
            put("notes", Dynamic::from_array(notes));
            put("frequencies", Dynamic::from_array(frequencies));
        }
    }
    map
}

/// Cell value of a script's result.
fn dynamic_to_value(value: Dynamic) -> CellValue {
    if value.is_unit() {
        CellValue::Null
    } else if let Ok(n) = value.as_float() {
        CellValue::Number(n)
    } else if let Ok(n) = value.as_int() {
        CellValue::Number(n as f64)
    } else if let Ok(b) = value.as_bool() {
        CellValue::String(if b { "TRUE" } else { "FALSE" }.to_string())
    } else if let Ok(s) = value.clone().into_string() {
        CellValue::String(s)
    } else {
        CellValue::String(value.to_string())
    }
}

/// Raw cell text for a value passed to `setValue`.
fn dynamic_to_raw(value: Dynamic) -> String {
    if value.is_unit() {
        String::new()
    } else if let Ok(n) = value.as_float() {
        n.to_string()
    } else if let Ok(n) = value.as_int() {
        n.to_string()
    } else if let Ok(b) = value.as_bool() {
        if b { "TRUE" } else { "FALSE" }.to_string()
    } else if let Ok(s) = value.clone().into_string() {
        s
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CellError, ErrorKind};

    fn scope(values: &[(&str, CellValue)]) -> ScriptScope {
        ScriptScope {
            caller: CellRef::new(0, 0),
            values: values
                .iter()
                .map(|(a, v)| (CellRef::from_str(a).unwrap(), v.clone()))
                .collect(),
            tempo: 120.0,
            time: 1.5,
        }
    }

    #[test]
    fn test_reads_values_and_context() {
        let host = RhaiScriptHost::new();
        let out = host
            .evaluate(
                "getValue(\"A2\") + getBPM() + getCurrentTime()",
                scope(&[("A2", CellValue::Number(2.0))]),
            )
            .unwrap();
        assert_eq!(out.value, CellValue::Number(123.5));
    }

    #[test]
    fn test_numeric_text_reads_as_number() {
        let host = RhaiScriptHost::new();
        let out = host
            .evaluate("getValue(\"B1\") * 2.0", scope(&[("B1", CellValue::from("21"))]))
            .unwrap();
        assert_eq!(out.value, CellValue::Number(42.0));
    }

    #[test]
    fn test_error_values_raise() {
        let host = RhaiScriptHost::new();
        let err = host
            .evaluate(
                "getValue(\"A1\")",
                scope(&[(
                    "A1",
                    CellValue::Error(CellError::new(ErrorKind::Arithmetic, "Division by zero")),
                )]),
            )
            .unwrap_err();
        assert!(err.starts_with("JS Error:"), "{err}");
        assert!(err.contains("Division by zero"), "{err}");
    }

    #[test]
    fn test_side_effects_are_collected() {
        let host = RhaiScriptHost::new();
        let out = host
            .evaluate(
                "setValue(\"C3\", 5); setValue(\"C4\", \"hi\"); playNote(440, 0.5); createOscillator(\"sine\", 220.0); true",
                scope(&[]),
            )
            .unwrap();
        assert_eq!(out.value, CellValue::String("TRUE".into()));
        assert_eq!(
            out.writes,
            vec![
                (CellRef::new(2, 2), "5".to_string()),
                (CellRef::new(3, 2), "hi".to_string()),
            ]
        );
        assert_eq!(
            out.events,
            vec![
                AudioEvent::PlayNote {
                    frequency: 440.0,
                    duration: 0.5,
                },
                AudioEvent::CreateOscillator {
                    wave_type: "sine".into(),
                    frequency: 220.0,
                },
            ]
        );
    }

    #[test]
    fn test_random_and_scale() {
        let host = RhaiScriptHost::new();
        let out = host.evaluate("scale(5, 0, 10, 0, 100)", scope(&[])).unwrap();
        assert_eq!(out.value, CellValue::Number(50.0));

        let out = host.evaluate("random(2, 3)", scope(&[])).unwrap();
        match out.value {
            CellValue::Number(n) => assert!((2.0..3.0).contains(&n)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_structured_values_are_maps() {
        use crate::engine::value::Metronome;
        let host = RhaiScriptHost::new();
        let metronome = CellValue::Structured(StructuredCell::Metronome(Metronome { bpm: 90.0 }));
        let out = host
            .evaluate("let m = getValue(\"A1\"); m[\"type\"] + \" \" + m.bpm", scope(&[("A1", metronome)]))
            .unwrap();
        assert_eq!(out.value, CellValue::String("metronome 90.0".into()));
    }

    #[test]
    fn test_custom_functions() {
        let host = RhaiScriptHost::with_functions("fn double(x) { x * 2 }").unwrap();
        let out = host.evaluate("double(21)", scope(&[])).unwrap();
        assert_eq!(out.value, CellValue::Number(42.0));

        let err = RhaiScriptHost::with_functions("fn broken( {").unwrap_err();
        assert!(err.starts_with("Error in custom functions:"));
    }

    #[test]
    fn test_runaway_script_is_stopped() {
        let host = RhaiScriptHost::new();
        assert!(host.evaluate("loop {}", scope(&[])).is_err());
    }
}
