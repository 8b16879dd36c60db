//! The grid evaluation engine.
//!
//! A [`Sheet`] owns the raw text matrix and the per-cell evaluation state.
//! Every cell is `Unevaluated`, `Evaluating` or `Evaluated(value)` within a
//! pass; lookups evaluate on demand and memoize for the rest of the pass.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::range::{CellRange, SequenceMode};
use super::{CellRef, CellValue, EvalError};
use crate::script::{AudioEvent, RhaiScriptHost, ScriptHost};

/// Tempo in BPM used when nothing else is configured.
pub const DEFAULT_TEMPO: f64 = 120.0;

/// Bound on re-running a pass after scripts wrote raw cells.
pub const MAX_SCRIPT_PASSES: usize = 8;

/// Global playback settings visible to formulas and scripts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EvalContext {
    /// Beats per minute; the default for `METRONOME()`.
    pub tempo: f64,
    /// Current playback time in seconds; read by `TIME()`.
    pub time: f64,
}

impl Default for EvalContext {
    fn default() -> Self {
        EvalContext {
            tempo: DEFAULT_TEMPO,
            time: 0.0,
        }
    }
}

#[derive(Clone, Debug)]
enum Slot {
    Unevaluated,
    Evaluating,
    Evaluated(CellValue),
}

pub struct Sheet {
    raw: Vec<Vec<String>>,
    slots: Vec<Vec<Slot>>,
    context: EvalContext,
    script_host: Arc<dyn ScriptHost>,
    pub(crate) pending_writes: Vec<(CellRef, String)>,
    pub(crate) audio_events: Vec<AudioEvent>,
}

impl Sheet {
    /// An empty `rows` x `cols` sheet with the default Rhai script host.
    pub fn new(rows: usize, cols: usize) -> Sheet {
        Sheet::with_script_host(rows, cols, Arc::new(RhaiScriptHost::new()))
    }

    pub fn with_script_host(rows: usize, cols: usize, script_host: Arc<dyn ScriptHost>) -> Sheet {
        let mut sheet = Sheet {
            raw: Vec::new(),
            slots: Vec::new(),
            context: EvalContext::default(),
            script_host,
            pending_writes: Vec::new(),
            audio_events: Vec::new(),
        };
        sheet.initialize(rows, cols);
        sheet
    }

    /// Reset to an empty grid of the given shape and default context.
    pub fn initialize(&mut self, rows: usize, cols: usize) {
        self.raw = vec![vec![String::new(); cols]; rows];
        self.slots = vec![vec![Slot::Unevaluated; cols]; rows];
        self.context = EvalContext::default();
        self.pending_writes.clear();
    }

    pub fn set_script_host(&mut self, script_host: Arc<dyn ScriptHost>) {
        self.script_host = script_host;
    }

    pub(crate) fn script_host(&self) -> Arc<dyn ScriptHost> {
        Arc::clone(&self.script_host)
    }

    pub fn rows(&self) -> usize {
        self.raw.len()
    }

    pub fn cols(&self) -> usize {
        self.raw.first().map_or(0, Vec::len)
    }

    pub fn context(&self) -> EvalContext {
        self.context
    }

    pub fn tempo(&self) -> f64 {
        self.context.tempo
    }

    pub fn set_tempo(&mut self, tempo: f64) {
        self.context.tempo = tempo;
    }

    pub fn time(&self) -> f64 {
        self.context.time
    }

    pub fn set_time(&mut self, time: f64) {
        self.context.time = time;
    }

    pub fn raw_grid(&self) -> &[Vec<String>] {
        &self.raw
    }

    fn check_bounds(&self, cell: CellRef) -> Result<(), EvalError> {
        if cell.row < self.rows() && cell.col < self.cols() {
            Ok(())
        } else {
            Err(EvalError::OutOfBounds(cell))
        }
    }

    pub fn raw_value(&self, cell: CellRef) -> Option<&str> {
        self.raw
            .get(cell.row)
            .and_then(|row| row.get(cell.col))
            .map(String::as_str)
    }

    /// Overwrite one raw cell. Evaluation state is left alone until the next
    /// pass or lookup.
    pub fn set_raw(&mut self, cell: CellRef, text: impl Into<String>) -> Result<(), EvalError> {
        self.check_bounds(cell)?;
        self.raw[cell.row][cell.col] = text.into();
        self.slots[cell.row][cell.col] = Slot::Unevaluated;
        Ok(())
    }

    /// Replace the whole grid. Ragged rows are padded with empty strings to
    /// the widest row. Time resets to 0; tempo is kept.
    pub fn replace_grid(&mut self, rows: Vec<Vec<String>>, evaluate: bool) {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        self.raw = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        self.slots = vec![vec![Slot::Unevaluated; width]; self.raw.len()];
        self.context.time = 0.0;
        self.pending_writes.clear();
        debug!(rows = self.rows(), cols = width, "grid replaced");

        if evaluate {
            self.evaluate_all_cells();
        }
    }

    /// Recompute every cell from scratch. Raw writes made by scripts are
    /// applied after the pass, and the pass repeats while they change the
    /// grid, up to [`MAX_SCRIPT_PASSES`] times.
    pub fn evaluate_all_cells(&mut self) {
        for pass in 1..=MAX_SCRIPT_PASSES {
            self.run_pass();
            if !self.apply_script_writes() {
                debug!(pass, "evaluation settled");
                return;
            }
            debug!(pass, "script writes changed the grid; re-evaluating");
        }
        warn!(
            passes = MAX_SCRIPT_PASSES,
            "script writes did not settle; evaluating once more and dropping further writes"
        );
        self.run_pass();
        self.pending_writes.clear();
    }

    /// One pass in row-major order. A cell already evaluated on demand earlier
    /// in the pass keeps that value, so each cell yields one value (and one
    /// trigger bus) per pass and each script runs once.
    fn run_pass(&mut self) {
        for row in self.slots.iter_mut() {
            row.fill(Slot::Unevaluated);
        }
        for row in 0..self.rows() {
            for col in 0..self.cols() {
                let cell = CellRef::new(row, col);
                if !matches!(self.slots[row][col], Slot::Evaluated(_)) {
                    self.compute(cell);
                }
            }
        }
    }

    /// Apply queued script writes; true if any raw text changed.
    fn apply_script_writes(&mut self) -> bool {
        let mut changed = false;
        for (cell, text) in std::mem::take(&mut self.pending_writes) {
            match self.raw_value(cell) {
                Some(current) if current == text => {}
                Some(_) => {
                    debug!(cell = %cell, text = %text, "applying script write");
                    self.raw[cell.row][cell.col] = text;
                    changed = true;
                }
                None => warn!(cell = %cell, "script wrote outside the grid; ignored"),
            }
        }
        changed
    }

    /// Evaluate one cell and store its value, whether or not it was already
    /// evaluated.
    pub fn evaluate_cell(&mut self, cell: CellRef) -> Result<(), EvalError> {
        self.check_bounds(cell)?;
        self.compute(cell);
        Ok(())
    }

    fn compute(&mut self, cell: CellRef) -> CellValue {
        self.slots[cell.row][cell.col] = Slot::Evaluating;
        let raw = self.raw[cell.row][cell.col].clone();

        let value = if let Some(body) = raw.strip_prefix('=') {
            match self.evaluate_formula(body, cell, 0) {
                Ok(value) => value,
                Err(err) => {
                    trace!(cell = %cell, error = %err, "formula failed");
                    CellValue::Error(err.into())
                }
            }
        } else if raw.is_empty() {
            CellValue::Null
        } else {
            CellValue::String(raw)
        };

        trace!(cell = %cell, value = value.type_name(), "evaluated");
        self.slots[cell.row][cell.col] = Slot::Evaluated(value.clone());
        value
    }

    /// Value of `cell` in the current pass, evaluating it on first use.
    pub fn get_evaluated_cell_value(&mut self, cell: CellRef) -> Result<CellValue, EvalError> {
        self.check_bounds(cell)?;
        match &self.slots[cell.row][cell.col] {
            Slot::Evaluated(value) => Ok(value.clone()),
            Slot::Evaluating => Err(EvalError::CircularReference(cell)),
            Slot::Unevaluated => Ok(self.compute(cell)),
        }
    }

    /// Like [`get_evaluated_cell_value`](Self::get_evaluated_cell_value) for
    /// an address written as text, e.g. `"B3"`.
    pub fn get_evaluated_cell_value_text(&mut self, address: &str) -> Result<CellValue, EvalError> {
        let cell = CellRef::from_str(address)
            .ok_or_else(|| EvalError::InvalidAddress(address.to_string()))?;
        self.get_evaluated_cell_value(cell)
    }

    /// The stored value of `cell` if it has been evaluated in this pass.
    pub fn evaluated(&self, cell: CellRef) -> Option<&CellValue> {
        match self.slots.get(cell.row)?.get(cell.col)? {
            Slot::Evaluated(value) => Some(value),
            Slot::Unevaluated | Slot::Evaluating => None,
        }
    }

    /// Read `range` in `mode` order, coercing each cell to a number.
    /// Non-numeric cells read as `None`.
    pub fn extract_range(
        &mut self,
        range: CellRange,
        mode: SequenceMode,
    ) -> Result<Vec<Option<f64>>, EvalError> {
        range
            .cells(mode)
            .into_iter()
            .map(|cell| Ok(self.get_evaluated_cell_value(cell)?.coerce_number()))
            .collect()
    }

    /// Evaluate a formula that is not stored in the grid. A leading `=` is
    /// optional. References are read from the current pass.
    pub fn evaluate_formula_text(&mut self, input: &str) -> CellValue {
        let body = input.strip_prefix('=').unwrap_or(input);
        let value = match self.evaluate_formula(body, CellRef::new(0, 0), 0) {
            Ok(value) => value,
            Err(err) => CellValue::Error(err.into()),
        };
        self.pending_writes.clear();
        value
    }

    /// Drain the audio side effects scripts emitted since the last call.
    pub fn take_audio_events(&mut self) -> Vec<AudioEvent> {
        std::mem::take(&mut self.audio_events)
    }
}
