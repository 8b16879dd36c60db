use super::Document;
use crate::error::{BeatsheetError, Result};
use beatsheet_engine::engine::{CellRef, CellValue, format_value};
use beatsheet_engine::script::AudioEvent;
use tracing::debug;

impl Document {
    /// Set cell contents from input string, then re-evaluate the sheet.
    pub fn set_cell_from_input(&mut self, cell_ref: CellRef, input: &str) -> Result<()> {
        self.sheet.set_raw(cell_ref, input)?;
        self.modified = true;
        debug!(cell = %cell_ref, "cell edited");
        self.recalculate();
        Ok(())
    }

    /// Clear the specified cell
    pub fn clear_cell(&mut self, cell_ref: &CellRef) -> Result<()> {
        if self.sheet.raw_value(*cell_ref).is_some_and(str::is_empty) {
            return Ok(());
        }
        self.set_cell_from_input(*cell_ref, "")
    }

    /// Set the global tempo (BPM) and re-evaluate.
    pub fn set_tempo(&mut self, bpm: f64) -> Result<()> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(BeatsheetError::InvalidTempo(bpm));
        }
        self.sheet.set_tempo(bpm);
        self.modified = true;
        self.recalculate();
        Ok(())
    }

    /// Set the playback time. Values are not refreshed until
    /// [`recalculate`](Self::recalculate).
    pub fn set_time(&mut self, time: f64) {
        self.sheet.set_time(time);
    }

    /// Run one full evaluation pass.
    pub fn recalculate(&mut self) {
        self.sheet.evaluate_all_cells();
    }

    /// Replace the whole grid with `rows` (ragged rows are padded).
    pub fn replace_grid(&mut self, rows: Vec<Vec<String>>) -> Result<()> {
        if rows.is_empty() || rows.iter().all(Vec::is_empty) {
            return Err(BeatsheetError::InvalidGrid("grid has no cells".to_string()));
        }
        self.sheet.replace_grid(rows, true);
        self.modified = true;
        Ok(())
    }

    /// Evaluate a formula against the current sheet without storing it.
    /// A leading `=` is optional.
    pub fn eval_command(&mut self, input: &str) -> CellValue {
        self.sheet.evaluate_formula_text(input.trim())
    }

    /// Raw text of a cell, or `None` outside the grid.
    pub fn raw(&self, cell_ref: &CellRef) -> Option<&str> {
        self.sheet.raw_value(*cell_ref)
    }

    /// Evaluated value of a cell.
    pub fn value(&self, cell_ref: &CellRef) -> Option<&CellValue> {
        self.sheet.evaluated(*cell_ref)
    }

    /// Display string of a cell's evaluated value.
    pub fn display(&self, cell_ref: &CellRef) -> String {
        self.value(cell_ref).map(format_value).unwrap_or_default()
    }

    /// Audio events emitted by script cells since the last call.
    pub fn take_audio_events(&mut self) -> Vec<AudioEvent> {
        self.sheet.take_audio_events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DEFAULT_COLS, DEFAULT_ROWS};
    use beatsheet_engine::engine::{EvalError, StructuredCell};

    fn cell(address: &str) -> CellRef {
        CellRef::from_str(address).unwrap()
    }

    #[test]
    fn test_new_document_shape() {
        let doc = Document::new();
        assert_eq!(doc.sheet.rows(), DEFAULT_ROWS);
        assert_eq!(doc.sheet.cols(), DEFAULT_COLS);
        assert_eq!(doc.sheet.tempo(), 120.0);
        assert!(!doc.modified);
        assert_eq!(doc.display(&cell("A1")), "");
    }

    #[test]
    fn test_edit_triggers_pass() {
        let mut doc = Document::new();
        doc.set_cell_from_input(cell("A1"), "4").unwrap();
        doc.set_cell_from_input(cell("B1"), "=A1*2+1").unwrap();
        assert_eq!(doc.display(&cell("B1")), "9");

        doc.set_cell_from_input(cell("A1"), "10").unwrap();
        assert_eq!(doc.display(&cell("B1")), "21");
        assert!(doc.modified);
    }

    #[test]
    fn test_edit_out_of_bounds_is_rejected() {
        let mut doc = Document::new();
        let err = doc.set_cell_from_input(CellRef::new(DEFAULT_ROWS, 0), "1");
        assert!(matches!(
            err,
            Err(BeatsheetError::Reference(EvalError::OutOfBounds(_)))
        ));
    }

    #[test]
    fn test_clear_cell() {
        let mut doc = Document::new();
        doc.set_cell_from_input(cell("A1"), "5").unwrap();
        doc.set_cell_from_input(cell("A2"), "=A1+1").unwrap();
        doc.clear_cell(&cell("A1")).unwrap();
        assert_eq!(doc.raw(&cell("A1")), Some(""));
        assert_eq!(doc.display(&cell("A2")), "1");
    }

    #[test]
    fn test_tempo_drives_metronome() {
        let mut doc = Document::new();
        doc.set_cell_from_input(cell("A1"), "=METRONOME()").unwrap();
        doc.set_tempo(96.0).unwrap();
        match doc.value(&cell("A1")) {
            Some(CellValue::Structured(StructuredCell::Metronome(m))) => assert_eq!(m.bpm, 96.0),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(doc.set_tempo(0.0), Err(BeatsheetError::InvalidTempo(_))));
        assert!(doc.set_tempo(f64::NAN).is_err());
    }

    #[test]
    fn test_time_applies_on_recalculate() {
        let mut doc = Document::new();
        doc.set_cell_from_input(cell("A1"), "=TIME()").unwrap();
        doc.set_time(4.0);
        assert_eq!(doc.display(&cell("A1")), "TIME 0");
        doc.recalculate();
        assert_eq!(doc.display(&cell("A1")), "TIME 4");
    }

    #[test]
    fn test_replace_grid() {
        let mut doc = Document::new();
        doc.replace_grid(vec![
            vec!["1".into(), "2".into()],
            vec!["=A1+B1".into()],
        ])
        .unwrap();
        assert_eq!(doc.sheet.cols(), 2);
        assert_eq!(doc.raw(&cell("B2")), Some(""));
        assert_eq!(doc.display(&cell("A2")), "3");

        assert!(matches!(
            doc.replace_grid(Vec::new()),
            Err(BeatsheetError::InvalidGrid(_))
        ));
    }

    #[test]
    fn test_eval_command() {
        let mut doc = Document::new();
        doc.set_cell_from_input(cell("A1"), "6").unwrap();
        assert_eq!(doc.eval_command("=A1*7"), CellValue::Number(42.0));
        assert_eq!(doc.eval_command(" 2+3*4 "), CellValue::Number(14.0));
        assert!(doc.eval_command("10/0").is_error());
        assert_eq!(doc.raw(&cell("A1")), Some("6"));
    }

    #[test]
    fn test_script_side_effects() {
        let mut doc = Document::new();
        doc.set_cell_from_input(cell("A1"), "=JS(playNote(440, 0.25); setValue(\"B1\", \"hit\"))")
            .unwrap();
        assert_eq!(doc.raw(&cell("B1")), Some("hit"));
        let events = doc.take_audio_events();
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| matches!(
            e,
            AudioEvent::PlayNote { frequency, .. } if *frequency == 440.0
        )));
    }
}
