//! Line-oriented input form for the terminal front end.
//!
//! Prompts for each clinical indicator in catalog order. A blank answer
//! leaves the field unset; anything that is not a finite number is asked
//! again, so malformed text never reaches the inference engine.

use crate::error::{MissingFeaturesError, PredictError};
use crate::feature_catalog::FeatureCatalog;
use crate::types::prediction::{RiskPrediction, CAPTION, DISCLAIMER, INSTRUCTIONS, TITLE};
use crate::types::record::InputRecord;
use std::io::{self, BufRead, Write};

/// What a single submission produced
pub enum Submission {
    Scored(RiskPrediction),
    Rejected(MissingFeaturesError),
}

impl Submission {
    /// Split a prediction result into user-facing outcomes and fatal errors
    pub fn from_result(result: Result<RiskPrediction, PredictError>) -> Result<Self, PredictError> {
        match result {
            Ok(prediction) => Ok(Submission::Scored(prediction)),
            Err(PredictError::MissingFeatures(missing)) => Ok(Submission::Rejected(missing)),
            Err(e) => Err(e),
        }
    }
}

pub struct TerminalForm<R, W> {
    input: R,
    output: W,
    show_inputs: bool,
}

impl<R: BufRead, W: Write> TerminalForm<R, W> {
    pub fn new(input: R, output: W, show_inputs: bool) -> Self {
        Self {
            input,
            output,
            show_inputs,
        }
    }

    pub fn print_header(&mut self) -> io::Result<()> {
        writeln!(self.output, "{}", TITLE)?;
        writeln!(self.output, "{}", CAPTION)?;
        writeln!(self.output)?;
        writeln!(self.output, "{}", INSTRUCTIONS)?;
        writeln!(self.output, "Leave a field blank to skip it; end input to quit.")
    }

    pub fn print_footer(&mut self) -> io::Result<()> {
        writeln!(self.output, "---")?;
        writeln!(self.output, "{}", DISCLAIMER)
    }

    /// Collect one record. Returns `None` once input is exhausted before
    /// any field was answered.
    pub fn read_record(&mut self, catalog: &FeatureCatalog) -> io::Result<Option<InputRecord>> {
        writeln!(self.output)?;
        writeln!(self.output, "Input variables")?;

        let mut record = InputRecord::new();
        let mut answered = false;

        for display in catalog.display_names() {
            match self.read_value(display)? {
                Some(Answer::Value(value)) => {
                    record.set(display, value);
                    answered = true;
                }
                Some(Answer::Blank) => {
                    record.unset(display);
                    answered = true;
                }
                None if !answered => return Ok(None),
                None => record.unset(display),
            }
        }

        Ok(Some(record))
    }

    fn read_value(&mut self, display: &str) -> io::Result<Option<Answer>> {
        loop {
            write!(self.output, "{}: ", display)?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output)?;
                return Ok(None);
            }

            let text = line.trim();
            if text.is_empty() {
                return Ok(Some(Answer::Blank));
            }
            match text.parse::<f64>() {
                Ok(value) if value.is_finite() => return Ok(Some(Answer::Value(value))),
                _ => writeln!(self.output, "  Please enter a number, or leave blank.")?,
            }
        }
    }

    /// Render the prediction headline (and input table) or the warning
    pub fn render(&mut self, submission: &Submission) -> io::Result<()> {
        writeln!(self.output)?;
        writeln!(self.output, "Prediction")?;
        match submission {
            Submission::Scored(prediction) => {
                writeln!(self.output, "{}", prediction.headline())?;
                if self.show_inputs {
                    writeln!(self.output, "---")?;
                    write!(self.output, "{}", prediction.input_table())?;
                }
            }
            Submission::Rejected(missing) => writeln!(self.output, "WARNING: {}", missing)?,
        }
        Ok(())
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

enum Answer {
    Value(f64),
    Blank,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_catalog::FEATURE_COUNT;
    use crate::types::record::ScoredInput;
    use std::io::Cursor;

    fn form(input: &str) -> TerminalForm<Cursor<Vec<u8>>, Vec<u8>> {
        TerminalForm::new(Cursor::new(input.as_bytes().to_vec()), Vec::new(), true)
    }

    #[test]
    fn test_reads_full_record() {
        let catalog = FeatureCatalog::new();
        let answers: String = (1..=FEATURE_COUNT).map(|i| format!("{}.5\n", i)).collect();
        let mut form = form(&answers);

        let record = form.read_record(&catalog).unwrap().unwrap();
        assert_eq!(record.value("Carcinoembryonic antigen (CEA)"), Some(1.5));
        assert_eq!(record.value("Total bilirubin"), Some(10.5));
        assert!(catalog.missing(&record).is_empty());
    }

    #[test]
    fn test_blank_and_invalid_answers() {
        let catalog = FeatureCatalog::new();
        // CEA blank, cholesterol retried twice, rest filled
        let mut answers = String::from("\nabc\nnan\n4.2\n");
        answers.push_str(&"1\n".repeat(FEATURE_COUNT - 2));
        let mut form = form(&answers);

        let record = form.read_record(&catalog).unwrap().unwrap();
        assert_eq!(catalog.missing(&record), vec!["Carcinoembryonic antigen (CEA)".to_string()]);
        assert_eq!(record.value("Total cholesterol"), Some(4.2));

        let output = String::from_utf8(form.into_output()).unwrap();
        assert_eq!(output.matches("Please enter a number").count(), 2);
    }

    #[test]
    fn test_eof_mid_form_leaves_rest_unset() {
        let catalog = FeatureCatalog::new();
        let mut form = form("1\n2\n");

        let record = form.read_record(&catalog).unwrap().unwrap();
        assert_eq!(catalog.missing(&record).len(), FEATURE_COUNT - 2);
        assert!(form.read_record(&catalog).unwrap().is_none());
    }

    #[test]
    fn test_render_outcomes() {
        let mut form = form("");
        let prediction = RiskPrediction::new(0.5, ScoredInput::new([2.0; FEATURE_COUNT]));
        form.render(&Submission::Scored(prediction)).unwrap();
        form.render(&Submission::Rejected(MissingFeaturesError::new(vec![
            "Calcium".to_string(),
            "Hemoglobin".to_string(),
        ])))
        .unwrap();

        let output = String::from_utf8(form.into_output()).unwrap();
        assert!(output.contains("Predicted risk probability: 50.00%"));
        assert!(output.contains("Input values used for prediction:"));
        assert!(output.contains("WARNING: The following variables are missing: Calcium, Hemoglobin"));
    }

    #[test]
    fn test_submission_keeps_fatal_errors() {
        let err = PredictError::Scoring(crate::error::ScoringError::ClassCount(3));
        assert!(Submission::from_result(Err(err)).is_err());

        let missing = PredictError::MissingFeatures(MissingFeaturesError::new(vec![]));
        assert!(matches!(
            Submission::from_result(Err(missing)),
            Ok(Submission::Rejected(_))
        ));
    }
}
