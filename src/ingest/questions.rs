//! Question bank ingestion: up to six level files for one round.
//!
//! Two validation tiers:
//!   - request-fatal: bad round, no files, unparseable CSV. Nothing is inserted.
//!   - row-scoped: a row with a blank option or an unknown answer letter is
//!     skipped and logged, never reported as an error.
//!
//! Every file is parsed and validated before the first batch reaches the
//! store. Each file's batch is then inserted independently, so a store
//! failure on a later file leaves earlier batches committed.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::domain::{Level, LevelLabel, NewQuestion, OptionLabel, Options, Round};
use crate::error::{QuizError, QuizResult};
use crate::normalize::{parse_rows, CanonicalRow, FieldSpec};
use crate::store::QuizStore;

/// Uploaded files keyed by their field name. Iteration order is processing order.
pub type QuestionSources = BTreeMap<LevelLabel, Vec<u8>>;

/// One CSV row projected onto the canonical question fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuestionRow {
  pub question: String,
  pub a: String,
  pub b: String,
  pub c: String,
  pub d: String,
  pub answer: String,
  pub points: String,
}

impl CanonicalRow for QuestionRow {
  const FIELDS: &'static [FieldSpec] = &[
    FieldSpec { canonical: "question", aliases: &["question", "q"] },
    FieldSpec { canonical: "A", aliases: &["a", "optiona"] },
    FieldSpec { canonical: "B", aliases: &["b", "optionb"] },
    FieldSpec { canonical: "C", aliases: &["c", "optionc"] },
    FieldSpec { canonical: "D", aliases: &["d", "optiond"] },
    FieldSpec { canonical: "answer", aliases: &["answer", "correct"] },
    FieldSpec { canonical: "points", aliases: &["points", "score"] },
  ];

  fn from_fields(values: Vec<String>) -> Self {
    let mut it = values.into_iter();
    let mut next = || it.next().unwrap_or_default();
    QuestionRow {
      question: next(),
      a: next(),
      b: next(),
      c: next(),
      d: next(),
      answer: next(),
      points: next(),
    }
  }
}

impl QuestionRow {
  /// Row-level validation. The error is a short reason used for logging only.
  pub fn into_question(self, round: Round, level: Level) -> Result<NewQuestion, &'static str> {
    if self.question.is_empty() {
      return Err("question text is empty");
    }
    if [&self.a, &self.b, &self.c, &self.d].iter().any(|o| o.is_empty()) {
      return Err("an option is empty");
    }
    let answer = OptionLabel::parse(&self.answer).ok_or("answer is not one of A, B, C, D")?;
    Ok(NewQuestion {
      round,
      level,
      text: self.question,
      options: Options { a: self.a, b: self.b, c: self.c, d: self.d },
      answer,
      points: parse_points(&self.points),
    })
  }
}

/// Points default to 1 when blank, non-numeric or non-finite.
pub fn parse_points(raw: &str) -> f64 {
  raw.trim()
    .parse::<f64>()
    .ok()
    .filter(|p| p.is_finite())
    .unwrap_or(1.0)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct QuestionIngestReport {
  /// Records actually persisted across all files.
  pub inserted: usize,
  /// Persisted count per level. Files resolving to the same level are summed.
  pub levels: BTreeMap<u8, usize>,
}

pub struct QuestionIngest {
  store: Arc<dyn QuizStore>,
}

impl QuestionIngest {
  pub fn new(store: Arc<dyn QuizStore>) -> Self {
    Self { store }
  }

  #[instrument(level = "info", skip(self, round, sources), fields(%round, files = sources.len()))]
  pub async fn ingest(&self, round: &str, sources: QuestionSources) -> QuizResult<QuestionIngestReport> {
    let round = Round::parse(round)?;
    if sources.is_empty() {
      return Err(QuizError::NoSourceProvided);
    }

    let mut batches = Vec::with_capacity(sources.len());
    for (label, bytes) in &sources {
      let rows = parse_rows::<QuestionRow>(bytes).map_err(|e| tag_source(*label, e))?;
      let level = label.level();
      let total = rows.len();
      let batch: Vec<NewQuestion> = rows
        .enumerate()
        .filter_map(|(idx, row)| match row.into_question(round, level) {
          Ok(q) => Some(q),
          Err(reason) => {
            // Row numbers are 1-based after the header line.
            debug!(target: "ingest", file = label.as_str(), row = idx + 1, reason, "Skipping invalid question row");
            None
          }
        })
        .collect();
      debug!(target: "ingest", file = label.as_str(), total, valid = batch.len(), "Question file validated");
      batches.push((*label, batch));
    }

    let mut report = QuestionIngestReport::default();
    for (label, batch) in batches {
      let level = label.level();
      let valid = batch.len();
      let inserted = if batch.is_empty() { 0 } else { self.store.insert_questions(batch).await? };
      *report.levels.entry(level.get()).or_insert(0) += inserted;
      report.inserted += inserted;
      info!(target: "ingest", %round, file = label.as_str(), %level, valid, inserted, "Question batch stored");
    }

    info!(target: "ingest", %round, inserted = report.inserted, "Question upload processed");
    Ok(report)
  }
}

fn tag_source(label: LevelLabel, e: QuizError) -> QuizError {
  match e {
    QuizError::MalformedInput(msg) => QuizError::MalformedInput(format!("{}: {msg}", label.as_str())),
    other => other,
  }
}
