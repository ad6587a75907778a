//! Domain models: rounds, levels, questions, participants and score patches.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::QuizError;

/// Competition stage a question belongs to (1..=4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Round(u8);

impl Round {
  pub const ALL: [Round; 4] = [Round(1), Round(2), Round(3), Round(4)];

  pub fn new(n: u8) -> Result<Self, QuizError> {
    if (1..=4).contains(&n) { Ok(Round(n)) } else { Err(QuizError::InvalidRound(n.to_string())) }
  }

  /// Lenient parse of a request parameter: surrounding whitespace is ignored and
  /// integral decimals such as "2.0" are accepted.
  pub fn parse(raw: &str) -> Result<Self, QuizError> {
    parse_small_int(raw)
      .and_then(|n| Round::new(n).ok())
      .ok_or_else(|| QuizError::InvalidRound(raw.to_string()))
  }

  pub fn get(self) -> u8 { self.0 }
}

impl TryFrom<u8> for Round {
  type Error = QuizError;
  fn try_from(n: u8) -> Result<Self, Self::Error> { Round::new(n) }
}

impl From<Round> for u8 {
  fn from(r: Round) -> u8 { r.0 }
}

impl fmt::Display for Round {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Difficulty tier within a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Level {
  Low = 1,
  Medium = 2,
  High = 3,
}

impl Level {
  pub fn new(n: u8) -> Result<Self, QuizError> {
    match n {
      1 => Ok(Level::Low),
      2 => Ok(Level::Medium),
      3 => Ok(Level::High),
      other => Err(QuizError::InvalidLevel(other.to_string())),
    }
  }

  pub fn parse(raw: &str) -> Result<Self, QuizError> {
    parse_small_int(raw)
      .and_then(|n| Level::new(n).ok())
      .ok_or_else(|| QuizError::InvalidLevel(raw.to_string()))
  }

  pub fn get(self) -> u8 { self as u8 }
}

impl TryFrom<u8> for Level {
  type Error = QuizError;
  fn try_from(n: u8) -> Result<Self, Self::Error> { Level::new(n) }
}

impl From<Level> for u8 {
  fn from(l: Level) -> u8 { l as u8 }
}

impl fmt::Display for Level {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.get()) }
}

/// Name of an uploaded question file. Two vocabularies map onto the same levels.
/// Variant order is the processing order of an upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LevelLabel {
  Level1,
  Level2,
  Level3,
  Low,
  Medium,
  High,
}

impl LevelLabel {
  pub const ALL: [LevelLabel; 6] = [
    LevelLabel::Level1,
    LevelLabel::Level2,
    LevelLabel::Level3,
    LevelLabel::Low,
    LevelLabel::Medium,
    LevelLabel::High,
  ];

  pub fn from_field_name(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|l| l.as_str() == name)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      LevelLabel::Level1 => "level1",
      LevelLabel::Level2 => "level2",
      LevelLabel::Level3 => "level3",
      LevelLabel::Low => "low",
      LevelLabel::Medium => "medium",
      LevelLabel::High => "high",
    }
  }

  pub fn level(self) -> Level {
    match self {
      LevelLabel::Level1 | LevelLabel::Low => Level::Low,
      LevelLabel::Level2 | LevelLabel::Medium => Level::Medium,
      LevelLabel::Level3 | LevelLabel::High => Level::High,
    }
  }
}

/// Fixed choice labels of a multiple-choice question.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionLabel {
  A,
  B,
  C,
  D,
}

impl OptionLabel {
  /// Case-insensitive; surrounding whitespace ignored.
  pub fn parse(raw: &str) -> Option<Self> {
    match raw.trim().to_ascii_uppercase().as_str() {
      "A" => Some(OptionLabel::A),
      "B" => Some(OptionLabel::B),
      "C" => Some(OptionLabel::C),
      "D" => Some(OptionLabel::D),
      _ => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      OptionLabel::A => "A",
      OptionLabel::B => "B",
      OptionLabel::C => "C",
      OptionLabel::D => "D",
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Options {
  #[serde(rename = "A")] pub a: String,
  #[serde(rename = "B")] pub b: String,
  #[serde(rename = "C")] pub c: String,
  #[serde(rename = "D")] pub d: String,
}

impl Options {
  pub fn get(&self, label: OptionLabel) -> &str {
    match label {
      OptionLabel::A => &self.a,
      OptionLabel::B => &self.b,
      OptionLabel::C => &self.c,
      OptionLabel::D => &self.d,
    }
  }
}

/// A question that passed row validation and awaits insertion.
#[derive(Clone, Debug, PartialEq)]
pub struct NewQuestion {
  pub round: Round,
  pub level: Level,
  pub text: String,
  pub options: Options,
  pub answer: OptionLabel,
  pub points: f64,
}

impl NewQuestion {
  /// Record-level constraints every store enforces on insert.
  pub fn constraint_violation(&self) -> Option<&'static str> {
    if self.text.trim().is_empty() {
      return Some("question text is empty");
    }
    if [OptionLabel::A, OptionLabel::B, OptionLabel::C, OptionLabel::D]
      .iter()
      .any(|l| self.options.get(*l).trim().is_empty())
    {
      return Some("option text is empty");
    }
    if !self.points.is_finite() || self.points < 0.0 {
      return Some("points must be a non-negative number");
    }
    None
  }
}

/// Persisted question.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  pub id: Uuid,
  pub round: Round,
  pub level: Level,
  #[serde(rename = "question")]
  pub text: String,
  pub options: Options,
  #[serde(rename = "answer")]
  pub correct_label: OptionLabel,
  pub points: f64,
  pub created_at: DateTime<Utc>,
}

/// Input for creating a participant; the password is already hashed.
#[derive(Clone, Debug)]
pub struct NewParticipant {
  pub registration_id: String,
  pub password_hash: String,
}

/// Persisted participant. The hash is never serialized.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
  pub id: Uuid,
  pub registration_id: String,
  #[serde(skip_serializing)]
  pub password_hash: String,
  pub score: f64,
  pub correct_count: f64,
  pub wrong_count: f64,
  pub created_at: DateTime<Utc>,
}

pub const REGISTRATION_ID_MIN: usize = 3;
pub const REGISTRATION_ID_MAX: usize = 64;

/// True when an already-trimmed registration id fits the allowed length.
pub fn registration_id_in_bounds(id: &str) -> bool {
  (REGISTRATION_ID_MIN..=REGISTRATION_ID_MAX).contains(&id.chars().count())
}

/// Sparse score update: `None` leaves the stored value untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScorePatch {
  pub score: Option<f64>,
  pub correct_count: Option<f64>,
  pub wrong_count: Option<f64>,
}

impl ScorePatch {
  pub fn is_empty(&self) -> bool {
    self.score.is_none() && self.correct_count.is_none() && self.wrong_count.is_none()
  }

  pub fn apply(&self, p: &mut Participant) {
    if let Some(s) = self.score { p.score = s; }
    if let Some(c) = self.correct_count { p.correct_count = c; }
    if let Some(w) = self.wrong_count { p.wrong_count = w; }
  }
}

fn parse_small_int(raw: &str) -> Option<u8> {
  let n: f64 = raw.trim().parse().ok()?;
  if n.fract() == 0.0 && (0.0..=255.0).contains(&n) { Some(n as u8) } else { None }
}
