//! CSV normalizer: raw upload bytes -> typed rows keyed by canonical field.
//!
//! Spreadsheets in the wild name their columns differently ("Answer",
//! "correct", "optionA", ...). Each row type declares a static alias table;
//! headers are matched case-insensitively once per parse and every record is
//! then projected onto the canonical fields. A field with no matching header
//! reads as an empty string; deciding whether that invalidates the row is the
//! caller's job.
//!
//! Empty and whitespace-only lines are not records. Structure problems (bad
//! UTF-8, unbalanced quotes, ragged records) fail the whole parse; no partial
//! result is ever returned.

use std::marker::PhantomData;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, instrument};

use crate::error::{QuizError, QuizResult};

/// One canonical field and the header spellings that feed it, in preference order.
#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub canonical: &'static str,
    /// Lowercase; compared against lowercased, trimmed headers.
    pub aliases: &'static [&'static str],
}

/// A row shape produced by the normalizer.
pub trait CanonicalRow: Sized {
    const FIELDS: &'static [FieldSpec];

    /// `values` holds one trimmed string per entry of `FIELDS`, in the same order.
    fn from_fields(values: Vec<String>) -> Self;
}

/// Parsed upload. Records are validated eagerly; rows are built on iteration.
#[derive(Debug)]
pub struct Rows<R> {
    records: std::vec::IntoIter<StringRecord>,
    columns: Vec<Option<usize>>,
    _row: PhantomData<R>,
}

impl<R> Rows<R> {
    /// Canonical fields that no header matched.
    pub fn missing_fields(&self) -> Vec<&'static str>
    where
        R: CanonicalRow,
    {
        R::FIELDS
            .iter()
            .zip(&self.columns)
            .filter(|(_, col)| col.is_none())
            .map(|(f, _)| f.canonical)
            .collect()
    }
}

impl<R: CanonicalRow> Iterator for Rows<R> {
    type Item = R;

    fn next(&mut self) -> Option<R> {
        let record = self.records.next()?;
        let values = self
            .columns
            .iter()
            .map(|col| {
                col.and_then(|i| record.get(i))
                    .map(|v| v.trim().to_string())
                    .unwrap_or_default()
            })
            .collect();
        Some(R::from_fields(values))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

impl<R: CanonicalRow> ExactSizeIterator for Rows<R> {}

#[instrument(level = "debug", skip(bytes), fields(bytes = bytes.len()))]
pub fn parse_rows<R: CanonicalRow>(bytes: &[u8]) -> QuizResult<Rows<R>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| QuizError::MalformedInput(format!("upload is not valid UTF-8: {e}")))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    // Escaped quotes come in pairs, so an odd count means a quote never closed.
    if text.bytes().filter(|b| *b == b'"').count() % 2 == 1 {
        return Err(QuizError::MalformedInput("unbalanced quotes".into()));
    }

    // Width is checked by hand so that whitespace-only lines can be dropped first.
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers().map_err(malformed)?.clone();
    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(malformed)?;
        if is_blank(&record) {
            continue;
        }
        if record.len() != headers.len() {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            return Err(QuizError::MalformedInput(format!(
                "line {line}: expected {} fields, found {}",
                headers.len(),
                record.len()
            )));
        }
        records.push(record);
    }

    let columns = resolve_columns(R::FIELDS, &headers);
    debug!(target: "ingest", headers = ?headers, rows = records.len(), "CSV parsed");

    Ok(Rows {
        records: records.into_iter(),
        columns,
        _row: PhantomData,
    })
}

/// A line holding nothing but whitespace parses as one empty field.
fn is_blank(record: &StringRecord) -> bool {
    record.len() == 1 && record.get(0).map_or(true, str::is_empty)
}

fn resolve_columns(fields: &[FieldSpec], headers: &StringRecord) -> Vec<Option<usize>> {
    let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
    fields
        .iter()
        .map(|field| {
            field
                .aliases
                .iter()
                .find_map(|alias| normalized.iter().position(|h| h == alias))
        })
        .collect()
}

fn malformed(e: csv::Error) -> QuizError {
    QuizError::MalformedInput(e.to_string())
}
