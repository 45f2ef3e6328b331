//! Decoding of the worker's line-oriented output into highlight calls.

use memchr::memchr_iter;

use crate::kernel::highlight::{BufferId, CallBatch, GroupTable, KindTag, LineSpan};

/// Longest identifier the worker may report, in bytes.
pub const MAX_IDENT_LEN: usize = 1023;

const FIELD_COUNT: usize = 7;

/// One `kind\tstartLine\tstartCol\tendLine\tendCol\tidentLen\tident` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerRecord<'a> {
    pub kind: KindTag,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
    pub ident: &'a str,
}

impl<'a> WorkerRecord<'a> {
    /// Strict decode; `None` for anything that is not exactly seven fields.
    pub fn parse(line: &'a str) -> Option<Self> {
        let mut fields = line.splitn(FIELD_COUNT, '\t');

        let kind = single_char(fields.next()?)?;
        let start_line = fields.next()?.parse().ok()?;
        let start_col = fields.next()?.parse().ok()?;
        let end_line = fields.next()?.parse().ok()?;
        let end_col = fields.next()?.parse().ok()?;
        let ident_len: usize = fields.next()?.parse().ok()?;
        let ident = bounded_ident(fields.next()?, ident_len)?;

        Some(Self {
            kind: KindTag::from(kind),
            start_line,
            start_col,
            end_line,
            end_col,
            ident,
        })
    }

    pub fn span(&self) -> LineSpan {
        LineSpan::new(self.start_line, self.start_col, self.end_col)
    }
}

fn single_char(field: &str) -> Option<char> {
    let mut chars = field.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Some(ch),
        _ => None,
    }
}

fn bounded_ident(raw: &str, ident_len: usize) -> Option<&str> {
    let word_end = raw.find(char::is_whitespace).unwrap_or(raw.len());
    let limit = word_end.min(MAX_IDENT_LEN).min(ident_len);
    let ident = raw.get(..limit)?;
    if ident.is_empty() {
        return None;
    }
    Some(ident)
}

/// Split a payload into non-empty records, sorted by full record text.
pub fn split_and_sort(payload: &str) -> Vec<&str> {
    let bytes = payload.as_bytes();
    let mut records = Vec::new();
    let mut start = 0;
    for end in memchr_iter(b'\n', bytes) {
        push_record(&mut records, &payload[start..end]);
        start = end + 1;
    }
    push_record(&mut records, &payload[start..]);

    records.sort_unstable();
    records
}

fn push_record<'a>(records: &mut Vec<&'a str>, raw: &'a str) {
    let record = raw.strip_suffix('\r').unwrap_or(raw);
    if !record.is_empty() {
        records.push(record);
    }
}

/// Append an Add call for every usable record. Returns the number appended.
pub fn parse_worker_output(
    payload: &str,
    table: &GroupTable,
    buffer: BufferId,
    namespace: i64,
    batch: &mut CallBatch,
) -> usize {
    let mut emitted = 0;

    for line in split_and_sort(payload) {
        let Some(record) = WorkerRecord::parse(line) else {
            tracing::trace!(buffer = %buffer, record = line, "skipping malformed worker record");
            continue;
        };
        if table.is_ignored(record.ident) {
            continue;
        }
        if let Some(group) = table.find_group(record.kind) {
            batch.add_highlight(buffer, namespace, group, record.span());
            emitted += 1;
        }
    }

    emitted
}

#[cfg(test)]
#[path = "../../../../../tests/unit/kernel/services/adapters/worker/parse.rs"]
mod tests;
