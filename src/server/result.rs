//! Query results as seen by the session layer.

use crate::bolt::{BoltResult, BoltValue};

use super::bookmark::Bookmark;

/// Receives the content of a [`QueryResult`] while it is being streamed.
pub trait RecordConsumer {
    /// Called once per record, in order.
    fn on_record(&mut self, values: &[BoltValue]) -> BoltResult<()>;

    /// Summary metadata produced by the result (statistics, bookmark, ...).
    fn on_metadata(&mut self, key: &str, value: BoltValue);
}

/// An open result. Streaming it drains it.
pub trait QueryResult: Send {
    /// Column names.
    fn field_names(&self) -> &[String];

    /// Feed all remaining records and summary metadata to `consumer`.
    fn accept(&mut self, consumer: &mut dyn RecordConsumer) -> BoltResult<()>;
}

/// Result with no fields and no records.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyResult;

impl QueryResult for EmptyResult {
    fn field_names(&self) -> &[String] {
        &[]
    }

    fn accept(&mut self, _consumer: &mut dyn RecordConsumer) -> BoltResult<()> {
        Ok(())
    }
}

/// Result staged by a commit: no records, only the bookmark.
#[derive(Debug, Clone, Copy)]
pub struct BookmarkResult {
    bookmark: Bookmark,
}

impl BookmarkResult {
    /// Result carrying `bookmark`.
    pub fn new(bookmark: Bookmark) -> Self {
        Self { bookmark }
    }
}

impl QueryResult for BookmarkResult {
    fn field_names(&self) -> &[String] {
        &[]
    }

    fn accept(&mut self, consumer: &mut dyn RecordConsumer) -> BoltResult<()> {
        consumer.on_metadata("bookmark", self.bookmark.to_value());
        Ok(())
    }
}

/// Fully materialized result, for executors that compute eagerly.
#[derive(Debug, Clone, Default)]
pub struct RecordsResult {
    fields: Vec<String>,
    records: Vec<Vec<BoltValue>>,
    position: usize,
}

impl RecordsResult {
    /// Result with the given columns and rows.
    pub fn new(fields: Vec<String>, records: Vec<Vec<BoltValue>>) -> Self {
        Self {
            fields,
            records,
            position: 0,
        }
    }

    /// Rows not yet streamed.
    pub fn remaining(&self) -> usize {
        self.records.len() - self.position
    }
}

impl QueryResult for RecordsResult {
    fn field_names(&self) -> &[String] {
        &self.fields
    }

    fn accept(&mut self, consumer: &mut dyn RecordConsumer) -> BoltResult<()> {
        while let Some(record) = self.records.get(self.position) {
            self.position += 1;
            consumer.on_record(record)?;
        }
        Ok(())
    }
}
