//! Per-message response sink.

use crate::bolt::{
    BoltFailure, BoltMap, BoltResponse, BoltResult, BoltValue, FailureMessage, RecordMessage,
    SuccessMessage,
};

use super::result::{QueryResult, RecordConsumer};

/// Receives the outcome of processing one request.
///
/// The state machine binds a handler for the duration of a single
/// `process` call and calls [`on_finish`](Self::on_finish) exactly once
/// before unbinding it, on every path.
pub trait BoltResponseHandler {
    /// Stream `result`. With `pull` false the records are consumed without
    /// being forwarded; summary metadata is kept either way.
    fn on_records(&mut self, result: &mut dyn QueryResult, pull: bool) -> BoltResult<()>;

    /// Attach a metadata entry to the final SUCCESS.
    fn on_metadata(&mut self, key: &str, value: BoltValue);

    /// The request failed.
    fn mark_failed(&mut self, failure: &BoltFailure);

    /// The request was ignored.
    fn mark_ignored(&mut self);

    /// Processing of the request is complete.
    fn on_finish(&mut self);
}

/// Handler that turns each processed request into Bolt response messages.
#[derive(Debug, Default)]
pub struct ResponseCollector {
    records: Vec<RecordMessage>,
    metadata: BoltMap,
    failure: Option<FailureMessage>,
    ignored: bool,
    responses: Vec<BoltResponse>,
}

struct CollectingConsumer<'a> {
    pull: bool,
    records: &'a mut Vec<RecordMessage>,
    metadata: &'a mut BoltMap,
}

impl RecordConsumer for CollectingConsumer<'_> {
    fn on_record(&mut self, values: &[BoltValue]) -> BoltResult<()> {
        if self.pull {
            self.records.push(RecordMessage::new(values.to_vec()));
        }
        Ok(())
    }

    fn on_metadata(&mut self, key: &str, value: BoltValue) {
        self.metadata.insert(key.to_string(), value);
    }
}

impl ResponseCollector {
    /// Empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Responses produced so far, oldest first.
    pub fn responses(&self) -> &[BoltResponse] {
        &self.responses
    }

    /// Take the responses produced so far.
    pub fn take_responses(&mut self) -> Vec<BoltResponse> {
        std::mem::take(&mut self.responses)
    }
}

impl BoltResponseHandler for ResponseCollector {
    fn on_records(&mut self, result: &mut dyn QueryResult, pull: bool) -> BoltResult<()> {
        let mut consumer = CollectingConsumer {
            pull,
            records: &mut self.records,
            metadata: &mut self.metadata,
        };
        result.accept(&mut consumer)
    }

    fn on_metadata(&mut self, key: &str, value: BoltValue) {
        self.metadata.insert(key.to_string(), value);
    }

    fn mark_failed(&mut self, failure: &BoltFailure) {
        self.failure = Some(FailureMessage::from(failure));
    }

    fn mark_ignored(&mut self) {
        self.ignored = true;
    }

    fn on_finish(&mut self) {
        self.responses
            .extend(self.records.drain(..).map(BoltResponse::Record));

        let metadata = std::mem::take(&mut self.metadata);
        let summary = if std::mem::take(&mut self.ignored) {
            BoltResponse::Ignored
        } else if let Some(failure) = self.failure.take() {
            BoltResponse::Failure(failure)
        } else {
            BoltResponse::Success(SuccessMessage::with_metadata(metadata))
        };
        self.responses.push(summary);
    }
}
