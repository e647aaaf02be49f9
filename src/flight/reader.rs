//! Streams of record batches.

use std::fmt;
use std::sync::Arc;

use arrow::datatypes::{Schema as ArrowSchema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow_flight::decode::FlightRecordBatchStream;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};

use crate::error::{ClientError, ClientResult};

/// A stream of record batches with a known schema.
///
/// Flight only reveals the schema with the first message, so opening a
/// reader over a Flight stream waits for the first batch and holds it back
/// until [`BatchReader::next_batch`] is called.
pub struct BatchReader {
    schema: SchemaRef,
    first: Option<RecordBatch>,
    stream: BoxStream<'static, ClientResult<RecordBatch>>,
}

impl BatchReader {
    pub fn new(schema: SchemaRef, stream: BoxStream<'static, ClientResult<RecordBatch>>) -> Self {
        Self {
            schema,
            first: None,
            stream,
        }
    }

    /// A reader over batches already in memory.
    pub fn from_batches(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self::new(schema, stream::iter(batches.into_iter().map(Ok)).boxed())
    }

    /// A reader with no columns and no batches.
    pub fn empty() -> Self {
        Self::from_batches(Arc::new(ArrowSchema::empty()), Vec::new())
    }

    /// Open a reader over a `DoGet` response.
    pub async fn from_flight(stream: FlightRecordBatchStream) -> ClientResult<Self> {
        let mut stream =
            stream.map_err(|e| ClientError::Arrow(ArrowError::ExternalError(Box::new(e))));
        let first = stream.try_next().await?;
        let schema = match &first {
            Some(batch) => batch.schema(),
            None => stream
                .get_ref()
                .schema()
                .cloned()
                .unwrap_or_else(|| Arc::new(ArrowSchema::empty())),
        };
        Ok(Self {
            schema,
            first,
            stream: stream.boxed(),
        })
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    /// The next batch, `None` once the stream is exhausted.
    pub async fn next_batch(&mut self) -> Option<ClientResult<RecordBatch>> {
        if let Some(batch) = self.first.take() {
            return Some(Ok(batch));
        }
        self.stream.next().await
    }
}

impl fmt::Debug for BatchReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchReader")
            .field("schema", &self.schema)
            .field("first", &self.first.as_ref().map(RecordBatch::num_rows))
            .finish_non_exhaustive()
    }
}
