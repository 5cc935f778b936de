//! Asynchronous CSV reader with batch interface
//!
//! Streams ledger commands from a CSV file in batches.
//!
//! # Architecture
//!
//! ```text
//! CSV Reader → AsyncReader → Batches of (line, Command)
//!                  ↓
//!           csv_format module
//!           (CommandRecord, convert_command_record)
//! ```

use crate::io::csv_format::{convert_command_record, CommandRecord};
use crate::types::Command;
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

/// Asynchronous CSV reader
///
/// Memory use stays constant regardless of file size. Each command is paired
/// with its 1-based line number in the file for log context.
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self { csv_reader }
    }

    /// Read up to `batch_size` commands
    ///
    /// Rows that fail to parse or convert are logged at WARN and skipped.
    /// Returns an empty vector at end of file.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<(u64, Command)> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize_with_pos::<CommandRecord>();

        while batch.len() < batch_size {
            match records.next().await {
                Some((Ok(record), pos)) => {
                    let line = pos.line();
                    match convert_command_record(record) {
                        Ok(command) => batch.push((line, command)),
                        Err(e) => warn!(line, error = %e, "Record conversion error"),
                    }
                }
                Some((Err(e), pos)) => {
                    warn!(line = pos.line(), error = %e, "CSV parse error")
                }
                None => break,
            }
        }

        batch
    }
}
