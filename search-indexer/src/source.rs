//! JSON-lines resource source.

use std::path::Path;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::debug;

use crate::IndexingError;
use search_indexer_pipeline::consumer::ResourceSource;
use search_indexer_pipeline::PipelineError;
use search_indexer_shared::SourceResource;

/// Reads one JSON-encoded [`SourceResource`] per line.
///
/// Blank lines are skipped. A line that does not parse ends the stream
/// with an error naming the line number.
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line_number: usize,
}

impl JsonLinesSource<BufReader<File>> {
    /// Open a JSON-lines file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, IndexingError> {
        let file = File::open(path.as_ref()).await?;
        debug!(path = %path.as_ref().display(), "Opened resource file");
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R> JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }
}

#[async_trait]
impl<R> ResourceSource for JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_resource(&mut self) -> Result<Option<SourceResource>, PipelineError> {
        loop {
            let line = self.lines.next_line().await.map_err(|e| {
                PipelineError::source_failure(format!(
                    "read failed after line {}: {}",
                    self.line_number, e
                ))
            })?;
            let Some(line) = line else {
                return Ok(None);
            };
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            return serde_json::from_str(&line).map(Some).map_err(|e| {
                PipelineError::source_failure(format!("line {}: {}", self.line_number, e))
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(text: &'static str) -> JsonLinesSource<&'static [u8]> {
        JsonLinesSource::new(text.as_bytes())
    }

    #[tokio::test]
    async fn test_reads_resources_and_skips_blank_lines() {
        let mut source = source(concat!(
            r#"{"resource_id":"r1","entity_type":"Person","payload":{"name":"Ada"}}"#,
            "\n\n   \n",
            r#"{"resource_id":"r2","entity_type":"Person","deleted":true}"#,
            "\n",
        ));

        let first = source.next_resource().await.unwrap().unwrap();
        assert_eq!(first.resource_id, "r1");
        assert_eq!(first.payload.unwrap()["name"], "Ada");

        let second = source.next_resource().await.unwrap().unwrap();
        assert_eq!(second.resource_id, "r2");
        assert!(second.deleted);

        assert!(source.next_resource().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_parse_error_names_line() {
        let mut source = source(concat!(
            r#"{"resource_id":"r1","entity_type":"Person"}"#,
            "\n",
            "not json\n",
        ));

        assert!(source.next_resource().await.unwrap().is_some());
        let err = source.next_resource().await.unwrap_err();
        assert!(matches!(err, PipelineError::SourceError(msg) if msg.starts_with("line 2")));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let result = JsonLinesSource::open("/nonexistent/resources.jsonl").await;
        assert!(matches!(result, Err(IndexingError::IoError(_))));
    }
}
