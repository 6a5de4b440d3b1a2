//! Resource source abstraction and the task that drains it.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::consumer::SourceMessage;
use crate::errors::PipelineError;
use search_indexer_shared::SourceResource;

/// A finite, pull-based stream of resources.
///
/// Implementations return `Ok(None)` once exhausted. Any error ends the
/// stream.
#[async_trait]
pub trait ResourceSource: Send {
    async fn next_resource(&mut self) -> Result<Option<SourceResource>, PipelineError>;
}

/// In-memory source, mostly useful for tests and one-off runs.
#[derive(Debug, Default)]
pub struct VecResourceSource {
    resources: VecDeque<SourceResource>,
}

impl VecResourceSource {
    pub fn new(resources: Vec<SourceResource>) -> Self {
        Self {
            resources: resources.into(),
        }
    }
}

#[async_trait]
impl ResourceSource for VecResourceSource {
    async fn next_resource(&mut self) -> Result<Option<SourceResource>, PipelineError> {
        Ok(self.resources.pop_front())
    }
}

/// Spawn a task that drains `source` into `sender`.
///
/// The channel is bounded, so a slow scheduler backpressures the source.
/// The task stops on its own once the receiver is dropped.
pub fn spawn_source<S>(mut source: S, sender: mpsc::Sender<SourceMessage>) -> JoinHandle<()>
where
    S: ResourceSource + 'static,
{
    tokio::spawn(async move {
        let mut forwarded: usize = 0;
        loop {
            match source.next_resource().await {
                Ok(Some(resource)) => {
                    if sender.send(SourceMessage::Resource(resource)).await.is_err() {
                        debug!(forwarded, "Scheduler stopped listening, closing source");
                        return;
                    }
                    forwarded += 1;
                }
                Ok(None) => {
                    info!(forwarded, "Source exhausted");
                    let _ = sender.send(SourceMessage::End).await;
                    return;
                }
                Err(e) => {
                    error!(error = %e, forwarded, "Source failed");
                    let _ = sender.send(SourceMessage::Error(e.to_string())).await;
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSource {
        remaining: usize,
    }

    #[async_trait]
    impl ResourceSource for FailingSource {
        async fn next_resource(&mut self) -> Result<Option<SourceResource>, PipelineError> {
            if self.remaining == 0 {
                return Err(PipelineError::source_failure("connection reset"));
            }
            self.remaining -= 1;
            Ok(Some(SourceResource::deleted(
                format!("urn:r:{}", self.remaining),
                "Thing",
            )))
        }
    }

    #[tokio::test]
    async fn test_vec_source_ends_with_end_message() {
        let source = VecResourceSource::new(vec![
            SourceResource::deleted("urn:a", "Thing"),
            SourceResource::deleted("urn:b", "Thing"),
        ]);
        let (tx, mut rx) = mpsc::channel(4);
        spawn_source(source, tx).await.unwrap();

        assert!(matches!(rx.recv().await, Some(SourceMessage::Resource(r)) if r.resource_id == "urn:a"));
        assert!(matches!(rx.recv().await, Some(SourceMessage::Resource(r)) if r.resource_id == "urn:b"));
        assert!(matches!(rx.recv().await, Some(SourceMessage::End)));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_source_error_is_forwarded_and_stops() {
        let (tx, mut rx) = mpsc::channel(4);
        spawn_source(FailingSource { remaining: 1 }, tx)
            .await
            .unwrap();

        assert!(matches!(rx.recv().await, Some(SourceMessage::Resource(_))));
        match rx.recv().await {
            Some(SourceMessage::Error(msg)) => assert!(msg.contains("connection reset")),
            other => panic!("expected error message, got {:?}", other),
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_source_stops_when_receiver_dropped() {
        let source = VecResourceSource::new(
            (0..10)
                .map(|i| SourceResource::deleted(format!("urn:{}", i), "Thing"))
                .collect(),
        );
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        spawn_source(source, tx).await.unwrap();
    }
}
