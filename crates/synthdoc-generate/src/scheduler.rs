use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::builder::DocumentBuilder;
use crate::document::Document;
use crate::errors::GenerationError;
use crate::sink::DocumentSink;

/// What a delivery strategy handed to the sink for one model.
#[derive(Debug, Default)]
pub struct DeliverySummary {
    pub delivered: u64,
    pub duplicates: u64,
    /// Copies kept for dependant models.
    pub retained: Vec<Document>,
}

/// How built documents reach the sink.
#[async_trait]
pub trait Delivery: Send {
    /// Take one finished build. The scheduler dispatches nothing new until
    /// this resolves.
    async fn deliver(
        &mut self,
        index: u64,
        document: Document,
        sink: &dyn DocumentSink,
    ) -> Result<(), GenerationError>;

    /// Close out the model. `complete` is false after cancellation or a
    /// closed sink.
    async fn finish(
        &mut self,
        model: &str,
        sink: &dyn DocumentSink,
        complete: bool,
    ) -> Result<DeliverySummary, GenerationError>;
}

/// Accumulates a model's documents and hands them over in one batch,
/// ordered by generation index with duplicate keys dropped (first wins).
#[derive(Debug, Default)]
pub struct BatchDelivery {
    pending: Vec<(u64, Document)>,
    retain: bool,
}

impl BatchDelivery {
    pub fn new(retain: bool) -> Self {
        Self {
            pending: Vec::new(),
            retain,
        }
    }
}

#[async_trait]
impl Delivery for BatchDelivery {
    async fn deliver(
        &mut self,
        index: u64,
        document: Document,
        _sink: &dyn DocumentSink,
    ) -> Result<(), GenerationError> {
        self.pending.push((index, document));
        Ok(())
    }

    async fn finish(
        &mut self,
        model: &str,
        sink: &dyn DocumentSink,
        complete: bool,
    ) -> Result<DeliverySummary, GenerationError> {
        let mut pending = std::mem::take(&mut self.pending);
        if !complete {
            debug!(model, documents = pending.len(), "partial batch discarded");
            return Ok(DeliverySummary::default());
        }
        pending.sort_by_key(|(index, _)| *index);

        let mut seen = HashSet::with_capacity(pending.len());
        let mut documents = Vec::with_capacity(pending.len());
        let mut duplicates = 0_u64;
        for (index, document) in pending {
            if seen.insert(document.key.clone()) {
                documents.push(document);
            } else {
                duplicates += 1;
                warn!(model, key = %document.key, index, "duplicate document key dropped");
            }
        }

        let retained = if self.retain {
            documents.clone()
        } else {
            Vec::new()
        };
        let delivered = documents.len() as u64;
        sink.accept_batch(model, documents).await?;
        Ok(DeliverySummary {
            delivered,
            duplicates,
            retained,
        })
    }
}

/// Hands each document to the sink as soon as it is built.
#[derive(Debug, Default)]
pub struct StreamDelivery {
    delivered: u64,
    retain: bool,
    retained: Vec<Document>,
}

impl StreamDelivery {
    pub fn new(retain: bool) -> Self {
        Self {
            delivered: 0,
            retain,
            retained: Vec::new(),
        }
    }
}

#[async_trait]
impl Delivery for StreamDelivery {
    async fn deliver(
        &mut self,
        _index: u64,
        document: Document,
        sink: &dyn DocumentSink,
    ) -> Result<(), GenerationError> {
        let copy = self.retain.then(|| document.clone());
        sink.accept(document).await?;
        self.delivered += 1;
        if let Some(copy) = copy {
            self.retained.push(copy);
        }
        Ok(())
    }

    async fn finish(
        &mut self,
        _model: &str,
        _sink: &dyn DocumentSink,
        _complete: bool,
    ) -> Result<DeliverySummary, GenerationError> {
        Ok(DeliverySummary {
            delivered: self.delivered,
            duplicates: 0,
            retained: std::mem::take(&mut self.retained),
        })
    }
}

/// Result of scheduling one model.
#[derive(Debug, Default)]
pub struct ScheduleOutcome {
    pub dispatched: u64,
    pub built: u64,
    pub delivered: u64,
    pub duplicates: u64,
    pub cancelled: bool,
    /// The sink went away before the model finished.
    pub closed: bool,
    pub retained: Vec<Document>,
}

impl ScheduleOutcome {
    pub fn stopped(&self) -> bool {
        self.cancelled || self.closed
    }
}

/// Drives up to `count` builds with at most `limit` in flight.
#[derive(Debug, Clone)]
pub struct GenerationScheduler {
    limit: usize,
    cancel: CancellationToken,
}

impl GenerationScheduler {
    pub fn new(limit: usize, cancel: CancellationToken) -> Self {
        Self {
            limit: limit.max(1),
            cancel,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Generation indexes are assigned at dispatch, in order; completion
    /// order is unspecified. After cancellation, in-flight builds drain but
    /// nothing new starts.
    pub async fn run(
        &self,
        builder: Arc<DocumentBuilder>,
        count: u64,
        delivery: &mut dyn Delivery,
        sink: &dyn DocumentSink,
    ) -> Result<ScheduleOutcome, GenerationError> {
        let model = builder.model().name.clone();
        let mut tasks: JoinSet<(u64, Result<Document, GenerationError>)> = JoinSet::new();
        let mut outcome = ScheduleOutcome::default();

        loop {
            while !outcome.stopped() && outcome.dispatched < count && tasks.len() < self.limit {
                if self.cancel.is_cancelled() {
                    outcome.cancelled = true;
                    break;
                }
                if sink.is_closed() {
                    outcome.closed = true;
                    break;
                }
                let index = outcome.dispatched;
                outcome.dispatched += 1;
                let builder = Arc::clone(&builder);
                tasks.spawn_blocking(move || (index, builder.build(index)));
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            let (index, built) = joined.map_err(|err| GenerationError::Task(err.to_string()))?;
            let document = built?;
            outcome.built += 1;
            if outcome.stopped() {
                continue;
            }

            tokio::select! {
                biased;
                delivered = delivery.deliver(index, document, sink) => {
                    if let Err(err) = delivered {
                        if !sink.is_closed() {
                            return Err(err);
                        }
                        warn!(model = %model, index, "sink closed; stopping dispatch");
                        outcome.closed = true;
                    }
                }
                _ = self.cancel.cancelled() => {
                    outcome.cancelled = true;
                }
            }
        }

        if outcome.cancelled {
            info!(
                model = %model,
                dispatched = outcome.dispatched,
                built = outcome.built,
                "generation cancelled"
            );
        }

        let summary = delivery.finish(&model, sink, !outcome.stopped()).await?;
        outcome.delivered = summary.delivered;
        outcome.duplicates = summary.duplicates;
        outcome.retained = summary.retained;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use serde_json::Map;

    fn document(key: &str) -> Document {
        Document::new(key, "users", Map::new())
    }

    #[tokio::test]
    async fn batch_orders_by_index_and_keeps_first_key() {
        let sink = MemorySink::new();
        let mut delivery = BatchDelivery::new(true);
        for (index, key) in [(2, "b"), (0, "a"), (3, "a"), (1, "c")] {
            delivery.deliver(index, document(key), &sink).await.expect("deliver");
        }
        assert!(sink.documents().is_empty());

        let summary = delivery.finish("users", &sink, true).await.expect("finish");
        let keys: Vec<String> = sink.documents().into_iter().map(|d| d.key).collect();
        assert_eq!(keys, vec!["a", "c", "b"]);
        assert_eq!(summary.delivered, 3);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.retained.len(), 3);
        assert_eq!(sink.batches(), vec![("users".to_string(), 3)]);
    }

    #[tokio::test]
    async fn incomplete_batches_are_not_delivered() {
        let sink = MemorySink::new();
        let mut delivery = BatchDelivery::new(false);
        delivery.deliver(0, document("a"), &sink).await.expect("deliver");
        let summary = delivery.finish("users", &sink, false).await.expect("finish");
        assert_eq!(summary.delivered, 0);
        assert!(sink.batches().is_empty());
    }

    #[tokio::test]
    async fn stream_delivers_immediately() {
        let sink = MemorySink::new();
        let mut delivery = StreamDelivery::new(false);
        delivery.deliver(0, document("a"), &sink).await.expect("deliver");
        assert_eq!(sink.documents().len(), 1);
        let summary = delivery.finish("users", &sink, true).await.expect("finish");
        assert_eq!(summary.delivered, 1);
        assert!(summary.retained.is_empty());
    }
}
