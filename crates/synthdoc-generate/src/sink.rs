use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::document::Document;
use crate::errors::GenerationError;

/// Downstream consumer of finished documents.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Accept one document; streaming delivery waits on this before
    /// releasing the concurrency slot.
    async fn accept(&self, document: Document) -> Result<(), GenerationError>;

    /// Accept a model's full, de-duplicated output.
    async fn accept_batch(
        &self,
        _model: &str,
        documents: Vec<Document>,
    ) -> Result<(), GenerationError> {
        for document in documents {
            self.accept(document).await?;
        }
        Ok(())
    }

    /// True once the consumer has gone away.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Collects every document in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    documents: Mutex<Vec<Document>>,
    batches: Mutex<Vec<(String, usize)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn documents(&self) -> Vec<Document> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn documents_for(&self, model: &str) -> Vec<Document> {
        self.documents()
            .into_iter()
            .filter(|document| document.model == model)
            .collect()
    }

    /// `(model, size)` for every batch handed over, in arrival order.
    pub fn batches(&self) -> Vec<(String, usize)> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DocumentSink for MemorySink {
    async fn accept(&self, document: Document) -> Result<(), GenerationError> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(document);
        Ok(())
    }

    async fn accept_batch(
        &self,
        model: &str,
        documents: Vec<Document>,
    ) -> Result<(), GenerationError> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((model.to_string(), documents.len()));
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(documents);
        Ok(())
    }
}

/// Pull-based sink: documents are read from the paired receiver, and a send
/// only completes once the channel has room.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<Document>,
}

impl ChannelSink {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Document>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl DocumentSink for ChannelSink {
    async fn accept(&self, document: Document) -> Result<(), GenerationError> {
        self.sender
            .send(document)
            .await
            .map_err(|_| GenerationError::Sink("document receiver dropped".to_string()))
    }

    fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
