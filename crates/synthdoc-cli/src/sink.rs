use std::io::Write;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use synthdoc_generate::{Document, DocumentSink, GenerationError};

/// One output line.
#[derive(Serialize)]
struct Line<'a> {
    key: &'a str,
    model: &'a str,
    document: &'a Document,
}

/// Writes each document as a JSON line `{"key", "model", "document"}`.
pub struct JsonLinesSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesSink {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn flush(&self) -> Result<(), GenerationError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.flush()?;
        Ok(())
    }

    fn write(&self, document: &Document) -> Result<(), GenerationError> {
        let line = Line {
            key: &document.key,
            model: &document.model,
            document,
        };
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *writer, &line)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

#[async_trait]
impl DocumentSink for JsonLinesSink {
    async fn accept(&self, document: Document) -> Result<(), GenerationError> {
        self.write(&document)
    }

    async fn accept_batch(
        &self,
        _model: &str,
        documents: Vec<Document>,
    ) -> Result<(), GenerationError> {
        for document in &documents {
            self.write(document)?;
        }
        self.flush()
    }
}
