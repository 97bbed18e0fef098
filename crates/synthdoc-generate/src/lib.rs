//! Document synthesis engine for synthdoc.
//!
//! Consumes normalized models from `synthdoc-core`, builds one document per
//! generation pass through the four-phase hook pipeline, and drives builds
//! under a bounded concurrency limit toward a [`DocumentSink`].

pub mod builder;
pub mod coerce;
pub mod document;
pub mod engine;
pub mod errors;
pub mod faker;
pub mod hooks;
pub mod index;
pub mod inputs;
pub mod model;
pub mod params;
pub mod random;
pub mod scheduler;
pub mod sink;
pub mod store;

pub use builder::DocumentBuilder;
pub use document::Document;
pub use engine::{GenerationEngine, GenerationResult};
pub use errors::GenerationError;
pub use faker::{Faker, LocaleKey};
pub use hooks::{Globals, Hook, HookContext, HookRegistry};
pub use index::{FieldEntry, FieldPathIndex};
pub use inputs::{InputSource, Inputs, StaticInputs};
pub use model::{DeliveryMode, GenerateOptions, GenerationIssue, GenerationReport, ModelReport};
pub use random::SeededRandomContext;
pub use scheduler::{BatchDelivery, Delivery, GenerationScheduler, ScheduleOutcome, StreamDelivery};
pub use sink::{ChannelSink, DocumentSink, MemorySink};
pub use store::DocumentStore;
