//! Capability interfaces for completion and embedding models (spec §6.5),
//! plus the `Summarizer` (C3) and `Embedder` (C4) components built on top
//! of them.

pub mod completion;
pub mod embedding;
pub mod embedder;
pub mod summarizer;

pub use completion::{CompletionModel, MockCompletionModel};
pub use embedder::Embedder;
pub use embedding::{EmbeddingModel, MockEmbeddingModel};
pub use summarizer::Summarizer;
