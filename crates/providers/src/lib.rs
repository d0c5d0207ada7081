//! Provider interfaces (spec §6.1-6.3, "Out of core, listed for interface
//! clarity"): `Source`, `Fetcher`, plus two reference adapters used for
//! interface-conformance testing, and the source-type-to-topic label table
//! from spec §6.8.

pub mod fetcher;
pub mod mock_source;
pub mod source;
pub mod topic_labels;

pub use fetcher::Fetcher;
pub use mock_source::{FeedSource, MockSource};
pub use source::Source;
pub use topic_labels::topic_label_for;
