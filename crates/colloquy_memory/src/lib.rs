pub mod entry;
pub mod similarity;
pub mod splitter;
pub mod store;

pub use entry::{MemoryEntry, MemoryKind};
pub use similarity::cosine_similarity;
pub use splitter::SentenceSplitter;
pub use store::{ConsolidationOutcome, MemoryCounts, MemoryStore};
