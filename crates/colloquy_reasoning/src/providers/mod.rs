pub mod mock;

pub use mock::{MockEmbedder, MockLanguageModel};
