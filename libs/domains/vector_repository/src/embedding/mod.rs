mod client;
mod provider;

pub use client::EmbeddingClient;
pub use provider::EmbeddingProvider;

#[cfg(test)]
pub use provider::MockEmbeddingProvider;
