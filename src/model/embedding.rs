//! Conversion of `rig` embeddings to the little-endian `f32` blobs stored in
//! `F32_BLOB` columns.

use rig::embeddings::Embedding;

/// Helper functions for turning an Embedding into what libsql stores
pub trait EmbeddingConversion {
    fn to_vec(&self) -> Vec<f32>;
    fn to_binary(&self) -> Vec<u8>;
}

impl EmbeddingConversion for Embedding {
    fn to_vec(&self) -> Vec<f32> {
        self.vec.iter().map(|f| *f as f32).collect()
    }

    fn to_binary(&self) -> Vec<u8> {
        self.to_vec().iter().flat_map(|f| f.to_le_bytes()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_conversion() {
        let embedding = Embedding {
            document: "We build tools.".to_string(),
            vec: vec![1.0, -2.5, 3.25],
        };
        assert_eq!(embedding.to_vec(), vec![1.0f32, -2.5, 3.25]);

        let binary = embedding.to_binary();
        assert_eq!(binary.len(), 12);
        assert_eq!(&binary[..4], &1.0f32.to_le_bytes());
        assert_eq!(&binary[4..8], &(-2.5f32).to_le_bytes());
    }
}
