//! Sentence embeddings for page similarity
//!
//! The default embedder is all-MiniLM-L6-v2 exported to ONNX, run on CPU
//! through ONNX Runtime. Output vectors are mean-pooled over the attention
//! mask and L2-normalized (384 dimensions).

use anyhow::Result;

pub trait Embedder: Send {
    /// One vector per input text, in input order
    fn embed(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embedder identifier for logging
    fn name(&self) -> &str;
}

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

#[cfg(feature = "onnx-embedder")]
pub use onnx::OnnxEmbedder;

#[cfg(feature = "onnx-embedder")]
mod onnx {
    use super::{Embedder, MODEL_FILE, TOKENIZER_FILE};
    use anyhow::{anyhow, Result};
    use ndarray::{Array1, Array2};
    use ort::session::{builder::GraphOptimizationLevel, Session};
    use ort::value::Value;
    use std::path::Path;
    use tokenizers::{Tokenizer, TruncationParams};

    pub struct OnnxEmbedder {
        session: Session,
        tokenizer: Tokenizer,
        uses_token_type_ids: bool,
    }

    impl OnnxEmbedder {
        /// Load `model.onnx` and `tokenizer.json` from `model_dir`
        pub fn load(model_dir: &Path, max_sequence_length: usize) -> Result<Self> {
            let model_path = model_dir.join(MODEL_FILE);
            let tokenizer_path = model_dir.join(TOKENIZER_FILE);

            let threads = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4);
            let session = Session::builder()
                .map_err(|e| anyhow!("failed to create ONNX session builder: {e}"))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| anyhow!("failed to set optimization level: {e}"))?
                .with_intra_threads(threads)
                .map_err(|e| anyhow!("failed to set intra threads: {e}"))?
                .commit_from_file(&model_path)
                .map_err(|e| anyhow!("failed to load ONNX model {}: {e}", model_path.display()))?;

            let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| anyhow!("failed to load tokenizer {}: {e}", tokenizer_path.display()))?;
            tokenizer
                .with_truncation(Some(TruncationParams {
                    max_length: max_sequence_length,
                    ..Default::default()
                }))
                .map_err(|e| anyhow!("failed to configure truncation: {e}"))?;

            let uses_token_type_ids = session
                .inputs
                .iter()
                .any(|input| input.name == "token_type_ids");

            tracing::info!(
                model = %model_path.display(),
                threads,
                uses_token_type_ids,
                "loaded sentence embedding model"
            );

            Ok(Self {
                session,
                tokenizer,
                uses_token_type_ids,
            })
        }

        fn embed_one(&mut self, text: &str) -> Result<Vec<f32>> {
            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| anyhow!("tokenization failed: {e}"))?;

            let seq_len = encoding.get_ids().len();
            let to_row = |values: &[u32]| -> Result<Array2<i64>> {
                Ok(Array2::from_shape_vec(
                    (1, seq_len),
                    values.iter().map(|&v| v as i64).collect(),
                )?)
            };
            let input_ids = to_row(encoding.get_ids())?;
            let attention_mask = to_row(encoding.get_attention_mask())?;
            let mask: Array1<f32> = encoding
                .get_attention_mask()
                .iter()
                .map(|&m| m as f32)
                .collect();

            let outputs = if self.uses_token_type_ids {
                let token_type_ids = to_row(encoding.get_type_ids())?;
                self.session.run(ort::inputs![
                    "input_ids" => Value::from_array(input_ids)?,
                    "attention_mask" => Value::from_array(attention_mask)?,
                    "token_type_ids" => Value::from_array(token_type_ids)?,
                ])?
            } else {
                self.session.run(ort::inputs![
                    "input_ids" => Value::from_array(input_ids)?,
                    "attention_mask" => Value::from_array(attention_mask)?,
                ])?
            };

            // last_hidden_state: [1, seq_len, hidden]
            let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
            let hidden = shape
                .iter()
                .last()
                .copied()
                .ok_or_else(|| anyhow!("embedding output has no dimensions"))? as usize;
            if hidden == 0 || data.len() != seq_len * hidden {
                return Err(anyhow!(
                    "unexpected embedding output shape {:?} for {} tokens",
                    shape,
                    seq_len
                ));
            }
            let hidden_states = Array2::from_shape_vec((seq_len, hidden), data.to_vec())?;

            Ok(mean_pool(&hidden_states, &mask))
        }
    }

    /// Attention-masked mean over tokens, then L2 normalization
    pub(crate) fn mean_pool(hidden_states: &Array2<f32>, mask: &Array1<f32>) -> Vec<f32> {
        let token_count = mask.sum().max(1e-9);
        let pooled = hidden_states.t().dot(mask) / token_count;
        let norm = pooled.dot(&pooled).sqrt();
        if norm > 0.0 {
            (pooled / norm).to_vec()
        } else {
            pooled.to_vec()
        }
    }

    impl Embedder for OnnxEmbedder {
        fn embed(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            texts.iter().map(|text| self.embed_one(text)).collect()
        }

        fn name(&self) -> &str {
            "all-MiniLM-L6-v2"
        }
    }

}
