//! Pretrained checkpoint management.
//!
//! SAM-style models ship as an image-encoder / mask-decoder ONNX pair. Each
//! file is downloaded once into a local cache directory and reused on every
//! later run.

use std::path::{Path, PathBuf};

use crate::{Result, SegmentationError};

/// Which pretrained segmentation model to run
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default,
    serde::Serialize, serde::Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    /// MobileSAM distillation: small enough for CPU inference
    #[default]
    MobileSam,
    /// The original SAM ViT-B checkpoint
    SamVitBase,
}

impl ModelVariant {
    pub fn encoder_filename(&self) -> &'static str {
        match self {
            ModelVariant::MobileSam => "mobile_sam.encoder.onnx",
            ModelVariant::SamVitBase => "sam_vit_b.encoder.onnx",
        }
    }

    pub fn decoder_filename(&self) -> &'static str {
        match self {
            ModelVariant::MobileSam => "mobile_sam.decoder.onnx",
            ModelVariant::SamVitBase => "sam_vit_b.decoder.onnx",
        }
    }

    pub fn encoder_url(&self) -> &'static str {
        match self {
            ModelVariant::MobileSam => {
                "https://huggingface.co/vietanhdev/segment-anything-onnx-models/resolve/main/mobile_sam.encoder.onnx"
            }
            ModelVariant::SamVitBase => {
                "https://huggingface.co/vietanhdev/segment-anything-onnx-models/resolve/main/sam_vit_b_01ec64.encoder.onnx"
            }
        }
    }

    pub fn decoder_url(&self) -> &'static str {
        match self {
            ModelVariant::MobileSam => {
                "https://huggingface.co/vietanhdev/segment-anything-onnx-models/resolve/main/mobile_sam.decoder.onnx"
            }
            ModelVariant::SamVitBase => {
                "https://huggingface.co/vietanhdev/segment-anything-onnx-models/resolve/main/sam_vit_b_01ec64.decoder.onnx"
            }
        }
    }
}

/// Resolved on-disk checkpoint paths
#[derive(Debug, Clone)]
pub struct CheckpointPaths {
    pub encoder: PathBuf,
    pub decoder: PathBuf,
}

impl CheckpointPaths {
    pub fn in_dir(variant: ModelVariant, cache_dir: &Path) -> Self {
        Self {
            encoder: cache_dir.join(variant.encoder_filename()),
            decoder: cache_dir.join(variant.decoder_filename()),
        }
    }
}

/// Make sure both checkpoint files exist locally, downloading any that are
/// missing. Files already in the cache are never re-fetched.
pub async fn ensure_weights(variant: ModelVariant, cache_dir: &Path) -> Result<CheckpointPaths> {
    std::fs::create_dir_all(cache_dir)?;
    let paths = CheckpointPaths::in_dir(variant, cache_dir);

    for (url, path) in [
        (variant.encoder_url(), &paths.encoder),
        (variant.decoder_url(), &paths.decoder),
    ] {
        if path.exists() {
            tracing::debug!(path = %path.display(), "checkpoint already cached");
            continue;
        }
        download(url, path).await?;
    }

    Ok(paths)
}

async fn download(url: &str, dest: &Path) -> Result<()> {
    tracing::info!(%url, "downloading model checkpoint");

    let response = reqwest::get(url)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|source| SegmentationError::WeightsDownload { url: url.to_string(), source })?;
    let bytes = response
        .bytes()
        .await
        .map_err(|source| SegmentationError::WeightsDownload { url: url.to_string(), source })?;

    // Stage through a temp file so an interrupted download never leaves a
    // truncated checkpoint in the cache.
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut staged = tempfile::NamedTempFile::new_in(parent)?;
    std::io::Write::write_all(&mut staged, &bytes)?;
    staged.persist(dest).map_err(|e| SegmentationError::Io(e.error))?;

    tracing::info!(path = %dest.display(), bytes = bytes.len(), "checkpoint saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_paths_join_cache_dir() {
        let paths = CheckpointPaths::in_dir(ModelVariant::MobileSam, Path::new("/cache"));
        assert_eq!(paths.encoder, Path::new("/cache/mobile_sam.encoder.onnx"));
        assert_eq!(paths.decoder, Path::new("/cache/mobile_sam.decoder.onnx"));
    }

    #[test]
    fn test_variant_urls_point_at_distinct_files() {
        for variant in [ModelVariant::MobileSam, ModelVariant::SamVitBase] {
            assert_ne!(variant.encoder_url(), variant.decoder_url());
            assert!(variant.encoder_url().starts_with("https://"));
        }
    }
}
