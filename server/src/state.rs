//! Shared application state.
//!
//! The segmentation model is an explicitly owned, lazily-initialized handle
//! living in this state struct: the first pipeline request downloads any
//! missing weights and builds the ONNX sessions; later requests reuse them.

use std::sync::Arc;

use imagery::TileSource;
use pipeline::RunWorkspace;
use segmentation::{MaskGenConfig, SamModel, ensure_weights};
use tokio::sync::{Mutex, OnceCell};

use crate::{config::ServerConfig, error::ApiError};

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: ServerConfig,
    pub workspace: RunWorkspace,
    pub tile_source: TileSource,
    /// Serializes pipeline runs; serving endpoints stay lock-free
    pub run_lock: Mutex<()>,
    model: OnceCell<SamModel>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<SharedState, pipeline::PipelineError> {
        let workspace = RunWorkspace::new(&config.workspace_dir)?;
        let tile_source = config.tile_provider.source();
        Ok(Arc::new(Self {
            config,
            workspace,
            tile_source,
            run_lock: Mutex::new(()),
            model: OnceCell::new(),
        }))
    }

    /// The model handle, loading weights and sessions on first use
    pub async fn model(&self) -> Result<&SamModel, ApiError> {
        let model = self
            .model
            .get_or_try_init(|| async {
                let paths =
                    ensure_weights(self.config.model_variant, &self.config.model_cache_dir).await?;
                SamModel::load(&paths, MaskGenConfig::default())
            })
            .await?;
        Ok(model)
    }
}
