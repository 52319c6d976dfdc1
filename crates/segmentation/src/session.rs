//! ONNX runtime sessions for the SAM encoder/decoder pair.
//!
//! [`SamModel`] is an owned handle: the caller decides when to load it and
//! how to share it. Nothing here is a process-wide singleton.

use std::sync::Arc;

use ndarray::{Array1, Array2, Array3, Array4, ArrayD, Axis, CowArray};
use ort::{Environment, ExecutionProvider, GraphOptimizationLevel, Session, SessionBuilder, Value};

use crate::{
    MaskGenConfig, Result, SegmentationError,
    weights::CheckpointPaths,
};

/// Low-resolution mask prompt fed to the decoder when no prior mask exists
const MASK_INPUT_SIZE: usize = 256;

/// An owned SAM model: image encoder + prompted mask decoder sessions
pub struct SamModel {
    encoder: Session,
    decoder: Session,
    config: MaskGenConfig,
    // Sessions borrow the environment; keep it alive alongside them.
    _environment: Arc<Environment>,
}

impl SamModel {
    /// Build the ONNX sessions from cached checkpoint files.
    pub fn load(paths: &CheckpointPaths, config: MaskGenConfig) -> Result<Self> {
        for path in [&paths.encoder, &paths.decoder] {
            if !path.exists() {
                return Err(SegmentationError::MissingWeights(path.clone()));
            }
        }

        let environment = Environment::builder()
            .with_name("terrabound")
            .with_execution_providers([ExecutionProvider::CPU(Default::default())])
            .build()?
            .into_arc();

        let encoder = SessionBuilder::new(&environment)?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_model_from_file(&paths.encoder)?;
        let decoder = SessionBuilder::new(&environment)?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_model_from_file(&paths.decoder)?;

        tracing::info!(
            encoder = %paths.encoder.display(),
            decoder = %paths.decoder.display(),
            "segmentation model loaded"
        );

        Ok(Self {
            encoder,
            decoder,
            config,
            _environment: environment,
        })
    }

    pub fn config(&self) -> &MaskGenConfig {
        &self.config
    }

    /// Run the image encoder once, returning the embedding tensor
    pub fn encode(&self, tensor: &Array4<f32>) -> Result<ArrayD<f32>> {
        let input = CowArray::from(tensor.clone().into_dyn());
        let value = Value::from_array(self.encoder.allocator(), &input)?;

        let outputs = self.encoder.run(vec![value])?;
        let embeddings = outputs
            .first()
            .ok_or_else(|| SegmentationError::UnexpectedOutput("encoder produced no output".into()))?
            .try_extract::<f32>()?;
        Ok(embeddings.view().to_owned())
    }

    /// Decode one point prompt against precomputed embeddings.
    ///
    /// Returns the highest-scoring mask's logits at `(height, width)` plus
    /// its predicted IoU. The prompt uses the standard padding point with
    /// label -1.
    pub fn decode_point(
        &self,
        embeddings: &ArrayD<f32>,
        point: [f32; 2],
        width: u32,
        height: u32,
    ) -> Result<(Array2<f32>, f32)> {
        let point_coords: Array3<f32> =
            Array3::from_shape_vec((1, 2, 2), vec![point[0], point[1], 0.0, 0.0])
                .map_err(|e| SegmentationError::UnexpectedOutput(e.to_string()))?;
        let point_labels: Array2<f32> =
            Array2::from_shape_vec((1, 2), vec![1.0, -1.0])
                .map_err(|e| SegmentationError::UnexpectedOutput(e.to_string()))?;
        let mask_input = Array4::<f32>::zeros((1, 1, MASK_INPUT_SIZE, MASK_INPUT_SIZE));
        let has_mask_input = Array1::<f32>::zeros(1);
        let orig_im_size = Array1::from_vec(vec![height as f32, width as f32]);

        let embeddings_in = CowArray::from(embeddings.view());
        let coords_in = CowArray::from(point_coords.into_dyn());
        let labels_in = CowArray::from(point_labels.into_dyn());
        let mask_in = CowArray::from(mask_input.into_dyn());
        let has_mask_in = CowArray::from(has_mask_input.into_dyn());
        let size_in = CowArray::from(orig_im_size.into_dyn());

        let allocator = self.decoder.allocator();
        let outputs = self.decoder.run(vec![
            Value::from_array(allocator, &embeddings_in)?,
            Value::from_array(allocator, &coords_in)?,
            Value::from_array(allocator, &labels_in)?,
            Value::from_array(allocator, &mask_in)?,
            Value::from_array(allocator, &has_mask_in)?,
            Value::from_array(allocator, &size_in)?,
        ])?;
        if outputs.len() < 2 {
            return Err(SegmentationError::UnexpectedOutput(format!(
                "decoder produced {} outputs, expected masks and iou scores",
                outputs.len()
            )));
        }

        let masks = outputs[0].try_extract::<f32>()?;
        let scores = outputs[1].try_extract::<f32>()?;
        let masks = masks.view();
        let scores = scores.view();

        // masks: [1, M, H, W]; iou_predictions: [1, M]
        if masks.ndim() != 4 || scores.ndim() != 2 {
            return Err(SegmentationError::UnexpectedOutput(format!(
                "decoder output ranks {}/{}, expected 4/2",
                masks.ndim(),
                scores.ndim()
            )));
        }

        let num_masks = masks.shape()[1];
        let (mut best_index, mut best_iou) = (0usize, f32::NEG_INFINITY);
        for index in 0..num_masks {
            let iou = scores[[0, index]];
            if iou > best_iou {
                best_index = index;
                best_iou = iou;
            }
        }

        let logits = masks
            .index_axis(Axis(0), 0)
            .index_axis(Axis(0), best_index)
            .to_owned()
            .into_dimensionality::<ndarray::Ix2>()
            .map_err(|e| SegmentationError::UnexpectedOutput(e.to_string()))?;

        Ok((logits, best_iou))
    }
}
