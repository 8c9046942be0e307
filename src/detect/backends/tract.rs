#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::DynamicImage;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{InferenceParams, RawDetection};
use crate::model::BoundingBox;

/// Tract-based backend for YOLOv8-style ONNX detectors.
///
/// The model takes a `[1, 3, S, S]` RGB tensor in `0..1` and returns
/// `[1, 4 + classes, anchors]` rows of `cx, cy, w, h, class scores...`.
/// Frames are resized to `S x S` without letterboxing and boxes are scaled
/// back to source pixels.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    labels: Vec<String>,
}

impl TractBackend {
    /// Load an ONNX model and its class labels (one per line) from disk.
    pub fn new<P: AsRef<Path>, L: AsRef<Path>>(
        model_path: P,
        labels_path: L,
        input_size: u32,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let labels_path = labels_path.as_ref();
        let labels = std::fs::read_to_string(labels_path)
            .with_context(|| format!("failed to read labels from {}", labels_path.display()))?
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>();
        if labels.is_empty() {
            return Err(anyhow!("labels file {} is empty", labels_path.display()));
        }

        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            labels,
        })
    }

    fn build_input(&self, image: &DynamicImage) -> Tensor {
        let side = self.input_size;
        let rgb = image.resize_exact(side, side, FilterType::Triangle).to_rgb8();
        let side = side as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            rgb.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        input.into_tensor()
    }

    fn decode(
        &self,
        outputs: TVec<TValue>,
        params: &InferenceParams,
        src_w: u32,
        src_h: u32,
    ) -> Result<Vec<RawDetection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output was not [1, 4 + classes, anchors]")?;

        let rows = view.shape()[1];
        let anchors = view.shape()[2];
        if rows < 5 {
            return Err(anyhow!("model output has {} rows, expected at least 5", rows));
        }
        let classes = (rows - 4).min(self.labels.len());
        let sx = src_w as f32 / self.input_size as f32;
        let sy = src_h as f32 / self.input_size as f32;

        let mut candidates = Vec::new();
        for i in 0..anchors {
            let (class_id, score) = (0..classes)
                .map(|c| (c, view[[0, 4 + c, i]]))
                .fold((0, f32::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 {
                        cur
                    } else {
                        best
                    }
                });
            if !score.is_finite() || score < params.confidence {
                continue;
            }
            let (cx, cy, w, h) = (
                view[[0, 0, i]],
                view[[0, 1, i]],
                view[[0, 2, i]],
                view[[0, 3, i]],
            );
            let bbox = BoundingBox::new(
                ((cx - w / 2.0) * sx) as i32,
                ((cy - h / 2.0) * sy) as i32,
                ((cx + w / 2.0) * sx) as i32,
                ((cy + h / 2.0) * sy) as i32,
            );
            candidates.push((class_id, score, bbox));
        }

        let kept = non_max_suppression(candidates, params.iou);
        Ok(kept
            .into_iter()
            .map(|(class_id, score, bbox)| {
                RawDetection::new(self.labels[class_id].clone(), score, bbox)
            })
            .collect())
    }
}

/// Class-wise greedy NMS, highest score first.
fn non_max_suppression(
    mut candidates: Vec<(usize, f32, BoundingBox)>,
    iou_threshold: f32,
) -> Vec<(usize, f32, BoundingBox)> {
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
    let mut kept: Vec<(usize, f32, BoundingBox)> = Vec::new();
    for cand in candidates {
        let suppressed = kept
            .iter()
            .any(|k| k.0 == cand.0 && iou(&k.2, &cand.2) > iou_threshold as f64);
        if !suppressed {
            kept.push(cand);
        }
    }
    kept
}

fn iou(a: &BoundingBox, b: &BoundingBox) -> f64 {
    let inter = BoundingBox::new(a.x1.max(b.x1), a.y1.max(b.y1), a.x2.min(b.x2), a.y2.min(b.y2))
        .area() as f64;
    let union = a.area() as f64 + b.area() as f64 - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn ensure_ready(&mut self) -> Result<()> {
        let blank = DynamicImage::new_rgb8(self.input_size, self.input_size);
        self.model
            .run(tvec!(self.build_input(&blank).into()))
            .context("warm-up inference failed")?;
        Ok(())
    }

    fn infer(
        &mut self,
        image: &DynamicImage,
        params: &InferenceParams,
    ) -> Result<Vec<RawDetection>> {
        if params.input_size != self.input_size {
            return Err(anyhow!(
                "inference size {} does not match loaded model input {}",
                params.input_size,
                self.input_size
            ));
        }
        let input = self.build_input(image);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, params, image.width(), image.height())
    }
}
