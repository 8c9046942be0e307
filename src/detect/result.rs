use crate::model::BoundingBox;

/// Fixed inference parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InferenceParams {
    /// Square model input resolution in pixels.
    pub input_size: u32,
    /// Minimum class confidence.
    pub confidence: f32,
    /// IoU above which overlapping boxes of one class are suppressed.
    pub iou: f32,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            confidence: 0.25,
            iou: 0.6,
        }
    }
}

/// One raw model output, in source-image pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDetection {
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl RawDetection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }
}
