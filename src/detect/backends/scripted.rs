use anyhow::{anyhow, Result};
use image::DynamicImage;
use std::collections::VecDeque;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{InferenceParams, RawDetection};

enum Step {
    Detections(Vec<RawDetection>),
    Failure(String),
}

/// Backend that replays a queue of canned results, one per frame.
///
/// Once the queue is drained every further frame yields no detections.
#[derive(Default)]
pub struct ScriptedBackend {
    steps: VecDeque<Step>,
    readiness_error: Option<String>,
    frames_seen: u64,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the detections returned for the next unanswered frame.
    pub fn then_detect(mut self, detections: Vec<RawDetection>) -> Self {
        self.steps.push_back(Step::Detections(detections));
        self
    }

    /// Queue a hard inference failure for the next unanswered frame.
    pub fn then_fail(mut self, message: impl Into<String>) -> Self {
        self.steps.push_back(Step::Failure(message.into()));
        self
    }

    /// Make [`DetectorBackend::ensure_ready`] fail.
    pub fn unavailable(mut self, message: impl Into<String>) -> Self {
        self.readiness_error = Some(message.into());
        self
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn ensure_ready(&mut self) -> Result<()> {
        match &self.readiness_error {
            Some(message) => Err(anyhow!("{}", message)),
            None => Ok(()),
        }
    }

    fn infer(
        &mut self,
        _image: &DynamicImage,
        _params: &InferenceParams,
    ) -> Result<Vec<RawDetection>> {
        self.frames_seen += 1;
        match self.steps.pop_front() {
            Some(Step::Detections(detections)) => Ok(detections),
            Some(Step::Failure(message)) => Err(anyhow!("{}", message)),
            None => Ok(Vec::new()),
        }
    }
}
