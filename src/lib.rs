use image::DynamicImage;
use serde::Serialize;
use tracing::instrument;

pub mod annotate;
pub mod backend;
pub mod classify;
pub mod config;
pub mod dedup;
mod error;
pub mod gate;
pub mod mask;
pub mod normalize;
pub mod parse;
mod result;
pub mod score;
pub mod stitch;
pub mod util;

pub use annotate::{AnnotationDraft, Style};
pub use backend::{detect_region, merge_batches, ReplayDetector, TextDetector, Unavailable};
pub use classify::classify;
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use normalize::normalize;
pub use parse::parse;
pub use result::*;

use dedup::{DedupParams, DuplicateMerger};
use gate::{ConfidenceGate, GateParams, Rejection};
use score::{ResultScorer, ScorerParams};
use stitch::{AdjacencyMerger, StitchParams};

pub struct ReconcilerBuilder {
    config: PipelineConfig,
}

impl ReconcilerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn gate(mut self, params: GateParams) -> Self {
        self.config.gate = params;
        self
    }

    pub fn dedup(mut self, params: DedupParams) -> Self {
        self.config.dedup = params;
        self
    }

    pub fn stitch(mut self, params: StitchParams) -> Self {
        self.config.stitch = params;
        self
    }

    pub fn scorer(mut self, params: ScorerParams) -> Self {
        self.config.scorer = params;
        self
    }

    #[instrument(skip(self), level = "debug")]
    pub fn build(self) -> Reconciler {
        let PipelineConfig {
            gate,
            dedup,
            stitch,
            scorer,
        } = self.config;
        Reconciler {
            gate: ConfidenceGate::new(gate),
            dedup: DuplicateMerger::new(dedup),
            stitch: AdjacencyMerger::new(stitch),
            scorer: ResultScorer::new(scorer),
        }
    }
}

impl Default for ReconcilerBuilder {
    fn default() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }
}

/// Turns raw OCR detections into ranked annotation candidates.
///
/// Stateless between calls; every invocation works on its own copy of the batch.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    gate: ConfidenceGate,
    dedup: DuplicateMerger,
    stitch: AdjacencyMerger,
    scorer: ResultScorer,
}

impl Reconciler {
    /// Per-detection stage: drops malformed, masked and low-confidence detections and
    /// lifts the rest into classified candidates.
    #[instrument(skip_all, level = "debug", fields(detections = detections.len()))]
    pub fn prepare(
        &self,
        detections: &[Detection],
        masks: &[MaskRegion],
    ) -> (Vec<Candidate>, Vec<Dropped>) {
        let mut candidates = Vec::with_capacity(detections.len());
        let mut dropped = Vec::new();
        for (index, detection) in detections.iter().enumerate() {
            match self.admit(detection, masks) {
                Ok(text) => {
                    let category = classify(&text);
                    candidates.push(Candidate::from_detection(index, detection, text, category));
                }
                Err(reason) => {
                    log::trace!("Dropping detection {index} {:?}: {reason:?}", detection.text);
                    dropped.push(Dropped {
                        index,
                        text: detection.text.clone(),
                        reason,
                    });
                }
            }
        }
        (candidates, dropped)
    }

    fn admit(&self, detection: &Detection, masks: &[MaskRegion]) -> Result<String, DropReason> {
        if !detection.is_well_formed() {
            return Err(DropReason::Malformed);
        }
        if mask::is_masked(&detection.polygon, masks) {
            return Err(DropReason::Masked);
        }
        let rect = util::bounding_rect(&detection.polygon);
        let text = normalize(&detection.text);
        self.gate
            .check(detection.confidence, &text, rect.width(), rect.height())
            .map_err(DropReason::Gate)?;
        Ok(text)
    }

    #[instrument(skip_all, fields(detections = detections.len()))]
    pub fn reconcile(&self, detections: &[Detection], options: ReconcileOptions) -> Reconciliation {
        let ReconcileOptions {
            masks,
            display_threshold,
        } = options;
        let (candidates, rejected) = self.prepare(detections, masks);
        let candidates = self.dedup.merge(candidates);
        let candidates = self.stitch.stitch(candidates);
        let ranking = self.scorer.finalize(candidates);

        let (candidates, below_threshold): (Vec<_>, Vec<_>) = ranking
            .accepted
            .into_iter()
            .partition(|it| it.confidence >= display_threshold);
        log::debug!(
            "Reconciled {} detections into {} candidates",
            detections.len(),
            candidates.len()
        );
        Reconciliation {
            candidates,
            below_threshold,
            low_score: ranking.dropped,
            rejected,
        }
    }

    /// Runs `detector` on `image` and reconciles its output.
    #[instrument(skip_all)]
    pub fn detect(
        &self,
        detector: &dyn TextDetector,
        image: &DynamicImage,
        options: ReconcileOptions,
    ) -> Result<Reconciliation> {
        let detections = detector.detect(image)?;
        Ok(self.reconcile(&detections, options))
    }
}

/// Per-invocation inputs supplied by the interactive caller.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileOptions<'a> {
    /// Snapshot of the mask regions, read once for the whole run.
    pub masks: &'a [MaskRegion],
    /// Minimum candidate confidence to surface, applied after scoring.
    pub display_threshold: f32,
}

impl Default for ReconcileOptions<'_> {
    fn default() -> Self {
        Self {
            masks: &[],
            display_threshold: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    Malformed,
    Masked,
    Gate(Rejection),
}

#[derive(Debug, Clone, Serialize)]
pub struct Dropped {
    pub index: usize,
    pub text: String,
    pub reason: DropReason,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Reconciliation {
    /// Ranked candidates, best first.
    pub candidates: Vec<Candidate>,
    /// Scored high enough but below the display threshold.
    pub below_threshold: Vec<Candidate>,
    /// Below the scorer's minimum.
    pub low_score: Vec<Candidate>,
    pub rejected: Vec<Dropped>,
}

impl Reconciliation {
    pub fn drafts(&self) -> Vec<AnnotationDraft> {
        self.candidates
            .iter()
            .map(AnnotationDraft::from_candidate)
            .collect()
    }
}
