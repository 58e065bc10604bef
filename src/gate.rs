use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Dynamic per-detection confidence thresholds and noise-box limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateParams {
    pub base: f32,
    pub single_char: f32,
    pub two_chars: f32,
    pub short_text: f32,
    pub short_text_max_chars: usize,
    pub small_area: f32,
    pub small_area_penalty: f32,
    pub large_area: f32,
    pub large_area_bonus: f32,
    pub floor: f32,
    pub min_width: f32,
    pub min_height: f32,
    /// Raw texts containing this marker come from undecodable glyphs.
    pub reject_marker: Option<char>,
}

impl Default for GateParams {
    fn default() -> Self {
        Self {
            base: 0.25,
            single_char: 0.45,
            two_chars: 0.35,
            short_text: 0.30,
            short_text_max_chars: 4,
            small_area: 150.0,
            small_area_penalty: 0.10,
            large_area: 1000.0,
            large_area_bonus: 0.05,
            floor: 0.20,
            min_width: 8.0,
            min_height: 6.0,
            reject_marker: Some('#'),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    EmptyText,
    Marker,
    LowConfidence,
    NoiseBox,
}

#[derive(Debug, Clone, Default)]
pub struct ConfidenceGate {
    params: GateParams,
}

impl ConfidenceGate {
    pub fn new(params: GateParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &GateParams {
        &self.params
    }

    pub fn min_confidence(&self, text: &str, bbox_area: f32) -> f32 {
        let p = &self.params;
        match text.chars().count() {
            1 => p.single_char,
            2 => p.two_chars,
            n if n <= p.short_text_max_chars => p.short_text,
            _ if bbox_area < p.small_area => p.base + p.small_area_penalty,
            _ if bbox_area > p.large_area => (p.base - p.large_area_bonus).max(p.floor),
            _ => p.base,
        }
    }

    /// Checks a cleaned detection, reporting why it was rejected.
    #[instrument(level = "trace", skip(self))]
    pub fn check(
        &self,
        confidence: f32,
        text: &str,
        bbox_width: f32,
        bbox_height: f32,
    ) -> Result<(), Rejection> {
        if text.is_empty() {
            return Err(Rejection::EmptyText);
        }
        if self
            .params
            .reject_marker
            .is_some_and(|marker| text.contains(marker))
        {
            return Err(Rejection::Marker);
        }
        if bbox_width < self.params.min_width || bbox_height < self.params.min_height {
            return Err(Rejection::NoiseBox);
        }
        if confidence < self.min_confidence(text, bbox_width * bbox_height) {
            return Err(Rejection::LowConfidence);
        }
        Ok(())
    }

    pub fn passes(&self, confidence: f32, text: &str, bbox_width: f32, bbox_height: f32) -> bool {
        self.check(confidence, text, bbox_width, bbox_height).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_by_length() {
        let gate = ConfidenceGate::default();
        assert_eq!(gate.min_confidence("A", 500.0), 0.45);
        assert_eq!(gate.min_confidence("M8", 500.0), 0.35);
        assert_eq!(gate.min_confidence("Φ20", 500.0), 0.30);
        assert_eq!(gate.min_confidence("Ra32", 50.0), 0.30);
    }

    #[test]
    fn long_text_threshold_tracks_area() {
        let gate = ConfidenceGate::default();
        assert!((gate.min_confidence("M8×1.25", 100.0) - 0.35).abs() < 1e-6);
        assert_eq!(gate.min_confidence("M8×1.25", 500.0), 0.25);
        assert!((gate.min_confidence("M8×1.25", 5000.0) - 0.20).abs() < 1e-6);
    }

    #[test]
    fn floor_is_respected() {
        let gate = ConfidenceGate::new(GateParams {
            large_area_bonus: 0.2,
            ..GateParams::default()
        });
        assert_eq!(gate.min_confidence("longer text", 5000.0), 0.20);
    }

    #[test]
    fn rejects_noise_boxes_and_markers() {
        let gate = ConfidenceGate::default();
        assert!(gate.passes(0.9, "Φ20", 30.0, 12.0));
        assert_eq!(gate.check(0.9, "Φ20", 7.0, 12.0), Err(Rejection::NoiseBox));
        assert_eq!(gate.check(0.9, "Φ20", 30.0, 5.0), Err(Rejection::NoiseBox));
        assert_eq!(gate.check(0.9, "", 30.0, 12.0), Err(Rejection::EmptyText));
        assert_eq!(gate.check(0.9, "2#5", 30.0, 12.0), Err(Rejection::Marker));
        assert_eq!(gate.check(0.4, "A", 30.0, 12.0), Err(Rejection::LowConfidence));
    }
}
