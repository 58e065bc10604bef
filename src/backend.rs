//! Sources of raw detections.
//!
//! The reconciler never talks to an OCR engine itself; anything that can turn an
//! image into [`Detection`]s implements [`TextDetector`].

use std::path::Path;

use image::DynamicImage;
use tracing::instrument;

use crate::{util, Detection, DetectionMethod, Error, MaskRegion, Result};

pub trait TextDetector {
    /// Tag attached to the detections this backend produces.
    fn method(&self) -> DetectionMethod;

    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>>;
}

/// Serves a recorded batch of detections, whatever image it is given.
#[derive(Debug, Clone, Default)]
pub struct ReplayDetector {
    detections: Vec<Detection>,
    method: DetectionMethod,
}

impl ReplayDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            method: DetectionMethod::default(),
        }
    }

    pub fn with_method(mut self, method: DetectionMethod) -> Self {
        self.method = method;
        self
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(content)?))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let detector = Self::from_json(&content)?;
        log::debug!(
            "Loaded {} recorded detections from {}",
            detector.detections.len(),
            path.display()
        );
        Ok(detector)
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }
}

impl TextDetector for ReplayDetector {
    fn method(&self) -> DetectionMethod {
        self.method
    }

    fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>> {
        Ok(self.detections.clone())
    }
}

/// Stands in for a missing OCR engine.
#[derive(Debug, Clone)]
pub struct Unavailable {
    reason: String,
}

impl Unavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl TextDetector for Unavailable {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Primary
    }

    fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>> {
        Err(Error::DetectorUnavailable(self.reason.clone()))
    }
}

/// Runs `detector` on a crop of `image` and maps the results back to page coordinates.
#[instrument(level = "debug", skip(detector, image))]
pub fn detect_region(
    detector: &dyn TextDetector,
    image: &DynamicImage,
    region: &MaskRegion,
) -> Result<Vec<Detection>> {
    let (x, y, width, height) =
        util::crop_bounds(image, region).ok_or_else(|| Error::RegionOutOfBounds {
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
            image_width: image.width(),
            image_height: image.height(),
        })?;
    let crop = image.crop_imm(x, y, width, height);
    #[cfg(feature = "debug")]
    if let Err(err) = crop.save(format!("region_{x}_{y}.png")) {
        log::warn!("Failed to save region crop: {err}");
    }

    let detections = detector
        .detect(&crop)?
        .into_iter()
        .map(|detection| Detection {
            polygon: util::translate(&detection.polygon, x as f32, y as f32),
            method: DetectionMethod::Region,
            ..detection
        })
        .collect::<Vec<_>>();
    log::debug!("Region OCR found {} detections", detections.len());
    Ok(detections)
}

/// Appends `incoming` to `existing`, skipping detections whose polygon is already
/// present. Returns how many were added.
pub fn merge_batches(
    existing: &mut Vec<Detection>,
    incoming: impl IntoIterator<Item = Detection>,
) -> usize {
    let before = existing.len();
    for detection in incoming {
        if existing.iter().any(|it| it.polygon == detection.polygon) {
            log::trace!("Skipping repeated detection {:?}", detection.text);
            continue;
        }
        existing.push(detection);
    }
    existing.len() - before
}
