//! Helpers for callers that turn ranked candidates into persistent annotations.

use std::collections::BTreeMap;

use float_ord::FloatOrd;
use geo::{Coord, Polygon};
use serde::Serialize;

use crate::{parse, util, Candidate, Category, DimensionType, ParsedAnnotation};

const ANCHOR_OFFSET: f32 = 0.2;
const ROW_BAND: f32 = 50.0;
const RIGHT_SIDE_MAX_DY: f32 = 20.0;
const MAX_MATCH_DISTANCE: f32 = 80.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Style {
    #[default]
    Default,
    Error,
    Success,
    Warning,
}

impl Style {
    pub fn for_category(category: Category) -> Self {
        match category {
            Category::ThreadSpec | Category::Title => Style::Error,
            Category::Diameter | Category::Material | Category::Geometry => Style::Success,
            Category::Tolerance
            | Category::SurfaceRoughness
            | Category::Angle
            | Category::SurfaceTreatment
            | Category::Position
            | Category::Symbol => Style::Warning,
            _ => Style::Default,
        }
    }
}

/// Everything an annotation needs when it is created from a candidate.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotationDraft {
    pub anchor: Coord<f32>,
    pub original_text: String,
    pub parsed: ParsedAnnotation,
    pub category: Category,
    pub style: Style,
    pub outline: Polygon<f32>,
}

impl AnnotationDraft {
    pub fn from_candidate(candidate: &Candidate) -> Self {
        let bbox = candidate.bbox();
        let anchor = Coord {
            x: bbox.max().x + bbox.width() * ANCHOR_OFFSET,
            y: candidate.center.y,
        };
        let mut parsed = parse(&candidate.text);
        if !parsed.dimension.is_empty() && parsed.dimension_type == DimensionType::Unspecified {
            parsed.dimension_type = DimensionType::Linear;
        }
        Self {
            anchor,
            original_text: candidate.text.clone(),
            parsed,
            category: candidate.category,
            style: Style::for_category(candidate.category),
            outline: candidate.polygon.clone(),
        }
    }
}

/// 1-based sequence numbers for `anchors`, top-to-bottom in 50-unit row bands and
/// left-to-right within a band. The result is aligned with the input.
pub fn reading_order(anchors: &[Coord<f32>]) -> Vec<usize> {
    let mut order = (0..anchors.len()).collect::<Vec<_>>();
    order.sort_by_key(|&i| {
        let anchor = anchors[i];
        ((anchor.y / ROW_BAND).floor() as i64, FloatOrd(anchor.x))
    });
    let mut numbers = vec![0; anchors.len()];
    for (seq, i) in order.into_iter().enumerate() {
        numbers[i] = seq + 1;
    }
    numbers
}

/// Index of the candidate an annotation was created from.
///
/// A candidate whose text equals `original_text` (exactly or after trimming) wins
/// outright. Otherwise the nearest centre to `anchor` is taken, counting half the
/// distance for boxes the anchor sits just right of, as long as it is within 80 units.
pub fn find_matching(
    candidates: &[Candidate],
    anchor: Coord<f32>,
    original_text: Option<&str>,
) -> Option<usize> {
    if let Some(original) = original_text {
        let exact = candidates.iter().position(|it| {
            it.text == original || it.text.trim() == original.trim()
        });
        if exact.is_some() {
            return exact;
        }
    }

    candidates
        .iter()
        .enumerate()
        .map(|(i, candidate)| {
            let mut distance = util::distance(candidate.center, anchor);
            if anchor.x > candidate.bbox().max().x
                && (anchor.y - candidate.center.y).abs() < RIGHT_SIDE_MAX_DY
            {
                distance *= 0.5;
            }
            (i, distance)
        })
        .min_by_key(|(_, distance)| FloatOrd(*distance))
        .filter(|(_, distance)| *distance < MAX_MATCH_DISTANCE)
        .map(|(i, _)| i)
}

pub fn category_counts(candidates: &[Candidate]) -> BTreeMap<Category, usize> {
    let mut counts = BTreeMap::new();
    for candidate in candidates {
        *counts.entry(candidate.category).or_insert(0) += 1;
    }
    counts
}

pub fn filter_by_category(candidates: &[Candidate], category: Category) -> Vec<&Candidate> {
    candidates
        .iter()
        .filter(|it| it.category == category)
        .collect()
}
