use std::collections::BTreeMap;

use float_ord::FloatOrd;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::instrument;

use crate::{Candidate, Category};

const COMPLEX_SYMBOLS: &[char] = &['Φ', '×', '°', '±', 'M', 'R'];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerParams {
    pub priority_weight: f32,
    pub confidence_weight: f32,
    pub length_weight: f32,
    pub complexity_weight: f32,
    pub min_score: f32,
    /// Keyed by category name; categories missing here score a priority of 0.
    /// Deserialized entries override the defaults one by one.
    #[serde(deserialize_with = "merge_priorities")]
    pub priorities: BTreeMap<String, f32>,
}

fn merge_priorities<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, f32>, D::Error> {
    let mut priorities = ScorerParams::default().priorities;
    priorities.extend(BTreeMap::<String, f32>::deserialize(deserializer)?);
    Ok(priorities)
}

impl Default for ScorerParams {
    fn default() -> Self {
        let priorities = [
            (Category::ThreadSpec, 10.0),
            (Category::Diameter, 9.0),
            (Category::Dimension, 8.0),
            (Category::Tolerance, 7.0),
            (Category::SurfaceRoughness, 6.0),
            (Category::Angle, 5.0),
            (Category::Number, 4.0),
            (Category::Material, 3.0),
            (Category::SurfaceTreatment, 3.0),
            (Category::Geometry, 2.5),
            (Category::Measurement, 2.0),
            (Category::Title, 1.5),
            (Category::Position, 1.0),
            (Category::Label, 0.8),
            (Category::Symbol, 0.6),
            (Category::Annotation, 0.4),
        ]
        .into_iter()
        .map(|(category, priority)| (category.as_str().to_string(), priority))
        .collect();
        Self {
            priority_weight: 0.4,
            confidence_weight: 0.3,
            length_weight: 0.2,
            complexity_weight: 0.1,
            min_score: 0.4,
            priorities,
        }
    }
}

/// Scored candidates split by the minimum score. Both lists are sorted best first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Ranking {
    pub accepted: Vec<Candidate>,
    pub dropped: Vec<Candidate>,
}

#[derive(Debug, Clone, Default)]
pub struct ResultScorer {
    params: ScorerParams,
}

impl ResultScorer {
    pub fn new(params: ScorerParams) -> Self {
        Self { params }
    }

    pub fn priority(&self, category: Category) -> f32 {
        self.params
            .priorities
            .get(category.as_str())
            .copied()
            .unwrap_or(0.0)
    }

    pub fn score(&self, candidate: &Candidate) -> f32 {
        let p = &self.params;
        let length_score = match candidate.text.chars().count() {
            1 => 0.7,
            2..=12 => 1.3,
            n if n > 20 => 0.8,
            _ => 1.0,
        };
        let complexity_score = if candidate.text.contains(COMPLEX_SYMBOLS) {
            1.2
        } else {
            1.0
        };
        p.priority_weight * self.priority(candidate.category)
            + p.confidence_weight * candidate.confidence
            + p.length_weight * length_score
            + p.complexity_weight * complexity_score
    }

    #[instrument(level = "debug", skip(self, candidates), fields(count = candidates.len()))]
    pub fn finalize(&self, mut candidates: Vec<Candidate>) -> Ranking {
        for candidate in &mut candidates {
            candidate.final_score = self.score(candidate);
        }
        candidates.sort_by_key(|it| std::cmp::Reverse(FloatOrd(it.final_score)));
        let (accepted, dropped): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .partition(|it| it.final_score >= self.params.min_score);
        log::debug!(
            "Kept {} candidates, dropped {} below score {}",
            accepted.len(),
            dropped.len(),
            self.params.min_score
        );
        Ranking { accepted, dropped }
    }
}
