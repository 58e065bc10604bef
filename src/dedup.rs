//! Collapses near-identical detections produced by overlapping detection strategies.

use std::collections::BTreeMap;

use float_ord::FloatOrd;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{util, Candidate};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupParams {
    pub cell_size: f32,
    pub near_distance: f32,
    pub far_distance: f32,
    pub strong_overlap: f32,
    pub weak_overlap: f32,
    pub min_similarity: f64,
    pub short_text_max_chars: usize,
    /// Members below this confidence never supply the representative text.
    pub text_min_confidence: f32,
    /// Members below this fraction of the group maximum never supply the text.
    pub text_relative_confidence: f32,
}

impl Default for DedupParams {
    fn default() -> Self {
        Self {
            cell_size: 20.0,
            near_distance: 15.0,
            far_distance: 25.0,
            strong_overlap: 0.5,
            weak_overlap: 0.3,
            min_similarity: 0.75,
            short_text_max_chars: 3,
            text_min_confidence: 0.3,
            text_relative_confidence: 0.6,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DuplicateMerger {
    params: DedupParams,
}

impl DuplicateMerger {
    pub fn new(params: DedupParams) -> Self {
        Self { params }
    }

    #[instrument(level = "debug", skip(self, candidates), fields(count = candidates.len()))]
    pub fn merge(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let mut cells = BTreeMap::<(i64, i64), Vec<usize>>::new();
        for (i, candidate) in candidates.iter().enumerate() {
            cells.entry(self.cell_key(candidate)).or_default().push(i);
        }

        let mut merged = Vec::with_capacity(candidates.len());
        for members in cells.values() {
            for group in self.group_cell(&candidates, members) {
                let group = group.iter().map(|&i| &candidates[i]).collect::<Vec<_>>();
                merged.push(self.collapse(&group));
            }
        }
        log::debug!(
            "Collapsed {} candidates into {} after duplicate merging",
            candidates.len(),
            merged.len()
        );
        merged
    }

    fn cell_key(&self, candidate: &Candidate) -> (i64, i64) {
        let size = self.params.cell_size;
        let snap = |v: f32| ((v / size).round() * size) as i64;
        (snap(candidate.center.x), snap(candidate.center.y))
    }

    /// Connected components of the pairwise merge relation within one cell.
    fn group_cell(&self, candidates: &[Candidate], members: &[usize]) -> Vec<Vec<usize>> {
        let mut groups = DisjointSet::new(members.len());
        for a in 0..members.len() {
            for b in a + 1..members.len() {
                if self.should_merge(&candidates[members[a]], &candidates[members[b]]) {
                    groups.union(a, b);
                }
            }
        }
        groups
            .groups()
            .into_iter()
            .map(|group| group.into_iter().map(|i| members[i]).collect())
            .collect()
    }

    pub fn should_merge(&self, a: &Candidate, b: &Candidate) -> bool {
        let p = &self.params;
        let distance = util::distance(a.center, b.center);
        let overlap = util::overlap_ratio(&a.bbox(), &b.bbox());
        let similar = || self.text_similar(&a.text, &b.text);
        (distance < p.near_distance && similar())
            || overlap > p.strong_overlap
            || (distance < p.far_distance && overlap > p.weak_overlap && similar())
    }

    pub fn text_similar(&self, a: &str, b: &str) -> bool {
        if a == b || a.contains(b) || b.contains(a) {
            return true;
        }
        let (len_a, len_b) = (a.chars().count(), b.chars().count());
        let max = self.params.short_text_max_chars;
        if len_a <= max && len_b <= max && len_a.abs_diff(len_b) <= 1 {
            return true;
        }
        strsim::normalized_levenshtein(a, b) > self.params.min_similarity
    }

    fn collapse(&self, group: &[&Candidate]) -> Candidate {
        if let [single] = group {
            return (*single).clone();
        }
        let best = group
            .iter()
            .max_by_key(|it| FloatOrd(it.confidence))
            .copied()
            .unwrap_or(group[0]);
        let floor = self
            .params
            .text_min_confidence
            .max(best.confidence * self.params.text_relative_confidence);
        let representative = group
            .iter()
            .filter(|it| it.confidence > self.params.text_min_confidence && it.confidence >= floor)
            .max_by_key(|it| (it.text.chars().count(), FloatOrd(it.confidence)))
            .copied()
            .unwrap_or(best);
        log::trace!(
            "Merging {:?} into {:?}",
            group.iter().map(|it| it.text.as_str()).collect::<Vec<_>>(),
            representative.text
        );
        Candidate::union(group, representative.text.clone(), representative.category)
    }
}

/// Union-find over `0..len`.
pub(crate) struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    pub(crate) fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    pub(crate) fn union(&mut self, a: usize, b: usize) {
        let (a, b) = (self.find(a), self.find(b));
        if a != b {
            self.parent[a.max(b)] = a.min(b);
        }
    }

    /// Components in order of their smallest member.
    pub(crate) fn groups(mut self) -> Vec<Vec<usize>> {
        let mut by_root = BTreeMap::<usize, Vec<usize>>::new();
        for i in 0..self.parent.len() {
            let root = self.find(i);
            by_root.entry(root).or_default().push(i);
        }
        by_root.into_values().collect()
    }
}
