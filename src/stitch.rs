//! Reassembles logical annotations that the recognizer split across several boxes.
//!
//! Drawings typeset tolerances as small figures to the right of the base value, or
//! stacked above/below it when the dimension runs vertically. Each figure comes back
//! as its own detection. Fragments are linked in four passes over the
//! `(center_y, center_x)`-sorted candidates:
//!
//! 0. bare diameter symbols (`Φ` with no numeral) attach to the nearest number on
//!    their right,
//! 1. vertical tolerance fragments within reach of each other are paired,
//! 2. every tolerance links to up to [`StitchParams::max_links`] nearest numbers,
//! 3. tolerances still alone try a single best number or diameter.
//!
//! Groups without a tolerance (or bare symbol) are never merged, so unrelated numbers
//! sitting close together stay separate.

use float_ord::FloatOrd;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{classify, dedup::DisjointSet, Candidate};

static NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(\.\d+)?$").unwrap());
static SIGNED_INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+\-±]\d+$").unwrap());
static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchParams {
    /// Height/width ratio from which a box counts as vertical text.
    pub vertical_aspect: f32,
    pub vertical_min_height: f32,
    pub vertical_max_dx: f32,
    pub vertical_max_dy: f32,
    pub horizontal_max_dx: f32,
    pub horizontal_max_dy: f32,
    pub max_links: usize,
    pub symbol_max_dx: f32,
    pub symbol_max_dy: f32,
}

impl Default for StitchParams {
    fn default() -> Self {
        Self {
            vertical_aspect: 1.5,
            vertical_min_height: 30.0,
            vertical_max_dx: 50.0,
            vertical_max_dy: 150.0,
            horizontal_max_dx: 200.0,
            horizontal_max_dy: 70.0,
            max_links: 3,
            symbol_max_dx: 60.0,
            symbol_max_dy: 20.0,
        }
    }
}

/// Text-pattern role of a fragment during stitching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Tolerance,
    Diameter,
    Numeric,
    Other,
}

impl Role {
    pub fn of(text: &str) -> Self {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some('+' | '-' | '±'), _) => Role::Tolerance,
            (Some('0'), None) => Role::Tolerance,
            (Some('0'), Some(c)) if c.is_ascii_digit() || c == '.' => Role::Tolerance,
            (Some('Φ' | '∅' | 'Ø' | 'ø'), _) => Role::Diameter,
            _ if NUMERIC.is_match(text) => Role::Numeric,
            _ => Role::Other,
        }
    }
}

/// Horizontal reading order of tolerance figures: `0`, `±`, `+`, `-`.
fn tolerance_rank(text: &str) -> u8 {
    match text.chars().next() {
        Some('±') => 1,
        Some('+') => 2,
        Some('-') => 3,
        _ => 0,
    }
}

struct Fragment<'a> {
    candidate: &'a Candidate,
    role: Role,
    vertical: bool,
}

impl Fragment<'_> {
    fn text(&self) -> &str {
        &self.candidate.text
    }

    fn x(&self) -> f32 {
        self.candidate.center.x
    }

    fn y(&self) -> f32 {
        self.candidate.center.y
    }

    fn is_bare_symbol(&self) -> bool {
        self.role == Role::Diameter && !self.text().chars().any(|c| c.is_ascii_digit())
    }
}

#[derive(Debug, Clone, Default)]
pub struct AdjacencyMerger {
    params: StitchParams,
}

impl AdjacencyMerger {
    pub fn new(params: StitchParams) -> Self {
        Self { params }
    }

    pub fn is_vertical_text(&self, candidate: &Candidate) -> bool {
        candidate.bbox_height >= self.params.vertical_aspect * candidate.bbox_width
            && candidate.bbox_height > self.params.vertical_min_height
    }

    #[instrument(level = "debug", skip(self, candidates), fields(count = candidates.len()))]
    pub fn stitch(&self, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates.sort_by_key(|it| (FloatOrd(it.center.y), FloatOrd(it.center.x)));
        let fragments = candidates
            .iter()
            .map(|candidate| Fragment {
                candidate,
                role: Role::of(&candidate.text),
                vertical: self.is_vertical_text(candidate),
            })
            .collect::<Vec<_>>();

        let mut links = Links::new(fragments.len());
        self.attach_symbols(&fragments, &mut links);
        self.pair_vertical_tolerances(&fragments, &mut links);
        self.link_tolerances(&fragments, &mut links);
        self.pair_residual_tolerances(&fragments, &mut links);

        let stitched = links
            .groups
            .groups()
            .into_iter()
            .flat_map(|group| self.emit(&fragments, &group))
            .collect::<Vec<_>>();
        log::debug!(
            "Stitched {} candidates into {}",
            candidates.len(),
            stitched.len()
        );
        stitched
    }

    fn attach_symbols(&self, fragments: &[Fragment], links: &mut Links) {
        let p = &self.params;
        for (i, symbol) in fragments.iter().enumerate() {
            if !symbol.is_bare_symbol() {
                continue;
            }
            let nearest = fragments
                .iter()
                .enumerate()
                .filter(|(_, it)| it.role == Role::Numeric)
                .filter_map(|(j, number)| {
                    let dx = number.x() - symbol.x();
                    let dy = (number.y() - symbol.y()).abs();
                    (dx > 0.0 && dx < p.symbol_max_dx && dy < p.symbol_max_dy)
                        .then_some((j, dx + 2.0 * dy))
                })
                .min_by_key(|(_, distance)| FloatOrd(*distance));
            if let Some((j, _)) = nearest {
                links.join(i, j);
            }
        }
    }

    fn pair_vertical_tolerances(&self, fragments: &[Fragment], links: &mut Links) {
        let p = &self.params;
        for (i, a) in fragments.iter().enumerate() {
            if !(a.vertical && a.role == Role::Tolerance) {
                continue;
            }
            for (j, b) in fragments.iter().enumerate().skip(i + 1) {
                if !(b.vertical && b.role == Role::Tolerance) {
                    continue;
                }
                if (a.x() - b.x()).abs() < p.vertical_max_dx
                    && (a.y() - b.y()).abs() < p.vertical_max_dy
                {
                    links.join(i, j);
                }
            }
        }
    }

    fn link_tolerances(&self, fragments: &[Fragment], links: &mut Links) {
        for (i, tolerance) in fragments.iter().enumerate() {
            if tolerance.role != Role::Tolerance {
                continue;
            }
            let matches = self.nearest(fragments, tolerance, |role| role == Role::Numeric);
            for (j, _) in matches.into_iter().take(self.params.max_links) {
                links.join(i, j);
            }
        }
    }

    fn pair_residual_tolerances(&self, fragments: &[Fragment], links: &mut Links) {
        for (i, tolerance) in fragments.iter().enumerate() {
            if tolerance.role != Role::Tolerance || links.linked[i] {
                continue;
            }
            let best = self
                .nearest(fragments, tolerance, |role| {
                    matches!(role, Role::Numeric | Role::Diameter)
                })
                .into_iter()
                .next();
            if let Some((j, _)) = best {
                links.join(i, j);
            }
        }
    }

    /// Reachable fragments accepted by `accept`, nearest first.
    fn nearest(
        &self,
        fragments: &[Fragment],
        tolerance: &Fragment,
        accept: impl Fn(Role) -> bool,
    ) -> Vec<(usize, f32)> {
        let mut found = fragments
            .iter()
            .enumerate()
            .filter(|(_, it)| accept(it.role))
            .filter_map(|(j, it)| Some((j, self.link_distance(tolerance, it)?)))
            .collect::<Vec<_>>();
        found.sort_by_key(|(_, distance)| FloatOrd(*distance));
        found
    }

    /// Weighted distance from a tolerance to a base fragment, if within reach.
    fn link_distance(&self, tolerance: &Fragment, base: &Fragment) -> Option<f32> {
        let p = &self.params;
        let dx = tolerance.x() - base.x();
        let dy = (tolerance.y() - base.y()).abs();
        if tolerance.vertical || base.vertical {
            (dx.abs() < p.vertical_max_dx && dy < p.vertical_max_dy)
                .then_some(2.0 * dx.abs() + dy)
        } else {
            (dx > 0.0 && dx < p.horizontal_max_dx && dy < p.horizontal_max_dy)
                .then_some(dx + 2.0 * dy)
        }
    }

    fn emit(&self, fragments: &[Fragment], group: &[usize]) -> Vec<Candidate> {
        let members = group.iter().map(|&i| &fragments[i]).collect::<Vec<_>>();
        let joinable = members.len() > 1
            && members
                .iter()
                .any(|it| it.role == Role::Tolerance || it.is_bare_symbol());
        if !joinable {
            return members.iter().map(|it| it.candidate.clone()).collect();
        }
        let text = assemble(&members);
        log::debug!(
            "Stitching {:?} into {text:?}",
            members.iter().map(|it| it.text()).collect::<Vec<_>>()
        );
        let category = classify(&text);
        let candidates = members.iter().map(|it| it.candidate).collect::<Vec<_>>();
        vec![Candidate::union(&candidates, text, category)]
    }
}

/// Orders the members of one group and concatenates their texts.
fn assemble(members: &[&Fragment]) -> String {
    let vertical = members.iter().any(|it| it.vertical);

    let mut diameters = members
        .iter()
        .filter(|it| it.role == Role::Diameter)
        .collect::<Vec<_>>();
    diameters.sort_by_key(|it| FloatOrd(it.x()));
    let embedded = diameters
        .iter()
        .filter(|it| it.text().chars().any(|c| c.is_ascii_digit()))
        .map(|it| it.text())
        .collect::<Vec<_>>();

    let mut numbers = members
        .iter()
        .filter(|it| it.role == Role::Numeric)
        .filter(|it| !embedded.iter().any(|d| d.contains(it.text())))
        .collect::<Vec<_>>();
    numbers.sort_by_key(|it| FloatOrd(it.x()));

    let mut tolerances = members
        .iter()
        .filter(|it| it.role == Role::Tolerance)
        .collect::<Vec<_>>();
    if vertical {
        tolerances.sort_by_key(|it| (FloatOrd(it.y()), FloatOrd(it.x())));
    } else {
        tolerances.sort_by_key(|it| {
            (
                tolerance_rank(it.text()),
                FloatOrd(it.y()),
                FloatOrd(it.x()),
            )
        });
    }

    let mut text = String::new();
    let mut previous: Option<&Fragment> = None;
    for piece in diameters.into_iter().chain(numbers).chain(tolerances) {
        if let Some(prev) = previous {
            if vertical && SIGNED_INTEGER.is_match(prev.text()) && DIGITS.is_match(piece.text()) {
                // a decimal the recognizer split at the point
                text.push('.');
            } else if piece.role == Role::Tolerance
                && text.chars().last().is_some_and(|c| c.is_ascii_digit())
            {
                text.push(' ');
            }
        }
        text.push_str(piece.text());
        previous = Some(*piece);
    }
    text
}

struct Links {
    groups: DisjointSet,
    linked: Vec<bool>,
}

impl Links {
    fn new(len: usize) -> Self {
        Self {
            groups: DisjointSet::new(len),
            linked: vec![false; len],
        }
    }

    fn join(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.groups.union(a, b);
        self.linked[a] = true;
        self.linked[b] = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Detection;

    fn candidate(index: usize, text: &str, x: f32, y: f32, w: f32, h: f32) -> Candidate {
        let detection = Detection::new(
            [
                (x - w / 2.0, y - h / 2.0),
                (x + w / 2.0, y - h / 2.0),
                (x + w / 2.0, y + h / 2.0),
                (x - w / 2.0, y + h / 2.0),
            ],
            text,
            0.9,
        );
        Candidate::from_detection(index, &detection, text.to_string(), classify(text))
    }

    #[test]
    fn roles() {
        assert_eq!(Role::of("+0.02"), Role::Tolerance);
        assert_eq!(Role::of("-0.01"), Role::Tolerance);
        assert_eq!(Role::of("±0.1"), Role::Tolerance);
        assert_eq!(Role::of("0"), Role::Tolerance);
        assert_eq!(Role::of("03"), Role::Tolerance);
        assert_eq!(Role::of("0.05"), Role::Tolerance);
        assert_eq!(Role::of("Φ20"), Role::Diameter);
        assert_eq!(Role::of("20"), Role::Numeric);
        assert_eq!(Role::of("12.5"), Role::Numeric);
        assert_eq!(Role::of("M8"), Role::Other);
    }

    #[test]
    fn bare_diameter_symbol_joins_number() {
        let stitched = AdjacencyMerger::default().stitch(vec![
            candidate(0, "Φ", 100.0, 100.0, 12.0, 14.0),
            candidate(1, "20", 115.0, 102.0, 16.0, 14.0),
        ]);
        assert_eq!(stitched.len(), 1);
        assert_eq!(stitched[0].text, "Φ20");
        assert_eq!(stitched[0].category, crate::Category::Diameter);
        assert_eq!(stitched[0].sources, vec![0, 1]);
    }

    #[test]
    fn horizontal_tolerances_follow_base_value() {
        let stitched = AdjacencyMerger::default().stitch(vec![
            candidate(0, "-0.01", 140.0, 106.0, 30.0, 10.0),
            candidate(1, "20", 100.0, 100.0, 24.0, 14.0),
            candidate(2, "+0.02", 140.0, 94.0, 30.0, 10.0),
        ]);
        assert_eq!(stitched.len(), 1);
        assert_eq!(stitched[0].text, "20 +0.02 -0.01");
        assert_eq!(stitched[0].confidence, 0.9);
    }

    #[test]
    fn zero_lower_tolerance_is_read_first() {
        let stitched = AdjacencyMerger::default().stitch(vec![
            candidate(0, "Φ20", 100.0, 100.0, 30.0, 14.0),
            candidate(1, "+0.02", 150.0, 94.0, 30.0, 10.0),
            candidate(2, "0", 145.0, 106.0, 10.0, 10.0),
        ]);
        assert_eq!(stitched.len(), 1);
        assert_eq!(stitched[0].text, "Φ20 0 +0.02");
    }

    #[test]
    fn vertical_decimal_fragments_rejoin() {
        let stitched = AdjacencyMerger::default().stitch(vec![
            candidate(0, "03", 105.0, 80.0, 10.0, 40.0),
            candidate(1, "+0", 100.0, 50.0, 10.0, 40.0),
        ]);
        assert_eq!(stitched.len(), 1);
        assert_eq!(stitched[0].text, "+0.03");
    }

    #[test]
    fn numbers_without_tolerance_stay_apart() {
        let stitched = AdjacencyMerger::default().stitch(vec![
            candidate(0, "20", 100.0, 100.0, 24.0, 14.0),
            candidate(1, "35", 140.0, 100.0, 24.0, 14.0),
        ]);
        assert_eq!(stitched.len(), 2);
    }

    #[test]
    fn tolerance_left_of_base_is_not_linked() {
        let stitched = AdjacencyMerger::default().stitch(vec![
            candidate(0, "+0.02", 60.0, 100.0, 30.0, 10.0),
            candidate(1, "20", 100.0, 100.0, 24.0, 14.0),
        ]);
        assert_eq!(stitched.len(), 2);
    }

    #[test]
    fn residual_tolerance_pairs_with_diameter() {
        let stitched = AdjacencyMerger::default().stitch(vec![
            candidate(0, "Φ35", 100.0, 100.0, 40.0, 14.0),
            candidate(1, "±0.05", 150.0, 100.0, 36.0, 12.0),
        ]);
        assert_eq!(stitched.len(), 1);
        assert_eq!(stitched[0].text, "Φ35 ±0.05");
    }

    #[test]
    fn every_source_survives_exactly_once() {
        let input = vec![
            candidate(0, "20", 100.0, 100.0, 24.0, 14.0),
            candidate(1, "+0.02", 140.0, 94.0, 30.0, 10.0),
            candidate(2, "Ra3.2", 400.0, 300.0, 40.0, 14.0),
            candidate(3, "35", 600.0, 100.0, 24.0, 14.0),
            candidate(4, "-0.01", 640.0, 106.0, 30.0, 10.0),
        ];
        let mut sources = AdjacencyMerger::default()
            .stitch(input)
            .into_iter()
            .flat_map(|it| it.sources)
            .collect::<Vec<_>>();
        sources.sort_unstable();
        assert_eq!(sources, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn tolerance_links_at_most_three_numbers() {
        let stitched = AdjacencyMerger::default().stitch(vec![
            candidate(0, "+0.1", 300.0, 100.0, 30.0, 10.0),
            candidate(1, "11", 260.0, 100.0, 20.0, 12.0),
            candidate(2, "22", 220.0, 100.0, 20.0, 12.0),
            candidate(3, "33", 180.0, 100.0, 20.0, 12.0),
            candidate(4, "44", 140.0, 100.0, 20.0, 12.0),
        ]);
        let mut texts = stitched.iter().map(|it| it.text.as_str()).collect::<Vec<_>>();
        texts.sort_unstable();
        assert_eq!(texts, vec!["332211 +0.1", "44"]);
    }

    #[test]
    fn vertical_base_links_stacked_tolerances() {
        let stitched = AdjacencyMerger::default().stitch(vec![
            candidate(0, "20", 100.0, 100.0, 14.0, 40.0),
            candidate(1, "+0.02", 105.0, 60.0, 30.0, 10.0),
            candidate(2, "-0.01", 105.0, 140.0, 30.0, 10.0),
        ]);
        assert_eq!(stitched.len(), 1);
        assert_eq!(stitched[0].text, "20 +0.02 -0.01");
        assert!(stitched[0].is_vertical);
        assert_eq!(stitched[0].sources, vec![0, 1, 2]);
    }
}
