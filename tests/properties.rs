use drawing_ocr::{
    classify, dedup::DuplicateMerger, gate::ConfidenceGate, mask::is_masked, normalize,
    stitch::AdjacencyMerger, util, Detection, MaskRegion, ReconcilerBuilder,
};
use geo::Coord;
use proptest::prelude::*;

const TEXTS: &[&str] = &[
    "M8", "M8", "Φ20", "20", "+0.02", "-0.01", "0", "03", "+0", "Ra3.2", "45°", "Q235",
    "H7", "Φ", "±0.05", "SECTION A-A", "12.5",
];

fn detection() -> impl Strategy<Value = Detection> {
    (
        prop::sample::select(TEXTS),
        0.0f32..400.0,
        0.0f32..400.0,
        8.0f32..60.0,
        6.0f32..60.0,
        0.5f32..1.0,
    )
        .prop_map(|(text, x, y, w, h, confidence)| {
            Detection::new(
                [(x, y), (x + w, y), (x + w, y + h), (x, y + h)],
                text,
                confidence,
            )
        })
}

proptest! {
    #[test]
    fn classification_is_stable_under_renormalization(raw in "[0-9OoIlSBGDMmWNHxX*Φø∅+\\-±.,° a-zA-Z]{0,12}") {
        let once = normalize(&raw);
        prop_assert_eq!(classify(&once), classify(&normalize(&once)));
    }

    #[test]
    fn merging_partitions_the_batch(detections in prop::collection::vec(detection(), 0..24)) {
        let reconciler = ReconcilerBuilder::new().build();
        let (candidates, _) = reconciler.prepare(&detections, &[]);
        let mut expected = candidates.iter().flat_map(|it| it.sources.clone()).collect::<Vec<_>>();
        expected.sort_unstable();

        let merged = AdjacencyMerger::default().stitch(DuplicateMerger::default().merge(candidates));
        let mut sources = merged.iter().flat_map(|it| it.sources.clone()).collect::<Vec<_>>();
        sources.sort_unstable();
        prop_assert_eq!(&sources, &expected);

        for candidate in &merged {
            let outline = candidate.bbox();
            for &i in &candidate.sources {
                let member = util::bounding_rect(&detections[i].polygon);
                prop_assert!(member.min().x >= outline.min().x - 1e-3);
                prop_assert!(member.min().y >= outline.min().y - 1e-3);
                prop_assert!(member.max().x <= outline.max().x + 1e-3);
                prop_assert!(member.max().y <= outline.max().y + 1e-3);
            }
        }
    }

    #[test]
    fn masking_follows_the_centroid(
        x in -500.0f32..500.0,
        y in -500.0f32..500.0,
        width in 1.0f32..300.0,
        height in 1.0f32..300.0,
        fx in 0.01f32..0.99,
        fy in 0.01f32..0.99,
        outside in 1.0f32..200.0,
    ) {
        let masks = [MaskRegion::new(x, y, width, height)];
        let square = |cx: f32, cy: f32| vec![
            Coord { x: cx - 1.0, y: cy - 1.0 },
            Coord { x: cx + 1.0, y: cy - 1.0 },
            Coord { x: cx + 1.0, y: cy + 1.0 },
            Coord { x: cx - 1.0, y: cy + 1.0 },
        ];
        prop_assert!(is_masked(&square(x + width * fx, y + height * fy), &masks));
        prop_assert!(!is_masked(&square(x + width + outside, y + height * fy), &masks));
        prop_assert!(!is_masked(&square(x + width * fx, y - outside), &masks));
    }

    #[test]
    fn thresholds_are_monotonic_in_area(
        text in "[A-Za-z0-9]{1,16}",
        small in (0.0f32..150.0, 0.0f32..150.0),
        large in (1000.1f32..1.0e6, 1000.1f32..1.0e6),
    ) {
        let gate = ConfidenceGate::default();
        let (a, b) = (small.0.min(small.1), small.0.max(small.1));
        prop_assert!(gate.min_confidence(&text, a) <= gate.min_confidence(&text, b));
        let (a, b) = (large.0.min(large.1), large.0.max(large.1));
        prop_assert!(gate.min_confidence(&text, a) >= gate.min_confidence(&text, b));
    }
}
