use geo::{Coord, Intersects};
use tracing::instrument;

use crate::{util, MaskRegion};

/// True iff the polygon's vertex centroid lies inside any mask rectangle, bounds
/// inclusive. Boxes straddling a mask edge survive unless their centre is covered.
#[instrument(level = "trace", skip(polygon, masks))]
pub fn is_masked(polygon: &[Coord<f32>], masks: &[MaskRegion]) -> bool {
    if masks.is_empty() || polygon.is_empty() {
        return false;
    }
    let center = util::vertex_mean(polygon);
    masks.iter().any(|mask| mask.to_rect().intersects(&center))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f32, y: f32, side: f32) -> Vec<Coord<f32>> {
        vec![
            Coord { x, y },
            Coord { x: x + side, y },
            Coord {
                x: x + side,
                y: y + side,
            },
            Coord { x, y: y + side },
        ]
    }

    #[test]
    fn centre_inside_is_masked() {
        let masks = [MaskRegion::new(0.0, 0.0, 100.0, 100.0)];
        assert!(is_masked(&square(40.0, 40.0, 20.0), &masks));
    }

    #[test]
    fn straddling_box_with_centre_outside_survives() {
        let masks = [MaskRegion::new(0.0, 0.0, 100.0, 100.0)];
        assert!(!is_masked(&square(90.0, 40.0, 30.0), &masks));
    }

    #[test]
    fn boundary_is_inclusive() {
        let masks = [MaskRegion::new(0.0, 0.0, 100.0, 100.0)];
        assert!(is_masked(&square(90.0, 90.0, 20.0), &masks));
    }

    #[test]
    fn any_mask_suffices() {
        let masks = [
            MaskRegion::new(500.0, 500.0, 10.0, 10.0),
            MaskRegion::new(0.0, 0.0, 100.0, 100.0),
        ];
        assert!(is_masked(&square(10.0, 10.0, 10.0), &masks));
        assert!(!is_masked(&square(200.0, 200.0, 10.0), &masks));
        assert!(!is_masked(&square(10.0, 10.0, 10.0), &[]));
    }
}
