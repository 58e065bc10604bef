use geo::{BoundingRect, Coord, EuclideanDistance, LineString, Point, Polygon, Rect};
use image::DynamicImage;

use crate::MaskRegion;

/// Mean of the polygon's vertices, not its area centroid.
pub fn vertex_mean(points: &[Coord<f32>]) -> Coord<f32> {
    coord_mean(points.iter().copied())
}

pub(crate) fn coord_mean(coords: impl IntoIterator<Item = Coord<f32>>) -> Coord<f32> {
    let (sum, count) = coords
        .into_iter()
        .fold((Coord::zero(), 0usize), |(sum, count), c| (sum + c, count + 1));
    if count == 0 {
        return Coord::zero();
    }
    sum / count as f32
}

pub fn bounding_rect(points: &[Coord<f32>]) -> Rect<f32> {
    LineString::new(points.to_vec())
        .bounding_rect()
        .unwrap_or_else(|| Rect::new(Coord::zero(), Coord::zero()))
}

pub(crate) fn polygon_rect(polygon: &Polygon<f32>) -> Rect<f32> {
    polygon
        .bounding_rect()
        .unwrap_or_else(|| Rect::new(Coord::zero(), Coord::zero()))
}

pub(crate) fn union_rect(rects: impl IntoIterator<Item = Rect<f32>>) -> Rect<f32> {
    rects
        .into_iter()
        .reduce(|a, b| {
            Rect::new(
                Coord {
                    x: a.min().x.min(b.min().x),
                    y: a.min().y.min(b.min().y),
                },
                Coord {
                    x: a.max().x.max(b.max().x),
                    y: a.max().y.max(b.max().y),
                },
            )
        })
        .unwrap_or_else(|| Rect::new(Coord::zero(), Coord::zero()))
}

/// Intersection over union of two axis-aligned boxes.
pub fn overlap_ratio(a: &Rect<f32>, b: &Rect<f32>) -> f32 {
    let width = (a.max().x.min(b.max().x) - a.min().x.max(b.min().x)).max(0.0);
    let height = (a.max().y.min(b.max().y) - a.min().y.max(b.min().y)).max(0.0);
    let intersection = width * height;
    let union = a.width() * a.height() + b.width() * b.height() - intersection;
    if union <= 0.0 {
        0.0
    } else {
        intersection / union
    }
}

pub fn distance(a: Coord<f32>, b: Coord<f32>) -> f32 {
    Point::from(a).euclidean_distance(&Point::from(b))
}

pub(crate) fn translate(points: &[Coord<f32>], dx: f32, dy: f32) -> Vec<Coord<f32>> {
    points
        .iter()
        .map(|c| Coord {
            x: c.x + dx,
            y: c.y + dy,
        })
        .collect()
}

/// Pixel-space crop of `region`, clamped to the image. `None` when nothing of the
/// region lies on the image.
pub(crate) fn crop_bounds(image: &DynamicImage, region: &MaskRegion) -> Option<(u32, u32, u32, u32)> {
    let x = region.x.max(0.0) as u32;
    let y = region.y.max(0.0) as u32;
    if x >= image.width() || y >= image.height() {
        return None;
    }
    let right = (region.x + region.width).max(0.0) as u32;
    let bottom = (region.y + region.height).max(0.0) as u32;
    let width = right.saturating_sub(x).clamp(0, image.width() - x);
    let height = bottom.saturating_sub(y).clamp(0, image.height() - y);
    if width == 0 || height == 0 {
        return None;
    }
    log::trace!("Slicing subimage to ({x}, {y}, {width}, {height})");
    Some((x, y, width, height))
}
