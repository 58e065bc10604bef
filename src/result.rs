use std::fmt;

use geo::{Coord, Polygon};
use serde::{Deserialize, Serialize};

use crate::util;

/// Which detection strategy produced a [`Detection`]. Only used for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    #[default]
    Primary,
    Backup,
    FullImage,
    DirectRecognition,
    Region,
}

/// One raw OCR engine output unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub polygon: Vec<Coord<f32>>,
    pub text: String,
    pub confidence: f32,
    #[serde(default)]
    pub method: DetectionMethod,
}

impl Detection {
    pub fn new(
        polygon: impl IntoIterator<Item = (f32, f32)>,
        text: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            polygon: polygon.into_iter().map(|(x, y)| Coord { x, y }).collect(),
            text: text.into(),
            confidence,
            method: DetectionMethod::default(),
        }
    }

    pub fn with_method(mut self, method: DetectionMethod) -> Self {
        self.method = method;
        self
    }

    /// Whether the detection carries enough well-formed data to enter the pipeline.
    pub fn is_well_formed(&self) -> bool {
        self.polygon.len() >= 4
            && self
                .polygon
                .iter()
                .all(|c| c.x.is_finite() && c.y.is_finite())
            && self.confidence.is_finite()
            && (0.0..=1.0).contains(&self.confidence)
    }

    pub fn center(&self) -> Coord<f32> {
        util::vertex_mean(&self.polygon)
    }
}

/// User-defined rectangle that suppresses detections centred inside it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl MaskRegion {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn to_rect(&self) -> geo::Rect<f32> {
        geo::Rect::new(
            Coord {
                x: self.x,
                y: self.y,
            },
            Coord {
                x: self.x + self.width,
                y: self.y + self.height,
            },
        )
    }
}

/// Fixed taxonomy of mechanical annotation types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ThreadSpec,
    Diameter,
    Dimension,
    Angle,
    SurfaceRoughness,
    Tolerance,
    Number,
    Material,
    SurfaceTreatment,
    Geometry,
    Position,
    Title,
    Label,
    Symbol,
    Measurement,
    Annotation,
}

impl Category {
    pub const ALL: [Category; 16] = [
        Category::ThreadSpec,
        Category::Diameter,
        Category::Dimension,
        Category::Angle,
        Category::SurfaceRoughness,
        Category::Tolerance,
        Category::Number,
        Category::Material,
        Category::SurfaceTreatment,
        Category::Geometry,
        Category::Position,
        Category::Title,
        Category::Label,
        Category::Symbol,
        Category::Measurement,
        Category::Annotation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ThreadSpec => "thread_spec",
            Category::Diameter => "diameter",
            Category::Dimension => "dimension",
            Category::Angle => "angle",
            Category::SurfaceRoughness => "surface_roughness",
            Category::Tolerance => "tolerance",
            Category::Number => "number",
            Category::Material => "material",
            Category::SurfaceTreatment => "surface_treatment",
            Category::Geometry => "geometry",
            Category::Position => "position",
            Category::Title => "title",
            Category::Label => "label",
            Category::Symbol => "symbol",
            Category::Measurement => "measurement",
            Category::Annotation => "annotation",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A post-pipeline unit representing one probable logical annotation.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub text: String,
    pub confidence: f32,
    pub center: Coord<f32>,
    pub bbox_width: f32,
    pub bbox_height: f32,
    pub polygon: Polygon<f32>,
    pub category: Category,
    pub is_vertical: bool,
    pub final_score: f32,
    /// Indices into the input detection batch this candidate was built from.
    pub sources: Vec<usize>,
    pub methods: Vec<DetectionMethod>,
}

impl Candidate {
    /// Lifts a single cleaned detection into a candidate.
    pub(crate) fn from_detection(
        index: usize,
        detection: &Detection,
        text: String,
        category: Category,
    ) -> Self {
        let rect = util::bounding_rect(&detection.polygon);
        Self {
            text,
            confidence: detection.confidence,
            center: detection.center(),
            bbox_width: rect.width(),
            bbox_height: rect.height(),
            polygon: rect.to_polygon(),
            category,
            is_vertical: rect.height() >= rect.width(),
            final_score: 0.0,
            sources: vec![index],
            methods: vec![detection.method],
        }
    }

    pub fn bbox(&self) -> geo::Rect<f32> {
        util::polygon_rect(&self.polygon)
    }

    pub fn bbox_area(&self) -> f32 {
        self.bbox_width * self.bbox_height
    }

    /// Builds a candidate covering every member: union box, mean centre, max confidence.
    pub(crate) fn union(members: &[&Candidate], text: String, category: Category) -> Self {
        let rect = util::union_rect(members.iter().map(|it| it.bbox()));
        let center = util::coord_mean(members.iter().map(|it| it.center));
        let confidence = members
            .iter()
            .map(|it| it.confidence)
            .fold(0.0f32, f32::max);
        let mut sources = members
            .iter()
            .flat_map(|it| it.sources.iter().copied())
            .collect::<Vec<_>>();
        sources.sort_unstable();
        let mut methods = Vec::new();
        for method in members.iter().flat_map(|it| it.methods.iter()) {
            if !methods.contains(method) {
                methods.push(*method);
            }
        }
        Self {
            text,
            confidence,
            center,
            bbox_width: rect.width(),
            bbox_height: rect.height(),
            polygon: rect.to_polygon(),
            category,
            is_vertical: rect.height() >= rect.width(),
            final_score: 0.0,
            sources,
            methods,
        }
    }
}

/// Dimension-type symbol attached to a parsed annotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DimensionType {
    #[default]
    #[serde(rename = "")]
    Unspecified,
    #[serde(rename = "Φ")]
    Diameter,
    #[serde(rename = "M")]
    Thread,
    #[serde(rename = "R")]
    Radius,
    #[serde(rename = "∠")]
    Angle,
    #[serde(rename = "⏤")]
    Linear,
}

impl DimensionType {
    pub fn symbol(&self) -> &'static str {
        match self {
            DimensionType::Unspecified => "",
            DimensionType::Diameter => "Φ",
            DimensionType::Thread => "M",
            DimensionType::Radius => "R",
            DimensionType::Angle => "∠",
            DimensionType::Linear => "⏤",
        }
    }
}

impl fmt::Display for DimensionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Structured fields extracted from a candidate's text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedAnnotation {
    pub dimension: String,
    pub dimension_type: DimensionType,
    pub upper_tolerance: String,
    pub lower_tolerance: String,
}

impl ParsedAnnotation {
    pub fn is_empty(&self) -> bool {
        self.dimension.is_empty()
            && self.dimension_type == DimensionType::Unspecified
            && self.upper_tolerance.is_empty()
            && self.lower_tolerance.is_empty()
    }
}
