//! Rule cascade mapping cleaned text onto the annotation taxonomy.
//!
//! Rules are evaluated in [`RULES`] order and the first match wins; anything that
//! matches no rule is an [`Category::Annotation`].

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::instrument;

use crate::Category;

/// `45#` only survives the gate when its reject marker is disabled.
const MATERIAL_KEYWORDS: &[&str] = &[
    "不锈钢", "钢", "铁", "铜", "铝", "铸铁", "黄铜", "青铜", "合金", "尼龙", "steel",
    "stainless", "iron", "copper", "aluminum", "aluminium", "brass", "bronze", "nylon",
    "q235", "q345", "45#", "sus304", "sus316", "ht200", "ht250", "qt450", "40cr",
    "42crmo", "20crmnti", "65mn", "6061", "7075", "pom", "ptfe",
];

const SURFACE_TREATMENT_KEYWORDS: &[&str] = &[
    "镀锌", "发黑", "阳极", "喷涂", "淬火", "回火", "调质", "渗碳", "氮化", "镀铬", "镀镍",
    "电镀", "氧化", "喷砂", "zinc", "black", "anodiz", "coating", "plating", "plated",
    "passivat", "quench", "temper", "carburiz", "nitrid", "chrome", "galvaniz", "hrc",
];

const GEOMETRY_KEYWORDS: &[&str] = &[
    "孔", "槽", "面", "倒角", "圆角", "沉孔", "键槽", "台阶", "hole", "slot", "face",
    "chamfer", "fillet", "groove", "keyway", "counterbore", "countersink",
];

const POSITION_KEYWORDS: &[&str] = &[
    "上", "下", "左", "右", "前", "后", "中", "内", "外", "顶", "底", "侧", "正", "背",
    "top", "bot", "mid", "lh", "rh",
];

const TITLE_KEYWORDS: &[&str] = &[
    "视图", "剖视", "剖面", "局部", "详图", "放大", "技术要求", "说明", "注", "标题", "比例",
    "图号", "view", "section", "detail", "note", "scale", "title", "drawing", "sheet",
];

static THREAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[Mm]\d+(?:\.\d+)?(?:[×xX*-]\d+(?:\.\d+)?)?|\d+(?:\.\d+)?M$)").unwrap()
});
static DIAMETER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[Φ∅øØ⌀]\s*\d|\d(\.\d+)?\s*[Φ∅øØ⌀]").unwrap());
static DIMENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d+(\.\d+)?\s*([×xX*]|[-+±])\s*\d+(\.\d+)?").unwrap()
});
static ANGLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d(\.\d+)?\s*[°度′″]").unwrap());
static ROUGHNESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"R[aznqtpv]\s*\d+(\.\d+)?").unwrap());
static TOLERANCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Ha-h]\d{1,2}|IT\d{1,2})$").unwrap());
static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[+\-±]?\d+(\.\d+)?\s*(mm)?$").unwrap());
static MEASUREMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\d+(\.\d+)?\s*(cm|m|um|μm|µm|in|inch|kg|g|n|nm|n·m|mpa|kn|hb|%|\x22)$")
        .unwrap()
});

/// How a rule decides whether it applies to a text.
pub enum Matcher {
    Pattern(&'static Lazy<Regex>),
    /// Case-insensitive substring membership.
    Keywords(&'static [&'static str]),
    /// Case-insensitive exact membership for texts of at most `max_chars` characters.
    ShortKeyword {
        max_chars: usize,
        words: &'static [&'static str],
    },
    SingleChar(fn(char) -> bool),
}

impl Matcher {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Matcher::Pattern(regex) => regex.is_match(text),
            Matcher::Keywords(words) => {
                let lower = text.to_lowercase();
                words.iter().any(|word| lower.contains(word))
            }
            Matcher::ShortKeyword { max_chars, words } => {
                if text.chars().count() > *max_chars {
                    return false;
                }
                let lower = text.to_lowercase();
                words.iter().any(|word| lower == *word)
            }
            Matcher::SingleChar(predicate) => {
                let mut chars = text.chars();
                matches!((chars.next(), chars.next()), (Some(c), None) if predicate(c))
            }
        }
    }
}

fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

fn any_char(_: char) -> bool {
    true
}

pub struct Rule {
    pub category: Category,
    pub matcher: Matcher,
}

pub static RULES: &[Rule] = &[
    Rule {
        category: Category::ThreadSpec,
        matcher: Matcher::Pattern(&THREAD),
    },
    Rule {
        category: Category::Diameter,
        matcher: Matcher::Pattern(&DIAMETER),
    },
    Rule {
        category: Category::Dimension,
        matcher: Matcher::Pattern(&DIMENSION),
    },
    Rule {
        category: Category::Angle,
        matcher: Matcher::Pattern(&ANGLE),
    },
    Rule {
        category: Category::SurfaceRoughness,
        matcher: Matcher::Pattern(&ROUGHNESS),
    },
    Rule {
        category: Category::Tolerance,
        matcher: Matcher::Pattern(&TOLERANCE),
    },
    Rule {
        category: Category::Number,
        matcher: Matcher::Pattern(&NUMBER),
    },
    Rule {
        category: Category::Material,
        matcher: Matcher::Keywords(MATERIAL_KEYWORDS),
    },
    Rule {
        category: Category::SurfaceTreatment,
        matcher: Matcher::Keywords(SURFACE_TREATMENT_KEYWORDS),
    },
    Rule {
        category: Category::Geometry,
        matcher: Matcher::Keywords(GEOMETRY_KEYWORDS),
    },
    Rule {
        category: Category::Position,
        matcher: Matcher::ShortKeyword {
            max_chars: 3,
            words: POSITION_KEYWORDS,
        },
    },
    Rule {
        category: Category::Title,
        matcher: Matcher::Keywords(TITLE_KEYWORDS),
    },
    Rule {
        category: Category::Label,
        matcher: Matcher::SingleChar(char::is_alphabetic),
    },
    Rule {
        category: Category::Number,
        matcher: Matcher::SingleChar(is_digit),
    },
    Rule {
        category: Category::Symbol,
        matcher: Matcher::SingleChar(any_char),
    },
    Rule {
        category: Category::Measurement,
        matcher: Matcher::Pattern(&MEASUREMENT),
    },
];

#[instrument(level = "trace")]
pub fn classify(text: &str) -> Category {
    RULES
        .iter()
        .find(|rule| rule.matcher.matches(text))
        .map(|rule| rule.category)
        .unwrap_or(Category::Annotation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threads() {
        for text in ["M8", "M8×1.25", "m10-6", "12M", "M3.5"] {
            assert_eq!(classify(text), Category::ThreadSpec, "{text}");
        }
    }

    #[test]
    fn diameters() {
        for text in ["Φ20", "∅12.5", "ø6", "20Φ", "Φ20 +0.02 -0.01"] {
            assert_eq!(classify(text), Category::Diameter, "{text}");
        }
    }

    #[test]
    fn dimensions() {
        for text in ["100×50", "20x30x40", "10-20", "20 +0.02", "83.02±0.01"] {
            assert_eq!(classify(text), Category::Dimension, "{text}");
        }
    }

    #[test]
    fn angles_and_roughness() {
        assert_eq!(classify("45°"), Category::Angle);
        assert_eq!(classify("30度"), Category::Angle);
        assert_eq!(classify("Ra3.2"), Category::SurfaceRoughness);
        assert_eq!(classify("Rz 6.3"), Category::SurfaceRoughness);
    }

    #[test]
    fn tolerance_classes() {
        assert_eq!(classify("H7"), Category::Tolerance);
        assert_eq!(classify("g6"), Category::Tolerance);
        assert_eq!(classify("IT8"), Category::Tolerance);
        assert_ne!(classify("K7"), Category::Tolerance);
    }

    #[test]
    fn numbers() {
        assert_eq!(classify("25"), Category::Number);
        assert_eq!(classify("12.5mm"), Category::Number);
        assert_eq!(classify("+0.02"), Category::Number);
    }

    #[test]
    fn keyword_categories() {
        assert_eq!(classify("Q235"), Category::Material);
        assert_eq!(classify("304不锈钢"), Category::Material);
        assert_eq!(classify("表面镀锌"), Category::SurfaceTreatment);
        assert_eq!(classify("Anodized"), Category::SurfaceTreatment);
        assert_eq!(classify("2-沉孔"), Category::Geometry);
        assert_eq!(classify("Chamfer all edges"), Category::Geometry);
        assert_eq!(classify("左"), Category::Position);
        assert_eq!(classify("TOP"), Category::Position);
        assert_eq!(classify("SECTION A-A"), Category::Title);
        assert_eq!(classify("技术要求"), Category::Title);
    }

    #[test]
    fn single_characters() {
        assert_eq!(classify("A"), Category::Label);
        assert_eq!(classify("7"), Category::Number);
        assert_eq!(classify("∠"), Category::Symbol);
    }

    #[test]
    fn measurements_and_fallback() {
        assert_eq!(classify("5kg"), Category::Measurement);
        assert_eq!(classify("200 MPa"), Category::Measurement);
        assert_eq!(classify("xyz_unrecognized_token"), Category::Annotation);
        assert_eq!(classify(""), Category::Annotation);
    }

    #[test]
    fn every_rule_is_reachable() {
        let samples = [
            "M8", "Φ20", "100×50", "45°", "Ra3.2", "H7", "25", "Q235", "发黑", "hole", "左",
            "NOTE", "A", "7", "?", "5kg",
        ];
        for (rule, sample) in RULES.iter().zip(samples) {
            assert_eq!(classify(sample), rule.category, "{sample}");
        }
    }
}
