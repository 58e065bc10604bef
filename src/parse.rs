use once_cell::sync::Lazy;
use regex::Regex;
use tracing::instrument;

use crate::{DimensionType, ParsedAnnotation};

static PARENTHESIZED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*[(（].*[)）]").unwrap());
static FUSED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([Φ∅Øø⌀MR])\s*(\d+(?:\.\d+)?)\s+0\s*([+-])\s*(\d+(?:\.\d+)?)\s*$").unwrap()
});
static LEADING_SYMBOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([Φ∅Øø⌀MR])\s*(\d+(?:\.\d+)?)").unwrap());
/// First numeral not carrying a sign; signed numerals are tolerances.
static UNSIGNED_NUMERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^+\-±\d.])(\d+(?:\.\d+)?)").unwrap());
static NUMERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());
static PLUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\+\s*(\d+(?:\.\d+)?)").unwrap());
static MINUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-\s*(\d+(?:\.\d+)?)").unwrap());
static STANDALONE_ZERO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|\s)0(?:\s|$)").unwrap());

fn dimension_type(symbol: &str) -> DimensionType {
    match symbol {
        "M" => DimensionType::Thread,
        "R" => DimensionType::Radius,
        _ => DimensionType::Diameter,
    }
}

/// Extracts dimension, symbol and tolerances from a merged annotation text.
///
/// Total over its input: anything that cannot be read is left empty.
#[instrument(level = "trace")]
pub fn parse(text: &str) -> ParsedAnnotation {
    let main = PARENTHESIZED.replace_all(text, "");
    let main = main.trim();
    let mut parsed = ParsedAnnotation::default();

    if let Some(caps) = FUSED.captures(main) {
        parsed.dimension_type = dimension_type(&caps[1]);
        parsed.dimension = caps[2].to_string();
        let value = &caps[4];
        if &caps[3] == "+" {
            parsed.upper_tolerance = format!("+{value}");
            parsed.lower_tolerance = "0".to_string();
        } else {
            parsed.upper_tolerance = "0".to_string();
            parsed.lower_tolerance = format!("-{value}");
        }
        return parsed;
    }

    let remainder = if let Some(caps) = LEADING_SYMBOL.captures(main) {
        parsed.dimension_type = dimension_type(&caps[1]);
        parsed.dimension = caps[2].to_string();
        &main[caps.get(0).map_or(0, |m| m.end())..]
    } else if let Some(numeral) = UNSIGNED_NUMERAL.captures(main).and_then(|caps| caps.get(1)) {
        parsed.dimension = numeral.as_str().to_string();
        let rest = &main[numeral.end()..];
        if rest.contains('°') || rest.contains('度') {
            parsed.dimension_type = DimensionType::Angle;
        }
        rest
    } else {
        main
    };

    read_tolerances(remainder, &mut parsed);
    log::trace!("Parsed {text:?} as {parsed:?}");
    parsed
}

fn read_tolerances(remainder: &str, parsed: &mut ParsedAnnotation) {
    if let Some((_, after)) = remainder.split_once('±') {
        if let Some(value) = NUMERAL.find(after) {
            parsed.upper_tolerance = format!("+{}", value.as_str());
            parsed.lower_tolerance = format!("-{}", value.as_str());
        }
        return;
    }

    if let Some(caps) = PLUS.captures(remainder) {
        parsed.upper_tolerance = format!("+{}", &caps[1]);
    }
    let mut negatives = MINUS
        .captures_iter(remainder)
        .filter_map(|caps| caps.get(1))
        .map(|value| value.as_str())
        .collect::<Vec<_>>();
    match negatives.len() {
        0 => {
            if STANDALONE_ZERO.is_match(remainder) {
                parsed.lower_tolerance = "0".to_string();
            }
        }
        1 => parsed.lower_tolerance = format!("-{}", negatives[0]),
        _ => {
            negatives.sort_by(|a, b| magnitude(a).total_cmp(&magnitude(b)));
            parsed.upper_tolerance = format!("-{}", negatives[0]);
            parsed.lower_tolerance = format!("-{}", negatives[negatives.len() - 1]);
        }
    }
}

fn magnitude(value: &str) -> f64 {
    value.parse().unwrap_or(f64::MAX)
}
