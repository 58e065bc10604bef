//! Cleanup of raw recognizer strings.
//!
//! Symbol look-alikes are mapped to their canonical glyph everywhere, but letter/digit
//! confusions are only corrected where the surrounding characters show the glyph sits
//! inside a numeral (`1O.5` becomes `10.5`, `SUS304` is left alone).

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::instrument;

const MAX_PASSES: usize = 8;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static LETTER_SPACE_DIGIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-zΦ])\s+(\d)").unwrap());
static DIGIT_SPACE_SIGN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d)\s+([×°])").unwrap());
static SIGN_SPACE_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"([×±])\s+(\d)").unwrap());
static TIMES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d)\s*[xX]\s*(\d|Φ|M\d)").unwrap());
static DECIMAL_MARK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d)[,，·•](\d)").unwrap());
static PLUS_MINUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\+\s*/?\s*-").unwrap());
static LETTER_O_DIAMETER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[^A-Za-z0-9.])[Oo](\d)").unwrap());
static THREAD_LOOKALIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[^A-Za-z])[WNH](\d+(?:\.\d+)?[×-]\d)").unwrap());
static THREAD_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[^A-Za-z])[Mm]\s*(\d)").unwrap());
static THREAD_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)?)\s*M$").unwrap());
static DIAMETER_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"Φ\s+(\d)").unwrap());
static DIAMETER_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)?)\s*Φ$").unwrap());

/// Canonical replacement for glyphs that are never ambiguous in drawing text.
fn canonical_symbol(c: char) -> Option<char> {
    match c {
        '∅' | 'ø' | 'Ø' | '⌀' | 'φ' | 'ϕ' | '◯' | '○' | '⊘' => Some('Φ'),
        '*' | '✕' | '✖' | '⨯' | '╳' => Some('×'),
        '˚' | 'º' | '゜' => Some('°'),
        '—' | '–' | '−' | '－' | '‐' | '‑' | '﹣' => Some('-'),
        '＋' => Some('+'),
        '∓' => Some('±'),
        '（' => Some('('),
        '）' => Some(')'),
        _ => None,
    }
}

/// Digit that a letter is commonly misread for.
fn confusable_digit(c: char) -> Option<char> {
    match c {
        'I' | 'l' | '|' => Some('1'),
        'S' => Some('5'),
        'G' => Some('6'),
        'B' => Some('8'),
        'O' | 'o' | 'D' => Some('0'),
        _ => None,
    }
}

/// Cleans a raw OCR string. Total and idempotent: the cleanup passes run until the
/// text stops changing.
#[instrument(level = "trace")]
pub fn normalize(raw: &str) -> String {
    let mut text = collapse_whitespace(raw);
    for _ in 0..MAX_PASSES {
        let next = normalize_pass(&text);
        if next == text {
            break;
        }
        text = next;
    }
    text
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

fn normalize_pass(text: &str) -> String {
    let text = text
        .chars()
        .map(|c| canonical_symbol(c).unwrap_or(c))
        .collect::<String>();
    let text = PLUS_MINUS.replace_all(&text, "±");

    let text = LETTER_SPACE_DIGIT.replace_all(&text, "$1$2");
    let text = DIGIT_SPACE_SIGN.replace_all(&text, "$1$2");
    let text = SIGN_SPACE_DIGIT.replace_all(&text, "$1$2");

    let text = TIMES.replace_all(&text, "$1×$2");
    let text = DECIMAL_MARK.replace_all(&text, "$1.$2");
    let text = LETTER_O_DIAMETER.replace_all(&text, "${1}Φ$2");
    let text = THREAD_LOOKALIKE.replace_all(&text, "${1}M$2");
    let text = fix_numeral_confusions(&text);

    let text = THREAD_PREFIX.replace_all(&text, "${1}M$2");
    let text = THREAD_SUFFIX.replace_all(&text, "M$1");
    let text = DIAMETER_PREFIX.replace_all(&text, "Φ$1");
    let text = DIAMETER_SUFFIX.replace_all(&text, "Φ$1");

    collapse_whitespace(&text)
}

fn fix_numeral_confusions(text: &str) -> String {
    let original = text.chars().collect::<Vec<_>>();
    let mut fixed = original.clone();
    for i in 0..original.len() {
        let Some(digit) = confusable_digit(original[i]) else {
            continue;
        };
        let prev = i.checked_sub(1).map(|j| fixed[j]);
        let next = original.get(i + 1).copied();
        if inside_numeral(prev, next) {
            fixed[i] = digit;
        }
    }
    fixed.into_iter().collect()
}

fn inside_numeral(prev: Option<char>, next: Option<char>) -> bool {
    let numeric = |c: Option<char>| c.is_some_and(|c| c.is_ascii_digit() || c == '.');
    let digit = |c: Option<char>| c.is_some_and(|c| c.is_ascii_digit());
    numeric(prev) && numeric(next) && (digit(prev) || digit(next))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize("  Ra   3.2  "), "Ra3.2");
        assert_eq!(normalize("TECHNICAL \t NOTES"), "TECHNICAL NOTES");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn canonicalizes_diameter_glyphs() {
        assert_eq!(normalize("∅20"), "Φ20");
        assert_eq!(normalize("ø 12.5"), "Φ12.5");
        assert_eq!(normalize("⌀8"), "Φ8");
        assert_eq!(normalize("O20"), "Φ20");
        assert_eq!(normalize("20Ø"), "Φ20");
    }

    #[test]
    fn leaves_letter_o_in_words() {
        assert_eq!(normalize("NOTE"), "NOTE");
        assert_eq!(normalize("POM"), "POM");
    }

    #[test]
    fn multiplication_between_counts_and_sizes() {
        assert_eq!(normalize("100x50"), "100×50");
        assert_eq!(normalize("M8 x 1.25"), "M8×1.25");
        assert_eq!(normalize("2*45°"), "2×45°");
        assert_eq!(normalize("max"), "max");
        assert_eq!(normalize("4xΦ10"), "4×Φ10");
        assert_eq!(normalize("4 x ∅10"), "4×Φ10");
        assert_eq!(normalize("2xM6"), "2×M6");
        assert_eq!(normalize("2 x M6"), "2×M6");
        assert_eq!(normalize("2xMAX"), "2xMAX");
    }

    #[test]
    fn decimal_comma_and_dashes() {
        assert_eq!(normalize("12,5"), "12.5");
        assert_eq!(normalize("−0.02"), "-0.02");
        assert_eq!(normalize("+/-0.1"), "±0.1");
    }

    #[test]
    fn thread_notation() {
        assert_eq!(normalize("m6"), "M6");
        assert_eq!(normalize("8M"), "M8");
        assert_eq!(normalize("W8×1.25"), "M8×1.25");
        assert_eq!(normalize("H7"), "H7");
    }

    #[test]
    fn digit_confusions_inside_numerals_only() {
        assert_eq!(normalize("1O.5"), "10.5");
        assert_eq!(normalize("3S.2"), "35.2");
        assert_eq!(normalize("2l5"), "215");
        assert_eq!(normalize("SUS304"), "SUS304");
        assert_eq!(normalize("Q235"), "Q235");
    }

    #[test]
    fn idempotent_on_samples() {
        for raw in ["Φ 20 +0,02", "m8 x1.25", "o 5", "1OO2", "45˚", "83.02±0.01"] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "{raw}");
        }
    }
}
