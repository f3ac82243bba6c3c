use lazy_static::lazy_static;
use regex::Regex;

pub const TRUNCATION_SUFFIX: &str = "… [truncated]";

lazy_static! {
    static ref MULTI_SPACE: Regex = Regex::new(r" {2,}").unwrap();
    static ref MULTI_NEWLINE: Regex = Regex::new(r"\n{3,}").unwrap();
}

/// Collapses extracted text into a canonical form: no carriage returns, no
/// null bytes, tabs become spaces, runs of spaces collapse to one, runs of
/// 3+ newlines collapse to two, surrounding whitespace trimmed.
pub fn normalize_extracted_text(text: &str) -> String {
    let text = text.replace('\r', "").replace('\t', " ").replace('\0', "");
    let text = MULTI_SPACE.replace_all(&text, " ");
    let text = MULTI_NEWLINE.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Normalizes, then caps at `max_chars` characters with an explicit
/// truncation marker when the text is longer than the budget.
pub fn clean_and_truncate(text: &str, max_chars: usize) -> String {
    let cleaned = normalize_extracted_text(text);

    if cleaned.chars().count() <= max_chars {
        return cleaned;
    }

    let head: String = cleaned.chars().take(max_chars).collect();
    format!("{head}{TRUNCATION_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_carriage_returns_tabs_and_nulls() {
        let cleaned = normalize_extracted_text("a\r\nb\tc\u{0}d");
        assert_eq!(cleaned, "a\nb cd");
    }

    #[test]
    fn collapses_space_and_newline_runs() {
        let cleaned = normalize_extracted_text("a    b\n\n\n\n\nc");
        assert_eq!(cleaned, "a b\n\nc");
    }

    #[test]
    fn normalize_is_idempotent() {
        let inputs = [
            "  leading and trailing  ",
            "tabs\t\tand\r\rreturns",
            "m u l t i    s p a c e",
            "many\n\n\n\n\nnewlines\n\n\ndone",
            "",
            "\u{0}\u{0}",
        ];
        for input in inputs {
            let once = normalize_extracted_text(input);
            assert_eq!(normalize_extracted_text(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn normalized_output_has_no_forbidden_runs() {
        let cleaned = normalize_extracted_text("x\r\ny\t\tz   w\n\n\n\n\nq\u{0}");
        assert!(!cleaned.contains('\r'));
        assert!(!cleaned.contains('\u{0}'));
        assert!(!cleaned.contains("\n\n\n"));
        assert!(!cleaned.contains("  "));
    }

    #[test]
    fn truncate_within_budget_equals_normalize() {
        let text = "short  text";
        assert_eq!(clean_and_truncate(text, 100), normalize_extracted_text(text));
    }

    #[test]
    fn truncate_appends_marker_and_respects_budget() {
        let text = "a".repeat(50);
        let truncated = clean_and_truncate(&text, 10);
        assert!(truncated.ends_with(TRUNCATION_SUFFIX));
        assert_eq!(
            truncated.chars().count(),
            10 + TRUNCATION_SUFFIX.chars().count()
        );
    }

    #[test]
    fn truncate_with_zero_budget() {
        let truncated = clean_and_truncate("anything", 0);
        assert_eq!(truncated, TRUNCATION_SUFFIX);
        assert_eq!(clean_and_truncate("", 0), "");
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        let text = "é".repeat(20);
        let truncated = clean_and_truncate(&text, 5);
        assert!(truncated.starts_with(&"é".repeat(5)));
        assert!(truncated.ends_with(TRUNCATION_SUFFIX));
    }
}
