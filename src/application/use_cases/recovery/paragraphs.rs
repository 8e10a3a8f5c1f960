use crate::domain::id_sequence::IdSequence;
use crate::domain::test_case::TestCase;
use once_cell::sync::Lazy;
use regex::Regex;

const MIN_CHUNK_CHARS: usize = 30;
const MAX_DESCRIPTION_CHARS: usize = 150;
const MAX_PLACEHOLDERS: usize = 10;

static CHUNK_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:\d+\.\s+|[*-]\s|##\s)").unwrap());

/// Last resort: one placeholder per paragraph-like chunk of the raw text.
pub(super) fn parse_paragraphs(text: &str, ids: &mut IdSequence) -> Vec<TestCase> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let mut chunks: Vec<&str> = split_on_markers(text)
        .into_iter()
        .map(str::trim)
        .filter(|chunk| chunk.chars().count() >= MIN_CHUNK_CHARS)
        .take(MAX_PLACEHOLDERS)
        .collect();

    // Short replies still get one record so callers always have something to show.
    if chunks.is_empty() {
        chunks.push(trimmed);
    }

    chunks
        .into_iter()
        .enumerate()
        .map(|(idx, chunk)| placeholder(idx + 1, chunk, ids))
        .collect()
}

fn split_on_markers(text: &str) -> Vec<&str> {
    let mut cuts: Vec<usize> = vec![0];
    cuts.extend(
        CHUNK_MARKER
            .find_iter(text)
            .map(|found| found.start())
            .filter(|&start| start > 0),
    );
    cuts.push(text.len());

    cuts.windows(2).map(|pair| &text[pair[0]..pair[1]]).collect()
}

fn placeholder(position: usize, chunk: &str, ids: &mut IdSequence) -> TestCase {
    TestCase {
        id: ids.next_id(),
        title: format!("Test Case {}", position),
        description: truncate_description(chunk),
        steps: vec![
            "Execute the test scenario".to_string(),
            "Verify expected behavior".to_string(),
        ],
        expected_results: "Test should pass with expected outcomes".to_string(),
        ..TestCase::default()
    }
}

fn truncate_description(chunk: &str) -> String {
    if chunk.chars().count() <= MAX_DESCRIPTION_CHARS {
        return chunk.to_string();
    }
    let head: String = chunk.chars().take(MAX_DESCRIPTION_CHARS).collect();
    format!("{}...", head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bullets_become_placeholders() {
        let text = "Things to verify:\n- The infusion pump alarm sounds when the line is occluded\n- Dose limits are enforced for pediatric patients\n- ok\n";
        let mut ids = IdSequence::new("TC");
        let cases = parse_paragraphs(text, &mut ids);

        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].id, "TC-001");
        assert_eq!(cases[0].title, "Test Case 1");
        assert!(cases[0].description.starts_with("- The infusion pump"));
        assert_eq!(
            cases[1].steps,
            vec!["Execute the test scenario", "Verify expected behavior"]
        );
    }

    #[test]
    fn test_long_chunks_are_truncated() {
        let text = "x".repeat(400);
        let mut ids = IdSequence::new("TC");
        let cases = parse_paragraphs(&text, &mut ids);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].description.chars().count(), 153);
        assert!(cases[0].description.ends_with("..."));
    }

    #[test]
    fn test_capped_at_ten() {
        let text: String = (1..=25)
            .map(|n| format!("{}. Verify that the audit log captures event number {}\n", n, n))
            .collect();
        let mut ids = IdSequence::new("TC");
        let cases = parse_paragraphs(&text, &mut ids);
        assert_eq!(cases.len(), 10);
        assert_eq!(cases[9].id, "TC-010");
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        let mut ids = IdSequence::new("TC");
        assert!(parse_paragraphs("", &mut ids).is_empty());
        assert!(parse_paragraphs("   \n\t", &mut ids).is_empty());
    }

    #[test]
    fn test_short_reply_still_yields_one_record() {
        let mut ids = IdSequence::new("TC");
        let cases = parse_paragraphs("Check login.", &mut ids);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].description, "Check login.");
    }
}
