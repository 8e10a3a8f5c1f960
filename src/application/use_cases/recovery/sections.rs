use crate::domain::id_sequence::IdSequence;
use crate::domain::test_case::{Priority, TestCase};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

const MIN_SECTION_CHARS: usize = 20;

static TEST_CASE_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:test\s*case|tc)\s*[-#:]?\s*\d+").unwrap());
static MARKDOWN_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[ \t]*#{1,6}[^\n]*test\s*case").unwrap());
static BOLD_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\*\*[^*\n]*test\s*case").unwrap());
static NUMBERED_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[ \t]*\d+\.\s*test\s*case").unwrap());

static HEADER_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[\s>*#\-\d.]*(?:test\s*case|tc)\s*[-#:]?\s*\d*\s*[:.\-]?\s*").unwrap()
});
static LABEL_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^[\s>*#\-]*(title|description|desc|test\s+steps|steps?|expected(?:\s+(?:results?|outcomes?))?|priority|test\s+data|preconditions?|compliance(?:\s+checks?)?)[\s*_]*(?:[:.\-][\s*_]*(.*?))?[\s*_]*$",
    )
    .unwrap()
});
static LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:\d+[.)]|[-*\x{2022}])\s*").unwrap());
static NUMBERED_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+[.)]\s+(.+)$").unwrap());
static PRIORITY_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(critical|high|medium|low)\b").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Label {
    Title,
    Description,
    Steps,
    Expected,
    Priority,
    TestData,
    Other,
}

impl Label {
    fn from_word(word: &str) -> Self {
        let word = word.to_ascii_lowercase();
        if word == "title" {
            Label::Title
        } else if word.starts_with("desc") {
            Label::Description
        } else if word.contains("step") {
            Label::Steps
        } else if word.starts_with("expected") {
            Label::Expected
        } else if word == "priority" {
            Label::Priority
        } else if word.starts_with("test") {
            Label::TestData
        } else {
            Label::Other
        }
    }
}

/// Splits prose on test-case headers and pulls labelled fields out of each section.
pub(super) fn parse_sections(text: &str, ids: &mut IdSequence) -> Vec<TestCase> {
    split_sections(text)
        .into_iter()
        .filter(|section| section.trim().chars().count() >= MIN_SECTION_CHARS)
        .filter_map(|section| {
            let mut case = synthesize(section)?;
            case.id = ids.next_id();
            Some(case)
        })
        .collect()
}

fn split_sections(text: &str) -> Vec<&str> {
    let strategies: [&Regex; 3] = [&TEST_CASE_HEADER, &MARKDOWN_HEADER, &BOLD_HEADER];

    let mut single: Option<Vec<&str>> = None;
    for pattern in strategies {
        let sections = split_at_matches(text, pattern);
        if sections.len() > 1 {
            return sections;
        }
        if sections.len() == 1 && single.is_none() {
            single = Some(sections);
        }
    }

    let numbered = split_at_matches(text, &NUMBERED_HEADER);
    if !numbered.is_empty() {
        return numbered;
    }

    single.unwrap_or_default()
}

/// Header-to-next-header spans. Text before the first header is dropped, and
/// only the first header on any line starts a section.
fn split_at_matches<'a>(text: &'a str, pattern: &Regex) -> Vec<&'a str> {
    let mut starts: Vec<usize> = Vec::new();
    let mut last_line_start: Option<usize> = None;

    for found in pattern.find_iter(text) {
        let line_start = text[..found.start()].rfind('\n').map_or(0, |pos| pos + 1);
        if last_line_start == Some(line_start) {
            continue;
        }
        last_line_start = Some(line_start);
        starts.push(found.start());
    }

    starts
        .iter()
        .enumerate()
        .map(|(idx, &start)| {
            let end = starts.get(idx + 1).copied().unwrap_or(text.len());
            &text[start..end]
        })
        .collect()
}

fn synthesize(section: &str) -> Option<TestCase> {
    let mut lines = section.lines();
    let header = lines.next().unwrap_or_default();

    let mut buckets: BTreeMap<Label, Vec<String>> = BTreeMap::new();
    let mut loose: Vec<String> = Vec::new();
    let mut current: Option<Label> = None;
    let mut body_lines: Vec<&str> = Vec::new();

    for line in lines {
        body_lines.push(line);
        if let Some(caps) = LABEL_LINE.captures(line) {
            let label = Label::from_word(&caps[1]);
            current = Some(label);
            let rest = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
            let bucket = buckets.entry(label).or_default();
            if !rest.is_empty() {
                bucket.push(rest.to_string());
            }
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match current {
            Some(label) => buckets.entry(label).or_default().push(trimmed.to_string()),
            None => loose.push(trimmed.to_string()),
        }
    }

    let title = extract_title(header, buckets.get(&Label::Title));
    let description = match buckets.get(&Label::Description) {
        Some(lines) if !lines.is_empty() => lines.join(" "),
        _ => loose.iter().take(3).cloned().collect::<Vec<_>>().join(" "),
    };

    let steps = match buckets.get(&Label::Steps) {
        Some(lines) if !lines.is_empty() => lines.iter().filter_map(|l| strip_marker(l)).collect(),
        _ => body_lines
            .iter()
            .filter_map(|line| NUMBERED_ITEM.captures(line))
            .map(|caps| caps[1].trim().to_string())
            .filter(|step| !step.is_empty())
            .collect(),
    };

    let expected_results = buckets
        .get(&Label::Expected)
        .map(|lines| lines.join(" "))
        .unwrap_or_default();

    let priority = buckets
        .get(&Label::Priority)
        .and_then(|lines| first_priority(&lines.join(" ")))
        .or_else(|| first_priority(section))
        .unwrap_or(Priority::Medium);

    let test_data = buckets
        .get(&Label::TestData)
        .map(|lines| parse_test_data(lines))
        .unwrap_or_default();

    if title.chars().count() <= 5 && description.chars().count() <= 20 {
        return None;
    }

    Some(TestCase {
        title,
        description,
        priority,
        steps,
        expected_results,
        test_data,
        ..TestCase::default()
    })
}

fn extract_title(header: &str, labelled: Option<&Vec<String>>) -> String {
    let after_token = HEADER_TOKEN.replace(header, "");
    let candidate = clean_title(&after_token);
    if !candidate.is_empty() {
        return candidate;
    }

    if let Some(title) = labelled.and_then(|lines| lines.first()) {
        let cleaned = clean_title(title);
        if !cleaned.is_empty() {
            return cleaned;
        }
    }

    clean_title(header)
}

fn clean_title(raw: &str) -> String {
    raw.trim_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '#' | ':' | '_' | '-'))
        .to_string()
}

fn strip_marker(line: &str) -> Option<String> {
    let stripped = LIST_MARKER.replace(line, "");
    let stripped = stripped.trim();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

fn first_priority(text: &str) -> Option<Priority> {
    PRIORITY_WORD
        .captures(text)
        .map(|caps| Priority::from_label(&caps[1]))
}

fn parse_test_data(lines: &[String]) -> BTreeMap<String, String> {
    lines
        .iter()
        .filter_map(|line| {
            let line = LIST_MARKER.replace(line, "");
            let (key, value) = line.split_once(':')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_CASES: &str = "Here are the cases.\n\nTest Case 1: Patient login with valid credentials\nDescription: Verify that a registered clinician can sign in.\nSteps:\n1. Open the portal\n2. Enter username and password\n3. Click sign in\nExpected Result: Dashboard is displayed\nPriority: High\n\nTest Case 2: Lockout after failed attempts\nDescription: Account locks after five wrong passwords.\nSteps:\n- Enter a wrong password five times\nExpected: Account is locked and audit entry is written\nPriority: critical\n";

    #[test]
    fn test_splits_on_numbered_headers() {
        let mut ids = IdSequence::new("TC");
        let cases = parse_sections(TWO_CASES, &mut ids);

        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].id, "TC-001");
        assert_eq!(cases[0].title, "Patient login with valid credentials");
        assert_eq!(
            cases[0].description,
            "Verify that a registered clinician can sign in."
        );
        assert_eq!(
            cases[0].steps,
            vec!["Open the portal", "Enter username and password", "Click sign in"]
        );
        assert_eq!(cases[0].expected_results, "Dashboard is displayed");
        assert_eq!(cases[0].priority, Priority::High);

        assert_eq!(cases[1].id, "TC-002");
        assert_eq!(cases[1].steps, vec!["Enter a wrong password five times"]);
        assert_eq!(cases[1].priority, Priority::Critical);
    }

    #[test]
    fn test_markdown_headers_and_fallback_description() {
        let text = "## Test case: Medication dosage calculation\nThe calculator converts weight based doses\nand rounds to two decimals.\n\n## Test case: Allergy warning display\nAn allergy banner is shown when prescribing penicillin.\n";
        let mut ids = IdSequence::new("TC");
        let cases = parse_sections(text, &mut ids);

        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].title, "Medication dosage calculation");
        assert_eq!(
            cases[0].description,
            "The calculator converts weight based doses and rounds to two decimals."
        );
        assert_eq!(cases[0].priority, Priority::Medium);
    }

    #[test]
    fn test_header_mentions_on_one_line_start_one_section() {
        let text = "Test Case 1 (TC-001): Audit trail records edits\nDescription: Each record edit is written to the audit log.\n";
        let mut ids = IdSequence::new("TC");
        let cases = parse_sections(text, &mut ids);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].title, "(TC-001): Audit trail records edits");
    }

    #[test]
    fn test_short_sections_are_skipped() {
        let mut ids = IdSequence::new("TC");
        assert!(parse_sections("Test Case 1: x\nTest Case 2: y", &mut ids).is_empty());
        assert_eq!(ids.peek(), 1);
    }

    #[test]
    fn test_prose_without_headers_yields_nothing() {
        let mut ids = IdSequence::new("TC");
        let text = "The system should encrypt patient records at rest and in transit.";
        assert!(parse_sections(text, &mut ids).is_empty());
    }

    #[test]
    fn test_priority_without_label_uses_first_word() {
        let text = "Test Case 1: Emergency override\nThis is a low risk path that still needs review.\n";
        let mut ids = IdSequence::new("TC");
        let cases = parse_sections(text, &mut ids);
        assert_eq!(cases[0].priority, Priority::Low);
    }

    #[test]
    fn test_test_data_label_becomes_map() {
        let text = "TC 1 - Vital signs import\nTest data:\n- heart_rate: 72\n- unit: bpm\nExpected: values are stored\n";
        let mut ids = IdSequence::new("TC");
        let cases = parse_sections(text, &mut ids);
        assert_eq!(cases[0].test_data.get("heart_rate").map(String::as_str), Some("72"));
        assert_eq!(cases[0].test_data.get("unit").map(String::as_str), Some("bpm"));
    }
}
