use super::ParseDegraded;
use crate::domain::test_case::TestCase;
use serde_json::Value;

/// Longest balanced `{...}` span in `text`, or the whole text when there is none.
pub(crate) fn extract_json_candidate(text: &str) -> &str {
    longest_balanced_span(text).unwrap_or(text)
}

/// Every closing brace that matches an open one records a candidate span, so
/// stray braces in the surrounding prose never hide the real object. Quotes
/// are only tracked inside an open span; prose apostrophes and quotes around
/// it do not matter.
pub(crate) fn longest_balanced_span(text: &str) -> Option<&str> {
    let mut open: Vec<usize> = Vec::new();
    let mut best: Option<(usize, usize)> = None;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, byte) in text.bytes().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' if !open.is_empty() => in_string = true,
            b'{' => open.push(idx),
            b'}' => {
                if let Some(start) = open.pop() {
                    let end = idx + 1;
                    let longer = best.map_or(true, |(s, e)| end - start > e - s);
                    if longer {
                        best = Some((start, end));
                    }
                }
            }
            _ => {}
        }
    }

    best.map(|(start, end)| &text[start..end])
}

/// Lenient parse of the candidate. Requires a non-empty `test_cases` array.
pub(super) fn parse_test_cases(candidate: &str) -> Result<Vec<TestCase>, ParseDegraded> {
    let value: Value = json5::from_str(candidate)
        .map_err(|e| ParseDegraded::InvalidSyntax(e.to_string()))?;

    let items = value
        .get("test_cases")
        .and_then(|cases| cases.as_array())
        .ok_or(ParseDegraded::MissingTestCases)?;

    if items.is_empty() {
        return Err(ParseDegraded::EmptyTestCases);
    }

    let cases: Vec<TestCase> = items
        .iter()
        .cloned()
        .filter_map(TestCase::from_value)
        .collect();

    if cases.is_empty() {
        return Err(ParseDegraded::EmptyTestCases);
    }

    Ok(cases)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_exact_object_between_decoys() {
        let object = r#"{"test_cases":[{"id":"TC-001","title":"a } tricky { title"}]}"#;
        let text = format!("Note {{ unmatched here. }} stray }} and {{x}}\n{}\nthen {{ open", object);
        assert_eq!(extract_json_candidate(&text), object);
    }

    #[test]
    fn test_prefers_longest_span() {
        let text = r#"{"a":1} and then {"test_cases":[{"id":"TC-1"}]}"#;
        assert_eq!(
            extract_json_candidate(text),
            r#"{"test_cases":[{"id":"TC-1"}]}"#
        );
    }

    #[test]
    fn test_without_braces_returns_whole_text() {
        let text = "No structured content at all.";
        assert_eq!(extract_json_candidate(text), text);
        assert!(longest_balanced_span(text).is_none());
    }

    #[test]
    fn test_multibyte_prose_is_sliced_on_boundaries() {
        let text = "Résumé « données »: {\"test_cases\": []} fin";
        assert_eq!(extract_json_candidate(text), "{\"test_cases\": []}");
    }

    #[test]
    fn test_lenient_syntax_is_accepted() {
        let candidate = "{\n  // model commentary\n  test_cases: [\n    {id: 'TC-001', title: 'Login', steps: ['Open', 'Submit',],},\n  ],\n}";
        let cases = parse_test_cases(candidate).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].id, "TC-001");
        assert_eq!(cases[0].steps.len(), 2);
    }

    #[test]
    fn test_degraded_reasons() {
        assert!(matches!(
            parse_test_cases("not json"),
            Err(ParseDegraded::InvalidSyntax(_))
        ));
        assert!(matches!(
            parse_test_cases(r#"{"cases": []}"#),
            Err(ParseDegraded::MissingTestCases)
        ));
        assert!(matches!(
            parse_test_cases(r#"{"test_cases": []}"#),
            Err(ParseDegraded::EmptyTestCases)
        ));
        assert!(matches!(
            parse_test_cases(r#"{"test_cases": ["only", "strings"]}"#),
            Err(ParseDegraded::EmptyTestCases)
        ));
    }
}
