use crate::application::use_cases::compliance::escape_html;
use crate::domain::error::{AppError, Result};
use crate::domain::test_case::TestCase;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Xml,
    Csv,
}

impl ExportFormat {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "xml" => Ok(ExportFormat::Xml),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(AppError::InvalidInput(format!(
                "Unsupported export format: {}",
                other
            ))),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Xml => "application/xml",
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }
}

pub fn export_test_cases(test_cases: &[TestCase], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => serde_json::to_string_pretty(&json!({ "test_cases": test_cases }))
            .map_err(|e| AppError::Internal(format!("Failed to serialize test cases: {}", e))),
        ExportFormat::Xml => export_xml(test_cases),
        ExportFormat::Csv => export_csv(test_cases),
    }
}

fn export_xml(test_cases: &[TestCase]) -> Result<String> {
    let mut lines = vec![
        r#"<?xml version="1.0" encoding="UTF-8"?>"#.to_string(),
        "<testCases>".to_string(),
    ];

    for case in test_cases {
        let value = serde_json::to_value(case)
            .map_err(|e| AppError::Internal(format!("Failed to serialize test case: {}", e)))?;
        lines.push("  <testCase>".to_string());
        if let Value::Object(fields) = value {
            for (key, field) in &fields {
                write_element(&mut lines, key, field, 2);
            }
        }
        lines.push("  </testCase>".to_string());
    }

    lines.push("</testCases>".to_string());
    Ok(lines.join("\n"))
}

fn write_element(lines: &mut Vec<String>, key: &str, value: &Value, depth: usize) {
    let indent = "  ".repeat(depth);
    let name = element_name(key);
    match value {
        Value::Null => lines.push(format!("{indent}<{name}/>")),
        Value::Array(items) => {
            lines.push(format!("{indent}<{name}>"));
            let item_name = if key == "steps" { "step" } else { "item" };
            for item in items {
                write_element(lines, item_name, item, depth + 1);
            }
            lines.push(format!("{indent}</{name}>"));
        }
        Value::Object(fields) => {
            lines.push(format!("{indent}<{name}>"));
            for (child_key, child) in fields {
                write_element(lines, child_key, child, depth + 1);
            }
            lines.push(format!("{indent}</{name}>"));
        }
        Value::String(text) => lines.push(format!("{indent}<{name}>{}</{name}>", escape_html(text))),
        scalar => lines.push(format!("{indent}<{name}>{}</{name}>", scalar)),
    }
}

/// Keys become element names; anything XML would reject is replaced with `_`.
fn element_name(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if !name
        .chars()
        .next()
        .is_some_and(|ch| ch.is_ascii_alphabetic() || ch == '_')
    {
        name.insert(0, '_');
    }
    name
}

fn export_csv(test_cases: &[TestCase]) -> Result<String> {
    if test_cases.is_empty() {
        return Ok(String::new());
    }

    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer
        .write_record(["ID", "Title", "Priority", "Description"])
        .map_err(|e| AppError::Internal(format!("Failed to write CSV: {}", e)))?;
    for case in test_cases {
        writer
            .write_record([
                case.id.as_str(),
                case.title.as_str(),
                case.priority.as_str(),
                case.description.as_str(),
            ])
            .map_err(|e| AppError::Internal(format!("Failed to write CSV: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("Failed to flush CSV: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("CSV is not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_case::Priority;

    fn cases() -> Vec<TestCase> {
        let mut case = TestCase {
            description: "Checks \"high\" & <low> limits".to_string(),
            priority: Priority::High,
            steps: vec!["Set rate".to_string(), "Block line".to_string()],
            ..TestCase::new("TC-001", "Occlusion alarm")
        };
        case.test_data.insert("rate".to_string(), "5 ml/h".to_string());
        case.extra.insert("1st trace".to_string(), json!("REQ-1"));
        vec![case]
    }

    #[test]
    fn test_json_export_wraps_array() {
        let out = export_test_cases(&cases(), ExportFormat::Json).unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["test_cases"][0]["id"], "TC-001");
        assert_eq!(parsed["test_cases"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_xml_export_escapes_and_nests() {
        let out = export_test_cases(&cases(), ExportFormat::Xml).unwrap();
        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<testCases>"));
        assert!(out.contains("<description>Checks &quot;high&quot; &amp; &lt;low&gt; limits</description>"));
        assert!(out.contains("      <step>Set rate</step>"));
        assert!(out.contains("      <rate>5 ml/h</rate>"));
        assert!(out.contains("<_1st_trace>REQ-1</_1st_trace>"));
        assert!(out.ends_with("</testCases>"));
    }

    #[test]
    fn test_csv_export_quotes_when_needed() {
        let out = export_test_cases(&cases(), ExportFormat::Csv).unwrap();
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("ID,Title,Priority,Description"));
        assert_eq!(
            lines.next(),
            Some("TC-001,Occlusion alarm,High,\"Checks \"\"high\"\" & <low> limits\"")
        );
        assert_eq!(export_test_cases(&[], ExportFormat::Csv).unwrap(), "");
    }

    #[test]
    fn test_unknown_format() {
        assert!(matches!(ExportFormat::parse("excel"), Err(AppError::InvalidInput(_))));
        assert_eq!(ExportFormat::parse(" XML ").unwrap(), ExportFormat::Xml);
    }
}
