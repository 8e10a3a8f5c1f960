use crate::domain::compliance::ComplianceRunResult;
use crate::domain::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Text,
    Html,
}

impl ReportFormat {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "text" | "txt" => Ok(ReportFormat::Text),
            "html" => Ok(ReportFormat::Html),
            other => Err(AppError::InvalidInput(format!(
                "Unsupported report format: {}",
                other
            ))),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::Json => "application/json",
            ReportFormat::Text => "text/plain; charset=utf-8",
            ReportFormat::Html => "text/html; charset=utf-8",
        }
    }
}

pub fn render_report(result: &ComplianceRunResult, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Json => serde_json::to_string_pretty(result)
            .map_err(|e| AppError::Internal(format!("Failed to serialize report: {}", e))),
        ReportFormat::Text => Ok(render_text(result)),
        ReportFormat::Html => Ok(render_html(result)),
    }
}

fn render_text(result: &ComplianceRunResult) -> String {
    let mut lines = vec![
        "COMPLIANCE CHECK REPORT".to_string(),
        "=".repeat(50),
        format!("Timestamp: {}", result.timestamp),
        format!("Test Cases Analyzed: {}", result.test_cases_count),
        format!("Overall Compliance Score: {}%", result.overall_score),
        format!(
            "Passed Checks: {} / {}",
            result.passed_checks, result.total_checks
        ),
        String::new(),
    ];

    for (standard, checks) in &result.standards {
        lines.push(format!("STANDARD: {}", standard));
        lines.push("-".repeat(30));

        for check in checks {
            let status = if check.passed { "PASS" } else { "FAIL" };
            lines.push(format!(
                "[{}] {}: {}",
                status, check.requirement_id, check.requirement
            ));
            if let Some(issue) = &check.issue {
                lines.push(format!("   Issue: {}", issue));
            }
            if let Some(recommendation) = &check.recommendation {
                lines.push(format!("   Recommendation: {}", recommendation));
            }
            if !check.evidence.is_empty() {
                lines.push("   Evidence:".to_string());
                for evidence in &check.evidence {
                    lines.push(format!(
                        "     - Test Case {}: {} (matched \"{}\")",
                        evidence.test_case_id, evidence.title, evidence.matched_keyword
                    ));
                }
            }
            lines.push(String::new());
        }
    }

    lines.join("\n")
}

const HTML_STYLE: &str = "body { font-family: Arial, sans-serif; margin: 20px; }
.header { background-color: #f4f4f4; padding: 20px; border-radius: 5px; }
.standard { margin-top: 20px; }
.check { margin: 10px 0; padding: 10px; border-left: 4px solid #ccc; }
.pass { border-left-color: green; background-color: #e8f5e8; }
.fail { border-left-color: red; background-color: #fce8e8; }
.evidence { margin-left: 20px; font-size: 0.9em; color: #666; }";

fn render_html(result: &ComplianceRunResult) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<title>Compliance Check Report</title>\n");
    html.push_str(&format!("<style>\n{}\n</style>\n</head>\n<body>\n", HTML_STYLE));

    html.push_str("<div class=\"header\">\n<h1>Compliance Check Report</h1>\n");
    html.push_str(&format!(
        "<p><strong>Timestamp:</strong> {}</p>\n",
        escape_html(&result.timestamp)
    ));
    html.push_str(&format!(
        "<p><strong>Test Cases Analyzed:</strong> {}</p>\n",
        result.test_cases_count
    ));
    html.push_str(&format!(
        "<p><strong>Overall Compliance Score:</strong> {}%</p>\n",
        result.overall_score
    ));
    html.push_str(&format!(
        "<p><strong>Passed Checks:</strong> {} / {}</p>\n</div>\n",
        result.passed_checks, result.total_checks
    ));

    for (standard, checks) in &result.standards {
        html.push_str(&format!(
            "<div class=\"standard\">\n<h2>Standard: {}</h2>\n",
            escape_html(standard)
        ));
        for check in checks {
            let (class, status) = if check.passed {
                ("pass", "PASS")
            } else {
                ("fail", "FAIL")
            };
            html.push_str(&format!(
                "<div class=\"check {}\">\n<h3>{}: {}</h3>\n<p><strong>Status:</strong> {}</p>\n<p><strong>Description:</strong> {}</p>\n",
                class,
                escape_html(&check.requirement_id),
                escape_html(&check.requirement),
                status,
                escape_html(&check.description)
            ));
            if let Some(issue) = &check.issue {
                html.push_str(&format!(
                    "<p><strong>Issue:</strong> {}</p>\n",
                    escape_html(issue)
                ));
            }
            if let Some(recommendation) = &check.recommendation {
                html.push_str(&format!(
                    "<p><strong>Recommendation:</strong> {}</p>\n",
                    escape_html(recommendation)
                ));
            }
            if !check.evidence.is_empty() {
                html.push_str("<p><strong>Evidence:</strong></p>\n<ul class=\"evidence\">\n");
                for evidence in &check.evidence {
                    html.push_str(&format!(
                        "<li>Test Case {}: {}</li>\n",
                        escape_html(&evidence.test_case_id),
                        escape_html(&evidence.title)
                    ));
                }
                html.push_str("</ul>\n");
            }
            html.push_str("</div>\n");
        }
        html.push_str("</div>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

pub(crate) fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
