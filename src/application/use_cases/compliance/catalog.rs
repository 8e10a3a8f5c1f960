use crate::domain::compliance::ComplianceRequirement;
use once_cell::sync::Lazy;

type Entry = (&'static str, &'static str, &'static str);

const FDA: &[Entry] = &[
    (
        "FDA-001",
        "Software must be validated for its intended use",
        "Ensure software functions as intended in the healthcare context",
    ),
    (
        "FDA-002",
        "Risk management must be implemented",
        "Identify and mitigate risks associated with software use",
    ),
    (
        "FDA-003",
        "Design controls must be established",
        "Maintain design history file and design validation",
    ),
    (
        "FDA-004",
        "Quality system regulations must be followed",
        "Comply with 21 CFR Part 820 Quality System Regulation",
    ),
];

const IEC_62304: &[Entry] = &[
    (
        "IEC-001",
        "Software development process must be established",
        "Follow defined software development lifecycle",
    ),
    (
        "IEC-002",
        "Risk management must be applied",
        "Perform risk analysis and implement risk control measures",
    ),
    (
        "IEC-003",
        "Software must be maintained properly",
        "Establish software maintenance and configuration management",
    ),
    (
        "IEC-004",
        "Software must be validated",
        "Verify and validate software requirements",
    ),
];

const ISO_13485: &[Entry] = &[
    (
        "ISO13485-001",
        "Quality management system must be implemented",
        "Establish and maintain quality management system",
    ),
    (
        "ISO13485-002",
        "Risk-based approach must be used",
        "Apply risk management to all processes",
    ),
    (
        "ISO13485-003",
        "Design and development must be controlled",
        "Maintain design and development records",
    ),
    (
        "ISO13485-004",
        "Process validation must be performed",
        "Validate processes where output cannot be verified",
    ),
];

const ISO_9001: &[Entry] = &[
    (
        "ISO9001-001",
        "Customer focus must be maintained",
        "Meet customer requirements and enhance satisfaction",
    ),
    (
        "ISO9001-002",
        "Leadership must be demonstrated",
        "Establish unity of purpose and direction",
    ),
    (
        "ISO9001-003",
        "Engagement of people must be ensured",
        "Competent, empowered and engaged people",
    ),
    (
        "ISO9001-004",
        "Process approach must be used",
        "Systematic management of processes",
    ),
];

const ISO_27001: &[Entry] = &[
    (
        "ISO27001-001",
        "Information security policy must be established",
        "Define and maintain information security policy",
    ),
    (
        "ISO27001-002",
        "Risk assessment must be performed",
        "Systematic assessment of information security risks",
    ),
    (
        "ISO27001-003",
        "Access control must be implemented",
        "Control access to information and systems",
    ),
    (
        "ISO27001-004",
        "Cryptographic controls must be used",
        "Protect information confidentiality and integrity",
    ),
];

const GDPR: &[Entry] = &[
    (
        "GDPR-001",
        "Lawful basis for processing must be established",
        "Ensure valid legal basis for data processing",
    ),
    (
        "GDPR-002",
        "Data subject rights must be respected",
        "Enable data subject access, rectification, and erasure",
    ),
    (
        "GDPR-003",
        "Data protection by design must be implemented",
        "Integrate data protection into design phase",
    ),
    (
        "GDPR-004",
        "Data breach notification must be prepared",
        "Establish procedures for data breach notification",
    ),
];

pub struct Standard {
    pub name: &'static str,
    pub requirements: Vec<ComplianceRequirement>,
}

static CATALOG: Lazy<Vec<Standard>> = Lazy::new(|| {
    [
        ("FDA", FDA),
        ("IEC 62304", IEC_62304),
        ("ISO 13485", ISO_13485),
        ("ISO 9001", ISO_9001),
        ("ISO 27001", ISO_27001),
        ("GDPR", GDPR),
    ]
    .into_iter()
    .map(|(name, entries)| Standard {
        name,
        requirements: entries
            .iter()
            .map(|(id, requirement, description)| ComplianceRequirement {
                id: id.to_string(),
                requirement: requirement.to_string(),
                description: description.to_string(),
            })
            .collect(),
    })
    .collect()
});

pub fn available_standards() -> Vec<&'static str> {
    CATALOG.iter().map(|standard| standard.name).collect()
}

/// Exact lookup by standard name; `"fda"` is not `"FDA"`.
pub fn find_standard(name: &str) -> Option<&'static Standard> {
    CATALOG.iter().find(|standard| standard.name == name)
}

pub fn standard_requirements(name: &str) -> Option<&'static [ComplianceRequirement]> {
    find_standard(name).map(|standard| standard.requirements.as_slice())
}
