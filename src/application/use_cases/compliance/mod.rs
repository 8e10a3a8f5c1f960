mod catalog;
mod report;
mod scorer;

pub use catalog::{available_standards, find_standard, standard_requirements, Standard};
pub use report::{render_report, ReportFormat};
pub use scorer::{check_compliance, check_single_requirement};

pub(crate) use report::escape_html;
