use crate::application::use_cases::compliance::{
    available_standards, check_compliance, render_report, standard_requirements, ReportFormat,
};
use crate::application::use_cases::generator::{
    enhance_with_context, export_test_cases, EnhancementKind, ExportFormat, GenerationOptions,
    TestType,
};
use crate::domain::compliance::ComplianceRunResult;
use crate::domain::error::{AppError, Result};
use crate::domain::id_sequence::IdSequence;
use crate::domain::integration::{TestCaseUpdate, TestExecutionResult, TrackerKind};
use crate::domain::llm_config::LLMConfig;
use crate::domain::project::Project;
use crate::domain::requirement::RequirementDocument;
use crate::domain::test_case::TestCase;
use crate::infrastructure::artifact_store::{atomic_write_bytes, backup_database, list_backups, BackupConfig};
use crate::infrastructure::trackers::{self, PolarionAdapter, TrackerAdapter};
use crate::interfaces::state::AppState;
use actix_cors::Cors;
use actix_web::http::StatusCode;
use actix_web::{dev::Server, get, post, put, web, App, HttpResponse, HttpServer, Responder};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const MAX_LOG_ENTRIES: usize = 100;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogEntry {
    pub time: String,
    pub level: String,
    pub source: String,
    pub message: String,
}

pub struct HttpState {
    pub app: Arc<AppState>,
    pub logs: Arc<Mutex<Vec<LogEntry>>>,
}

fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        AppError::GenerationFailure(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Logs the failure and answers with the mapped status.
fn failure(data: &HttpState, source: &str, context: &str, err: AppError) -> HttpResponse {
    add_log(&data.logs, "ERROR", source, &format!("{}: {}", context, err));
    tracing::error!(source, error = %err, "{}", context);
    HttpResponse::build(status_for(&err)).json(json!({ "error": err.to_string() }))
}

// ---- requirements ----

#[derive(Deserialize)]
pub struct ExtractRequest {
    pub path: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
}

#[post("/requirements/extract")]
async fn extract_requirements(data: web::Data<HttpState>, req: web::Json<ExtractRequest>) -> impl Responder {
    add_log(&data.logs, "INFO", "Requirements", &format!("Extracting {}", req.path));

    let result = async {
        let path = Path::new(&req.path);
        let extracted = data.app.extractor.extract(path)?;
        let metadata = extracted.metadata;
        let title = req.title.clone().unwrap_or_else(|| {
            path.file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or(metadata.file_name.as_str())
                .to_string()
        });
        let document = RequirementDocument {
            id: format!("REQ-{}", &metadata.sha256[..12]),
            title,
            description: req.description.clone(),
            content: extracted.text,
            source_file: Some(metadata.file_name.clone()),
            file_format: Some(metadata.format.clone()),
            project_name: req.project_name.clone(),
            content_hash: Some(metadata.sha256.clone()),
            extracted_date: Local::now().to_rfc3339(),
        };
        data.app.repository.save_requirement(&document).await?;
        Ok::<_, AppError>(document)
    }
    .await;

    match result {
        Ok(document) => {
            add_log(
                &data.logs,
                "INFO",
                "Requirements",
                &format!("Stored {} ({} chars)", document.id, document.content.chars().count()),
            );
            HttpResponse::Ok().json(document)
        }
        Err(e) => failure(&data, "Requirements", "Extraction failed", e),
    }
}

#[derive(Deserialize)]
pub struct ProjectQuery {
    #[serde(default)]
    pub project: Option<String>,
}

#[get("/requirements")]
async fn list_requirements(data: web::Data<HttpState>, query: web::Query<ProjectQuery>) -> impl Responder {
    match data.app.repository.list_requirements(query.project.as_deref()).await {
        Ok(documents) => HttpResponse::Ok().json(documents),
        Err(e) => failure(&data, "Requirements", "Failed to list requirements", e),
    }
}

#[get("/requirements/{id}")]
async fn get_requirement(data: web::Data<HttpState>, path: web::Path<String>) -> impl Responder {
    match data.app.repository.get_requirement(&path).await {
        Ok(document) => HttpResponse::Ok().json(document),
        Err(e) => failure(&data, "Requirements", "Failed to read requirement", e),
    }
}

// ---- test cases ----

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub requirements: Option<String>,
    /// Stored requirement document to generate from when `requirements` is absent.
    #[serde(default)]
    pub requirement_id: Option<String>,
    #[serde(default)]
    pub test_type: Option<String>,
    #[serde(default = "default_true")]
    pub include_compliance: bool,
    #[serde(default)]
    pub custom_instructions: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub config: Option<LLMConfig>,
}

#[post("/test-cases/generate")]
async fn generate_test_cases(data: web::Data<HttpState>, req: web::Json<GenerateRequest>) -> impl Responder {
    let test_type = req.test_type.as_deref().map(TestType::parse).unwrap_or_default();
    let config = data.app.llm_config(req.config.as_ref());
    add_log(
        &data.logs,
        "INFO",
        "Generator",
        &format!(
            "Generating {:?} test cases (provider={:?} model={})",
            test_type, config.provider, config.model
        ),
    );

    let result = async {
        let (requirements, source_file, project_name) = match (&req.requirements, &req.requirement_id) {
            (Some(text), _) => (text.clone(), req.source_file.clone(), req.project_name.clone()),
            (None, Some(id)) => {
                let document = data.app.repository.get_requirement(id).await?;
                (
                    document.content,
                    req.source_file.clone().or(document.source_file),
                    req.project_name.clone().or(document.project_name),
                )
            }
            (None, None) => {
                return Err(AppError::InvalidInput(
                    "Either requirements or requirement_id is required".to_string(),
                ))
            }
        };

        let options = GenerationOptions {
            test_type,
            include_compliance: req.include_compliance,
            custom_instructions: req.custom_instructions.clone(),
            source_file,
            project_name,
        };

        // Model call runs on a scratch sequence; final ids are assigned at store time.
        let mut scratch = IdSequence::new(test_type.id_prefix());
        let mut outcome = data
            .app
            .generator
            .generate(&config, &requirements, &options, &mut scratch)
            .await?;
        outcome.test_cases = data
            .app
            .store_generated(test_type.id_prefix(), outcome.test_cases)
            .await?;
        Ok::<_, AppError>(outcome)
    }
    .await;

    match result {
        Ok(outcome) => {
            add_log(
                &data.logs,
                "INFO",
                "Generator",
                &format!("Generated {} test cases ({:?})", outcome.test_cases.len(), outcome.source),
            );
            HttpResponse::Ok().json(outcome)
        }
        Err(e) => failure(&data, "Generator", "Generation failed", e),
    }
}

#[derive(Deserialize)]
pub struct EnhanceRequest {
    pub test_cases: Vec<TestCase>,
    pub context: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub persist: bool,
}

#[post("/test-cases/enhance")]
async fn enhance_test_cases(data: web::Data<HttpState>, req: web::Json<EnhanceRequest>) -> impl Responder {
    let kind = req.kind.as_deref().map(EnhancementKind::parse).unwrap_or(EnhancementKind::General);
    add_log(
        &data.logs,
        "INFO",
        "Generator",
        &format!("Enhancing {} test cases ({:?})", req.test_cases.len(), kind),
    );

    let enhanced = enhance_with_context(&req.test_cases, &req.context, kind);
    if !req.persist {
        return HttpResponse::Ok().json(enhanced);
    }
    match data.app.repository.save_test_cases(&enhanced).await {
        Ok(saved) => HttpResponse::Ok().json(saved),
        Err(e) => failure(&data, "Generator", "Failed to store enhanced test cases", e),
    }
}

#[derive(Deserialize)]
pub struct AiEnhanceRequest {
    pub test_cases: Vec<TestCase>,
    pub instruction: String,
    #[serde(default)]
    pub config: Option<LLMConfig>,
}

#[post("/test-cases/ai-enhance")]
async fn ai_enhance_test_cases(data: web::Data<HttpState>, req: web::Json<AiEnhanceRequest>) -> impl Responder {
    let config = data.app.llm_config(req.config.as_ref());
    add_log(
        &data.logs,
        "INFO",
        "Generator",
        &format!(
            "Model enhancement of {} test cases (provider={:?})",
            req.test_cases.len(),
            config.provider
        ),
    );

    let enhanced = data
        .app
        .generator
        .enhance_with_model(&config, &req.test_cases, &req.instruction)
        .await;
    HttpResponse::Ok().json(enhanced)
}

#[post("/test-cases")]
async fn save_test_case(data: web::Data<HttpState>, req: web::Json<TestCase>) -> impl Responder {
    let result = async {
        let mut test_case = req.into_inner();
        let _guard = data.app.id_lock.lock().await;
        if test_case.id.trim().is_empty() {
            test_case.id = data.app.id_sequence(TestType::Functional.id_prefix()).await?.next_id();
        }
        data.app.repository.save_test_case(&test_case).await
    }
    .await;

    match result {
        Ok(saved) => {
            add_log(&data.logs, "INFO", "TestCases", &format!("Saved {}", saved.id));
            HttpResponse::Ok().json(saved)
        }
        Err(e) => failure(&data, "TestCases", "Failed to save test case", e),
    }
}

#[derive(Deserialize)]
pub struct TestCaseQuery {
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
}

#[get("/test-cases")]
async fn list_test_cases(data: web::Data<HttpState>, query: web::Query<TestCaseQuery>) -> impl Responder {
    let project = query.project.as_deref();
    let result = match query.q.as_deref().filter(|q| !q.trim().is_empty()) {
        Some(q) => data.app.repository.search_test_cases(q, project).await,
        None => data.app.repository.list_test_cases(project).await,
    };
    match result {
        Ok(cases) => HttpResponse::Ok().json(cases),
        Err(e) => failure(&data, "TestCases", "Failed to list test cases", e),
    }
}

#[get("/test-cases/{id}")]
async fn get_test_case(data: web::Data<HttpState>, path: web::Path<String>) -> impl Responder {
    match data.app.repository.get_test_case(&path).await {
        Ok(case) => HttpResponse::Ok().json(case),
        Err(e) => failure(&data, "TestCases", "Failed to read test case", e),
    }
}

#[derive(Deserialize)]
pub struct ExportRequest {
    /// Stored cases for `project_name` are exported when absent.
    #[serde(default)]
    pub test_cases: Option<Vec<TestCase>>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    /// Also write the export under `export.output_dir`.
    #[serde(default)]
    pub save_to_file: bool,
}

#[post("/test-cases/export")]
async fn export(data: web::Data<HttpState>, req: web::Json<ExportRequest>) -> impl Responder {
    let settings = &data.app.config_service.config().export;
    let format_name = req.format.clone().unwrap_or_else(|| settings.default_format.clone());

    let result = async {
        let format = ExportFormat::parse(&format_name)?;
        let cases = match &req.test_cases {
            Some(cases) => cases.clone(),
            None => data.app.repository.list_test_cases(req.project_name.as_deref()).await?,
        };
        let body = export_test_cases(&cases, format)?;

        let saved_to = if req.save_to_file {
            let file_name = format!(
                "test_cases_{}.{}",
                Local::now().format("%Y%m%d_%H%M%S"),
                format_name.trim().to_ascii_lowercase()
            );
            let path = PathBuf::from(&settings.output_dir).join(file_name);
            atomic_write_bytes(&path, body.as_bytes())?;
            Some(path)
        } else {
            None
        };
        Ok::<_, AppError>((format, cases.len(), body, saved_to))
    }
    .await;

    match result {
        Ok((format, count, body, saved_to)) => {
            let mut message = format!("Exported {} test cases as {}", count, format_name);
            if let Some(path) = &saved_to {
                message.push_str(&format!(" to {}", path.display()));
            }
            add_log(&data.logs, "INFO", "Export", &message);
            HttpResponse::Ok().content_type(format.content_type()).body(body)
        }
        Err(e) => failure(&data, "Export", "Export failed", e),
    }
}

// ---- compliance ----

#[get("/compliance/standards")]
async fn compliance_standards() -> impl Responder {
    let standards: Vec<_> = available_standards()
        .into_iter()
        .map(|name| {
            json!({
                "name": name,
                "requirements": standard_requirements(name).unwrap_or_default(),
            })
        })
        .collect();
    HttpResponse::Ok().json(standards)
}

#[derive(Deserialize)]
pub struct ComplianceCheckRequest {
    #[serde(default)]
    pub test_cases: Option<Vec<TestCase>>,
    #[serde(default)]
    pub project_name: Option<String>,
    /// Falls back to the project's standards, then to configuration.
    #[serde(default)]
    pub standards: Option<Vec<String>>,
}

#[post("/compliance/check")]
async fn compliance_check(data: web::Data<HttpState>, req: web::Json<ComplianceCheckRequest>) -> impl Responder {
    let project = req.project_name.as_deref();
    let result = async {
        let cases = match &req.test_cases {
            Some(cases) => cases.clone(),
            None => data.app.repository.list_test_cases(project).await?,
        };
        let standards = match &req.standards {
            Some(standards) => standards.clone(),
            None => {
                let from_project = match project {
                    Some(name) => match data.app.repository.get_project(name).await {
                        Ok(project) => project.compliance_standards,
                        Err(AppError::NotFound(_)) => Vec::new(),
                        Err(e) => return Err(e),
                    },
                    None => Vec::new(),
                };
                if from_project.is_empty() {
                    data.app.config_service.config().compliance.enabled_standards.clone()
                } else {
                    from_project
                }
            }
        };

        let run = check_compliance(&cases, &standards)?;
        let run_id = data.app.repository.save_compliance_run(project, &run).await?;
        data.app.repository.get_compliance_run(&run_id).await
    }
    .await;

    match result {
        Ok(stored) => {
            let strict = data.app.config_service.config().compliance.strict_mode;
            let level = if strict && stored.result.passed_checks < stored.result.total_checks {
                "WARN"
            } else {
                "INFO"
            };
            add_log(
                &data.logs,
                level,
                "Compliance",
                &format!(
                    "Run {}: {}/{} checks passed (score {:.1})",
                    stored.id, stored.result.passed_checks, stored.result.total_checks, stored.result.overall_score
                ),
            );
            HttpResponse::Ok().json(stored)
        }
        Err(e) => failure(&data, "Compliance", "Compliance check failed", e),
    }
}

#[get("/compliance/runs/{id}")]
async fn get_compliance_run(data: web::Data<HttpState>, path: web::Path<String>) -> impl Responder {
    match data.app.repository.get_compliance_run(&path).await {
        Ok(run) => HttpResponse::Ok().json(run),
        Err(e) => failure(&data, "Compliance", "Failed to read compliance run", e),
    }
}

#[derive(Deserialize)]
pub struct ReportRequest {
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub result: Option<ComplianceRunResult>,
    pub format: String,
}

#[post("/compliance/report")]
async fn compliance_report(data: web::Data<HttpState>, req: web::Json<ReportRequest>) -> impl Responder {
    let result = async {
        let format = ReportFormat::parse(&req.format)?;
        let run = match (&req.result, &req.run_id) {
            (Some(result), _) => result.clone(),
            (None, Some(id)) => data.app.repository.get_compliance_run(id).await?.result,
            (None, None) => {
                return Err(AppError::InvalidInput(
                    "Either result or run_id is required".to_string(),
                ))
            }
        };
        Ok::<_, AppError>((format, render_report(&run, format)?))
    }
    .await;

    match result {
        Ok((format, body)) => HttpResponse::Ok().content_type(format.content_type()).body(body),
        Err(e) => failure(&data, "Compliance", "Report rendering failed", e),
    }
}

// ---- projects ----

#[get("/projects")]
async fn list_projects(data: web::Data<HttpState>) -> impl Responder {
    match data.app.repository.list_projects().await {
        Ok(projects) => HttpResponse::Ok().json(projects),
        Err(e) => failure(&data, "Projects", "Failed to list projects", e),
    }
}

#[post("/projects")]
async fn create_project(data: web::Data<HttpState>, req: web::Json<Project>) -> impl Responder {
    match data.app.repository.save_project(&req).await {
        Ok(project) => {
            add_log(&data.logs, "INFO", "Projects", &format!("Saved project {}", project.name));
            HttpResponse::Ok().json(project)
        }
        Err(e) => failure(&data, "Projects", "Failed to save project", e),
    }
}

// ---- integrations ----

fn tracker_for(data: &HttpState, name: &str) -> Result<Box<dyn TrackerAdapter>> {
    let kind = TrackerKind::parse(name)
        .ok_or_else(|| AppError::InvalidInput(format!("Unknown tracker: {}", name)))?;
    let config = &data.app.config_service;
    trackers::build_adapter(kind, &config.config().integrations, config)
}

#[derive(Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub test_case_ids: Vec<String>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub project: Option<String>,
}

#[post("/integrations/{tracker}/import")]
async fn import_to_tracker(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    req: web::Json<ImportRequest>,
) -> impl Responder {
    add_log(&data.logs, "INFO", "Integrations", &format!("Importing into {}", path));

    let result = async {
        let adapter = tracker_for(&data, &path)?;
        let mut cases = req.test_cases.clone();
        for id in &req.test_case_ids {
            cases.push(data.app.repository.get_test_case(id).await?);
        }
        if cases.is_empty() {
            return Err(AppError::InvalidInput("No test cases to import".to_string()));
        }
        Ok::<_, AppError>(trackers::import_test_cases(adapter.as_ref(), &data.app.repository, &cases, req.project.as_deref()).await)
    }
    .await;

    match result {
        Ok(summary) => {
            add_log(
                &data.logs,
                if summary.failed > 0 { "WARN" } else { "INFO" },
                "Integrations",
                &format!("{}: {}/{} imported", summary.tracker, summary.successful, summary.total),
            );
            HttpResponse::Ok().json(summary)
        }
        Err(e) => failure(&data, "Integrations", "Import failed", e),
    }
}

#[derive(Deserialize)]
pub struct TrackerSearchRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
}

#[post("/integrations/{tracker}/search")]
async fn search_tracker(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    req: web::Json<TrackerSearchRequest>,
) -> impl Responder {
    let result = async {
        let adapter = tracker_for(&data, &path)?;
        trackers::search_remote(adapter.as_ref(), &data.app.repository, req.query.as_deref(), req.project.as_deref()).await
    }
    .await;

    match result {
        Ok(found) => HttpResponse::Ok().json(found),
        Err(e) => failure(&data, "Integrations", "Tracker search failed", e),
    }
}

#[get("/integrations/{tracker}/test-cases/{remote_id}")]
async fn get_remote_test_case(data: web::Data<HttpState>, path: web::Path<(String, String)>) -> impl Responder {
    let (tracker, remote_id) = path.into_inner();
    let result = async { tracker_for(&data, &tracker)?.get_test_case(&remote_id).await }.await;
    match result {
        Ok(remote) => HttpResponse::Ok().json(remote),
        Err(e) => failure(&data, "Integrations", "Failed to read remote test case", e),
    }
}

#[put("/integrations/{tracker}/test-cases/{remote_id}")]
async fn update_remote_test_case(
    data: web::Data<HttpState>,
    path: web::Path<(String, String)>,
    req: web::Json<TestCaseUpdate>,
) -> impl Responder {
    let (tracker, remote_id) = path.into_inner();
    let result = async { tracker_for(&data, &tracker)?.update_test_case(&remote_id, &req).await }.await;
    match result {
        Ok(remote) => {
            add_log(&data.logs, "INFO", "Integrations", &format!("Updated {} in {}", remote_id, tracker));
            HttpResponse::Ok().json(remote)
        }
        Err(e) => failure(&data, "Integrations", "Failed to update remote test case", e),
    }
}

#[get("/integrations/{tracker}/status")]
async fn tracker_status(data: web::Data<HttpState>, path: web::Path<String>) -> impl Responder {
    match tracker_for(&data, &path) {
        Ok(adapter) => {
            let connected = adapter.test_connection().await;
            HttpResponse::Ok().json(json!({ "tracker": adapter.kind(), "connected": connected }))
        }
        Err(e) => failure(&data, "Integrations", "Tracker unavailable", e),
    }
}

#[post("/integrations/jira/test-cases/{remote_id}/results")]
async fn add_jira_results(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    req: web::Json<TestExecutionResult>,
) -> impl Responder {
    let remote_id = path.into_inner();
    let result = async {
        let config = &data.app.config_service;
        let adapter = trackers::build_jira(&config.config().integrations, config)?;
        let outcome = adapter.add_test_results(&remote_id, &req).await;
        let (status, details) = match &outcome {
            Ok(_) => ("success", req.status.clone()),
            Err(err) => ("error", Some(err.to_string())),
        };
        trackers::record(&data.app.repository, TrackerKind::Jira, "add_results", Some(&remote_id), status, details).await;
        outcome
    }
    .await;

    match result {
        Ok(remote) => {
            add_log(&data.logs, "INFO", "Integrations", &format!("Added test results to {}", remote_id));
            HttpResponse::Ok().json(remote)
        }
        Err(e) => failure(&data, "Integrations", "Failed to add test results", e),
    }
}

#[derive(Deserialize)]
pub struct TestPlanRequest {
    pub name: String,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[post("/integrations/azure_devops/test-plans")]
async fn create_azure_test_plan(data: web::Data<HttpState>, req: web::Json<TestPlanRequest>) -> impl Responder {
    let result = async {
        let config = &data.app.config_service;
        let adapter = trackers::build_azure_devops(&config.config().integrations, config)?;
        let outcome = adapter
            .create_test_plan(&req.name, req.project.as_deref(), &req.description)
            .await;
        let (status, target, details) = match &outcome {
            Ok(plan) => ("success", Some(plan.plan_id.clone()), Some(plan.name.clone())),
            Err(err) => ("error", None, Some(err.to_string())),
        };
        trackers::record(&data.app.repository, TrackerKind::AzureDevops, "create_plan", target.as_deref(), status, details).await;
        outcome
    }
    .await;

    match result {
        Ok(plan) => {
            add_log(&data.logs, "INFO", "Integrations", &format!("Created test plan {}", plan.plan_id));
            HttpResponse::Ok().json(plan)
        }
        Err(e) => failure(&data, "Integrations", "Failed to create test plan", e),
    }
}

#[derive(Deserialize)]
pub struct PlanTestCasesRequest {
    pub test_case_ids: Vec<String>,
    #[serde(default)]
    pub project: Option<String>,
}

#[post("/integrations/azure_devops/test-plans/{plan_id}/test-cases")]
async fn add_azure_plan_test_cases(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    req: web::Json<PlanTestCasesRequest>,
) -> impl Responder {
    let plan_id = path.into_inner();
    let result = async {
        let config = &data.app.config_service;
        let adapter = trackers::build_azure_devops(&config.config().integrations, config)?;
        let outcome = adapter
            .add_test_cases_to_plan(&plan_id, &req.test_case_ids, req.project.as_deref())
            .await;
        let (status, details) = match &outcome {
            Ok(assignment) => ("success", Some(format!("{} test cases added", assignment.added))),
            Err(err) => ("error", Some(err.to_string())),
        };
        trackers::record(&data.app.repository, TrackerKind::AzureDevops, "add_to_plan", Some(&plan_id), status, details).await;
        outcome
    }
    .await;

    match result {
        Ok(assignment) => HttpResponse::Ok().json(assignment),
        Err(e) => failure(&data, "Integrations", "Failed to add test cases to plan", e),
    }
}

#[derive(Deserialize)]
pub struct PolarionExportRequest {
    #[serde(default)]
    pub test_case_ids: Vec<String>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub project: Option<String>,
}

/// Offline export; works without the Polarion integration being enabled.
#[post("/integrations/polarion/export")]
async fn export_polarion_xml(data: web::Data<HttpState>, req: web::Json<PolarionExportRequest>) -> impl Responder {
    let result = async {
        let settings = &data.app.config_service.config().integrations.polarion;
        let adapter = PolarionAdapter::new(&settings.base_url, &settings.project_id);
        let mut cases = req.test_cases.clone();
        for id in &req.test_case_ids {
            cases.push(data.app.repository.get_test_case(id).await?);
        }
        adapter.export_xml(&cases, req.project.as_deref())
    }
    .await;

    match result {
        Ok(xml) => HttpResponse::Ok().content_type("application/xml").body(xml),
        Err(e) => failure(&data, "Integrations", "Polarion export failed", e),
    }
}

#[derive(Deserialize)]
pub struct IntegrationLogQuery {
    #[serde(default, rename = "type")]
    pub integration_type: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[get("/integrations/logs")]
async fn integration_logs(data: web::Data<HttpState>, query: web::Query<IntegrationLogQuery>) -> impl Responder {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    match data
        .app
        .repository
        .list_integration_logs(query.integration_type.as_deref(), limit)
        .await
    {
        Ok(logs) => HttpResponse::Ok().json(logs),
        Err(e) => failure(&data, "Integrations", "Failed to read integration logs", e),
    }
}

// ---- models, settings, maintenance ----

#[post("/models")]
async fn list_models(data: web::Data<HttpState>, config: Option<web::Json<LLMConfig>>) -> impl Responder {
    let config = data.app.llm_config(config.as_deref());
    add_log(
        &data.logs,
        "INFO",
        "HttpApi",
        &format!(
            "Fetching models (provider={:?} base_url={})",
            config.provider, config.base_url
        ),
    );

    match data.app.llm_client.list_models(&config).await {
        Ok(models) => HttpResponse::Ok().json(models),
        Err(e) => failure(&data, "HttpApi", "Failed to list models", e),
    }
}

#[derive(Deserialize)]
pub struct ApiKeyRequest {
    pub provider: String,
    pub api_key: String,
}

#[post("/settings/api-key")]
async fn save_api_key(data: web::Data<HttpState>, req: web::Json<ApiKeyRequest>) -> impl Responder {
    match data.app.config_service.save_api_key(&req.provider, &req.api_key) {
        Ok(()) => {
            add_log(&data.logs, "INFO", "Settings", &format!("Stored API key for {}", req.provider));
            HttpResponse::NoContent().finish()
        }
        Err(e) => failure(&data, "Settings", "Failed to store API key", e),
    }
}

#[actix_web::delete("/settings/api-key/{provider}")]
async fn delete_api_key(data: web::Data<HttpState>, path: web::Path<String>) -> impl Responder {
    match data.app.config_service.delete_api_key(&path) {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => failure(&data, "Settings", "Failed to delete API key", e),
    }
}

#[get("/settings/config")]
async fn get_config(data: web::Data<HttpState>) -> impl Responder {
    let mut config = data.app.config_service.config().clone();
    config.integrations.jira.api_token = None;
    config.integrations.polarion.password = None;
    config.integrations.azure_devops.personal_access_token = None;
    HttpResponse::Ok().json(config)
}

fn backup_config(data: &HttpState) -> (PathBuf, BackupConfig) {
    let database = &data.app.config_service.config().database;
    (
        PathBuf::from(&database.path),
        BackupConfig::new(&database.backup_dir, database.max_backups),
    )
}

#[derive(Serialize)]
struct BackupListing {
    file_name: String,
    size_bytes: u64,
}

#[get("/database/backups")]
async fn get_backups(data: web::Data<HttpState>) -> impl Responder {
    let (_, config) = backup_config(&data);
    match list_backups(&config) {
        Ok(backups) => HttpResponse::Ok().json(
            backups
                .into_iter()
                .map(|b| BackupListing {
                    file_name: b.file_name,
                    size_bytes: b.size_bytes,
                })
                .collect::<Vec<_>>(),
        ),
        Err(e) => failure(&data, "Database", "Failed to list backups", e),
    }
}

#[post("/database/backup")]
async fn create_backup(data: web::Data<HttpState>) -> impl Responder {
    let (db_path, config) = backup_config(&data);
    match backup_database(&db_path, &config, Some("manual")) {
        Ok(result) => {
            add_log(
                &data.logs,
                "INFO",
                "Database",
                &format!("Backup written: {} ({} bytes)", result.backup_path.display(), result.size_bytes),
            );
            HttpResponse::Ok().json(result)
        }
        Err(e) => failure(&data, "Database", "Backup failed", e),
    }
}

#[get("/logs")]
async fn get_logs(data: web::Data<HttpState>) -> impl Responder {
    match data.logs.lock() {
        Ok(logs) => HttpResponse::Ok().json(&*logs),
        Err(_) => HttpResponse::InternalServerError().body("log buffer poisoned"),
    }
}

pub fn add_log_entry(logs: &Mutex<Vec<LogEntry>>, level: &str, source: &str, message: &str) -> LogEntry {
    let entry = LogEntry {
        time: Local::now().format("%H:%M:%S").to_string(),
        level: level.to_string(),
        source: source.to_string(),
        message: message.to_string(),
    };
    if let Ok(mut logs) = logs.lock() {
        logs.push(entry.clone());
        if logs.len() > MAX_LOG_ENTRIES {
            logs.remove(0);
        }
    }
    entry
}

pub fn add_log(logs: &Mutex<Vec<LogEntry>>, level: &str, source: &str, message: &str) {
    add_log_entry(logs, level, source, message);
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(extract_requirements)
            .service(list_requirements)
            .service(get_requirement)
            .service(generate_test_cases)
            .service(enhance_test_cases)
            .service(ai_enhance_test_cases)
            .service(export)
            .service(save_test_case)
            .service(list_test_cases)
            .service(get_test_case)
            .service(compliance_standards)
            .service(compliance_check)
            .service(get_compliance_run)
            .service(compliance_report)
            .service(list_projects)
            .service(create_project)
            .service(integration_logs)
            .service(import_to_tracker)
            .service(search_tracker)
            .service(get_remote_test_case)
            .service(update_remote_test_case)
            .service(tracker_status)
            .service(add_jira_results)
            .service(create_azure_test_plan)
            .service(add_azure_plan_test_cases)
            .service(export_polarion_xml)
            .service(list_models)
            .service(save_api_key)
            .service(delete_api_key)
            .service(get_config)
            .service(get_backups)
            .service(create_backup)
            .service(get_logs),
    );
}

pub fn start_server(app: Arc<AppState>, logs: Arc<Mutex<Vec<LogEntry>>>) -> std::io::Result<Server> {
    let (host, port) = app.config_service.config().bind_address();
    let state = web::Data::new(HttpState { app, logs });

    let server = HttpServer::new(move || {
        let cors = Cors::permissive(); // local tool, any origin

        App::new().wrap(cors).app_data(state.clone()).configure(configure)
    })
    .bind((host, port))?
    .run();

    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::generator::fakes::FakeLLMClient;
    use crate::infrastructure::config::ConfigService;
    use crate::infrastructure::db::repository::test_repository;
    use actix_web::{test as actix_test, App};
    use tempfile::TempDir;

    async fn state_with(reply: &str) -> (TempDir, web::Data<HttpState>) {
        let (dir, repository) = test_repository().await;
        let config = ConfigService::load_from(None, None).unwrap();
        let app = AppState::new(config, repository, Arc::new(FakeLLMClient::replying(reply)));
        let state = web::Data::new(HttpState {
            app: Arc::new(app),
            logs: Arc::new(Mutex::new(Vec::new())),
        });
        (dir, state)
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(status_for(&AppError::InvalidInput("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&AppError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&AppError::UnsupportedFormat("x".into())),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(status_for(&AppError::GenerationFailure("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(&AppError::StorageFailure("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_log_buffer_is_bounded() {
        let logs = Mutex::new(Vec::new());
        for i in 0..(MAX_LOG_ENTRIES + 5) {
            add_log(&logs, "INFO", "Test", &format!("entry {}", i));
        }
        let logs = logs.lock().unwrap();
        assert_eq!(logs.len(), MAX_LOG_ENTRIES);
        assert_eq!(logs[0].message, "entry 5");
    }

    #[actix_web::test]
    async fn test_generate_persists_and_continues_ids() {
        let reply = "```json\n{\"test_cases\": [{\"title\": \"Occlusion alarm\", \"steps\": [\"a\", \"b\", \"c\"]}]}\n```";
        let (_dir, state) = state_with(reply).await;
        state
            .app
            .repository
            .save_test_case(&TestCase::new("TC-004", "Existing"))
            .await
            .unwrap();
        let app = actix_test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = actix_test::TestRequest::post()
            .uri("/api/test-cases/generate")
            .set_json(json!({
                "requirements": "The pump shall stop the infusion on occlusion.",
                "project_name": "pump"
            }))
            .to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["test_cases"][0]["id"], "TC-005");
        assert_eq!(body["source"]["model"], "structured");

        let stored = state.app.repository.get_test_case("TC-005").await.unwrap();
        assert_eq!(stored.project_name.as_deref(), Some("pump"));
        assert_eq!(stored.steps.len(), 3);
    }

    #[actix_web::test]
    async fn test_compliance_check_without_standards_is_bad_request() {
        let (_dir, state) = state_with("{}").await;
        let app = actix_test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = actix_test::TestRequest::post()
            .uri("/api/compliance/check")
            .set_json(json!({ "test_cases": [], "standards": [] }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_missing_test_case_is_not_found() {
        let (_dir, state) = state_with("{}").await;
        let app = actix_test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = actix_test::TestRequest::get().uri("/api/test-cases/TC-999").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_export_csv_content_type() {
        let (_dir, state) = state_with("{}").await;
        let app = actix_test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = actix_test::TestRequest::post()
            .uri("/api/test-cases/export")
            .set_json(json!({
                "test_cases": [{"id": "TC-001", "title": "Dose check", "priority": "High"}],
                "format": "csv"
            }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/csv"));
        let body = actix_test::read_body(resp).await;
        assert!(String::from_utf8_lossy(&body).starts_with("ID,Title,Priority,Description"));

        let req = actix_test::TestRequest::post()
            .uri("/api/test-cases/export")
            .set_json(json!({ "test_cases": [], "format": "pdf" }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_polarion_export_includes_stored_cases() {
        let (_dir, state) = state_with("{}").await;
        state
            .app
            .repository
            .save_test_case(&TestCase::new("TC-004", "Audit trail"))
            .await
            .unwrap();
        let app = actix_test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = actix_test::TestRequest::post()
            .uri("/api/integrations/polarion/export")
            .set_json(json!({ "test_case_ids": ["TC-004"], "project": "CARDIO" }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = actix_test::read_body(resp).await;
        let xml = String::from_utf8_lossy(&body).to_string();
        assert!(xml.contains(r#"<project id="CARDIO">"#));
        assert!(xml.contains("<title>Audit trail</title>"));

        let req = actix_test::TestRequest::post()
            .uri("/api/integrations/polarion/export")
            .set_json(json!({ "test_cases": [] }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
