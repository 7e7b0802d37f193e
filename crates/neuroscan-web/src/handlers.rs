//! HTTP处理器
//!
//! 统一的响应包装为 {success, data?, error?}；
//! 领域错误在ApiError里映射为对应的HTTP状态码。

use axum::extract::{Extension, Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use neuroscan_core::{
    Account, AnalysisResult, NeuroscanError, Patient, Prediction, Report, ReportStatus, Role,
    Scan, ScanStatus,
};
use neuroscan_workflow::{role_allows, Action, ScanQuery, UploadedFile};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::auth::{LoginRequest, RegisterRequest};
use crate::server::AppState;

/// Web层错误包装，负责领域错误到HTTP状态的映射
#[derive(Debug)]
pub struct ApiError(pub NeuroscanError);

impl From<NeuroscanError> for ApiError {
    fn from(err: NeuroscanError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            NeuroscanError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            NeuroscanError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg),
            NeuroscanError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            NeuroscanError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            NeuroscanError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            NeuroscanError::InvalidStateTransition { ref from, .. } => (
                StatusCode::CONFLICT,
                format!("Scan cannot be analyzed in state {}", from),
            ),
            err => {
                // 内部细节只进日志，不出响应
                error!("Internal error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": message,
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// 成功响应包装
pub fn ok<T: Serialize>(data: T) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "data": data,
    }))
}

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "NeuroScan API",
        "version": "1.0.0",
        "status": "running",
        "endpoints": {
            "health": "/health",
            "api": "/api/v1"
        }
    }))
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "message": "NeuroScan API is running",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

// ---------------------------------------------------------------------------
// 认证

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let session = state.auth.login(request).await?;
    Ok(ok(session))
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let session = state.auth.register(request).await?;
    Ok((StatusCode::CREATED, ok(session)))
}

/// 登出只是确认：令牌是无状态的，由客户端丢弃
pub async fn logout() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "message": "Logged out successfully",
    }))
}

pub async fn me(Extension(account): Extension<Account>) -> impl IntoResponse {
    ok(account)
}

// ---------------------------------------------------------------------------
// 扫描

/// 扫描视图：附带归属患者信息
#[derive(Debug, Serialize)]
pub struct ScanView {
    #[serde(flatten)]
    pub scan: Scan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient: Option<Patient>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanListView {
    pub data: Vec<ScanView>,
    pub total: usize,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanListParams {
    pub status: Option<ScanStatus>,
    pub patient_id: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

async fn with_patient(state: &AppState, scan: Scan) -> ScanView {
    let patient = state.store.patients.find_by_id(&scan.patient_id).await;
    ScanView { scan, patient }
}

pub async fn list_scans(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Query(params): Query<ScanListParams>,
) -> ApiResult<impl IntoResponse> {
    let query = ScanQuery {
        status: params.status,
        patient_id: params.patient_id,
        page: params.page,
        page_size: params.page_size,
    };
    let page = state.registry.list(&account, &query).await?;

    let mut data = Vec::with_capacity(page.data.len());
    for scan in page.data {
        data.push(with_patient(&state, scan).await);
    }

    Ok(ok(ScanListView {
        data,
        total: page.total,
        page: page.page,
        page_size: page.page_size,
        total_pages: page.total_pages,
    }))
}

pub async fn get_scan(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let scan = state.registry.get(&account, &id).await?;
    Ok(ok(with_patient(&state, scan).await))
}

/// 上传扫描（multipart表单：files[] + 可选patientId）
pub async fn upload_scan(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    if !role_allows(account.role, Action::UploadScan) {
        return Err(NeuroscanError::Forbidden("Access denied".to_string()).into());
    }

    let mut files = Vec::new();
    let mut patient_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| NeuroscanError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().map(|s| s.to_string());
        if name.as_deref() == Some("patientId") {
            let value = field
                .text()
                .await
                .map_err(|e| NeuroscanError::Validation(format!("Invalid field: {}", e)))?;
            if !value.is_empty() {
                patient_id = Some(value);
            }
        } else {
            let file_name = field.file_name().unwrap_or("upload.dcm").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| NeuroscanError::Validation(format!("Invalid file: {}", e)))?;
            files.push(UploadedFile {
                file_name,
                size: data.len() as u64,
            });
        }
    }

    let scan = state
        .registry
        .upload(&account, patient_id.as_deref(), &files)
        .await?;
    info!("Uploaded scan {} ({} files)", scan.id, files.len());
    Ok((StatusCode::CREATED, ok(with_patient(&state, scan).await)))
}

// ---------------------------------------------------------------------------
// 分析

pub async fn trigger_analysis(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(scan_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    if !role_allows(account.role, Action::TriggerAnalysis) {
        return Err(NeuroscanError::Forbidden("Access denied".to_string()).into());
    }
    let ack = state.analysis.analyze(&scan_id).await?;
    Ok(ok(ack))
}

/// 分析结果视图：附带扫描记录
#[derive(Debug, Serialize)]
pub struct ResultView {
    #[serde(flatten)]
    pub result: AnalysisResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan: Option<Scan>,
}

pub async fn get_analysis_result(
    State(state): State<AppState>,
    Extension(_account): Extension<Account>,
    Path(scan_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let result = state.analysis.result(&scan_id).await?;
    let scan = state.store.scans.find_by_id(&scan_id).await;
    Ok(ok(ResultView { result, scan }))
}

// ---------------------------------------------------------------------------
// 报告

/// 报告视图：附带扫描、结果与患者信息
#[derive(Debug, Serialize)]
pub struct ReportView {
    #[serde(flatten)]
    pub report: Report,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan: Option<Scan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient: Option<Patient>,
}

async fn populate_report(state: &AppState, report: Report) -> ReportView {
    let scan = state.store.scans.find_by_id(&report.scan_id).await;
    let result = state.store.results.find_by_id(&report.result_id).await;
    let patient = state.store.patients.find_by_id(&report.patient_id).await;
    ReportView {
        report,
        scan,
        result,
        patient,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReportRequest {
    pub scan_id: Option<String>,
    pub result_id: Option<String>,
}

pub async fn list_reports(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
) -> ApiResult<impl IntoResponse> {
    let reports = state.reports.list(&account).await?;
    let mut views = Vec::with_capacity(reports.len());
    for report in reports {
        views.push(populate_report(&state, report).await);
    }
    Ok(ok(views))
}

pub async fn get_report_by_scan(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(scan_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let report = state.reports.by_scan(&account, &scan_id).await?;
    Ok(ok(populate_report(&state, report).await))
}

pub async fn get_report(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let report = state.reports.by_id(&account, &id).await?;
    Ok(ok(populate_report(&state, report).await))
}

pub async fn download_report_pdf(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let (report, payload) = state.reports.download(&account, &id).await?;

    let disposition = format!(
        "attachment; filename=\"{}-{}.pdf\"",
        report.report_number, report.id
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        payload,
    )
        .into_response())
}

pub async fn generate_report(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Json(request): Json<GenerateReportRequest>,
) -> ApiResult<impl IntoResponse> {
    let report = state
        .reports
        .generate(
            &account,
            request.scan_id.as_deref(),
            request.result_id.as_deref(),
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        ok(populate_report(&state, report).await),
    ))
}

// ---------------------------------------------------------------------------
// 工作台统计

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientDashboard {
    pub total_reports: usize,
    pub completed_reports: usize,
    pub pending_reports: usize,
    pub recent_reports: Vec<ReportView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicianDashboard {
    pub total_scans: usize,
    pub analyzed_scans: usize,
    pub positive_stroke_cases: usize,
    pub pending_scans: usize,
    pub today_scans: usize,
    pub weekly_trend: Vec<serde_json::Value>,
    pub recent_scans: Vec<ScanView>,
}

/// 工作台统计，按角色分支返回不同的形态
pub async fn dashboard_stats(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
) -> ApiResult<Response> {
    if account.role == Role::Patient {
        let patient = state.policy.patient_context(&account).await;
        let mut reports: Vec<Report> = match &patient {
            Some(p) => state
                .store
                .reports
                .list()
                .await
                .into_iter()
                .filter(|r| r.patient_id == p.id)
                .collect(),
            None => Vec::new(),
        };

        let total_reports = reports.len();
        let completed_reports = reports
            .iter()
            .filter(|r| r.status == ReportStatus::Finalized)
            .count();
        let pending_reports = reports
            .iter()
            .filter(|r| r.status == ReportStatus::Draft)
            .count();

        reports.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        let mut recent_reports = Vec::new();
        for report in reports.into_iter().take(5) {
            recent_reports.push(populate_report(&state, report).await);
        }

        return Ok(ok(PatientDashboard {
            total_reports,
            completed_reports,
            pending_reports,
            recent_reports,
        })
        .into_response());
    }

    let mut scans: Vec<Scan> = state
        .store
        .scans
        .list()
        .await
        .into_iter()
        .filter(|s| s.uploaded_by == account.id)
        .collect();
    let results: Vec<AnalysisResult> = state
        .store
        .results
        .list()
        .await
        .into_iter()
        .filter(|r| scans.iter().any(|s| s.id == r.scan_id))
        .collect();

    let today = Utc::now().date_naive();
    let total_scans = scans.len();
    let analyzed_scans = results.len();
    let positive_stroke_cases = results
        .iter()
        .filter(|r| r.prediction == Prediction::Stroke)
        .count();
    let pending_scans = scans
        .iter()
        .filter(|s| matches!(s.status, ScanStatus::Pending | ScanStatus::Analyzing))
        .count();
    let today_scans = scans
        .iter()
        .filter(|s| s.uploaded_at.date_naive() == today)
        .count();

    scans.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
    let mut recent_scans = Vec::new();
    for scan in scans.into_iter().take(5) {
        recent_scans.push(with_patient(&state, scan).await);
    }

    Ok(ok(ClinicianDashboard {
        total_scans,
        analyzed_scans,
        positive_stroke_cases,
        pending_scans,
        today_scans,
        weekly_trend: Vec::new(),
        recent_scans,
    })
    .into_response())
}
