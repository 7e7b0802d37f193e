//! Web服务器
//!
//! 路由组织：/auth/login、/auth/register、/auth/logout公开，
//! 其余全部经过认证中间件；跨域与请求日志在最外层。

use std::net::SocketAddr;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use neuroscan_core::{NeuroscanError, Result};
use neuroscan_store::Datastore;
use neuroscan_workflow::{
    AccessPolicy, AnalysisConfig, AnalysisEngine, PatientDirectory, ReportGenerator, ScanRegistry,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{AuthConfig, AuthService};
use crate::handlers::{self, ApiError};

/// 应用状态：按服务注入，处理器只依赖这里
#[derive(Clone)]
pub struct AppState {
    pub store: Datastore,
    pub auth: AuthService,
    pub policy: AccessPolicy,
    pub registry: ScanRegistry,
    pub analysis: AnalysisEngine,
    pub reports: ReportGenerator,
}

impl AppState {
    pub fn new(store: Datastore, auth_config: AuthConfig, analysis_config: AnalysisConfig) -> Self {
        let auth = AuthService::new(store.accounts.clone(), store.patients.clone(), auth_config);
        let policy = AccessPolicy::new(PatientDirectory::new(store.patients.clone()));
        let registry = ScanRegistry::new(store.clone(), policy.clone());
        let analysis =
            AnalysisEngine::new(store.scans.clone(), store.results.clone(), analysis_config);
        let reports = ReportGenerator::new(store.clone(), policy.clone());

        Self {
            store,
            auth,
            policy,
            registry,
            analysis,
            reports,
        }
    }
}

/// 认证中间件
///
/// 解析Bearer令牌并把账户写进请求扩展，
/// 令牌缺失、无效或主体已不存在时返回401。
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError(NeuroscanError::Auth("Not authenticated".to_string())))?;

    let claims = state.auth.verify_token(token)?;
    let account = state.auth.current_account(&claims).await?;

    request.extensions_mut().insert(account);
    Ok(next.run(request).await)
}

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState, body_limit_bytes: usize) -> Self {
        let app = Self::create_app(state, body_limit_bytes);
        Self { addr, app }
    }

    fn create_app(state: AppState, body_limit_bytes: usize) -> Router {
        // 公开路由
        let public = Router::new()
            .route("/auth/login", post(handlers::login))
            .route("/auth/register", post(handlers::register))
            .route("/auth/logout", post(handlers::logout));

        // 需要认证的路由
        let protected = Router::new()
            .route("/auth/me", get(handlers::me))
            .route("/scans", get(handlers::list_scans))
            .route("/scans/upload", post(handlers::upload_scan))
            .route("/scans/:id", get(handlers::get_scan))
            .route("/analysis/analyze/:scan_id", post(handlers::trigger_analysis))
            .route("/analysis/result/:scan_id", get(handlers::get_analysis_result))
            .route("/reports", get(handlers::list_reports))
            .route("/reports/generate", post(handlers::generate_report))
            .route("/reports/scan/:scan_id", get(handlers::get_report_by_scan))
            .route("/reports/:id", get(handlers::get_report))
            .route("/reports/:id/pdf", get(handlers::download_report_pdf))
            .route("/dashboard/stats", get(handlers::dashboard_stats))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            ));

        Router::new()
            // 根路径与健康检查
            .route("/", get(handlers::api_root))
            .route("/health", get(handlers::health))
            // API路由
            .nest("/api/v1", public.merge(protected))
            .with_state(state)
            // 全局中间件
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(
                        CorsLayer::new()
                            .allow_origin(Any)
                            .allow_methods(Any)
                            .allow_headers(Any),
                    ),
            )
            .layer(DefaultBodyLimit::max(body_limit_bytes))
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app)
            .await
            .map_err(|e| NeuroscanError::Internal(format!("Web server failed: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use tower::ServiceExt;

    fn test_app() -> Router {
        let store = Datastore::in_memory();
        let state = AppState::new(store, AuthConfig::default(), AnalysisConfig::default());
        WebServer::create_app(state, 50 * 1024 * 1024)
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = test_app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_me_without_token_unauthorized() {
        let app = test_app();
        let response = app
            .oneshot(
                Request::get("/api/v1/auth/me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_me_with_garbage_token_unauthorized() {
        let app = test_app();
        let response = app
            .oneshot(
                Request::get("/api/v1/auth/me")
                    .header(header::AUTHORIZATION, "Bearer not-a-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_unknown_email_unauthorized() {
        let app = test_app();
        let body = r#"{"email":"nobody@example.com","password":"password123"}"#;
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/v1/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let app = test_app();
        for uri in [
            "/api/v1/scans",
            "/api/v1/reports",
            "/api/v1/dashboard/stats",
            "/api/v1/analysis/result/scan_001",
        ] {
            let response = app
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "uri={}", uri);
        }
    }
}
