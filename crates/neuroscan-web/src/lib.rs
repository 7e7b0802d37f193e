//! # NeuroScan Web
//!
//! HTTP接口层：认证服务与中间件、请求处理器、路由组织。
//! 所有响应遵循 {success, data?, error?} 包装。

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::{AuthConfig, AuthService, Claims, LoginRequest, RegisterRequest, SessionResponse};
pub use handlers::{ApiError, ApiResult};
pub use server::{AppState, WebServer};
