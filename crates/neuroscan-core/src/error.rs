//! 错误定义模块

use thiserror::Error;

/// 系统统一错误类型
///
/// 变体与HTTP状态的映射在web层完成：
/// Validation→400、Auth→401、Forbidden→403、NotFound→404、
/// Conflict/InvalidStateTransition→409，其余→500。
#[derive(Error, Debug)]
pub enum NeuroscanError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("认证错误: {0}")]
    Auth(String),

    #[error("权限错误: {0}")]
    Forbidden(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("资源冲突: {0}")]
    Conflict(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),

    #[error("无效状态转换: 从 {from} 到 {event}")]
    InvalidStateTransition { from: String, event: String },
}

/// 系统统一结果类型
pub type Result<T> = std::result::Result<T, NeuroscanError>;
