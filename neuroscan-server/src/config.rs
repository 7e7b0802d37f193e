//! 服务器配置
//!
//! 三层来源：代码内默认值 ← 可选TOML文件 ← NEUROSCAN_*环境变量。

use config::{Config, Environment, File};
use neuroscan_core::{NeuroscanError, Result};
use serde::Deserialize;

/// 服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// 监听主机
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 请求体上限（MB），约束multipart上传
    pub body_limit_mb: usize,
}

/// 认证配置
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_expiry_hours: i64,
    /// 开发密码旁路，生产环境置为false
    pub allow_dev_password: bool,
}

/// 分析引擎配置
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisSettings {
    pub delay_ms: u64,
    pub deadline_ms: u64,
    pub model_name: String,
    pub model_version: String,
}

/// 完整配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub analysis: AnalysisSettings,
    /// 是否写入演示种子数据
    pub seed_demo_data: bool,
}

fn cfg_err(e: config::ConfigError) -> NeuroscanError {
    NeuroscanError::Config(e.to_string())
}

impl AppConfig {
    /// 加载配置
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("server.host", "0.0.0.0")
            .map_err(cfg_err)?
            .set_default("server.port", 3001)
            .map_err(cfg_err)?
            .set_default("server.body_limit_mb", 50)
            .map_err(cfg_err)?
            .set_default("auth.jwt_secret", "your-secret-key-change-in-production")
            .map_err(cfg_err)?
            .set_default("auth.token_expiry_hours", 24)
            .map_err(cfg_err)?
            .set_default("auth.allow_dev_password", true)
            .map_err(cfg_err)?
            .set_default("analysis.delay_ms", 2000)
            .map_err(cfg_err)?
            .set_default("analysis.deadline_ms", 10000)
            .map_err(cfg_err)?
            .set_default("analysis.model_name", "CNN-GA-BiLSTM Hybrid Model")
            .map_err(cfg_err)?
            .set_default("analysis.model_version", "2.1.0")
            .map_err(cfg_err)?
            .set_default("seed_demo_data", true)
            .map_err(cfg_err)?;

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }

        builder
            .add_source(Environment::with_prefix("NEUROSCAN").separator("__"))
            .build()
            .map_err(cfg_err)?
            .try_deserialize()
            .map_err(cfg_err)
    }
}
