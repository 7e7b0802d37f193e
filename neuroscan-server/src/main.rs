//! NeuroScan服务器主程序

mod config;

use std::net::SocketAddr;

use clap::Parser;
use neuroscan_core::{NeuroscanError, Result};
use neuroscan_store::{seed_demo_data, Datastore};
use neuroscan_workflow::AnalysisConfig;
use neuroscan_web::{AppState, AuthConfig, WebServer};
use tracing::info;

use crate::config::AppConfig;

/// NeuroScan服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "neuroscan-server")]
#[command(about = "CT脑卒中智能检测平台服务器")]
struct Args {
    /// 监听主机（覆盖配置文件）
    #[arg(long)]
    host: Option<String>,

    /// 服务器端口（覆盖配置文件）
    #[arg(short, long)]
    port: Option<u16>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(args.log_level.as_str())
        .init();

    info!("启动NeuroScan服务器...");

    let mut app_config = AppConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        app_config.server.host = host;
    }
    if let Some(port) = args.port {
        app_config.server.port = port;
    }

    info!("NeuroScan服务器配置:");
    info!("  监听地址: {}:{}", app_config.server.host, app_config.server.port);
    info!("  请求体上限: {}MB", app_config.server.body_limit_mb);
    info!("  分析延迟: {}ms", app_config.analysis.delay_ms);
    info!("  开发密码旁路: {}", app_config.auth.allow_dev_password);

    // 组装存储与服务
    let store = Datastore::in_memory();
    let state = AppState::new(
        store.clone(),
        AuthConfig {
            jwt_secret: app_config.auth.jwt_secret.clone(),
            token_expiry_hours: app_config.auth.token_expiry_hours,
            allow_dev_password: app_config.auth.allow_dev_password,
        },
        AnalysisConfig {
            delay_ms: app_config.analysis.delay_ms,
            deadline_ms: app_config.analysis.deadline_ms,
            model_name: app_config.analysis.model_name.clone(),
            model_version: app_config.analysis.model_version.clone(),
        },
    );

    // 演示种子数据
    if app_config.seed_demo_data {
        let auth = state.auth.clone();
        seed_demo_data(&store, |pw| auth.hash_password(pw)).await?;
        info!("演示数据已就绪 (密码均为 password123)");
    }

    let addr: SocketAddr = format!(
        "{}:{}",
        app_config.server.host, app_config.server.port
    )
    .parse()
    .map_err(|e| NeuroscanError::Config(format!("Invalid listen address: {}", e)))?;

    let server = WebServer::new(
        addr,
        state,
        app_config.server.body_limit_mb * 1024 * 1024,
    );
    server.run().await
}
