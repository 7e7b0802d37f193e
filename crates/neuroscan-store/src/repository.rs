//! 存储接口定义
//!
//! 按实体划分的仓储接口。领域逻辑只依赖这些接口，
//! 替换为真实数据库时无需改动生命周期与策略代码。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neuroscan_core::{Account, AnalysisResult, Patient, Report, Result, Scan};

/// 账户仓储
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// 插入新账户，邮箱重复时返回Conflict
    async fn insert(&self, account: Account) -> Result<Account>;
    async fn find_by_id(&self, id: &str) -> Option<Account>;
    async fn find_by_email(&self, email: &str) -> Option<Account>;
    /// 更新最近登录时间
    async fn touch_last_login(&self, id: &str, at: DateTime<Utc>) -> Result<()>;
}

/// 患者病历仓储
#[async_trait]
pub trait PatientStore: Send + Sync {
    async fn insert(&self, patient: Patient) -> Result<Patient>;
    async fn find_by_id(&self, id: &str) -> Option<Patient>;
    async fn find_by_email(&self, email: &str) -> Option<Patient>;
    /// 现有记录数，用于生成院内编号
    async fn count(&self) -> usize;
}

/// 扫描仓储
#[async_trait]
pub trait ScanStore: Send + Sync {
    async fn insert(&self, scan: Scan) -> Result<Scan>;
    async fn find_by_id(&self, id: &str) -> Option<Scan>;
    /// 整体替换已有记录，不存在时返回NotFound
    async fn update(&self, scan: Scan) -> Result<Scan>;
    async fn list(&self) -> Vec<Scan>;
}

/// 分析结果仓储（仅追加，按扫描唯一）
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// 插入结果；同一扫描已有结果时返回Conflict，
    /// 并发的重复分析任务至多落一条终态结果。
    async fn insert(&self, result: AnalysisResult) -> Result<AnalysisResult>;
    async fn find_by_id(&self, id: &str) -> Option<AnalysisResult>;
    async fn find_by_scan(&self, scan_id: &str) -> Option<AnalysisResult>;
    async fn list(&self) -> Vec<AnalysisResult>;
}

/// 报告仓储（仅追加，按扫描唯一）
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// 检查并插入：同一扫描已有报告时返回Conflict。
    /// 检查与写入必须在同一临界区内完成，
    /// 并发generate调用下同一扫描至多产生一份报告。
    async fn insert_unique(&self, report: Report) -> Result<Report>;
    async fn find_by_id(&self, id: &str) -> Option<Report>;
    async fn find_by_scan(&self, scan_id: &str) -> Option<Report>;
    async fn list(&self) -> Vec<Report>;
    /// 现有报告数，用于生成流水编号
    async fn count(&self) -> usize;
}
