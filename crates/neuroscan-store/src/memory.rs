//! 内存存储实现
//!
//! 单进程内的HashMap存储，每个实体表由独立的读写锁保护。
//! 单条记录的写入是原子的，跨记录不提供事务。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neuroscan_core::{
    Account, AnalysisResult, NeuroscanError, Patient, Report, Result, Scan,
};
use tokio::sync::RwLock;
use tracing::debug;

use crate::repository::{AccountStore, PatientStore, ReportStore, ResultStore, ScanStore};

/// 聚合的数据访问入口，按接口注入各实体仓储
#[derive(Clone)]
pub struct Datastore {
    pub accounts: Arc<dyn AccountStore>,
    pub patients: Arc<dyn PatientStore>,
    pub scans: Arc<dyn ScanStore>,
    pub results: Arc<dyn ResultStore>,
    pub reports: Arc<dyn ReportStore>,
}

impl Datastore {
    /// 创建全内存实现（开发与测试用）
    pub fn in_memory() -> Self {
        Self {
            accounts: Arc::new(MemoryAccounts::default()),
            patients: Arc::new(MemoryPatients::default()),
            scans: Arc::new(MemoryScans::default()),
            results: Arc::new(MemoryResults::default()),
            reports: Arc::new(MemoryReports::default()),
        }
    }
}

/// 账户表
#[derive(Default)]
pub struct MemoryAccounts {
    rows: RwLock<HashMap<String, Account>>,
}

#[async_trait]
impl AccountStore for MemoryAccounts {
    async fn insert(&self, account: Account) -> Result<Account> {
        let mut rows = self.rows.write().await;
        // 邮箱唯一性检查与写入持同一把写锁
        if rows.values().any(|a| a.email == account.email) {
            return Err(NeuroscanError::Conflict(
                "Email already registered".to_string(),
            ));
        }
        debug!("Inserting account {}", account.id);
        rows.insert(account.id.clone(), account.clone());
        Ok(account)
    }

    async fn find_by_id(&self, id: &str) -> Option<Account> {
        self.rows.read().await.get(id).cloned()
    }

    async fn find_by_email(&self, email: &str) -> Option<Account> {
        self.rows
            .read()
            .await
            .values()
            .find(|a| a.email == email)
            .cloned()
    }

    async fn touch_last_login(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut rows = self.rows.write().await;
        let account = rows
            .get_mut(id)
            .ok_or_else(|| NeuroscanError::NotFound(format!("Account {} not found", id)))?;
        account.last_login = Some(at);
        Ok(())
    }
}

/// 患者表
#[derive(Default)]
pub struct MemoryPatients {
    rows: RwLock<HashMap<String, Patient>>,
}

#[async_trait]
impl PatientStore for MemoryPatients {
    async fn insert(&self, patient: Patient) -> Result<Patient> {
        let mut rows = self.rows.write().await;
        debug!("Inserting patient {}", patient.id);
        rows.insert(patient.id.clone(), patient.clone());
        Ok(patient)
    }

    async fn find_by_id(&self, id: &str) -> Option<Patient> {
        self.rows.read().await.get(id).cloned()
    }

    async fn find_by_email(&self, email: &str) -> Option<Patient> {
        self.rows
            .read()
            .await
            .values()
            .find(|p| p.email == email)
            .cloned()
    }

    async fn count(&self) -> usize {
        self.rows.read().await.len()
    }
}

/// 扫描表
#[derive(Default)]
pub struct MemoryScans {
    rows: RwLock<HashMap<String, Scan>>,
}

#[async_trait]
impl ScanStore for MemoryScans {
    async fn insert(&self, scan: Scan) -> Result<Scan> {
        let mut rows = self.rows.write().await;
        debug!("Inserting scan {}", scan.id);
        rows.insert(scan.id.clone(), scan.clone());
        Ok(scan)
    }

    async fn find_by_id(&self, id: &str) -> Option<Scan> {
        self.rows.read().await.get(id).cloned()
    }

    async fn update(&self, scan: Scan) -> Result<Scan> {
        let mut rows = self.rows.write().await;
        if !rows.contains_key(&scan.id) {
            return Err(NeuroscanError::NotFound(format!(
                "Scan {} not found",
                scan.id
            )));
        }
        rows.insert(scan.id.clone(), scan.clone());
        Ok(scan)
    }

    async fn list(&self) -> Vec<Scan> {
        self.rows.read().await.values().cloned().collect()
    }
}

/// 分析结果表
#[derive(Default)]
pub struct MemoryResults {
    rows: RwLock<HashMap<String, AnalysisResult>>,
}

#[async_trait]
impl ResultStore for MemoryResults {
    async fn insert(&self, result: AnalysisResult) -> Result<AnalysisResult> {
        // 按扫描唯一，检查与写入持同一把写锁
        let mut rows = self.rows.write().await;
        if rows.values().any(|r| r.scan_id == result.scan_id) {
            return Err(NeuroscanError::Conflict(
                "Analysis result already exists for this scan".to_string(),
            ));
        }
        debug!("Inserting analysis result {} for scan {}", result.id, result.scan_id);
        rows.insert(result.id.clone(), result.clone());
        Ok(result)
    }

    async fn find_by_id(&self, id: &str) -> Option<AnalysisResult> {
        self.rows.read().await.get(id).cloned()
    }

    async fn find_by_scan(&self, scan_id: &str) -> Option<AnalysisResult> {
        self.rows
            .read()
            .await
            .values()
            .find(|r| r.scan_id == scan_id)
            .cloned()
    }

    async fn list(&self) -> Vec<AnalysisResult> {
        self.rows.read().await.values().cloned().collect()
    }
}

/// 报告表
#[derive(Default)]
pub struct MemoryReports {
    rows: RwLock<HashMap<String, Report>>,
}

#[async_trait]
impl ReportStore for MemoryReports {
    async fn insert_unique(&self, report: Report) -> Result<Report> {
        // 唯一性检查与插入在同一把写锁内完成
        let mut rows = self.rows.write().await;
        if rows.values().any(|r| r.scan_id == report.scan_id) {
            return Err(NeuroscanError::Conflict(
                "Report already exists for this scan".to_string(),
            ));
        }
        debug!("Inserting report {} for scan {}", report.id, report.scan_id);
        rows.insert(report.id.clone(), report.clone());
        Ok(report)
    }

    async fn find_by_id(&self, id: &str) -> Option<Report> {
        self.rows.read().await.get(id).cloned()
    }

    async fn find_by_scan(&self, scan_id: &str) -> Option<Report> {
        self.rows
            .read()
            .await
            .values()
            .find(|r| r.scan_id == scan_id)
            .cloned()
    }

    async fn list(&self) -> Vec<Report> {
        self.rows.read().await.values().cloned().collect()
    }

    async fn count(&self) -> usize {
        self.rows.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neuroscan_core::{utils::short_id, Prediction, ReportStatus};

    fn sample_report(scan_id: &str) -> Report {
        Report {
            id: short_id("report"),
            scan_id: scan_id.to_string(),
            result_id: "result_001".to_string(),
            patient_id: "pat_001".to_string(),
            report_number: "RPT-2025-0001".to_string(),
            generated_at: Utc::now(),
            generated_by: "usr_001".to_string(),
            findings: "findings".to_string(),
            impression: "impression".to_string(),
            recommendations: "recommendations".to_string(),
            status: ReportStatus::Draft,
            pdf_url: "/reports/report_001.pdf".to_string(),
        }
    }

    #[tokio::test]
    async fn test_report_unique_per_scan() {
        let reports = MemoryReports::default();
        reports.insert_unique(sample_report("scan_001")).await.unwrap();

        // 同一扫描的第二份报告被拒绝，且不产生新记录
        let err = reports.insert_unique(sample_report("scan_001")).await;
        assert!(matches!(err, Err(NeuroscanError::Conflict(_))));
        assert_eq!(reports.count().await, 1);

        // 其它扫描不受影响
        reports.insert_unique(sample_report("scan_002")).await.unwrap();
        assert_eq!(reports.count().await, 2);
    }

    #[tokio::test]
    async fn test_report_unique_under_concurrency() {
        let reports = Arc::new(MemoryReports::default());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let reports = reports.clone();
            handles.push(tokio::spawn(async move {
                reports.insert_unique(sample_report("scan_race")).await
            }));
        }

        let mut ok = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                ok += 1;
            }
        }

        // 并发插入下恰好一个成功
        assert_eq!(ok, 1);
        assert_eq!(reports.count().await, 1);
    }

    #[tokio::test]
    async fn test_account_email_conflict() {
        let accounts = MemoryAccounts::default();
        let account = Account {
            id: short_id("usr"),
            email: "dup@hospital.org".to_string(),
            password_hash: "hash".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            role: neuroscan_core::Role::Doctor,
            department: None,
            specialization: None,
            patient_id: None,
            created_at: Utc::now(),
            last_login: None,
        };
        accounts.insert(account.clone()).await.unwrap();

        let mut dup = account;
        dup.id = short_id("usr");
        assert!(matches!(
            accounts.insert(dup).await,
            Err(NeuroscanError::Conflict(_))
        ));
    }

    fn sample_result(scan_id: &str) -> AnalysisResult {
        AnalysisResult {
            id: short_id("result"),
            scan_id: scan_id.to_string(),
            prediction: Prediction::Normal,
            confidence: 91.2,
            model_name: "model".to_string(),
            model_version: "1.0".to_string(),
            processing_time_ms: 2400,
            heatmap_url: "/placeholder.svg".to_string(),
            overlay_url: "/placeholder.svg".to_string(),
            analyzed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_result_find_by_scan() {
        let results = MemoryResults::default();
        results.insert(sample_result("scan_001")).await.unwrap();

        assert!(results.find_by_scan("scan_001").await.is_some());
        assert!(results.find_by_scan("scan_404").await.is_none());
    }

    #[tokio::test]
    async fn test_result_unique_per_scan() {
        let results = MemoryResults::default();
        results.insert(sample_result("scan_001")).await.unwrap();

        assert!(matches!(
            results.insert(sample_result("scan_001")).await,
            Err(NeuroscanError::Conflict(_))
        ));
        assert_eq!(results.list().await.len(), 1);
    }
}
