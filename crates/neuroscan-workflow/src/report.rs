//! 报告生成
//!
//! 由(扫描, 结果)对派生诊断报告。文本内容不做生成，
//! 按预测结论从固定模板二选一；每个扫描至多一份报告，
//! 由存储层的唯一性插入保证。

use chrono::{Datelike, Utc};
use neuroscan_core::{
    utils::{sequence_number, short_id},
    Account, NeuroscanError, Prediction, Report, ReportStatus, Result,
};
use neuroscan_store::Datastore;
use tracing::info;

use crate::policy::{role_allows, AccessPolicy, Action};

/// 报告正文模板
struct Narrative {
    findings: &'static str,
    impression: &'static str,
    recommendations: &'static str,
}

/// 按预测结论选择模板
fn narrative(prediction: Prediction) -> Narrative {
    match prediction {
        Prediction::Stroke => Narrative {
            findings:
                "AI-assisted analysis detected abnormalities consistent with acute ischemic stroke.",
            impression: "ACUTE ISCHEMIC STROKE detected with high confidence.",
            recommendations: "Immediate neurology consultation recommended.",
        },
        Prediction::Normal => Narrative {
            findings: "AI-assisted analysis shows no evidence of acute intracranial pathology.",
            impression: "NORMAL CT HEAD. No evidence of stroke.",
            recommendations: "Clinical correlation recommended.",
        },
    }
}

/// 报告生成服务
#[derive(Clone)]
pub struct ReportGenerator {
    store: Datastore,
    policy: AccessPolicy,
}

impl ReportGenerator {
    pub fn new(store: Datastore, policy: AccessPolicy) -> Self {
        Self { store, policy }
    }

    /// 生成报告
    ///
    /// 角色门槛先于存在性检查；同一扫描重复生成返回Conflict。
    pub async fn generate(
        &self,
        caller: &Account,
        scan_id: Option<&str>,
        result_id: Option<&str>,
    ) -> Result<Report> {
        if !role_allows(caller.role, Action::GenerateReport) {
            return Err(NeuroscanError::Forbidden("Access denied".to_string()));
        }

        let (scan_id, result_id) = match (scan_id, result_id) {
            (Some(s), Some(r)) if !s.is_empty() && !r.is_empty() => (s, r),
            _ => {
                return Err(NeuroscanError::Validation(
                    "Scan ID and result ID are required".to_string(),
                ))
            }
        };

        let scan = self.store.scans.find_by_id(scan_id).await;
        let result = self.store.results.find_by_id(result_id).await;
        let (scan, result) = match (scan, result) {
            (Some(scan), Some(result)) => (scan, result),
            _ => {
                return Err(NeuroscanError::NotFound(
                    "Scan or result not found".to_string(),
                ))
            }
        };

        let now = Utc::now();
        let seq = self.store.reports.count().await + 1;
        let text = narrative(result.prediction);
        let id = short_id("report");

        let report = Report {
            pdf_url: format!("/reports/{}.pdf", id),
            id,
            scan_id: scan.id.clone(),
            result_id: result.id.clone(),
            patient_id: scan.patient_id.clone(),
            report_number: sequence_number("RPT", now.year(), seq),
            generated_at: now,
            generated_by: caller.id.clone(),
            findings: text.findings.to_string(),
            impression: text.impression.to_string(),
            recommendations: text.recommendations.to_string(),
            status: ReportStatus::Draft,
        };

        // 唯一性检查与插入由存储层在同一临界区完成
        let report = self.store.reports.insert_unique(report).await?;
        info!(
            "Report {} generated for scan {} by {}",
            report.report_number, report.scan_id, caller.id
        );
        Ok(report)
    }

    /// 调用者可见的报告列表
    pub async fn list(&self, caller: &Account) -> Result<Vec<Report>> {
        let patient = self.policy.patient_context(caller).await;
        let scans = self.store.scans.list().await;

        let mut reports: Vec<Report> = Vec::new();
        for report in self.store.reports.list().await {
            let scan = scans.iter().find(|s| s.id == report.scan_id);
            if AccessPolicy::report_visible(caller, patient.as_ref(), &report, scan) {
                reports.push(report);
            }
        }
        reports.sort_by(|a, b| a.generated_at.cmp(&b.generated_at));
        Ok(reports)
    }

    /// 按扫描读取报告
    pub async fn by_scan(&self, caller: &Account, scan_id: &str) -> Result<Report> {
        let report = self
            .store
            .reports
            .find_by_scan(scan_id)
            .await
            .ok_or_else(|| NeuroscanError::NotFound("Report not found".to_string()))?;
        self.authorize(caller, &report).await?;
        Ok(report)
    }

    /// 按ID读取报告
    pub async fn by_id(&self, caller: &Account, id: &str) -> Result<Report> {
        let report = self
            .store
            .reports
            .find_by_id(id)
            .await
            .ok_or_else(|| NeuroscanError::NotFound("Report not found".to_string()))?;
        self.authorize(caller, &report).await?;
        Ok(report)
    }

    /// 下载报告的PDF占位载荷
    ///
    /// 真实PDF渲染接入前返回固定文本字节，访问检查相同。
    pub async fn download(&self, caller: &Account, id: &str) -> Result<(Report, Vec<u8>)> {
        let report = self.by_id(caller, id).await?;
        let payload = format!("Mock PDF for {} ({})", report.report_number, report.id);
        Ok((report, payload.into_bytes()))
    }

    async fn authorize(&self, caller: &Account, report: &Report) -> Result<()> {
        let scan = self.store.scans.find_by_id(&report.scan_id).await;
        self.policy
            .authorize_report(caller, report, scan.as_ref())
            .await
    }
}
