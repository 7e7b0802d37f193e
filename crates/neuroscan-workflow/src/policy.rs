//! 访问控制策略
//!
//! 基于角色与归属关系的统一访问判定。所有扫描/报告的
//! 读取与变更路径都先经过这里：
//! - 患者只能看到归属于本人病历的记录
//! - 非患者角色只能看到自己上传的扫描及其衍生报告
//! - 按ID直读时先确认存在再复核归属，不属于调用者返回Forbidden

use neuroscan_core::{Account, NeuroscanError, Patient, Report, Result, Role, Scan};

use crate::directory::PatientDirectory;

/// 受控操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    UploadScan,
    TriggerAnalysis,
    GenerateReport,
    ViewScan,
    ViewReport,
}

/// 角色能力判定
///
/// 角色与操作的关系集中在一处定义，路由层不再散落角色列表。
pub fn role_allows(role: Role, action: Action) -> bool {
    match action {
        Action::UploadScan | Action::ViewScan | Action::ViewReport => true,
        Action::TriggerAnalysis | Action::GenerateReport => {
            matches!(role, Role::Doctor | Role::Radiologist | Role::Admin)
        }
    }
}

/// 访问策略
#[derive(Clone)]
pub struct AccessPolicy {
    directory: PatientDirectory,
}

impl AccessPolicy {
    pub fn new(directory: PatientDirectory) -> Self {
        Self { directory }
    }

    /// 解析调用者的患者上下文
    ///
    /// 仅患者角色有患者上下文；解析不到时返回None，
    /// 列表路径上表现为空集而不是错误。
    pub async fn patient_context(&self, account: &Account) -> Option<Patient> {
        if account.role != Role::Patient {
            return None;
        }
        self.directory.resolve(account).await
    }

    /// 扫描对调用者是否可见
    pub fn scan_visible(account: &Account, patient: Option<&Patient>, scan: &Scan) -> bool {
        match account.role {
            Role::Patient => patient.map_or(false, |p| scan.patient_id == p.id),
            _ => scan.uploaded_by == account.id,
        }
    }

    /// 报告对调用者是否可见
    ///
    /// 患者按病历归属判定；非患者角色沿报告找到其扫描，
    /// 按扫描上传者判定，扫描缺失时视为不可见。
    pub fn report_visible(
        account: &Account,
        patient: Option<&Patient>,
        report: &Report,
        scan: Option<&Scan>,
    ) -> bool {
        match account.role {
            Role::Patient => patient.map_or(false, |p| report.patient_id == p.id),
            _ => scan.map_or(false, |s| s.uploaded_by == account.id),
        }
    }

    /// 按ID直读扫描时的归属复核
    ///
    /// 调用前资源已确认存在，因此这里只在归属不符时
    /// 返回Forbidden，调用者可以区分"不存在"与"不属于你"。
    pub async fn authorize_scan(&self, account: &Account, scan: &Scan) -> Result<()> {
        let patient = self.patient_context(account).await;
        if Self::scan_visible(account, patient.as_ref(), scan) {
            Ok(())
        } else {
            Err(NeuroscanError::Forbidden("Access denied".to_string()))
        }
    }

    /// 按ID直读报告时的归属复核
    pub async fn authorize_report(
        &self,
        account: &Account,
        report: &Report,
        scan: Option<&Scan>,
    ) -> Result<()> {
        let patient = self.patient_context(account).await;
        if Self::report_visible(account, patient.as_ref(), report, scan) {
            Ok(())
        } else {
            Err(NeuroscanError::Forbidden("Access denied".to_string()))
        }
    }
}
