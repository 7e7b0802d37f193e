//! 扫描登记
//!
//! 扫描记录的创建与查询入口。上传规则：
//! - 患者只能为本人上传，客户端提交的目标患者一律忽略
//! - 医生角色必须显式指定目标患者
//! - 至少一个文件

use chrono::Utc;
use neuroscan_core::{
    utils::short_id, Account, NeuroscanError, Result, Role, Scan, ScanMetadata, ScanStatus,
};
use neuroscan_store::Datastore;
use tracing::info;

use crate::policy::AccessPolicy;

/// 上传文件的元数据（内容在演示实现中即弃）
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub size: u64,
}

/// 扫描列表查询条件
#[derive(Debug, Clone, Default)]
pub struct ScanQuery {
    pub status: Option<ScanStatus>,
    pub patient_id: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// 分页结果
#[derive(Debug, Clone)]
pub struct ScanPage {
    pub data: Vec<Scan>,
    pub total: usize,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

/// 扫描登记服务
#[derive(Clone)]
pub struct ScanRegistry {
    store: Datastore,
    policy: AccessPolicy,
}

impl ScanRegistry {
    pub fn new(store: Datastore, policy: AccessPolicy) -> Self {
        Self { store, policy }
    }

    /// 登记一次上传，扫描以pending状态入库
    pub async fn upload(
        &self,
        caller: &Account,
        requested_patient_id: Option<&str>,
        files: &[UploadedFile],
    ) -> Result<Scan> {
        if files.is_empty() {
            return Err(NeuroscanError::Validation(
                "At least one file is required".to_string(),
            ));
        }

        let patient_id = if caller.role == Role::Patient {
            // 患者永远为本人上传
            let patient = self.policy.patient_context(caller).await.ok_or_else(|| {
                NeuroscanError::Validation(
                    "Patient profile not found for this account".to_string(),
                )
            })?;
            patient.id
        } else {
            let requested = requested_patient_id.ok_or_else(|| {
                NeuroscanError::Validation("Patient ID is required".to_string())
            })?;
            self.store
                .patients
                .find_by_id(requested)
                .await
                .ok_or_else(|| NeuroscanError::NotFound("Patient not found".to_string()))?
                .id
        };

        let now = Utc::now();
        let scan = Scan {
            id: short_id("scan"),
            patient_id,
            uploaded_by: caller.id.clone(),
            status: ScanStatus::Pending,
            image_urls: files.iter().map(|_| "/placeholder.svg".to_string()).collect(),
            thumbnail_url: "/placeholder.svg".to_string(),
            slice_count: files.len() as i32,
            file_size: files.iter().map(|f| f.size as i64).sum(),
            format: "DICOM".to_string(),
            scan_date: now,
            uploaded_at: now,
            analyzed_at: None,
            metadata: ScanMetadata::default(),
        };

        let scan = self.store.scans.insert(scan).await?;
        info!(
            "Scan {} uploaded for patient {} by {} ({} slices)",
            scan.id, scan.patient_id, caller.id, scan.slice_count
        );
        Ok(scan)
    }

    /// 角色过滤后的分页列表
    pub async fn list(&self, caller: &Account, query: &ScanQuery) -> Result<ScanPage> {
        let patient = self.policy.patient_context(caller).await;

        let mut scans: Vec<Scan> = self
            .store
            .scans
            .list()
            .await
            .into_iter()
            .filter(|s| AccessPolicy::scan_visible(caller, patient.as_ref(), s))
            .collect();

        if let Some(status) = query.status {
            scans.retain(|s| s.status == status);
        }
        if let Some(patient_id) = &query.patient_id {
            scans.retain(|s| &s.patient_id == patient_id);
        }

        // 按上传时间排序，保证分页稳定
        scans.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at));

        let total = scans.len();
        let page = query.page.unwrap_or(1).max(1);
        let page_size = query.page_size.unwrap_or(10).max(1);
        let start = ((page - 1) * page_size) as usize;
        let data: Vec<Scan> = scans
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .collect();

        Ok(ScanPage {
            data,
            total,
            page,
            page_size,
            total_pages: (total as u32 + page_size - 1) / page_size,
        })
    }

    /// 按ID读取，先确认存在再复核归属
    pub async fn get(&self, caller: &Account, id: &str) -> Result<Scan> {
        let scan = self
            .store
            .scans
            .find_by_id(id)
            .await
            .ok_or_else(|| NeuroscanError::NotFound("Scan not found".to_string()))?;
        self.policy.authorize_scan(caller, &scan).await?;
        Ok(scan)
    }
}
