//! 核心数据模型定义
//!
//! 对外接口沿用camelCase字段命名，与既有前端保持兼容。

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NeuroscanError;

/// 账户角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 临床医生 - 上传、触发分析、生成报告
    Doctor,
    /// 放射科医生 - 与临床医生同级权限
    Radiologist,
    /// 管理员 - 仅通过种子数据创建，不开放注册
    Admin,
    /// 患者 - 仅能查看本人的扫描与报告
    Patient,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Doctor => "doctor",
            Role::Radiologist => "radiologist",
            Role::Admin => "admin",
            Role::Patient => "patient",
        }
    }

    /// 是否允许自助注册
    pub fn self_registrable(&self) -> bool {
        !matches!(self, Role::Admin)
    }
}

impl std::str::FromStr for Role {
    type Err = NeuroscanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "doctor" => Ok(Role::Doctor),
            "radiologist" => Ok(Role::Radiologist),
            "admin" => Ok(Role::Admin),
            "patient" => Ok(Role::Patient),
            _ => Err(NeuroscanError::Validation(format!(
                "Unknown role: {}",
                value
            ))),
        }
    }
}

/// 账户信息（认证主体，与患者病历记录相互独立）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub email: String,
    /// argon2哈希，永不出现在响应中
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    /// 患者角色关联的病历记录ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

/// 性别枚举
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// 患者病历记录
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    /// 院内可读编号，形如 P-2025-0001
    #[serde(rename = "patientId")]
    pub patient_code: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 扫描生命周期状态
///
/// 唯一合法的创建状态是Pending，合法转换由
/// 工作流层的状态机表定义，任何路径都不得回退。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// 已上传，等待分析
    Pending,
    /// 分析任务进行中
    Analyzing,
    /// 分析完成，结果可查
    Completed,
    /// 分析失败（取消或超时）
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Analyzing => "analyzing",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for ScanStatus {
    type Err = NeuroscanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(ScanStatus::Pending),
            "analyzing" => Ok(ScanStatus::Analyzing),
            "completed" => Ok(ScanStatus::Completed),
            "failed" => Ok(ScanStatus::Failed),
            _ => Err(NeuroscanError::Validation(format!(
                "Unknown scan status: {}",
                value
            ))),
        }
    }
}

/// 扫描的影像元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanMetadata {
    pub modality: String,
    pub body_part: String,
    pub resolution: String,
    pub slice_thickness: String,
}

impl Default for ScanMetadata {
    fn default() -> Self {
        Self {
            modality: "CT".to_string(),
            body_part: "HEAD".to_string(),
            resolution: "512x512".to_string(),
            slice_thickness: "5mm".to_string(),
        }
    }
}

/// 一次上传的影像检查
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scan {
    pub id: String,
    /// 归属的患者病历记录
    pub patient_id: String,
    /// 上传者账户
    pub uploaded_by: String,
    pub status: ScanStatus,
    pub image_urls: Vec<String>,
    pub thumbnail_url: String,
    pub slice_count: i32,
    /// 所有文件的字节数之和
    pub file_size: i64,
    pub format: String,
    pub scan_date: DateTime<Utc>,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzed_at: Option<DateTime<Utc>>,
    pub metadata: ScanMetadata,
}

/// 分析预测结论
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Prediction {
    Stroke,
    Normal,
}

impl Prediction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Prediction::Stroke => "stroke",
            Prediction::Normal => "normal",
        }
    }
}

/// 一次扫描的分析结果
///
/// 正常流程下每个扫描至多一条，由分析引擎保证。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub id: String,
    pub scan_id: String,
    pub prediction: Prediction,
    /// 置信度百分比，保留一位小数，取值于 [85.0, 97.0)
    pub confidence: f64,
    pub model_name: String,
    pub model_version: String,
    #[serde(rename = "processingTime")]
    pub processing_time_ms: i64,
    pub heatmap_url: String,
    pub overlay_url: String,
    pub analyzed_at: DateTime<Utc>,
}

/// 报告状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Draft,
    Finalized,
    Amended,
}

/// 诊断报告
///
/// 每个扫描至多一份，由存储层的唯一性插入保证。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub scan_id: String,
    pub result_id: String,
    pub patient_id: String,
    /// 年度流水编号，形如 RPT-2025-0001
    pub report_number: String,
    pub generated_at: DateTime<Utc>,
    /// 生成者账户
    pub generated_by: String,
    pub findings: String,
    pub impression: String,
    pub recommendations: String,
    pub status: ReportStatus,
    pub pdf_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_role_roundtrip() {
        for role in [Role::Doctor, Role::Radiologist, Role::Admin, Role::Patient] {
            assert_eq!(Role::from_str(role.as_str()).unwrap(), role);
        }
        assert!(Role::from_str("nurse").is_err());
    }

    #[test]
    fn test_admin_not_self_registrable() {
        assert!(!Role::Admin.self_registrable());
        assert!(Role::Patient.self_registrable());
    }

    #[test]
    fn test_scan_status_serialization() {
        // 对外序列化为小写字符串
        let json = serde_json::to_string(&ScanStatus::Analyzing).unwrap();
        assert_eq!(json, "\"analyzing\"");
        assert_eq!(ScanStatus::from_str("failed").unwrap(), ScanStatus::Failed);
    }

    #[test]
    fn test_account_never_serializes_password() {
        let account = Account {
            id: "usr_test".to_string(),
            email: "doc@hospital.org".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            first_name: "Sarah".to_string(),
            last_name: "Johnson".to_string(),
            role: Role::Radiologist,
            department: Some("Radiology".to_string()),
            specialization: None,
            patient_id: None,
            created_at: chrono::Utc::now(),
            last_login: None,
        };

        let json = serde_json::to_string(&account).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
        assert!(json.contains("\"firstName\":\"Sarah\""));
    }
}
