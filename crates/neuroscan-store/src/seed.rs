//! 开发环境种子数据
//!
//! 与前端联调用的演示账户、患者与扫描记录。
//! 所有演示账户的密码均为 password123。

use chrono::{NaiveDate, TimeZone, Utc};
use neuroscan_core::{
    Account, AnalysisResult, Gender, Patient, Prediction, Report, ReportStatus, Result, Role,
    Scan, ScanMetadata, ScanStatus,
};
use tracing::info;

use crate::memory::Datastore;

/// 写入演示数据
///
/// `hash` 由调用方注入（认证层的密码哈希函数），
/// 存储层自身不依赖任何密码学实现。
pub async fn seed_demo_data<F>(store: &Datastore, hash: F) -> Result<()>
where
    F: Fn(&str) -> Result<String>,
{
    let demo_hash = hash("password123")?;

    let accounts = vec![
        Account {
            id: "usr_001".to_string(),
            email: "dr.sarah.johnson@hospital.org".to_string(),
            password_hash: demo_hash.clone(),
            first_name: "Sarah".to_string(),
            last_name: "Johnson".to_string(),
            role: Role::Radiologist,
            department: Some("Radiology".to_string()),
            specialization: Some("Neuroradiology".to_string()),
            patient_id: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap(),
            last_login: None,
        },
        Account {
            id: "usr_002".to_string(),
            email: "dr.michael.chen@hospital.org".to_string(),
            password_hash: demo_hash.clone(),
            first_name: "Michael".to_string(),
            last_name: "Chen".to_string(),
            role: Role::Doctor,
            department: Some("Neurology".to_string()),
            specialization: Some("Stroke Medicine".to_string()),
            patient_id: None,
            created_at: Utc.with_ymd_and_hms(2024, 2, 20, 10, 0, 0).unwrap(),
            last_login: None,
        },
        // 患者账户通过显式关联解析到 pat_001，
        // 账户邮箱与病历邮箱不同，覆盖不到邮箱回退分支
        Account {
            id: "usr_003".to_string(),
            email: "patient.john@example.com".to_string(),
            password_hash: demo_hash,
            first_name: "John".to_string(),
            last_name: "Smith".to_string(),
            role: Role::Patient,
            department: None,
            specialization: None,
            patient_id: Some("pat_001".to_string()),
            created_at: Utc.with_ymd_and_hms(2025, 1, 10, 8, 0, 0).unwrap(),
            last_login: None,
        },
    ];

    let patients = vec![
        Patient {
            id: "pat_001".to_string(),
            patient_code: "P-2025-0001".to_string(),
            first_name: "John".to_string(),
            last_name: "Smith".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1965, 3, 15).unwrap(),
            gender: Gender::Male,
            contact_number: Some("+1-555-0101".to_string()),
            email: "john.smith@email.com".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 1, 10, 8, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2025, 1, 10, 8, 0, 0).unwrap(),
        },
        Patient {
            id: "pat_002".to_string(),
            patient_code: "P-2025-0002".to_string(),
            first_name: "Emily".to_string(),
            last_name: "Davis".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1978, 7, 22).unwrap(),
            gender: Gender::Female,
            contact_number: Some("+1-555-0102".to_string()),
            email: "emily.davis@email.com".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 1, 12, 10, 30, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2025, 1, 12, 10, 30, 0).unwrap(),
        },
    ];

    let scans = vec![
        Scan {
            id: "scan_001".to_string(),
            patient_id: "pat_001".to_string(),
            uploaded_by: "usr_002".to_string(),
            status: ScanStatus::Completed,
            image_urls: vec!["/placeholder.svg".to_string()],
            thumbnail_url: "/placeholder.svg".to_string(),
            slice_count: 24,
            file_size: 5_242_880,
            format: "DICOM".to_string(),
            scan_date: Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap(),
            uploaded_at: Utc.with_ymd_and_hms(2025, 1, 15, 10, 5, 0).unwrap(),
            analyzed_at: Some(Utc.with_ymd_and_hms(2025, 1, 15, 10, 7, 0).unwrap()),
            metadata: ScanMetadata::default(),
        },
        Scan {
            id: "scan_002".to_string(),
            patient_id: "pat_002".to_string(),
            uploaded_by: "usr_001".to_string(),
            status: ScanStatus::Pending,
            image_urls: vec!["/placeholder.svg".to_string()],
            thumbnail_url: "/placeholder.svg".to_string(),
            slice_count: 30,
            file_size: 6_291_456,
            format: "DICOM".to_string(),
            scan_date: Utc.with_ymd_and_hms(2025, 1, 18, 14, 0, 0).unwrap(),
            uploaded_at: Utc.with_ymd_and_hms(2025, 1, 18, 14, 5, 0).unwrap(),
            analyzed_at: None,
            metadata: ScanMetadata::default(),
        },
    ];

    let result = AnalysisResult {
        id: "result_001".to_string(),
        scan_id: "scan_001".to_string(),
        prediction: Prediction::Stroke,
        confidence: 92.5,
        model_name: "CNN-GA-BiLSTM Hybrid Model".to_string(),
        model_version: "2.1.0".to_string(),
        processing_time_ms: 2340,
        heatmap_url: "/placeholder.svg".to_string(),
        overlay_url: "/placeholder.svg".to_string(),
        analyzed_at: Utc.with_ymd_and_hms(2025, 1, 15, 10, 7, 0).unwrap(),
    };

    let report = Report {
        id: "report_001".to_string(),
        scan_id: "scan_001".to_string(),
        result_id: "result_001".to_string(),
        patient_id: "pat_001".to_string(),
        report_number: "RPT-2025-0001".to_string(),
        generated_at: Utc.with_ymd_and_hms(2025, 1, 15, 10, 10, 0).unwrap(),
        generated_by: "usr_001".to_string(),
        findings: "AI-assisted analysis detected abnormalities consistent with acute ischemic stroke."
            .to_string(),
        impression: "ACUTE ISCHEMIC STROKE detected with high confidence.".to_string(),
        recommendations: "Immediate neurology consultation recommended.".to_string(),
        status: ReportStatus::Finalized,
        pdf_url: "/reports/report_001.pdf".to_string(),
    };

    for patient in patients {
        store.patients.insert(patient).await?;
    }
    for account in accounts {
        store.accounts.insert(account).await?;
    }
    for scan in scans {
        store.scans.insert(scan).await?;
    }
    store.results.insert(result).await?;
    store.reports.insert_unique(report).await?;

    info!("Seeded demo accounts, patients and scans");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_demo_data() {
        let store = Datastore::in_memory();
        seed_demo_data(&store, |pw| Ok(format!("hashed:{}", pw)))
            .await
            .unwrap();

        let john = store
            .accounts
            .find_by_email("patient.john@example.com")
            .await
            .unwrap();
        assert_eq!(john.patient_id.as_deref(), Some("pat_001"));
        assert_eq!(store.patients.count().await, 2);
        assert!(store.results.find_by_scan("scan_001").await.is_some());
        assert!(store.reports.find_by_scan("scan_001").await.is_some());

        // 重复播种会因邮箱冲突而失败
        assert!(seed_demo_data(&store, |pw| Ok(pw.to_string())).await.is_err());
    }
}
