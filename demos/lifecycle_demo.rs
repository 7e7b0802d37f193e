//! 扫描生命周期演示程序
//!
//! 展示从上传、触发分析、轮询结果到生成报告的完整流程，
//! 以及按角色与归属关系的访问控制。

use chrono::{NaiveDate, Utc};
use neuroscan_core::{Account, Gender, Patient, Role, ScanStatus};
use neuroscan_store::Datastore;
use neuroscan_workflow::{
    AccessPolicy, AnalysisConfig, AnalysisEngine, PatientDirectory, ReportGenerator,
    ScanRegistry, UploadedFile,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    println!("🚀 NeuroScan 扫描生命周期演示\n");

    // 1. 组装存储与服务（演示用短延迟）
    let store = Datastore::in_memory();
    let policy = AccessPolicy::new(PatientDirectory::new(store.patients.clone()));
    let registry = ScanRegistry::new(store.clone(), policy.clone());
    let engine = AnalysisEngine::new(
        store.scans.clone(),
        store.results.clone(),
        AnalysisConfig {
            delay_ms: 500,
            ..Default::default()
        },
    );
    let reports = ReportGenerator::new(store.clone(), policy);

    // 2. 准备账户与病历
    let now = Utc::now();
    let patient_record = Patient {
        id: "pat_demo".to_string(),
        patient_code: "P-2025-0001".to_string(),
        first_name: "John".to_string(),
        last_name: "Smith".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1965, 3, 15).unwrap(),
        gender: Gender::Male,
        contact_number: None,
        email: "john.smith@email.com".to_string(),
        created_at: now,
        updated_at: now,
    };
    store.patients.insert(patient_record).await?;

    let patient_account = Account {
        id: "usr_patient".to_string(),
        email: "patient.john@example.com".to_string(),
        password_hash: String::new(),
        first_name: "John".to_string(),
        last_name: "Smith".to_string(),
        role: Role::Patient,
        department: None,
        specialization: None,
        patient_id: Some("pat_demo".to_string()),
        created_at: now,
        last_login: None,
    };
    let doctor_account = Account {
        id: "usr_doctor".to_string(),
        email: "dr.chen@hospital.org".to_string(),
        password_hash: String::new(),
        first_name: "Michael".to_string(),
        last_name: "Chen".to_string(),
        role: Role::Doctor,
        department: Some("Neurology".to_string()),
        specialization: Some("Stroke Medicine".to_string()),
        patient_id: None,
        created_at: now,
        last_login: None,
    };
    println!("✅ 账户与病历已就绪");

    // 3. 患者上传三张切片
    let files: Vec<UploadedFile> = (0..3)
        .map(|i| UploadedFile {
            file_name: format!("slice_{:03}.dcm", i),
            size: 1_048_576,
        })
        .collect();
    let scan = registry.upload(&patient_account, None, &files).await?;
    println!(
        "📤 扫描 {} 已上传 ({} 张切片, {} 字节, 状态 {})",
        scan.id,
        scan.slice_count,
        scan.file_size,
        scan.status.as_str()
    );

    // 4. 触发分析并轮询结果
    let ack = engine.analyze(&scan.id).await?;
    println!("🔬 {} (状态 {})", ack.message, ack.status.as_str());

    let result = loop {
        match engine.result(&scan.id).await {
            Ok(result) => break result,
            Err(_) => {
                println!("   ⏳ 结果尚未产出，继续轮询...");
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            }
        }
    };
    println!(
        "🧠 分析完成: {} (置信度 {:.1}%, 模型 {} v{})",
        result.prediction.as_str(),
        result.confidence,
        result.model_name,
        result.model_version
    );

    // 结果先于状态翻转落库，这里等扫描转为completed
    let scan = loop {
        let scan = registry.get(&patient_account, &scan.id).await?;
        if scan.status == ScanStatus::Completed {
            break scan;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    };
    println!("📦 扫描状态: {}", scan.status.as_str());

    // 5. 医生生成报告
    let report = reports
        .generate(&doctor_account, Some(scan.id.as_str()), Some(result.id.as_str()))
        .await?;
    println!(
        "📄 报告 {} 已生成 (状态 {:?})",
        report.report_number, report.status
    );
    println!("   所见: {}", report.findings);
    println!("   印象: {}", report.impression);
    println!("   建议: {}", report.recommendations);

    // 6. 同一扫描的第二份报告被拒绝
    match reports
        .generate(&doctor_account, Some(scan.id.as_str()), Some(result.id.as_str()))
        .await
    {
        Err(e) => println!("🚫 重复生成被拒绝: {}", e),
        Ok(_) => unreachable!("duplicate report must be rejected"),
    }

    // 7. 患者本人可读报告，无关医生不可读
    let own = reports.by_scan(&patient_account, &scan.id).await?;
    println!("👤 患者可读本人报告 {}", own.report_number);

    let stranger = Account {
        id: "usr_other".to_string(),
        email: "dr.other@hospital.org".to_string(),
        ..doctor_account
    };
    match reports.by_id(&stranger, &report.id).await {
        Err(e) => println!("🔒 无关医生被拒绝: {}", e),
        Ok(_) => unreachable!("foreign report access must be rejected"),
    }

    println!("\n🎉 演示完成");
    Ok(())
}
