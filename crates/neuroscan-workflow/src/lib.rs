//! # NeuroScan Workflow
//!
//! 扫描生命周期与访问控制的核心领域逻辑，包括：
//! - 扫描状态机：pending → analyzing → {completed|failed}
//! - 患者目录：账户到病历的两步解析（显式关联、邮箱回退）
//! - 访问策略：角色能力与归属关系的统一判定
//! - 分析引擎：可取消、带截止时间的异步分析任务
//! - 报告生成：每个扫描至多一份的诊断报告

pub mod analysis;
pub mod directory;
pub mod policy;
pub mod registry;
pub mod report;
pub mod state_machine;

// 重新导出主要类型
pub use analysis::{AnalysisAck, AnalysisConfig, AnalysisEngine};
pub use directory::PatientDirectory;
pub use policy::{role_allows, AccessPolicy, Action};
pub use registry::{ScanPage, ScanQuery, ScanRegistry, UploadedFile};
pub use report::ReportGenerator;
pub use state_machine::{ScanEvent, ScanStateMachine};
