//! # NeuroScan Store
//!
//! 存储抽象层：按实体划分的仓储接口、内存实现与演示种子数据。
//! 接口即为更换持久化方案时的边界。

pub mod memory;
pub mod repository;
pub mod seed;

pub use memory::Datastore;
pub use repository::{AccountStore, PatientStore, ReportStore, ResultStore, ScanStore};
pub use seed::seed_demo_data;
