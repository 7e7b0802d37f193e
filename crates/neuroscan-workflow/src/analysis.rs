//! 分析引擎
//!
//! 模拟AI推理的异步分析。analyze触发后立即返回确认，
//! 结果在配置的延迟后写入，由result轮询获取。
//! 接入真实模型时只需替换任务体，两步契约保持不变。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use neuroscan_core::{
    utils::short_id, AnalysisResult, NeuroscanError, Prediction, Result, ScanStatus,
};
use neuroscan_store::{ResultStore, ScanStore};
use rand::Rng;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::state_machine::{ScanEvent, ScanStateMachine};

/// 分析引擎配置
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// 模拟推理的延迟
    pub delay_ms: u64,
    /// 任务截止时间，超过后扫描转为failed
    pub deadline_ms: u64,
    pub model_name: String,
    pub model_version: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            delay_ms: 2000,
            deadline_ms: 10_000,
            model_name: "CNN-GA-BiLSTM Hybrid Model".to_string(),
            model_version: "2.1.0".to_string(),
        }
    }
}

/// analyze的即时确认
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisAck {
    pub message: String,
    pub scan_id: String,
    pub status: ScanStatus,
}

/// 分析引擎
///
/// 对外是两个操作：analyze触发异步生产，result轮询读取。
#[derive(Clone)]
pub struct AnalysisEngine {
    scans: Arc<dyn ScanStore>,
    results: Arc<dyn ResultStore>,
    state_machine: Arc<ScanStateMachine>,
    /// 在途任务的取消句柄，按扫描ID索引
    jobs: Arc<RwLock<HashMap<String, CancellationToken>>>,
    config: AnalysisConfig,
}

impl AnalysisEngine {
    pub fn new(
        scans: Arc<dyn ScanStore>,
        results: Arc<dyn ResultStore>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            scans,
            results,
            state_machine: Arc::new(ScanStateMachine::new()),
            jobs: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// 触发分析，不阻塞调用方
    ///
    /// 幂等：已有结果或任务在途时仅返回确认，不重复触发，
    /// 一个扫描至多记录一条终态结果。
    pub async fn analyze(&self, scan_id: &str) -> Result<AnalysisAck> {
        let scan = self
            .scans
            .find_by_id(scan_id)
            .await
            .ok_or_else(|| NeuroscanError::NotFound("Scan not found".to_string()))?;

        if self.results.find_by_scan(scan_id).await.is_some() {
            return Ok(AnalysisAck {
                message: "Analysis already completed".to_string(),
                scan_id: scan_id.to_string(),
                status: scan.status,
            });
        }
        if scan.status == ScanStatus::Analyzing {
            return Ok(AnalysisAck {
                message: "Analysis already in progress".to_string(),
                scan_id: scan_id.to_string(),
                status: ScanStatus::Analyzing,
            });
        }

        // pending → analyzing，非法状态在这里被拒绝
        let next = self
            .state_machine
            .transition(&scan.status, &ScanEvent::AnalysisStarted)?;

        let mut scan = scan;
        scan.status = next;
        scan.analyzed_at = Some(Utc::now());
        self.scans.update(scan).await?;

        let cancel = CancellationToken::new();
        self.jobs
            .write()
            .await
            .insert(scan_id.to_string(), cancel.clone());

        let engine = self.clone();
        let scan_id_owned = scan_id.to_string();
        tokio::spawn(async move {
            engine.run_job(scan_id_owned, cancel).await;
        });

        info!("Analysis started for scan {}", scan_id);
        Ok(AnalysisAck {
            message: "Analysis started".to_string(),
            scan_id: scan_id.to_string(),
            status: ScanStatus::Analyzing,
        })
    }

    /// 取消在途的分析任务
    ///
    /// 返回是否有任务被取消；被取消的扫描转为failed。
    pub async fn cancel(&self, scan_id: &str) -> bool {
        match self.jobs.read().await.get(scan_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// 读取分析结果
    ///
    /// 结果尚未产出与扫描不存在是两种不同的NotFound，
    /// 这里只回答前者。
    pub async fn result(&self, scan_id: &str) -> Result<AnalysisResult> {
        self.results
            .find_by_scan(scan_id)
            .await
            .ok_or_else(|| NeuroscanError::NotFound("Analysis result not found".to_string()))
    }

    /// 后台任务体：延迟 → 产出结果 → completed；
    /// 取消或超过截止时间 → failed
    async fn run_job(self, scan_id: String, cancel: CancellationToken) {
        let work = tokio::time::timeout(
            Duration::from_millis(self.config.deadline_ms),
            tokio::time::sleep(Duration::from_millis(self.config.delay_ms)),
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                warn!("Analysis canceled for scan {}", scan_id);
                self.fail_scan(&scan_id).await;
            }
            outcome = work => match outcome {
                Ok(()) => self.complete_scan(&scan_id).await,
                Err(_) => {
                    warn!("Analysis deadline exceeded for scan {}", scan_id);
                    self.fail_scan(&scan_id).await;
                }
            },
        }

        self.jobs.write().await.remove(&scan_id);
    }

    /// 写入结果并将扫描转为completed
    async fn complete_scan(&self, scan_id: &str) {
        let Some(mut scan) = self.scans.find_by_id(scan_id).await else {
            error!("Scan {} disappeared during analysis", scan_id);
            return;
        };

        let next = match self
            .state_machine
            .transition(&scan.status, &ScanEvent::AnalysisCompleted)
        {
            Ok(next) => next,
            Err(e) => {
                warn!("Cannot complete analysis for scan {}: {}", scan_id, e);
                return;
            }
        };

        let result = self.synthesize_result(scan_id);
        let confidence = result.confidence;
        let prediction = result.prediction;

        // 先落结果再翻状态，completed状态总是伴随可查的结果；
        // 存储层按扫描唯一，重复任务在这里收敛
        if let Err(e) = self.results.insert(result).await {
            warn!("Analysis result for scan {} not recorded: {}", scan_id, e);
            return;
        }
        scan.status = next;
        if let Err(e) = self.scans.update(scan).await {
            error!("Failed to update scan {} after analysis: {}", scan_id, e);
            return;
        }

        info!(
            "Analysis completed for scan {}: {} ({:.1}%)",
            scan_id,
            prediction.as_str(),
            confidence
        );
    }

    /// 将扫描转为failed（取消或超时）
    async fn fail_scan(&self, scan_id: &str) {
        let Some(mut scan) = self.scans.find_by_id(scan_id).await else {
            return;
        };
        match self
            .state_machine
            .transition(&scan.status, &ScanEvent::AnalysisFailed)
        {
            Ok(next) => {
                scan.status = next;
                if let Err(e) = self.scans.update(scan).await {
                    error!("Failed to mark scan {} as failed: {}", scan_id, e);
                }
            }
            Err(e) => warn!("Cannot fail scan {}: {}", scan_id, e),
        }
    }

    /// 生成模拟结果
    ///
    /// P(stroke) ≈ 0.3；置信度取一位小数，落在 [85.0, 97.0)；
    /// 抖动只作用于processing_time字段，不影响延迟。
    fn synthesize_result(&self, scan_id: &str) -> AnalysisResult {
        let mut rng = rand::thread_rng();
        let prediction = if rng.gen::<f64>() > 0.7 {
            Prediction::Stroke
        } else {
            Prediction::Normal
        };
        let confidence = rng.gen_range(850..970) as f64 / 10.0;
        let processing_time_ms = 2340 + rng.gen_range(0..500);

        AnalysisResult {
            id: short_id("result"),
            scan_id: scan_id.to_string(),
            prediction,
            confidence,
            model_name: self.config.model_name.clone(),
            model_version: self.config.model_version.clone(),
            processing_time_ms,
            heatmap_url: "/placeholder.svg".to_string(),
            overlay_url: "/placeholder.svg".to_string(),
            analyzed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neuroscan_core::{Scan, ScanMetadata};
    use neuroscan_store::Datastore;

    fn fast_config() -> AnalysisConfig {
        AnalysisConfig {
            delay_ms: 10,
            deadline_ms: 1000,
            ..Default::default()
        }
    }

    async fn insert_pending_scan(store: &Datastore, id: &str) {
        let now = Utc::now();
        store
            .scans
            .insert(Scan {
                id: id.to_string(),
                patient_id: "pat_001".to_string(),
                uploaded_by: "usr_doc".to_string(),
                status: ScanStatus::Pending,
                image_urls: vec!["/placeholder.svg".to_string()],
                thumbnail_url: "/placeholder.svg".to_string(),
                slice_count: 3,
                file_size: 3072,
                format: "DICOM".to_string(),
                scan_date: now,
                uploaded_at: now,
                analyzed_at: None,
                metadata: ScanMetadata::default(),
            })
            .await
            .unwrap();
    }

    async fn wait_for_status(store: &Datastore, id: &str, status: ScanStatus) {
        for _ in 0..100 {
            if store.scans.find_by_id(id).await.unwrap().status == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("scan {} never reached {:?}", id, status);
    }

    #[tokio::test]
    async fn test_analyze_unknown_scan() {
        let store = Datastore::in_memory();
        let engine = AnalysisEngine::new(store.scans.clone(), store.results.clone(), fast_config());

        let err = engine.analyze("scan_404").await;
        assert!(matches!(err, Err(NeuroscanError::NotFound(_))));
        assert!(store.scans.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let store = Datastore::in_memory();
        let engine = AnalysisEngine::new(store.scans.clone(), store.results.clone(), fast_config());
        insert_pending_scan(&store, "scan_1").await;

        let ack = engine.analyze("scan_1").await.unwrap();
        assert_eq!(ack.status, ScanStatus::Analyzing);

        // 确认先于结果产出返回
        let scan = store.scans.find_by_id("scan_1").await.unwrap();
        assert_eq!(scan.status, ScanStatus::Analyzing);
        assert!(scan.analyzed_at.is_some());

        wait_for_status(&store, "scan_1", ScanStatus::Completed).await;

        let result = engine.result("scan_1").await.unwrap();
        assert!(matches!(
            result.prediction,
            Prediction::Stroke | Prediction::Normal
        ));
        assert!(result.confidence >= 85.0 && result.confidence < 97.0);
        assert_eq!(store.results.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_result_before_completion() {
        let store = Datastore::in_memory();
        let engine = AnalysisEngine::new(
            store.scans.clone(),
            store.results.clone(),
            AnalysisConfig {
                delay_ms: 60_000,
                deadline_ms: 120_000,
                ..Default::default()
            },
        );
        insert_pending_scan(&store, "scan_1").await;

        engine.analyze("scan_1").await.unwrap();
        // 结果尚未产出
        assert!(matches!(
            engine.result("scan_1").await,
            Err(NeuroscanError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_repeat_analyze_is_idempotent() {
        let store = Datastore::in_memory();
        let engine = AnalysisEngine::new(store.scans.clone(), store.results.clone(), fast_config());
        insert_pending_scan(&store, "scan_1").await;

        engine.analyze("scan_1").await.unwrap();
        // 在途期间重复触发只得到确认
        let ack = engine.analyze("scan_1").await.unwrap();
        assert_eq!(ack.status, ScanStatus::Analyzing);

        wait_for_status(&store, "scan_1", ScanStatus::Completed).await;

        // 完成后再触发同样是确认，不会产生第二条结果
        engine.analyze("scan_1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.results.list().await.len(), 1);
        assert_eq!(
            store.scans.find_by_id("scan_1").await.unwrap().status,
            ScanStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_cancel_marks_failed() {
        let store = Datastore::in_memory();
        let engine = AnalysisEngine::new(
            store.scans.clone(),
            store.results.clone(),
            AnalysisConfig {
                delay_ms: 60_000,
                deadline_ms: 120_000,
                ..Default::default()
            },
        );
        insert_pending_scan(&store, "scan_1").await;

        engine.analyze("scan_1").await.unwrap();
        assert!(engine.cancel("scan_1").await);

        wait_for_status(&store, "scan_1", ScanStatus::Failed).await;
        assert!(store.results.find_by_scan("scan_1").await.is_none());

        // 没有在途任务时取消是空操作
        assert!(!engine.cancel("scan_1").await);
    }

    #[tokio::test]
    async fn test_deadline_marks_failed() {
        let store = Datastore::in_memory();
        let engine = AnalysisEngine::new(
            store.scans.clone(),
            store.results.clone(),
            AnalysisConfig {
                delay_ms: 60_000,
                deadline_ms: 20,
                ..Default::default()
            },
        );
        insert_pending_scan(&store, "scan_1").await;

        engine.analyze("scan_1").await.unwrap();
        wait_for_status(&store, "scan_1", ScanStatus::Failed).await;
        assert!(store.results.find_by_scan("scan_1").await.is_none());
    }

    #[tokio::test]
    async fn test_confidence_bounds() {
        let store = Datastore::in_memory();
        let engine = AnalysisEngine::new(store.scans.clone(), store.results.clone(), fast_config());

        // 多次采样验证置信度边界
        for _ in 0..200 {
            let result = engine.synthesize_result("scan_x");
            assert!(result.confidence >= 85.0);
            assert!(result.confidence < 97.0);
            // 一位小数
            let scaled = result.confidence * 10.0;
            assert!((scaled - scaled.round()).abs() < 1e-9);
            assert!(result.processing_time_ms >= 2340 && result.processing_time_ms < 2840);
        }
    }
}
