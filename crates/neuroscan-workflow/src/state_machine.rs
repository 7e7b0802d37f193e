//! 扫描生命周期状态机
//!
//! 管理CT扫描从上传到分析完成的状态转换

use neuroscan_core::{NeuroscanError, Result, ScanStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 扫描状态转换事件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ScanEvent {
    AnalysisStarted,
    AnalysisCompleted,
    AnalysisFailed,
}

/// 扫描状态机
///
/// 状态只能沿 pending → analyzing → {completed|failed} 前进，
/// 不允许跳步或回退。failed为终态，不提供重试转换。
#[derive(Debug)]
pub struct ScanStateMachine {
    transitions: HashMap<(ScanStatus, ScanEvent), ScanStatus>,
}

impl ScanStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        // 定义状态转换规则
        transitions.insert(
            (ScanStatus::Pending, ScanEvent::AnalysisStarted),
            ScanStatus::Analyzing,
        );
        transitions.insert(
            (ScanStatus::Analyzing, ScanEvent::AnalysisCompleted),
            ScanStatus::Completed,
        );
        transitions.insert(
            (ScanStatus::Analyzing, ScanEvent::AnalysisFailed),
            ScanStatus::Failed,
        );

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: &ScanStatus, event: &ScanEvent) -> bool {
        self.transitions.contains_key(&(*from, event.clone()))
    }

    /// 执行状态转换
    pub fn transition(&self, from: &ScanStatus, event: &ScanEvent) -> Result<ScanStatus> {
        match self.transitions.get(&(*from, event.clone())) {
            Some(to) => Ok(*to),
            None => Err(NeuroscanError::InvalidStateTransition {
                from: format!("{:?}", from),
                event: format!("{:?}", event),
            }),
        }
    }

    /// 获取所有可能的状态
    pub fn all_states() -> Vec<ScanStatus> {
        vec![
            ScanStatus::Pending,
            ScanStatus::Analyzing,
            ScanStatus::Completed,
            ScanStatus::Failed,
        ]
    }

    /// 获取某状态下所有可能的事件
    pub fn possible_events(&self, current: &ScanStatus) -> Vec<ScanEvent> {
        self.transitions
            .keys()
            .filter(|(state, _)| state == current)
            .map(|(_, event)| event.clone())
            .collect()
    }
}

impl Default for ScanStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let sm = ScanStateMachine::new();

        assert!(sm.can_transition(&ScanStatus::Pending, &ScanEvent::AnalysisStarted));
        assert!(sm.can_transition(&ScanStatus::Analyzing, &ScanEvent::AnalysisCompleted));
        assert!(sm.can_transition(&ScanStatus::Analyzing, &ScanEvent::AnalysisFailed));
    }

    #[test]
    fn test_invalid_transitions() {
        let sm = ScanStateMachine::new();

        // 不允许跳步
        assert!(!sm.can_transition(&ScanStatus::Pending, &ScanEvent::AnalysisCompleted));
        assert!(!sm.can_transition(&ScanStatus::Pending, &ScanEvent::AnalysisFailed));
        // 终态不可离开
        assert!(!sm.can_transition(&ScanStatus::Completed, &ScanEvent::AnalysisStarted));
        assert!(!sm.can_transition(&ScanStatus::Failed, &ScanEvent::AnalysisStarted));
    }

    #[test]
    fn test_no_backward_transition() {
        let sm = ScanStateMachine::new();

        // 任何事件都不能让状态回退
        for state in [ScanStatus::Completed, ScanStatus::Failed] {
            for event in [
                ScanEvent::AnalysisStarted,
                ScanEvent::AnalysisCompleted,
                ScanEvent::AnalysisFailed,
            ] {
                assert!(!sm.can_transition(&state, &event));
            }
        }
    }

    #[test]
    fn test_state_execution() {
        let sm = ScanStateMachine::new();

        let result = sm.transition(&ScanStatus::Pending, &ScanEvent::AnalysisStarted);
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), ScanStatus::Analyzing);

        let result = sm.transition(&ScanStatus::Pending, &ScanEvent::AnalysisCompleted);
        assert!(result.is_err());
    }

    #[test]
    fn test_possible_events() {
        let sm = ScanStateMachine::new();

        assert_eq!(
            sm.possible_events(&ScanStatus::Pending),
            vec![ScanEvent::AnalysisStarted]
        );
        assert!(sm.possible_events(&ScanStatus::Completed).is_empty());
    }
}
