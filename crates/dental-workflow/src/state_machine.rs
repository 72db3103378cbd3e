//! 状态机
//!
//! 管理患者、治疗、照片和AI分析的状态转换

use dental_core::{
    AnalysisStatus, DentalError, PatientStatus, PhotoStatus, Result, TreatmentStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// 患者状态事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PatientEvent {
    Activate,
    Deactivate,
    Archive,
}

/// 治疗状态事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TreatmentEvent {
    Start,
    Complete,
    Hold,
    Resume,
    Cancel,
}

/// 照片状态事件，由分析流程驱动
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PhotoEvent {
    BeginAnalysis,
    FinishAnalysis,
    FailAnalysis,
    /// 正在进行的分析全部取消
    Reset,
    Archive,
}

/// 分析状态事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AnalysisEvent {
    Start,
    Complete,
    Fail,
    Cancel,
    Retry,
}

/// 通用状态机：`(当前状态, 事件) -> 目标状态`
#[derive(Debug)]
pub struct StateMachine<S, E> {
    entity: &'static str,
    transitions: HashMap<(S, E), S>,
}

impl<S, E> StateMachine<S, E>
where
    S: Copy + Eq + Hash + Debug,
    E: Copy + Eq + Hash + Debug,
{
    fn from_rules(entity: &'static str, rules: &[(S, E, S)]) -> Self {
        let transitions = rules
            .iter()
            .map(|&(from, event, to)| ((from, event), to))
            .collect();
        Self {
            entity,
            transitions,
        }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: S, event: E) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 执行状态转换
    pub fn transition(&self, from: S, event: E) -> Result<S> {
        self.transitions
            .get(&(from, event))
            .copied()
            .ok_or_else(|| DentalError::InvalidStateTransition {
                entity: self.entity,
                from: format!("{:?}", from),
                event: format!("{:?}", event),
            })
    }

    /// 获取状态的所有可能事件
    pub fn possible_events(&self, current: S) -> Vec<E> {
        self.transitions
            .keys()
            .filter(|(state, _)| *state == current)
            .map(|(_, event)| *event)
            .collect()
    }

    /// 没有出边的状态
    pub fn is_terminal(&self, state: S) -> bool {
        !self.transitions.keys().any(|(from, _)| *from == state)
    }
}

pub type PatientStateMachine = StateMachine<PatientStatus, PatientEvent>;
pub type TreatmentStateMachine = StateMachine<TreatmentStatus, TreatmentEvent>;
pub type PhotoStateMachine = StateMachine<PhotoStatus, PhotoEvent>;
pub type AnalysisStateMachine = StateMachine<AnalysisStatus, AnalysisEvent>;

impl StateMachine<PatientStatus, PatientEvent> {
    pub fn new() -> Self {
        use PatientEvent::*;
        use PatientStatus::*;
        Self::from_rules(
            "patient",
            &[
                (Active, Deactivate, Inactive),
                (Inactive, Activate, Active),
                (Active, Archive, Archived),
                (Inactive, Archive, Archived),
            ],
        )
    }
}

impl StateMachine<TreatmentStatus, TreatmentEvent> {
    pub fn new() -> Self {
        use TreatmentEvent::*;
        use TreatmentStatus::*;
        Self::from_rules(
            "treatment",
            &[
                (Planned, Start, InProgress),
                (InProgress, Complete, Completed),
                (Planned, Hold, OnHold),
                (InProgress, Hold, OnHold),
                (OnHold, Resume, InProgress),
                (Planned, Cancel, Cancelled),
                (InProgress, Cancel, Cancelled),
                (OnHold, Cancel, Cancelled),
            ],
        )
    }
}

impl StateMachine<PhotoStatus, PhotoEvent> {
    pub fn new() -> Self {
        use PhotoEvent::*;
        use PhotoStatus::*;
        Self::from_rules(
            "photo",
            &[
                (Uploaded, BeginAnalysis, Processing),
                (Analyzed, BeginAnalysis, Processing),
                (Failed, BeginAnalysis, Processing),
                (Processing, FinishAnalysis, Analyzed),
                (Processing, FailAnalysis, Failed),
                (Processing, Reset, Uploaded),
                (Uploaded, Archive, Archived),
                (Analyzed, Archive, Archived),
                (Failed, Archive, Archived),
            ],
        )
    }
}

impl StateMachine<AnalysisStatus, AnalysisEvent> {
    pub fn new() -> Self {
        use AnalysisEvent::*;
        use AnalysisStatus::*;
        Self::from_rules(
            "analysis",
            &[
                (Pending, Start, Processing),
                (Processing, Complete, Completed),
                (Processing, Fail, Failed),
                (Pending, Cancel, Cancelled),
                (Processing, Cancel, Cancelled),
                (Failed, Retry, Pending),
            ],
        )
    }
}

impl Default for PatientStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for TreatmentStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for PhotoStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for AnalysisStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_treatment_transitions() {
        let sm = TreatmentStateMachine::new();

        assert!(sm.can_transition(TreatmentStatus::Planned, TreatmentEvent::Start));
        assert!(sm.can_transition(TreatmentStatus::InProgress, TreatmentEvent::Complete));
        assert!(sm.can_transition(TreatmentStatus::OnHold, TreatmentEvent::Resume));
        assert_eq!(
            sm.transition(TreatmentStatus::OnHold, TreatmentEvent::Cancel).unwrap(),
            TreatmentStatus::Cancelled
        );
    }

    #[test]
    fn test_invalid_treatment_transitions() {
        let sm = TreatmentStateMachine::new();

        assert!(!sm.can_transition(TreatmentStatus::Planned, TreatmentEvent::Complete));
        assert!(!sm.can_transition(TreatmentStatus::Completed, TreatmentEvent::Cancel));
        let err = sm
            .transition(TreatmentStatus::Cancelled, TreatmentEvent::Resume)
            .unwrap_err();
        assert!(matches!(
            err,
            DentalError::InvalidStateTransition { entity: "treatment", .. }
        ));
    }

    #[test]
    fn test_terminal_states() {
        let treatments = TreatmentStateMachine::new();
        for status in TreatmentStatus::ALL {
            assert_eq!(treatments.is_terminal(*status), status.is_terminal());
        }

        let analyses = AnalysisStateMachine::new();
        assert!(analyses.is_terminal(AnalysisStatus::Completed));
        assert!(analyses.is_terminal(AnalysisStatus::Cancelled));
        assert!(!analyses.is_terminal(AnalysisStatus::Failed));

        let patients = PatientStateMachine::new();
        assert!(patients.is_terminal(PatientStatus::Archived));
    }

    /// 统计允许的 (状态, 事件) 组合，其余组合必须报无效转换
    fn count_allowed<S, E>(sm: &StateMachine<S, E>, statuses: &[S], events: &[E]) -> usize
    where
        S: Copy + Eq + Hash + Debug,
        E: Copy + Eq + Hash + Debug,
    {
        let mut allowed = 0;
        for status in statuses {
            for event in events {
                match sm.transition(*status, *event) {
                    Ok(_) => {
                        assert!(sm.can_transition(*status, *event));
                        allowed += 1;
                    }
                    Err(err) => {
                        assert!(!sm.can_transition(*status, *event));
                        assert!(
                            matches!(err, DentalError::InvalidStateTransition { .. }),
                            "{:?} + {:?} returned {:?}",
                            status,
                            event,
                            err
                        );
                    }
                }
            }
        }
        allowed
    }

    #[test]
    fn test_every_unlisted_pair_is_rejected() {
        use AnalysisEvent as A;
        use PatientEvent as Pa;
        use PhotoEvent as Ph;
        use TreatmentEvent as T;

        assert_eq!(
            count_allowed(
                &AnalysisStateMachine::new(),
                AnalysisStatus::ALL,
                &[A::Start, A::Complete, A::Fail, A::Cancel, A::Retry],
            ),
            6
        );
        assert_eq!(
            count_allowed(
                &TreatmentStateMachine::new(),
                TreatmentStatus::ALL,
                &[T::Start, T::Complete, T::Hold, T::Resume, T::Cancel],
            ),
            8
        );
        assert_eq!(
            count_allowed(
                &PhotoStateMachine::new(),
                PhotoStatus::ALL,
                &[
                    Ph::BeginAnalysis,
                    Ph::FinishAnalysis,
                    Ph::FailAnalysis,
                    Ph::Reset,
                    Ph::Archive,
                ],
            ),
            9
        );
        assert_eq!(
            count_allowed(
                &PatientStateMachine::new(),
                PatientStatus::ALL,
                &[Pa::Activate, Pa::Deactivate, Pa::Archive],
            ),
            4
        );
    }

    #[test]
    fn test_possible_events() {
        let sm = PhotoStateMachine::new();
        let mut events = sm.possible_events(PhotoStatus::Processing);
        events.sort_by_key(|e| format!("{:?}", e));
        assert_eq!(
            events,
            vec![PhotoEvent::FailAnalysis, PhotoEvent::FinishAnalysis, PhotoEvent::Reset]
        );
    }
}
