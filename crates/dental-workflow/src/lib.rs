//! # 牙科工作流模块
//!
//! 业务命令与查询层，位于 HTTP 处理器和仓储之间：
//! - 状态机：患者、治疗、照片、AI分析的状态转换规则
//! - 各实体服务：校验输入 → 检查前置条件 → 读写仓储 → 返回结果
//! - 诊所引擎：统一持有所有服务

pub mod analyses;
pub mod engine;
pub mod patients;
pub mod photos;
pub mod state_machine;
pub mod stats;
pub mod treatments;

// 重新导出主要类型
pub use analyses::AnalysisService;
pub use engine::{ClinicEngine, WorkflowSettings};
pub use patients::{PatientService, PatientSummary};
pub use photos::{PhotoContent, PhotoService};
pub use state_machine::{
    AnalysisEvent, AnalysisStateMachine, PatientEvent, PatientStateMachine, PhotoEvent,
    PhotoStateMachine, StateMachine, TreatmentEvent, TreatmentStateMachine,
};
pub use stats::{PracticeOverview, StatsService};
pub use treatments::TreatmentService;
