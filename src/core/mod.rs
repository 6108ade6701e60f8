//! 核心层：错误类型、阶段定义、会话状态机、优雅关闭

pub mod error;
pub mod session;
pub mod shutdown;
pub mod stage;

pub use error::{DriverError, StageFailure};
pub use session::{SessionConfig, SessionStateMachine, StageDelays, StageObserver, StageTimeouts};
pub use shutdown::{ShutdownManager, ShutdownReason};
pub use stage::{
    is_plausible_recipient, EmailJob, SessionState, Stage, StageOutcome, StageResult, WorkflowOutcome,
};
