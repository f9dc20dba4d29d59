//! Workflow orchestration.
//!
//! `state` holds the stages and the authoritative `WorkflowState`, `machine`
//! the pure transition function over it, and `session` the async owner that
//! serializes inbound calls, runs the collaborators and publishes events.

pub mod machine;
pub mod session;
pub mod state;

pub use machine::{WorkflowEvent, WorkflowMachine};
pub use session::{LocalMatching, MatchingService, Progress, Session, SessionEvent};
pub use state::{MAX_TRANSITIONS, Stage, StageTransition, WorkflowState};
