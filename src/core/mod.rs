//! 核心层：错误分类与会话级并发控制

pub mod error;
pub mod lease;

pub use error::AgentError;
pub use lease::{SessionLease, SessionLeases};
