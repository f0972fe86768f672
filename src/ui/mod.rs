//! 终端层：流式渲染（StreamingReporter）与标准输入审阅（StdinDecisionSource）

pub mod console;

pub use console::{StdinDecisionSource, StreamingReporter};
