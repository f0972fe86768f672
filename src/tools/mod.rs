//! 工具层：动作目录、执行器与沙箱内的具体工具
//!
//! 只读工具（ls / read_file / glob / grep / run_tests）直接执行；
//! 写文件类工具（write_file / edit_file / create_test_file）默认需要人工审阅。
//! 子 Agent（test_writer / qa_tester）持有自己的工具集，内部遇到需审阅的动作时整体挂起，交由外层会话审阅。

pub mod executor;
pub mod file_edit;
pub mod file_search;
pub mod file_write;
pub mod filesystem;
pub mod registry;
pub mod subagent;
pub mod test_file;
pub mod test_run;

pub use executor::ToolExecutor;
pub use file_edit::EditFileTool;
pub use file_search::{GlobTool, GrepTool};
pub use file_write::WriteFileTool;
pub use filesystem::{LsTool, ReadFileTool, SafeFs};
pub use registry::{ActionCatalog, ActionDescriptor, CatalogEntry, SuspendedRun, Tool, ToolRun};
pub use subagent::SubAgentTool;
pub use test_file::CreateTestFileTool;
pub use test_run::RunTestsTool;
