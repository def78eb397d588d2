//! Shell command execution with timeout and process-group cleanup.

mod shell;

pub use shell::{ExecResult, execute_shell};
