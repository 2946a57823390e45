//! Task execution module
//!
//! This module holds the task graph executor and the command runner every task
//! body uses to reach the outside world.

pub mod command;
pub mod graph;

pub use command::{CommandOutput, CommandRunner, CommandSpec, ExitStatus, ShellRunner};
pub use graph::{GraphRun, Task, TaskBody, TaskGraph, TaskState};
