// autopush-daemon library: periodic commit-and-push for a single working tree.

pub mod config;
pub mod git;
pub mod runtime;
pub mod scheduler;
pub mod store;
