// Git sync: command executor, remote bootstrap, and the sync cycle.

pub mod bootstrap;
pub mod cycle;
pub mod remote;
pub mod worker;
