// Persistence: the commit counter record.

pub mod counter;
