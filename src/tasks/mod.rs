pub mod processor;
pub mod scheduler;
