pub mod ai;
pub mod app;
pub mod classifier;
pub mod config;
pub mod db;
pub mod detection;
pub mod domain;
pub mod infrastructure;
pub mod insights;
pub mod matching;
pub mod pipeline;
pub mod tasks;
pub mod tracker;
