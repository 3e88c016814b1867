pub mod cache;
pub mod generator;

pub use cache::InsightCache;
pub use generator::InsightGenerator;
