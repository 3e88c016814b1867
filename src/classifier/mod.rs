pub mod patterns;
pub mod quick_filter;
pub mod signals;

pub use patterns::{PatternClassifier, PatternVerdict};
pub use quick_filter::QuickFilter;
pub use signals::{EntityExtractor, HeuristicEntityExtractor, SignalExtractor, SignalReport};
