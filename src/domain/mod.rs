pub mod application;
pub mod lead;
pub mod message;
pub mod types;

pub use application::{ApplicationStatus, GhostTransition, TrackedApplication};
pub use lead::{LeadState, PendingLead};
pub use message::InboundMessage;
pub use types::{
    Category, ClassificationResult, Entities, Insight, MatchDecision, Provenance, Severity,
};
