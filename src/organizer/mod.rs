//! Grouping of classified documents and the `<type>/<theme>/` move plan

pub mod grouping;
pub mod planner;
pub mod slug;

pub use grouping::{group_documents, ClassificationResult, Group};
pub use planner::{MoveOutcome, MovePlanner};
