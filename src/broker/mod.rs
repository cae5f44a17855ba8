//! Topic-exchange message broker.

pub mod pattern;
pub mod router;
pub mod topic;

pub use router::EventRouter;
pub use topic::{Delivery, QueueDescriptor, TopicBroker};
