//! Interaction layer: the HTTP gateway to the reading backend and the
//! flow orchestrator that drives a conversation through a reading.

mod flow;
mod reading_api_client;

pub use flow::{FeedbackStatus, FlowOutcome, ReadingFlow};
pub use reading_api_client::ReadingApiClient;
