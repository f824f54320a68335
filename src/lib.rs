pub mod config;
pub mod coverage;
pub mod credential;
pub mod error;
pub mod notify;
pub mod output;
pub mod recommender;
pub mod server;
pub mod session;
pub mod snapshot;
pub mod time;
pub mod types;

pub use error::{AssignmentError, AssignmentResult};
pub use recommender::RecommendationClient;
pub use session::{AssignmentSession, SessionState, SessionView};
