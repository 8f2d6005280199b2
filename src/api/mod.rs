pub mod handlers;
pub mod request_id;
pub mod state;

pub use handlers::{dispatch, preload, recommend, recommend_from};
pub use request_id::{make_span_with_request_id, RequestId};
pub use state::RecommenderState;
