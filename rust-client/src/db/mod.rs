pub mod poll_queries;

pub use poll_queries::{registered_resource_id, select_actuals, select_polls_in_chunk, ActualRow};
