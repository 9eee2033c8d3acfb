pub mod alignment;
pub mod chunks;
pub mod db;
pub mod domain;
pub mod period_end;
pub mod resource;

pub use alignment::{extract_series, floor_to_grid, AlignmentError, GridSeries};
pub use chunks::{TimeChunk, TimeChunks};
pub use period_end::{format_period_end, parse_period_end, FormatError};
pub use resource::{ResourceIdError, ResourceKey};
