pub mod solcast_http;

pub use solcast_http::{SolcastHttpSource, SourceError};
