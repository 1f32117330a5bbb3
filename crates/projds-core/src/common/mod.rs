pub mod config;
pub mod params;

pub use config::ProjectionDefaults;
pub use params::{ParamDict, ParamEntry, ParamError, ParamValue};
