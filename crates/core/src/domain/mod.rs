pub mod actor;
pub mod request;
pub mod snapshot;
