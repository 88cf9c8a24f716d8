pub mod backoff;
pub mod errors;
pub mod shutdown;
