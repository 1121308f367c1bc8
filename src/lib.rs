pub mod aggregate;
pub mod districts;
pub mod error;
pub mod pipeline;
pub mod provider;

pub use error::{AggError, AggResult};
