pub mod errors;

pub use errors::{ConfigError, TeammyError};

pub type Result<T> = std::result::Result<T, TeammyError>;
