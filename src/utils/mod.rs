pub mod error;

pub use error::{OverlayError, Result};
