#[cfg(windows)]
pub mod console;
pub mod host;
#[cfg(test)]
pub mod memory;
pub mod scanner;
pub mod splice;
pub mod viewport;

pub use splice::SpliceError;
