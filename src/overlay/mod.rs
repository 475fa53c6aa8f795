pub mod session;

pub use session::{OverlaySession, PlacedGraphic, SessionState};
