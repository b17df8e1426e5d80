// Pose, rep and session data models

pub mod landmark;
pub mod workout;

pub use landmark::*;
pub use workout::*;
