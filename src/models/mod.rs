//! Data models for the Nice Questions backend.
//!
//! Field names follow the frontend TypeScript interfaces (camelCase JSON).

mod moderation;
mod question;
mod quota;

pub use moderation::*;
pub use question::*;
pub use quota::*;
