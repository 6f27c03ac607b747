//! Outbound commands and their wire formatting.

mod serialize;
mod split;
mod types;

pub use split::LineFormatter;
pub use types::Command;
