//! Shared error type and result alias

pub mod error;
pub mod result;

pub use error::WsyncError;
pub use result::WsyncResult;
