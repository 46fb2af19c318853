//! Bolt protocol message types.
//!
//! This module covers the Bolt v1 request set handled by the session state
//! machine and the responses the server sends back.

pub mod request;
pub mod response;

pub use request::*;
pub use response::*;

/// Bolt message tags.
pub mod tag {
    /// INIT message tag (0x01)
    pub const INIT: u8 = 0x01;
    /// ACK_FAILURE message tag (0x0E)
    pub const ACK_FAILURE: u8 = 0x0E;
    /// RESET message tag (0x0F)
    pub const RESET: u8 = 0x0F;
    /// RUN message tag (0x10)
    pub const RUN: u8 = 0x10;
    /// DISCARD_ALL message tag (0x2F)
    pub const DISCARD_ALL: u8 = 0x2F;
    /// PULL_ALL message tag (0x3F)
    pub const PULL_ALL: u8 = 0x3F;

    /// SUCCESS response tag (0x70)
    pub const SUCCESS: u8 = 0x70;
    /// RECORD response tag (0x71)
    pub const RECORD: u8 = 0x71;
    /// IGNORED response tag (0x7E)
    pub const IGNORED: u8 = 0x7E;
    /// FAILURE response tag (0x7F)
    pub const FAILURE: u8 = 0x7F;
}
