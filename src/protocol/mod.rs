//! Wire protocol: HTTP request heads, the WebSocket handshake and frames.
//!
//! Everything here is implemented directly on byte streams; there is no
//! WebSocket library underneath.
//!
//! # Protocol Overview
//!
//! | Step | Direction | Module |
//! |------|-----------|--------|
//! | Request head | Client → Server | `http` |
//! | Static response | Server → Client | `http` |
//! | `101 Switching Protocols` | Server → Client | `handshake` |
//! | Text frames | Both | `frame` |
//!
//! # Telemetry Lines
//!
//! Server frames carry one `KEY:value` line each, e.g. `PULSE:72`,
//! `STATE:DEFENSE`, `CHRONO:5:98.42`, `LOG:message`. Client frames carry
//! free-form command text.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | RFC 6455 frame encoding and decoding |
//! | `handshake` | `Sec-WebSocket-Accept` computation and 101 response |
//! | `http` | Request head parsing and dashboard responses |

// ============================================================================
// Submodules
// ============================================================================

/// RFC 6455 frame codec.
pub mod frame;

/// WebSocket opening handshake.
pub mod handshake;

/// Minimal HTTP request/response handling.
pub mod http;

// ============================================================================
// Re-exports
// ============================================================================

pub use frame::{
    DEFAULT_MAX_PAYLOAD_SIZE, FrameDecoder, FrameHeader, Opcode, apply_mask, encode_frame,
    encode_masked_frame, encode_text, write_frame,
};
pub use handshake::{HandshakeRequest, compute_accept_key};
pub use http::{HttpResponder, RequestHead, Route, write_response};
