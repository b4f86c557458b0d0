//! Server-side WebSocket protocol support: opening-handshake
//! validation and an incremental frame codec.

pub mod frame;
pub mod handshake;

pub use frame::{
    encode_close, encode_masked_text, encode_pong, encode_text, FrameDecoder, FrameError,
    WsMessage,
};
pub use handshake::{accept_token, validate_upgrade, HandshakeError, HeaderLookup};
