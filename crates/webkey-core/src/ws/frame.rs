//! Incremental WebSocket frame decoder (RFC 6455, server side).
//!
//! Wire format of one frame:
//!
//! ```text
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| payload len |  extended payload len (16/64) |
//! |I|S|S|S|  (4)  |A|     (7)     |  if len == 126 / 127          |
//! |N|V|V|V|       |S|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |        masking key (4, client frames only)                    |
//! +---------------------------------------------------------------+
//! |        payload data (masked with key, XOR cycling)            |
//! +---------------------------------------------------------------+
//! ```
//!
//! [`FrameDecoder`] is owned by exactly one connection session.  Bytes
//! are pushed in with [`FrameDecoder::feed`] at whatever boundaries the
//! socket produces — a read may carry zero, one, or many frames, and a
//! frame may be split across many reads — and complete logical messages
//! are pulled out with [`FrameDecoder::next_message`].  Fragmented
//! messages (continuation frames) are reassembled internally; the
//! caller only ever sees whole messages.
//!
//! Any protocol violation poisons the decoder: it reports the error
//! once and refuses all further input, and the owning session must
//! close the socket.

use thiserror::Error;
use tracing::trace;

/// Maximum payload of a control frame (close/ping/pong), per RFC 6455 §5.5.
const MAX_CONTROL_PAYLOAD: usize = 125;

/// Errors that close the connection.  All of these are fatal to the
/// decoder instance; none of them are recoverable mid-stream.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Opcode is one of the reserved values (0x3-0x7, 0xB-0xF).
    #[error("reserved opcode: 0x{0:X}")]
    ReservedOpcode(u8),

    /// RSV1-3 must be zero since no extension is negotiated.
    #[error("nonzero RSV bits: 0x{0:X}")]
    ReservedBits(u8),

    /// Client-to-server frames must be masked (RFC 6455 §5.1).
    #[error("client frame is not masked")]
    UnmaskedFrame,

    /// Declared frame length, or the reassembled message, exceeds the
    /// configured maximum.
    #[error("payload of {declared} bytes exceeds maximum of {max}")]
    PayloadTooLarge { declared: usize, max: usize },

    /// Control frames carry at most 125 payload bytes.
    #[error("control frame payload of {0} bytes exceeds 125")]
    OversizedControlFrame(usize),

    /// Control frames must not be fragmented.
    #[error("fragmented control frame")]
    FragmentedControlFrame,

    /// Continuation frame arrived with no message in progress.
    #[error("continuation frame without a message in progress")]
    StrayContinuation,

    /// A new text/binary frame arrived while a fragmented message was
    /// still being reassembled.
    #[error("data frame interleaved with an unfinished fragmented message")]
    InterleavedDataFrame,

    /// A completed text message was not valid UTF-8.
    #[error("text message payload is not valid UTF-8")]
    InvalidUtf8,

    /// The decoder already failed; the connection must be closed.
    #[error("decoder is closed after a previous protocol error")]
    Closed,
}

/// Frame opcode nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    fn from_bits(bits: u8) -> Result<Self, FrameError> {
        match bits {
            0x0 => Ok(Self::Continuation),
            0x1 => Ok(Self::Text),
            0x2 => Ok(Self::Binary),
            0x8 => Ok(Self::Close),
            0x9 => Ok(Self::Ping),
            0xA => Ok(Self::Pong),
            other => Err(FrameError::ReservedOpcode(other)),
        }
    }

    fn is_control(self) -> bool {
        matches!(self, Self::Close | Self::Ping | Self::Pong)
    }
}

/// One complete logical message, possibly reassembled from several
/// frames.  Control messages are surfaced so the session can reply to
/// pings and honor close, but they never reach the key-event path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

/// One decoded physical frame, before reassembly.
struct RawFrame {
    fin: bool,
    opcode: Opcode,
    payload: Vec<u8>,
}

/// Per-connection decoder state machine.
///
/// States, implicitly: awaiting more header/payload bytes (buffered),
/// a fragmented message in progress (`fragment_*` set), and the
/// poisoned terminal state (`failed`).
pub struct FrameDecoder {
    /// Raw bytes received from the socket.  Bytes before `pos` belong
    /// to already-decoded frames and are reclaimed on the next `feed`.
    buf: Vec<u8>,
    /// Consumed-prefix cursor into `buf`.  A cursor instead of a
    /// front-drain per frame keeps a burst of small frames linear.
    pos: usize,
    /// Opcode of the fragmented message being reassembled, if any.
    fragment_opcode: Option<Opcode>,
    /// Accumulated payload of the fragmented message.
    fragments: Vec<u8>,
    /// Upper bound on a single frame's declared payload and on the
    /// reassembled message size.
    max_payload_len: usize,
    failed: bool,
}

impl FrameDecoder {
    /// Creates a decoder enforcing `max_payload_len` on declared frame
    /// lengths and reassembled messages.
    pub fn new(max_payload_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            fragment_opcode: None,
            fragments: Vec::new(),
            max_payload_len,
            failed: false,
        }
    }

    /// Appends raw bytes from the socket.  Chunk boundaries are
    /// arbitrary; nothing is decoded here.
    ///
    /// # Errors
    ///
    /// [`FrameError::Closed`] if the decoder already failed.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), FrameError> {
        if self.failed {
            return Err(FrameError::Closed);
        }
        self.compact();
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    /// Reclaims the consumed prefix in one move.
    fn compact(&mut self) {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
    }

    /// Decodes buffered bytes until one complete logical message is
    /// available, or the buffer runs dry.
    ///
    /// Returns `Ok(None)` when more bytes are needed.  Call repeatedly
    /// after each `feed` — one chunk can complete several messages.
    ///
    /// # Errors
    ///
    /// Any [`FrameError`]; afterwards the decoder is poisoned and every
    /// call returns [`FrameError::Closed`].
    pub fn next_message(&mut self) -> Result<Option<WsMessage>, FrameError> {
        if self.failed {
            return Err(FrameError::Closed);
        }
        match self.next_message_inner() {
            Ok(msg) => Ok(msg),
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }

    fn next_message_inner(&mut self) -> Result<Option<WsMessage>, FrameError> {
        loop {
            let (frame, consumed) = match self.parse_frame()? {
                Some(parsed) => parsed,
                None => return Ok(None),
            };
            self.pos += consumed;

            if frame.opcode.is_control() {
                // Control frames may interleave with a fragmented
                // message; they never participate in reassembly.
                let msg = match frame.opcode {
                    Opcode::Ping => WsMessage::Ping(frame.payload),
                    Opcode::Pong => WsMessage::Pong(frame.payload),
                    Opcode::Close => WsMessage::Close,
                    _ => unreachable!(),
                };
                return Ok(Some(msg));
            }

            match frame.opcode {
                Opcode::Text | Opcode::Binary => {
                    if self.fragment_opcode.is_some() {
                        return Err(FrameError::InterleavedDataFrame);
                    }
                    if frame.fin {
                        return Ok(Some(complete_message(frame.opcode, frame.payload)?));
                    }
                    // First fragment of a multi-frame message.
                    trace!(
                        "starting fragmented message ({} initial bytes)",
                        frame.payload.len()
                    );
                    self.fragment_opcode = Some(frame.opcode);
                    self.fragments = frame.payload;
                }
                Opcode::Continuation => {
                    let opcode = self
                        .fragment_opcode
                        .ok_or(FrameError::StrayContinuation)?;
                    if self.fragments.len() + frame.payload.len() > self.max_payload_len {
                        return Err(FrameError::PayloadTooLarge {
                            declared: self.fragments.len() + frame.payload.len(),
                            max: self.max_payload_len,
                        });
                    }
                    self.fragments.extend_from_slice(&frame.payload);
                    if frame.fin {
                        let payload = std::mem::take(&mut self.fragments);
                        self.fragment_opcode = None;
                        return Ok(Some(complete_message(opcode, payload)?));
                    }
                }
                _ => unreachable!(),
            }
        }
    }

    /// Attempts to parse one frame starting at the cursor.  The
    /// returned byte count is relative to the cursor.
    ///
    /// Returns `None` when the buffer holds only part of a frame.
    /// Header validation happens as soon as the relevant bytes are
    /// available, so an oversized or unmasked frame is rejected before
    /// its payload arrives.
    fn parse_frame(&self) -> Result<Option<(RawFrame, usize)>, FrameError> {
        let buf = &self.buf[self.pos..];
        if buf.len() < 2 {
            return Ok(None);
        }

        let fin = buf[0] & 0x80 != 0;
        let rsv = (buf[0] >> 4) & 0x07;
        if rsv != 0 {
            return Err(FrameError::ReservedBits(rsv));
        }
        let opcode = Opcode::from_bits(buf[0] & 0x0F)?;

        let masked = buf[1] & 0x80 != 0;
        if !masked {
            return Err(FrameError::UnmaskedFrame);
        }

        // Payload length: 7 bits, or 126 → next 2 bytes, 127 → next 8.
        let mut offset = 2;
        let payload_len = match buf[1] & 0x7F {
            126 => {
                if buf.len() < offset + 2 {
                    return Ok(None);
                }
                let len = u16::from_be_bytes([buf[offset], buf[offset + 1]]) as u64;
                offset += 2;
                len
            }
            127 => {
                if buf.len() < offset + 8 {
                    return Ok(None);
                }
                let len = u64::from_be_bytes([
                    buf[offset],
                    buf[offset + 1],
                    buf[offset + 2],
                    buf[offset + 3],
                    buf[offset + 4],
                    buf[offset + 5],
                    buf[offset + 6],
                    buf[offset + 7],
                ]);
                offset += 8;
                len
            }
            short => short as u64,
        };

        if payload_len > self.max_payload_len as u64 {
            return Err(FrameError::PayloadTooLarge {
                declared: payload_len as usize,
                max: self.max_payload_len,
            });
        }
        let payload_len = payload_len as usize;

        if opcode.is_control() {
            if !fin {
                return Err(FrameError::FragmentedControlFrame);
            }
            if payload_len > MAX_CONTROL_PAYLOAD {
                return Err(FrameError::OversizedControlFrame(payload_len));
            }
        }

        // Masking key, then payload.
        if buf.len() < offset + 4 {
            return Ok(None);
        }
        let mask = [buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]];
        offset += 4;

        if buf.len() < offset + payload_len {
            return Ok(None);
        }
        let mut payload = buf[offset..offset + payload_len].to_vec();
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= mask[i % 4];
        }

        Ok(Some((
            RawFrame {
                fin,
                opcode,
                payload,
            },
            offset + payload_len,
        )))
    }
}

fn complete_message(opcode: Opcode, payload: Vec<u8>) -> Result<WsMessage, FrameError> {
    match opcode {
        Opcode::Text => {
            let text = String::from_utf8(payload).map_err(|_| FrameError::InvalidUtf8)?;
            Ok(WsMessage::Text(text))
        }
        Opcode::Binary => Ok(WsMessage::Binary(payload)),
        _ => unreachable!("control frames never reach reassembly"),
    }
}

// ── Server-side frame encoding ────────────────────────────────────────────────
//
// Server-to-client frames are never masked (RFC 6455 §5.1).  The daemon
// only ever sends control replies; `encode_text` keeps the codec
// symmetric and is used by tests and diagnostics.

/// Encodes an unmasked text frame.
pub fn encode_text(payload: &str) -> Vec<u8> {
    encode_frame(0x1, payload.as_bytes(), None)
}

/// Encodes an unmasked pong frame echoing `payload`, the required reply
/// to a ping.
pub fn encode_pong(payload: &[u8]) -> Vec<u8> {
    encode_frame(0xA, payload, None)
}

/// Encodes an empty unmasked close frame.
pub fn encode_close() -> Vec<u8> {
    encode_frame(0x8, &[], None)
}

/// Encodes a masked text frame as a browser client would send it.
///
/// The daemon never masks; this exists for native test clients and for
/// exercising the decoder against realistic client traffic.
pub fn encode_masked_text(payload: &str, mask: [u8; 4]) -> Vec<u8> {
    encode_frame(0x1, payload.as_bytes(), Some(mask))
}

fn encode_frame(opcode: u8, payload: &[u8], mask: Option<[u8; 4]>) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 14);
    out.push(0x80 | opcode); // FIN set; no fragmentation on the way out

    let mask_bit = if mask.is_some() { 0x80 } else { 0x00 };
    match payload.len() {
        len if len < 126 => out.push(mask_bit | len as u8),
        len if len < 65536 => {
            out.push(mask_bit | 126);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        }
        len => {
            out.push(mask_bit | 127);
            out.extend_from_slice(&(len as u64).to_be_bytes());
        }
    }

    match mask {
        Some(key) => {
            out.extend_from_slice(&key);
            out.extend(payload.iter().enumerate().map(|(i, b)| b ^ key[i % 4]));
        }
        None => out.extend_from_slice(payload),
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 64 * 1024;

    fn decode_all(bytes: &[u8]) -> Result<Vec<WsMessage>, FrameError> {
        let mut dec = FrameDecoder::new(MAX);
        dec.feed(bytes)?;
        let mut out = Vec::new();
        while let Some(msg) = dec.next_message()? {
            out.push(msg);
        }
        Ok(out)
    }

    /// Builds a single masked frame with explicit header fields, for
    /// crafting fragments and malformed frames.
    fn masked_frame(fin: bool, opcode: u8, payload: &[u8], mask: [u8; 4]) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(if fin { 0x80 } else { 0x00 } | opcode);
        match payload.len() {
            len if len < 126 => out.push(0x80 | len as u8),
            len if len < 65536 => {
                out.push(0x80 | 126);
                out.extend_from_slice(&(len as u16).to_be_bytes());
            }
            len => {
                out.push(0x80 | 127);
                out.extend_from_slice(&(len as u64).to_be_bytes());
            }
        }
        out.extend_from_slice(&mask);
        out.extend(payload.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));
        out
    }

    // ── Single-frame decoding ─────────────────────────────────────────────────

    #[test]
    fn test_masked_text_frame_round_trip() {
        let bytes = encode_masked_text("A down", [0x12, 0x34, 0x56, 0x78]);
        let msgs = decode_all(&bytes).unwrap();
        assert_eq!(msgs, vec![WsMessage::Text("A down".to_string())]);
    }

    #[test]
    fn test_empty_text_frame() {
        let bytes = encode_masked_text("", [1, 2, 3, 4]);
        let msgs = decode_all(&bytes).unwrap();
        assert_eq!(msgs, vec![WsMessage::Text(String::new())]);
    }

    #[test]
    fn test_sixteen_bit_extended_length() {
        let payload = "x".repeat(300);
        let bytes = encode_masked_text(&payload, [9, 8, 7, 6]);
        // 126 marker + 2 length bytes
        assert_eq!(bytes[1] & 0x7F, 126);
        let msgs = decode_all(&bytes).unwrap();
        assert_eq!(msgs, vec![WsMessage::Text(payload)]);
    }

    #[test]
    fn test_sixty_four_bit_length_header_is_parsed() {
        // 64 KiB won't fit in 16 bits minus one, so a 70000-byte
        // declaration uses the 127 marker; cap must reject it here.
        let payload = vec![b'y'; 70_000];
        let frame = masked_frame(true, 0x2, &payload, [1, 1, 1, 1]);
        assert_eq!(frame[1] & 0x7F, 127);
        let mut dec = FrameDecoder::new(100_000);
        dec.feed(&frame).unwrap();
        assert_eq!(
            dec.next_message().unwrap(),
            Some(WsMessage::Binary(payload))
        );
    }

    #[test]
    fn test_two_messages_in_one_chunk() {
        let mut bytes = encode_masked_text("A down", [1, 2, 3, 4]);
        bytes.extend(encode_masked_text("A up", [5, 6, 7, 8]));
        let msgs = decode_all(&bytes).unwrap();
        assert_eq!(
            msgs,
            vec![
                WsMessage::Text("A down".to_string()),
                WsMessage::Text("A up".to_string()),
            ]
        );
    }

    // ── Arbitrary chunk boundaries ────────────────────────────────────────────

    #[test]
    fn test_every_split_point_yields_identical_message() {
        let bytes = encode_masked_text("{enter} down", [0xAA, 0xBB, 0xCC, 0xDD]);
        for split in 1..bytes.len() {
            let mut dec = FrameDecoder::new(MAX);
            dec.feed(&bytes[..split]).unwrap();
            // A partial frame must never produce a message or an error.
            if split < bytes.len() {
                assert_eq!(dec.next_message().unwrap(), None, "split at {split}");
            }
            dec.feed(&bytes[split..]).unwrap();
            assert_eq!(
                dec.next_message().unwrap(),
                Some(WsMessage::Text("{enter} down".to_string())),
                "split at {split}"
            );
        }
    }

    #[test]
    fn test_byte_at_a_time_delivery() {
        let bytes = encode_masked_text("{shiftleft} repeat", [3, 1, 4, 1]);
        let mut dec = FrameDecoder::new(MAX);
        let mut got = None;
        for byte in &bytes {
            dec.feed(std::slice::from_ref(byte)).unwrap();
            if let Some(msg) = dec.next_message().unwrap() {
                got = Some(msg);
            }
        }
        assert_eq!(got, Some(WsMessage::Text("{shiftleft} repeat".to_string())));
    }

    #[test]
    fn test_three_segment_delivery_one_five_rest() {
        let bytes = encode_masked_text("A down", [1, 2, 3, 4]);
        let mut dec = FrameDecoder::new(MAX);
        dec.feed(&bytes[..1]).unwrap();
        assert_eq!(dec.next_message().unwrap(), None);
        dec.feed(&bytes[1..6]).unwrap();
        assert_eq!(dec.next_message().unwrap(), None);
        dec.feed(&bytes[6..]).unwrap();
        assert_eq!(
            dec.next_message().unwrap(),
            Some(WsMessage::Text("A down".to_string()))
        );
    }

    #[test]
    fn test_burst_of_frames_in_one_feed_decodes_in_order() {
        // One read carrying many small frames must yield every message,
        // in order, across repeated next_message calls.
        let mut bytes = Vec::new();
        for i in 0..100 {
            bytes.extend(encode_masked_text(&format!("msg-{i}"), [1, 2, 3, 4]));
        }
        let mut dec = FrameDecoder::new(MAX);
        dec.feed(&bytes).unwrap();
        for i in 0..100 {
            assert_eq!(
                dec.next_message().unwrap(),
                Some(WsMessage::Text(format!("msg-{i}")))
            );
        }
        assert_eq!(dec.next_message().unwrap(), None);
    }

    #[test]
    fn test_feed_after_partial_consumption_keeps_frame_alignment() {
        // Consume two whole frames, leave half of a third, then feed
        // the rest; the decoder must still find the frame boundary.
        let mut bytes = encode_masked_text("A down", [1, 2, 3, 4]);
        bytes.extend(encode_masked_text("A up", [5, 6, 7, 8]));
        let third = encode_masked_text("{enter} down", [9, 9, 9, 9]);
        bytes.extend(&third[..4]);

        let mut dec = FrameDecoder::new(MAX);
        dec.feed(&bytes).unwrap();
        assert_eq!(
            dec.next_message().unwrap(),
            Some(WsMessage::Text("A down".to_string()))
        );
        assert_eq!(
            dec.next_message().unwrap(),
            Some(WsMessage::Text("A up".to_string()))
        );
        assert_eq!(dec.next_message().unwrap(), None);

        dec.feed(&third[4..]).unwrap();
        assert_eq!(
            dec.next_message().unwrap(),
            Some(WsMessage::Text("{enter} down".to_string()))
        );
    }

    // ── Fragmentation ─────────────────────────────────────────────────────────

    #[test]
    fn test_fragmented_message_is_reassembled() {
        let mask = [5, 5, 5, 5];
        let mut bytes = masked_frame(false, 0x1, b"{arrow", mask);
        bytes.extend(masked_frame(false, 0x0, b"up} ", mask));
        bytes.extend(masked_frame(true, 0x0, b"down", mask));
        let msgs = decode_all(&bytes).unwrap();
        assert_eq!(msgs, vec![WsMessage::Text("{arrowup} down".to_string())]);
    }

    #[test]
    fn test_control_frame_between_fragments() {
        let mask = [2, 4, 6, 8];
        let mut bytes = masked_frame(false, 0x1, b"A do", mask);
        bytes.extend(masked_frame(true, 0x9, b"hb", mask)); // ping
        bytes.extend(masked_frame(true, 0x0, b"wn", mask));
        let msgs = decode_all(&bytes).unwrap();
        assert_eq!(
            msgs,
            vec![
                WsMessage::Ping(b"hb".to_vec()),
                WsMessage::Text("A down".to_string()),
            ]
        );
    }

    #[test]
    fn test_stray_continuation_is_fatal() {
        let bytes = masked_frame(true, 0x0, b"orphan", [1, 2, 3, 4]);
        assert_eq!(decode_all(&bytes), Err(FrameError::StrayContinuation));
    }

    #[test]
    fn test_interleaved_data_frame_is_fatal() {
        let mask = [1, 2, 3, 4];
        let mut bytes = masked_frame(false, 0x1, b"first", mask);
        bytes.extend(masked_frame(true, 0x1, b"second", mask));
        assert_eq!(decode_all(&bytes), Err(FrameError::InterleavedDataFrame));
    }

    // ── Control frames ────────────────────────────────────────────────────────

    #[test]
    fn test_ping_is_surfaced_with_payload() {
        let bytes = masked_frame(true, 0x9, b"tok", [0, 0, 0, 1]);
        assert_eq!(decode_all(&bytes).unwrap(), vec![WsMessage::Ping(b"tok".to_vec())]);
    }

    #[test]
    fn test_close_is_surfaced() {
        let bytes = masked_frame(true, 0x8, &[0x03, 0xE8], [7, 7, 7, 7]);
        assert_eq!(decode_all(&bytes).unwrap(), vec![WsMessage::Close]);
    }

    #[test]
    fn test_oversized_control_payload_is_fatal() {
        let bytes = masked_frame(true, 0x9, &[0u8; 126], [1, 2, 3, 4]);
        assert_eq!(
            decode_all(&bytes),
            Err(FrameError::OversizedControlFrame(126))
        );
    }

    #[test]
    fn test_fragmented_control_frame_is_fatal() {
        let bytes = masked_frame(false, 0x9, b"x", [1, 2, 3, 4]);
        assert_eq!(decode_all(&bytes), Err(FrameError::FragmentedControlFrame));
    }

    // ── Protocol violations ───────────────────────────────────────────────────

    #[test]
    fn test_unmasked_client_frame_is_fatal() {
        let bytes = encode_text("A down"); // server-style, no mask
        assert_eq!(decode_all(&bytes), Err(FrameError::UnmaskedFrame));
    }

    #[test]
    fn test_reserved_opcode_is_fatal() {
        let bytes = masked_frame(true, 0x3, b"", [1, 2, 3, 4]);
        assert_eq!(decode_all(&bytes), Err(FrameError::ReservedOpcode(0x3)));
    }

    #[test]
    fn test_nonzero_rsv_bits_are_fatal() {
        let mut bytes = masked_frame(true, 0x1, b"A down", [1, 2, 3, 4]);
        bytes[0] |= 0x40; // RSV1
        assert_eq!(decode_all(&bytes), Err(FrameError::ReservedBits(0x4)));
    }

    #[test]
    fn test_declared_length_over_maximum_is_fatal_before_payload_arrives() {
        let mut dec = FrameDecoder::new(16);
        // Header declaring 300 bytes; no payload bytes delivered at all.
        let mut header = vec![0x81, 0x80 | 126];
        header.extend_from_slice(&300u16.to_be_bytes());
        dec.feed(&header).unwrap();
        assert_eq!(
            dec.next_message(),
            Err(FrameError::PayloadTooLarge {
                declared: 300,
                max: 16
            })
        );
    }

    #[test]
    fn test_reassembled_message_over_maximum_is_fatal() {
        let mask = [1, 2, 3, 4];
        let mut dec = FrameDecoder::new(10);
        dec.feed(&masked_frame(false, 0x1, b"123456", mask)).unwrap();
        assert_eq!(dec.next_message().unwrap(), None);
        dec.feed(&masked_frame(true, 0x0, b"789012", mask)).unwrap();
        assert!(matches!(
            dec.next_message(),
            Err(FrameError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_in_text_message_is_fatal() {
        let bytes = masked_frame(true, 0x1, &[0xFF, 0xFE], [1, 2, 3, 4]);
        assert_eq!(decode_all(&bytes), Err(FrameError::InvalidUtf8));
    }

    #[test]
    fn test_decoder_is_poisoned_after_error() {
        let mut dec = FrameDecoder::new(MAX);
        dec.feed(&encode_text("unmasked")).unwrap();
        assert_eq!(dec.next_message(), Err(FrameError::UnmaskedFrame));

        // Every further interaction reports Closed, even valid frames.
        assert_eq!(
            dec.feed(&encode_masked_text("A down", [1, 2, 3, 4])),
            Err(FrameError::Closed)
        );
        assert_eq!(dec.next_message(), Err(FrameError::Closed));
    }

    // ── Outbound encoding ─────────────────────────────────────────────────────

    #[test]
    fn test_encode_pong_echoes_payload_unmasked() {
        let frame = encode_pong(b"tok");
        assert_eq!(frame[0], 0x8A); // FIN + pong
        assert_eq!(frame[1], 0x03); // no mask bit, len 3
        assert_eq!(&frame[2..], b"tok");
    }

    #[test]
    fn test_encode_close_is_empty_unmasked() {
        assert_eq!(encode_close(), vec![0x88, 0x00]);
    }

    #[test]
    fn test_encode_text_unmasked_layout() {
        let frame = encode_text("hi");
        assert_eq!(frame, vec![0x81, 0x02, b'h', b'i']);
    }
}
