//! Protocol module containing the envelope, the category message families,
//! and the binary codec.

pub mod codec;
pub mod envelope;
pub mod messages;
pub mod sequence;

pub use codec::{
    decode_body, decode_envelope, encode_body, encode_envelope, is_incomplete, ProtocolError,
    FRAME_VERSION, HEADER_SIZE,
};
pub use envelope::{CategoryId, Envelope, MessageKind};
pub use messages::*;
pub use sequence::SequenceCounter;
