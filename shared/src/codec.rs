use thiserror::Error;

use crate::Envelope;

/// Errors that can occur translating envelopes at the wire boundary
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Input byte does not name any envelope kind
    #[error("unknown envelope tag byte {tag:#04x}")]
    UnknownTag { tag: u8 },

    /// Body could not be translated into the structure model
    #[error("envelope body malformed: {reason}")]
    MalformedBody { reason: String },

    /// Envelope cannot be represented by this codec
    #[error("envelope not encodable: {reason}")]
    NotEncodable { reason: String },
}

/// Result of one decode attempt over a byte buffer.
pub enum DecodeResult {
    /// One envelope decoded, consuming `consumed` bytes of the input.
    Complete { envelope: Envelope, consumed: usize },
    /// Input holds no complete envelope yet; feed more bytes.
    Incomplete,
    /// Input is not a valid envelope; the connection should be torn down.
    Invalid(CodecError),
}

/// Wire boundary: the core consumes and produces only `Envelope`s;
/// translating them to and from bytes on a transport is the hosting
/// process's codec. No concrete codec ships with the core.
pub trait Codec: Send + Sync {
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, input: &[u8]) -> DecodeResult;
}
