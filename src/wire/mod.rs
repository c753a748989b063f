// LNP/BP Core Library implementing LNPBP specifications & standards
// Written in 2020-2024 by
//     Dr. Maxim Orlovsky <orlovsky@pandoracore.com>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the MIT License
// along with this software.
// If not, see <https://opensource.org/licenses/MIT>.

//! C1: the wire codec. Defines the closed message set of §4.1 and the exact
//! big-endian layout for each kind. Framing is transport-agnostic: the noise
//! handshake and the read/write loop that turns a TCP stream into discrete
//! frames are external collaborators (§1); this module only encodes/decodes
//! a frame's payload once it has been delivered whole.

pub mod codec;
pub mod messages;
pub mod types;

pub use codec::{BufReader, BufWriter, Reader, Writer, MAX_PAYLOAD_SIZE};
pub use messages::{Message, MessageType};
pub use types::{
    ActiveChannelId, ChannelId, CompactSignature, PaymentHash, PaymentPreimage,
    ShortChannelId, TempChannelId, WireEncode,
};

#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum Error {
    /// payload of {0} bytes exceeds the 65535-byte maximum wire payload
    PayloadTooLarge(usize),

    /// declared frame length {declared} does not match the {actual} bytes
    /// actually received
    LengthMismatch { declared: usize, actual: usize },

    /// unexpected end of buffer while decoding a wire message
    UnexpectedEof,

    /// message type {0} is unknown and below the ignorable-type threshold;
    /// this is a fatal protocol error per BOLT-1
    UnknownFatalType(u16),

    /// invalid public key encoding
    InvalidPublicKey,

    /// invalid 64-byte compact signature encoding
    InvalidSignatureEncoding,

    /// invalid hash encoding
    InvalidHash,

    /// trailing {0} bytes after decoding a message of known length
    TrailingBytes(usize),
}
