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

//! Primitive wire types shared across every message in [`super::messages`]:
//! 32-byte hashes, compact 64-byte signatures, channel identifiers and the
//! short channel id used in gossip and HTLC routing.

use std::fmt;

use amplify::Slice32;
use bitcoin::hashes::{sha256, Hash};
use bitcoin::secp256k1::ecdsa::Signature as EcdsaSignature;
use bitcoin::secp256k1::PublicKey;
use bitcoin::{OutPoint, Txid};

use super::codec::{Reader, Writer};
use super::Error;

/// A 32-byte channel identifier, derived by XOR-ing the funding txid with the
/// big-endian funding output index (BOLT-2).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ChannelId(pub [u8; 32]);

impl ChannelId {
    pub fn from_funding(outpoint: OutPoint) -> ChannelId {
        let mut id = outpoint.txid.to_vec();
        id[30] ^= ((outpoint.vout >> 8) & 0xff) as u8;
        id[31] ^= (outpoint.vout & 0xff) as u8;
        let mut buf = [0u8; 32];
        buf.copy_from_slice(&id);
        ChannelId(buf)
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// A temporary channel id used between `open_channel` and the assignment of
/// the final [`ChannelId`] once the funding outpoint is known.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TempChannelId(pub [u8; 32]);

/// Either a temporary or a final channel id, depending on lifecycle stage.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ActiveChannelId {
    Temporary(TempChannelId),
    Final(ChannelId),
}

impl ActiveChannelId {
    pub fn channel_id(&self) -> Option<ChannelId> {
        match self {
            ActiveChannelId::Final(id) => Some(*id),
            ActiveChannelId::Temporary(_) => None,
        }
    }
}

/// Compact identifier of a public channel: `blockheight << 40 | txindex << 16
/// | output index`, used in gossip and onion routing instead of the full
/// outpoint.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct ShortChannelId(pub u64);

impl ShortChannelId {
    pub fn new(block_height: u32, tx_index: u32, output_index: u16) -> Self {
        ShortChannelId(
            ((block_height as u64) << 40)
                | ((tx_index as u64) << 16)
                | output_index as u64,
        )
    }

    pub fn block_height(self) -> u32 {
        (self.0 >> 40) as u32
    }
}

/// `sha256(preimage)`, the value that identifies an in-flight payment across
/// every hop of a route.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PaymentHash(pub [u8; 32]);

impl fmt::Debug for PaymentHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PaymentHash({})", hex_of(&self.0))
    }
}

/// The secret that unlocks an HTLC whose hash is `sha256(preimage)`.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct PaymentPreimage(pub [u8; 32]);

impl PaymentPreimage {
    pub fn hash(&self) -> PaymentHash {
        PaymentHash(sha256::Hash::hash(&self.0).into_inner())
    }
}

fn hex_of(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// 64-byte `R || S` ECDSA signature, as specified by BOLT-1 ("big-endian
/// throughout"); the DER encoding used elsewhere in Bitcoin is never placed
/// on the Lightning wire.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct CompactSignature(pub [u8; 64]);

impl CompactSignature {
    pub fn from_signature(sig: &EcdsaSignature) -> Self {
        CompactSignature(sig.serialize_compact())
    }

    pub fn to_signature(&self) -> Result<EcdsaSignature, Error> {
        EcdsaSignature::from_compact(&self.0).map_err(|_| Error::InvalidSignatureEncoding)
    }
}

/// Encoding helpers implemented directly rather than derived, since the wire
/// layout of these primitives is fixed by BOLT-1 and must not drift if a
/// derive macro's output ever changes.
pub trait WireEncode: Sized {
    fn wire_encode(&self, writer: &mut impl Writer) -> Result<(), Error>;
    fn wire_decode(reader: &mut impl Reader) -> Result<Self, Error>;
}

impl WireEncode for ChannelId {
    fn wire_encode(&self, writer: &mut impl Writer) -> Result<(), Error> {
        writer.write_bytes(&self.0)
    }
    fn wire_decode(reader: &mut impl Reader) -> Result<Self, Error> {
        let mut buf = [0u8; 32];
        reader.read_bytes(&mut buf)?;
        Ok(ChannelId(buf))
    }
}

impl WireEncode for TempChannelId {
    fn wire_encode(&self, writer: &mut impl Writer) -> Result<(), Error> {
        writer.write_bytes(&self.0)
    }
    fn wire_decode(reader: &mut impl Reader) -> Result<Self, Error> {
        let mut buf = [0u8; 32];
        reader.read_bytes(&mut buf)?;
        Ok(TempChannelId(buf))
    }
}

impl WireEncode for ShortChannelId {
    fn wire_encode(&self, writer: &mut impl Writer) -> Result<(), Error> {
        writer.write_u64(self.0)
    }
    fn wire_decode(reader: &mut impl Reader) -> Result<Self, Error> {
        Ok(ShortChannelId(reader.read_u64()?))
    }
}

impl WireEncode for PaymentHash {
    fn wire_encode(&self, writer: &mut impl Writer) -> Result<(), Error> {
        writer.write_bytes(&self.0)
    }
    fn wire_decode(reader: &mut impl Reader) -> Result<Self, Error> {
        let mut buf = [0u8; 32];
        reader.read_bytes(&mut buf)?;
        Ok(PaymentHash(buf))
    }
}

impl WireEncode for PaymentPreimage {
    fn wire_encode(&self, writer: &mut impl Writer) -> Result<(), Error> {
        writer.write_bytes(&self.0)
    }
    fn wire_decode(reader: &mut impl Reader) -> Result<Self, Error> {
        let mut buf = [0u8; 32];
        reader.read_bytes(&mut buf)?;
        Ok(PaymentPreimage(buf))
    }
}

impl WireEncode for CompactSignature {
    fn wire_encode(&self, writer: &mut impl Writer) -> Result<(), Error> {
        writer.write_bytes(&self.0)
    }
    fn wire_decode(reader: &mut impl Reader) -> Result<Self, Error> {
        let mut buf = [0u8; 64];
        reader.read_bytes(&mut buf)?;
        Ok(CompactSignature(buf))
    }
}

impl WireEncode for PublicKey {
    fn wire_encode(&self, writer: &mut impl Writer) -> Result<(), Error> {
        writer.write_bytes(&self.serialize())
    }
    fn wire_decode(reader: &mut impl Reader) -> Result<Self, Error> {
        let mut buf = [0u8; 33];
        reader.read_bytes(&mut buf)?;
        PublicKey::from_slice(&buf).map_err(|_| Error::InvalidPublicKey)
    }
}

impl WireEncode for Slice32 {
    fn wire_encode(&self, writer: &mut impl Writer) -> Result<(), Error> {
        writer.write_bytes(self.as_inner())
    }
    fn wire_decode(reader: &mut impl Reader) -> Result<Self, Error> {
        let mut buf = [0u8; 32];
        reader.read_bytes(&mut buf)?;
        Ok(Slice32::from(buf))
    }
}

impl WireEncode for Txid {
    fn wire_encode(&self, writer: &mut impl Writer) -> Result<(), Error> {
        writer.write_bytes(&self.to_vec())
    }
    fn wire_decode(reader: &mut impl Reader) -> Result<Self, Error> {
        let mut buf = [0u8; 32];
        reader.read_bytes(&mut buf)?;
        Txid::from_slice(&buf).map_err(|_| Error::InvalidHash)
    }
}
