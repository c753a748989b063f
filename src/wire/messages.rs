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

//! The closed message set of §4.1, one struct per kind, each with an exact
//! wire layout. `Message::encode`/`Message::decode` dispatch on the 2-byte
//! type tag and enforce the odd/even-style unknown-type rule.

use bitcoin::secp256k1::PublicKey;

use super::codec::{BufReader, BufWriter, Reader, Writer, UNKNOWN_TYPE_IGNORE_THRESHOLD};
use super::types::{
    ChannelId, CompactSignature, PaymentHash, PaymentPreimage, ShortChannelId,
    TempChannelId, WireEncode,
};
use super::Error;

/// Type tags as fixed by §4.1. Gossip and query messages are included for
/// completeness of the closed set even though the gossip subsystem proper is
/// an external collaborator (§1).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[repr(u16)]
pub enum MessageType {
    Init = 16,
    Error = 17,
    Ping = 18,
    Pong = 19,
    OpenChannel = 32,
    AcceptChannel = 33,
    FundingCreated = 34,
    FundingSigned = 35,
    FundingLocked = 36,
    Shutdown = 38,
    ClosingSigned = 39,
    UpdateAddHtlc = 128,
    UpdateFulfillHtlc = 130,
    UpdateFailHtlc = 131,
    CommitmentSigned = 132,
    RevokeAndAck = 133,
    UpdateFee = 134,
    UpdateFailMalformedHtlc = 135,
    ChannelReestablish = 136,
    ChannelAnnouncement = 256,
    NodeAnnouncement = 257,
    ChannelUpdate = 258,
    AnnouncementSignatures = 259,
}

impl MessageType {
    fn from_tag(tag: u16) -> Option<Self> {
        use MessageType::*;
        Some(match tag {
            16 => Init,
            17 => Error,
            18 => Ping,
            19 => Pong,
            32 => OpenChannel,
            33 => AcceptChannel,
            34 => FundingCreated,
            35 => FundingSigned,
            36 => FundingLocked,
            38 => Shutdown,
            39 => ClosingSigned,
            128 => UpdateAddHtlc,
            130 => UpdateFulfillHtlc,
            131 => UpdateFailHtlc,
            132 => CommitmentSigned,
            133 => RevokeAndAck,
            134 => UpdateFee,
            135 => UpdateFailMalformedHtlc,
            136 => ChannelReestablish,
            256 => ChannelAnnouncement,
            257 => NodeAnnouncement,
            258 => ChannelUpdate,
            259 => AnnouncementSignatures,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Init {
    pub global_features: Vec<u8>,
    pub local_features: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ErrorMessage {
    pub channel_id: ChannelId,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ping {
    pub num_pong_bytes: u16,
    pub ignored: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pong {
    pub ignored: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OpenChannel {
    pub chain_hash: [u8; 32],
    pub temporary_channel_id: TempChannelId,
    pub funding_satoshis: u64,
    pub push_msat: u64,
    pub dust_limit_satoshis: u64,
    pub max_htlc_value_in_flight_msat: u64,
    pub channel_reserve_satoshis: u64,
    pub htlc_minimum_msat: u64,
    pub feerate_per_kw: u32,
    pub to_self_delay: u16,
    pub max_accepted_htlcs: u16,
    pub funding_pubkey: PublicKey,
    pub revocation_basepoint: PublicKey,
    pub payment_basepoint: PublicKey,
    pub delayed_payment_basepoint: PublicKey,
    pub htlc_basepoint: PublicKey,
    pub first_per_commitment_point: PublicKey,
    pub channel_flags: u8,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AcceptChannel {
    pub temporary_channel_id: TempChannelId,
    pub dust_limit_satoshis: u64,
    pub max_htlc_value_in_flight_msat: u64,
    pub channel_reserve_satoshis: u64,
    pub htlc_minimum_msat: u64,
    pub minimum_depth: u32,
    pub to_self_delay: u16,
    pub max_accepted_htlcs: u16,
    pub funding_pubkey: PublicKey,
    pub revocation_basepoint: PublicKey,
    pub payment_basepoint: PublicKey,
    pub delayed_payment_basepoint: PublicKey,
    pub htlc_basepoint: PublicKey,
    pub first_per_commitment_point: PublicKey,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FundingCreated {
    pub temporary_channel_id: TempChannelId,
    pub funding_txid: [u8; 32],
    pub funding_output_index: u16,
    pub signature: CompactSignature,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FundingSigned {
    pub channel_id: ChannelId,
    pub signature: CompactSignature,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FundingLocked {
    pub channel_id: ChannelId,
    pub next_per_commitment_point: PublicKey,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Shutdown {
    pub channel_id: ChannelId,
    pub scriptpubkey: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClosingSigned {
    pub channel_id: ChannelId,
    pub fee_satoshis: u64,
    pub signature: CompactSignature,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateAddHtlc {
    pub channel_id: ChannelId,
    pub htlc_id: u64,
    pub amount_msat: u64,
    pub payment_hash: PaymentHash,
    pub cltv_expiry: u32,
    pub onion_routing_packet: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateFulfillHtlc {
    pub channel_id: ChannelId,
    pub htlc_id: u64,
    pub payment_preimage: PaymentPreimage,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateFailHtlc {
    pub channel_id: ChannelId,
    pub htlc_id: u64,
    pub reason: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateFailMalformedHtlc {
    pub channel_id: ChannelId,
    pub htlc_id: u64,
    pub sha256_of_onion: [u8; 32],
    pub failure_code: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CommitmentSigned {
    pub channel_id: ChannelId,
    pub signature: CompactSignature,
    pub htlc_signatures: Vec<CompactSignature>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RevokeAndAck {
    pub channel_id: ChannelId,
    pub per_commitment_secret: [u8; 32],
    pub next_per_commitment_point: PublicKey,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateFee {
    pub channel_id: ChannelId,
    pub feerate_per_kw: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChannelReestablish {
    pub channel_id: ChannelId,
    pub next_local_commitment_number: u64,
    pub next_remote_revocation_number: u64,
    pub your_last_per_commitment_secret: [u8; 32],
    pub my_current_per_commitment_point: PublicKey,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChannelAnnouncement {
    pub node_signature_1: CompactSignature,
    pub node_signature_2: CompactSignature,
    pub bitcoin_signature_1: CompactSignature,
    pub bitcoin_signature_2: CompactSignature,
    pub chain_hash: [u8; 32],
    pub short_channel_id: ShortChannelId,
    pub node_id_1: PublicKey,
    pub node_id_2: PublicKey,
    pub bitcoin_key_1: PublicKey,
    pub bitcoin_key_2: PublicKey,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeAnnouncement {
    pub signature: CompactSignature,
    pub timestamp: u32,
    pub node_id: PublicKey,
    pub rgb_color: [u8; 3],
    pub alias: [u8; 32],
    pub addresses: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChannelUpdate {
    pub signature: CompactSignature,
    pub chain_hash: [u8; 32],
    pub short_channel_id: ShortChannelId,
    pub timestamp: u32,
    pub message_flags: u8,
    pub channel_flags: u8,
    pub cltv_expiry_delta: u16,
    pub htlc_minimum_msat: u64,
    pub fee_base_msat: u32,
    pub fee_proportional_millionths: u32,
    pub htlc_maximum_msat: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnnouncementSignatures {
    pub channel_id: ChannelId,
    pub short_channel_id: ShortChannelId,
    pub node_signature: CompactSignature,
    pub bitcoin_signature: CompactSignature,
}

/// The closed set of protocol messages. Unknown type tags are not
/// representable as a `Message` at all: [`Message::decode`] either resolves
/// one of these variants or fails, per the odd/even-style rule enforced at
/// the tag level before any payload parsing begins.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Init(Init),
    Error(ErrorMessage),
    Ping(Ping),
    Pong(Pong),
    OpenChannel(OpenChannel),
    AcceptChannel(AcceptChannel),
    FundingCreated(FundingCreated),
    FundingSigned(FundingSigned),
    FundingLocked(FundingLocked),
    Shutdown(Shutdown),
    ClosingSigned(ClosingSigned),
    UpdateAddHtlc(UpdateAddHtlc),
    UpdateFulfillHtlc(UpdateFulfillHtlc),
    UpdateFailHtlc(UpdateFailHtlc),
    UpdateFailMalformedHtlc(UpdateFailMalformedHtlc),
    CommitmentSigned(CommitmentSigned),
    RevokeAndAck(RevokeAndAck),
    UpdateFee(UpdateFee),
    ChannelReestablish(ChannelReestablish),
    ChannelAnnouncement(ChannelAnnouncement),
    NodeAnnouncement(NodeAnnouncement),
    ChannelUpdate(ChannelUpdate),
    AnnouncementSignatures(AnnouncementSignatures),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        use MessageType as T;
        match self {
            Message::Init(_) => T::Init,
            Message::Error(_) => T::Error,
            Message::Ping(_) => T::Ping,
            Message::Pong(_) => T::Pong,
            Message::OpenChannel(_) => T::OpenChannel,
            Message::AcceptChannel(_) => T::AcceptChannel,
            Message::FundingCreated(_) => T::FundingCreated,
            Message::FundingSigned(_) => T::FundingSigned,
            Message::FundingLocked(_) => T::FundingLocked,
            Message::Shutdown(_) => T::Shutdown,
            Message::ClosingSigned(_) => T::ClosingSigned,
            Message::UpdateAddHtlc(_) => T::UpdateAddHtlc,
            Message::UpdateFulfillHtlc(_) => T::UpdateFulfillHtlc,
            Message::UpdateFailHtlc(_) => T::UpdateFailHtlc,
            Message::UpdateFailMalformedHtlc(_) => T::UpdateFailMalformedHtlc,
            Message::CommitmentSigned(_) => T::CommitmentSigned,
            Message::RevokeAndAck(_) => T::RevokeAndAck,
            Message::UpdateFee(_) => T::UpdateFee,
            Message::ChannelReestablish(_) => T::ChannelReestablish,
            Message::ChannelAnnouncement(_) => T::ChannelAnnouncement,
            Message::NodeAnnouncement(_) => T::NodeAnnouncement,
            Message::ChannelUpdate(_) => T::ChannelUpdate,
            Message::AnnouncementSignatures(_) => T::AnnouncementSignatures,
        }
    }

    /// Encodes the full wire frame (length + type tag + payload).
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let mut w = BufWriter::default();
        match self {
            Message::Init(m) => {
                w.write_var_bytes(&m.global_features)?;
                w.write_var_bytes(&m.local_features)?;
            }
            Message::Error(m) => {
                m.channel_id.wire_encode(&mut w)?;
                w.write_var_bytes(&m.data)?;
            }
            Message::Ping(m) => {
                w.write_u16(m.num_pong_bytes)?;
                w.write_var_bytes(&m.ignored)?;
            }
            Message::Pong(m) => w.write_var_bytes(&m.ignored)?,
            Message::OpenChannel(m) => encode_open_channel(&mut w, m)?,
            Message::AcceptChannel(m) => encode_accept_channel(&mut w, m)?,
            Message::FundingCreated(m) => {
                m.temporary_channel_id.wire_encode(&mut w)?;
                w.write_bytes(&m.funding_txid)?;
                w.write_u16(m.funding_output_index)?;
                m.signature.wire_encode(&mut w)?;
            }
            Message::FundingSigned(m) => {
                m.channel_id.wire_encode(&mut w)?;
                m.signature.wire_encode(&mut w)?;
            }
            Message::FundingLocked(m) => {
                m.channel_id.wire_encode(&mut w)?;
                m.next_per_commitment_point.wire_encode(&mut w)?;
            }
            Message::Shutdown(m) => {
                m.channel_id.wire_encode(&mut w)?;
                w.write_var_bytes(&m.scriptpubkey)?;
            }
            Message::ClosingSigned(m) => {
                m.channel_id.wire_encode(&mut w)?;
                w.write_u64(m.fee_satoshis)?;
                m.signature.wire_encode(&mut w)?;
            }
            Message::UpdateAddHtlc(m) => {
                m.channel_id.wire_encode(&mut w)?;
                w.write_u64(m.htlc_id)?;
                w.write_u64(m.amount_msat)?;
                m.payment_hash.wire_encode(&mut w)?;
                w.write_u32(m.cltv_expiry)?;
                w.write_bytes(&m.onion_routing_packet)?;
            }
            Message::UpdateFulfillHtlc(m) => {
                m.channel_id.wire_encode(&mut w)?;
                w.write_u64(m.htlc_id)?;
                m.payment_preimage.wire_encode(&mut w)?;
            }
            Message::UpdateFailHtlc(m) => {
                m.channel_id.wire_encode(&mut w)?;
                w.write_u64(m.htlc_id)?;
                w.write_var_bytes(&m.reason)?;
            }
            Message::UpdateFailMalformedHtlc(m) => {
                m.channel_id.wire_encode(&mut w)?;
                w.write_u64(m.htlc_id)?;
                w.write_bytes(&m.sha256_of_onion)?;
                w.write_u16(m.failure_code)?;
            }
            Message::CommitmentSigned(m) => {
                m.channel_id.wire_encode(&mut w)?;
                m.signature.wire_encode(&mut w)?;
                w.write_u16(m.htlc_signatures.len() as u16)?;
                for sig in &m.htlc_signatures {
                    sig.wire_encode(&mut w)?;
                }
            }
            Message::RevokeAndAck(m) => {
                m.channel_id.wire_encode(&mut w)?;
                w.write_bytes(&m.per_commitment_secret)?;
                m.next_per_commitment_point.wire_encode(&mut w)?;
            }
            Message::UpdateFee(m) => {
                m.channel_id.wire_encode(&mut w)?;
                w.write_u32(m.feerate_per_kw)?;
            }
            Message::ChannelReestablish(m) => {
                m.channel_id.wire_encode(&mut w)?;
                w.write_u64(m.next_local_commitment_number)?;
                w.write_u64(m.next_remote_revocation_number)?;
                w.write_bytes(&m.your_last_per_commitment_secret)?;
                m.my_current_per_commitment_point.wire_encode(&mut w)?;
            }
            Message::ChannelAnnouncement(m) => {
                m.node_signature_1.wire_encode(&mut w)?;
                m.node_signature_2.wire_encode(&mut w)?;
                m.bitcoin_signature_1.wire_encode(&mut w)?;
                m.bitcoin_signature_2.wire_encode(&mut w)?;
                w.write_bytes(&m.chain_hash)?;
                m.short_channel_id.wire_encode(&mut w)?;
                m.node_id_1.wire_encode(&mut w)?;
                m.node_id_2.wire_encode(&mut w)?;
                m.bitcoin_key_1.wire_encode(&mut w)?;
                m.bitcoin_key_2.wire_encode(&mut w)?;
            }
            Message::NodeAnnouncement(m) => {
                m.signature.wire_encode(&mut w)?;
                w.write_u32(m.timestamp)?;
                m.node_id.wire_encode(&mut w)?;
                w.write_bytes(&m.rgb_color)?;
                w.write_bytes(&m.alias)?;
                w.write_var_bytes(&m.addresses)?;
            }
            Message::ChannelUpdate(m) => {
                m.signature.wire_encode(&mut w)?;
                w.write_bytes(&m.chain_hash)?;
                m.short_channel_id.wire_encode(&mut w)?;
                w.write_u32(m.timestamp)?;
                w.write_u8(m.message_flags)?;
                w.write_u8(m.channel_flags)?;
                w.write_u16(m.cltv_expiry_delta)?;
                w.write_u64(m.htlc_minimum_msat)?;
                w.write_u32(m.fee_base_msat)?;
                w.write_u32(m.fee_proportional_millionths)?;
                w.write_u64(m.htlc_maximum_msat)?;
            }
            Message::AnnouncementSignatures(m) => {
                m.channel_id.wire_encode(&mut w)?;
                m.short_channel_id.wire_encode(&mut w)?;
                m.node_signature.wire_encode(&mut w)?;
                m.bitcoin_signature.wire_encode(&mut w)?;
            }
        }
        super::codec::frame(self.message_type() as u16, &w.0)
    }

    /// Decodes a full wire frame. Returns `Error::UnknownFatalType` for a tag
    /// below [`UNKNOWN_TYPE_IGNORE_THRESHOLD`] that isn't in the closed set;
    /// callers should treat a tag at or above the threshold as a silent skip
    /// rather than calling `decode` at all (the caller inspects the raw tag
    /// first; see `link` module).
    pub fn decode(frame: &[u8]) -> Result<Self, Error> {
        let (tag, payload) = super::codec::unframe(frame)?;
        let kind = match MessageType::from_tag(tag) {
            Some(k) => k,
            None if tag < UNKNOWN_TYPE_IGNORE_THRESHOLD => {
                return Err(Error::UnknownFatalType(tag))
            }
            None => return Err(Error::UnknownFatalType(tag)),
        };
        let mut r = BufReader::new(payload);
        let msg = decode_body(kind, &mut r)?;
        if r.remaining() != 0 {
            return Err(Error::TrailingBytes(r.remaining()));
        }
        Ok(msg)
    }
}

fn decode_body(kind: MessageType, r: &mut BufReader) -> Result<Message, Error> {
    use MessageType as T;
    Ok(match kind {
        T::Init => Message::Init(Init {
            global_features: r.read_var_bytes()?,
            local_features: r.read_var_bytes()?,
        }),
        T::Error => Message::Error(ErrorMessage {
            channel_id: ChannelId::wire_decode(r)?,
            data: r.read_var_bytes()?,
        }),
        T::Ping => {
            let num_pong_bytes = r.read_u16()?;
            Message::Ping(Ping {
                num_pong_bytes,
                ignored: r.read_var_bytes()?,
            })
        }
        T::Pong => Message::Pong(Pong {
            ignored: r.read_var_bytes()?,
        }),
        T::OpenChannel => Message::OpenChannel(decode_open_channel(r)?),
        T::AcceptChannel => Message::AcceptChannel(decode_accept_channel(r)?),
        T::FundingCreated => {
            let temporary_channel_id = TempChannelId::wire_decode(r)?;
            let mut funding_txid = [0u8; 32];
            r.read_bytes(&mut funding_txid)?;
            let funding_output_index = r.read_u16()?;
            let signature = CompactSignature::wire_decode(r)?;
            Message::FundingCreated(FundingCreated {
                temporary_channel_id,
                funding_txid,
                funding_output_index,
                signature,
            })
        }
        T::FundingSigned => Message::FundingSigned(FundingSigned {
            channel_id: ChannelId::wire_decode(r)?,
            signature: CompactSignature::wire_decode(r)?,
        }),
        T::FundingLocked => Message::FundingLocked(FundingLocked {
            channel_id: ChannelId::wire_decode(r)?,
            next_per_commitment_point: PublicKey::wire_decode(r)?,
        }),
        T::Shutdown => Message::Shutdown(Shutdown {
            channel_id: ChannelId::wire_decode(r)?,
            scriptpubkey: r.read_var_bytes()?,
        }),
        T::ClosingSigned => Message::ClosingSigned(ClosingSigned {
            channel_id: ChannelId::wire_decode(r)?,
            fee_satoshis: r.read_u64()?,
            signature: CompactSignature::wire_decode(r)?,
        }),
        T::UpdateAddHtlc => {
            let channel_id = ChannelId::wire_decode(r)?;
            let htlc_id = r.read_u64()?;
            let amount_msat = r.read_u64()?;
            let payment_hash = PaymentHash::wire_decode(r)?;
            let cltv_expiry = r.read_u32()?;
            let mut onion = vec![0u8; r.remaining()];
            r.read_bytes(&mut onion)?;
            Message::UpdateAddHtlc(UpdateAddHtlc {
                channel_id,
                htlc_id,
                amount_msat,
                payment_hash,
                cltv_expiry,
                onion_routing_packet: onion,
            })
        }
        T::UpdateFulfillHtlc => Message::UpdateFulfillHtlc(UpdateFulfillHtlc {
            channel_id: ChannelId::wire_decode(r)?,
            htlc_id: r.read_u64()?,
            payment_preimage: PaymentPreimage::wire_decode(r)?,
        }),
        T::UpdateFailHtlc => Message::UpdateFailHtlc(UpdateFailHtlc {
            channel_id: ChannelId::wire_decode(r)?,
            htlc_id: r.read_u64()?,
            reason: r.read_var_bytes()?,
        }),
        T::UpdateFailMalformedHtlc => {
            let channel_id = ChannelId::wire_decode(r)?;
            let htlc_id = r.read_u64()?;
            let mut sha256_of_onion = [0u8; 32];
            r.read_bytes(&mut sha256_of_onion)?;
            let failure_code = r.read_u16()?;
            Message::UpdateFailMalformedHtlc(UpdateFailMalformedHtlc {
                channel_id,
                htlc_id,
                sha256_of_onion,
                failure_code,
            })
        }
        T::CommitmentSigned => {
            let channel_id = ChannelId::wire_decode(r)?;
            let signature = CompactSignature::wire_decode(r)?;
            let count = r.read_u16()?;
            let mut htlc_signatures = Vec::with_capacity(count as usize);
            for _ in 0..count {
                htlc_signatures.push(CompactSignature::wire_decode(r)?);
            }
            Message::CommitmentSigned(CommitmentSigned {
                channel_id,
                signature,
                htlc_signatures,
            })
        }
        T::RevokeAndAck => {
            let channel_id = ChannelId::wire_decode(r)?;
            let mut per_commitment_secret = [0u8; 32];
            r.read_bytes(&mut per_commitment_secret)?;
            let next_per_commitment_point = PublicKey::wire_decode(r)?;
            Message::RevokeAndAck(RevokeAndAck {
                channel_id,
                per_commitment_secret,
                next_per_commitment_point,
            })
        }
        T::UpdateFee => Message::UpdateFee(UpdateFee {
            channel_id: ChannelId::wire_decode(r)?,
            feerate_per_kw: r.read_u32()?,
        }),
        T::ChannelReestablish => {
            let channel_id = ChannelId::wire_decode(r)?;
            let next_local_commitment_number = r.read_u64()?;
            let next_remote_revocation_number = r.read_u64()?;
            let mut your_last_per_commitment_secret = [0u8; 32];
            r.read_bytes(&mut your_last_per_commitment_secret)?;
            let my_current_per_commitment_point = PublicKey::wire_decode(r)?;
            Message::ChannelReestablish(ChannelReestablish {
                channel_id,
                next_local_commitment_number,
                next_remote_revocation_number,
                your_last_per_commitment_secret,
                my_current_per_commitment_point,
            })
        }
        T::ChannelAnnouncement => {
            let node_signature_1 = CompactSignature::wire_decode(r)?;
            let node_signature_2 = CompactSignature::wire_decode(r)?;
            let bitcoin_signature_1 = CompactSignature::wire_decode(r)?;
            let bitcoin_signature_2 = CompactSignature::wire_decode(r)?;
            let mut chain_hash = [0u8; 32];
            r.read_bytes(&mut chain_hash)?;
            let short_channel_id = ShortChannelId::wire_decode(r)?;
            let node_id_1 = PublicKey::wire_decode(r)?;
            let node_id_2 = PublicKey::wire_decode(r)?;
            let bitcoin_key_1 = PublicKey::wire_decode(r)?;
            let bitcoin_key_2 = PublicKey::wire_decode(r)?;
            Message::ChannelAnnouncement(ChannelAnnouncement {
                node_signature_1,
                node_signature_2,
                bitcoin_signature_1,
                bitcoin_signature_2,
                chain_hash,
                short_channel_id,
                node_id_1,
                node_id_2,
                bitcoin_key_1,
                bitcoin_key_2,
            })
        }
        T::NodeAnnouncement => {
            let signature = CompactSignature::wire_decode(r)?;
            let timestamp = r.read_u32()?;
            let node_id = PublicKey::wire_decode(r)?;
            let mut rgb_color = [0u8; 3];
            r.read_bytes(&mut rgb_color)?;
            let mut alias = [0u8; 32];
            r.read_bytes(&mut alias)?;
            let addresses = r.read_var_bytes()?;
            Message::NodeAnnouncement(NodeAnnouncement {
                signature,
                timestamp,
                node_id,
                rgb_color,
                alias,
                addresses,
            })
        }
        T::ChannelUpdate => Message::ChannelUpdate(ChannelUpdate {
            signature: CompactSignature::wire_decode(r)?,
            chain_hash: {
                let mut b = [0u8; 32];
                r.read_bytes(&mut b)?;
                b
            },
            short_channel_id: ShortChannelId::wire_decode(r)?,
            timestamp: r.read_u32()?,
            message_flags: r.read_u8()?,
            channel_flags: r.read_u8()?,
            cltv_expiry_delta: r.read_u16()?,
            htlc_minimum_msat: r.read_u64()?,
            fee_base_msat: r.read_u32()?,
            fee_proportional_millionths: r.read_u32()?,
            htlc_maximum_msat: r.read_u64()?,
        }),
        T::AnnouncementSignatures => Message::AnnouncementSignatures(AnnouncementSignatures {
            channel_id: ChannelId::wire_decode(r)?,
            short_channel_id: ShortChannelId::wire_decode(r)?,
            node_signature: CompactSignature::wire_decode(r)?,
            bitcoin_signature: CompactSignature::wire_decode(r)?,
        }),
    })
}

fn encode_open_channel(w: &mut BufWriter, m: &OpenChannel) -> Result<(), Error> {
    w.write_bytes(&m.chain_hash)?;
    m.temporary_channel_id.wire_encode(w)?;
    w.write_u64(m.funding_satoshis)?;
    w.write_u64(m.push_msat)?;
    w.write_u64(m.dust_limit_satoshis)?;
    w.write_u64(m.max_htlc_value_in_flight_msat)?;
    w.write_u64(m.channel_reserve_satoshis)?;
    w.write_u64(m.htlc_minimum_msat)?;
    w.write_u32(m.feerate_per_kw)?;
    w.write_u16(m.to_self_delay)?;
    w.write_u16(m.max_accepted_htlcs)?;
    m.funding_pubkey.wire_encode(w)?;
    m.revocation_basepoint.wire_encode(w)?;
    m.payment_basepoint.wire_encode(w)?;
    m.delayed_payment_basepoint.wire_encode(w)?;
    m.htlc_basepoint.wire_encode(w)?;
    m.first_per_commitment_point.wire_encode(w)?;
    w.write_u8(m.channel_flags)
}

fn decode_open_channel(r: &mut BufReader) -> Result<OpenChannel, Error> {
    let mut chain_hash = [0u8; 32];
    r.read_bytes(&mut chain_hash)?;
    Ok(OpenChannel {
        chain_hash,
        temporary_channel_id: TempChannelId::wire_decode(r)?,
        funding_satoshis: r.read_u64()?,
        push_msat: r.read_u64()?,
        dust_limit_satoshis: r.read_u64()?,
        max_htlc_value_in_flight_msat: r.read_u64()?,
        channel_reserve_satoshis: r.read_u64()?,
        htlc_minimum_msat: r.read_u64()?,
        feerate_per_kw: r.read_u32()?,
        to_self_delay: r.read_u16()?,
        max_accepted_htlcs: r.read_u16()?,
        funding_pubkey: PublicKey::wire_decode(r)?,
        revocation_basepoint: PublicKey::wire_decode(r)?,
        payment_basepoint: PublicKey::wire_decode(r)?,
        delayed_payment_basepoint: PublicKey::wire_decode(r)?,
        htlc_basepoint: PublicKey::wire_decode(r)?,
        first_per_commitment_point: PublicKey::wire_decode(r)?,
        channel_flags: r.read_u8()?,
    })
}

fn encode_accept_channel(w: &mut BufWriter, m: &AcceptChannel) -> Result<(), Error> {
    m.temporary_channel_id.wire_encode(w)?;
    w.write_u64(m.dust_limit_satoshis)?;
    w.write_u64(m.max_htlc_value_in_flight_msat)?;
    w.write_u64(m.channel_reserve_satoshis)?;
    w.write_u64(m.htlc_minimum_msat)?;
    w.write_u32(m.minimum_depth)?;
    w.write_u16(m.to_self_delay)?;
    w.write_u16(m.max_accepted_htlcs)?;
    m.funding_pubkey.wire_encode(w)?;
    m.revocation_basepoint.wire_encode(w)?;
    m.payment_basepoint.wire_encode(w)?;
    m.delayed_payment_basepoint.wire_encode(w)?;
    m.htlc_basepoint.wire_encode(w)?;
    m.first_per_commitment_point.wire_encode(w)
}

fn decode_accept_channel(r: &mut BufReader) -> Result<AcceptChannel, Error> {
    Ok(AcceptChannel {
        temporary_channel_id: TempChannelId::wire_decode(r)?,
        dust_limit_satoshis: r.read_u64()?,
        max_htlc_value_in_flight_msat: r.read_u64()?,
        channel_reserve_satoshis: r.read_u64()?,
        htlc_minimum_msat: r.read_u64()?,
        minimum_depth: r.read_u32()?,
        to_self_delay: r.read_u16()?,
        max_accepted_htlcs: r.read_u16()?,
        funding_pubkey: PublicKey::wire_decode(r)?,
        revocation_basepoint: PublicKey::wire_decode(r)?,
        payment_basepoint: PublicKey::wire_decode(r)?,
        delayed_payment_basepoint: PublicKey::wire_decode(r)?,
        htlc_basepoint: PublicKey::wire_decode(r)?,
        first_per_commitment_point: PublicKey::wire_decode(r)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dumb_pubkey() -> PublicKey {
        use bitcoin::secp256k1::{Secp256k1, SecretKey};
        PublicKey::from_secret_key(&Secp256k1::new(), &SecretKey::from_slice(&[1u8; 32]).unwrap())
    }

    #[test]
    fn ping_pong_round_trip() {
        let msg = Message::Ping(Ping {
            num_pong_bytes: 42,
            ignored: vec![0u8; 10],
        });
        let frame = msg.encode().unwrap();
        let decoded = Message::decode(&frame).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn update_add_htlc_round_trip() {
        let msg = Message::UpdateAddHtlc(UpdateAddHtlc {
            channel_id: ChannelId([7u8; 32]),
            htlc_id: 9,
            amount_msat: 100_000,
            payment_hash: PaymentHash([3u8; 32]),
            cltv_expiry: 500_144,
            onion_routing_packet: vec![0xaa; 1366],
        });
        let frame = msg.encode().unwrap();
        let decoded = Message::decode(&frame).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn open_channel_round_trip() {
        let msg = Message::OpenChannel(OpenChannel {
            chain_hash: [0u8; 32],
            temporary_channel_id: TempChannelId([1u8; 32]),
            funding_satoshis: 1_000_000,
            push_msat: 0,
            dust_limit_satoshis: 354,
            max_htlc_value_in_flight_msat: 1_000_000_000,
            channel_reserve_satoshis: 10_000,
            htlc_minimum_msat: 1,
            feerate_per_kw: 253,
            to_self_delay: 144,
            max_accepted_htlcs: 30,
            funding_pubkey: dumb_pubkey(),
            revocation_basepoint: dumb_pubkey(),
            payment_basepoint: dumb_pubkey(),
            delayed_payment_basepoint: dumb_pubkey(),
            htlc_basepoint: dumb_pubkey(),
            first_per_commitment_point: dumb_pubkey(),
            channel_flags: 1,
        });
        let frame = msg.encode().unwrap();
        let decoded = Message::decode(&frame).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn unknown_mandatory_type_is_fatal() {
        let frame = super::super::codec::frame(20, &[]).unwrap();
        assert!(matches!(
            Message::decode(&frame),
            Err(Error::UnknownFatalType(20))
        ));
    }

    #[test]
    fn payload_over_max_size_is_rejected() {
        let mut w = BufWriter::default();
        let big = vec![0u8; super::super::codec::MAX_PAYLOAD_SIZE];
        assert!(w.write_bytes(&big).is_err());
    }
}
