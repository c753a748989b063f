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

//! On-disk record shapes and the key layout they're filed under. Every
//! record is a plain data snapshot — not the live in-memory type itself —
//! encoded with `strict_encoding` the way the teacher crate persists
//! `channel::Funding` and friends.

use strict_encoding::{StrictDecode, StrictEncode};

use crate::chan::{HtlcDirection, HtlcState};
use crate::court::{ResolverKind, ResolverStage};
use crate::wire::{ChannelId, PaymentHash};

/// Snapshot of a single HTLC log entry, as persisted alongside its channel.
#[derive(Clone, PartialEq, Eq, Debug, StrictEncode, StrictDecode)]
pub struct HtlcRecord {
    pub id: u64,
    pub direction: HtlcDirectionRecord,
    pub amount_msat: u64,
    pub payment_hash: [u8; 32],
    pub cltv_expiry: u32,
    pub state: HtlcStateRecord,
    pub onion_routing_packet: Vec<u8>,
}

/// `strict_encoding` needs a concrete, stable-tagged enum to encode; these
/// mirror [`HtlcDirection`] and [`HtlcState`] one-to-one rather than deriving
/// the encoding on the live types themselves, so the wire format doesn't
/// shift if a variant is ever added to the in-memory enums for reasons that
/// have nothing to do with persistence.
#[derive(Clone, Copy, PartialEq, Eq, Debug, StrictEncode, StrictDecode)]
#[repr(u8)]
pub enum HtlcDirectionRecord {
    Offered = 0,
    Received = 1,
}

impl From<HtlcDirection> for HtlcDirectionRecord {
    fn from(d: HtlcDirection) -> Self {
        match d {
            HtlcDirection::Offered => HtlcDirectionRecord::Offered,
            HtlcDirection::Received => HtlcDirectionRecord::Received,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, StrictEncode, StrictDecode)]
#[repr(u8)]
pub enum HtlcStateRecord {
    PendingAdd = 0,
    Committed = 1,
    PendingRemove = 2,
}

impl From<HtlcState> for HtlcStateRecord {
    fn from(s: HtlcState) -> Self {
        match s {
            HtlcState::PendingAdd => HtlcStateRecord::PendingAdd,
            HtlcState::Committed => HtlcStateRecord::Committed,
            HtlcState::PendingRemove => HtlcStateRecord::PendingRemove,
        }
    }
}

/// Snapshot of everything needed to resume a channel across a restart:
/// commitment numbers, balances and the HTLC log. Revocation secrets are
/// kept in a separate tree (see [`shachain_key`]) since they're written on a
/// different, stricter schedule (the first durability rule, §4.6).
#[derive(Clone, PartialEq, Eq, Debug, StrictEncode, StrictDecode)]
pub struct ChannelRecord {
    pub channel_id: [u8; 32],
    pub funding_txid: [u8; 32],
    pub funding_vout: u32,
    pub local_amount_msat: u64,
    pub remote_amount_msat: u64,
    pub local_commitment_number: u64,
    pub remote_commitment_number: u64,
    pub offered_htlcs: Vec<HtlcRecord>,
    pub received_htlcs: Vec<HtlcRecord>,
}

/// One entry of the receiver-side shachain store, persisted independently of
/// the channel record so a revocation secret can be fsynced on its own
/// before the `revoke_and_ack` that reveals it is sent.
#[derive(Clone, PartialEq, Eq, Debug, StrictEncode, StrictDecode)]
pub struct ShachainRecord {
    pub index: u64,
    pub secret: [u8; 32],
}

/// Snapshot of a single resolver's progress, fsynced before its sweep
/// transaction is broadcast (the second durability rule, §4.6).
#[derive(Clone, PartialEq, Eq, Debug, StrictEncode, StrictDecode)]
pub struct ResolverRecordSnapshot {
    pub kind: ResolverKindRecord,
    pub txid: [u8; 32],
    pub vout: u32,
    pub stage: ResolverStageRecord,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, StrictEncode, StrictDecode)]
#[repr(u8)]
pub enum ResolverKindRecord {
    CommitmentSweep = 0,
    HtlcTimeout = 1,
    HtlcSuccess = 2,
    Justice = 3,
}

impl From<ResolverKind> for ResolverKindRecord {
    fn from(k: ResolverKind) -> Self {
        match k {
            ResolverKind::CommitmentSweep => ResolverKindRecord::CommitmentSweep,
            ResolverKind::HtlcTimeout => ResolverKindRecord::HtlcTimeout,
            ResolverKind::HtlcSuccess => ResolverKindRecord::HtlcSuccess,
            ResolverKind::Justice => ResolverKindRecord::Justice,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, StrictEncode, StrictDecode)]
#[repr(u8)]
pub enum ResolverStageRecord {
    Pending = 0,
    Checkpointed = 1,
    Broadcast = 2,
    Resolved = 3,
}

impl From<ResolverStage> for ResolverStageRecord {
    fn from(s: ResolverStage) -> Self {
        match s {
            ResolverStage::Pending => ResolverStageRecord::Pending,
            ResolverStage::Checkpointed => ResolverStageRecord::Checkpointed,
            ResolverStage::Broadcast => ResolverStageRecord::Broadcast,
            ResolverStage::Resolved => ResolverStageRecord::Resolved,
        }
    }
}

/// Key layout. Every tree is keyed so that a prefix scan over a channel's
/// entries (its HTLCs are all in one `ChannelRecord`, but its resolvers are
/// one entry each) is a single range query.
pub fn channel_key(channel_id: ChannelId) -> [u8; 32] {
    channel_id.0
}

pub fn shachain_key(channel_id: ChannelId, index: u64) -> [u8; 40] {
    let mut key = [0u8; 40];
    key[..32].copy_from_slice(&channel_id.0);
    key[32..].copy_from_slice(&index.to_be_bytes());
    key
}

pub fn resolver_key(channel_id: ChannelId, txid: [u8; 32], vout: u32) -> [u8; 68] {
    let mut key = [0u8; 68];
    key[..32].copy_from_slice(&channel_id.0);
    key[32..64].copy_from_slice(&txid);
    key[64..].copy_from_slice(&vout.to_be_bytes());
    key
}

pub fn payment_key(hash: PaymentHash) -> [u8; 32] {
    hash.0
}
