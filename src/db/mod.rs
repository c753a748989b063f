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

//! C6: the channel database. A durable KV store (`sled`) holding everything
//! a restart needs to resume a channel without re-negotiating it, under two
//! consistency rules that the rest of the node depends on:
//!
//! 1. a revocation secret is fsynced to disk *before* the `revoke_and_ack`
//!    that reveals it is handed to the wire — otherwise a crash between the
//!    two could let the remote later prove we broadcast a revoked state we
//!    have no record of being able to punish.
//! 2. a resolver's progress is fsynced *before* its sweep transaction is
//!    broadcast — otherwise a crash after broadcast could lose track of an
//!    output the court would then fail to chase to confirmation.
//!
//! Both rules are enforced here by ordering: the methods that cross each
//! boundary take the write to disk as an argument and only return
//! afterward, so a caller physically cannot broadcast or reveal first.

pub mod schema;

use std::path::Path;

use strict_encoding::{strict_deserialize, strict_serialize};

use crate::chan::channel::Channel;
use crate::chan::htlc::Htlc;
use crate::court::resolver::ResolverRecord;
use crate::wire::{ChannelId, PaymentHash};

use schema::{
    channel_key, payment_key, resolver_key, shachain_key, ChannelRecord, HtlcRecord,
    ResolverRecordSnapshot, ShachainRecord,
};

#[derive(Clone, Eq, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum Error {
    /// underlying storage error: {0}
    #[from]
    Sled(SledErrorDisplay),

    /// record encoding error: {0}
    #[from]
    Encoding(strict_encoding::Error),

    /// no channel record found for channel id {0}
    ChannelNotFound(ChannelId),

    /// no secret stored at shachain index {0} for channel {1}
    ShachainSecretNotFound(u64, ChannelId),
}

/// `sled::Error` doesn't implement the trait bounds our aggregated `Error`
/// needs (`Eq`, in particular); store its rendered message instead of the
/// error itself, the way a boundary crossing an external library's error
/// type usually has to.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct SledErrorDisplay(pub String);

impl std::fmt::Display for SledErrorDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<sled::Error> for SledErrorDisplay {
    fn from(e: sled::Error) -> Self {
        SledErrorDisplay(e.to_string())
    }
}

fn sled_err(e: sled::Error) -> Error {
    Error::Sled(SledErrorDisplay::from(e))
}

/// The channel database. One `sled::Db` with four trees: channel snapshots,
/// shachain secrets, resolver progress and resolved-payment outcomes.
pub struct ChannelDb {
    channels: sled::Tree,
    shachain: sled::Tree,
    resolvers: sled::Tree,
    payments: sled::Tree,
}

impl ChannelDb {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let db = sled::open(path).map_err(sled_err)?;
        Ok(ChannelDb {
            channels: db.open_tree("channels").map_err(sled_err)?,
            shachain: db.open_tree("shachain").map_err(sled_err)?,
            resolvers: db.open_tree("resolvers").map_err(sled_err)?,
            payments: db.open_tree("payments").map_err(sled_err)?,
        })
    }

    /// Persists a channel's resumable state. Called after every commitment
    /// round completes, never mid-round.
    pub fn store_channel(&self, channel_id: ChannelId, channel: &Channel) -> Result<(), Error> {
        let record = ChannelRecord {
            channel_id: channel_id.0,
            funding_txid: channel.funding_outpoint.txid.to_vec().try_into().unwrap_or([0u8; 32]),
            funding_vout: channel.funding_outpoint.vout,
            local_amount_msat: channel.local_amount_msat,
            remote_amount_msat: channel.remote_amount_msat,
            local_commitment_number: channel.local_commitment_number(),
            remote_commitment_number: channel.remote_commitment_number(),
            offered_htlcs: channel.offered_htlcs().values().map(htlc_record).collect(),
            received_htlcs: channel.received_htlcs().values().map(htlc_record).collect(),
        };
        let bytes = strict_serialize(&record).map_err(Error::Encoding)?;
        self.channels
            .insert(channel_key(channel_id).as_slice(), bytes)
            .map_err(sled_err)?;
        self.channels.flush().map_err(sled_err)?;
        Ok(())
    }

    pub fn load_channel(&self, channel_id: ChannelId) -> Result<ChannelRecord, Error> {
        let bytes = self
            .channels
            .get(channel_key(channel_id).as_slice())
            .map_err(sled_err)?
            .ok_or(Error::ChannelNotFound(channel_id))?;
        strict_deserialize(bytes.as_ref() as &[u8]).map_err(Error::Encoding)
    }

    /// Durability rule 1: writes a revocation secret to disk and fsyncs
    /// before returning, so the caller can only send `revoke_and_ack` after
    /// this call has completed.
    pub fn persist_revocation_secret(
        &self,
        channel_id: ChannelId,
        index: u64,
        secret: [u8; 32],
    ) -> Result<(), Error> {
        let record = ShachainRecord { index, secret };
        let bytes = strict_serialize(&record).map_err(Error::Encoding)?;
        self.shachain
            .insert(shachain_key(channel_id, index).as_slice(), bytes)
            .map_err(sled_err)?;
        self.shachain.flush().map_err(sled_err)?;
        Ok(())
    }

    pub fn load_revocation_secret(
        &self,
        channel_id: ChannelId,
        index: u64,
    ) -> Result<[u8; 32], Error> {
        let bytes = self
            .shachain
            .get(shachain_key(channel_id, index).as_slice())
            .map_err(sled_err)?
            .ok_or(Error::ShachainSecretNotFound(index, channel_id))?;
        let record: ShachainRecord =
            strict_deserialize(bytes.as_ref() as &[u8]).map_err(Error::Encoding)?;
        Ok(record.secret)
    }

    /// Durability rule 2: writes a resolver's progress to disk and fsyncs
    /// before returning, so the caller can only broadcast the resolver's
    /// sweep transaction after this call has completed.
    pub fn checkpoint_resolver(
        &self,
        channel_id: ChannelId,
        record: &ResolverRecord,
    ) -> Result<(), Error> {
        let txid = record.outpoint.txid.to_vec().try_into().unwrap_or([0u8; 32]);
        let snapshot = ResolverRecordSnapshot {
            kind: record.kind.into(),
            txid,
            vout: record.outpoint.vout,
            stage: record.stage.into(),
        };
        let bytes = strict_serialize(&snapshot).map_err(Error::Encoding)?;
        self.resolvers
            .insert(resolver_key(channel_id, txid, record.outpoint.vout).as_slice(), bytes)
            .map_err(sled_err)?;
        self.resolvers.flush().map_err(sled_err)?;
        Ok(())
    }

    pub fn mark_payment_resolved(&self, hash: PaymentHash, settled: bool) -> Result<(), Error> {
        self.payments
            .insert(payment_key(hash).as_slice(), &[settled as u8])
            .map_err(sled_err)?;
        self.payments.flush().map_err(sled_err)?;
        Ok(())
    }

    pub fn payment_resolution(&self, hash: PaymentHash) -> Result<Option<bool>, Error> {
        Ok(self
            .payments
            .get(payment_key(hash).as_slice())
            .map_err(sled_err)?
            .map(|v| v[0] != 0))
    }
}

fn htlc_record(htlc: &Htlc) -> HtlcRecord {
    HtlcRecord {
        id: htlc.id,
        direction: htlc.direction.into(),
        amount_msat: htlc.amount_msat,
        payment_hash: htlc.payment_hash.0,
        cltv_expiry: htlc.cltv_expiry,
        state: htlc.state.into(),
        onion_routing_packet: htlc.onion_routing_packet.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::PaymentHash as WirePaymentHash;

    #[test]
    fn revocation_secret_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let db = ChannelDb::open(dir.path()).unwrap();
        let channel_id = ChannelId([7u8; 32]);
        db.persist_revocation_secret(channel_id, 0, [9u8; 32]).unwrap();
        assert_eq!(
            db.load_revocation_secret(channel_id, 0).unwrap(),
            [9u8; 32]
        );
    }

    #[test]
    fn payment_resolution_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let db = ChannelDb::open(dir.path()).unwrap();
        let hash = WirePaymentHash([3u8; 32]);
        assert!(db.payment_resolution(hash).unwrap().is_none());
        db.mark_payment_resolved(hash, true).unwrap();
        assert_eq!(db.payment_resolution(hash).unwrap(), Some(true));
    }
}
