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

//! C5: the contract court. Watches funding outpoints for spends, and on a
//! spend dispatches the resolver set appropriate to what was actually
//! broadcast (our commitment, their commitment, or a revoked one), handing
//! every output those resolvers produce to the UTXO nursery to track
//! through confirmation depth.

pub mod nursery;
pub mod resolver;

pub use nursery::{NurseryBucket, UtxoNursery};
pub use resolver::{ResolverKind, ResolverRecord, ResolverStage};

use std::collections::HashMap;

use bitcoin::{OutPoint, Transaction, Txid};
use log::{error, info};

use crate::wire::ShortChannelId;

#[derive(Clone, Eq, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum Error {
    /// no watch is registered for funding outpoint {0}
    UnknownFunding(OutPoint),

    /// resolver error: {0}
    #[from]
    Resolver(resolver::Error),
}

/// What role a single output of a broadcast commitment transaction plays,
/// determining which resolver (if any) claims it. `None` in an
/// `output_roles` slice means the output belongs to neither party (e.g. an
/// anchor) and no resolver is dispatched for it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CommitmentOutputRole {
    /// The broadcasting party's own `to_local` output.
    ToLocal,
    /// An HTLC we offered: claimable by us after its CLTV timeout, or by the
    /// remote immediately if they learn the preimage.
    OfferedHtlc,
    /// An HTLC offered to us: claimable by us once we learn the preimage, or
    /// by the remote after its CLTV timeout.
    ReceivedHtlc { preimage_known: bool },
}

/// What happened to a channel's funding outpoint, as observed on-chain.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SpendKind {
    /// Our own latest commitment transaction was broadcast (by us or
    /// because the remote force-closed with our last state, which cannot
    /// happen without a bug — but the court doesn't assume that).
    LocalCommitment,
    /// The remote's latest commitment transaction was broadcast.
    RemoteCommitment,
    /// A revoked (old) commitment transaction was broadcast: breach.
    RevokedCommitment,
    /// A cooperative closing transaction was confirmed.
    CooperativeClose,
}

struct Watch {
    short_channel_id: ShortChannelId,
}

/// Dispatches the right resolver set for a spend of a watched funding
/// outpoint and feeds every resulting output into the nursery.
pub struct ContractCourt {
    watches: HashMap<OutPoint, Watch>,
    nursery: UtxoNursery,
    resolvers: Vec<ResolverRecord>,
}

impl ContractCourt {
    pub fn new() -> Self {
        ContractCourt {
            watches: HashMap::new(),
            nursery: UtxoNursery::new(),
            resolvers: Vec::new(),
        }
    }

    pub fn watch(&mut self, funding_outpoint: OutPoint, short_channel_id: ShortChannelId) {
        self.watches
            .insert(funding_outpoint, Watch { short_channel_id });
    }

    pub fn unwatch(&mut self, funding_outpoint: OutPoint) {
        self.watches.remove(&funding_outpoint);
    }

    /// Called once a spend of a watched funding outpoint confirms.
    /// Dispatches the resolver matching each output's role and hands every
    /// claimed output to the nursery at the preschool stage. `output_roles`
    /// must have one entry per `spending_tx` output; a `None` entry (or a
    /// short slice) is skipped, since not every output belongs to either
    /// channel party. For a breach (`RevokedCommitment`) every output is
    /// instead claimed by the single justice transaction, since a revoked
    /// commitment forfeits both parties' outputs to whoever holds the
    /// revocation key.
    pub fn handle_funding_spend(
        &mut self,
        funding_outpoint: OutPoint,
        spending_tx: &Transaction,
        kind: SpendKind,
        output_roles: &[Option<CommitmentOutputRole>],
    ) -> Result<(), Error> {
        let watch = self
            .watches
            .remove(&funding_outpoint)
            .ok_or(Error::UnknownFunding(funding_outpoint))?;

        match kind {
            SpendKind::RevokedCommitment => {
                error!(
                    target: "court",
                    "breach detected on channel {:?}: broadcasting justice transaction",
                    watch.short_channel_id
                );
            }
            SpendKind::CooperativeClose => {
                info!(target: "court", "channel {:?} closed cooperatively", watch.short_channel_id);
                return Ok(());
            }
            _ => {
                info!(target: "court", "channel {:?} force-closed ({:?})", watch.short_channel_id, kind);
            }
        }

        let txid = spending_tx.txid();
        for (vout, _output) in spending_tx.output.iter().enumerate() {
            let resolver_kind = if kind == SpendKind::RevokedCommitment {
                Some(ResolverKind::Justice)
            } else {
                output_roles
                    .get(vout)
                    .copied()
                    .flatten()
                    .and_then(resolver_kind_for_role)
            };
            let Some(resolver_kind) = resolver_kind else {
                continue;
            };
            let record = ResolverRecord::new(resolver_kind, OutPoint::new(txid, vout as u32));
            self.nursery.admit(record.outpoint);
            self.resolvers.push(record);
        }
        Ok(())
    }

    /// Advances the nursery by one confirmation, graduating any bucket that
    /// has reached its maturity depth, and returns the outpoints that
    /// graduated this round so the caller can sweep them and report the
    /// synthetic resolution back to C4.
    pub fn tick_confirmation(&mut self, txid_confirmed: Txid, depth: u32) -> Vec<OutPoint> {
        self.nursery.advance(txid_confirmed, depth)
    }

    pub fn resolvers(&self) -> &[ResolverRecord] {
        &self.resolvers
    }
}

impl Default for ContractCourt {
    fn default() -> Self {
        ContractCourt::new()
    }
}

/// The resolver this node can run for one of its own commitment outputs, or
/// `None` if the output isn't this node's to claim (e.g. a received HTLC
/// whose preimage we don't hold yet belongs to the remote's timeout path).
fn resolver_kind_for_role(role: CommitmentOutputRole) -> Option<ResolverKind> {
    match role {
        CommitmentOutputRole::ToLocal => Some(ResolverKind::CommitmentSweep),
        CommitmentOutputRole::OfferedHtlc => Some(ResolverKind::HtlcTimeout),
        CommitmentOutputRole::ReceivedHtlc { preimage_known: true } => {
            Some(ResolverKind::HtlcSuccess)
        }
        CommitmentOutputRole::ReceivedHtlc { preimage_known: false } => None,
    }
}
