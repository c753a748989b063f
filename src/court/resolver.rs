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

//! Resolver records: one per on-chain output a channel close produced,
//! tracking which sweeping strategy claims it and how far that sweep has
//! progressed. Progress is checkpointed (durably, via C6) before the
//! resolver's own sweep transaction is broadcast, so a crash mid-resolution
//! never double-spends or forgets an output outright.

#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum Error {
    /// resolver for outpoint {0:?} is already marked broadcast; cannot
    /// transition backwards to {1:?}
    AlreadyBroadcast(bitcoin::OutPoint, ResolverStage),
}

/// Which sweeping strategy a resolver implements.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ResolverKind {
    /// Sweeps our own `to_local` output after its CSV delay.
    CommitmentSweep,
    /// Claims an HTLC output we offered, once its CLTV timeout passes.
    HtlcTimeout,
    /// Claims an HTLC output offered to us, once we learn the preimage.
    HtlcSuccess,
    /// Sweeps a revoked commitment's outputs using the derived revocation
    /// key (breach retribution).
    Justice,
}

/// How far a single resolver has progressed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ResolverStage {
    /// Output observed on-chain; sweep transaction not yet built.
    Pending,
    /// Sweep transaction built and checkpointed to disk, not yet
    /// broadcast.
    Checkpointed,
    /// Sweep transaction broadcast; awaiting confirmation depth.
    Broadcast,
    /// Sweep transaction confirmed to the nursery's maturity depth.
    Resolved,
}

#[derive(Clone, Debug)]
pub struct ResolverRecord {
    pub kind: ResolverKind,
    pub outpoint: bitcoin::OutPoint,
    pub stage: ResolverStage,
}

impl ResolverRecord {
    pub fn new(kind: ResolverKind, outpoint: bitcoin::OutPoint) -> Self {
        ResolverRecord {
            kind,
            outpoint,
            stage: ResolverStage::Pending,
        }
    }

    /// Moves the resolver to `Checkpointed`. The caller must have already
    /// fsynced this transition to C6 before calling
    /// [`ResolverRecord::mark_broadcast`] — that ordering is the second of
    /// the two durability rules (§4.6).
    pub fn mark_checkpointed(&mut self) {
        self.stage = ResolverStage::Checkpointed;
    }

    pub fn mark_broadcast(&mut self) -> Result<(), Error> {
        if self.stage == ResolverStage::Broadcast || self.stage == ResolverStage::Resolved {
            return Err(Error::AlreadyBroadcast(self.outpoint, self.stage));
        }
        self.stage = ResolverStage::Broadcast;
        Ok(())
    }

    pub fn mark_resolved(&mut self) {
        self.stage = ResolverStage::Resolved;
    }
}
