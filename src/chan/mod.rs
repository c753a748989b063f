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

//! C2: the channel state machine. A single [`Channel`] owns the commitment
//! chain, the HTLC log and the shachain revocation store for one funding
//! outpoint, and exposes the offer/receive/settle/fail/sign/revoke operation
//! set a peer link (C3) drives.

pub mod channel;
pub mod commitment;
pub mod htlc;
pub mod justice;
pub mod keyset;
pub mod policy;
pub mod shachain;

pub use channel::{Channel, Lifecycle};
pub use commitment::Commitment;
pub use htlc::{Htlc, HtlcDirection, HtlcState};
pub use keyset::{LocalKeyset, RemoteKeyset};
pub use policy::{Policy, PolicyError};
pub use shachain::Shachain;

/// Errors a [`Channel`] operation may return. Aggregates the policy and
/// funding-derivation errors of its submodules the way the crate-wide
/// [`crate::Error`] aggregates every subsystem's error.
#[derive(Clone, Eq, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum Error {
    /// channel policy violation: {0}
    #[from]
    Policy(PolicyError),

    /// operation requires lifecycle stage to be one of {required:?}, but the
    /// channel is currently at {current}
    WrongLifecycle {
        current: Lifecycle,
        required: &'static [Lifecycle],
    },

    /// HTLC id {0} is not present in the offered HTLC log
    UnknownOfferedHtlc(u64),

    /// HTLC id {0} is not present in the received HTLC log
    UnknownReceivedHtlc(u64),

    /// cannot offer HTLC: {0} msat would exceed the channel's remaining local
    /// balance of {1} msat once the reserve is set aside
    InsufficientBalance(u64, u64),

    /// cannot offer HTLC: {0} in-flight HTLCs would exceed the negotiated
    /// `max_accepted_htlcs` limit of {1}
    TooManyHtlcs(usize, u16),

    /// offered HTLC value {0} msat is below the negotiated `htlc_minimum_msat`
    /// of {1} msat
    HtlcBelowMinimum(u64, u64),

    /// in-flight HTLC value would reach {0} msat, exceeding
    /// `max_htlc_value_in_flight_msat` of {1} msat
    HtlcValueInFlightExceeded(u64, u64),

    /// below-dust HTLC exposure would reach {0} msat, exceeding policy
    /// maximum of {1} msat
    DustExposureExceeded(u64, u64),

    /// commitment fee of {0} msat exceeds the initiator's local balance of
    /// {1} msat
    FeeExceedsBalance(u64, u64),

    /// a new commitment was signed while a previous one is still pending
    /// revocation acknowledgement
    CommitmentAlreadyPending,

    /// received `revoke_and_ack` but no commitment is pending revocation
    NoCommitmentPendingRevocation,

    /// revocation secret does not hash to the commitment point committed to
    /// at this index; the remote peer is either buggy or malicious
    InvalidRevocationSecret,

    /// remote `channel_reestablish` indicates we have lost state: remote's
    /// next_remote_revocation_number {remote_claims} is ahead of our own
    /// commitment_number {local_has}
    PossibleDataLoss {
        local_has: u64,
        remote_claims: u64,
    },

    /// shachain error: {0}
    #[from]
    Shachain(shachain::Error),
}
