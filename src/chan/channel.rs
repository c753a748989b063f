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

//! The channel state machine proper. One [`Channel`] per funding outpoint;
//! a peer link (C3) owns it exclusively and serializes every call through
//! it, so none of the methods here take locks of their own.

use std::collections::BTreeMap;

use bitcoin::secp256k1::PublicKey;
use bitcoin::OutPoint;

use super::htlc::{Htlc, HtlcDirection, HtlcState};
use super::keyset::{LocalKeyset, RemoteKeyset};
use super::policy::Policy;
use super::shachain::{Shachain, ShachainSeed};
use super::Commitment;
use crate::wire::{ChannelId, PaymentHash};

use super::Error;

/// Channel lifecycle: states of the channel state machine. Mirrors the
/// progression a channel actually goes through from `open_channel` to a
/// settled close; [`Channel`] methods reject calls made outside the stage
/// they apply to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
pub enum Lifecycle {
    /// Funding outpoint chosen, awaiting the required confirmations.
    #[display("FUNDING")]
    Funding,

    /// Funding transaction has reached `minimum_depth`; `funding_locked` has
    /// been exchanged in at least one direction.
    #[display("LOCKING")]
    Locking,

    /// Both sides exchanged `funding_locked`; the channel can carry HTLCs.
    #[display("ACTIVE")]
    Active,

    /// A cooperative `shutdown` has been sent or received.
    #[display("SHUTDOWN")]
    Shutdown,

    /// Unilateral or cooperative close has been broadcast.
    #[display("CLOSING")]
    Closing,

    /// Close transaction is confirmed; the channel is dead.
    #[display("CLOSED")]
    Closed,
}

const ACTIVE_ONLY: &[Lifecycle] = &[Lifecycle::Active];

/// A single channel's commitment chain, HTLC log and revocation state.
#[derive(Clone, Debug)]
pub struct Channel {
    pub channel_id: ChannelId,
    pub funding_outpoint: OutPoint,
    pub lifecycle: Lifecycle,
    pub policy: Policy,

    pub local_keys: LocalKeyset,
    pub remote_keys: RemoteKeyset,

    pub local_amount_msat: u64,
    pub remote_amount_msat: u64,
    pub channel_reserve_satoshis: u64,
    pub dust_limit_satoshis: u64,
    pub feerate_per_kw: u32,
    pub max_htlc_value_in_flight_msat: u64,
    pub htlc_minimum_msat: u64,
    pub max_accepted_htlcs: u16,
    pub to_self_delay: u16,
    /// Whether the local side funded this channel. BOLT-3: the funder
    /// always pays the commitment transaction fee (I2).
    pub is_initiator: bool,

    offered_htlcs: BTreeMap<u64, Htlc>,
    received_htlcs: BTreeMap<u64, Htlc>,
    next_offered_htlc_id: u64,
    next_received_htlc_id: u64,

    local_commitment_number: u64,
    remote_commitment_number: u64,

    /// Our own commitment, freshly signed and sent to the remote, awaiting
    /// its `revoke_and_ack`. `None` once revoked.
    pending_local_commitment: Option<Commitment>,
    /// The remote's commitment as signed by their last `commitment_signed`,
    /// which we haven't yet revoked our own prior state in favor of.
    pending_remote_commitment: Option<Commitment>,

    shachain_seed: ShachainSeed,
    remote_shachain: Shachain,
    remote_per_commitment_point: PublicKey,
}

impl Channel {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        channel_id: ChannelId,
        funding_outpoint: OutPoint,
        policy: Policy,
        local_keys: LocalKeyset,
        remote_keys: RemoteKeyset,
        local_amount_msat: u64,
        remote_amount_msat: u64,
        channel_reserve_satoshis: u64,
        dust_limit_satoshis: u64,
        feerate_per_kw: u32,
        max_htlc_value_in_flight_msat: u64,
        htlc_minimum_msat: u64,
        max_accepted_htlcs: u16,
        to_self_delay: u16,
        is_initiator: bool,
        shachain_seed: ShachainSeed,
        remote_per_commitment_point: PublicKey,
    ) -> Self {
        Channel {
            channel_id,
            funding_outpoint,
            lifecycle: Lifecycle::Funding,
            policy,
            local_keys,
            remote_keys,
            local_amount_msat,
            remote_amount_msat,
            channel_reserve_satoshis,
            dust_limit_satoshis,
            feerate_per_kw,
            max_htlc_value_in_flight_msat,
            htlc_minimum_msat,
            max_accepted_htlcs,
            to_self_delay,
            is_initiator,
            offered_htlcs: BTreeMap::new(),
            received_htlcs: BTreeMap::new(),
            next_offered_htlc_id: 0,
            next_received_htlc_id: 0,
            local_commitment_number: 0,
            remote_commitment_number: 0,
            pending_local_commitment: None,
            pending_remote_commitment: None,
            shachain_seed,
            remote_shachain: Shachain::new(),
            remote_per_commitment_point,
        }
    }

    fn require_active(&self) -> Result<(), Error> {
        if self.lifecycle != Lifecycle::Active {
            return Err(Error::WrongLifecycle {
                current: self.lifecycle,
                required: ACTIVE_ONLY,
            });
        }
        Ok(())
    }

    fn in_flight_msat(&self) -> u64 {
        self.offered_htlcs
            .values()
            .chain(self.received_htlcs.values())
            .map(|h| h.amount_msat)
            .sum()
    }

    /// Total value, in msat, currently held in below-dust HTLCs plus the
    /// prospective `extra_msat` one, for the anti-pinning cap in
    /// [`Policy::dust_htlc_exposure_max_msat`].
    fn dust_exposure_msat(&self, extra_msat: u64) -> u64 {
        self.offered_htlcs
            .values()
            .chain(self.received_htlcs.values())
            .filter(|h| h.is_dust(self.dust_limit_satoshis, self.feerate_per_kw))
            .map(|h| h.amount_msat)
            .sum::<u64>()
            + extra_msat
    }

    fn check_dust_exposure(&self, amount_msat: u64, is_dust: bool) -> Result<(), Error> {
        if !is_dust {
            return Ok(());
        }
        if let Some(max) = self.policy.dust_htlc_exposure_max_msat {
            let exposure = self.dust_exposure_msat(amount_msat);
            if exposure > max {
                return Err(Error::DustExposureExceeded(exposure, max));
            }
        }
        Ok(())
    }

    /// Fee, in msat, the initiator would need to reserve if this HTLC were
    /// added to the next commitment.
    fn prospective_fee_msat(&self, extra_htlc: bool) -> u64 {
        let non_dust_count = self
            .offered_htlcs
            .values()
            .chain(self.received_htlcs.values())
            .filter(|h| !h.is_dust(self.dust_limit_satoshis, self.feerate_per_kw))
            .count()
            + usize::from(extra_htlc);
        Commitment::fee_msat_for(self.feerate_per_kw, non_dust_count)
    }

    /// Logs a new HTLC we wish to offer to the remote party (I1-I3): checks
    /// local balance, the negotiated count and value-in-flight limits, and
    /// the minimum HTLC value, then assigns the next offered id.
    pub fn offer_htlc(
        &mut self,
        amount_msat: u64,
        payment_hash: PaymentHash,
        cltv_expiry: u32,
        onion_routing_packet: Vec<u8>,
    ) -> Result<u64, Error> {
        self.require_active()?;
        if amount_msat < self.htlc_minimum_msat {
            return Err(Error::HtlcBelowMinimum(amount_msat, self.htlc_minimum_msat));
        }
        let count = self.offered_htlcs.len() + self.received_htlcs.len() + 1;
        if count > self.max_accepted_htlcs as usize {
            return Err(Error::TooManyHtlcs(count, self.max_accepted_htlcs));
        }
        let in_flight = self.in_flight_msat() + amount_msat;
        if in_flight > self.max_htlc_value_in_flight_msat {
            return Err(Error::HtlcValueInFlightExceeded(
                in_flight,
                self.max_htlc_value_in_flight_msat,
            ));
        }
        let is_dust = Htlc {
            id: 0,
            direction: HtlcDirection::Offered,
            amount_msat,
            payment_hash,
            cltv_expiry,
            state: HtlcState::PendingAdd,
            onion_routing_packet: Vec::new(),
        }
        .is_dust(self.dust_limit_satoshis, self.feerate_per_kw);
        self.check_dust_exposure(amount_msat, is_dust)?;
        let fee_msat = if self.is_initiator {
            self.prospective_fee_msat(!is_dust)
        } else {
            0
        };
        let reserve_msat = self.channel_reserve_satoshis * 1000;
        if self.local_amount_msat < amount_msat + reserve_msat + fee_msat {
            return Err(Error::InsufficientBalance(
                amount_msat,
                self.local_amount_msat
                    .saturating_sub(reserve_msat)
                    .saturating_sub(fee_msat),
            ));
        }
        let id = self.next_offered_htlc_id;
        self.next_offered_htlc_id += 1;
        self.offered_htlcs.insert(
            id,
            Htlc {
                id,
                direction: HtlcDirection::Offered,
                amount_msat,
                payment_hash,
                cltv_expiry,
                state: HtlcState::PendingAdd,
                onion_routing_packet,
            },
        );
        self.local_amount_msat -= amount_msat;
        Ok(id)
    }

    /// Logs an HTLC offered to us by the remote via `update_add_htlc`.
    /// Validation mirrors [`Channel::offer_htlc`] but checked against the
    /// remote's own balance instead of ours.
    pub fn receive_htlc(
        &mut self,
        htlc_id: u64,
        amount_msat: u64,
        payment_hash: PaymentHash,
        cltv_expiry: u32,
        onion_routing_packet: Vec<u8>,
    ) -> Result<(), Error> {
        self.require_active()?;
        if amount_msat < self.htlc_minimum_msat {
            return Err(Error::HtlcBelowMinimum(amount_msat, self.htlc_minimum_msat));
        }
        let count = self.offered_htlcs.len() + self.received_htlcs.len() + 1;
        if count > self.max_accepted_htlcs as usize {
            return Err(Error::TooManyHtlcs(count, self.max_accepted_htlcs));
        }
        let is_dust = Htlc {
            id: htlc_id,
            direction: HtlcDirection::Received,
            amount_msat,
            payment_hash,
            cltv_expiry,
            state: HtlcState::PendingAdd,
            onion_routing_packet: Vec::new(),
        }
        .is_dust(self.dust_limit_satoshis, self.feerate_per_kw);
        self.check_dust_exposure(amount_msat, is_dust)?;
        self.received_htlcs.insert(
            htlc_id,
            Htlc {
                id: htlc_id,
                direction: HtlcDirection::Received,
                amount_msat,
                payment_hash,
                cltv_expiry,
                state: HtlcState::PendingAdd,
                onion_routing_packet,
            },
        );
        self.next_received_htlc_id = self.next_received_htlc_id.max(htlc_id + 1);
        Ok(())
    }

    /// We settle an HTLC the remote offered us, crediting our balance.
    /// Stays in the log (I4) until the settle itself is committed and
    /// revoked on both sides; callers remove it via
    /// [`Channel::finalize_removed_htlcs`] after that.
    pub fn settle_htlc(&mut self, htlc_id: u64) -> Result<(), Error> {
        let htlc = self
            .received_htlcs
            .get_mut(&htlc_id)
            .ok_or(Error::UnknownReceivedHtlc(htlc_id))?;
        htlc.state = HtlcState::PendingRemove;
        self.local_amount_msat += htlc.amount_msat;
        Ok(())
    }

    /// The remote settled an HTLC we offered.
    pub fn receive_settle(&mut self, htlc_id: u64) -> Result<(), Error> {
        let htlc = self
            .offered_htlcs
            .get_mut(&htlc_id)
            .ok_or(Error::UnknownOfferedHtlc(htlc_id))?;
        htlc.state = HtlcState::PendingRemove;
        self.remote_amount_msat += htlc.amount_msat;
        Ok(())
    }

    /// We fail an HTLC the remote offered us, returning its value to them.
    pub fn fail_htlc(&mut self, htlc_id: u64) -> Result<(), Error> {
        let htlc = self
            .received_htlcs
            .get_mut(&htlc_id)
            .ok_or(Error::UnknownReceivedHtlc(htlc_id))?;
        htlc.state = HtlcState::PendingRemove;
        self.remote_amount_msat += htlc.amount_msat;
        Ok(())
    }

    /// The remote failed an HTLC we offered, returning its value to us.
    pub fn receive_fail(&mut self, htlc_id: u64) -> Result<(), Error> {
        let htlc = self
            .offered_htlcs
            .get_mut(&htlc_id)
            .ok_or(Error::UnknownOfferedHtlc(htlc_id))?;
        htlc.state = HtlcState::PendingRemove;
        self.local_amount_msat += htlc.amount_msat;
        Ok(())
    }

    /// Builds and "signs" (in the sense of committing to) our next proposed
    /// commitment for the remote party, covering every HTLC currently in
    /// the log regardless of pending-add/pending-remove state (BOLT-2: a
    /// `commitment_signed` always covers the log as of the moment it's
    /// sent). I6: refuses to sign a second commitment before the first is
    /// revoked.
    pub fn sign_next_commitment(&mut self) -> Result<Commitment, Error> {
        self.require_active()?;
        if self.pending_local_commitment.is_some() {
            return Err(Error::CommitmentAlreadyPending);
        }
        let all_htlcs = self
            .offered_htlcs
            .values()
            .chain(self.received_htlcs.values())
            .cloned();
        if self.is_initiator {
            let fee_msat = self.prospective_fee_msat(false);
            if self.local_amount_msat < fee_msat {
                return Err(Error::FeeExceedsBalance(fee_msat, self.local_amount_msat));
            }
        }
        let commitment = Commitment::build(
            self.local_commitment_number + 1,
            self.local_amount_msat,
            self.remote_amount_msat,
            self.feerate_per_kw,
            self.dust_limit_satoshis,
            self.is_initiator,
            all_htlcs,
        );
        self.pending_local_commitment = Some(commitment.clone());
        Ok(commitment)
    }

    /// Accepts the remote's `commitment_signed`, storing it as the
    /// commitment we'll revoke our prior state in favor of once we send
    /// `revoke_and_ack`.
    pub fn receive_new_commitment(&mut self, commitment: Commitment) -> Result<(), Error> {
        self.require_active()?;
        self.pending_remote_commitment = Some(commitment);
        Ok(())
    }

    /// Sends `revoke_and_ack` for our previous commitment now that the
    /// remote has accepted the new one: reveals the old per-commitment
    /// secret and advances our local commitment number.
    pub fn revoke_current_commitment(&mut self) -> Result<[u8; 32], Error> {
        let commitment = self
            .pending_remote_commitment
            .take()
            .ok_or(Error::NoCommitmentPendingRevocation)?;
        let secret = self
            .shachain_seed
            .secret_for_index(self.remote_commitment_number)
            .map_err(Error::Shachain)?;
        self.remote_commitment_number += 1;
        self.finalize_removed_htlcs(&commitment);
        Ok(secret)
    }

    /// Processes the remote's `revoke_and_ack`: verifies the disclosed
    /// secret is consistent with everything previously revealed (I5) before
    /// accepting it, then advances our view of their commitment number and
    /// retires our own pending commitment.
    pub fn receive_revocation(
        &mut self,
        per_commitment_secret: [u8; 32],
        next_per_commitment_point: PublicKey,
    ) -> Result<(), Error> {
        self.remote_shachain
            .insert_secret(self.local_commitment_number, per_commitment_secret)
            .map_err(Error::Shachain)?;
        let commitment = self
            .pending_local_commitment
            .take()
            .ok_or(Error::NoCommitmentPendingRevocation)?;
        self.local_commitment_number += 1;
        self.remote_per_commitment_point = next_per_commitment_point;
        self.finalize_removed_htlcs(&commitment);
        Ok(())
    }

    /// I4: an HTLC leaves the log only once a commitment reflecting its
    /// removal has been revoked by both sides. Since both commitment
    /// chains converge on the same log contents once revocation completes,
    /// pruning after either side's revocation is sufficient. An add that
    /// survives into the revoked commitment is now irrevocably committed on
    /// this chain, so it is promoted out of `PendingAdd`; once that has
    /// happened on both chains, [`super::link::PeerLink`] can classify it as
    /// locked in.
    fn finalize_removed_htlcs(&mut self, commitment: &Commitment) {
        let still_open: std::collections::BTreeSet<u64> =
            commitment.htlcs.iter().map(|h| h.id).collect();
        self.offered_htlcs.retain(|id, h| {
            h.state != HtlcState::PendingRemove || still_open.contains(id)
        });
        self.received_htlcs.retain(|id, h| {
            h.state != HtlcState::PendingRemove || still_open.contains(id)
        });
        for htlc in self
            .offered_htlcs
            .values_mut()
            .chain(self.received_htlcs.values_mut())
        {
            let was_in_commitment = still_open.contains(&htlc.id)
                || htlc.is_dust(self.dust_limit_satoshis, self.feerate_per_kw);
            if htlc.state == HtlcState::PendingAdd && was_in_commitment {
                htlc.state = HtlcState::Committed;
            }
        }
    }

    pub fn local_commitment_number(&self) -> u64 {
        self.local_commitment_number
    }

    pub fn remote_commitment_number(&self) -> u64 {
        self.remote_commitment_number
    }

    pub fn offered_htlcs(&self) -> &BTreeMap<u64, Htlc> {
        &self.offered_htlcs
    }

    pub fn received_htlcs(&self) -> &BTreeMap<u64, Htlc> {
        &self.received_htlcs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amplify::DumbDefault;
    use bitcoin::hashes::Hash;
    use bitcoin::Txid;

    fn dumb_channel() -> Channel {
        let local_keys = LocalKeyset::dumb_default();
        let remote_keys = RemoteKeyset {
            funding_pubkey: local_keys.funding_pubkey,
            revocation_basepoint: local_keys.revocation_basepoint,
            payment_basepoint: local_keys.payment_basepoint,
            delayed_payment_basepoint: local_keys.delayed_payment_basepoint,
            htlc_basepoint: local_keys.htlc_basepoint,
            first_per_commitment_point: local_keys.first_per_commitment_point,
            shutdown_scriptpubkey: None,
            static_remotekey: false,
        };
        let mut channel = Channel::new(
            ChannelId([1u8; 32]),
            OutPoint::new(Txid::from_slice(&[2u8; 32]).unwrap(), 0),
            Policy::default(),
            local_keys.clone(),
            remote_keys,
            5_000_000_000,
            5_000_000_000,
            10_000,
            354,
            253,
            4_000_000_000,
            1,
            30,
            144,
            true,
            ShachainSeed::new([4u8; 32]),
            local_keys.first_per_commitment_point,
        );
        channel.lifecycle = Lifecycle::Active;
        channel
    }

    #[test]
    fn offer_htlc_debits_local_balance() {
        let mut channel = dumb_channel();
        let before = channel.local_amount_msat;
        let id = channel
            .offer_htlc(100_000, PaymentHash([9u8; 32]), 500_000, Vec::new())
            .unwrap();
        assert_eq!(id, 0);
        assert_eq!(channel.local_amount_msat, before - 100_000);
        assert!(channel.offered_htlcs().contains_key(&0));
    }

    #[test]
    fn offer_htlc_respects_reserve() {
        let mut channel = dumb_channel();
        let huge = channel.local_amount_msat;
        assert!(channel
            .offer_htlc(huge, PaymentHash([1u8; 32]), 500_000, Vec::new())
            .is_err());
    }

    #[test]
    fn offer_htlc_as_initiator_reserves_the_commitment_fee() {
        let mut channel = dumb_channel();
        channel.local_amount_msat = Commitment::fee_msat_for(channel.feerate_per_kw, 1) + 50_000;
        assert!(channel
            .offer_htlc(50_000, PaymentHash([2u8; 32]), 500_000, Vec::new())
            .is_err());
    }

    #[test]
    fn full_commitment_round_trip_retires_settled_htlc() {
        let mut channel = dumb_channel();
        let id = channel
            .offer_htlc(100_000, PaymentHash([9u8; 32]), 500_000, Vec::new())
            .unwrap();

        // Remote signs a commitment reflecting the new HTLC; we revoke our
        // prior state in its favor.
        let remote_commitment = Commitment::build(
            1,
            channel.local_amount_msat,
            channel.remote_amount_msat,
            channel.feerate_per_kw,
            channel.dust_limit_satoshis,
            channel.is_initiator,
            channel.offered_htlcs().values().cloned(),
        );
        channel.receive_new_commitment(remote_commitment).unwrap();
        channel.revoke_current_commitment().unwrap();

        // We sign our own commitment and the remote revokes in turn.
        let our_commitment = channel.sign_next_commitment().unwrap();
        assert_eq!(our_commitment.htlcs.len(), 1);
        channel
            .receive_revocation([0u8; 32], channel.remote_per_commitment_point)
            .unwrap();
        assert_eq!(channel.offered_htlcs()[&id].state, HtlcState::Committed);

        // Remote settles the HTLC.
        channel.receive_settle(id).unwrap();
        assert!(channel.offered_htlcs()[&id].state == HtlcState::PendingRemove);

        let settle_commitment = Commitment::build(
            channel.local_commitment_number + 1,
            channel.local_amount_msat,
            channel.remote_amount_msat,
            channel.feerate_per_kw,
            channel.dust_limit_satoshis,
            channel.is_initiator,
            std::iter::empty(),
        );
        channel.receive_new_commitment(settle_commitment).unwrap();
        channel.revoke_current_commitment().unwrap();
        assert!(!channel.offered_htlcs().contains_key(&id));
    }
}
