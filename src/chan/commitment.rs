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

//! A commitment snapshot: the balances and in-flight HTLC set one side's
//! next `commitment_signed` covers, built fresh on every
//! [`super::channel::Channel::sign_next_commitment`] /
//! [`super::channel::Channel::receive_new_commitment`] call rather than
//! mutated in place, so a rejected round never corrupts channel state.

use super::htlc::{canonical_order, Htlc};

/// One commitment transaction's worth of state: the two parties' balances
/// after trimming dust HTLCs, and the (canonically ordered) set of HTLCs
/// that remain as outputs.
#[derive(Clone, Debug)]
pub struct Commitment {
    pub commitment_number: u64,
    pub local_balance_msat: u64,
    pub remote_balance_msat: u64,
    pub feerate_per_kw: u32,
    pub dust_limit_satoshis: u64,
    pub htlcs: Vec<Htlc>,
}

const BASE_COMMITMENT_WEIGHT: u64 = 724;
const HTLC_OUTPUT_WEIGHT: u64 = 172;

impl Commitment {
    fn weight_for(htlc_count: usize) -> u64 {
        BASE_COMMITMENT_WEIGHT + HTLC_OUTPUT_WEIGHT * htlc_count as u64
    }

    /// Fee, in msat, the channel initiator must reserve for a commitment
    /// carrying `htlc_count` non-dust HTLCs at `feerate_per_kw` (BOLT-3: the
    /// funder always pays the commitment transaction fee).
    pub fn fee_msat_for(feerate_per_kw: u32, htlc_count: usize) -> u64 {
        Self::weight_for(htlc_count) * feerate_per_kw as u64 / 1000 * 1000
    }

    /// Builds the commitment a signer would see: HTLCs trimmed for dust per
    /// BOLT-3, the remainder ordered canonically so both parties compute an
    /// identical transaction independently, and the commitment fee
    /// subtracted from whichever side is the channel's initiator (I2).
    pub fn build(
        commitment_number: u64,
        local_balance_msat: u64,
        remote_balance_msat: u64,
        feerate_per_kw: u32,
        dust_limit_satoshis: u64,
        is_local_initiator: bool,
        all_htlcs: impl IntoIterator<Item = Htlc>,
    ) -> Self {
        let mut htlcs: Vec<Htlc> = all_htlcs
            .into_iter()
            .filter(|h| !h.is_dust(dust_limit_satoshis, feerate_per_kw))
            .collect();
        canonical_order(&mut htlcs);
        let fee_msat = Self::fee_msat_for(feerate_per_kw, htlcs.len());
        let (local_balance_msat, remote_balance_msat) = if is_local_initiator {
            (local_balance_msat.saturating_sub(fee_msat), remote_balance_msat)
        } else {
            (local_balance_msat, remote_balance_msat.saturating_sub(fee_msat))
        };
        Commitment {
            commitment_number,
            local_balance_msat,
            remote_balance_msat,
            feerate_per_kw,
            dust_limit_satoshis,
            htlcs,
        }
    }

    /// Total value, in msat, held in non-dust HTLC outputs.
    pub fn htlc_value_in_flight_msat(&self) -> u64 {
        self.htlcs.iter().map(|h| h.amount_msat).sum()
    }

    /// BOLT-3 weight of the commitment transaction given its HTLC count,
    /// used to derive the on-chain fee this commitment round must reserve.
    pub fn weight(&self) -> u64 {
        Self::weight_for(self.htlcs.len())
    }

    pub fn fee_satoshis(&self) -> u64 {
        self.weight() * self.feerate_per_kw as u64 / 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chan::htlc::HtlcDirection;
    use crate::wire::PaymentHash;

    fn htlc(id: u64, amount: u64) -> Htlc {
        Htlc {
            id,
            direction: HtlcDirection::Offered,
            amount_msat: amount,
            payment_hash: PaymentHash([id as u8; 32]),
            cltv_expiry: 500_000,
            state: super::super::htlc::HtlcState::Committed,
            onion_routing_packet: Vec::new(),
        }
    }

    #[test]
    fn dust_htlcs_are_trimmed() {
        let commitment = Commitment::build(
            0,
            1_000_000,
            1_000_000,
            253,
            354,
            true,
            vec![htlc(1, 400_000_000), htlc(2, 500)],
        );
        assert_eq!(commitment.htlcs.len(), 1);
        assert_eq!(commitment.htlcs[0].id, 1);
    }

    #[test]
    fn weight_grows_with_htlc_count() {
        let empty = Commitment::build(0, 1_000_000, 1_000_000, 253, 354, true, vec![]);
        let one = Commitment::build(
            0,
            1_000_000,
            1_000_000,
            253,
            354,
            true,
            vec![htlc(1, 400_000_000)],
        );
        assert!(one.weight() > empty.weight());
    }

    #[test]
    fn initiator_pays_the_commitment_fee() {
        let fee_msat = Commitment::fee_msat_for(253, 1);
        let commitment = Commitment::build(
            0,
            1_000_000_000,
            1_000_000_000,
            253,
            354,
            true,
            vec![htlc(1, 400_000_000)],
        );
        assert_eq!(commitment.local_balance_msat, 1_000_000_000 - fee_msat);
        assert_eq!(commitment.remote_balance_msat, 1_000_000_000);
    }
}
