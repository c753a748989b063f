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

//! A single entry of the HTLC log kept by [`super::channel::Channel`]. Each
//! entry tracks both directions' acknowledgement state so that an HTLC only
//! leaves the log once both sides have signed a commitment reflecting its
//! outcome (I4).

use crate::wire::PaymentHash;

/// Which side originated the HTLC. Declared `Offered` before `Received` so
/// the derived [`Ord`] matches the canonical tie-break order below.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum HtlcDirection {
    /// We offered this HTLC to the remote party.
    Offered,
    /// The remote party offered this HTLC to us.
    Received,
}

/// Lifecycle of a logged HTLC, mirroring BOLT-2's "add", "remove" staging:
/// an update is first logged locally, then becomes irrevocably committed
/// only once both commitment chains include it and the corresponding
/// revocation has been exchanged.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
pub enum HtlcState {
    /// Logged via `update_add_htlc` but not yet in either commitment.
    #[display("pending-add")]
    PendingAdd,
    /// Present in both parties' latest commitments.
    #[display("committed")]
    Committed,
    /// A settle/fail has been logged but not yet committed on both sides.
    #[display("pending-remove")]
    PendingRemove,
}

/// One entry of the HTLC log.
#[derive(Clone, Debug)]
pub struct Htlc {
    pub id: u64,
    pub direction: HtlcDirection,
    pub amount_msat: u64,
    pub payment_hash: PaymentHash,
    pub cltv_expiry: u32,
    pub state: HtlcState,
    /// The (still Sphinx-encrypted) onion routing payload carried by this
    /// HTLC's `update_add_htlc`, opaque to the channel state machine itself
    /// and handed onward unchanged once the HTLC locks in.
    pub onion_routing_packet: Vec<u8>,
}

impl Htlc {
    pub fn is_dust(&self, dust_limit_satoshis: u64, feerate_per_kw: u32) -> bool {
        // BOLT-3: an HTLC is trimmed from a commitment transaction if its
        // value after subtracting the cost of including it falls below the
        // dust limit. The weight figures below match BOLT-3's fixed
        // constants for a non-anchor commitment.
        const HTLC_SUCCESS_WEIGHT: u64 = 703;
        const HTLC_TIMEOUT_WEIGHT: u64 = 663;
        let weight = match self.direction {
            HtlcDirection::Offered => HTLC_TIMEOUT_WEIGHT,
            HtlcDirection::Received => HTLC_SUCCESS_WEIGHT,
        };
        let htlc_tx_fee_sat = weight * feerate_per_kw as u64 / 1000;
        self.amount_msat / 1000 < dust_limit_satoshis + htlc_tx_fee_sat
    }
}

/// Orders HTLC outputs for commitment-transaction construction by `(amount
/// ascending, cltv expiry ascending, payment hash lexicographic, direction
/// offered-before-received)` so that both parties derive byte-identical
/// transactions independently.
pub fn canonical_order(htlcs: &mut [Htlc]) {
    htlcs.sort_by(|a, b| {
        a.amount_msat
            .cmp(&b.amount_msat)
            .then(a.cltv_expiry.cmp(&b.cltv_expiry))
            .then(a.payment_hash.0.cmp(&b.payment_hash.0))
            .then(a.direction.cmp(&b.direction))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn htlc(id: u64, cltv: u32, amount: u64, hash_byte: u8) -> Htlc {
        htlc_with_direction(id, cltv, amount, hash_byte, HtlcDirection::Offered)
    }

    fn htlc_with_direction(
        id: u64,
        cltv: u32,
        amount: u64,
        hash_byte: u8,
        direction: HtlcDirection,
    ) -> Htlc {
        Htlc {
            id,
            direction,
            amount_msat: amount,
            payment_hash: PaymentHash([hash_byte; 32]),
            cltv_expiry: cltv,
            state: HtlcState::PendingAdd,
            onion_routing_packet: Vec::new(),
        }
    }

    #[test]
    fn orders_by_amount_then_cltv_then_hash_then_direction() {
        let mut htlcs = vec![
            htlc(1, 400, 2000, 9),
            htlc(2, 500, 1000, 1),
            htlc(3, 400, 1000, 0),
        ];
        canonical_order(&mut htlcs);
        assert_eq!(htlcs.iter().map(|h| h.id).collect::<Vec<_>>(), vec![3, 2, 1]);
    }

    #[test]
    fn ties_on_amount_cltv_and_hash_break_on_direction() {
        let mut htlcs = vec![
            htlc_with_direction(1, 400, 1000, 0, HtlcDirection::Received),
            htlc_with_direction(2, 400, 1000, 0, HtlcDirection::Offered),
        ];
        canonical_order(&mut htlcs);
        assert_eq!(htlcs.iter().map(|h| h.id).collect::<Vec<_>>(), vec![2, 1]);
    }

    #[test]
    fn dust_threshold_depends_on_direction() {
        let offered = htlc(1, 100, 400_000, 0);
        let received = htlc(2, 100, 400_000, 0);
        assert!(!offered.is_dust(354, 253));
        assert!(!received.is_dust(354, 253));
        let tiny = htlc(3, 100, 1000, 0);
        assert!(tiny.is_dust(354, 253));
    }
}
