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

//! The UTXO nursery: tracks every resolver output from admission through
//! confirmation, in three buckets — preschool (output observed but its
//! sweep not yet broadcast), kindergarten (sweep broadcast, waiting out
//! its own confirmation depth), and graduated (mature, safe to forget).

use std::collections::HashMap;

use bitcoin::{OutPoint, Txid};

/// Confirmations a kindergarten output needs before it graduates. Matches
/// the BOLT-3 `to_self_delay` default used elsewhere when no
/// channel-specific delay is known to the nursery directly.
pub const DEFAULT_MATURITY_DEPTH: u32 = 144;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NurseryBucket {
    Preschool,
    Kindergarten { confirmed_at: Txid, depth_required: u32 },
    Graduated,
}

struct Entry {
    bucket: NurseryBucket,
}

/// Holds every outpoint the court is tracking through to maturity.
#[derive(Default)]
pub struct UtxoNursery {
    entries: HashMap<OutPoint, Entry>,
}

impl UtxoNursery {
    pub fn new() -> Self {
        UtxoNursery::default()
    }

    /// Admits a freshly-observed resolver output at the preschool stage.
    pub fn admit(&mut self, outpoint: OutPoint) {
        self.entries.entry(outpoint).or_insert(Entry {
            bucket: NurseryBucket::Preschool,
        });
    }

    /// Moves an output from preschool to kindergarten once its sweep
    /// transaction confirms.
    pub fn promote_to_kindergarten(
        &mut self,
        outpoint: OutPoint,
        confirmed_at: Txid,
        depth_required: u32,
    ) {
        if let Some(entry) = self.entries.get_mut(&outpoint) {
            entry.bucket = NurseryBucket::Kindergarten {
                confirmed_at,
                depth_required,
            };
        }
    }

    /// Advances every kindergarten entry confirmed in `txid_confirmed`'s
    /// block by one confirmation, graduating any that reach their required
    /// depth. Returns the outpoints that graduated this round.
    pub fn advance(&mut self, txid_confirmed: Txid, depth: u32) -> Vec<OutPoint> {
        let mut graduated = Vec::new();
        for (outpoint, entry) in self.entries.iter_mut() {
            if let NurseryBucket::Kindergarten {
                confirmed_at,
                depth_required,
            } = entry.bucket
            {
                if confirmed_at == txid_confirmed && depth >= depth_required {
                    entry.bucket = NurseryBucket::Graduated;
                    graduated.push(*outpoint);
                }
            }
        }
        graduated
    }

    pub fn bucket_of(&self, outpoint: OutPoint) -> Option<NurseryBucket> {
        self.entries.get(&outpoint).map(|e| e.bucket)
    }

    pub fn forget_graduated(&mut self) {
        self.entries
            .retain(|_, entry| !matches!(entry.bucket, NurseryBucket::Graduated));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;

    fn outpoint(vout: u32) -> OutPoint {
        OutPoint::new(Txid::from_slice(&[1u8; 32]).unwrap(), vout)
    }

    #[test]
    fn graduates_only_at_required_depth() {
        let mut nursery = UtxoNursery::new();
        let op = outpoint(0);
        nursery.admit(op);
        let confirmed_in = Txid::from_slice(&[2u8; 32]).unwrap();
        nursery.promote_to_kindergarten(op, confirmed_in, 3);

        assert!(nursery.advance(confirmed_in, 1).is_empty());
        assert!(nursery.advance(confirmed_in, 2).is_empty());
        let graduated = nursery.advance(confirmed_in, 3);
        assert_eq!(graduated, vec![op]);
        assert!(matches!(
            nursery.bucket_of(op),
            Some(NurseryBucket::Graduated)
        ));
    }
}
