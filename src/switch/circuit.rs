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

//! The circuit map: ties an outgoing HTLC back to the incoming HTLC that
//! caused it, so a settle or fail arriving on the outgoing link can be
//! mirrored onto the correct incoming link.

use std::collections::HashMap;

use crate::wire::ShortChannelId;

/// One forwarded HTLC's incoming/outgoing pairing.
#[derive(Clone, Copy, Debug)]
pub struct Circuit {
    pub incoming_scid: ShortChannelId,
    pub incoming_htlc_id: u64,
    pub outgoing_scid: ShortChannelId,
    pub outgoing_htlc_id: u64,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
struct OutgoingKey(ShortChannelId, u64);

#[derive(Default)]
pub struct CircuitMap {
    by_outgoing: HashMap<OutgoingKey, Circuit>,
}

impl CircuitMap {
    pub fn new() -> Self {
        CircuitMap::default()
    }

    pub fn open(&mut self, circuit: Circuit) {
        self.by_outgoing.insert(
            OutgoingKey(circuit.outgoing_scid, circuit.outgoing_htlc_id),
            circuit,
        );
    }

    /// Removes and returns the circuit for a resolved outgoing HTLC. A
    /// circuit is consumed exactly once, whether by settle or by fail —
    /// whichever resolution reaches the switch first.
    pub fn take_by_outgoing(
        &mut self,
        outgoing_scid: ShortChannelId,
        outgoing_htlc_id: u64,
    ) -> Option<Circuit> {
        self.by_outgoing
            .remove(&OutgoingKey(outgoing_scid, outgoing_htlc_id))
    }

    pub fn len(&self) -> usize {
        self.by_outgoing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_outgoing.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_resolves_exactly_once() {
        let mut map = CircuitMap::new();
        map.open(Circuit {
            incoming_scid: ShortChannelId(1),
            incoming_htlc_id: 7,
            outgoing_scid: ShortChannelId(2),
            outgoing_htlc_id: 3,
        });
        assert_eq!(map.len(), 1);
        let found = map.take_by_outgoing(ShortChannelId(2), 3);
        assert!(found.is_some());
        assert!(map.is_empty());
        assert!(map.take_by_outgoing(ShortChannelId(2), 3).is_none());
    }
}
