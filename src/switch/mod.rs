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

//! C4: the HTLC switch. Holds the registry of active links keyed by
//! `(short_channel_id, peer pubkey)`, dispatches `forward` packets to the
//! right link, and keeps the circuit map that lets a settle/fail find its
//! way back to the link it arrived on.

pub mod circuit;
pub mod payment;

pub use circuit::{Circuit, CircuitMap};
pub use payment::{PaymentControl, PaymentOutcome, PaymentStatus};

use std::collections::HashMap;
use std::time::Duration;

use bitcoin::secp256k1::PublicKey;
use log::info;
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;

use crate::link::{ForwardingPolicy, LinkCommand};
use crate::wire::{PaymentHash, ShortChannelId};

#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum Error {
    /// no active link is registered for short_channel_id {0}
    LinkNotFound(ShortChannelId),

    /// requested amount {amount} msat is below link {scid}'s advertised
    /// minimum of {minimum} msat
    BelowMinimum {
        scid: ShortChannelId,
        amount: u64,
        minimum: u64,
    },

    /// requested amount {amount} msat exceeds link {scid}'s advertised
    /// maximum of {maximum} msat
    AboveMaximum {
        scid: ShortChannelId,
        amount: u64,
        maximum: u64,
    },

    /// circuit for HTLC {0} on the forwarding path is unknown; it may have
    /// already been torn down
    UnknownCircuit(u64),
}

struct LinkHandle {
    peer: PublicKey,
    commands: mpsc::UnboundedSender<LinkCommand>,
    policy: ForwardingPolicy,
}

/// A single incoming-HTLC-add request to forward or terminate.
pub struct ForwardPacket {
    pub incoming_scid: ShortChannelId,
    pub incoming_htlc_id: u64,
    pub outgoing_scid: ShortChannelId,
    pub amount_msat: u64,
    pub payment_hash: PaymentHash,
    pub cltv_expiry: u32,
    pub onion_routing_packet: Vec<u8>,
}

/// Central dispatcher tying every active [`crate::link::PeerLink`] into one
/// routing surface. Runs as a single task; every registry mutation and
/// forwarding decision happens on it, so no locking is needed around the
/// registry itself.
pub struct Switch {
    links: HashMap<ShortChannelId, LinkHandle>,
    circuits: CircuitMap,
    forwarded_since_tick: u64,
    failed_since_tick: u64,
    stats_tick_interval: Duration,
}

impl Switch {
    pub fn new(stats_tick_interval: Duration) -> Self {
        Switch {
            links: HashMap::new(),
            circuits: CircuitMap::new(),
            forwarded_since_tick: 0,
            failed_since_tick: 0,
            stats_tick_interval,
        }
    }

    pub fn register_link(
        &mut self,
        scid: ShortChannelId,
        peer: PublicKey,
        commands: mpsc::UnboundedSender<LinkCommand>,
        policy: ForwardingPolicy,
    ) {
        self.links.insert(
            scid,
            LinkHandle {
                peer,
                commands,
                policy,
            },
        );
    }

    /// Removes a link from the registry, e.g. because its channel closed.
    /// Any circuits still open through it are left for the caller to fail
    /// back explicitly — the switch does not guess at their outcome.
    pub fn close_link(&mut self, scid: ShortChannelId) {
        self.links.remove(&scid);
    }

    pub fn link_peer(&self, scid: ShortChannelId) -> Option<PublicKey> {
        self.links.get(&scid).map(|l| l.peer)
    }

    /// Originates a new payment on this node: adds an HTLC directly to the
    /// named outgoing link with no incoming circuit to later settle back
    /// through (there is none — we originated it).
    pub async fn send_htlc(
        &mut self,
        scid: ShortChannelId,
        amount_msat: u64,
        payment_hash: PaymentHash,
        cltv_expiry: u32,
        onion_routing_packet: Vec<u8>,
    ) -> Result<u64, Error> {
        let link = self.links.get(&scid).ok_or(Error::LinkNotFound(scid))?;
        self.check_policy(scid, amount_msat)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = link.commands.send(LinkCommand::AddHtlc {
            amount_msat,
            payment_hash,
            cltv_expiry,
            onion_routing_packet,
            reply: reply_tx,
        });
        reply_rx
            .await
            .map_err(|_| Error::LinkNotFound(scid))?
            .map_err(|_| Error::LinkNotFound(scid))
    }

    /// Forwards an HTLC that locked in on an incoming link to the next hop,
    /// registering a circuit so the eventual settle/fail routes back.
    pub async fn forward(&mut self, packet: ForwardPacket) -> Result<(), Error> {
        self.check_policy(packet.outgoing_scid, packet.amount_msat)?;
        let outgoing_htlc_id = self
            .send_htlc(
                packet.outgoing_scid,
                packet.amount_msat,
                packet.payment_hash,
                packet.cltv_expiry,
                packet.onion_routing_packet,
            )
            .await?;
        self.circuits.open(Circuit {
            incoming_scid: packet.incoming_scid,
            incoming_htlc_id: packet.incoming_htlc_id,
            outgoing_scid: packet.outgoing_scid,
            outgoing_htlc_id,
        });
        self.forwarded_since_tick += 1;
        Ok(())
    }

    /// Settles the incoming side of a circuit once the outgoing side
    /// settled, completing the forward.
    pub fn settle_forwarded(&mut self, outgoing_scid: ShortChannelId, outgoing_htlc_id: u64) {
        if let Some(circuit) = self
            .circuits
            .take_by_outgoing(outgoing_scid, outgoing_htlc_id)
        {
            if let Some(link) = self.links.get(&circuit.incoming_scid) {
                let _ = link.commands.send(LinkCommand::SettleHtlc {
                    htlc_id: circuit.incoming_htlc_id,
                });
            }
        }
    }

    /// Fails the incoming side of a circuit once the outgoing side failed
    /// or the forward itself could not be attempted.
    pub fn fail_forwarded(&mut self, outgoing_scid: ShortChannelId, outgoing_htlc_id: u64) {
        if let Some(circuit) = self
            .circuits
            .take_by_outgoing(outgoing_scid, outgoing_htlc_id)
        {
            if let Some(link) = self.links.get(&circuit.incoming_scid) {
                let _ = link.commands.send(LinkCommand::FailHtlc {
                    htlc_id: circuit.incoming_htlc_id,
                });
            }
            self.failed_since_tick += 1;
        }
    }

    fn check_policy(&self, scid: ShortChannelId, amount_msat: u64) -> Result<(), Error> {
        let link = self.links.get(&scid).ok_or(Error::LinkNotFound(scid))?;
        if amount_msat < link.policy.htlc_minimum_msat {
            return Err(Error::BelowMinimum {
                scid,
                amount: amount_msat,
                minimum: link.policy.htlc_minimum_msat,
            });
        }
        if amount_msat > link.policy.htlc_maximum_msat {
            return Err(Error::AboveMaximum {
                scid,
                amount: amount_msat,
                maximum: link.policy.htlc_maximum_msat,
            });
        }
        Ok(())
    }

    /// Logs one `info` line for the counters accrued since the last tick,
    /// but only when something actually happened, per §4.4's "emits one log
    /// line per interval with non-zero activity" requirement, then resets
    /// them.
    pub fn log_and_reset_stats(&mut self) {
        if self.forwarded_since_tick > 0 || self.failed_since_tick > 0 {
            info!(
                target: "switch",
                "forwarded={} failed={} active_links={}",
                self.forwarded_since_tick,
                self.failed_since_tick,
                self.links.len(),
            );
            self.forwarded_since_tick = 0;
            self.failed_since_tick = 0;
        }
    }

    pub fn stats_tick_interval(&self) -> Duration {
        self.stats_tick_interval
    }

    /// Runs the stats ticker on its own loop: logs and resets once per
    /// interval. Useful when the switch isn't otherwise being driven by a
    /// surrounding command loop (see [`crate::node::Node::run`] for the
    /// alternative of folding the same tick into a `select!`).
    pub async fn run_stats_ticker(&mut self) {
        let mut tick = interval(self.stats_tick_interval);
        loop {
            tick.tick().await;
            self.log_and_reset_stats();
        }
    }
}
