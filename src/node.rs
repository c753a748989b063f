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

//! The operator surface (§6, §10): a small in-process command enum
//! dispatched by a handle, standing in for the gRPC/CLI surface that is an
//! external collaborator out of scope here. [`Node`] is the single task that
//! owns the switch and the contract court; every other task — one per link,
//! per resolver — only ever reaches them through this command channel or
//! through the channels those subsystems already expose on their own.

use std::sync::Arc;

use bitcoin::secp256k1::PublicKey;
use log::{info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;

use crate::chan::Channel;
use crate::court::ContractCourt;
use crate::link::{ExitOnlyPeeler, ForwardingPolicy, LinkCommand, LockedInHtlc, OnionPeeler, PeerLink};
use crate::switch::{self, ForwardPacket, Switch};
use crate::wire::{Message, PaymentHash, ShortChannelId};

/// One link's locked-in classification tagged with the incoming short
/// channel id it arrived on, so a single node-wide aggregator can route it
/// back into the switch without each link needing to know its own scid in
/// advance of registration.
struct TaggedLockedIn {
    incoming_scid: ShortChannelId,
    htlc: LockedInHtlc,
}

/// Commands accepted by a running [`Node`]. Each carries its own reply
/// channel; a command whose reply is dropped (e.g. the node shut down mid
/// request) leaves the caller with a closed-channel error rather than
/// hanging forever.
pub enum NodeCommand {
    /// Spawns a [`PeerLink`] task for an already-negotiated channel and
    /// registers it with the switch under `scid`.
    OpenLink {
        channel: Channel,
        peer: PublicKey,
        scid: ShortChannelId,
        forwarding_policy: ForwardingPolicy,
        outbox: mpsc::UnboundedSender<Message>,
        reply: oneshot::Sender<()>,
    },
    /// Originates a payment from this node on the named outgoing link.
    SendPayment {
        scid: ShortChannelId,
        amount_msat: u64,
        payment_hash: PaymentHash,
        cltv_expiry: u32,
        onion_routing_packet: Vec<u8>,
        reply: oneshot::Sender<Result<u64, switch::Error>>,
    },
    CloseLink {
        scid: ShortChannelId,
    },
    ListLinks {
        reply: oneshot::Sender<Vec<ShortChannelId>>,
    },
    Shutdown,
}

/// A cheap handle to a running [`Node`]; clone freely, one per caller.
#[derive(Clone)]
pub struct NodeHandle {
    commands: mpsc::UnboundedSender<NodeCommand>,
}

impl NodeHandle {
    pub async fn open_link(
        &self,
        channel: Channel,
        peer: PublicKey,
        scid: ShortChannelId,
        forwarding_policy: ForwardingPolicy,
        outbox: mpsc::UnboundedSender<Message>,
    ) {
        let (reply, recv) = oneshot::channel();
        let _ = self.commands.send(NodeCommand::OpenLink {
            channel,
            peer,
            scid,
            forwarding_policy,
            outbox,
            reply,
        });
        let _ = recv.await;
    }

    pub async fn send_payment(
        &self,
        scid: ShortChannelId,
        amount_msat: u64,
        payment_hash: PaymentHash,
        cltv_expiry: u32,
        onion_routing_packet: Vec<u8>,
    ) -> Result<u64, switch::Error> {
        let (reply, recv) = oneshot::channel();
        let _ = self.commands.send(NodeCommand::SendPayment {
            scid,
            amount_msat,
            payment_hash,
            cltv_expiry,
            onion_routing_packet,
            reply,
        });
        recv.await.unwrap_or(Err(switch::Error::LinkNotFound(scid)))
    }

    pub fn close_link(&self, scid: ShortChannelId) {
        let _ = self.commands.send(NodeCommand::CloseLink { scid });
    }

    pub async fn list_links(&self) -> Vec<ShortChannelId> {
        let (reply, recv) = oneshot::channel();
        let _ = self.commands.send(NodeCommand::ListLinks { reply });
        recv.await.unwrap_or_default()
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(NodeCommand::Shutdown);
    }
}

/// Owns the switch and the contract court and drives both from a single
/// command loop plus the switch's stats tick, the way [`PeerLink::run`]
/// drives one channel off its own pair of timers.
pub struct Node {
    switch: Switch,
    court: ContractCourt,
    commands: mpsc::UnboundedReceiver<NodeCommand>,
    link_scids: Vec<ShortChannelId>,
    onion_peeler: Arc<dyn OnionPeeler>,
    locked_in_tx: mpsc::UnboundedSender<TaggedLockedIn>,
    locked_in_rx: mpsc::UnboundedReceiver<TaggedLockedIn>,
}

impl Node {
    pub fn new(switch: Switch) -> (Self, NodeHandle) {
        Self::with_onion_peeler(switch, Arc::new(ExitOnlyPeeler))
    }

    /// Builds a node wired to a specific onion-peeling collaborator. Use
    /// this instead of [`Node::new`] once a real Sphinx-peeling
    /// implementation is available; absent one, every locked-in HTLC is
    /// treated as terminating at this node.
    pub fn with_onion_peeler(switch: Switch, onion_peeler: Arc<dyn OnionPeeler>) -> (Self, NodeHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (locked_in_tx, locked_in_rx) = mpsc::unbounded_channel();
        (
            Node {
                switch,
                court: ContractCourt::new(),
                commands: rx,
                link_scids: Vec::new(),
                onion_peeler,
                locked_in_tx,
                locked_in_rx,
            },
            NodeHandle { commands: tx },
        )
    }

    pub fn court_mut(&mut self) -> &mut ContractCourt {
        &mut self.court
    }

    pub async fn run(mut self) {
        let mut stats_tick = interval(self.switch.stats_tick_interval());
        loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    match cmd {
                        Some(NodeCommand::Shutdown) | None => {
                            info!(target: "node", "shutting down");
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd).await,
                    }
                }
                _ = stats_tick.tick() => {
                    self.switch.log_and_reset_stats();
                }
                Some(tagged) = self.locked_in_rx.recv() => {
                    self.handle_locked_in(tagged).await;
                }
            }
        }
    }

    /// Routes one link's locked-in classification into the switch: a
    /// forward is handed on to the next hop, an exit is this node's
    /// terminal payment — settling or failing it is invoice registry's job
    /// (an external collaborator, consumed not specified here), so this
    /// only logs that the HTLC arrived at its destination.
    async fn handle_locked_in(&mut self, tagged: TaggedLockedIn) {
        match tagged.htlc {
            LockedInHtlc::Exit { htlc_id, payment_hash } => {
                info!(
                    target: "node",
                    "htlc {} on {:?} reached its final hop for payment_hash {:?}; awaiting invoice resolution",
                    htlc_id, tagged.incoming_scid, payment_hash
                );
            }
            LockedInHtlc::Forward {
                htlc_id,
                outgoing_scid,
                amount_msat,
                payment_hash,
                cltv_expiry,
                onion_routing_packet,
            } => {
                let packet = ForwardPacket {
                    incoming_scid: tagged.incoming_scid,
                    incoming_htlc_id: htlc_id,
                    outgoing_scid,
                    amount_msat,
                    payment_hash,
                    cltv_expiry,
                    onion_routing_packet,
                };
                if let Err(err) = self.switch.forward(packet).await {
                    warn!(target: "node", "forward of htlc {} from {:?} failed: {}", htlc_id, tagged.incoming_scid, err);
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: NodeCommand) {
        match cmd {
            NodeCommand::OpenLink {
                channel,
                peer,
                scid,
                forwarding_policy,
                outbox,
                reply,
            } => {
                let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
                let (locked_in_tx, mut locked_in_rx) = mpsc::unbounded_channel::<LockedInHtlc>();
                let config = crate::config::NodeConfig::default();
                let link = PeerLink::new(
                    channel,
                    forwarding_policy.clone(),
                    self.onion_peeler.clone(),
                    &config,
                    cmd_rx,
                    outbox,
                    locked_in_tx,
                );
                self.switch.register_link(scid, peer, cmd_tx, forwarding_policy);
                self.link_scids.push(scid);
                tokio::spawn(link.run());
                // Tags every classification this link produces with its
                // own short channel id and relays it into the node-wide
                // aggregator `run` drains in its `select!` loop.
                let node_locked_in = self.locked_in_tx.clone();
                tokio::spawn(async move {
                    while let Some(htlc) = locked_in_rx.recv().await {
                        let _ = node_locked_in.send(TaggedLockedIn {
                            incoming_scid: scid,
                            htlc,
                        });
                    }
                });
                let _ = reply.send(());
            }
            NodeCommand::SendPayment {
                scid,
                amount_msat,
                payment_hash,
                cltv_expiry,
                onion_routing_packet,
                reply,
            } => {
                let result = self
                    .switch
                    .send_htlc(scid, amount_msat, payment_hash, cltv_expiry, onion_routing_packet)
                    .await;
                let _ = reply.send(result);
            }
            NodeCommand::CloseLink { scid } => {
                self.switch.close_link(scid);
                self.link_scids.retain(|s| *s != scid);
            }
            NodeCommand::ListLinks { reply } => {
                let _ = reply.send(self.link_scids.clone());
            }
            NodeCommand::Shutdown => {}
        }
    }
}
