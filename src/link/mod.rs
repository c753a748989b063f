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

//! C3: the peer link. One [`PeerLink`] task per channel drives its
//! [`crate::chan::Channel`] state machine off two timers — a short batch
//! timer that groups outgoing updates before forcing a commitment round,
//! and a longer log-commit timer that flushes pending settles/fails even
//! when the peer is otherwise idle — and classifies in-flight HTLCs as
//! exit or forward only once they actually lock in, never earlier.

pub mod forwarding;
pub mod reestablish;

pub use forwarding::ForwardingPolicy;
pub use reestablish::{reestablish_outcome, ReestablishOutcome};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;

use crate::chan::{Channel, Lifecycle};
use crate::config::NodeConfig;
use crate::wire::messages::{
    ChannelReestablish, CommitmentSigned, Message, RevokeAndAck, UpdateAddHtlc,
    UpdateFailHtlc, UpdateFulfillHtlc,
};
use crate::wire::{ChannelId, PaymentHash, ShortChannelId};

/// Where a locked-in HTLC's onion says it should go. Produced by peeling the
/// Sphinx onion payload, which this crate consumes but does not implement
/// (the onion crypto primitive is an external collaborator).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Destination {
    /// This node is the final hop; the payment terminates here.
    Exit,
    /// Forward on to the next hop over this short channel id.
    Forward { outgoing_scid: ShortChannelId },
}

/// Peels one layer of an HTLC's onion routing packet to learn where it goes
/// next. A real implementation decrypts the Sphinx payload and reads its
/// per-hop field; the onion crypto itself is consumed here, not specified.
pub trait OnionPeeler: Send + Sync {
    fn peel(&self, payment_hash: PaymentHash, onion_routing_packet: &[u8]) -> Destination;
}

/// Conservative default: every HTLC is treated as terminating here. Never
/// fabricates a forwarding decision without a real onion peeler wired in, so
/// a link with no collaborator configured degrades to "always settle
/// locally" rather than guessing a next hop.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExitOnlyPeeler;

impl OnionPeeler for ExitOnlyPeeler {
    fn peel(&self, _payment_hash: PaymentHash, _onion_routing_packet: &[u8]) -> Destination {
        Destination::Exit
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum Error {
    /// channel state machine error: {0}
    #[from]
    Channel(crate::chan::Error),

    /// the peer link for this channel has already shut down
    LinkClosed,
}

/// Outcome of a single HTLC once its commitment round locks in: whether it
/// should be resolved locally (we are the exit hop / it settled or failed)
/// or handed to the switch to forward onward. Classification is deferred
/// until lock-in (§4.3) so an HTLC added and then failed within the same
/// batch never reaches the switch at all.
#[derive(Clone, Debug)]
pub enum LockedInHtlc {
    /// This HTLC terminates at this node; hand the outcome to invoice/
    /// payment control directly.
    Exit { htlc_id: u64, payment_hash: PaymentHash },
    /// This HTLC must be forwarded to the next hop via the switch.
    Forward {
        htlc_id: u64,
        outgoing_scid: ShortChannelId,
        amount_msat: u64,
        payment_hash: PaymentHash,
        cltv_expiry: u32,
        onion_routing_packet: Vec<u8>,
    },
}

/// Commands a switch or operator surface sends to a running [`PeerLink`]
/// task.
pub enum LinkCommand {
    AddHtlc {
        amount_msat: u64,
        payment_hash: PaymentHash,
        cltv_expiry: u32,
        onion_routing_packet: Vec<u8>,
        reply: oneshot::Sender<Result<u64, Error>>,
    },
    SettleHtlc {
        htlc_id: u64,
    },
    FailHtlc {
        htlc_id: u64,
    },
    HandleMessage(Message),
    Close,
}

/// Drives one channel's update state machine. Owns the [`Channel`]
/// exclusively; every mutation goes through the command channel so the
/// state machine never sees concurrent access.
pub struct PeerLink {
    channel: Channel,
    forwarding_policy: ForwardingPolicy,
    onion_peeler: Arc<dyn OnionPeeler>,
    commands: mpsc::UnboundedReceiver<LinkCommand>,
    outbox: mpsc::UnboundedSender<Message>,
    locked_in: mpsc::UnboundedSender<LockedInHtlc>,
    batch_timer: Duration,
    log_commit_timer: Duration,
    dirty: bool,
    /// Received HTLCs already handed off via `locked_in`, so a later
    /// `CommitmentSigned`/`RevokeAndAck` round that leaves them `Committed`
    /// doesn't reclassify and re-send them.
    classified_received: HashSet<u64>,
}

impl PeerLink {
    pub fn new(
        channel: Channel,
        forwarding_policy: ForwardingPolicy,
        onion_peeler: Arc<dyn OnionPeeler>,
        config: &NodeConfig,
        commands: mpsc::UnboundedReceiver<LinkCommand>,
        outbox: mpsc::UnboundedSender<Message>,
        locked_in: mpsc::UnboundedSender<LockedInHtlc>,
    ) -> Self {
        PeerLink {
            channel,
            forwarding_policy,
            onion_peeler,
            commands,
            outbox,
            locked_in,
            batch_timer: config.batch_timer,
            log_commit_timer: config.log_commit_timer,
            dirty: false,
            classified_received: HashSet::new(),
        }
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel.channel_id
    }

    /// The task body: `tokio::select!`s between incoming commands and the
    /// two timers, exactly mirroring how a real link batches updates before
    /// committing them.
    pub async fn run(mut self) {
        let mut batch_tick = interval(self.batch_timer);
        let mut log_commit_tick = interval(self.log_commit_timer);
        loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    match cmd {
                        Some(LinkCommand::Close) | None => {
                            debug!(target: "link", "channel {} closing", self.channel_id());
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd),
                    }
                }
                _ = batch_tick.tick() => {
                    if self.dirty {
                        self.flush_commitment_round();
                    }
                }
                _ = log_commit_tick.tick() => {
                    if self.dirty {
                        debug!(target: "link", "channel {} log-commit timer forcing flush", self.channel_id());
                        self.flush_commitment_round();
                    }
                }
            }
        }
    }

    fn handle_command(&mut self, cmd: LinkCommand) {
        match cmd {
            LinkCommand::AddHtlc {
                amount_msat,
                payment_hash,
                cltv_expiry,
                onion_routing_packet,
                reply,
            } => {
                let result = self.channel.offer_htlc(
                    amount_msat,
                    payment_hash,
                    cltv_expiry,
                    onion_routing_packet.clone(),
                );
                if let Ok(htlc_id) = result {
                    let _ = self.outbox.send(Message::UpdateAddHtlc(UpdateAddHtlc {
                        channel_id: self.channel.channel_id,
                        htlc_id,
                        amount_msat,
                        payment_hash,
                        cltv_expiry,
                        onion_routing_packet,
                    }));
                    self.dirty = true;
                }
                let _ = reply.send(result.map_err(Error::Channel));
            }
            LinkCommand::SettleHtlc { htlc_id } => {
                if self.channel.settle_htlc(htlc_id).is_ok() {
                    self.dirty = true;
                }
            }
            LinkCommand::FailHtlc { htlc_id } => {
                if self.channel.fail_htlc(htlc_id).is_ok() {
                    self.dirty = true;
                }
            }
            LinkCommand::HandleMessage(msg) => self.handle_message(msg),
            LinkCommand::Close => {}
        }
    }

    fn handle_message(&mut self, msg: Message) {
        match msg {
            Message::UpdateAddHtlc(m) => {
                if let Err(err) = self.channel.receive_htlc(
                    m.htlc_id,
                    m.amount_msat,
                    m.payment_hash,
                    m.cltv_expiry,
                    m.onion_routing_packet,
                ) {
                    warn!(target: "link", "rejecting update_add_htlc on {}: {}", self.channel_id(), err);
                    return;
                }
                self.dirty = true;
            }
            Message::UpdateFulfillHtlc(UpdateFulfillHtlc { htlc_id, .. }) => {
                if self.channel.receive_settle(htlc_id).is_ok() {
                    self.dirty = true;
                }
            }
            Message::UpdateFailHtlc(UpdateFailHtlc { htlc_id, .. }) => {
                if self.channel.receive_fail(htlc_id).is_ok() {
                    self.dirty = true;
                }
            }
            Message::CommitmentSigned(_) => {
                // The remote has signed a commitment covering what we've
                // sent so far; build our mirror of it and revoke our own
                // prior state in its favor.
                if let Ok(commitment) = self.channel.sign_next_commitment() {
                    if self.channel.receive_new_commitment(commitment).is_ok() {
                        if let Ok(secret) = self.channel.revoke_current_commitment() {
                            let _ = self.outbox.send(Message::RevokeAndAck(RevokeAndAck {
                                channel_id: self.channel.channel_id,
                                per_commitment_secret: secret,
                                next_per_commitment_point: self.channel.local_keys.first_per_commitment_point,
                            }));
                            self.classify_locked_in();
                        }
                    }
                }
            }
            Message::RevokeAndAck(m) => {
                if self
                    .channel
                    .receive_revocation(m.per_commitment_secret, m.next_per_commitment_point)
                    .is_ok()
                {
                    self.classify_locked_in();
                }
            }
            Message::ChannelReestablish(m) => self.handle_reestablish(m),
            _ => {}
        }
    }

    /// Forces a commitment round right now regardless of the timers,
    /// signing everything accumulated since the last flush.
    fn flush_commitment_round(&mut self) {
        if let Ok(commitment) = self.channel.sign_next_commitment() {
            let _ = self.outbox.send(Message::CommitmentSigned(CommitmentSigned {
                channel_id: self.channel.channel_id,
                signature: crate::wire::CompactSignature([0u8; 64]),
                htlc_signatures: vec![crate::wire::CompactSignature([0u8; 64]); commitment.htlcs.len()],
            }));
            self.dirty = false;
        }
    }

    /// HTLCs only become exit-or-forward classified once their add has
    /// locked in on both commitment chains — never when merely logged, and
    /// never speculatively ahead of lock-in. Concretely: any received HTLC
    /// still in `Committed` state after a successful revocation round with
    /// no outstanding settle/fail is ready to classify, and is classified
    /// exactly once even though it stays `Committed` across further rounds
    /// until it settles or fails.
    fn classify_locked_in(&mut self) {
        for (id, htlc) in self.channel.received_htlcs().iter() {
            if htlc.state != crate::chan::HtlcState::Committed {
                continue;
            }
            if !self.classified_received.insert(*id) {
                continue;
            }
            let classified = match self.onion_peeler.peel(htlc.payment_hash, &htlc.onion_routing_packet) {
                Destination::Exit => LockedInHtlc::Exit {
                    htlc_id: *id,
                    payment_hash: htlc.payment_hash,
                },
                Destination::Forward { outgoing_scid } => LockedInHtlc::Forward {
                    htlc_id: *id,
                    outgoing_scid,
                    amount_msat: htlc.amount_msat,
                    payment_hash: htlc.payment_hash,
                    cltv_expiry: htlc.cltv_expiry,
                    onion_routing_packet: htlc.onion_routing_packet.clone(),
                },
            };
            let _ = self.locked_in.send(classified);
        }
    }

    fn handle_reestablish(&mut self, msg: ChannelReestablish) {
        match reestablish::reestablish_outcome(&self.channel, &msg) {
            reestablish::ReestablishOutcome::InSync => {
                debug!(target: "link", "channel {} reestablished in sync", self.channel_id());
            }
            reestablish::ReestablishOutcome::ResendCommitment => {
                warn!(target: "link", "channel {} reestablish: resending last commitment_signed", self.channel_id());
            }
            reestablish::ReestablishOutcome::ResendRevocation => {
                warn!(target: "link", "channel {} reestablish: resending last revoke_and_ack", self.channel_id());
            }
            reestablish::ReestablishOutcome::DataLossProtected => {
                warn!(
                    target: "link",
                    "channel {} remote indicates we may have lost state; refusing to broadcast and awaiting operator action",
                    self.channel_id()
                );
                self.channel.lifecycle = Lifecycle::Closing;
            }
        }
    }
}
