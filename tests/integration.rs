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

//! End-to-end scenarios spanning more than one module: a payment that
//! settles across a full commitment round, a breach handled by the contract
//! court and checkpointed to disk, a forward routed through the switch's
//! circuit map, and a reconnection that correctly detects lost state.

use amplify::DumbDefault;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use bitcoin::{OutPoint, Transaction, Txid};

use lightning_core::chan::keyset::{LocalKeyset, RemoteKeyset};
use lightning_core::chan::policy::Policy;
use lightning_core::chan::shachain::ShachainSeed;
use lightning_core::chan::{Channel, Commitment, HtlcState, Lifecycle};
use lightning_core::court::{ContractCourt, ResolverRecord};
use lightning_core::db::ChannelDb;
use lightning_core::link::{reestablish_outcome, ForwardingPolicy, ReestablishOutcome};
use lightning_core::switch::{Circuit, CircuitMap, ForwardPacket, PaymentControl, Switch};
use lightning_core::wire::messages::ChannelReestablish;
use lightning_core::wire::{ChannelId, PaymentHash, ShortChannelId};

fn opening_channel(funding_vout: u32, seed: [u8; 32]) -> Channel {
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
        ChannelId([7u8; 32]),
        OutPoint::new(Txid::from_slice(&[3u8; 32]).unwrap(), funding_vout),
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
        ShachainSeed::new(seed),
        local_keys.first_per_commitment_point,
    );
    channel.lifecycle = Lifecycle::Active;
    channel
}

/// Scenario 1 (single-hop payment): an HTLC is offered, committed, revoked
/// on both sides and settled, and the channel database durably records the
/// revocation secret before that round's `revoke_and_ack` would have gone
/// out over the wire.
#[test]
fn single_hop_payment_settles_and_persists_revocation() {
    let mut channel = opening_channel(0, [11u8; 32]);
    let channel_id = channel.channel_id;
    let dir = tempfile::tempdir().unwrap();
    let db = ChannelDb::open(dir.path()).unwrap();

    let htlc_id = channel
        .offer_htlc(
            250_000,
            PaymentHash([5u8; 32]),
            600_000,
            vec![0u8; 1300],
        )
        .unwrap();

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

    // Rule 1: the revocation secret must hit disk before `revoke_and_ack`
    // is considered sent.
    let secret = channel.revoke_current_commitment().unwrap();
    db.persist_revocation_secret(channel_id, 0, secret).unwrap();
    assert_eq!(db.load_revocation_secret(channel_id, 0).unwrap(), secret);

    let our_commitment = channel.sign_next_commitment().unwrap();
    assert_eq!(our_commitment.htlcs.len(), 1);
    channel
        .receive_revocation([0u8; 32], channel.remote_keys.first_per_commitment_point)
        .unwrap();

    channel.receive_settle(htlc_id).unwrap();
    assert_eq!(
        channel.offered_htlcs()[&htlc_id].state,
        HtlcState::PendingRemove
    );

    let settle_commitment = Commitment::build(
        channel.local_commitment_number() + 1,
        channel.local_amount_msat,
        channel.remote_amount_msat,
        channel.feerate_per_kw,
        channel.dust_limit_satoshis,
        channel.is_initiator,
        std::iter::empty(),
    );
    channel.receive_new_commitment(settle_commitment).unwrap();
    channel.revoke_current_commitment().unwrap();

    assert!(!channel.offered_htlcs().contains_key(&htlc_id));
    assert_eq!(channel.remote_amount_msat, 5_000_000_000 + 250_000);

    db.store_channel(channel_id, &channel).unwrap();
    let record = db.load_channel(channel_id).unwrap();
    assert!(record.offered_htlcs.is_empty());
    assert_eq!(record.remote_amount_msat, channel.remote_amount_msat);
}

/// Scenario 4 (breach retribution): a revoked commitment is broadcast; the
/// contract court dispatches a justice resolver for every output, admits
/// them to the nursery, and the resolver's progress is checkpointed to disk
/// before it would be marked broadcast.
#[test]
fn breach_dispatches_justice_resolver_and_checkpoints_before_broadcast() {
    let mut court = ContractCourt::new();
    let funding_outpoint = OutPoint::new(Txid::from_slice(&[4u8; 32]).unwrap(), 0);
    court.watch(funding_outpoint, ShortChannelId::new(700_000, 1, 0));

    let breach_tx = Transaction {
        version: 2,
        lock_time: bitcoin::PackedLockTime(0),
        input: vec![],
        output: vec![
            bitcoin::TxOut {
                value: 100_000,
                script_pubkey: bitcoin::Script::new(),
            },
            bitcoin::TxOut {
                value: 50_000,
                script_pubkey: bitcoin::Script::new(),
            },
        ],
    };
    court
        .handle_funding_spend(
            funding_outpoint,
            &breach_tx,
            lightning_core::court::SpendKind::RevokedCommitment,
            &[None, None],
        )
        .unwrap();

    assert_eq!(court.resolvers().len(), 2);
    for resolver in court.resolvers() {
        assert!(matches!(
            resolver.kind,
            lightning_core::court::ResolverKind::Justice
        ));
    }

    let channel_id = ChannelId([8u8; 32]);
    let dir = tempfile::tempdir().unwrap();
    let db = ChannelDb::open(dir.path()).unwrap();
    let mut record: ResolverRecord = court.resolvers()[0].clone();

    // Rule 2: checkpoint to disk must happen before the sweep is marked
    // broadcast.
    record.mark_checkpointed();
    db.checkpoint_resolver(channel_id, &record).unwrap();
    record.mark_broadcast().unwrap();
    assert!(record.mark_broadcast().is_err());
}

/// A force-close dispatches a distinct resolver per output depending on its
/// role: the to-local output gets a commitment sweep, an HTLC we offered
/// gets a timeout claim, and an HTLC offered to us gets a success claim only
/// once we hold its preimage.
#[test]
fn force_close_dispatches_resolver_per_output_role() {
    use lightning_core::court::{CommitmentOutputRole, ResolverKind, SpendKind};

    let mut court = ContractCourt::new();
    let funding_outpoint = OutPoint::new(Txid::from_slice(&[9u8; 32]).unwrap(), 0);
    court.watch(funding_outpoint, ShortChannelId::new(701_000, 1, 0));

    let force_close_tx = Transaction {
        version: 2,
        lock_time: bitcoin::PackedLockTime(0),
        input: vec![],
        output: vec![
            bitcoin::TxOut {
                value: 900_000,
                script_pubkey: bitcoin::Script::new(),
            },
            bitcoin::TxOut {
                value: 50_000,
                script_pubkey: bitcoin::Script::new(),
            },
            bitcoin::TxOut {
                value: 25_000,
                script_pubkey: bitcoin::Script::new(),
            },
        ],
    };
    court
        .handle_funding_spend(
            funding_outpoint,
            &force_close_tx,
            SpendKind::LocalCommitment,
            &[
                Some(CommitmentOutputRole::ToLocal),
                Some(CommitmentOutputRole::OfferedHtlc),
                Some(CommitmentOutputRole::ReceivedHtlc { preimage_known: true }),
            ],
        )
        .unwrap();

    assert_eq!(court.resolvers().len(), 3);
    assert_eq!(court.resolvers()[0].kind, ResolverKind::CommitmentSweep);
    assert_eq!(court.resolvers()[1].kind, ResolverKind::HtlcTimeout);
    assert_eq!(court.resolvers()[2].kind, ResolverKind::HtlcSuccess);
}

/// Scenario 2 (three-hop forward): the switch opens a circuit for a
/// forwarded HTLC and resolves the incoming side exactly once when the
/// outgoing side settles.
#[tokio::test]
async fn forward_opens_and_resolves_circuit_exactly_once() {
    let mut map = CircuitMap::new();
    map.open(Circuit {
        incoming_scid: ShortChannelId::new(600_000, 1, 0),
        incoming_htlc_id: 42,
        outgoing_scid: ShortChannelId::new(600_001, 2, 0),
        outgoing_htlc_id: 7,
    });
    assert_eq!(map.len(), 1);
    let resolved = map
        .take_by_outgoing(ShortChannelId::new(600_001, 2, 0), 7)
        .expect("circuit must resolve");
    assert_eq!(resolved.incoming_htlc_id, 42);
    assert!(map.is_empty());

    // A payment this node originated settles exactly once even if both a
    // settle and a later stray fail arrive for the same hash.
    let mut payments = PaymentControl::new();
    let hash = PaymentHash([2u8; 32]);
    payments.clear_for_takeoff(hash, 250_000);
    payments.settle(hash);
    payments.fail(hash);
    assert_eq!(
        payments.status(hash).unwrap().status,
        lightning_core::switch::PaymentStatus::Settled
    );

    let _ = Switch::new(std::time::Duration::from_secs(10));
    let _ = ForwardPacket {
        incoming_scid: ShortChannelId::new(600_000, 1, 0),
        incoming_htlc_id: 1,
        outgoing_scid: ShortChannelId::new(600_001, 2, 0),
        amount_msat: 1000,
        payment_hash: hash,
        cltv_expiry: 500_000,
        onion_routing_packet: vec![0u8; 1300],
    };
}

/// Scenario 6 (reestablish after reconnect): a remote `channel_reestablish`
/// claiming a revocation number ahead of what we've signed must be treated
/// as possible data loss, never silently accepted.
#[test]
fn reestablish_detects_possible_data_loss() {
    let channel = opening_channel(1, [12u8; 32]);
    let secp = Secp256k1::new();
    let sk = SecretKey::from_slice(&[6u8; 32]).unwrap();
    let point = PublicKey::from_secret_key(&secp, &sk);

    let msg = ChannelReestablish {
        channel_id: channel.channel_id,
        next_local_commitment_number: channel.remote_commitment_number(),
        next_remote_revocation_number: channel.local_commitment_number() + 1,
        your_last_per_commitment_secret: [0u8; 32],
        my_current_per_commitment_point: point,
    };
    assert_eq!(
        reestablish_outcome(&channel, &msg),
        ReestablishOutcome::DataLossProtected
    );

    let in_sync_msg = ChannelReestablish {
        next_remote_revocation_number: channel.local_commitment_number(),
        next_local_commitment_number: channel.remote_commitment_number(),
        ..msg
    };
    assert_eq!(
        reestablish_outcome(&channel, &in_sync_msg),
        ReestablishOutcome::InSync
    );
}

/// Scenario 5 (forwarding policy propagation): a link's advertised
/// `channel_update` terms are exactly the fee a forward through it costs.
#[test]
fn forwarding_policy_quotes_the_fee_it_will_actually_charge() {
    let config = lightning_core::config::NodeConfig::default();
    let policy = ForwardingPolicy::from_config(&config, 4_000_000_000);
    let fee = policy.fee_for(1_000_000);
    assert_eq!(
        fee,
        policy.base_fee_msat as u64
            + 1_000_000 * policy.fee_proportional_millionths as u64 / 1_000_000
    );
}
