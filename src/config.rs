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

//! Centralizes the CSV/CLTV/timer defaults the original design notes (§9)
//! warn are otherwise pinned ad hoc in multiple places. Every subsystem reads
//! its defaults from here rather than repeating a magic number.

use std::time::Duration;

/// Node-wide defaults. Individual channels may override policy-level fields
/// via [`crate::chan::policy::Policy`] / [`crate::link::ForwardingPolicy`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct NodeConfig {
    /// `cltv_expiry_delta` advertised in `channel_update` absent an explicit
    /// per-channel override.
    pub default_cltv_expiry_delta: u16,

    /// `to_self_delay` requested of the remote party absent an explicit
    /// per-channel override.
    pub default_to_self_delay: u16,

    /// Minimum depth (confirmations) required before a funding transaction
    /// is considered locked-in.
    pub default_min_depth: u32,

    /// Link-level batch timer: window in which to group outgoing
    /// `update_add_htlc` before forcing a `commitment_signed` round.
    pub batch_timer: Duration,

    /// Link-level log-commit timer: window after which pending settles/fails
    /// are flushed even if the peer is idle.
    pub log_commit_timer: Duration,

    /// Switch stats-ticker interval (§4.4).
    pub stats_tick_interval: Duration,

    /// Ping interval; absence of a pong within `ping_timeout` closes the
    /// connection (§5).
    pub ping_interval: Duration,
    pub ping_timeout: Duration,

    /// Bound on the number of fee proposals exchanged during a cooperative
    /// close negotiation (§4.4) before force-closing.
    pub max_fee_negotiation_iterations: u8,

    /// Minimum value (in msat) below which an HTLC is always rejected
    /// regardless of channel-specific policy.
    pub protocol_min_htlc_value_msat: u64,

    /// `to_self_delay` we request of the remote party's to-local output when
    /// we are the funder, absent an explicit per-channel override. BOLT-2
    /// recommends a floor of a few blocks so a unilateral close always gives
    /// the other side a meaningful window to react.
    pub default_csv_delay: u16,

    /// Ceiling on the msat value we will let accumulate in below-dust HTLCs
    /// on a single commitment. Dust HTLCs pay no penalty on a unilateral
    /// close, so an unbounded pile of them is value a breaching party can
    /// simply keep.
    pub max_dust_htlc_exposure_msat: u64,
}

/// BOLT-3 mandates 354 sat as the network-wide minimum dust limit.
pub const BOLT3_DUST_LIMIT_SAT: u64 = 354;

/// BOLT-2 mandates that `max_accepted_htlcs` never exceed 483 (so that a
/// commitment transaction can never exceed the standardness weight limit).
pub const BOLT3_MAX_ACCEPTED_HTLC_LIMIT: u16 = 483;

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            default_cltv_expiry_delta: 144,
            default_to_self_delay: 144,
            default_min_depth: 3,
            batch_timer: Duration::from_millis(50),
            log_commit_timer: Duration::from_millis(300),
            stats_tick_interval: Duration::from_secs(10),
            ping_interval: Duration::from_secs(60),
            ping_timeout: Duration::from_secs(30),
            max_fee_negotiation_iterations: 8,
            protocol_min_htlc_value_msat: 1,
            default_csv_delay: 4,
            max_dust_htlc_exposure_msat: 5_000_000,
        }
    }
}
