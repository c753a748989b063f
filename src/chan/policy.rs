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

//! Local acceptance policy for a remote peer's `open_channel`/`accept_channel`
//! proposal, and the BOLT-3 constants every policy check is measured against.

use std::ops::Range;

use crate::config::{NodeConfig, BOLT3_DUST_LIMIT_SAT, BOLT3_MAX_ACCEPTED_HTLC_LIMIT};
use crate::wire::messages::{AcceptChannel, OpenChannel};

/// Errors produced while validating a peer's channel parameters against a
/// [`Policy`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum PolicyError {
    /// proposed `to_self_delay` value {proposed} exceeds local policy limit
    /// of {allowed_maximum}
    ToSelfDelayTooLarge { proposed: u16, allowed_maximum: u16 },

    /// proposed `to_self_delay` value {proposed} is below local policy
    /// minimum of {allowed_minimum}
    ToSelfDelayTooSmall { proposed: u16, allowed_minimum: u16 },

    /// proposed `max_accepted_htlcs` {0} exceeds the BOLT-3 hard limit of 483
    MaxAcceptedHtlcLimitExceeded(u16),

    /// proposed feerate {proposed} sat/kw is outside local policy range
    /// {lowest}..{highest}
    FeeRateUnreasonable {
        proposed: u32,
        lowest: u32,
        highest: u32,
    },

    /// dust limit {0} sat is below the BOLT-3 minimum of 354 sat
    DustLimitTooSmall(u64),

    /// dust limit {proposed} sat exceeds local policy maximum of
    /// {allowed_maximum} sat
    DustLimitTooLarge { proposed: u64, allowed_maximum: u64 },

    /// channel_reserve_satoshis {reserve} sat is below dust_limit_satoshis
    /// {dust_limit} sat
    ChannelReserveBelowDust { reserve: u64, dust_limit: u64 },

    /// proposed channel funding of {proposed} sat is below local policy
    /// minimum of {required_minimum} sat
    FundingTooSmall { proposed: u64, required_minimum: u64 },

    /// proposed minimum depth of {proposed} exceeds local policy maximum of
    /// {allowed_maximum}
    MinimumDepthUnreasonable { proposed: u32, allowed_maximum: u32 },
}

/// Local policy used to accept or reject a remote-proposed channel. Channels
/// not opened with an explicit policy default from [`NodeConfig`].
#[derive(Clone, Debug, PartialEq)]
pub struct Policy {
    pub to_self_delay_max: u16,
    pub to_self_delay_min: u16,
    pub feerate_per_kw_range: Range<u32>,
    pub minimum_depth: u32,
    pub maximum_depth: Option<u32>,
    pub funding_satoshis_min: Option<u64>,
    pub dust_limit_satoshis_max: Option<u64>,
    /// Ceiling on msat value held in below-dust HTLCs on one commitment.
    /// `None` means no cap is enforced.
    pub dust_htlc_exposure_max_msat: Option<u64>,
}

impl Policy {
    pub fn from_config(config: &NodeConfig) -> Self {
        Policy {
            to_self_delay_max: config.default_to_self_delay.saturating_mul(2),
            to_self_delay_min: config.default_csv_delay,
            feerate_per_kw_range: 1..500,
            minimum_depth: config.default_min_depth,
            maximum_depth: Some(config.default_min_depth * 2),
            funding_satoshis_min: Some(10_000),
            dust_limit_satoshis_max: Some(1_000),
            dust_htlc_exposure_max_msat: Some(config.max_dust_htlc_exposure_msat),
        }
    }

    /// Validates the fields of an incoming `open_channel` that are subject
    /// to local policy (BOLT-2's "SHOULD fail the channel" checks).
    pub fn validate_open_channel(&self, msg: &OpenChannel) -> Result<(), PolicyError> {
        self.validate_common(
            msg.to_self_delay,
            msg.max_accepted_htlcs,
            msg.feerate_per_kw,
            msg.dust_limit_satoshis,
            msg.channel_reserve_satoshis,
            Some(msg.funding_satoshis),
            None,
        )
    }

    pub fn validate_accept_channel(
        &self,
        msg: &AcceptChannel,
    ) -> Result<(), PolicyError> {
        self.validate_common(
            msg.to_self_delay,
            msg.max_accepted_htlcs,
            // accept_channel does not carry a feerate; inherited from ours
            1,
            msg.dust_limit_satoshis,
            msg.channel_reserve_satoshis,
            None,
            Some(msg.minimum_depth),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn validate_common(
        &self,
        to_self_delay: u16,
        max_accepted_htlcs: u16,
        feerate_per_kw: u32,
        dust_limit_satoshis: u64,
        channel_reserve_satoshis: u64,
        funding_satoshis: Option<u64>,
        minimum_depth: Option<u32>,
    ) -> Result<(), PolicyError> {
        if to_self_delay > self.to_self_delay_max {
            return Err(PolicyError::ToSelfDelayTooLarge {
                proposed: to_self_delay,
                allowed_maximum: self.to_self_delay_max,
            });
        }
        if to_self_delay < self.to_self_delay_min {
            return Err(PolicyError::ToSelfDelayTooSmall {
                proposed: to_self_delay,
                allowed_minimum: self.to_self_delay_min,
            });
        }
        if max_accepted_htlcs > BOLT3_MAX_ACCEPTED_HTLC_LIMIT {
            return Err(PolicyError::MaxAcceptedHtlcLimitExceeded(
                max_accepted_htlcs,
            ));
        }
        if dust_limit_satoshis < BOLT3_DUST_LIMIT_SAT {
            return Err(PolicyError::DustLimitTooSmall(dust_limit_satoshis));
        }
        if let Some(max) = self.dust_limit_satoshis_max {
            if dust_limit_satoshis > max {
                return Err(PolicyError::DustLimitTooLarge {
                    proposed: dust_limit_satoshis,
                    allowed_maximum: max,
                });
            }
        }
        if channel_reserve_satoshis < dust_limit_satoshis {
            return Err(PolicyError::ChannelReserveBelowDust {
                reserve: channel_reserve_satoshis,
                dust_limit: dust_limit_satoshis,
            });
        }
        if feerate_per_kw != 1
            && !self.feerate_per_kw_range.contains(&feerate_per_kw)
        {
            return Err(PolicyError::FeeRateUnreasonable {
                proposed: feerate_per_kw,
                lowest: self.feerate_per_kw_range.start,
                highest: self.feerate_per_kw_range.end,
            });
        }
        if let Some(funding) = funding_satoshis {
            if let Some(min) = self.funding_satoshis_min {
                if funding < min {
                    return Err(PolicyError::FundingTooSmall {
                        proposed: funding,
                        required_minimum: min,
                    });
                }
            }
        }
        if let Some(depth) = minimum_depth {
            if let Some(max) = self.maximum_depth {
                if depth > max {
                    return Err(PolicyError::MinimumDepthUnreasonable {
                        proposed: depth,
                        allowed_maximum: max,
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for Policy {
    fn default() -> Self {
        Policy::from_config(&NodeConfig::default())
    }
}
