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

//! Per-channel key material. [`LocalKeyset`] carries the private-derivation
//! metadata the signer needs; [`RemoteKeyset`] is built straight from the
//! basepoints the peer announced in `open_channel`/`accept_channel`.

use amplify::DumbDefault;
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey, Signing};
use bitcoin::util::bip32::{ChildNumber, ExtendedPrivKey, Fingerprint};
use bitcoin::Script;

use crate::wire::messages::{AcceptChannel, OpenChannel};

/// A derivation path rooted at the channel's own extended key, following
/// LNPBP-46: index 0 funding, 1 payment, 2 delayed_payment, 3 revocation, 4
/// first per-commitment, 5 htlc.
const FUNDING_INDEX: u32 = 0;
const PAYMENT_INDEX: u32 = 1;
const DELAYED_PAYMENT_INDEX: u32 = 2;
const REVOCATION_INDEX: u32 = 3;
const FIRST_PER_COMMITMENT_INDEX: u32 = 4;
const HTLC_INDEX: u32 = 5;

/// Set of keys and basepoints the local side commits to using for this
/// channel, derived deterministically from a single channel extended key so
/// that none of them need to be persisted beyond the derivation path.
#[derive(Clone, Debug)]
pub struct LocalKeyset {
    pub funding_pubkey: PublicKey,
    pub revocation_basepoint: PublicKey,
    pub payment_basepoint: PublicKey,
    pub delayed_payment_basepoint: PublicKey,
    pub htlc_basepoint: PublicKey,
    pub first_per_commitment_point: PublicKey,
    pub first_per_commitment_secret: SecretKey,
    pub shutdown_scriptpubkey: Option<Script>,
    pub static_remotekey: bool,
    fingerprint: Fingerprint,
}

/// Mirror of the remote party's basepoints, taken verbatim from the
/// `open_channel`/`accept_channel` messages and never re-derived locally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteKeyset {
    pub funding_pubkey: PublicKey,
    pub revocation_basepoint: PublicKey,
    pub payment_basepoint: PublicKey,
    pub delayed_payment_basepoint: PublicKey,
    pub htlc_basepoint: PublicKey,
    pub first_per_commitment_point: PublicKey,
    pub shutdown_scriptpubkey: Option<Script>,
    pub static_remotekey: bool,
}

impl From<&OpenChannel> for RemoteKeyset {
    fn from(m: &OpenChannel) -> Self {
        RemoteKeyset {
            funding_pubkey: m.funding_pubkey,
            revocation_basepoint: m.revocation_basepoint,
            payment_basepoint: m.payment_basepoint,
            delayed_payment_basepoint: m.delayed_payment_basepoint,
            htlc_basepoint: m.htlc_basepoint,
            first_per_commitment_point: m.first_per_commitment_point,
            shutdown_scriptpubkey: None,
            static_remotekey: false,
        }
    }
}

impl From<&AcceptChannel> for RemoteKeyset {
    fn from(m: &AcceptChannel) -> Self {
        RemoteKeyset {
            funding_pubkey: m.funding_pubkey,
            revocation_basepoint: m.revocation_basepoint,
            payment_basepoint: m.payment_basepoint,
            delayed_payment_basepoint: m.delayed_payment_basepoint,
            htlc_basepoint: m.htlc_basepoint,
            first_per_commitment_point: m.first_per_commitment_point,
            shutdown_scriptpubkey: None,
            static_remotekey: false,
        }
    }
}

impl DumbDefault for LocalKeyset {
    fn dumb_default() -> Self {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[1u8; 32]).expect("valid scalar");
        let pk = PublicKey::from_secret_key(&secp, &sk);
        LocalKeyset {
            funding_pubkey: pk,
            revocation_basepoint: pk,
            payment_basepoint: pk,
            delayed_payment_basepoint: pk,
            htlc_basepoint: pk,
            first_per_commitment_point: pk,
            first_per_commitment_secret: sk,
            shutdown_scriptpubkey: None,
            static_remotekey: false,
            fingerprint: Fingerprint::default(),
        }
    }
}

impl LocalKeyset {
    /// Derives the full keyset from a channel extended private key, one
    /// hardened child per basepoint.
    pub fn derive<C: Signing>(
        secp: &Secp256k1<C>,
        channel_xpriv: &ExtendedPrivKey,
        shutdown_scriptpubkey: Option<Script>,
    ) -> Self {
        let derive_at = |index: u32| -> SecretKey {
            let child = ChildNumber::from_hardened_idx(index)
                .expect("index < 2^31");
            channel_xpriv
                .derive_priv(secp, &[child])
                .expect("derivation does not fail for a 32-bit path")
                .private_key
        };

        let funding_sk = derive_at(FUNDING_INDEX);
        let payment_sk = derive_at(PAYMENT_INDEX);
        let delayed_sk = derive_at(DELAYED_PAYMENT_INDEX);
        let revocation_sk = derive_at(REVOCATION_INDEX);
        let first_per_commitment_sk = derive_at(FIRST_PER_COMMITMENT_INDEX);
        let htlc_sk = derive_at(HTLC_INDEX);

        LocalKeyset {
            funding_pubkey: PublicKey::from_secret_key(secp, &funding_sk),
            revocation_basepoint: PublicKey::from_secret_key(secp, &revocation_sk),
            payment_basepoint: PublicKey::from_secret_key(secp, &payment_sk),
            delayed_payment_basepoint: PublicKey::from_secret_key(secp, &delayed_sk),
            htlc_basepoint: PublicKey::from_secret_key(secp, &htlc_sk),
            first_per_commitment_point: PublicKey::from_secret_key(
                secp,
                &first_per_commitment_sk,
            ),
            first_per_commitment_secret: first_per_commitment_sk,
            shutdown_scriptpubkey,
            static_remotekey: false,
            fingerprint: channel_xpriv.fingerprint(secp),
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::Network;

    #[test]
    fn derive_is_deterministic() {
        let secp = Secp256k1::new();
        let xpriv = ExtendedPrivKey::new_master(Network::Bitcoin, &[9u8; 64])
            .unwrap();
        let a = LocalKeyset::derive(&secp, &xpriv, None);
        let b = LocalKeyset::derive(&secp, &xpriv, None);
        assert_eq!(a.funding_pubkey, b.funding_pubkey);
        assert_eq!(a.htlc_basepoint, b.htlc_basepoint);
        assert_ne!(a.funding_pubkey, a.htlc_basepoint);
    }
}
