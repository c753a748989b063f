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

//! Derives the revocation private key and the `to_local` redeem script a
//! justice transaction spends, from a disclosed `per_commitment_secret` and
//! the victim's revocation basepoint. This is the core of breach
//! retribution: whoever learns a counterparty's old per-commitment secret
//! can reconstruct the one-time revocation key for that commitment and
//! sweep every output it controls.

use bitcoin::blockdata::opcodes::all::*;
use bitcoin::blockdata::script::Builder;
use bitcoin::hashes::{sha256, Hash, HashEngine};
use bitcoin::secp256k1::{PublicKey, Scalar, Secp256k1, SecretKey, Signing, Verification};
use bitcoin::Script;

#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum Error {
    /// revocation key derivation produced an invalid scalar; this has
    /// negligible probability and indicates a malformed input
    InvalidDerivation,
}

/// `SHA256(revocation_basepoint || per_commitment_point)`, the blinding
/// factor BOLT-3 uses for both the private and public revocation key
/// derivation so that the two stay consistent.
fn revocation_tweak(basepoint: &PublicKey, per_commitment_point: &PublicKey) -> [u8; 32] {
    let mut engine = sha256::Hash::engine();
    engine.input(&basepoint.serialize());
    engine.input(&per_commitment_point.serialize());
    sha256::Hash::from_engine(engine).into_inner()
}

/// Reconstructs the one-time private key that can spend every revokeable
/// output of a breached commitment, given the counterparty's disclosed
/// `per_commitment_secret` and our own long-term revocation base secret.
///
/// Mirrors the derivation the old rust-lightning `chan_utils` module
/// performs in `derive_private_revocation_key`: the revocation key is the
/// sum, in the scalar field, of the per-commitment secret tweaked by the
/// counterparty's revocation basepoint and our own base secret tweaked by
/// the per-commitment point.
pub fn derive_private_revocation_key<C: Signing + Verification>(
    secp: &Secp256k1<C>,
    per_commitment_secret: &SecretKey,
    revocation_base_secret: &SecretKey,
) -> Result<SecretKey, Error> {
    let per_commitment_point = PublicKey::from_secret_key(secp, per_commitment_secret);
    let revocation_basepoint = PublicKey::from_secret_key(secp, revocation_base_secret);

    let tweak_for_base =
        revocation_tweak(&revocation_basepoint, &per_commitment_point);
    let tweak_for_commitment =
        revocation_tweak(&per_commitment_point, &revocation_basepoint);

    let part_from_base = revocation_base_secret
        .mul_tweak(&Scalar::from_be_bytes(tweak_for_base).map_err(|_| Error::InvalidDerivation)?)
        .map_err(|_| Error::InvalidDerivation)?;
    let part_from_commitment = per_commitment_secret
        .mul_tweak(
            &Scalar::from_be_bytes(tweak_for_commitment).map_err(|_| Error::InvalidDerivation)?,
        )
        .map_err(|_| Error::InvalidDerivation)?;

    part_from_base
        .add_tweak(&Scalar::from_be_bytes(part_from_commitment.secret_bytes()).map_err(|_| Error::InvalidDerivation)?)
        .map_err(|_| Error::InvalidDerivation)
}

/// Public-key counterpart of [`derive_private_revocation_key`], used to
/// verify a `revoke_and_ack` secret against the commitment point we were
/// originally given (I5).
pub fn derive_public_revocation_key<C: Signing + Verification>(
    secp: &Secp256k1<C>,
    per_commitment_point: &PublicKey,
    revocation_basepoint: &PublicKey,
) -> Result<PublicKey, Error> {
    let tweak_for_base = revocation_tweak(revocation_basepoint, per_commitment_point);
    let tweak_for_commitment = revocation_tweak(per_commitment_point, revocation_basepoint);

    let part_from_base = revocation_basepoint
        .mul_tweak(secp, &Scalar::from_be_bytes(tweak_for_base).map_err(|_| Error::InvalidDerivation)?)
        .map_err(|_| Error::InvalidDerivation)?;
    let part_from_commitment = per_commitment_point
        .mul_tweak(
            secp,
            &Scalar::from_be_bytes(tweak_for_commitment).map_err(|_| Error::InvalidDerivation)?,
        )
        .map_err(|_| Error::InvalidDerivation)?;

    part_from_base
        .combine(&part_from_commitment)
        .map_err(|_| Error::InvalidDerivation)
}

/// The `to_local` output's revokeable redeem script: spendable immediately
/// by the revocation key, or after `to_self_delay` blocks by the delayed
/// payment key — the script a justice transaction's witness satisfies via
/// the first branch.
pub fn revokeable_redeemscript(
    revocation_pubkey: &PublicKey,
    to_self_delay: u16,
    delayed_payment_pubkey: &PublicKey,
) -> Script {
    Builder::new()
        .push_opcode(OP_IF)
        .push_slice(&revocation_pubkey.serialize())
        .push_opcode(OP_ELSE)
        .push_int(to_self_delay as i64)
        .push_opcode(OP_CSV)
        .push_opcode(OP_DROP)
        .push_slice(&delayed_payment_pubkey.serialize())
        .push_opcode(OP_ENDIF)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_and_public_derivation_agree() {
        let secp = Secp256k1::new();
        let per_commitment_secret = SecretKey::from_slice(&[3u8; 32]).unwrap();
        let revocation_base_secret = SecretKey::from_slice(&[5u8; 32]).unwrap();
        let revocation_basepoint =
            PublicKey::from_secret_key(&secp, &revocation_base_secret);
        let per_commitment_point =
            PublicKey::from_secret_key(&secp, &per_commitment_secret);

        let private_key = derive_private_revocation_key(
            &secp,
            &per_commitment_secret,
            &revocation_base_secret,
        )
        .unwrap();
        let public_key = derive_public_revocation_key(
            &secp,
            &per_commitment_point,
            &revocation_basepoint,
        )
        .unwrap();

        assert_eq!(PublicKey::from_secret_key(&secp, &private_key), public_key);
    }
}
