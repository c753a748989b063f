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

//! BOLT-3 `shachain`: stores O(log n) revocation secrets instead of one per
//! commitment by exploiting the structure of the seed-derivation tree (each
//! secret derives every secret whose index shares its trailing-zero prefix).

use bitcoin::hashes::{sha256, Hash};

/// Maximum shachain index, `2^48 - 1`; commitment numbers never exceed this.
pub const MAX_INDEX: u64 = (1 << 48) - 1;

#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum Error {
    /// shachain index {0} exceeds the 48-bit maximum
    IndexOutOfRange(u64),

    /// received secret at index {index} does not derive the previously
    /// stored secret at index {conflicts_with}; the remote peer is either
    /// buggy or malicious
    InconsistentSecret { index: u64, conflicts_with: u64 },

    /// no secret has been stored for index {0} yet
    SecretNotFound(u64),
}

/// Flips bit `bit_index` (counting from the least significant bit) of a
/// 32-byte secret and re-hashes every bit below it, per BOLT-3's
/// `shachain_derive`.
fn derive_from(seed: &[u8; 32], from_index: u64, to_index: u64) -> Result<[u8; 32], Error> {
    if to_index > MAX_INDEX {
        return Err(Error::IndexOutOfRange(to_index));
    }
    // `to_index` must be reachable from `from_index`: every bit set in
    // `to_index` that's below the lowest set bit of `from_index` must match.
    let shared_prefix_bits = from_index.trailing_zeros();
    if (from_index ^ to_index) >> shared_prefix_bits != 0 {
        return Err(Error::InconsistentSecret {
            index: to_index,
            conflicts_with: from_index,
        });
    }
    let mut secret = *seed;
    for bit in (0..shared_prefix_bits).rev() {
        if (to_index >> bit) & 1 == 1 {
            secret[(bit / 8) as usize] ^= 1 << (bit % 8);
            secret = sha256::Hash::hash(&secret).into_inner();
        }
    }
    Ok(secret)
}

/// Receiver-side store: the minimal set of secrets (at most 49 of them)
/// sufficient to reconstruct every revocation secret disclosed so far.
#[derive(Clone, Debug, Default)]
pub struct Shachain {
    known: Vec<(u64, [u8; 32])>,
    min_index_seen: Option<u64>,
}

impl Shachain {
    pub fn new() -> Self {
        Shachain::default()
    }

    /// Stores a newly-revealed secret, pruning any previously-known secret
    /// it supersedes. Fails if the secret is inconsistent with a secret
    /// already on file — the data-loss-protection trip wire of I5.
    pub fn insert_secret(&mut self, index: u64, secret: [u8; 32]) -> Result<(), Error> {
        if index > MAX_INDEX {
            return Err(Error::IndexOutOfRange(index));
        }
        for &(known_index, known_secret) in &self.known {
            if known_index > index {
                let re_derived = derive_from(&secret, index, known_index)?;
                if re_derived != known_secret {
                    return Err(Error::InconsistentSecret {
                        index,
                        conflicts_with: known_index,
                    });
                }
            }
        }
        // Every stored secret at a larger index is now re-derivable from
        // this one; keep only the entries the new secret can't reconstruct.
        self.known.retain(|&(known_index, _)| known_index <= index);
        self.known.push((index, secret));
        self.min_index_seen = Some(match self.min_index_seen {
            Some(m) => m.min(index),
            None => index,
        });
        Ok(())
    }

    /// Derives the secret at `index` from whichever stored ancestor covers
    /// it, per BOLT-3's `shachain_derive`.
    pub fn secret_at(&self, index: u64) -> Result<[u8; 32], Error> {
        for &(known_index, known_secret) in &self.known {
            if known_index <= index {
                if let Ok(secret) = derive_from(&known_secret, known_index, index) {
                    return Ok(secret);
                }
            }
        }
        Err(Error::SecretNotFound(index))
    }
}

/// Sender-side generator: produces the secret for a given commitment index
/// directly from a locally-held seed, without needing to remember anything.
#[derive(Clone, Debug)]
pub struct ShachainSeed([u8; 32]);

impl ShachainSeed {
    pub fn new(seed: [u8; 32]) -> Self {
        ShachainSeed(seed)
    }

    /// Per BOLT-3: `per_commitment_secret(index) = sha256-chain(seed, 47 -
    /// index)` applied to the full 48-bit complement of `index`.
    pub fn secret_for_index(&self, index: u64) -> Result<[u8; 32], Error> {
        if index > MAX_INDEX {
            return Err(Error::IndexOutOfRange(index));
        }
        let complement = MAX_INDEX - index;
        derive_from(&self.0, 0, complement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_reproduces_known_test_vector_shape() {
        let seed = ShachainSeed::new([0u8; 32]);
        let s0 = seed.secret_for_index(MAX_INDEX).unwrap();
        let s1 = seed.secret_for_index(MAX_INDEX - 1).unwrap();
        assert_ne!(s0, s1);
    }

    #[test]
    fn receiver_derives_earlier_from_later_ancestor() {
        let seed = ShachainSeed::new([7u8; 32]);
        let mut chain = Shachain::new();
        // Insert in descending commitment-number order, as a peer actually
        // reveals them (newest commitment first).
        for index in (MAX_INDEX - 4..=MAX_INDEX).rev() {
            let secret = seed.secret_for_index(index).unwrap();
            chain.insert_secret(MAX_INDEX - index, secret).unwrap();
        }
        for index in MAX_INDEX - 4..=MAX_INDEX {
            let expected = seed.secret_for_index(index).unwrap();
            let got = chain.secret_at(MAX_INDEX - index).unwrap();
            assert_eq!(expected, got);
        }
    }

    #[test]
    fn inconsistent_secret_is_rejected() {
        let mut chain = Shachain::new();
        chain.insert_secret(1, [1u8; 32]).unwrap();
        let bogus = [2u8; 32];
        assert!(matches!(
            chain.insert_secret(0, bogus),
            Err(Error::InconsistentSecret { .. })
        ));
    }
}
