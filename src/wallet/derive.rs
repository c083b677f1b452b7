//! Hierarchical key derivation.
//!
//! The appliance never signs anything; it only needs stable public key
//! material to identify which share of a descriptor a seed corresponds to.
//! Derivation is a hash chain over the seed: each path element mixes the
//! parent secret, the parent chain code and the child index, so equal seeds
//! and paths always reproduce the same extended public key.

use sha2::{Digest, Sha256};

/// Marks a path element as hardened.
pub const HARDENED: u32 = 0x8000_0000;

/// A derivation path, most significant element first.
pub type Path = Vec<u32>;

/// Render a path in the conventional `m/48'/0'/...` notation.
pub fn path_string(path: &[u32]) -> String {
    let mut out = String::from("m");
    for elem in path {
        out.push('/');
        if elem & HARDENED != 0 {
            out.push_str(&(elem & !HARDENED).to_string());
            out.push('\'');
        } else {
            out.push_str(&elem.to_string());
        }
    }
    out
}

/// Extended public key: compressed key bytes plus the chain code needed to
/// compare derivations, and the fingerprint of the direct parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Xpub {
    pub key_data: [u8; 33],
    pub chain_code: [u8; 32],
    pub parent_fingerprint: u32,
}

impl Xpub {
    /// Canonical textual form, used for equality checks and as the plate
    /// payload for descriptor keys.
    pub fn canonical(&self) -> String {
        format!("{}{}", hex(&self.key_data), hex(&self.chain_code))
    }
}

struct Node {
    secret: [u8; 32],
    chain: [u8; 32],
}

impl Node {
    fn from_seed(seed: &[u8; 32]) -> Node {
        Node {
            secret: tagged(b"master/secret", &[seed]),
            chain: tagged(b"master/chain", &[seed]),
        }
    }

    fn child(&self, idx: u32) -> Node {
        let be = idx.to_be_bytes();
        Node {
            secret: tagged(b"child/secret", &[&self.secret, &self.chain, &be]),
            chain: tagged(b"child/chain", &[&self.secret, &self.chain, &be]),
        }
    }

    fn public(&self) -> [u8; 33] {
        let body = tagged(b"public", &[&self.secret]);
        let mut out = [0u8; 33];
        out[0] = 0x02;
        out[1..].copy_from_slice(&body);
        out
    }
}

fn tagged(tag: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"platesmith/derive/");
    hasher.update(tag);
    for p in parts {
        hasher.update(p);
    }
    hasher.finalize().into()
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Fingerprint of a compressed public key.
pub fn fingerprint(key_data: &[u8; 33]) -> u32 {
    let digest = tagged(b"fingerprint", &[key_data]);
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Derive the extended public key at `path`, returning it together with
/// the master key fingerprint that identifies the seed.
pub fn derive(seed: &[u8; 32], path: &[u32]) -> (u32, Xpub) {
    let mut node = Node::from_seed(seed);
    let master_fp = fingerprint(&node.public());
    let mut parent_fp = 0;
    for elem in path {
        parent_fp = fingerprint(&node.public());
        node = node.child(*elem);
    }
    (
        master_fp,
        Xpub {
            key_data: node.public(),
            chain_code: node.chain,
            parent_fingerprint: parent_fp,
        },
    )
}
