//! Wallet descriptors and the key material behind them.
//!
//! A [`Descriptor`] is the threshold policy being backed up: script type,
//! signing threshold and one extended public key per cosigner. The textual
//! encoding defined here is what gets scanned from coordinator software and
//! what gets engraved on the descriptor side of each plate, so `encode` and
//! `decode` must stay exact inverses.

pub mod derive;
pub mod mnemonic;

use thiserror::Error;

use derive::{derive, path_string, Path, Xpub, HARDENED};
use mnemonic::Mnemonic;

/// Script policy of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptType {
    P2wpkh,
    P2wsh,
    P2tr,
}

impl ScriptType {
    /// The standard derivation path the appliance accepts for this policy.
    pub fn standard_path(self) -> Path {
        match self {
            ScriptType::P2wpkh => vec![84 | HARDENED, HARDENED, HARDENED],
            ScriptType::P2wsh => vec![48 | HARDENED, HARDENED, HARDENED, 2 | HARDENED],
            ScriptType::P2tr => vec![86 | HARDENED, HARDENED, HARDENED],
        }
    }

    fn tag(self) -> &'static str {
        match self {
            ScriptType::P2wpkh => "wpkh",
            ScriptType::P2wsh => "wsh",
            ScriptType::P2tr => "tr",
        }
    }

    fn from_tag(tag: &str) -> Option<ScriptType> {
        match tag {
            "wpkh" => Some(ScriptType::P2wpkh),
            "wsh" => Some(ScriptType::P2wsh),
            "tr" => Some(ScriptType::P2tr),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScriptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScriptType::P2wpkh => "Segwit",
            ScriptType::P2wsh => "Segwit multisig",
            ScriptType::P2tr => "Taproot",
        };
        f.write_str(name)
    }
}

/// One cosigner key inside a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDescriptor {
    pub master_fingerprint: u32,
    pub derivation_path: Path,
    pub xpub: Xpub,
}

impl KeyDescriptor {
    /// Derive the key a seed produces at `path`.
    pub fn from_seed(seed: &[u8; 32], path: &Path) -> KeyDescriptor {
        let (master_fingerprint, xpub) = derive(seed, path);
        KeyDescriptor {
            master_fingerprint,
            derivation_path: path.clone(),
            xpub,
        }
    }

    /// Short human-readable identity, shown on cosigner pages.
    pub fn fingerprint_label(&self) -> String {
        format!("{:08x}", self.master_fingerprint)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("malformed descriptor")]
    Malformed,
    #[error("unsupported descriptor version")]
    Version,
    #[error("empty descriptor")]
    Empty,
    #[error("threshold {threshold} exceeds {keys} keys")]
    Threshold { threshold: usize, keys: usize },
}

/// The output policy being backed up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub title: String,
    pub script: ScriptType,
    pub threshold: usize,
    pub keys: Vec<KeyDescriptor>,
}

const ENCODING_PREFIX: &str = "ps-desc/v1";

impl Descriptor {
    /// Singlesig descriptor for one seed at the standard segwit path.
    pub fn singlesig(m: &Mnemonic) -> Descriptor {
        let path = ScriptType::P2wpkh.standard_path();
        let key = KeyDescriptor::from_seed(&m.seed(""), &path);
        Descriptor {
            title: String::new(),
            script: ScriptType::P2wpkh,
            threshold: 1,
            keys: vec![key],
        }
    }

    /// Index of the key the mnemonic controls, if any. Comparison uses the
    /// key's own stated path, so a cosigner exported at a non-standard path
    /// still matches its seed.
    pub fn key_index(&self, m: &Mnemonic) -> Option<usize> {
        let seed = m.seed("");
        self.keys.iter().position(|key| {
            let (fp, xpub) = derive(&seed, &key.derivation_path);
            fp == key.master_fingerprint && xpub.canonical() == key.xpub.canonical()
        })
    }

    /// Textual form, scanned from coordinators and engraved on plates.
    pub fn encode(&self) -> String {
        let mut out = format!(
            "{ENCODING_PREFIX};t={};s={};n={}",
            self.threshold,
            self.script.tag(),
            self.title,
        );
        for key in &self.keys {
            out.push_str(&format!(
                ";k={:08x}:{}:{}",
                key.master_fingerprint,
                path_string(&key.derivation_path),
                key.xpub.canonical(),
            ));
        }
        out
    }

    pub fn decode(s: &str) -> Result<Descriptor, DescriptorError> {
        let mut fields = s.trim().split(';');
        if fields.next() != Some(ENCODING_PREFIX) {
            return Err(DescriptorError::Version);
        }
        let mut threshold = None;
        let mut script = None;
        let mut title = String::new();
        let mut keys = Vec::new();
        for field in fields {
            let (tag, value) = field.split_once('=').ok_or(DescriptorError::Malformed)?;
            match tag {
                "t" => threshold = Some(value.parse().map_err(|_| DescriptorError::Malformed)?),
                "s" => script = ScriptType::from_tag(value),
                "n" => title = value.to_string(),
                "k" => keys.push(decode_key(value)?),
                _ => return Err(DescriptorError::Malformed),
            }
        }
        let threshold = threshold.ok_or(DescriptorError::Malformed)?;
        let script = script.ok_or(DescriptorError::Malformed)?;
        if keys.is_empty() {
            return Err(DescriptorError::Empty);
        }
        if threshold == 0 || threshold > keys.len() {
            return Err(DescriptorError::Threshold {
                threshold,
                keys: keys.len(),
            });
        }
        Ok(Descriptor {
            title,
            script,
            threshold,
            keys,
        })
    }
}

fn decode_key(s: &str) -> Result<KeyDescriptor, DescriptorError> {
    let mut parts = s.splitn(3, ':');
    let fp = parts.next().ok_or(DescriptorError::Malformed)?;
    let path = parts.next().ok_or(DescriptorError::Malformed)?;
    let material = parts.next().ok_or(DescriptorError::Malformed)?;

    let master_fingerprint =
        u32::from_str_radix(fp, 16).map_err(|_| DescriptorError::Malformed)?;
    let derivation_path = parse_path(path).ok_or(DescriptorError::Malformed)?;
    if material.len() != (33 + 32) * 2 {
        return Err(DescriptorError::Malformed);
    }
    let raw = unhex(material).ok_or(DescriptorError::Malformed)?;
    let mut key_data = [0u8; 33];
    key_data.copy_from_slice(&raw[..33]);
    let mut chain_code = [0u8; 32];
    chain_code.copy_from_slice(&raw[33..]);
    Ok(KeyDescriptor {
        master_fingerprint,
        derivation_path,
        xpub: Xpub {
            key_data,
            chain_code,
            parent_fingerprint: 0,
        },
    })
}

fn parse_path(s: &str) -> Option<Path> {
    let mut elems = s.split('/');
    if elems.next() != Some("m") {
        return None;
    }
    let mut path = Vec::new();
    for elem in elems {
        let (digits, hardened) = match elem.strip_suffix('\'') {
            Some(d) => (d, HARDENED),
            None => (elem, 0),
        };
        let value: u32 = digits.parse().ok()?;
        path.push(value | hardened);
    }
    Some(path)
}

fn unhex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    s.as_bytes()
        .chunks(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16)?;
            let lo = (pair[1] as char).to_digit(16)?;
            Some((hi * 16 + lo) as u8)
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod testdata {
    use super::*;

    /// A threshold-of-n descriptor built from deterministic seeds, for
    /// tests across the crate. Seed `i` is `[i+1; 32]`.
    pub fn multisig(threshold: usize, n: usize) -> Descriptor {
        let path = ScriptType::P2wsh.standard_path();
        let keys = (0..n)
            .map(|i| KeyDescriptor::from_seed(&[i as u8 + 1; 32], &path))
            .collect();
        Descriptor {
            title: "Vault".to_string(),
            script: ScriptType::P2wsh,
            threshold,
            keys,
        }
    }

    /// Mnemonic whose seed hash collides with nothing above; used as the
    /// "unknown share" case. Tests that need a *matching* mnemonic should
    /// build descriptors from mnemonic seeds directly.
    pub fn mnemonic() -> Mnemonic {
        let mut m = Mnemonic::empty(12);
        for i in 0..12 {
            m.set(i, (i * 3) as mnemonic::Word);
        }
        m.fix_checksum();
        m
    }

    /// Descriptor where key `0` belongs to [`mnemonic`].
    pub fn multisig_with_share(threshold: usize, n: usize) -> (Descriptor, Mnemonic) {
        let m = mnemonic();
        let path = ScriptType::P2wsh.standard_path();
        let mut keys = vec![KeyDescriptor::from_seed(&m.seed(""), &path)];
        for i in 1..n {
            keys.push(KeyDescriptor::from_seed(&[i as u8 + 1; 32], &path));
        }
        (
            Descriptor {
                title: "Vault".to_string(),
                script: ScriptType::P2wsh,
                threshold,
                keys,
            },
            m,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let desc = testdata::multisig(2, 3);
        let decoded = Descriptor::decode(&desc.encode()).unwrap();
        assert_eq!(decoded.threshold, desc.threshold);
        assert_eq!(decoded.script, desc.script);
        assert_eq!(decoded.title, desc.title);
        assert_eq!(decoded.keys.len(), 3);
        for (a, b) in decoded.keys.iter().zip(&desc.keys) {
            assert_eq!(a.master_fingerprint, b.master_fingerprint);
            assert_eq!(a.derivation_path, b.derivation_path);
            assert_eq!(a.xpub.canonical(), b.xpub.canonical());
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        assert_eq!(
            Descriptor::decode("not a descriptor"),
            Err(DescriptorError::Version)
        );
        assert_eq!(
            Descriptor::decode("ps-desc/v1;t=2;s=wsh"),
            Err(DescriptorError::Empty)
        );
        assert!(matches!(
            Descriptor::decode("ps-desc/v1;t=2;s=wsh;k=bogus"),
            Err(DescriptorError::Malformed)
        ));
    }

    #[test]
    fn decode_rejects_impossible_threshold() {
        let mut desc = testdata::multisig(2, 3);
        desc.threshold = 4;
        assert_eq!(
            Descriptor::decode(&desc.encode()),
            Err(DescriptorError::Threshold {
                threshold: 4,
                keys: 3
            })
        );
    }

    #[test]
    fn key_index_finds_matching_seed() {
        let (desc, m) = testdata::multisig_with_share(2, 3);
        assert_eq!(desc.key_index(&m), Some(0));
    }

    #[test]
    fn key_index_rejects_unknown_seed() {
        let desc = testdata::multisig(2, 3);
        let m = testdata::mnemonic();
        assert_eq!(desc.key_index(&m), None);
    }

    #[test]
    fn singlesig_descriptor_contains_its_own_seed() {
        let m = testdata::mnemonic();
        let desc = Descriptor::singlesig(&m);
        assert_eq!(desc.threshold, 1);
        assert_eq!(desc.keys.len(), 1);
        assert_eq!(desc.key_index(&m), Some(0));
    }

    #[test]
    fn standard_paths_differ_per_policy() {
        assert_ne!(
            ScriptType::P2wpkh.standard_path(),
            ScriptType::P2wsh.standard_path()
        );
        assert_eq!(path_string(&ScriptType::P2wsh.standard_path()), "m/48'/0'/0'/2'");
    }
}
