//! Multi-part scan payloads.
//!
//! Payloads too large for one barcode are split into fragments of the form
//! `MP:<seq>/<total>/<id>/<kind>/<chunk>` and shown as an animated code by
//! the sender. The id is the truncated sha256 of the whole payload, so
//! fragments of the same message always agree on it. The decoder
//! accumulates fragments in any order; a fragment with a different id,
//! total or kind is incompatible and resets the accumulator so the user can
//! switch source codes mid-scan.

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::wallet::mnemonic::Mnemonic;
use crate::wallet::{Descriptor, DescriptorError};

/// Fragment prefix that distinguishes multi-part payloads from plain ones.
pub const PREFIX: &str = "MP:";

/// What a completed payload carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Descriptor,
    Seed,
}

impl PayloadKind {
    fn tag(self) -> &'static str {
        match self {
            PayloadKind::Descriptor => "desc",
            PayloadKind::Seed => "seed",
        }
    }

    fn from_tag(tag: &str) -> Option<PayloadKind> {
        match tag {
            "desc" => Some(PayloadKind::Descriptor),
            "seed" => Some(PayloadKind::Seed),
            _ => None,
        }
    }
}

/// A fully decoded, typed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Descriptor(Descriptor),
    Seed(Mnemonic),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MultiPartError {
    #[error("not a multi-part fragment")]
    NotAFragment,
    #[error("malformed fragment")]
    Malformed,
    #[error("fragment belongs to a different payload")]
    Incompatible,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error("malformed seed payload")]
    Seed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Fragment {
    seq: usize,
    total: usize,
    id: String,
    kind: PayloadKind,
    chunk: String,
}

fn parse_fragment(s: &str) -> Result<Fragment, MultiPartError> {
    let body = s.strip_prefix(PREFIX).ok_or(MultiPartError::NotAFragment)?;
    let mut parts = body.splitn(5, '/');
    let seq: usize = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or(MultiPartError::Malformed)?;
    let total: usize = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or(MultiPartError::Malformed)?;
    let id = parts.next().ok_or(MultiPartError::Malformed)?.to_string();
    let kind = parts
        .next()
        .and_then(PayloadKind::from_tag)
        .ok_or(MultiPartError::Malformed)?;
    let chunk = parts.next().ok_or(MultiPartError::Malformed)?.to_string();
    if total == 0 || seq == 0 || seq > total || id.is_empty() {
        return Err(MultiPartError::Malformed);
    }
    Ok(Fragment {
        seq,
        total,
        id,
        kind,
        chunk,
    })
}

/// Accumulator for one multi-part payload.
#[derive(Debug, Default)]
pub struct MultiPartDecoder {
    id: Option<(String, usize, PayloadKind)>,
    chunks: Vec<Option<String>>,
}

impl MultiPartDecoder {
    pub fn new() -> Self {
        MultiPartDecoder::default()
    }

    /// True once the first fragment has been accepted.
    pub fn started(&self) -> bool {
        self.id.is_some()
    }

    /// Received fraction, 0..=1.
    pub fn progress(&self) -> f32 {
        match &self.id {
            None => 0.0,
            Some((_, total, _)) => {
                let have = self.chunks.iter().filter(|c| c.is_some()).count();
                have as f32 / *total as f32
            }
        }
    }

    pub fn reset(&mut self) {
        *self = MultiPartDecoder::default();
    }

    /// Accept one fragment. `Incompatible` leaves the accumulator
    /// untouched; the caller resets and may retry the same fragment.
    pub fn add(&mut self, s: &str) -> Result<(), MultiPartError> {
        let frag = parse_fragment(s)?;
        match &self.id {
            None => {
                self.id = Some((frag.id.clone(), frag.total, frag.kind));
                self.chunks = vec![None; frag.total];
            }
            Some((id, total, kind)) => {
                if *id != frag.id || *total != frag.total || *kind != frag.kind {
                    return Err(MultiPartError::Incompatible);
                }
            }
        }
        self.chunks[frag.seq - 1] = Some(frag.chunk);
        Ok(())
    }

    /// The assembled payload once every fragment has arrived.
    pub fn result(&self) -> Option<(PayloadKind, String)> {
        let (_, _, kind) = self.id.as_ref()?;
        let mut joined = String::new();
        for chunk in &self.chunks {
            joined.push_str(chunk.as_deref()?);
        }
        Some((*kind, joined))
    }
}

/// Parse an assembled (or single-frame typed) payload body.
pub fn parse_payload(kind: PayloadKind, body: &str) -> Result<Payload, PayloadError> {
    match kind {
        PayloadKind::Descriptor => Ok(Payload::Descriptor(Descriptor::decode(body)?)),
        PayloadKind::Seed => {
            if let Some(m) = Mnemonic::from_digits(body.trim()) {
                return Ok(Payload::Seed(m));
            }
            Mnemonic::parse(body)
                .map(Payload::Seed)
                .map_err(|_| PayloadError::Seed)
        }
    }
}

/// Message id for a payload: the first two bytes of its sha256, in hex.
fn message_id(body: &str) -> String {
    let digest = Sha256::digest(body.as_bytes());
    format!("{:02x}{:02x}", digest[0], digest[1])
}

/// Split a payload into `n` fragments; senders and tests share this.
pub fn encode(kind: PayloadKind, body: &str, n: usize) -> Vec<String> {
    assert!(n > 0);
    let id = message_id(body);
    let chars: Vec<char> = body.chars().collect();
    let per = chars.len().div_ceil(n);
    (0..n)
        .map(|i| {
            let start = (i * per).min(chars.len());
            let end = ((i + 1) * per).min(chars.len());
            let chunk: String = chars[start..end].iter().collect();
            format!("{PREFIX}{}/{}/{}/{}/{}", i + 1, n, id, kind.tag(), chunk)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::testdata;

    #[test]
    fn two_fragment_descriptor_assembles_in_any_order() {
        let desc = testdata::multisig(2, 3);
        let parts = encode(PayloadKind::Descriptor, &desc.encode(), 2);
        assert_eq!(parts.len(), 2);

        let mut dec = MultiPartDecoder::new();
        dec.add(&parts[1]).unwrap();
        assert!(dec.result().is_none());
        assert_eq!(dec.progress(), 0.5);
        dec.add(&parts[0]).unwrap();
        let (kind, body) = dec.result().unwrap();
        assert_eq!(kind, PayloadKind::Descriptor);
        let payload = parse_payload(kind, &body).unwrap();
        assert_eq!(payload, Payload::Descriptor(desc));
    }

    #[test]
    fn duplicate_fragments_are_harmless() {
        let parts = encode(PayloadKind::Seed, "000001002003004005006007008009010011", 3);
        let mut dec = MultiPartDecoder::new();
        dec.add(&parts[0]).unwrap();
        dec.add(&parts[0]).unwrap();
        assert!(dec.progress() < 0.5);
    }

    #[test]
    fn incompatible_fragment_is_rejected_without_clobbering() {
        let a = encode(PayloadKind::Descriptor, "ps-desc/v1;t=1;s=wsh", 2);
        let b = encode(PayloadKind::Descriptor, "ps-desc/v1;t=2;s=wsh", 3);
        let mut dec = MultiPartDecoder::new();
        dec.add(&a[0]).unwrap();
        assert_eq!(dec.add(&b[0]), Err(MultiPartError::Incompatible));
        assert_eq!(dec.progress(), 0.5);

        // Caller resets and retries; the new message then accumulates.
        dec.reset();
        dec.add(&b[0]).unwrap();
        dec.add(&b[1]).unwrap();
        dec.add(&b[2]).unwrap();
        assert!(dec.result().is_some());
    }

    #[test]
    fn kind_mismatch_is_incompatible() {
        let mut dec = MultiPartDecoder::new();
        dec.add("MP:1/2/x/desc/abc").unwrap();
        assert_eq!(dec.add("MP:2/2/x/seed/def"), Err(MultiPartError::Incompatible));
    }

    #[test]
    fn plain_text_is_not_a_fragment() {
        assert_eq!(
            parse_fragment("ps-desc/v1;t=1;s=wsh").unwrap_err(),
            MultiPartError::NotAFragment
        );
        assert_eq!(
            parse_fragment("MP:0/2/x/desc/abc").unwrap_err(),
            MultiPartError::Malformed
        );
        assert_eq!(
            parse_fragment("MP:3/2/x/desc/abc").unwrap_err(),
            MultiPartError::Malformed
        );
    }

    #[test]
    fn seed_payload_accepts_digits_and_phrases() {
        let digits = parse_payload(PayloadKind::Seed, "000001002003004005006007008009010011");
        assert!(matches!(digits, Ok(Payload::Seed(_))));

        let m = testdata::mnemonic();
        let phrase = parse_payload(PayloadKind::Seed, &m.phrase()).unwrap();
        assert_eq!(phrase, Payload::Seed(m));

        assert_eq!(
            parse_payload(PayloadKind::Seed, "not words at all"),
            Err(PayloadError::Seed)
        );
    }
}
