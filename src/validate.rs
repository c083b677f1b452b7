//! Descriptor acceptance checks.
//!
//! A scanned descriptor must pass these before the user is allowed to enter
//! a seed for it; an unusable descriptor is rejected up front rather than
//! after the user has typed 24 words.

use std::collections::HashSet;

use thiserror::Error;

use crate::plan;
use crate::wallet::mnemonic::Mnemonic;
use crate::wallet::{derive::path_string, Descriptor};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("descriptor lists key {fingerprint:08x} more than once")]
    DuplicateKey { fingerprint: u32 },
    #[error("key {fingerprint:08x} uses non-standard derivation path {path}")]
    NonstandardDerivation { fingerprint: u32, path: String },
    #[error(transparent)]
    Plan(#[from] plan::PlanError),
    #[error("the seed is not part of this wallet")]
    KeyNotInDescriptor,
    #[error("an engraved plate subset would not recover this wallet")]
    NotRecoverable,
}

/// Check a descriptor before any seed is collected for it.
///
/// The plate fit is probed with a dummy seed of the largest supported
/// length, so acceptance never depends on which share the user ends up
/// holding. The recoverability check guards against planner regressions;
/// it failing on user input is a defect, not a user error.
pub fn validate_descriptor(desc: &Descriptor) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for key in &desc.keys {
        if !seen.insert(key.xpub.canonical()) {
            return Err(ValidationError::DuplicateKey {
                fingerprint: key.master_fingerprint,
            });
        }
        if key.derivation_path != desc.script.standard_path() {
            return Err(ValidationError::NonstandardDerivation {
                fingerprint: key.master_fingerprint,
                path: path_string(&key.derivation_path),
            });
        }
    }
    let mut dummy = Mnemonic::empty(24);
    for i in 0..24 {
        dummy.set(i, 0);
    }
    dummy.fix_checksum();
    plan::try_fit(desc, &dummy)?;
    if !plan::recoverable(desc) {
        return Err(ValidationError::NotRecoverable);
    }
    Ok(())
}
