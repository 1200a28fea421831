//! Patches the host hands out in response to program changes

use std::collections::BTreeMap;

use sidsynth::engine::ProgramRequest;
use sidsynth::patch::Patch;

use crate::error::{HostError, Result};

/// A sparse set of patches addressed by `(bank, program)`, both 0..=127
#[derive(Clone, Debug, Default)]
pub struct PatchBank {
    patches: BTreeMap<(u8, u8), Patch>,
}

impl PatchBank {
    /// An empty bank
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `patch` at `(bank, program)`, returning the patch it replaced
    pub fn insert(&mut self, bank: u8, program: u8, patch: Patch) -> Option<Patch> {
        self.patches.insert((bank & 0x7F, program & 0x7F), patch)
    }

    /// Decode a patch blob and store it at `(bank, program)`
    pub fn insert_blob(&mut self, bank: u8, program: u8, blob: &[u8]) -> Result<()> {
        let patch = Patch::decode(blob).map_err(HostError::InvalidPatch)?;
        log::debug!("bank {} program {}: '{}'", bank, program, patch.name());
        self.insert(bank, program, patch);
        Ok(())
    }

    /// The patch at `(bank, program)`, if any
    pub fn get(&self, bank: u8, program: u8) -> Option<&Patch> {
        self.patches.get(&(bank & 0x7F, program & 0x7F))
    }

    /// Look up the patch a program change asks for
    pub fn resolve(&self, req: &ProgramRequest) -> Option<&Patch> {
        let ret = self.get(req.bank, req.program);
        if ret.is_none() {
            log::warn!(
                "engine {}: no patch at bank {} program {}",
                req.engine,
                req.bank,
                req.program
            );
        }
        ret
    }

    /// Number of stored patches
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// True if there are no patches
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// All patches in bank/program order
    pub fn iter(&self) -> impl Iterator<Item = ((u8, u8), &Patch)> {
        self.patches.iter().map(|(k, v)| (*k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidsynth::patch::EngineKind;

    #[test]
    fn resolves_program_requests() {
        let mut bank = PatchBank::new();
        let mut bass = Patch::new(EngineKind::Bassline);
        bass.set_name("Acid");
        bank.insert(1, 5, bass);
        let req = ProgramRequest {
            engine: 0,
            bank: 1,
            program: 5,
        };
        assert_eq!(bank.resolve(&req).map(|p| p.name()), Some("Acid"));
        let missing = ProgramRequest { program: 6, ..req };
        assert!(bank.resolve(&missing).is_none());
    }

    #[test]
    fn blobs_are_decoded() {
        let mut bank = PatchBank::new();
        let drum = Patch::new(EngineKind::Drum).encode();
        assert!(bank.insert_blob(0, 0, &drum).is_ok());
        assert_eq!(bank.get(0, 0).map(|p| p.kind()), Some(EngineKind::Drum));
        assert!(matches!(
            bank.insert_blob(0, 1, &drum[..100]),
            Err(HostError::InvalidPatch(_))
        ));
        assert_eq!(bank.len(), 1);
    }
}
