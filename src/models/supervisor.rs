use std::sync::{Mutex, Condvar};
use std::time::Instant;

use crate::error::AppError;
use crate::sync_ext::{CondvarExt, MutexExt};

/// Which heavyweight model family a handle refers to (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    PrimaryRecognizer,
    FallbackRecognizer,
    Aligner,
    Separator,
}

/// A specific loadable variant within a `ModelKind` (e.g. separator tier name).
pub type ModelVariant = String;

/// Hardware capability profile driving the supervisor's resident-model cap
/// (spec.md §4.3: no-GPU -> 1; small GPU -> 1 heavy + light auxiliaries;
/// large GPU -> >= 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareProfile {
    NoGpu,
    SmallGpu,
    LargeGpu { resident_heavy_slots: usize },
}

impl HardwareProfile {
    pub fn max_resident(self) -> usize {
        match self {
            HardwareProfile::NoGpu => 1,
            HardwareProfile::SmallGpu => 1,
            HardwareProfile::LargeGpu { resident_heavy_slots } => resident_heavy_slots.max(2),
        }
    }
}

/// Loads/unloads the underlying model weights. The actual recognition/
/// alignment/separation engines are out of scope (spec.md §1) — this trait
/// is the seam a real backend plugs into; tests use a no-op loader.
pub trait ModelLoader: Send + Sync {
    fn load(&self, kind: ModelKind, variant: &str) -> anyhow::Result<()>;
    fn unload(&self, kind: ModelKind, variant: &str);
}

pub struct NoopLoader;

impl ModelLoader for NoopLoader {
    fn load(&self, _kind: ModelKind, _variant: &str) -> anyhow::Result<()> {
        Ok(())
    }

    fn unload(&self, _kind: ModelKind, _variant: &str) {}
}

struct ResidentModel {
    kind: ModelKind,
    variant: ModelVariant,
    ref_count: u32,
    last_used: Instant,
}

struct State {
    resident: Vec<ResidentModel>,
    max_resident: usize,
    draining: bool,
}

/// An outstanding reference to a loaded model; the holder must call
/// `ModelSupervisor::release` exactly once (spec.md §9: ownership is
/// strictly the supervisor's, everyone else holds handles).
pub struct ModelHandle {
    pub kind: ModelKind,
    pub variant: ModelVariant,
}

/// C3: mediates access to heavyweight models, enforcing one-heavy-at-a-time
/// (bounded by hardware profile) VRAM discipline via an LRU of resident
/// models. Grounded on the teacher's `sync_ext` poison-tolerant mutex/condvar
/// pattern; the teacher itself has no model-residency concept, so the guard
/// shape follows `engine/state.rs`'s single-mutex-plus-condvar `EngineState`.
pub struct ModelSupervisor {
    state: Mutex<State>,
    cv: Condvar,
    loader: Box<dyn ModelLoader>,
}

impl ModelSupervisor {
    pub fn new(profile: HardwareProfile, loader: Box<dyn ModelLoader>) -> Self {
        ModelSupervisor {
            state: Mutex::new(State { resident: Vec::new(), max_resident: profile.max_resident(), draining: false }),
            cv: Condvar::new(),
            loader,
        }
    }

    /// Acquires a handle to `(kind, variant)`, loading it if necessary. Blocks
    /// while a drain is in progress, and blocks waiting for an evictable slot
    /// if the resident set is full and no matching model is already resident
    /// (spec.md §4.3).
    pub fn acquire(&self, kind: ModelKind, variant: &str) -> Result<ModelHandle, AppError> {
        let mut guard = self.state.lock_unpoisoned();
        loop {
            guard = self.cv.wait_while_unpoisoned(guard, |s| s.draining);

            if let Some(existing) = guard.resident.iter_mut().find(|m| m.kind == kind && m.variant == variant) {
                existing.ref_count += 1;
                existing.last_used = Instant::now();
                return Ok(ModelHandle { kind, variant: variant.to_string() });
            }

            if guard.resident.len() < guard.max_resident {
                break;
            }

            let evictable_index = guard
                .resident
                .iter()
                .enumerate()
                .filter(|(_, m)| m.ref_count == 0)
                .min_by_key(|(_, m)| m.last_used)
                .map(|(i, _)| i);

            match evictable_index {
                Some(idx) => {
                    let evicted = guard.resident.remove(idx);
                    self.loader.unload(evicted.kind, &evicted.variant);
                    break;
                }
                None => {
                    guard = self.cv.wait_unpoisoned(guard);
                }
            }
        }

        drop(guard);
        self.loader.load(kind, variant).map_err(|_| AppError::ModelLoadFailed { variant: variant.to_string() })?;
        let mut guard = self.state.lock_unpoisoned();
        guard.resident.push(ResidentModel { kind, variant: variant.to_string(), ref_count: 1, last_used: Instant::now() });
        Ok(ModelHandle { kind, variant: variant.to_string() })
    }

    pub fn release(&self, handle: &ModelHandle) {
        let mut guard = self.state.lock_unpoisoned();
        if let Some(model) = guard.resident.iter_mut().find(|m| m.kind == handle.kind && m.variant == handle.variant) {
            model.ref_count = model.ref_count.saturating_sub(1);
        }
        self.cv.notify_all();
    }

    /// Unloads everything and blocks new acquires until the drain is lifted
    /// (there is currently no "lift" operation — a drain is a one-way
    /// shutdown step, consistent with C10's shutdown sequence).
    pub fn drain(&self) {
        let mut guard = self.state.lock_unpoisoned();
        guard.draining = true;
        for model in guard.resident.drain(..) {
            self.loader.unload(model.kind, &model.variant);
        }
        self.cv.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_reuses_already_resident_model() {
        let supervisor = ModelSupervisor::new(HardwareProfile::LargeGpu { resident_heavy_slots: 2 }, Box::new(NoopLoader));
        let h1 = supervisor.acquire(ModelKind::Separator, "weak").unwrap();
        let h2 = supervisor.acquire(ModelKind::Separator, "weak").unwrap();
        assert_eq!(h1.variant, h2.variant);
    }

    #[test]
    fn acquire_evicts_lru_when_full_and_idle() {
        let supervisor = ModelSupervisor::new(HardwareProfile::NoGpu, Box::new(NoopLoader));
        let h1 = supervisor.acquire(ModelKind::Separator, "weak").unwrap();
        supervisor.release(&h1);
        let h2 = supervisor.acquire(ModelKind::Separator, "strong").unwrap();
        assert_eq!(h2.variant, "strong");
    }

    #[test]
    fn drain_unloads_everything() {
        let supervisor = ModelSupervisor::new(HardwareProfile::LargeGpu { resident_heavy_slots: 2 }, Box::new(NoopLoader));
        let h1 = supervisor.acquire(ModelKind::Aligner, "default").unwrap();
        supervisor.release(&h1);
        supervisor.drain();
        let guard = supervisor.state.lock_unpoisoned();
        assert!(guard.resident.is_empty());
    }
}
