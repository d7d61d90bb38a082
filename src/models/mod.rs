//! C3: Model Supervisor — serializes loading/unloading of heavy models and
//! enforces one-heavy-at-a-time VRAM discipline.

mod supervisor;

pub use supervisor::{HardwareProfile, ModelHandle, ModelKind, ModelLoader, ModelSupervisor, ModelVariant, NoopLoader};
