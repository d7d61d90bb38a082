//! C7: Media Supervisor — generates derived editor media (waveform peaks,
//! preview proxies, thumbnails) with a small fixed worker pool and a
//! documented per-artifact priority order (spec.md §4.7).

mod generator;
mod supervisor;

pub use generator::ArtifactGenerator;
pub use supervisor::MediaSupervisor;
