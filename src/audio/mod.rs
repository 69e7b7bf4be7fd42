//! Audio: note selection, voices, and the output backends
//!
//! - `scale`: the note table, length-to-pitch mapping and anti-repetition
//! - `voice`: gain envelopes and the polyphony pool
//! - `engine`: turns hits into voices against an [`AudioBackend`]
//! - `web`: the Web Audio graph (wasm only)

pub mod backend;
pub mod engine;
pub mod scale;
pub mod voice;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use backend::{AudioBackend, AudioError, BackendCall, BusParams, RecordingBackend};
pub use engine::{AudioEngine, HitSound, NoteObserver, TriggerOutcome};
#[cfg(target_arch = "wasm32")]
pub use web::WebAudioBackend;
