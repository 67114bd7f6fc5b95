//! Multi-speaker VITS text-to-speech engine.
//!
//! Runs a VITS network exported to ONNX (the layout used by Piper voices)
//! through ONNX Runtime. Text is phonemized with espeak-ng, mapped to the
//! model's phoneme ids and synthesized with an optional speaker id.
//!
//! # System Requirements
//!
//! **espeak-ng** must be installed on your system:
//! - **Linux**: `sudo apt-get install espeak-ng`
//! - **macOS**: `brew install espeak-ng`
//! - **Windows**: Download installer from <https://espeak-ng.org/download>
//!
//! # Model Directory Layout
//!
//! ```text
//! models/vctk/
//! ├── en_GB-vctk-medium.onnx        # VITS network (109 VCTK speakers, 22050 Hz)
//! └── en_GB-vctk-medium.onnx.json   # phoneme ids, speaker ids, sample rate
//! ```
//!
//! `config.json` is accepted in place of the `.onnx.json` sidecar.
//!
//! Download: <https://huggingface.co/rhasspy/piper-voices/tree/main/en/en_GB/vctk/medium>
//!
//! # Devices
//!
//! CUDA is requested with [`Device::Cuda`](crate::config::Device). A session
//! that cannot register the CUDA provider fails to load instead of silently
//! running on the CPU, so the caller decides about falling back.

pub mod config;
pub mod engine;
pub mod model;
pub mod phonemizer;

pub use engine::{VitsEngine, VitsModelParams};
pub use model::VitsError;
