//! The SNES audio core: SPC700 CPU + S-DSP glued together over a shared
//! 64 KiB RAM (`apu`), the BRR sample codec (`brr`), hardware timers
//! (`timers`), the S-DSP itself (`dsp`), `.spc` snapshot parsing
//! (`spc_file`), the real-time orchestration layer (`engine`), the
//! MIDI control-surface mapping (`midi`), and the C ABI (`abi`).

pub mod abi;
pub mod apu;
pub mod brr;
pub mod dsp;
pub mod engine;
pub mod errors;
pub mod midi;
pub mod spc_file;
pub mod timers;

pub use errors::EngineError;
