//! The C ABI surface. Every function is `extern "C"`, takes a handle as its
//! first argument (except `engine_create`), and reports failure as `0`/`1`
//! (or a sentinel handle of `0`) rather than unwinding across the FFI
//! boundary.
//!
//! Handles are generation-checked: an `EngineHandle` packs a slot index and
//! a generation counter, so a stale handle from a destroyed engine is
//! rejected instead of dereferencing freed memory. This is a hand-rolled
//! slab (no published crate fits the "check, then operate on a raw pointer
//! outside the lock" shape this needs) documented in `DESIGN.md`, in the
//! same spirit as the ring buffer in `spc_common::ring`.
//!
//! Lookup briefly locks a registry mutex to validate the handle and copy
//! out a raw pointer, then releases the lock before calling into the
//! engine. This keeps the lock's critical section tiny and uncontended
//! even on the call that drives real-time audio (`engine_process`); the
//! actual real-time path inside [`crate::engine::Engine`] remains
//! allocation-free and lock-free as designed. Callers must not call
//! `engine_destroy` concurrently with any other call on the same handle,
//! same as any C API built on this pattern.

use std::ffi::CStr;
use std::os::raw::c_char;
use std::sync::{Mutex, OnceLock};

use crate::engine::{Engine, EngineConfig};
use crate::errors::EngineError;

struct Slot {
    ptr: *mut Engine,
    generation: u32,
}

// SAFETY: the raw pointer is only ever dereferenced through the handle
// lookup contract described above; the slab itself just moves the pointer
// value around under the mutex.
unsafe impl Send for Slot {}

struct Registry {
    slots: Vec<Slot>,
    free_list: Vec<usize>,
}

impl Registry {
    const fn new() -> Self {
        Self { slots: Vec::new(), free_list: Vec::new() }
    }

    fn insert(&mut self, engine: Engine) -> u64 {
        let ptr = Box::into_raw(Box::new(engine));
        let index = if let Some(index) = self.free_list.pop() {
            self.slots[index] = Slot { ptr, generation: self.slots[index].generation.wrapping_add(1) };
            index
        } else {
            self.slots.push(Slot { ptr, generation: 1 });
            self.slots.len() - 1
        };
        encode_handle(index, self.slots[index].generation)
    }

    fn remove(&mut self, handle: u64) -> Option<*mut Engine> {
        let (index, generation) = decode_handle(handle)?;
        let slot = self.slots.get_mut(index)?;
        if slot.ptr.is_null() || slot.generation != generation {
            return None;
        }
        let ptr = slot.ptr;
        slot.ptr = std::ptr::null_mut();
        self.free_list.push(index);
        Some(ptr)
    }

    fn resolve(&self, handle: u64) -> Option<*mut Engine> {
        let (index, generation) = decode_handle(handle)?;
        let slot = self.slots.get(index)?;
        (!slot.ptr.is_null() && slot.generation == generation).then_some(slot.ptr)
    }
}

fn registry() -> &'static Mutex<Registry> {
    static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(Registry::new()))
}

fn encode_handle(index: usize, generation: u32) -> u64 {
    (u64::from(generation) << 32) | index as u64
}

fn decode_handle(handle: u64) -> Option<(usize, u32)> {
    if handle == 0 {
        return None;
    }
    let index = (handle & 0xFFFF_FFFF) as usize;
    let generation = (handle >> 32) as u32;
    Some((index, generation))
}

/// Runs `f` with a `&mut Engine` resolved from `handle`, or returns
/// `default` if the handle is stale or unknown.
fn with_engine<T>(handle: u64, default: T, f: impl FnOnce(&mut Engine) -> T) -> T {
    let ptr = match registry().lock().unwrap().resolve(handle) {
        Some(ptr) => ptr,
        None => {
            log::warn!("ABI call on invalid or stale engine handle");
            return default;
        }
    };
    // SAFETY: `ptr` was validated against the registry's generation just
    // above, under the lock; the caller contract forbids a concurrent
    // `engine_destroy` on this handle for the duration of this call.
    let engine = unsafe { &mut *ptr };
    f(engine)
}

#[no_mangle]
pub extern "C" fn engine_create(sample_rate: u32, master_volume: f32, loop_enabled: u8) -> u64 {
    let config = EngineConfig { sample_rate, master_volume, loop_enabled: loop_enabled != 0 };
    match Engine::create(config) {
        Ok(engine) => registry().lock().unwrap().insert(engine),
        Err(err) => {
            log::warn!("engine_create rejected: {err}");
            0
        }
    }
}

#[no_mangle]
pub extern "C" fn engine_destroy(handle: u64) {
    if let Some(ptr) = registry().lock().unwrap().remove(handle) {
        // SAFETY: `remove` only returns a pointer it owns and has just
        // evicted from the slab, so nothing else can be resolving it.
        drop(unsafe { Box::from_raw(ptr) });
    }
}

/// # Safety
/// `data` must point to at least `len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn engine_load_spc_bytes(handle: u64, data: *const u8, len: usize) -> u8 {
    if data.is_null() {
        return 0;
    }
    let bytes = std::slice::from_raw_parts(data, len);
    with_engine(handle, 0, |engine| EngineError::abi_result(engine.load_spc_bytes(bytes)))
}

/// # Safety
/// `path` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn engine_load_spc_path(handle: u64, path: *const c_char) -> u8 {
    if path.is_null() {
        return 0;
    }
    let path = match CStr::from_ptr(path).to_str() {
        Ok(path) => path,
        Err(_) => return 0,
    };
    with_engine(handle, 0, |engine| EngineError::abi_result(engine.load_spc_path(path)))
}

#[no_mangle]
pub extern "C" fn engine_play(handle: u64) {
    with_engine(handle, (), Engine::play);
}

#[no_mangle]
pub extern "C" fn engine_pause(handle: u64) {
    with_engine(handle, (), Engine::pause);
}

#[no_mangle]
pub extern "C" fn engine_stop(handle: u64) {
    with_engine(handle, (), Engine::stop);
}

#[no_mangle]
pub extern "C" fn engine_is_playing(handle: u64) -> u8 {
    with_engine(handle, 0, |engine| u8::from(engine.is_playing()))
}

#[no_mangle]
pub extern "C" fn engine_seek(handle: u64, seconds: f64) {
    with_engine(handle, (), |engine| engine.seek(seconds));
}

#[no_mangle]
pub extern "C" fn engine_get_position_seconds(handle: u64) -> f64 {
    with_engine(handle, 0.0, Engine::position_seconds)
}

#[no_mangle]
pub extern "C" fn engine_get_total_cycles(handle: u64) -> u64 {
    with_engine(handle, 0, Engine::total_cycles)
}

/// Fills `out` (interleaved stereo, `2 * frames` floats) with the next
/// block of audio. The only ABI call meant to run on the audio thread.
///
/// # Safety
/// `out` must point to at least `2 * frames` writable `f32`s.
#[no_mangle]
pub unsafe extern "C" fn engine_process(handle: u64, out: *mut f32, frames: usize) {
    if out.is_null() {
        return;
    }
    let out = std::slice::from_raw_parts_mut(out, frames * 2);
    with_engine(handle, (), |engine| engine.process(out, frames));
}

#[no_mangle]
pub extern "C" fn engine_set_master_volume(handle: u64, volume: f32) {
    with_engine(handle, (), |engine| engine.set_master_volume(volume));
}

#[no_mangle]
pub extern "C" fn engine_get_master_volume(handle: u64) -> f32 {
    with_engine(handle, 0.0, Engine::master_volume)
}

#[no_mangle]
pub extern "C" fn engine_set_loop_enabled(handle: u64, enabled: u8) {
    with_engine(handle, (), |engine| engine.set_loop_enabled(enabled != 0));
}

#[no_mangle]
pub extern "C" fn engine_get_loop_enabled(handle: u64) -> u8 {
    with_engine(handle, 0, |engine| u8::from(engine.loop_enabled()))
}

#[no_mangle]
pub extern "C" fn engine_set_sample_rate(handle: u64, sample_rate: u32) -> u8 {
    with_engine(handle, 0, |engine| EngineError::abi_result(engine.set_sample_rate(sample_rate)))
}

#[no_mangle]
pub extern "C" fn engine_get_sample_rate(handle: u64) -> u32 {
    with_engine(handle, 0, Engine::sample_rate)
}

#[no_mangle]
pub extern "C" fn engine_set_voice_muted(handle: u64, voice: usize, muted: u8) -> u8 {
    with_engine(handle, 0, |engine| EngineError::abi_result(engine.set_voice_muted(voice, muted != 0)))
}

#[no_mangle]
pub extern "C" fn engine_get_voice_muted(handle: u64, voice: usize) -> u8 {
    with_engine(handle, 0, |engine| u8::from(engine.voice_muted(voice)))
}

#[no_mangle]
pub extern "C" fn engine_set_voice_solo(handle: u64, voice: usize, solo: u8) -> u8 {
    with_engine(handle, 0, |engine| EngineError::abi_result(engine.set_voice_solo(voice, solo != 0)))
}

#[no_mangle]
pub extern "C" fn engine_get_voice_solo(handle: u64, voice: usize) -> u8 {
    with_engine(handle, 0, |engine| u8::from(engine.voice_solo(voice)))
}

#[no_mangle]
pub extern "C" fn engine_set_voice_volume(handle: u64, voice: usize, volume: f32) -> u8 {
    with_engine(handle, 0, |engine| EngineError::abi_result(engine.set_voice_volume(voice, volume)))
}

#[no_mangle]
pub extern "C" fn engine_get_voice_volume(handle: u64, voice: usize) -> f32 {
    with_engine(handle, 0.0, |engine| engine.voice_volume(voice))
}

#[no_mangle]
pub extern "C" fn engine_mute_all(handle: u64) {
    with_engine(handle, (), Engine::mute_all);
}

#[no_mangle]
pub extern "C" fn engine_unmute_all(handle: u64) {
    with_engine(handle, (), Engine::unmute_all);
}

#[no_mangle]
pub extern "C" fn engine_clear_solo(handle: u64) {
    with_engine(handle, (), Engine::clear_solo);
}

#[no_mangle]
pub extern "C" fn engine_set_host_tempo(handle: u64, bpm: f64) {
    with_engine(handle, (), |engine| engine.set_host_tempo(bpm));
}

#[no_mangle]
pub extern "C" fn engine_set_time_signature(handle: u64, numerator: f64, denominator: f64) {
    with_engine(handle, (), |engine| engine.set_time_signature(numerator, denominator));
}

#[no_mangle]
pub extern "C" fn engine_get_position_beats(handle: u64) -> f64 {
    with_engine(handle, 0.0, Engine::position_beats)
}

#[no_mangle]
pub extern "C" fn engine_get_position_bars(handle: u64) -> f64 {
    with_engine(handle, 0.0, Engine::position_bars)
}

#[no_mangle]
pub extern "C" fn engine_midi_note_on(handle: u64, channel: u8, note: u8, velocity: u8) {
    with_engine(handle, (), |engine| engine.midi_note_on(channel, note, velocity));
}

#[no_mangle]
pub extern "C" fn engine_midi_note_off(handle: u64, channel: u8, note: u8) {
    with_engine(handle, (), |engine| engine.midi_note_off(channel, note));
}

#[no_mangle]
pub extern "C" fn engine_midi_cc(handle: u64, channel: u8, controller: u8, value: u8) {
    with_engine(handle, (), |engine| engine.midi_cc(channel, controller, value));
}

#[no_mangle]
pub extern "C" fn engine_midi_pitch_bend(handle: u64, channel: u8, value: i16) {
    with_engine(handle, (), |engine| engine.midi_pitch_bend(channel, value));
}

#[no_mangle]
pub extern "C" fn engine_midi_set_pitch_bend_range(handle: u64, semitones: u8) {
    with_engine(handle, (), |engine| engine.midi_set_pitch_bend_range(semitones));
}

#[no_mangle]
pub extern "C" fn engine_midi_reset(handle: u64) {
    with_engine(handle, (), Engine::midi_reset);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_destroy_invalidates_handle() {
        let handle = engine_create(44_100, 1.0, 0);
        assert_ne!(handle, 0);
        assert_eq!(engine_is_playing(handle), 0);
        engine_destroy(handle);
        // Stale handle is rejected rather than dereferencing freed memory.
        assert_eq!(engine_is_playing(handle), 0);
        engine_destroy(handle);
    }

    #[test]
    fn reused_slot_gets_a_new_generation() {
        let first = engine_create(44_100, 1.0, 0);
        engine_destroy(first);
        let second = engine_create(44_100, 1.0, 0);
        assert_ne!(first, second);
        engine_destroy(second);
    }

    #[test]
    fn zero_sample_rate_is_rejected_at_creation() {
        assert_eq!(engine_create(0, 1.0, 0), 0);
    }

    #[test]
    fn invalid_voice_index_returns_zero() {
        let handle = engine_create(44_100, 1.0, 0);
        assert_eq!(engine_set_voice_muted(handle, 9, 1), 0);
        engine_destroy(handle);
    }

    #[test]
    fn process_through_abi_writes_silence_when_unloaded() {
        let handle = engine_create(44_100, 1.0, 0);
        let mut out = [1.0_f32; 8];
        unsafe { engine_process(handle, out.as_mut_ptr(), 4) };
        assert!(out.iter().all(|&s| s == 0.0));
        engine_destroy(handle);
    }
}
