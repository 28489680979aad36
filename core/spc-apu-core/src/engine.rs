//! The real-time orchestration layer. Drives the CPU+DSP one 32 kHz tick at
//! a time, resamples to the host rate, and exposes the control surface
//! (play/pause/seek, voice mute/solo/volume, tempo sync, MIDI ingress).
//!
//! Split by thread contract, per `spec`'s concurrency model:
//! - [`Engine::process`] is the only audio-thread entry point. It is
//!   allocation-free and lock-free: it drains the command queue, advances
//!   the emulator, resamples, and writes the output buffer.
//! - Every other public method is a control-thread entry point. Simple
//!   scalar parameters (master volume, mute/solo, loop flag) are atomics
//!   read directly by `process`. Compound changes that need exclusive
//!   access to the emulator state (`LoadSpc`, `Seek`, `Stop`, MIDI events)
//!   go through a single-producer/single-consumer [`CommandQueue`] drained
//!   at the top of `process`.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};

use spc_common::audio::CubicResampler;
use spc_common::num::GetBit;
use spc_common::ring::{CommandQueue, SpscRingBuffer};

use crate::apu::Apu;
use crate::dsp::VoiceOverrides;
use crate::errors::EngineError;
use crate::midi::{self, cc, MidiEvent};
use crate::spc_file::{self, SpcSnapshot};

const DSP_SAMPLE_RATE: u32 = 32_000;
const RING_CAPACITY: usize = 16_384;
/// Extra source samples produced per `Process` call beyond the strict
/// requirement, so the cubic resampler always has enough trailing history
/// and a host-rate call never stalls waiting on one more source sample.
const RESAMPLER_PAD_SAMPLES: u32 = 4;
const DEFAULT_PITCH_BEND_RANGE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum PlaybackState {
    Unloaded = 0,
    Paused = 1,
    Playing = 2,
}

impl PlaybackState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Unloaded,
            1 => Self::Paused,
            _ => Self::Playing,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub master_volume: f32,
    pub loop_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { sample_rate: 44_100, master_volume: 1.0, loop_enabled: false }
    }
}

enum EngineCommand {
    LoadSnapshot(Box<SpcSnapshot>),
    Seek { dsp_sample_position: u64 },
    Stop,
    SetSampleRate(u32),
    Midi(MidiEvent),
}

/// Per-voice control-plane state, written only from within command
/// draining (audio-thread-owned, not shared with the control thread).
#[derive(Debug, Clone, Copy, Default)]
struct MidiVoiceState {
    active: bool,
    sustain_pending_off: bool,
    base_pitch14: u16,
}

pub struct Engine {
    apu: Apu,
    resampler: CubicResampler,
    ring: SpscRingBuffer<(i16, i16)>,
    command_queue: CommandQueue<EngineCommand>,

    playback_state: AtomicU8,
    master_volume_bits: AtomicU32,
    loop_enabled: AtomicBool,
    host_sample_rate: AtomicU32,
    voice_muted: AtomicU8,
    voice_solo: AtomicU8,
    voice_volume_bits: [AtomicU32; 8],
    dsp_sample_counter: AtomicU64,
    total_cycles: AtomicU64,
    tempo_bpm_bits: AtomicU64,
    time_sig_num_bits: AtomicU64,
    time_sig_den_bits: AtomicU64,

    // Audio-thread-owned MIDI bookkeeping, touched only while draining commands.
    sustain_pedal_down: bool,
    pitch_bend_range: u8,
    voices: [MidiVoiceState; midi::VOICE_COUNT],
}

impl Engine {
    pub fn create(config: EngineConfig) -> Result<Self, EngineError> {
        if config.sample_rate == 0 {
            return Err(EngineError::InvalidSampleRate);
        }

        Ok(Self {
            apu: Apu::new(),
            resampler: CubicResampler::new(f64::from(DSP_SAMPLE_RATE), u64::from(config.sample_rate)),
            ring: SpscRingBuffer::new(RING_CAPACITY),
            command_queue: CommandQueue::new(64),

            playback_state: AtomicU8::new(PlaybackState::Unloaded as u8),
            master_volume_bits: AtomicU32::new(config.master_volume.to_bits()),
            loop_enabled: AtomicBool::new(config.loop_enabled),
            host_sample_rate: AtomicU32::new(config.sample_rate),
            voice_muted: AtomicU8::new(0),
            voice_solo: AtomicU8::new(0),
            voice_volume_bits: std::array::from_fn(|_| AtomicU32::new(1.0_f32.to_bits())),
            dsp_sample_counter: AtomicU64::new(0),
            total_cycles: AtomicU64::new(0),
            tempo_bpm_bits: AtomicU64::new(120.0_f64.to_bits()),
            time_sig_num_bits: AtomicU64::new(4.0_f64.to_bits()),
            time_sig_den_bits: AtomicU64::new(4.0_f64.to_bits()),

            sustain_pedal_down: false,
            pitch_bend_range: DEFAULT_PITCH_BEND_RANGE,
            voices: [MidiVoiceState::default(); midi::VOICE_COUNT],
        })
    }

    // ---- Audio-thread entry point ----------------------------------------

    /// Fills `out` (interleaved stereo, `2 * frames` floats) with host-rate
    /// audio. Allocation-free, lock-free, and bounded in work proportional
    /// to `frames`. Writes silence while not playing.
    pub fn process(&mut self, out: &mut [f32], frames: usize) {
        assert!(out.len() >= frames * 2, "output buffer too small for requested frame count");
        self.drain_commands();

        if PlaybackState::from_u8(self.playback_state.load(Ordering::Relaxed))
            != PlaybackState::Playing
        {
            out[..frames * 2].fill(0.0);
            return;
        }

        let host_rate = u64::from(self.host_sample_rate.load(Ordering::Relaxed).max(1));
        let required = required_source_samples(frames as u64, host_rate);

        let overrides = self.current_voice_overrides();
        for _ in 0..required {
            let (l, r) = self.apu.run_one_dsp_tick(&overrides);
            // The ring is sized generously relative to any sane `frames`;
            // a drop here just means this sample is skipped on a pathological call.
            let _ = self.ring.push((l, r));
        }
        self.dsp_sample_counter.fetch_add(required, Ordering::Relaxed);
        self.total_cycles.store(self.apu.total_cycles(), Ordering::Relaxed);

        while let Some((l, r)) = self.ring.pop() {
            self.resampler.collect_sample(f64::from(l) / f64::from(i16::MAX), f64::from(r) / f64::from(i16::MAX));
        }

        let master_volume = f32::from_bits(self.master_volume_bits.load(Ordering::Relaxed));
        for frame in 0..frames {
            let (l, r) = self.resampler.output_buffer_pop_front().unwrap_or((0.0, 0.0));
            out[2 * frame] = l * master_volume;
            out[2 * frame + 1] = r * master_volume;
        }
    }

    fn drain_commands(&mut self) {
        while let Some(command) = self.command_queue.pop() {
            match command {
                EngineCommand::LoadSnapshot(snapshot) => {
                    self.apu.install_snapshot(&snapshot);
                    self.ring.clear();
                    self.resampler.clear();
                    self.dsp_sample_counter.store(0, Ordering::Relaxed);
                    self.reset_midi_state();
                    self.playback_state.store(PlaybackState::Paused as u8, Ordering::Relaxed);
                    log::debug!("LoadSpc installed, engine paused");
                }
                EngineCommand::Stop => {
                    self.ring.clear();
                    self.resampler.clear();
                    self.dsp_sample_counter.store(0, Ordering::Relaxed);
                    self.playback_state.store(PlaybackState::Paused as u8, Ordering::Relaxed);
                    log::debug!("Stop: position reset");
                }
                EngineCommand::Seek { dsp_sample_position } => {
                    self.ring.clear();
                    self.resampler.clear();
                    self.dsp_sample_counter.store(dsp_sample_position, Ordering::Relaxed);
                    log::debug!("Seek to dsp sample {dsp_sample_position}");
                }
                EngineCommand::SetSampleRate(rate) => {
                    self.resampler.update_output_frequency(u64::from(rate));
                    log::debug!("resampler output frequency adjusted to {rate} Hz");
                }
                EngineCommand::Midi(event) => self.apply_midi_event(event),
            }
        }
    }

    fn current_voice_overrides(&self) -> VoiceOverrides {
        let muted = self.voice_muted.load(Ordering::Relaxed);
        let solo = self.voice_solo.load(Ordering::Relaxed);
        let mut overrides = VoiceOverrides::new();
        for v in 0..8 {
            overrides.muted[v] = muted.bit(v as u8);
            overrides.solo[v] = solo.bit(v as u8);
            overrides.volume[v] = f32::from_bits(self.voice_volume_bits[v].load(Ordering::Relaxed));
        }
        overrides
    }

    // ---- Control-thread: lifecycle ---------------------------------------

    pub fn load_spc_bytes(&self, bytes: &[u8]) -> Result<(), EngineError> {
        let snapshot = spc_file::parse(bytes)?;
        let _ = self.command_queue.push(EngineCommand::LoadSnapshot(Box::new(snapshot)));
        Ok(())
    }

    pub fn load_spc_path(&self, path: &str) -> Result<(), EngineError> {
        let bytes = std::fs::read(path).map_err(|_| EngineError::TruncatedSpcFile)?;
        self.load_spc_bytes(&bytes)
    }

    pub fn play(&self) {
        if self.playback_state.load(Ordering::Relaxed) != PlaybackState::Unloaded as u8 {
            self.playback_state.store(PlaybackState::Playing as u8, Ordering::Relaxed);
        }
    }

    pub fn pause(&self) {
        if self.playback_state.load(Ordering::Relaxed) == PlaybackState::Playing as u8 {
            self.playback_state.store(PlaybackState::Paused as u8, Ordering::Relaxed);
        }
    }

    pub fn stop(&self) {
        if self.playback_state.load(Ordering::Relaxed) != PlaybackState::Unloaded as u8 {
            let _ = self.command_queue.push(EngineCommand::Stop);
        }
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playback_state.load(Ordering::Relaxed) == PlaybackState::Playing as u8
    }

    /// Only meaningful while loaded; resets the running sample counter and
    /// clears in-flight buffered audio. Not sample-exact (this is not a
    /// save-state restore, just a position jump on a running emulator).
    pub fn seek(&self, seconds: f64) {
        if self.playback_state.load(Ordering::Relaxed) == PlaybackState::Unloaded as u8 {
            return;
        }
        let dsp_sample_position = (seconds.max(0.0) * f64::from(DSP_SAMPLE_RATE)) as u64;
        let _ = self.command_queue.push(EngineCommand::Seek { dsp_sample_position });
    }

    #[must_use]
    pub fn position_seconds(&self) -> f64 {
        self.dsp_sample_counter.load(Ordering::Relaxed) as f64 / f64::from(DSP_SAMPLE_RATE)
    }

    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles.load(Ordering::Relaxed)
    }

    /// Exports the engine's current live state as `.spc`-shaped bytes.
    /// `load_spc_bytes(engine.export_spc_bytes())` resumes exactly where
    /// this call was taken, modulo the BRR-cursor approximation documented
    /// on [`crate::dsp::AudioDsp::restore_voice_envelopes_from_snapshot`].
    #[must_use]
    pub fn export_spc_bytes(&self) -> Vec<u8> {
        spc_file::write(&self.apu.export_snapshot())
    }

    // ---- Control-thread: mix/volume ---------------------------------------

    pub fn set_master_volume(&self, volume: f32) {
        self.master_volume_bits.store(volume.max(0.0).to_bits(), Ordering::Relaxed);
    }

    #[must_use]
    pub fn master_volume(&self) -> f32 {
        f32::from_bits(self.master_volume_bits.load(Ordering::Relaxed))
    }

    pub fn set_loop_enabled(&self, enabled: bool) {
        self.loop_enabled.store(enabled, Ordering::Relaxed);
    }

    #[must_use]
    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled.load(Ordering::Relaxed)
    }

    pub fn set_sample_rate(&self, sample_rate: u32) -> Result<(), EngineError> {
        if sample_rate == 0 {
            return Err(EngineError::InvalidSampleRate);
        }
        self.host_sample_rate.store(sample_rate, Ordering::Relaxed);
        let _ = self.command_queue.push(EngineCommand::SetSampleRate(sample_rate));
        Ok(())
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.host_sample_rate.load(Ordering::Relaxed)
    }

    pub fn set_voice_muted(&self, voice: usize, muted: bool) -> Result<(), EngineError> {
        set_bit_atomic(&self.voice_muted, voice, muted)
    }

    #[must_use]
    pub fn voice_muted(&self, voice: usize) -> bool {
        voice < 8 && self.voice_muted.load(Ordering::Relaxed).bit(voice as u8)
    }

    pub fn set_voice_solo(&self, voice: usize, solo: bool) -> Result<(), EngineError> {
        set_bit_atomic(&self.voice_solo, voice, solo)
    }

    #[must_use]
    pub fn voice_solo(&self, voice: usize) -> bool {
        voice < 8 && self.voice_solo.load(Ordering::Relaxed).bit(voice as u8)
    }

    pub fn set_voice_volume(&self, voice: usize, volume: f32) -> Result<(), EngineError> {
        if voice >= 8 {
            return Err(EngineError::InvalidVoiceIndex);
        }
        self.voice_volume_bits[voice].store(volume.max(0.0).to_bits(), Ordering::Relaxed);
        Ok(())
    }

    #[must_use]
    pub fn voice_volume(&self, voice: usize) -> f32 {
        if voice >= 8 {
            return 0.0;
        }
        f32::from_bits(self.voice_volume_bits[voice].load(Ordering::Relaxed))
    }

    pub fn mute_all(&self) {
        self.voice_muted.store(0xFF, Ordering::Relaxed);
    }

    pub fn unmute_all(&self) {
        self.voice_muted.store(0x00, Ordering::Relaxed);
    }

    pub fn clear_solo(&self) {
        self.voice_solo.store(0x00, Ordering::Relaxed);
    }

    // ---- Control-thread: DAW sync ------------------------------------------

    pub fn set_host_tempo(&self, bpm: f64) {
        self.tempo_bpm_bits.store(bpm.max(1.0).to_bits(), Ordering::Relaxed);
    }

    pub fn set_time_signature(&self, numerator: f64, denominator: f64) {
        self.time_sig_num_bits.store(numerator.max(1.0).to_bits(), Ordering::Relaxed);
        self.time_sig_den_bits.store(denominator.max(1.0).to_bits(), Ordering::Relaxed);
    }

    #[must_use]
    pub fn position_beats(&self) -> f64 {
        let bpm = f64::from_bits(self.tempo_bpm_bits.load(Ordering::Relaxed));
        self.position_seconds() / 60.0 * bpm
    }

    #[must_use]
    pub fn position_bars(&self) -> f64 {
        let numerator = f64::from_bits(self.time_sig_num_bits.load(Ordering::Relaxed));
        let denominator = f64::from_bits(self.time_sig_den_bits.load(Ordering::Relaxed));
        let beats_per_bar = numerator * (4.0 / denominator);
        self.position_beats() / beats_per_bar
    }

    // ---- Control-thread: MIDI ingress --------------------------------------

    pub fn midi_note_on(&self, channel: u8, note: u8, velocity: u8) {
        let _ = self.command_queue.push(EngineCommand::Midi(MidiEvent::NoteOn { channel, note, velocity }));
    }

    pub fn midi_note_off(&self, channel: u8, note: u8) {
        let _ = self.command_queue.push(EngineCommand::Midi(MidiEvent::NoteOff { channel, note }));
    }

    pub fn midi_cc(&self, channel: u8, controller: u8, value: u8) {
        let _ = self
            .command_queue
            .push(EngineCommand::Midi(MidiEvent::ControlChange { channel, controller, value }));
    }

    pub fn midi_pitch_bend(&self, channel: u8, value: i16) {
        let _ = self.command_queue.push(EngineCommand::Midi(MidiEvent::PitchBend { channel, value }));
    }

    pub fn midi_set_pitch_bend_range(&self, semitones: u8) {
        let _ = self.command_queue.push(EngineCommand::Midi(MidiEvent::SetPitchBendRange { semitones }));
    }

    pub fn midi_reset(&self) {
        let _ = self.command_queue.push(EngineCommand::Midi(MidiEvent::Reset));
    }

    fn apply_midi_event(&mut self, event: MidiEvent) {
        match event {
            MidiEvent::NoteOn { note, velocity, .. } => {
                if let Some(v) = midi::note_to_voice(note) {
                    let base_pitch = self.apu.dsp().voice_pitch(v);
                    self.voices[v] = MidiVoiceState {
                        active: true,
                        sustain_pending_off: false,
                        base_pitch14: base_pitch,
                    };
                    let _ = self.set_voice_volume(v, midi::velocity_to_volume(velocity));
                    self.apu.dsp_mut().key_on_voice(v);
                }
            }
            MidiEvent::NoteOff { note, .. } => {
                if let Some(v) = midi::note_to_voice(note) {
                    if self.sustain_pedal_down {
                        self.voices[v].sustain_pending_off = true;
                    } else {
                        self.apu.dsp_mut().key_off_voice(v);
                        self.voices[v].active = false;
                    }
                }
            }
            MidiEvent::ControlChange { controller, value, .. } => self.apply_cc(controller, value),
            MidiEvent::PitchBend { value, .. } => {
                let multiplier = midi::pitch_bend_multiplier(value, self.pitch_bend_range);
                for v in 0..midi::VOICE_COUNT {
                    if self.voices[v].active {
                        let pitch = midi::apply_pitch_multiplier(self.voices[v].base_pitch14, multiplier);
                        self.apu.dsp_mut().set_voice_pitch(v, pitch);
                    }
                }
            }
            MidiEvent::SetPitchBendRange { semitones } => {
                self.pitch_bend_range = midi::clamp_pitch_bend_range(semitones);
            }
            MidiEvent::Reset => self.reset_midi_state(),
        }
    }

    fn apply_cc(&mut self, controller: u8, value: u8) {
        match controller {
            cc::MASTER_VOLUME | cc::MASTER_VOLUME_ALT => {
                self.set_master_volume(midi::cc_to_master_volume(value));
            }
            cc::SUSTAIN => self.set_sustain(value >= 64),
            cc::MUTE_VOICE => {
                if (value as usize) < 8 {
                    let muted = self.voice_muted(value as usize);
                    let _ = self.set_voice_muted(value as usize, !muted);
                }
            }
            cc::SOLO_VOICE => {
                if (value as usize) < 8 {
                    let solo = self.voice_solo(value as usize);
                    let _ = self.set_voice_solo(value as usize, !solo);
                }
            }
            cc::ECHO_FEEDBACK => self.apu.dsp_mut().set_echo_feedback(midi::cc_to_echo_feedback(value)),
            cc::ECHO_DELAY => self.apu.dsp_mut().set_echo_delay(midi::cc_to_echo_delay(value)),
            cc::LOOP_ENABLE => self.set_loop_enabled(value >= 64),
            cc::PLAY_PAUSE_TOGGLE if value >= 64 => {
                if self.is_playing() {
                    self.pause();
                } else {
                    self.play();
                }
            }
            cc::STOP_RESET if value >= 64 => {
                let _ = self.command_queue.push(EngineCommand::Stop);
            }
            cc::ALL_SOUND_OFF | cc::ALL_NOTES_OFF => {
                for v in 0..midi::VOICE_COUNT {
                    self.apu.dsp_mut().key_off_voice(v);
                    self.voices[v] = MidiVoiceState::default();
                }
            }
            cc::RESET_CONTROLLERS => {
                self.sustain_pedal_down = false;
                self.pitch_bend_range = DEFAULT_PITCH_BEND_RANGE;
            }
            _ => {}
        }
    }

    fn set_sustain(&mut self, down: bool) {
        self.sustain_pedal_down = down;
        if !down {
            for v in 0..midi::VOICE_COUNT {
                if self.voices[v].sustain_pending_off {
                    self.apu.dsp_mut().key_off_voice(v);
                    self.voices[v].sustain_pending_off = false;
                    self.voices[v].active = false;
                }
            }
        }
    }

    fn reset_midi_state(&mut self) {
        self.sustain_pedal_down = false;
        self.pitch_bend_range = DEFAULT_PITCH_BEND_RANGE;
        self.voices = [MidiVoiceState::default(); midi::VOICE_COUNT];
    }
}

fn set_bit_atomic(atomic: &AtomicU8, voice: usize, value: bool) -> Result<(), EngineError> {
    if voice >= 8 {
        return Err(EngineError::InvalidVoiceIndex);
    }
    let bit = 1u8 << voice;
    if value {
        atomic.fetch_or(bit, Ordering::Relaxed);
    } else {
        atomic.fetch_and(!bit, Ordering::Relaxed);
    }
    Ok(())
}

/// How many 32 kHz source samples are needed to cover `frames` host-rate
/// output frames, padded so the resampler never runs dry mid-call.
fn required_source_samples(frames: u64, host_sample_rate: u64) -> u64 {
    let needed = (frames * u64::from(DSP_SAMPLE_RATE)).div_ceil(host_sample_rate.max(1));
    needed + u64::from(RESAMPLER_PAD_SAMPLES)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(sample_rate: u32) -> EngineConfig {
        EngineConfig { sample_rate, ..EngineConfig::default() }
    }

    #[test]
    fn empty_engine_renders_silence() {
        let mut engine = Engine::create(config(44_100)).unwrap();
        let mut out = vec![1.0_f32; 512];
        engine.process(&mut out, 256);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn invalid_sample_rate_is_rejected() {
        assert!(Engine::create(config(0)).is_err());
    }

    #[test]
    fn play_without_load_does_not_transition_to_playing() {
        let engine = Engine::create(config(44_100)).unwrap();
        engine.play();
        assert!(!engine.is_playing());
    }

    #[test]
    fn voice_index_out_of_range_is_rejected() {
        let engine = Engine::create(config(44_100)).unwrap();
        assert_eq!(engine.set_voice_muted(8, true), Err(EngineError::InvalidVoiceIndex));
    }

    #[test]
    fn mute_all_and_unmute_all_round_trip() {
        let engine = Engine::create(config(44_100)).unwrap();
        engine.mute_all();
        assert!(engine.voice_muted(3));
        engine.unmute_all();
        assert!(!engine.voice_muted(3));
    }

    #[test]
    fn midi_cc_102_toggles_mute_twice_back_to_unmuted() {
        let mut engine = Engine::create(config(44_100)).unwrap();
        engine.midi_cc(0, cc::MUTE_VOICE, 3);
        engine.process(&mut [0.0; 2], 1);
        assert!(engine.voice_muted(3));
        engine.midi_cc(0, cc::MUTE_VOICE, 3);
        engine.process(&mut [0.0; 2], 1);
        assert!(!engine.voice_muted(3));
    }

    #[test]
    fn pitch_bend_of_zero_leaves_active_voice_pitch_unchanged() {
        let mut engine = Engine::create(config(44_100)).unwrap();
        engine.midi_note_on(0, 60, 100);
        engine.process(&mut [0.0; 2], 1);
        let before = engine.apu.dsp().voice_pitch(0);
        engine.midi_pitch_bend(0, 0);
        engine.process(&mut [0.0; 2], 1);
        assert_eq!(engine.apu.dsp().voice_pitch(0), before);
    }

    #[test]
    fn required_source_samples_covers_low_host_rate() {
        assert!(required_source_samples(256, 8_000) >= 256 * 32_000 / 8_000);
    }

    #[test]
    fn master_volume_scales_output() {
        let engine = Engine::create(config(44_100)).unwrap();
        engine.set_master_volume(0.5);
        assert!((engine.master_volume() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn process_survives_ten_thousand_consecutive_calls() {
        // `process` is documented as allocation-free and bounded per call;
        // this doesn't measure heap growth directly (no counting allocator
        // is wired into this workspace's dependency stack), but it does
        // pin that repeated calls never panic, deadlock, or degrade, which
        // is what would actually be visible from a stuck or leaking
        // real-time audio callback.
        let mut engine = Engine::create(config(44_100)).unwrap();
        engine.midi_note_on(0, 60, 100);
        engine.process(&mut [0.0; 2], 1);
        engine.play();
        let mut out = [0.0_f32; 512];
        for _ in 0..10_000 {
            engine.process(&mut out, 256);
        }
    }

    #[test]
    fn position_beats_tracks_tempo() {
        let engine = Engine::create(config(44_100)).unwrap();
        engine.set_host_tempo(120.0);
        engine.seek(30.0);
        engine.stop();
        // After Stop the position resets; this only exercises that the
        // tempo-driven formula doesn't panic across a full control sequence.
        assert_eq!(engine.position_beats(), 0.0);
    }
}
