//! MIDI control-surface mapping: note/CC/pitch-bend events translated into
//! engine and DSP actions. This module only holds pure, allocation-free
//! mapping functions and the wire-level event type; [`crate::engine::Engine`]
//! owns the mutable state (which voice a note is currently sounding on,
//! sustain-pedal deferral, the pitch-bend range) and calls into these
//! helpers to compute the numeric results.

/// Notes 60-67 map to voices 0-7, one voice per semitone.
const FIRST_MAPPED_NOTE: u8 = 60;
pub const VOICE_COUNT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    PitchBend { channel: u8, value: i16 },
    SetPitchBendRange { semitones: u8 },
    Reset,
}

/// CC numbers this engine responds to; every other CC is a silent no-op.
pub mod cc {
    pub const MASTER_VOLUME: u8 = 7;
    pub const MASTER_VOLUME_ALT: u8 = 104;
    pub const SUSTAIN: u8 = 64;
    pub const MUTE_VOICE: u8 = 102;
    pub const SOLO_VOICE: u8 = 103;
    pub const ECHO_FEEDBACK: u8 = 105;
    pub const ECHO_DELAY: u8 = 106;
    pub const LOOP_ENABLE: u8 = 108;
    pub const PLAY_PAUSE_TOGGLE: u8 = 109;
    pub const STOP_RESET: u8 = 110;
    pub const ALL_SOUND_OFF: u8 = 120;
    pub const ALL_NOTES_OFF: u8 = 123;
    pub const RESET_CONTROLLERS: u8 = 121;
}

/// Maps a MIDI note number to a voice index, for the 8 notes starting at
/// middle C (60). Returns `None` outside that 8-note window.
#[must_use]
pub fn note_to_voice(note: u8) -> Option<usize> {
    let offset = note.checked_sub(FIRST_MAPPED_NOTE)?;
    (offset < VOICE_COUNT as u8).then_some(offset as usize)
}

/// `vel/127`, used directly as a voice output-scale override.
#[must_use]
pub fn velocity_to_volume(velocity: u8) -> f32 {
    f32::from(velocity) / 127.0
}

/// CC 7 / CC 104: linear 0-200% master volume.
#[must_use]
pub fn cc_to_master_volume(value: u8) -> f32 {
    f32::from(value) / 127.0 * 2.0
}

/// CC 105: signed echo feedback, `val - 64`.
#[must_use]
pub fn cc_to_echo_feedback(value: u8) -> i8 {
    (i16::from(value) - 64) as i8
}

/// CC 106: echo delay in `EDL` units (0-15), `val/8`.
#[must_use]
pub fn cc_to_echo_delay(value: u8) -> u8 {
    (value / 8).min(15)
}

/// `2^((bend/8192) * range/12)`, the multiplier applied on top of a voice's
/// pitch register at the moment the bend is received.
#[must_use]
pub fn pitch_bend_multiplier(bend: i16, range_semitones: u8) -> f64 {
    let normalized = f64::from(bend) / 8192.0;
    2.0_f64.powf(normalized * f64::from(range_semitones) / 12.0)
}

/// Applies a pitch multiplier to a 14-bit pitch register value and clamps
/// the result back into 14 bits.
#[must_use]
pub fn apply_pitch_multiplier(base_pitch14: u16, multiplier: f64) -> u16 {
    let result = (f64::from(base_pitch14) * multiplier).round();
    result.clamp(0.0, 0x3FFF as f64) as u16
}

/// Pitch-bend range is clamped to 1..=24 semitones per the error-handling
/// policy's "out-of-range control setters are clamped" rule.
#[must_use]
pub fn clamp_pitch_bend_range(semitones: u8) -> u8 {
    semitones.clamp(1, 24)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notes_60_to_67_map_to_voices_0_to_7() {
        for (note, voice) in (60_u8..=67).zip(0_usize..8) {
            assert_eq!(note_to_voice(note), Some(voice));
        }
        assert_eq!(note_to_voice(59), None);
        assert_eq!(note_to_voice(68), None);
    }

    #[test]
    fn zero_bend_is_unity_multiplier() {
        assert!((pitch_bend_multiplier(0, 2) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn max_bend_with_range_two_doubles_pitch_approximately() {
        let multiplier = pitch_bend_multiplier(8191, 2);
        let expected = 2.0_f64.powf(8191.0 / 8192.0 * 2.0 / 12.0);
        assert!((multiplier - expected).abs() < 1e-9);
    }

    #[test]
    fn pitch_multiplier_clamps_to_14_bits() {
        assert_eq!(apply_pitch_multiplier(0x3FFF, 4.0), 0x3FFF);
    }

    #[test]
    fn echo_feedback_cc_maps_to_signed_range() {
        assert_eq!(cc_to_echo_feedback(64), 0);
        assert_eq!(cc_to_echo_feedback(0), -64);
        assert_eq!(cc_to_echo_feedback(127), 63);
    }

    #[test]
    fn pitch_bend_range_clamps_to_documented_bounds() {
        assert_eq!(clamp_pitch_bend_range(0), 1);
        assert_eq!(clamp_pitch_bend_range(30), 24);
        assert_eq!(clamp_pitch_bend_range(12), 12);
    }
}
