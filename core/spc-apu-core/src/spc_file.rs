//! Parses the `.spc` snapshot format: a 256-byte header carrying the CPU
//! register state, a 64 KiB RAM image, a 128-byte DSP register image, and
//! (optionally, in files that carry it) an extra RAM page. ID666 metadata
//! and the IPL ROM image are not parsed; the engine has no boot handshake
//! to replay (see `spec`'s non-goals) and no use for song metadata.

use spc700_emu::{Registers, StatusRegister};

use crate::apu::{AudioRam, AUDIO_RAM_LEN};
use crate::errors::EngineError;

const PC_OFFSET: usize = 0x25;
const A_OFFSET: usize = 0x27;
const X_OFFSET: usize = 0x28;
const Y_OFFSET: usize = 0x29;
const PSW_OFFSET: usize = 0x2A;
const SP_OFFSET: usize = 0x2B;

const RAM_OFFSET: usize = 0x100;
const DSP_REGISTERS_OFFSET: usize = 0x1_0100;
const DSP_REGISTERS_LEN: usize = 128;
const EXTRA_RAM_OFFSET: usize = 0x1_01C0;
const EXTRA_RAM_LEN: usize = 64;

/// The minimum length for which the CPU-register/RAM/DSP-register portion
/// of the file is guaranteed present; files shorter than this cannot be
/// loaded at all. Files at or above this length but shorter than the full
/// documented 66048-byte snapshot are accepted with the extra RAM page
/// defaulted to zero.
pub const MIN_SPC_FILE_LEN: usize = 0x1_0180;

#[derive(Debug, Clone)]
pub struct SpcSnapshot {
    pub registers: Registers,
    pub ram: Box<AudioRam>,
    pub dsp_registers: [u8; DSP_REGISTERS_LEN],
    pub extra_ram: [u8; EXTRA_RAM_LEN],
}

/// Parses a raw `.spc` file. The leading magic string and ID666 metadata
/// block are not validated; any file at least [`MIN_SPC_FILE_LEN`] bytes
/// long and carrying plausible register offsets is accepted, matching the
/// engine's role as a pure render core rather than a file-format validator.
pub fn parse(bytes: &[u8]) -> Result<SpcSnapshot, EngineError> {
    if bytes.len() < MIN_SPC_FILE_LEN {
        return Err(EngineError::TruncatedSpcFile);
    }

    let registers = Registers {
        pc: u16::from_le_bytes([bytes[PC_OFFSET], bytes[PC_OFFSET + 1]]),
        a: bytes[A_OFFSET],
        x: bytes[X_OFFSET],
        y: bytes[Y_OFFSET],
        sp: bytes[SP_OFFSET],
        psw: StatusRegister::from(bytes[PSW_OFFSET]),
    };

    let mut ram = vec![0u8; AUDIO_RAM_LEN].into_boxed_slice();
    ram.copy_from_slice(&bytes[RAM_OFFSET..RAM_OFFSET + AUDIO_RAM_LEN]);
    let ram: Box<AudioRam> = ram.try_into().unwrap();

    let mut dsp_registers = [0u8; DSP_REGISTERS_LEN];
    dsp_registers
        .copy_from_slice(&bytes[DSP_REGISTERS_OFFSET..DSP_REGISTERS_OFFSET + DSP_REGISTERS_LEN]);

    let mut extra_ram = [0u8; EXTRA_RAM_LEN];
    if bytes.len() >= EXTRA_RAM_OFFSET + EXTRA_RAM_LEN {
        extra_ram.copy_from_slice(&bytes[EXTRA_RAM_OFFSET..EXTRA_RAM_OFFSET + EXTRA_RAM_LEN]);
    }

    Ok(SpcSnapshot { registers, ram, dsp_registers, extra_ram })
}

/// Serializes a snapshot back to `.spc`-shaped bytes, the inverse of
/// [`parse`]. Writes exactly [`MIN_SPC_FILE_LEN`] bytes: the ID666 metadata
/// block and IPL ROM image this core never reads are left zeroed rather than
/// reconstructed, since nothing downstream of this core parses them back out.
#[must_use]
pub fn write(snapshot: &SpcSnapshot) -> Vec<u8> {
    let mut bytes = vec![0u8; MIN_SPC_FILE_LEN];

    let [pc_lo, pc_hi] = snapshot.registers.pc.to_le_bytes();
    bytes[PC_OFFSET] = pc_lo;
    bytes[PC_OFFSET + 1] = pc_hi;
    bytes[A_OFFSET] = snapshot.registers.a;
    bytes[X_OFFSET] = snapshot.registers.x;
    bytes[Y_OFFSET] = snapshot.registers.y;
    bytes[PSW_OFFSET] = u8::from(snapshot.registers.psw);
    bytes[SP_OFFSET] = snapshot.registers.sp;

    bytes[RAM_OFFSET..RAM_OFFSET + AUDIO_RAM_LEN].copy_from_slice(&snapshot.ram[..]);
    bytes[DSP_REGISTERS_OFFSET..DSP_REGISTERS_OFFSET + DSP_REGISTERS_LEN]
        .copy_from_slice(&snapshot.dsp_registers);

    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_file() -> Vec<u8> {
        let mut bytes = vec![0u8; MIN_SPC_FILE_LEN];
        bytes[PC_OFFSET] = 0x34;
        bytes[PC_OFFSET + 1] = 0x12;
        bytes[A_OFFSET] = 0xAA;
        bytes[X_OFFSET] = 0xBB;
        bytes[Y_OFFSET] = 0xCC;
        bytes[PSW_OFFSET] = 0x80;
        bytes[SP_OFFSET] = 0xEF;
        bytes
    }

    #[test]
    fn parses_register_header() {
        let snapshot = parse(&minimal_file()).unwrap();
        assert_eq!(snapshot.registers.pc, 0x1234);
        assert_eq!(snapshot.registers.a, 0xAA);
        assert_eq!(snapshot.registers.x, 0xBB);
        assert_eq!(snapshot.registers.y, 0xCC);
        assert_eq!(snapshot.registers.sp, 0xEF);
        assert!(snapshot.registers.psw.negative);
    }

    #[test]
    fn rejects_truncated_file() {
        let bytes = vec![0u8; MIN_SPC_FILE_LEN - 1];
        assert_eq!(parse(&bytes).unwrap_err(), EngineError::TruncatedSpcFile);
    }

    #[test]
    fn missing_extra_ram_page_defaults_to_zero() {
        let snapshot = parse(&minimal_file()).unwrap();
        assert_eq!(snapshot.extra_ram, [0u8; EXTRA_RAM_LEN]);
    }

    #[test]
    fn ram_and_dsp_register_regions_round_trip() {
        let mut bytes = minimal_file();
        bytes[RAM_OFFSET] = 0x77;
        bytes[DSP_REGISTERS_OFFSET] = 0x55;
        let snapshot = parse(&bytes).unwrap();
        assert_eq!(snapshot.ram[0], 0x77);
        assert_eq!(snapshot.dsp_registers[0], 0x55);
    }
}
