/// The CPU-side view of the 64 KiB address space. All addresses are RAM apart
/// from the `$00F0`-`$00FF` memory-mapped register page, which the
/// implementation on the other side of this trait is expected to route to
/// timers, I/O ports, and the DSP address/data ports.
pub trait BusInterface {
    fn read(&mut self, address: u16) -> u8;

    fn write(&mut self, address: u16, value: u8);

    /// Called on every cycle that does not perform a bus transaction, so a
    /// bus implementation that needs to stay in lockstep with the CPU clock
    /// (the DSP, the timers) has a hook on every single master cycle.
    fn idle(&mut self);
}
