//! Host serial link.

/// A non-blocking byte link.
pub trait SerialPort {
    /// Read whatever bytes are available into `buf`. Returns the count, possibly zero.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Queue bytes for transmission.
    fn write(&mut self, data: &[u8]);
}
