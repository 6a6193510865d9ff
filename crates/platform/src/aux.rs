//! AUX channel abstraction
//!
//! The DisplayPort AUX channel carries two kinds of transaction:
//!
//! - **native** transactions addressing the sink's DPCD register space
//!   (20-bit addresses), and
//! - **I2C-over-AUX** transactions, which tunnel an I2C bus to the sink.
//!   EDID lives behind this bus at [`EDID_I2C_ADDR`](crate::dpcd::EDID_I2C_ADDR).
//!
//! [`AuxChannel`] therefore *is* an [`embedded_hal::i2c::I2c`] bus, extended
//! with the native DPCD calls. Every call may fail; nothing retries
//! internally. Retry policy belongs to the protocol layer.

use embedded_hal::i2c::I2c;

/// Sideband channel to the sink: DPCD registers plus I2C-over-AUX.
///
/// Implementations must not be shared by two training sessions at once;
/// the device context serialises all access.
pub trait AuxChannel: I2c {
    /// Read `buf.len()` consecutive DPCD registers starting at `addr`.
    fn read_dpcd(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Write `data` to consecutive DPCD registers starting at `addr`.
    fn write_dpcd(&mut self, addr: u32, data: &[u8]) -> Result<(), Self::Error>;

    /// Read a single DPCD register.
    fn read_dpcd_byte(&mut self, addr: u32) -> Result<u8, Self::Error> {
        let mut byte = [0u8; 1];
        self.read_dpcd(addr, &mut byte)?;
        let [value] = byte;
        Ok(value)
    }

    /// Write a single DPCD register.
    fn write_dpcd_byte(&mut self, addr: u32, value: u8) -> Result<(), Self::Error> {
        self.write_dpcd(addr, &[value])
    }
}
