//! Serial transfer (Link Cable) register and timing logic.
//!
//! The engine does not own a link partner; instead it exposes the
//! `present`/`push` byte events described by the host interface and lets
//! the host answer a push within the open timing window via
//! [`Serial::deliver_pushed_byte`].

use std::io::Cursor;

use lr35902_common::{
    data::{read_u16, read_u8, write_u16, write_u8},
    error::Error,
};

use crate::{
    consts::{SB_ADDR, SC_ADDR},
    mmu::BusComponent,
    state::StateComponent,
    warnln,
};

/// Number of CPU oscillator cycles a push transfer takes to complete
/// (8 bits clocked at the documented 8192 Hz internal clock).
const PUSH_CYCLES: i32 = 4096;

pub struct Serial {
    /// SB (0xFF01) — the data register, both the byte shifted out and
    /// the byte most recently shifted in.
    data: u8,
    shift_clock: bool,
    clock_speed: bool,
    transfer_enabled: bool,
    /// True while a push transfer's 4096-cycle window is open.
    transferring: bool,
    timer: i32,
    int_serial: bool,
    /// Byte handed to [`Serial::deliver_pushed_byte`] by the host, consumed
    /// when the push window closes; `None` yields 0xFF (serial timeout).
    pushed_response: Option<u8>,
    present_callback: fn(byte: u8),
    push_callback: fn(byte: u8),
}

impl Serial {
    pub fn new() -> Self {
        Self {
            data: 0x0,
            shift_clock: false,
            clock_speed: false,
            transfer_enabled: false,
            transferring: false,
            timer: 0,
            int_serial: false,
            pushed_response: None,
            present_callback: |_| {},
            push_callback: |_| {},
        }
    }

    pub fn reset(&mut self) {
        self.data = 0x0;
        self.shift_clock = false;
        self.clock_speed = false;
        self.transfer_enabled = false;
        self.transferring = false;
        self.timer = 0;
        self.int_serial = false;
        self.pushed_response = None;
    }

    pub fn clock(&mut self, cycles: u16) {
        if !self.transferring {
            return;
        }

        self.timer -= cycles as i32;
        if self.timer <= 0 {
            self.data = self.pushed_response.take().unwrap_or(0xff);
            self.transfer_enabled = false;
            self.transferring = false;
            self.int_serial = true;
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            // 0xFF01 — SB: Serial transfer data
            SB_ADDR => self.data,
            // 0xFF02 — SC: Serial transfer control
            SC_ADDR => {
                (if self.shift_clock { 0x01 } else { 0x00 }
                    | if self.clock_speed { 0x02 } else { 0x00 }
                    | if self.transfer_enabled { 0x80 } else { 0x00 })
                    | 0x7c
            }
            _ => {
                warnln!("Reading from unknown Serial location 0x{:04x}", addr);
                0xff
            }
        }
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            // 0xFF01 — SB: Serial transfer data
            SB_ADDR => self.data = value,
            // 0xFF02 — SC: Serial transfer control
            SC_ADDR => {
                self.shift_clock = value & 0x01 == 0x01;
                self.clock_speed = value & 0x02 == 0x02;
                self.transfer_enabled = value & 0x80 == 0x80;

                if !self.transfer_enabled {
                    self.transferring = false;
                    return;
                }

                if self.shift_clock {
                    // push mode: the engine clocks the byte out itself and
                    // expects a response from the host within the window
                    self.pushed_response = None;
                    self.timer = PUSH_CYCLES;
                    self.transferring = true;
                    (self.push_callback)(self.data);
                } else {
                    // present mode: simply expose the byte, no clocking
                    self.transferring = false;
                    (self.present_callback)(self.data);
                }
            }
            _ => warnln!("Writing to unknown Serial location 0x{:04x}", addr),
        }
    }

    #[inline(always)]
    pub fn int_serial(&self) -> bool {
        self.int_serial
    }

    #[inline(always)]
    pub fn set_int_serial(&mut self, value: bool) {
        self.int_serial = value;
    }

    #[inline(always)]
    pub fn ack_serial(&mut self) {
        self.set_int_serial(false);
    }

    /// Supplies the byte a host-side link partner answered a push with.
    /// Has no effect once the 4096-cycle window has already closed.
    pub fn deliver_pushed_byte(&mut self, byte: u8) {
        if self.transferring {
            self.pushed_response = Some(byte);
        }
    }

    pub fn set_present_callback(&mut self, callback: fn(byte: u8)) {
        self.present_callback = callback;
    }

    pub fn set_push_callback(&mut self, callback: fn(byte: u8)) {
        self.push_callback = callback;
    }
}

impl BusComponent for Serial {
    fn read(&self, addr: u16) -> u8 {
        self.read(addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.write(addr, value);
    }
}

impl Default for Serial {
    fn default() -> Self {
        Self::new()
    }
}

impl StateComponent for Serial {
    fn state(&self) -> Result<Vec<u8>, Error> {
        let mut data = vec![];
        let mut cursor = Cursor::new(&mut data);
        write_u8(&mut cursor, self.data)?;
        write_u8(&mut cursor, self.shift_clock as u8)?;
        write_u8(&mut cursor, self.clock_speed as u8)?;
        write_u8(&mut cursor, self.transfer_enabled as u8)?;
        write_u8(&mut cursor, self.transferring as u8)?;
        write_u16(&mut cursor, self.timer as u16)?;
        write_u8(&mut cursor, self.int_serial as u8)?;
        Ok(data)
    }

    fn set_state(&mut self, data: &[u8]) -> Result<(), Error> {
        let mut cursor = Cursor::new(data);
        self.data = read_u8(&mut cursor)?;
        self.shift_clock = read_u8(&mut cursor)? != 0;
        self.clock_speed = read_u8(&mut cursor)? != 0;
        self.transfer_enabled = read_u8(&mut cursor)? != 0;
        self.transferring = read_u8(&mut cursor)? != 0;
        self.timer = read_u16(&mut cursor)? as i32;
        self.int_serial = read_u8(&mut cursor)? != 0;
        Ok(())
    }
}

unsafe impl Send for Serial {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_timeout_yields_0xff() {
        let mut serial = Serial::new();
        serial.write(SB_ADDR, 0x42);
        serial.write(SC_ADDR, 0x81);
        assert!(serial.transferring);

        serial.clock(PUSH_CYCLES as u16);

        assert!(!serial.transferring);
        assert_eq!(serial.read(SB_ADDR), 0xff);
        assert!(serial.int_serial());
    }

    #[test]
    fn test_push_with_delivered_response() {
        let mut serial = Serial::new();
        serial.write(SB_ADDR, 0x42);
        serial.write(SC_ADDR, 0x81);
        serial.deliver_pushed_byte(0x24);

        serial.clock(PUSH_CYCLES as u16);

        assert_eq!(serial.read(SB_ADDR), 0x24);
        assert!(serial.int_serial());
    }

    #[test]
    fn test_present_mode_does_not_clock() {
        let mut serial = Serial::new();
        serial.write(SB_ADDR, 0x77);
        serial.write(SC_ADDR, 0x80);
        assert!(!serial.transferring);
        serial.clock(10_000);
        assert!(!serial.int_serial());
    }
}
