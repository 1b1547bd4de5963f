// src/transport/rs485.rs

use super::Transport;
use crate::common::{
    error::BusError,
    frame::{Frame, FRAME_SIZE, STX1},
    hal_traits::{Clock, SerialPort},
    timing,
};
use alloc::vec::Vec;
use arrayvec::ArrayVec;
use core::time::Duration;
use embedded_hal::digital::OutputPin;
use log::{debug, trace, warn};
use nb::Result as NbResult;

/// Receive side of the link.
#[derive(Debug)]
enum RxState {
    /// Collecting header bytes until a valid frame header lines up.
    HeaderSync { window: ArrayVec<u8, FRAME_SIZE> },
    /// Header accepted, collecting `frame.data_length` payload bytes.
    Payload {
        frame: Frame,
        buffer: Vec<u8>,
        last_byte_at: Duration,
    },
}

impl RxState {
    fn header_sync() -> Self {
        RxState::HeaderSync { window: ArrayVec::new() }
    }
}

/// Half-duplex RS-485 transport.
///
/// Each packet is an 8-byte [`Frame`] header followed by the payload. The
/// driver-enable pin is high only while writing. Received packets are kept in
/// a single-slot inbox; while it is occupied no further bytes are read from
/// the serial port.
#[derive(Debug)]
pub struct Rs485<S, P, C> {
    serial: S,
    de_pin: P,
    clock: C,
    receive_timeout: Duration,
    rx: RxState,
    inbox: Option<Vec<u8>>,
}

impl<S, P, C> Rs485<S, P, C>
where
    S: SerialPort,
    P: OutputPin,
    C: Clock,
{
    pub fn new(serial: S, de_pin: P, clock: C) -> Self {
        Self::with_timeout(serial, de_pin, clock, timing::DEFAULT_RECEIVE_TIMEOUT)
    }

    pub fn with_timeout(serial: S, de_pin: P, clock: C, receive_timeout: Duration) -> Self {
        Rs485 {
            serial,
            de_pin,
            clock,
            receive_timeout,
            rx: RxState::header_sync(),
            inbox: None,
        }
    }

    fn on_byte(&mut self, byte: u8) {
        let now = self.clock.uptime();
        let state = core::mem::replace(&mut self.rx, RxState::header_sync());

        self.rx = match state {
            RxState::Payload { last_byte_at, .. } if now.saturating_sub(last_byte_at) > self.receive_timeout => {
                warn!("RS-485: payload timed out, packet dropped");
                Self::sync_step(ArrayVec::new(), byte, now)
            }
            RxState::Payload {
                frame,
                mut buffer,
                ..
            } => {
                buffer.push(byte);
                if buffer.len() < usize::from(frame.data_length) {
                    RxState::Payload { frame, buffer, last_byte_at: now }
                } else {
                    match frame.verify_payload(&buffer) {
                        Ok(()) => {
                            trace!("RS-485: received {} bytes", buffer.len());
                            self.inbox = Some(buffer);
                        }
                        Err(e) => warn!("RS-485: packet dropped: {}", e),
                    }
                    RxState::header_sync()
                }
            }
            RxState::HeaderSync { window } => Self::sync_step(window, byte, now),
        };
    }

    fn sync_step(mut window: ArrayVec<u8, FRAME_SIZE>, byte: u8, now: Duration) -> RxState {
        window.push(byte);
        if !window.is_full() {
            return RxState::HeaderSync { window };
        }

        let mut raw = [0u8; FRAME_SIZE];
        raw.copy_from_slice(&window);

        if !Frame::has_sync(&raw) {
            // Keep everything from the next STX1 on, it may be the real start.
            window.clear();
            if let Some(pos) = raw[1..].iter().position(|b| *b == STX1) {
                window.extend(raw[pos + 1..].iter().copied());
            }
            return RxState::HeaderSync { window };
        }

        match Frame::parse(&raw) {
            Ok(frame) if frame.data_length == 0 => {
                debug!("RS-485: empty packet ignored");
                RxState::header_sync()
            }
            Ok(frame) => RxState::Payload {
                frame,
                buffer: Vec::with_capacity(usize::from(frame.data_length)),
                last_byte_at: now,
            },
            Err(e) => {
                debug!("RS-485: bad header: {}", e);
                RxState::header_sync()
            }
        }
    }

    fn check_payload_timeout(&mut self) {
        if let RxState::Payload { last_byte_at, .. } = self.rx {
            if self.clock.uptime().saturating_sub(last_byte_at) > self.receive_timeout {
                warn!("RS-485: payload timed out, packet dropped");
                self.rx = RxState::header_sync();
            }
        }
    }

    /// Executes a non-blocking serial operation (`f`) repeatedly until it
    /// stops returning `WouldBlock`, returning the final result or a timeout error.
    fn execute_blocking_io_with_timeout<FN, T>(&mut self, timeout: Duration, mut f: FN) -> Result<T, BusError>
    where
        FN: FnMut(&mut S) -> NbResult<T, S::Error>,
    {
        let deadline = self.clock.uptime() + timeout;

        loop {
            match f(&mut self.serial) {
                Ok(result) => return Ok(result),
                Err(nb::Error::WouldBlock) => {
                    if self.clock.uptime() >= deadline {
                        return Err(BusError::Timeout);
                    }
                }
                Err(nb::Error::Other(e)) => {
                    warn!("RS-485: serial error: {:?}", e);
                    return Err(BusError::Io);
                }
            }
        }
    }

    fn send_bytes(&mut self, header: &[u8], payload: &[u8]) -> Result<(), BusError> {
        for byte in header.iter().chain(payload) {
            self.execute_blocking_io_with_timeout(timing::TRANSMIT_TIMEOUT, |serial| serial.write_byte(*byte))?;
        }
        self.execute_blocking_io_with_timeout(timing::TRANSMIT_TIMEOUT, |serial| serial.flush())
    }
}

impl<S, P, C> Transport for Rs485<S, P, C>
where
    S: SerialPort,
    P: OutputPin,
    C: Clock,
{
    fn begin(&mut self) -> Result<(), BusError> {
        self.rx = RxState::header_sync();
        self.inbox = None;
        self.de_pin.set_low().map_err(|_| BusError::Pin)
    }

    fn update(&mut self) {
        while self.inbox.is_none() {
            match self.serial.read_byte() {
                Ok(byte) => self.on_byte(byte),
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(e)) => {
                    warn!("RS-485: serial read error: {:?}", e);
                    break;
                }
            }
        }
        self.check_payload_timeout();
    }

    fn write(&mut self, payload: &[u8]) -> Result<(), BusError> {
        let header = Frame::for_payload(payload)?.encode();

        self.de_pin.set_high().map_err(|_| BusError::Pin)?;
        let sent = self.send_bytes(&header, payload);
        let released = self.de_pin.set_low().map_err(|_| BusError::Pin);

        sent.and(released)
    }

    fn available(&self) -> bool {
        self.inbox.is_some()
    }

    fn read(&self) -> Option<&[u8]> {
        self.inbox.as_deref()
    }

    fn wipe(&mut self) {
        self.inbox = None;
    }

    fn reading_timeout(&self) -> Duration {
        self.receive_timeout
    }
}
