//! USB CDC-ACM transport for the scan line protocol.
use embedded_hal_1::digital::OutputPin;
use line_protocol::{Transport, READ_BUFFER_SIZE};
use usb_device::{bus::UsbBus, device::UsbDevice, UsbError};
use usbd_serial::SerialPort;

use crate::design_parameters::{LINE_CODING_BAUD, LINE_CODING_DATA_BITS};
use crate::session::{DeviceEvent, Session};

/// The serial port class with externally provided buffer stores.
pub type Serial<'a, B> = SerialPort<'a, B, &'a mut [u8], &'a mut [u8]>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("USB: {0:?}")]
    Usb(UsbError),
    #[error("status indicator failed")]
    Indicator,
}

impl From<UsbError> for Error {
    fn from(e: UsbError) -> Self {
        Self::Usb(e)
    }
}

/// Check a line coding against the one the host software opens the port with.
///
/// Parity and stop bits are the CDC `bParityType` and `bCharFormat` codes, 0 for none and one.
fn is_host_coding(rate: u32, bits: u8, parity: u8, stop: u8) -> bool {
    rate == LINE_CODING_BAUD
        && bits == LINE_CODING_DATA_BITS
        && parity == 0
        && stop == 0
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Transfer {
    Idle,
    Pending,
    Complete,
}

/// Transfers over a CDC-ACM serial port.
///
/// Requests are only recorded by the [Transport] methods. The data moves in [UsbTransport::process],
/// which has to be called periodically, before each protocol poll.
pub struct UsbTransport<'a, B: UsbBus, LED> {
    device: UsbDevice<'a, B>,
    serial: Serial<'a, B>,
    session: Session<LED>,
    rx: [u8; READ_BUFFER_SIZE],
    rx_len: usize,
    read: Transfer,
    tx: &'a mut [u8],
    tx_len: usize,
    tx_sent: usize,
    write: Transfer,
}

impl<'a, B, LED> UsbTransport<'a, B, LED>
where
    B: UsbBus,
    LED: OutputPin,
{
    /// Construct the transport.
    ///
    /// # Args
    /// * `device` - The USB device exposing `serial`.
    /// * `serial` - The CDC-ACM class.
    /// * `session` - Session tracking with the status LED.
    /// * `tx` - Outgoing data buffer. Holds the largest frame.
    pub fn new(
        device: UsbDevice<'a, B>,
        serial: Serial<'a, B>,
        session: Session<LED>,
        tx: &'a mut [u8],
    ) -> Self {
        Self {
            device,
            serial,
            session,
            rx: [0; READ_BUFFER_SIZE],
            rx_len: 0,
            read: Transfer::Idle,
            tx,
            tx_len: 0,
            tx_sent: 0,
            write: Transfer::Idle,
        }
    }

    /// Service the USB device and move pending transfer data.
    pub fn process(&mut self) -> Result<(), Error> {
        self.device.poll(&mut [&mut self.serial]);

        let event = self
            .session
            .update(self.device.state())
            .map_err(|_| Error::Indicator)?;
        if event == Some(DeviceEvent::Configured) {
            self.log_line_coding();
        }

        if !self.session.is_configured() {
            // Transfers do not outlive the configuration.
            self.read = Transfer::Idle;
            self.write = Transfer::Idle;
            return Ok(());
        }

        self.pump_read()?;
        self.pump_write()
    }

    fn log_line_coding(&self) {
        let coding = self.serial.line_coding();
        let (rate, bits) = (coding.data_rate(), coding.data_bits());
        let parity = coding.parity_type() as u8;
        let stop = coding.stop_bits() as u8;
        log::info!(
            "Line coding {rate} baud, {bits} bits, parity {parity}, stop {stop}"
        );
        if !is_host_coding(rate, bits, parity, stop) {
            log::debug!(
                "Host line coding differs from {LINE_CODING_BAUD} baud 8N1, ignored"
            );
        }
    }

    fn pump_read(&mut self) -> Result<(), Error> {
        if self.read != Transfer::Pending {
            return Ok(());
        }

        match self.serial.read(&mut self.rx) {
            Ok(0) | Err(UsbError::WouldBlock) => Ok(()),
            Ok(len) => {
                self.rx_len = len;
                self.read = Transfer::Complete;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn pump_write(&mut self) -> Result<(), Error> {
        if self.write != Transfer::Pending {
            return Ok(());
        }

        while self.tx_sent < self.tx_len {
            match self.serial.write(&self.tx[self.tx_sent..self.tx_len]) {
                Ok(0) | Err(UsbError::WouldBlock) => return Ok(()),
                Ok(len) => self.tx_sent += len,
                Err(e) => return Err(e.into()),
            }
        }

        match self.serial.flush() {
            Ok(()) => {
                self.write = Transfer::Complete;
                Ok(())
            }
            Err(UsbError::WouldBlock) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl<B, LED> Transport for UsbTransport<'_, B, LED>
where
    B: UsbBus,
    LED: OutputPin,
{
    type Error = Error;

    fn open(&mut self) -> Result<(), Error> {
        // The device is enumerated from construction on.
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.session.is_configured()
    }

    fn start_read(&mut self) -> Result<(), Error> {
        if !self.session.is_configured() || self.read == Transfer::Pending {
            return Err(UsbError::InvalidState.into());
        }
        self.rx_len = 0;
        self.read = Transfer::Pending;
        Ok(())
    }

    fn read_complete(&mut self, request: &mut [u8]) -> Option<usize> {
        if self.read != Transfer::Complete {
            return None;
        }
        self.read = Transfer::Idle;
        let len = self.rx_len.min(request.len());
        request[..len].copy_from_slice(&self.rx[..len]);
        Some(len)
    }

    fn write_buffer(&mut self) -> &mut [u8] {
        &mut self.tx[..]
    }

    fn start_write(&mut self, len: usize) -> Result<(), Error> {
        if len > self.tx.len() {
            return Err(UsbError::BufferOverflow.into());
        }
        if !self.session.is_configured() || self.write == Transfer::Pending {
            return Err(UsbError::InvalidState.into());
        }
        self.tx_len = len;
        self.tx_sent = 0;
        self.write = Transfer::Pending;
        Ok(())
    }

    fn write_complete(&mut self) -> bool {
        if self.write != Transfer::Complete {
            return false;
        }
        self.write = Transfer::Idle;
        true
    }
}
