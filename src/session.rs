//! USB session tracking and the status indicator.
use embedded_hal_1::digital::{OutputPin, PinState};
use usb_device::device::UsbDeviceState;

/// Device level transitions of the USB session.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The host reset the bus and dropped the configuration.
    Reset,
    /// The host selected a configuration. Transfers may be issued from now on.
    Configured,
    Suspended,
    Resumed,
}

/// Tracks the device state and drives the status LED: on while configured and not suspended.
///
/// A suspended session stays configured, so transfers in flight survive a suspend/resume cycle.
pub struct Session<LED> {
    led: LED,
    state: UsbDeviceState,
    configured: bool,
}

impl<LED: OutputPin> Session<LED> {
    pub fn new(mut led: LED) -> Result<Self, LED::Error> {
        led.set_low()?;
        Ok(Self {
            led,
            state: UsbDeviceState::Default,
            configured: false,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Track the device state as observed after a device poll.
    ///
    /// # Returns
    /// The event the state change amounts to, if any.
    pub fn update(
        &mut self,
        state: UsbDeviceState,
    ) -> Result<Option<DeviceEvent>, LED::Error> {
        if state == self.state {
            return Ok(None);
        }

        let previous = core::mem::replace(&mut self.state, state);
        let event = match (previous, state) {
            (_, UsbDeviceState::Suspend) => Some(DeviceEvent::Suspended),
            (UsbDeviceState::Suspend, _) => Some(DeviceEvent::Resumed),
            (_, UsbDeviceState::Configured) => Some(DeviceEvent::Configured),
            (UsbDeviceState::Configured, _) => Some(DeviceEvent::Reset),
            _ => None,
        };

        if let Some(event) = event {
            log::info!("USB {event:?}");
            let lit = match event {
                DeviceEvent::Suspended => false,
                _ => {
                    self.configured = state == UsbDeviceState::Configured;
                    self.configured
                }
            };
            self.led.set_state(PinState::from(lit))?;
        }

        Ok(event)
    }
}
