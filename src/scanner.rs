//! Main loop service: runs the protocol and connects it to the acquisition.
use embedded_hal_1::digital::{OutputPin, PinState};
use line_protocol::{framer, Protocol, State, Transport};

use crate::{
    acquisition::SampleBuffer,
    configuration::{AcquisitionConfig, AnalogFrontEnd},
};

pub struct Scanner<'a, T: Transport, A, LED, const N: usize> {
    protocol: Protocol<T>,
    config: AcquisitionConfig<'a, A>,
    buffer: &'a SampleBuffer<N>,
    line: [u16; N],
    data_led: LED,
    data_led_on: bool,
}

impl<'a, T, A, LED, const N: usize> Scanner<'a, T, A, LED, N>
where
    T: Transport,
    A: AnalogFrontEnd,
    LED: OutputPin,
{
    /// Construct the scanner.
    ///
    /// # Args
    /// * `transport` - The host link.
    /// * `config` - Acquisition configuration, updated by `SET`.
    /// * `buffer` - The scan line filled by the sampling interrupt.
    /// * `data_led` - Toggled on every frame sent.
    pub fn new(
        transport: T,
        config: AcquisitionConfig<'a, A>,
        buffer: &'a SampleBuffer<N>,
        data_led: LED,
    ) -> Self {
        Self {
            protocol: Protocol::new(transport),
            config,
            buffer,
            line: [0; N],
            data_led,
            data_led_on: false,
        }
    }

    /// The host protocol state machine.
    pub fn protocol(&self) -> &Protocol<T> {
        &self.protocol
    }

    /// The host link, to be serviced before each [Scanner::service].
    pub fn transport_mut(&mut self) -> &mut T {
        self.protocol.transport_mut()
    }

    /// The active acquisition configuration.
    pub fn config(&self) -> &AcquisitionConfig<'a, A> {
        &self.config
    }

    /// Run one main loop iteration.
    ///
    /// A pending `GET` is answered with the current line. A snapshot that raced a readout restart
    /// is retried on the next iteration. A `SET` is applied once its echo has been sent.
    pub fn service(&mut self) -> Result<State, LED::Error> {
        let state = self.protocol.poll();

        if self.protocol.frame_requested() {
            self.send_frame()?;
        }

        if let Some(setup) = self.protocol.take_setup() {
            self.config.apply(setup);
        }

        Ok(state)
    }

    fn send_frame(&mut self) -> Result<(), LED::Error> {
        let generation = match self.buffer.snapshot(&mut self.line) {
            Ok(generation) => generation,
            Err(e) => {
                log::warn!("{e}");
                return Ok(());
            }
        };

        let line = &self.line;
        let resolution = self.config.resolution();
        self.protocol.provide_frame(|out| {
            framer::encode(line, resolution, out).unwrap_or_else(|e| {
                log::error!("{e}");
                0
            })
        });
        log::debug!(
            "Frame {generation}, levels {}/{}",
            resolution.horizontal,
            resolution.vertical
        );

        self.data_led_on = !self.data_led_on;
        self.data_led.set_state(PinState::from(self.data_led_on))
    }
}
