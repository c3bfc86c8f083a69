//! Request/response state machine
//!
//! ```text
//! Init -> WaitForConfiguration -> ScheduleRead -> WaitForReadComplete -> ScheduleWrite
//!                  ^                    ^                                      |
//!                  |                    +---------- WaitForWriteComplete <-----+
//!                  +-- (transport not configured, from any transfer state)
//! ```
//!
//! A rejected read or write request moves the machine into [State::Error], which is only left
//! through [Protocol::reset].
use super::{
    command::Command,
    framer::{Setup, SETUP_DATA_SIZE},
    transport::Transport,
    READ_BUFFER_SIZE,
};

/// Protocol states.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// Opening the transport.
    Init,
    /// Waiting for the host to configure the session.
    WaitForConfiguration,
    /// Issuing a read for the next request.
    ScheduleRead,
    /// Waiting for a request to arrive.
    WaitForReadComplete,
    /// Decoding the request and issuing the response, if any.
    ScheduleWrite,
    /// Waiting for the response to be sent.
    WaitForWriteComplete,
    /// A transfer request was rejected.
    Error,
}

/// Transfer errors that end in [State::Error].
#[derive(Debug, thiserror::Error)]
pub enum Error<E: core::fmt::Debug> {
    #[error("read request rejected: {0:?}")]
    Read(E),
    #[error("write request rejected: {0:?}")]
    Write(E),
}

/// The device side of the GET/SET protocol.
pub struct Protocol<T: Transport> {
    transport: T,
    state: State,
    request: [u8; READ_BUFFER_SIZE],
    read_done: bool,
    frame_request: bool,
    frame_len: usize,
    data_ready: bool,
    setup_data: [u8; SETUP_DATA_SIZE],
    setup_pending: bool,
    setup_request: bool,
    fault: Option<Error<T::Error>>,
}

impl<T: Transport> Protocol<T> {
    /// Construct the protocol in [State::Init].
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: State::Init,
            request: [0; READ_BUFFER_SIZE],
            read_done: true,
            frame_request: false,
            frame_len: 0,
            data_ready: false,
            setup_data: [0; SETUP_DATA_SIZE],
            setup_pending: false,
            setup_request: false,
            fault: None,
        }
    }

    /// The current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The transfer error that put the protocol into [State::Error].
    pub fn fault(&self) -> Option<&Error<T::Error>> {
        self.fault.as_ref()
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the transport, e.g. to service it between polls.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Restart the protocol from [State::Init], e.g. to recover from [State::Error].
    pub fn reset(&mut self) {
        self.abort_transfers();
        self.fault = None;
        self.state = State::Init;
    }

    /// Check whether a `GET` is waiting for [Protocol::provide_frame].
    pub fn frame_requested(&self) -> bool {
        self.state == State::ScheduleWrite
            && self.frame_request
            && !self.data_ready
    }

    /// Fill the transport write buffer with a frame and mark it ready to be sent.
    ///
    /// # Args
    /// * `fill` - Writes the frame into the provided buffer and returns its length.
    pub fn provide_frame(&mut self, fill: impl FnOnce(&mut [u8]) -> usize) {
        self.frame_len = fill(self.transport.write_buffer());
        self.data_ready = true;
    }

    /// Take the setup of the last acknowledged `SET`.
    ///
    /// A setup becomes available once its echo has been sent.
    pub fn take_setup(&mut self) -> Option<Setup> {
        if !self.setup_request {
            return None;
        }

        self.setup_request = false;
        // The write buffer held the echo, not a frame.
        self.data_ready = false;
        Some(Setup::decode(&self.setup_data))
    }

    /// Advance the state machine by one step.
    pub fn poll(&mut self) -> State {
        let next = match self.state {
            State::Init => match self.transport.open() {
                Ok(()) => State::WaitForConfiguration,
                Err(e) => {
                    log::trace!("Transport not open: {e:?}");
                    State::Init
                }
            },
            State::WaitForConfiguration => {
                if self.transport.is_configured() {
                    State::ScheduleRead
                } else {
                    State::WaitForConfiguration
                }
            }
            State::Error => State::Error,
            _ if !self.transport.is_configured() => {
                self.abort_transfers();
                State::WaitForConfiguration
            }
            State::ScheduleRead => self.schedule_read(),
            State::WaitForReadComplete => {
                match self.transport.read_complete(&mut self.request) {
                    Some(len) => {
                        log::trace!("Request of {len} bytes");
                        self.read_done = true;
                        State::ScheduleWrite
                    }
                    None => State::WaitForReadComplete,
                }
            }
            State::ScheduleWrite => self.schedule_write(),
            State::WaitForWriteComplete => {
                if self.transport.write_complete() {
                    self.frame_request = false;
                    if self.setup_pending {
                        self.setup_pending = false;
                        self.setup_request = true;
                    }
                    State::ScheduleRead
                } else {
                    State::WaitForWriteComplete
                }
            }
        };

        if next != self.state {
            log::debug!("Protocol {:?} -> {:?}", self.state, next);
        }
        self.state = next;
        next
    }

    fn abort_transfers(&mut self) {
        self.read_done = true;
        self.frame_request = false;
        self.data_ready = false;
        self.setup_pending = false;
    }

    fn schedule_read(&mut self) -> State {
        if !self.read_done {
            return State::WaitForReadComplete;
        }

        self.read_done = false;
        match self.transport.start_read() {
            Ok(()) => State::WaitForReadComplete,
            Err(e) => self.fail(Error::Read(e)),
        }
    }

    fn schedule_write(&mut self) -> State {
        let len = match Command::parse(&self.request) {
            Some(Command::Get) => {
                self.frame_request = true;
                if !self.data_ready {
                    return State::ScheduleWrite;
                }
                self.data_ready = false;
                self.frame_len
            }
            Some(Command::Set(payload)) => {
                self.setup_data = payload;
                self.setup_pending = true;
                self.transport.write_buffer()[..SETUP_DATA_SIZE]
                    .copy_from_slice(&payload);
                SETUP_DATA_SIZE
            }
            // Unrecognized requests are dropped without a response.
            None => return State::ScheduleRead,
        };

        // Consume the request so it is not served twice.
        self.request[0] = 0;

        match self.transport.start_write(len) {
            Ok(()) => State::WaitForWriteComplete,
            Err(e) => self.fail(Error::Write(e)),
        }
    }

    fn fail(&mut self, error: Error<T::Error>) -> State {
        log::error!("{error}");
        self.fault = Some(error);
        State::Error
    }
}
