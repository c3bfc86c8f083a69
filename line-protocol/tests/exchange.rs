use std::collections::VecDeque;

use line_protocol::{framer, Protocol, Resolution, Setup, State, Transport};

/// A scripted transport. Reads complete immediately when a request is queued, writes complete
/// once `release_writes` is set.
#[derive(Default)]
struct Loopback {
    opened: bool,
    fail_open: usize,
    configured: bool,
    reading: bool,
    writing: bool,
    release_writes: bool,
    reject_reads: bool,
    requests: VecDeque<Vec<u8>>,
    buffer: Vec<u8>,
    sent: Vec<Vec<u8>>,
    reads_started: usize,
}

#[derive(Debug, PartialEq)]
struct Rejected;

impl Loopback {
    fn new() -> Self {
        Self {
            configured: true,
            release_writes: true,
            buffer: vec![0; 8192],
            ..Default::default()
        }
    }
}

impl Transport for Loopback {
    type Error = Rejected;

    fn open(&mut self) -> Result<(), Rejected> {
        if self.fail_open > 0 {
            self.fail_open -= 1;
            return Err(Rejected);
        }
        self.opened = true;
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn start_read(&mut self) -> Result<(), Rejected> {
        if self.reject_reads {
            return Err(Rejected);
        }
        assert!(!self.reading, "read issued twice");
        self.reading = true;
        self.reads_started += 1;
        Ok(())
    }

    fn read_complete(&mut self, request: &mut [u8]) -> Option<usize> {
        if !self.reading {
            return None;
        }
        let data = self.requests.pop_front()?;
        self.reading = false;
        request[..data.len()].copy_from_slice(&data);
        Some(data.len())
    }

    fn write_buffer(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    fn start_write(&mut self, len: usize) -> Result<(), Rejected> {
        assert!(!self.writing, "write issued twice");
        self.writing = true;
        self.sent.push(self.buffer[..len].to_vec());
        Ok(())
    }

    fn write_complete(&mut self) -> bool {
        if self.writing && self.release_writes {
            self.writing = false;
            return true;
        }
        false
    }
}

fn connected(requests: &[&str]) -> Protocol<Loopback> {
    let mut transport = Loopback::new();
    transport
        .requests
        .extend(requests.iter().map(|r| r.as_bytes().to_vec()));
    let mut protocol = Protocol::new(transport);
    assert_eq!(protocol.poll(), State::WaitForConfiguration);
    assert_eq!(protocol.poll(), State::ScheduleRead);
    protocol
}

#[test]
fn open_is_retried() {
    let mut transport = Loopback::new();
    transport.fail_open = 3;
    let mut protocol = Protocol::new(transport);
    for _ in 0..3 {
        assert_eq!(protocol.poll(), State::Init);
    }
    assert_eq!(protocol.poll(), State::WaitForConfiguration);
    assert!(protocol.transport().opened);
}

#[test]
fn waits_for_configuration() {
    let mut transport = Loopback::new();
    transport.configured = false;
    let mut protocol = Protocol::new(transport);
    for _ in 0..5 {
        assert!(matches!(
            protocol.poll(),
            State::Init | State::WaitForConfiguration
        ));
    }
    protocol.transport_mut().configured = true;
    assert_eq!(protocol.poll(), State::ScheduleRead);
}

#[test]
fn get_waits_for_frame() {
    let mut protocol = connected(&["GET"]);
    assert_eq!(protocol.poll(), State::WaitForReadComplete);
    assert_eq!(protocol.poll(), State::ScheduleWrite);

    for _ in 0..10 {
        assert_eq!(protocol.poll(), State::ScheduleWrite);
        assert!(protocol.frame_requested());
    }
    assert!(protocol.transport().sent.is_empty());

    let samples = [0x0fc0u16; 16];
    let resolution = Resolution {
        horizontal: 1,
        vertical: 3,
    };
    protocol.provide_frame(|buf| {
        framer::encode(&samples, resolution, buf).unwrap()
    });
    assert!(!protocol.frame_requested());

    assert_eq!(protocol.poll(), State::WaitForWriteComplete);
    assert_eq!(protocol.poll(), State::ScheduleRead);
    assert_eq!(protocol.transport().sent.len(), 1);
    assert_eq!(protocol.transport().sent[0], [0x0f, 0xc0].repeat(8));

    // The request was consumed: the next poll issues a fresh read and no second frame is sent.
    assert_eq!(protocol.poll(), State::WaitForReadComplete);
    for _ in 0..5 {
        assert_eq!(protocol.poll(), State::WaitForReadComplete);
    }
    assert!(!protocol.frame_requested());
    assert_eq!(protocol.transport().sent.len(), 1);
}

#[test]
fn frame_is_not_requested_while_writing() {
    let mut protocol = connected(&["GET"]);
    protocol.transport_mut().release_writes = false;
    protocol.poll();
    protocol.poll();
    protocol.provide_frame(|_| 0);
    assert_eq!(protocol.poll(), State::WaitForWriteComplete);
    for _ in 0..5 {
        assert!(!protocol.frame_requested());
        assert_eq!(protocol.poll(), State::WaitForWriteComplete);
    }
    protocol.transport_mut().release_writes = true;
    assert_eq!(protocol.poll(), State::ScheduleRead);
}

#[test]
fn set_is_echoed_then_applied() {
    let mut protocol = connected(&["SET\x01\x00\x02\x01"]);
    protocol.transport_mut().release_writes = false;
    assert_eq!(protocol.poll(), State::WaitForReadComplete);
    assert_eq!(protocol.poll(), State::ScheduleWrite);
    assert_eq!(protocol.poll(), State::WaitForWriteComplete);
    assert_eq!(protocol.transport().sent, [vec![0x01, 0x00, 0x02, 0x01]]);
    assert!(!protocol.frame_requested());

    // Not applied before the echo is out.
    assert_eq!(protocol.take_setup(), None);

    protocol.transport_mut().release_writes = true;
    assert_eq!(protocol.poll(), State::ScheduleRead);
    assert_eq!(
        protocol.take_setup(),
        Some(Setup {
            integration_time: 256,
            resolution: Resolution {
                horizontal: 2,
                vertical: 1
            }
        })
    );
    assert_eq!(protocol.take_setup(), None);
}

#[test]
fn set_echo_is_verbatim() {
    let mut protocol = connected(&["SETxxxx"]);
    for _ in 0..4 {
        protocol.poll();
    }
    assert_eq!(protocol.state(), State::ScheduleRead);
    assert_eq!(protocol.transport().sent, [b"xxxx".to_vec()]);
}

#[test]
fn unknown_request_is_dropped() {
    let mut protocol = connected(&["FOO", "GET"]);
    assert_eq!(protocol.poll(), State::WaitForReadComplete);
    assert_eq!(protocol.poll(), State::ScheduleWrite);
    assert_eq!(protocol.poll(), State::ScheduleRead);
    assert!(protocol.transport().sent.is_empty());
    assert!(!protocol.frame_requested());

    // The next request is still served.
    assert_eq!(protocol.poll(), State::WaitForReadComplete);
    assert_eq!(protocol.poll(), State::ScheduleWrite);
    assert_eq!(protocol.poll(), State::ScheduleWrite);
    assert!(protocol.frame_requested());
    assert_eq!(protocol.transport().reads_started, 2);
}

#[test]
fn unconfigure_resets() {
    let mut protocol = connected(&["GET"]);
    protocol.poll();
    protocol.poll();
    assert_eq!(protocol.poll(), State::ScheduleWrite);
    assert!(protocol.frame_requested());

    protocol.transport_mut().configured = false;
    protocol.transport_mut().reading = false;
    assert_eq!(protocol.poll(), State::WaitForConfiguration);
    assert!(!protocol.frame_requested());

    protocol.transport_mut().configured = true;
    protocol.transport_mut().requests.push_back(b"FOO".to_vec());
    assert_eq!(protocol.poll(), State::ScheduleRead);
    assert_eq!(protocol.poll(), State::WaitForReadComplete);
    assert_eq!(protocol.transport().reads_started, 2);
}

#[test]
fn rejected_read_is_fatal() {
    let mut protocol = connected(&[]);
    protocol.transport_mut().reject_reads = true;
    assert_eq!(protocol.poll(), State::Error);
    assert!(matches!(
        protocol.fault(),
        Some(line_protocol::Error::Read(Rejected))
    ));

    protocol.transport_mut().reject_reads = false;
    for _ in 0..5 {
        assert_eq!(protocol.poll(), State::Error);
    }

    protocol.reset();
    assert_eq!(protocol.state(), State::Init);
    assert!(protocol.fault().is_none());
    assert_eq!(protocol.poll(), State::WaitForConfiguration);
    assert_eq!(protocol.poll(), State::ScheduleRead);
    assert_eq!(protocol.poll(), State::WaitForReadComplete);
}
