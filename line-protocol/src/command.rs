//! Host request decoding
use super::framer::SETUP_DATA_SIZE;

/// Request verb for reading out a frame.
pub const GET: &[u8; 3] = b"GET";

/// Request verb for updating the acquisition setup.
pub const SET: &[u8; 3] = b"SET";

/// A recognized host request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Read out the latest scan line.
    Get,
    /// Apply and echo the contained setup payload.
    Set([u8; SETUP_DATA_SIZE]),
}

impl Command {
    /// Decode the request buffer.
    ///
    /// Only the leading three bytes select the verb. For `SET` the payload is taken from the four
    /// bytes that follow, whatever they hold. Returns `None` for anything else, including a `SET`
    /// in a buffer too short to carry a payload.
    pub fn parse(request: &[u8]) -> Option<Self> {
        match request.get(..GET.len())? {
            verb if verb == GET => Some(Command::Get),
            verb if verb == SET => {
                let payload =
                    request.get(SET.len()..SET.len() + SETUP_DATA_SIZE)?;
                Some(Command::Set(payload.try_into().ok()?))
            }
            _ => None,
        }
    }
}
