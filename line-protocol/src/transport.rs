/// A byte-stream transport with asynchronous transfers.
///
/// Transfers are requested with [Transport::start_read] and [Transport::start_write] and finish
/// some time later, which is observed by polling [Transport::read_complete] and
/// [Transport::write_complete]. The transport owns the outgoing data buffer so that it remains
/// valid while a write is in flight.
pub trait Transport {
    /// Error raised when a session cannot be opened or a transfer request is rejected.
    type Error: core::fmt::Debug;

    /// Open the transport session. Retried on every poll until it succeeds.
    fn open(&mut self) -> Result<(), Self::Error>;

    /// Check whether the host has configured the session.
    fn is_configured(&self) -> bool;

    /// Request an asynchronous read of the next host request.
    fn start_read(&mut self) -> Result<(), Self::Error>;

    /// Poll for completion of the pending read.
    ///
    /// On completion, the received bytes are copied to the start of `request` and their number is
    /// returned. Bytes beyond that are left untouched.
    fn read_complete(&mut self, request: &mut [u8]) -> Option<usize>;

    /// The buffer holding outgoing data for the next write.
    fn write_buffer(&mut self) -> &mut [u8];

    /// Request an asynchronous write of the first `len` bytes of the write buffer.
    fn start_write(&mut self, len: usize) -> Result<(), Self::Error>;

    /// Poll for completion of the pending write.
    fn write_complete(&mut self) -> bool;
}
