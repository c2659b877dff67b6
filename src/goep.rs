//! The GOEP transport seam.
//!
//! The profile state machines do not own a radio; they drive a GOEP
//! connection through [`GoepSession`] and are driven by the transport
//! through their `handle_*` entry points (incoming data, can-send-now,
//! connection lifecycle). This keeps the dependency one-way: the profile
//! holds the session object, the transport only needs to know which profile
//! entry point to call.

/// Bluetooth device address.
pub type BdAddr = [u8; 6];

/// Downward interface to one GOEP connection.
///
/// `request_can_send_now` is the only asynchronous call: the transport
/// answers it by invoking the profile's `handle_can_send_now` once a packet
/// may be composed and sent. All other calls take effect immediately.
pub trait GoepSession {
    /// Client side: resolves the peer's service via SDP and opens the
    /// RFCOMM/L2CAP channel. The transport answers with the profile's
    /// `handle_connection_opened`.
    fn create_connection(&mut self, address: BdAddr, service_class_uuid: u16);

    /// Server side: accepts the incoming connection reported by the
    /// transport.
    fn accept_connection(&mut self);

    /// Asks for a send slot. The transport later calls the profile's
    /// `handle_can_send_now`.
    fn request_can_send_now(&mut self);

    /// Maximum OBEX packet length the connection can carry.
    fn max_packet_size(&self) -> u16;

    /// Whether the connection runs GOEP 2.0 or higher (L2CAP transport),
    /// which is required for Single Response Mode.
    fn supports_single_response_mode(&self) -> bool;

    /// Hands one composed OBEX packet to the transport.
    fn send(&mut self, packet: &[u8]);

    /// Tears down the underlying RFCOMM/L2CAP channel.
    fn close(&mut self);
}

/// Handle identifying a profile session towards the application.
///
/// Handles are indices into a fixed slot table; today every profile owns a
/// single slot, so exactly one handle is live per profile at a time. Stale
/// handles are rejected by the profile commands.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SessionHandle(pub u16);

/// Result of a GOEP connection attempt, reported with `ConnectionOpened`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionStatus {
    Success,
    /// Transport-level failure code.
    Failed(u8),
}

impl ConnectionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}
