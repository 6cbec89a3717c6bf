//! BLE GATT service constants for Floret device provisioning
//!
//! The UUIDs and framing bytes defined here must match the values compiled
//! into the device firmware.

use uuid::Uuid;

/// Provisioning service UUID: 19b10000-e8f2-537e-4f6c-d104768a1214
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x19b10000_e8f2_537e_4f6c_d104768a1214);

/// WiFi credentials characteristic UUID (write/read/notify)
pub const WIFI_CREDENTIALS_UUID: Uuid = Uuid::from_u128(0x19b10001_e8f2_537e_4f6c_d104768a1214);

/// First byte of the first packet in a credential transfer
pub const START_BYTE: u8 = 0x02;

/// Last byte of the last packet in a credential transfer
pub const END_BYTE: u8 = 0x03;

/// Default packet size, chosen to fit BLE ATT writes without MTU negotiation
pub const DEFAULT_MAX_PACKET_SIZE: usize = 20;

/// Acknowledgement values the device reports after a credential transfer
pub mod ack {
    /// Notification payload confirming the device joined the network
    pub const OK: &[u8] = b"OK";

    /// Status byte (first byte of a characteristic read) meaning connected
    pub const STATUS_CONNECTED: u8 = 1;
}
