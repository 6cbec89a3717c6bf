//! BLE capability consumed by the provisioner
//!
//! Implementations adapt a platform BLE stack to the small GATT surface the
//! transport coordinator needs.

use futures::stream::BoxStream;
use uuid::Uuid;

/// Identifier of a connected BLE peripheral
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trait for GATT client operations on an established connection
///
/// Notifications and disconnections are delivered as streams so the
/// provisioner can race them against writes and the acknowledgement wait.
#[allow(async_fn_in_trait)]
pub trait BleLink {
    /// Error type for BLE operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Write a value to a characteristic, resolving once the write completes
    async fn write(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), Self::Error>;

    /// Read the current value of a characteristic
    async fn read(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Vec<u8>, Self::Error>;

    /// Start notification delivery, returning the stream of payloads
    async fn subscribe(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<BoxStream<'static, Vec<u8>>, Self::Error>;

    /// Stop notification delivery started by [`BleLink::subscribe`]
    async fn unsubscribe(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), Self::Error>;

    /// Stream of ids of peripherals that dropped their connection
    async fn disconnections(&self) -> Result<BoxStream<'static, DeviceId>, Self::Error>;
}
