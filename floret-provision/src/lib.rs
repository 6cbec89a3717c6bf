//! Floret provisioning - delivers WiFi credentials to a device over BLE
//!
//! The [`Provisioner`] frames credentials into sentinel-bounded packets,
//! writes them sequentially to the credentials characteristic of a connected
//! device, and waits for the device's acknowledgement. The BLE stack is
//! injected through the [`BleLink`] trait.
//!
//! # Example
//!
//! ```ignore
//! use floret_proto::Credentials;
//! use floret_provision::{DeviceId, Provisioner, ProvisioningSession};
//!
//! let mut provisioner = Provisioner::new(link);
//! let mut session = ProvisioningSession::new(DeviceId::new("AA:BB:CC:DD:EE:FF"));
//! let credentials = Credentials::new("greenhouse", "hunter2")?;
//!
//! provisioner.provision(&mut session, &credentials).await?;
//! assert!(session.acknowledged());
//! ```

mod coordinator;
mod link;
mod session;

pub use coordinator::{AckStrategy, ProvisionConfig, ProvisionError, Provisioner};
pub use link::{BleLink, DeviceId};
pub use session::{ProvisioningSession, SessionState};
