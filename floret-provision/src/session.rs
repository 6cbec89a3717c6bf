//! Per-attempt provisioning session state

use crate::link::DeviceId;

/// Phase of a provisioning attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No attempt in progress
    Idle,
    /// Notification delivery is being set up (notification strategy only)
    Subscribing,
    /// Packets are being written sequentially
    Transmitting,
    /// All packets written, waiting for the device's answer
    AwaitingAck,
    /// Device acknowledged the credentials
    Connected,
    /// The attempt ended in an error
    Failed,
}

impl SessionState {
    /// Whether the attempt has finished, successfully or not
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Connected | SessionState::Failed)
    }
}

/// State held for one provisioning attempt
///
/// A session exclusively owns the device handle for its lifetime; nothing
/// else may touch the credentials characteristic while the attempt runs.
/// Sessions are ephemeral: create one per attempt and discard it afterwards.
#[derive(Debug)]
pub struct ProvisioningSession {
    device: Option<DeviceId>,
    state: SessionState,
    acknowledged: bool,
    last_error: Option<String>,
}

impl ProvisioningSession {
    /// Start a session for a connected device, in the idle state
    pub fn new(device: DeviceId) -> Self {
        Self {
            device: Some(device),
            state: SessionState::Idle,
            acknowledged: false,
            last_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Device the session holds; `None` once the connection dropped
    pub fn device(&self) -> Option<&DeviceId> {
        self.device.as_ref()
    }

    pub fn acknowledged(&self) -> bool {
        self.acknowledged
    }

    /// Human-readable reason for the last failure, if any
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    pub(crate) fn succeed(&mut self) {
        self.state = SessionState::Connected;
        self.acknowledged = true;
    }

    pub(crate) fn fail(&mut self, reason: String) {
        self.state = SessionState::Failed;
        self.last_error = Some(reason);
    }

    /// Drop the device handle so the caller goes back through reconnection
    pub(crate) fn clear_device(&mut self) {
        self.device = None;
    }
}
