//! Transport coordinator: drives one credential transfer over BLE

use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;
use uuid::Uuid;

use floret_proto::ble;
use floret_proto::{Credentials, FramingError, Packet, frame_packets};

use crate::link::{BleLink, DeviceId};
use crate::session::{ProvisioningSession, SessionState};

/// How the device's acknowledgement is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckStrategy {
    /// Read the characteristic once after the transfer; a first byte of `1`
    /// means the device joined the network
    #[default]
    Poll,
    /// Subscribe before the transfer and wait for an `"OK"` notification
    Notification,
}

/// Configuration for a [`Provisioner`]
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
    pub max_packet_size: usize,
    pub ack: AckStrategy,
    /// Upper bound on the acknowledgement wait. The firmware answers promptly
    /// in practice, so the default is no limit.
    pub ack_timeout: Option<Duration>,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            service_uuid: ble::SERVICE_UUID,
            characteristic_uuid: ble::WIFI_CREDENTIALS_UUID,
            max_packet_size: ble::DEFAULT_MAX_PACKET_SIZE,
            ack: AckStrategy::default(),
            ack_timeout: None,
        }
    }
}

/// Errors surfaced by a provisioning attempt
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Framing(#[from] FramingError),
    #[error("characteristic write failed: {0}")]
    Write(String),
    #[error("subscription setup failed: {0}")]
    Subscribe(String),
    #[error("characteristic read failed: {0}")]
    Read(String),
    /// The device answered, and the answer was not success
    #[error("device rejected the WiFi credentials")]
    Rejected,
    /// The acknowledgement channel yielded nothing usable
    #[error("no acknowledgement received from device")]
    NoAck,
    /// Only reachable when [`ProvisionConfig::ack_timeout`] is set
    #[error("timed out waiting for acknowledgement")]
    Timeout,
    #[error("device disconnected during provisioning")]
    Disconnected,
    #[error("session already used, start a new session for each attempt")]
    SessionNotIdle,
}

/// Drives credential transfers for one device connection.
///
/// Writes are strictly sequential: each packet write is awaited before the
/// next is issued. Mobile BLE stacks reject or reorder overlapping GATT
/// operations, and the device reassembles in framing order.
pub struct Provisioner<L: BleLink> {
    link: L,
    config: ProvisionConfig,
}

impl<L: BleLink> Provisioner<L> {
    pub fn new(link: L) -> Self {
        Self::with_config(link, ProvisionConfig::default())
    }

    pub fn with_config(link: L, config: ProvisionConfig) -> Self {
        Self { link, config }
    }

    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Run one provisioning attempt.
    ///
    /// Frames the credentials, writes every packet in order, then waits for
    /// the device's acknowledgement according to the configured strategy.
    /// The session ends in [`SessionState::Connected`] or
    /// [`SessionState::Failed`]; the returned error mirrors the failure
    /// reason recorded on the session. A disconnect clears the session's
    /// device handle so the caller goes back through reconnection.
    pub async fn provision(
        &mut self,
        session: &mut ProvisioningSession,
        credentials: &Credentials,
    ) -> Result<(), ProvisionError> {
        if session.state() != SessionState::Idle {
            return Err(ProvisionError::SessionNotIdle);
        }
        let outcome = self.run_attempt(session, credentials).await;
        match &outcome {
            Ok(()) => session.succeed(),
            Err(err) => {
                log::debug!("provisioning failed: {err}");
                session.fail(err.to_string());
                if matches!(err, ProvisionError::Disconnected) {
                    session.clear_device();
                }
            }
        }
        outcome
    }

    async fn run_attempt(
        &self,
        session: &mut ProvisioningSession,
        credentials: &Credentials,
    ) -> Result<(), ProvisionError> {
        let device = session
            .device()
            .cloned()
            .ok_or(ProvisionError::Disconnected)?;

        let payload = credentials.wire_format();
        let packets = frame_packets(
            payload.as_bytes(),
            ble::START_BYTE,
            ble::END_BYTE,
            self.config.max_packet_size,
        )?;
        log::debug!("framed credentials into {} packets", packets.len());

        let mut disconnections = self
            .link
            .disconnections()
            .await
            .map_err(|e| ProvisionError::Subscribe(e.to_string()))?;

        match self.config.ack {
            AckStrategy::Notification => {
                self.notification_attempt(session, &device, &packets, &mut disconnections)
                    .await
            }
            AckStrategy::Poll => {
                self.poll_attempt(session, &device, &packets, &mut disconnections)
                    .await
            }
        }
    }

    async fn notification_attempt(
        &self,
        session: &mut ProvisioningSession,
        device: &DeviceId,
        packets: &[Packet],
        disconnections: &mut BoxStream<'static, DeviceId>,
    ) -> Result<(), ProvisionError> {
        session.set_state(SessionState::Subscribing);
        let mut notifications = self
            .link
            .subscribe(
                device,
                self.config.service_uuid,
                self.config.characteristic_uuid,
            )
            .await
            .map_err(|e| ProvisionError::Subscribe(e.to_string()))?;

        let outcome = self
            .transfer_then_await_notification(
                session,
                device,
                packets,
                &mut notifications,
                disconnections,
            )
            .await;

        // Tear down delivery on every exit path; a failed unsubscribe must
        // not mask the attempt's own outcome.
        if let Err(err) = self
            .link
            .unsubscribe(
                device,
                self.config.service_uuid,
                self.config.characteristic_uuid,
            )
            .await
        {
            log::warn!("failed to unsubscribe from credentials characteristic: {err}");
        }

        outcome
    }

    async fn transfer_then_await_notification(
        &self,
        session: &mut ProvisioningSession,
        device: &DeviceId,
        packets: &[Packet],
        notifications: &mut BoxStream<'static, Vec<u8>>,
        disconnections: &mut BoxStream<'static, DeviceId>,
    ) -> Result<(), ProvisionError> {
        self.write_packets(session, device, packets, disconnections)
            .await?;

        session.set_state(SessionState::AwaitingAck);
        let answer = self
            .bounded(Self::next_notification(
                device,
                notifications,
                disconnections,
            ))
            .await?;
        if answer == ble::ack::OK {
            Ok(())
        } else {
            log::debug!("device answered {} bytes, not OK", answer.len());
            Err(ProvisionError::Rejected)
        }
    }

    async fn poll_attempt(
        &self,
        session: &mut ProvisioningSession,
        device: &DeviceId,
        packets: &[Packet],
        disconnections: &mut BoxStream<'static, DeviceId>,
    ) -> Result<(), ProvisionError> {
        self.write_packets(session, device, packets, disconnections)
            .await?;

        session.set_state(SessionState::AwaitingAck);
        // One status read, no retry loop: the firmware latches the result.
        let read = self.link.read(
            device,
            self.config.service_uuid,
            self.config.characteristic_uuid,
        );
        let value = self
            .bounded(Self::race_disconnect(device, read, disconnections))
            .await?
            .map_err(|e| ProvisionError::Read(e.to_string()))?;

        match value.first() {
            Some(&ble::ack::STATUS_CONNECTED) => Ok(()),
            Some(_) => Err(ProvisionError::Rejected),
            None => Err(ProvisionError::NoAck),
        }
    }

    async fn write_packets(
        &self,
        session: &mut ProvisioningSession,
        device: &DeviceId,
        packets: &[Packet],
        disconnections: &mut BoxStream<'static, DeviceId>,
    ) -> Result<(), ProvisionError> {
        session.set_state(SessionState::Transmitting);
        for (i, packet) in packets.iter().enumerate() {
            let write = self.link.write(
                device,
                self.config.service_uuid,
                self.config.characteristic_uuid,
                packet.as_bytes(),
            );
            Self::race_disconnect(device, write, disconnections)
                .await?
                .map_err(|e| ProvisionError::Write(e.to_string()))?;
            log::trace!("wrote packet {}/{}: {}", i + 1, packets.len(), packet.to_hex());
        }
        Ok(())
    }

    /// Wait for the acknowledgement notification, bailing on disconnect.
    async fn next_notification(
        device: &DeviceId,
        notifications: &mut BoxStream<'static, Vec<u8>>,
        disconnections: &mut BoxStream<'static, DeviceId>,
    ) -> Result<Vec<u8>, ProvisionError> {
        loop {
            tokio::select! {
                answer = notifications.next() => {
                    return answer.ok_or(ProvisionError::NoAck);
                }
                Some(gone) = disconnections.next() => {
                    if gone == *device {
                        return Err(ProvisionError::Disconnected);
                    }
                }
            }
        }
    }

    /// Run a link operation to completion unless the device disconnects first.
    async fn race_disconnect<T>(
        device: &DeviceId,
        op: impl Future<Output = T>,
        disconnections: &mut BoxStream<'static, DeviceId>,
    ) -> Result<T, ProvisionError> {
        tokio::pin!(op);
        loop {
            tokio::select! {
                out = &mut op => return Ok(out),
                Some(gone) = disconnections.next() => {
                    if gone == *device {
                        return Err(ProvisionError::Disconnected);
                    }
                }
            }
        }
    }

    /// Apply the configured acknowledgement timeout, if any.
    async fn bounded<T>(
        &self,
        wait: impl Future<Output = Result<T, ProvisionError>>,
    ) -> Result<T, ProvisionError> {
        match self.config.ack_timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| ProvisionError::Timeout)?,
            None => wait.await,
        }
    }
}
