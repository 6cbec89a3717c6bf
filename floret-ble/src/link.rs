//! btleplug-backed implementation of the provisioning BLE capability

use btleplug::api::{Central as _, CentralEvent, Characteristic, Peripheral as _, WriteType};
use btleplug::platform::{Adapter, Peripheral};
use futures::StreamExt;
use futures::stream::BoxStream;
use uuid::Uuid;

use floret_provision::{BleLink, DeviceId};

/// BLE link over a connected btleplug peripheral
pub struct BtleplugLink {
    adapter: Adapter,
    peripheral: Peripheral,
}

impl BtleplugLink {
    pub fn new(adapter: Adapter, peripheral: Peripheral) -> Self {
        Self {
            adapter,
            peripheral,
        }
    }

    fn characteristic(&self, uuid: Uuid) -> Result<Characteristic, btleplug::Error> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or_else(|| {
                btleplug::Error::Other(format!("characteristic {uuid} not found").into())
            })
    }
}

impl BleLink for BtleplugLink {
    type Error = btleplug::Error;

    async fn write(
        &self,
        _device: &DeviceId,
        _service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), btleplug::Error> {
        let characteristic = self.characteristic(characteristic)?;
        self.peripheral
            .write(&characteristic, value, WriteType::WithResponse)
            .await
    }

    async fn read(
        &self,
        _device: &DeviceId,
        _service: Uuid,
        characteristic: Uuid,
    ) -> Result<Vec<u8>, btleplug::Error> {
        let characteristic = self.characteristic(characteristic)?;
        self.peripheral.read(&characteristic).await
    }

    async fn subscribe(
        &self,
        _device: &DeviceId,
        _service: Uuid,
        characteristic: Uuid,
    ) -> Result<BoxStream<'static, Vec<u8>>, btleplug::Error> {
        let target = self.characteristic(characteristic)?;
        self.peripheral.subscribe(&target).await?;
        let notifications = self.peripheral.notifications().await?;
        // The peripheral delivers one stream for all characteristics; keep
        // only the credentials characteristic's payloads.
        Ok(notifications
            .filter_map(move |n| {
                futures::future::ready((n.uuid == characteristic).then_some(n.value))
            })
            .boxed())
    }

    async fn unsubscribe(
        &self,
        _device: &DeviceId,
        _service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), btleplug::Error> {
        let characteristic = self.characteristic(characteristic)?;
        self.peripheral.unsubscribe(&characteristic).await
    }

    async fn disconnections(&self) -> Result<BoxStream<'static, DeviceId>, btleplug::Error> {
        let events = self.adapter.events().await?;
        Ok(events
            .filter_map(|event| {
                futures::future::ready(match event {
                    CentralEvent::DeviceDisconnected(id) => Some(DeviceId::new(id.to_string())),
                    _ => None,
                })
            })
            .boxed())
    }
}
