//! BLE provisioning tool for Floret plant monitors
//!
//! Scans for Floret devices and delivers WiFi credentials over the
//! provisioning GATT service.

mod link;

use std::time::Duration;

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use clap::{Parser, Subcommand, ValueEnum};

use floret_proto::Credentials;
use floret_proto::ble::SERVICE_UUID;
use floret_provision::{AckStrategy, DeviceId, ProvisionConfig, Provisioner, ProvisioningSession};

use link::BtleplugLink;

#[derive(Parser)]
#[command(name = "floret-ble")]
#[command(about = "BLE provisioning tool for Floret plant monitors")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for Floret devices
    Scan {
        /// Scan duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Send WiFi credentials to a device
    Provision {
        /// Device name or address to connect to
        #[arg(short, long)]
        device: Option<String>,
        /// WiFi network name
        #[arg(long)]
        ssid: Option<String>,
        /// WiFi password
        #[arg(long)]
        password: Option<String>,
        /// WiFi credentials file (SSID on line 1, password on line 2),
        /// used when --ssid/--password are not given
        #[arg(short, long, default_value = "wifi_credentials.txt")]
        file: String,
        /// How to wait for the device's acknowledgement
        #[arg(long, value_enum, default_value_t = AckMode::Poll)]
        ack: AckMode,
        /// Give up on the acknowledgement after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum AckMode {
    /// Read the status byte once after the transfer
    Poll,
    /// Wait for an "OK" notification
    Notify,
}

impl From<AckMode> for AckStrategy {
    fn from(mode: AckMode) -> Self {
        match mode {
            AckMode::Poll => AckStrategy::Poll,
            AckMode::Notify => AckStrategy::Notification,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cli = Cli::parse();

    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    let adapter = adapters.into_iter().next().ok_or("No Bluetooth adapter found")?;

    match cli.command {
        Commands::Scan { duration } => {
            scan_devices(&adapter, duration).await?;
        }
        Commands::Provision { device, ssid, password, file, ack, timeout } => {
            let credentials = match (ssid, password) {
                (Some(ssid), Some(password)) => Credentials::new(ssid, password)?,
                _ => read_wifi_credentials(&file)?,
            };
            provision_device(&adapter, device, credentials, ack, timeout).await?;
        }
    }

    Ok(())
}

fn read_wifi_credentials(file: &str) -> Result<Credentials, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(file)?;
    let mut lines = content.lines();
    let ssid = lines.next().ok_or("Missing SSID in credentials file")?.trim();
    let password = lines.next().ok_or("Missing password in credentials file")?.trim();
    Ok(Credentials::new(ssid, password)?)
}

async fn scan_devices(adapter: &Adapter, duration: u64) -> Result<(), Box<dyn std::error::Error>> {
    println!("Scanning for Floret devices ({} seconds)...", duration);

    adapter.start_scan(ScanFilter { services: vec![SERVICE_UUID] }).await?;
    tokio::time::sleep(Duration::from_secs(duration)).await;

    let peripherals = adapter.peripherals().await?;

    println!("\nFound {} devices:", peripherals.len());
    for peripheral in peripherals {
        if let Some(props) = peripheral.properties().await? {
            let name = props.local_name.unwrap_or_else(|| "Unknown".to_string());
            let addr = peripheral.address();
            let rssi = props.rssi.map(|r| format!("{} dBm", r)).unwrap_or_else(|| "N/A".to_string());

            // The provisioning service in the advertisement marks a Floret device
            let is_floret = props.services.contains(&SERVICE_UUID) || name.starts_with("Floret");
            let marker = if is_floret { " [FLORET]" } else { "" };

            println!("  {} ({}) RSSI: {}{}", name, addr, rssi, marker);
        }
    }

    adapter.stop_scan().await?;
    Ok(())
}

async fn find_floret_device(
    adapter: &Adapter,
    target: Option<String>,
) -> Result<Peripheral, Box<dyn std::error::Error>> {
    println!("Scanning for Floret devices...");

    adapter.start_scan(ScanFilter { services: vec![SERVICE_UUID] }).await?;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let peripherals = adapter.peripherals().await?;

    for peripheral in peripherals {
        if let Some(props) = peripheral.properties().await? {
            let name = props.local_name.unwrap_or_default();
            let addr = peripheral.address().to_string();

            // Match by target (name or address) or take any Floret device
            let matches = match &target {
                Some(t) => name.contains(t) || addr.contains(t),
                None => props.services.contains(&SERVICE_UUID) || name.starts_with("Floret"),
            };

            if matches {
                adapter.stop_scan().await?;
                println!("Found device: {} ({})", name, addr);
                return Ok(peripheral);
            }
        }
    }

    adapter.stop_scan().await?;
    Err("No Floret device found".into())
}

async fn provision_device(
    adapter: &Adapter,
    target: Option<String>,
    credentials: Credentials,
    ack: AckMode,
    timeout: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let peripheral = find_floret_device(adapter, target).await?;

    println!("Connecting...");
    peripheral.connect().await?;
    println!("Connected!");

    println!("Discovering services...");
    peripheral.discover_services().await?;

    let config = ProvisionConfig {
        ack: ack.into(),
        ack_timeout: timeout.map(Duration::from_secs),
        ..ProvisionConfig::default()
    };
    let link = BtleplugLink::new(adapter.clone(), peripheral.clone());
    let mut provisioner = Provisioner::with_config(link, config);
    let mut session = ProvisioningSession::new(DeviceId::new(peripheral.id().to_string()));

    println!("Sending WiFi credentials...");
    println!("  SSID: {}", credentials.ssid());

    let result = provisioner.provision(&mut session, &credentials).await;

    match &result {
        Ok(()) => println!("WiFi credentials accepted! Device is on the network."),
        Err(err) => {
            eprintln!("Provisioning failed: {}", err);
            if session.device().is_none() {
                eprintln!("Bluetooth connection lost, reconnect and try again.");
            }
        }
    }

    let _ = peripheral.disconnect().await;
    result.map_err(Into::into)
}
