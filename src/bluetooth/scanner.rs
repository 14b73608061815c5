//! Bluetooth Low Energy scanning for RuuviTag advertisements

use futures_util::StreamExt;
use log::{debug, error, warn};
use tokio::time::{sleep, Duration};

// RuuviTag protocol constants
const RUUVITAG_MANUFACTURER_ID: u16 = 0x0499; // Ruuvi Innovations Ltd. manufacturer ID
const SCAN_DURATION_SECS: u64 = 20; // How long to actively scan for devices

/// One raw advertisement captured during a scan pass. The payload is left
/// undecoded; the frame decoder is the single place wire bytes become
/// measurements.
#[derive(Debug, Clone)]
pub struct TagAdvertisement {
    pub device_id: String, // MAC address, uppercase
    pub payload: Vec<u8>,  // manufacturer data bytes
    pub rssi: Option<i16>, // dBm at capture
}

/// Scan for RuuviTag advertisements and collect their raw frames
///
/// Performs one Bluetooth Low Energy discovery pass and returns the
/// manufacturer data payload and signal strength of every Ruuvi device
/// seen, whether or not it is assigned to a vehicle. Filtering against the
/// configured assignments is the ingestion path's job.
///
/// # Returns
/// Result containing the captured advertisements, or error if the scan
/// could not run
pub async fn scan_for_advertisements() -> Result<Vec<TagAdvertisement>, Box<dyn std::error::Error>>
{
    let mut advertisements = Vec::new();

    // Initialize Bluetooth session
    let session = match bluer::Session::new().await {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to create Bluetooth session: {}", e);
            return Err(e.into());
        }
    };

    // Get the default Bluetooth adapter
    let adapter = match session.default_adapter().await {
        Ok(adapter) => adapter,
        Err(e) => {
            error!("Failed to get default Bluetooth adapter: {}", e);
            return Err(e.into());
        }
    };

    // Ensure Bluetooth adapter is powered on
    if let Err(e) = adapter.set_powered(true).await {
        error!("Failed to power on adapter: {}", e);
        return Err(e.into());
    }

    // Configure discovery filter for Low Energy devices only
    let filter = bluer::DiscoveryFilter {
        transport: bluer::DiscoveryTransport::Le, // Bluetooth Low Energy only
        duplicate_data: false,                    // Filter out duplicate advertisements
        ..Default::default()
    };

    // Apply the discovery filter (warn if it fails, but continue)
    if let Err(e) = adapter.set_discovery_filter(filter).await {
        warn!("Failed to set discovery filter: {}", e);
    }

    // Start device discovery in background
    let discovery_handle = {
        match adapter.discover_devices().await {
            Ok(discovery_stream) => tokio::spawn(async move {
                let mut stream = discovery_stream;
                while let Some(event) = stream.next().await {
                    debug!("Discovery event: {:?}", event);
                }
            }),
            Err(e) => {
                error!("Failed to start device discovery: {}", e);
                return Err(e.into());
            }
        }
    };

    // Let discovery run for the configured duration
    sleep(Duration::from_secs(SCAN_DURATION_SECS)).await;

    // Stop discovery
    discovery_handle.abort();

    // Get all discovered device addresses
    let devices = match adapter.device_addresses().await {
        Ok(devices) => devices,
        Err(e) => {
            error!("Failed to get device addresses: {}", e);
            return Err(e.into());
        }
    };

    // Collect the Ruuvi manufacturer payload from each discovered device
    for addr in devices {
        let device = match adapter.device(addr) {
            Ok(device) => device,
            Err(_) => continue,
        };

        let device_id = device.address().to_string().to_uppercase();

        match device.manufacturer_data().await {
            Ok(Some(manufacturer_data)) => {
                if let Some(payload) = manufacturer_data.get(&RUUVITAG_MANUFACTURER_ID) {
                    let rssi = device.rssi().await.ok().flatten();
                    debug!(
                        "Captured {} bytes from {} (rssi: {:?})",
                        payload.len(),
                        device_id,
                        rssi
                    );
                    advertisements.push(TagAdvertisement {
                        device_id,
                        payload: payload.clone(),
                        rssi,
                    });
                }
            }
            Ok(None) => {
                debug!("No manufacturer data for {}", device_id);
            }
            Err(e) => {
                debug!("Failed to get manufacturer data for {}: {}", device_id, e);
            }
        }
    }

    Ok(advertisements)
}
