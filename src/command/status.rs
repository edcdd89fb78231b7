//! `status` subcommand

use serde_json::json;
use smarthome_shared::{snapshot, DeviceDirectory, LightSnapshot, RpcLedger};

/// Print the state of every light in the directory
pub async fn status(ledger: &RpcLedger, directory: &DeviceDirectory, json: bool) -> anyhow::Result<()> {
    let lights = snapshot(&directory.device_ids(), ledger).await?;
    print_snapshot(directory, &lights, json);
    Ok(())
}

pub fn print_snapshot(directory: &DeviceDirectory, lights: &LightSnapshot, json: bool) {
    if json {
        let rows: Vec<_> = directory
            .records()
            .iter()
            .map(|record| {
                json!({
                    "device_id": record.device_id,
                    "label": record.label,
                    "is_on": lights.is_on(&record.device_id),
                })
            })
            .collect();
        println!("{}", json!({ "lights": rows }));
    } else {
        println!("Light Status");
        println!("{}", lights.render(directory));
    }
}
