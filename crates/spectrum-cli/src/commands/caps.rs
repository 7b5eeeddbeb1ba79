//! Caps command - legal parameter values of a device type

use anyhow::Result;
use spectrum_core::Capabilities;
use spectrum_drivers::{DriverRegistry, DriversConfig};

use crate::output::{CapabilityRow, OutputContext};

/// List what a device type can be configured with
pub fn caps(drivers: &DriversConfig, device: &str, ctx: &OutputContext) -> Result<()> {
    let registry = DriverRegistry::from_config(drivers);
    let driver = match registry.get(device) {
        Ok(driver) => driver,
        Err(e) => {
            ctx.error(&format!(
                "Known devices: {}",
                registry.device_types().join(", ")
            ));
            return Err(e.into());
        }
    };

    let capabilities = driver.capabilities();
    ctx.print(&capability_rows(&capabilities));
    if capabilities.spans {
        ctx.info(&format!("{} reads whole spans per call", device));
    }
    Ok(())
}

fn capability_rows(capabilities: &Capabilities) -> Vec<CapabilityRow> {
    let modes = capabilities.modes.iter().map(|choice| ("mode", choice));
    let parameters = capabilities
        .parameters
        .iter()
        .flat_map(|(name, choices)| choices.iter().map(move |choice| (name.as_str(), choice)));

    modes
        .chain(parameters)
        .map(|(parameter, choice)| CapabilityRow {
            parameter: parameter.to_string(),
            value: match &choice.value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            },
            label: choice.label.clone(),
        })
        .collect()
}
