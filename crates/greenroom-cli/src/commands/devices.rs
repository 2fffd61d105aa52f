//! List audio input devices.

use anyhow::Result;
use console::style;
use greenroom_core::list_input_devices;

pub fn list() -> Result<()> {
    let devices = list_input_devices()?;
    println!("Audio input devices:");
    for device in devices {
        if device.is_default {
            println!("  {} {}", style("*").green(), device.name);
        } else {
            println!("    {}", device.name);
        }
    }
    println!("\n{} = system default", style("*").green());
    Ok(())
}
