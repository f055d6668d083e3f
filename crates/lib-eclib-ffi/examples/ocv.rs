//! Minimal open-circuit-voltage experiment.
//!
//! This example demonstrates:
//! 1. Loading the EClib library and resolving its function table
//! 2. Connecting to an instrument and checking the channel firmware
//! 3. Loading the OCV technique with its parameters
//! 4. Polling decoded data until the channel stops
//!
//! Requires a connected instrument and the OEM library; pass the library
//! path and instrument address on the command line:
//!
//! ```text
//! cargo run --example ocv -- C:\EC-Lab\EClib64.dll USB0
//! ```

use lib_eclib_ffi::{EclBinder, EclDevice};
use lib_types::{ChannelState, TechParam, VoltageRange};
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let library_path = args.next().unwrap_or_else(|| {
        lib_eclib_ffi::default_library_name().to_owned()
    });
    let address = args.next().unwrap_or_else(|| "USB0".to_owned());
    let channel = 0u8;

    println!("=== EC-Kernel OCV Example ===\n");

    let mut binder = EclBinder::new();
    let library = binder.initialize(&library_path)?;
    println!("EClib {} loaded from {}", library.lib_version()?, library.path);

    let device = EclDevice::connect(&library, &address, 5)?;
    println!("Connected: {}", device.info());

    let info = device.channel_info(channel)?;
    if !info.is_kernel_loaded() {
        println!("Loading kernel firmware on channel {channel}...");
        device.load_firmware(&[channel], false, None)?;
    }

    // Rest for 10 s, recording every 100 ms or 1 mV.
    let params = vec![
        TechParam::new("Rest_time_T", 10.0f32),
        TechParam::new("Record_every_dE", 0.001f32),
        TechParam::new("Record_every_dT", 0.1f32),
        TechParam::new("E_Range", VoltageRange::Auto.to_raw()),
    ];
    let ecc = if device.is_vmp4_series() { "ocv4.ecc" } else { "ocv.ecc" };

    device.load_technique(channel, ecc, &params, true, true)?;
    device.start_channel(channel)?;
    println!("Channel {channel} started ({ecc})\n");

    // The channel may report Stop on the first poll right after start;
    // only a Stop seen after Run ends the loop.
    let mut seen_running = false;
    loop {
        std::thread::sleep(Duration::from_millis(500));
        let (data, values) = device.get_data(channel)?;
        for point in &data.points {
            if let (Some(t), Some(ewe)) = (point.time, point.values.first()) {
                println!("  t = {:8.3} s   Ewe = {:.4} V", t, ewe.as_f64());
            }
        }
        match values.state {
            ChannelState::Run | ChannelState::Pause => seen_running = true,
            ChannelState::Stop if seen_running => break,
            _ => {}
        }
    }

    println!("\nChannel stopped, disconnecting.");
    device.disconnect()?;
    binder.teardown();
    Ok(())
}
