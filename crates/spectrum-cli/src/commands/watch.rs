//! Watch command - follow a worker's sweeps until Ctrl+C

use anyhow::Result;
use spectrum_control::ClientProxy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::output::{OutputContext, OutputFormat, SweepRow};

/// Poll the status file and print every new sweep
pub fn watch(proxy: &mut ClientProxy, interval_ms: u64, ctx: &OutputContext) -> Result<()> {
    ctx.info(&format!("Watching {}...", proxy.files().name()));
    ctx.info("Press Ctrl+C to stop");

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    if ctx.format == OutputFormat::Csv {
        println!("time,sweep_n,peaks");
    }

    let mut last_sweep = None;
    let mut last_error = None;
    while running.load(Ordering::SeqCst) {
        let status = proxy.status();

        if status.error != last_error {
            if let Some(error) = &status.error {
                ctx.warn(error);
            }
            last_error = status.error.clone();
        }

        if let Some(update) = status.sweep() {
            if last_sweep != Some(update.sweep_n) {
                last_sweep = Some(update.sweep_n);
                print_sweep(&SweepRow::from(&update), ctx);
            }
        }

        thread::sleep(Duration::from_millis(interval_ms));
    }

    ctx.info("\nStopped watching");
    Ok(())
}

/// One line per sweep, whatever the format
fn print_sweep(row: &SweepRow, ctx: &OutputContext) {
    match ctx.format {
        OutputFormat::Table => println!("[{}] #{}: {}", row.time, row.sweep_n, row.peaks),
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string(row) {
                println!("{}", json);
            }
        }
        OutputFormat::Csv => println!("{},{},{}", row.time, row.sweep_n, row.peaks),
    }
}
