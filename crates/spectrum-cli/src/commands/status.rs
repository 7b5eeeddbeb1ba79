//! Status command - show what a worker is doing

use anyhow::Result;
use spectrum_control::ClientProxy;
use spectrum_core::Status;

use crate::output::{format_peaks, format_timestamp, OutputContext, OutputFormat};

/// Show the worker's PID and latest published status
pub fn status(proxy: &mut ClientProxy, ctx: &OutputContext) -> Result<()> {
    let status = proxy.status();
    let pid = proxy.read_pid();

    if ctx.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }
    ctx.print_kv(&status_pairs(proxy.files().name(), pid, &status));
    Ok(())
}

/// Flatten a status into display pairs
pub fn status_pairs<'a>(
    worker: &str,
    pid: Option<u32>,
    status: &'a Status,
) -> Vec<(&'a str, String)> {
    let mut pairs = vec![
        ("worker", worker.to_string()),
        (
            "pid",
            pid.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
        ),
        (
            "config",
            status.config_id.clone().unwrap_or_else(|| "idle".to_string()),
        ),
    ];
    if let Some(ts) = status.timestamp {
        pairs.push(("updated", format_timestamp(ts)));
    }
    if let Some(sweep) = status.sweep() {
        pairs.push(("sweep", sweep.sweep_n.to_string()));
        pairs.push(("peaks", format_peaks(&sweep.peaks)));
    }
    for (key, value) in &status.progress {
        if key != "sweep" {
            pairs.push((key.as_str(), value.to_string()));
        }
    }
    if let Some(error) = &status.error {
        pairs.push(("error", error.clone()));
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use spectrum_core::{Peak, SweepUpdate};

    #[test]
    fn test_idle_worker() {
        let status = Status {
            error: Some("No sensor process".to_string()),
            ..Default::default()
        };
        assert_eq!(
            status_pairs("sensor", None, &status),
            vec![
                ("worker", "sensor".to_string()),
                ("pid", "-".to_string()),
                ("config", "idle".to_string()),
                ("error", "No sensor process".to_string()),
            ]
        );
    }

    #[test]
    fn test_running_worker() {
        let mut status = Status::for_config("1500");
        status.record_sweep(&SweepUpdate {
            timestamp: 0,
            sweep_n: 41,
            peaks: vec![Peak {
                freq_n: 3,
                strength: -42,
            }],
            channels: vec![],
        });
        status.progress.insert("antenna".to_string(), json!(1));

        let pairs = status_pairs("sensor", Some(1234), &status);
        assert_eq!(pairs[1], ("pid", "1234".to_string()));
        assert_eq!(pairs[2], ("config", "1500".to_string()));
        assert!(pairs.contains(&("sweep", "41".to_string())));
        assert!(pairs.contains(&("peaks", "3:-42".to_string())));
        assert!(pairs.contains(&("antenna", "1".to_string())));
    }
}
