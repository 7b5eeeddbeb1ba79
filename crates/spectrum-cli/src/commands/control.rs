//! Control commands - start, stop and terminate a worker

use anyhow::{bail, Result};
use spectrum_control::ClientProxy;

use crate::output::OutputContext;

/// Fail with the proxy's liveness message when the worker was not signalled
fn require_signalled(proxy: &ClientProxy, signalled: bool) -> Result<()> {
    if signalled {
        return Ok(());
    }
    bail!(
        "{}",
        proxy
            .error()
            .map(String::from)
            .unwrap_or_else(|| format!("No {} process", proxy.files().name()))
    )
}

/// Point the worker at a configuration and wake it
pub fn start(proxy: &mut ClientProxy, config_id: &str, ctx: &OutputContext) -> Result<()> {
    let signalled = proxy.start(config_id)?;
    require_signalled(proxy, signalled)?;
    ctx.success(&format!(
        "{} asked to run configuration {}",
        proxy.files().name(),
        config_id
    ));
    Ok(())
}

/// Stop the current episode; the worker stays up
pub fn stop(proxy: &mut ClientProxy, ctx: &OutputContext) -> Result<()> {
    let signalled = proxy.stop()?;
    require_signalled(proxy, signalled)?;
    ctx.success(&format!("{} asked to stop", proxy.files().name()));
    Ok(())
}

/// Ask the worker to exit
pub fn terminate(proxy: &mut ClientProxy, keep_config: bool, ctx: &OutputContext) -> Result<()> {
    let signalled = proxy.terminate(!keep_config)?;
    require_signalled(proxy, signalled)?;
    if keep_config {
        ctx.success(&format!(
            "{} asked to exit; pending configuration kept",
            proxy.files().name()
        ));
    } else {
        ctx.success(&format!("{} asked to exit", proxy.files().name()));
    }
    Ok(())
}

/// Print the worker's PID
pub fn pid(proxy: &mut ClientProxy, ctx: &OutputContext) -> Result<()> {
    let Some(pid) = proxy.read_pid() else {
        return require_signalled(proxy, false);
    };
    if ctx.quiet {
        println!("{}", pid);
    } else {
        ctx.info(&format!("{}: {}", proxy.files().name(), pid));
    }
    Ok(())
}
