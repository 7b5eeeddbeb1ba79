//! Controller-side view of a worker

use spectrum_core::Status;
use tracing::{debug, warn};

use crate::error::ControlError;
use crate::files::{send_signal, ControlFiles, ControlSignal};

/// Reads a worker's PID and status and sends it commands.
///
/// Liveness problems never raise: they are kept as a message in
/// [`ClientProxy::error`] and echoed in the status. Commands to a worker
/// that is not running are no-ops.
#[derive(Debug, Clone)]
pub struct ClientProxy {
    files: ControlFiles,
    pid: Option<u32>,
    error: Option<String>,
}

impl ClientProxy {
    pub fn new(files: ControlFiles) -> Self {
        Self {
            files,
            pid: None,
            error: None,
        }
    }

    pub fn files(&self) -> &ControlFiles {
        &self.files
    }

    /// Why the worker was last found unreachable
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Re-read the PID file; `None` when the worker is not running
    pub fn read_pid(&mut self) -> Option<u32> {
        match self.files.read_pid() {
            Ok(Some(pid)) => {
                self.pid = Some(pid);
                self.error = None;
            }
            Ok(None) => {
                self.pid = None;
                self.error = Some(format!("No {} process", self.files.name()));
            }
            Err(e) => {
                self.pid = None;
                self.error = Some(e.to_string());
            }
        }
        self.pid
    }

    /// Latest status, empty when the worker publishes none
    pub fn status(&mut self) -> Status {
        self.read_pid();
        let mut status = match self.files.read_status() {
            Ok(status) => status.unwrap_or_default(),
            Err(e) => Status {
                error: Some(e.to_string()),
                ..Default::default()
            },
        };
        if let Some(error) = &self.error {
            status.error = Some(error.clone());
        }
        status
    }

    /// Ask the worker to run a configuration.
    ///
    /// Returns whether the worker was signalled.
    pub fn start(&mut self, config_id: &str) -> Result<bool, ControlError> {
        let Some(pid) = self.read_pid() else {
            debug!(worker = self.files.name(), config_id, "Worker not running, start ignored");
            return Ok(false);
        };
        self.files.write_config(config_id)?;
        let sent = self.deliver(pid, send_signal(pid, ControlSignal::Wake))?;
        if !sent {
            // Nobody will pick it up; a later worker must not inherit it
            if let Err(e) = self.files.remove_config_if(config_id) {
                warn!(worker = self.files.name(), config_id, %e, "Failed to withdraw config");
            }
        }
        Ok(sent)
    }

    /// Ask the worker to stop its current episode
    pub fn stop(&mut self) -> Result<bool, ControlError> {
        self.signal(ControlSignal::Wake)
    }

    /// Ask the worker to exit; with `tidy` the pending config is discarded
    pub fn terminate(&mut self, tidy: bool) -> Result<bool, ControlError> {
        self.signal(if tidy {
            ControlSignal::Interrupt
        } else {
            ControlSignal::Terminate
        })
    }

    fn signal(&mut self, signal: ControlSignal) -> Result<bool, ControlError> {
        match self.read_pid() {
            Some(pid) => self.deliver(pid, send_signal(pid, signal)),
            None => {
                debug!(worker = self.files.name(), signal = signal.name(), "Worker not running");
                Ok(false)
            }
        }
    }

    /// Outcome of signalling `pid`; a worker that exited after its PID
    /// was read counts as not running
    fn deliver(
        &mut self,
        pid: u32,
        result: Result<(), ControlError>,
    ) -> Result<bool, ControlError> {
        match result {
            Ok(()) => Ok(true),
            Err(e) if e.is_gone() => {
                debug!(worker = self.files.name(), pid, "Worker exited before the signal");
                self.pid = None;
                self.error = Some(format!("No {} process", self.files.name()));
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io;
    use std::os::unix::process::ExitStatusExt;
    use std::process::{Child, Command};
    use tempfile::TempDir;

    fn proxy() -> (TempDir, ClientProxy) {
        let dir = TempDir::new().unwrap();
        let proxy = ClientProxy::new(ControlFiles::new(dir.path(), "rig"));
        (dir, proxy)
    }

    fn sleeper() -> Child {
        Command::new("sleep").arg("30").spawn().unwrap()
    }

    #[test]
    fn test_not_running_commands_are_noops() {
        let (_dir, mut proxy) = proxy();

        assert_eq!(proxy.read_pid(), None);
        assert_eq!(proxy.error(), Some("No rig process"));

        assert!(!proxy.start("c1").unwrap());
        assert!(!proxy.files().config_path().exists());
        assert!(!proxy.stop().unwrap());
        assert!(!proxy.terminate(true).unwrap());
    }

    #[test]
    fn test_status_reports_missing_worker() {
        let (_dir, mut proxy) = proxy();
        let status = proxy.status();
        assert_eq!(status.error.as_deref(), Some("No rig process"));
        assert!(status.config_id.is_none());
    }

    #[test]
    fn test_status_reports_stale_pid() {
        let (_dir, mut proxy) = proxy();
        std::fs::write(proxy.files().pid_path(), "garbage").unwrap();
        let status = proxy.status();
        assert_eq!(status.error.as_deref(), Some("Bad PID: garbage"));
    }

    #[test]
    fn test_status_of_live_worker() {
        let (_dir, mut proxy) = proxy();
        proxy.files().write_pid(std::process::id()).unwrap();
        proxy
            .files()
            .write_status(&Status::for_config("c9"))
            .unwrap();

        let status = proxy.status();
        assert_eq!(proxy.error(), None);
        assert_eq!(status.error, None);
        assert_eq!(status.config_id.as_deref(), Some("c9"));
        assert!(status.timestamp.is_some());
    }

    #[test]
    fn test_start_writes_config_and_wakes_worker() {
        let (_dir, mut proxy) = proxy();
        let mut child = sleeper();
        proxy.files().write_pid(child.id()).unwrap();

        assert!(proxy.start("1500000000000").unwrap());
        assert_eq!(
            proxy.files().read_config().unwrap().as_deref(),
            Some("1500000000000")
        );

        // sleep has no SIGUSR1 handler, so delivery shows up as its exit signal
        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(libc::SIGUSR1));
    }

    #[test]
    fn test_terminate_signal_choice() {
        let (_dir, mut proxy) = proxy();

        let mut tidy = sleeper();
        proxy.files().write_pid(tidy.id()).unwrap();
        assert!(proxy.terminate(true).unwrap());
        assert_eq!(tidy.wait().unwrap().signal(), Some(libc::SIGINT));

        let mut keep = sleeper();
        proxy.files().write_pid(keep.id()).unwrap();
        assert!(proxy.terminate(false).unwrap());
        assert_eq!(keep.wait().unwrap().signal(), Some(libc::SIGTERM));
    }

    fn signal_error(errno: i32) -> ControlError {
        ControlError::Signal {
            pid: 4242,
            signal: "SIGUSR1",
            source: io::Error::from_raw_os_error(errno),
        }
    }

    #[test]
    fn test_worker_exiting_before_signal_counts_as_not_running() {
        let (_dir, mut proxy) = proxy();
        proxy.files().write_pid(std::process::id()).unwrap();
        assert!(proxy.read_pid().is_some());

        let sent = proxy.deliver(4242, Err(signal_error(libc::ESRCH))).unwrap();
        assert!(!sent);
        assert_eq!(proxy.error(), Some("No rig process"));
        assert_eq!(proxy.pid, None);
    }

    #[test]
    fn test_other_signal_failures_propagate() {
        let (_dir, mut proxy) = proxy();
        let err = proxy.deliver(4242, Err(signal_error(libc::EPERM))).unwrap_err();
        assert!(!err.is_gone());
        assert!(proxy.deliver(4242, Ok(())).unwrap());
    }
}
