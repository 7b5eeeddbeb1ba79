//! End-to-end tests driving a real spectrumd process through its control
//! files and signals

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use spectrum_control::{ClientProxy, ControlFiles};
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(10);

/// Poll `check` until it holds or the timeout expires
fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while !check() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(20));
    }
}

/// Temporary run/data directories plus a daemon config pointing at them
struct TestHarness {
    dir: TempDir,
    config_path: PathBuf,
}

impl TestHarness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("spectrumd.toml");
        let config = format!(
            r#"
[worker]
device = "sensor"
run_dir = "{run}"
data_dir = "{data}"

[retry]
retries = 1
interval_ms = 1

[drivers.sensor]
latency_ms = 5
noise_floor = -110.0

[[drivers.sensor.signals]]
freq = 100200000.0
level = -50.0
"#,
            run = dir.path().join("run").display(),
            data = dir.path().join("data").display(),
        );
        fs::write(&config_path, config).unwrap();

        let configs = dir.path().join("data/configs");
        fs::create_dir_all(&configs).unwrap();
        fs::write(
            configs.join("c1.json"),
            r#"{"values": {"sensor": {"range": [100e6, 100.4e6, 0.1e6]}}}"#,
        )
        .unwrap();

        Self { dir, config_path }
    }

    fn run_dir(&self) -> PathBuf {
        self.dir.path().join("run")
    }

    fn spectrum_file(&self, config_id: &str) -> PathBuf {
        self.dir.path().join(format!("data/spectrum/{}.csv", config_id))
    }

    fn files(&self) -> ControlFiles {
        ControlFiles::new(self.run_dir(), "sensor")
    }

    fn proxy(&self) -> ClientProxy {
        ClientProxy::new(self.files())
    }

    fn command(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_spectrumd"));
        command
            .arg("--config")
            .arg(&self.config_path)
            .env("RUST_LOG", "spectrumd=debug,spectrum_worker=debug");
        command
    }

    /// Spawn a daemon and wait until it has claimed its PID file
    fn spawn(&self) -> Daemon {
        let child = self
            .command()
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn spectrumd");
        let daemon = Daemon { child };

        let mut proxy = self.proxy();
        let pid = daemon.pid();
        wait_until("PID file", || proxy.read_pid() == Some(pid));
        daemon
    }
}

/// A running daemon, killed on drop if the test did not stop it
struct Daemon {
    child: Child,
}

impl Daemon {
    fn pid(&self) -> u32 {
        self.child.id()
    }

    fn wait_exit(&mut self) -> ExitStatus {
        let deadline = Instant::now() + TIMEOUT;
        loop {
            if let Some(status) = self.child.try_wait().unwrap() {
                return status;
            }
            assert!(Instant::now() < deadline, "daemon did not exit");
            thread::sleep(Duration::from_millis(20));
        }
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn wait_for_sweep(proxy: &mut ClientProxy) -> spectrum_core::SweepUpdate {
    let mut latest = None;
    wait_until("first sweep", || {
        latest = proxy.status().sweep();
        latest.is_some()
    });
    latest.unwrap()
}

fn exists(path: &Path) -> bool {
    path.try_exists().unwrap()
}

#[test]
fn test_start_publishes_sweeps_and_stop_idles() {
    let harness = TestHarness::new();
    let mut daemon = harness.spawn();
    let mut proxy = harness.proxy();
    let files = harness.files();

    assert!(proxy.start("c1").unwrap());
    let sweep = wait_for_sweep(&mut proxy);
    assert_eq!(sweep.peaks[0].freq_n, 2);
    assert_eq!(proxy.status().config_id.as_deref(), Some("c1"));

    assert!(proxy.stop().unwrap());
    wait_until("idle", || !exists(files.config_path()) && proxy.status().is_empty());
    assert_eq!(proxy.read_pid(), Some(daemon.pid()));

    assert!(proxy.terminate(true).unwrap());
    assert!(daemon.wait_exit().success());
    assert!(!exists(files.pid_path()));
    assert!(!exists(files.status_path()));
    assert!(fs::read_to_string(harness.spectrum_file("c1")).unwrap().lines().count() >= 1);
}

#[test]
fn test_terminate_keeps_config_and_interrupt_tidies() {
    let harness = TestHarness::new();
    let files = harness.files();

    let mut daemon = harness.spawn();
    let mut proxy = harness.proxy();
    proxy.start("c1").unwrap();
    wait_for_sweep(&mut proxy);
    assert!(proxy.terminate(false).unwrap());
    assert!(daemon.wait_exit().success());
    assert_eq!(files.read_config().unwrap().as_deref(), Some("c1"));
    assert!(!exists(files.pid_path()));

    // The next worker resumes the pending configuration unprompted
    let mut daemon = harness.spawn();
    let mut proxy = harness.proxy();
    let sweep = wait_for_sweep(&mut proxy);
    assert!(sweep.sweep_n >= 1);
    assert!(proxy.terminate(true).unwrap());
    assert!(daemon.wait_exit().success());
    assert_eq!(files.read_config().unwrap(), None);
}

#[test]
fn test_second_instance_is_refused() {
    let harness = TestHarness::new();
    let daemon = harness.spawn();

    let output = harness.command().output().expect("run spectrumd");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains(&format!("Process already exists: {}", daemon.pid())),
        "unexpected stderr: {}",
        stderr
    );

    let mut proxy = harness.proxy();
    assert_eq!(proxy.read_pid(), Some(daemon.pid()));
}

#[test]
fn test_unknown_config_reports_error_status() {
    let harness = TestHarness::new();
    let _daemon = harness.spawn();
    let mut proxy = harness.proxy();

    proxy.start("missing").unwrap();
    let mut status = proxy.status();
    wait_until("error status", || {
        status = proxy.status();
        status.error.is_some()
    });
    assert_eq!(status.config_id.as_deref(), Some("missing"));
    assert_eq!(
        status.error.as_deref(),
        Some("Configuration not found: missing")
    );
}
