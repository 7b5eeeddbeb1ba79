//! Control files of one worker and the signals that drive it
//!
//! For a worker named `w` the run directory holds:
//!
//! - `w.pid`: decimal process id of the running worker
//! - `w.config`: id of the configuration to run next
//! - `w.status`: JSON status snapshot, replaced atomically via `w.status.tmp`
//!
//! Every reader treats a missing file as "absent", so a reader racing a
//! worker transition sees either the old file, the new file or nothing.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use spectrum_core::Status;
use tracing::{debug, trace};

use crate::error::{ControlError, ProcessError};

/// Signals understood by a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Pick up the pending config, or stop the running episode
    Wake,
    /// Stop and exit, discarding the pending config
    Interrupt,
    /// Same as [`ControlSignal::Interrupt`]
    Hangup,
    /// Stop and exit, keeping the pending config
    Terminate,
}

impl ControlSignal {
    pub fn raw(self) -> libc::c_int {
        match self {
            ControlSignal::Wake => libc::SIGUSR1,
            ControlSignal::Interrupt => libc::SIGINT,
            ControlSignal::Hangup => libc::SIGHUP,
            ControlSignal::Terminate => libc::SIGTERM,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ControlSignal::Wake => "SIGUSR1",
            ControlSignal::Interrupt => "SIGINT",
            ControlSignal::Hangup => "SIGHUP",
            ControlSignal::Terminate => "SIGTERM",
        }
    }
}

/// Probe a process with signal 0.
///
/// `EPERM` means the process exists but belongs to someone else.
pub fn is_alive(pid: u32) -> bool {
    let Ok(raw) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs the permission and existence check only
    let rc = unsafe { libc::kill(raw, 0) };
    rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Deliver a control signal to a worker
pub fn send_signal(pid: u32, signal: ControlSignal) -> Result<(), ControlError> {
    let raw = libc::pid_t::try_from(pid)
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| ControlError::Signal {
            pid,
            signal: signal.name(),
            source: io::Error::from(io::ErrorKind::InvalidInput),
        })?;
    // SAFETY: plain kill(2) on a positive pid
    let rc = unsafe { libc::kill(raw, signal.raw()) };
    if rc != 0 {
        return Err(ControlError::Signal {
            pid,
            signal: signal.name(),
            source: io::Error::last_os_error(),
        });
    }
    debug!(pid, signal = signal.name(), "Signal sent");
    Ok(())
}

/// Paths of one worker's control files
#[derive(Debug, Clone)]
pub struct ControlFiles {
    name: String,
    pid: PathBuf,
    config: PathBuf,
    status: PathBuf,
}

impl ControlFiles {
    pub fn new(run_dir: impl AsRef<Path>, name: &str) -> Self {
        let dir = run_dir.as_ref();
        Self {
            name: name.to_string(),
            pid: dir.join(format!("{}.pid", name)),
            config: dir.join(format!("{}.config", name)),
            status: dir.join(format!("{}.status", name)),
        }
    }

    /// Worker name the files are derived from
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pid_path(&self) -> &Path {
        &self.pid
    }

    pub fn config_path(&self) -> &Path {
        &self.config
    }

    pub fn status_path(&self) -> &Path {
        &self.status
    }

    // ---------------------------------------------------------------------
    // PID file
    // ---------------------------------------------------------------------

    /// Read the PID file and check the process is alive.
    ///
    /// `Ok(None)` when there is no PID file. Garbage content and dead
    /// processes are errors that [`ProcessError::is_stale`] recognises.
    pub fn read_pid(&self) -> Result<Option<u32>, ProcessError> {
        let content = match fs::read_to_string(&self.pid) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ProcessError::PidFile {
                    path: self.pid.clone(),
                    source,
                })
            }
        };
        let text = content.trim();
        let pid: u32 = text
            .parse()
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| ProcessError::BadPid(text.to_string()))?;
        if !is_alive(pid) {
            return Err(ProcessError::NotRunning(pid));
        }
        Ok(Some(pid))
    }

    /// Claim the PID file for `pid`
    pub fn write_pid(&self, pid: u32) -> Result<(), ProcessError> {
        write_atomic(&self.pid, pid.to_string().as_bytes()).map_err(|source| {
            ProcessError::PidFile {
                path: self.pid.clone(),
                source,
            }
        })
    }

    /// Create the PID file for `pid`, failing if any PID file exists.
    ///
    /// Of two workers racing for the same name exactly one succeeds; the
    /// other gets [`ProcessError::AlreadyRunning`] with the winner's pid
    /// (or the raw create error if the winner has not written it yet).
    pub fn create_pid(&self, pid: u32) -> Result<(), ProcessError> {
        let created = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.pid);
        let mut file = match created {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(match self.read_pid() {
                    Ok(Some(owner)) => ProcessError::AlreadyRunning(owner),
                    Ok(None) | Err(_) => ProcessError::PidFile {
                        path: self.pid.clone(),
                        source: e,
                    },
                });
            }
            Err(source) => {
                return Err(ProcessError::PidFile {
                    path: self.pid.clone(),
                    source,
                })
            }
        };
        file.write_all(pid.to_string().as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|source| ProcessError::PidFile {
                path: self.pid.clone(),
                source,
            })
    }

    pub fn remove_pid(&self) -> io::Result<()> {
        remove_if_exists(&self.pid)
    }

    /// Remove the PID file only if it still holds `pid`.
    ///
    /// Returns whether the file was removed.
    pub fn remove_pid_if(&self, pid: u32) -> io::Result<bool> {
        match fs::read_to_string(&self.pid) {
            Ok(content) if content.trim() == pid.to_string() => {
                remove_if_exists(&self.pid)?;
                Ok(true)
            }
            Ok(_) => Ok(false),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    // ---------------------------------------------------------------------
    // Config file
    // ---------------------------------------------------------------------

    /// Pending configuration id, if any
    pub fn read_config(&self) -> Result<Option<String>, ProcessError> {
        match fs::read_to_string(&self.config) {
            Ok(content) => {
                let id = content.trim();
                Ok((!id.is_empty()).then(|| id.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ProcessError::ConfigFile {
                path: self.config.clone(),
                source,
            }),
        }
    }

    pub fn write_config(&self, config_id: &str) -> Result<(), ControlError> {
        write_atomic(&self.config, config_id.as_bytes()).map_err(|source| ControlError::Write {
            path: self.config.clone(),
            source,
        })
    }

    pub fn remove_config(&self) -> io::Result<()> {
        remove_if_exists(&self.config)
    }

    /// Remove the config file only if it still names `config_id`.
    ///
    /// Returns whether the file was removed. A different id means a new
    /// request arrived and must survive.
    pub fn remove_config_if(&self, config_id: &str) -> io::Result<bool> {
        match fs::read_to_string(&self.config) {
            Ok(content) if content.trim() == config_id => {
                remove_if_exists(&self.config)?;
                Ok(true)
            }
            Ok(_) => Ok(false),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    // ---------------------------------------------------------------------
    // Status file
    // ---------------------------------------------------------------------

    /// Replace the status snapshot atomically
    pub fn write_status(&self, status: &Status) -> io::Result<()> {
        let body = serde_json::to_vec(status).map_err(io::Error::other)?;
        trace!(path = %self.status.display(), bytes = body.len(), "Writing status");
        write_atomic(&self.status, &body)
    }

    /// Current status snapshot with `timestamp` set from the file's mtime
    pub fn read_status(&self) -> Result<Option<Status>, ProcessError> {
        let bad = |message: String| ProcessError::StatusFile {
            path: self.status.clone(),
            message,
        };
        let mut file = match File::open(&self.status) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(bad(e.to_string())),
        };
        let modified = file
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| bad(e.to_string()))?;
        let mut body = String::new();
        file.read_to_string(&mut body)
            .map_err(|e| bad(e.to_string()))?;

        let mut status: Status = serde_json::from_str(&body).map_err(|e| bad(e.to_string()))?;
        status.timestamp = Some(DateTime::<Utc>::from(modified).timestamp_millis());
        Ok(Some(status))
    }

    pub fn remove_status(&self) -> io::Result<()> {
        remove_if_exists(&self.status)
    }
}

/// Write to `<path>.tmp`, flush to disk, then rename over `path`
fn write_atomic(path: &Path, body: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = File::create(&tmp)?;
    file.write_all(body)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp, path)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::process::Command;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn files() -> (TempDir, ControlFiles) {
        let dir = TempDir::new().unwrap();
        let files = ControlFiles::new(dir.path(), "sensor");
        (dir, files)
    }

    fn dead_pid() -> u32 {
        let mut child = Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        pid
    }

    #[test]
    fn test_paths_derive_from_name() {
        let files = ControlFiles::new("/run/spectrum", "rig");
        assert_eq!(files.pid_path(), Path::new("/run/spectrum/rig.pid"));
        assert_eq!(files.config_path(), Path::new("/run/spectrum/rig.config"));
        assert_eq!(files.status_path(), Path::new("/run/spectrum/rig.status"));
    }

    #[test]
    fn test_pid_absent() {
        let (_dir, files) = files();
        assert_eq!(files.read_pid().unwrap(), None);
    }

    #[test]
    fn test_pid_of_live_process() {
        let (_dir, files) = files();
        files.write_pid(std::process::id()).unwrap();
        assert_eq!(files.read_pid().unwrap(), Some(std::process::id()));
    }

    #[test]
    fn test_pid_garbage_is_stale() {
        let (_dir, files) = files();
        fs::write(files.pid_path(), "not-a-pid\n").unwrap();
        let err = files.read_pid().unwrap_err();
        assert!(matches!(err, ProcessError::BadPid(ref s) if s == "not-a-pid"));
        assert!(err.is_stale());
    }

    #[test]
    fn test_pid_of_dead_process_is_stale() {
        let (_dir, files) = files();
        let pid = dead_pid();
        files.write_pid(pid).unwrap();
        let err = files.read_pid().unwrap_err();
        assert!(matches!(err, ProcessError::NotRunning(p) if p == pid));
        assert!(err.is_stale());
    }

    #[test]
    fn test_create_pid_is_exclusive() {
        let (_dir, files) = files();
        files.create_pid(std::process::id()).unwrap();
        assert_eq!(files.read_pid().unwrap(), Some(std::process::id()));

        let err = files.create_pid(1).unwrap_err();
        assert!(matches!(err, ProcessError::AlreadyRunning(p) if p == std::process::id()));
        assert_eq!(
            fs::read_to_string(files.pid_path()).unwrap(),
            std::process::id().to_string()
        );
    }

    #[test]
    fn test_create_pid_over_garbage_fails() {
        let (_dir, files) = files();
        fs::write(files.pid_path(), "garbage").unwrap();
        let err = files.create_pid(std::process::id()).unwrap_err();
        assert!(matches!(err, ProcessError::PidFile { .. }));
        assert_eq!(fs::read_to_string(files.pid_path()).unwrap(), "garbage");
    }

    #[test]
    fn test_remove_pid_if_keeps_other_owner() {
        let (_dir, files) = files();
        files.write_pid(4242).unwrap();

        assert!(!files.remove_pid_if(4243).unwrap());
        assert!(files.pid_path().exists());

        assert!(files.remove_pid_if(4242).unwrap());
        assert!(!files.pid_path().exists());
        assert!(!files.remove_pid_if(4242).unwrap());
    }

    #[test]
    fn test_config_trimmed_and_removed() {
        let (_dir, files) = files();
        assert_eq!(files.read_config().unwrap(), None);

        fs::write(files.config_path(), "  1500000000000\n").unwrap();
        assert_eq!(files.read_config().unwrap().as_deref(), Some("1500000000000"));

        files.remove_config().unwrap();
        files.remove_config().unwrap();
        assert_eq!(files.read_config().unwrap(), None);
    }

    #[test]
    fn test_remove_config_if_keeps_newer_request() {
        let (_dir, files) = files();
        files.write_config("new").unwrap();
        assert!(!files.remove_config_if("old").unwrap());
        assert_eq!(files.read_config().unwrap().as_deref(), Some("new"));
        assert!(files.remove_config_if("new").unwrap());
        assert_eq!(files.read_config().unwrap(), None);
    }

    #[test]
    fn test_status_round_trip_adds_timestamp() {
        let (_dir, files) = files();
        assert_eq!(files.read_status().unwrap(), None);

        let mut status = Status::for_config("c1");
        status.progress.insert("level".to_string(), json!(3));
        files.write_status(&status).unwrap();

        let read = files.read_status().unwrap().unwrap();
        assert_eq!(read.config_id.as_deref(), Some("c1"));
        assert_eq!(read.progress.get("level"), Some(&json!(3)));
        let now = Utc::now().timestamp_millis();
        let ts = read.timestamp.unwrap();
        assert!(ts <= now && now - ts < 60_000);

        files.remove_status().unwrap();
        assert_eq!(files.read_status().unwrap(), None);
        assert!(!files.status_path().with_extension("status.tmp").exists());
    }

    #[test]
    fn test_status_concurrent_readers_never_see_partial_writes() {
        let (_dir, files) = files();
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let files = files.clone();
            let done = done.clone();
            thread::spawn(move || {
                for i in 0..300 {
                    let mut status = Status::for_config(format!("config-{}", i));
                    status
                        .progress
                        .insert("payload".to_string(), json!("x".repeat(i * 37 % 4096)));
                    files.write_status(&status).unwrap();
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        while !done.load(Ordering::SeqCst) {
            match files.read_status() {
                Ok(Some(status)) => {
                    assert!(status.config_id.unwrap().starts_with("config-"));
                }
                Ok(None) => {}
                Err(e) => panic!("reader saw a torn status file: {}", e),
            }
        }
        writer.join().unwrap();
        assert!(files.read_status().unwrap().is_some());
    }

    #[test]
    fn test_liveness_probe() {
        assert!(is_alive(std::process::id()));
        assert!(!is_alive(dead_pid()));
        assert!(!is_alive(0));
        assert!(!is_alive(u32::MAX));
    }

    #[test]
    fn test_send_signal_to_missing_process_fails() {
        let err = send_signal(dead_pid(), ControlSignal::Wake).unwrap_err();
        assert!(matches!(err, ControlError::Signal { signal: "SIGUSR1", .. }));
        assert!(err.is_gone());
    }
}
