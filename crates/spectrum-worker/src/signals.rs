//! Control signal handling
//!
//! Listener tasks translate incoming signals into three durable flags and
//! wake the supervisor. They never touch files or the device; the
//! supervisor reads the flags at its scheduling points.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use spectrum_control::ControlSignal;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::debug;

/// Effect of a control signal on the worker's flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalAction {
    pub stop: bool,
    pub exit: bool,
    pub tidy: bool,
}

impl SignalAction {
    pub fn for_signal(signal: ControlSignal) -> Self {
        match signal {
            ControlSignal::Wake => Self {
                stop: true,
                exit: false,
                tidy: true,
            },
            ControlSignal::Terminate => Self {
                stop: true,
                exit: true,
                tidy: false,
            },
            ControlSignal::Interrupt | ControlSignal::Hangup => Self {
                stop: true,
                exit: true,
                tidy: true,
            },
        }
    }
}

#[derive(Debug)]
struct FlagState {
    stop: AtomicBool,
    exit: AtomicBool,
    tidy: AtomicBool,
    wake: Notify,
}

/// Flags shared between the signal listeners and the supervisor.
///
/// Exit is sticky: once requested, a later wake signal does not cancel it.
#[derive(Debug, Clone)]
pub struct ControlFlags {
    state: Arc<FlagState>,
}

impl Default for ControlFlags {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlFlags {
    pub fn new() -> Self {
        Self {
            state: Arc::new(FlagState {
                stop: AtomicBool::new(false),
                exit: AtomicBool::new(false),
                tidy: AtomicBool::new(true),
                wake: Notify::new(),
            }),
        }
    }

    /// Record a signal and wake the supervisor
    pub fn apply(&self, action: SignalAction) {
        let state = &self.state;
        if action.exit {
            state.tidy.store(action.tidy, Ordering::SeqCst);
            state.exit.store(true, Ordering::SeqCst);
        } else if !state.exit.load(Ordering::SeqCst) {
            state.tidy.store(action.tidy, Ordering::SeqCst);
        }
        if action.stop {
            state.stop.store(true, Ordering::SeqCst);
        }
        state.wake.notify_one();
    }

    pub fn stop_requested(&self) -> bool {
        self.state.stop.load(Ordering::SeqCst)
    }

    pub fn exit_requested(&self) -> bool {
        self.state.exit.load(Ordering::SeqCst)
    }

    pub fn tidy_on_exit(&self) -> bool {
        self.state.tidy.load(Ordering::SeqCst)
    }

    /// Reset the stop flag at the start of an episode
    pub fn clear_stop(&self) {
        self.state.stop.store(false, Ordering::SeqCst);
    }

    /// Park until the next signal.
    ///
    /// A signal that arrived since the last wait completes this at once.
    pub async fn wait(&self) {
        self.state.wake.notified().await;
    }
}

/// Cloneable handle for stopping a worker from inside the process
#[derive(Debug, Clone)]
pub struct StopHandle {
    flags: ControlFlags,
}

impl StopHandle {
    pub fn new(flags: ControlFlags) -> Self {
        Self { flags }
    }

    /// Stop the current episode; the worker then idles
    pub fn stop(&self) {
        self.flags.apply(SignalAction::for_signal(ControlSignal::Wake));
    }

    /// Stop and exit
    pub fn exit(&self, tidy: bool) {
        self.flags.apply(SignalAction::for_signal(if tidy {
            ControlSignal::Interrupt
        } else {
            ControlSignal::Terminate
        }));
    }
}

/// Listen for the control signals for the rest of the process lifetime.
///
/// Must be called from within a tokio runtime. Handlers are registered
/// before this returns, so no signal sent afterwards is lost.
pub fn install(flags: &ControlFlags) -> io::Result<()> {
    let table = [
        (SignalKind::user_defined1(), ControlSignal::Wake),
        (SignalKind::terminate(), ControlSignal::Terminate),
        (SignalKind::interrupt(), ControlSignal::Interrupt),
        (SignalKind::hangup(), ControlSignal::Hangup),
    ];

    for (kind, control) in table {
        let mut stream = signal(kind)?;
        let flags = flags.clone();
        let action = SignalAction::for_signal(control);
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                debug!(signal = control.name(), "Control signal received");
                flags.apply(action);
            }
        });
    }
    Ok(())
}
