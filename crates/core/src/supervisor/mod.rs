//! Single-flight supervision of visualization processes.
//!
//! The supervisor owns a registry keyed by [`DisplayKind`]. For each kind at
//! most one process is alive: a new request terminates the live one before
//! the replacement is started. Requests never fail because a viewer is
//! already running.

pub mod error;
pub mod process;

pub use error::{SupervisorError, TerminationError};
pub use process::{viewer_args, DisplayProcess, ViewerProcess};

use rk_protocol::display_models::{DisplayHandle, DisplayKind};
use rk_protocol::ipc::Event;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

type Registry = HashMap<DisplayKind, Box<dyn DisplayProcess>>;

/// Owns every visualization process started by the application.
///
/// The registry lock is held for the whole of `request` and
/// `terminate_all`, so a shutdown cannot interleave with a replacement.
pub struct ProcessSupervisor {
    registry: Mutex<Registry>,
    events_tx: Option<UnboundedSender<Event>>,
}

impl ProcessSupervisor {
    /// Create a supervisor that does not report events.
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            events_tx: None,
        }
    }

    /// Create a supervisor that reports starts and replacements on `events_tx`.
    pub fn with_events(events_tx: UnboundedSender<Event>) -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            events_tx: Some(events_tx),
        }
    }

    /// Start a process of `kind`, replacing the live one if there is one.
    ///
    /// # Behavior
    ///
    /// 1. If a live process is registered for `kind`, terminate it and wait
    ///    for it to exit. A failure to terminate is logged, not returned.
    /// 2. Create the replacement with `factory` and register it.
    ///
    /// # Errors
    ///
    /// Only the factory's own error. The slot for `kind` is left empty in
    /// that case.
    pub fn request<F, P>(&self, kind: DisplayKind, factory: F) -> Result<DisplayHandle, SupervisorError>
    where
        F: FnOnce() -> Result<P, SupervisorError>,
        P: DisplayProcess + 'static,
    {
        let mut registry = self.lock();

        let mut replaced = None;
        if let Some(mut previous) = registry.remove(&kind) {
            if previous.is_alive() {
                replaced = previous.id();
                info!(%kind, pid = ?replaced, "replacing live viewer");
                if let Err(e) = previous.terminate() {
                    warn!(%kind, error = %e, "failed to terminate previous viewer");
                }
                self.emit(Event::DisplayReplaced {
                    kind,
                    previous_pid: replaced,
                });
            } else {
                debug!(%kind, "previous viewer already exited");
            }
        }

        let process = factory()?;
        let pid = process.id();
        registry.insert(kind, Box::new(process));
        info!(%kind, ?pid, "viewer started");
        self.emit(Event::DisplayStarted { kind, pid });

        Ok(DisplayHandle {
            kind,
            pid,
            replaced,
        })
    }

    /// Ask every registered process to exit without waiting for it.
    ///
    /// Idempotent: the registry is emptied, so a second call has nothing to do.
    /// Killed processes are not reaped; they remain zombies until the
    /// controlling process exits. Only meant for application shutdown.
    pub fn terminate_all(&self) {
        let mut registry = self.lock();
        for (kind, mut process) in registry.drain() {
            if !process.is_alive() {
                continue;
            }
            if let Err(e) = process.start_kill() {
                warn!(%kind, error = %e, "failed to terminate viewer during shutdown");
            } else {
                debug!(%kind, pid = ?process.id(), "viewer asked to exit");
            }
        }
    }

    /// Whether a live process is registered for `kind`.
    pub fn is_alive(&self, kind: DisplayKind) -> bool {
        self.lock()
            .get_mut(&kind)
            .is_some_and(|process| process.is_alive())
    }

    /// Number of registered processes that are still running.
    pub fn live_count(&self) -> usize {
        self.lock()
            .values_mut()
            .map(|process| process.is_alive())
            .filter(|alive| *alive)
            .count()
    }

    /// Process id registered for `kind`, live or not.
    pub fn pid(&self, kind: DisplayKind) -> Option<u32> {
        self.lock().get(&kind).and_then(|process| process.id())
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        // A panic while holding the lock leaves the map itself intact.
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = &self.events_tx {
            let _ = tx.send(event);
        }
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    /// In-memory stand-in for a viewer process.
    struct FakeProcess {
        pid: u32,
        alive: Arc<AtomicBool>,
        fail_kill: bool,
    }

    impl DisplayProcess for FakeProcess {
        fn id(&self) -> Option<u32> {
            Some(self.pid)
        }

        fn is_alive(&mut self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }

        fn terminate(&mut self) -> Result<(), TerminationError> {
            self.start_kill()
        }

        fn start_kill(&mut self) -> Result<(), TerminationError> {
            if self.fail_kill {
                return Err(TerminationError::Kill {
                    pid: Some(self.pid),
                    source: io::Error::from(io::ErrorKind::PermissionDenied),
                });
            }
            self.alive.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Spawner {
        next_pid: AtomicU32,
    }

    impl Spawner {
        fn new() -> Self {
            Self {
                next_pid: AtomicU32::new(100),
            }
        }

        fn spawn(&self) -> (FakeProcess, Arc<AtomicBool>) {
            let alive = Arc::new(AtomicBool::new(true));
            let process = FakeProcess {
                pid: self.next_pid.fetch_add(1, Ordering::SeqCst),
                alive: Arc::clone(&alive),
                fail_kill: false,
            };
            (process, alive)
        }
    }

    #[test]
    fn test_request_twice_replaces_first() {
        let supervisor = ProcessSupervisor::new();
        let spawner = Spawner::new();

        let (first, first_alive) = spawner.spawn();
        let handle1 = supervisor
            .request(DisplayKind::Cloud, || Ok(first))
            .unwrap();
        assert_eq!(handle1.pid, Some(100));
        assert_eq!(handle1.replaced, None);

        let (second, second_alive) = spawner.spawn();
        let handle2 = supervisor
            .request(DisplayKind::Cloud, || Ok(second))
            .unwrap();

        assert!(!first_alive.load(Ordering::SeqCst), "first viewer must be terminated");
        assert!(second_alive.load(Ordering::SeqCst));
        assert_eq!(handle2.pid, Some(101));
        assert_eq!(handle2.replaced, Some(100));
        assert_eq!(supervisor.live_count(), 1);
        assert_eq!(supervisor.pid(DisplayKind::Cloud), Some(101));
    }

    #[test]
    fn test_kinds_are_independent() {
        let supervisor = ProcessSupervisor::new();
        let spawner = Spawner::new();

        let (cloud, cloud_alive) = spawner.spawn();
        let (mesh, mesh_alive) = spawner.spawn();
        supervisor.request(DisplayKind::Cloud, || Ok(cloud)).unwrap();
        supervisor.request(DisplayKind::Mesh, || Ok(mesh)).unwrap();

        assert!(cloud_alive.load(Ordering::SeqCst));
        assert!(mesh_alive.load(Ordering::SeqCst));
        assert_eq!(supervisor.live_count(), 2);
    }

    #[test]
    fn test_request_after_exit_creates_without_terminate() {
        let supervisor = ProcessSupervisor::new();
        let spawner = Spawner::new();

        let (first, first_alive) = spawner.spawn();
        supervisor.request(DisplayKind::Mesh, || Ok(first)).unwrap();
        // The user closed the viewer window.
        first_alive.store(false, Ordering::SeqCst);
        assert!(!supervisor.is_alive(DisplayKind::Mesh));

        let (second, _) = spawner.spawn();
        let handle = supervisor.request(DisplayKind::Mesh, || Ok(second)).unwrap();
        assert_eq!(handle.replaced, None);
        assert!(supervisor.is_alive(DisplayKind::Mesh));
    }

    #[test]
    fn test_termination_failure_is_swallowed() {
        let supervisor = ProcessSupervisor::new();
        let spawner = Spawner::new();

        let (mut stubborn, _) = spawner.spawn();
        stubborn.fail_kill = true;
        supervisor.request(DisplayKind::Cloud, || Ok(stubborn)).unwrap();

        let (second, _) = spawner.spawn();
        let result = supervisor.request(DisplayKind::Cloud, || Ok(second));
        assert!(result.is_ok(), "termination failure must not propagate");
    }

    #[test]
    fn test_factory_error_propagates_and_leaves_slot_empty() {
        let supervisor = ProcessSupervisor::new();
        let spawner = Spawner::new();

        let (first, first_alive) = spawner.spawn();
        supervisor.request(DisplayKind::Cloud, || Ok(first)).unwrap();

        let result = supervisor.request(DisplayKind::Cloud, || -> Result<FakeProcess, _> {
            Err(SupervisorError::Launch {
                kind: DisplayKind::Cloud,
                program: "viewer".to_string(),
                source: io::Error::from(io::ErrorKind::NotFound),
            })
        });

        assert!(matches!(result, Err(SupervisorError::Launch { .. })));
        assert!(!first_alive.load(Ordering::SeqCst));
        assert_eq!(supervisor.pid(DisplayKind::Cloud), None);
    }

    #[test]
    fn test_terminate_all_is_idempotent() {
        let supervisor = ProcessSupervisor::new();
        let spawner = Spawner::new();

        let (cloud, cloud_alive) = spawner.spawn();
        let (mesh, mesh_alive) = spawner.spawn();
        supervisor.request(DisplayKind::Cloud, || Ok(cloud)).unwrap();
        supervisor.request(DisplayKind::Mesh, || Ok(mesh)).unwrap();

        supervisor.terminate_all();
        assert!(!cloud_alive.load(Ordering::SeqCst));
        assert!(!mesh_alive.load(Ordering::SeqCst));
        assert_eq!(supervisor.live_count(), 0);

        supervisor.terminate_all();
        assert_eq!(supervisor.live_count(), 0);
    }

    #[test]
    fn test_events_are_reported() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let supervisor = ProcessSupervisor::with_events(tx);
        let spawner = Spawner::new();

        let (first, _) = spawner.spawn();
        let (second, _) = spawner.spawn();
        supervisor.request(DisplayKind::Cloud, || Ok(first)).unwrap();
        supervisor.request(DisplayKind::Cloud, || Ok(second)).unwrap();

        let events: Vec<Event> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(
            events,
            vec![
                Event::DisplayStarted {
                    kind: DisplayKind::Cloud,
                    pid: Some(100)
                },
                Event::DisplayReplaced {
                    kind: DisplayKind::Cloud,
                    previous_pid: Some(100)
                },
                Event::DisplayStarted {
                    kind: DisplayKind::Cloud,
                    pid: Some(101)
                },
            ]
        );
    }

    #[test]
    fn test_concurrent_requests_keep_single_flight() {
        let supervisor = Arc::new(ProcessSupervisor::new());
        let spawner = Arc::new(Spawner::new());
        let mut flags = Vec::new();
        let mut handles = Vec::new();

        for _ in 0..8 {
            let (process, alive) = spawner.spawn();
            flags.push(alive);
            let supervisor = Arc::clone(&supervisor);
            handles.push(std::thread::spawn(move || {
                supervisor.request(DisplayKind::Mesh, || Ok(process)).unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let alive = flags.iter().filter(|f| f.load(Ordering::SeqCst)).count();
        assert_eq!(alive, 1, "exactly one viewer may survive");
        assert_eq!(supervisor.live_count(), 1);
    }
}
