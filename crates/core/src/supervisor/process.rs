//! Handles to visualization subprocesses.
//!
//! Viewers run as separate operating-system processes so that they can be
//! terminated independently and do not share a failure domain with the
//! controller.

use crate::supervisor::error::{SupervisorError, TerminationError};
use rk_protocol::config_models::ViewerCommand;
use rk_protocol::display_models::DisplayKind;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use tracing::debug;

/// A live (or formerly live) visualization session.
pub trait DisplayProcess: Send {
    /// Operating-system process id.
    fn id(&self) -> Option<u32>;

    /// Whether the process is still running.
    fn is_alive(&mut self) -> bool;

    /// Kill the process and wait for it to exit.
    ///
    /// Terminating a process that already exited is a no-op.
    fn terminate(&mut self) -> Result<(), TerminationError>;

    /// Send the kill signal without waiting for the process to exit.
    fn start_kill(&mut self) -> Result<(), TerminationError>;
}

/// Viewer subprocess started from a [`ViewerCommand`].
#[derive(Debug)]
pub struct ViewerProcess {
    child: Child,
}

impl ViewerProcess {
    /// Spawn a viewer.
    ///
    /// The command line is `program args... <True|False> <output_dir>`, where
    /// the flag tells the viewer whether the pipeline is still processing.
    pub fn spawn(
        kind: DisplayKind,
        command: &ViewerCommand,
        still_processing: bool,
        output_dir: &Path,
    ) -> Result<Self, SupervisorError> {
        let args = viewer_args(command, still_processing, output_dir);
        debug!(%kind, program = %command.program, ?args, "spawning viewer");

        let child = Command::new(&command.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SupervisorError::Launch {
                kind,
                program: command.program.clone(),
                source,
            })?;

        Ok(Self { child })
    }
}

/// Argument vector appended to the viewer program.
pub fn viewer_args(command: &ViewerCommand, still_processing: bool, output_dir: &Path) -> Vec<String> {
    let flag = if still_processing { "True" } else { "False" };
    let mut args = command.args.clone();
    args.push(flag.to_string());
    args.push(output_dir.display().to_string());
    args
}

impl DisplayProcess for ViewerProcess {
    fn id(&self) -> Option<u32> {
        Some(self.child.id())
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn terminate(&mut self) -> Result<(), TerminationError> {
        if !self.is_alive() {
            return Ok(());
        }
        let pid = self.id();
        self.child
            .kill()
            .map_err(|source| TerminationError::Kill { pid, source })?;
        self.child
            .wait()
            .map_err(|source| TerminationError::Wait { pid, source })?;
        Ok(())
    }

    fn start_kill(&mut self) -> Result<(), TerminationError> {
        if !self.is_alive() {
            return Ok(());
        }
        let pid = self.id();
        self.child
            .kill()
            .map_err(|source| TerminationError::Kill { pid, source })?;
        // Reap opportunistically; the process may need a moment to exit.
        let _ = self.child.try_wait();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_viewer_args_layout() {
        let command = ViewerCommand {
            program: "python3".to_string(),
            args: vec!["src/point_cloud_visualizer.py".to_string()],
        };

        let args = viewer_args(&command, true, &PathBuf::from("/data/out"));
        assert_eq!(args, vec!["src/point_cloud_visualizer.py", "True", "/data/out"]);

        let args = viewer_args(&command, false, &PathBuf::from("/data/out"));
        assert_eq!(args[1], "False");
    }

    #[test]
    fn test_spawn_missing_program() {
        let command = ViewerCommand {
            program: "nonexistent-viewer-xyz".to_string(),
            args: vec![],
        };

        let result = ViewerProcess::spawn(DisplayKind::Mesh, &command, false, Path::new("."));
        match result {
            Err(SupervisorError::Launch { kind, program, .. }) => {
                assert_eq!(kind, DisplayKind::Mesh);
                assert_eq!(program, "nonexistent-viewer-xyz");
            }
            other => panic!("Expected Launch error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_terminate_live_viewer() {
        // The trailing flag and directory become $0 and $1 of the script.
        let command = ViewerCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "sleep 30".to_string()],
        };

        let mut viewer = ViewerProcess::spawn(DisplayKind::Cloud, &command, false, Path::new("."))
            .expect("sh should spawn");
        assert!(viewer.is_alive());
        assert!(viewer.id().is_some());

        viewer.terminate().expect("terminate should succeed");
        assert!(!viewer.is_alive());

        // Second terminate is a no-op
        viewer.terminate().expect("terminating a dead viewer is a no-op");
        viewer.start_kill().expect("killing a dead viewer is a no-op");
    }
}
