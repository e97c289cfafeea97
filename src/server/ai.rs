//! AI client processes, one child per AI empire.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};

use super::collab::{AiHandle, AiProcessError, AiProcesses};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug)]
pub struct ChildProcessLauncher {
    /// How long a child may take to exit on its own before it is killed.
    grace: Duration,
    children: BTreeMap<AiHandle, Child>,
    next_handle: u32,
}

impl ChildProcessLauncher {
    pub fn new(grace: Duration) -> Self {
        ChildProcessLauncher { grace, children: BTreeMap::new(), next_handle: 1 }
    }

    pub fn running(&self) -> usize {
        self.children.len()
    }
}

impl AiProcesses for ChildProcessLauncher {
    fn spawn(&mut self, exe: &Path, args: &[String]) -> Result<AiHandle, AiProcessError> {
        let child = Command::new(exe)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|source| AiProcessError::Spawn { exe: exe.to_path_buf(), source })?;
        let handle = AiHandle(self.next_handle);
        self.next_handle += 1;
        info!("spawned AI {:?} (pid {})", handle, child.id());
        self.children.insert(handle, child);
        Ok(handle)
    }

    fn kill(&mut self, handle: AiHandle) -> Result<(), AiProcessError> {
        let mut child = self.children.remove(&handle).ok_or(AiProcessError::NoSuchProcess(handle))?;
        let deadline = Instant::now() + self.grace;
        loop {
            match child.try_wait().map_err(AiProcessError::Kill)? {
                Some(status) => {
                    info!("AI {:?} exited with {}", handle, status);
                    return Ok(());
                }
                None if Instant::now() >= deadline => break,
                None => thread::sleep(POLL_INTERVAL),
            }
        }
        warn!("AI {:?} did not exit within {:?}, killing", handle, self.grace);
        child.kill().map_err(AiProcessError::Kill)?;
        child.wait().map_err(AiProcessError::Kill)?;
        Ok(())
    }

    #[cfg(unix)]
    fn set_low_priority(&mut self, handle: AiHandle, low: bool) -> bool {
        let Some(child) = self.children.get(&handle) else { return false };
        let niceness = if low { "10" } else { "0" };
        Command::new("renice")
            .args(["-n", niceness, "-p", &child.id().to_string()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    fn set_low_priority(&mut self, _handle: AiHandle, _low: bool) -> bool {
        false
    }
}

impl Drop for ChildProcessLauncher {
    fn drop(&mut self) {
        for (handle, mut child) in std::mem::take(&mut self.children) {
            if let Err(e) = child.kill() {
                warn!("failed to kill AI {:?}: {}", handle, e);
            }
            let _ = child.wait();
        }
    }
}

/// Launcher double that records calls without starting anything.
#[derive(Debug, Default)]
pub struct NullLauncher {
    pub spawned: Vec<(String, Vec<String>)>,
    pub killed: Vec<AiHandle>,
}

impl AiProcesses for NullLauncher {
    fn spawn(&mut self, exe: &Path, args: &[String]) -> Result<AiHandle, AiProcessError> {
        self.spawned.push((exe.display().to_string(), args.to_vec()));
        Ok(AiHandle(self.spawned.len() as u32))
    }

    fn kill(&mut self, handle: AiHandle) -> Result<(), AiProcessError> {
        self.killed.push(handle);
        Ok(())
    }

    fn set_low_priority(&mut self, _handle: AiHandle, _low: bool) -> bool {
        true
    }
}
