//! Lifecycle glue: finding the console's owner, launching the detached
//! watcher, and noticing when the owner exits.

use crate::utils::{OverlayError, Result};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

/// Background thread that raises a flag once the watched process is gone
pub struct ExitWatcher {
    exited: Arc<AtomicBool>,
    handle: JoinHandle<Result<()>>,
}

impl ExitWatcher {
    /// Watch `pid` until it exits
    pub fn spawn(pid: u32) -> Self {
        Self::spawn_with(move || wait_for_exit(pid))
    }

    /// Run `wait` on a background thread and raise the flag when it returns,
    /// whether it succeeded or not
    pub fn spawn_with<F>(wait: F) -> Self
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let exited = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&exited);

        let handle = thread::spawn(move || {
            let result = wait();
            flag.store(true, Ordering::Release);
            result
        });

        Self { exited, handle }
    }

    pub fn exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    /// Wait for the watcher thread and return what its wait reported
    pub fn join(self) -> Result<()> {
        self.handle
            .join()
            .map_err(|_| OverlayError::process("exit watcher panicked"))?
    }
}

/// Start `exe` detached from this console, telling it which process to follow
pub fn spawn_watcher(exe: &Path, pid: u32, extra_args: &[String]) -> Result<()> {
    let mut command = Command::new(exe);
    command
        .arg(pid.to_string())
        .args(extra_args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const DETACHED_PROCESS: u32 = 0x0000_0008;
        command.creation_flags(DETACHED_PROCESS);
    }

    let child = command
        .spawn()
        .map_err(|e| OverlayError::process(format!("Failed to spawn {}: {}", exe.display(), e)))?;

    log::info!("Spawned watcher {} for pid {}", child.id(), pid);
    Ok(())
}

/// Process that owns the console this process runs in
#[cfg(windows)]
pub fn console_owner_pid() -> Result<u32> {
    use winapi::shared::minwindef::DWORD;
    use winapi::um::wincon::GetConsoleWindow;
    use winapi::um::winuser::GetWindowThreadProcessId;

    let hwnd = unsafe { GetConsoleWindow() };
    if hwnd.is_null() {
        return Err(OverlayError::process("not running in a console"));
    }

    let mut pid: DWORD = 0;
    unsafe { GetWindowThreadProcessId(hwnd, &mut pid) };
    if pid == 0 {
        return Err(OverlayError::last_os_error("GetWindowThreadProcessId"));
    }
    Ok(pid)
}

/// Process that owns the console this process runs in
#[cfg(unix)]
pub fn console_owner_pid() -> Result<u32> {
    // the shell that started us
    let pid = unsafe { libc::getppid() };
    u32::try_from(pid).map_err(|_| OverlayError::process("invalid parent pid"))
}

/// Block until `pid` exits. Fails if the process cannot be found or opened.
#[cfg(windows)]
pub fn wait_for_exit(pid: u32) -> Result<()> {
    use winapi::shared::minwindef::FALSE;
    use winapi::um::handleapi::CloseHandle;
    use winapi::um::processthreadsapi::OpenProcess;
    use winapi::um::synchapi::WaitForSingleObject;
    use winapi::um::winbase::{INFINITE, WAIT_FAILED};
    use winapi::um::winnt::SYNCHRONIZE;

    let handle = unsafe { OpenProcess(SYNCHRONIZE, FALSE, pid) };
    if handle.is_null() {
        return Err(OverlayError::last_os_error("OpenProcess"));
    }

    let status = unsafe { WaitForSingleObject(handle, INFINITE) };
    let result = if status == WAIT_FAILED {
        Err(OverlayError::last_os_error("WaitForSingleObject"))
    } else {
        log::info!("Process {} exited", pid);
        Ok(())
    };

    unsafe { CloseHandle(handle) };
    result
}

/// Block until `pid` exits. Fails if the process cannot be found.
#[cfg(unix)]
pub fn wait_for_exit(pid: u32) -> Result<()> {
    use std::time::Duration;

    const POLL_INTERVAL: Duration = Duration::from_millis(250);

    let pid = libc::pid_t::try_from(pid)
        .ok()
        .filter(|&pid| pid > 0)
        .ok_or_else(|| OverlayError::process(format!("invalid pid {}", pid)))?;

    let mut first = true;
    loop {
        // signal 0 only checks for existence; EPERM still means alive
        if unsafe { libc::kill(pid, 0) } != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::ESRCH) {
                if first {
                    return Err(OverlayError::process(format!("no process with pid {}", pid)));
                }
                log::info!("Process {} exited", pid);
                return Ok(());
            }
            if err.raw_os_error() != Some(libc::EPERM) {
                return Err(OverlayError::process(format!("kill({}, 0): {}", pid, err)));
            }
        }
        first = false;
        thread::sleep(POLL_INTERVAL);
    }
}
