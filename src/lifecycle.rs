//! Startup guards: platform support and administrator privileges.
//!
//! Firewall rules cannot be changed without elevation, so an unprivileged
//! process never gets as far as building the coordinator. It either re-launches
//! itself elevated and exits, or stops with a distinct exit code.

use crate::error::AppError;
use crate::notify::NotificationSink;

/// Privilege queries the startup path depends on.
pub trait PrivilegeGate {
    fn is_privileged(&self) -> bool;
    /// Launch an elevated copy of this process with the same arguments.
    fn request_escalation(&self) -> Result<(), AppError>;
}

/// What startup should do after the privilege check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupDecision {
    /// Already elevated; continue.
    Proceed,
    /// An elevated instance was launched; this one should exit cleanly.
    HandedOff,
}

/// Fail with [`AppError::Unsupported`] when the firewall backend is missing.
pub fn ensure_supported_platform() -> Result<(), AppError> {
    if cfg!(target_os = "windows") {
        Ok(())
    } else {
        Err(AppError::Unsupported(
            "This application currently supports Windows only (needs Windows Firewall).".into(),
        ))
    }
}

/// Decide whether startup may continue. User-facing lines go to `console`.
pub fn resolve_privilege(
    gate: &dyn PrivilegeGate,
    console: &dyn NotificationSink,
    allow_escalation: bool,
) -> Result<StartupDecision, AppError> {
    if gate.is_privileged() {
        tracing::debug!("Running with administrator privileges");
        return Ok(StartupDecision::Proceed);
    }

    console.print_line("");
    console.print_line("Administrator privileges required!");
    if !allow_escalation {
        return Err(AppError::Privilege(
            "Run this utility as Administrator.".into(),
        ));
    }

    console.print_line("Requesting elevation...");
    gate.request_escalation()?;
    tracing::info!("Elevated instance launched; exiting");
    Ok(StartupDecision::HandedOff)
}

/// The real operating-system check.
pub struct OsPrivilege;

#[cfg(target_os = "windows")]
mod win {
    use std::ffi::c_void;

    pub const SW_SHOWNORMAL: i32 = 1;

    #[link(name = "shell32")]
    extern "system" {
        pub fn IsUserAnAdmin() -> i32;
        pub fn ShellExecuteW(
            hwnd: *mut c_void,
            operation: *const u16,
            file: *const u16,
            parameters: *const u16,
            directory: *const u16,
            show_cmd: i32,
        ) -> *mut c_void;
    }

    pub fn wide(s: &std::ffi::OsStr) -> Vec<u16> {
        use std::os::windows::ffi::OsStrExt;
        s.encode_wide().chain(std::iter::once(0)).collect()
    }
}

impl PrivilegeGate for OsPrivilege {
    #[cfg(target_os = "windows")]
    fn is_privileged(&self) -> bool {
        // SAFETY: IsUserAnAdmin takes no arguments and only reads the process token.
        unsafe { win::IsUserAnAdmin() != 0 }
    }

    #[cfg(not(target_os = "windows"))]
    fn is_privileged(&self) -> bool {
        false
    }

    #[cfg(target_os = "windows")]
    fn request_escalation(&self) -> Result<(), AppError> {
        let exe = std::env::current_exe()?;
        let params = join_arguments(std::env::args().skip(1));

        let verb = win::wide(std::ffi::OsStr::new("runas"));
        let file = win::wide(exe.as_os_str());
        let params = win::wide(std::ffi::OsStr::new(&params));

        // SAFETY: all string pointers reference NUL-terminated buffers that
        // outlive the call; a null window handle is permitted.
        let result = unsafe {
            win::ShellExecuteW(
                std::ptr::null_mut(),
                verb.as_ptr(),
                file.as_ptr(),
                params.as_ptr(),
                std::ptr::null(),
                win::SW_SHOWNORMAL,
            )
        };
        // Values above 32 indicate success.
        if result as isize > 32 {
            Ok(())
        } else {
            Err(AppError::Privilege(format!(
                "Failed to request elevation (code {})",
                result as isize
            )))
        }
    }

    #[cfg(not(target_os = "windows"))]
    fn request_escalation(&self) -> Result<(), AppError> {
        Err(AppError::Unsupported(
            "Elevation is only implemented on Windows".into(),
        ))
    }
}

/// Rebuild a command line, quoting arguments that contain spaces or quotes.
pub fn join_arguments(args: impl IntoIterator<Item = String>) -> String {
    args.into_iter()
        .map(|arg| {
            if arg.is_empty() || arg.contains([' ', '\t', '"']) {
                format!("\"{}\"", arg.replace('"', "\\\""))
            } else {
                arg
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
