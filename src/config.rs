//! Centralized runtime constants for SaveBlocker.
//!
//! All defaults, rule names, tones, and exit codes are collected here so they can
//! be found and adjusted in a single place rather than scattered across modules.

/// Human-readable application name used in the banner and logs.
pub const APP_NAME: &str = "SaveBlocker";

/// Remote address blocked when the settings carry no usable address.
pub const DEFAULT_IP: &str = "192.81.241.171";

/// Minimum interval between two accepted toggle requests (seconds).
pub const DEFAULT_DEBOUNCE_SECS: f64 = 0.5;

/// Upper bound on a single firewall command (seconds).
pub const DEFAULT_FIREWALL_TIMEOUT_SECS: u64 = 5;

/// Number of worker threads in the toggle pool.
pub const WORKER_THREADS: usize = 4;

/// Capacity of the inbound event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Reserved name of the managed outbound block rule.
pub const RULE_OUT: &str = "SaveBlocker_Block_Out";

/// Reserved name of the managed inbound block rule.
pub const RULE_IN: &str = "SaveBlocker_Block_In";

/// Environment variable overriding the settings directory.
pub const HOME_ENV_VAR: &str = "SAVEBLOCKER_HOME";

/// Directory created under the user's home when no override is given.
pub const HOME_DIR_NAME: &str = ".saveblocker";

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const LOG_FILE_NAME: &str = "app.log";

/// Tone played when blocking becomes active (Hz, ms).
pub const ACTIVATE_CUE: (u32, u32) = (800, 150);

/// Tone played when blocking is removed (Hz, ms).
pub const DEACTIVATE_CUE: (u32, u32) = (400, 150);

/// Process exit codes.
pub const EXIT_OK: u8 = 0;
pub const EXIT_FATAL: u8 = 1;
pub const EXIT_UNSUPPORTED: u8 = 2;
pub const EXIT_PRIVILEGE_REQUIRED: u8 = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_names_are_distinct() {
        assert_ne!(RULE_OUT, RULE_IN);
    }

    #[test]
    fn test_default_ip_parses() {
        assert!(DEFAULT_IP.parse::<std::net::IpAddr>().is_ok());
    }

    /// Uses const assertions to avoid clippy::assertions_on_constants.
    #[test]
    fn test_all_limits_positive() {
        const _: () = assert!(DEFAULT_FIREWALL_TIMEOUT_SECS > 0);
        const _: () = assert!(WORKER_THREADS > 0);
        const _: () = assert!(EVENT_CHANNEL_CAPACITY > 0);
        // f64 cannot use const assert
        assert!(DEFAULT_DEBOUNCE_SECS > 0.0);
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        let codes = [EXIT_OK, EXIT_FATAL, EXIT_UNSUPPORTED, EXIT_PRIVILEGE_REQUIRED];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
