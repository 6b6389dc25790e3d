//! PowerShell scripts for the two managed rules.
//!
//! Every script ends by printing a single token (`OK`, `EXISTS` or `NONE`) that
//! the caller compares against; anything else counts as failure.

use std::net::IpAddr;

use crate::config;

pub const RESPONSE_OK: &str = "OK";
pub const RESPONSE_EXISTS: &str = "EXISTS";
pub const RESPONSE_NONE: &str = "NONE";

/// Remove stale managed rules, then create fresh inbound and outbound blocks.
pub fn create_script(ips: &[String]) -> String {
    let ip_list = ips
        .iter()
        .map(|ip| format!("\"{ip}\""))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "$ErrorActionPreference='SilentlyContinue';\
         Remove-NetFirewallRule -Name '{out}' 2>$null;\
         Remove-NetFirewallRule -Name '{inb}' 2>$null;\
         $ErrorActionPreference='Stop';\
         New-NetFirewallRule -Name '{out}' -DisplayName 'SaveBlocker Block Out' \
         -Direction Outbound -Action Block -RemoteAddress @({ip_list}) -Protocol Any -Enabled True >$null;\
         New-NetFirewallRule -Name '{inb}' -DisplayName 'SaveBlocker Block In' \
         -Direction Inbound -Action Block -RemoteAddress @({ip_list}) -Protocol Any -Enabled True >$null;\
         Write-Output '{RESPONSE_OK}'",
        out = config::RULE_OUT,
        inb = config::RULE_IN,
    )
}

/// Delete both managed rules; a missing rule is not an error.
pub fn remove_script() -> String {
    format!(
        "$ErrorActionPreference='SilentlyContinue';\
         Remove-NetFirewallRule -Name '{out}' 2>$null;\
         Remove-NetFirewallRule -Name '{inb}' 2>$null;\
         Write-Output '{RESPONSE_OK}'",
        out = config::RULE_OUT,
        inb = config::RULE_IN,
    )
}

/// Print `EXISTS` when both managed rules are present, `NONE` otherwise.
pub fn check_script() -> String {
    format!(
        "$out = Get-NetFirewallRule -Name '{out}' -ErrorAction SilentlyContinue;\
         $in = Get-NetFirewallRule -Name '{inb}' -ErrorAction SilentlyContinue;\
         if ($out -and $in) {{ Write-Output '{RESPONSE_EXISTS}' }} else {{ Write-Output '{RESPONSE_NONE}' }}",
        out = config::RULE_OUT,
        inb = config::RULE_IN,
    )
}

/// Keep only entries the firewall accepts as a remote address: a single
/// address, a CIDR block, or an `a-b` range of the same family.
pub fn sanitize_addresses(ips: &[String]) -> Vec<String> {
    ips.iter()
        .map(|ip| ip.trim())
        .filter(|ip| {
            let ok = is_remote_address(ip);
            if !ok {
                tracing::warn!("Skipping invalid blocked address '{ip}'");
            }
            ok
        })
        .map(str::to_string)
        .collect()
}

fn is_remote_address(entry: &str) -> bool {
    if let Some((addr, prefix)) = entry.split_once('/') {
        let Ok(addr) = addr.parse::<IpAddr>() else {
            return false;
        };
        let max = if addr.is_ipv4() { 32 } else { 128 };
        return prefix.parse::<u8>().is_ok_and(|p| p <= max);
    }
    if let Some((start, end)) = entry.split_once('-') {
        return match (start.parse::<IpAddr>(), end.parse::<IpAddr>()) {
            (Ok(a), Ok(b)) => a.is_ipv4() == b.is_ipv4(),
            _ => false,
        };
    }
    entry.parse::<IpAddr>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_create_script_removes_before_creating() {
        let script = create_script(&owned(&["1.2.3.4"]));
        let first_new = script.find("New-NetFirewallRule").unwrap();
        let last_remove = script.rfind("Remove-NetFirewallRule").unwrap();
        assert!(last_remove < first_new);
        assert!(script.ends_with("Write-Output 'OK'"));
    }

    #[test]
    fn test_create_script_lists_every_address_in_both_rules() {
        let script = create_script(&owned(&["1.2.3.4", "10.0.0.0/8"]));
        assert_eq!(script.matches("@(\"1.2.3.4\",\"10.0.0.0/8\")").count(), 2);
        assert!(script.contains("-Direction Outbound"));
        assert!(script.contains("-Direction Inbound"));
    }

    #[test]
    fn test_scripts_target_managed_names_only() {
        for script in [remove_script(), check_script()] {
            assert!(script.contains(config::RULE_OUT));
            assert!(script.contains(config::RULE_IN));
        }
    }

    #[test]
    fn test_check_script_prints_both_tokens() {
        let script = check_script();
        assert!(script.contains("Write-Output 'EXISTS'"));
        assert!(script.contains("Write-Output 'NONE'"));
    }

    #[test]
    fn test_sanitize_accepts_addresses_ranges_and_blocks() {
        let input = owned(&["192.81.241.171", " ::1 ", "10.0.0.0/8", "1.1.1.1-1.1.1.9"]);
        assert_eq!(
            sanitize_addresses(&input),
            owned(&["192.81.241.171", "::1", "10.0.0.0/8", "1.1.1.1-1.1.1.9"])
        );
    }

    #[test]
    fn test_sanitize_drops_injection_and_garbage() {
        let input = owned(&[
            "1.2.3.4'; Remove-Item C:\\ -Recurse; '",
            "example.com",
            "10.0.0.0/33",
            "1.1.1.1-::1",
            "",
        ]);
        assert!(sanitize_addresses(&input).is_empty());
    }
}
