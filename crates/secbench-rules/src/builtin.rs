//! Demonstration catalog: a small slice of a CIS-style Windows benchmark.
//!
//! The point total belongs to the benchmark version, not to the number of
//! rules shipped here, so a partial catalog scores against the full total.

use crate::command::{CommandExpectation, CommandRule};
use crate::expect::NumericExpectation::{AtLeast, AtMost, Equals};
use crate::policy::{PolicyExpectation, SecurityPolicyRule};
use crate::registry::{RegistryExpectation, RegistryValueRule};
use secbench_core::{Catalog, Rule};
use std::sync::Arc;

pub const DEMO_CATALOG_NAME: &str = "CIS Microsoft Windows (demonstration subset)";
pub const DEMO_CATALOG_VERSION: &str = "3.0.0-demo";
pub const DEMO_TOTAL_POINTS: u32 = 18;

const LSA: &str = r"HKLM\SYSTEM\CurrentControlSet\Control\Lsa";
const POLICIES_SYSTEM: &str = r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\Policies\System";
const POLICIES_EXPLORER: &str = r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\Policies\Explorer";

fn policy(id: &str, description: &str, key: &str, expected: PolicyExpectation) -> Arc<dyn Rule> {
    Arc::new(SecurityPolicyRule::new(id, description, key, expected))
}

fn dword(id: &str, description: &str, key: &str, value: &str, expected: u32) -> RegistryValueRule {
    RegistryValueRule::new(
        id,
        description,
        key,
        value,
        RegistryExpectation::Number(Equals(i64::from(expected))),
    )
}

/// Build the demonstration catalog in benchmark order.
pub fn demo_catalog() -> secbench_core::Result<Catalog> {
    let rules: Vec<Arc<dyn Rule>> = vec![
        policy(
            "1.1.1",
            "Enforce password history: 24 or more passwords",
            "PasswordHistorySize",
            PolicyExpectation::Number(AtLeast(24)),
        ),
        policy(
            "1.1.2",
            "Maximum password age: 365 or fewer days, but not 0",
            "MaximumPasswordAge",
            PolicyExpectation::NonZero(AtMost(365)),
        ),
        policy(
            "1.1.3",
            "Minimum password age: 1 or more days",
            "MinimumPasswordAge",
            PolicyExpectation::Number(AtLeast(1)),
        ),
        policy(
            "1.1.4",
            "Minimum password length: 14 or more characters",
            "MinimumPasswordLength",
            PolicyExpectation::Number(AtLeast(14)),
        ),
        policy(
            "1.1.5",
            "Password must meet complexity requirements: Enabled",
            "PasswordComplexity",
            PolicyExpectation::Number(Equals(1)),
        ),
        policy(
            "1.2.2",
            "Account lockout threshold: 5 or fewer invalid attempts, but not 0",
            "LockoutBadCount",
            PolicyExpectation::NonZero(AtMost(5)),
        ),
        policy(
            "2.3.1.5",
            "Accounts: Rename administrator account",
            "NewAdministratorName",
            PolicyExpectation::TextNot("Administrator".to_string()),
        ),
        policy(
            "2.3.1.6",
            "Accounts: Rename guest account",
            "NewGuestName",
            PolicyExpectation::TextNot("Guest".to_string()),
        ),
        Arc::new(dword(
            "2.3.7.1",
            "Interactive logon: Do not require CTRL+ALT+DEL: Disabled",
            POLICIES_SYSTEM,
            "DisableCAD",
            0,
        )),
        Arc::new(
            dword(
                "2.3.10.2",
                "Network access: Do not allow anonymous enumeration of SAM accounts: Enabled",
                LSA,
                "RestrictAnonymousSAM",
                1,
            )
            .absent_is_compliant(),
        ),
        Arc::new(dword(
            "2.3.11.7",
            "Network security: LAN Manager authentication level: NTLMv2 only, refuse LM & NTLM",
            LSA,
            "LmCompatibilityLevel",
            5,
        )),
        Arc::new(dword(
            "2.3.17.1",
            "User Account Control: Admin Approval Mode for the built-in Administrator: Enabled",
            POLICIES_SYSTEM,
            "FilterAdministratorToken",
            1,
        )),
        Arc::new(dword(
            "9.1.1",
            "Windows Firewall: Domain: Firewall state: On",
            r"HKLM\SOFTWARE\Policies\Microsoft\WindowsFirewall\DomainProfile",
            "EnableFirewall",
            1,
        )),
        Arc::new(dword(
            "18.3.2",
            "Configure SMB v1 client driver: Disable driver",
            r"HKLM\SYSTEM\CurrentControlSet\Services\mrxsmb10",
            "Start",
            4,
        )),
        Arc::new(dword(
            "18.9.8.3",
            "Turn off Autoplay: All drives",
            POLICIES_EXPLORER,
            "NoDriveTypeAutoRun",
            255,
        )),
        Arc::new(CommandRule::new(
            "17.1.1",
            "Audit Credential Validation: Success and Failure",
            "auditpol",
            &["/get", "/subcategory:Credential Validation"],
            CommandExpectation::StdoutContains("Success and Failure".to_string()),
        )),
    ];

    let mut catalog = Catalog::new(DEMO_CATALOG_NAME, DEMO_CATALOG_VERSION, DEMO_TOTAL_POINTS);
    for rule in rules {
        catalog.register(rule)?;
    }
    Ok(catalog)
}
