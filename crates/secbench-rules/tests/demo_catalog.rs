//! The demonstration catalog against scripted hosts.

use secbench_core::fakes::{FakeCommandRunner, StaticPolicyExporter};
use secbench_core::{CommandOutput, ComplianceRun, Harness, HarnessConfig, Rule, RuleContext, Status};
use secbench_rules::{demo_catalog, DEMO_TOTAL_POINTS};
use std::sync::Arc;

const HARDENED_POLICY: &str = "[Unicode]\r\nUnicode=yes\r\n[System Access]\r\nMinimumPasswordAge = 1\r\nMaximumPasswordAge = 60\r\nMinimumPasswordLength = 14\r\nPasswordComplexity = 1\r\nPasswordHistorySize = 24\r\nLockoutBadCount = 5\r\nNewAdministratorName = \"corp-admin\"\r\nNewGuestName = \"corp-visitor\"\r\n";

const DEFAULT_POLICY: &str = "[System Access]\r\nMinimumPasswordAge = 0\r\nMaximumPasswordAge = 42\r\nMinimumPasswordLength = 0\r\nPasswordComplexity = 1\r\nPasswordHistorySize = 0\r\nLockoutBadCount = 0\r\nNewAdministratorName = \"Administrator\"\r\nNewGuestName = \"Guest\"\r\n";

fn hardened_host() -> Arc<FakeCommandRunner> {
    let runner = FakeCommandRunner::new();
    let values = [
        ("DisableCAD", "0x0"),
        ("RestrictAnonymousSAM", "0x1"),
        ("LmCompatibilityLevel", "0x5"),
        ("FilterAdministratorToken", "0x1"),
        ("EnableFirewall", "0x1"),
        ("Start", "0x4"),
        ("NoDriveTypeAutoRun", "0xff"),
    ];
    for (value, data) in values {
        runner.respond(
            &format!("reg query {} /v {value}", key_of(value)),
            CommandOutput::ok(format!("\r\n{}\r\n    {value}    REG_DWORD    {data}\r\n", key_of(value))),
        );
    }
    runner.respond(
        "auditpol /get /subcategory:Credential Validation",
        CommandOutput::ok("System audit policy\r\nCategory/Subcategory   Setting\r\nAccount Logon\r\n  Credential Validation   Success and Failure\r\n"),
    );
    Arc::new(runner)
}

fn key_of(value: &str) -> &'static str {
    match value {
        "DisableCAD" | "FilterAdministratorToken" => {
            r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\Policies\System"
        }
        "RestrictAnonymousSAM" | "LmCompatibilityLevel" => r"HKLM\SYSTEM\CurrentControlSet\Control\Lsa",
        "EnableFirewall" => r"HKLM\SOFTWARE\Policies\Microsoft\WindowsFirewall\DomainProfile",
        "Start" => r"HKLM\SYSTEM\CurrentControlSet\Services\mrxsmb10",
        _ => r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\Policies\Explorer",
    }
}

#[tokio::test]
async fn test_hardened_host_scores_every_shipped_rule() {
    let catalog = demo_catalog().expect("catalog");
    let exporter = Arc::new(StaticPolicyExporter::ok(HARDENED_POLICY));
    let ctx = RuleContext::new(hardened_host(), exporter.clone());
    let harness = Harness::new(ctx, HarnessConfig::default());

    let outcome = ComplianceRun::execute_on_host(&catalog, &harness, "HARDENED".to_string()).await;
    let aggregate = &outcome.aggregate;

    let not_compliant: Vec<(&str, Status, &str)> = aggregate
        .results()
        .iter()
        .filter(|r| r.status() != Status::Compliant)
        .map(|r| (r.id(), r.status(), r.details()))
        .collect();
    assert!(not_compliant.is_empty(), "unexpected results: {not_compliant:?}");

    assert_eq!(aggregate.compliant_count() as usize, catalog.len());
    assert_eq!(aggregate.total_possible_points(), DEMO_TOTAL_POINTS);
    assert!(aggregate.percentage() < 100.0);
    assert_eq!(exporter.calls(), 1);
}

#[tokio::test]
async fn test_default_host_mixes_statuses() {
    let catalog = demo_catalog().expect("catalog");
    let runner = Arc::new(FakeCommandRunner::new());
    // Registry answers never name the queried value; auditpol is unscripted.
    runner.respond_prefix(
        "reg query",
        CommandOutput::ok("    SomethingElse    REG_DWORD    0x2\r\n"),
    );
    let ctx = RuleContext::new(runner, Arc::new(StaticPolicyExporter::ok(DEFAULT_POLICY)));
    let harness = Harness::new(ctx, HarnessConfig::default());

    let outcome = ComplianceRun::execute(&catalog, &harness).await;
    let aggregate = &outcome.aggregate;

    let status_of = |id: &str| {
        aggregate
            .results()
            .iter()
            .find(|r| r.id() == id)
            .map(|r| r.status())
    };

    assert_eq!(status_of("1.1.4"), Some(Status::NonCompliant));
    assert_eq!(status_of("1.1.5"), Some(Status::Compliant));
    assert_eq!(status_of("2.3.1.5"), Some(Status::NonCompliant));
    assert_eq!(status_of("18.9.8.3"), Some(Status::Error));
    assert_eq!(status_of("17.1.1"), Some(Status::Error));

    let ids: Vec<&str> = aggregate.results().iter().map(|r| r.id()).collect();
    let expected: Vec<&str> = catalog.rules().iter().map(|r| r.id()).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_failed_policy_export_only_affects_policy_rules() {
    let catalog = demo_catalog().expect("catalog");
    let ctx = RuleContext::new(
        hardened_host(),
        Arc::new(StaticPolicyExporter::failing("secedit exited with 1")),
    );
    let harness = Harness::new(ctx, HarnessConfig::sequential());

    let outcome = ComplianceRun::execute(&catalog, &harness).await;
    let aggregate = &outcome.aggregate;

    assert_eq!(aggregate.error_count(), 8);
    assert_eq!(aggregate.compliant_count(), 8);
}
