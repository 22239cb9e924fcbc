//! Integration tests for the CLI interface
//!
//! Runs the binary in a scratch directory with an empty environment

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const INPUT: &str = "\
Number,Assignment group,Impact,Due date,Email
INC001,Network,1 - High,2024-05-01 10:00:00,net@example.com
INC002,Storage,3 - Low,2024-06-04,store@example.com
INC003,Storage,3 - Low,soon,store@example.com
";

fn snow_report(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("snow-report").unwrap();
    cmd.env_clear().current_dir(dir.path());
    cmd
}

#[test]
fn test_cli_help_flag() {
    let dir = TempDir::new().unwrap();
    snow_report(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("report"))
        .stdout(predicate::str::contains("fetch"));
}

#[test]
fn test_invalid_command() {
    let dir = TempDir::new().unwrap();
    snow_report(&dir)
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn test_report_writes_outputs() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("report.csv"), INPUT).unwrap();

    snow_report(&dir)
        .args(["report", "--now", "2024-06-01T00:00:00Z"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 rows, 0 skipped, 1 unparseable timestamps"))
        .stdout(predicate::str::contains("2 recipients"));

    let html = std::fs::read_to_string(dir.path().join("report.html")).unwrap();
    assert!(html.contains("Overdue (1)"));
    assert!(html.contains("Due in next 10 days (1)"));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("emails.txt")).unwrap(),
        "net@example.com;store@example.com"
    );
}

#[test]
fn test_report_paths_from_config_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("tickets.csv"), INPUT).unwrap();
    std::fs::write(
        dir.path().join("snow-report.toml"),
        r#"
[report]
input = "tickets.csv"
output = "weekly.html"
emails_output = "to.txt"
email_separator = ","
windows = [5]
"#,
    )
    .unwrap();

    snow_report(&dir)
        .args(["report", "--now", "2024-06-01T00:00:00Z"])
        .assert()
        .success();

    let html = std::fs::read_to_string(dir.path().join("weekly.html")).unwrap();
    assert!(html.contains("Due in next 5 days (1)"));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("to.txt")).unwrap(),
        "net@example.com,store@example.com"
    );
}

#[test]
fn test_report_missing_input_is_storage_error() {
    let dir = TempDir::new().unwrap();
    snow_report(&dir)
        .args(["report", "--input", "absent.csv"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("absent.csv"));
}

#[test]
fn test_report_rejects_bad_reference_time() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("report.csv"), INPUT).unwrap();
    snow_report(&dir)
        .args(["report", "--now", "tomorrow"])
        .assert()
        .code(2);
}

#[test]
fn test_unknown_config_key_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("snow-report.toml"),
        "[report]\ncolour = \"red\"\n",
    )
    .unwrap();

    snow_report(&dir).arg("report").assert().code(2);
}

#[test]
fn test_explicit_config_file_must_exist() {
    let dir = TempDir::new().unwrap();
    snow_report(&dir)
        .args(["--config", "missing.toml", "report"])
        .assert()
        .code(2);
}

#[test]
fn test_fetch_without_settings_fails_before_network() {
    let dir = TempDir::new().unwrap();
    snow_report(&dir)
        .arg("fetch")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("sso.homepage_url"));
}

#[test]
fn test_fetch_without_password_fails() {
    let dir = TempDir::new().unwrap();
    snow_report(&dir)
        .arg("fetch")
        .env("SNOW_HOMEPAGE_URL", "https://svc.example.com/navpage.do")
        .env("SNOW_USER_EMAIL", "user@example.com")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("sso.password"));
}

#[test]
fn test_extract_writes_csv() {
    let dir = TempDir::new().unwrap();
    let report = serde_json::json!({
        "widgets": [{
            "content": "<table><thead><tr><th>Number</th><th>Impact</th></tr></thead>\
                <tbody><tr><td>INC1</td><td>High</td></tr>\
                <tr><td>INC2</td><td>Low</td></tr></tbody></table>"
        }]
    });
    std::fs::write(dir.path().join("r.json"), report.to_string()).unwrap();

    snow_report(&dir)
        .args(["extract", "--json", "r.json", "--csv", "r.csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 rows written"));

    assert_eq!(
        std::fs::read_to_string(dir.path().join("r.csv")).unwrap(),
        "Number,Impact\nINC1,High\nINC2,Low\n"
    );
}

#[test]
fn test_saml_request_encode_then_decode() {
    let dir = TempDir::new().unwrap();
    let output = snow_report(&dir)
        .args([
            "saml-request",
            "encode",
            "--issuer",
            "https://svc.example.com",
            "--acs-url",
            "https://svc.example.com/navpage.do",
            "--destination",
            "https://login.example.com/tenant-1/saml2",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let encoded = String::from_utf8(output.stdout).unwrap();

    snow_report(&dir)
        .args(["saml-request", "decode", encoded.trim()])
        .assert()
        .success()
        .stdout(predicate::str::contains("<saml2:Issuer"))
        .stdout(predicate::str::contains("https://svc.example.com</saml2:Issuer>"))
        .stdout(predicate::str::contains(
            r#"Destination="https://login.example.com/tenant-1/saml2""#,
        ));
}

const CHANGES: &str = "\
Change ID,Summary,Assignee,Impact,Risk,Date,Tags
CHG1,Swap core switch,Ana,High,Medium,2024-06-08,Call_out
CHG2,Patch web tier,Ben,Low,Low,2024-06-08,
";

#[test]
fn test_changes_writes_summary_page() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("extracted_output.csv"), CHANGES).unwrap();

    snow_report(&dir)
        .args(["changes", "--date", "2024-06-05"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Weekend Change Note - 2024-06-08"))
        .stdout(predicate::str::contains("1 call-out, 1 standard changes"));

    let html = std::fs::read_to_string(dir.path().join("change-summary.html")).unwrap();
    assert!(html.contains("<h3>Critical Changes (Call Out Required)</h3>"));
    assert!(html.contains("<summary>Standard Changes (1)</summary>"));
    assert!(!html.contains("<th><p><strong>Tags</strong></p></th>"));
}

#[test]
fn test_changes_storage_format() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("weekend.csv"), CHANGES).unwrap();

    snow_report(&dir)
        .args([
            "changes",
            "--input",
            "weekend.csv",
            "--output",
            "page.xml",
            "--format",
            "storage",
            "--date",
            "2024-06-08",
        ])
        .assert()
        .success();

    let body = std::fs::read_to_string(dir.path().join("page.xml")).unwrap();
    assert!(body.starts_with("<h2>Weekend Change Summary</h2>"));
    assert!(body.contains(r#"<ac:structured-macro ac:name="expand" ac:schema-version="1">"#));
}

#[test]
fn test_changes_missing_columns_is_validation_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("extracted_output.csv"),
        "Change ID,Summary\nCHG1,x\n",
    )
    .unwrap();

    snow_report(&dir)
        .args(["changes", "--date", "2024-06-05"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("Assignee"))
        .stderr(predicate::str::contains("Tags"));
}
