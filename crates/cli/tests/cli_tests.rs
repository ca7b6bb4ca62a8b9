//! CLI integration tests
use predicates::prelude::*;
use tempfile::TempDir;

const MONOTARO_URL: &str = "https://www.monotaro.com/p/4012/4608/";
const AMAZON_URL: &str = "https://www.amazon.co.jp/dp/B01N0QO5FT";

fn cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("chumon");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn get_site_fixture_path(site: &str, name: &str) -> String {
    format!("../../tests/fixtures/sites/{}/{}", site, name)
}

fn monotaro_page() -> String {
    get_site_fixture_path("monotaro", "product.html")
}

#[test]
fn test_cli_dry_run_text() {
    cmd()
        .args(["--dry-run", "--page", &monotaro_page(), &format!("{} 3", MONOTARO_URL)])
        .assert()
        .success()
        .stdout(predicate::str::contains("メーカー\t注文コード"))
        .stdout(predicate::str::contains("モノタロウ\t40124608"))
        .stdout(predicate::str::contains("M2.5×16\t1180\t3\t3540"));
}

#[test]
fn test_cli_json_format() {
    let output = cmd()
        .args(["--dry-run", "-f", "json", "--page", &get_site_fixture_path("amazon", "product.html"), AMAZON_URL])
        .output()
        .unwrap();
    assert!(output.status.success());

    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let record = &records[0];
    assert_eq!(record["supplier"], "Amazon");
    assert_eq!(record["item_code"], "B01N0QO5FT");
    assert_eq!(record["price_incl_tax"], 1080);
    assert_eq!(record["price_excl_tax"], 982);
    assert_eq!(record["quantity"], 1);
}

#[test]
fn test_cli_tax_rate_override() {
    cmd()
        .args([
            "--dry-run",
            "--tax-rate",
            "0.08",
            "--page",
            &get_site_fixture_path("amazon", "product.html"),
            AMAZON_URL,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("MPA-CC10BK\t1000\t1\t1000"));
}

#[test]
fn test_cli_writes_workbook() {
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("order.xlsx");

    cmd()
        .args(["-o", output.to_str().unwrap(), "--page", &monotaro_page()])
        .arg(format!("{} | 個数: 2", MONOTARO_URL))
        .assert()
        .success()
        .stderr(predicate::str::contains("Created"));

    let book = umya_spreadsheet::reader::xlsx::read(&output).unwrap();
    let sheet = book.get_sheet_by_name("注文内容").unwrap();
    assert_eq!(sheet.get_value("A1"), "メーカー");
    assert_eq!(sheet.get_value("B2"), "40124608");
    assert_eq!(sheet.get_value("F2"), "2");
    assert_eq!(sheet.get_value("G2"), "2360");
    assert_eq!(sheet.get_value("H2"), MONOTARO_URL);
}

#[test]
fn test_cli_append_and_sheet() {
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("order.xlsx");
    let output = output.to_str().unwrap();

    for _ in 0..2 {
        cmd()
            .args(["-o", output, "--append", "--sheet", "発注", "--page", &monotaro_page(), MONOTARO_URL])
            .assert()
            .success();
    }

    let book = umya_spreadsheet::reader::xlsx::read(output).unwrap();
    let sheet = book.get_sheet_by_name("発注").unwrap();
    assert_eq!(sheet.get_value("B2"), "40124608");
    assert_eq!(sheet.get_value("B3"), "40124608");
    assert_eq!(sheet.get_value("B4"), "");
}

#[test]
fn test_cli_input_file() {
    let tmp = TempDir::new().unwrap();
    let list = tmp.path().join("urls.txt");
    std::fs::write(&list, format!("# order\n{}\n\n{},5\n", MONOTARO_URL, MONOTARO_URL)).unwrap();

    cmd()
        .args(["--dry-run", "-i", list.to_str().unwrap(), "--page", &monotaro_page()])
        .assert()
        .success()
        .stderr(predicate::str::contains("[2/2]"))
        .stdout(predicate::str::contains("\t5\t5900\t"));
}

#[test]
fn test_cli_stdin_input() {
    cmd()
        .args(["--dry-run", "-i", "-", "--page", &monotaro_page()])
        .write_stdin(format!("{} 4\n", MONOTARO_URL))
        .assert()
        .success()
        .stdout(predicate::str::contains("\t4\t4720\t"));
}

#[test]
fn test_cli_unknown_site_is_skipped() {
    cmd()
        .args(["--dry-run", "--page", &monotaro_page(), "https://www.rakuten.co.jp/item/1", MONOTARO_URL])
        .assert()
        .success()
        .stderr(predicate::str::contains("unsupported site"))
        .stdout(predicate::str::contains("40124608"));
}

#[test]
fn test_cli_only_unknown_sites_fails() {
    cmd()
        .args(["--dry-run", "--page", &monotaro_page(), "https://www.rakuten.co.jp/item/1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No records accepted"));
}

#[test]
fn test_cli_empty_page_fails_fast() {
    let tmp = TempDir::new().unwrap();
    let blank = tmp.path().join("blank.html");
    std::fs::write(&blank, "   \n").unwrap();

    cmd()
        .args(["--dry-run", "--page", blank.to_str().unwrap(), MONOTARO_URL, MONOTARO_URL])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not started"));
}

#[test]
fn test_cli_bad_quantity() {
    cmd()
        .args(["--dry-run", "--page", &monotaro_page(), &format!("{} 0", MONOTARO_URL)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid query"));
}

#[test]
fn test_cli_output_required() {
    cmd()
        .args(["--page", &monotaro_page(), MONOTARO_URL])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--output"));
}

#[test]
fn test_cli_no_queries() {
    cmd().arg("--dry-run").assert().failure().stderr(predicate::str::contains("No queries"));
}

#[test]
fn test_cli_invalid_sheet_name() {
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("order.xlsx");

    cmd()
        .args(["-o", output.to_str().unwrap(), "--sheet", "a/b", "--page", &monotaro_page(), MONOTARO_URL])
        .assert()
        .failure();
    assert!(!output.exists());
}

#[test]
fn test_cli_config_file() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("config.txt");
    std::fs::write(&config, "tax_rate: 0.08\n").unwrap();

    cmd()
        .args(["--dry-run", "--config", config.to_str().unwrap()])
        .args(["--page", &get_site_fixture_path("amazon", "product.html"), AMAZON_URL])
        .assert()
        .success()
        .stdout(predicate::str::contains("\t1000\t1\t1000\t"));
}

#[test]
fn test_cli_missing_config_file() {
    cmd()
        .args(["--dry-run", "--config", "/nonexistent/chumon.txt", "--page", &monotaro_page(), MONOTARO_URL])
        .assert()
        .failure()
        .stderr(predicate::str::contains("settings"));
}

#[test]
fn test_cli_verbose() {
    cmd()
        .args(["-v", "--dry-run", "--page", &monotaro_page(), MONOTARO_URL])
        .assert()
        .success()
        .stderr(predicate::str::contains("chumon"))
        .stderr(predicate::str::contains("starting batch"))
        .stderr(predicate::str::contains("batch finished"));
}

#[test]
fn test_cli_completions() {
    cmd()
        .args(["--completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("chumon"));
}
