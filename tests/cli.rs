use assert_cmd::assert::OutputAssertExt;
use assert_cmd::cargo::CommandCargoExt;
use httpmock::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

const OFFER_PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>Condo</title>
<script type="application/ld+json">
{"@type": "Offer", "price": 250000, "priceCurrency": "USD",
 "floorSize": {"value": 80, "unitText": "m2"}}
</script></head>
<body><h1>Condo downtown</h1></body></html>"#;

fn scout_cmd() -> Command {
    let mut cmd = Command::cargo_bin("listing-scout").unwrap();
    cmd.env_remove("LISTING_SCOUT_TOKEN");
    cmd
}

fn write_page(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("page.html");
    fs::write(&path, OFFER_PAGE).unwrap();
    path
}

#[test]
fn extracts_listing_from_html_file() {
    let dir = TempDir::new().unwrap();
    let path = write_page(&dir);

    scout_cmd()
        .arg("https://homes.example.com/condo/1")
        .arg("--html")
        .arg(&path)
        .arg("--no-probe")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""currency":"USD""#))
        .stdout(predicate::str::contains(r#""amount":3125.0"#))
        .stdout(predicate::str::contains(r#""method":"structured-metadata""#))
        .stdout(predicate::str::contains(r#""url":"https://homes.example.com/condo/1""#));
}

#[test]
fn fetches_page_over_http() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/condo/2");
        then.status(200)
            .header("content-type", "text/html; charset=utf-8")
            .body(OFFER_PAGE);
    });

    scout_cmd()
        .arg(server.url("/condo/2"))
        .arg("--no-probe")
        .arg("--pretty")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""title": "Condo downtown""#));

    mock.assert();
}

#[test]
fn remote_mode_without_token_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_page(&dir);

    scout_cmd()
        .arg("https://homes.example.com/condo/1")
        .arg("--html")
        .arg(&path)
        .arg("--remote")
        .arg("http://127.0.0.1:1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no credential"));
}

#[test]
fn remote_mode_stamps_hybrid() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path("/api/parse-ad")
            .header("authorization", "Bearer t0ken");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"title": "Condo from service"}"#);
    });

    let dir = TempDir::new().unwrap();
    let path = write_page(&dir);

    scout_cmd()
        .env("LISTING_SCOUT_TOKEN", "Bearer t0ken")
        .arg("https://homes.example.com/condo/1")
        .arg("--html")
        .arg(&path)
        .arg("--remote")
        .arg(server.base_url())
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""title":"Condo from service""#))
        .stdout(predicate::str::contains(r#""method":"hybrid""#));
}
