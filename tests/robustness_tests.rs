use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::json;
use std::path::Path;
use std::process::Command;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn checkout(server: &MockServer, bookings: &Path) -> Command {
    let mut cmd = Command::new(cargo_bin!("booking-checkout"));
    cmd.env("CHECKOUT_FIAT_API", server.uri())
        .env("CHECKOUT_CRYPTO_API", server.uri())
        .env("CHECKOUT_EXCHANGE_API", server.uri())
        .env_remove("RUST_LOG")
        .arg("--bookings")
        .arg(bookings);
    cmd
}

async fn verifies_as(server: &MockServer, status: &str) {
    Mock::given(method("GET"))
        .and(path("/payments/verify/FIAT_bk-1_1700000000000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": status})))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_malformed_booking_rows_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let bookings = dir.path().join("bookings.csv");
    let mut wtr = csv::Writer::from_path(&bookings).unwrap();
    wtr.write_record(["id", "amount", "currency", "status", "payment_status", "reference"])
        .unwrap();
    // Valid booking
    wtr.write_record(["bk-1", "120", "USD", "pending", "pending", ""])
        .unwrap();
    // Unknown status
    wtr.write_record(["bk-2", "50", "USD", "archived", "pending", ""])
        .unwrap();
    // Negative amount
    wtr.write_record(["bk-3", "-5", "USD", "pending", "pending", ""])
        .unwrap();
    // Id with a separator that would break references
    wtr.write_record(["bk_4", "10", "USD", "pending", "pending", ""])
        .unwrap();
    // Valid booking again
    wtr.write_record(["bk-5", "75", "NGN", "pending", "pending", ""])
        .unwrap();
    wtr.flush().unwrap();
    drop(wtr);

    let server = MockServer::start().await;
    verifies_as(&server, "success").await;

    checkout(&server, &bookings)
        .arg("finalize")
        .arg("FIAT_bk-1_1700000000000")
        .assert()
        .success()
        .stderr(predicate::str::contains("Error reading booking"))
        .stdout(predicate::str::contains(
            "bk-1,120,USD,confirmed,completed,FIAT_bk-1_1700000000000",
        ))
        .stdout(predicate::str::contains("bk-5,75,NGN,pending,pending,"))
        .stdout(predicate::str::contains("bk-2").not())
        .stdout(predicate::str::contains("bk-3").not());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_currency_code_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let bookings = dir.path().join("bookings.csv");
    let mut wtr = csv::Writer::from_path(&bookings).unwrap();
    wtr.write_record(["id", "amount", "currency", "status", "payment_status", "reference"])
        .unwrap();
    wtr.write_record(["bk-1", "120", "US Dollar", "pending", "pending", ""])
        .unwrap();
    wtr.flush().unwrap();
    drop(wtr);

    let server = MockServer::start().await;
    verifies_as(&server, "success").await;

    checkout(&server, &bookings)
        .arg("finalize")
        .arg("FIAT_bk-1_1700000000000")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error reading booking"))
        .stderr(predicate::str::contains("not found"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_malformed_reference_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    checkout(&server, Path::new("tests/fixtures/bookings.csv"))
        .arg("finalize")
        .arg("WIRE_bk-1_1700000000000")
        .assert()
        .failure()
        .stderr(predicate::str::contains("WIRE_bk-1_1700000000000"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_contact_is_rejected_before_any_gateway_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    checkout(&server, Path::new("tests/fixtures/bookings.csv"))
        .arg("fiat")
        .arg("bk-1")
        .arg("--email")
        .arg("ada.example.com")
        .arg("--name")
        .arg("Ada Obi")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a valid email address"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_verification_outage_fails_the_command() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/payments/verify/FIAT_bk-1_1700000000000"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    checkout(&server, Path::new("tests/fixtures/bookings.csv"))
        .arg("finalize")
        .arg("FIAT_bk-1_1700000000000")
        .assert()
        .failure()
        .stderr(predicate::str::contains("503"));
}
