use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn listings_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "id, seller, price").unwrap();
    writeln!(file, "10, 2, 10000").unwrap();
    file
}

fn users_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "id, blocked, kyc").unwrap();
    writeln!(file, "1, false, APPROVED").unwrap();
    writeln!(file, "2, false, APPROVED").unwrap();
    file
}

fn run(commands: &NamedTempFile, listings: &NamedTempFile, users: &NamedTempFile) -> Command {
    let mut cmd = Command::new(cargo_bin!("cauris"));
    cmd.arg(commands.path())
        .arg("--listings")
        .arg(listings.path())
        .arg("--users")
        .arg(users.path());
    cmd
}

#[test]
fn capture_flow_balances() {
    let mut commands = NamedTempFile::new().unwrap();
    writeln!(commands, "op, user, listing, intent, key").unwrap();
    writeln!(commands, "create, 1, 10, , order-1").unwrap();
    writeln!(commands, "confirm, , , 1, ").unwrap();
    writeln!(commands, "capture, , , 1, ").unwrap();

    let listings = listings_csv();
    let users = users_csv();

    // 10000 CFA price: 500 to fees, 9500 to the seller, escrow flat.
    run(&commands, &listings, &users)
        .assert()
        .success()
        .stdout(predicate::str::contains("1,PLATFORM_ESCROW,,0"))
        .stdout(predicate::str::contains("2,PLATFORM_FEES,,500"))
        .stdout(predicate::str::contains("3,EXTERNAL_PSP,,-10000"))
        .stdout(predicate::str::contains("4,USER,2,9500"));
}

#[test]
fn refund_flow_balances() {
    let mut commands = NamedTempFile::new().unwrap();
    writeln!(commands, "op, user, listing, intent, key").unwrap();
    writeln!(commands, "create, 1, 10, , order-1").unwrap();
    writeln!(commands, "confirm, , , 1, ").unwrap();
    writeln!(commands, "refund, , , 1, ").unwrap();

    let listings = listings_csv();
    let users = users_csv();

    run(&commands, &listings, &users)
        .assert()
        .success()
        .stdout(predicate::str::contains("1,PLATFORM_ESCROW,,0"))
        .stdout(predicate::str::contains("3,EXTERNAL_PSP,,0"));
}

#[test]
fn duplicate_create_is_replayed_not_reexecuted() {
    let mut commands = NamedTempFile::new().unwrap();
    writeln!(commands, "op, user, listing, intent, key").unwrap();
    writeln!(commands, "create, 1, 10, , order-1").unwrap();
    writeln!(commands, "create, 1, 10, , order-1").unwrap();
    writeln!(commands, "confirm, , , 1, ").unwrap();
    writeln!(commands, "capture, , , 1, ").unwrap();

    let listings = listings_csv();
    let users = users_csv();

    // A second intent would have left money in escrow; the seller ends up
    // with exactly one sale's worth.
    run(&commands, &listings, &users)
        .assert()
        .success()
        .stdout(predicate::str::contains("1,PLATFORM_ESCROW,,0"))
        .stdout(predicate::str::contains("4,USER,2,9500"));
}

#[test]
fn create_without_key_is_rejected() {
    let mut commands = NamedTempFile::new().unwrap();
    writeln!(commands, "op, user, listing, intent, key").unwrap();
    writeln!(commands, "create, 1, 10, , ").unwrap();

    let listings = listings_csv();
    let users = users_csv();

    run(&commands, &listings, &users)
        .assert()
        .success()
        .stderr(predicate::str::contains("idempotency key"));
}

#[test]
fn double_capture_reports_invalid_state() {
    let mut commands = NamedTempFile::new().unwrap();
    writeln!(commands, "op, user, listing, intent, key").unwrap();
    writeln!(commands, "create, 1, 10, , order-1").unwrap();
    writeln!(commands, "confirm, , , 1, ").unwrap();
    writeln!(commands, "capture, , , 1, ").unwrap();
    writeln!(commands, "capture, , , 1, ").unwrap();

    let listings = listings_csv();
    let users = users_csv();

    // The second capture fails but balances stay as after the first.
    run(&commands, &listings, &users)
        .assert()
        .success()
        .stderr(predicate::str::contains("invalid state"))
        .stdout(predicate::str::contains("4,USER,2,9500"));
}

#[test]
fn cancel_by_buyer() {
    let mut commands = NamedTempFile::new().unwrap();
    writeln!(commands, "op, user, listing, intent, key").unwrap();
    writeln!(commands, "create, 1, 10, , order-1").unwrap();
    writeln!(commands, "cancel, 1, , 1, ").unwrap();
    writeln!(commands, "confirm, , , 1, ").unwrap();

    let listings = listings_csv();
    let users = users_csv();

    // Confirm after cancel fails; no accounts were ever touched, so the
    // report is empty.
    run(&commands, &listings, &users)
        .assert()
        .success()
        .stderr(predicate::str::contains("invalid state"));
}
