use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!());
    cmd.arg("tests/fixtures/ledger.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "customer,name,outstanding,last_payment",
        ))
        // Maria paid 12 against rice (10) and beans (5)
        .stdout(predicate::str::contains("1,Maria,3,"))
        // Ana paid her coffee exactly
        .stdout(predicate::str::contains("2,Ana,0,"));

    Ok(())
}
