#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::process::Command;
use tempfile::tempdir;

mod common;

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: open a tab
    let csv1 = common::ledger_csv(&[
        "customer, Maria",
        "charge, Maria, 100.0, groceries",
        "charge, Maria, 20.0, soap",
    ])
    .unwrap();

    let output1 = Command::new(cargo_bin!("fiado"))
        .arg(csv1.path())
        .arg("--db-path")
        .arg(&db_path)
        .output()
        .expect("Failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains("1,Maria,120,"));

    // 2. Second run: pay against the recovered tab
    let csv2 = common::ledger_csv(&["payment, Maria, 110"]).unwrap();

    let output2 = Command::new(cargo_bin!("fiado"))
        .arg(csv2.path())
        .arg("--db-path")
        .arg(&db_path)
        .output()
        .expect("Failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);

    // Groceries settled, soap reduced from 20 to 10
    assert!(stdout2.contains("1,Maria,10,"));
}
