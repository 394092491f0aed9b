mod common;

use anyhow::Result;
use salesmart_core::error::PipelineError;
use salesmart_core::reconcile::ColumnReconciler;
use salesmart_core::schema::{FileVerdict, SchemaValidator};

use common::{mandatory, write_file, HEADER};

#[test]
fn partitions_files_by_mandatory_columns() {
    let dir = tempfile::tempdir().expect("tempdir");
    let good = write_file(
        dir.path(),
        "b_good.csv",
        &format!("{HEADER},payment_mode\n1,121,sugar,2024-01-05,1,50,2,100,cash\n"),
    );
    let bad = write_file(
        dir.path(),
        "a_bad.csv",
        "customer_id,store_id,product_name,sales_date,sales_person_id,price\n1,121,sugar,2024-01-05,1,50\n",
    );
    let notes = write_file(dir.path(), "c_notes.txt", "not sales data");

    let validator = SchemaValidator::new(mandatory());
    let partition = validator
        .partition(&[notes.clone(), good.clone(), bad.clone()])
        .expect("partition");

    assert_eq!(partition.correct, vec![good]);
    assert_eq!(partition.error, vec![bad, notes]);

    let verdicts: Vec<&FileVerdict> = partition.checks.iter().map(|c| &c.verdict).collect();
    assert_eq!(
        verdicts[0],
        &FileVerdict::MissingColumns(vec!["quantity".into(), "total_cost".into()])
    );
    assert_eq!(verdicts[1], &FileVerdict::Correct);
    assert_eq!(verdicts[2], &FileVerdict::NotCsv);
}

#[test]
fn empty_input_is_fatal() {
    let validator = SchemaValidator::new(mandatory());
    let err = validator.partition(&[]).expect_err("empty input must fail");
    assert!(matches!(err, PipelineError::NoInput(_)));
}

#[test]
fn padded_header_is_an_error_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let padded = write_file(
        dir.path(),
        "sales_padded.csv",
        "customer_id, store_id,product_name,sales_date,sales_person_id,price,quantity,total_cost\n\
         1,121,sugar,2024-01-05,1,50,2,100\n",
    );
    let clean = write_file(
        dir.path(),
        "sales_clean.csv",
        &format!("{HEADER}\n1,121,sugar,2024-01-05,1,50,2,100\n"),
    );

    let partition = SchemaValidator::new(mandatory()).partition(&[padded.clone(), clean.clone()])?;
    assert_eq!(partition.correct, vec![clean]);
    assert_eq!(partition.error, vec![padded]);
    assert_eq!(
        partition.checks[1].verdict,
        FileVerdict::MissingColumns(vec!["store_id".into()])
    );

    // Everything the validator accepts normalizes cleanly.
    let df = ColumnReconciler::new().normalize(&partition.correct)?;
    assert_eq!(df.height(), 1);
    Ok(())
}
