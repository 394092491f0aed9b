mod common;

use anyhow::Result;
use salesmart_core::config::{IncentiveConfig, IncentiveScope};
use salesmart_core::dimensions::enrich;
use salesmart_core::marts::{
    assign_incentives, customer_mart, customer_projection, sales_projection, sales_team_mart,
    SalesTeamMartRow, CUSTOMER_PROJECTION,
};
use salesmart_core::reconcile::ColumnReconciler;

use common::{dimensions, write_file, HEADER};

fn mart_row(store_id: i32, sales_person_id: i32, month: &str, total_sales: f64) -> SalesTeamMartRow {
    SalesTeamMartRow {
        store_id,
        sales_person_id,
        full_name: None,
        sales_month: month.into(),
        total_sales,
        incentive: 0.0,
    }
}

fn incentives(rows: &[SalesTeamMartRow]) -> Vec<f64> {
    rows.iter().map(|row| row.incentive).collect()
}

#[test]
fn only_the_top_performer_earns_one_percent() {
    let mut rows = vec![
        mart_row(121, 1, "2024-03", 1000.0),
        mart_row(121, 2, "2024-03", 5000.0),
        mart_row(121, 3, "2024-03", 2000.0),
    ];

    assign_incentives(&mut rows, &IncentiveConfig::default());

    assert_eq!(incentives(&rows), vec![0.0, 50.0, 0.0]);
}

#[test]
fn ties_go_to_the_lowest_sales_person_id() {
    let mut rows = vec![
        mart_row(121, 4, "2024-03", 2500.0),
        mart_row(121, 2, "2024-03", 2500.0),
        mart_row(121, 3, "2024-03", 100.0),
    ];

    assign_incentives(&mut rows, &IncentiveConfig::default());

    assert_eq!(incentives(&rows), vec![0.0, 25.0, 0.0]);
}

#[test]
fn scope_controls_the_competition_group() {
    let base = vec![
        mart_row(121, 1, "2024-01", 1234.56),
        mart_row(122, 5, "2024-01", 900.0),
        mart_row(122, 5, "2024-02", 10.0),
    ];

    let mut per_store = base.clone();
    assign_incentives(&mut per_store, &IncentiveConfig::default());
    assert_eq!(incentives(&per_store), vec![12.35, 9.0, 0.1]);

    let mut global = base;
    assign_incentives(
        &mut global,
        &IncentiveConfig {
            scope: IncentiveScope::Global,
            rate: 0.01,
        },
    );
    assert_eq!(incentives(&global), vec![12.35, 0.0, 0.1]);
}

#[test]
fn marts_group_by_month() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let file = write_file(
        dir.path(),
        "sales.csv",
        &format!(
            "{HEADER}\n\
             1,121,sugar,2024-01-05,1,50,2,100\n\
             1,121,sugar,2024-01-20,1,50,4,200\n\
             2,121,maida,2024-01-06,2,20,5,100\n\
             2,122,tata salt,2024-02-11,6,20,3,60\n\
             3,122,besan,2024-02-10,5,52,1,52\n"
        ),
    );
    let sales = ColumnReconciler::new().normalize(&[file])?;
    let enriched = enrich(sales, &dimensions())?;

    let customers = customer_projection(&enriched)?;
    let names: Vec<String> = customers.get_column_names().iter().map(|n| n.to_string()).collect();
    assert_eq!(names, CUSTOMER_PROJECTION.to_vec());

    let customer_rows = customer_mart(&customers)?;
    let summary: Vec<(i32, &str, f64)> = customer_rows
        .iter()
        .map(|row| (row.customer_id, row.sales_date_month.as_str(), row.total_sales))
        .collect();
    assert_eq!(
        summary,
        vec![
            (1, "2024-01", 300.0),
            (2, "2024-01", 100.0),
            (2, "2024-02", 60.0),
            (3, "2024-02", 52.0),
        ]
    );
    assert_eq!(customer_rows[0].full_name.as_deref(), Some("Asha Rao"));

    let sales = sales_projection(&enriched)?;
    let months: Vec<Option<&str>> = sales
        .column("sales_month")?
        .as_materialized_series()
        .str()?
        .into_iter()
        .collect();
    assert!(months.iter().all(|m| matches!(m, Some("2024-01") | Some("2024-02"))));

    let team_rows = sales_team_mart(&sales, &IncentiveConfig::default())?;
    let team: Vec<(i32, i32, &str, f64, f64)> = team_rows
        .iter()
        .map(|row| {
            (
                row.store_id,
                row.sales_person_id,
                row.sales_month.as_str(),
                row.total_sales,
                row.incentive,
            )
        })
        .collect();
    assert_eq!(
        team,
        vec![
            (121, 1, "2024-01", 300.0, 3.0),
            (121, 2, "2024-01", 100.0, 0.0),
            (122, 5, "2024-02", 52.0, 0.0),
            (122, 6, "2024-02", 60.0, 0.6),
        ]
    );
    assert_eq!(team_rows[0].full_name.as_deref(), Some("Ravi Kumar"));
    Ok(())
}
