#![allow(dead_code)]

use std::path::{Path, PathBuf};

use salesmart_core::dimensions::{CustomerRow, DimensionTables, ProductRow, SalesPersonRow, StoreRow};

pub const HEADER: &str =
    "customer_id,store_id,product_name,sales_date,sales_person_id,price,quantity,total_cost";

pub fn mandatory() -> Vec<String> {
    HEADER.split(',').map(str::to_string).collect()
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write fixture");
    path
}

pub fn customer(id: i32, first: &str, last: &str) -> CustomerRow {
    CustomerRow {
        customer_id: id,
        first_name: Some(first.into()),
        last_name: Some(last.into()),
        address: Some(format!("{id} Market Road")),
        pincode: Some("560001".into()),
        phone_number: Some(format!("98450000{id:02}")),
    }
}

pub fn store(id: i32, manager: &str) -> StoreRow {
    StoreRow {
        id,
        address: Some(format!("Store {id} High Street")),
        store_pincode: Some("560002".into()),
        store_manager_name: Some(manager.into()),
    }
}

pub fn sales_person(id: i32, first: &str, last: &str) -> SalesPersonRow {
    SalesPersonRow {
        id,
        first_name: Some(first.into()),
        last_name: Some(last.into()),
        manager_id: Some(10),
        is_manager: Some("N".into()),
        address: Some(format!("{id} Staff Lane")),
        pincode: Some("560003".into()),
    }
}

/// Customers 1-3, stores 121-122, sales persons 1, 2 (store 121) and 5, 6 (store 122).
pub fn dimensions() -> DimensionTables {
    DimensionTables {
        customers: vec![
            customer(1, "Asha", "Rao"),
            customer(2, "Vikram", "Singh"),
            customer(3, "Meera", "Iyer"),
        ],
        stores: vec![store(121, "Kiran"), store(122, "Deepa")],
        sales_team: vec![
            sales_person(1, "Ravi", "Kumar"),
            sales_person(2, "Neha", "Shah"),
            sales_person(5, "Arjun", "Das"),
            sales_person(6, "Pooja", "Nair"),
        ],
        products: vec![ProductRow {
            name: Some("sugar".into()),
            current_price: Some(50.0),
        }],
    }
}
