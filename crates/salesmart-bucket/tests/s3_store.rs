use bytes::Bytes;
use salesmart_bucket::{join_key, BucketStore, S3BucketStore, S3Config};

const REQUIRED_VARS: &[&str] = &[
    "SALESMART_TEST_S3_BUCKET",
    "SALESMART_TEST_S3_ENDPOINT",
    "SALESMART_TEST_S3_ACCESS_KEY_ID",
    "SALESMART_TEST_S3_SECRET_ACCESS_KEY",
];

fn config_from_env() -> Option<S3Config> {
    for &var in REQUIRED_VARS {
        if std::env::var(var)
            .ok()
            .filter(|value| !value.is_empty())
            .is_none()
        {
            return None;
        }
    }

    Some(S3Config {
        bucket: std::env::var("SALESMART_TEST_S3_BUCKET").ok()?,
        region: std::env::var("SALESMART_TEST_S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
        endpoint: std::env::var("SALESMART_TEST_S3_ENDPOINT").ok(),
        access_key_id: std::env::var("SALESMART_TEST_S3_ACCESS_KEY_ID").ok(),
        secret_access_key: std::env::var("SALESMART_TEST_S3_SECRET_ACCESS_KEY").ok(),
        force_path_style: true,
    })
}

#[tokio::test]
async fn s3_store_lists_and_moves_objects() {
    let Some(config) = config_from_env() else {
        eprintln!(
            "Skipping S3 bucket test; set {} to enable",
            REQUIRED_VARS.join(", ")
        );
        return;
    };

    let store = S3BucketStore::new(config).await.expect("s3 store");
    let run = std::process::id();
    let source = join_key(&format!("it-{run}/sales_data"), "sample.csv");
    let dest = join_key(&format!("it-{run}/sales_data_processed"), "sample.csv");

    store
        .put_object(&source, Bytes::from_static(b"customer_id\n1\n"), "text/csv")
        .await
        .expect("upload");

    let listed = store
        .list_objects(&format!("it-{run}/sales_data/"))
        .await
        .expect("list");
    assert_eq!(listed, vec![source.clone()]);

    store.move_object(&source, &dest).await.expect("move");
    let body = store.get_object(&dest).await.expect("download");
    assert_eq!(&body[..], b"customer_id\n1\n");
    assert!(store
        .list_objects(&format!("it-{run}/sales_data/"))
        .await
        .expect("list after move")
        .is_empty());

    store.delete_object(&dest).await.expect("cleanup");
}
