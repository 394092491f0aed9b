/// Join a prefix and a relative path with exactly one `/` between them.
pub fn join_key(prefix: &str, rest: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let rest = rest.trim_start_matches('/');
    match (prefix.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (false, true) => format!("{prefix}/"),
        (false, false) => format!("{prefix}/{rest}"),
    }
}

/// Final path segment of an object key.
pub fn key_file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_key_normalizes_slashes() {
        assert_eq!(join_key("sales_data/", "a.csv"), "sales_data/a.csv");
        assert_eq!(join_key("sales_data", "/a.csv"), "sales_data/a.csv");
        assert_eq!(join_key("", "a.csv"), "a.csv");
        assert_eq!(
            join_key("sales_partitioned_data_mart/1700000000000", "sales_month=2024-01/store_id=121/part.parquet"),
            "sales_partitioned_data_mart/1700000000000/sales_month=2024-01/store_id=121/part.parquet"
        );
    }

    #[test]
    fn file_name_is_last_segment() {
        assert_eq!(key_file_name("sales_data/2024/a.csv"), "a.csv");
        assert_eq!(key_file_name("a.csv"), "a.csv");
    }
}
