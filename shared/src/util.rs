/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a document id for a new record.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
