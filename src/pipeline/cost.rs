use crate::warehouse::WarehouseManager;
use tracing::warn;

/// Dry-run scan-cost estimate in bytes, or `None` when the warehouse cannot
/// provide one. Estimation failures are display-level problems, not request
/// failures — the user may still choose to run the query.
pub async fn estimate_query_cost(warehouse: &WarehouseManager, sql: &str) -> Option<i64> {
    match warehouse.dry_run_cost(sql).await {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!("Cost estimation failed: {}", e);
            None
        }
    }
}

/// Converts a byte count to a human-readable size (KB, MB, GB, TB, PB),
/// formatted to two decimal places. `None` maps to "N/A".
pub fn bytes_to_human_readable(bytes: Option<i64>) -> String {
    let Some(bytes) = bytes else {
        return "N/A".to_string();
    };

    let mut value = bytes as f64;
    for unit in ["bytes", "KB", "MB", "GB", "TB"] {
        if value < 1024.0 {
            return format!("{:.2} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.2} PB", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_bytes() {
        assert_eq!(bytes_to_human_readable(Some(0)), "0.00 bytes");
    }

    #[test]
    fn kilobytes() {
        assert_eq!(bytes_to_human_readable(Some(1536)), "1.50 KB");
    }

    #[test]
    fn unavailable_estimate() {
        assert_eq!(bytes_to_human_readable(None), "N/A");
    }

    #[test]
    fn each_unit_scales_by_1024() {
        assert_eq!(bytes_to_human_readable(Some(1024)), "1.00 KB");
        assert_eq!(bytes_to_human_readable(Some(1024 * 1024)), "1.00 MB");
        assert_eq!(bytes_to_human_readable(Some(1024_i64.pow(3))), "1.00 GB");
        assert_eq!(bytes_to_human_readable(Some(1024_i64.pow(4))), "1.00 TB");
        assert_eq!(bytes_to_human_readable(Some(2 * 1024_i64.pow(5))), "2.00 PB");
    }
}
