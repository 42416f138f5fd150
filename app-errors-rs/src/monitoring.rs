//! Metrics for handled errors.
//!
//! Only the `metrics` facade is used; whichever recorder the host process
//! installs receives the counts.

use metrics::counter;

use crate::types::AppError;

/// Counter incremented for every error passing through `handle_error`
pub const HANDLED_ERRORS_METRIC: &str = "app_errors_handled_total";

/// Counts a handled error, labelled by code and operational flag
pub fn record_handled_error(error: &AppError) {
    let operational = if error.is_operational() { "true" } else { "false" };
    counter!(
        HANDLED_ERRORS_METRIC,
        1,
        "code" => error.code().as_str(),
        "operational" => operational
    );
}
