//! Output formatting for CLI commands

use crate::notification::DeliveryReport;
use anyhow::Result;
use serde::Serialize;

/// Format output as pretty JSON
pub fn format_output<T: Serialize>(data: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// Print one line per delivery, or the reports as JSON with --json
pub fn print_reports(reports: &[DeliveryReport], json: bool) -> Result<()> {
    if json {
        println!("{}", format_output(&reports)?);
        return Ok(());
    }

    if reports.is_empty() {
        println!("No webhook notified");
        return Ok(());
    }

    for report in reports {
        let state = if report.delivered { "delivered" } else { "failed" };
        println!("{} {} ({} attempt(s))", state, report.url, report.attempts);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_output_reports() {
        let reports = vec![DeliveryReport {
            url: "https://hook".to_string(),
            attempts: 3,
            delivered: false,
            last_error: Some("status 500: boom".to_string()),
        }];
        let out = format_output(&reports).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[0]["attempts"], 3);
        assert_eq!(parsed[0]["delivered"], false);
    }
}
