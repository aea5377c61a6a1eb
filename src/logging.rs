//! Unified JSON logging with custom format.
//!
//! Log format:
//! ```json
//! {"ts":"2024-12-28T15:04:05.123Z","level":"info","type":"app","msg":"Server started","ctx":{"service":"httputil"},"data":{}}
//! ```
//!
//! Events with target `access` become access lines (`"type":"access"`) whose
//! message is `METHOD /path STATUS`.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Install the global subscriber.
///
/// Returns an error if a global subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("httputil=info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .event_format(JsonFormatter::new(config.service_name.clone())),
            )
            .try_init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    }
}

/// Custom JSON formatter for tracing.
pub struct JsonFormatter {
    service_name: String,
}

impl JsonFormatter {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    fn render(&self, level: &Level, target: &str, visitor: FieldVisitor) -> serde_json::Value {
        let level_str = match *level {
            Level::TRACE | Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };

        let log_type = if target == "access" {
            "access"
        } else if *level == Level::ERROR {
            "error"
        } else {
            "app"
        };

        let mut data = visitor.fields;

        let msg = if log_type == "access" {
            let method = data.get("method").and_then(|v| v.as_str()).unwrap_or("?");
            let path = data.get("path").and_then(|v| v.as_str()).unwrap_or("?");
            let status = data.get("status").and_then(|v| v.as_u64()).unwrap_or(0);
            format!("{} {} {}", method, path, status)
        } else {
            visitor.message.unwrap_or_default()
        };

        let mut ctx = serde_json::Map::new();
        ctx.insert("service".into(), serde_json::json!(self.service_name));
        if let Some(request_id) = data.remove("request_id") {
            ctx.insert("request_id".into(), request_id);
        }

        serde_json::json!({
            "ts": iso8601(SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default()),
            "level": level_str,
            "type": log_type,
            "msg": msg,
            "ctx": ctx,
            "data": data,
        })
    }
}

impl<S, N> FormatEvent<S, N> for JsonFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();

        let mut visitor = FieldVisitor::new();
        event.record(&mut visitor);

        let entry = self.render(meta.level(), meta.target(), visitor);
        writeln!(writer, "{}", entry)
    }
}

/// Field visitor for collecting tracing fields.
struct FieldVisitor {
    message: Option<String>,
    fields: HashMap<String, serde_json::Value>,
}

impl FieldVisitor {
    fn new() -> Self {
        Self {
            message: None,
            fields: HashMap::new(),
        }
    }
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let text = format!("{:?}", value);
        if field.name() == "message" {
            self.message = Some(text);
        } else {
            self.fields
                .insert(field.name().to_string(), serde_json::Value::String(text));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.insert(
                field.name().to_string(),
                serde_json::Value::String(value.to_string()),
            );
        }
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }
}

/// Format a time since UNIX_EPOCH as `YYYY-MM-DDTHH:MM:SS.mmmZ` (UTC).
pub fn iso8601(since_epoch: Duration) -> String {
    let secs = since_epoch.as_secs();
    let millis = since_epoch.subsec_millis();

    let day_secs = secs % 86400;
    let hours = day_secs / 3600;
    let minutes = (day_secs % 3600) / 60;
    let seconds = day_secs % 60;

    let mut year = 1970u64;
    let mut remaining = secs / 86400;
    loop {
        let year_days = if is_leap_year(year) { 366 } else { 365 };
        if remaining < year_days {
            break;
        }
        remaining -= year_days;
        year += 1;
    }

    let month_days: [u64; 12] = if is_leap_year(year) {
        [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    };

    let mut month = 1;
    for days_in_month in month_days {
        if remaining < days_in_month {
            break;
        }
        remaining -= days_in_month;
        month += 1;
    }

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        year,
        month,
        remaining + 1,
        hours,
        minutes,
        seconds,
        millis
    )
}

#[inline]
const fn is_leap_year(year: u64) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso8601() {
        assert_eq!(iso8601(Duration::ZERO), "1970-01-01T00:00:00.000Z");
        // 2024-02-29T12:34:56.789Z
        assert_eq!(
            iso8601(Duration::from_millis(1_709_210_096_789)),
            "2024-02-29T12:34:56.789Z"
        );
        // 2023-12-31T23:59:59.000Z
        assert_eq!(
            iso8601(Duration::from_secs(1_704_067_199)),
            "2023-12-31T23:59:59.000Z"
        );
    }

    #[test]
    fn test_render_app_entry() {
        let formatter = JsonFormatter::new("users");
        let mut visitor = FieldVisitor::new();
        visitor.message = Some("request failed".to_string());
        visitor
            .fields
            .insert("request_id".into(), serde_json::json!("abc-1"));
        visitor.fields.insert("status".into(), serde_json::json!(400));

        let entry = formatter.render(&Level::DEBUG, "httputil::handler", visitor);

        assert_eq!(entry["level"], "debug");
        assert_eq!(entry["type"], "app");
        assert_eq!(entry["msg"], "request failed");
        assert_eq!(entry["ctx"]["service"], "users");
        assert_eq!(entry["ctx"]["request_id"], "abc-1");
        assert_eq!(entry["data"]["status"], 400);
        assert!(entry["data"].get("request_id").is_none());
    }

    #[test]
    fn test_render_access_entry() {
        let formatter = JsonFormatter::new("users");
        let mut visitor = FieldVisitor::new();
        visitor.fields.insert("method".into(), serde_json::json!("POST"));
        visitor.fields.insert("path".into(), serde_json::json!("/users"));
        visitor.fields.insert("status".into(), serde_json::json!(201));

        let entry = formatter.render(&Level::INFO, "access", visitor);

        assert_eq!(entry["type"], "access");
        assert_eq!(entry["msg"], "POST /users 201");
    }

    #[test]
    fn test_render_error_type() {
        let formatter = JsonFormatter::new("users");
        let entry = formatter.render(&Level::ERROR, "httputil", FieldVisitor::new());
        assert_eq!(entry["type"], "error");
        assert_eq!(entry["level"], "error");
    }
}
