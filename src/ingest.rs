//! Line-based event input
//!
//! One event per line: `<metric> [label values...] [*amount]`. Fields are
//! tab-separated when the line contains a tab (so label values may hold
//! spaces or be empty), otherwise whitespace-separated. Blank lines and
//! lines starting with `#` are ignored.
//!
//! ```text
//! discord_events_received_total message
//! discord_messages_last_minute general false *3
//! discord_messages_last_minute	off topic	false
//! ```

use crate::error::{HitError, Result};
use crate::exposition::Collector;
use crate::window::parse_amount;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub metric: String,
    pub labels: Vec<String>,
    pub amount: u64,
}

/// Parse one input line. `Ok(None)` for blank and comment lines.
pub fn parse_event(line: &str) -> Result<Option<Event>> {
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    if line.trim().is_empty() || line.trim_start().starts_with('#') {
        return Ok(None);
    }

    let mut fields: Vec<&str> = if line.contains('\t') {
        line.split('\t').collect()
    } else {
        line.split_whitespace().collect()
    };

    let mut amount = 1;
    if let Some(last) = fields.last() {
        if let Some(raw) = last.strip_prefix('*') {
            amount = parse_amount(raw)?;
            fields.pop();
        }
    }

    let (metric, labels) = match fields.split_first() {
        Some((metric, labels)) if !metric.trim().is_empty() => (metric.trim(), labels),
        _ => return Err(HitError::invalid_argument("event line has no metric name")),
    };

    Ok(Some(Event {
        metric: metric.to_string(),
        labels: labels.iter().map(|l| l.to_string()).collect(),
        amount,
    }))
}

/// Record `event` against the matching metric in `scope`.
///
/// The event must name a registered metric and carry exactly one value per
/// declared label.
pub fn apply(collector: &Collector, scope: &str, event: &Event) -> Result<()> {
    let registry = collector.registry(scope, &event.metric).ok_or_else(|| {
        HitError::invalid_argument(format!("unknown metric {} in scope {}", event.metric, scope))
    })?;

    let expected = registry.label_names().len();
    if event.labels.len() != expected {
        return Err(HitError::invalid_argument(format!(
            "metric {} expects {} label values, got {}",
            event.metric,
            expected,
            event.labels.len()
        )));
    }

    registry.hit_by(event.labels.as_slice(), event.amount);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposition::WindowedGauge;
    use crate::window::WindowRegistry;
    use std::sync::Arc;

    #[test]
    fn test_parse_whitespace_line() {
        let event = parse_event("discord_messages general false *3\n")
            .unwrap()
            .unwrap();
        assert_eq!(event.metric, "discord_messages");
        assert_eq!(event.labels, vec!["general", "false"]);
        assert_eq!(event.amount, 3);
    }

    #[test]
    fn test_parse_tab_line_keeps_spaces_and_empty_values() {
        let event = parse_event("discord_messages\toff topic\t\t*2").unwrap().unwrap();
        assert_eq!(event.labels, vec!["off topic", ""]);
        assert_eq!(event.amount, 2);
    }

    #[test]
    fn test_parse_skips_blank_and_comments() {
        assert_eq!(parse_event("").unwrap(), None);
        assert_eq!(parse_event("   ").unwrap(), None);
        assert_eq!(parse_event("# comment").unwrap(), None);
    }

    #[test]
    fn test_parse_rejects_bad_amount() {
        assert!(parse_event("events message *-1").unwrap_err().is_invalid_argument());
        assert!(parse_event("events message *lots").is_err());
        assert!(parse_event("*3").is_err());
    }

    #[test]
    fn test_apply_checks_metric_and_arity() {
        let collector = Collector::new();
        let registry = Arc::new(WindowRegistry::new(["channel", "bot"], 60));
        collector
            .register(
                "default",
                WindowedGauge::new("messages", "", Arc::clone(&registry)).unwrap(),
            )
            .unwrap();

        let ok = parse_event("messages general false").unwrap().unwrap();
        apply(&collector, "default", &ok).unwrap();
        assert_eq!(registry.get(&["general", "false"]).unwrap().get_hits(), 1);

        let short = parse_event("messages general").unwrap().unwrap();
        assert!(apply(&collector, "default", &short).is_err());

        let unknown = parse_event("reactions general false").unwrap().unwrap();
        assert!(apply(&collector, "default", &unknown).is_err());
        assert!(apply(&collector, "other", &ok).is_err());
        assert_eq!(registry.len(), 1);
    }
}
