//! Human-readable statistics

use crate::models::{AggregationState, Label, Termination};

/// Scale a byte count to B, KB, MB or GB.
///
/// A unit is only stepped up once the value exceeds 5120 of the current
/// unit, so small values keep some precision. Division truncates.
pub fn format_size(bytes: u64) -> String {
    const STEP_THRESHOLD: u64 = 5120;
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut value = bytes;
    let mut unit = 0;
    while value > STEP_THRESHOLD && unit + 1 < UNITS.len() {
        value /= 1024;
        unit += 1;
    }
    format!("{} {}", value, UNITS[unit])
}

/// One-line progress summary
pub fn stat_line(state: &AggregationState) -> String {
    let mut line = format!(
        "{} labels, {} messages processed, {} total size, next page token: {}",
        state.labels.len(),
        state.processed_count,
        format_size(state.total_size()),
        state.cursor.as_deref().unwrap_or("none"),
    );
    if state.failed_count > 0 {
        line.push_str(&format!(", {} failed", state.failed_count));
    }
    if state.termination == Some(Termination::CursorStalled) {
        line.push_str(", stopped on a stalled cursor");
    }
    line
}

/// Labels worth printing (non-system, at least one message), smallest first
pub fn relevant_labels(state: &AggregationState) -> Vec<&Label> {
    let mut labels: Vec<&Label> = state.labels.values().filter(|l| l.is_relevant()).collect();
    labels.sort_by(|a, b| {
        a.total_size
            .cmp(&b.total_size)
            .then_with(|| a.name.cmp(&b.name))
    });
    labels
}

/// Summary rows: label name, message count, scaled size
pub fn summary_lines(state: &AggregationState) -> Vec<String> {
    relevant_labels(state)
        .into_iter()
        .map(|l| format!("{} {} {}", l.name, l.message_count, format_size(l.total_size)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemMetadata, PageTally};

    #[test]
    fn test_format_size_thresholds() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(5120), "5120 B");
        assert_eq!(format_size(5121), "5 KB");
        assert_eq!(format_size(5120 * 1024), "5120 KB");
        assert_eq!(format_size(5121 * 1024), "5 MB");
        assert_eq!(format_size(6 * 1024 * 1024 * 1024), "6 GB");
        assert_eq!(format_size(u64::MAX), "17179869183 GB");
    }

    #[test]
    fn test_summary_filters_and_sorts() {
        let mut state = AggregationState::new(10);
        state.install_labels(
            [
                Label::new("big", "Big"),
                Label::new("small", "Small"),
                Label::new("empty", "Empty"),
                Label::system("INBOX", "INBOX"),
            ]
            .into_iter()
            .map(|l| (l.id.clone(), l))
            .collect(),
        );

        let mut tally = PageTally::new();
        tally.add(&ItemMetadata::new("a", 9000, ["big", "INBOX"]));
        tally.add(&ItemMetadata::new("b", 100, ["small", "INBOX"]));
        state.apply_page(tally, 2, None).unwrap();

        assert_eq!(summary_lines(&state), vec!["Small 1 100 B", "Big 1 8 KB"]);
    }

    #[test]
    fn test_stat_line() {
        let mut state = AggregationState::new(10);
        state.install_labels([(Label::new("a", "A").id.clone(), Label::new("a", "A"))].into());
        state.cursor = Some("tok".into());
        state.processed_count = 3;

        assert_eq!(
            stat_line(&state),
            "1 labels, 3 messages processed, 0 B total size, next page token: tok"
        );

        state.failed_count = 1;
        state.mark_done(Termination::CursorStalled);
        assert!(stat_line(&state).ends_with(", 1 failed, stopped on a stalled cursor"));
    }
}
