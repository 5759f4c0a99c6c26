//! Per-episode limit on failure reports.
//!
//! A collector that stays down for hours would otherwise produce one report
//! per recovery attempt. The first `limit` reports of an episode go out
//! unchanged; the one that reaches the limit is followed by a notice, and
//! everything after that is folded into periodic summaries.

use std::{
    error::Error,
    time::{Duration, Instant},
};

use crate::{
    rate_limited_warner::RateLimitedWarner,
    reporter::{ErrorReporter, Severity},
};

/// Default number of reports emitted per failure episode.
pub const DEFAULT_STATUS_LIMIT: u32 = 8;

#[derive(Debug)]
pub(crate) struct ReportThrottle {
    limit: u32,
    emitted: u32,
    suppressed: RateLimitedWarner,
}

impl ReportThrottle {
    pub(crate) fn new(limit: u32, summary_interval: Duration) -> Self {
        Self {
            limit: limit.max(1),
            emitted: 0,
            suppressed: RateLimitedWarner::new(summary_interval),
        }
    }

    pub(crate) fn report(
        &mut self,
        reporter: &dyn ErrorReporter,
        description: &str,
        now: Instant,
        severity: Severity,
        message: &str,
        cause: Option<&(dyn Error + 'static)>,
    ) {
        if self.emitted < self.limit {
            self.emitted += 1;
            reporter.report(severity, message, cause);
            if self.emitted == self.limit {
                reporter.report(
                    Severity::Info,
                    &format!("Will suppress future messages regarding {description}"),
                    None,
                );
                self.suppressed.mark_warned(now);
            }
            return;
        }
        self.suppressed.record();
        self.suppressed
            .warn_if_due(now, |count| summarise(reporter, description, count));
    }

    /// Emit any pending summary and start counting from zero.
    pub(crate) fn end_episode(
        &mut self,
        reporter: &dyn ErrorReporter,
        description: &str,
        now: Instant,
    ) {
        self.suppressed
            .flush(now, |count| summarise(reporter, description, count));
        self.suppressed.reset();
        self.emitted = 0;
    }
}

fn summarise(reporter: &dyn ErrorReporter, description: &str, count: u64) {
    reporter.report(
        Severity::Warn,
        &format!("{count} further messages regarding {description} suppressed"),
        None,
    );
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::reporter::StatusRecorder;

    const DESC: &str = "socket stream [collector.local:5170]";

    #[rstest]
    fn stops_after_limit_and_announces_it() {
        let recorder = StatusRecorder::new();
        let mut throttle = ReportThrottle::new(2, Duration::from_secs(5));
        let now = Instant::now();
        for _ in 0..5 {
            throttle.report(&recorder, DESC, now, Severity::Error, "Failed to open", None);
        }
        assert_eq!(
            recorder.messages(),
            vec![
                "Failed to open".to_owned(),
                "Failed to open".to_owned(),
                format!("Will suppress future messages regarding {DESC}"),
            ]
        );
    }

    #[rstest]
    fn suppressed_reports_are_summarised_per_interval() {
        let recorder = StatusRecorder::new();
        let mut throttle = ReportThrottle::new(1, Duration::from_secs(5));
        let start = Instant::now();
        throttle.report(&recorder, DESC, start, Severity::Error, "first", None);
        throttle.report(&recorder, DESC, start, Severity::Error, "second", None);
        let later = start + Duration::from_secs(4);
        throttle.report(&recorder, DESC, later, Severity::Error, "third", None);
        assert_eq!(recorder.count(Severity::Warn), 0);

        let due = start + Duration::from_secs(5);
        throttle.report(&recorder, DESC, due, Severity::Error, "fourth", None);
        let messages = recorder.messages();
        assert_eq!(
            messages.last(),
            Some(&format!("3 further messages regarding {DESC} suppressed"))
        );
    }

    #[rstest]
    fn ending_episode_flushes_and_resets() {
        let recorder = StatusRecorder::new();
        let mut throttle = ReportThrottle::new(1, Duration::from_secs(5));
        let now = Instant::now();
        throttle.report(&recorder, DESC, now, Severity::Error, "first", None);
        throttle.report(&recorder, DESC, now, Severity::Error, "hidden", None);
        throttle.end_episode(&recorder, DESC, now);
        assert_eq!(recorder.count(Severity::Warn), 1);

        recorder.clear();
        throttle.report(&recorder, DESC, now, Severity::Error, "next episode", None);
        assert_eq!(recorder.messages()[0], "next episode");
    }
}
