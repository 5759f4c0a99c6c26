//! Behavioural tests for the resilient stream state machine.

use std::{io::Write, sync::Arc, thread, time::Duration};

use rstest::{fixture, rstest};

use super::{BackoffPolicy, ResilientStream, StreamOptions, StreamState};
use crate::{
    error::OpenError,
    reporter::{Severity, StatusRecorder},
    test_utils::{FactoryControl, ManualClock, ScriptedFactory},
};

const DESC: &str = "socket stream [collector.local:5170]";
const INTERVAL: Duration = Duration::from_millis(100);

struct Harness {
    stream: ResilientStream<ScriptedFactory>,
    control: FactoryControl,
    clock: ManualClock,
    recorder: Arc<StatusRecorder>,
}

impl Harness {
    fn new(options: StreamOptions) -> Self {
        let (factory, control) = ScriptedFactory::new(DESC);
        let clock = ManualClock::new();
        let recorder = Arc::new(StatusRecorder::new());
        let stream = ResilientStream::with_options(factory, recorder.clone(), options)
            .with_time_provider(clock.provider());
        Self {
            stream,
            control,
            clock,
            recorder,
        }
    }

    fn opened(options: StreamOptions) -> Self {
        let harness = Self::new(options);
        harness.stream.open().expect("scripted factory opens");
        harness
    }

    fn advance_and_write(&self, by: Duration, buf: &[u8]) {
        self.clock.advance(by);
        self.stream.write(buf);
    }

    fn messages_starting_with(&self, prefix: &str) -> usize {
        self.recorder
            .messages()
            .iter()
            .filter(|message| message.starts_with(prefix))
            .count()
    }
}

fn fixed_options() -> StreamOptions {
    StreamOptions {
        backoff: BackoffPolicy::fixed(INTERVAL),
        ..StreamOptions::default()
    }
}

#[fixture]
fn opened() -> Harness {
    Harness::opened(fixed_options())
}

#[rstest]
fn healthy_write_reaches_sink(opened: Harness) {
    opened.stream.write(&[0x41, 0x42]);

    assert!(opened.stream.is_healthy());
    assert_eq!(opened.control.received(0), vec![0x41, 0x42]);
    assert!(opened.recorder.is_empty());
}

#[rstest]
fn failures_within_interval_report_once(opened: Harness) {
    opened.control.break_current_sink();

    for _ in 0..3 {
        opened.advance_and_write(Duration::from_millis(10), b"lost");
        assert!(!opened.stream.is_healthy());
    }

    assert_eq!(opened.recorder.count(Severity::Error), 1);
    assert_eq!(
        opened.recorder.messages(),
        vec![format!("IO failure while writing to {DESC}")]
    );
    assert_eq!(opened.control.open_calls(), 1, "no recovery inside the interval");
    assert_eq!(opened.control.close_calls(), 1, "broken sink is released");
}

#[rstest]
fn recovery_delivers_only_the_recovering_write(opened: Harness) {
    opened.control.break_current_sink();
    opened.advance_and_write(Duration::ZERO, b"first");
    opened.advance_and_write(Duration::from_millis(30), b"second");
    opened.advance_and_write(Duration::from_millis(30), b"third");

    opened.advance_and_write(Duration::from_millis(40), b"fourth");

    assert!(opened.stream.is_healthy());
    assert_eq!(opened.control.sinks_opened(), 2);
    assert_eq!(opened.control.received(1), b"fourth");
    assert_eq!(opened.control.all_received(), b"fourth");
    assert_eq!(
        opened.messages_starting_with(&format!(
            "Recovered from IO failure on {DESC} after dropping 3 writes"
        )),
        1
    );

    opened.stream.write(b"fifth");
    assert_eq!(opened.control.received(1), b"fourthfifth");
}

#[rstest]
fn recovery_attempts_respect_the_interval(opened: Harness) {
    opened.control.set_reachable(false);
    opened.control.break_current_sink();
    opened.stream.write(b"fails");

    for _ in 0..20 {
        opened.advance_and_write(Duration::from_millis(10), b"x");
    }

    // initial open plus one attempt per elapsed interval
    assert_eq!(opened.control.open_calls(), 3);
    let health = opened.stream.health();
    assert_eq!(health.state, StreamState::Unhealthy);
    assert_eq!(health.recovery_attempts, 2);
    assert_eq!(health.consecutive_failures, 3);
    assert_eq!(health.dropped_writes, 21);
    assert_eq!(health.last_recovery_attempt_time, Some(opened.clock.now()));
}

#[rstest]
fn failed_recovery_keeps_stream_unhealthy_until_reachable(opened: Harness) {
    opened.control.set_reachable(false);
    opened.control.break_current_sink();
    opened.stream.write(b"a");
    opened.advance_and_write(INTERVAL, b"b");

    assert!(!opened.stream.is_healthy());
    assert_eq!(opened.messages_starting_with(&format!("Failed to open {DESC}")), 1);
    assert_eq!(
        opened.messages_starting_with(&format!("Attempting to recover from IO failure on {DESC}")),
        1
    );

    opened.control.set_reachable(true);
    opened.advance_and_write(INTERVAL / 2, b"c");
    assert!(!opened.stream.is_healthy(), "gate still closed");

    opened.advance_and_write(INTERVAL / 2, b"d");
    assert!(opened.stream.is_healthy());
    assert_eq!(opened.control.all_received(), b"d");
    let health = opened.stream.health();
    assert!(health.is_healthy);
    assert_eq!(health.consecutive_failures, 0);
}

#[rstest]
fn long_outage_reports_are_throttled() {
    let harness = Harness::opened(StreamOptions {
        status_limit: 3,
        warn_interval: Duration::from_secs(1),
        ..fixed_options()
    });
    harness.control.set_reachable(false);
    harness.control.break_current_sink();
    harness.stream.write(b"a");

    for _ in 0..10 {
        harness.advance_and_write(INTERVAL, b"b");
    }
    assert_eq!(harness.recorder.count(Severity::Error), 2);
    assert_eq!(
        harness.messages_starting_with(&format!("Will suppress future messages regarding {DESC}")),
        1
    );
    assert_eq!(harness.recorder.count(Severity::Warn), 0);

    harness.advance_and_write(INTERVAL, b"c");
    assert_eq!(harness.recorder.count(Severity::Warn), 1);
    assert_eq!(harness.messages_starting_with("19 further messages regarding"), 1);
}

#[rstest]
fn backoff_growth_survives_until_a_write_succeeds() {
    let harness = Harness::opened(StreamOptions::default());
    harness.control.break_current_sink();
    harness.stream.write(b"a");
    assert_eq!(harness.stream.health().current_backoff, Duration::from_millis(20));

    // recovered sink breaks on its first write
    harness.control.set_writes_fail(true);
    harness.advance_and_write(Duration::from_millis(20), b"b");
    assert!(!harness.stream.is_healthy());
    assert_eq!(harness.stream.health().current_backoff, Duration::from_millis(80));

    harness.control.set_writes_fail(false);
    harness.advance_and_write(Duration::from_millis(79), b"c");
    assert_eq!(harness.control.open_calls(), 2);
    harness.advance_and_write(Duration::from_millis(1), b"d");
    assert_eq!(harness.control.open_calls(), 3);
    assert!(harness.stream.is_healthy());
    assert_eq!(harness.stream.health().current_backoff, Duration::from_millis(20));
}

#[rstest]
fn flush_failure_marks_stream_unhealthy(opened: Harness) {
    opened.control.set_flush_fails(true);
    opened.stream.flush();

    assert_eq!(opened.stream.state(), StreamState::Unhealthy);
    assert_eq!(
        opened.messages_starting_with(&format!("IO failure while flushing {DESC}")),
        1
    );
}

#[rstest]
fn close_is_idempotent_and_terminal(opened: Harness) {
    opened.stream.close();
    opened.stream.close();

    assert_eq!(opened.stream.state(), StreamState::Closed);
    assert_eq!(opened.control.close_calls(), 1);
    assert!(matches!(opened.stream.open(), Err(OpenError::Closed)));

    opened.stream.write(b"after close");
    assert!(opened.control.all_received().is_empty());
}

#[rstest]
fn close_failure_is_reported_not_raised(opened: Harness) {
    opened.control.set_close_fails(true);
    opened.stream.close();

    assert_eq!(opened.stream.state(), StreamState::Closed);
    assert_eq!(opened.recorder.count(Severity::Warn), 1);
    assert_eq!(opened.messages_starting_with(&format!("Failed to close {DESC}")), 1);
}

#[rstest]
fn writes_before_open_are_dropped_and_summarised() {
    let harness = Harness::new(fixed_options());
    harness.stream.write(b"early");
    harness.stream.write(b"early");

    assert_eq!(harness.stream.state(), StreamState::Uninitialized);
    assert_eq!(harness.control.open_calls(), 0);
    assert_eq!(
        harness.recorder.messages(),
        vec![format!("1 writes to {DESC} dropped while the stream was not open")]
    );

    harness.stream.close();
    assert_eq!(
        harness.messages_starting_with(&format!("1 writes to {DESC} dropped")),
        2
    );
}

#[rstest]
fn initial_open_failure_is_returned_and_retryable() {
    let harness = Harness::new(fixed_options());
    harness.control.set_reachable(false);

    let err = harness.stream.open().expect_err("unreachable factory");
    assert!(matches!(err, OpenError::ConnectFailed { .. }));
    assert_eq!(harness.stream.state(), StreamState::Uninitialized);
    assert!(harness.recorder.is_empty(), "caller owns the initial failure");

    harness.control.set_reachable(true);
    harness.stream.open().expect("retry succeeds");
    assert!(harness.stream.is_healthy());
}

#[rstest]
fn second_open_is_rejected(opened: Harness) {
    assert!(matches!(opened.stream.open(), Err(OpenError::AlreadyOpen)));
    assert_eq!(opened.control.open_calls(), 1);
}

#[rstest]
fn describe_is_available_before_open() {
    let harness = Harness::new(fixed_options());
    assert_eq!(harness.stream.describe(), DESC);
    harness.control.set_reachable(false);
    let _ = harness.stream.open();
    assert_eq!(harness.stream.describe(), DESC);
}

#[rstest]
fn io_write_accepts_everything(opened: Harness) {
    opened.control.break_current_sink();
    let mut writer = &opened.stream;
    writer
        .write_all(b"dropped")
        .expect("io::Write never fails");
    Write::flush(&mut writer).expect("flush never fails");
    assert!(!opened.stream.is_healthy());
}

#[rstest]
fn concurrent_writers_are_serialised() {
    let harness = Harness::opened(fixed_options());
    let stream = Arc::new(harness.stream);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let stream = Arc::clone(&stream);
            thread::spawn(move || {
                for _ in 0..100 {
                    stream.write(b"abcd");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer thread");
    }

    assert_eq!(harness.control.writes(0), 400);
    assert_eq!(harness.control.received(0).len(), 1600);
}
