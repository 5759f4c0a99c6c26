//! Property-based tests for the resilient stream state machine.
//!
//! Random interleavings of writes, flushes, sink breakage, reachability
//! changes and clock movement must never panic, must keep the health
//! counters consistent and must never attempt recovery faster than the
//! backoff interval allows.

use std::{sync::Arc, time::Duration};

use proptest::prelude::*;
use resilient_stream::{
    BackoffPolicy, NopReporter, ResilientStream, StreamOptions, StreamState,
    test_utils::{ManualClock, ScriptedFactory},
};

const INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Debug)]
enum Op {
    Write(Vec<u8>),
    Flush,
    Break,
    Reachable(bool),
    WritesFail(bool),
    Advance(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => proptest::collection::vec(any::<u8>(), 0..16).prop_map(Op::Write),
        1 => Just(Op::Flush),
        1 => Just(Op::Break),
        1 => any::<bool>().prop_map(Op::Reachable),
        1 => any::<bool>().prop_map(Op::WritesFail),
        3 => (0u64..250).prop_map(Op::Advance),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_stream_survives_any_interleaving(ops in proptest::collection::vec(op(), 1..80)) {
        let (factory, control) = ScriptedFactory::new("prop [stream]");
        let clock = ManualClock::new();
        let stream = ResilientStream::with_options(
            factory,
            Arc::new(NopReporter),
            StreamOptions {
                backoff: BackoffPolicy::fixed(INTERVAL),
                ..StreamOptions::default()
            },
        )
        .with_time_provider(clock.provider());
        stream.open().expect("scripted factory opens");

        let mut last_attempt = None;
        for op in ops {
            let opens_before = control.open_calls();
            match op {
                Op::Write(bytes) => stream.write(&bytes),
                Op::Flush => stream.flush(),
                Op::Break => control.break_current_sink(),
                Op::Reachable(reachable) => control.set_reachable(reachable),
                Op::WritesFail(fail) => control.set_writes_fail(fail),
                Op::Advance(ms) => clock.advance(Duration::from_millis(ms)),
            }

            let opens_after = control.open_calls();
            prop_assert!(opens_after - opens_before <= 1, "one attempt per call at most");
            if opens_after > opens_before {
                let now = clock.now();
                if let Some(previous) = last_attempt {
                    prop_assert!(now.duration_since(previous) >= INTERVAL);
                }
                last_attempt = Some(now);
            }

            let health = stream.health();
            prop_assert_eq!(health.is_healthy, health.consecutive_failures == 0);
            prop_assert_eq!(
                stream.is_healthy(),
                health.state == StreamState::Healthy
            );
            if health.state == StreamState::Healthy {
                prop_assert!(health.is_healthy);
            }
        }

        stream.close();
        stream.close();
        prop_assert_eq!(stream.state(), StreamState::Closed);
    }
}
