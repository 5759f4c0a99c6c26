//! Send/Sync guarantees for core types.

use resilient_stream::{
    FileSinkFactory, FileStreamBuilder, LogReporter, NopReporter, ResilientStream,
    SocketSinkFactory, SocketStreamBuilder, StaticResolver, StatusRecorder, SystemResolver,
    config::AnyStream,
};
use rstest::rstest;
use static_assertions::assert_impl_all;

#[rstest]
fn builders_are_send_sync() {
    assert_impl_all!(SocketStreamBuilder: Send, Sync);
    assert_impl_all!(FileStreamBuilder: Send, Sync);
}

#[rstest]
fn streams_are_send_sync() {
    assert_impl_all!(ResilientStream<SocketSinkFactory>: Send, Sync);
    assert_impl_all!(ResilientStream<FileSinkFactory>: Send, Sync);
    assert_impl_all!(AnyStream: Send, Sync);
}

#[rstest]
fn collaborators_are_send_sync() {
    assert_impl_all!(LogReporter: Send, Sync);
    assert_impl_all!(NopReporter: Send, Sync);
    assert_impl_all!(StatusRecorder: Send, Sync);
    assert_impl_all!(SystemResolver: Send, Sync);
    assert_impl_all!(StaticResolver: Send, Sync);
}
