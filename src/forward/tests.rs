//! Tests for the forward client lifecycle.

use std::{io, thread};

use rstest::{fixture, rstest};

use crate::packer::{PackError, PackedBuffer};

use super::{
    ForwardClient, ForwardConfig, ForwardError, SharedForwardClient, TlsSessionPolicy,
    TransportError, TransportKind, TransportOp, transport::Transport,
};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Call {
    Open,
    Connect(String, u16),
    Send(Vec<u8>),
    Close,
}

/// Transport that records every call and fails on request.
#[derive(Debug, Default)]
struct ScriptedTransport {
    tls: bool,
    calls: Vec<Call>,
    fail_open: bool,
    fail_connect: bool,
    failing_sends: usize,
    fail_close: bool,
}

impl ScriptedTransport {
    fn plain() -> Self {
        Self::default()
    }

    fn tls() -> Self {
        Self {
            tls: true,
            ..Self::default()
        }
    }

    fn sends(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::Send(_)))
            .count()
    }
}

fn refused(op: TransportOp) -> TransportError {
    TransportError::io(
        op,
        io::Error::new(io::ErrorKind::ConnectionRefused, format!("{op} refused")),
    )
}

impl Transport for ScriptedTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        self.calls.push(Call::Open);
        if self.fail_open {
            return Err(refused(TransportOp::Open));
        }
        Ok(())
    }

    fn connect(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        self.calls.push(Call::Connect(host.to_owned(), port));
        if self.fail_connect {
            return Err(refused(TransportOp::Connect));
        }
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.calls.push(Call::Send(bytes.to_vec()));
        if self.failing_sends > 0 {
            self.failing_sends -= 1;
            return Err(refused(TransportOp::Send));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.calls.push(Call::Close);
        if self.fail_close {
            return Err(refused(TransportOp::Close));
        }
        Ok(())
    }

    fn is_tls(&self) -> bool {
        self.tls
    }
}

fn config(tls_policy: TlsSessionPolicy) -> ForwardConfig {
    ForwardConfig {
        tls_policy,
        ..ForwardConfig::default().with_endpoint("collector", 24224)
    }
}

fn client_with(transport: ScriptedTransport) -> ForwardClient<ScriptedTransport> {
    let policy = TlsSessionPolicy::default();
    ForwardClient::with_transport(config(policy), transport)
}

fn hello_entry() -> Vec<u8> {
    let mut expected = vec![0x93, 0xa9];
    expected.extend_from_slice(b"app.event");
    expected.extend_from_slice(&[0x00, 0xa5]);
    expected.extend_from_slice(b"hello");
    expected
}

fn assert_transport_op(err: &ForwardError, expected: TransportOp) {
    match err.as_transport() {
        Some(TransportError::Io { op, .. }) => assert_eq!(*op, expected),
        other => panic!("expected {expected} transport error, got {other:?}"),
    }
}

#[fixture]
fn plain_client() -> ForwardClient<ScriptedTransport> {
    client_with(ScriptedTransport::plain())
}

#[rstest]
fn plain_log_opens_sends_and_closes(mut plain_client: ForwardClient<ScriptedTransport>) {
    plain_client.log("app.event", "hello").expect("log succeeds");
    assert_eq!(
        plain_client.transport().calls,
        vec![
            Call::Open,
            Call::Connect("collector".into(), 24224),
            Call::Send(hello_entry()),
            Call::Close,
        ]
    );
    assert_eq!(plain_client.buffer().as_bytes(), hello_entry().as_slice());
}

#[rstest]
fn plain_open_failure_is_returned_before_connect() {
    let mut client = client_with(ScriptedTransport {
        fail_open: true,
        ..ScriptedTransport::plain()
    });
    let err = client.log("app.event", "hello").expect_err("open fails");
    assert_transport_op(&err, TransportOp::Open);
    assert_eq!(client.transport().calls, vec![Call::Open]);
}

#[rstest]
fn plain_connect_failure_skips_send() {
    let mut client = client_with(ScriptedTransport {
        fail_connect: true,
        ..ScriptedTransport::plain()
    });
    let err = client.log("app.event", "hello").expect_err("connect fails");
    assert_transport_op(&err, TransportOp::Connect);
    assert_eq!(
        client.transport().calls,
        vec![Call::Open, Call::Connect("collector".into(), 24224)]
    );
}

#[rstest]
#[case(false)]
#[case(true)]
fn plain_send_failure_closes_and_returns_send_error(#[case] close_also_fails: bool) {
    let mut client = client_with(ScriptedTransport {
        failing_sends: 1,
        fail_close: close_also_fails,
        ..ScriptedTransport::plain()
    });
    let err = client.log("app.event", "hello").expect_err("send fails");
    assert_transport_op(&err, TransportOp::Send);
    assert_eq!(client.transport().calls.last(), Some(&Call::Close));
    assert_eq!(client.transport().calls.len(), 4);
}

#[rstest]
fn plain_close_failure_after_successful_send_still_succeeds() {
    let mut client = client_with(ScriptedTransport {
        fail_close: true,
        ..ScriptedTransport::plain()
    });
    client
        .log("app.event", "hello")
        .expect("delivered entry is not reported as failed");
    assert_eq!(
        client.transport().calls,
        vec![
            Call::Open,
            Call::Connect("collector".into(), 24224),
            Call::Send(hello_entry()),
            Call::Close,
        ]
    );
}

#[rstest]
fn encoding_failure_never_reaches_transport() {
    let config = ForwardConfig {
        buffer_size: 8,
        ..config(TlsSessionPolicy::Persistent)
    };
    let mut client = ForwardClient::with_transport(config, ScriptedTransport::plain());
    let err = client
        .log("app.event", "hello")
        .expect_err("entry exceeds buffer");
    assert!(err.is_encoding());
    assert!(err.as_transport().is_none());
    assert!(client.transport().calls.is_empty());
}

#[rstest]
fn oversized_tag_is_an_encoding_error(mut plain_client: ForwardClient<ScriptedTransport>) {
    let tag = "t".repeat(256);
    let err = plain_client.log(&tag, "m").expect_err("tag too long");
    assert!(matches!(
        err,
        ForwardError::Encoding(PackError::StringTooLong { len: 256, .. })
    ));
}

#[rstest]
fn clock_value_stamps_the_entry() {
    let mut client =
        client_with(ScriptedTransport::plain()).with_clock(|| 1_700_000_000u32);
    client.log("t", "m").expect("log succeeds");
    assert_eq!(
        client.buffer().as_bytes(),
        &[0x93, 0xa1, b't', 0xce, 0x65, 0x53, 0xf1, 0x00, 0xa1, b'm']
    );
}

#[rstest]
fn packed_records_are_embedded(mut plain_client: ForwardClient<ScriptedTransport>) {
    let mut record = PackedBuffer::new(32);
    record.start_map(2).expect("map");
    record.map("temp", 21.5f32).expect("temp");
    record.map("ok", true).expect("ok");
    plain_client.log("sensor", &record).expect("log succeeds");

    let bytes = plain_client.buffer().as_bytes();
    assert_eq!(&bytes[..9], &[0x93, 0xa6, b's', b'e', b'n', b's', b'o', b'r', 0x00]);
    assert_eq!(&bytes[9..], record.as_bytes());
}

#[rstest]
fn buffer_is_reused_between_entries(mut plain_client: ForwardClient<ScriptedTransport>) {
    plain_client.log("a", "first entry").expect("first");
    plain_client.log("app.event", "hello").expect("second");
    assert_eq!(plain_client.buffer().as_bytes(), hello_entry().as_slice());
    assert_eq!(plain_client.buffer().capacity(), 128);
    plain_client.reset();
    assert!(plain_client.buffer().is_empty());
}

#[rstest]
fn lenient_tls_sends_despite_open_and_connect_failures() {
    let transport = ScriptedTransport {
        fail_open: true,
        fail_connect: true,
        ..ScriptedTransport::tls()
    };
    let mut client = ForwardClient::with_transport(config(TlsSessionPolicy::Lenient), transport);
    client.log("app.event", "hello").expect("send result wins");
    client.log("app.event", "hello").expect("send result wins");
    let calls = &client.transport().calls;
    assert_eq!(calls[2], Call::Send(hello_entry()));
    assert_eq!(client.transport().sends(), 2);
    assert!(!calls.contains(&Call::Close), "lenient tls never closes");
}

#[rstest]
fn lenient_tls_returns_send_error_without_closing() {
    let transport = ScriptedTransport {
        failing_sends: 1,
        ..ScriptedTransport::tls()
    };
    let mut client = ForwardClient::with_transport(config(TlsSessionPolicy::Lenient), transport);
    let err = client.log("app.event", "hello").expect_err("send fails");
    assert_transport_op(&err, TransportOp::Send);
    assert!(!client.transport().calls.contains(&Call::Close));
}

#[rstest]
fn lenient_tls_reuses_a_connected_session() {
    let mut client =
        ForwardClient::with_transport(config(TlsSessionPolicy::Lenient), ScriptedTransport::tls());
    for _ in 0..3 {
        client.log("app.event", "hello").expect("log succeeds");
    }
    assert_eq!(
        client.transport().calls,
        vec![
            Call::Open,
            Call::Connect("collector".into(), 24224),
            Call::Send(hello_entry()),
            Call::Send(hello_entry()),
            Call::Send(hello_entry()),
        ]
    );
}

#[rstest]
fn lenient_tls_reconnects_after_failed_send() {
    let transport = ScriptedTransport {
        failing_sends: 1,
        ..ScriptedTransport::tls()
    };
    let mut client = ForwardClient::with_transport(config(TlsSessionPolicy::Lenient), transport);
    client.log("app.event", "hello").expect_err("send fails");
    client.log("app.event", "hello").expect("second entry");
    assert_eq!(
        client.transport().calls,
        vec![
            Call::Open,
            Call::Connect("collector".into(), 24224),
            Call::Send(hello_entry()),
            Call::Open,
            Call::Connect("collector".into(), 24224),
            Call::Send(hello_entry()),
        ]
    );
}

#[rstest]
fn persistent_tls_keeps_session_between_entries() {
    let mut client = client_with(ScriptedTransport::tls());
    client.log("app.event", "hello").expect("first");
    client.log("app.event", "hello").expect("second");
    assert_eq!(
        client.transport().calls,
        vec![
            Call::Open,
            Call::Connect("collector".into(), 24224),
            Call::Send(hello_entry()),
            Call::Send(hello_entry()),
        ]
    );
}

#[rstest]
fn persistent_tls_propagates_connect_failure() {
    let mut client = client_with(ScriptedTransport {
        fail_connect: true,
        ..ScriptedTransport::tls()
    });
    let err = client.log("app.event", "hello").expect_err("connect fails");
    assert_transport_op(&err, TransportOp::Connect);
    assert_eq!(client.transport().sends(), 0);

    client.transport_mut().fail_connect = false;
    client.log("app.event", "hello").expect("reconnects");
    assert_eq!(client.transport().sends(), 1);
}

#[rstest]
fn persistent_tls_send_failure_closes_session_for_reconnect() {
    let mut client = client_with(ScriptedTransport {
        failing_sends: 1,
        ..ScriptedTransport::tls()
    });
    let err = client.log("app.event", "hello").expect_err("send fails");
    assert_transport_op(&err, TransportOp::Send);
    client.log("app.event", "hello").expect("second entry");
    assert_eq!(
        client.transport().calls,
        vec![
            Call::Open,
            Call::Connect("collector".into(), 24224),
            Call::Send(hello_entry()),
            Call::Close,
            Call::Open,
            Call::Connect("collector".into(), 24224),
            Call::Send(hello_entry()),
        ]
    );
}

#[rstest]
fn explicit_open_establishes_tls_session_once() {
    let mut client = client_with(ScriptedTransport::tls());
    client.open().expect("open");
    client.open().expect("already open");
    client.log("app.event", "hello").expect("log");
    assert_eq!(client.transport().calls.len(), 3);
    client.close().expect("close");
    assert_eq!(client.transport().calls.last(), Some(&Call::Close));
}

#[rstest]
fn explicit_open_is_noop_for_plain(mut plain_client: ForwardClient<ScriptedTransport>) {
    plain_client.open().expect("noop");
    assert!(plain_client.transport().calls.is_empty());
}

#[rstest]
fn default_config_targets_local_fluentd() {
    let config = ForwardConfig::default();
    assert_eq!(config.host, "localhost");
    assert_eq!(config.port, 24224);
    assert_eq!(config.connect_timeout.as_millis(), 1000);
    assert_eq!(config.buffer_size, 128);
    assert!(matches!(config.transport, TransportKind::Plain));
    assert_eq!(config.tls_policy, TlsSessionPolicy::Persistent);
}

#[rstest]
fn shared_client_serializes_concurrent_callers() {
    let shared = SharedForwardClient::new(client_with(ScriptedTransport::plain()));
    thread::scope(|scope| {
        for worker in 0..4 {
            let shared = &shared;
            scope.spawn(move || {
                for i in 0..10 {
                    let message = format!("worker {worker} entry {i}");
                    shared.log("app.event", message.as_str()).expect("log succeeds");
                }
            });
        }
    });
    let client = shared.into_inner();
    let calls = &client.transport().calls;
    assert_eq!(client.transport().sends(), 40);
    for chunk in calls.chunks(4) {
        assert_eq!(chunk[0], Call::Open);
        assert!(matches!(chunk[2], Call::Send(_)));
        assert_eq!(chunk[3], Call::Close);
    }
}
