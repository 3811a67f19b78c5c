/// keep_linked reconnection behavior: bounded-backoff retries after
/// transport loss, terminal failure only once the retry budget is spent.
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use weft_client::{Downlink, DownlinkConfig, DownlinkError, DownlinkObserver, DownlinkState};
use weft_shared::{
    Address, BackoffConfig, Envelope, EnvelopeTag, Identity, ManualStage, PushRequest, Pushable,
    Value,
};

struct CountingPusher {
    decline: Mutex<bool>,
    sent: Mutex<Vec<EnvelopeTag>>,
}

impl CountingPusher {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            decline: Mutex::new(false),
            sent: Mutex::new(Vec::new()),
        })
    }

    fn set_decline(&self, decline: bool) {
        *self.decline.lock().unwrap() = decline;
    }

    fn link_count(&self) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|tag| **tag == EnvelopeTag::Link)
            .count()
    }

    fn sync_count(&self) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|tag| **tag == EnvelopeTag::Sync)
            .count()
    }
}

impl Pushable for CountingPusher {
    fn push(&self, request: PushRequest) {
        self.sent.lock().unwrap().push(request.envelope().tag());
        if *self.decline.lock().unwrap() {
            request.did_decline();
        } else {
            let _ = request.did_deliver();
        }
    }
}

struct FailureLog {
    failures: Arc<Mutex<Vec<(DownlinkError, bool)>>>,
}

impl DownlinkObserver for FailureLog {
    fn did_fail(&self, error: &DownlinkError, recoverable: bool) {
        self.failures
            .lock()
            .unwrap()
            .push((error.clone(), recoverable));
    }
}

fn reconnect_config(budget: u32) -> DownlinkConfig {
    DownlinkConfig {
        keep_linked: true,
        keep_synced: true,
        backoff: BackoffConfig {
            base: Duration::from_millis(100),
            max: Duration::from_secs(10),
            jitter: 0.0,
            retry_budget: budget,
        },
        ..DownlinkConfig::default()
    }
}

struct Fixture {
    stage: Arc<ManualStage>,
    pusher: Arc<CountingPusher>,
    downlink: Downlink,
    failures: Arc<Mutex<Vec<(DownlinkError, bool)>>>,
}

fn fixture(budget: u32) -> Fixture {
    let stage = ManualStage::new();
    let pusher = CountingPusher::new();
    let failures = Arc::new(Mutex::new(Vec::new()));
    let address = Address::edge("edge")
        .mesh("mesh")
        .part("p0")
        .host("warp://host:9001")
        .node("/node/1")
        .lane("values");
    let downlink = Downlink::new(
        address,
        Identity::anonymous("warp://client"),
        reconnect_config(budget),
        pusher.clone(),
        stage.clone(),
        Arc::new(FailureLog {
            failures: failures.clone(),
        }),
    );
    Fixture {
        stage,
        pusher,
        downlink,
        failures,
    }
}

#[test]
fn transport_loss_schedules_a_backoff_retry() {
    let fixture = fixture(4);
    fixture.downlink.open();
    fixture
        .downlink
        .on_envelope(Envelope::linked("/node/1", "values"));
    fixture.stage.run_until_idle();
    assert_eq!(fixture.pusher.link_count(), 1);

    fixture.downlink.on_transport_failure("connection reset");
    fixture.stage.run_until_idle();
    assert_eq!(fixture.stage.pending_timers(), 1);
    assert_eq!(fixture.downlink.state(), DownlinkState::Unlinked);

    // Not due yet at 50ms; due at 100ms.
    fixture.stage.advance(Duration::from_millis(50));
    assert_eq!(fixture.pusher.link_count(), 1);
    fixture.stage.advance(Duration::from_millis(50));
    assert_eq!(fixture.pusher.link_count(), 2);

    // keep_synced re-opens with a fresh Sync each time.
    assert_eq!(fixture.pusher.sync_count(), 2);
}

#[test]
fn retries_back_off_and_exhaust_the_budget() {
    let fixture = fixture(3);
    fixture.pusher.set_decline(true);
    fixture.downlink.open();
    fixture.stage.run_until_idle();

    // Declined Link push counts as a transport failure; delays 100/200/400ms.
    for delay in [100u64, 200, 400] {
        assert_eq!(fixture.stage.pending_timers(), 1);
        fixture.stage.advance(Duration::from_millis(delay));
    }

    // Budget spent: terminal failure, nothing left scheduled.
    fixture.stage.run_until_idle();
    assert_eq!(fixture.stage.pending_timers(), 0);
    let failures = fixture.failures.lock().unwrap();
    let (last_error, recoverable) = failures.last().unwrap();
    assert_eq!(*last_error, DownlinkError::RetriesExhausted { attempts: 3 });
    assert!(!*recoverable);
    let recoverable_count = failures.iter().filter(|(_, r)| *r).count();
    assert_eq!(recoverable_count, 3);
}

#[test]
fn successful_relink_resets_the_backoff() {
    let fixture = fixture(2);
    fixture.downlink.open();
    fixture
        .downlink
        .on_envelope(Envelope::linked("/node/1", "values"));
    fixture.stage.run_until_idle();

    // First failure retries at the base delay.
    fixture.downlink.on_transport_failure("reset");
    fixture.stage.run_until_idle();
    fixture.stage.advance(Duration::from_millis(100));
    fixture
        .downlink
        .on_envelope(Envelope::linked("/node/1", "values"));
    fixture.stage.run_until_idle();

    // After a successful relink the schedule starts over at the base delay
    // instead of continuing toward exhaustion.
    fixture.downlink.on_transport_failure("reset again");
    fixture.stage.run_until_idle();
    assert_eq!(fixture.stage.pending_timers(), 1);
    fixture.stage.advance(Duration::from_millis(100));
    assert_eq!(fixture.pusher.link_count(), 3);
}

#[test]
fn close_cancels_a_pending_reconnect() {
    let fixture = fixture(4);
    fixture.downlink.open();
    fixture
        .downlink
        .on_envelope(Envelope::linked("/node/1", "values"));
    fixture.downlink.on_transport_failure("reset");
    fixture.stage.run_until_idle();
    assert_eq!(fixture.stage.pending_timers(), 1);

    fixture.downlink.close();
    fixture.stage.run_until_idle();
    fixture.stage.advance(Duration::from_secs(60));
    assert_eq!(fixture.pusher.link_count(), 1);
    assert_eq!(fixture.downlink.state(), DownlinkState::Unlinked);
}

#[test]
fn commands_survive_a_reconnect_window() {
    let fixture = fixture(4);
    fixture.downlink.open();
    fixture
        .downlink
        .on_envelope(Envelope::linked("/node/1", "values"));
    fixture.downlink.on_transport_failure("reset");
    fixture.stage.run_until_idle();

    // Issued while the link is down and a retry is pending: rejected, the
    // caller is told, and the machine keeps running.
    fixture.downlink.command(Value::text("write"), 0.5);
    fixture.stage.run_until_idle();
    let failures = fixture.failures.lock().unwrap();
    assert!(failures
        .iter()
        .any(|(error, recoverable)| matches!(error, DownlinkError::NotConnected { .. })
            && *recoverable));
}
