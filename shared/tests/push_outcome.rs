/// Settlement tests for PushRequest: every request reports exactly one of
/// delivered/declined, exactly once, including requests that are dropped
/// without an explicit outcome.
use std::sync::{Arc, Mutex};

use weft_shared::{Address, Envelope, Identity, PushOutcome, PushRequest, Value};

fn lane_address() -> Address {
    Address::edge("edge")
        .mesh("mesh")
        .part("p0")
        .host("warp://host:9001")
        .node("/node/1")
        .lane("values")
}

fn observed_request(outcomes: &Arc<Mutex<Vec<PushOutcome>>>) -> PushRequest {
    let outcomes = outcomes.clone();
    PushRequest::new(
        lane_address(),
        Identity::anonymous("warp://peer"),
        Envelope::command("/node/1", "values", Value::Int(1)),
        0.5,
    )
    .with_observer(move |outcome| outcomes.lock().unwrap().push(outcome))
}

#[test]
fn deliver_reports_exactly_once() {
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let request = observed_request(&outcomes);

    let envelope = request.did_deliver();
    assert_eq!(envelope.body(), Some(&Value::Int(1)));
    assert_eq!(*outcomes.lock().unwrap(), vec![PushOutcome::Delivered]);
}

#[test]
fn decline_reports_exactly_once() {
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let request = observed_request(&outcomes);

    request.did_decline();
    assert_eq!(*outcomes.lock().unwrap(), vec![PushOutcome::Declined]);
}

#[test]
fn dropping_an_unsettled_request_declines_it() {
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    {
        let _request = observed_request(&outcomes);
        // dropped without settlement
    }
    assert_eq!(*outcomes.lock().unwrap(), vec![PushOutcome::Declined]);
}

#[test]
fn requests_expose_their_routing_facts() {
    let request = PushRequest::new(
        lane_address(),
        Identity::authenticated("warp://peer"),
        Envelope::command("/node/1", "values", Value::Int(1)),
        0.75,
    );
    assert_eq!(request.address(), &lane_address());
    assert!(request.identity().is_authenticated());
    assert_eq!(request.priority(), 0.75);
    request.did_decline();
}
