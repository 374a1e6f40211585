//! Process-wide router semantics. Kept in its own test binary so no other
//! suite touches the global instance.

use cqrs_hub::{Denormalizer, HubConfig};
use serde_json::json;
use std::sync::{Arc, Mutex};

#[test]
fn global_router_is_created_once_and_first_init_wins() {
    let before = cqrs_hub::global();
    assert!(!before.hub().is_initialized());

    let first = cqrs_hub::init(HubConfig::new().events_channel("inbound")).unwrap();
    let second = cqrs_hub::init(HubConfig::new().events_channel("ignored")).unwrap();

    assert!(std::ptr::eq(before, first));
    assert!(std::ptr::eq(first, second));
    assert_eq!(cqrs_hub::global().hub().config().events_channel, "inbound");

    let hits = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&hits);
    Denormalizer::new("pinged", "ping")
        .on_handle(move |_d, _event| {
            *sink.lock().unwrap() += 1;
            Ok(())
        })
        .register(cqrs_hub::global().registry())
        .unwrap();

    let hub = cqrs_hub::global().hub();
    hub.publish_message("ignored", json!({ "name": "pinged" }))
        .unwrap();
    hub.deliver(json!({ "name": "pinged" })).unwrap();

    assert_eq!(*hits.lock().unwrap(), 1);
}
