//! Integration tests for routing: hub normalization, correlation and fan-out.

mod support;

use cqrs_hub::{resolve, ApplyTarget, Command, Denormalizer, HubConfig, MessageId, Router};
use serde_json::{json, Value};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;
use support::{recorder, x_responder, Recorder};

fn router() -> Router {
    let router = Router::new();
    router.init(HubConfig::default()).unwrap();
    router
}

#[test]
fn path_resolver_never_panics_on_missing_steps() {
    let body = json!({ "a": { "b": [ { "c": 1 } ], "n": null } });

    assert_eq!(resolve(&body, "a.b.0.c"), Some(&json!(1)));
    assert_eq!(resolve(&body, "a.x.c"), None);
    assert_eq!(resolve(&body, "a.n.c"), None);
    assert_eq!(resolve(&body, "a.b.7"), None);
    assert_eq!(resolve(&body, "a.b.0.c.d"), None);
    assert_eq!(resolve(&body, ""), Some(&body));
}

#[test]
fn default_paths_extract_name_and_id() {
    let router = router();
    let events = recorder();
    let sink = Arc::clone(&events);
    router
        .hub()
        .on_dispatch(move |event| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        })
        .unwrap();

    router
        .hub()
        .deliver(json!({ "name": "X", "payload": { "id": "1", "v": 9 } }))
        .unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "X");
    assert_eq!(events[0].id, Some(MessageId::from("1")));
}

#[test]
fn observed_command_is_answered_exactly_once() {
    let router = router();
    let calls: Recorder<String> = recorder();

    let cmd = Command::new("doIt", json!({})).with_id("cmd-1");
    let sink = Arc::clone(&calls);
    cmd.observe(router.registry(), move |event| {
        sink.lock().unwrap().push(event.name.clone())
    })
    .unwrap();
    cmd.emit(router.hub()).unwrap();

    let hub = router.hub();
    hub.deliver(json!({ "name": "unrelated", "commandId": "cmd-2" })).unwrap();
    hub.deliver(json!({ "name": "done", "commandId": "cmd-1" })).unwrap();
    hub.deliver(json!({ "name": "doneAgain", "commandId": "cmd-1" })).unwrap();

    assert_eq!(*calls.lock().unwrap(), vec!["done"]);
    assert_eq!(router.registry().pending_count(), 0);
}

#[test]
fn numeric_and_string_correlation_ids_match() {
    let router = router();
    let calls: Recorder<String> = recorder();

    let sink = Arc::clone(&calls);
    router
        .registry()
        .observe(42u64, move |event| sink.lock().unwrap().push(event.name.clone()))
        .unwrap();
    router
        .hub()
        .deliver(json!({ "name": "answered", "commandId": "42" }))
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), vec!["answered"]);
}

#[test]
fn duplicate_denormalizers_receive_events_in_registration_order() {
    let router = router();
    let order: Recorder<&'static str> = recorder();

    for tag in ["first", "second"] {
        let sink = Arc::clone(&order);
        Denormalizer::new("E", "M")
            .on_handle(move |_d, _event| {
                sink.lock().unwrap().push(tag);
                Ok(())
            })
            .register(router.registry())
            .unwrap();
    }

    router.hub().deliver(json!({ "name": "E" })).unwrap();
    router.hub().deliver(json!({ "name": "E" })).unwrap();

    assert_eq!(
        *order.lock().unwrap(),
        vec!["first", "second", "first", "second"]
    );
}

#[test]
fn entity_subscriptions_only_see_their_instance() {
    let router = router();
    Denormalizer::new("Mchanged", "M")
        .register(router.registry())
        .unwrap();

    let seven: Recorder<Value> = recorder();
    let eight: Recorder<Value> = recorder();
    for (key, log) in [("M:7", &seven), ("M:8", &eight)] {
        let sink = Arc::clone(log);
        router
            .registry()
            .subscribe_entity(key, move |data| {
                sink.lock().unwrap().push(data.clone());
                Ok(())
            })
            .unwrap();
    }

    router
        .hub()
        .deliver(json!({ "name": "Mchanged", "payload": { "id": 7, "v": 1 } }))
        .unwrap();

    assert_eq!(*seven.lock().unwrap(), vec![json!({ "id": 7, "v": 1 })]);
    assert!(eight.lock().unwrap().is_empty());
}

#[test]
fn responder_scenario_invokes_override_once() {
    let router = router();
    x_responder(&router);

    let seen: Recorder<Value> = recorder();
    let sink = Arc::clone(&seen);
    Denormalizer::new("Xcreated", "X")
        .on_handle(move |_d, event| {
            sink.lock().unwrap().push(event.get("payload.n").cloned().unwrap_or(Value::Null));
            Ok(())
        })
        .register(router.registry())
        .unwrap();

    Command::new("createX", json!({ "n": "a" }))
        .emit(router.hub())
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![json!("a")]);
}

#[test]
fn first_initialization_wins() {
    let router = Router::new();
    assert!(router
        .init(
            HubConfig::new()
                .events_channel("in")
                .event_name_path("type")
        )
        .unwrap());
    assert!(!router
        .init(
            HubConfig::new()
                .events_channel("other")
                .event_name_path("kind")
        )
        .unwrap());

    let names: Recorder<String> = recorder();
    let sink = Arc::clone(&names);
    router
        .hub()
        .on_dispatch(move |event| {
            sink.lock().unwrap().push(event.name.clone());
            Ok(())
        })
        .unwrap();

    router
        .hub()
        .publish_message("other", json!({ "kind": "ignored" }))
        .unwrap();
    router
        .hub()
        .publish_message("in", json!({ "type": "routed", "kind": "nope" }))
        .unwrap();

    assert_eq!(router.hub().config().events_channel, "in");
    assert_eq!(*names.lock().unwrap(), vec!["routed"]);
}

#[test]
fn config_loads_from_json() {
    let config = HubConfig::from_json(
        r#"{ "eventsChannel": "in", "eventNamePath": "meta.type", "maxPublishDepth": 8 }"#,
    )
    .unwrap();
    let router = Router::new();
    router.init(config).unwrap();

    let names: Recorder<String> = recorder();
    let sink = Arc::clone(&names);
    router
        .hub()
        .on_dispatch(move |event| {
            sink.lock().unwrap().push(event.name.clone());
            Ok(())
        })
        .unwrap();
    router
        .hub()
        .publish_message("in", json!({ "meta": { "type": "nested" } }))
        .unwrap();

    assert_eq!(*names.lock().unwrap(), vec!["nested"]);
    assert_eq!(router.hub().gate().max_depth(), 8);
}

#[test]
fn failing_projection_does_not_stop_routing() {
    let router = router();
    let hits: Recorder<u32> = recorder();

    Denormalizer::new("E", "M")
        .on_handle(|_d, _event| panic!("projection bug"))
        .register(router.registry())
        .unwrap();
    let sink = Arc::clone(&hits);
    Denormalizer::new("E", "M")
        .on_handle(move |_d, _event| {
            sink.lock().unwrap().push(1);
            Ok(())
        })
        .register(router.registry())
        .unwrap();

    router.hub().deliver(json!({ "name": "E" })).unwrap();
    router.hub().deliver("not json").unwrap();
    router.hub().deliver(json!({ "name": "E" })).unwrap();

    assert_eq!(hits.lock().unwrap().len(), 2);
}

#[test]
fn concurrent_deliveries_are_serialized() {
    let router = router();
    let log: Recorder<(String, &'static str)> = recorder();

    let sink = Arc::clone(&log);
    Denormalizer::new("E", "M")
        .on_handle(move |_d, event| {
            let tag = event.get("tag").and_then(Value::as_str).unwrap_or_default();
            sink.lock().unwrap().push((tag.to_string(), "enter"));
            thread::yield_now();
            sink.lock().unwrap().push((tag.to_string(), "leave"));
            Ok(())
        })
        .register(router.registry())
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let hub = router.hub().clone();
            thread::spawn(move || {
                for i in 0..10 {
                    hub.deliver(json!({ "name": "E", "tag": format!("{n}-{i}") }))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 80);
    for pair in log.chunks(2) {
        assert_eq!(pair[0].0, pair[1].0);
        assert_eq!(pair[0].1, "enter");
        assert_eq!(pair[1].1, "leave");
    }
}

#[test]
fn change_publishes_and_deliveries_from_two_threads_do_not_deadlock() {
    let router = router();
    let d = Denormalizer::new("personChanged", "person")
        .register(router.registry())
        .unwrap();
    let id = MessageId::from("p1");

    // every projected change is echoed back to the hub as a new event
    let hub = router.hub().clone();
    d.subscribe_changes(&id, move |_data| {
        thread::yield_now();
        hub.deliver(json!({ "name": "personNoted" }))?;
        Ok(())
    })
    .unwrap();

    let (done, finished) = mpsc::channel();
    let changes = {
        let d = Arc::clone(&d);
        let done = done.clone();
        thread::spawn(move || {
            let id = MessageId::from("p1");
            for _ in 0..50 {
                ApplyTarget::new(&d, &id).publish(&json!({})).unwrap();
            }
            done.send("changes").unwrap();
        })
    };
    let deliveries = {
        let hub = router.hub().clone();
        thread::spawn(move || {
            for _ in 0..50 {
                hub.deliver(json!({ "name": "personChanged", "payload": { "id": "p1" } }))
                    .unwrap();
            }
            done.send("deliveries").unwrap();
        })
    };

    for _ in 0..2 {
        finished
            .recv_timeout(Duration::from_secs(10))
            .expect("threads deadlocked");
    }
    changes.join().unwrap();
    deliveries.join().unwrap();
}
