//! Integration tests for #[derive(LiveModel)] and live model binding.

mod models;

use cqrs_hub::{Denormalizer, HandlerError, HubConfig, Live, LiveModel, Router};
use models::{Invoice, OrderLine, Profile};
use serde_json::json;

fn router() -> Router {
    let router = Router::new();
    router.init(HubConfig::default()).unwrap();
    router
}

#[test]
fn derive_defaults_to_snake_case_name_and_id_field() {
    let line = OrderLine {
        id: 3,
        sku: "A-1".into(),
        quantity: 1,
    };
    assert_eq!(OrderLine::MODEL_NAME, "order_line");
    assert_eq!(line.model_id(), "3");
    assert_eq!(line.entity_key(), "order_line:3");
}

#[test]
fn derive_honors_name_and_id_attributes() {
    let invoice = Invoice {
        number: "INV-9".into(),
        total: 10.0,
        paid: false,
    };
    assert_eq!(Invoice::MODEL_NAME, "bill");
    assert_eq!(invoice.model_id(), "INV-9");
}

#[test]
fn live_model_merges_routed_changes() {
    let router = router();
    Denormalizer::new("orderLineChanged", OrderLine::MODEL_NAME)
        .register(router.registry())
        .unwrap();

    let line = Live::new(OrderLine {
        id: 3,
        sku: "A-1".into(),
        quantity: 1,
    });
    assert_eq!(line.bind(router.registry()).unwrap(), 1);

    router
        .hub()
        .deliver(json!({ "name": "orderLineChanged", "payload": { "id": 3, "quantity": 5 } }))
        .unwrap();

    assert_eq!(line.snapshot().quantity, 5);
    assert_eq!(line.snapshot().sku, "A-1");
}

#[test]
fn custom_entity_id_path_targets_the_instance() {
    let router = Router::new();
    router
        .init(HubConfig::new().event_entity_id_path("payload.number"))
        .unwrap();
    Denormalizer::new("invoicePaid", "bill")
        .register(router.registry())
        .unwrap();

    let invoice = Live::new(Invoice {
        number: "INV-9".into(),
        total: 10.0,
        paid: false,
    });
    invoice.bind(router.registry()).unwrap();

    router
        .hub()
        .deliver(json!({ "name": "invoicePaid", "payload": { "number": "INV-9", "paid": true } }))
        .unwrap();

    assert!(invoice.snapshot().paid);
}

#[test]
fn overridden_apply_decides_how_changes_land() {
    let router = router();
    Denormalizer::new("profileVisited", Profile::MODEL_NAME)
        .register(router.registry())
        .unwrap();

    let profile = Live::new(Profile {
        id: "u1".into(),
        visits: 0,
    });
    profile.bind(router.registry()).unwrap();

    for _ in 0..3 {
        router
            .hub()
            .deliver(json!({ "name": "profileVisited", "payload": { "id": "u1", "visits": 1 } }))
            .unwrap();
    }

    assert_eq!(profile.snapshot().visits, 3);
}

#[test]
fn apply_override_on_denormalizer_can_reject() {
    let router = router();
    Denormalizer::new("profileVisited", Profile::MODEL_NAME)
        .on_apply(|_d, _data, target| {
            Err(HandlerError::Rejected(format!("{} is frozen", target.id())))
        })
        .register(router.registry())
        .unwrap();

    let profile = Live::new(Profile {
        id: "u1".into(),
        visits: 0,
    });
    profile.bind(router.registry()).unwrap();

    router
        .hub()
        .deliver(json!({ "name": "profileVisited", "payload": { "id": "u1", "visits": 1 } }))
        .unwrap();

    assert_eq!(profile.snapshot().visits, 0);
}
