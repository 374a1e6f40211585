use cqrs_hub::{Loopback, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

pub type Recorder<T> = Arc<Mutex<Vec<T>>>;

pub fn recorder<T>() -> Recorder<T> {
    Arc::new(Mutex::new(Vec::new()))
}

/// Stands in for a remote command processor: `createX` becomes `Xcreated`
/// with a server-assigned id, answering the command it came from.
pub fn x_responder(router: &Router) -> Loopback {
    Loopback::attach(router.hub(), |cmd| {
        if cmd["name"] != "createX" {
            return None;
        }
        let mut payload = cmd["payload"].clone();
        if let Value::Object(fields) = &mut payload {
            fields.insert("id".to_string(), json!("p1"));
        }
        Some(json!({ "name": "Xcreated", "payload": payload, "commandId": cmd["id"] }))
    })
    .unwrap()
}
