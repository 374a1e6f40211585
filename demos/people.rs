use cqrs_hub::{
    Command, Denormalizer, EmitterBridge, HandlerError, HubConfig, LiveModel, Loopback,
    ModelCollection,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Serialize, Deserialize, LiveModel)]
struct Person {
    id: String,
    personname: String,
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_id() -> String {
    format!("p{}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("cqrs_hub=debug".parse()?))
        .init();

    // Default event shape: { "name": "personChanged", "payload": { "id": "p1", ... } }
    let router = cqrs_hub::init(HubConfig::default())?;
    let persons: ModelCollection<Person> = ModelCollection::new();

    // Client side only: answer our own commands instead of a server
    Loopback::attach(router.hub(), |cmd| {
        let mut evt = cmd.clone();
        match cmd["name"].as_str()? {
            "createPerson" => {
                evt["name"] = json!("personCreated");
                evt["payload"]["id"] = json!(unique_id());
            }
            "changePerson" => evt["name"] = json!("personChanged"),
            _ => return None,
        }
        evt["commandId"] = cmd["id"].clone();
        Some(evt)
    })?;

    // Out-of-band view of everything sent "to the server"
    let wire = EmitterBridge::new();
    for command in ["createPerson", "changePerson"] {
        wire.on(command, move |json: String| println!("  -> server: {json}"));
    }
    wire.attach(router.hub())?;

    // personCreated creates the model, so it replaces the default handling
    let created = persons.clone();
    Denormalizer::new("personCreated", Person::MODEL_NAME)
        .on_handle(move |_d, evt| {
            let data = evt.get("payload").cloned().unwrap_or(Value::Null);
            let person: Person = serde_json::from_value(data)?;
            created
                .insert_bound(person, cqrs_hub::global().registry())
                .map_err(HandlerError::other)?;
            Ok(())
        })
        .register(router.registry())?;

    // personChanged goes with the defaults
    Denormalizer::new("personChanged", Person::MODEL_NAME).register(router.registry())?;

    for name in ["Tim", "Ida", "Rob"] {
        persons.insert_bound(
            Person {
                id: unique_id(),
                personname: name.to_string(),
            },
            router.registry(),
        )?;
    }
    print_persons("initial", &persons);

    let create = Command::new("createPerson", json!({ "personname": "Ada" })).with_new_id();
    create.observe(router.registry(), |evt| {
        println!("createPerson answered by {}", evt.name);
    })?;
    create.emit(router.hub())?;
    print_persons("after createPerson", &persons);

    if let Some(id) = persons.ids().get(1) {
        Command::new("changePerson", json!({ "id": id, "personname": "Ida Maria" }))
            .emit(router.hub())?;
    }
    print_persons("after changePerson", &persons);

    // let the emitter threads print
    thread::sleep(Duration::from_millis(50));
    Ok(())
}

fn print_persons(label: &str, persons: &ModelCollection<Person>) {
    println!("{label}:");
    for person in persons.snapshot() {
        println!("  {} {}", person.id, person.personname);
    }
}
