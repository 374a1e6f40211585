use cqrs_hub::{
    Command, Denormalizer, HandlerError, HubConfig, LiveModel, Loopback, ModelCollection, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, LiveModel)]
pub struct Person {
    pub id: String,
    pub personname: String,
}

/// The person list application, minus the UI.
pub struct PeopleApp {
    pub router: Router,
    pub persons: ModelCollection<Person>,
}

impl PeopleApp {
    pub fn new() -> Self {
        let router = Router::new();
        router.init(HubConfig::default()).unwrap();
        let persons = ModelCollection::new();

        Loopback::attach(router.hub(), server()).unwrap();

        // personCreated builds a new live person instead of updating one
        let created_into = persons.clone();
        let registry = router.registry().clone();
        Denormalizer::new("personCreated", Person::MODEL_NAME)
            .on_handle(move |_d, event| {
                let data = event.get("payload").cloned().unwrap_or(Value::Null);
                let person: Person = serde_json::from_value(data)?;
                created_into
                    .insert_bound(person, &registry)
                    .map_err(HandlerError::other)?;
                Ok(())
            })
            .register(router.registry())
            .unwrap();

        Denormalizer::new("personChanged", Person::MODEL_NAME)
            .register(router.registry())
            .unwrap();

        let app = Self { router, persons };
        for name in ["Tim", "Ida", "Rob"] {
            app.persons
                .insert_bound(
                    Person {
                        id: next_id(),
                        personname: name.to_string(),
                    },
                    app.router.registry(),
                )
                .unwrap();
        }
        app
    }

    pub fn create_person(&self, name: &str) -> Command {
        let cmd = Command::new("createPerson", json!({ "personname": name })).with_new_id();
        cmd.emit(self.router.hub()).unwrap();
        cmd
    }

    pub fn change_person(&self, id: &str, name: &str) -> Command {
        let cmd = Command::new("changePerson", json!({ "id": id, "personname": name }));
        cmd.emit(self.router.hub()).unwrap();
        cmd
    }

    pub fn names(&self) -> Vec<String> {
        self.persons
            .snapshot()
            .into_iter()
            .map(|person| person.personname)
            .collect()
    }
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> String {
    format!("p{}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// Answers commands the way the remote side would: createPerson gets an id
/// assigned, both commands come back as their past-tense events.
fn server() -> impl Fn(&Value) -> Option<Value> + Send + Sync + 'static {
    |cmd| {
        let mut event = cmd.clone();
        let name = match cmd["name"].as_str()? {
            "createPerson" => {
                event["payload"]["id"] = json!(next_id());
                "personCreated"
            }
            "changePerson" => "personChanged",
            _ => return None,
        };
        event["name"] = json!(name);
        event["commandId"] = cmd["id"].clone();
        Some(event)
    }
}
