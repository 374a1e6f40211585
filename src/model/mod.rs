//! Live models - entity instances kept current by projected changes.
//!
//! A [`LiveModel`] names its model type and instance id; once wrapped in a
//! [`Live`] and bound to a registry it listens on the `change:<id>` channels
//! of every denormalizer registered for its model and merges each change into
//! itself.
//!
//! ## Example
//!
//! ```
//! use cqrs_hub::{Denormalizer, Event, Live, LiveModel, ProjectionRegistry};
//! use serde::{Deserialize, Serialize};
//! use serde_json::json;
//!
//! #[derive(Clone, Serialize, Deserialize, LiveModel)]
//! struct Person {
//!     id: String,
//!     personname: String,
//! }
//!
//! let registry = ProjectionRegistry::new();
//! Denormalizer::new("personChanged", "person").register(&registry).unwrap();
//!
//! let ida = Live::new(Person { id: "p1".into(), personname: "Ida".into() });
//! ida.bind(&registry).unwrap();
//!
//! let changed = Event::new("personChanged", json!({ "payload": { "personname": "Ada" } }))
//!     .with_id("p1");
//! registry.handle(&changed).unwrap();
//!
//! assert_eq!(ida.snapshot().personname, "Ada");
//! ```

mod collection;
mod live;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::HandlerError;

pub use collection::ModelCollection;
pub use live::Live;

/// Trait for entity types that can be kept current by denormalizers.
///
/// Usually derived: `#[derive(LiveModel)]`, with `#[live_model(name = "...")]`
/// on the type to override the model name and `#[live_model(id)]` on a field
/// to pick the id field (defaults: the snake_case type name and `id`).
pub trait LiveModel: Serialize + DeserializeOwned + Send + 'static {
    /// The model type name denormalizers are registered for (`for_model`).
    const MODEL_NAME: &'static str;

    /// The instance id, as it appears in events' entity id field.
    fn model_id(&self) -> String;

    /// `<model>:<id>`, the key the registry subscribes this instance under.
    fn entity_key(&self) -> String {
        format!("{}:{}", Self::MODEL_NAME, self.model_id())
    }

    /// Merge projected data into the instance.
    ///
    /// The default overwrites each field named in the data object and keeps
    /// all others; `null` data is ignored.
    fn apply(&mut self, data: &Value) -> Result<(), HandlerError> {
        merge_fields(self, data)
    }
}

/// Shallow-merge a JSON object into `model`'s serialized fields.
pub fn merge_fields<T>(model: &mut T, data: &Value) -> Result<(), HandlerError>
where
    T: Serialize + DeserializeOwned,
{
    let changes = match data {
        Value::Null => return Ok(()),
        Value::Object(changes) => changes,
        other => {
            return Err(HandlerError::Rejected(format!(
                "expected an object of changed fields, got {other}"
            )))
        }
    };

    let mut current = serde_json::to_value(&*model)?;
    let Value::Object(fields) = &mut current else {
        return Err(HandlerError::Rejected(
            "model does not serialize to an object".to_string(),
        ));
    };
    for (key, value) in changes {
        fields.insert(key.clone(), value.clone());
    }
    *model = serde_json::from_value(current)?;
    Ok(())
}
