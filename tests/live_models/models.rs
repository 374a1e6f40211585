use cqrs_hub::{HandlerError, LiveModel};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, LiveModel)]
pub struct OrderLine {
    pub id: u64,
    pub sku: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, LiveModel)]
#[live_model(name = "bill")]
pub struct Invoice {
    #[live_model(id)]
    pub number: String,
    pub total: f64,
    pub paid: bool,
}

/// Counts visits instead of overwriting them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub visits: u64,
}

impl LiveModel for Profile {
    const MODEL_NAME: &'static str = "profile";

    fn model_id(&self) -> String {
        self.id.clone()
    }

    fn apply(&mut self, data: &Value) -> Result<(), HandlerError> {
        let visits = data
            .get("visits")
            .and_then(Value::as_u64)
            .ok_or_else(|| HandlerError::Rejected("missing visits".into()))?;
        self.visits += visits;
        Ok(())
    }
}
