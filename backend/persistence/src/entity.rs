use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A persistable record with a stable string id.
///
/// `to_json`/`from_json` must round-trip: rollback restores entities from
/// their JSON snapshot.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn id(&self) -> String;

    /// Every rule the entity breaks, or `Ok` if none.
    fn validate(&self) -> Result<(), Vec<String>> {
        Ok(())
    }

    fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    fn from_json(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}
