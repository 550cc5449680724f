//! Клиентская сторона: применение full/delta к локальной проекции.

use serde_json::Value;

use super::delta::StateDelta;
use super::snapshot::{EntityRecord, Snapshot};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientProjection {
    pub entities: Snapshot,
}

fn records(value: Option<&Value>) -> Snapshot {
    value
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(id, record)| {
                    let id = id.parse::<u64>().ok()?;
                    let record: EntityRecord = record.as_object()?.clone();
                    Some((id, record))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Разбирает state-сообщение с провода. None для event-сообщений.
pub fn parse_state(message: &Value) -> Option<StateDelta> {
    match message.get("type")?.as_str()? {
        "full" => Some(StateDelta::Full {
            entities: records(message.get("entities")),
        }),
        "delta" => Some(StateDelta::Delta {
            updated: records(message.get("updated")),
            removed: message
                .get("removed")
                .and_then(Value::as_array)
                .map(|ids| ids.iter().filter_map(Value::as_u64).collect())
                .unwrap_or_default(),
        }),
        _ => None,
    }
}

impl ClientProjection {
    pub fn apply(&mut self, delta: &StateDelta) {
        match delta {
            StateDelta::Full { entities } => {
                self.entities = entities.clone();
            }
            StateDelta::Delta { updated, removed } => {
                for (id, patch) in updated {
                    let record = self.entities.entry(*id).or_default();
                    for (key, value) in patch {
                        record.insert(key.clone(), value.clone());
                    }
                }
                for id in removed {
                    self.entities.remove(id);
                }
            }
        }
    }

    /// true если сообщение было state-сообщением
    pub fn apply_message(&mut self, message: &Value) -> bool {
        match parse_state(message) {
            Some(delta) => {
                self.apply(&delta);
                true
            }
            None => false,
        }
    }
}
