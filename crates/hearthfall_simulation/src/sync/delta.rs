//! Дельта между снапшотами.
//!
//! Первая отправка наблюдателю всегда полная. Дальше уходят только
//! изменившиеся поля (с id), новые сущности целиком, id исчезнувших.
//! Пустая дельта не отправляется.

use serde::Serialize;
use serde_json::Value;

use super::snapshot::{EntityRecord, Snapshot};
use crate::error::SimError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StateDelta {
    Full {
        entities: Snapshot,
    },
    Delta {
        /// id → изменившиеся поля (новые сущности целиком)
        updated: Snapshot,
        removed: Vec<u64>,
    },
}

impl StateDelta {
    pub fn is_full(&self) -> bool {
        matches!(self, StateDelta::Full { .. })
    }
}

/// Патч записи: id + поля, отличающиеся от прошлого. None, если отличий нет.
pub fn diff_record(prev: &EntityRecord, cur: &EntityRecord) -> Option<EntityRecord> {
    let mut patch = EntityRecord::new();
    for (key, value) in cur {
        if prev.get(key) != Some(value) {
            patch.insert(key.clone(), value.clone());
        }
    }
    if patch.is_empty() {
        return None;
    }
    if let Some(id) = cur.get("id") {
        patch.insert("id".to_string(), id.clone());
    }
    Some(patch)
}

pub fn compute_delta(prev: Option<&Snapshot>, cur: &Snapshot) -> Option<StateDelta> {
    let Some(prev) = prev else {
        return Some(StateDelta::Full {
            entities: cur.clone(),
        });
    };

    let updated: Snapshot = cur
        .iter()
        .filter_map(|(id, record)| {
            let patch = match prev.get(id) {
                Some(old) => diff_record(old, record)?,
                None => record.clone(),
            };
            Some((*id, patch))
        })
        .collect();
    let removed: Vec<u64> = prev
        .keys()
        .filter(|id| !cur.contains_key(id))
        .copied()
        .collect();

    if updated.is_empty() && removed.is_empty() {
        return None;
    }
    Some(StateDelta::Delta { updated, removed })
}

/// Сообщение наблюдателю за тик
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMessage {
    pub tick: u64,
    pub your_id: Option<u64>,
    pub last_input_seq: u64,
    #[serde(flatten)]
    pub payload: StateDelta,
}

impl StateMessage {
    pub fn to_json(&self) -> Result<Value, SimError> {
        serde_json::to_value(self).map_err(SimError::Encode)
    }
}

/// Что наблюдатель видел в последний раз
#[derive(Debug, Clone, Default)]
pub struct ObserverSync {
    last_sent: Option<Snapshot>,
}

impl ObserverSync {
    /// Следующая посылка или None, если нечего слать.
    pub fn sync(&mut self, cur: &Snapshot) -> Option<StateDelta> {
        let delta = compute_delta(self.last_sent.as_ref(), cur)?;
        self.last_sent = Some(cur.clone());
        Some(delta)
    }

    /// Следующий sync будет полным (rejoin, respawn)
    pub fn reset(&mut self) {
        self.last_sent = None;
    }

    pub fn has_baseline(&self) -> bool {
        self.last_sent.is_some()
    }
}
