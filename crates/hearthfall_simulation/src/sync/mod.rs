//! Delta-синхронизация состояния с наблюдателями.
//!
//! Сервер строит снапшот один раз за тик, для каждого наблюдателя считает
//! дельту относительно последнего отправленного ему снапшота.
//! `ClientProjection` применяет посылки и должна совпадать со снапшотом.

pub mod client;
pub mod delta;
pub mod snapshot;

pub use client::{parse_state, ClientProjection};
pub use delta::{compute_delta, diff_record, ObserverSync, StateDelta, StateMessage};
pub use snapshot::{build_snapshot, EntityRecord, Snapshot};
