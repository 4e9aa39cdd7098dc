use bevy::prelude::*;
use serde::Serialize;
use std::collections::VecDeque;

use crate::mob::MobId;
use crate::paths::BlockReason;

const MAX_EVENTS: usize = 500;

/// One entry in the diagnostics feed. This is the read-only surface
/// external inspectors and debug overlays consume.
#[derive(Serialize, Clone)]
pub struct SimEvent {
    pub name: String,
    pub data: serde_json::Value,
    pub frame: u64,
    pub source: Option<u64>,
}

#[derive(Default)]
pub struct SimEventBus {
    pub recent: VecDeque<SimEvent>,
    pub frame: u64,
    pub dropped_events: u64,
    last_overflow_log_frame: u64,
}

impl SimEventBus {
    pub fn emit(
        &mut self,
        name: impl Into<String>,
        data: serde_json::Value,
        source: Option<MobId>,
    ) {
        self.recent.push_back(SimEvent {
            name: name.into(),
            data,
            frame: self.frame,
            source: source.map(|id| id.0),
        });
        if self.recent.len() > MAX_EVENTS {
            let excess = self.recent.len() - MAX_EVENTS;
            for _ in 0..excess {
                self.recent.pop_front();
            }
            self.dropped_events = self.dropped_events.saturating_add(excess as u64);
            if self.frame.saturating_sub(self.last_overflow_log_frame) >= 60 {
                self.last_overflow_log_frame = self.frame;
                warn!(
                    "dropped {} buffered sim events (total dropped: {})",
                    excess, self.dropped_events
                );
            }
        }
    }

    pub fn spawn(&mut self, id: MobId, type_name: &str) {
        self.emit(
            "mob_spawned",
            serde_json::json!({ "type": type_name }),
            Some(id),
        );
    }

    pub fn state_change(&mut self, id: MobId, from: &str, to: &str) {
        self.emit(
            "state_change",
            serde_json::json!({ "from": from, "to": to }),
            Some(id),
        );
    }

    pub fn death(&mut self, id: MobId) {
        self.emit("mob_death", serde_json::Value::Null, Some(id));
    }

    pub fn sound(&mut self, id: MobId, name: &str, start: bool) {
        self.emit(
            if start { "sound_play" } else { "sound_stop" },
            serde_json::json!({ "sound": name }),
            Some(id),
        );
    }

    pub fn message(&mut self, from: MobId, to: MobId) {
        self.emit(
            "message_sent",
            serde_json::json!({ "to": to.0 }),
            Some(from),
        );
    }

    pub fn print(&mut self, id: MobId, text: &str) {
        self.emit("print", serde_json::json!({ "text": text }), Some(id));
    }

    pub fn path_blocked(&mut self, id: MobId, reason: BlockReason) {
        self.emit(
            "path_blocked",
            serde_json::json!({ "reason": format!("{:?}", reason) }),
            Some(id),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_bus_tracks_dropped_events() {
        let mut bus = SimEventBus::default();
        for i in 0..(MAX_EVENTS + 25) {
            bus.emit("test", serde_json::json!({ "i": i }), None);
        }
        assert_eq!(bus.recent.len(), MAX_EVENTS);
        assert!(bus.dropped_events >= 25);
    }
}
