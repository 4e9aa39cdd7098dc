use std::sync::Arc;

use bevy::prelude::*;

use crate::mob::MobId;
use crate::script::{compile_mob_type, MobType, MobTypeDef, StateDef};
use crate::simulation::Simulation;

/// Builds a state definition from `(event_name, action_lines)` pairs.
pub fn state(name: &str, events: &[(&str, &[&str])]) -> StateDef {
    StateDef {
        name: name.to_string(),
        events: events
            .iter()
            .map(|(ev, lines)| {
                (
                    ev.to_string(),
                    lines.iter().map(|l| l.to_string()).collect(),
                )
            })
            .collect(),
    }
}

/// A definition with every optional field defaulted; the first state in
/// the list becomes `first_state`.
pub fn type_def(name: &str, states: Vec<StateDef>) -> MobTypeDef {
    let first = states
        .first()
        .map(|s| s.name.clone())
        .unwrap_or_else(|| "idling".to_string());
    let mut def: MobTypeDef = serde_json::from_value(serde_json::json!({
        "name": name,
        "first_state": first,
    }))
    .expect("minimal def should deserialize");
    def.states = states;
    def
}

pub fn compiled_type(name: &str) -> Arc<MobType> {
    let def = type_def(name, vec![state("idling", &[])]);
    Arc::new(compile_mob_type(&def).expect("test type should compile"))
}

/// A simulation with the given type loaded and one mob of it spawned at
/// the origin. The camera covers the area so ticking stays active.
pub fn sim_with(def: MobTypeDef) -> (Simulation, MobId) {
    let name = def.name.clone();
    let mut sim = Simulation::new(Vec2::new(-2048.0, -2048.0), 4096.0, 4096.0, 0x5eed);
    sim.camera_box = Some((Vec2::splat(-1024.0), Vec2::splat(1024.0)));
    sim.load_content(std::slice::from_ref(&def))
        .expect("test content should load");
    let kind = sim.content.get(&name).expect("type should be registered");
    let id = sim.spawn_at(kind, Vec2::ZERO);
    (sim, id)
}
