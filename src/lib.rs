mod actions;
mod activity;
mod animation;
mod events;
mod fsm;
mod geometry;
mod interaction;
mod mob;
mod paths;
mod script;
mod simulation;
#[cfg(test)]
mod testutil;

pub use actions::{ActionKind, ActionRegistry, ParamType};
pub use activity::{ActivityGrid, AREA_CELL_SIZE};
pub use animation::{Animation, AnimationState, FrameHitbox, HitboxKind};
pub use events::{SimEvent, SimEventBus};
pub use fsm::{run_event, EventInfo, MAX_EVENT_DEPTH};
pub use mob::{Mob, MobArena, MobCategory, MobDebugInfo, MobId, Team};
pub use paths::{BlockReason, PathFollowState, PathResult, PathSettings};
pub use script::{
    compile_mob_type, ContentLibrary, EventType, MobType, MobTypeDef, ScriptError,
};
pub use simulation::{SimConfig, Simulation, SimulationPlugin};

use bevy::prelude::*;

/// Drop-in wiring for a host app: steps the `Simulation` resource once
/// per fixed update, once one has been inserted.
pub struct FeralPlugin;

impl Plugin for FeralPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(SimulationPlugin);
    }
}
