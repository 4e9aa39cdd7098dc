use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::fsm::{self, EventInfo};
use crate::geometry;
use crate::mob::MobId;
use crate::script::EventType;
use crate::simulation::Simulation;

/// Settings bundle for a path-follow request, mirroring what the script
/// actions can ask for. The real graph search is an external collaborator;
/// these records are its request surface.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PathSettings {
    /// Keep going with a partial path instead of giving up when blocked.
    pub can_continue: bool,
    /// Walk straight through obstacle mobs.
    pub ignore_obstacles: bool,
    pub faked_start: Option<[f32; 2]>,
    pub faked_end: Option<[f32; 2]>,
    /// Re-target a moving mob instead of a fixed point.
    pub follow_mob: Option<MobId>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum PathResult {
    /// Straight shot, no graph needed.
    DirectPath,
    /// Went through the stop list.
    NormalPath,
    /// No usable path.
    NoPath,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum BlockReason {
    None,
    /// An obstacle mob sits across the route.
    Obstacle,
}

/// Live follow state on a mob: the stops still ahead and how the request
/// resolved.
#[derive(Clone, Debug)]
pub struct PathFollowState {
    pub stops: Vec<Vec2>,
    pub next: usize,
    pub goal: Vec2,
    pub settings: PathSettings,
    pub result: PathResult,
}

/// Stand-in resolver: a straight line to the goal, blocked only by
/// tangible path-blocking mobs crossing the segment. Keeps the
/// `on_path_done`/`on_path_blocked` flows real without a path graph.
pub fn compute_path(
    sim: &Simulation,
    mob: MobId,
    from: Vec2,
    goal: Vec2,
    settings: &PathSettings,
) -> (Vec<Vec2>, PathResult, BlockReason) {
    let start = settings
        .faked_start
        .map(|p| Vec2::new(p[0], p[1]))
        .unwrap_or(from);
    let end = settings
        .faked_end
        .map(|p| Vec2::new(p[0], p[1]))
        .unwrap_or(goal);

    if !settings.ignore_obstacles {
        let blocked = sim.arena.iter().any(|other| {
            other.id != mob
                && other.can_block_paths
                && other.tangible
                && !other.to_delete
                && geometry::segment_intersects_circle(start, end, other.pos, other.radius)
        });
        if blocked && !settings.can_continue {
            return (Vec::new(), PathResult::NoPath, BlockReason::Obstacle);
        }
    }

    (vec![end], PathResult::DirectPath, BlockReason::None)
}

/// Starts a follow request for the mob, raising `on_path_blocked`
/// immediately when the resolver has nothing to offer.
pub fn start_follow(
    sim: &mut Simulation,
    mob: MobId,
    goal: Vec2,
    settings: PathSettings,
    depth: u8,
) {
    let Some(m) = sim.arena.get(mob) else {
        return;
    };
    let from = m.pos;
    let (stops, result, reason) = compute_path(sim, mob, from, goal, &settings);

    if result == PathResult::NoPath {
        if let Some(m) = sim.arena.get_mut(mob) {
            m.path = None;
        }
        sim.bus.path_blocked(mob, reason);
        fsm::run_event(
            sim,
            mob,
            EventType::OnPathBlocked,
            &EventInfo::default(),
            depth + 1,
        );
        return;
    }

    if let Some(m) = sim.arena.get_mut(mob) {
        m.chase = None;
        m.path = Some(PathFollowState {
            stops,
            next: 0,
            goal,
            settings,
            result,
        });
    }
}
