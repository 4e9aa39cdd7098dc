use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::animation::AnimationState;
use crate::script::MobType;

/// How many previous state names each mob remembers, for diagnostics.
pub const STATE_HISTORY_CAP: usize = 20;

/// Stable handle to a mob. Ids increment forever and are never reused, so
/// a stale id simply fails to resolve instead of aliasing a new mob.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize,
)]
pub struct MobId(pub u64);

/// Category identity, carried explicitly instead of run-time type
/// inspection. The interaction resolver branches on this.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MobCategory {
    Leader,
    Pikmin,
    Enemy,
    Tool,
    GroupTask,
    Carriable,
    Obstacle,
    #[default]
    Custom,
}

impl MobCategory {
    pub fn name(&self) -> &'static str {
        match self {
            MobCategory::Leader => "leader",
            MobCategory::Pikmin => "pikmin",
            MobCategory::Enemy => "enemy",
            MobCategory::Tool => "tool",
            MobCategory::GroupTask => "group_task",
            MobCategory::Carriable => "carriable",
            MobCategory::Obstacle => "obstacle",
            MobCategory::Custom => "custom",
        }
    }
}

#[derive(
    Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    #[default]
    None,
    Player,
    Enemy1,
    Enemy2,
    Obstacle,
    Other,
}

impl Team {
    pub fn from_name(name: &str) -> Option<Team> {
        match name {
            "none" => Some(Team::None),
            "player" => Some(Team::Player),
            "enemy_1" => Some(Team::Enemy1),
            "enemy_2" => Some(Team::Enemy2),
            "obstacle" => Some(Team::Obstacle),
            "other" => Some(Team::Other),
            _ => None,
        }
    }
}

/// Carrier spots on a carriable object. Membership in `spots` is the
/// carry reservation; `is_full` gates the near-carriable proximity event.
#[derive(Clone, Debug, Default)]
pub struct CarryInfo {
    pub spots: Vec<Option<MobId>>,
    pub is_moving: bool,
}

impl CarryInfo {
    pub fn new(max_carriers: usize) -> CarryInfo {
        CarryInfo {
            spots: vec![None; max_carriers],
            is_moving: false,
        }
    }

    pub fn is_full(&self) -> bool {
        self.spots.iter().all(|s| s.is_some())
    }

    pub fn carrier_count(&self) -> usize {
        self.spots.iter().filter(|s| s.is_some()).count()
    }

    pub fn release(&mut self, id: MobId) {
        for spot in &mut self.spots {
            if *spot == Some(id) {
                *spot = None;
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct GroupSpot {
    pub offset: Vec2,
    pub member: Option<MobId>,
}

/// A leader's follower formation. Members and spot assignments are
/// updated together; a member always owns exactly one spot.
#[derive(Clone, Debug, Default)]
pub struct Group {
    pub members: Vec<MobId>,
    pub spots: Vec<GroupSpot>,
    pub anchor: Vec2,
}

impl Group {
    pub fn add_member(&mut self, id: MobId, offset: Vec2) {
        if self.members.contains(&id) {
            return;
        }
        self.members.push(id);
        if let Some(spot) = self.spots.iter_mut().find(|s| s.member.is_none()) {
            spot.member = Some(id);
        } else {
            self.spots.push(GroupSpot {
                offset,
                member: Some(id),
            });
        }
    }

    pub fn remove_member(&mut self, id: MobId) {
        self.members.retain(|m| *m != id);
        for spot in &mut self.spots {
            if spot.member == Some(id) {
                spot.member = None;
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ChaseTarget {
    Point(Vec2),
    Mob(MobId),
}

#[derive(Clone, Debug)]
pub struct ChaseInfo {
    pub target: ChaseTarget,
    pub speed: f32,
}

/// Read-only snapshot of a mob's script-visible state, for external
/// debug overlays.
#[derive(Serialize, Clone)]
pub struct MobDebugInfo {
    pub id: u64,
    pub type_name: String,
    pub state: String,
    pub previous_states: Vec<String>,
    pub vars: HashMap<String, String>,
    pub timer_remaining: Option<f32>,
}

/// One live entity. All cross-mob references are `MobId`s resolved
/// through the arena; a missing id reads as "no reference".
pub struct Mob {
    pub id: MobId,
    pub mob_type: Arc<MobType>,
    pub state_idx: usize,
    pub previous_states: VecDeque<String>,
    pub vars: HashMap<String, String>,
    pub script_timer: Option<f32>,
    pub focus: Option<MobId>,
    pub focus_memory: HashMap<i64, MobId>,
    pub links: Vec<MobId>,
    pub parent: Option<MobId>,
    pub stored_in: Option<MobId>,

    pub pos: Vec2,
    pub z: f32,
    pub vz: f32,
    pub angle: f32,
    pub angle_cos: f32,
    pub angle_sin: f32,
    pub radius: f32,
    pub rectangular_dim: Option<Vec2>,
    pub height: f32,
    pub home: Vec2,
    pub gravity_mult: f32,

    pub health: f32,
    pub max_health: f32,
    pub team: Team,

    pub tangible: bool,
    pub huntable: bool,
    pub holdable: bool,
    pub hiding: bool,
    pub flying: bool,
    pub unpushable: bool,
    pub can_block_paths: bool,
    pub shadow_visible: bool,
    pub has_invisibility: bool,
    pub disables_attack: bool,

    pub near_reach: Option<usize>,
    pub far_reach: Option<usize>,

    pub chase: Option<ChaseInfo>,
    pub path: Option<crate::paths::PathFollowState>,
    pub standing_on: Option<MobId>,

    pub carry_info: Option<CarryInfo>,
    pub group: Option<Group>,
    pub task_workers: Vec<MobId>,
    pub holder: Option<(MobId, Option<usize>)>,
    pub holding: Vec<MobId>,
    pub reserved_by: Option<MobId>,

    pub chomp_max: usize,
    pub chomp_parts: Vec<usize>,
    pub chomping: Vec<MobId>,

    pub animation: AnimationState,

    pub time_alive: f32,
    pub is_active: bool,
    pub push_amount: f32,
    pub push_angle: f32,
    pub dying: bool,
    pub to_delete: bool,

    // Cached spans for the broad-phase reject.
    pub physical_span: f32,
    pub interaction_span: f32,
}

impl Mob {
    fn new(id: MobId, mob_type: Arc<MobType>, pos: Vec2, angle: f32) -> Mob {
        let carry_info = if mob_type.max_carriers > 0 {
            Some(CarryInfo::new(mob_type.max_carriers))
        } else {
            None
        };
        let group = if mob_type.category == MobCategory::Leader {
            Some(Group::default())
        } else {
            None
        };
        let mut mob = Mob {
            id,
            state_idx: mob_type.first_state,
            previous_states: VecDeque::new(),
            vars: HashMap::new(),
            script_timer: None,
            focus: None,
            focus_memory: HashMap::new(),
            links: Vec::new(),
            parent: None,
            stored_in: None,
            pos,
            z: 0.0,
            vz: 0.0,
            angle,
            angle_cos: angle.cos(),
            angle_sin: angle.sin(),
            radius: mob_type.radius,
            rectangular_dim: mob_type.rectangular_dim,
            height: mob_type.height,
            home: pos,
            gravity_mult: 1.0,
            health: mob_type.max_health,
            max_health: mob_type.max_health,
            team: mob_type.team,
            tangible: true,
            huntable: mob_type.huntable,
            holdable: mob_type.holdable,
            hiding: false,
            flying: mob_type.flying,
            unpushable: false,
            can_block_paths: mob_type.can_block_paths,
            shadow_visible: true,
            has_invisibility: false,
            disables_attack: false,
            near_reach: None,
            far_reach: None,
            chase: None,
            path: None,
            standing_on: None,
            carry_info,
            group,
            task_workers: Vec::new(),
            holder: None,
            holding: Vec::new(),
            reserved_by: None,
            chomp_max: 0,
            chomp_parts: Vec::new(),
            chomping: Vec::new(),
            animation: AnimationState::default(),
            time_alive: 0.0,
            is_active: false,
            push_amount: 0.0,
            push_angle: 0.0,
            dying: false,
            to_delete: false,
            physical_span: 0.0,
            interaction_span: 0.0,
            mob_type,
        };
        mob.update_spans();
        mob
    }

    pub fn state_name(&self) -> &str {
        self.mob_type
            .states
            .get(self.state_idx)
            .map(|s| s.name.as_str())
            .unwrap_or("")
    }

    /// Reads a script variable; absent keys read as empty, never an error.
    pub fn var(&self, name: &str) -> &str {
        self.vars.get(name).map(|v| v.as_str()).unwrap_or("")
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
        self.angle_cos = angle.cos();
        self.angle_sin = angle.sin();
    }

    /// Recomputes the cached span upper bounds. Call after anything that
    /// changes radius, footprint, or reach selection.
    pub fn update_spans(&mut self) {
        let mut physical = self.radius;
        if let Some(dim) = self.rectangular_dim {
            physical = physical.max((dim * 0.5).length());
        }
        physical = physical.max(self.mob_type.max_hitbox_span());
        self.physical_span = physical;

        // Task/proximity checks reach out to task_range, so the
        // broad-phase bound must cover it too.
        let mut interaction = physical.max(self.mob_type.task_range);
        if let Some(idx) = self.near_reach {
            if let Some(reach) = self.mob_type.reaches.get(idx) {
                interaction = interaction.max(reach.max_dist());
            }
        }
        if let Some(idx) = self.far_reach {
            if let Some(reach) = self.mob_type.reaches.get(idx) {
                interaction = interaction.max(reach.max_dist());
            }
        }
        self.interaction_span = interaction;
    }

    /// Team/huntability permission for noticing and chasing the other mob.
    pub fn can_hunt(&self, other: &Mob) -> bool {
        if !other.tangible || !other.huntable || other.hiding {
            return false;
        }
        self.team != other.team
    }

    /// Permission to actually damage the other mob.
    pub fn can_hurt(&self, other: &Mob) -> bool {
        if !other.tangible || other.dying {
            return false;
        }
        self.team != other.team
    }

    pub fn is_resistant_to(&self, hazard: &str) -> bool {
        self.mob_type.resistances.iter().any(|r| r == hazard)
    }

    pub fn is_resistant_to_all(&self, hazards: &[String]) -> bool {
        !hazards.is_empty() && hazards.iter().all(|h| self.is_resistant_to(h))
    }

    pub fn push_state_history(&mut self, state_name: String) {
        if self.previous_states.len() == STATE_HISTORY_CAP {
            self.previous_states.pop_back();
        }
        self.previous_states.push_front(state_name);
    }

    pub fn debug_info(&self) -> MobDebugInfo {
        MobDebugInfo {
            id: self.id.0,
            type_name: self.mob_type.name.clone(),
            state: self.state_name().to_string(),
            previous_states: self.previous_states.iter().cloned().collect(),
            vars: self.vars.clone(),
            timer_remaining: self.script_timer,
        }
    }
}

/// Central registry of live mobs. Iteration snapshots the id list up
/// front, so spawns mid-tick simply join the next walk; removal only
/// happens in the end-of-tick sweep.
#[derive(Default)]
pub struct MobArena {
    mobs: Vec<Mob>,
    index: HashMap<MobId, usize>,
    next_id: u64,
}

impl MobArena {
    pub fn spawn(&mut self, mob_type: Arc<MobType>, pos: Vec2, angle: f32) -> MobId {
        self.next_id += 1;
        let id = MobId(self.next_id);
        let mob = Mob::new(id, mob_type, pos, angle);
        self.index.insert(id, self.mobs.len());
        self.mobs.push(mob);
        id
    }

    pub fn get(&self, id: MobId) -> Option<&Mob> {
        self.index.get(&id).map(|&i| &self.mobs[i])
    }

    pub fn get_mut(&mut self, id: MobId) -> Option<&mut Mob> {
        let i = *self.index.get(&id)?;
        Some(&mut self.mobs[i])
    }

    pub fn contains(&self, id: MobId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.mobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mob> {
        self.mobs.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Mob> {
        self.mobs.iter_mut()
    }

    /// Snapshot of live ids, in spawn order. Tick loops walk this so that
    /// structural changes mid-iteration can't invalidate the walk.
    pub fn ids(&self) -> Vec<MobId> {
        self.mobs.iter().map(|m| m.id).collect()
    }

    /// Removes every mob flagged `to_delete` and scrubs inbound
    /// references from the survivors. Returns the removed ids.
    pub fn sweep_deleted(&mut self) -> Vec<MobId> {
        let doomed: Vec<MobId> = self
            .mobs
            .iter()
            .filter(|m| m.to_delete)
            .map(|m| m.id)
            .collect();
        if doomed.is_empty() {
            return doomed;
        }

        self.mobs.retain(|m| !m.to_delete);
        for mob in &mut self.mobs {
            for dead in &doomed {
                let dead = *dead;
                if mob.focus == Some(dead) {
                    mob.focus = None;
                }
                if mob.parent == Some(dead) {
                    mob.parent = None;
                }
                if mob.stored_in == Some(dead) {
                    mob.stored_in = None;
                }
                if mob.reserved_by == Some(dead) {
                    mob.reserved_by = None;
                }
                if mob.standing_on == Some(dead) {
                    mob.standing_on = None;
                }
                if let Some((holder, _)) = mob.holder {
                    if holder == dead {
                        mob.holder = None;
                    }
                }
                mob.links.retain(|l| *l != dead);
                mob.holding.retain(|h| *h != dead);
                mob.chomping.retain(|c| *c != dead);
                mob.task_workers.retain(|w| *w != dead);
                mob.focus_memory.retain(|_, v| *v != dead);
                if let Some(carry) = &mut mob.carry_info {
                    carry.release(dead);
                }
                if let Some(group) = &mut mob.group {
                    group.remove_member(dead);
                }
                if let Some(chase) = &mob.chase {
                    if chase.target == ChaseTarget::Mob(dead) {
                        mob.chase = None;
                    }
                }
            }
        }

        self.index.clear();
        for (i, mob) in self.mobs.iter().enumerate() {
            self.index.insert(mob.id, i);
        }
        doomed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::compiled_type;

    #[test]
    fn ids_are_never_reused() {
        let mut arena = MobArena::default();
        let kind = compiled_type("critter");
        let a = arena.spawn(kind.clone(), Vec2::ZERO, 0.0);
        arena.get_mut(a).unwrap().to_delete = true;
        arena.sweep_deleted();
        let b = arena.spawn(kind, Vec2::ZERO, 0.0);
        assert_ne!(a, b);
        assert!(arena.get(a).is_none());
    }

    #[test]
    fn sweep_scrubs_inbound_references() {
        let mut arena = MobArena::default();
        let kind = compiled_type("critter");
        let target = arena.spawn(kind.clone(), Vec2::ZERO, 0.0);
        let watcher = arena.spawn(kind, Vec2::ZERO, 0.0);
        {
            let w = arena.get_mut(watcher).unwrap();
            w.focus = Some(target);
            w.links.push(target);
            w.chomping.push(target);
            w.focus_memory.insert(0, target);
            w.chase = Some(ChaseInfo {
                target: ChaseTarget::Mob(target),
                speed: 10.0,
            });
        }
        arena.get_mut(target).unwrap().to_delete = true;
        let removed = arena.sweep_deleted();
        assert_eq!(removed, vec![target]);
        let w = arena.get(watcher).unwrap();
        assert!(w.focus.is_none());
        assert!(w.links.is_empty());
        assert!(w.chomping.is_empty());
        assert!(w.focus_memory.is_empty());
        assert!(w.chase.is_none());
    }

    #[test]
    fn absent_vars_read_as_empty() {
        let mut arena = MobArena::default();
        let id = arena.spawn(compiled_type("critter"), Vec2::ZERO, 0.0);
        let mob = arena.get_mut(id).unwrap();
        assert_eq!(mob.var("missing"), "");
        mob.vars.insert("count".into(), "3".into());
        assert_eq!(mob.var("count"), "3");
        // Keys are case-sensitive.
        assert_eq!(mob.var("Count"), "");
    }

    #[test]
    fn group_membership_and_spots_stay_in_lockstep() {
        let mut group = Group::default();
        let a = MobId(1);
        let b = MobId(2);
        group.add_member(a, Vec2::new(1.0, 0.0));
        group.add_member(b, Vec2::new(2.0, 0.0));
        assert_eq!(group.members.len(), 2);
        assert_eq!(
            group.spots.iter().filter(|s| s.member.is_some()).count(),
            2
        );
        group.remove_member(a);
        assert_eq!(group.members, vec![b]);
        assert_eq!(
            group.spots.iter().filter(|s| s.member.is_some()).count(),
            1
        );
        // Freed spot gets reused.
        let c = MobId(3);
        group.add_member(c, Vec2::ZERO);
        assert_eq!(group.spots.len(), 2);
    }

    #[test]
    fn hunt_rules_respect_team_and_flags() {
        let mut arena = MobArena::default();
        let kind = compiled_type("critter");
        let hunter = arena.spawn(kind.clone(), Vec2::ZERO, 0.0);
        let prey = arena.spawn(kind, Vec2::ZERO, 0.0);
        arena.get_mut(hunter).unwrap().team = Team::Enemy1;
        arena.get_mut(prey).unwrap().team = Team::Player;

        let h = arena.get(hunter).unwrap();
        let p = arena.get(prey).unwrap();
        assert!(h.can_hunt(p));

        arena.get_mut(prey).unwrap().hiding = true;
        assert!(!arena.get(hunter).unwrap().can_hunt(arena.get(prey).unwrap()));
        arena.get_mut(prey).unwrap().hiding = false;
        arena.get_mut(prey).unwrap().huntable = false;
        assert!(!arena.get(hunter).unwrap().can_hunt(arena.get(prey).unwrap()));
        // Hurting ignores huntable but respects teams.
        assert!(arena.get(hunter).unwrap().can_hurt(arena.get(prey).unwrap()));
        arena.get_mut(prey).unwrap().team = Team::Enemy1;
        assert!(!arena.get(hunter).unwrap().can_hurt(arena.get(prey).unwrap()));
    }

    #[test]
    fn state_history_evicts_oldest() {
        let mut arena = MobArena::default();
        let id = arena.spawn(compiled_type("critter"), Vec2::ZERO, 0.0);
        let mob = arena.get_mut(id).unwrap();
        for i in 0..(STATE_HISTORY_CAP + 5) {
            mob.push_state_history(format!("state_{}", i));
        }
        assert_eq!(mob.previous_states.len(), STATE_HISTORY_CAP);
        assert_eq!(mob.previous_states[0], format!("state_{}", STATE_HISTORY_CAP + 4));
    }
}
