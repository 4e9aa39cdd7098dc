use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::actions::{self, ActionKind, ParamType};
use crate::animation::{Animation, Frame, FrameHitbox, HitboxKind};
use crate::mob::{MobCategory, Team};

/// Every event a mob script can react to. Closed set, known at compile
/// time of the content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum EventType {
    OnEnter,
    OnLeave,
    OnTick,
    OnReady,
    OnTimer,
    OnAnimationEnd,
    OnTouchObject,
    OnTouchOpponent,
    OnTouchHazard,
    OnReachObject,
    OnReachOpponent,
    OnReachedDestination,
    OnReceiveMessage,
    OnNearCarriable,
    OnNearTool,
    OnNearGroupTask,
    OnTouchActiveLeader,
    OnHitboxAttack,
    OnHitboxTouched,
    OnHitboxContact,
    OnHitboxEaten,
    OnDamage,
    OnDeath,
    OnFocusGone,
    OnFrameSignal,
    OnHeld,
    OnReleased,
    OnPathBlocked,
    OnPathDone,
}

pub const ALL_EVENTS: [EventType; 29] = [
    EventType::OnEnter,
    EventType::OnLeave,
    EventType::OnTick,
    EventType::OnReady,
    EventType::OnTimer,
    EventType::OnAnimationEnd,
    EventType::OnTouchObject,
    EventType::OnTouchOpponent,
    EventType::OnTouchHazard,
    EventType::OnReachObject,
    EventType::OnReachOpponent,
    EventType::OnReachedDestination,
    EventType::OnReceiveMessage,
    EventType::OnNearCarriable,
    EventType::OnNearTool,
    EventType::OnNearGroupTask,
    EventType::OnTouchActiveLeader,
    EventType::OnHitboxAttack,
    EventType::OnHitboxTouched,
    EventType::OnHitboxContact,
    EventType::OnHitboxEaten,
    EventType::OnDamage,
    EventType::OnDeath,
    EventType::OnFocusGone,
    EventType::OnFrameSignal,
    EventType::OnHeld,
    EventType::OnReleased,
    EventType::OnPathBlocked,
    EventType::OnPathDone,
];

impl EventType {
    pub fn from_name(name: &str) -> Option<EventType> {
        let ev = match name {
            "on_enter" => EventType::OnEnter,
            "on_leave" => EventType::OnLeave,
            "on_tick" => EventType::OnTick,
            "on_ready" => EventType::OnReady,
            "on_timer" => EventType::OnTimer,
            "on_animation_end" => EventType::OnAnimationEnd,
            "on_touch_object" => EventType::OnTouchObject,
            "on_touch_opponent" => EventType::OnTouchOpponent,
            "on_touch_hazard" => EventType::OnTouchHazard,
            "on_reach_object" => EventType::OnReachObject,
            "on_reach_opponent" => EventType::OnReachOpponent,
            "on_reached_destination" => EventType::OnReachedDestination,
            "on_receive_message" => EventType::OnReceiveMessage,
            "on_near_carriable" => EventType::OnNearCarriable,
            "on_near_tool" => EventType::OnNearTool,
            "on_near_group_task" => EventType::OnNearGroupTask,
            "on_touch_active_leader" => EventType::OnTouchActiveLeader,
            "on_hitbox_attack" => EventType::OnHitboxAttack,
            "on_hitbox_touched" => EventType::OnHitboxTouched,
            "on_hitbox_contact" => EventType::OnHitboxContact,
            "on_hitbox_eaten" => EventType::OnHitboxEaten,
            "on_damage" => EventType::OnDamage,
            "on_death" => EventType::OnDeath,
            "on_focus_gone" => EventType::OnFocusGone,
            "on_frame_signal" => EventType::OnFrameSignal,
            "on_held" => EventType::OnHeld,
            "on_released" => EventType::OnReleased,
            "on_path_blocked" => EventType::OnPathBlocked,
            "on_path_done" => EventType::OnPathDone,
            _ => return None,
        };
        Some(ev)
    }

    pub fn name(&self) -> &'static str {
        match self {
            EventType::OnEnter => "on_enter",
            EventType::OnLeave => "on_leave",
            EventType::OnTick => "on_tick",
            EventType::OnReady => "on_ready",
            EventType::OnTimer => "on_timer",
            EventType::OnAnimationEnd => "on_animation_end",
            EventType::OnTouchObject => "on_touch_object",
            EventType::OnTouchOpponent => "on_touch_opponent",
            EventType::OnTouchHazard => "on_touch_hazard",
            EventType::OnReachObject => "on_reach_object",
            EventType::OnReachOpponent => "on_reach_opponent",
            EventType::OnReachedDestination => "on_reached_destination",
            EventType::OnReceiveMessage => "on_receive_message",
            EventType::OnNearCarriable => "on_near_carriable",
            EventType::OnNearTool => "on_near_tool",
            EventType::OnNearGroupTask => "on_near_group_task",
            EventType::OnTouchActiveLeader => "on_touch_active_leader",
            EventType::OnHitboxAttack => "on_hitbox_attack",
            EventType::OnHitboxTouched => "on_hitbox_touched",
            EventType::OnHitboxContact => "on_hitbox_contact",
            EventType::OnHitboxEaten => "on_hitbox_eaten",
            EventType::OnDamage => "on_damage",
            EventType::OnDeath => "on_death",
            EventType::OnFocusGone => "on_focus_gone",
            EventType::OnFrameSignal => "on_frame_signal",
            EventType::OnHeld => "on_held",
            EventType::OnReleased => "on_released",
            EventType::OnPathBlocked => "on_path_blocked",
            EventType::OnPathDone => "on_path_done",
        }
    }
}

/// One argument of a compiled action call. Var references are written as
/// `$name` in the source and resolved against the mob's variables at
/// run time.
#[derive(Clone, Debug)]
pub struct ActionArg {
    pub value: String,
    pub is_var: bool,
}

/// A single compiled instruction inside an action list.
#[derive(Clone, Debug)]
pub struct ActionCall {
    pub kind: ActionKind,
    pub args: Vec<ActionArg>,
}

impl ActionCall {
    /// Literal value of argument `idx`, or empty if out of range. Only
    /// valid for args known to be constant.
    pub fn const_arg(&self, idx: usize) -> &str {
        self.args.get(idx).map(|a| a.value.as_str()).unwrap_or("")
    }
}

/// A flattened, ordered list of action calls, plus a label index for
/// `goto` resolution. Labels are intra-list only.
#[derive(Clone, Debug, Default)]
pub struct ActionList {
    pub calls: Vec<ActionCall>,
    labels: HashMap<String, usize>,
}

impl ActionList {
    pub fn label(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }
}

#[derive(Debug)]
pub struct State {
    pub name: String,
    pub events: HashMap<EventType, ActionList>,
}

/// A reach: two distance/half-angle pairs forming a detection cone.
/// A candidate qualifies if it fits either pair.
#[derive(Clone, Debug)]
pub struct Reach {
    pub name: String,
    pub dist_1: f32,
    pub half_angle_1: f32,
    pub dist_2: f32,
    pub half_angle_2: f32,
}

impl Reach {
    pub fn max_dist(&self) -> f32 {
        self.dist_1.max(self.dist_2)
    }
}

#[derive(Clone, Debug)]
pub struct SpawnInfo {
    pub name: String,
    pub object: String,
    pub offset: Vec3,
    pub angle: f32,
    pub relative: bool,
    pub link_object_to_spawn: bool,
    pub link_spawn_to_object: bool,
}

/// Immutable blueprint shared by every instance of a mob kind. Built once
/// at content-load time and held behind an `Arc` by each live mob.
#[derive(Debug)]
pub struct MobType {
    pub name: String,
    pub category: MobCategory,
    pub team: Team,
    pub max_health: f32,
    pub radius: f32,
    pub rectangular_dim: Option<Vec2>,
    pub height: f32,
    pub move_speed: f32,
    pub task_range: f32,
    pub pushable: bool,
    pub pushes: bool,
    pub pushes_with_hitboxes: bool,
    pub pushes_softly: bool,
    pub huntable: bool,
    pub holdable: bool,
    pub flying: bool,
    pub can_block_paths: bool,
    pub max_carriers: usize,
    pub max_task_workers: usize,
    pub resistances: Vec<String>,
    pub inactive_ticks: bool,
    pub inactive_interactions: bool,
    pub reaches: Vec<Reach>,
    pub spawns: Vec<SpawnInfo>,
    pub animations: HashMap<String, Animation>,
    pub states: Vec<State>,
    pub state_index: HashMap<String, usize>,
    pub first_state: usize,
    pub death_state: Option<usize>,
    /// State the interaction resolver treats as "actively leading", for
    /// the touched-active-leader bump check.
    pub active_state: Option<usize>,
    /// State the push resolver treats as "standing around", for the
    /// reduced idle-vs-idle push.
    pub idle_state: Option<usize>,
    pub global_events: HashMap<EventType, ActionList>,
}

impl MobType {
    pub fn state_named(&self, name: &str) -> Option<usize> {
        self.state_index.get(name).copied()
    }

    pub fn reach_named(&self, name: &str) -> Option<usize> {
        self.reaches.iter().position(|r| r.name == name)
    }

    pub fn spawn_named(&self, name: &str) -> Option<&SpawnInfo> {
        self.spawns.iter().find(|s| s.name == name)
    }

    /// Whether an event dispatched in the given state would find a
    /// handler, in the state itself or in the global table.
    pub fn has_handler(&self, state_idx: usize, ev: EventType) -> bool {
        self.states
            .get(state_idx)
            .map(|s| s.events.contains_key(&ev))
            .unwrap_or(false)
            || self.global_events.contains_key(&ev)
    }

    /// Largest span any hitbox of any animation frame reaches, used to
    /// size the physical span cache.
    pub fn max_hitbox_span(&self) -> f32 {
        let mut span: f32 = 0.0;
        for anim in self.animations.values() {
            for frame in &anim.frames {
                for hb in &frame.hitboxes {
                    span = span.max(hb.offset.length() + hb.radius);
                }
            }
        }
        span
    }
}

// ---------------------------------------------------------------------------
// Definition trees (what the external text-format loader hands us).

fn default_true() -> bool {
    true
}

fn default_health() -> f32 {
    100.0
}

fn default_radius() -> f32 {
    16.0
}

fn default_move_speed() -> f32 {
    60.0
}

fn default_task_range() -> f32 {
    50.0
}

#[derive(Deserialize, Serialize, Clone)]
pub struct MobTypeDef {
    pub name: String,
    #[serde(default)]
    pub category: MobCategory,
    #[serde(default)]
    pub team: Team,
    #[serde(default = "default_health")]
    pub max_health: f32,
    #[serde(default = "default_radius")]
    pub radius: f32,
    #[serde(default)]
    pub rectangular_dim: Option<[f32; 2]>,
    #[serde(default)]
    pub height: f32,
    #[serde(default = "default_move_speed")]
    pub move_speed: f32,
    #[serde(default = "default_task_range")]
    pub task_range: f32,
    #[serde(default = "default_true")]
    pub pushable: bool,
    #[serde(default)]
    pub pushes: bool,
    #[serde(default)]
    pub pushes_with_hitboxes: bool,
    #[serde(default)]
    pub pushes_softly: bool,
    #[serde(default = "default_true")]
    pub huntable: bool,
    #[serde(default)]
    pub holdable: bool,
    #[serde(default)]
    pub flying: bool,
    #[serde(default)]
    pub can_block_paths: bool,
    #[serde(default)]
    pub max_carriers: usize,
    #[serde(default)]
    pub max_task_workers: usize,
    #[serde(default)]
    pub resistances: Vec<String>,
    #[serde(default)]
    pub inactive_ticks: bool,
    #[serde(default)]
    pub inactive_interactions: bool,
    #[serde(default)]
    pub reaches: Vec<ReachDef>,
    #[serde(default)]
    pub spawns: Vec<SpawnDef>,
    #[serde(default)]
    pub animations: Vec<AnimationDef>,
    pub first_state: String,
    #[serde(default)]
    pub death_state: Option<String>,
    #[serde(default)]
    pub active_state: Option<String>,
    #[serde(default)]
    pub idle_state: Option<String>,
    #[serde(default)]
    pub states: Vec<StateDef>,
    #[serde(default)]
    pub global_events: HashMap<String, Vec<String>>,
}

#[derive(Deserialize, Serialize, Clone)]
pub struct StateDef {
    pub name: String,
    #[serde(default)]
    pub events: HashMap<String, Vec<String>>,
}

#[derive(Deserialize, Serialize, Clone)]
pub struct ReachDef {
    pub name: String,
    pub dist_1: f32,
    pub half_angle_1: f32,
    #[serde(default)]
    pub dist_2: f32,
    #[serde(default)]
    pub half_angle_2: f32,
}

#[derive(Deserialize, Serialize, Clone)]
pub struct SpawnDef {
    pub name: String,
    pub object: String,
    #[serde(default)]
    pub offset: [f32; 3],
    #[serde(default)]
    pub angle: f32,
    #[serde(default = "default_true")]
    pub relative: bool,
    #[serde(default)]
    pub link_object_to_spawn: bool,
    #[serde(default)]
    pub link_spawn_to_object: bool,
}

#[derive(Deserialize, Serialize, Clone)]
pub struct AnimationDef {
    pub name: String,
    #[serde(default)]
    pub loops: bool,
    pub frames: Vec<FrameDef>,
}

#[derive(Deserialize, Serialize, Clone)]
pub struct FrameDef {
    pub duration: f32,
    #[serde(default)]
    pub signal: Option<u32>,
    #[serde(default)]
    pub hitboxes: Vec<HitboxDef>,
}

#[derive(Deserialize, Serialize, Clone)]
pub struct HitboxDef {
    #[serde(default)]
    pub kind: HitboxKind,
    #[serde(default)]
    pub offset: [f32; 2],
    pub radius: f32,
    #[serde(default)]
    pub z: f32,
    #[serde(default)]
    pub height: f32,
    #[serde(default)]
    pub body_part: usize,
    #[serde(default)]
    pub hazards: Vec<String>,
    #[serde(default)]
    pub damage: f32,
}

// ---------------------------------------------------------------------------
// Compilation.

/// A load-time script problem, with enough context to point at the
/// offending line. Malformed types are rejected wholesale; the engine
/// keeps running with the rest of the content.
#[derive(Serialize, Clone, Debug)]
pub struct ScriptError {
    pub type_name: String,
    pub state: Option<String>,
    pub event: Option<String>,
    pub action_idx: Option<usize>,
    pub message: String,
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.type_name)?;
        if let Some(state) = &self.state {
            write!(f, " state '{}'", state)?;
        }
        if let Some(event) = &self.event {
            write!(f, " event '{}'", event)?;
        }
        if let Some(idx) = self.action_idx {
            write!(f, " action #{}", idx)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Names an action's load hooks can validate references against.
pub struct CompileCtx<'a> {
    pub state_names: &'a HashSet<String>,
    pub spawn_names: &'a HashSet<String>,
    pub animation_names: &'a HashSet<String>,
    pub reach_names: &'a HashSet<String>,
}

pub fn compile_mob_type(def: &MobTypeDef) -> Result<MobType, Vec<ScriptError>> {
    let mut errors = Vec::new();

    let state_names: HashSet<String> = def.states.iter().map(|s| s.name.clone()).collect();
    let spawn_names: HashSet<String> = def.spawns.iter().map(|s| s.name.clone()).collect();
    let animation_names: HashSet<String> =
        def.animations.iter().map(|a| a.name.clone()).collect();
    let reach_names: HashSet<String> = def.reaches.iter().map(|r| r.name.clone()).collect();
    let ctx = CompileCtx {
        state_names: &state_names,
        spawn_names: &spawn_names,
        animation_names: &animation_names,
        reach_names: &reach_names,
    };

    let mut states = Vec::new();
    let mut state_index = HashMap::new();
    for def_state in &def.states {
        if state_index.contains_key(&def_state.name) {
            errors.push(ScriptError {
                type_name: def.name.clone(),
                state: Some(def_state.name.clone()),
                event: None,
                action_idx: None,
                message: "duplicate state name".into(),
            });
            continue;
        }
        let mut events = HashMap::new();
        for (event_name, lines) in &def_state.events {
            match compile_event_block(def, Some(&def_state.name), event_name, lines, &ctx) {
                Ok((ev, list)) => {
                    events.insert(ev, list);
                }
                Err(mut errs) => errors.append(&mut errs),
            }
        }
        state_index.insert(def_state.name.clone(), states.len());
        states.push(State {
            name: def_state.name.clone(),
            events,
        });
    }

    let mut global_events = HashMap::new();
    for (event_name, lines) in &def.global_events {
        match compile_event_block(def, None, event_name, lines, &ctx) {
            Ok((ev, list)) => {
                global_events.insert(ev, list);
            }
            Err(mut errs) => errors.append(&mut errs),
        }
    }

    let first_state = match state_index.get(&def.first_state) {
        Some(idx) => *idx,
        None => {
            errors.push(ScriptError {
                type_name: def.name.clone(),
                state: None,
                event: None,
                action_idx: None,
                message: format!("first_state '{}' does not exist", def.first_state),
            });
            0
        }
    };
    let death_state = match &def.death_state {
        Some(name) => match state_index.get(name) {
            Some(idx) => Some(*idx),
            None => {
                errors.push(ScriptError {
                    type_name: def.name.clone(),
                    state: None,
                    event: None,
                    action_idx: None,
                    message: format!("death_state '{}' does not exist", name),
                });
                None
            }
        },
        None => None,
    };
    let active_state = match &def.active_state {
        Some(name) => match state_index.get(name) {
            Some(idx) => Some(*idx),
            None => {
                errors.push(ScriptError {
                    type_name: def.name.clone(),
                    state: None,
                    event: None,
                    action_idx: None,
                    message: format!("active_state '{}' does not exist", name),
                });
                None
            }
        },
        None => None,
    };
    let idle_state = match &def.idle_state {
        Some(name) => match state_index.get(name) {
            Some(idx) => Some(*idx),
            None => {
                errors.push(ScriptError {
                    type_name: def.name.clone(),
                    state: None,
                    event: None,
                    action_idx: None,
                    message: format!("idle_state '{}' does not exist", name),
                });
                None
            }
        },
        None => None,
    };

    let mut animations = HashMap::new();
    for anim_def in &def.animations {
        animations.insert(
            anim_def.name.clone(),
            Animation {
                name: anim_def.name.clone(),
                loops: anim_def.loops,
                frames: anim_def
                    .frames
                    .iter()
                    .map(|f| Frame {
                        duration: f.duration,
                        signal: f.signal,
                        hitboxes: f
                            .hitboxes
                            .iter()
                            .map(|h| FrameHitbox {
                                kind: h.kind,
                                offset: Vec2::new(h.offset[0], h.offset[1]),
                                radius: h.radius,
                                z: h.z,
                                height: h.height,
                                body_part: h.body_part,
                                hazards: h.hazards.clone(),
                                damage: h.damage,
                            })
                            .collect(),
                    })
                    .collect(),
            },
        );
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(MobType {
        name: def.name.clone(),
        category: def.category,
        team: def.team,
        max_health: def.max_health,
        radius: def.radius,
        rectangular_dim: def.rectangular_dim.map(|d| Vec2::new(d[0], d[1])),
        height: def.height,
        move_speed: def.move_speed,
        task_range: def.task_range,
        pushable: def.pushable,
        pushes: def.pushes,
        pushes_with_hitboxes: def.pushes_with_hitboxes,
        pushes_softly: def.pushes_softly,
        huntable: def.huntable,
        holdable: def.holdable,
        flying: def.flying,
        can_block_paths: def.can_block_paths,
        max_carriers: def.max_carriers,
        max_task_workers: def.max_task_workers,
        resistances: def.resistances.clone(),
        inactive_ticks: def.inactive_ticks,
        inactive_interactions: def.inactive_interactions,
        reaches: def
            .reaches
            .iter()
            .map(|r| Reach {
                name: r.name.clone(),
                dist_1: r.dist_1,
                half_angle_1: r.half_angle_1,
                dist_2: r.dist_2,
                half_angle_2: r.half_angle_2,
            })
            .collect(),
        spawns: def
            .spawns
            .iter()
            .map(|s| SpawnInfo {
                name: s.name.clone(),
                object: s.object.clone(),
                offset: Vec3::new(s.offset[0], s.offset[1], s.offset[2]),
                angle: s.angle,
                relative: s.relative,
                link_object_to_spawn: s.link_object_to_spawn,
                link_spawn_to_object: s.link_spawn_to_object,
            })
            .collect(),
        animations,
        states,
        state_index,
        first_state,
        death_state,
        active_state,
        idle_state,
        global_events,
    })
}

fn compile_event_block(
    def: &MobTypeDef,
    state: Option<&str>,
    event_name: &str,
    lines: &[String],
    ctx: &CompileCtx<'_>,
) -> Result<(EventType, ActionList), Vec<ScriptError>> {
    let err_at = |idx: Option<usize>, message: String| ScriptError {
        type_name: def.name.clone(),
        state: state.map(|s| s.to_string()),
        event: Some(event_name.to_string()),
        action_idx: idx,
        message,
    };

    let Some(ev) = EventType::from_name(event_name) else {
        return Err(vec![err_at(None, format!("unknown event '{}'", event_name))]);
    };

    let mut errors = Vec::new();
    let mut calls = Vec::new();
    let mut labels = HashMap::new();
    let mut if_depth: i32 = 0;

    for (idx, line) in lines.iter().enumerate() {
        match compile_action_line(line, ctx) {
            Ok(call) => {
                match call.kind {
                    ActionKind::If => if_depth += 1,
                    ActionKind::Else | ActionKind::EndIf if if_depth == 0 => {
                        errors.push(err_at(
                            Some(idx),
                            "'else'/'end_if' without a matching 'if'".into(),
                        ));
                    }
                    ActionKind::EndIf => if_depth -= 1,
                    ActionKind::Label => {
                        let name = call.const_arg(0).to_string();
                        if labels.insert(name.clone(), calls.len()).is_some() {
                            errors.push(err_at(
                                Some(idx),
                                format!("duplicate label '{}'", name),
                            ));
                        }
                    }
                    _ => {}
                }
                calls.push(call);
            }
            Err(message) => errors.push(err_at(Some(idx), message)),
        }
    }

    if if_depth > 0 {
        errors.push(err_at(None, "unclosed 'if' block".into()));
    }

    // Dangling goto targets and set_state targets are load errors.
    for (idx, call) in calls.iter().enumerate() {
        match call.kind {
            ActionKind::Goto => {
                let target = call.const_arg(0);
                if !labels.contains_key(target) {
                    errors.push(err_at(
                        Some(idx),
                        format!("goto target label '{}' does not exist", target),
                    ));
                }
            }
            ActionKind::SetState => {
                let target = call.const_arg(0);
                if !ctx.state_names.contains(target) {
                    errors.push(err_at(
                        Some(idx),
                        format!("set_state target '{}' does not exist", target),
                    ));
                }
            }
            _ => {}
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok((ev, ActionList { calls, labels }))
}

/// Compiles one whitespace-tokenized action line against the registry's
/// parameter schemas.
pub fn compile_action_line(line: &str, ctx: &CompileCtx<'_>) -> Result<ActionCall, String> {
    let mut tokens = line.split_whitespace();
    let Some(name) = tokens.next() else {
        return Err("empty action line".into());
    };
    let Some(def) = actions::registry().by_name(name) else {
        return Err(format!("unknown action '{}'", name));
    };

    let raw_args: Vec<&str> = tokens.collect();
    let required = def
        .params
        .iter()
        .filter(|p| !p.is_extras)
        .count();
    let variadic = def.params.last().is_some_and(|p| p.is_extras);
    if raw_args.len() < required || (!variadic && raw_args.len() > required) {
        return Err(format!(
            "action '{}' takes {}{} argument(s), got {}",
            name,
            required,
            if variadic { "+" } else { "" },
            raw_args.len()
        ));
    }

    let mut args = Vec::with_capacity(raw_args.len());
    for (i, raw) in raw_args.iter().enumerate() {
        let param = &def.params[i.min(def.params.len() - 1)];
        let is_var = raw.starts_with('$') && raw.len() > 1;
        if is_var {
            if param.force_const {
                return Err(format!(
                    "argument '{}' of '{}' must be a constant, not a variable",
                    param.name, name
                ));
            }
            args.push(ActionArg {
                value: raw[1..].to_string(),
                is_var: true,
            });
            continue;
        }
        match param.ty {
            ParamType::Int => {
                if raw.parse::<i64>().is_err() {
                    return Err(format!(
                        "argument '{}' of '{}' must be an integer, got '{}'",
                        param.name, name, raw
                    ));
                }
            }
            ParamType::Float => {
                if raw.parse::<f32>().is_err() {
                    return Err(format!(
                        "argument '{}' of '{}' must be a number, got '{}'",
                        param.name, name, raw
                    ));
                }
            }
            ParamType::Bool => {
                if parse_bool(raw).is_none() {
                    return Err(format!(
                        "argument '{}' of '{}' must be true or false, got '{}'",
                        param.name, name, raw
                    ));
                }
            }
            ParamType::String | ParamType::Enum => {}
        }
        args.push(ActionArg {
            value: raw.to_string(),
            is_var: false,
        });
    }

    let mut call = ActionCall {
        kind: def.kind,
        args,
    };
    if let Some(hook) = def.extra_load {
        hook(&mut call, ctx)?;
    }
    Ok(call)
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Content registry.

/// Registry of every loadable mob type. Malformed definitions are kept
/// out of the registry and reported as diagnostics; the rest of the
/// content stays usable.
#[derive(Default)]
pub struct ContentLibrary {
    pub types: HashMap<String, Arc<MobType>>,
    pub errors: Vec<ScriptError>,
}

impl ContentLibrary {
    /// Loads a batch of definitions. Spawn references are validated after
    /// the whole batch is in, so types may reference each other freely.
    pub fn load(&mut self, defs: &[MobTypeDef]) -> Result<(), String> {
        let mut loaded = Vec::new();
        for def in defs {
            match compile_mob_type(def) {
                Ok(mob_type) => {
                    loaded.push(def.name.clone());
                    self.types.insert(def.name.clone(), Arc::new(mob_type));
                }
                Err(errs) => {
                    for err in &errs {
                        warn!("script error: {}", err);
                    }
                    self.errors.extend(errs);
                }
            }
        }

        // Cross-type pass: a spawn whose child type never loaded makes the
        // spawning type malformed too.
        let mut rejected = Vec::new();
        for name in &loaded {
            let Some(mob_type) = self.types.get(name) else {
                continue;
            };
            for spawn in &mob_type.spawns {
                if !self.types.contains_key(&spawn.object) {
                    self.errors.push(ScriptError {
                        type_name: name.clone(),
                        state: None,
                        event: None,
                        action_idx: None,
                        message: format!(
                            "spawn '{}' references unknown mob type '{}'",
                            spawn.name, spawn.object
                        ),
                    });
                    rejected.push(name.clone());
                    break;
                }
            }
        }
        for name in &rejected {
            self.types.remove(name);
        }

        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(format!("{} script error(s), see diagnostics", self.errors.len()))
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<MobType>> {
        self.types.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{type_def, state};

    #[test]
    fn event_names_round_trip() {
        for ev in ALL_EVENTS {
            assert_eq!(EventType::from_name(ev.name()), Some(ev));
        }
        assert_eq!(EventType::from_name("on_bogus"), None);
    }

    #[test]
    fn compiles_a_minimal_type() {
        let def = type_def(
            "walker",
            vec![state("idling", &[("on_enter", &["set_var greeted true"])])],
        );
        let mob_type = compile_mob_type(&def).expect("should compile");
        assert_eq!(mob_type.first_state, 0);
        assert!(mob_type.states[0].events.contains_key(&EventType::OnEnter));
    }

    #[test]
    fn unknown_action_is_a_load_error() {
        let def = type_def(
            "broken",
            vec![state("idling", &[("on_enter", &["frobnicate 1 2"])])],
        );
        let errs = compile_mob_type(&def).unwrap_err();
        assert!(errs[0].message.contains("unknown action"));
        assert_eq!(errs[0].state.as_deref(), Some("idling"));
        assert_eq!(errs[0].action_idx, Some(0));
    }

    #[test]
    fn wrong_arity_is_a_load_error() {
        let def = type_def(
            "broken",
            vec![state("idling", &[("on_enter", &["set_timer"])])],
        );
        let errs = compile_mob_type(&def).unwrap_err();
        assert!(errs[0].message.contains("argument"));
    }

    #[test]
    fn bad_literal_type_is_a_load_error() {
        let def = type_def(
            "broken",
            vec![state("idling", &[("on_enter", &["set_timer soon"])])],
        );
        assert!(compile_mob_type(&def).is_err());
        // A var reference for the same param is fine.
        let def = type_def(
            "ok",
            vec![state("idling", &[("on_enter", &["set_timer $delay"])])],
        );
        assert!(compile_mob_type(&def).is_ok());
    }

    #[test]
    fn dangling_goto_label_is_a_load_error() {
        let def = type_def(
            "broken",
            vec![state("idling", &[("on_enter", &["goto nowhere"])])],
        );
        let errs = compile_mob_type(&def).unwrap_err();
        assert!(errs[0].message.contains("goto target"));
    }

    #[test]
    fn set_state_to_unknown_state_is_a_load_error() {
        let def = type_def(
            "broken",
            vec![state("idling", &[("on_enter", &["set_state flying"])])],
        );
        let errs = compile_mob_type(&def).unwrap_err();
        assert!(errs[0].message.contains("set_state target"));
    }

    #[test]
    fn missing_first_state_is_a_load_error() {
        let mut def = type_def("broken", vec![state("idling", &[])]);
        def.first_state = "elsewhere".into();
        let errs = compile_mob_type(&def).unwrap_err();
        assert!(errs[0].message.contains("first_state"));
    }

    #[test]
    fn unknown_if_operator_is_a_load_error() {
        let def = type_def(
            "broken",
            vec![state(
                "idling",
                &[("on_enter", &["if $x ~ 3", "end_if"])],
            )],
        );
        let errs = compile_mob_type(&def).unwrap_err();
        assert!(errs[0].message.contains("operator"));
    }

    #[test]
    fn unclosed_if_is_a_load_error() {
        let def = type_def(
            "broken",
            vec![state("idling", &[("on_enter", &["if $x = 3"])])],
        );
        let errs = compile_mob_type(&def).unwrap_err();
        assert!(errs.iter().any(|e| e.message.contains("unclosed")));
    }

    #[test]
    fn library_rejects_spawn_of_unknown_type() {
        let mut def = type_def("mother", vec![state("idling", &[])]);
        def.spawns.push(SpawnDef {
            name: "child".into(),
            object: "ghost".into(),
            offset: [0.0; 3],
            angle: 0.0,
            relative: true,
            link_object_to_spawn: false,
            link_spawn_to_object: false,
        });
        let mut lib = ContentLibrary::default();
        assert!(lib.load(&[def]).is_err());
        assert!(lib.get("mother").is_none());
    }
}
