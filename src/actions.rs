use std::collections::HashMap;
use std::sync::OnceLock;

use bevy::prelude::*;
use rand::Rng;

use crate::fsm::{self, EventInfo, IF_OP_EQUAL, IF_OP_LESS, IF_OP_LESS_E, IF_OP_MORE, IF_OP_MORE_E, IF_OP_NOT};
use crate::geometry;
use crate::mob::{ChaseInfo, ChaseTarget, MobId, Team};
use crate::paths::{self, PathSettings};
use crate::script::{ActionCall, CompileCtx, EventType};
use crate::simulation::Simulation;

/// Every primitive a script can invoke. Markers (`If`, `Goto`, ...) are
/// handled by the FSM runtime itself; everything else dispatches through
/// the registry's run function.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ActionKind {
    AddHealth,
    Calculate,
    Delete,
    FinishDying,
    Focus,
    FollowPathRandomly,
    FollowPathToAbsolute,
    GetAngle,
    GetChomped,
    GetCoordinatesFromAngle,
    GetDistance,
    GetEventInfo,
    GetFloorZ,
    GetFocusVar,
    GetMobInfo,
    GetRandomFloat,
    GetRandomInt,
    Goto,
    HoldFocus,
    If,
    Else,
    EndIf,
    Label,
    LinkWithFocus,
    LoadFocusMemory,
    MoveToAbsolute,
    MoveToRelative,
    MoveToTarget,
    OrderRelease,
    PlaySound,
    Print,
    Release,
    ReleaseStoredMobs,
    SaveFocusMemory,
    SendMessageToFocus,
    SendMessageToLinks,
    SendMessageToNearby,
    SetAnimation,
    SetCanBlockPaths,
    SetFarReach,
    SetFlying,
    SetGravity,
    SetHealth,
    SetHeight,
    SetHiding,
    SetHoldable,
    SetHuntable,
    SetNearReach,
    SetRadius,
    SetShadowVisibility,
    SetState,
    SetTangible,
    SetTeam,
    SetTimer,
    SetVar,
    ShowMessageFromVar,
    Spawn,
    StabilizeZ,
    StartChomping,
    StartDying,
    Stop,
    StopChomping,
    StopSound,
    StopVertically,
    StoreFocusInside,
    Swallow,
    SwallowAll,
    TeleportToAbsolute,
    TeleportToRelative,
    ThrowFocus,
    TurnToAbsolute,
    TurnToRelative,
    TurnToTarget,
}

const KIND_COUNT: usize = ActionKind::TurnToTarget as usize + 1;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ParamType {
    Int,
    Float,
    Bool,
    String,
    Enum,
}

pub struct ActionParam {
    pub name: &'static str,
    pub ty: ParamType,
    /// Must be a literal; a `$var` reference is a load error.
    pub force_const: bool,
    /// Variadic tail; zero or more extra values of this type.
    pub is_extras: bool,
}

const fn p(name: &'static str, ty: ParamType) -> ActionParam {
    ActionParam {
        name,
        ty,
        force_const: false,
        is_extras: false,
    }
}

const fn pc(name: &'static str, ty: ParamType) -> ActionParam {
    ActionParam {
        name,
        ty,
        force_const: true,
        is_extras: false,
    }
}

const fn px(name: &'static str, ty: ParamType) -> ActionParam {
    ActionParam {
        name,
        ty,
        force_const: false,
        is_extras: true,
    }
}

type LoadHook = fn(&mut ActionCall, &CompileCtx<'_>) -> Result<(), String>;
type RunFn = fn(&mut ActionRun<'_>);

pub struct ActionDef {
    pub kind: ActionKind,
    pub name: &'static str,
    pub params: &'static [ActionParam],
    pub extra_load: Option<LoadHook>,
    pub run: RunFn,
}

pub struct ActionRegistry {
    defs: &'static [ActionDef],
    by_name: HashMap<&'static str, usize>,
    by_kind: Vec<usize>,
}

impl ActionRegistry {
    pub fn by_name(&self, name: &str) -> Option<&'static ActionDef> {
        self.by_name.get(name).map(|&i| &self.defs[i])
    }

    pub fn by_kind(&self, kind: ActionKind) -> &'static ActionDef {
        &self.defs[self.by_kind[kind as usize]]
    }

    pub fn defs(&self) -> &'static [ActionDef] {
        self.defs
    }
}

pub fn registry() -> &'static ActionRegistry {
    static REGISTRY: OnceLock<ActionRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let defs = action_table();
        let mut by_name = HashMap::new();
        let mut by_kind = vec![usize::MAX; KIND_COUNT];
        for (i, def) in defs.iter().enumerate() {
            let clash = by_name.insert(def.name, i);
            assert!(clash.is_none(), "duplicate action name '{}'", def.name);
            by_kind[def.kind as usize] = i;
        }
        for (kind, idx) in by_kind.iter().enumerate() {
            assert!(*idx != usize::MAX, "action kind #{kind} missing from table");
        }
        ActionRegistry {
            defs,
            by_name,
            by_kind,
        }
    })
}

/// Everything a run function gets: the acting mob, the resolved argument
/// strings, and the event payloads supplied by the dispatch layer.
pub struct ActionRun<'a> {
    pub sim: &'a mut Simulation,
    pub mob: MobId,
    pub args: Vec<String>,
    pub info: &'a EventInfo,
    pub depth: u8,
}

impl ActionRun<'_> {
    fn arg(&self, i: usize) -> &str {
        self.args.get(i).map(|s| s.as_str()).unwrap_or("")
    }

    fn f32_arg(&self, i: usize) -> f32 {
        self.arg(i).parse().unwrap_or(0.0)
    }

    fn i64_arg(&self, i: usize) -> i64 {
        self.arg(i).parse().unwrap_or(0)
    }

    fn bool_arg(&self, i: usize) -> bool {
        crate::script::parse_bool(self.arg(i)).unwrap_or(false)
    }

    /// Writes a result into the acting mob's variable named by arg `i`.
    fn set_var(&mut self, i: usize, value: String) {
        let name = self.arg(i).to_string();
        if name.is_empty() {
            return;
        }
        if let Some(mob) = self.sim.arena.get_mut(self.mob) {
            mob.vars.insert(name, value);
        }
    }

    /// The acting mob's focus, revalidated against the arena. A stale or
    /// absent focus reads as none, never a dangling reference.
    fn focus(&self) -> Option<MobId> {
        let focus = self.sim.arena.get(self.mob)?.focus?;
        self.sim.arena.contains(focus).then_some(focus)
    }

    /// Resolves a mob-target code (self/focus/trigger/link/parent).
    fn target_mob(&self, code: i64) -> Option<MobId> {
        let mob = self.sim.arena.get(self.mob)?;
        let id = match code {
            TARGET_SELF => Some(self.mob),
            TARGET_FOCUS => mob.focus,
            TARGET_TRIGGER => self.info.trigger,
            TARGET_LINK => mob.links.first().copied(),
            TARGET_PARENT => mob.parent,
            _ => None,
        }?;
        self.sim.arena.contains(id).then_some(id)
    }
}

pub const TARGET_SELF: i64 = 0;
pub const TARGET_FOCUS: i64 = 1;
pub const TARGET_TRIGGER: i64 = 2;
pub const TARGET_LINK: i64 = 3;
pub const TARGET_PARENT: i64 = 4;

const MOVE_AWAY_FROM_FOCUS: i64 = 0;
const MOVE_FOCUS: i64 = 1;
const MOVE_FOCUS_POS: i64 = 2;
const MOVE_HOME: i64 = 3;
const MOVE_LINKED_AVERAGE: i64 = 4;

const TURN_FOCUS: i64 = 0;
const TURN_HOME: i64 = 1;

const CALC_SUM: i64 = 0;
const CALC_SUBTRACT: i64 = 1;
const CALC_MULTIPLY: i64 = 2;
const CALC_DIVIDE: i64 = 3;
const CALC_MODULO: i64 = 4;

const STABILIZE_HIGHEST: i64 = 0;
const STABILIZE_LOWEST: i64 = 1;

const EV_INFO_BODY_PART: i64 = 0;
const EV_INFO_FRAME_SIGNAL: i64 = 1;
const EV_INFO_HAZARD: i64 = 2;
const EV_INFO_MESSAGE: i64 = 3;
const EV_INFO_OTHER_BODY_PART: i64 = 4;

const MOB_INFO_ANGLE: i64 = 0;
const MOB_INFO_CHOMPED: i64 = 1;
const MOB_INFO_FOCUS_DISTANCE: i64 = 2;
const MOB_INFO_GROUP_TASK_POWER: i64 = 3;
const MOB_INFO_HEALTH: i64 = 4;
const MOB_INFO_HEALTH_RATIO: i64 = 5;
const MOB_INFO_ID: i64 = 6;
const MOB_INFO_LATCHED: i64 = 7;
const MOB_INFO_LATCHED_WEIGHT: i64 = 8;
const MOB_INFO_CATEGORY: i64 = 9;
const MOB_INFO_TYPE: i64 = 10;
const MOB_INFO_STATE: i64 = 11;
const MOB_INFO_WEIGHT: i64 = 12;
const MOB_INFO_X: i64 = 13;
const MOB_INFO_Y: i64 = 14;
const MOB_INFO_Z: i64 = 15;

/// Formats a computed number the way scripts expect: whole values print
/// without a trailing `.0` so they compare equal to integer literals.
pub fn fmt_number(v: f32) -> String {
    if v.is_finite() && v == v.trunc() && v.abs() < 1e12 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

// ---------------------------------------------------------------------------
// Load hooks.

fn rewrite_enum(
    call: &mut ActionCall,
    idx: usize,
    table: &[(&str, i64)],
    what: &str,
) -> Result<(), String> {
    let raw = call.const_arg(idx).to_string();
    match table.iter().find(|(token, _)| *token == raw) {
        Some((_, code)) => {
            call.args[idx].value = code.to_string();
            Ok(())
        }
        None => Err(format!("unknown {} '{}'", what, raw)),
    }
}

fn load_if(call: &mut ActionCall, _ctx: &CompileCtx<'_>) -> Result<(), String> {
    rewrite_enum(
        call,
        1,
        &[
            ("=", IF_OP_EQUAL),
            ("!=", IF_OP_NOT),
            ("<", IF_OP_LESS),
            (">", IF_OP_MORE),
            ("<=", IF_OP_LESS_E),
            (">=", IF_OP_MORE_E),
        ],
        "comparison operator",
    )
}

fn load_calculate(call: &mut ActionCall, _ctx: &CompileCtx<'_>) -> Result<(), String> {
    rewrite_enum(
        call,
        2,
        &[
            ("+", CALC_SUM),
            ("-", CALC_SUBTRACT),
            ("*", CALC_MULTIPLY),
            ("/", CALC_DIVIDE),
            ("%", CALC_MODULO),
        ],
        "operator",
    )
}

const TARGET_TABLE: [(&str, i64); 5] = [
    ("self", TARGET_SELF),
    ("focus", TARGET_FOCUS),
    ("trigger", TARGET_TRIGGER),
    ("link", TARGET_LINK),
    ("parent", TARGET_PARENT),
];

fn load_focus(call: &mut ActionCall, _ctx: &CompileCtx<'_>) -> Result<(), String> {
    rewrite_enum(call, 0, &TARGET_TABLE, "focus target")
}

fn load_get_event_info(call: &mut ActionCall, _ctx: &CompileCtx<'_>) -> Result<(), String> {
    rewrite_enum(
        call,
        1,
        &[
            ("body_part", EV_INFO_BODY_PART),
            ("frame_signal", EV_INFO_FRAME_SIGNAL),
            ("hazard", EV_INFO_HAZARD),
            ("message", EV_INFO_MESSAGE),
            ("other_body_part", EV_INFO_OTHER_BODY_PART),
        ],
        "event info field",
    )
}

fn load_get_mob_info(call: &mut ActionCall, _ctx: &CompileCtx<'_>) -> Result<(), String> {
    rewrite_enum(call, 1, &TARGET_TABLE, "info target")?;
    rewrite_enum(
        call,
        2,
        &[
            ("angle", MOB_INFO_ANGLE),
            ("chomped_pikmin", MOB_INFO_CHOMPED),
            ("focus_distance", MOB_INFO_FOCUS_DISTANCE),
            ("group_task_power", MOB_INFO_GROUP_TASK_POWER),
            ("health", MOB_INFO_HEALTH),
            ("health_ratio", MOB_INFO_HEALTH_RATIO),
            ("id", MOB_INFO_ID),
            ("latched_pikmin", MOB_INFO_LATCHED),
            ("latched_pikmin_weight", MOB_INFO_LATCHED_WEIGHT),
            ("mob_category", MOB_INFO_CATEGORY),
            ("mob_type", MOB_INFO_TYPE),
            ("state", MOB_INFO_STATE),
            ("weight", MOB_INFO_WEIGHT),
            ("x", MOB_INFO_X),
            ("y", MOB_INFO_Y),
            ("z", MOB_INFO_Z),
        ],
        "mob info field",
    )
}

fn load_move_to_target(call: &mut ActionCall, _ctx: &CompileCtx<'_>) -> Result<(), String> {
    rewrite_enum(
        call,
        0,
        &[
            ("away_from_focus", MOVE_AWAY_FROM_FOCUS),
            ("focus", MOVE_FOCUS),
            ("focus_pos", MOVE_FOCUS_POS),
            ("home", MOVE_HOME),
            ("linked_mob_average", MOVE_LINKED_AVERAGE),
        ],
        "move target",
    )
}

fn load_turn_to_target(call: &mut ActionCall, _ctx: &CompileCtx<'_>) -> Result<(), String> {
    rewrite_enum(call, 0, &[("focus", TURN_FOCUS), ("home", TURN_HOME)], "turn target")
}

fn load_stabilize_z(call: &mut ActionCall, _ctx: &CompileCtx<'_>) -> Result<(), String> {
    rewrite_enum(
        call,
        0,
        &[("highest", STABILIZE_HIGHEST), ("lowest", STABILIZE_LOWEST)],
        "stabilize mode",
    )
}

fn load_set_team(call: &mut ActionCall, _ctx: &CompileCtx<'_>) -> Result<(), String> {
    let raw = call.const_arg(0);
    if Team::from_name(raw).is_none() {
        return Err(format!("unknown team '{}'", raw));
    }
    Ok(())
}

fn load_set_animation(call: &mut ActionCall, ctx: &CompileCtx<'_>) -> Result<(), String> {
    let raw = call.const_arg(0);
    if !ctx.animation_names.contains(raw) {
        return Err(format!("unknown animation '{}'", raw));
    }
    Ok(())
}

fn load_set_reach(call: &mut ActionCall, ctx: &CompileCtx<'_>) -> Result<(), String> {
    let raw = call.const_arg(0);
    if raw != "none" && !ctx.reach_names.contains(raw) {
        return Err(format!("unknown reach '{}'", raw));
    }
    Ok(())
}

fn load_spawn(call: &mut ActionCall, ctx: &CompileCtx<'_>) -> Result<(), String> {
    let raw = call.const_arg(0);
    if !ctx.spawn_names.contains(raw) {
        return Err(format!("unknown spawn '{}'", raw));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Run functions. None of these may panic on bad state; a missing focus,
// trigger, or mob degrades to a no-op.

fn noop(_run: &mut ActionRun<'_>) {}

fn run_add_health(run: &mut ActionRun<'_>) {
    let delta = run.f32_arg(0);
    fsm::add_health(run.sim, run.mob, delta, run.info, run.depth);
}

fn run_set_health(run: &mut ActionRun<'_>) {
    let value = run.f32_arg(0);
    fsm::set_health(run.sim, run.mob, value, run.info, run.depth);
}

fn run_calculate(run: &mut ActionRun<'_>) {
    let lhs = run.f32_arg(1);
    let op = run.i64_arg(2);
    let rhs = run.f32_arg(3);
    let result = match op {
        CALC_SUM => lhs + rhs,
        CALC_SUBTRACT => lhs - rhs,
        CALC_MULTIPLY => lhs * rhs,
        CALC_DIVIDE => {
            if rhs == 0.0 {
                0.0
            } else {
                lhs / rhs
            }
        }
        CALC_MODULO => {
            if rhs == 0.0 {
                0.0
            } else {
                lhs % rhs
            }
        }
        _ => 0.0,
    };
    run.set_var(0, fmt_number(result));
}

fn run_delete(run: &mut ActionRun<'_>) {
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        mob.to_delete = true;
    }
}

fn run_finish_dying(run: &mut ActionRun<'_>) {
    let chomped: Vec<MobId> = run
        .sim
        .arena
        .get(run.mob)
        .map(|m| m.chomping.clone())
        .unwrap_or_default();
    for id in chomped {
        if let Some(victim) = run.sim.arena.get_mut(id) {
            victim.holder = None;
        }
    }
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        mob.chomping.clear();
        mob.to_delete = true;
    }
}

fn run_start_dying(run: &mut ActionRun<'_>) {
    fsm::set_health(run.sim, run.mob, 0.0, run.info, run.depth);
}

fn run_focus(run: &mut ActionRun<'_>) {
    let code = run.i64_arg(0);
    let Some(target) = run.target_mob(code) else {
        return;
    };
    if target == run.mob {
        return;
    }
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        mob.focus = Some(target);
    }
}

fn run_follow_path_randomly(run: &mut ActionRun<'_>) {
    let Some(mob) = run.sim.arena.get(run.mob) else {
        return;
    };
    let pos = mob.pos;
    let dx: f32 = run.sim.rng.gen_range(-300.0..300.0);
    let dy: f32 = run.sim.rng.gen_range(-300.0..300.0);
    paths::start_follow(
        run.sim,
        run.mob,
        pos + Vec2::new(dx, dy),
        PathSettings::default(),
        run.depth,
    );
}

fn run_follow_path_to_absolute(run: &mut ActionRun<'_>) {
    let goal = Vec2::new(run.f32_arg(0), run.f32_arg(1));
    paths::start_follow(run.sim, run.mob, goal, PathSettings::default(), run.depth);
}

fn run_get_angle(run: &mut ActionRun<'_>) {
    let from = Vec2::new(run.f32_arg(1), run.f32_arg(2));
    let to = Vec2::new(run.f32_arg(3), run.f32_arg(4));
    run.set_var(0, fmt_number(geometry::angle_between(from, to).to_degrees()));
}

fn run_get_chomped(run: &mut ActionRun<'_>) {
    let Some(chomper) = run.info.trigger else {
        return;
    };
    let part = run.info.other_body_part;
    let (cap, count) = match run.sim.arena.get(chomper) {
        Some(c) => (c.chomp_max, c.chomping.len()),
        None => return,
    };
    if count >= cap {
        return;
    }
    if let Some(me) = run.sim.arena.get_mut(run.mob) {
        me.holder = Some((chomper, part));
        me.chase = None;
        me.path = None;
    }
    if let Some(c) = run.sim.arena.get_mut(chomper) {
        c.chomping.push(run.mob);
        c.holding.push(run.mob);
    }
}

fn run_get_coordinates_from_angle(run: &mut ActionRun<'_>) {
    let angle = run.f32_arg(2).to_radians();
    let dist = run.f32_arg(3);
    run.set_var(0, fmt_number(angle.cos() * dist));
    run.set_var(1, fmt_number(angle.sin() * dist));
}

fn run_get_distance(run: &mut ActionRun<'_>) {
    let from = Vec2::new(run.f32_arg(1), run.f32_arg(2));
    let to = Vec2::new(run.f32_arg(3), run.f32_arg(4));
    run.set_var(0, fmt_number(from.distance(to)));
}

fn run_get_event_info(run: &mut ActionRun<'_>) {
    let field = run.i64_arg(1);
    let value = match field {
        EV_INFO_BODY_PART => run.info.body_part.map(|b| b.to_string()),
        EV_INFO_FRAME_SIGNAL => run.info.frame_signal.map(|s| s.to_string()),
        EV_INFO_HAZARD => run.info.hazard.clone(),
        EV_INFO_MESSAGE => run.info.message.clone(),
        EV_INFO_OTHER_BODY_PART => run.info.other_body_part.map(|b| b.to_string()),
        _ => None,
    };
    run.set_var(0, value.unwrap_or_default());
}

fn run_get_floor_z(run: &mut ActionRun<'_>) {
    let p = Vec2::new(run.f32_arg(1), run.f32_arg(2));
    let z = (run.sim.terrain)(p);
    run.set_var(0, fmt_number(z));
}

fn run_get_focus_var(run: &mut ActionRun<'_>) {
    let value = run
        .focus()
        .and_then(|f| run.sim.arena.get(f))
        .map(|f| f.var(run.arg(1)).to_string())
        .unwrap_or_default();
    run.set_var(0, value);
}

fn run_get_mob_info(run: &mut ActionRun<'_>) {
    let target_code = run.i64_arg(1);
    let field = run.i64_arg(2);
    let Some(target_id) = run.target_mob(target_code) else {
        run.set_var(0, String::new());
        return;
    };
    let Some(target) = run.sim.arena.get(target_id) else {
        return;
    };
    let value = match field {
        MOB_INFO_ANGLE => fmt_number(target.angle.to_degrees()),
        MOB_INFO_CHOMPED => target.chomping.len().to_string(),
        MOB_INFO_FOCUS_DISTANCE => {
            let d = target
                .focus
                .and_then(|f| run.sim.arena.get(f))
                .map(|f| target.pos.distance(f.pos))
                .unwrap_or(0.0);
            fmt_number(d)
        }
        MOB_INFO_GROUP_TASK_POWER => target.task_workers.len().to_string(),
        MOB_INFO_HEALTH => fmt_number(target.health),
        MOB_INFO_HEALTH_RATIO => {
            if target.max_health > 0.0 {
                fmt_number(target.health / target.max_health)
            } else {
                "0".to_string()
            }
        }
        MOB_INFO_ID => target.id.0.to_string(),
        MOB_INFO_LATCHED => run
            .sim
            .arena
            .iter()
            .filter(|m| m.holder.map(|(h, _)| h) == Some(target_id))
            .count()
            .to_string(),
        MOB_INFO_LATCHED_WEIGHT => run
            .sim
            .arena
            .iter()
            .filter(|m| m.holder.map(|(h, _)| h) == Some(target_id))
            .count()
            .to_string(),
        MOB_INFO_CATEGORY => target.mob_type.category.name().to_string(),
        MOB_INFO_TYPE => target.mob_type.name.clone(),
        MOB_INFO_STATE => target.state_name().to_string(),
        MOB_INFO_WEIGHT => target
            .carry_info
            .as_ref()
            .map(|c| c.carrier_count())
            .unwrap_or(0)
            .to_string(),
        MOB_INFO_X => fmt_number(target.pos.x),
        MOB_INFO_Y => fmt_number(target.pos.y),
        MOB_INFO_Z => fmt_number(target.z),
        _ => String::new(),
    };
    run.set_var(0, value);
}

fn run_get_random_float(run: &mut ActionRun<'_>) {
    let (mut lo, mut hi) = (run.f32_arg(1), run.f32_arg(2));
    if lo > hi {
        std::mem::swap(&mut lo, &mut hi);
    }
    let value = if lo == hi {
        lo
    } else {
        run.sim.rng.gen_range(lo..hi)
    };
    run.set_var(0, fmt_number(value));
}

fn run_get_random_int(run: &mut ActionRun<'_>) {
    let (mut lo, mut hi) = (run.i64_arg(1), run.i64_arg(2));
    if lo > hi {
        std::mem::swap(&mut lo, &mut hi);
    }
    let value = run.sim.rng.gen_range(lo..=hi);
    run.set_var(0, value.to_string());
}

fn run_hold_focus(run: &mut ActionRun<'_>) {
    let part = run.i64_arg(0).max(0) as usize;
    let Some(focus) = run.focus() else {
        return;
    };
    if let Some(held) = run.sim.arena.get_mut(focus) {
        if !held.holdable {
            return;
        }
        held.holder = Some((run.mob, Some(part)));
        held.chase = None;
        held.path = None;
    }
    if let Some(me) = run.sim.arena.get_mut(run.mob) {
        if !me.holding.contains(&focus) {
            me.holding.push(focus);
        }
    }
    let info = EventInfo {
        trigger: Some(run.mob),
        other_body_part: Some(part),
        ..Default::default()
    };
    fsm::run_event(run.sim, focus, EventType::OnHeld, &info, run.depth + 1);
}

fn run_link_with_focus(run: &mut ActionRun<'_>) {
    let Some(focus) = run.focus() else {
        return;
    };
    if let Some(me) = run.sim.arena.get_mut(run.mob) {
        if !me.links.contains(&focus) {
            me.links.push(focus);
        }
    }
}

fn run_load_focus_memory(run: &mut ActionRun<'_>) {
    let slot = run.i64_arg(0);
    if let Some(me) = run.sim.arena.get(run.mob) {
        let remembered = me.focus_memory.get(&slot).copied();
        let valid = remembered.filter(|id| run.sim.arena.contains(*id));
        if let Some(me) = run.sim.arena.get_mut(run.mob) {
            me.focus = valid;
        }
    }
}

fn run_save_focus_memory(run: &mut ActionRun<'_>) {
    let slot = run.i64_arg(0);
    let focus = run.focus();
    if let Some(me) = run.sim.arena.get_mut(run.mob) {
        match focus {
            Some(f) => {
                me.focus_memory.insert(slot, f);
            }
            None => {
                me.focus_memory.remove(&slot);
            }
        }
    }
}

fn run_move_to_absolute(run: &mut ActionRun<'_>) {
    let target = Vec2::new(run.f32_arg(0), run.f32_arg(1));
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        let speed = mob.mob_type.move_speed;
        mob.chase = Some(ChaseInfo {
            target: ChaseTarget::Point(target),
            speed,
        });
        mob.path = None;
    }
}

fn run_move_to_relative(run: &mut ActionRun<'_>) {
    let offset = Vec2::new(run.f32_arg(0), run.f32_arg(1));
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        let target = geometry::local_to_world(mob.pos, offset, mob.angle_cos, mob.angle_sin);
        let speed = mob.mob_type.move_speed;
        mob.chase = Some(ChaseInfo {
            target: ChaseTarget::Point(target),
            speed,
        });
        mob.path = None;
    }
}

fn run_move_to_target(run: &mut ActionRun<'_>) {
    let code = run.i64_arg(0);
    let focus = run.focus();
    let Some(mob) = run.sim.arena.get(run.mob) else {
        return;
    };
    let target = match code {
        MOVE_AWAY_FROM_FOCUS => {
            let Some(focus) = focus.and_then(|f| run.sim.arena.get(f)) else {
                return;
            };
            let away = mob.pos - focus.pos;
            let dir = if away.length_squared() > 0.0 {
                away.normalize()
            } else {
                Vec2::X
            };
            Some(ChaseTarget::Point(mob.pos + dir * 1000.0))
        }
        MOVE_FOCUS => focus.map(ChaseTarget::Mob),
        MOVE_FOCUS_POS => focus
            .and_then(|f| run.sim.arena.get(f))
            .map(|f| ChaseTarget::Point(f.pos)),
        MOVE_HOME => Some(ChaseTarget::Point(mob.home)),
        MOVE_LINKED_AVERAGE => {
            let positions: Vec<Vec2> = mob
                .links
                .iter()
                .filter_map(|l| run.sim.arena.get(*l))
                .map(|l| l.pos)
                .collect();
            if positions.is_empty() {
                None
            } else {
                let sum: Vec2 = positions.iter().copied().sum();
                Some(ChaseTarget::Point(sum / positions.len() as f32))
            }
        }
        _ => None,
    };
    let Some(target) = target else {
        return;
    };
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        let speed = mob.mob_type.move_speed;
        mob.chase = Some(ChaseInfo { target, speed });
        mob.path = None;
    }
}

fn run_order_release(run: &mut ActionRun<'_>) {
    let Some((holder, _)) = run.sim.arena.get(run.mob).and_then(|m| m.holder) else {
        return;
    };
    if let Some(h) = run.sim.arena.get_mut(holder) {
        h.holding.retain(|held| *held != run.mob);
        h.chomping.retain(|held| *held != run.mob);
    }
    if let Some(me) = run.sim.arena.get_mut(run.mob) {
        me.holder = None;
    }
    let info = EventInfo::triggered_by(holder);
    fsm::run_event(run.sim, run.mob, EventType::OnReleased, &info, run.depth + 1);
}

fn run_play_sound(run: &mut ActionRun<'_>) {
    let name = run.arg(0).to_string();
    run.sim.bus.sound(run.mob, &name, true);
}

fn run_stop_sound(run: &mut ActionRun<'_>) {
    let name = run.arg(0).to_string();
    run.sim.bus.sound(run.mob, &name, false);
}

fn run_print(run: &mut ActionRun<'_>) {
    let text = run.args.join(" ");
    info!("script print ({:?}): {}", run.mob, text);
    run.sim.bus.print(run.mob, &text);
}

fn run_release(run: &mut ActionRun<'_>) {
    let held: Vec<MobId> = run
        .sim
        .arena
        .get(run.mob)
        .map(|m| m.holding.clone())
        .unwrap_or_default();
    if let Some(me) = run.sim.arena.get_mut(run.mob) {
        me.holding.clear();
        me.chomping.clear();
    }
    for id in held {
        if let Some(mob) = run.sim.arena.get_mut(id) {
            mob.holder = None;
        }
        let info = EventInfo::triggered_by(run.mob);
        fsm::run_event(run.sim, id, EventType::OnReleased, &info, run.depth + 1);
    }
}

fn run_release_stored_mobs(run: &mut ActionRun<'_>) {
    let here = match run.sim.arena.get(run.mob) {
        Some(m) => m.pos,
        None => return,
    };
    let stored: Vec<MobId> = run
        .sim
        .arena
        .iter()
        .filter(|m| m.stored_in == Some(run.mob))
        .map(|m| m.id)
        .collect();
    for id in stored {
        if let Some(mob) = run.sim.arena.get_mut(id) {
            mob.stored_in = None;
            mob.pos = here;
        }
    }
}

fn send_message(run: &mut ActionRun<'_>, to: MobId, message: String) {
    let info = EventInfo {
        trigger: Some(run.mob),
        message: Some(message),
        ..Default::default()
    };
    fsm::run_event(
        run.sim,
        to,
        EventType::OnReceiveMessage,
        &info,
        run.depth + 1,
    );
    run.sim.bus.message(run.mob, to);
}

fn run_send_message_to_focus(run: &mut ActionRun<'_>) {
    let Some(focus) = run.focus() else {
        return;
    };
    let message = run.args.join(" ");
    send_message(run, focus, message);
}

fn run_send_message_to_links(run: &mut ActionRun<'_>) {
    let links: Vec<MobId> = run
        .sim
        .arena
        .get(run.mob)
        .map(|m| m.links.clone())
        .unwrap_or_default();
    let message = run.args.join(" ");
    for link in links {
        send_message(run, link, message.clone());
    }
}

fn run_send_message_to_nearby(run: &mut ActionRun<'_>) {
    let dist = run.f32_arg(0);
    let message = run.args[1..].join(" ");
    let Some(me) = run.sim.arena.get(run.mob) else {
        return;
    };
    let pos = me.pos;
    let nearby: Vec<MobId> = run
        .sim
        .arena
        .iter()
        .filter(|m| m.id != run.mob && m.pos.distance(pos) <= dist)
        .map(|m| m.id)
        .collect();
    for id in nearby {
        send_message(run, id, message.clone());
    }
}

fn run_set_animation(run: &mut ActionRun<'_>) {
    let name = run.arg(0).to_string();
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        if mob.mob_type.animations.contains_key(&name) {
            mob.animation.set(&name);
        }
    }
}

fn run_set_can_block_paths(run: &mut ActionRun<'_>) {
    let value = run.bool_arg(0);
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        mob.can_block_paths = value;
    }
}

fn set_reach(run: &mut ActionRun<'_>, far: bool) {
    let name = run.arg(0).to_string();
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        let idx = if name == "none" {
            None
        } else {
            match mob.mob_type.reach_named(&name) {
                Some(idx) => Some(idx),
                None => return,
            }
        };
        if far {
            mob.far_reach = idx;
        } else {
            mob.near_reach = idx;
        }
        mob.update_spans();
    }
}

fn run_set_far_reach(run: &mut ActionRun<'_>) {
    set_reach(run, true);
}

fn run_set_near_reach(run: &mut ActionRun<'_>) {
    set_reach(run, false);
}

fn run_set_flying(run: &mut ActionRun<'_>) {
    let value = run.bool_arg(0);
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        mob.flying = value;
    }
}

fn run_set_gravity(run: &mut ActionRun<'_>) {
    let value = run.f32_arg(0);
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        mob.gravity_mult = value;
    }
}

fn run_set_height(run: &mut ActionRun<'_>) {
    let value = run.f32_arg(0);
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        mob.height = value;
    }
}

fn run_set_hiding(run: &mut ActionRun<'_>) {
    let value = run.bool_arg(0);
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        mob.hiding = value;
    }
}

fn run_set_holdable(run: &mut ActionRun<'_>) {
    let value = run.bool_arg(0);
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        mob.holdable = value;
    }
}

fn run_set_huntable(run: &mut ActionRun<'_>) {
    let value = run.bool_arg(0);
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        mob.huntable = value;
    }
}

fn run_set_radius(run: &mut ActionRun<'_>) {
    let value = run.f32_arg(0).max(0.0);
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        mob.radius = value;
        mob.update_spans();
    }
}

fn run_set_shadow_visibility(run: &mut ActionRun<'_>) {
    let value = run.bool_arg(0);
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        mob.shadow_visible = value;
    }
}

fn run_set_tangible(run: &mut ActionRun<'_>) {
    let value = run.bool_arg(0);
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        mob.tangible = value;
    }
}

fn run_set_team(run: &mut ActionRun<'_>) {
    let Some(team) = Team::from_name(run.arg(0)) else {
        return;
    };
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        mob.team = team;
    }
}

fn run_set_timer(run: &mut ActionRun<'_>) {
    let value = run.f32_arg(0).max(0.0);
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        mob.script_timer = Some(value);
    }
}

fn run_set_var(run: &mut ActionRun<'_>) {
    let value = run.arg(1).to_string();
    run.set_var(0, value);
}

fn run_show_message_from_var(run: &mut ActionRun<'_>) {
    let Some(mob) = run.sim.arena.get(run.mob) else {
        return;
    };
    let text = mob.var(run.arg(0)).to_string();
    run.sim.bus.print(run.mob, &text);
}

fn run_spawn(run: &mut ActionRun<'_>) {
    let spawn_name = run.arg(0).to_string();
    let Some(me) = run.sim.arena.get(run.mob) else {
        return;
    };
    let Some(spawn) = me.mob_type.spawn_named(&spawn_name).cloned() else {
        return;
    };
    let Some(child_type) = run.sim.content.get(&spawn.object) else {
        return;
    };
    let (pos, angle) = if spawn.relative {
        let pos = geometry::local_to_world(
            me.pos,
            Vec2::new(spawn.offset.x, spawn.offset.y),
            me.angle_cos,
            me.angle_sin,
        );
        (pos, me.angle + spawn.angle)
    } else {
        (Vec2::new(spawn.offset.x, spawn.offset.y), spawn.angle)
    };
    let child = run.sim.spawn_mob(child_type, pos, angle);
    if spawn.link_object_to_spawn {
        if let Some(me) = run.sim.arena.get_mut(run.mob) {
            me.links.push(child);
        }
    }
    if spawn.link_spawn_to_object {
        if let Some(child_mob) = run.sim.arena.get_mut(child) {
            child_mob.links.push(run.mob);
        }
    }
}

fn run_stabilize_z(run: &mut ActionRun<'_>) {
    let mode = run.i64_arg(0);
    let Some(me) = run.sim.arena.get(run.mob) else {
        return;
    };
    let mut z = me.z;
    for link in &me.links {
        if let Some(other) = run.sim.arena.get(*link) {
            z = match mode {
                STABILIZE_HIGHEST => z.max(other.z),
                STABILIZE_LOWEST => z.min(other.z),
                _ => z,
            };
        }
    }
    if let Some(me) = run.sim.arena.get_mut(run.mob) {
        me.z = z;
    }
}

fn run_start_chomping(run: &mut ActionRun<'_>) {
    let max = run.i64_arg(0).max(0) as usize;
    let parts: Vec<usize> = run.args[1..]
        .iter()
        .filter_map(|a| a.parse().ok())
        .collect();
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        mob.chomp_max = max;
        mob.chomp_parts = parts;
    }
}

fn run_stop_chomping(run: &mut ActionRun<'_>) {
    let chomped: Vec<MobId> = run
        .sim
        .arena
        .get(run.mob)
        .map(|m| m.chomping.clone())
        .unwrap_or_default();
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        mob.chomp_max = 0;
        mob.chomp_parts.clear();
        mob.chomping.clear();
        mob.holding.retain(|h| !chomped.contains(h));
    }
    for id in chomped {
        if let Some(victim) = run.sim.arena.get_mut(id) {
            victim.holder = None;
        }
        let info = EventInfo::triggered_by(run.mob);
        fsm::run_event(run.sim, id, EventType::OnReleased, &info, run.depth + 1);
    }
}

fn swallow_some(run: &mut ActionRun<'_>, count: usize) {
    let victims: Vec<MobId> = run
        .sim
        .arena
        .get(run.mob)
        .map(|m| m.chomping.iter().take(count).copied().collect())
        .unwrap_or_default();
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        mob.chomping.retain(|c| !victims.contains(c));
        mob.holding.retain(|h| !victims.contains(h));
    }
    for id in victims {
        if let Some(victim) = run.sim.arena.get_mut(id) {
            victim.holder = None;
        }
        let info = EventInfo::triggered_by(run.mob);
        fsm::set_health(run.sim, id, 0.0, &info, run.depth);
    }
}

fn run_swallow(run: &mut ActionRun<'_>) {
    let count = run.i64_arg(0).max(0) as usize;
    swallow_some(run, count);
}

fn run_swallow_all(run: &mut ActionRun<'_>) {
    swallow_some(run, usize::MAX);
}

fn run_stop(run: &mut ActionRun<'_>) {
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        mob.chase = None;
        mob.path = None;
    }
}

fn run_stop_vertically(run: &mut ActionRun<'_>) {
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        mob.vz = 0.0;
    }
}

fn run_store_focus_inside(run: &mut ActionRun<'_>) {
    let Some(focus) = run.focus() else {
        return;
    };
    let here = match run.sim.arena.get(run.mob) {
        Some(m) => m.pos,
        None => return,
    };
    if let Some(stored) = run.sim.arena.get_mut(focus) {
        stored.stored_in = Some(run.mob);
        stored.pos = here;
        stored.chase = None;
        stored.path = None;
    }
}

fn run_teleport_to_absolute(run: &mut ActionRun<'_>) {
    let pos = Vec2::new(run.f32_arg(0), run.f32_arg(1));
    let z = run.f32_arg(2);
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        mob.pos = pos;
        mob.z = z;
        mob.chase = None;
        mob.path = None;
    }
}

fn run_teleport_to_relative(run: &mut ActionRun<'_>) {
    let offset = Vec2::new(run.f32_arg(0), run.f32_arg(1));
    let dz = run.f32_arg(2);
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        mob.pos = geometry::local_to_world(mob.pos, offset, mob.angle_cos, mob.angle_sin);
        mob.z += dz;
        mob.chase = None;
        mob.path = None;
    }
}

fn run_throw_focus(run: &mut ActionRun<'_>) {
    let Some(focus) = run.focus() else {
        return;
    };
    let target = Vec2::new(run.f32_arg(0), run.f32_arg(1));
    let z = run.f32_arg(2);
    if let Some(me) = run.sim.arena.get_mut(run.mob) {
        me.holding.retain(|h| *h != focus);
        me.chomping.retain(|h| *h != focus);
    }
    if let Some(thrown) = run.sim.arena.get_mut(focus) {
        thrown.holder = None;
        thrown.pos = target;
        thrown.z = z;
    }
    let info = EventInfo::triggered_by(run.mob);
    fsm::run_event(run.sim, focus, EventType::OnReleased, &info, run.depth + 1);
}

fn run_turn_to_absolute(run: &mut ActionRun<'_>) {
    let angle = run.f32_arg(0).to_radians();
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        mob.set_angle(angle);
    }
}

fn run_turn_to_relative(run: &mut ActionRun<'_>) {
    let delta = run.f32_arg(0).to_radians();
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        let angle = mob.angle + delta;
        mob.set_angle(angle);
    }
}

fn run_turn_to_target(run: &mut ActionRun<'_>) {
    let code = run.i64_arg(0);
    let target = match code {
        TURN_FOCUS => run
            .focus()
            .and_then(|f| run.sim.arena.get(f))
            .map(|f| f.pos),
        TURN_HOME => run.sim.arena.get(run.mob).map(|m| m.home),
        _ => None,
    };
    let Some(target) = target else {
        return;
    };
    if let Some(mob) = run.sim.arena.get_mut(run.mob) {
        let angle = geometry::angle_between(mob.pos, target);
        mob.set_angle(angle);
    }
}

// ---------------------------------------------------------------------------
// The table itself.

fn action_table() -> &'static [ActionDef] {
    static TABLE: &[ActionDef] = &[
        ActionDef {
            kind: ActionKind::AddHealth,
            name: "add_health",
            params: &[p("amount", ParamType::Float)],
            extra_load: None,
            run: run_add_health,
        },
        ActionDef {
            kind: ActionKind::Calculate,
            name: "calculate",
            params: &[
                pc("destination", ParamType::String),
                p("lhs", ParamType::Float),
                pc("operation", ParamType::Enum),
                p("rhs", ParamType::Float),
            ],
            extra_load: Some(load_calculate),
            run: run_calculate,
        },
        ActionDef {
            kind: ActionKind::Delete,
            name: "delete",
            params: &[],
            extra_load: None,
            run: run_delete,
        },
        ActionDef {
            kind: ActionKind::FinishDying,
            name: "finish_dying",
            params: &[],
            extra_load: None,
            run: run_finish_dying,
        },
        ActionDef {
            kind: ActionKind::Focus,
            name: "focus",
            params: &[pc("target", ParamType::Enum)],
            extra_load: Some(load_focus),
            run: run_focus,
        },
        ActionDef {
            kind: ActionKind::FollowPathRandomly,
            name: "follow_path_randomly",
            params: &[],
            extra_load: None,
            run: run_follow_path_randomly,
        },
        ActionDef {
            kind: ActionKind::FollowPathToAbsolute,
            name: "follow_path_to_absolute",
            params: &[p("x", ParamType::Float), p("y", ParamType::Float)],
            extra_load: None,
            run: run_follow_path_to_absolute,
        },
        ActionDef {
            kind: ActionKind::GetAngle,
            name: "get_angle",
            params: &[
                pc("destination", ParamType::String),
                p("center_x", ParamType::Float),
                p("center_y", ParamType::Float),
                p("focus_x", ParamType::Float),
                p("focus_y", ParamType::Float),
            ],
            extra_load: None,
            run: run_get_angle,
        },
        ActionDef {
            kind: ActionKind::GetChomped,
            name: "get_chomped",
            params: &[],
            extra_load: None,
            run: run_get_chomped,
        },
        ActionDef {
            kind: ActionKind::GetCoordinatesFromAngle,
            name: "get_coordinates_from_angle",
            params: &[
                pc("destination_x", ParamType::String),
                pc("destination_y", ParamType::String),
                p("angle", ParamType::Float),
                p("magnitude", ParamType::Float),
            ],
            extra_load: None,
            run: run_get_coordinates_from_angle,
        },
        ActionDef {
            kind: ActionKind::GetDistance,
            name: "get_distance",
            params: &[
                pc("destination", ParamType::String),
                p("center_x", ParamType::Float),
                p("center_y", ParamType::Float),
                p("focus_x", ParamType::Float),
                p("focus_y", ParamType::Float),
            ],
            extra_load: None,
            run: run_get_distance,
        },
        ActionDef {
            kind: ActionKind::GetEventInfo,
            name: "get_event_info",
            params: &[
                pc("destination", ParamType::String),
                pc("field", ParamType::Enum),
            ],
            extra_load: Some(load_get_event_info),
            run: run_get_event_info,
        },
        ActionDef {
            kind: ActionKind::GetFloorZ,
            name: "get_floor_z",
            params: &[
                pc("destination", ParamType::String),
                p("x", ParamType::Float),
                p("y", ParamType::Float),
            ],
            extra_load: None,
            run: run_get_floor_z,
        },
        ActionDef {
            kind: ActionKind::GetFocusVar,
            name: "get_focus_var",
            params: &[
                pc("destination", ParamType::String),
                pc("variable", ParamType::String),
            ],
            extra_load: None,
            run: run_get_focus_var,
        },
        ActionDef {
            kind: ActionKind::GetMobInfo,
            name: "get_mob_info",
            params: &[
                pc("destination", ParamType::String),
                pc("target", ParamType::Enum),
                pc("field", ParamType::Enum),
            ],
            extra_load: Some(load_get_mob_info),
            run: run_get_mob_info,
        },
        ActionDef {
            kind: ActionKind::GetRandomFloat,
            name: "get_random_float",
            params: &[
                pc("destination", ParamType::String),
                p("minimum", ParamType::Float),
                p("maximum", ParamType::Float),
            ],
            extra_load: None,
            run: run_get_random_float,
        },
        ActionDef {
            kind: ActionKind::GetRandomInt,
            name: "get_random_int",
            params: &[
                pc("destination", ParamType::String),
                p("minimum", ParamType::Int),
                p("maximum", ParamType::Int),
            ],
            extra_load: None,
            run: run_get_random_int,
        },
        ActionDef {
            kind: ActionKind::Goto,
            name: "goto",
            params: &[pc("label", ParamType::String)],
            extra_load: None,
            run: noop,
        },
        ActionDef {
            kind: ActionKind::HoldFocus,
            name: "hold_focus",
            params: &[pc("hitbox", ParamType::Int)],
            extra_load: None,
            run: run_hold_focus,
        },
        ActionDef {
            kind: ActionKind::If,
            name: "if",
            params: &[
                p("lhs", ParamType::String),
                pc("operator", ParamType::Enum),
                p("rhs", ParamType::String),
            ],
            extra_load: Some(load_if),
            run: noop,
        },
        ActionDef {
            kind: ActionKind::Else,
            name: "else",
            params: &[],
            extra_load: None,
            run: noop,
        },
        ActionDef {
            kind: ActionKind::EndIf,
            name: "end_if",
            params: &[],
            extra_load: None,
            run: noop,
        },
        ActionDef {
            kind: ActionKind::Label,
            name: "label",
            params: &[pc("name", ParamType::String)],
            extra_load: None,
            run: noop,
        },
        ActionDef {
            kind: ActionKind::LinkWithFocus,
            name: "link_with_focus",
            params: &[],
            extra_load: None,
            run: run_link_with_focus,
        },
        ActionDef {
            kind: ActionKind::LoadFocusMemory,
            name: "load_focus_memory",
            params: &[p("slot", ParamType::Int)],
            extra_load: None,
            run: run_load_focus_memory,
        },
        ActionDef {
            kind: ActionKind::MoveToAbsolute,
            name: "move_to_absolute",
            params: &[p("x", ParamType::Float), p("y", ParamType::Float)],
            extra_load: None,
            run: run_move_to_absolute,
        },
        ActionDef {
            kind: ActionKind::MoveToRelative,
            name: "move_to_relative",
            params: &[p("x", ParamType::Float), p("y", ParamType::Float)],
            extra_load: None,
            run: run_move_to_relative,
        },
        ActionDef {
            kind: ActionKind::MoveToTarget,
            name: "move_to_target",
            params: &[pc("target", ParamType::Enum)],
            extra_load: Some(load_move_to_target),
            run: run_move_to_target,
        },
        ActionDef {
            kind: ActionKind::OrderRelease,
            name: "order_release",
            params: &[],
            extra_load: None,
            run: run_order_release,
        },
        ActionDef {
            kind: ActionKind::PlaySound,
            name: "play_sound",
            params: &[pc("sound", ParamType::String)],
            extra_load: None,
            run: run_play_sound,
        },
        ActionDef {
            kind: ActionKind::Print,
            name: "print",
            params: &[p("text", ParamType::String), px("more", ParamType::String)],
            extra_load: None,
            run: run_print,
        },
        ActionDef {
            kind: ActionKind::Release,
            name: "release",
            params: &[],
            extra_load: None,
            run: run_release,
        },
        ActionDef {
            kind: ActionKind::ReleaseStoredMobs,
            name: "release_stored_mobs",
            params: &[],
            extra_load: None,
            run: run_release_stored_mobs,
        },
        ActionDef {
            kind: ActionKind::SaveFocusMemory,
            name: "save_focus_memory",
            params: &[p("slot", ParamType::Int)],
            extra_load: None,
            run: run_save_focus_memory,
        },
        ActionDef {
            kind: ActionKind::SendMessageToFocus,
            name: "send_message_to_focus",
            params: &[p("message", ParamType::String), px("more", ParamType::String)],
            extra_load: None,
            run: run_send_message_to_focus,
        },
        ActionDef {
            kind: ActionKind::SendMessageToLinks,
            name: "send_message_to_links",
            params: &[p("message", ParamType::String), px("more", ParamType::String)],
            extra_load: None,
            run: run_send_message_to_links,
        },
        ActionDef {
            kind: ActionKind::SendMessageToNearby,
            name: "send_message_to_nearby",
            params: &[
                p("distance", ParamType::Float),
                p("message", ParamType::String),
                px("more", ParamType::String),
            ],
            extra_load: None,
            run: run_send_message_to_nearby,
        },
        ActionDef {
            kind: ActionKind::SetAnimation,
            name: "set_animation",
            params: &[pc("animation", ParamType::String)],
            extra_load: Some(load_set_animation),
            run: run_set_animation,
        },
        ActionDef {
            kind: ActionKind::SetCanBlockPaths,
            name: "set_can_block_paths",
            params: &[p("value", ParamType::Bool)],
            extra_load: None,
            run: run_set_can_block_paths,
        },
        ActionDef {
            kind: ActionKind::SetFarReach,
            name: "set_far_reach",
            params: &[pc("reach", ParamType::String)],
            extra_load: Some(load_set_reach),
            run: run_set_far_reach,
        },
        ActionDef {
            kind: ActionKind::SetFlying,
            name: "set_flying",
            params: &[p("value", ParamType::Bool)],
            extra_load: None,
            run: run_set_flying,
        },
        ActionDef {
            kind: ActionKind::SetGravity,
            name: "set_gravity",
            params: &[p("multiplier", ParamType::Float)],
            extra_load: None,
            run: run_set_gravity,
        },
        ActionDef {
            kind: ActionKind::SetHealth,
            name: "set_health",
            params: &[p("amount", ParamType::Float)],
            extra_load: None,
            run: run_set_health,
        },
        ActionDef {
            kind: ActionKind::SetHeight,
            name: "set_height",
            params: &[p("height", ParamType::Float)],
            extra_load: None,
            run: run_set_height,
        },
        ActionDef {
            kind: ActionKind::SetHiding,
            name: "set_hiding",
            params: &[p("value", ParamType::Bool)],
            extra_load: None,
            run: run_set_hiding,
        },
        ActionDef {
            kind: ActionKind::SetHoldable,
            name: "set_holdable",
            params: &[p("value", ParamType::Bool)],
            extra_load: None,
            run: run_set_holdable,
        },
        ActionDef {
            kind: ActionKind::SetHuntable,
            name: "set_huntable",
            params: &[p("value", ParamType::Bool)],
            extra_load: None,
            run: run_set_huntable,
        },
        ActionDef {
            kind: ActionKind::SetNearReach,
            name: "set_near_reach",
            params: &[pc("reach", ParamType::String)],
            extra_load: Some(load_set_reach),
            run: run_set_near_reach,
        },
        ActionDef {
            kind: ActionKind::SetRadius,
            name: "set_radius",
            params: &[p("radius", ParamType::Float)],
            extra_load: None,
            run: run_set_radius,
        },
        ActionDef {
            kind: ActionKind::SetShadowVisibility,
            name: "set_shadow_visibility",
            params: &[p("value", ParamType::Bool)],
            extra_load: None,
            run: run_set_shadow_visibility,
        },
        ActionDef {
            kind: ActionKind::SetState,
            name: "set_state",
            params: &[pc("state", ParamType::String)],
            extra_load: None,
            run: noop,
        },
        ActionDef {
            kind: ActionKind::SetTangible,
            name: "set_tangible",
            params: &[p("value", ParamType::Bool)],
            extra_load: None,
            run: run_set_tangible,
        },
        ActionDef {
            kind: ActionKind::SetTeam,
            name: "set_team",
            params: &[pc("team", ParamType::Enum)],
            extra_load: Some(load_set_team),
            run: run_set_team,
        },
        ActionDef {
            kind: ActionKind::SetTimer,
            name: "set_timer",
            params: &[p("time", ParamType::Float)],
            extra_load: None,
            run: run_set_timer,
        },
        ActionDef {
            kind: ActionKind::SetVar,
            name: "set_var",
            params: &[
                pc("variable", ParamType::String),
                p("value", ParamType::String),
            ],
            extra_load: None,
            run: run_set_var,
        },
        ActionDef {
            kind: ActionKind::ShowMessageFromVar,
            name: "show_message_from_var",
            params: &[pc("variable", ParamType::String)],
            extra_load: None,
            run: run_show_message_from_var,
        },
        ActionDef {
            kind: ActionKind::Spawn,
            name: "spawn",
            params: &[pc("spawn", ParamType::String)],
            extra_load: Some(load_spawn),
            run: run_spawn,
        },
        ActionDef {
            kind: ActionKind::StabilizeZ,
            name: "stabilize_z",
            params: &[pc("mode", ParamType::Enum)],
            extra_load: Some(load_stabilize_z),
            run: run_stabilize_z,
        },
        ActionDef {
            kind: ActionKind::StartChomping,
            name: "start_chomping",
            params: &[
                pc("victims", ParamType::Int),
                px("body_parts", ParamType::Int),
            ],
            extra_load: None,
            run: run_start_chomping,
        },
        ActionDef {
            kind: ActionKind::StartDying,
            name: "start_dying",
            params: &[],
            extra_load: None,
            run: run_start_dying,
        },
        ActionDef {
            kind: ActionKind::Stop,
            name: "stop",
            params: &[],
            extra_load: None,
            run: run_stop,
        },
        ActionDef {
            kind: ActionKind::StopChomping,
            name: "stop_chomping",
            params: &[],
            extra_load: None,
            run: run_stop_chomping,
        },
        ActionDef {
            kind: ActionKind::StopSound,
            name: "stop_sound",
            params: &[pc("sound", ParamType::String)],
            extra_load: None,
            run: run_stop_sound,
        },
        ActionDef {
            kind: ActionKind::StopVertically,
            name: "stop_vertically",
            params: &[],
            extra_load: None,
            run: run_stop_vertically,
        },
        ActionDef {
            kind: ActionKind::StoreFocusInside,
            name: "store_focus_inside",
            params: &[],
            extra_load: None,
            run: run_store_focus_inside,
        },
        ActionDef {
            kind: ActionKind::Swallow,
            name: "swallow",
            params: &[p("amount", ParamType::Int)],
            extra_load: None,
            run: run_swallow,
        },
        ActionDef {
            kind: ActionKind::SwallowAll,
            name: "swallow_all",
            params: &[],
            extra_load: None,
            run: run_swallow_all,
        },
        ActionDef {
            kind: ActionKind::TeleportToAbsolute,
            name: "teleport_to_absolute",
            params: &[
                p("x", ParamType::Float),
                p("y", ParamType::Float),
                p("z", ParamType::Float),
            ],
            extra_load: None,
            run: run_teleport_to_absolute,
        },
        ActionDef {
            kind: ActionKind::TeleportToRelative,
            name: "teleport_to_relative",
            params: &[
                p("x", ParamType::Float),
                p("y", ParamType::Float),
                p("z", ParamType::Float),
            ],
            extra_load: None,
            run: run_teleport_to_relative,
        },
        ActionDef {
            kind: ActionKind::ThrowFocus,
            name: "throw_focus",
            params: &[
                p("x", ParamType::Float),
                p("y", ParamType::Float),
                p("z", ParamType::Float),
            ],
            extra_load: None,
            run: run_throw_focus,
        },
        ActionDef {
            kind: ActionKind::TurnToAbsolute,
            name: "turn_to_absolute",
            params: &[p("angle", ParamType::Float)],
            extra_load: None,
            run: run_turn_to_absolute,
        },
        ActionDef {
            kind: ActionKind::TurnToRelative,
            name: "turn_to_relative",
            params: &[p("angle", ParamType::Float)],
            extra_load: None,
            run: run_turn_to_relative,
        },
        ActionDef {
            kind: ActionKind::TurnToTarget,
            name: "turn_to_target",
            params: &[pc("target", ParamType::Enum)],
            extra_load: Some(load_turn_to_target),
            run: run_turn_to_target,
        },
    ];
    TABLE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::run_event;
    use crate::testutil::{sim_with, state, type_def};

    #[test]
    fn registry_covers_every_kind_with_unique_names() {
        // registry() itself asserts the table is complete.
        let reg = registry();
        assert!(reg.by_name("set_timer").is_some());
        assert!(reg.by_name("frobnicate").is_none());
        assert_eq!(reg.by_kind(ActionKind::SetTimer).name, "set_timer");
    }

    #[test]
    fn calculate_covers_all_operators() {
        let def = type_def(
            "mathy",
            vec![state(
                "idling",
                &[(
                    "on_timer",
                    &[
                        "calculate sum 7 + 3",
                        "calculate diff 7 - 3",
                        "calculate prod 7 * 3",
                        "calculate quot 7 / 2",
                        "calculate rem 7 % 3",
                        "calculate div0 7 / 0",
                    ],
                )],
            )],
        );
        let (mut sim, id) = sim_with(def);
        run_event(&mut sim, id, EventType::OnTimer, &EventInfo::default(), 0);
        let mob = sim.arena.get(id).unwrap();
        assert_eq!(mob.var("sum"), "10");
        assert_eq!(mob.var("diff"), "4");
        assert_eq!(mob.var("prod"), "21");
        assert_eq!(mob.var("quot"), "3.5");
        assert_eq!(mob.var("rem"), "1");
        assert_eq!(mob.var("div0"), "0");
    }

    #[test]
    fn random_int_respects_bounds() {
        let def = type_def(
            "gambler",
            vec![state("idling", &[("on_timer", &["get_random_int roll 1 6"])])],
        );
        let (mut sim, id) = sim_with(def);
        for _ in 0..50 {
            run_event(&mut sim, id, EventType::OnTimer, &EventInfo::default(), 0);
            let roll: i64 = sim.arena.get(id).unwrap().var("roll").parse().unwrap();
            assert!((1..=6).contains(&roll));
        }
    }

    #[test]
    fn timer_and_vars_mutate_the_acting_mob() {
        let def = type_def(
            "setter",
            vec![state(
                "idling",
                &[("on_timer", &["set_timer 2.5", "set_var mood sunny"])],
            )],
        );
        let (mut sim, id) = sim_with(def);
        run_event(&mut sim, id, EventType::OnTimer, &EventInfo::default(), 0);
        let mob = sim.arena.get(id).unwrap();
        assert_eq!(mob.script_timer, Some(2.5));
        assert_eq!(mob.var("mood"), "sunny");
    }

    #[test]
    fn null_focus_actions_are_no_ops() {
        let def = type_def(
            "loner",
            vec![state(
                "idling",
                &[(
                    "on_timer",
                    &[
                        "send_message_to_focus hello",
                        "hold_focus 0",
                        "link_with_focus",
                        "turn_to_target focus",
                        "set_var survived 1",
                    ],
                )],
            )],
        );
        let (mut sim, id) = sim_with(def);
        run_event(&mut sim, id, EventType::OnTimer, &EventInfo::default(), 0);
        assert_eq!(sim.arena.get(id).unwrap().var("survived"), "1");
    }

    #[test]
    fn spawn_creates_linked_child() {
        let mut def = type_def(
            "mother",
            vec![state("idling", &[("on_timer", &["spawn sprout"])])],
        );
        def.spawns.push(crate::script::SpawnDef {
            name: "sprout".into(),
            object: "mother".into(),
            offset: [10.0, 0.0, 0.0],
            angle: 0.0,
            relative: true,
            link_object_to_spawn: true,
            link_spawn_to_object: false,
        });
        let (mut sim, id) = sim_with(def);
        run_event(&mut sim, id, EventType::OnTimer, &EventInfo::default(), 0);
        assert_eq!(sim.arena.len(), 2);
        let me = sim.arena.get(id).unwrap();
        assert_eq!(me.links.len(), 1);
        let child = sim.arena.get(me.links[0]).unwrap();
        assert!((child.pos.x - 10.0).abs() < 0.001);
    }

    #[test]
    fn focus_and_message_round_trip() {
        let def = type_def(
            "chatty",
            vec![state(
                "idling",
                &[
                    (
                        "on_timer",
                        &["focus trigger", "send_message_to_focus good morning"],
                    ),
                    (
                        "on_receive_message",
                        &["get_event_info heard message"],
                    ),
                ],
            )],
        );
        let (mut sim, a) = sim_with(def);
        let kind = sim.content.get("chatty").unwrap();
        let b = sim.spawn_at(kind, Vec2::new(5.0, 0.0));
        let info = EventInfo::triggered_by(b);
        run_event(&mut sim, a, EventType::OnTimer, &info, 0);
        assert_eq!(sim.arena.get(b).unwrap().var("heard"), "good morning");
    }

    #[test]
    fn chomp_swallow_kills_victims() {
        let def = type_def(
            "chomper",
            vec![state(
                "idling",
                &[("on_timer", &["start_chomping 2 0", "swallow_all"])],
            )],
        );
        let (mut sim, eater) = sim_with(def);
        let kind = sim.content.get("chomper").unwrap();
        let snack = sim.spawn_at(kind.clone(), Vec2::ZERO);
        // Latch the snack manually, as the eat event would.
        sim.arena.get_mut(eater).unwrap().chomping.push(snack);
        run_event(&mut sim, eater, EventType::OnTimer, &EventInfo::default(), 0);
        assert!(sim.arena.get(snack).unwrap().to_delete);
        assert!(sim.arena.get(eater).unwrap().chomping.is_empty());
    }

    #[test]
    fn fmt_number_trims_whole_floats() {
        assert_eq!(fmt_number(3.0), "3");
        assert_eq!(fmt_number(-2.0), "-2");
        assert_eq!(fmt_number(1.25), "1.25");
    }
}
