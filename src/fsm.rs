use bevy::prelude::*;

use crate::actions::{self, ActionKind, ActionRun};
use crate::mob::MobId;
use crate::script::{ActionCall, ActionList, EventType};
use crate::simulation::Simulation;

/// Synchronous re-entrancy bound. A dispatch deeper than this is dropped
/// (innermost call loses) instead of overflowing the stack.
pub const MAX_EVENT_DEPTH: u8 = 8;

/// Payload handed to handlers and readable through `get_event_info`.
#[derive(Clone, Default)]
pub struct EventInfo {
    /// Mob that caused the event, if any.
    pub trigger: Option<MobId>,
    pub message: Option<String>,
    pub hazard: Option<String>,
    pub frame_signal: Option<u32>,
    /// Body part of the acting mob's hitbox involved.
    pub body_part: Option<usize>,
    /// Body part of the other mob's hitbox involved.
    pub other_body_part: Option<usize>,
}

impl EventInfo {
    pub fn triggered_by(id: MobId) -> EventInfo {
        EventInfo {
            trigger: Some(id),
            ..Default::default()
        }
    }
}

/// Dispatches `ev` against the mob's current state, falling back to the
/// type's global handlers. No handler anywhere is a plain no-op.
pub fn run_event(sim: &mut Simulation, id: MobId, ev: EventType, info: &EventInfo, depth: u8) {
    if depth > MAX_EVENT_DEPTH {
        if !sim.depth_drop_logged {
            sim.depth_drop_logged = true;
            warn!(
                "event re-entrancy depth exceeded {}; dropping innermost dispatch ({})",
                MAX_EVENT_DEPTH,
                ev.name()
            );
        }
        return;
    }

    let Some(mob) = sim.arena.get(id) else {
        return;
    };
    if mob.to_delete {
        return;
    }
    let mob_type = mob.mob_type.clone();
    let state_idx = mob.state_idx;
    // An out-of-range state index is an engine bug, not bad content.
    debug_assert!(
        state_idx < mob_type.states.len(),
        "mob {:?} has state index {} out of range",
        id,
        state_idx
    );
    let Some(state) = mob_type.states.get(state_idx) else {
        return;
    };
    let Some(list) = state
        .events
        .get(&ev)
        .or_else(|| mob_type.global_events.get(&ev))
    else {
        return;
    };

    let requested = execute_list(sim, id, list, info, depth);

    if let Some(target) = requested {
        if let Some(new_idx) = mob_type.state_named(&target) {
            perform_transition(sim, id, new_idx, depth);
        }
    }
}

/// Runs one action list to completion with a linear instruction pointer.
/// Returns the state transition requested by the last `set_state`, if any;
/// the switch itself happens after the caller is done with the list.
fn execute_list(
    sim: &mut Simulation,
    id: MobId,
    list: &ActionList,
    info: &EventInfo,
    depth: u8,
) -> Option<String> {
    let mut requested: Option<String> = None;
    let mut ip = 0usize;

    while ip < list.calls.len() {
        if sim.arena.get(id).map_or(true, |m| m.to_delete) {
            break;
        }
        let call = &list.calls[ip];
        match call.kind {
            ActionKind::If => {
                if !eval_condition(sim, id, call) {
                    ip = skip_false_branch(list, ip) + 1;
                    continue;
                }
            }
            ActionKind::Else => {
                // Reached after a taken if-branch: jump past the end_if.
                ip = skip_to_end_if(list, ip) + 1;
                continue;
            }
            ActionKind::EndIf | ActionKind::Label => {}
            ActionKind::Goto => {
                if let Some(target) = list.label(call.const_arg(0)) {
                    ip = target;
                }
                // Label itself is a no-op; fall through to ip += 1.
            }
            ActionKind::SetState => {
                // Last one wins; applied after the whole list ran.
                requested = Some(call.const_arg(0).to_string());
            }
            _ => {
                let args = resolve_args(sim, id, call);
                let mut run = ActionRun {
                    sim: &mut *sim,
                    mob: id,
                    args,
                    info,
                    depth,
                };
                (actions::registry().by_kind(call.kind).run)(&mut run);
            }
        }
        ip += 1;
    }

    requested
}

/// Index of the matching `else`/`end_if` for the `if` at `if_idx`,
/// honoring nesting. Falls back to the list end on malformed input,
/// which validation should have rejected.
fn skip_false_branch(list: &ActionList, if_idx: usize) -> usize {
    let mut nesting = 0usize;
    for i in (if_idx + 1)..list.calls.len() {
        match list.calls[i].kind {
            ActionKind::If => nesting += 1,
            ActionKind::Else if nesting == 0 => return i,
            ActionKind::EndIf => {
                if nesting == 0 {
                    return i;
                }
                nesting -= 1;
            }
            _ => {}
        }
    }
    list.calls.len().saturating_sub(1)
}

/// Index of the `end_if` matching the `else` at `else_idx`.
fn skip_to_end_if(list: &ActionList, else_idx: usize) -> usize {
    let mut nesting = 0usize;
    for i in (else_idx + 1)..list.calls.len() {
        match list.calls[i].kind {
            ActionKind::If => nesting += 1,
            ActionKind::EndIf => {
                if nesting == 0 {
                    return i;
                }
                nesting -= 1;
            }
            _ => {}
        }
    }
    list.calls.len().saturating_sub(1)
}

fn resolve_args(sim: &Simulation, id: MobId, call: &ActionCall) -> Vec<String> {
    let mob = sim.arena.get(id);
    call.args
        .iter()
        .map(|arg| {
            if arg.is_var {
                mob.map(|m| m.var(&arg.value).to_string()).unwrap_or_default()
            } else {
                arg.value.clone()
            }
        })
        .collect()
}

// Comparison operator codes, as rewritten by the `if` load hook.
pub const IF_OP_EQUAL: i64 = 0;
pub const IF_OP_NOT: i64 = 1;
pub const IF_OP_LESS: i64 = 2;
pub const IF_OP_MORE: i64 = 3;
pub const IF_OP_LESS_E: i64 = 4;
pub const IF_OP_MORE_E: i64 = 5;

fn eval_condition(sim: &Simulation, id: MobId, call: &ActionCall) -> bool {
    let args = resolve_args(sim, id, call);
    let lhs = args.first().map(|s| s.as_str()).unwrap_or("");
    let op = args
        .get(1)
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(IF_OP_EQUAL);
    let rhs = args.get(2).map(|s| s.as_str()).unwrap_or("");

    // Numbers compare numerically, everything else lexicographically.
    let ordering = match (lhs.parse::<f64>(), rhs.parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal),
        _ => lhs.cmp(rhs),
    };

    match op {
        IF_OP_EQUAL => ordering == std::cmp::Ordering::Equal,
        IF_OP_NOT => ordering != std::cmp::Ordering::Equal,
        IF_OP_LESS => ordering == std::cmp::Ordering::Less,
        IF_OP_MORE => ordering == std::cmp::Ordering::Greater,
        IF_OP_LESS_E => ordering != std::cmp::Ordering::Greater,
        IF_OP_MORE_E => ordering != std::cmp::Ordering::Less,
        _ => false,
    }
}

/// The full transition sequence: `on_leave` on the old state, index swap
/// plus timer reset, then `on_enter` on the new state.
pub fn perform_transition(sim: &mut Simulation, id: MobId, new_idx: usize, depth: u8) {
    let Some(mob) = sim.arena.get(id) else {
        return;
    };
    if mob.to_delete {
        return;
    }
    if new_idx >= mob.mob_type.states.len() {
        // Soft failure: stay in the current state.
        warn!("transition to invalid state index {} ignored", new_idx);
        return;
    }

    run_event(sim, id, EventType::OnLeave, &EventInfo::default(), depth + 1);

    let Some(mob) = sim.arena.get_mut(id) else {
        return;
    };
    if mob.to_delete {
        return;
    }
    let old_name = mob.state_name().to_string();
    mob.push_state_history(old_name.clone());
    mob.state_idx = new_idx;
    mob.script_timer = None;
    let new_name = mob.state_name().to_string();
    sim.bus.state_change(id, &old_name, &new_name);

    run_event(sim, id, EventType::OnEnter, &EventInfo::default(), depth + 1);
}

/// Clamps health into `[0, max]` and runs the death procedure when it
/// crosses zero. Death fires exactly once per life; repeat damage while
/// dying is absorbed.
pub fn set_health(sim: &mut Simulation, id: MobId, value: f32, info: &EventInfo, depth: u8) {
    let Some(mob) = sim.arena.get_mut(id) else {
        return;
    };
    mob.health = value.clamp(0.0, mob.max_health);
    if mob.health <= 0.0 && !mob.dying {
        start_death(sim, id, info, depth);
    }
}

pub fn add_health(sim: &mut Simulation, id: MobId, delta: f32, info: &EventInfo, depth: u8) {
    let Some(mob) = sim.arena.get(id) else {
        return;
    };
    let value = mob.health + delta;
    set_health(sim, id, value, info, depth);
}

/// Applies hitbox damage from `attacker` to `victim`: `on_damage` first,
/// then the health change (and possibly the death procedure).
pub fn apply_damage(sim: &mut Simulation, victim: MobId, attacker: MobId, amount: f32, depth: u8) {
    if amount <= 0.0 {
        return;
    }
    let Some(mob) = sim.arena.get(victim) else {
        return;
    };
    if mob.dying {
        return;
    }
    let info = EventInfo::triggered_by(attacker);
    run_event(sim, victim, EventType::OnDamage, &info, depth + 1);
    let Some(mob) = sim.arena.get(victim) else {
        return;
    };
    let value = mob.health - amount;
    set_health(sim, victim, value, &info, depth);
}

fn start_death(sim: &mut Simulation, id: MobId, info: &EventInfo, depth: u8) {
    let Some(mob) = sim.arena.get_mut(id) else {
        return;
    };
    mob.dying = true;
    mob.chase = None;
    mob.path = None;
    let death_state = mob.mob_type.death_state;
    sim.bus.death(id);

    run_event(sim, id, EventType::OnDeath, info, depth + 1);

    let Some(mob) = sim.arena.get(id) else {
        return;
    };
    if mob.to_delete {
        return;
    }
    match death_state {
        Some(idx) if mob.state_idx != idx => perform_transition(sim, id, idx, depth),
        Some(_) => {}
        // No death state: the mob is deleted directly.
        None => {
            if let Some(mob) = sim.arena.get_mut(id) {
                mob.to_delete = true;
            }
        }
    }
}
