use bevy::prelude::*;

use crate::animation::{FrameHitbox, HitboxKind};
use crate::fsm::{self, EventInfo};
use crate::geometry::{self, Penetration};
use crate::mob::{Mob, MobId};
use crate::script::EventType;
use crate::simulation::Simulation;

/// Newly spawned mobs always get interaction checks for this long, even
/// in inactive cells.
pub const SPAWN_GRACE_PERIOD: f32 = 0.1;

/// Per-second cap applied to pushes from "soft" pusher types.
pub const PUSH_SOFTLY_AMOUNT: f32 = 60.0;

/// Mobs younger than this get their push throttled, in both directions.
pub const PUSH_THROTTLE_TIMEOUT: f32 = 1.0;
pub const PUSH_THROTTLE_FACTOR: f32 = 0.1;

/// Two idle same-category mobs push each other with this flat amount and
/// a small angle deviation, so stacked idlers drift apart instead of
/// dragging each other forever.
pub const IDLE_PUSH_AMOUNT: f32 = 0.1;
pub const IDLE_PUSH_JITTER: f32 = 0.1;

/// A reach/proximity event waiting for priority-ordered dispatch.
struct PendingIntermobEvent {
    dist: f32,
    event: EventType,
    other: MobId,
}

/// Runs the full interaction pass for one acting mob against every other
/// candidate: touches and pushes fire synchronously in pair order, while
/// reach and proximity events queue up for closest-first dispatch. If any
/// dispatch changes the acting mob's state, the rest of its queue for
/// this tick is discarded.
pub fn process_mob_interactions(sim: &mut Simulation, id: MobId, dt: f32) {
    let Some(m) = sim.arena.get(id) else {
        return;
    };
    if m.to_delete || m.stored_in.is_some() {
        return;
    }
    if !m.is_active && !m.mob_type.inactive_interactions && m.time_alive > SPAWN_GRACE_PERIOD {
        return;
    }
    let state_before = m.state_idx;

    let mut pending: Vec<PendingIntermobEvent> = Vec::new();
    let ids = sim.arena.ids();
    for other in ids {
        if other == id {
            continue;
        }
        let Some(m) = sim.arena.get(id) else {
            return;
        };
        if m.to_delete {
            return;
        }
        let Some(m2) = sim.arena.get(other) else {
            continue;
        };
        if m2.to_delete || m2.stored_in.is_some() {
            continue;
        }
        if !m2.mob_type.inactive_interactions
            && !m2.is_active
            && m.time_alive > SPAWN_GRACE_PERIOD
        {
            continue;
        }

        let d = m.pos.distance(m2.pos);
        if d > m.interaction_span + m2.physical_span {
            // Broad-phase reject: no interaction possible at this range.
            continue;
        }

        if d <= m.physical_span + m2.physical_span {
            process_mob_touches(sim, id, other, d, dt);
        }

        // Touch events run synchronously and may have deleted either mob.
        let Some(m) = sim.arena.get(id) else {
            return;
        };
        let Some(m2) = sim.arena.get(other) else {
            continue;
        };
        if m2.health != 0.0 && m.near_reach.is_some() && !m2.has_invisibility {
            process_mob_reaches(m, m2, d, &mut pending);
        }
        process_mob_misc_interactions(sim, m, m2, d, &mut pending);
    }

    // Closest candidate first: order by distance minus combined radii.
    let m_radius = match sim.arena.get(id) {
        Some(m) => m.radius,
        None => return,
    };
    let mut keyed: Vec<(f32, PendingIntermobEvent)> = pending
        .into_iter()
        .map(|e| {
            let other_radius = sim.arena.get(e.other).map(|o| o.radius).unwrap_or(0.0);
            (e.dist - (m_radius + other_radius), e)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    for (_, e) in keyed {
        let Some(m) = sim.arena.get(id) else {
            return;
        };
        if m.state_idx != state_before {
            // The new state may not even define these events, and the
            // reaches could have changed; the rest waits for next tick.
            break;
        }
        if !sim.arena.contains(e.other) {
            continue;
        }
        fsm::run_event(sim, id, e.event, &EventInfo::triggered_by(e.other), 0);
    }
}

fn is_idle(m: &Mob) -> bool {
    m.mob_type.idle_state == Some(m.state_idx)
}

fn z_spans_touch(m: &Mob, m2: &Mob) -> bool {
    m.height == 0.0
        || m2.height == 0.0
        || (m2.z < m.z + m.height && m2.z + m2.height > m.z)
}

/// Whole-body footprint overlap with penetration, dispatching on each
/// mob's declared shape.
fn body_overlap(m: &Mob, m2: &Mob, d: f32) -> Option<Penetration> {
    match (m.rectangular_dim, m2.rectangular_dim) {
        (Some(dim1), Some(dim2)) => geometry::rectangles_intersect(
            m.pos, dim1, m.angle, m2.pos, dim2, m2.angle,
        ),
        (Some(dim1), None) => {
            geometry::circle_intersects_rectangle(m2.pos, m2.radius, m.pos, dim1, m.angle).map(
                |p| Penetration {
                    amount: p.amount,
                    // Flip: the penetration points out of our rectangle,
                    // but it's us being pushed.
                    angle: p.angle + std::f32::consts::PI,
                },
            )
        }
        (None, Some(dim2)) => {
            geometry::circle_intersects_rectangle(m.pos, m.radius, m2.pos, dim2, m2.angle)
        }
        (None, None) => {
            if d <= m.radius + m2.radius {
                Some(Penetration {
                    amount: (d - m.radius - m2.radius).abs(),
                    angle: geometry::angle_between(m2.pos, m.pos),
                })
            } else {
                None
            }
        }
    }
}

fn current_hitboxes(m: &Mob) -> Vec<FrameHitbox> {
    let Some(name) = &m.animation.name else {
        return Vec::new();
    };
    let Some(anim) = m.mob_type.animations.get(name) else {
        return Vec::new();
    };
    m.animation.current_hitboxes(anim).to_vec()
}

/// Touch-level logic for one ordered pair: push accumulation, whole-body
/// touch events, then hitbox-level events. All of it runs synchronously.
fn process_mob_touches(sim: &mut Simulation, id: MobId, other: MobId, d: f32, dt: f32) {
    resolve_push(sim, id, other, d, dt);

    // Whole-body touch events; radii and footprints only, no hitboxes.
    let (z_touch, xy_touch, hunts) = {
        let (Some(m), Some(m2)) = (sim.arena.get(id), sim.arena.get(other)) else {
            return;
        };
        (
            z_spans_touch(m, m2),
            m2.tangible && body_overlap(m, m2, d).is_some(),
            m.can_hunt(m2),
        )
    };
    if z_touch && xy_touch {
        fsm::run_event(
            sim,
            id,
            EventType::OnTouchObject,
            &EventInfo::triggered_by(other),
            0,
        );
        if hunts {
            fsm::run_event(
                sim,
                id,
                EventType::OnTouchOpponent,
                &EventInfo::triggered_by(other),
                0,
            );
        }
    }

    process_hitbox_touches(sim, id, other);
}

/// Accumulates the strongest push the other mob exerts on this one.
fn resolve_push(sim: &mut Simulation, id: MobId, other: MobId, d: f32, dt: f32) {
    let (Some(m), Some(m2)) = (sim.arena.get(id), sim.arena.get(other)) else {
        return;
    };

    let both_idle =
        m.mob_type.category == m2.mob_type.category && is_idle(m) && is_idle(m2);

    if !m.tangible || !m2.tangible {
        return;
    }
    if !m.mob_type.pushable || m.unpushable {
        return;
    }
    if m.standing_on == Some(other) {
        return;
    }
    if !(m2.mob_type.pushes || both_idle) {
        return;
    }
    if !z_spans_touch(m, m2) {
        return;
    }
    // Two carried objects on the move would deadlock their carriers if
    // both pushed; the lower id yields.
    let both_carried_moving = m
        .carry_info
        .as_ref()
        .is_some_and(|c| c.is_moving)
        && m2.carry_info.as_ref().is_some_and(|c| c.is_moving);
    if both_carried_moving && id < other {
        return;
    }

    let mut push_amount = 0.0f32;
    let mut push_angle = 0.0f32;

    if m2.mob_type.pushes_with_hitboxes {
        for h in current_hitboxes(m2) {
            if h.kind == HitboxKind::Disabled {
                continue;
            }
            let h_pos = geometry::local_to_world(m2.pos, h.offset, m2.angle_cos, m2.angle_sin);
            let hd = m.pos.distance(h_pos);
            if hd < m.radius + h.radius {
                let p = (hd - m.radius - h.radius).abs();
                if push_amount == 0.0 || p > push_amount {
                    push_amount = p;
                    push_angle = geometry::angle_between(h_pos, m.pos);
                }
            }
        }
    } else if let Some(pen) = body_overlap(m, m2, d) {
        push_amount = pen.amount;
        if m2.mob_type.pushes_softly {
            push_amount = push_amount.min(PUSH_SOFTLY_AMOUNT * dt);
        }
        push_angle = pen.angle;
        if both_idle {
            // Flat reduced push, with the angle deviated slightly for one
            // of the two so perfectly stacked idlers separate.
            push_amount = IDLE_PUSH_AMOUNT;
            if id > other {
                push_angle += IDLE_PUSH_JITTER;
            }
        } else if m.time_alive < PUSH_THROTTLE_TIMEOUT || m2.time_alive < PUSH_THROTTLE_TIMEOUT {
            // Throttle by the younger of the two ages, protecting fresh
            // spawns from pushing and being pushed at full force.
            let time_factor = m.time_alive.min(m2.time_alive);
            push_amount *= time_factor / PUSH_THROTTLE_TIMEOUT * PUSH_THROTTLE_FACTOR;
        }
    }

    if dt > 0.0 && push_amount / dt > m.push_amount {
        if let Some(m) = sim.arena.get_mut(id) {
            m.push_amount = push_amount / dt;
            m.push_angle = push_angle;
        }
    }
}

/// Hitbox-pair loop: attack/normal categorization, eating, hazards, and
/// damage-eligible contact. Each category fires at most once per pair per
/// tick; handler sets are effectively re-fetched because each dispatch
/// looks up the mob's current state.
fn process_hitbox_touches(sim: &mut Simulation, id: MobId, other: MobId) {
    let (hitboxes_1, hitboxes_2, m2_snapshot) = {
        let (Some(m), Some(m2)) = (sim.arena.get(id), sim.arena.get(other)) else {
            return;
        };
        (
            current_hitboxes(m),
            current_hitboxes(m2),
            (m2.pos, m2.angle_cos, m2.angle_sin, m2.z),
        )
    };
    if hitboxes_1.is_empty() || hitboxes_2.is_empty() {
        return;
    }

    let mut reported_an = false;
    let mut reported_nn = false;
    let mut reported_eat = false;
    let mut reported_haz = false;
    let mut reported_na = false;

    for h1 in &hitboxes_1 {
        if h1.kind == HitboxKind::Disabled {
            continue;
        }
        for h2 in &hitboxes_2 {
            if h2.kind == HitboxKind::Disabled {
                continue;
            }
            let (Some(m), Some(m2)) = (sim.arena.get(id), sim.arena.get(other)) else {
                return;
            };

            let h1_pos = geometry::local_to_world(m.pos, h1.offset, m.angle_cos, m.angle_sin);
            let (m2_pos, m2_cos, m2_sin, m2_z) = m2_snapshot;
            let h2_pos = geometry::local_to_world(m2_pos, h2.offset, m2_cos, m2_sin);
            let h1_z = m.z + h1.z;
            let h2_z = m2_z + h2.z;

            // A mob held by a hitbox counts as touching it, so holding
            // stays stable under floating-point jitter.
            let held_by_it = m.holder == Some((other, Some(h2.body_part)))
                || m2.holder == Some((id, Some(h1.body_part)));
            let collided = held_by_it
                || (geometry::z_ranges_overlap(h1_z, h1.height, h2_z, h2.height)
                    && h1_pos.distance(h2_pos) < h1.radius + h2.radius);
            if !collided {
                continue;
            }

            let pair_info = |hazard: Option<String>| EventInfo {
                trigger: Some(other),
                hazard,
                body_part: Some(h1.body_part),
                other_body_part: Some(h2.body_part),
                ..Default::default()
            };

            if !reported_an && h1.kind == HitboxKind::Attack && h2.kind == HitboxKind::Normal {
                fsm::run_event(sim, id, EventType::OnHitboxAttack, &pair_info(None), 0);
                reported_an = true;
            }

            if !reported_nn && h1.kind == HitboxKind::Normal && h2.kind == HitboxKind::Normal {
                fsm::run_event(sim, id, EventType::OnHitboxContact, &pair_info(None), 0);
                reported_nn = true;
            }

            let (Some(m), Some(m2)) = (sim.arena.get(id), sim.arena.get(other)) else {
                return;
            };

            if h1.kind == HitboxKind::Normal && h2.kind == HitboxKind::Attack {
                // Confirmed damage contact: resistance and permission
                // short-circuits skip the rest for this pair.
                if !h2.hazards.is_empty() && m.is_resistant_to_all(&h2.hazards) {
                    continue;
                }
                if !m2.can_hurt(m) {
                    continue;
                }
            }

            let attacker_disabled = m2.disables_attack;

            if !reported_eat
                && !attacker_disabled
                && h1.kind == HitboxKind::Normal
                && m2.chomping.len() < m2.chomp_max
                && m2.chomp_parts.contains(&h2.body_part)
            {
                fsm::run_event(sim, id, EventType::OnHitboxEaten, &pair_info(None), 0);
                reported_eat = true;
            }

            let (Some(_), Some(_)) = (sim.arena.get(id), sim.arena.get(other)) else {
                return;
            };

            if !reported_haz
                && !attacker_disabled
                && h1.kind == HitboxKind::Normal
                && h2.kind == HitboxKind::Attack
                && !h2.hazards.is_empty()
            {
                for hz in &h2.hazards {
                    fsm::run_event(
                        sim,
                        id,
                        EventType::OnTouchHazard,
                        &pair_info(Some(hz.clone())),
                        0,
                    );
                }
                reported_haz = true;
            }

            if !reported_na
                && !attacker_disabled
                && h1.kind == HitboxKind::Normal
                && h2.kind == HitboxKind::Attack
            {
                fsm::run_event(sim, id, EventType::OnHitboxTouched, &pair_info(None), 0);
                fsm::apply_damage(sim, id, other, h2.damage, 0);
                reported_na = true;
            }
        }
    }
}

/// Reach cone test: within either distance/half-angle pair of the mob's
/// near reach. Qualifying candidates queue as pending events.
fn process_mob_reaches(m: &Mob, m2: &Mob, d: f32, pending: &mut Vec<PendingIntermobEvent>) {
    let wants_object = m.mob_type.has_handler(m.state_idx, EventType::OnReachObject);
    let wants_opponent = m.mob_type.has_handler(m.state_idx, EventType::OnReachOpponent);
    if !wants_object && !wants_opponent {
        return;
    }
    let Some(reach) = m.near_reach.and_then(|i| m.mob_type.reaches.get(i)) else {
        return;
    };

    let angle_diff =
        geometry::angle_smallest_diff(m.angle, geometry::angle_between(m.pos, m2.pos));
    let in_reach = (d <= reach.dist_1 && angle_diff <= reach.half_angle_1)
        || (d <= reach.dist_2 && angle_diff <= reach.half_angle_2);
    if !in_reach {
        return;
    }

    if wants_object {
        pending.push(PendingIntermobEvent {
            dist: d,
            event: EventType::OnReachObject,
            other: m2.id,
        });
    }
    if wants_opponent && m.can_hunt(m2) {
        pending.push(PendingIntermobEvent {
            dist: d,
            event: EventType::OnReachOpponent,
            other: m2.id,
        });
    }
}

/// Proximity checks that only matter when the current state can react to
/// them: carriable objects with room, unreserved tools, group tasks with
/// a free spot, and bumping the actively-controlled leader.
fn process_mob_misc_interactions(
    sim: &Simulation,
    m: &Mob,
    m2: &Mob,
    d: f32,
    pending: &mut Vec<PendingIntermobEvent>,
) {
    use crate::mob::MobCategory;

    if m.mob_type.has_handler(m.state_idx, EventType::OnNearCarriable) {
        if let Some(carry) = &m2.carry_info {
            if !carry.is_full() && d <= m.mob_type.task_range {
                pending.push(PendingIntermobEvent {
                    dist: d,
                    event: EventType::OnNearCarriable,
                    other: m2.id,
                });
            }
        }
    }

    if m.mob_type.has_handler(m.state_idx, EventType::OnNearTool)
        && m2.mob_type.category == MobCategory::Tool
        && d <= m.mob_type.task_range
    {
        let reserved_by_other = m2.reserved_by.is_some_and(|r| r != m.id);
        if !reserved_by_other {
            pending.push(PendingIntermobEvent {
                dist: d,
                event: EventType::OnNearTool,
                other: m2.id,
            });
        }
    }

    if m.mob_type.has_handler(m.state_idx, EventType::OnNearGroupTask)
        && m2.health > 0.0
        && m2.mob_type.category == MobCategory::GroupTask
        && d <= m.mob_type.task_range
        && m2.task_workers.len() < m2.mob_type.max_task_workers
    {
        pending.push(PendingIntermobEvent {
            dist: d,
            event: EventType::OnNearGroupTask,
            other: m2.id,
        });
    }

    if m.mob_type.has_handler(m.state_idx, EventType::OnTouchActiveLeader)
        && sim.active_leader == Some(m2.id)
        && m2.mob_type.active_state == Some(m2.state_idx)
        && d <= sim.config.idle_bump_range
    {
        pending.push(PendingIntermobEvent {
            dist: d,
            event: EventType::OnTouchActiveLeader,
            other: m2.id,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ReachDef;
    use crate::testutil::{sim_with, state, type_def};

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn touch_fires_every_tick_while_overlapping() {
        let def = type_def(
            "bumper",
            vec![state(
                "idling",
                &[("on_touch_object", &["calculate touches $touches + 1"])],
            )],
        );
        let (mut sim, a) = sim_with(def);
        let kind = sim.content.get("bumper").unwrap();
        let b = sim.spawn_at(kind, Vec2::new(10.0, 0.0));
        let _ = b;

        process_mob_interactions(&mut sim, a, DT);
        process_mob_interactions(&mut sim, a, DT);
        process_mob_interactions(&mut sim, a, DT);
        assert_eq!(sim.arena.get(a).unwrap().var("touches"), "3");
    }

    #[test]
    fn no_touch_when_spans_do_not_overlap() {
        let mut def = type_def(
            "watcher",
            vec![state(
                "idling",
                &[
                    ("on_touch_object", &["set_var touched 1"]),
                    ("on_reach_object", &["set_var reached 1"]),
                ],
            )],
        );
        def.reaches.push(ReachDef {
            name: "sight".into(),
            dist_1: 500.0,
            half_angle_1: std::f32::consts::PI,
            dist_2: 0.0,
            half_angle_2: 0.0,
        });
        let (mut sim, a) = sim_with(def);
        let kind = sim.content.get("watcher").unwrap();
        let _b = sim.spawn_at(kind, Vec2::new(200.0, 0.0));
        sim.arena.get_mut(a).unwrap().near_reach = Some(0);
        sim.arena.get_mut(a).unwrap().update_spans();

        process_mob_interactions(&mut sim, a, DT);
        let mob = sim.arena.get(a).unwrap();
        // Reach noticed it, but nothing touched.
        assert_eq!(mob.var("touched"), "");
        assert_eq!(mob.var("reached"), "1");
    }

    #[test]
    fn pending_events_dispatch_closest_first_and_stop_on_state_change() {
        let mut def = type_def(
            "picky",
            vec![
                state(
                    "scanning",
                    &[(
                        "on_reach_object",
                        &[
                            "get_mob_info chosen trigger id",
                            "set_state chosen_one",
                        ],
                    )],
                ),
                state("chosen_one", &[]),
            ],
        );
        def.reaches.push(ReachDef {
            name: "sight".into(),
            dist_1: 500.0,
            half_angle_1: std::f32::consts::PI,
            dist_2: 0.0,
            half_angle_2: 0.0,
        });
        let (mut sim, a) = sim_with(def);
        let kind = sim.content.get("picky").unwrap();
        // Spawn out of id order so distance, not id, decides.
        let far = sim.spawn_at(kind.clone(), Vec2::new(15.0, 0.0));
        let near = sim.spawn_at(kind.clone(), Vec2::new(5.0, 0.0));
        let mid = sim.spawn_at(kind, Vec2::new(10.0, 0.0));
        let _ = (far, mid);
        sim.arena.get_mut(a).unwrap().near_reach = Some(0);
        sim.arena.get_mut(a).unwrap().update_spans();

        process_mob_interactions(&mut sim, a, DT);

        let mob = sim.arena.get(a).unwrap();
        assert_eq!(mob.state_name(), "chosen_one");
        // Only the distance-5 candidate's event ran.
        assert_eq!(mob.var("chosen"), near.0.to_string());
    }

    #[test]
    fn idle_idle_push_uses_reduced_constant_with_jitter() {
        let mut def = type_def("pikmin_like", vec![state("idling", &[])]);
        def.category = crate::mob::MobCategory::Pikmin;
        def.idle_state = Some("idling".into());
        let (mut sim, a) = sim_with(def);
        let kind = sim.content.get("pikmin_like").unwrap();
        let b = sim.spawn_at(kind, Vec2::new(1.0, 0.0));
        // Both well past the spawn throttle window, and kept active so
        // the culling pass doesn't skip them.
        for id in [a, b] {
            let m = sim.arena.get_mut(id).unwrap();
            m.time_alive = 5.0;
            m.is_active = true;
        }

        process_mob_interactions(&mut sim, a, DT);
        process_mob_interactions(&mut sim, b, DT);

        let ma = sim.arena.get(a).unwrap();
        let mb = sim.arena.get(b).unwrap();
        assert!((ma.push_amount - IDLE_PUSH_AMOUNT / DT).abs() < 0.001);
        assert!((mb.push_amount - IDLE_PUSH_AMOUNT / DT).abs() < 0.001);
        // The higher id deviates its angle; the lower does not.
        let base_a = geometry::angle_between(mb.pos, ma.pos);
        let base_b = geometry::angle_between(ma.pos, mb.pos);
        assert!((ma.push_angle - base_a).abs() < 0.001);
        assert!((mb.push_angle - (base_b + IDLE_PUSH_JITTER)).abs() < 0.001);
    }

    #[test]
    fn fresh_spawn_push_is_throttled_by_younger_age() {
        let mut def = type_def("pusher", vec![state("idling", &[])]);
        def.pushes = true;
        let (mut sim, a) = sim_with(def);
        let kind = sim.content.get("pusher").unwrap();
        let b = sim.spawn_at(kind, Vec2::new(1.0, 0.0));
        {
            let m = sim.arena.get_mut(a).unwrap();
            m.time_alive = 5.0;
            m.is_active = true;
        }
        {
            let m = sim.arena.get_mut(b).unwrap();
            m.time_alive = 0.5;
            m.is_active = true;
        }

        process_mob_interactions(&mut sim, a, DT);
        let full_overlap = {
            let ma = sim.arena.get(a).unwrap();
            let mb = sim.arena.get(b).unwrap();
            (ma.pos.distance(mb.pos) - ma.radius - mb.radius).abs()
        };
        let expected = full_overlap * (0.5 / PUSH_THROTTLE_TIMEOUT) * PUSH_THROTTLE_FACTOR / DT;
        let ma = sim.arena.get(a).unwrap();
        assert!((ma.push_amount - expected).abs() < 0.01);
    }

    #[test]
    fn hitbox_attack_contact_damages_and_respects_resistance() {
        let mut def = type_def(
            "brawler",
            vec![state(
                "idling",
                &[("on_hitbox_touched", &["calculate hits $hits + 1"])],
            )],
        );
        def.animations.push(crate::script::AnimationDef {
            name: "stand".into(),
            loops: true,
            frames: vec![crate::script::FrameDef {
                duration: 1.0,
                signal: None,
                hitboxes: vec![crate::script::HitboxDef {
                    kind: HitboxKind::Normal,
                    offset: [0.0, 0.0],
                    radius: 12.0,
                    z: 0.0,
                    height: 0.0,
                    body_part: 0,
                    hazards: vec![],
                    damage: 0.0,
                }],
            }],
        });
        def.animations.push(crate::script::AnimationDef {
            name: "bite".into(),
            loops: true,
            frames: vec![crate::script::FrameDef {
                duration: 1.0,
                signal: None,
                hitboxes: vec![crate::script::HitboxDef {
                    kind: HitboxKind::Attack,
                    offset: [0.0, 0.0],
                    radius: 12.0,
                    z: 0.0,
                    height: 0.0,
                    body_part: 1,
                    hazards: vec!["fire".into()],
                    damage: 25.0,
                }],
            }],
        });
        let (mut sim, victim) = sim_with(def);
        let kind = sim.content.get("brawler").unwrap();
        let attacker = sim.spawn_at(kind, Vec2::new(5.0, 0.0));
        sim.arena.get_mut(victim).unwrap().animation.set("stand");
        sim.arena.get_mut(victim).unwrap().team = crate::mob::Team::Player;
        sim.arena.get_mut(attacker).unwrap().animation.set("bite");
        sim.arena.get_mut(attacker).unwrap().team = crate::mob::Team::Enemy1;

        process_mob_interactions(&mut sim, victim, DT);
        let v = sim.arena.get(victim).unwrap();
        assert_eq!(v.var("hits"), "1");
        assert_eq!(v.health, v.max_health - 25.0);
    }

    #[test]
    fn hazard_resistance_short_circuits_the_pair() {
        let mut def = type_def(
            "fireproof",
            vec![state(
                "idling",
                &[
                    ("on_hitbox_touched", &["set_var hit 1"]),
                    ("on_touch_hazard", &["set_var burned 1"]),
                ],
            )],
        );
        def.resistances = vec!["fire".into()];
        def.animations.push(crate::script::AnimationDef {
            name: "stand".into(),
            loops: true,
            frames: vec![crate::script::FrameDef {
                duration: 1.0,
                signal: None,
                hitboxes: vec![crate::script::HitboxDef {
                    kind: HitboxKind::Normal,
                    offset: [0.0, 0.0],
                    radius: 12.0,
                    z: 0.0,
                    height: 0.0,
                    body_part: 0,
                    hazards: vec![],
                    damage: 0.0,
                }],
            }],
        });
        def.animations.push(crate::script::AnimationDef {
            name: "flame".into(),
            loops: true,
            frames: vec![crate::script::FrameDef {
                duration: 1.0,
                signal: None,
                hitboxes: vec![crate::script::HitboxDef {
                    kind: HitboxKind::Attack,
                    offset: [0.0, 0.0],
                    radius: 12.0,
                    z: 0.0,
                    height: 0.0,
                    body_part: 1,
                    hazards: vec!["fire".into()],
                    damage: 25.0,
                }],
            }],
        });
        let (mut sim, victim) = sim_with(def);
        let kind = sim.content.get("fireproof").unwrap();
        let attacker = sim.spawn_at(kind, Vec2::new(5.0, 0.0));
        sim.arena.get_mut(victim).unwrap().animation.set("stand");
        sim.arena.get_mut(victim).unwrap().team = crate::mob::Team::Player;
        sim.arena.get_mut(attacker).unwrap().animation.set("flame");
        sim.arena.get_mut(attacker).unwrap().team = crate::mob::Team::Enemy1;

        process_mob_interactions(&mut sim, victim, DT);
        let v = sim.arena.get(victim).unwrap();
        assert_eq!(v.var("hit"), "");
        assert_eq!(v.var("burned"), "");
        assert_eq!(v.health, v.max_health);
    }

    #[test]
    fn eat_event_requires_armed_chomp_and_matching_part() {
        let mut def = type_def(
            "snack",
            vec![state("idling", &[("on_hitbox_eaten", &["get_chomped"])])],
        );
        def.animations.push(crate::script::AnimationDef {
            name: "stand".into(),
            loops: true,
            frames: vec![crate::script::FrameDef {
                duration: 1.0,
                signal: None,
                hitboxes: vec![crate::script::HitboxDef {
                    kind: HitboxKind::Normal,
                    offset: [0.0, 0.0],
                    radius: 12.0,
                    z: 0.0,
                    height: 0.0,
                    body_part: 0,
                    hazards: vec![],
                    damage: 0.0,
                }],
            }],
        });
        def.animations.push(crate::script::AnimationDef {
            name: "mouth".into(),
            loops: true,
            frames: vec![crate::script::FrameDef {
                duration: 1.0,
                signal: None,
                hitboxes: vec![crate::script::HitboxDef {
                    kind: HitboxKind::Normal,
                    offset: [0.0, 0.0],
                    radius: 12.0,
                    z: 0.0,
                    height: 0.0,
                    body_part: 3,
                    hazards: vec![],
                    damage: 0.0,
                }],
            }],
        });
        let (mut sim, snack) = sim_with(def);
        let kind = sim.content.get("snack").unwrap();
        let eater = sim.spawn_at(kind, Vec2::new(5.0, 0.0));
        sim.arena.get_mut(snack).unwrap().animation.set("stand");
        sim.arena.get_mut(eater).unwrap().animation.set("mouth");

        // Not armed: nothing happens.
        process_mob_interactions(&mut sim, snack, DT);
        assert!(sim.arena.get(snack).unwrap().holder.is_none());

        // Armed on the right body part: the snack gets latched.
        {
            let e = sim.arena.get_mut(eater).unwrap();
            e.chomp_max = 1;
            e.chomp_parts = vec![3];
        }
        process_mob_interactions(&mut sim, snack, DT);
        let s = sim.arena.get(snack).unwrap();
        assert_eq!(s.holder, Some((eater, Some(3))));
        assert_eq!(sim.arena.get(eater).unwrap().chomping, vec![snack]);
    }

    #[test]
    fn near_tool_skips_reserved_tools() {
        let mut def = type_def(
            "scout",
            vec![state(
                "idling",
                &[("on_near_tool", &["set_var found 1"])],
            )],
        );
        def.task_range = 100.0;
        let (mut sim, scout) = sim_with(def);

        let mut tool_def = type_def("hammer", vec![state("idling", &[])]);
        tool_def.category = crate::mob::MobCategory::Tool;
        sim.content.load(&[tool_def]).unwrap();
        let tool_kind = sim.content.get("hammer").unwrap();
        let tool = sim.spawn_at(tool_kind, Vec2::new(50.0, 0.0));

        let rival_kind = sim.content.get("scout").unwrap();
        let rival = sim.spawn_at(rival_kind, Vec2::new(400.0, 0.0));
        sim.arena.get_mut(tool).unwrap().reserved_by = Some(rival);

        process_mob_interactions(&mut sim, scout, DT);
        assert_eq!(sim.arena.get(scout).unwrap().var("found"), "");

        sim.arena.get_mut(tool).unwrap().reserved_by = None;
        process_mob_interactions(&mut sim, scout, DT);
        assert_eq!(sim.arena.get(scout).unwrap().var("found"), "1");
    }

    #[test]
    fn active_leader_bump_requires_active_state() {
        let mut follower_def = type_def(
            "follower",
            vec![state(
                "idling",
                &[("on_touch_active_leader", &["set_var bumped 1"])],
            )],
        );
        follower_def.category = crate::mob::MobCategory::Pikmin;
        let (mut sim, follower) = sim_with(follower_def);

        let mut leader_def = type_def(
            "captain",
            vec![state("active", &[]), state("lying_down", &[])],
        );
        leader_def.category = crate::mob::MobCategory::Leader;
        leader_def.active_state = Some("active".into());
        sim.content.load(&[leader_def]).unwrap();
        let leader_kind = sim.content.get("captain").unwrap();
        let leader = sim.spawn_at(leader_kind, Vec2::new(20.0, 0.0));
        sim.active_leader = Some(leader);

        process_mob_interactions(&mut sim, follower, DT);
        assert_eq!(sim.arena.get(follower).unwrap().var("bumped"), "1");

        // A leader lying down does not bump.
        sim.arena.get_mut(follower).unwrap().vars.clear();
        let lying = sim
            .arena
            .get(leader)
            .unwrap()
            .mob_type
            .state_named("lying_down")
            .unwrap();
        sim.arena.get_mut(leader).unwrap().state_idx = lying;
        process_mob_interactions(&mut sim, follower, DT);
        assert_eq!(sim.arena.get(follower).unwrap().var("bumped"), "");
    }

    #[test]
    fn stored_mobs_do_not_interact() {
        let def = type_def(
            "shy",
            vec![state(
                "idling",
                &[("on_touch_object", &["set_var touched 1"])],
            )],
        );
        let (mut sim, a) = sim_with(def);
        let kind = sim.content.get("shy").unwrap();
        let b = sim.spawn_at(kind, Vec2::new(5.0, 0.0));
        sim.arena.get_mut(a).unwrap().stored_in = Some(b);
        process_mob_interactions(&mut sim, a, DT);
        assert_eq!(sim.arena.get(a).unwrap().var("touched"), "");
    }
}
