use std::sync::Arc;

use bevy::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::activity::{self, ActivityGrid};
use crate::events::SimEventBus;
use crate::fsm::{self, EventInfo};
use crate::interaction::{self, SPAWN_GRACE_PERIOD};
use crate::mob::{ChaseTarget, MobArena, MobDebugInfo, MobId};
use crate::script::{ContentLibrary, EventType, MobType, MobTypeDef};

pub struct SimConfig {
    /// How close the actively-controlled leader has to be to "bump" an
    /// idle mob.
    pub idle_bump_range: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            idle_bump_range: 50.0,
        }
    }
}

/// Floor-height query supplied by the geometry collaborator.
pub type TerrainQuery = Box<dyn Fn(Vec2) -> f32 + Send + Sync>;

/// The whole simulation: content, live mobs, the activity grid, and the
/// diagnostics feed. One instance per loaded area; tests build as many
/// isolated instances as they like.
#[derive(Resource)]
pub struct Simulation {
    pub content: ContentLibrary,
    pub arena: MobArena,
    pub grid: ActivityGrid,
    pub bus: SimEventBus,
    pub rng: SmallRng,
    pub frame: u64,
    pub config: SimConfig,
    /// Camera view box (min, max); marked active with a margin.
    pub camera_box: Option<(Vec2, Vec2)>,
    pub active_leader: Option<MobId>,
    pub terrain: TerrainQuery,
    pub depth_drop_logged: bool,
}

impl Simulation {
    pub fn new(area_top_left: Vec2, width: f32, height: f32, seed: u64) -> Simulation {
        Simulation {
            content: ContentLibrary::default(),
            arena: MobArena::default(),
            grid: ActivityGrid::new(area_top_left, width, height),
            bus: SimEventBus::default(),
            rng: SmallRng::seed_from_u64(seed),
            frame: 0,
            config: SimConfig::default(),
            camera_box: None,
            active_leader: None,
            terrain: Box::new(|_| 0.0),
            depth_drop_logged: false,
        }
    }

    pub fn load_content(&mut self, defs: &[MobTypeDef]) -> Result<(), String> {
        self.content.load(defs)
    }

    /// Creates a mob and runs its entry events. The mob joins this
    /// tick's world immediately but only starts being walked next tick.
    pub fn spawn_mob(&mut self, kind: Arc<MobType>, pos: Vec2, angle: f32) -> MobId {
        let type_name = kind.name.clone();
        let id = self.arena.spawn(kind, pos, angle);
        self.bus.spawn(id, &type_name);
        fsm::run_event(self, id, EventType::OnEnter, &EventInfo::default(), 0);
        fsm::run_event(self, id, EventType::OnReady, &EventInfo::default(), 0);
        id
    }

    pub fn spawn_at(&mut self, kind: Arc<MobType>, pos: Vec2) -> MobId {
        self.spawn_mob(kind, pos, 0.0)
    }

    pub fn spawn_by_name(&mut self, name: &str, pos: Vec2) -> Option<MobId> {
        let kind = self.content.get(name)?;
        Some(self.spawn_at(kind, pos))
    }

    /// Read-only script-state snapshot for debug overlays.
    pub fn inspect(&self, id: MobId) -> Option<MobDebugInfo> {
        self.arena.get(id).map(|m| m.debug_info())
    }

    /// One simulation step: activity partition, per-mob FSM ticking,
    /// interaction resolution, push integration, then the deferred
    /// deletion sweep.
    pub fn tick(&mut self, dt: f32) {
        self.frame += 1;
        self.bus.frame = self.frame;

        activity::update_activity(self);

        let ids = self.arena.ids();
        for id in &ids {
            self.tick_mob(*id, dt);
        }
        for id in &ids {
            interaction::process_mob_interactions(self, *id, dt);
        }
        self.apply_pushes(dt);
        self.sweep_deleted();
    }

    fn tick_mob(&mut self, id: MobId, dt: f32) {
        let Some(mob) = self.arena.get_mut(id) else {
            return;
        };
        if mob.to_delete {
            return;
        }
        mob.time_alive += dt;

        let runs_logic = mob.is_active
            || mob.mob_type.inactive_ticks
            || mob.time_alive <= SPAWN_GRACE_PERIOD;
        if !runs_logic {
            return;
        }

        // Cooperative timer: decrement once per tick, fire on crossing
        // zero.
        let mut fire_timer = false;
        if let Some(t) = mob.script_timer {
            let remaining = t - dt;
            if remaining <= 0.0 {
                mob.script_timer = None;
                fire_timer = true;
            } else {
                mob.script_timer = Some(remaining);
            }
        }

        let mob_type = mob.mob_type.clone();
        let mut signals = Vec::new();
        let mut animation_ended = false;
        if let Some(name) = mob.animation.name.clone() {
            if let Some(animation) = mob_type.animations.get(&name) {
                let out = mob.animation.advance(animation, dt);
                signals = out.signals;
                animation_ended = out.ended;
            }
        }

        if fire_timer {
            fsm::run_event(self, id, EventType::OnTimer, &EventInfo::default(), 0);
        }
        for signal in signals {
            let info = EventInfo {
                frame_signal: Some(signal),
                ..Default::default()
            };
            fsm::run_event(self, id, EventType::OnFrameSignal, &info, 0);
        }
        if animation_ended {
            fsm::run_event(self, id, EventType::OnAnimationEnd, &EventInfo::default(), 0);
        }
        fsm::run_event(self, id, EventType::OnTick, &EventInfo::default(), 0);

        self.tick_movement(id, dt);
    }

    /// Chase and path-follow integration. Held and stored mobs move with
    /// their holder instead.
    fn tick_movement(&mut self, id: MobId, dt: f32) {
        let Some(mob) = self.arena.get(id) else {
            return;
        };
        if mob.holder.is_some() || mob.stored_in.is_some() {
            return;
        }

        if let Some(chase) = mob.chase.clone() {
            let target = match chase.target {
                ChaseTarget::Point(p) => Some(p),
                ChaseTarget::Mob(m) => self.arena.get(m).map(|t| t.pos),
            };
            let Some(target) = target else {
                if let Some(mob) = self.arena.get_mut(id) {
                    mob.chase = None;
                }
                return;
            };
            let step = chase.speed * dt;
            let pos = mob.pos;
            let dist = pos.distance(target);
            if dist <= step {
                if let Some(mob) = self.arena.get_mut(id) {
                    mob.pos = target;
                    mob.chase = None;
                }
                fsm::run_event(
                    self,
                    id,
                    EventType::OnReachedDestination,
                    &EventInfo::default(),
                    0,
                );
            } else if dist > 0.0 {
                let dir = (target - pos) / dist;
                if let Some(mob) = self.arena.get_mut(id) {
                    mob.pos += dir * step;
                    mob.set_angle(dir.y.atan2(dir.x));
                }
            }
            return;
        }

        if let Some(path) = mob.path.clone() {
            let Some(stop) = path.stops.get(path.next).copied() else {
                if let Some(mob) = self.arena.get_mut(id) {
                    mob.path = None;
                }
                return;
            };
            let speed = mob.mob_type.move_speed;
            let step = speed * dt;
            let pos = mob.pos;
            let dist = pos.distance(stop);
            if dist <= step {
                let mut done = false;
                if let Some(mob) = self.arena.get_mut(id) {
                    mob.pos = stop;
                    if let Some(p) = &mut mob.path {
                        p.next += 1;
                        done = p.next >= p.stops.len();
                    }
                    if done {
                        mob.path = None;
                    }
                }
                if done {
                    fsm::run_event(self, id, EventType::OnPathDone, &EventInfo::default(), 0);
                }
            } else if dist > 0.0 {
                let dir = (stop - pos) / dist;
                if let Some(mob) = self.arena.get_mut(id) {
                    mob.pos += dir * step;
                    mob.set_angle(dir.y.atan2(dir.x));
                }
            }
        }
    }

    /// Applies the strongest push accumulated by the interaction pass
    /// and resets the accumulator for next tick.
    fn apply_pushes(&mut self, dt: f32) {
        for mob in self.arena.iter_mut() {
            if mob.push_amount > 0.0 {
                let dir = Vec2::new(mob.push_angle.cos(), mob.push_angle.sin());
                mob.pos += dir * mob.push_amount * dt;
                mob.push_amount = 0.0;
            }
        }
    }

    /// End-of-tick removal. Watchers whose focus went away get told
    /// after the sweep, once the reference is already scrubbed.
    fn sweep_deleted(&mut self) {
        let doomed: Vec<MobId> = self
            .arena
            .iter()
            .filter(|m| m.to_delete)
            .map(|m| m.id)
            .collect();
        if doomed.is_empty() {
            return;
        }
        let watchers: Vec<MobId> = self
            .arena
            .iter()
            .filter(|m| {
                !m.to_delete && m.focus.map(|f| doomed.contains(&f)).unwrap_or(false)
            })
            .map(|m| m.id)
            .collect();

        self.arena.sweep_deleted();

        for watcher in watchers {
            fsm::run_event(
                self,
                watcher,
                EventType::OnFocusGone,
                &EventInfo::default(),
                0,
            );
        }
    }
}

pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            FixedUpdate,
            advance_simulation.run_if(resource_exists::<Simulation>),
        );
    }
}

fn advance_simulation(mut sim: ResMut<Simulation>, time: Res<Time<Fixed>>) {
    let dt = time.delta_secs();
    sim.tick(dt);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{sim_with, state, type_def};

    const DT: f32 = 0.05;

    #[test]
    fn script_timer_fires_once_when_crossing_zero() {
        let def = type_def(
            "waiter",
            vec![state(
                "idling",
                &[
                    ("on_enter", &["set_timer 0.1"]),
                    ("on_timer", &["calculate fired $fired + 1"]),
                ],
            )],
        );
        let (mut sim, id) = sim_with(def);
        for _ in 0..10 {
            sim.tick(DT);
        }
        let mob = sim.arena.get(id).unwrap();
        assert_eq!(mob.var("fired"), "1");
        assert!(mob.script_timer.is_none());
    }

    #[test]
    fn on_tick_runs_only_for_active_mobs() {
        let def = type_def(
            "ticker",
            vec![state("idling", &[("on_tick", &["calculate n $n + 1"])])],
        );
        let (mut sim, id) = sim_with(def);
        sim.tick(DT);
        assert_eq!(sim.arena.get(id).unwrap().var("n"), "1");

        // Move the camera away; once past the grace window the mob's
        // cell goes inactive and ticking stops.
        sim.camera_box = Some((Vec2::new(50_000.0, 50_000.0), Vec2::new(51_000.0, 51_000.0)));
        sim.arena.get_mut(id).unwrap().time_alive = 10.0;
        sim.tick(DT);
        assert_eq!(sim.arena.get(id).unwrap().var("n"), "1");
    }

    #[test]
    fn chase_movement_reaches_target_and_reports() {
        let def = type_def(
            "runner",
            vec![state(
                "idling",
                &[
                    ("on_enter", &["move_to_absolute 30 0"]),
                    ("on_reached_destination", &["set_var arrived 1"]),
                ],
            )],
        );
        let (mut sim, id) = sim_with(def);
        for _ in 0..60 {
            sim.tick(DT);
        }
        let mob = sim.arena.get(id).unwrap();
        assert_eq!(mob.var("arrived"), "1");
        assert!((mob.pos.x - 30.0).abs() < 0.001);
        assert!(mob.chase.is_none());
    }

    #[test]
    fn path_follow_completes_and_fires_done() {
        let def = type_def(
            "walker",
            vec![state(
                "idling",
                &[
                    ("on_enter", &["follow_path_to_absolute 40 0"]),
                    ("on_path_done", &["set_var there 1"]),
                ],
            )],
        );
        let (mut sim, id) = sim_with(def);
        for _ in 0..60 {
            sim.tick(DT);
        }
        assert_eq!(sim.arena.get(id).unwrap().var("there"), "1");
    }

    #[test]
    fn deleted_focus_raises_focus_gone_after_sweep() {
        let def = type_def(
            "watcher",
            vec![state(
                "idling",
                &[("on_focus_gone", &["set_var lost 1"])],
            )],
        );
        let (mut sim, a) = sim_with(def);
        let kind = sim.content.get("watcher").unwrap();
        let b = sim.spawn_at(kind, Vec2::new(500.0, 0.0));
        sim.arena.get_mut(a).unwrap().focus = Some(b);
        sim.arena.get_mut(b).unwrap().to_delete = true;
        sim.tick(DT);
        assert!(sim.arena.get(b).is_none());
        let mob = sim.arena.get(a).unwrap();
        assert!(mob.focus.is_none());
        assert_eq!(mob.var("lost"), "1");
    }

    #[test]
    fn spawned_mob_joins_next_ticks_walk() {
        let def = {
            let mut d = type_def(
                "parent",
                vec![state(
                    "idling",
                    &[("on_enter", &["set_timer 0.1"]), ("on_timer", &["spawn child"])],
                )],
            );
            d.spawns.push(crate::script::SpawnDef {
                name: "child".into(),
                object: "parent".into(),
                offset: [30.0, 0.0, 0.0],
                angle: 0.0,
                relative: true,
                link_object_to_spawn: false,
                link_spawn_to_object: false,
            });
            d
        };
        let (mut sim, _) = sim_with(def);
        assert_eq!(sim.arena.len(), 1);
        for _ in 0..3 {
            sim.tick(DT);
        }
        assert_eq!(sim.arena.len(), 2);
    }

    #[test]
    fn inspector_surfaces_script_state() {
        let def = type_def(
            "glassy",
            vec![state(
                "idling",
                &[("on_enter", &["set_var mood calm", "set_timer 9"])],
            )],
        );
        let (mut sim, id) = sim_with(def);
        sim.tick(DT);
        let info = sim.inspect(id).unwrap();
        assert_eq!(info.state, "idling");
        assert_eq!(info.vars.get("mood").map(String::as_str), Some("calm"));
        assert!(info.timer_remaining.is_some());
    }

    // The flukeweed-like scenario: capturing -> idling on a short timer,
    // idling -> pulled on a message, then health drains on a cadence
    // that tightens as the "power" stat rises.
    fn flukeweed_def() -> crate::script::MobTypeDef {
        let mut def = type_def(
            "flukeweed",
            vec![
                state(
                    "capturing",
                    &[
                        ("on_enter", &["set_var capturing true", "set_timer 0.1"]),
                        ("on_timer", &["set_var capturing false", "set_state idling"]),
                    ],
                ),
                state(
                    "idling",
                    &[(
                        "on_receive_message",
                        &[
                            "get_event_info msg message",
                            "if $msg = goal_reached",
                            "set_state pulled",
                            "end_if",
                        ],
                    )],
                ),
                state(
                    "pulled",
                    &[
                        (
                            "on_enter",
                            &[
                                "if $power <= 3",
                                "set_timer 1.5",
                                "end_if",
                                "if $power = 4",
                                "set_timer 1.25",
                                "end_if",
                                "if $power >= 5",
                                "set_timer 1",
                                "end_if",
                            ],
                        ),
                        (
                            "on_timer",
                            &[
                                "add_health -20",
                                "if $power <= 3",
                                "set_timer 1.5",
                                "end_if",
                                "if $power = 4",
                                "set_timer 1.25",
                                "end_if",
                                "if $power >= 5",
                                "set_timer 1",
                                "end_if",
                            ],
                        ),
                    ],
                ),
                state("dying", &[]),
            ],
        );
        def.death_state = Some("dying".into());
        def
    }

    #[test]
    fn flukeweed_lifecycle_reaches_pulled() {
        let (mut sim, id) = sim_with(flukeweed_def());
        assert_eq!(sim.arena.get(id).unwrap().state_name(), "capturing");
        assert_eq!(sim.arena.get(id).unwrap().var("capturing"), "true");

        sim.tick(DT);
        sim.tick(DT);
        let mob = sim.arena.get(id).unwrap();
        assert_eq!(mob.state_name(), "idling");
        assert_eq!(mob.var("capturing"), "false");

        // A non-matching message does nothing.
        let info = crate::fsm::EventInfo {
            message: Some("hello".into()),
            ..Default::default()
        };
        fsm::run_event(&mut sim, id, EventType::OnReceiveMessage, &info, 0);
        assert_eq!(sim.arena.get(id).unwrap().state_name(), "idling");

        let info = crate::fsm::EventInfo {
            message: Some("goal_reached".into()),
            ..Default::default()
        };
        fsm::run_event(&mut sim, id, EventType::OnReceiveMessage, &info, 0);
        assert_eq!(sim.arena.get(id).unwrap().state_name(), "pulled");
    }

    #[test]
    fn flukeweed_drain_cadence_follows_power() {
        // power <= 3 drains every 1.5s, = 4 every 1.25s, >= 5 every 1.0s.
        for (power, expected_ticks) in [("3", 30), ("4", 25), ("5", 20)] {
            let (mut sim, id) = sim_with(flukeweed_def());
            sim.tick(DT);
            sim.tick(DT);
            assert_eq!(sim.arena.get(id).unwrap().state_name(), "idling");
            sim.arena
                .get_mut(id)
                .unwrap()
                .vars
                .insert("power".into(), power.into());
            let info = crate::fsm::EventInfo {
                message: Some("goal_reached".into()),
                ..Default::default()
            };
            fsm::run_event(&mut sim, id, EventType::OnReceiveMessage, &info, 0);

            let start = sim.arena.get(id).unwrap().health;
            let mut ticks = 0;
            while sim.arena.get(id).unwrap().health == start {
                sim.tick(DT);
                ticks += 1;
                assert!(ticks < 100, "drain never happened at power {power}");
            }
            assert_eq!(
                ticks, expected_ticks,
                "wrong drain interval at power {power}"
            );
            assert_eq!(sim.arena.get(id).unwrap().health, start - 20.0);
        }
    }
}
