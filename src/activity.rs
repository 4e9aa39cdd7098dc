use bevy::prelude::*;

use crate::mob::{MobCategory, MobId};
use crate::simulation::Simulation;

/// Side length of one activity cell, in world units.
pub const AREA_CELL_SIZE: f32 = 128.0;

/// Padding added around the camera box when marking cells.
pub const CAMERA_MARGIN: f32 = 128.0;

/// Coarse grid over the playable area marking which cells matter this
/// frame. Mobs in inactive cells skip heavy FSM and interaction work.
pub struct ActivityGrid {
    top_left: Vec2,
    cols: usize,
    rows: usize,
    cells: Vec<bool>,
}

impl ActivityGrid {
    pub fn new(top_left: Vec2, width: f32, height: f32) -> ActivityGrid {
        let cols = (width / AREA_CELL_SIZE).ceil().max(1.0) as usize;
        let rows = (height / AREA_CELL_SIZE).ceil().max(1.0) as usize;
        ActivityGrid {
            top_left,
            cols,
            rows,
            cells: vec![false; cols * rows],
        }
    }

    pub fn clear(&mut self) {
        self.cells.fill(false);
    }

    /// Marks all cells covered by the world-space box, clamped to bounds.
    pub fn mark_region(&mut self, min: Vec2, max: Vec2) {
        let from_x = ((min.x - self.top_left.x) / AREA_CELL_SIZE).floor() as i64;
        let to_x = ((max.x - self.top_left.x) / AREA_CELL_SIZE).floor() as i64;
        let from_y = ((min.y - self.top_left.y) / AREA_CELL_SIZE).floor() as i64;
        let to_y = ((max.y - self.top_left.y) / AREA_CELL_SIZE).floor() as i64;

        let from_x = from_x.max(0);
        let to_x = to_x.min(self.cols as i64 - 1);
        let from_y = from_y.max(0);
        let to_y = to_y.min(self.rows as i64 - 1);
        if from_x > to_x || from_y > to_y {
            return;
        }

        for y in from_y..=to_y {
            for x in from_x..=to_x {
                self.cells[y as usize * self.cols + x as usize] = true;
            }
        }
    }

    /// Whether the cell containing `pos` is active. Outside the grid is
    /// always inactive.
    pub fn is_active(&self, pos: Vec2) -> bool {
        let x = ((pos.x - self.top_left.x) / AREA_CELL_SIZE).floor();
        let y = ((pos.y - self.top_left.y) / AREA_CELL_SIZE).floor();
        if x < 0.0 || y < 0.0 {
            return false;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.cols || y >= self.rows {
            return false;
        }
        self.cells[y * self.cols + x]
    }
}

/// Recomputes the active-cell grid and every mob's `is_active` flag:
/// cells near player-relevant mobs and inside the camera box are active,
/// and parent/child pairs propagate activity both ways.
pub fn update_activity(sim: &mut Simulation) {
    sim.grid.clear();

    let mut relevant: Vec<Vec2> = Vec::new();
    for mob in sim.arena.iter() {
        if matches!(
            mob.mob_type.category,
            MobCategory::Leader | MobCategory::Pikmin
        ) {
            relevant.push(mob.pos);
        }
    }
    for pos in relevant {
        sim.grid.mark_region(
            pos - Vec2::splat(AREA_CELL_SIZE),
            pos + Vec2::splat(AREA_CELL_SIZE),
        );
    }

    if let Some((min, max)) = sim.camera_box {
        sim.grid.mark_region(
            min - Vec2::splat(CAMERA_MARGIN),
            max + Vec2::splat(CAMERA_MARGIN),
        );
    }

    let mut child_pairs: Vec<(MobId, MobId)> = Vec::new();
    for mob in sim.arena.iter_mut() {
        mob.is_active = false;
    }
    let ids = sim.arena.ids();
    for id in ids {
        let Some(mob) = sim.arena.get_mut(id) else {
            continue;
        };
        mob.is_active = sim.grid.is_active(mob.pos);
        if let Some(parent) = mob.parent {
            child_pairs.push((id, parent));
        }
    }

    // Child activity lifts the parent, then parent activity lifts the
    // child, so e.g. a detached limb ticks whenever its owner does.
    for (child, parent) in &child_pairs {
        if sim.arena.get(*child).is_some_and(|c| c.is_active) {
            if let Some(p) = sim.arena.get_mut(*parent) {
                p.is_active = true;
            }
        }
    }
    for (child, parent) in &child_pairs {
        if sim.arena.get(*parent).is_some_and(|p| p.is_active) {
            if let Some(c) = sim.arena.get_mut(*child) {
                c.is_active = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{sim_with, state, type_def};

    #[test]
    fn follower_neighborhood_activates_nearby_mobs() {
        let mut def = type_def("sprout", vec![state("idling", &[])]);
        def.category = MobCategory::Pikmin;
        let (mut sim, follower) = sim_with(def);
        sim.camera_box = None;

        let mut crate_def = type_def("box", vec![state("idling", &[])]);
        crate_def.category = MobCategory::Carriable;
        sim.content.load(&[crate_def]).unwrap();
        let kind = sim.content.get("box").unwrap();
        let near = sim.spawn_at(kind.clone(), Vec2::new(100.0, 0.0));
        let far = sim.spawn_at(kind, Vec2::new(1500.0, 0.0));

        update_activity(&mut sim);
        assert!(sim.arena.get(follower).unwrap().is_active);
        assert!(sim.arena.get(near).unwrap().is_active);
        assert!(!sim.arena.get(far).unwrap().is_active);
    }

    #[test]
    fn parent_child_activity_propagates_both_ways() {
        let def = type_def("limb", vec![state("idling", &[])]);
        let (mut sim, body) = sim_with(def);
        sim.camera_box = Some((Vec2::splat(-200.0), Vec2::splat(200.0)));

        let kind = sim.content.get("limb").unwrap();
        let limb = sim.spawn_at(kind, Vec2::new(1500.0, 0.0));
        sim.arena.get_mut(limb).unwrap().parent = Some(body);

        // Parent in view lifts the detached child.
        update_activity(&mut sim);
        assert!(sim.arena.get(body).unwrap().is_active);
        assert!(sim.arena.get(limb).unwrap().is_active);

        // And the other way around.
        sim.camera_box = Some((Vec2::new(1400.0, -100.0), Vec2::new(1600.0, 100.0)));
        update_activity(&mut sim);
        assert!(sim.arena.get(limb).unwrap().is_active);
        assert!(sim.arena.get(body).unwrap().is_active);
    }

    #[test]
    fn out_of_bounds_is_inactive() {
        let mut grid = ActivityGrid::new(Vec2::ZERO, 1024.0, 1024.0);
        grid.mark_region(Vec2::ZERO, Vec2::splat(2000.0));
        assert!(grid.is_active(Vec2::new(500.0, 500.0)));
        assert!(!grid.is_active(Vec2::new(-10.0, 500.0)));
        assert!(!grid.is_active(Vec2::new(500.0, 5000.0)));
    }

    #[test]
    fn marking_is_clamped_and_local() {
        let mut grid = ActivityGrid::new(Vec2::ZERO, 1024.0, 1024.0);
        grid.mark_region(Vec2::new(200.0, 200.0), Vec2::new(300.0, 300.0));
        assert!(grid.is_active(Vec2::new(250.0, 250.0)));
        assert!(!grid.is_active(Vec2::new(900.0, 900.0)));
        grid.clear();
        assert!(!grid.is_active(Vec2::new(250.0, 250.0)));
    }

}
