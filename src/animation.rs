use bevy::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum HitboxKind {
    /// Takes damage, can be latched onto.
    #[default]
    Normal,
    /// Deals damage.
    Attack,
    /// Ignored by all checks this frame.
    Disabled,
}

/// A hitbox on one animation frame, in the mob's local space.
#[derive(Clone, Debug)]
pub struct FrameHitbox {
    pub kind: HitboxKind,
    pub offset: Vec2,
    pub radius: f32,
    pub z: f32,
    pub height: f32,
    pub body_part: usize,
    pub hazards: Vec<String>,
    /// Damage dealt on a confirmed normal-vs-attack contact.
    pub damage: f32,
}

#[derive(Clone, Debug)]
pub struct Frame {
    pub duration: f32,
    pub signal: Option<u32>,
    pub hitboxes: Vec<FrameHitbox>,
}

#[derive(Clone, Debug)]
pub struct Animation {
    pub name: String,
    pub loops: bool,
    pub frames: Vec<Frame>,
}

/// What one tick of animation playback produced.
#[derive(Default)]
pub struct AnimationAdvance {
    pub signals: Vec<u32>,
    pub ended: bool,
}

/// Per-mob playback cursor. The animation data itself lives on the mob
/// type; this only tracks where in it the mob is.
#[derive(Clone, Debug, Default)]
pub struct AnimationState {
    pub name: Option<String>,
    pub frame_idx: usize,
    pub frame_time: f32,
    ended: bool,
}

impl AnimationState {
    pub fn set(&mut self, name: &str) {
        self.name = Some(name.to_string());
        self.frame_idx = 0;
        self.frame_time = 0.0;
        self.ended = false;
    }

    /// Advances playback by `dt`. Fires each entered frame's signal, and
    /// reports the end of a non-looping animation exactly once.
    pub fn advance(&mut self, animation: &Animation, dt: f32) -> AnimationAdvance {
        let mut out = AnimationAdvance::default();
        if animation.frames.is_empty() || self.ended {
            return out;
        }
        self.frame_time += dt;
        loop {
            let frame = &animation.frames[self.frame_idx];
            if frame.duration <= 0.0 || self.frame_time < frame.duration {
                break;
            }
            self.frame_time -= frame.duration;
            if self.frame_idx + 1 < animation.frames.len() {
                self.frame_idx += 1;
            } else if animation.loops {
                self.frame_idx = 0;
            } else {
                self.ended = true;
                out.ended = true;
                break;
            }
            if let Some(signal) = animation.frames[self.frame_idx].signal {
                out.signals.push(signal);
            }
        }
        out
    }

    pub fn current_hitboxes<'a>(&self, animation: &'a Animation) -> &'a [FrameHitbox] {
        animation
            .frames
            .get(self.frame_idx)
            .map(|f| f.hitboxes.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_frame_animation(loops: bool) -> Animation {
        Animation {
            name: "swing".into(),
            loops,
            frames: vec![
                Frame {
                    duration: 0.1,
                    signal: None,
                    hitboxes: Vec::new(),
                },
                Frame {
                    duration: 0.1,
                    signal: Some(7),
                    hitboxes: Vec::new(),
                },
            ],
        }
    }

    #[test]
    fn non_looping_animation_ends_once() {
        let anim = two_frame_animation(false);
        let mut state = AnimationState::default();
        state.set("swing");

        let first = state.advance(&anim, 0.1);
        assert!(!first.ended);
        assert_eq!(first.signals, vec![7]);

        let second = state.advance(&anim, 0.1);
        assert!(second.ended);

        // Already ended; no second end report.
        let third = state.advance(&anim, 1.0);
        assert!(!third.ended);
    }

    #[test]
    fn looping_animation_wraps() {
        let anim = two_frame_animation(true);
        let mut state = AnimationState::default();
        state.set("swing");
        let out = state.advance(&anim, 0.25);
        assert!(!out.ended);
        assert_eq!(state.frame_idx, 0);
    }
}
