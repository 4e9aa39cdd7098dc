use bevy::prelude::*;

pub const TAU_F32: f32 = std::f32::consts::TAU;

/// Angle from `from` to `to`, in radians, in the range [-PI, PI].
pub fn angle_between(from: Vec2, to: Vec2) -> f32 {
    (to.y - from.y).atan2(to.x - from.x)
}

/// Smallest absolute difference between two angles, in [0, PI].
pub fn angle_smallest_diff(a: f32, b: f32) -> f32 {
    let mut diff = (b - a) % TAU_F32;
    if diff < 0.0 {
        diff += TAU_F32;
    }
    if diff > std::f32::consts::PI {
        diff = TAU_F32 - diff;
    }
    diff
}

/// Rotates `p` around the origin by `angle` radians.
pub fn rotate_point(p: Vec2, angle: f32) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    Vec2::new(p.x * cos - p.y * sin, p.x * sin + p.y * cos)
}

/// Rotates `offset` by a pre-computed cosine/sine pair and adds `origin`.
/// The interaction loop caches cos/sin per mob, so intersection checks
/// don't re-derive them for every hitbox.
pub fn local_to_world(origin: Vec2, offset: Vec2, cos: f32, sin: f32) -> Vec2 {
    Vec2::new(
        origin.x + offset.x * cos - offset.y * sin,
        origin.y + offset.x * sin + offset.y * cos,
    )
}

/// Whether two vertical ranges overlap. A `height` of 0 is an unbounded
/// column and matches everything.
pub fn z_ranges_overlap(z1: f32, h1: f32, z2: f32, h2: f32) -> bool {
    if h1 == 0.0 || h2 == 0.0 {
        return true;
    }
    !(z2 > z1 + h1 || z2 + h2 < z1)
}

pub struct Penetration {
    pub amount: f32,
    pub angle: f32,
}

/// Circle vs circle. Returns how far and in what direction the first
/// circle must move to stop overlapping, if they overlap at all.
pub fn circles_intersect(
    c1: Vec2,
    r1: f32,
    c2: Vec2,
    r2: f32,
) -> Option<Penetration> {
    let d = c1.distance(c2);
    if d > r1 + r2 {
        return None;
    }
    Some(Penetration {
        amount: (d - r1 - r2).abs(),
        angle: angle_between(c2, c1),
    })
}

/// Circle vs rotated rectangle. The rectangle is centered on `rect_pos`
/// with full dimensions `rect_dim`, rotated by `rect_angle`.
pub fn circle_intersects_rectangle(
    circle: Vec2,
    radius: f32,
    rect_pos: Vec2,
    rect_dim: Vec2,
    rect_angle: f32,
) -> Option<Penetration> {
    // Work in the rectangle's local space.
    let local = rotate_point(circle - rect_pos, -rect_angle);
    let half = rect_dim * 0.5;
    let nearest = Vec2::new(
        local.x.clamp(-half.x, half.x),
        local.y.clamp(-half.y, half.y),
    );
    let delta = local - nearest;
    let d = delta.length();

    if d > radius {
        return None;
    }

    let (amount, local_angle) = if d > 0.0001 {
        // Circle center outside the rectangle: push along the nearest-point
        // normal.
        (radius - d, delta.y.atan2(delta.x))
    } else {
        // Center inside: push out of the closest face.
        let to_right = half.x - local.x;
        let to_left = local.x + half.x;
        let to_top = half.y - local.y;
        let to_bottom = local.y + half.y;
        let min = to_right.min(to_left).min(to_top).min(to_bottom);
        let angle = if min == to_right {
            0.0
        } else if min == to_left {
            std::f32::consts::PI
        } else if min == to_top {
            std::f32::consts::FRAC_PI_2
        } else {
            -std::f32::consts::FRAC_PI_2
        };
        (radius + min, angle)
    };

    Some(Penetration {
        amount,
        angle: local_angle + rect_angle,
    })
}

/// Rotated rectangle vs rotated rectangle, separating-axis test over both
/// rectangles' edge normals. Penetration is the smallest overlap axis.
pub fn rectangles_intersect(
    pos1: Vec2,
    dim1: Vec2,
    angle1: f32,
    pos2: Vec2,
    dim2: Vec2,
    angle2: f32,
) -> Option<Penetration> {
    let corners1 = rect_corners(pos1, dim1, angle1);
    let corners2 = rect_corners(pos2, dim2, angle2);

    let mut best: Option<Penetration> = None;
    for axis_angle in [
        angle1,
        angle1 + std::f32::consts::FRAC_PI_2,
        angle2,
        angle2 + std::f32::consts::FRAC_PI_2,
    ] {
        let axis = Vec2::new(axis_angle.cos(), axis_angle.sin());
        let (min1, max1) = project_corners(&corners1, axis);
        let (min2, max2) = project_corners(&corners2, axis);
        let overlap = max1.min(max2) - min1.max(min2);
        if overlap <= 0.0 {
            return None;
        }
        let push_sign = if pos1.dot(axis) < pos2.dot(axis) { -1.0 } else { 1.0 };
        let push = axis * push_sign;
        let candidate = Penetration {
            amount: overlap,
            angle: push.y.atan2(push.x),
        };
        if best.as_ref().map_or(true, |b| candidate.amount < b.amount) {
            best = Some(candidate);
        }
    }
    best
}

/// Whether the segment `a`-`b` passes within `radius` of `center`.
pub fn segment_intersects_circle(a: Vec2, b: Vec2, center: Vec2, radius: f32) -> bool {
    let ab = b - a;
    let len_sq = ab.length_squared();
    let t = if len_sq <= 0.0001 {
        0.0
    } else {
        ((center - a).dot(ab) / len_sq).clamp(0.0, 1.0)
    };
    let nearest = a + ab * t;
    nearest.distance(center) <= radius
}

fn rect_corners(pos: Vec2, dim: Vec2, angle: f32) -> [Vec2; 4] {
    let half = dim * 0.5;
    [
        pos + rotate_point(Vec2::new(-half.x, -half.y), angle),
        pos + rotate_point(Vec2::new(half.x, -half.y), angle),
        pos + rotate_point(Vec2::new(half.x, half.y), angle),
        pos + rotate_point(Vec2::new(-half.x, half.y), angle),
    ]
}

fn project_corners(corners: &[Vec2; 4], axis: Vec2) -> (f32, f32) {
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for c in corners {
        let p = c.dot(axis);
        min = min.min(p);
        max = max.max(p);
    }
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn angle_diff_wraps_correctly() {
        assert!(angle_smallest_diff(0.1, TAU_F32 - 0.1) - 0.2 < 0.001);
        assert!(angle_smallest_diff(0.0, std::f32::consts::PI) - std::f32::consts::PI < 0.001);
        assert!(angle_smallest_diff(1.0, 1.0) < 0.001);
    }

    #[test]
    fn separate_circles_do_not_intersect() {
        assert!(circles_intersect(Vec2::ZERO, 5.0, Vec2::new(20.0, 0.0), 5.0).is_none());
    }

    #[test]
    fn overlapping_circles_push_apart() {
        let p = circles_intersect(Vec2::ZERO, 5.0, Vec2::new(8.0, 0.0), 5.0).unwrap();
        assert!((p.amount - 2.0).abs() < 0.001);
        // First circle gets pushed away from the second, i.e. towards -X.
        assert!(angle_smallest_diff(p.angle, std::f32::consts::PI) < 0.001);
    }

    #[test]
    fn circle_rect_hit_and_miss() {
        let dim = Vec2::new(20.0, 10.0);
        assert!(circle_intersects_rectangle(Vec2::new(14.0, 0.0), 5.0, Vec2::ZERO, dim, 0.0).is_some());
        assert!(circle_intersects_rectangle(Vec2::new(20.0, 0.0), 5.0, Vec2::ZERO, dim, 0.0).is_none());
        // Rotating the rectangle 90 degrees swaps which side is long.
        let rotated = circle_intersects_rectangle(
            Vec2::new(14.0, 0.0),
            5.0,
            Vec2::ZERO,
            dim,
            std::f32::consts::FRAC_PI_2,
        );
        assert!(rotated.is_none());
    }

    #[test]
    fn rect_rect_overlap_depth() {
        let p = rectangles_intersect(
            Vec2::ZERO,
            Vec2::new(10.0, 10.0),
            0.0,
            Vec2::new(8.0, 0.0),
            Vec2::new(10.0, 10.0),
            0.0,
        )
        .unwrap();
        assert!((p.amount - 2.0).abs() < 0.01);
        assert!(rectangles_intersect(
            Vec2::ZERO,
            Vec2::new(10.0, 10.0),
            0.0,
            Vec2::new(30.0, 0.0),
            Vec2::new(10.0, 10.0),
            0.0,
        )
        .is_none());
    }

    #[test]
    fn zero_height_is_an_unbounded_column() {
        assert!(z_ranges_overlap(0.0, 0.0, 500.0, 10.0));
        assert!(z_ranges_overlap(0.0, 10.0, 5.0, 10.0));
        assert!(!z_ranges_overlap(0.0, 10.0, 20.0, 10.0));
    }
}
