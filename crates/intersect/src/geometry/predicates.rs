//! Tolerance-aware geometric predicates.
//!
//! Every routine here is pure. Results are tri-state enums (miss, a unique
//! hit with its parameters, or a degenerate/coincident case); callers decide
//! what a miss means. Equality is always tolerance-relative.

use nalgebra::Matrix3;

use super::point::{Point2d, Point3d};
use super::surfaces::Plane;
use super::vector::{Vec2, Vec3};
use crate::Tol;

/// Determinants below this make a three-plane solve singular.
pub const SINGULAR_DETERMINANT: f64 = 1.0e-16;

// ─── Point vs. Segment ──────────────────────────────────────────────────────

/// Where a 3D point sits relative to a segment `a..b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentProximity {
    /// Within tolerance of `a`.
    AtStart,
    /// Within tolerance of `b`.
    AtEnd,
    /// Within tolerance of the open segment, at fraction `t` from `a`.
    Interior { t: f64 },
    /// Farther than tolerance from every point of the segment.
    Off { distance: f64 },
}

pub fn point_segment_3d(p: &Point3d, a: &Point3d, b: &Point3d, tol: &Tol) -> SegmentProximity {
    if p.distance_squared_to(a) <= tol.dist_sq {
        return SegmentProximity::AtStart;
    }
    if p.distance_squared_to(b) <= tol.dist_sq {
        return SegmentProximity::AtEnd;
    }
    let ab = *b - *a;
    let len_sq = ab.length_squared();
    if len_sq <= tol.dist_sq {
        return SegmentProximity::Off {
            distance: p.distance_to(a),
        };
    }
    let t = (*p - *a).dot(&ab) / len_sq;
    if t <= 0.0 {
        return SegmentProximity::Off {
            distance: p.distance_to(a),
        };
    }
    if t >= 1.0 {
        return SegmentProximity::Off {
            distance: p.distance_to(b),
        };
    }
    let foot = a.lerp(b, t);
    let d_sq = p.distance_squared_to(&foot);
    if d_sq <= tol.dist_sq {
        SegmentProximity::Interior { t }
    } else {
        SegmentProximity::Off {
            distance: d_sq.sqrt(),
        }
    }
}

/// Where a 2D point sits relative to a segment `a..b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointOnSegment {
    AtStart,
    AtEnd,
    /// On the segment strictly between the endpoints, at fraction `t`.
    Interior { t: f64 },
    /// On the carrier line but outside `a..b`.
    OutsideSpan,
    /// Not on the carrier line.
    OffLine,
}

pub fn point_segment_2d(p: &Point2d, a: &Point2d, b: &Point2d, tol: &Tol) -> PointOnSegment {
    if (*p - *a).length_squared() <= tol.dist_sq {
        return PointOnSegment::AtStart;
    }
    if (*p - *b).length_squared() <= tol.dist_sq {
        return PointOnSegment::AtEnd;
    }
    let dir = *b - *a;
    let len_sq = dir.length_squared();
    if len_sq <= tol.dist_sq {
        return PointOnSegment::OffLine;
    }
    let ap = *p - *a;
    let len = len_sq.sqrt();
    if (dir.perp_dot(&ap) / len).abs() > tol.dist {
        return PointOnSegment::OffLine;
    }
    let t = dir.dot(&ap) / len_sq;
    if t < 0.0 || t > 1.0 {
        PointOnSegment::OutsideSpan
    } else {
        PointOnSegment::Interior { t }
    }
}

// ─── Line vs. Line (2D) ─────────────────────────────────────────────────────

/// Relation between the lines `p + t*d` and `a + u*c`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineLine2d {
    /// The lines coincide within tolerance.
    Colinear,
    /// Parallel and apart.
    Parallel,
    /// Unique crossing at `p + t*d == a + u*c`.
    Crossing { t: f64, u: f64 },
}

/// `c` is expected to span the region of interest on the second line (an
/// edge's extent), since colinearity is judged at `a` and `a + c`.
pub fn line_line_2d(p: &Point2d, d: &Vec2, a: &Point2d, c: &Vec2, tol: &Tol) -> LineLine2d {
    let d_len = d.length();
    let c_len = c.length();
    if d_len <= f64::EPSILON || c_len <= f64::EPSILON {
        return LineLine2d::Parallel;
    }
    let d_unit = *d * (1.0 / d_len);
    let ap = *a - *p;
    let h0 = d_unit.perp_dot(&ap);
    let h1 = d_unit.perp_dot(&Vec2::new(ap.x + c.x, ap.y + c.y));
    if h0.abs() <= tol.dist && h1.abs() <= tol.dist {
        return LineLine2d::Colinear;
    }
    let det = d.perp_dot(c);
    if det.abs() <= 1.0e-12 * d_len * c_len {
        return LineLine2d::Parallel;
    }
    let t = ap.perp_dot(c) / det;
    let u = ap.perp_dot(d) / det;
    LineLine2d::Crossing { t, u }
}

// ─── Segment vs. Segment (2D) ───────────────────────────────────────────────

/// Relation between segments `p..p+pd` and `q..q+qd`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentSegment2d {
    Disjoint,
    /// Both on one carrier line. `q0` and `q1` are the fractions of the
    /// second segment's endpoints along the first.
    Colinear { q0: f64, q1: f64 },
    /// A single shared point at fraction `t` of the first segment and `u` of
    /// the second, both clamped into `[0, 1]`.
    Crossing { t: f64, u: f64 },
}

pub fn segment_segment_2d(
    p: &Point2d,
    pd: &Vec2,
    q: &Point2d,
    qd: &Vec2,
    tol: &Tol,
) -> SegmentSegment2d {
    let p_len_sq = pd.length_squared();
    let q_len_sq = qd.length_squared();
    if p_len_sq <= tol.dist_sq || q_len_sq <= tol.dist_sq {
        return SegmentSegment2d::Disjoint;
    }
    match line_line_2d(p, pd, q, qd, tol) {
        LineLine2d::Parallel => SegmentSegment2d::Disjoint,
        LineLine2d::Colinear => {
            let q0 = pd.dot(&(*q - *p)) / p_len_sq;
            let q_end = *q + *qd;
            let q1 = pd.dot(&(q_end - *p)) / p_len_sq;
            let slack = tol.dist / p_len_sq.sqrt();
            if q0.max(q1) < -slack || q0.min(q1) > 1.0 + slack {
                SegmentSegment2d::Disjoint
            } else {
                SegmentSegment2d::Colinear { q0, q1 }
            }
        }
        LineLine2d::Crossing { t, u } => {
            let t_slack = tol.dist / p_len_sq.sqrt();
            let u_slack = tol.dist / q_len_sq.sqrt();
            if t < -t_slack || t > 1.0 + t_slack || u < -u_slack || u > 1.0 + u_slack {
                SegmentSegment2d::Disjoint
            } else {
                SegmentSegment2d::Crossing {
                    t: t.clamp(0.0, 1.0),
                    u: u.clamp(0.0, 1.0),
                }
            }
        }
    }
}

// ─── Segment vs. Segment (3D) ───────────────────────────────────────────────

/// Relation between segments `a..b` and `c..d` in space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentSegment3d {
    Disjoint,
    /// Both on one carrier line and overlapping. `q0` and `q1` are the
    /// fractions of `c` and `d` along `a..b`.
    Colinear { q0: f64, q1: f64 },
    /// The segments pass within tolerance of each other at fraction `t` of
    /// the first and `u` of the second, both clamped into `[0, 1]`.
    Crossing { t: f64, u: f64 },
}

pub fn segment_segment_3d(a: &Point3d, b: &Point3d, c: &Point3d, d: &Point3d, tol: &Tol) -> SegmentSegment3d {
    let p = *b - *a;
    let q = *d - *c;
    let pp = p.length_squared();
    let qq = q.length_squared();
    if pp <= tol.dist_sq || qq <= tol.dist_sq {
        return SegmentSegment3d::Disjoint;
    }
    let p_len = pp.sqrt();
    let t_slack = tol.dist / p_len;

    let off_line = |x: &Point3d| (*x - *a).cross(&p).length() / p_len;
    if off_line(c) <= tol.dist && off_line(d) <= tol.dist {
        let q0 = (*c - *a).dot(&p) / pp;
        let q1 = (*d - *a).dot(&p) / pp;
        if q0.max(q1) < -t_slack || q0.min(q1) > 1.0 + t_slack {
            return SegmentSegment3d::Disjoint;
        }
        return SegmentSegment3d::Colinear { q0, q1 };
    }

    let n = p.cross(&q);
    let nn = n.length_squared();
    if nn <= 1.0e-24 * pp * qq {
        return SegmentSegment3d::Disjoint;
    }
    // Closest points a + t*p and c + u*q.
    let w = *c - *a;
    let t = w.cross(&q).dot(&n) / nn;
    let u = w.cross(&p).dot(&n) / nn;
    let u_slack = tol.dist / qq.sqrt();
    if t < -t_slack || t > 1.0 + t_slack || u < -u_slack || u > 1.0 + u_slack {
        return SegmentSegment3d::Disjoint;
    }
    let (t, u) = (t.clamp(0.0, 1.0), u.clamp(0.0, 1.0));
    if a.lerp(b, t).distance_squared_to(&c.lerp(d, u)) > tol.dist_sq {
        SegmentSegment3d::Disjoint
    } else {
        SegmentSegment3d::Crossing { t, u }
    }
}

// ─── Planes ─────────────────────────────────────────────────────────────────

/// The point common to three planes, or `None` when the solve is singular.
pub fn three_plane_point(a: &Plane, b: &Plane, c: &Plane) -> Option<Point3d> {
    let m = Matrix3::new(
        a.normal.x, a.normal.y, a.normal.z,
        b.normal.x, b.normal.y, b.normal.z,
        c.normal.x, c.normal.y, c.normal.z,
    );
    if m.determinant().abs() < SINGULAR_DETERMINANT {
        return None;
    }
    let rhs = nalgebra::Vector3::new(a.offset, b.offset, c.offset);
    let x = m.lu().solve(&rhs)?;
    Some(Point3d::new(x.x, x.y, x.z))
}

/// Parameter at which `origin + t*dir` meets the plane, or `None` when the
/// line runs parallel to it.
pub fn line_plane_parameter(origin: &Point3d, dir: &Vec3, plane: &Plane) -> Option<f64> {
    let denom = plane.normal.dot(dir);
    if denom.abs() < 1.0e-15 {
        return None;
    }
    Some(-plane.distance_to_point(origin) / denom)
}
