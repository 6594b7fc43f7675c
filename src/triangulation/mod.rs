//! Constrained Delaunay triangulation over a planar point cloud.
//!
//! The triangulation owns flat arenas of vertices and faces addressed by
//! dense integer handles; neighbor and incidence links are handles into
//! those arenas. Construction inserts the caller's points incrementally,
//! tagging each vertex with its input index. Constraint polygons force
//! their edges into the mesh (introducing Steiner points where constraints
//! cross each other) and re-run domain marking, a parity flood fill from
//! the unbounded region. Point-location queries walk face-to-face from a
//! caller-held cursor and report barycentric interpolation weights.

mod predicates;
pub mod weight;

use std::collections::VecDeque;

use thiserror::Error;

use crate::geometry::Point;
use predicates::{in_circle, orient2d, segment_intersection, segments_cross};
use weight::InterpolationWeight;

#[derive(Error, Debug)]
pub enum TriangulationError {
    #[error("the number of x and y coordinates must be the same")]
    CoordinateSizeMismatch,

    #[error("at least 3 points are required for triangulation")]
    TooFewPoints,

    #[error("at least 3 vertices are required for a constraint polygon")]
    DegenerateConstraint,
}

type VId = u32;
type FId = u32;

const NONE: u32 = u32::MAX;

/// Input index carried by shell corners and Steiner vertices, which do not
/// correspond to any caller-supplied point.
const NO_INPUT: u32 = u32::MAX;

/// The enclosing shell triangle is scaled this far beyond the input extent
/// so that it stays outside every circumcircle of the hull faces.
const SHELL_MARGIN: f64 = 16384.0;

#[derive(Debug, Clone)]
struct Vertex {
    point: Point,
    /// One face this vertex is incident to.
    face: FId,
    input: u32,
}

#[derive(Debug, Clone)]
struct Face {
    /// Corner vertices in counter-clockwise order.
    v: [VId; 3],
    /// `n[i]` shares the edge opposite `v[i]`; `NONE` on the shell border.
    n: [FId; 3],
    /// `constrained[i]` flags the edge opposite `v[i]`.
    constrained: [bool; 3],
}

/// Where a walk ended relative to the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Locate {
    Face(FId),
    /// Containing face and the index of the zero-orientation edge.
    Edge(FId, usize),
    /// Containing face and the corner index of the coincident vertex.
    Vertex(FId, usize),
    /// Outside the convex hull (or the affine hull of degenerate input).
    Outside,
}

/// Resume point for a walk, captured from the previous query.
///
/// Owned by the caller and opaque; a cursor from before a constraint was
/// applied is silently discarded.
#[derive(Debug, Clone, Copy)]
pub struct LocateCursor {
    face: FId,
    generation: u64,
}

pub struct Triangulation {
    vertices: Vec<Vertex>,
    faces: Vec<Face>,
    /// Parity classification per face; rebuilt by domain marking. Empty
    /// until the first constraint polygon is applied.
    in_domain: Vec<bool>,
    /// The caller's points, by input index.
    inputs: Vec<Point>,
    shell: [VId; 3],
    generation: u64,
    hint: FId,
}

impl Triangulation {
    /// Builds a Delaunay triangulation over the given coordinates. Each
    /// point receives the input index of its position in the arrays;
    /// duplicate points collapse onto the first occurrence.
    pub fn new(x: &[f64], y: &[f64]) -> Result<Self, TriangulationError> {
        if x.len() != y.len() {
            return Err(TriangulationError::CoordinateSizeMismatch);
        }
        if x.len() < 3 {
            return Err(TriangulationError::TooFewPoints);
        }
        let points: Vec<Point> = x
            .iter()
            .zip(y.iter())
            .map(|(&px, &py)| Point::new(px, py))
            .collect();
        Ok(Self::from_points(points))
    }

    fn from_points(points: Vec<Point>) -> Self {
        let mut lo = Point::new(f64::INFINITY, f64::INFINITY);
        let mut hi = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in &points {
            lo.x = lo.x.min(p.x);
            lo.y = lo.y.min(p.y);
            hi.x = hi.x.max(p.x);
            hi.y = hi.y.max(p.y);
        }
        let cx = (lo.x + hi.x) / 2.0;
        let cy = (lo.y + hi.y) / 2.0;
        let m = (hi.x - lo.x).max(hi.y - lo.y).max(1.0) * SHELL_MARGIN;

        let shell_pts = [
            Point::new(cx - 3.0 * m, cy - m),
            Point::new(cx + 3.0 * m, cy - m),
            Point::new(cx, cy + 2.0 * m),
        ];
        let vertices = shell_pts
            .iter()
            .map(|&point| Vertex {
                point,
                face: 0,
                input: NO_INPUT,
            })
            .collect();
        let faces = vec![Face {
            v: [0, 1, 2],
            n: [NONE, NONE, NONE],
            constrained: [false, false, false],
        }];

        let mut tri = Self {
            vertices,
            faces,
            in_domain: Vec::new(),
            inputs: Vec::new(),
            shell: [0, 1, 2],
            generation: 0,
            hint: 0,
        };
        for (i, p) in points.iter().enumerate() {
            tri.insert_point(*p, i as u32);
        }
        tri.inputs = points;
        tri
    }

    /// All input points, indexed by their input index.
    pub fn vertices(&self) -> &[Point] {
        &self.inputs
    }

    /// Vertex-index triples of every finite face currently marked
    /// in-domain. Empty before the first constraint polygon is applied.
    pub fn triangles(&self) -> Vec<[u32; 3]> {
        if self.in_domain.len() != self.faces.len() {
            return Vec::new();
        }
        self.faces
            .iter()
            .enumerate()
            .filter(|&(fi, _)| self.in_domain[fi])
            .filter_map(|(_, face)| {
                let idx = face.v.map(|v| self.vertices[v as usize].input);
                idx.iter().all(|&i| i != NO_INPUT).then_some(idx)
            })
            .collect()
    }

    /// Inserts the region outline as a closed chain of constrained edges
    /// and reclassifies every face by constraint-crossing parity. Regions
    /// compose: a face inside an odd number of applied polygons is
    /// in-domain.
    pub fn apply_constraint_polygon(
        &mut self,
        region_x: &[f64],
        region_y: &[f64],
    ) -> Result<(), TriangulationError> {
        if region_x.len() != region_y.len() {
            return Err(TriangulationError::CoordinateSizeMismatch);
        }
        if region_x.len() < 3 {
            return Err(TriangulationError::DegenerateConstraint);
        }

        let ids: Vec<VId> = region_x
            .iter()
            .zip(region_y.iter())
            .map(|(&px, &py)| self.insert_point(Point::new(px, py), NO_INPUT))
            .collect();
        for k in 0..ids.len() {
            self.insert_constraint_edge(ids[k], ids[(k + 1) % ids.len()]);
        }
        self.mark_domains();
        self.generation += 1;
        Ok(())
    }

    /// A fresh cursor for [`Triangulation::interpolate_at_with`].
    pub fn cursor(&self) -> LocateCursor {
        LocateCursor {
            face: NONE,
            generation: self.generation,
        }
    }

    /// Barycentric weights of the face containing `p`, or an invalid
    /// weight when `p` lies outside the triangulation.
    pub fn interpolate_at(&self, p: Point) -> InterpolationWeight {
        let mut cursor = self.cursor();
        self.interpolate_at_with(p, &mut cursor)
    }

    /// As [`Triangulation::interpolate_at`], resuming the walk from the
    /// caller's cursor. Near-constant cost on spatially coherent queries.
    pub fn interpolate_at_with(&self, p: Point, cursor: &mut LocateCursor) -> InterpolationWeight {
        if cursor.generation != self.generation {
            *cursor = self.cursor();
        }
        let loc = self.locate(p, cursor.face);
        let Some(f) = self.solid_face_for(loc) else {
            return InterpolationWeight::invalid();
        };
        cursor.face = f;
        self.face_weight(f, p)
    }

    /// Weights for a batch of points, threading one cursor through the
    /// walk so consecutive nearby queries start next to each other.
    pub fn interpolate_many(&self, points: &[Point]) -> Vec<InterpolationWeight> {
        let mut cursor = self.cursor();
        points
            .iter()
            .map(|&p| self.interpolate_at_with(p, &mut cursor))
            .collect()
    }

    /// As [`Triangulation::interpolate_many`] for coordinate-array input.
    pub fn interpolate_many_xy(
        &self,
        x: &[f64],
        y: &[f64],
    ) -> Result<Vec<InterpolationWeight>, TriangulationError> {
        if x.len() != y.len() {
            return Err(TriangulationError::CoordinateSizeMismatch);
        }
        let mut cursor = self.cursor();
        Ok(x.iter()
            .zip(y.iter())
            .map(|(&px, &py)| self.interpolate_at_with(Point::new(px, py), &mut cursor))
            .collect())
    }

    // ---- geometry helpers ----------------------------------------------

    fn vpoint(&self, v: VId) -> Point {
        self.vertices[v as usize].point
    }

    fn face(&self, f: FId) -> &Face {
        &self.faces[f as usize]
    }

    fn vertex_index_in_face(&self, f: FId, v: VId) -> usize {
        let face = self.face(f);
        face.v
            .iter()
            .position(|&w| w == v)
            .expect("vertex is incident to the face")
    }

    fn neighbor_index(&self, f: FId, of: FId) -> usize {
        let face = self.face(f);
        face.n
            .iter()
            .position(|&g| g == of)
            .expect("faces are neighbors")
    }

    fn set_neighbor(&mut self, f: FId, old: FId, new: FId) {
        if f == NONE {
            return;
        }
        let i = self.neighbor_index(f, old);
        self.faces[f as usize].n[i] = new;
    }

    fn is_solid(&self, f: FId) -> bool {
        self.face(f)
            .v
            .iter()
            .all(|&v| self.vertices[v as usize].input != NO_INPUT)
    }

    fn push_vertex(&mut self, point: Point, input: u32) -> VId {
        self.vertices.push(Vertex {
            point,
            face: NONE,
            input,
        });
        (self.vertices.len() - 1) as VId
    }

    fn push_face_slot(&mut self) -> FId {
        self.faces.push(Face {
            v: [0; 3],
            n: [NONE; 3],
            constrained: [false; 3],
        });
        (self.faces.len() - 1) as FId
    }

    // ---- point location ------------------------------------------------

    fn locate(&self, p: Point, start: FId) -> Locate {
        let mut f = if (start as usize) < self.faces.len() {
            start
        } else {
            (self.faces.len() - 1) as FId
        };
        let mut prev = NONE;
        let limit = 4 * self.faces.len() + 16;

        for _ in 0..limit {
            let face = self.face(f);
            let pts = [
                self.vpoint(face.v[0]),
                self.vpoint(face.v[1]),
                self.vpoint(face.v[2]),
            ];
            let mut o = [0.0f64; 3];
            for k in 0..3 {
                o[k] = orient2d(pts[(k + 1) % 3], pts[(k + 2) % 3], p);
            }

            let mut cross = usize::MAX;
            for k in 0..3 {
                if o[k] < 0.0 {
                    if cross == usize::MAX {
                        cross = k;
                    }
                    if face.n[k] != prev {
                        cross = k;
                        break;
                    }
                }
            }
            if cross == usize::MAX {
                let zeros: Vec<usize> = (0..3).filter(|&k| o[k] == 0.0).collect();
                return match zeros.len() {
                    0 => Locate::Face(f),
                    1 => Locate::Edge(f, zeros[0]),
                    _ => Locate::Vertex(f, 3 - zeros[0] - zeros[1]),
                };
            }
            let next = face.n[cross];
            if next == NONE {
                return Locate::Outside;
            }
            prev = f;
            f = next;
        }
        // the walk cycled on a degenerate configuration
        self.locate_scan(p)
    }

    fn locate_scan(&self, p: Point) -> Locate {
        for f in 0..self.faces.len() as FId {
            let face = self.face(f);
            let pts = [
                self.vpoint(face.v[0]),
                self.vpoint(face.v[1]),
                self.vpoint(face.v[2]),
            ];
            let mut o = [0.0f64; 3];
            for k in 0..3 {
                o[k] = orient2d(pts[(k + 1) % 3], pts[(k + 2) % 3], p);
            }
            if o.iter().all(|&v| v >= 0.0) {
                let zeros: Vec<usize> = (0..3).filter(|&k| o[k] == 0.0).collect();
                return match zeros.len() {
                    0 => Locate::Face(f),
                    1 => Locate::Edge(f, zeros[0]),
                    _ => Locate::Vertex(f, 3 - zeros[0] - zeros[1]),
                };
            }
        }
        Locate::Outside
    }

    fn solid_face_for(&self, loc: Locate) -> Option<FId> {
        match loc {
            Locate::Face(f) => self.is_solid(f).then_some(f),
            Locate::Edge(f, i) => {
                if self.is_solid(f) {
                    Some(f)
                } else {
                    let g = self.face(f).n[i];
                    (g != NONE && self.is_solid(g)).then_some(g)
                }
            }
            Locate::Vertex(f, k) => {
                let v = self.face(f).v[k];
                if self.vertices[v as usize].input == NO_INPUT {
                    return None;
                }
                if self.is_solid(f) {
                    return Some(f);
                }
                let start = f;
                let mut cur = f;
                loop {
                    let k = self.vertex_index_in_face(cur, v);
                    cur = self.face(cur).n[(k + 1) % 3];
                    if cur == NONE || cur == start {
                        return None;
                    }
                    if self.is_solid(cur) {
                        return Some(cur);
                    }
                }
            }
            Locate::Outside => None,
        }
    }

    fn face_weight(&self, f: FId, p: Point) -> InterpolationWeight {
        let [v0, v1, v2] = self.face(f).v;
        let p0 = self.vpoint(v0);
        let p1 = self.vpoint(v1);
        let p2 = self.vpoint(v2);

        let ax = p2.x - p0.x;
        let ay = p2.y - p0.y;
        let bx = p1.x - p0.x;
        let by = p1.y - p0.y;
        let cx = p.x - p0.x;
        let cy = p.y - p0.y;

        let d00 = ax * ax + ay * ay;
        let d01 = ax * bx + ay * by;
        let d02 = ax * cx + ay * cy;
        let d11 = bx * bx + by * by;
        let d12 = bx * cx + by * cy;

        let inv = 1.0 / (d00 * d11 - d01 * d01);
        let u = (d11 * d02 - d01 * d12) * inv;
        let v = (d00 * d12 - d01 * d02) * inv;
        let w = 1.0 - u - v;
        if !(u.is_finite() && v.is_finite() && w.is_finite()) {
            // collinear face
            return InterpolationWeight::invalid();
        }
        InterpolationWeight::new(
            [
                self.vertices[v0 as usize].input,
                self.vertices[v1 as usize].input,
                self.vertices[v2 as usize].input,
            ],
            [w, v, u],
        )
    }

    // ---- incremental insertion -----------------------------------------

    fn insert_point(&mut self, p: Point, input: u32) -> VId {
        let v = match self.locate(p, self.hint) {
            Locate::Vertex(f, k) => self.face(f).v[k],
            Locate::Face(f) => self.split_face(f, p, input),
            Locate::Edge(f, i) => self.split_edge(f, i, p, input),
            Locate::Outside => unreachable!("insertion point escaped the shell triangle"),
        };
        self.hint = self.vertices[v as usize].face;
        v
    }

    fn split_face(&mut self, f: FId, p: Point, input: u32) -> VId {
        let old = self.face(f).clone();
        let [a, b, c] = old.v;
        let v = self.push_vertex(p, input);
        let f1 = self.push_face_slot();
        let f2 = self.push_face_slot();

        self.faces[f as usize] = Face {
            v: [a, b, v],
            n: [f1, f2, old.n[2]],
            constrained: [false, false, old.constrained[2]],
        };
        self.faces[f1 as usize] = Face {
            v: [b, c, v],
            n: [f2, f, old.n[0]],
            constrained: [false, false, old.constrained[0]],
        };
        self.faces[f2 as usize] = Face {
            v: [c, a, v],
            n: [f, f1, old.n[1]],
            constrained: [false, false, old.constrained[1]],
        };
        self.set_neighbor(old.n[0], f, f1);
        self.set_neighbor(old.n[1], f, f2);

        self.vertices[v as usize].face = f;
        self.vertices[a as usize].face = f;
        self.vertices[b as usize].face = f;
        self.vertices[c as usize].face = f1;

        self.legalize(f, 2);
        self.legalize(f1, 2);
        self.legalize(f2, 2);
        v
    }

    fn split_edge(&mut self, f: FId, i: usize, p: Point, input: u32) -> VId {
        let g = self.face(f).n[i];
        debug_assert!(g != NONE, "split point on a shell border edge");
        let j = self.neighbor_index(g, f);

        let oldf = self.face(f).clone();
        let oldg = self.face(g).clone();
        let a = oldf.v[i];
        let b = oldf.v[(i + 1) % 3];
        let c = oldf.v[(i + 2) % 3];
        let d = oldg.v[j];
        // a splitting point divides a constrained edge into two
        // constrained halves
        let s = oldf.constrained[i];

        let fab = oldf.n[(i + 2) % 3];
        let cab = oldf.constrained[(i + 2) % 3];
        let fca = oldf.n[(i + 1) % 3];
        let cca = oldf.constrained[(i + 1) % 3];
        let gbd = oldg.n[(j + 1) % 3];
        let cbd = oldg.constrained[(j + 1) % 3];
        let gdc = oldg.n[(j + 2) % 3];
        let cdc = oldg.constrained[(j + 2) % 3];

        let v = self.push_vertex(p, input);
        let f2 = self.push_face_slot();
        let g2 = self.push_face_slot();

        self.faces[f as usize] = Face {
            v: [a, b, v],
            n: [g2, f2, fab],
            constrained: [s, false, cab],
        };
        self.faces[f2 as usize] = Face {
            v: [a, v, c],
            n: [g, fca, f],
            constrained: [s, cca, false],
        };
        self.faces[g as usize] = Face {
            v: [d, c, v],
            n: [f2, g2, gdc],
            constrained: [s, false, cdc],
        };
        self.faces[g2 as usize] = Face {
            v: [d, v, b],
            n: [f, gbd, g],
            constrained: [s, cbd, false],
        };
        self.set_neighbor(fca, f, f2);
        self.set_neighbor(gbd, g, g2);

        self.vertices[v as usize].face = f;
        self.vertices[a as usize].face = f;
        self.vertices[b as usize].face = f;
        self.vertices[c as usize].face = f2;
        self.vertices[d as usize].face = g;

        self.legalize(f, 2);
        self.legalize(f2, 1);
        self.legalize(g, 2);
        self.legalize(g2, 1);
        v
    }

    /// Restores the local Delaunay property around edge `i` of `f`,
    /// flipping outward as long as the in-circle test is violated.
    /// Constrained edges are never flipped.
    fn legalize(&mut self, f: FId, i: usize) {
        let mut stack = vec![(f, i)];
        while let Some((f, i)) = stack.pop() {
            if self.face(f).constrained[i] {
                continue;
            }
            let g = self.face(f).n[i];
            if g == NONE {
                continue;
            }
            let face = self.face(f);
            let p = self.vpoint(face.v[i]);
            let b = self.vpoint(face.v[(i + 1) % 3]);
            let c = self.vpoint(face.v[(i + 2) % 3]);
            let j = self.neighbor_index(g, f);
            let d = self.vpoint(self.face(g).v[j]);
            if in_circle(p, b, c, d) > 0.0 {
                self.flip(f, i);
                // both replacement faces carry the apex at corner 0
                stack.push((f, 0));
                stack.push((g, 0));
            }
        }
    }

    /// Replaces the edge opposite `f.v[i]` with the cross diagonal of the
    /// surrounding quad. The quad must be strictly convex.
    fn flip(&mut self, f: FId, i: usize) {
        let g = self.face(f).n[i];
        let j = self.neighbor_index(g, f);

        let oldf = self.face(f).clone();
        let oldg = self.face(g).clone();
        let p = oldf.v[i];
        let b = oldf.v[(i + 1) % 3];
        let c = oldf.v[(i + 2) % 3];
        let d = oldg.v[j];

        let fcp = oldf.n[(i + 1) % 3];
        let ccp = oldf.constrained[(i + 1) % 3];
        let fpb = oldf.n[(i + 2) % 3];
        let cpb = oldf.constrained[(i + 2) % 3];
        let gbd = oldg.n[(j + 1) % 3];
        let cbd = oldg.constrained[(j + 1) % 3];
        let gdc = oldg.n[(j + 2) % 3];
        let cdc = oldg.constrained[(j + 2) % 3];

        self.faces[f as usize] = Face {
            v: [p, b, d],
            n: [gbd, g, fpb],
            constrained: [cbd, false, cpb],
        };
        self.faces[g as usize] = Face {
            v: [p, d, c],
            n: [gdc, fcp, f],
            constrained: [cdc, ccp, false],
        };
        self.set_neighbor(gbd, g, f);
        self.set_neighbor(fcp, f, g);

        self.vertices[p as usize].face = f;
        self.vertices[b as usize].face = f;
        self.vertices[d as usize].face = f;
        self.vertices[c as usize].face = g;
    }

    // ---- constraint enforcement ----------------------------------------

    fn find_edge(&self, a: VId, b: VId) -> Option<(FId, usize)> {
        let start = self.vertices[a as usize].face;
        let mut f = start;
        loop {
            let k = self.vertex_index_in_face(f, a);
            let face = self.face(f);
            if face.v[(k + 1) % 3] == b {
                return Some((f, (k + 2) % 3));
            }
            if face.v[(k + 2) % 3] == b {
                return Some((f, (k + 1) % 3));
            }
            f = face.n[(k + 1) % 3];
            if f == start || f == NONE {
                return None;
            }
        }
    }

    fn mark_constrained(&mut self, f: FId, i: usize) {
        self.faces[f as usize].constrained[i] = true;
        let g = self.faces[f as usize].n[i];
        if g != NONE {
            let j = self.neighbor_index(g, f);
            self.faces[g as usize].constrained[j] = true;
        }
    }

    /// Forces the segment between two mesh vertices to appear as a chain
    /// of constrained edges. Crossing a pre-existing constrained edge
    /// introduces a Steiner vertex at the intersection, splitting both
    /// constraints.
    fn insert_constraint_edge(&mut self, va: VId, vb: VId) {
        let mut va = va;
        let mut guard = 0usize;
        while va != vb {
            guard += 1;
            if guard > 4 * self.vertices.len() + 64 {
                debug_assert!(false, "constraint enforcement failed to converge");
                return;
            }
            if let Some((f, i)) = self.find_edge(va, vb) {
                self.mark_constrained(f, i);
                return;
            }
            match self.march_segment(va, vb) {
                March::ReachedVertex(w, pipe) => {
                    self.clear_crossings(va, w, pipe);
                    if let Some((f, i)) = self.find_edge(va, w) {
                        self.mark_constrained(f, i);
                    }
                    va = w;
                }
                March::HitConstrained(f, i) => {
                    let face = self.face(f);
                    let x = face.v[(i + 1) % 3];
                    let y = face.v[(i + 2) % 3];
                    let q = segment_intersection(
                        self.vpoint(va),
                        self.vpoint(vb),
                        self.vpoint(x),
                        self.vpoint(y),
                    );
                    self.split_edge(f, i, q, NO_INPUT);
                }
            }
        }
    }

    /// Walks the mesh from `va` along the straight segment toward `vb`,
    /// collecting every crossed edge. Stops early at the first vertex
    /// lying exactly on the segment, or at the first constrained crossing.
    fn march_segment(&self, va: VId, vb: VId) -> March {
        let pa = self.vpoint(va);
        let pb = self.vpoint(vb);

        // find the wedge around va the segment leaves through
        let start = self.vertices[va as usize].face;
        let mut fa = start;
        let mut found = None;
        for _ in 0..self.faces.len() + 1 {
            let k = self.vertex_index_in_face(fa, va);
            let face = self.face(fa);
            let x = face.v[(k + 1) % 3];
            let y = face.v[(k + 2) % 3];
            let ox = orient2d(pa, pb, self.vpoint(x));
            let oy = orient2d(pa, pb, self.vpoint(y));
            if ox == 0.0 && forward(pa, pb, self.vpoint(x)) {
                return March::ReachedVertex(x, VecDeque::new());
            }
            if oy == 0.0 && forward(pa, pb, self.vpoint(y)) {
                return March::ReachedVertex(y, VecDeque::new());
            }
            // the segment leaves through this wedge when x falls right of
            // it and y left
            if ox < 0.0 && oy > 0.0 {
                if face.constrained[k] {
                    return March::HitConstrained(fa, k);
                }
                found = Some((fa, k, (x, y)));
                break;
            }
            fa = face.n[(k + 1) % 3];
            if fa == NONE || fa == start {
                break;
            }
        }
        let (wedge, k, first_edge) =
            found.expect("segment leaves its start vertex through some wedge");
        let mut prev = wedge;
        let mut cur = self.face(prev).n[k];

        let mut pipe = VecDeque::new();
        pipe.push_back(first_edge);
        loop {
            let jj = self.neighbor_index(cur, prev);
            let face = self.face(cur);
            let w = face.v[jj];
            if w == vb {
                return March::ReachedVertex(vb, pipe);
            }
            let ow = orient2d(pa, pb, self.vpoint(w));
            if ow == 0.0 {
                return March::ReachedVertex(w, pipe);
            }
            // exit through the edge opposite the entry endpoint on the
            // same side as the apex
            let o1 = orient2d(pa, pb, self.vpoint(face.v[(jj + 1) % 3]));
            let exit = if (ow > 0.0) == (o1 > 0.0) {
                (jj + 1) % 3
            } else {
                (jj + 2) % 3
            };
            if face.constrained[exit] {
                return March::HitConstrained(cur, exit);
            }
            pipe.push_back((face.v[(exit + 1) % 3], face.v[(exit + 2) % 3]));
            prev = cur;
            cur = face.n[exit];
            debug_assert!(cur != NONE, "segment march left the shell");
        }
    }

    /// Flips away every edge crossing the open segment `(va, vt)`. Edges
    /// whose surrounding quad is not yet convex are retried after their
    /// neighbors flip.
    fn clear_crossings(&mut self, va: VId, vt: VId, mut pipe: VecDeque<(VId, VId)>) {
        let pa = self.vpoint(va);
        let pt = self.vpoint(vt);
        let mut stall = 0usize;
        while let Some((x, y)) = pipe.pop_front() {
            let Some((f, i)) = self.find_edge(x, y) else {
                continue;
            };
            let g = self.face(f).n[i];
            if g == NONE {
                continue;
            }
            let p1 = self.face(f).v[i];
            let j = self.neighbor_index(g, f);
            let p2 = self.face(g).v[j];
            let flippable = orient2d(self.vpoint(p1), self.vpoint(p2), self.vpoint(x))
                * orient2d(self.vpoint(p1), self.vpoint(p2), self.vpoint(y))
                < 0.0;
            if !flippable {
                pipe.push_back((x, y));
                stall += 1;
                if stall > pipe.len() + 1 {
                    debug_assert!(false, "crossing-edge removal stalled");
                    return;
                }
                continue;
            }
            self.flip(f, i);
            stall = 0;
            if segments_cross(pa, pt, self.vpoint(p1), self.vpoint(p2)) {
                pipe.push_back((p1, p2));
            }
        }
    }

    // ---- domain marking ------------------------------------------------

    /// Reclassifies every face by flood fill from the unbounded region:
    /// crossing a constrained edge raises the nesting level, and faces at
    /// odd levels are in-domain.
    fn mark_domains(&mut self) {
        let nf = self.faces.len();
        let mut nesting = vec![-1i32; nf];
        let mut border: VecDeque<(FId, usize)> = VecDeque::new();

        let seed = self.vertices[self.shell[0] as usize].face;
        self.spread(seed, 0, &mut nesting, &mut border);
        while let Some((f, i)) = border.pop_front() {
            let g = self.face(f).n[i];
            if g != NONE && nesting[g as usize] == -1 {
                let level = nesting[f as usize] + 1;
                self.spread(g, level, &mut nesting, &mut border);
            }
        }
        self.in_domain = nesting.iter().map(|&lv| lv % 2 == 1).collect();
    }

    fn spread(
        &self,
        start: FId,
        level: i32,
        nesting: &mut [i32],
        border: &mut VecDeque<(FId, usize)>,
    ) {
        let mut queue = vec![start];
        nesting[start as usize] = level;
        while let Some(f) = queue.pop() {
            let face = self.face(f);
            for i in 0..3 {
                let g = face.n[i];
                if g == NONE {
                    continue;
                }
                if face.constrained[i] {
                    border.push_back((f, i));
                } else if nesting[g as usize] == -1 {
                    nesting[g as usize] = level;
                    queue.push(g);
                }
            }
        }
    }
}

enum March {
    /// The named vertex lies on the segment; the pipe holds every edge
    /// crossed before reaching it.
    ReachedVertex(VId, VecDeque<(VId, VId)>),
    HitConstrained(FId, usize),
}

fn forward(a: Point, b: Point, p: Point) -> bool {
    (p.x - a.x) * (b.x - a.x) + (p.y - a.y) * (b.y - a.y) > 0.0
}
