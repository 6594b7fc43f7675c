use crate::geometry::Point;

/// Twice the signed area of the triangle `(a, b, c)`.
///
/// Positive when the triangle winds counter-clockwise, zero when the three
/// points are collinear.
pub(crate) fn orient2d(a: Point, b: Point, c: Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Sign of the in-circle determinant for the CCW triangle `(a, b, c)`.
///
/// Positive when `p` lies strictly inside the circumcircle, zero when the
/// four points are cocircular.
pub(crate) fn in_circle(a: Point, b: Point, c: Point, p: Point) -> f64 {
    let adx = a.x - p.x;
    let ady = a.y - p.y;
    let bdx = b.x - p.x;
    let bdy = b.y - p.y;
    let cdx = c.x - p.x;
    let cdy = c.y - p.y;

    let ad2 = adx * adx + ady * ady;
    let bd2 = bdx * bdx + bdy * bdy;
    let cd2 = cdx * cdx + cdy * cdy;

    adx * (bdy * cd2 - cdy * bd2) - ady * (bdx * cd2 - cdx * bd2)
        + ad2 * (bdx * cdy - cdx * bdy)
}

/// True when the open segments `(a, b)` and `(c, d)` cross at a single
/// interior point of both.
pub(crate) fn segments_cross(a: Point, b: Point, c: Point, d: Point) -> bool {
    let o1 = orient2d(a, b, c);
    let o2 = orient2d(a, b, d);
    let o3 = orient2d(c, d, a);
    let o4 = orient2d(c, d, b);
    (o1 > 0.0) != (o2 > 0.0)
        && o1 != 0.0
        && o2 != 0.0
        && (o3 > 0.0) != (o4 > 0.0)
        && o3 != 0.0
        && o4 != 0.0
}

/// Intersection point of the lines through `(a, b)` and `(c, d)`.
///
/// Callers must establish that the segments properly cross; the result for
/// parallel lines is unspecified (non-finite coordinates).
pub(crate) fn segment_intersection(a: Point, b: Point, c: Point, d: Point) -> Point {
    let r = Point::new(b.x - a.x, b.y - a.y);
    let s = Point::new(d.x - c.x, d.y - c.y);
    let denom = r.x * s.y - r.y * s.x;
    let t = ((c.x - a.x) * s.y - (c.y - a.y) * s.x) / denom;
    Point::new(a.x + t * r.x, a.y + t * r.y)
}
