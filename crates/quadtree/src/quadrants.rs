use glam::Vec2;

/// Axis aligned rectangle on the xz plane. Vector component `y` holds the z
/// coordinate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct Rect {
    min: Vec2,
    max: Vec2,
}

impl Rect {
    pub(super) fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Returns true if the point lies inside, on the edge of or at most
    /// `margin` away from the rectangle.
    pub(super) fn contains_point(&self, point: Vec2, margin: f32) -> bool {
        point.cmpge(self.min - margin).all() && point.cmple(self.max + margin).all()
    }

    /// Returns true if rectangle `min`, `max` lies fully inside of (or on the
    /// edge of) the rectangle.
    pub(super) fn contains(&self, min: Vec2, max: Vec2) -> bool {
        min.cmpge(self.min).all() && max.cmple(self.max).all()
    }

    /// Returns true if rectangle `min`, `max` intersects or touches the
    /// rectangle.
    pub(super) fn intersects(&self, min: Vec2, max: Vec2) -> bool {
        min.cmple(self.max).all() && max.cmpge(self.min).all()
    }

    /// Returns the quarter of the rectangle covered by `quadrant`.
    pub(super) fn child(&self, quadrant: Quadrant) -> Self {
        let mid = self.min.lerp(self.max, 0.5);
        let pick = |upper: bool, low: f32, mid: f32, high: f32| {
            if upper {
                (mid, high)
            } else {
                (low, mid)
            }
        };

        let (min_x, max_x) = pick(quadrant.upper_x, self.min.x, mid.x, self.max.x);
        let (min_z, max_z) = pick(quadrant.upper_z, self.min.y, mid.y, self.max.y);
        Self::new(Vec2::new(min_x, min_z), Vec2::new(max_x, max_z))
    }
}

/// Quarter of a rectangle, identified by the halves of the x and z ranges it
/// spans.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct Quadrant {
    upper_x: bool,
    upper_z: bool,
}

impl Quadrant {
    pub(super) const ALL: [Self; 4] = [
        Self::new(false, false),
        Self::new(true, false),
        Self::new(false, true),
        Self::new(true, true),
    ];

    const fn new(upper_x: bool, upper_z: bool) -> Self {
        Self { upper_x, upper_z }
    }

    fn slot(self) -> usize {
        usize::from(self.upper_x) | (usize::from(self.upper_z) << 1)
    }
}

/// Lazily populated children of a tree node, one slot per [`Quadrant`].
pub(super) struct Quadrants<T>([Option<T>; 4]);

impl<T> Quadrants<T> {
    pub(super) fn empty() -> Self {
        Self([None, None, None, None])
    }

    pub(super) fn get(&self, quadrant: Quadrant) -> Option<&T> {
        self.0[quadrant.slot()].as_ref()
    }

    /// Stores `value` in the slot of `quadrant` and returns the previous one.
    pub(super) fn replace(&mut self, quadrant: Quadrant, value: T) -> Option<T> {
        self.0[quadrant.slot()].replace(value)
    }

    /// Iterates over populated slots.
    pub(super) fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.0.iter().flatten()
    }
}
