// Monotone piecewise linear level-to-volume functions

use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::DistributionError;

/// A level together with the volume stored up to that level.
///
/// Used both for the break points of a [`LevelVolumeMap`] and for the
/// current column of a fluid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub level: f64,
    pub volume: f64,
}

impl Content {
    pub const ORIGIN: Content = Content {
        level: 0.0,
        volume: 0.0,
    };

    pub fn new(level: f64, volume: f64) -> Self {
        Content { level, volume }
    }
}

impl From<(f64, f64)> for Content {
    fn from((level, volume): (f64, f64)) -> Self {
        Content { level, volume }
    }
}

/// A query that can be located on a [`LevelVolumeMap`].
///
/// Implementors must be monotone over the map: once `precedes` returns `true`
/// for a point, it returns `true` for every later point as well.
pub trait SegmentQuery {
    /// `true` when the query lies strictly before `point`.
    fn precedes(&self, point: &Content) -> bool;
}

/// Locates a level on the map.
#[derive(Clone, Copy, Debug)]
pub struct ByLevel(pub f64);

impl SegmentQuery for ByLevel {
    fn precedes(&self, point: &Content) -> bool {
        self.0 < point.level
    }
}

/// Locates a volume on the map.
#[derive(Clone, Copy, Debug)]
pub struct ByVolume(pub f64);

impl SegmentQuery for ByVolume {
    fn precedes(&self, point: &Content) -> bool {
        self.0 < point.volume
    }
}

/// Result of a segment search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentLocation {
    /// The query lies before the first point.
    Below,
    /// The query lies within segment `i`, i.e. between points `i` and `i + 1`.
    Within(usize),
    /// The query lies at or after the last point.
    Above,
}

impl SegmentLocation {
    pub fn index(self) -> Option<usize> {
        match self {
            SegmentLocation::Within(index) => Some(index),
            _ => None,
        }
    }
}

/// Monotonic increasing, piecewise linear, invertible mapping between level
/// and volume.
///
/// Both coordinates are non-decreasing along the points, so the map can be
/// evaluated forward ([`apply`](Self::apply)) and backward
/// ([`invert`](Self::invert)) with the same binary search. Outside its range
/// the map is clamped to its first and last points; the last point is the
/// capacity of the trap.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelVolumeMap {
    points: Vec<Content>,
}

impl LevelVolumeMap {
    /// Build a map from break points, sorting them by level and then volume.
    ///
    /// # Arguments
    /// * points: at least two break points, finite, with volumes non-decreasing
    ///   once sorted by level
    pub fn new<P: Into<Content>>(
        points: impl IntoIterator<Item = P>,
    ) -> Result<Self, DistributionError> {
        let mut points: Vec<Content> = points.into_iter().map(Into::into).collect();
        if points.len() < 2 {
            return Err(DistributionError::InvalidMap {
                reason: format!("at least two points are required, got {}", points.len()),
            });
        }
        if let Some(point) = points
            .iter()
            .find(|p| !p.level.is_finite() || !p.volume.is_finite())
        {
            return Err(DistributionError::InvalidMap {
                reason: format!("non-finite point ({}, {})", point.level, point.volume),
            });
        }
        points.sort_by(|a, b| {
            a.level
                .total_cmp(&b.level)
                .then(a.volume.total_cmp(&b.volume))
        });
        if let Some(pair) = points.windows(2).find(|pair| pair[1].volume < pair[0].volume) {
            return Err(DistributionError::InvalidMap {
                reason: format!(
                    "volume decreases from {} to {} between levels {} and {}",
                    pair[0].volume, pair[1].volume, pair[0].level, pair[1].level
                ),
            });
        }
        Ok(LevelVolumeMap { points })
    }

    /// Build a map from parallel level and volume arrays.
    pub fn from_arrays(
        levels: ArrayView1<'_, f64>,
        volumes: ArrayView1<'_, f64>,
    ) -> Result<Self, DistributionError> {
        if levels.len() != volumes.len() {
            return Err(DistributionError::InvalidMap {
                reason: format!(
                    "{} levels given for {} volumes",
                    levels.len(),
                    volumes.len()
                ),
            });
        }
        Self::new(levels.iter().zip(volumes.iter()).map(|(&l, &v)| Content::new(l, v)))
    }

    pub fn points(&self) -> &[Content] {
        &self.points
    }

    pub fn first(&self) -> Content {
        self.points[0]
    }

    pub fn last(&self) -> Content {
        self.points[self.points.len() - 1]
    }

    /// The structural capacity: the map evaluated at the largest level.
    pub fn capacity(&self) -> Content {
        self.last()
    }

    /// Number of linear segments.
    pub fn size(&self) -> usize {
        self.points.len() - 1
    }

    /// The end points of segment `index`.
    ///
    /// Panics when `index >= self.size()`.
    pub fn segment(&self, index: usize) -> (Content, Content) {
        assert!(
            index < self.size(),
            "segment index {} out of range for a map with {} segments",
            index,
            self.size()
        );
        (self.points[index], self.points[index + 1])
    }

    pub fn get_segment(&self, index: usize) -> Option<(Content, Content)> {
        if index < self.size() {
            Some((self.points[index], self.points[index + 1]))
        } else {
            None
        }
    }

    /// Find the segment straddling `query`.
    ///
    /// The right end point of the returned segment is the first point that
    /// `query` precedes.
    pub fn find_segment_index<Q: SegmentQuery + ?Sized>(&self, query: &Q) -> SegmentLocation {
        let first_after = self.points.partition_point(|point| !query.precedes(point));
        if first_after == 0 {
            SegmentLocation::Below
        } else if first_after == self.points.len() {
            SegmentLocation::Above
        } else {
            SegmentLocation::Within(first_after - 1)
        }
    }

    /// Volume stored up to `level`.
    pub fn apply(&self, level: f64) -> f64 {
        match self.find_segment_index(&ByLevel(level)) {
            SegmentLocation::Below => self.first().volume,
            SegmentLocation::Above => self.last().volume,
            SegmentLocation::Within(index) => {
                let (lower, upper) = self.segment(index);
                interpolate(level, lower.level, upper.level, lower.volume, upper.volume)
            }
        }
    }

    /// Level up to which `volume` is stored.
    pub fn invert(&self, volume: f64) -> f64 {
        match self.find_segment_index(&ByVolume(volume)) {
            SegmentLocation::Below => self.first().level,
            SegmentLocation::Above => self.last().level,
            SegmentLocation::Within(index) => {
                let (lower, upper) = self.segment(index);
                interpolate(volume, lower.volume, upper.volume, lower.level, upper.level)
            }
        }
    }

    /// The content at `level`.
    pub fn content_at_level(&self, level: f64) -> Content {
        Content::new(level, self.apply(level))
    }

    /// The content holding `volume`.
    pub fn content_at_volume(&self, volume: f64) -> Content {
        Content::new(self.invert(volume), volume)
    }

    pub fn apply_many(&self, levels: ArrayView1<'_, f64>) -> Array1<f64> {
        levels.mapv(|level| self.apply(level))
    }

    pub fn invert_many(&self, volumes: ArrayView1<'_, f64>) -> Array1<f64> {
        volumes.mapv(|volume| self.invert(volume))
    }

    pub fn shift_level_by(&self, shift: f64) -> Self {
        self.shift_by(Content::new(shift, 0.0))
    }

    pub fn scale_level_by(&self, factor: f64) -> Result<Self, DistributionError> {
        self.scale_by(Content::new(factor, 1.0))
    }

    /// Translate every point by `shift`.
    pub fn shift_by(&self, shift: Content) -> Self {
        LevelVolumeMap {
            points: self
                .points
                .iter()
                .map(|p| Content::new(p.level + shift.level, p.volume + shift.volume))
                .collect(),
        }
    }

    /// Scale every point by `factor`; both factors must be strictly positive
    /// to keep the map monotone.
    pub fn scale_by(&self, factor: Content) -> Result<Self, DistributionError> {
        if !(factor.level > 0.0 && factor.volume > 0.0) {
            return Err(DistributionError::InvalidScale {
                level: factor.level,
                volume: factor.volume,
            });
        }
        Ok(LevelVolumeMap {
            points: self
                .points
                .iter()
                .map(|p| Content::new(p.level * factor.level, p.volume * factor.volume))
                .collect(),
        })
    }
}

impl AddAssign<Content> for LevelVolumeMap {
    fn add_assign(&mut self, shift: Content) {
        for point in self.points.iter_mut() {
            point.level += shift.level;
            point.volume += shift.volume;
        }
    }
}

impl SubAssign<Content> for LevelVolumeMap {
    fn sub_assign(&mut self, shift: Content) {
        *self += Content::new(-shift.level, -shift.volume);
    }
}

/// Panics on a non-positive factor; use [`LevelVolumeMap::scale_by`] for the
/// checked variant.
impl MulAssign<Content> for LevelVolumeMap {
    fn mul_assign(&mut self, factor: Content) {
        assert!(
            factor.level > 0.0 && factor.volume > 0.0,
            "scale factors must be strictly positive"
        );
        for point in self.points.iter_mut() {
            point.level *= factor.level;
            point.volume *= factor.volume;
        }
    }
}

impl DivAssign<Content> for LevelVolumeMap {
    fn div_assign(&mut self, factor: Content) {
        assert!(
            factor.level > 0.0 && factor.volume > 0.0,
            "scale factors must be strictly positive"
        );
        *self *= Content::new(1.0 / factor.level, 1.0 / factor.volume);
    }
}

/// Linear interpolation of `x` between `(x0, y0)` and `(x1, y1)`.
pub(crate) fn interpolate(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    if x1 == x0 {
        return y0;
    }
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}
