// Choosing between leaking and another escape mechanism for a single fluid

use crate::escape::{Escape, Leak, Spill, Waste};

/// Leaking competing with another escape mechanism.
///
/// The mechanism with the lower maximum level is authoritative for the whole
/// fluid volume; the other one receives nothing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LeakOr<T> {
    leak: Leak,
    other: T,
    leaking: bool,
}

pub type LeakOrSpill = LeakOr<Spill>;
pub type LeakOrWaste = LeakOr<Waste>;

impl<T: Escape> LeakOr<T> {
    pub fn new(leak: Leak, other: T) -> Self {
        let leaking = leak.max_level() < other.max_level();
        LeakOr {
            leak,
            other,
            leaking,
        }
    }

    /// `true` when the seal gives way before the other mechanism kicks in.
    pub fn leaking(&self) -> bool {
        self.leaking
    }

    pub fn leak(&self) -> &Leak {
        &self.leak
    }

    pub fn other(&self) -> &T {
        &self.other
    }

    pub fn max_level(&self) -> f64 {
        if self.leaking {
            self.leak.max_level()
        } else {
            self.other.max_level()
        }
    }

    /// Split the escaping part of `fluid_volume` into `(leaked, other)`.
    pub fn distribute(&self, fluid_volume: f64) -> (f64, f64) {
        if self.leaking {
            (self.leak.distribute(fluid_volume), 0.0)
        } else {
            (0.0, self.other.distribute(fluid_volume))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level_volume::LevelVolumeMap;
    use approx::assert_abs_diff_eq;

    fn trap() -> LevelVolumeMap {
        LevelVolumeMap::new(vec![(0.0, 0.0), (2.0, 50.0), (4.0, 150.0)]).unwrap()
    }

    #[test]
    fn weak_seal_leaks_instead_of_spilling() {
        let map = trap();
        let leak = Leak::new(800.0, 1073.0, 0.2, 2.0, 10000.0, &map);
        let selector = LeakOrSpill::new(leak, Spill::new(&map));
        assert!(selector.leaking());
        assert_eq!(selector.max_level(), leak.max_level());
        let (leaked, spilled) = selector.distribute(1000.0);
        assert_abs_diff_eq!(leaked, leak.distribute(1000.0));
        assert_eq!(spilled, 0.0);
    }

    #[test]
    fn strong_seal_spills() {
        let map = trap();
        let leak = Leak::new(800.0, 1073.0, 0.0, 0.0, 1.0e6, &map);
        let spill = Spill::new(&map);
        let selector = LeakOrSpill::new(leak, spill);
        assert!(!selector.leaking());
        let (leaked, spilled) = selector.distribute(200.0);
        assert_eq!(leaked, 0.0);
        assert_abs_diff_eq!(spilled, spill.distribute(200.0));
        assert_abs_diff_eq!(spilled, 50.0);
    }

    #[test]
    fn waste_ceiling_below_seal_threshold() {
        let map = trap();
        let leak = Leak::new(800.0, 1073.0, 0.2, 2.0, 10000.0, &map);
        let selector = LeakOrWaste::new(leak, Waste::new(1.0, &map));
        assert!(!selector.leaking());
        let (leaked, wasted) = selector.distribute(100.0);
        assert_eq!(leaked, 0.0);
        assert_abs_diff_eq!(wasted, 75.0);

        let selector = LeakOrWaste::new(leak, Waste::new(3.9, &map));
        assert!(selector.leaking());
        assert_eq!(selector.distribute(100.0), (0.0, 0.0));
    }
}
