//! Edge detection for the automatic fire-zone path.

use gate_types::{Command, ZONE_COUNT, Zone};

const ZONES: usize = ZONE_COUNT as usize;

/// Remembers which zones were burning on the previous observation and emits
/// `FUEGO_z_ON` / `FUEGO_z_OFF` only when that changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FireZoneTracker {
    burning: [bool; ZONES],
}

impl FireZoneTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `observed` with the remembered state and return one command per
    /// changed zone, in zone order.
    pub fn observe(&mut self, observed: [bool; ZONES]) -> Vec<Command> {
        let mut edges = Vec::new();
        for (i, (&now, was)) in observed.iter().zip(self.burning.iter_mut()).enumerate() {
            if now == *was {
                continue;
            }
            *was = now;
            if let Ok(zone) = Zone::from_index(i) {
                edges.push(Command::Fire { zone, on: now });
            }
        }
        edges
    }

    pub fn burning(&self) -> [bool; ZONES] {
        self.burning
    }

    /// Forget every zone.  Called on mode changes.
    pub fn reset(&mut self) {
        self.burning = [false; ZONES];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fire(z: u8, on: bool) -> Command {
        Command::fire(z, on).unwrap()
    }

    #[test]
    fn emits_only_on_edges() {
        let mut t = FireZoneTracker::new();
        assert_eq!(t.observe([true, false, false]), vec![fire(1, true)]);
        assert!(t.observe([true, false, false]).is_empty());
        assert_eq!(
            t.observe([false, false, true]),
            vec![fire(1, false), fire(3, true)]
        );
        assert_eq!(t.burning(), [false, false, true]);
    }

    #[test]
    fn reset_forgets_burning_zones() {
        let mut t = FireZoneTracker::new();
        t.observe([true, true, true]);
        t.reset();
        // A zone still burning after the reset produces a fresh rising edge.
        assert_eq!(t.observe([true, false, false]), vec![fire(1, true)]);
    }
}
