use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IntersectionId(pub u32);

/// Compass approach of a signal head. A 3-way intersection only uses the
/// first three directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    N,
    S,
    E,
    W,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::N, Direction::S, Direction::E, Direction::W];

    /// The direction that may share a green with this one (N/S, E/W).
    pub fn opposing(self) -> Direction {
        match self {
            Direction::N => Direction::S,
            Direction::S => Direction::N,
            Direction::E => Direction::W,
            Direction::W => Direction::E,
        }
    }

    /// True when the two directions belong to conflicting green groups.
    pub fn conflicts_with(self, other: Direction) -> bool {
        self != other && self.opposing() != other
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::N => "N",
            Direction::S => "S",
            Direction::E => "E",
            Direction::W => "W",
        }
    }

    pub fn parse(s: &str) -> Option<Direction> {
        match s {
            "N" => Some(Direction::N),
            "S" => Some(Direction::S),
            "E" => Some(Direction::E),
            "W" => Some(Direction::W),
            _ => None,
        }
    }
}

/// Represents a road junction. Created once at startup, immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intersection {
    /// Unique identifier for the intersection.
    pub id: IntersectionId,
    /// Display name, e.g. "Main & Broadway".
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Number of roads meeting here (3 or 4).
    pub num_roads: u8,
}

impl Intersection {
    pub fn new(id: u32, name: &str, latitude: f64, longitude: f64, num_roads: u8) -> Self {
        Self {
            id: IntersectionId(id),
            name: name.to_string(),
            latitude,
            longitude,
            num_roads,
        }
    }

    /// The approaches that actually exist at this junction.
    pub fn directions(&self) -> &'static [Direction] {
        if self.num_roads == 3 {
            &Direction::ALL[..3]
        } else {
            &Direction::ALL
        }
    }
}

/// The default network: five downtown junctions, one of them a 3-way.
pub fn create_intersections() -> Vec<Intersection> {
    vec![
        Intersection::new(1, "Main & Broadway", 40.7128, -74.0060, 4),
        Intersection::new(2, "Central & Park", 40.7150, -74.0048, 4),
        Intersection::new(3, "Liberty & Commerce", 40.7112, -74.0090, 3),
        Intersection::new(4, "Jefferson & Madison", 40.7200, -74.0070, 4),
        Intersection::new(5, "Oak & Maple", 40.7180, -74.0100, 4),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposing_pairs_are_symmetric() {
        for dir in Direction::ALL {
            assert_eq!(dir.opposing().opposing(), dir);
            assert!(!dir.conflicts_with(dir.opposing()));
            assert!(!dir.conflicts_with(dir));
        }
        assert!(Direction::N.conflicts_with(Direction::E));
        assert!(Direction::W.conflicts_with(Direction::S));
    }

    #[test]
    fn three_way_intersection_drops_west() {
        let network = create_intersections();
        let three_way = network
            .iter()
            .find(|i| i.num_roads == 3)
            .expect("default network has a 3-way junction");
        assert_eq!(
            three_way.directions(),
            &[Direction::N, Direction::S, Direction::E]
        );
        for i in network.iter().filter(|i| i.num_roads == 4) {
            assert_eq!(i.directions().len(), 4);
        }
    }

    #[test]
    fn direction_parse_round_trips() {
        for dir in Direction::ALL {
            assert_eq!(Direction::parse(dir.as_str()), Some(dir));
        }
        assert_eq!(Direction::parse("NE"), None);
    }
}
