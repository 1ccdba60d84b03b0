//! ProblemDistiller — raw observation to feature summary.

use crate::config::DistillerConfig;
use crate::types::*;

/// Extracts the navigation features used as a retrieval key.
///
/// Stateless: the same observation always yields the same summary. A goal
/// that is out of view becomes [`GoalLocation::Unknown`] and an empty
/// surrounding becomes an empty `nearby` set; neither is an error.
#[derive(Debug, Clone, Default)]
pub struct ProblemDistiller {
    config: DistillerConfig,
}

impl ProblemDistiller {
    pub fn new(config: DistillerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DistillerConfig {
        &self.config
    }

    pub fn distill(&self, observation: &GridObservation) -> FeatureSummary {
        let agent = observation.agent;
        let facing = observation.facing;

        // Several visible goals: the closest one, ties broken by position.
        let goal = observation
            .cells
            .iter()
            .filter(|c| c.kind == CellKind::Goal)
            .min_by_key(|c| (agent.offset_to(&c.pos).manhattan(), c.pos))
            .map(|c| GoalLocation::Known(c.pos))
            .unwrap_or(GoalLocation::Unknown);

        let nearby = observation
            .cells
            .iter()
            .filter(|c| c.kind.is_object())
            .filter(|c| c.pos != agent && agent.chebyshev(&c.pos) <= self.config.nearby_radius)
            .map(|c| {
                let (ahead, right) = agent.offset_to(&c.pos).egocentric(facing);
                NearbyObject::new(c.kind, ahead, right)
            })
            .collect();

        FeatureSummary {
            agent,
            facing,
            goal,
            nearby,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_and_obstacles() {
        let obs = GridObservation::new(GridPos::new(2, 2), Direction::East)
            .with_cell(GridPos::new(2, 3), CellKind::Wall)
            .with_cell(GridPos::new(3, 2), CellKind::Lava)
            .with_cell(GridPos::new(2, 6), CellKind::Goal)
            .with_cell(GridPos::new(2, 5), CellKind::Wall) // outside radius
            .with_cell(GridPos::new(1, 2), CellKind::Empty);

        let s = ProblemDistiller::default().distill(&obs);
        assert_eq!(s.goal, GoalLocation::Known(GridPos::new(2, 6)));
        assert_eq!(s.nearby.len(), 2);
        assert!(s.nearby.contains(&NearbyObject::new(CellKind::Wall, 1, 0)));
        assert!(s.nearby.contains(&NearbyObject::new(CellKind::Lava, 0, 1)));
        assert_eq!(s.front(), Some(CellKind::Wall));
    }

    #[test]
    fn test_unknown_goal_degrades_gracefully() {
        let obs = GridObservation::new(GridPos::new(0, 0), Direction::North);
        let s = ProblemDistiller::default().distill(&obs);
        assert_eq!(s.goal, GoalLocation::Unknown);
        assert!(s.nearby.is_empty());
    }

    #[test]
    fn test_deterministic() {
        let obs = GridObservation::new(GridPos::new(1, 1), Direction::South)
            .with_cell(GridPos::new(2, 1), CellKind::Ball)
            .with_cell(GridPos::new(5, 5), CellKind::Goal)
            .with_cell(GridPos::new(1, 3), CellKind::Goal);
        let d = ProblemDistiller::default();
        let a = d.distill(&obs);
        let b = d.distill(&obs);
        assert_eq!(a, b);
        assert_eq!(a.goal, GoalLocation::Known(GridPos::new(1, 3)));
    }

    #[test]
    fn test_radius_is_configurable() {
        let obs = GridObservation::new(GridPos::new(0, 0), Direction::East)
            .with_cell(GridPos::new(0, 3), CellKind::Box);
        let narrow = ProblemDistiller::default().distill(&obs);
        let wide = ProblemDistiller::new(DistillerConfig { nearby_radius: 3 }).distill(&obs);
        assert!(narrow.nearby.is_empty());
        assert_eq!(wide.nearby.len(), 1);
    }
}
