//! GridWorld — a small MiniGrid-style room.
//!
//! The room is surrounded by walls. `left`/`right` rotate the agent,
//! `forward` moves it one cell unless a wall or object blocks the way.
//! Stepping onto lava ends the episode as a failure; reaching the goal ends
//! it with reward `1 − 0.9 · steps / max_steps`. Other actions are no-ops.

use crate::env::{describe_observation, Environment, StepInfo, StepOutcome, Termination};
use crate::error::{AgentError, AgentResult};
use bot_core::action::Action;
use bot_core::types::{CellKind, Direction, GridObservation, GridPos, ObservedCell};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use tracing::debug;

const MIN_SIZE: i32 = 5;
const MAX_SIZE: i32 = 1024;
const DEFAULT_MAX_STEPS: usize = 100;
/// Attempts at drawing a solvable random layout before falling back to an open room.
const LAYOUT_ATTEMPTS: usize = 32;

/// A rectangular room with a single goal.
#[derive(Debug, Clone)]
pub struct GridWorld {
    width: i32,
    height: i32,
    cells: Vec<CellKind>,
    start: GridPos,
    start_facing: Direction,
    goal: GridPos,
    agent: GridPos,
    facing: Direction,
    max_steps: usize,
    view_radius: Option<i32>,
    mission: String,
    steps: usize,
    finished: bool,
}

impl GridWorld {
    /// Create a walled room. `start` and `goal` must be distinct interior cells.
    pub fn new(
        width: i32,
        height: i32,
        start: GridPos,
        facing: Direction,
        goal: GridPos,
    ) -> AgentResult<Self> {
        if width < MIN_SIZE || height < MIN_SIZE {
            return Err(AgentError::Environment(format!(
                "grid must be at least {MIN_SIZE}x{MIN_SIZE}, got {width}x{height}"
            )));
        }
        if width > MAX_SIZE || height > MAX_SIZE {
            return Err(AgentError::Environment(format!(
                "grid must be at most {MAX_SIZE}x{MAX_SIZE}, got {width}x{height}"
            )));
        }

        let mut world = Self {
            width,
            height,
            cells: vec![CellKind::Empty; (width * height) as usize],
            start,
            start_facing: facing,
            goal,
            agent: start,
            facing,
            max_steps: DEFAULT_MAX_STEPS,
            view_radius: None,
            mission: "get to the green goal square".to_string(),
            steps: 0,
            finished: false,
        };

        for pos in [start, goal] {
            if !world.is_interior(pos) {
                return Err(AgentError::Environment(format!("{pos} is not an interior cell")));
            }
        }
        if start == goal {
            return Err(AgentError::Environment("start and goal coincide".to_string()));
        }

        for row in 0..height {
            for col in 0..width {
                let pos = GridPos::new(row, col);
                if !world.is_interior(pos) {
                    world.set(pos, CellKind::Wall);
                }
            }
        }
        world.set(goal, CellKind::Goal);
        Ok(world)
    }

    /// Place an obstacle on an interior cell other than the start or goal.
    pub fn with_cell(mut self, pos: GridPos, kind: CellKind) -> AgentResult<Self> {
        if !self.is_interior(pos) || pos == self.start || pos == self.goal || kind == CellKind::Goal {
            return Err(AgentError::Environment(format!("cannot place {kind} at {pos}")));
        }
        self.set(pos, kind);
        Ok(self)
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Limit observations to cells within `radius` (Chebyshev) of the agent.
    pub fn with_view_radius(mut self, radius: i32) -> Self {
        self.view_radius = Some(radius.max(0));
        self
    }

    pub fn with_mission(mut self, mission: impl Into<String>) -> Self {
        self.mission = mission.into();
        self
    }

    /// A seeded random square room of side `size` with scattered walls.
    ///
    /// Sizes below 5 are raised to 5; sizes above 1024 are rejected. The same `(size, seed)` always yields the same layout, and the goal is
    /// always reachable.
    pub fn random(size: i32, seed: u64) -> AgentResult<Self> {
        let size = size.max(MIN_SIZE);
        let mut rng = StdRng::seed_from_u64(seed);

        let random_interior = |rng: &mut StdRng| {
            GridPos::new(rng.random_range(1..size - 1), rng.random_range(1..size - 1))
        };

        let start = random_interior(&mut rng);
        let mut goal = random_interior(&mut rng);
        while goal == start {
            goal = random_interior(&mut rng);
        }
        let facing = Direction::ALL[rng.random_range(0..4)];
        let open = Self::new(size, size, start, facing, goal)?;

        let interior = ((size - 2) * (size - 2)) as usize;
        let walls = interior / 8;
        for attempt in 0..LAYOUT_ATTEMPTS {
            let mut world = open.clone();
            for _ in 0..walls {
                let pos = random_interior(&mut rng);
                if pos != start && pos != goal {
                    world.set(pos, CellKind::Wall);
                }
            }
            if world.goal_reachable() {
                debug!(size, seed, attempt, walls, "random layout generated");
                return Ok(world);
            }
        }

        debug!(size, seed, "no solvable layout found, using an open room");
        Ok(open)
    }

    pub fn agent(&self) -> GridPos {
        self.agent
    }

    pub fn facing(&self) -> Direction {
        self.facing
    }

    pub fn goal(&self) -> GridPos {
        self.goal
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Cell contents; anything outside the room reads as wall.
    pub fn cell(&self, pos: GridPos) -> CellKind {
        self.index(pos).map_or(CellKind::Wall, |i| self.cells[i])
    }

    /// The current observation.
    pub fn observe(&self) -> GridObservation {
        let mut cells = Vec::new();
        for row in 0..self.height {
            for col in 0..self.width {
                let pos = GridPos::new(row, col);
                let visible = self
                    .view_radius
                    .map_or(true, |r| self.agent.chebyshev(&pos) <= r);
                if visible {
                    cells.push(ObservedCell {
                        pos,
                        kind: self.cell(pos),
                    });
                }
            }
        }
        GridObservation {
            agent: self.agent,
            facing: self.facing,
            cells,
            mission: self.mission.clone(),
        }
    }

    /// The current observation rendered as text.
    pub fn describe(&self) -> String {
        describe_observation(&self.observe())
    }

    /// Breadth-first search from the start, treating walls, objects and lava as blocked.
    pub fn goal_reachable(&self) -> bool {
        let mut seen = vec![false; self.cells.len()];
        let mut queue = VecDeque::from([self.start]);
        while let Some(pos) = queue.pop_front() {
            if pos == self.goal {
                return true;
            }
            for dir in Direction::ALL {
                let next = pos.step(dir);
                let Some(i) = self.index(next) else { continue };
                let kind = self.cells[i];
                if !seen[i] && matches!(kind, CellKind::Empty | CellKind::Goal) {
                    seen[i] = true;
                    queue.push_back(next);
                }
            }
        }
        false
    }

    fn is_interior(&self, pos: GridPos) -> bool {
        pos.row > 0 && pos.col > 0 && pos.row < self.height - 1 && pos.col < self.width - 1
    }

    fn index(&self, pos: GridPos) -> Option<usize> {
        let inside = pos.row >= 0 && pos.col >= 0 && pos.row < self.height && pos.col < self.width;
        inside.then(|| (pos.row * self.width + pos.col) as usize)
    }

    fn set(&mut self, pos: GridPos, kind: CellKind) {
        if let Some(i) = self.index(pos) {
            self.cells[i] = kind;
        }
    }

    fn goal_reward(&self) -> f64 {
        1.0 - 0.9 * (self.steps as f64 / self.max_steps as f64)
    }
}

impl Environment for GridWorld {
    fn reset(&mut self) -> AgentResult<GridObservation> {
        self.agent = self.start;
        self.facing = self.start_facing;
        self.steps = 0;
        self.finished = false;
        Ok(self.observe())
    }

    fn step(&mut self, action: Action) -> AgentResult<StepOutcome> {
        if self.finished {
            return Err(AgentError::Environment(
                "episode already finished; call reset".to_string(),
            ));
        }
        self.steps += 1;

        let mut info = StepInfo::default();
        let mut reward = 0.0;

        match action {
            Action::Left => self.facing = self.facing.turn_left(),
            Action::Right => self.facing = self.facing.turn_right(),
            Action::Forward => {
                let next = self.agent.step(self.facing);
                match self.cell(next) {
                    CellKind::Empty => self.agent = next,
                    CellKind::Goal => {
                        self.agent = next;
                        reward = self.goal_reward();
                        info.success = true;
                        info.termination = Some(Termination::Goal);
                    }
                    CellKind::Lava => {
                        self.agent = next;
                        info.termination = Some(Termination::Lava);
                    }
                    _ => info.blocked = true,
                }
            }
            Action::Pickup | Action::Drop | Action::Toggle | Action::Done => {}
        }

        if info.termination.is_none() && self.steps >= self.max_steps {
            info.termination = Some(Termination::StepLimit);
        }
        let done = info.termination.is_some();
        self.finished = done;

        Ok(StepOutcome {
            observation: self.observe(),
            reward,
            done,
            info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> GridWorld {
        GridWorld::new(7, 7, GridPos::new(1, 1), Direction::East, GridPos::new(1, 5)).unwrap()
    }

    #[test]
    fn test_walk_to_goal() {
        let mut world = room().with_max_steps(10);
        world.reset().unwrap();
        for _ in 0..3 {
            let outcome = world.step(Action::Forward).unwrap();
            assert!(!outcome.done);
        }
        let outcome = world.step(Action::Forward).unwrap();
        assert!(outcome.done);
        assert!(outcome.info.success);
        assert_eq!(outcome.info.termination, Some(Termination::Goal));
        assert!((outcome.reward - (1.0 - 0.9 * 0.4)).abs() < 1e-9);
        assert!(world.step(Action::Forward).is_err());
    }

    #[test]
    fn test_walls_block() {
        let mut world = room().with_cell(GridPos::new(1, 2), CellKind::Wall).unwrap();
        world.reset().unwrap();
        let outcome = world.step(Action::Forward).unwrap();
        assert!(outcome.info.blocked);
        assert_eq!(world.agent(), GridPos::new(1, 1));

        world.step(Action::Left).unwrap();
        let outcome = world.step(Action::Forward).unwrap();
        assert!(outcome.info.blocked, "border wall to the north");
    }

    #[test]
    fn test_lava_fails_episode() {
        let mut world = room().with_cell(GridPos::new(1, 2), CellKind::Lava).unwrap();
        world.reset().unwrap();
        let outcome = world.step(Action::Forward).unwrap();
        assert!(outcome.done);
        assert!(!outcome.info.success);
        assert_eq!(outcome.reward, 0.0);
        assert_eq!(outcome.info.termination, Some(Termination::Lava));
    }

    #[test]
    fn test_step_limit() {
        let mut world = room().with_max_steps(2);
        world.reset().unwrap();
        world.step(Action::Toggle).unwrap();
        let outcome = world.step(Action::Done).unwrap();
        assert!(outcome.done);
        assert_eq!(outcome.info.termination, Some(Termination::StepLimit));
    }

    #[test]
    fn test_view_radius() {
        let world = room().with_view_radius(1);
        let obs = world.observe();
        assert_eq!(obs.cells.len(), 9);
        assert!(obs.kind_at(&GridPos::new(1, 5)).is_none());
    }

    #[test]
    fn test_invalid_layouts() {
        assert!(GridWorld::new(3, 7, GridPos::new(1, 1), Direction::East, GridPos::new(1, 2)).is_err());
        assert!(GridWorld::new(7, 7, GridPos::new(0, 1), Direction::East, GridPos::new(1, 2)).is_err());
        assert!(GridWorld::new(7, 7, GridPos::new(2, 2), Direction::East, GridPos::new(2, 2)).is_err());
        assert!(room().with_cell(GridPos::new(1, 5), CellKind::Wall).is_err());
    }

    #[test]
    fn test_oversized_grid_rejected() {
        let huge = 50_000;
        assert!(GridWorld::new(huge, 7, GridPos::new(1, 1), Direction::East, GridPos::new(1, 2)).is_err());
        assert!(matches!(GridWorld::random(huge, 1), Err(AgentError::Environment(_))));
        assert!(GridWorld::new(MAX_SIZE, 7, GridPos::new(1, 1), Direction::East, GridPos::new(1, 2)).is_ok());
    }

    #[test]
    fn test_random_is_seeded_and_solvable() {
        for seed in 0..20 {
            let a = GridWorld::random(8, seed).unwrap();
            let b = GridWorld::random(8, seed).unwrap();
            assert_eq!(a.observe(), b.observe());
            assert!(a.goal_reachable());
            assert_ne!(a.agent(), a.goal());
        }
    }
}
