//! Shared types: grid geometry, raw observations and feature summaries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One of the four headings an agent can face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    fn index(self) -> u8 {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }

    fn from_index(i: u8) -> Self {
        Self::ALL[(i % 4) as usize]
    }

    /// Heading after a 90° counter-clockwise turn.
    pub fn turn_left(self) -> Self {
        Self::from_index(self.index() + 3)
    }

    /// Heading after a 90° clockwise turn.
    pub fn turn_right(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    pub fn opposite(self) -> Self {
        Self::from_index(self.index() + 2)
    }

    /// Minimal number of quarter turns between two headings (0, 1 or 2).
    pub fn quarter_turns_to(self, other: Direction) -> u8 {
        let diff = (other.index() + 4 - self.index()) % 4;
        diff.min(4 - diff)
    }

    /// Row/column step for moving one cell in this direction.
    pub fn delta(self) -> GridOffset {
        match self {
            Direction::North => GridOffset::new(-1, 0),
            Direction::East => GridOffset::new(0, 1),
            Direction::South => GridOffset::new(1, 0),
            Direction::West => GridOffset::new(0, -1),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Absolute cell coordinates. Row grows southwards, column eastwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    pub row: i32,
    pub col: i32,
}

impl GridPos {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub fn offset_to(&self, other: &GridPos) -> GridOffset {
        GridOffset::new(other.row - self.row, other.col - self.col)
    }

    pub fn step(&self, direction: Direction) -> GridPos {
        let d = direction.delta();
        GridPos::new(self.row + d.drow, self.col + d.dcol)
    }

    /// Chebyshev (king-move) distance.
    pub fn chebyshev(&self, other: &GridPos) -> i32 {
        (self.row - other.row).abs().max((self.col - other.col).abs())
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Allocentric displacement between two cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridOffset {
    pub drow: i32,
    pub dcol: i32,
}

impl GridOffset {
    pub fn new(drow: i32, dcol: i32) -> Self {
        Self { drow, dcol }
    }

    pub fn manhattan(&self) -> i32 {
        self.drow.abs() + self.dcol.abs()
    }

    pub fn manhattan_to(&self, other: &GridOffset) -> i32 {
        (self.drow - other.drow).abs() + (self.dcol - other.dcol).abs()
    }

    /// Re-express this offset in the agent's own frame.
    ///
    /// `ahead` is positive in front of the agent, `right` positive to its right.
    pub fn egocentric(&self, facing: Direction) -> (i32, i32) {
        match facing {
            Direction::North => (-self.drow, self.dcol),
            Direction::East => (self.dcol, self.drow),
            Direction::South => (self.drow, -self.dcol),
            Direction::West => (-self.dcol, -self.drow),
        }
    }
}

/// What occupies a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Empty,
    Wall,
    Lava,
    Door,
    Key,
    Ball,
    Box,
    Goal,
}

impl CellKind {
    /// Whether an agent may step onto a cell of this kind.
    pub fn is_passable(self) -> bool {
        matches!(self, CellKind::Empty | CellKind::Goal | CellKind::Lava)
    }

    /// Kinds reported as nearby objects in a feature summary.
    pub fn is_object(self) -> bool {
        !matches!(self, CellKind::Empty | CellKind::Goal)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CellKind::Empty => "empty",
            CellKind::Wall => "wall",
            CellKind::Lava => "lava",
            CellKind::Door => "door",
            CellKind::Key => "key",
            CellKind::Ball => "ball",
            CellKind::Box => "box",
            CellKind::Goal => "goal",
        }
    }
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single visible cell in a raw observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedCell {
    pub pos: GridPos,
    pub kind: CellKind,
}

/// Raw environment observation.
///
/// Only the cells the agent can currently see are listed; cells not
/// listed are unknown, not empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridObservation {
    pub agent: GridPos,
    pub facing: Direction,
    pub cells: Vec<ObservedCell>,
    pub mission: String,
}

impl GridObservation {
    pub fn new(agent: GridPos, facing: Direction) -> Self {
        Self {
            agent,
            facing,
            cells: Vec::new(),
            mission: "get to the green goal square".to_string(),
        }
    }

    pub fn with_cell(mut self, pos: GridPos, kind: CellKind) -> Self {
        self.cells.push(ObservedCell { pos, kind });
        self
    }

    pub fn with_mission(mut self, mission: impl Into<String>) -> Self {
        self.mission = mission.into();
        self
    }

    pub fn kind_at(&self, pos: &GridPos) -> Option<CellKind> {
        self.cells.iter().find(|c| c.pos == *pos).map(|c| c.kind)
    }
}

/// Goal location, or explicitly unknown when the goal is not in view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalLocation {
    Known(GridPos),
    Unknown,
}

impl GoalLocation {
    pub fn position(&self) -> Option<GridPos> {
        match self {
            GoalLocation::Known(p) => Some(*p),
            GoalLocation::Unknown => None,
        }
    }
}

/// An object near the agent, positioned relative to its heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NearbyObject {
    pub kind: CellKind,
    pub ahead: i32,
    pub right: i32,
}

impl NearbyObject {
    pub fn new(kind: CellKind, ahead: i32, right: i32) -> Self {
        Self { kind, ahead, right }
    }
}

impl fmt::Display for NearbyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, relative_phrase(self.ahead, self.right))
    }
}

/// Structured navigation features of one observation; the similarity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub agent: GridPos,
    pub facing: Direction,
    pub goal: GoalLocation,
    pub nearby: BTreeSet<NearbyObject>,
}

impl FeatureSummary {
    pub fn new(agent: GridPos, facing: Direction, goal: GoalLocation) -> Self {
        Self {
            agent,
            facing,
            goal,
            nearby: BTreeSet::new(),
        }
    }

    pub fn with_nearby(mut self, object: NearbyObject) -> Self {
        self.nearby.insert(object);
        self
    }

    /// Goal displacement from the agent, in grid axes.
    pub fn goal_offset(&self) -> Option<GridOffset> {
        self.goal.position().map(|g| self.agent.offset_to(&g))
    }

    /// Goal displacement as `(ahead, right)` in the agent's frame.
    pub fn goal_ahead_right(&self) -> Option<(i32, i32)> {
        self.goal_offset().map(|o| o.egocentric(self.facing))
    }

    /// The object in the cell directly in front of the agent, if any.
    pub fn front(&self) -> Option<CellKind> {
        self.nearby
            .iter()
            .find(|o| o.ahead == 1 && o.right == 0)
            .map(|o| o.kind)
    }

    /// True when nothing occupies the cell ahead. Lava counts as occupied.
    pub fn front_is_clear(&self) -> bool {
        self.front().is_none()
    }

    /// Coarse description of where the goal lies, e.g. `"ahead-right"`.
    pub fn goal_direction(&self) -> String {
        match self.goal_ahead_right() {
            None => "unknown".to_string(),
            Some((0, 0)) => "here".to_string(),
            Some((ahead, right)) => direction_word(ahead, right),
        }
    }

    pub fn obstacles_description(&self) -> String {
        if self.nearby.is_empty() {
            return "none".to_string();
        }
        self.nearby
            .iter()
            .map(|o| o.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// `"ahead"`, `"behind-left"`, ... for an egocentric displacement.
pub fn direction_word(ahead: i32, right: i32) -> String {
    let longitudinal = match ahead.signum() {
        1 => Some("ahead"),
        -1 => Some("behind"),
        _ => None,
    };
    let lateral = match right.signum() {
        1 => Some("right"),
        -1 => Some("left"),
        _ => None,
    };
    match (longitudinal, lateral) {
        (Some(a), Some(b)) => format!("{a}-{b}"),
        (Some(a), None) => a.to_string(),
        (None, Some(b)) => b.to_string(),
        (None, None) => "here".to_string(),
    }
}

fn relative_phrase(ahead: i32, right: i32) -> String {
    let mut parts = Vec::new();
    match ahead.signum() {
        1 => parts.push(format!("{} ahead", ahead)),
        -1 => parts.push(format!("{} behind", -ahead)),
        _ => {}
    }
    match right.signum() {
        1 => parts.push(format!("{} right", right)),
        -1 => parts.push(format!("{} left", -right)),
        _ => {}
    }
    if parts.is_empty() {
        "agent cell".to_string()
    } else {
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turns() {
        assert_eq!(Direction::North.turn_right(), Direction::East);
        assert_eq!(Direction::North.turn_left(), Direction::West);
        assert_eq!(Direction::East.opposite(), Direction::West);
        assert_eq!(Direction::North.quarter_turns_to(Direction::West), 1);
        assert_eq!(Direction::North.quarter_turns_to(Direction::South), 2);
    }

    #[test]
    fn test_egocentric_offsets() {
        let offset = GridOffset::new(3, 1); // south 3, east 1
        assert_eq!(offset.egocentric(Direction::South), (3, -1));
        assert_eq!(offset.egocentric(Direction::East), (1, 3));
        assert_eq!(offset.egocentric(Direction::North), (-3, 1));
        assert_eq!(offset.egocentric(Direction::West), (-1, -3));
    }

    #[test]
    fn test_goal_direction_words() {
        let s = FeatureSummary::new(
            GridPos::new(0, 0),
            Direction::East,
            GoalLocation::Known(GridPos::new(4, 4)),
        );
        assert_eq!(s.goal_ahead_right(), Some((4, 4)));
        assert_eq!(s.goal_direction(), "ahead-right");

        let unknown = FeatureSummary::new(GridPos::new(0, 0), Direction::East, GoalLocation::Unknown);
        assert_eq!(unknown.goal_direction(), "unknown");
        assert!(unknown.front_is_clear());
    }

    #[test]
    fn test_front_object() {
        let s = FeatureSummary::new(GridPos::new(2, 2), Direction::North, GoalLocation::Unknown)
            .with_nearby(NearbyObject::new(CellKind::Wall, 1, 0))
            .with_nearby(NearbyObject::new(CellKind::Ball, 1, 1));
        assert_eq!(s.front(), Some(CellKind::Wall));
        assert!(!s.front_is_clear());
        assert_eq!(s.obstacles_description(), "wall at 1 ahead, ball at 1 ahead 1 right");
    }
}
