// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The shared maze: wall layout, sensor readings, and board rendering.

use std::collections::HashMap;
use std::fmt::Write as _;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A cell coordinate. `x` grows east, `y` grows south.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self { x: self.x + dx, y: self.y + dy }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Self::North, Self::East, Self::South, Self::West];

    pub fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
        }
    }
}

/// What an octapod perceives from its cell. Each direction is `true` when
/// the neighbouring cell is blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sensor {
    pub position: Point,
    pub north: bool,
    pub east: bool,
    pub south: bool,
    pub west: bool,
}

/// Wall layout of the maze, stored row-major. `true` marks a wall.
#[derive(Debug, Clone)]
pub struct Maze {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl Maze {
    /// Carve a maze with a randomized depth-first backtracker.
    ///
    /// Passages are carved on even coordinates starting at (0, 0); the
    /// cells between two visited cells are opened as the walk advances.
    pub fn generate<R: Rng + ?Sized>(width: usize, height: usize, rng: &mut R) -> Self {
        let mut maze = Self { width, height, cells: vec![true; width * height] };
        if width == 0 || height == 0 {
            return maze;
        }

        maze.open(0, 0);
        let mut stack = vec![(0usize, 0usize)];
        while let Some(&(x, y)) = stack.last() {
            let mut candidates = Vec::with_capacity(4);
            if x >= 2 && maze.wall_at(x - 2, y) {
                candidates.push((x - 2, y));
            }
            if x + 2 < width && maze.wall_at(x + 2, y) {
                candidates.push((x + 2, y));
            }
            if y >= 2 && maze.wall_at(x, y - 2) {
                candidates.push((x, y - 2));
            }
            if y + 2 < height && maze.wall_at(x, y + 2) {
                candidates.push((x, y + 2));
            }

            if candidates.is_empty() {
                stack.pop();
                continue;
            }

            let (nx, ny) = candidates[rng.random_range(0..candidates.len())];
            maze.open((x + nx) / 2, (y + ny) / 2);
            maze.open(nx, ny);
            stack.push((nx, ny));
        }
        maze
    }

    /// Build a maze from rows of `#` (wall) and any other character (open).
    /// Short rows are padded with walls.
    pub fn from_rows(rows: &[&str]) -> Self {
        let height = rows.len();
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
        let mut cells = vec![true; width * height];
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                cells[y * width + x] = c == '#';
            }
        }
        Self { width, height, cells }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Whether `point` is blocked. Anything outside the maze counts as wall.
    pub fn is_wall(&self, point: Point) -> bool {
        match self.index(point) {
            Some(i) => self.cells[i],
            None => true,
        }
    }

    /// First open cell in row-major order, where new octapods are placed.
    pub fn start(&self) -> Point {
        self.cells
            .iter()
            .position(|wall| !wall)
            .map(|i| Point::new((i % self.width) as i32, (i / self.width) as i32))
            .unwrap_or_default()
    }

    /// Sensor reading for an octapod standing at `point`.
    pub fn sensor(&self, point: Point) -> Sensor {
        Sensor {
            position: point,
            north: self.is_wall(point.step(Direction::North)),
            east: self.is_wall(point.step(Direction::East)),
            south: self.is_wall(point.step(Direction::South)),
            west: self.is_wall(point.step(Direction::West)),
        }
    }

    /// Render the board as a fenced text block.
    ///
    /// Walls are `#`, marked cells show their character, everything else is
    /// blank. The east and south borders are drawn as walls.
    pub fn render(&self, marks: &HashMap<Point, char>) -> String {
        let mut out = String::with_capacity((self.width + 1) * (self.height + 1) * 2 + 8);
        for y in 0..self.height {
            for x in 0..self.width {
                let point = Point::new(x as i32, y as i32);
                if self.is_wall(point) {
                    out.push_str("# ");
                } else if let Some(c) = marks.get(&point) {
                    let _ = write!(out, "{c} ");
                } else {
                    out.push_str("  ");
                }
            }
            out.push_str("# \n");
        }
        for _ in 0..self.width {
            out.push_str("# ");
        }
        out.push_str("# \n");
        format!("```\n{out}```")
    }

    fn index(&self, point: Point) -> Option<usize> {
        let x = usize::try_from(point.x).ok()?;
        let y = usize::try_from(point.y).ok()?;
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    fn wall_at(&self, x: usize, y: usize) -> bool {
        self.cells[y * self.width + x]
    }

    fn open(&mut self, x: usize, y: usize) {
        self.cells[y * self.width + x] = false;
    }
}

#[cfg(test)]
#[path = "maze_tests.rs"]
mod tests;
