use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::person::Person;
use crate::query::person_by_id;

pub const DEFAULT_WIDTH: f32 = 1000.0;
pub const MAX_ANCESTOR_LEVELS: usize = 6;
pub const MAX_DESCENDANT_LEVELS: usize = 6;
pub const LEVEL_GAP: f32 = 140.0;
pub const MIN_SPACING: f32 = 100.0;

const BASE_HEIGHT: f32 = 400.0;
const MIN_HEIGHT: f32 = 900.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    pub width: f32,
    /// Explicit canvas height. When `None` the height grows with the
    /// configured generation counts.
    pub height: Option<f32>,
    pub max_ancestor_levels: usize,
    pub max_descendant_levels: usize,
    pub level_gap: f32,
    pub min_spacing: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: None,
            max_ancestor_levels: MAX_ANCESTOR_LEVELS,
            max_descendant_levels: MAX_DESCENDANT_LEVELS,
            level_gap: LEVEL_GAP,
            min_spacing: MIN_SPACING,
        }
    }
}

impl LayoutConfig {
    pub fn canvas_height(&self) -> f32 {
        match self.height {
            Some(height) => height,
            None => {
                let generations = (self.max_ancestor_levels + self.max_descendant_levels) as f32;
                (BASE_HEIGHT + generations * self.level_gap).max(MIN_HEIGHT)
            }
        }
    }
}

/// A person pinned to canvas coordinates. `x`/`y` are the node center.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedNode {
    pub person: Person,
    pub x: f32,
    pub y: f32,
}

/// One parent-to-child edge between two placed nodes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub from: Point,
    pub to: Point,
    pub parent_id: String,
    pub child_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeLayout {
    pub nodes: Vec<PlacedNode>,
    pub links: Vec<Link>,
    pub width: f32,
    pub height: f32,
}

impl TreeLayout {
    pub fn empty(config: &LayoutConfig) -> Self {
        Self {
            nodes: Vec::new(),
            links: Vec::new(),
            width: config.width,
            height: config.canvas_height(),
        }
    }

    /// Place `center_id` mid canvas, ancestors in rows above and
    /// descendants in rows below, each row spread evenly across the
    /// width. An unknown center yields an empty layout.
    ///
    /// A person reachable both upward and downward keeps a single node;
    /// the later placement wins its coordinates. Edges are only drawn
    /// between nodes that both made it onto the canvas.
    pub fn compute(center_id: &str, people: &[Person], config: &LayoutConfig) -> Self {
        let Some(center) = person_by_id(center_id, people) else {
            return Self::empty(config);
        };

        let width = config.width;
        let height = config.canvas_height();
        let center_x = width / 2.0;
        let center_y = height / 2.0;

        let above = ancestor_levels(center, people, config.max_ancestor_levels);
        let below = descendant_levels(&center.person_id, people, config.max_descendant_levels);

        let mut nodes: Vec<PlacedNode> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        place(&mut nodes, &mut index, center, center_x, center_y);

        for (level, row) in above.iter().enumerate() {
            let y = center_y - (level as f32 + 1.0) * config.level_gap;
            let spacing = config.min_spacing.max(width / (row.len() as f32 + 1.0));
            for (slot, person) in row.iter().enumerate() {
                place(&mut nodes, &mut index, person, spacing * (slot as f32 + 1.0), y);
            }
        }

        for (level, row) in below.iter().enumerate() {
            let y = center_y + (level as f32 + 1.0) * config.level_gap;
            let spacing = config.min_spacing.max(width / (row.len() as f32 + 1.0));
            for (slot, person) in row.iter().enumerate() {
                place(&mut nodes, &mut index, person, spacing * (slot as f32 + 1.0), y);
            }
        }

        let mut links = Vec::new();
        for node in &nodes {
            for parent_id in [node.person.mother(), node.person.father()]
                .into_iter()
                .flatten()
            {
                let Some(&slot) = index.get(parent_id) else {
                    continue;
                };
                let parent = &nodes[slot];
                links.push(Link {
                    from: Point { x: parent.x, y: parent.y },
                    to: Point { x: node.x, y: node.y },
                    parent_id: parent_id.to_string(),
                    child_id: node.person.person_id.clone(),
                });
            }
        }

        Self { nodes, links, width, height }
    }

    pub fn node(&self, person_id: &str) -> Option<&PlacedNode> {
        self.nodes.iter().find(|node| node.person.person_id == person_id)
    }
}

fn place(
    nodes: &mut Vec<PlacedNode>,
    index: &mut HashMap<String, usize>,
    person: &Person,
    x: f32,
    y: f32,
) {
    match index.get(&person.person_id) {
        Some(&slot) => {
            nodes[slot].x = x;
            nodes[slot].y = y;
        }
        None => {
            index.insert(person.person_id.clone(), nodes.len());
            nodes.push(PlacedNode { person: person.clone(), x, y });
        }
    }
}

/// Rows of ancestors, nearest generation first. Each person expands to
/// mother then father; anyone already seen, including the root, is not
/// placed again.
fn ancestor_levels<'a>(
    root: &'a Person,
    people: &'a [Person],
    max_levels: usize,
) -> Vec<Vec<&'a Person>> {
    let mut levels = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(&root.person_id);
    let mut current: Vec<&Person> = vec![root];

    for _ in 0..max_levels {
        let mut next: Vec<&Person> = Vec::new();
        for person in &current {
            for parent_id in [person.mother(), person.father()].into_iter().flatten() {
                let Some(parent) = person_by_id(parent_id, people) else {
                    continue;
                };
                if visited.insert(&parent.person_id) {
                    next.push(parent);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        levels.push(next.clone());
        current = next;
    }
    levels
}

/// Rows of descendants, nearest generation first. For each frontier id
/// the whole collection is scanned in order, so children keep their
/// collection order within a row.
fn descendant_levels<'a>(
    root_id: &str,
    people: &'a [Person],
    max_levels: usize,
) -> Vec<Vec<&'a Person>> {
    let mut levels: Vec<Vec<&'a Person>> = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(root_id.to_string());
    let mut frontier: Vec<String> = vec![root_id.to_string()];

    for _ in 0..max_levels {
        let mut next: Vec<&Person> = Vec::new();
        for id in &frontier {
            for person in people {
                if visited.contains(person.person_id.as_str()) {
                    continue;
                }
                if person.mother() == Some(id.as_str()) || person.father() == Some(id.as_str()) {
                    visited.insert(person.person_id.clone());
                    next.push(person);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next.iter().map(|person| person.person_id.clone()).collect();
        levels.push(next);
    }
    levels
}
