use std::fmt;
use std::str::FromStr;

pub const ARENA_WIDTH: f32 = 80.0;
pub const ARENA_HEIGHT: f32 = 60.0;
pub const PLAYER_SPEED: f32 = 20.0;
pub const PROJECTILE_SPEED: f32 = 40.0;
pub const HIT_RADIUS: f32 = 1.0;

///Represents a vector in 2D space.
#[derive(Debug, Clone, Copy, Default)]
pub struct Vector2 {
    ///Value along the x-axis.
    /// Positive direction is to the right.
    pub x: f32,
    ///Value along the y-axis.
    /// Positive direction is down, matching the client's character grid.
    pub y: f32,
}

impl Vector2 {
    pub fn new(x: f32, y: f32) -> Vector2 {
        Vector2 { x, y }
    }

    ///Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vector2 {
        Vector2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    ///Returns the sum of two vectors.
    pub fn add(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    ///Returns the distance between two points.
    pub fn distance(&self, other: &Vector2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

/// The three projectile kinds. Dominance is cyclic: Rock beats Scissors,
/// Scissors beats Paper, Paper beats Rock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileKind {
    Rock,
    Paper,
    Scissors,
}

impl ProjectileKind {
    /// Returns true if this kind destroys `other` on contact.
    pub fn beats(&self, other: ProjectileKind) -> bool {
        matches!(
            (self, other),
            (ProjectileKind::Rock, ProjectileKind::Scissors)
                | (ProjectileKind::Scissors, ProjectileKind::Paper)
                | (ProjectileKind::Paper, ProjectileKind::Rock)
        )
    }

    /// One-character marker used for this kind in the snapshot line.
    pub fn glyph(&self) -> char {
        match self {
            ProjectileKind::Rock => 'R',
            ProjectileKind::Paper => 'P',
            ProjectileKind::Scissors => 'S',
        }
    }
}

impl FromStr for ProjectileKind {
    type Err = ();

    // The wire spelling is exact and case-sensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Rock" => Ok(ProjectileKind::Rock),
            "Paper" => Ok(ProjectileKind::Paper),
            "Scissors" => Ok(ProjectileKind::Scissors),
            _ => Err(()),
        }
    }
}

/// A single client command as it appears on the wire.
///
/// The shoot grammar carries two velocity fields, but the launch direction
/// of a projectile is the player's last movement vector; the fields are
/// validated and then ignored.
#[derive(Debug, Clone, Copy)]
pub enum Command {
    Move(Vector2),
    Shoot(ProjectileKind),
}

impl Command {
    /// Parses one whitespace-delimited token. Unknown prefixes and
    /// malformed numeric fields yield None and are dropped by the caller.
    pub fn parse(token: &str) -> Option<Command> {
        if let Some(rest) = token.strip_prefix("move:") {
            let (x, y) = rest.split_once(',')?;
            let x: f32 = x.parse().ok()?;
            let y: f32 = y.parse().ok()?;
            Some(Command::Move(Vector2::new(x, y)))
        } else if let Some(rest) = token.strip_prefix("shoot:") {
            let mut fields = rest.splitn(3, ',');
            let kind: ProjectileKind = fields.next()?.parse().ok()?;
            let _vx: f32 = fields.next()?.parse().ok()?;
            let _vy: f32 = fields.next()?.parse().ok()?;
            Some(Command::Shoot(kind))
        } else {
            None
        }
    }

    /// Splits a received line into commands, one per whitespace-separated
    /// token, silently dropping anything unrecognized.
    pub fn parse_line(line: &str) -> Vec<Command> {
        line.split_whitespace().filter_map(Command::parse).collect()
    }
}

/// One player entry in a snapshot line.
#[derive(Debug, Clone)]
pub struct PlayerMarker {
    pub glyph: char,
    pub label: u32,
    pub x: f32,
    pub y: f32,
}

/// One projectile entry in a snapshot line.
#[derive(Debug, Clone)]
pub struct ProjectileMarker {
    pub glyph: char,
    pub x: f32,
    pub y: f32,
}

/// A full world snapshot as carried by one wire line:
/// `<glyph><label>,<x>,<y>;` per player, a `|` separator, then
/// `<glyph>,<x>,<y>;` per projectile. An empty world is just `|`.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub players: Vec<PlayerMarker>,
    pub projectiles: Vec<ProjectileMarker>,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for player in &self.players {
            write!(f, "{}{},{},{};", player.glyph, player.label, player.x, player.y)?;
        }
        write!(f, "|")?;
        for projectile in &self.projectiles {
            write!(f, "{},{},{};", projectile.glyph, projectile.x, projectile.y)?;
        }
        Ok(())
    }
}

impl Snapshot {
    /// Parses a snapshot line back into markers. Returns None if the line
    /// does not follow the `<players>|<projectiles>` layout.
    pub fn parse(line: &str) -> Option<Snapshot> {
        let (players, projectiles) = line.split_once('|')?;
        let mut snapshot = Snapshot::default();

        for entry in players.split(';').filter(|e| !e.is_empty()) {
            snapshot.players.push(parse_player_entry(entry)?);
        }
        for entry in projectiles.split(';').filter(|e| !e.is_empty()) {
            snapshot.projectiles.push(parse_projectile_entry(entry)?);
        }

        Some(snapshot)
    }
}

fn parse_player_entry(entry: &str) -> Option<PlayerMarker> {
    let mut fields = entry.splitn(3, ',');
    let head = fields.next()?;
    let glyph = head.chars().next()?;
    let label: u32 = head[glyph.len_utf8()..].parse().ok()?;
    let x: f32 = fields.next()?.parse().ok()?;
    let y: f32 = fields.next()?.parse().ok()?;
    Some(PlayerMarker { glyph, label, x, y })
}

fn parse_projectile_entry(entry: &str) -> Option<ProjectileMarker> {
    let mut fields = entry.splitn(3, ',');
    let head = fields.next()?;
    let mut chars = head.chars();
    let glyph = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    let x: f32 = fields.next()?.parse().ok()?;
    let y: f32 = fields.next()?.parse().ok()?;
    Some(ProjectileMarker { glyph, x, y })
}
