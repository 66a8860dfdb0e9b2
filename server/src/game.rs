use log::info;
use shared::{
    Command, PlayerMarker, ProjectileKind, ProjectileMarker, Snapshot, Vector2, ARENA_HEIGHT,
    ARENA_WIDTH, HIT_RADIUS, PLAYER_SPEED, PROJECTILE_SPEED,
};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::mpsc::UnboundedSender;

/// Display characters cycled over connecting players; the numeric label
/// keeps snapshot entries distinct once the cycle wraps.
const PLAYER_GLYPHS: [char; 8] = ['@', '#', '&', '%', '$', '+', '=', '?'];

fn glyph_for(id: u32) -> char {
    PLAYER_GLYPHS[(id as usize - 1) % PLAYER_GLYPHS.len()]
}

/// A connected player and the write side of its connection.
#[derive(Debug)]
pub struct Player {
    pub id: u32,
    pub glyph: char,
    pub position: Vector2,
    pub velocity: Vector2,
    /// Most recent non-zero movement vector; newly fired projectiles
    /// travel along it.
    pub last_direction: Vector2,
    /// Snapshot lines queued here are written out by the player's
    /// connection task.
    pub outbound: UnboundedSender<String>,
}

/// A projectile in flight. `owner` is an identity, not a reference: it
/// only suppresses collisions with the firing player and their other
/// shots, and may refer to a player that has already disconnected.
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: u64,
    pub kind: ProjectileKind,
    pub position: Vector2,
    pub velocity: Vector2,
    pub owner: u32,
}

/// Authoritative store of everything in the arena.
///
/// The server wraps the world in a single lock; every method here assumes
/// the guard is held. Players and projectiles carry ids assigned once and
/// never reused within a run, so removal never depends on list positions.
pub struct World {
    players: BTreeMap<u32, Player>,
    projectiles: Vec<Projectile>,
    next_player_id: u32,
    next_projectile_id: u64,
}

impl World {
    pub fn new() -> Self {
        Self {
            players: BTreeMap::new(),
            projectiles: Vec::new(),
            next_player_id: 1,
            next_projectile_id: 1,
        }
    }

    /// Registers a new player at the origin and returns its id.
    pub fn add_player(&mut self, outbound: UnboundedSender<String>) -> u32 {
        let id = self.next_player_id;
        self.next_player_id += 1;

        let player = Player {
            id,
            glyph: glyph_for(id),
            position: Vector2::default(),
            velocity: Vector2::default(),
            last_direction: Vector2::default(),
            outbound,
        };

        info!("Added player {}", id);
        self.players.insert(id, player);
        id
    }

    /// Removes a player. Returns false if they were already gone, which is
    /// normal when a disconnect races an elimination.
    pub fn remove_player(&mut self, id: u32) -> bool {
        if self.players.remove(&id).is_some() {
            info!("Removed player {}", id);
            true
        } else {
            false
        }
    }

    /// Appends a projectile to the live list and returns its id.
    pub fn add_projectile(
        &mut self,
        kind: ProjectileKind,
        position: Vector2,
        velocity: Vector2,
        owner: u32,
    ) -> u64 {
        let id = self.next_projectile_id;
        self.next_projectile_id += 1;
        self.projectiles.push(Projectile {
            id,
            kind,
            position,
            velocity,
            owner,
        });
        id
    }

    pub fn player(&self, id: u32) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn projectile_count(&self) -> usize {
        self.projectiles.len()
    }

    /// Applies one parsed client command. Movement replaces the velocity
    /// outright; a non-zero vector also becomes the stored direction for
    /// later shots. A shoot spawns at the player's current position and
    /// flies along the stored direction, whatever the command's own
    /// velocity fields said.
    pub fn apply_command(&mut self, id: u32, command: Command) {
        match command {
            Command::Move(velocity) => {
                if let Some(player) = self.players.get_mut(&id) {
                    player.velocity = velocity;
                    if !velocity.is_zero() {
                        player.last_direction = velocity;
                    }
                }
            }
            Command::Shoot(kind) => {
                if let Some(player) = self.players.get(&id) {
                    let position = player.position;
                    let velocity = player.last_direction;
                    self.add_projectile(kind, position, velocity, id);
                }
            }
        }
    }

    /// Advances the world by one step: integrate positions, drop
    /// projectiles that left the arena, then resolve collisions. Returns
    /// the ids of players eliminated during the step.
    pub fn advance(&mut self, dt: f32) -> Vec<u32> {
        for player in self.players.values_mut() {
            player.position = player.position.add(&player.velocity.scale(PLAYER_SPEED * dt));
            player.position.x = player.position.x.clamp(0.0, ARENA_WIDTH);
            player.position.y = player.position.y.clamp(0.0, ARENA_HEIGHT);
        }

        for projectile in &mut self.projectiles {
            projectile.position = projectile
                .position
                .add(&projectile.velocity.scale(PROJECTILE_SPEED * dt));
        }

        // Out-of-bounds projectiles are deleted, not clamped.
        self.projectiles.retain(|p| {
            (0.0..=ARENA_WIDTH).contains(&p.position.x)
                && (0.0..=ARENA_HEIGHT).contains(&p.position.y)
        });

        self.resolve_collisions()
    }

    /// One collision pass over the current projectile list, in insertion
    /// order. A projectile or player removed earlier in the pass is out of
    /// play for the rest of the tick.
    fn resolve_collisions(&mut self) -> Vec<u32> {
        let mut spent: HashSet<u64> = HashSet::new();
        let mut eliminated: Vec<u32> = Vec::new();

        for i in 0..self.projectiles.len() {
            let (projectile_id, owner, position) = {
                let p = &self.projectiles[i];
                (p.id, p.owner, p.position)
            };
            if spent.contains(&projectile_id) {
                continue;
            }

            // The first player struck, in id order, loses; the projectile
            // is spent either way.
            let hit = self
                .players
                .values()
                .filter(|p| p.id != owner && !eliminated.contains(&p.id))
                .find(|p| p.position.distance(&position) < HIT_RADIUS)
                .map(|p| p.id);
            if let Some(player_id) = hit {
                eliminated.push(player_id);
                spent.insert(projectile_id);
                continue;
            }

            for j in (i + 1)..self.projectiles.len() {
                let other = &self.projectiles[j];
                if spent.contains(&other.id)
                    || other.owner == owner
                    || other.position.distance(&position) >= HIT_RADIUS
                {
                    continue;
                }

                let kind = self.projectiles[i].kind;
                if kind.beats(other.kind) {
                    // The winner passes through and keeps flying.
                    spent.insert(other.id);
                } else if other.kind.beats(kind) {
                    spent.insert(projectile_id);
                    break;
                } else {
                    // Same kind: both are destroyed.
                    spent.insert(projectile_id);
                    spent.insert(other.id);
                    break;
                }
            }
        }

        for id in &eliminated {
            self.players.remove(id);
            info!("Player {} was eliminated", id);
        }
        self.projectiles.retain(|p| !spent.contains(&p.id));

        eliminated
    }

    /// Builds the broadcast snapshot for the current state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            players: self
                .players
                .values()
                .map(|p| PlayerMarker {
                    glyph: p.glyph,
                    label: p.id,
                    x: p.position.x,
                    y: p.position.y,
                })
                .collect(),
            projectiles: self
                .projectiles
                .iter()
                .map(|p| ProjectileMarker {
                    glyph: p.kind.glyph(),
                    x: p.position.x,
                    y: p.position.y,
                })
                .collect(),
        }
    }

    /// Clones each live outbound channel so the caller can fan a snapshot
    /// line out without holding the world lock.
    pub fn outbound_channels(&self) -> Vec<(u32, UnboundedSender<String>)> {
        self.players
            .values()
            .map(|p| (p.id, p.outbound.clone()))
            .collect()
    }
}
