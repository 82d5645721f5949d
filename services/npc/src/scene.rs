//! Scene loading.
//!
//! A scene file is JSON describing where the NPC starts, which rectangles are
//! walkable, and which tagged objects exist. Without one, a built-in demo
//! scene is used.

use anyhow::{Context, Result, bail};
use npc_core::{
    AgentSettings, NavMesh, NavMeshAgent, Navigator, Scene, Vec3, WalkableArea, WorldObject,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

fn default_forward() -> Vec3 {
    Vec3::FORWARD
}

fn default_speed() -> f32 {
    3.5
}

fn default_stopping_distance() -> f32 {
    0.1
}

fn default_enemy_tag() -> String {
    AgentSettings::default().enemy_tag
}

fn default_cover_tag() -> String {
    AgentSettings::default().cover_tag
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcPlacement {
    pub position: Vec3,
    #[serde(default = "default_forward")]
    pub forward: Vec3,
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default = "default_stopping_distance")]
    pub stopping_distance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneFile {
    pub npc: NpcPlacement,
    pub walkable: Vec<WalkableArea>,
    #[serde(default)]
    pub objects: Vec<WorldObject>,
    #[serde(default = "default_enemy_tag")]
    pub enemy_tag: String,
    #[serde(default = "default_cover_tag")]
    pub cover_tag: String,
}

/// Everything the binary needs to construct an agent.
pub struct BuiltScene {
    pub world: Arc<Scene>,
    pub navigator: NavMeshAgent,
    pub settings: AgentSettings,
}

impl SceneFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse scene file {}", path.display()))
    }

    /// A 40x40 floor with one enemy and one crate to hide behind.
    pub fn demo() -> Self {
        Self {
            npc: NpcPlacement {
                position: Vec3::ZERO,
                forward: Vec3::FORWARD,
                speed: default_speed(),
                stopping_distance: default_stopping_distance(),
            },
            walkable: vec![WalkableArea::new((-20.0, -20.0), (20.0, 20.0), 0.0)],
            objects: vec![
                WorldObject::new("Raider", Vec3::new(10.0, 0.0, 0.0)).tagged("enemy"),
                WorldObject::new("Crate", Vec3::new(-4.0, 0.0, 6.0)).tagged("cover"),
                WorldObject::new("GoldPile", Vec3::new(15.0, 0.0, 15.0)),
            ],
            enemy_tag: default_enemy_tag(),
            cover_tag: default_cover_tag(),
        }
    }

    pub fn build(self) -> Result<BuiltScene> {
        if self.walkable.is_empty() {
            bail!("Scene has no walkable areas");
        }
        let mesh = Arc::new(NavMesh::new(self.walkable));
        let navigator = NavMeshAgent::new(mesh, self.npc.position)
            .with_forward(self.npc.forward)
            .with_speed(self.npc.speed)
            .with_stopping_distance(self.npc.stopping_distance);
        if !navigator.is_on_navmesh() {
            warn!(position = %self.npc.position, "NPC starts off the walkable surface; movement commands will be dropped");
        }

        let settings = AgentSettings {
            enemy_tag: self.enemy_tag,
            cover_tag: self.cover_tag,
            ..AgentSettings::default()
        };
        Ok(BuiltScene {
            world: Arc::new(Scene::new(self.objects)),
            navigator,
            settings,
        })
    }
}
