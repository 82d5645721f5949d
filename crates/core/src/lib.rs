pub mod agent;
pub mod command;
pub mod dialogue_client;
pub mod error;
pub mod math;
pub mod navigation;
pub mod npc;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod transcript;
pub mod world;

pub use agent::{Agent, AgentSettings, Animator, CommandSink, Effect, Intent};
pub use command::{Command, CommandKind, FunctionCall, FunctionDefinition};
pub use error::{CommandError, RegistryError, SessionError, TransportError};
pub use math::Vec3;
pub use navigation::{NavMesh, NavMeshAgent, Navigator, WalkableArea};
pub use npc::Npc;
pub use registry::{FunctionRegistry, RegistryConfig};
pub use session::{DialogueSession, Persona};
pub use world::{ObjectRef, Scene, World, WorldObject};
