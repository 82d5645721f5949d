//! NPC Behaviour State Machine
//!
//! This module owns an agent's current [`Intent`] and executes one
//! [`Command`] at a time against the navigation adapter and the animation
//! surface. Every command is legal from every state; a successful command
//! replaces whatever intent was active, and a failed one leaves it untouched.

use crate::command::{Command, CommandKind, FunctionCall, FunctionDefinition};
use crate::error::CommandError;
use crate::math::Vec3;
use crate::navigation::{Navigator, SNAP_RADIUS};
use crate::resolver;
use crate::world::{ObjectRef, World};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// The single behaviour an agent is engaged in.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Idle,
    /// Walking to a snapped point. The navigator holds it as destination.
    MovingTo(Vec3),
    /// Engaging a target. The navigator holds no destination.
    Attacking(ObjectRef),
    /// Walking to a stand-off point next to cover.
    TakingCover(Vec3),
}

impl Intent {
    pub fn is_moving(&self) -> bool {
        matches!(self, Intent::MovingTo(_) | Intent::TakingCover(_))
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Idle => f.write_str("idle"),
            Intent::MovingTo(p) => write!(f, "moving to {}", p),
            Intent::Attacking(target) => write!(f, "attacking {}", target.name),
            Intent::TakingCover(p) => write!(f, "taking cover at {}", p),
        }
    }
}

/// A one-shot visual effect for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Flame { radius: f32 },
}

/// Animation trigger surface driven by the state machine.
pub trait Animator: Send {
    /// Locomotion flag (walking on/off).
    fn set_locomotion(&mut self, moving: bool);

    fn trigger_attack(&mut self);

    fn play_effect(&mut self, effect: Effect);
}

/// Anything that accepts typed text as a command attempt.
pub trait CommandSink {
    fn process_command(&mut self, input: &str) -> Result<(), CommandError>;

    /// Short description of the current state, sent along with chat messages.
    fn describe_state(&self) -> Option<String> {
        None
    }
}

/// Tuning for command execution.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSettings {
    pub snap_radius: f32,
    pub default_move_distance: f32,
    pub default_flame_radius: f32,
    /// How far short of a cover object the agent stops.
    pub cover_offset: f32,
    pub enemy_tag: String,
    pub cover_tag: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            snap_radius: SNAP_RADIUS,
            default_move_distance: 5.0,
            default_flame_radius: 5.0,
            cover_offset: 1.5,
            enemy_tag: "enemy".to_string(),
            cover_tag: "cover".to_string(),
        }
    }
}

/// An NPC body plus the command dispatcher that drives it.
pub struct Agent<N: Navigator, A: Animator> {
    id: Uuid,
    name: String,
    navigator: N,
    animator: A,
    world: Arc<dyn World>,
    settings: AgentSettings,
    intent: Intent,
}

impl<N: Navigator, A: Animator> Agent<N, A> {
    pub fn new(
        name: impl Into<String>,
        navigator: N,
        animator: A,
        world: Arc<dyn World>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            navigator,
            animator,
            world,
            settings,
            intent: Intent::Idle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn intent(&self) -> &Intent {
        &self.intent
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    pub fn animator(&self) -> &A {
        &self.animator
    }

    /// The command vocabulary this agent advertises.
    pub fn vocabulary(&self) -> Vec<FunctionDefinition> {
        crate::command::vocabulary()
    }

    /// Entry point for structured calls delivered by the function registry.
    #[instrument(skip_all, fields(npc = %self.name, function = %call.name))]
    pub fn handle_function_call(&mut self, call: &FunctionCall) -> Result<(), CommandError> {
        info!(arguments = %call.arguments, "Received function call");
        let command = Command::from_call(call).inspect_err(|e| {
            warn!(error = %e, "Function call rejected");
        })?;
        self.execute(command)
    }

    /// Executes a command, logging and returning the failure if it is dropped.
    pub fn execute(&mut self, command: Command) -> Result<(), CommandError> {
        let kind = command.kind;
        let result = match kind {
            CommandKind::MoveTo => self.move_to(&command),
            CommandKind::Move => self.move_forward(&command),
            CommandKind::Stop => {
                self.stop();
                Ok(())
            }
            CommandKind::AttackTarget => self.attack_target(&command),
            CommandKind::TakeCover => self.take_cover(),
            CommandKind::Flame => self.flame(&command),
        };
        match &result {
            Ok(()) => debug!(npc = %self.name, command = %kind, intent = %self.intent, "Command executed"),
            Err(e) => warn!(npc = %self.name, command = %kind, error = %e, "Command dropped"),
        }
        result
    }

    /// Per-step update: advances steering and settles arrival.
    pub fn tick(&mut self, dt: f32) {
        self.navigator.advance(dt);
        if self.intent.is_moving() && self.navigator.has_arrived() {
            info!(npc = %self.name, position = %self.navigator.position(), "Arrived");
            self.intent = Intent::Idle;
            self.animator.set_locomotion(false);
        }
    }

    fn ensure_on_navmesh(&self) -> Result<(), CommandError> {
        if self.navigator.is_on_navmesh() {
            Ok(())
        } else {
            Err(CommandError::NotOnNavigableSurface(self.navigator.position()))
        }
    }

    fn snap(&self, point: Vec3) -> Result<Vec3, CommandError> {
        self.navigator
            .try_snap(point, self.settings.snap_radius)
            .ok_or(CommandError::NotOnNavigableSurface(point))
    }

    /// Commits a walk to an already snapped point.
    fn walk_to(&mut self, point: Vec3, intent: Intent) {
        self.navigator.set_destination(point);
        self.animator.set_locomotion(true);
        self.intent = intent;
    }

    fn move_to(&mut self, command: &Command) -> Result<(), CommandError> {
        self.ensure_on_navmesh()?;
        let x = command.args.number("x")?.ok_or(CommandError::MissingArgument("x"))?;
        let z = command.args.number("z")?.ok_or(CommandError::MissingArgument("z"))?;
        let y = command
            .args
            .number("y")?
            .unwrap_or_else(|| self.navigator.position().y);

        let point = self.snap(Vec3::new(x, y, z))?;
        self.walk_to(point, Intent::MovingTo(point));
        info!(npc = %self.name, destination = %point, "Moving");
        Ok(())
    }

    fn move_forward(&mut self, command: &Command) -> Result<(), CommandError> {
        self.ensure_on_navmesh()?;
        let distance = command
            .args
            .number("distance")?
            .unwrap_or(self.settings.default_move_distance);
        let target = self.navigator.position() + self.navigator.forward() * distance;

        let point = self.snap(target)?;
        self.walk_to(point, Intent::MovingTo(point));
        info!(npc = %self.name, distance, destination = %point, "Moving forward");
        Ok(())
    }

    fn stop(&mut self) {
        self.navigator.reset_destination();
        self.animator.set_locomotion(false);
        self.intent = Intent::Idle;
        info!(npc = %self.name, "Stopped");
    }

    fn attack_target(&mut self, command: &Command) -> Result<(), CommandError> {
        self.ensure_on_navmesh()?;
        let name = command.args.text("targetName");
        let target = resolver::resolve(
            self.world.as_ref(),
            self.navigator.position(),
            name.as_deref(),
            &self.settings.enemy_tag,
        )
        .ok_or_else(|| CommandError::TargetNotFound {
            tag: self.settings.enemy_tag.clone(),
        })?;

        self.navigator.reset_destination();
        self.navigator.look_at(target.position);
        self.animator.set_locomotion(false);
        self.animator.trigger_attack();
        info!(npc = %self.name, target = %target.name, "Attacking");
        self.intent = Intent::Attacking(target);
        Ok(())
    }

    fn take_cover(&mut self) -> Result<(), CommandError> {
        self.ensure_on_navmesh()?;
        let origin = self.navigator.position();
        let cover = resolver::nearest(origin, self.world.find_with_tag(&self.settings.cover_tag));

        let destination = match cover {
            Some(cover) => {
                let dir = (cover.position - origin).normalized();
                cover.position - dir * self.settings.cover_offset
            }
            None => {
                // No cover in the scene: hold position.
                let e = CommandError::TargetNotFound {
                    tag: self.settings.cover_tag.clone(),
                };
                warn!(npc = %self.name, error = %e, "Taking cover in place");
                origin
            }
        };

        let point = self.snap(destination)?;
        self.walk_to(point, Intent::TakingCover(point));
        info!(npc = %self.name, destination = %point, "Taking cover");
        Ok(())
    }

    fn flame(&mut self, command: &Command) -> Result<(), CommandError> {
        let radius = command
            .args
            .number("radius")?
            .unwrap_or(self.settings.default_flame_radius);
        self.animator.play_effect(Effect::Flame { radius });
        info!(npc = %self.name, radius, "Casting flame");
        Ok(())
    }
}

impl<N: Navigator, A: Animator> CommandSink for Agent<N, A> {
    /// Manual input path. Blank input is ignored.
    fn process_command(&mut self, input: &str) -> Result<(), CommandError> {
        if input.trim().is_empty() {
            return Ok(());
        }
        info!(npc = %self.name, input, "Received manual input");
        let command = Command::parse(input).inspect_err(|e| {
            warn!(npc = %self.name, error = %e, "Manual input rejected");
        })?;
        self.execute(command)
    }

    fn describe_state(&self) -> Option<String> {
        Some(format!("{} is {}", self.name, self.intent))
    }
}
