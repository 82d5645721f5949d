//! The fixed command vocabulary and its two input forms: structured function
//! calls from the dialogue service and whitespace-separated manual text.

use crate::error::CommandError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// A function call as delivered by the dialogue service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// A function advertised to the dialogue service when a session is spawned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    /// JSON-schema object describing the arguments.
    pub parameters: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgKind {
    Number,
    Text,
}

struct ArgSpec {
    name: &'static str,
    kind: ArgKind,
    required: bool,
    description: &'static str,
}

const MOVE_TO_ARGS: &[ArgSpec] = &[
    ArgSpec {
        name: "x",
        kind: ArgKind::Number,
        required: true,
        description: "World X coordinate of the destination",
    },
    ArgSpec {
        name: "z",
        kind: ArgKind::Number,
        required: true,
        description: "World Z coordinate of the destination",
    },
    ArgSpec {
        name: "y",
        kind: ArgKind::Number,
        required: false,
        description: "Elevation of the destination; defaults to the NPC's own",
    },
];

const MOVE_ARGS: &[ArgSpec] = &[ArgSpec {
    name: "distance",
    kind: ArgKind::Number,
    required: false,
    description: "How far to walk forward; defaults to 5 units",
}];

const ATTACK_ARGS: &[ArgSpec] = &[ArgSpec {
    name: "targetName",
    kind: ArgKind::Text,
    required: false,
    description: "Name of the object to attack; defaults to the nearest enemy",
}];

const FLAME_ARGS: &[ArgSpec] = &[ArgSpec {
    name: "radius",
    kind: ArgKind::Number,
    required: false,
    description: "Radius of the flame burst; defaults to 5 units",
}];

/// The behaviours an agent understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    MoveTo,
    Move,
    Stop,
    AttackTarget,
    TakeCover,
    Flame,
}

impl CommandKind {
    pub const ALL: [CommandKind; 6] = [
        CommandKind::MoveTo,
        CommandKind::Move,
        CommandKind::Stop,
        CommandKind::AttackTarget,
        CommandKind::TakeCover,
        CommandKind::Flame,
    ];

    /// Wire name used by both function calls and manual input.
    pub fn name(self) -> &'static str {
        match self {
            CommandKind::MoveTo => "move_to",
            CommandKind::Move => "move",
            CommandKind::Stop => "stop",
            CommandKind::AttackTarget => "attack_target",
            CommandKind::TakeCover => "take_cover",
            CommandKind::Flame => "flame",
        }
    }

    fn description(self) -> &'static str {
        match self {
            CommandKind::MoveTo => "Walk to a point in the world",
            CommandKind::Move => "Walk forward in the direction the NPC is facing",
            CommandKind::Stop => "Stop moving",
            CommandKind::AttackTarget => "Turn toward a target and attack it",
            CommandKind::TakeCover => "Run to the nearest cover",
            CommandKind::Flame => "Cast a burst of flame around the NPC",
        }
    }

    /// Arguments in manual-input positional order.
    fn args(self) -> &'static [ArgSpec] {
        match self {
            CommandKind::MoveTo => MOVE_TO_ARGS,
            CommandKind::Move => MOVE_ARGS,
            CommandKind::AttackTarget => ATTACK_ARGS,
            CommandKind::Flame => FLAME_ARGS,
            CommandKind::Stop | CommandKind::TakeCover => &[],
        }
    }

    pub fn definition(self) -> FunctionDefinition {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for arg in self.args() {
            let ty = match arg.kind {
                ArgKind::Number => "number",
                ArgKind::Text => "string",
            };
            properties.insert(
                arg.name.to_string(),
                json!({ "type": ty, "description": arg.description }),
            );
            if arg.required {
                required.push(arg.name);
            }
        }
        FunctionDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommandKind {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_lowercase();
        CommandKind::ALL
            .into_iter()
            .find(|kind| kind.name() == lowered)
            .ok_or_else(|| CommandError::UnknownCommand(s.to_string()))
    }
}

/// A typed argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Number(f32),
    Text(String),
}

/// Argument key to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandArgs(HashMap<String, ArgValue>);

impl CommandArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ArgValue) {
        self.0.insert(key.into(), value);
    }

    pub fn with(mut self, key: impl Into<String>, value: ArgValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Numeric argument. Must be finite; text is accepted when it parses.
    pub fn number(&self, key: &str) -> Result<Option<f32>, CommandError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(ArgValue::Number(n)) if n.is_finite() => Ok(Some(*n)),
            Some(ArgValue::Number(n)) => Err(CommandError::InvalidArgument {
                argument: key.to_string(),
                value: n.to_string(),
            }),
            Some(ArgValue::Text(t)) => match t.trim().parse::<f32>() {
                Ok(n) if n.is_finite() => Ok(Some(n)),
                _ => Err(CommandError::InvalidArgument {
                    argument: key.to_string(),
                    value: t.clone(),
                }),
            },
        }
    }

    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            ArgValue::Number(n) => Some(n.to_string()),
            ArgValue::Text(t) => Some(t.clone()),
        }
    }

    /// Converts function-call arguments. Accepts a JSON object, `null`, or a
    /// string holding an encoded JSON object.
    pub fn from_json(value: &Value) -> Result<Self, CommandError> {
        let object = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(object) => object,
            Value::String(encoded) => {
                let decoded: Value =
                    serde_json::from_str(encoded).map_err(|_| CommandError::InvalidArgument {
                        argument: "arguments".to_string(),
                        value: encoded.clone(),
                    })?;
                return match decoded {
                    Value::Object(_) | Value::Null => Self::from_json(&decoded),
                    other => Err(CommandError::InvalidArgument {
                        argument: "arguments".to_string(),
                        value: other.to_string(),
                    }),
                };
            }
            other => {
                return Err(CommandError::InvalidArgument {
                    argument: "arguments".to_string(),
                    value: other.to_string(),
                });
            }
        };

        let mut args = Self::default();
        for (key, value) in object {
            let converted = match value {
                Value::Null => continue,
                Value::Number(n) => match n.as_f64().map(|n| n as f32) {
                    Some(n) if n.is_finite() => ArgValue::Number(n),
                    _ => {
                        return Err(CommandError::InvalidArgument {
                            argument: key.clone(),
                            value: n.to_string(),
                        });
                    }
                },
                Value::String(s) => ArgValue::Text(s.clone()),
                Value::Bool(b) => ArgValue::Text(b.to_string()),
                other => {
                    return Err(CommandError::InvalidArgument {
                        argument: key.clone(),
                        value: other.to_string(),
                    });
                }
            };
            args.insert(key.clone(), converted);
        }
        Ok(args)
    }
}

/// One invocation of a behaviour. Built per call and then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    pub args: CommandArgs,
}

impl Command {
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            args: CommandArgs::default(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: ArgValue) -> Self {
        self.args.insert(key, value);
        self
    }

    /// Parses manual text such as `move_to 3.5 -1.2`.
    ///
    /// The first token names the command (case-insensitive). The rest map
    /// positionally onto the command's arguments, and extra tokens are ignored.
    /// One bad number rejects the whole command.
    pub fn parse(input: &str) -> Result<Self, CommandError> {
        let mut tokens = input.split_whitespace();
        let name = tokens
            .next()
            .ok_or_else(|| CommandError::UnknownCommand(String::new()))?;
        let kind: CommandKind = name.parse()?;

        let mut args = CommandArgs::default();
        for (spec, token) in kind.args().iter().zip(tokens) {
            let value = match spec.kind {
                ArgKind::Number => ArgValue::Number(parse_number(spec.name, token)?),
                ArgKind::Text => ArgValue::Text(token.to_string()),
            };
            args.insert(spec.name, value);
        }
        Ok(Self { kind, args })
    }

    pub fn from_call(call: &FunctionCall) -> Result<Self, CommandError> {
        Ok(Self {
            kind: call.name.parse()?,
            args: CommandArgs::from_json(&call.arguments)?,
        })
    }
}

fn parse_number(argument: &str, token: &str) -> Result<f32, CommandError> {
    match token.parse::<f32>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(CommandError::ParseError {
            argument: argument.to_string(),
            token: token.to_string(),
        }),
    }
}

/// Definitions for the whole vocabulary, in a fixed order.
pub fn vocabulary() -> Vec<FunctionDefinition> {
    CommandKind::ALL.into_iter().map(CommandKind::definition).collect()
}
