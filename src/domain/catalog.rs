//! # Command Catalog
//!
//! Loads `bot.yaml` and validates every entry into a [`CommandSpec`].
//! Malformed entries are rejected here so that a live dispatch never sees them.

use crate::domain::config::ALWAYS_ALLOWED_COMMAND;
use crate::domain::error::ConfigError;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

pub const INPUT_PLACEHOLDER: &str = "{input}";
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

const DEFAULT_AI_MODEL: &str = "openai/gpt-oss-120b";
const DEFAULT_AI_MAX_TOKENS: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoKind {
    #[default]
    None,
    Text,
    Image,
}

impl IoKind {
    fn parse(name: &str, field: &str, value: Option<&str>) -> Result<Self, ConfigError> {
        match value.map(str::trim).unwrap_or("") {
            "" | "none" => Ok(Self::None),
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            other => Err(ConfigError::invalid(name, format!("unknown {field} '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Uwuify,
    Yap,
    Quote,
    KnockKnock,
}

impl Builtin {
    pub fn from_str(name: &str) -> Option<Self> {
        match name {
            "uwuify" => Some(Self::Uwuify),
            "yap" => Some(Self::Yap),
            "quote" => Some(Self::Quote),
            "knockknock" => Some(Self::KnockKnock),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uwuify => "uwuify",
            Self::Yap => "yap",
            Self::Quote => "quote",
            Self::KnockKnock => "knockknock",
        }
    }
}

/// A validated command definition.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandSpec {
    Static {
        response: String,
    },
    Http {
        method: String,
        url: String,
        headers: BTreeMap<String, String>,
        json_path: String,
        output: IoKind,
    },
    Exec {
        program: String,
        args: Vec<String>,
        input: IoKind,
        output: IoKind,
    },
    Ai {
        prompt: String,
        model: String,
        max_tokens: u32,
    },
    Builtin {
        builtin: Builtin,
        mention: bool,
    },
}

impl CommandSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Static { .. } => "static",
            Self::Http { .. } => "http",
            Self::Exec { .. } => "exec",
            Self::Ai { .. } => "ai",
            Self::Builtin { .. } => "builtin",
        }
    }
}

/// Entry as written in the catalog file.
#[derive(Debug, Default, Deserialize)]
struct RawCommand {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    json_path: Option<String>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    input_type: Option<String>,
    #[serde(default)]
    output_type: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    mention: bool,
}

#[derive(Debug, Default, Deserialize)]
struct RawCatalog {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    commands: HashMap<String, RawCommand>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl RawCommand {
    fn validate(self, name: &str) -> Result<CommandSpec, ConfigError> {
        let response = non_empty(self.response);
        let kind = non_empty(self.kind);

        match kind.as_deref() {
            None | Some("static") => {
                let response = response
                    .ok_or_else(|| ConfigError::invalid(name, "static command needs a response"))?;
                Ok(CommandSpec::Static { response })
            }
            // A literal response always wins over the declared backend.
            Some(_) if response.is_some() => Ok(CommandSpec::Static {
                response: response.unwrap_or_default(),
            }),
            Some("http") => {
                let url = non_empty(self.url)
                    .ok_or_else(|| ConfigError::invalid(name, "http command needs a url"))?;
                let json_path = self.json_path.unwrap_or_default();
                let output = IoKind::parse(name, "output_type", self.output_type.as_deref())?;
                if output == IoKind::Image && json_path.is_empty() {
                    return Err(ConfigError::invalid(
                        name,
                        "image output needs a json_path locating the image url",
                    ));
                }
                let method = non_empty(self.method)
                    .map(|m| m.to_uppercase())
                    .unwrap_or_else(|| "GET".to_string());
                Ok(CommandSpec::Http {
                    method,
                    url,
                    headers: self.headers,
                    json_path,
                    output,
                })
            }
            Some("exec") => {
                let program = non_empty(self.command)
                    .ok_or_else(|| ConfigError::invalid(name, "exec command needs a command"))?;
                let input = IoKind::parse(name, "input_type", self.input_type.as_deref())?;
                let output = IoKind::parse(name, "output_type", self.output_type.as_deref())?;
                let has = |p: &str| self.args.iter().any(|a| a.contains(p));
                if input == IoKind::Image && !has(INPUT_PLACEHOLDER) {
                    return Err(ConfigError::invalid(name, "image input needs an {input} argument"));
                }
                if output == IoKind::Image && !has(OUTPUT_PLACEHOLDER) {
                    return Err(ConfigError::invalid(name, "image output needs an {output} argument"));
                }
                Ok(CommandSpec::Exec {
                    program,
                    args: self.args,
                    input,
                    output,
                })
            }
            Some("ai") => {
                let prompt = non_empty(self.prompt)
                    .ok_or_else(|| ConfigError::invalid(name, "ai command needs a prompt"))?;
                Ok(CommandSpec::Ai {
                    prompt,
                    model: non_empty(self.model).unwrap_or_else(|| DEFAULT_AI_MODEL.to_string()),
                    max_tokens: self
                        .max_tokens
                        .filter(|t| *t > 0)
                        .unwrap_or(DEFAULT_AI_MAX_TOKENS),
                })
            }
            Some("builtin") => {
                let builtin_name = non_empty(self.command)
                    .ok_or_else(|| ConfigError::invalid(name, "builtin command needs a command"))?;
                let builtin = Builtin::from_str(&builtin_name).ok_or_else(|| {
                    ConfigError::invalid(name, format!("unknown builtin '{builtin_name}'"))
                })?;
                Ok(CommandSpec::Builtin {
                    builtin,
                    mention: self.mention,
                })
            }
            Some(other) => Err(ConfigError::invalid(name, format!("unknown type '{other}'"))),
        }
    }
}

/// The loaded, read-only set of commands.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    label: Option<String>,
    commands: HashMap<String, CommandSpec>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let raw: RawCatalog = serde_yaml::from_str(content)?;
        let mut commands = HashMap::with_capacity(raw.commands.len());
        for (name, entry) in raw.commands {
            let spec = entry.validate(&name)?;
            commands.insert(name, spec);
        }
        Ok(Self {
            label: non_empty(raw.label),
            commands,
        })
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn resolve(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.get(name)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Sorted command names; with a non-empty allow-list only those, plus the always-allowed one.
    pub fn list(&self, allowed: Option<&[String]>) -> Vec<String> {
        let mut names: Vec<String> = match allowed {
            Some(list) if !list.is_empty() => {
                let mut names = list.to_vec();
                if !names.iter().any(|n| n == ALWAYS_ALLOWED_COMMAND) {
                    names.push(ALWAYS_ALLOWED_COMMAND.to_string());
                }
                names
            }
            _ => self.commands.keys().cloned().collect(),
        };
        names.sort();
        names.dedup();
        names
    }

    pub fn help(&self, allowed: Option<&[String]>) -> String {
        crate::strings::messages::available_commands(&self.list(allowed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
label: "[BOT] "
commands:
  hi:
    response: "hello!"
  summary:
    type: http
    url: "https://example.com/api/summary"
    json_path: "summary"
  cat:
    type: http
    url: "https://example.com/cat"
    json_path: "0.url"
    output_type: image
  deepfry:
    type: exec
    command: magick
    args: ["{input}", "-implode", "0.5", "{output}"]
    input_type: image
    output_type: image
  gork:
    type: ai
    prompt: "be brief"
  yap:
    type: builtin
    command: yap
    mention: true
"#;

    #[test]
    fn test_load_sample_catalog() {
        let catalog = Catalog::from_yaml(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 6);
        assert_eq!(catalog.label(), Some("[BOT] "));
        assert_eq!(
            catalog.resolve("hi"),
            Some(&CommandSpec::Static {
                response: "hello!".to_string()
            })
        );
        match catalog.resolve("gork") {
            Some(CommandSpec::Ai { model, max_tokens, .. }) => {
                assert_eq!(model, DEFAULT_AI_MODEL);
                assert_eq!(*max_tokens, DEFAULT_AI_MAX_TOKENS);
            }
            other => panic!("unexpected spec: {other:?}"),
        }
        match catalog.resolve("summary") {
            Some(CommandSpec::Http { method, output, .. }) => {
                assert_eq!(method, "GET");
                assert_eq!(*output, IoKind::None);
            }
            other => panic!("unexpected spec: {other:?}"),
        }
        assert_eq!(
            catalog.resolve("yap"),
            Some(&CommandSpec::Builtin {
                builtin: Builtin::Yap,
                mention: true
            })
        );
        assert!(catalog.resolve("missing").is_none());
    }

    #[test]
    fn test_rejects_malformed_entries() {
        let cases = [
            "commands:\n  a:\n    type: http\n",
            "commands:\n  a:\n    type: http\n    url: x\n    output_type: image\n",
            "commands:\n  a:\n    type: exec\n    command: cat\n    args: [x]\n    input_type: image\n",
            "commands:\n  a:\n    type: exec\n    command: cat\n    output_type: image\n",
            "commands:\n  a:\n    type: exec\n",
            "commands:\n  a:\n    type: ai\n",
            "commands:\n  a:\n    type: builtin\n    command: nope\n",
            "commands:\n  a:\n    type: teleport\n",
            "commands:\n  a: {}\n",
            "commands:\n  a:\n    type: exec\n    command: cat\n    output_type: video\n",
        ];
        for case in cases {
            let err = Catalog::from_yaml(case).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidCommand { ref name, .. } if name == "a"),
                "case {case:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_placeholder_inside_argument() {
        let catalog = Catalog::from_yaml(
            "commands:\n  shrink:\n    type: exec\n    command: magick\n    args: [\"-i={input}\", \"-o={output}\"]\n    input_type: image\n    output_type: image\n",
        )
        .unwrap();
        match catalog.resolve("shrink") {
            Some(CommandSpec::Exec { args, input, output, .. }) => {
                assert_eq!(args, &["-i={input}".to_string(), "-o={output}".to_string()]);
                assert_eq!(*input, IoKind::Image);
                assert_eq!(*output, IoKind::Image);
            }
            other => panic!("unexpected spec: {other:?}"),
        }
    }

    #[test]
    fn test_response_overrides_type() {
        let catalog =
            Catalog::from_yaml("commands:\n  a:\n    type: http\n    response: fixed\n").unwrap();
        assert_eq!(
            catalog.resolve("a"),
            Some(&CommandSpec::Static {
                response: "fixed".to_string()
            })
        );
    }

    #[test]
    fn test_list_commands() {
        let catalog = Catalog::from_yaml(SAMPLE).unwrap();
        assert_eq!(
            catalog.list(None),
            vec!["cat", "deepfry", "gork", "hi", "summary", "yap"]
        );
        assert_eq!(catalog.list(Some(&[][..])), catalog.list(None));

        let allowed = vec!["yap".to_string(), "gork".to_string()];
        assert_eq!(catalog.list(Some(allowed.as_slice())), vec!["gork", "hi", "yap"]);
        assert_eq!(
            catalog.help(Some(allowed.as_slice())),
            "Available commands: gork, hi, yap"
        );
    }
}
