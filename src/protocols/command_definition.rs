//! Command definitions: the full metadata for one wire command.
//!
//! A definition knows how to match a human-issued code (directly, via an
//! alias, or via a regex for parameterised codes like `QED20240101`), how
//! the transport should treat the command, and how its response payload is
//! shaped and decoded. Tables are validated eagerly - a malformed
//! definition fails protocol construction, never the first decode.

use std::sync::Arc;

use regex::Regex;

use crate::error::{Error, Result};
use crate::protocols::binary::BinaryLayout;
use crate::protocols::reading_definition::ReadingDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandCategory {
    Config,
    Info,
    Settings,
    Defaults,
    #[default]
    Data,
}

/// Transport hint; opaque to the decode engine but used by protocols when
/// building frames (e.g. query vs setter prefixes) and by ports when
/// reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandType {
    #[default]
    Basic,
    ReadUntilDone,
    Query,
    Setter,
}

/// Strategy used to split a trimmed response payload into per-field
/// slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultShape {
    /// Payload is a single success/fail token.
    Ack,
    /// Whole payload feeds the first reading definition.
    #[default]
    Single,
    /// Whole payload feeds the first reading definition, which yields a
    /// multi-valued message.
    Multivalued,
    /// Whitespace separated, one slice per positional definition.
    Ordered,
    /// Comma separated, one slice per positional definition.
    CommaDelimited,
    /// Fixed-width fields; each definition carries its own byte range.
    Sliced,
    /// Newline/tab key-value pairs consumed by key.
    Keyed,
    /// Fixed binary frame parsed through the command's layout descriptor.
    Binary,
}

/// Metadata describing one command: how to build it and how to interpret
/// its response.
#[derive(Debug, Clone)]
pub struct CommandDefinition {
    pub code: String,
    pub description: String,
    pub help_text: String,
    pub category: CommandCategory,
    pub command_type: CommandType,
    /// Raw command value used when building binary frames.
    pub command_code: Option<u16>,
    /// Raw payload value used when building binary frames.
    pub command_data: Option<u16>,
    pub result_shape: ResultShape,
    aliases: Vec<String>,
    regex_source: Option<String>,
    regex: Option<Regex>,
    reading_definitions: Vec<Arc<ReadingDefinition>>,
    binary_layout: Option<BinaryLayout>,
    min_response_length: Option<usize>,
    test_responses: Vec<Vec<u8>>,
}

impl CommandDefinition {
    pub fn new(code: &str, description: &str, result_shape: ResultShape) -> Self {
        Self {
            code: code.to_string(),
            description: description.to_string(),
            help_text: String::new(),
            category: CommandCategory::default(),
            command_type: CommandType::default(),
            command_code: None,
            command_data: None,
            result_shape,
            aliases: Vec::new(),
            regex_source: None,
            regex: None,
            reading_definitions: Vec::new(),
            binary_layout: None,
            min_response_length: None,
            test_responses: Vec::new(),
        }
    }

    pub fn help(mut self, help_text: &str) -> Self {
        self.help_text = help_text.to_string();
        self
    }

    pub fn category(mut self, category: CommandCategory) -> Self {
        self.category = category;
        self
    }

    pub fn command_type(mut self, command_type: CommandType) -> Self {
        self.command_type = command_type;
        self
    }

    pub fn command_code(mut self, command_code: u16) -> Self {
        self.command_code = Some(command_code);
        self
    }

    pub fn command_data(mut self, command_data: u16) -> Self {
        self.command_data = Some(command_data);
        self
    }

    pub fn aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn regex(mut self, pattern: &str) -> Self {
        self.regex_source = Some(pattern.to_string());
        self
    }

    pub fn reading(mut self, definition: ReadingDefinition) -> Self {
        self.reading_definitions.push(Arc::new(definition));
        self
    }

    pub fn readings(mut self, definitions: Vec<ReadingDefinition>) -> Self {
        self.reading_definitions
            .extend(definitions.into_iter().map(Arc::new));
        self
    }

    pub fn layout(mut self, layout: BinaryLayout) -> Self {
        self.binary_layout = Some(layout);
        self
    }

    pub fn min_response_length(mut self, length: usize) -> Self {
        self.min_response_length = Some(length);
        self
    }

    pub fn test_response(mut self, response: &[u8]) -> Self {
        self.test_responses.push(response.to_vec());
        self
    }

    /// Validate the definition and compile its regex. Tables call this
    /// last in the builder chain.
    pub fn build(mut self) -> Result<Self> {
        if self.reading_definitions.is_empty() {
            return Err(Error::Config(format!(
                "reading definitions cannot be empty for command code: {}",
                self.code
            )));
        }
        for definition in &self.reading_definitions {
            definition.validate()?;
        }
        if self.result_shape == ResultShape::Binary {
            if self.binary_layout.is_none() {
                return Err(Error::Config(format!(
                    "command '{}' has a binary result shape but no layout",
                    self.code
                )));
            }
            if self.min_response_length.is_none() {
                return Err(Error::Config(format!(
                    "command '{}' has a binary result shape but no minimum response length",
                    self.code
                )));
            }
        }
        if self.result_shape == ResultShape::Sliced {
            for definition in &self.reading_definitions {
                if definition.slice_bounds().is_none() {
                    return Err(Error::Config(format!(
                        "command '{}' is sliced but reading '{}' has no byte range",
                        self.code,
                        definition.description()
                    )));
                }
            }
        }
        if let Some(source) = &self.regex_source {
            let compiled = Regex::new(source).map_err(|e| {
                Error::Config(format!("command '{}' has a bad regex '{source}': {e}", self.code))
            })?;
            self.regex = Some(compiled);
        }
        Ok(self)
    }

    pub fn has_regex(&self) -> bool {
        self.regex.is_some()
    }

    /// Whether `code` selects this definition via its regex. The match
    /// is anchored at the start of the code.
    pub fn regex_match(&self, code: &str) -> bool {
        self.regex
            .as_ref()
            .and_then(|r| r.find(code))
            .is_some_and(|m| m.start() == 0)
    }

    pub fn has_alias(&self, code: &str) -> bool {
        self.aliases.iter().any(|a| a == code)
    }

    pub fn reading_definitions(&self) -> &[Arc<ReadingDefinition>] {
        &self.reading_definitions
    }

    /// Definition for a positional slice; single-valued shapes always use
    /// position 0.
    pub fn reading_definition_at(&self, position: usize) -> Option<&Arc<ReadingDefinition>> {
        self.reading_definitions.get(position)
    }

    /// Definition addressed by field key (keyed and binary shapes).
    pub fn reading_definition_for_key(&self, key: &str) -> Option<&Arc<ReadingDefinition>> {
        self.reading_definitions
            .iter()
            .find(|d| d.key() == Some(key))
    }

    pub fn binary_layout(&self) -> Option<&BinaryLayout> {
        self.binary_layout.as_ref()
    }

    pub fn min_response_len(&self) -> Option<usize> {
        self.min_response_length
    }

    pub fn test_responses(&self) -> &[Vec<u8>] {
        &self.test_responses
    }
}

/// A command lookup result: the definition plus the issued code (which
/// carries any regex-captured parameter). Returned by value so
/// definitions stay immutable and lookups remain reentrant.
#[derive(Debug, Clone)]
pub struct ResolvedCommand {
    pub definition: Arc<CommandDefinition>,
    pub code: String,
}
