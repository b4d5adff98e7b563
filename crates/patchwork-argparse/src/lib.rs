//! Minimal `--key=value` argument tokenizing.
//!
//! There is no schema: every `--name[=value]` token becomes an option and every
//! other token becomes the positional command. Tokenizing never fails; odd
//! input is kept literally (e.g. `--` is an option with an empty name).

pub mod tokens {
    use indexmap::IndexMap;
    use serde::ser::{Serialize, SerializeMap, Serializer};

    /// Name used for the positional command when rendered as a flat map.
    pub const COMMAND_KEY: &str = "command";

    /// A single classified argument.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ArgToken<'a> {
        /// `--key=value` (value may be empty) or `--key` (no value).
        Option { key: &'a str, value: Option<&'a str> },
        /// Anything not starting with `--`.
        Positional(&'a str),
    }

    impl<'a> ArgToken<'a> {
        /// Classify a raw token.
        ///
        /// Only the first `=` separates key and value, so `--a=b=c` has key `a`
        /// and value `b=c`. Value presence depends on whether `=` appeared, not on
        /// whether the value is empty.
        pub fn classify(raw: &'a str) -> Self {
            let Some(body) = raw.strip_prefix("--") else {
                return Self::Positional(raw);
            };
            match body.split_once('=') {
                Some((key, value)) => Self::Option {
                    key,
                    value: Some(value),
                },
                None => Self::Option {
                    key: body,
                    value: None,
                },
            }
        }
    }

    /// Value stored for an option.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ArgValue {
        /// `--key` with no `=`; renders as boolean `true`.
        Flag,
        /// `--key=value`.
        Value(String),
    }

    impl ArgValue {
        pub fn as_str(&self) -> Option<&str> {
            match self {
                Self::Flag => None,
                Self::Value(v) => Some(v.as_str()),
            }
        }

        pub fn is_flag(&self) -> bool {
            matches!(self, Self::Flag)
        }
    }

    impl Serialize for ArgValue {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                Self::Flag => serializer.serialize_bool(true),
                Self::Value(v) => serializer.serialize_str(v),
            }
        }
    }

    /// Options and positional tokens collected from one `parse` call.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct ParsedArgs {
        options: IndexMap<String, ArgValue>,
        positionals: Vec<String>,
        // Whether `--command[=...]` came after the last positional token.
        command_option_last: bool,
    }

    impl ParsedArgs {
        /// Get an option's value. A repeated option reports its last value.
        pub fn get(&self, name: &str) -> Option<&ArgValue> {
            self.options.get(name)
        }

        /// Get an option's string value (`None` for flags and absent options).
        pub fn value(&self, name: &str) -> Option<&str> {
            self.get(name).and_then(ArgValue::as_str)
        }

        /// Whether `name` was given as a bare `--name` flag.
        pub fn is_flag(&self, name: &str) -> bool {
            self.get(name).is_some_and(ArgValue::is_flag)
        }

        /// The last positional token, if any.
        pub fn command(&self) -> Option<&str> {
            self.positionals.last().map(String::as_str)
        }

        /// Every positional token, in order. `command()` is the last one.
        pub fn positionals(&self) -> &[String] {
            self.positionals.as_slice()
        }

        /// Options in order of first appearance.
        pub fn options(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
            self.options.iter().map(|(k, v)| (k.as_str(), v))
        }

        /// Number of entries in the flat rendering (options plus `command`).
        pub fn len(&self) -> usize {
            if !self.positional_command_wins() {
                return self.options.len();
            }
            let shadowed = self.options.contains_key(COMMAND_KEY);
            self.options.len() + 1 - usize::from(shadowed)
        }

        pub fn is_empty(&self) -> bool {
            self.options.is_empty() && self.positionals.is_empty()
        }

        /// Whether the flat `command` entry holds the last positional token
        /// rather than the value of a `--command` option.
        fn positional_command_wins(&self) -> bool {
            !self.positionals.is_empty() && !self.command_option_last
        }
    }

    /// Renders as one flat map: options in first-seen order, then `command`.
    ///
    /// The positional command and an option named `command` share one entry;
    /// whichever was written last wins.
    impl Serialize for ParsedArgs {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let command = self.command().filter(|_| self.positional_command_wins());
            let mut map = serializer.serialize_map(Some(self.len()))?;
            for (key, value) in &self.options {
                if command.is_some() && key == COMMAND_KEY {
                    continue;
                }
                map.serialize_entry(key, value)?;
            }
            if let Some(command) = command {
                map.serialize_entry(COMMAND_KEY, command)?;
            }
            map.end()
        }
    }

    /// Tokenize `tokens` in order. Each token is read once; the input is only borrowed.
    pub fn parse<I, S>(tokens: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = ParsedArgs::default();
        for raw in tokens {
            let raw = raw.as_ref();
            let token = ArgToken::classify(raw);
            tracing::trace!(?token, "classified argument");
            match token {
                ArgToken::Option { key, value } => {
                    let value = match value {
                        Some(v) => ArgValue::Value(v.to_string()),
                        None => ArgValue::Flag,
                    };
                    if key == COMMAND_KEY {
                        parsed.command_option_last = true;
                    }
                    parsed.options.insert(key.to_string(), value);
                }
                ArgToken::Positional(command) => {
                    parsed.command_option_last = false;
                    parsed.positionals.push(command.to_string());
                }
            }
        }
        tracing::debug!(
            options = parsed.options.len(),
            positionals = parsed.positionals.len(),
            "tokenized arguments"
        );
        parsed
    }
}

pub use tokens::{ArgToken, ArgValue, ParsedArgs, parse};
