use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::AutomationError;

/// Represents one way to locate an element on a page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Raw CSS selector
    Css(String),
    /// Select by the `name` attribute
    Name(String),
    /// Select by the `id` attribute
    Id(String),
    /// Select the innermost elements whose visible text contains the value
    Text(String),
    /// Select by role and optional accessible name (exact, whitespace normalised)
    Role { role: String, name: Option<String> },
    /// Select elements of `tag` that contain the given text anywhere below them
    HasText { tag: String, text: String },
    /// Raw XPath expression
    XPath(String),
    /// Represents an invalid selector string, with a reason.
    Invalid(String),
}

impl Selector {
    pub fn role(role: &str, name: &str) -> Self {
        Selector::Role {
            role: role.to_string(),
            name: Some(name.to_string()),
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Selector::Invalid(_))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css(css) => write!(f, "css:{css}"),
            Selector::Name(name) => write!(f, "name:{name}"),
            Selector::Id(id) => write!(f, "id:{id}"),
            Selector::Text(text) => write!(f, "text:{text}"),
            Selector::Role { role, name: None } => write!(f, "role:{role}"),
            Selector::Role {
                role,
                name: Some(name),
            } => write!(f, "role:{role}|{name}"),
            Selector::HasText { tag, text } => write!(f, "{tag}:has-text({text})"),
            Selector::XPath(xpath) => write!(f, "xpath:{xpath}"),
            Selector::Invalid(reason) => write!(f, "invalid:{reason}"),
        }
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        let s = s.trim();

        if s.is_empty() {
            return Selector::Invalid("Empty selector".to_string());
        }

        // role:button|Submit is the preferred precise format
        if let Some(rest) = s.strip_prefix("role:") {
            return match rest.split_once('|') {
                Some((role, name)) => Selector::Role {
                    role: role.trim().to_lowercase(),
                    name: Some(name.trim().to_string()),
                },
                None => Selector::Role {
                    role: rest.trim().to_lowercase(),
                    name: None,
                },
            };
        }

        match s {
            _ if s.starts_with("css:") => Selector::Css(s[4..].trim().to_string()),
            _ if s.starts_with("name:") => Selector::Name(s[5..].trim().to_string()),
            _ if s.starts_with("id:") => Selector::Id(s[3..].trim().to_string()),
            _ if s.starts_with("text:") => Selector::Text(s[5..].trim().to_string()),
            _ if s.starts_with("xpath:") => Selector::XPath(s[6..].trim().to_string()),
            _ if s.starts_with('#') && s.len() > 1 => Selector::Id(s[1..].to_string()),
            _ if s.starts_with('/') || s.starts_with("(/") => Selector::XPath(s.to_string()),
            _ if s.contains(":has-text(") && s.ends_with(')') => {
                let (tag, rest) = s.split_once(":has-text(").unwrap_or(("", ""));
                let text = rest.strip_suffix(')').unwrap_or(rest).trim();
                let text = text.trim_matches(|c| c == '\'' || c == '"');
                if tag.is_empty() || text.is_empty() {
                    Selector::Invalid(format!("Malformed has-text selector: \"{s}\""))
                } else {
                    Selector::HasText {
                        tag: tag.trim().to_string(),
                        text: text.to_string(),
                    }
                }
            }
            _ => Selector::Invalid(format!(
                "Unknown selector format: \"{s}\". Use prefixes like 'css:', 'name:', 'id:', 'text:', 'role:', or 'xpath:' to specify the selector type."
            )),
        }
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::from(s.as_str())
    }
}

/// Ordered list of alternative lookups, tried until one matches.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectorChain(Vec<Selector>);

impl SelectorChain {
    pub fn new(selectors: Vec<Selector>) -> Self {
        Self(selectors)
    }

    pub fn strategies(&self) -> &[Selector] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// String form of every strategy, in order.
    pub fn describe(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }

    /// Rejects empty chains and chains holding an unparseable member.
    pub fn validate(&self) -> Result<(), AutomationError> {
        if self.0.is_empty() {
            return Err(AutomationError::InvalidSelector(
                "Selector chain is empty".to_string(),
            ));
        }
        match self.0.iter().find(|s| !s.is_valid()) {
            Some(Selector::Invalid(reason)) => {
                Err(AutomationError::InvalidSelector(reason.clone()))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for SelectorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe().join(" || "))
    }
}

impl From<Selector> for SelectorChain {
    fn from(selector: Selector) -> Self {
        Self(vec![selector])
    }
}

impl From<Vec<Selector>> for SelectorChain {
    fn from(selectors: Vec<Selector>) -> Self {
        Self(selectors)
    }
}

impl From<&str> for SelectorChain {
    fn from(s: &str) -> Self {
        Self(s.split("||").map(Selector::from).collect())
    }
}

impl FromStr for SelectorChain {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chain = SelectorChain::from(s);
        chain.validate()?;
        Ok(chain)
    }
}

impl Serialize for SelectorChain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SelectorChain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
