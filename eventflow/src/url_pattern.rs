use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::errors::AutomationError;

/// Glob pattern over full URLs: `**` matches anything, `*` anything but `/`.
///
/// `**/dashboard**` matches `https://host/dashboard` and
/// `https://host/app/dashboard?tab=1`.
#[derive(Debug, Clone)]
pub struct UrlPattern {
    glob: String,
    regex: Regex,
}

impl UrlPattern {
    pub fn new(glob: &str) -> Result<Self, AutomationError> {
        let mut source = String::from("^");
        let mut chars = glob.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '*' if chars.peek() == Some(&'*') => {
                    chars.next();
                    source.push_str(".*");
                }
                '*' => source.push_str("[^/]*"),
                other => source.push_str(&regex::escape(&other.to_string())),
            }
        }
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| {
            AutomationError::InvalidArgument(format!("Bad URL pattern {glob:?}: {e}"))
        })?;
        Ok(Self {
            glob: glob.to_string(),
            regex,
        })
    }

    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    pub fn as_str(&self) -> &str {
        &self.glob
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.glob)
    }
}

impl FromStr for UrlPattern {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UrlPattern::new(s)
    }
}
