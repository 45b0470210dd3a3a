//! Runner command templates
//!
//! Runner commands use `{{name}}` placeholders. Parsing happens once at
//! config-load time so an unknown placeholder is a load error, not a runtime
//! surprise halfway through an exercise run.

use std::collections::HashMap;

/// Placeholders a runner command may reference
pub const PLACEHOLDERS: &[&str] = &["exercise", "id", "module"];

/// A parsed runner command template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerTemplate {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

impl RunnerTemplate {
    /// Parse a template, rejecting unknown or unterminated placeholders
    pub fn parse(command: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        let mut rest = command;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| format!("unterminated placeholder in `{command}`"))?;
            let name = after[..end].trim();

            if !PLACEHOLDERS.contains(&name) {
                return Err(format!(
                    "unknown placeholder `{{{{{name}}}}}`; expected one of: {}",
                    PLACEHOLDERS
                        .iter()
                        .map(|p| format!("{{{{{p}}}}}"))
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }

            segments.push(Segment::Placeholder(name.to_string()));
            rest = &after[end + 2..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        if segments.is_empty() {
            return Err("runner command must not be empty".to_string());
        }

        Ok(Self { segments })
    }

    /// Placeholder names referenced by this template, in order of appearance
    pub fn placeholders(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Render the template with concrete values. Placeholders without a
    /// supplied value render as empty.
    pub fn render(&self, values: &HashMap<&str, String>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    if let Some(value) = values.get(name.as_str()) {
                        out.push_str(value);
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_and_render() {
        let template = RunnerTemplate::parse("python {{exercise}} --id {{id}}").unwrap();
        assert_eq!(template.placeholders(), vec!["exercise", "id"]);

        let mut values = HashMap::new();
        values.insert("exercise", "content/01_intro/hello.py".to_string());
        values.insert("id", "01_intro/hello.py".to_string());

        assert_eq!(
            template.render(&values),
            "python content/01_intro/hello.py --id 01_intro/hello.py"
        );
    }

    #[test]
    fn literal_only_command() {
        let template = RunnerTemplate::parse("cargo test").unwrap();
        assert!(template.placeholders().is_empty());
        assert_eq!(template.render(&HashMap::new()), "cargo test");
    }

    #[test]
    fn unknown_placeholder_rejected() {
        let err = RunnerTemplate::parse("run {{nope}}").unwrap_err();
        assert!(err.contains("unknown placeholder"));
    }

    #[test]
    fn unterminated_placeholder_rejected() {
        let err = RunnerTemplate::parse("run {{exercise").unwrap_err();
        assert!(err.contains("unterminated"));
    }

    #[test]
    fn empty_command_rejected() {
        assert!(RunnerTemplate::parse("").is_err());
    }
}
