//! Minimal template renderer for generated files.
//!
//! Supports `{{name}}` substitution and `{{#each list}} ... {{/each}}` blocks.
//! Inside a block, names resolve against the current item first and then
//! against the enclosing scopes. Referencing an unknown name, leaving a tag
//! unterminated or leaving a block unbalanced fails the render.

use std::collections::HashMap;

use crate::error::{Result, TypegenError};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// A value bound in a template scope
#[derive(Debug, Clone)]
pub enum Value {
    Text(String),
    List(Vec<Scope>),
}

/// Named values available to a template
#[derive(Debug, Clone, Default)]
pub struct Scope {
    values: HashMap<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_string(), Value::Text(value.into()));
    }

    pub fn insert_list(&mut self, name: &str, items: Vec<Scope>) {
        self.values.insert(name.to_string(), Value::List(items));
    }

    fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Var(String),
    Each { list: String, body: Vec<Segment> },
}

/// A parsed template
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse template source; structural problems are reported here
    pub fn parse(name: &str, source: &str) -> Result<Self> {
        let mut rest = source;
        // Stack of open blocks: (list name, segments collected so far)
        let mut stack: Vec<(String, Vec<Segment>)> = Vec::new();
        let mut current: Vec<Segment> = Vec::new();

        while let Some(start) = rest.find(OPEN) {
            if start > 0 {
                current.push(Segment::Literal(rest[..start].to_string()));
            }
            let after_open = &rest[start + OPEN.len()..];
            let end = after_open.find(CLOSE).ok_or_else(|| {
                TypegenError::template(name, format!("unterminated tag at offset {}", source.len() - rest.len() + start))
            })?;
            let tag = after_open[..end].trim();
            rest = &after_open[end + CLOSE.len()..];

            if let Some(list) = tag.strip_prefix("#each ") {
                let list = list.trim();
                check_name(name, list)?;
                stack.push((list.to_string(), std::mem::take(&mut current)));
            } else if tag == "/each" {
                let (list, outer) = stack
                    .pop()
                    .ok_or_else(|| TypegenError::template(name, "{{/each}} without a matching {{#each}}"))?;
                let body = std::mem::replace(&mut current, outer);
                current.push(Segment::Each { list, body });
            } else {
                check_name(name, tag)?;
                current.push(Segment::Var(tag.to_string()));
            }
        }
        if !rest.is_empty() {
            current.push(Segment::Literal(rest.to_string()));
        }

        if let Some((list, _)) = stack.last() {
            return Err(TypegenError::template(
                name,
                format!("{{{{#each {}}}}} is never closed", list),
            ));
        }

        Ok(Self {
            name: name.to_string(),
            segments: current,
        })
    }

    /// Render against a root scope
    pub fn render(&self, scope: &Scope) -> Result<String> {
        let mut out = String::new();
        let mut scopes = vec![scope];
        self.render_segments(&self.segments, &mut scopes, &mut out)?;
        Ok(out)
    }

    fn render_segments<'s>(
        &self,
        segments: &[Segment],
        scopes: &mut Vec<&'s Scope>,
        out: &mut String,
    ) -> Result<()> {
        for segment in segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Var(var) => match lookup(scopes, var) {
                    Some(Value::Text(text)) => out.push_str(text),
                    Some(Value::List(_)) => {
                        return Err(TypegenError::template(
                            &self.name,
                            format!("{} is a list, use {{{{#each {}}}}}", var, var),
                        ))
                    }
                    None => {
                        return Err(TypegenError::template(&self.name, format!("unknown variable: {}", var)))
                    }
                },
                Segment::Each { list, body } => match lookup(scopes, list) {
                    Some(Value::List(items)) => {
                        for item in items {
                            scopes.push(item);
                            let result = self.render_segments(body, scopes, out);
                            scopes.pop();
                            result?;
                        }
                    }
                    Some(Value::Text(_)) => {
                        return Err(TypegenError::template(&self.name, format!("{} is not a list", list)))
                    }
                    None => {
                        return Err(TypegenError::template(&self.name, format!("unknown list: {}", list)))
                    }
                },
            }
        }
        Ok(())
    }
}

fn lookup<'s>(scopes: &[&'s Scope], name: &str) -> Option<&'s Value> {
    scopes.iter().rev().find_map(|scope| scope.get(name))
}

fn check_name(template: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(TypegenError::template(template, format!("invalid tag: {{{{{}}}}}", name)))
    }
}

/// Parse and render in one step
pub fn render(name: &str, source: &str, scope: &Scope) -> Result<String> {
    Template::parse(name, source)?.render(scope)
}
