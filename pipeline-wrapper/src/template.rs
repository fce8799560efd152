//! Config template interpolation.
//!
//! Templates use `{key}` placeholders with `{{` / `}}` as literal braces.
//! Keys are argument ids with dashes replaced by underscores, e.g. the value
//! of `--no-clean` is available as `{no_clean}`.

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("placeholder '{{{0}}}' does not name a defined argument")]
    UnknownKey(String),
    #[error("unmatched '{{' at byte {0}")]
    Unclosed(usize),
    #[error("single '}}' encountered at byte {0}")]
    StrayClose(usize),
    #[error("empty placeholder at byte {0}")]
    EmptyPlaceholder(usize),
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Brace(char),
    Field(&'a str),
}

fn parse(template: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    let mut segments = Vec::new();
    let bytes = template.as_bytes();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' | b'}' if bytes.get(i + 1) == Some(&bytes[i]) => {
                if literal_start < i {
                    segments.push(Segment::Literal(&template[literal_start..i]));
                }
                segments.push(Segment::Brace(bytes[i] as char));
                i += 2;
                literal_start = i;
            }
            b'{' => {
                if literal_start < i {
                    segments.push(Segment::Literal(&template[literal_start..i]));
                }
                let end = template[i + 1..]
                    .find(['{', '}'])
                    .map(|off| i + 1 + off)
                    .filter(|&end| bytes[end] == b'}')
                    .ok_or(TemplateError::Unclosed(i))?;
                let key = &template[i + 1..end];
                if key.is_empty() {
                    return Err(TemplateError::EmptyPlaceholder(i));
                }
                segments.push(Segment::Field(key));
                i = end + 1;
                literal_start = i;
            }
            b'}' => return Err(TemplateError::StrayClose(i)),
            _ => i += 1,
        }
    }
    if literal_start < bytes.len() {
        segments.push(Segment::Literal(&template[literal_start..]));
    }
    Ok(segments)
}

/// Keys referenced by `template`, in order of first appearance.
pub fn placeholders(template: &str) -> Result<Vec<String>, TemplateError> {
    let mut keys: Vec<String> = Vec::new();
    for segment in parse(template)? {
        if let Segment::Field(key) = segment {
            if !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
        }
    }
    Ok(keys)
}

/// Substitutes every placeholder with its value.
pub fn render(template: &str, values: &BTreeMap<String, String>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    for segment in parse(template)? {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Brace(brace) => out.push(brace),
            Segment::Field(key) => {
                let value = values
                    .get(key)
                    .ok_or_else(|| TemplateError::UnknownKey(key.to_string()))?;
                out.push_str(value);
            }
        }
    }
    Ok(out)
}

/// Renders a config file body: interpolation, then common indentation removed.
pub fn render_config(
    template: &str,
    values: &BTreeMap<String, String>,
) -> Result<String, TemplateError> {
    Ok(textwrap::dedent(&render(template, values)?))
}

/// Fails on the first placeholder that is not in `known`.
pub fn check_keys<'a, I>(template: &str, known: I) -> Result<(), TemplateError>
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    for key in placeholders(template)? {
        if !known.clone().into_iter().any(|k| k == key) {
            return Err(TemplateError::UnknownKey(key));
        }
    }
    Ok(())
}
