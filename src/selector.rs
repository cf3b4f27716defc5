use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SelectorAttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SelectorStep {
    pub(crate) tag: Option<String>,
    pub(crate) universal: bool,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attrs: Vec<SelectorAttrCondition>,
}

impl SelectorStep {
    pub(crate) fn id_only(&self) -> Option<&str> {
        if !self.universal && self.tag.is_none() && self.classes.is_empty() && self.attrs.is_empty()
        {
            self.id.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SelectorCombinator {
    Descendant,
    Child,
    AdjacentSibling,
    GeneralSibling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorPart {
    pub(crate) step: SelectorStep,
    // Relation to previous (left) selector part.
    pub(crate) combinator: Option<SelectorCombinator>,
}

pub(crate) fn parse_selector_groups(selector: &str) -> Result<Vec<Vec<SelectorPart>>> {
    let groups = split_selector_groups(selector)?;
    let mut parsed = Vec::with_capacity(groups.len());
    for group in groups {
        parsed.push(parse_selector_chain(&group)?);
    }
    Ok(parsed)
}

fn parse_selector_chain(selector: &str) -> Result<Vec<SelectorPart>> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }

    let tokens = tokenize_selector(selector)?;
    let mut steps = Vec::new();
    let mut pending_combinator: Option<SelectorCombinator> = None;

    for token in tokens {
        if token == ">" || token == "+" || token == "~" {
            if pending_combinator.is_some() || steps.is_empty() {
                return Err(Error::UnsupportedSelector(selector.into()));
            }
            pending_combinator = Some(match token.as_str() {
                ">" => SelectorCombinator::Child,
                "+" => SelectorCombinator::AdjacentSibling,
                "~" => SelectorCombinator::GeneralSibling,
                _ => unreachable!(),
            });
            continue;
        }

        let step = parse_selector_step(&token)?;
        let combinator = if steps.is_empty() {
            None
        } else {
            Some(
                pending_combinator
                    .take()
                    .unwrap_or(SelectorCombinator::Descendant),
            )
        };
        steps.push(SelectorPart { step, combinator });
    }

    if steps.is_empty() || pending_combinator.is_some() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }

    Ok(steps)
}

fn split_selector_groups(selector: &str) -> Result<Vec<String>> {
    let mut groups = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;

    for ch in selector.chars() {
        match ch {
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                if bracket_depth == 0 {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                bracket_depth -= 1;
                current.push(ch);
            }
            ',' if bracket_depth == 0 => {
                let trimmed = current.trim();
                if trimmed.is_empty() {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                groups.push(trimmed.to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if bracket_depth != 0 {
        return Err(Error::UnsupportedSelector(selector.into()));
    }

    let trimmed = current.trim();
    if trimmed.is_empty() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    groups.push(trimmed.to_string());
    Ok(groups)
}

fn tokenize_selector(selector: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;

    for ch in selector.chars() {
        match ch {
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                if bracket_depth == 0 {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                bracket_depth -= 1;
                current.push(ch);
            }
            '>' | '+' | '~' if bracket_depth == 0 => {
                if !current.trim().is_empty() {
                    tokens.push(current.trim().to_string());
                }
                current.clear();
                tokens.push(ch.to_string());
            }
            ch if ch.is_ascii_whitespace() && bracket_depth == 0 => {
                if !current.trim().is_empty() {
                    tokens.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if bracket_depth != 0 {
        return Err(Error::UnsupportedSelector(selector.into()));
    }

    if !current.trim().is_empty() {
        tokens.push(current.trim().to_string());
    }

    Ok(tokens)
}

fn parse_selector_step(part: &str) -> Result<SelectorStep> {
    let part = part.trim();
    if part.is_empty() {
        return Err(Error::UnsupportedSelector(part.into()));
    }

    let bytes = part.as_bytes();
    let mut i = 0usize;
    let mut step = SelectorStep::default();

    while i < bytes.len() {
        match bytes[i] {
            b'*' => {
                if step.universal {
                    return Err(Error::UnsupportedSelector(part.into()));
                }
                step.universal = true;
                i += 1;
            }
            b'#' => {
                i += 1;
                let Some((id, next)) = parse_selector_ident(part, i) else {
                    return Err(Error::UnsupportedSelector(part.into()));
                };
                if step.id.replace(id).is_some() {
                    return Err(Error::UnsupportedSelector(part.into()));
                }
                i = next;
            }
            b'.' => {
                i += 1;
                let Some((class_name, next)) = parse_selector_ident(part, i) else {
                    return Err(Error::UnsupportedSelector(part.into()));
                };
                step.classes.push(class_name);
                i = next;
            }
            b'[' => {
                let (attr, next) = parse_selector_attr_condition(part, i)?;
                step.attrs.push(attr);
                i = next;
            }
            _ => {
                if step.tag.is_some()
                    || step.id.is_some()
                    || !step.classes.is_empty()
                    || step.universal
                {
                    return Err(Error::UnsupportedSelector(part.into()));
                }
                let Some((tag, next)) = parse_selector_ident(part, i) else {
                    return Err(Error::UnsupportedSelector(part.into()));
                };
                step.tag = Some(tag);
                i = next;
            }
        }
    }

    if step.tag.is_none()
        && step.id.is_none()
        && step.classes.is_empty()
        && step.attrs.is_empty()
        && !step.universal
    {
        return Err(Error::UnsupportedSelector(part.into()));
    }
    Ok(step)
}

fn parse_selector_ident(part: &str, start: usize) -> Option<(String, usize)> {
    let bytes = part.as_bytes();
    let mut i = start;
    while i < bytes.len() && is_ident_char(bytes[i]) {
        i += 1;
    }
    if i == start {
        return None;
    }
    part.get(start..i).map(|ident| (ident.to_string(), i))
}

fn parse_selector_attr_condition(
    part: &str,
    start: usize,
) -> Result<(SelectorAttrCondition, usize)> {
    let bytes = part.as_bytes();
    let mut i = start;
    if bytes.get(i) != Some(&b'[') {
        return Err(Error::UnsupportedSelector(part.into()));
    }
    i += 1;

    let Some((key, next)) = parse_selector_ident(part, i) else {
        return Err(Error::UnsupportedSelector(part.into()));
    };
    i = next;
    let key = key.to_ascii_lowercase();

    match bytes.get(i) {
        Some(b']') => Ok((SelectorAttrCondition::Exists { key }, i + 1)),
        Some(b'=') => {
            i += 1;
            let (value, next) = parse_selector_attr_value(part, i)?;
            i = next;
            if bytes.get(i) != Some(&b']') {
                return Err(Error::UnsupportedSelector(part.into()));
            }
            Ok((SelectorAttrCondition::Eq { key, value }, i + 1))
        }
        _ => Err(Error::UnsupportedSelector(part.into())),
    }
}

fn parse_selector_attr_value(part: &str, start: usize) -> Result<(String, usize)> {
    let bytes = part.as_bytes();
    let mut i = start;

    if matches!(bytes.get(i), Some(b'\'') | Some(b'"')) {
        let quote = bytes[i];
        i += 1;
        let value_start = i;
        while i < bytes.len() && bytes[i] != quote {
            i += 1;
        }
        if i >= bytes.len() {
            return Err(Error::UnsupportedSelector(part.into()));
        }
        let value = part
            .get(value_start..i)
            .ok_or_else(|| Error::UnsupportedSelector(part.into()))?
            .to_string();
        return Ok((value, i + 1));
    }

    let value_start = i;
    while i < bytes.len() && bytes[i] != b']' {
        i += 1;
    }
    let value = part
        .get(value_start..i)
        .ok_or_else(|| Error::UnsupportedSelector(part.into()))?
        .to_string();
    if value.is_empty() {
        return Err(Error::UnsupportedSelector(part.into()));
    }
    Ok((value, i))
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compound_step() {
        let groups = parse_selector_groups("input.wide[type=file]#upload").unwrap();
        assert_eq!(groups.len(), 1);
        let step = &groups[0][0].step;
        assert_eq!(step.tag.as_deref(), Some("input"));
        assert_eq!(step.id.as_deref(), Some("upload"));
        assert_eq!(step.classes, vec!["wide".to_string()]);
        assert_eq!(
            step.attrs,
            vec![SelectorAttrCondition::Eq {
                key: "type".into(),
                value: "file".into()
            }]
        );
    }

    #[test]
    fn parses_quoted_attr_value() {
        let groups = parse_selector_groups(".file-upload-area input[type=\"file\"]").unwrap();
        let chain = &groups[0];
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].combinator, Some(SelectorCombinator::Descendant));
        assert_eq!(
            chain[1].step.attrs,
            vec![SelectorAttrCondition::Eq {
                key: "type".into(),
                value: "file".into()
            }]
        );
    }

    #[test]
    fn parses_groups_and_combinators() {
        let groups = parse_selector_groups("form > input, .flash-message").unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0][1].combinator, Some(SelectorCombinator::Child));
        assert_eq!(groups[1][0].step.classes, vec!["flash-message".to_string()]);
    }

    #[test]
    fn rejects_unsupported_syntax() {
        assert!(parse_selector_groups("").is_err());
        assert!(parse_selector_groups("p:first-child").is_err());
        assert!(parse_selector_groups("div >").is_err());
        assert!(parse_selector_groups("[unclosed").is_err());
        assert!(parse_selector_groups("a,,b").is_err());
    }
}
