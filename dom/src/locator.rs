//! Content locators.
//!
//! Two locator languages: a restricted CSS-style selector (tag, `#id`,
//! `.class`, `[attr]`, `[attr=value]`, descendant and child combinators,
//! comma-separated groups) and a positional tag path
//! (`body/div[2]/ul`). This covers what session configurations use to
//! point at page content without dragging a full selector engine in.

use crate::node::{Dom, DomError, NodeId};

/// Which locator language `path` is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorKind {
    Selector,
    TagPath,
}

/// A parsed, reusable locator expression.
#[derive(Debug, Clone)]
pub struct Locator {
    kind: LocatorKind,
    groups: Vec<Vec<Step>>,
    path: Vec<PathSegment>,
    source: String,
}

#[derive(Debug, Clone)]
struct Step {
    compound: Compound,
    /// Relationship to the following step.
    direct_child: bool,
}

#[derive(Debug, Clone, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

#[derive(Debug, Clone)]
struct PathSegment {
    tag: String,
    /// 1-based index among same-tag siblings; defaults to 1.
    index: usize,
}

impl Locator {
    /// Parse a selector-style locator.
    pub fn selector(path: &str) -> Result<Self, DomError> {
        let groups = parse_selector(path)?;
        Ok(Self {
            kind: LocatorKind::Selector,
            groups,
            path: Vec::new(),
            source: path.to_string(),
        })
    }

    /// Parse a positional tag path such as `body/div[2]/ul`.
    pub fn tag_path(path: &str) -> Result<Self, DomError> {
        let segments = parse_tag_path(path)?;
        Ok(Self {
            kind: LocatorKind::TagPath,
            groups: Vec::new(),
            path: segments,
            source: path.to_string(),
        })
    }

    /// Parse a locator of the given kind.
    pub fn parse(kind: LocatorKind, path: &str) -> Result<Self, DomError> {
        match kind {
            LocatorKind::Selector => Self::selector(path),
            LocatorKind::TagPath => Self::tag_path(path),
        }
    }

    #[must_use]
    pub fn kind(&self) -> LocatorKind {
        self.kind
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Dom {
    /// All elements matching the locator, in document order.
    #[must_use]
    pub fn select(&self, locator: &Locator) -> Vec<NodeId> {
        match locator.kind {
            LocatorKind::Selector => {
                let mut out = Vec::new();
                for node in self.descendants(self.root()) {
                    if !self.is_element(node) {
                        continue;
                    }
                    if locator
                        .groups
                        .iter()
                        .any(|steps| self.matches_steps(node, steps))
                    {
                        out.push(node);
                    }
                }
                out
            }
            LocatorKind::TagPath => self.select_path(&locator.path),
        }
    }

    fn matches_steps(&self, node: NodeId, steps: &[Step]) -> bool {
        let Some((last, rest)) = steps.split_last() else {
            return false;
        };
        if !self.matches_compound(node, &last.compound) {
            return false;
        }
        let mut current = node;
        let mut remaining = rest;
        while let Some((step, before)) = remaining.split_last() {
            let mut candidate = self.parent(current);
            let mut matched = None;
            while let Some(ancestor) = candidate {
                if self.is_element(ancestor) && self.matches_compound(ancestor, &step.compound) {
                    matched = Some(ancestor);
                    break;
                }
                if step.direct_child {
                    break;
                }
                candidate = self.parent(ancestor);
            }
            match matched {
                Some(ancestor) => {
                    current = ancestor;
                    remaining = before;
                }
                None => return false,
            }
        }
        true
    }

    fn matches_compound(&self, node: NodeId, compound: &Compound) -> bool {
        if let Some(tag) = &compound.tag
            && self.tag(node) != Some(tag.as_str())
        {
            return false;
        }
        if let Some(id) = &compound.id
            && self.attr(node, "id") != Some(id.as_str())
        {
            return false;
        }
        if !compound.classes.is_empty() {
            let class_attr = self.attr(node, "class").unwrap_or("");
            let have: Vec<&str> = class_attr.split_whitespace().collect();
            if !compound.classes.iter().all(|c| have.contains(&c.as_str())) {
                return false;
            }
        }
        for (name, expected) in &compound.attrs {
            match (self.attr(node, name), expected) {
                (None, _) => return false,
                (Some(actual), Some(value)) if actual != value => return false,
                _ => {}
            }
        }
        true
    }

    fn select_path(&self, segments: &[PathSegment]) -> Vec<NodeId> {
        let mut current = self.root();
        for segment in segments {
            let matching: Vec<NodeId> = self
                .children(current)
                .iter()
                .copied()
                .filter(|&c| self.tag(c) == Some(segment.tag.as_str()))
                .collect();
            match matching.get(segment.index - 1) {
                Some(&next) => current = next,
                None => return Vec::new(),
            }
        }
        if current == self.root() {
            Vec::new()
        } else {
            vec![current]
        }
    }
}

fn parse_selector(input: &str) -> Result<Vec<Vec<Step>>, DomError> {
    let mut groups = Vec::new();
    for group in input.split(',') {
        let group = group.trim();
        if group.is_empty() {
            return Err(DomError::LocatorParse(format!("empty group in '{input}'")));
        }
        groups.push(parse_group(group)?);
    }
    Ok(groups)
}

fn parse_group(group: &str) -> Result<Vec<Step>, DomError> {
    // Normalize child combinators so token splitting stays simple.
    let spaced = group.replace('>', " > ");
    let tokens: Vec<&str> = spaced.split_whitespace().collect();
    let mut steps: Vec<Step> = Vec::new();
    let mut next_is_child = false;
    for token in tokens {
        if token == ">" {
            if steps.is_empty() {
                return Err(DomError::LocatorParse(format!(
                    "combinator with no left side in '{group}'"
                )));
            }
            next_is_child = true;
            continue;
        }
        let compound = parse_compound(token)?;
        if let Some(previous) = steps.last_mut()
            && next_is_child
        {
            previous.direct_child = true;
        }
        next_is_child = false;
        steps.push(Step {
            compound,
            direct_child: false,
        });
    }
    if steps.is_empty() {
        return Err(DomError::LocatorParse(format!("no selector in '{group}'")));
    }
    Ok(steps)
}

fn parse_compound(token: &str) -> Result<Compound, DomError> {
    let mut compound = Compound::default();
    let mut rest = token;
    if !rest.starts_with(['#', '.', '[']) {
        let end = rest
            .find(['#', '.', '['])
            .unwrap_or(rest.len());
        let tag = &rest[..end];
        if tag != "*" {
            compound.tag = Some(tag.to_ascii_lowercase());
        }
        rest = &rest[end..];
    }
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('#') {
            let end = after.find(['#', '.', '[']).unwrap_or(after.len());
            compound.id = Some(after[..end].to_string());
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('.') {
            let end = after.find(['#', '.', '[']).unwrap_or(after.len());
            compound.classes.push(after[..end].to_string());
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let end = after
                .find(']')
                .ok_or_else(|| DomError::LocatorParse(format!("unclosed '[' in '{token}'")))?;
            let inner = &after[..end];
            match inner.split_once('=') {
                Some((name, value)) => compound.attrs.push((
                    name.trim().to_ascii_lowercase(),
                    Some(value.trim().trim_matches(['"', '\'']).to_string()),
                )),
                None => compound
                    .attrs
                    .push((inner.trim().to_ascii_lowercase(), None)),
            }
            rest = &after[end + 1..];
        } else {
            return Err(DomError::LocatorParse(format!(
                "unexpected '{rest}' in '{token}'"
            )));
        }
    }
    if compound.tag.is_none()
        && compound.id.is_none()
        && compound.classes.is_empty()
        && compound.attrs.is_empty()
    {
        return Err(DomError::LocatorParse(format!("empty compound '{token}'")));
    }
    Ok(compound)
}

fn parse_tag_path(input: &str) -> Result<Vec<PathSegment>, DomError> {
    let mut segments = Vec::new();
    for raw in input.trim().trim_matches('/').split('/') {
        if raw.is_empty() {
            return Err(DomError::LocatorParse(format!("empty segment in '{input}'")));
        }
        let (tag, index) = match raw.split_once('[') {
            Some((tag, idx)) => {
                let idx = idx.strip_suffix(']').ok_or_else(|| {
                    DomError::LocatorParse(format!("unclosed index in '{raw}'"))
                })?;
                let index: usize = idx
                    .parse()
                    .map_err(|_| DomError::LocatorParse(format!("bad index in '{raw}'")))?;
                if index == 0 {
                    return Err(DomError::LocatorParse(format!(
                        "index is 1-based in '{raw}'"
                    )));
                }
                (tag, index)
            }
            None => (raw, 1),
        };
        segments.push(PathSegment {
            tag: tag.to_ascii_lowercase(),
            index,
        });
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample() -> Dom {
        Dom::parse_document(
            r#"<html><body>
            <div id="list" class="posts wide">
              <article class="post">one</article>
              <article class="post featured">two</article>
              <aside class="post">not an article</aside>
            </div>
            <div id="footer"><article class="post">outside</article></div>
            </body></html>"#,
        )
    }

    #[test]
    fn tag_and_class_selection() {
        let dom = sample();
        let posts = dom.select(&Locator::selector("article.post").unwrap());
        assert_eq!(posts.len(), 3);
        let featured = dom.select(&Locator::selector(".post.featured").unwrap());
        assert_eq!(featured.len(), 1);
        assert_eq!(dom.text_content(featured[0]), "two");
    }

    #[test]
    fn descendant_and_child_combinators() {
        let dom = sample();
        let scoped = dom.select(&Locator::selector("#list article").unwrap());
        assert_eq!(scoped.len(), 2);
        let direct = dom.select(&Locator::selector("div#footer > article").unwrap());
        assert_eq!(direct.len(), 1);
        assert_eq!(dom.text_content(direct[0]), "outside");
    }

    #[test]
    fn attribute_selectors() {
        let dom = sample();
        let by_attr = dom.select(&Locator::selector("[id=footer]").unwrap());
        assert_eq!(by_attr.len(), 1);
        let has_attr = dom.select(&Locator::selector("div[id]").unwrap());
        assert_eq!(has_attr.len(), 2);
    }

    #[test]
    fn groups_union_in_document_order() {
        let dom = sample();
        let both = dom.select(&Locator::selector("#list, #footer").unwrap());
        assert_eq!(both.len(), 2);
        assert_eq!(dom.attr(both[0], "id"), Some("list"));
    }

    #[test]
    fn tag_path_selection() {
        let dom = sample();
        let second = dom.select(&Locator::tag_path("html/body/div[2]").unwrap());
        assert_eq!(second.len(), 1);
        assert_eq!(dom.attr(second[0], "id"), Some("footer"));
        assert!(dom.select(&Locator::tag_path("html/body/div[9]").unwrap()).is_empty());
    }

    #[test]
    fn parse_errors_are_reported() {
        assert!(Locator::selector("").is_err());
        assert!(Locator::selector("[unclosed").is_err());
        assert!(Locator::tag_path("div[0]").is_err());
    }
}
