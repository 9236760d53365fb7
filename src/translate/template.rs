//! Format templates such as `VARIABLE_FEATURE[INDEX]`, parsed once into segments.

use super::types::Labels;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Variable = 0,
    Feature = 1,
    Index = 2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(Placeholder),
}

/// Values bound to the placeholders of a template.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Captures<'s> {
    slots: [Option<&'s str>; 3],
}

impl<'s> Captures<'s> {
    pub fn variable(&self) -> &'s str { self.slots[0].unwrap_or("") }
    pub fn feature(&self) -> Option<&'s str> { self.slots[1] }
    pub fn index(&self) -> Option<&'s str> { self.slots[2] }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    text: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(text: &str, labels: &Labels) -> Self {
        let tokens = [
            (labels.variable.as_str(), Placeholder::Variable),
            (labels.feature.as_str(), Placeholder::Feature),
            (labels.index.as_str(), Placeholder::Index),
        ];
        let mut segments = Vec::new();
        let mut rest = text;
        loop {
            // Earliest label wins; on a tie the longest one.
            let next = tokens
                .iter()
                .filter(|(label, _)| !label.is_empty())
                .filter_map(|&(label, p)| rest.find(label).map(|at| (at, label.len(), p)))
                .min_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
            match next {
                Some((at, len, p)) => {
                    if at > 0 {
                        segments.push(Segment::Literal(rest[..at].to_string()));
                    }
                    segments.push(Segment::Slot(p));
                    rest = &rest[at + len..];
                }
                None => {
                    if !rest.is_empty() {
                        segments.push(Segment::Literal(rest.to_string()));
                    }
                    break;
                }
            }
        }
        Self { text: text.to_string(), segments }
    }

    pub fn text(&self) -> &str { &self.text }

    pub fn has(&self, p: Placeholder) -> bool {
        self.segments.iter().any(|s| *s == Segment::Slot(p))
    }

    /// The template with its variable and feature placeholders removed.
    pub fn separator(&self) -> String {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Literal(l) => Some(l.as_str()),
                Segment::Slot(_) => None,
            })
            .collect()
    }

    /// Segment position of the first occurrence of a placeholder.
    pub fn position(&self, p: Placeholder) -> Option<usize> {
        self.segments.iter().position(|s| *s == Segment::Slot(p))
    }

    pub fn render(&self, variable: &str, feature: Option<&str>, index: Option<&str>) -> String {
        let mut out = String::with_capacity(self.text.len() + variable.len());
        for seg in &self.segments {
            match seg {
                Segment::Literal(l) => out.push_str(l),
                Segment::Slot(Placeholder::Variable) => out.push_str(variable),
                Segment::Slot(Placeholder::Feature) => out.push_str(feature.unwrap_or("")),
                Segment::Slot(Placeholder::Index) => out.push_str(index.unwrap_or("")),
            }
        }
        out
    }

    /// First way of reading `input` through this template that `accept` agrees with.
    ///
    /// Placeholders bind non-empty text; shorter bindings are tried first, so the
    /// variable is read as short as possible. A placeholder repeated in the template must
    /// bind the same text each time.
    pub fn find_match<'s>(
        &self,
        input: &'s str,
        mut accept: impl FnMut(&Captures<'s>) -> bool,
    ) -> Option<Captures<'s>> {
        let mut found = None;
        self.walk(0, input, 0, Captures::default(), &mut |c: &Captures<'s>| {
            if accept(c) {
                found = Some(*c);
                true
            } else {
                false
            }
        });
        found
    }

    fn walk<'s>(
        &self,
        seg: usize,
        input: &'s str,
        pos: usize,
        caps: Captures<'s>,
        accept: &mut dyn FnMut(&Captures<'s>) -> bool,
    ) -> bool {
        let Some(segment) = self.segments.get(seg) else {
            return pos == input.len() && accept(&caps);
        };
        let rest = &input[pos..];
        match segment {
            Segment::Literal(l) => {
                rest.starts_with(l.as_str()) && self.walk(seg + 1, input, pos + l.len(), caps, accept)
            }
            Segment::Slot(p) => {
                let ends = rest.char_indices().skip(1).map(|(i, _)| i).chain(std::iter::once(rest.len()));
                for end in ends {
                    if end == 0 {
                        continue;
                    }
                    let value = &rest[..end];
                    if caps.slots[*p as usize].is_some_and(|prev| prev != value) {
                        continue;
                    }
                    let mut next = caps;
                    next.slots[*p as usize] = Some(value);
                    if self.walk(seg + 1, input, pos + end, next, accept) {
                        return true;
                    }
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn t(text: &str) -> Template { Template::parse(text, &Labels::default()) }

    #[rstest]
    #[case("VARIABLE_FEATURE", "_")]
    #[case("VARIABLE.FEATURE", ".")]
    #[case("FEATURE_of_VARIABLE", "_of_")]
    fn separator_strips_variable_and_feature(#[case] template: &str, #[case] sep: &str) {
        assert_eq!(t(template).separator(), sep);
    }

    #[test]
    fn render_fills_every_slot() {
        let tpl = t("VARIABLE_FEATURE[INDEX]");
        assert_eq!(tpl.render("Muon", Some("pt"), Some("0")), "Muon_pt[0]");
        assert!(tpl.has(Placeholder::Index));
        assert!(tpl.position(Placeholder::Feature) < tpl.position(Placeholder::Index));
    }

    #[test]
    fn match_prefers_the_shortest_variable() {
        let tpl = t("VARIABLE_FEATURE");
        let m = tpl.find_match("Jet_btag_deep", |_| true).unwrap();
        assert_eq!(m.variable(), "Jet");
        assert_eq!(m.feature(), Some("btag_deep"));

        let m = tpl.find_match("Jet_btag_deep", |c| c.variable() == "Jet_btag").unwrap();
        assert_eq!(m.feature(), Some("deep"));
    }

    #[test]
    fn index_may_contain_brackets() {
        let tpl = t("VARIABLE_FEATURE[INDEX]");
        let m = tpl.find_match("Muon_pt[Muon_idx[0]]", |_| true).unwrap();
        assert_eq!((m.variable(), m.feature(), m.index()), ("Muon", Some("pt"), Some("Muon_idx[0]")));
        assert!(tpl.find_match("Muon_pt", |_| true).is_none());
    }

    #[test]
    fn repeated_placeholder_binds_once() {
        let tpl = t("VARIABLE::VARIABLE");
        assert!(tpl.find_match("ab::ab", |_| true).is_some());
        assert!(tpl.find_match("ab::cd", |_| true).is_none());
    }
}
