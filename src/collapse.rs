//! Collapsible sections.
//!
//! A heading owns every following section up to the next heading of equal or
//! shallower level. Collapsing it hides its body and everything it owns. This
//! state is pure visibility and never touches the outline or the active
//! heading.

use std::collections::HashSet;

use crate::render::HeadingEntry;

/// What to draw for one section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionVisibility {
    pub heading: bool,
    pub body: bool,
}

#[derive(Debug, Default)]
pub struct CollapseState {
    collapsed: HashSet<String>,
}

/// Collapsed ids captured by [`CollapseState::expand_for_print`]
#[must_use = "pass to CollapseState::restore once the print snapshot is taken"]
#[derive(Debug)]
pub struct PrintExpansion {
    collapsed: HashSet<String>,
}

impl CollapseState {
    pub fn is_collapsed(&self, id: &str) -> bool {
        self.collapsed.contains(id)
    }

    /// Flip a heading, returning whether it is now collapsed
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.collapsed.remove(id) {
            false
        } else {
            self.collapsed.insert(id.to_string());
            true
        }
    }

    pub fn expand(&mut self, id: &str) {
        self.collapsed.remove(id);
    }

    pub fn reset(&mut self) {
        self.collapsed.clear();
    }

    /// Expand every collapsed ancestor of the section at `index`
    pub fn reveal(&mut self, headings: &[HeadingEntry], index: usize) {
        let Some(target) = headings.get(index) else {
            return;
        };
        let mut level = target.level;
        for heading in headings[..index].iter().rev() {
            if heading.level < level {
                self.collapsed.remove(&heading.id);
                level = heading.level;
            }
        }
    }

    /// Expand everything for a print snapshot
    pub fn expand_for_print(&mut self) -> PrintExpansion {
        PrintExpansion {
            collapsed: std::mem::take(&mut self.collapsed),
        }
    }

    pub fn restore(&mut self, expansion: PrintExpansion) {
        self.collapsed = expansion.collapsed;
    }
}

pub fn visibility(headings: &[HeadingEntry], state: &CollapseState) -> Vec<SectionVisibility> {
    let mut result = Vec::with_capacity(headings.len());
    // Level of the collapsed heading currently hiding its descendants
    let mut hidden_below: Option<u8> = None;

    for heading in headings {
        if let Some(level) = hidden_below {
            if heading.level > level {
                result.push(SectionVisibility {
                    heading: false,
                    body: false,
                });
                continue;
            }
            hidden_below = None;
        }

        let collapsed = state.is_collapsed(&heading.id);
        if collapsed {
            hidden_below = Some(heading.level);
        }
        result.push(SectionVisibility {
            heading: true,
            body: !collapsed,
        });
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn headings(levels: &[u8]) -> Vec<HeadingEntry> {
        levels
            .iter()
            .enumerate()
            .map(|(i, &level)| HeadingEntry {
                id: format!("heading-{}", i),
                text: format!("H{}", i),
                level,
            })
            .collect()
    }

    fn shown(vis: &[SectionVisibility]) -> Vec<(bool, bool)> {
        vis.iter().map(|v| (v.heading, v.body)).collect()
    }

    #[test]
    fn test_everything_visible_by_default() {
        let hs = headings(&[1, 2, 2]);
        let vis = visibility(&hs, &CollapseState::default());
        assert_eq!(shown(&vis), vec![(true, true); 3]);
    }

    #[test]
    fn test_collapse_hides_owned_sections_only() {
        // h1 h2 h3 h2 h1
        let hs = headings(&[1, 2, 3, 2, 1]);
        let mut state = CollapseState::default();
        assert!(state.toggle("heading-1"));

        let vis = visibility(&hs, &state);
        assert_eq!(
            shown(&vis),
            vec![
                (true, true),
                (true, false),
                (false, false),
                (true, true),
                (true, true),
            ]
        );
    }

    #[test]
    fn test_toggle_twice_restores() {
        let hs = headings(&[1, 2]);
        let mut state = CollapseState::default();
        state.toggle("heading-0");
        assert!(!state.toggle("heading-0"));
        assert_eq!(shown(&visibility(&hs, &state)), vec![(true, true); 2]);
    }

    #[test]
    fn test_nested_collapse_inside_collapsed_parent() {
        let hs = headings(&[1, 2, 3, 1]);
        let mut state = CollapseState::default();
        state.toggle("heading-0");
        state.toggle("heading-1");

        let vis = visibility(&hs, &state);
        assert_eq!(
            shown(&vis),
            vec![(true, false), (false, false), (false, false), (true, true)]
        );
    }

    #[test]
    fn test_reveal_expands_ancestors() {
        let hs = headings(&[1, 2, 3, 2]);
        let mut state = CollapseState::default();
        state.toggle("heading-0");
        state.toggle("heading-1");
        state.toggle("heading-3");

        state.reveal(&hs, 2);

        assert!(!state.is_collapsed("heading-0"));
        assert!(!state.is_collapsed("heading-1"));
        // sibling branch untouched
        assert!(state.is_collapsed("heading-3"));
    }

    #[test]
    fn test_expand_opens_only_that_section() {
        let hs = headings(&[1, 1]);
        let mut state = CollapseState::default();
        state.toggle("heading-0");
        state.toggle("heading-1");

        state.expand("heading-1");
        state.expand("heading-7");

        assert_eq!(shown(&visibility(&hs, &state)), vec![(true, false), (true, true)]);
    }

    #[test]
    fn test_print_expansion_round_trip() {
        let hs = headings(&[1, 2]);
        let mut state = CollapseState::default();
        state.toggle("heading-0");

        let expansion = state.expand_for_print();
        assert_eq!(shown(&visibility(&hs, &state)), vec![(true, true); 2]);

        state.restore(expansion);
        assert!(state.is_collapsed("heading-0"));
    }
}
