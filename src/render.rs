//! Markdown render pipeline.
//!
//! Splits a markdown source into a preamble and one section per top-level
//! heading, and carries the structured heading list alongside so the outline
//! never has to be re-derived from drawn output.

use std::borrow::Cow;
use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

use crate::error::RenderError;

/// A heading of the rendered document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingEntry {
    /// Unique within one document (`heading-{n}`)
    pub id: String,
    /// Plain display text, without inline markup
    pub text: String,
    /// 1..=6
    pub level: u8,
}

/// Where a heading is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Inside a quote or list before the first top-level heading
    Preamble,
    /// The heading that opens section `n`
    Heading(usize),
    /// Inside a quote or list in the body of section `n`
    Body(usize),
}

/// A drawable piece of a preamble or section body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Markdown(String),
    /// Source of a ```` ```mermaid ```` fence
    Diagram(String),
    /// A paragraph holding nothing but one image
    Image { url: String, alt: String },
}

/// A top-level heading together with the source it owns up to the next one
#[derive(Debug, Clone)]
pub struct Section {
    pub heading: HeadingEntry,
    pub heading_source: String,
    pub body: String,
    /// `body` split for drawing
    pub blocks: Vec<Block>,
}

/// Output of one render pass
#[derive(Debug, Clone, Default)]
pub struct RenderedDocument {
    /// Source before the first top-level heading
    pub preamble: String,
    pub preamble_blocks: Vec<Block>,
    pub sections: Vec<Section>,
    /// Every heading in document order, nested ones included
    outline: Vec<HeadingEntry>,
    /// Parallel to `outline`
    placements: Vec<Placement>,
    /// Link reference definitions, appended to every drawn chunk
    link_definitions: String,
}

impl RenderedDocument {
    /// All headings in document order
    pub fn headings(&self) -> Vec<HeadingEntry> {
        self.outline.clone()
    }

    /// The headings that open sections, used for collapsing
    pub fn section_headings(&self) -> Vec<HeadingEntry> {
        self.sections.iter().map(|s| s.heading.clone()).collect()
    }

    pub fn placement(&self, index: usize) -> Option<Placement> {
        self.placements.get(index).copied()
    }

    /// Headings nested in the preamble (`None`) or in a section body
    pub fn nested_in(&self, section: Option<usize>) -> impl Iterator<Item = &HeadingEntry> {
        let wanted = match section {
            None => Placement::Preamble,
            Some(n) => Placement::Body(n),
        };
        self.outline
            .iter()
            .zip(&self.placements)
            .filter(move |(_, p)| **p == wanted)
            .map(|(heading, _)| heading)
    }

    /// Source of `chunk` with the document's link reference definitions appended,
    /// so reference-style links resolve when a section is drawn on its own.
    pub fn with_links<'a>(&self, chunk: &'a str) -> Cow<'a, str> {
        if self.link_definitions.is_empty() {
            Cow::Borrowed(chunk)
        } else {
            Cow::Owned(format!("{}\n\n{}\n", chunk, self.link_definitions))
        }
    }
}

pub fn markdown_options() -> Options {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_FOOTNOTES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);
    opts
}

fn is_mermaid(info: &str) -> bool {
    info.split_whitespace().next() == Some("mermaid")
}

/// Alt text and target of a paragraph made of a single image
fn standalone_image(events: &[Event<'_>]) -> Option<Block> {
    let mut iter = events.iter().filter(|event| match event {
        Event::Start(Tag::Paragraph) | Event::End(TagEnd::Paragraph) => false,
        Event::SoftBreak => false,
        Event::Text(text) => !text.trim().is_empty(),
        _ => true,
    });

    let Some(Event::Start(Tag::Image { dest_url, .. })) = iter.next() else {
        return None;
    };
    let mut alt = String::new();
    for event in iter.by_ref() {
        match event {
            Event::End(TagEnd::Image) => break,
            Event::Text(text) | Event::Code(text) => alt.push_str(text),
            _ => {}
        }
    }
    if iter.next().is_some() {
        return None;
    }
    Some(Block::Image {
        url: dest_url.to_string(),
        alt,
    })
}

fn special_block(events: &[Event<'_>]) -> Option<Block> {
    match events.first() {
        Some(Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info)))) if is_mermaid(info) => {
            let source = events
                .iter()
                .filter_map(|event| match event {
                    Event::Text(text) => Some(text.as_ref()),
                    _ => None,
                })
                .collect::<String>();
            Some(Block::Diagram(source))
        }
        Some(Event::Start(Tag::Paragraph)) => standalone_image(events),
        _ => None,
    }
}

fn push_markdown(blocks: &mut Vec<Block>, text: &str) {
    if !text.trim().is_empty() {
        blocks.push(Block::Markdown(text.to_string()));
    }
}

/// Split a chunk of source into markdown runs, diagrams and standalone images.
///
/// Only top-level blocks are lifted out; a diagram inside a list stays code.
pub fn split_blocks(chunk: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut cursor = 0;
    let mut depth = 0usize;
    // Span and events of the top-level block being read
    let mut open: Option<(Range<usize>, Vec<Event<'_>>)> = None;

    for (event, range) in Parser::new_ext(chunk, markdown_options()).into_offset_iter() {
        match &event {
            Event::Start(_) => {
                if depth == 0 {
                    open = Some((range, Vec::new()));
                }
                depth += 1;
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            _ => {}
        }

        let Some((_, events)) = open.as_mut() else {
            continue;
        };
        events.push(event);
        if depth > 0 {
            continue;
        }

        if let Some((span, events)) = open.take() {
            if let Some(block) = special_block(&events) {
                push_markdown(&mut blocks, &chunk[cursor..span.start]);
                blocks.push(block);
                cursor = span.end;
            }
        }
    }
    push_markdown(&mut blocks, &chunk[cursor..]);

    blocks
}

struct RawHeading {
    level: u8,
    text: String,
    span: Range<usize>,
    /// Not inside a quote or list
    top_level: bool,
}

/// Render `markdown` into sections and headings
pub fn render(markdown: &str) -> Result<RenderedDocument, RenderError> {
    if markdown.contains('\0') {
        return Err(RenderError::Binary);
    }

    let parser = Parser::new_ext(markdown, markdown_options());

    let link_definitions = parser
        .reference_definitions()
        .iter()
        .map(|(_, def)| markdown[def.span.clone()].trim_end())
        .collect::<Vec<_>>()
        .join("\n");

    let mut headings: Vec<RawHeading> = Vec::new();
    let mut current: Option<RawHeading> = None;
    let mut depth = 0usize;

    for (event, range) in parser.into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current = Some(RawHeading {
                    level: level as u8,
                    text: String::new(),
                    span: range,
                    top_level: depth == 0,
                });
                depth += 1;
            }
            Event::End(TagEnd::Heading(_)) => {
                depth = depth.saturating_sub(1);
                if let Some(heading) = current.take() {
                    headings.push(heading);
                }
            }
            Event::Start(_) => depth += 1,
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Text(text) | Event::Code(text) | Event::InlineMath(text) => {
                if let Some(heading) = current.as_mut() {
                    heading.text.push_str(&text);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some(heading) = current.as_mut() {
                    heading.text.push(' ');
                }
            }
            _ => {}
        }
    }

    // Only top-level headings split the source
    let starts: Vec<usize> = headings
        .iter()
        .filter(|h| h.top_level)
        .map(|h| h.span.start)
        .collect();
    let preamble_end = starts.first().copied().unwrap_or(markdown.len());
    let preamble = markdown[..preamble_end].to_string();

    let mut outline = Vec::with_capacity(headings.len());
    let mut placements = Vec::with_capacity(headings.len());
    let mut sections: Vec<Section> = Vec::with_capacity(starts.len());

    for (index, raw) in headings.into_iter().enumerate() {
        let entry = HeadingEntry {
            id: format!("heading-{}", index),
            text: raw.text.trim().to_string(),
            level: raw.level,
        };

        let placement = if raw.top_level {
            let section = sections.len();
            let body_end = starts.get(section + 1).copied().unwrap_or(markdown.len());
            sections.push(Section {
                heading: entry.clone(),
                heading_source: markdown[raw.span.clone()].to_string(),
                body: markdown[raw.span.end..body_end].to_string(),
                blocks: split_blocks(&markdown[raw.span.end..body_end]),
            });
            Placement::Heading(section)
        } else {
            match sections.len() {
                0 => Placement::Preamble,
                n => Placement::Body(n - 1),
            }
        };

        outline.push(entry);
        placements.push(placement);
    }

    log::debug!(
        "Rendered document: {} headings in {} sections, {} link definitions",
        outline.len(),
        sections.len(),
        link_definitions.lines().count()
    );

    Ok(RenderedDocument {
        preamble_blocks: split_blocks(&preamble),
        preamble,
        sections,
        outline,
        placements,
        link_definitions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn outline(doc: &RenderedDocument) -> Vec<(u8, String)> {
        doc.headings().into_iter().map(|h| (h.level, h.text)).collect()
    }

    #[test]
    fn test_outline_matches_headings_in_order() {
        let doc = render("# A\n## B\ntext\n## C").unwrap();
        assert_eq!(
            outline(&doc),
            vec![(1, "A".to_string()), (2, "B".to_string()), (2, "C".to_string())]
        );
        let ids: Vec<_> = doc.headings().into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["heading-0", "heading-1", "heading-2"]);
    }

    #[test]
    fn test_sections_partition_the_source() {
        let src = "intro\n\n# A\nalpha\n## B\nbeta\n";
        let doc = render(src).unwrap();

        assert_eq!(doc.preamble, "intro\n\n");
        assert_eq!(doc.sections[0].heading_source.trim_end(), "# A");
        assert_eq!(doc.sections[0].body.trim(), "alpha");
        assert_eq!(doc.sections[1].heading_source.trim_end(), "## B");
        assert_eq!(doc.sections[1].body.trim(), "beta");

        let rebuilt: String = std::iter::once(doc.preamble.clone())
            .chain(
                doc.sections
                    .iter()
                    .map(|s| format!("{}{}", s.heading_source, s.body)),
            )
            .collect();
        assert_eq!(rebuilt, src);
    }

    #[test]
    fn test_heading_text_strips_inline_markup() {
        let doc = render("## The `render` **pipeline**\n").unwrap();
        assert_eq!(outline(&doc), vec![(2, "The render pipeline".to_string())]);
    }

    #[test]
    fn test_setext_headings_are_recognised() {
        let doc = render("Title\n=====\n\nSub\n---\n").unwrap();
        assert_eq!(
            outline(&doc),
            vec![(1, "Title".to_string()), (2, "Sub".to_string())]
        );
    }

    #[test]
    fn test_hashes_inside_code_blocks_are_not_headings() {
        let doc = render("# Real\n\n```sh\n# comment\n```\n").unwrap();
        assert_eq!(outline(&doc), vec![(1, "Real".to_string())]);
    }

    #[test]
    fn test_nested_headings_join_the_outline() {
        let doc = render("# Top\n\n> ## Quoted\n\n- ### In list\n").unwrap();
        assert_eq!(
            outline(&doc),
            vec![
                (1, "Top".to_string()),
                (2, "Quoted".to_string()),
                (3, "In list".to_string())
            ]
        );
        let ids: Vec<_> = doc.headings().into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["heading-0", "heading-1", "heading-2"]);

        // They stay in the body of the section that contains them
        assert_eq!(doc.sections.len(), 1);
        assert!(doc.sections[0].body.contains("> ## Quoted"));
        assert_eq!(doc.placement(0), Some(Placement::Heading(0)));
        assert_eq!(doc.placement(1), Some(Placement::Body(0)));
        assert_eq!(doc.placement(2), Some(Placement::Body(0)));
        let nested: Vec<_> = doc.nested_in(Some(0)).map(|h| h.id.as_str()).collect();
        assert_eq!(nested, vec!["heading-1", "heading-2"]);
    }

    #[test]
    fn test_section_ids_follow_the_full_outline() {
        let doc = render("> # Quoted first\n\n# A\n\n> ## Inside A\n\n# B\n").unwrap();
        assert_eq!(doc.placement(0), Some(Placement::Preamble));
        assert_eq!(doc.nested_in(None).count(), 1);

        let section_ids: Vec<_> = doc.section_headings().into_iter().map(|h| h.id).collect();
        assert_eq!(section_ids, vec!["heading-1", "heading-3"]);
        assert_eq!(doc.placement(3), Some(Placement::Heading(1)));
        assert_eq!(doc.placement(9), None);
        assert!(doc.preamble.contains("> # Quoted first"));
    }

    #[test]
    fn test_mermaid_fences_become_diagrams() {
        let doc = render("# Flow\nbefore\n\n```mermaid\ngraph TD\n  A --> B\n```\n\nafter\n").unwrap();
        let blocks = &doc.sections[0].blocks;
        assert_eq!(blocks.len(), 3);
        assert!(matches!(&blocks[0], Block::Markdown(text) if text.trim() == "before"));
        assert_eq!(blocks[1], Block::Diagram("graph TD\n  A --> B\n".to_string()));
        assert!(matches!(&blocks[2], Block::Markdown(text) if text.trim() == "after"));
    }

    #[test]
    fn test_other_fences_stay_markdown() {
        let blocks = split_blocks("```rust\nfn main() {}\n```\n\n- item\n\n  ```mermaid\n  graph TD\n  ```\n");
        assert_eq!(blocks.len(), 1);
        assert!(matches!(&blocks[0], Block::Markdown(_)));
    }

    #[test]
    fn test_standalone_images_are_lifted_out() {
        let blocks = split_blocks("![A *chart*](img/chart.png)\n\ntext with ![inline](x.png) image\n");
        assert_eq!(
            blocks[0],
            Block::Image {
                url: "img/chart.png".to_string(),
                alt: "A chart".to_string()
            }
        );
        assert_eq!(blocks.len(), 2);
        assert!(matches!(&blocks[1], Block::Markdown(text) if text.contains("![inline](x.png)")));
    }

    #[test]
    fn test_preamble_is_split_too() {
        let doc = render("```mermaid\npie\n```\n# A\n").unwrap();
        assert_eq!(doc.preamble_blocks, vec![Block::Diagram("pie\n".to_string())]);
    }

    #[test]
    fn test_no_headings_yields_empty_outline() {
        let doc = render("just a paragraph").unwrap();
        assert!(doc.sections.is_empty());
        assert_eq!(doc.preamble, "just a paragraph");
    }

    #[test]
    fn test_binary_input_fails() {
        assert_eq!(render("# A\0B").unwrap_err(), RenderError::Binary);
    }

    #[test]
    fn test_link_definitions_are_shared_with_every_chunk() {
        let doc = render("# A\nsee [docs][d]\n# B\n\n[d]: https://example.org\n").unwrap();
        let chunk = doc.with_links(&doc.sections[0].body);
        assert!(chunk.contains("[d]: https://example.org"));

        let plain = render("# A\nno links\n").unwrap();
        assert!(matches!(plain.with_links("x"), Cow::Borrowed("x")));
    }
}
