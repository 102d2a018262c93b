//! HTML rendering for PDF export.
//!
//! There is no native print pipeline, so export writes a self-contained page
//! that opens the browser's print dialog as soon as it loads.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use pulldown_cmark::{html, Parser};

use crate::collapse::SectionVisibility;
use crate::render::{markdown_options, Block, HeadingEntry, RenderedDocument};

fn push_markdown(out: &mut String, markdown: &str) {
    html::push_html(out, Parser::new_ext(markdown, markdown_options()));
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Give the first `<hN>` tags of `html` the ids of `headings`, in order
fn tag_headings<'a>(html: String, headings: impl Iterator<Item = &'a HeadingEntry>) -> String {
    headings.fold(html, |html, heading| {
        let open = format!("<h{}>", heading.level);
        let with_id = format!("<h{} id=\"{}\">", heading.level, escape_html(&heading.id));
        html.replacen(&open, &with_id, 1)
    })
}

fn push_chunk<'a>(
    out: &mut String,
    markdown: &str,
    headings: impl Iterator<Item = &'a HeadingEntry>,
) {
    let mut html = String::new();
    push_markdown(&mut html, markdown);
    out.push_str(&tag_headings(html, headings));
}

fn push_blocks<'a>(
    out: &mut String,
    doc: &RenderedDocument,
    blocks: &[Block],
    headings: impl Iterator<Item = &'a HeadingEntry>,
    diagram_svg: &dyn Fn(&str) -> Option<String>,
) {
    let mut html = String::new();
    for block in blocks {
        match block {
            Block::Markdown(source) => push_markdown(&mut html, &doc.with_links(source)),
            Block::Diagram(source) => match diagram_svg(source) {
                Some(svg) => {
                    html.push_str("<figure class=\"diagram\">");
                    html.push_str(&svg);
                    html.push_str("</figure>\n");
                }
                None => {
                    html.push_str("<pre class=\"diagram-error\"><code>");
                    html.push_str(&escape_html(source));
                    html.push_str("</code></pre>\n");
                }
            },
            Block::Image { url, alt } => {
                html.push_str(&format!(
                    "<p><img src=\"{}\" alt=\"{}\"></p>\n",
                    escape_html(url),
                    escape_html(alt)
                ));
            }
        }
    }
    out.push_str(&tag_headings(html, headings));
}

/// Render the visible parts of `doc` to an HTML fragment, with heading ids.
///
/// `diagram_svg` turns mermaid source into inline SVG; diagrams it cannot
/// draw are printed as their source.
pub fn document_html(
    doc: &RenderedDocument,
    visibility: &[SectionVisibility],
    diagram_svg: &dyn Fn(&str) -> Option<String>,
) -> String {
    let mut out = String::new();
    push_blocks(&mut out, doc, &doc.preamble_blocks, doc.nested_in(None), diagram_svg);

    for (index, (section, vis)) in doc.sections.iter().zip(visibility).enumerate() {
        if vis.heading {
            push_chunk(
                &mut out,
                &doc.with_links(&section.heading_source),
                std::iter::once(&section.heading),
            );
        }
        if vis.body {
            push_blocks(&mut out, doc, &section.blocks, doc.nested_in(Some(index)), diagram_svg);
        }
    }

    out
}

const PRINT_STYLE: &str = r#"
body { font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif; line-height: 1.6; max-width: 860px; margin: 2rem auto; padding: 0 1rem; color: #1f2937; }
figure.diagram { margin: 1rem 0; text-align: center; }
figure.diagram svg { max-width: 100%; height: auto; }
pre.diagram-error { color: #b91c1c; }
pre { background: #f3f4f6; padding: 12px; border-radius: 6px; overflow-x: auto; }
code { font-family: ui-monospace, "SFMono-Regular", Menlo, monospace; }
table { border-collapse: collapse; }
th, td { border: 1px solid #d1d5db; padding: 4px 8px; }
blockquote { border-left: 4px solid #d1d5db; margin-left: 0; padding-left: 1rem; color: #4b5563; }
img { max-width: 100%; }
@media print { body { margin: 0; max-width: none; } h1, h2, h3 { page-break-after: avoid; } pre { white-space: pre-wrap; } }
"#;

/// Wrap a fragment in a standalone page that prints itself
pub fn print_page(title: &str, fragment: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}\n<script>window.addEventListener('load', () => window.print());</script>\n</body>\n</html>\n",
        escape_html(title),
        PRINT_STYLE,
        fragment
    )
}

/// Write the print page for `title` into `dir`, returning its path
pub fn write_print_html(title: &str, fragment: &str, dir: &Path) -> io::Result<PathBuf> {
    let stem = Path::new(title)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    let path = dir.join(format!("{}.print.html", stem));
    fs::write(&path, print_page(title, fragment))?;
    log::info!("Wrote print snapshot to {:?}", path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collapse::{visibility, CollapseState};
    use crate::render::render;

    fn no_diagrams(_: &str) -> Option<String> {
        None
    }

    fn all_visible(doc: &RenderedDocument) -> Vec<SectionVisibility> {
        visibility(&doc.section_headings(), &CollapseState::default())
    }

    #[test]
    fn test_headings_carry_ids() {
        let doc = render("# A\ntext\n## B\n").unwrap();
        let vis = visibility(&doc.section_headings(), &CollapseState::default());
        let html = document_html(&doc, &vis, &no_diagrams);

        assert!(html.contains("<h1 id=\"heading-0\">A</h1>"));
        assert!(html.contains("<h2 id=\"heading-1\">B</h2>"));
        assert!(html.contains("<p>text</p>"));
    }

    #[test]
    fn test_collapsed_sections_are_left_out() {
        let doc = render("# A\nalpha\n## B\nbeta\n# C\ngamma\n").unwrap();
        let mut state = CollapseState::default();
        state.toggle("heading-0");
        let html = document_html(&doc, &visibility(&doc.section_headings(), &state), &no_diagrams);

        assert!(html.contains("heading-0"));
        assert!(!html.contains("alpha"));
        assert!(!html.contains("beta"));
        assert!(html.contains("gamma"));
    }

    #[test]
    fn test_nested_headings_carry_ids() {
        let doc = render("# A\n\n> ## Quoted\n\n# B\n").unwrap();
        let html = document_html(&doc, &visibility(&doc.section_headings(), &CollapseState::default()), &no_diagrams);

        assert!(html.contains("<h1 id=\"heading-0\">A</h1>"));
        assert!(html.contains("<h2 id=\"heading-1\">Quoted</h2>"));
        assert!(html.contains("<h1 id=\"heading-2\">B</h1>"));
    }

    #[test]
    fn test_reference_links_resolve_in_headings() {
        let doc = render("# See [docs][d]\n\n[d]: https://example.org\n").unwrap();
        let html = document_html(&doc, &visibility(&doc.section_headings(), &CollapseState::default()), &no_diagrams);
        assert!(html.contains("<a href=\"https://example.org\">docs</a>"));
    }

    #[test]
    fn test_diagrams_are_inlined_as_svg() {
        let doc = render("# A\n\n```mermaid\ngraph TD\n```\n").unwrap();
        let html = document_html(&doc, &all_visible(&doc), &|source: &str| {
            Some(format!("<svg data-lines=\"{}\"></svg>", source.lines().count()))
        });
        assert!(html.contains("<figure class=\"diagram\"><svg data-lines=\"1\"></svg></figure>"));
        assert!(!html.contains("language-mermaid"));
    }

    #[test]
    fn test_undrawable_diagrams_print_their_source() {
        let doc = render("```mermaid\na --> <b>\n```\n").unwrap();
        let html = document_html(&doc, &all_visible(&doc), &no_diagrams);
        assert!(html.contains("<pre class=\"diagram-error\"><code>a --&gt; &lt;b&gt;\n</code></pre>"));
    }

    #[test]
    fn test_standalone_images_are_kept() {
        let doc = render("# A\n\n![Chart](chart.png)\n").unwrap();
        let html = document_html(&doc, &all_visible(&doc), &no_diagrams);
        assert!(html.contains("<img src=\"chart.png\" alt=\"Chart\">"));
    }

    #[test]
    fn test_print_page_escapes_title() {
        let page = print_page("<notes>.md", "<p>x</p>");
        assert!(page.contains("<title>&lt;notes&gt;.md</title>"));
        assert!(page.contains("window.print()"));
        assert!(page.contains("<p>x</p>"));
    }

    #[test]
    fn test_write_print_html() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_print_html("notes.md", "<p>x</p>", dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "notes.print.html");
        assert!(fs::read_to_string(path).unwrap().contains("<p>x</p>"));
    }

    #[test]
    fn test_print_file_keeps_spaces_and_symbols_in_its_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_print_html("My Notes #1 (draft).md", "<p>x</p>", dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "My Notes #1 (draft).print.html");
        assert!(path.exists());
    }
}
