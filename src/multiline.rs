// Multiline SVG text reflow.
//
// Authoring tools emit multi-line labels as
//   <text x=".." y=".."><tspan dy="1.1em">line 1</tspan><tspan dy="1.1em">line 2</tspan></text>
// which several HTML-to-PDF renderers place on a single baseline. Each line is rewritten
// into its own <text> element with absolute coordinates.

use crate::font_size::{DEFAULT_FONT_SIZE, resolve_font_size};
use crate::length::{LINE_HEIGHT_FACTOR, format_number, leading_number, resolve_length};
use crate::svg_tree::{NodeId, SvgTree};

#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub x: f64,
    pub y: f64,
    pub text: String,
}

/// Direct `tspan` children of a `text` element, in document order.
pub fn line_segments(tree: &SvgTree, text_node: NodeId) -> Vec<NodeId> {
    tree.element_children(text_node)
        .filter(|child| tree.is_element_named(*child, "tspan"))
        .collect()
}

/// Resolved position and content of every line of `text_node`. Empty when the element
/// has no line segments.
pub fn layout_lines(tree: &SvgTree, text_node: NodeId) -> Vec<TextLine> {
    let segments = line_segments(tree, text_node);
    if segments.is_empty() {
        return Vec::new();
    }

    let font_size = resolve_font_size(tree, text_node).unwrap_or(DEFAULT_FONT_SIZE);
    let default_inc = font_size * LINE_HEIGHT_FACTOR;

    let coord = |node: NodeId, name: &str| tree.attribute(node, name).map(leading_number);
    let base_x = coord(text_node, "x");
    let base_y = coord(text_node, "y");

    let mut cursor = base_y.unwrap_or(0.0);
    let mut lines = Vec::with_capacity(segments.len());
    for (idx, segment) in segments.iter().copied().enumerate() {
        if idx == 0 {
            if let Some(y) = coord(segment, "y") {
                cursor = y;
            }
        } else {
            let mut inc = match tree.attribute(segment, "dy") {
                Some(dy) => resolve_length(dy, font_size, false),
                None => default_inc,
            };
            // dy="0" is what some exporters write for "use the default spacing"; honoring it
            // literally stacks every line on one baseline.
            if inc == 0.0 {
                inc = default_inc;
            }
            cursor += inc;
        }

        lines.push(TextLine {
            x: coord(segment, "x").or(base_x).unwrap_or(0.0),
            y: cursor,
            text: tree.text_content(segment).trim().to_string(),
        });
    }
    lines
}

/// Replaces `text_node` by one `text` element per line segment and returns the new nodes
/// in line order. A `text` without segments is left alone.
pub fn expand_text(tree: &mut SvgTree, text_node: NodeId) -> Vec<NodeId> {
    let lines = layout_lines(tree, text_node);
    if lines.is_empty() {
        return Vec::new();
    }
    let Some(template) = tree.element(text_node).cloned() else {
        return Vec::new();
    };

    let mut created = Vec::with_capacity(lines.len());
    for line in lines {
        let mut data = template.clone();
        // Re-expanding the same composite must not produce duplicate ids.
        data.remove_attribute("id");
        data.set_attribute("x", format_number(line.x));
        data.set_attribute("y", format_number(line.y));
        let node = tree.create_element(data);
        if !line.text.is_empty() {
            let text = tree.create_text(line.text);
            tree.append_child(node, text);
        }
        created.push(node);
    }

    if !tree.replace_with(text_node, &created) {
        return Vec::new();
    }
    created
}

/// Expands every `text` element with line segments. Returns how many were expanded.
pub fn expand_all(tree: &mut SvgTree) -> usize {
    let candidates: Vec<NodeId> = tree
        .descendants(tree.root())
        .into_iter()
        .filter(|id| tree.is_element_named(*id, "text"))
        .filter(|id| !line_segments(tree, *id).is_empty())
        .collect();

    let mut expanded = 0usize;
    for node in candidates {
        if !expand_text(tree, node).is_empty() {
            expanded += 1;
        }
    }
    expanded
}
