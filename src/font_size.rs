use crate::length::{LengthUnit, parse_length, resolve_length};
use crate::svg_tree::{NodeId, SvgTree};

/// Font size assumed when nothing in the ancestor chain declares one.
pub const DEFAULT_FONT_SIZE: f64 = 16.0;

/// Effective font size in pixels for `node`: its own `font-size` attribute or inline
/// style, else the nearest `text`/`g`/`svg` ancestor that declares one.
pub fn resolve_font_size(tree: &SvgTree, node: NodeId) -> Option<f64> {
    if let Some(size) = declared_font_size(tree, node) {
        return Some(size);
    }
    tree.ancestors(node)
        .filter(|id| matches!(tree.local_name(*id), Some("text" | "g" | "svg")))
        .find_map(|id| declared_font_size(tree, id))
}

fn declared_font_size(tree: &SvgTree, node: NodeId) -> Option<f64> {
    let el = tree.element(node)?;
    if let Some(raw) = el.attribute("font-size") {
        return Some(resolve_length(raw, DEFAULT_FONT_SIZE, true));
    }
    el.attribute("style").and_then(style_font_size)
}

/// `font-size` from an inline style declaration list. Only a leading number with an
/// optional px/pt/em unit is understood; keywords are skipped.
pub fn style_font_size(style: &str) -> Option<f64> {
    for decl in style.split(';') {
        let Some((key, value)) = decl.split_once(':') else {
            continue;
        };
        if !key.trim().eq_ignore_ascii_case("font-size") {
            continue;
        }
        if let Some(length) = leading_length(value) {
            return Some(resolve_length(&length, DEFAULT_FONT_SIZE, true));
        }
    }
    None
}

// Cuts "12.5 px !important" down to "12.5px" so the length grammar applies.
fn leading_length(value: &str) -> Option<String> {
    let value = value.trim();
    let digits_end = value
        .char_indices()
        .find(|(_, ch)| !(ch.is_ascii_digit() || *ch == '.'))
        .map(|(idx, _)| idx)
        .unwrap_or(value.len());
    let number = &value[..digits_end];
    parse_length(number)?;

    let rest = value[digits_end..].trim_start();
    let unit = [LengthUnit::Px, LengthUnit::Pt, LengthUnit::Em]
        .into_iter()
        .find(|unit| {
            rest.get(..2)
                .is_some_and(|head| head.eq_ignore_ascii_case(unit.as_str()))
        });
    Some(match unit {
        Some(unit) => format!("{number}{}", unit.as_str()),
        None => number.to_string(),
    })
}
