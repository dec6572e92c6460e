// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Galene-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Galene and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Forgiving reader and deterministic writer for the editor's `mxGraphModel`
//! XML subset.
//!
//! The reader never fails: structurally invalid input yields an empty model,
//! and cells that merely omit optional attributes parse with those fields
//! absent. Cells without a usable id are skipped. The writer always emits the
//! two reserved cells first, then the remaining cells in document order, so
//! serialization is stable across round trips.

use memchr::memmem;

use crate::model::{
    is_reserved_id, DocumentModel, Geometry, Node, NodeId, NodeKind, RESERVED_LAYER_ID,
    RESERVED_ROOT_ID,
};

/// Parse a serialized tree document into an addressable model.
///
/// Input without a `<root>` element is not a tree document; the result is the
/// empty model and callers see an empty diff rather than a failure.
pub fn parse_document(input: &str) -> DocumentModel {
    let bytes = input.as_bytes();
    let Some(root_start) = memmem::find(bytes, b"<root") else {
        return DocumentModel::new();
    };
    let root_end = memmem::find(&bytes[root_start..], b"</root>")
        .map(|offset| root_start + offset)
        .unwrap_or(input.len());
    let region = &input[root_start..root_end];

    let mut starts = Vec::new();
    let finder = memmem::Finder::new(b"<mxCell");
    let mut pos = 0;
    while let Some(offset) = finder.find(&region.as_bytes()[pos..]) {
        starts.push(pos + offset);
        pos += offset + "<mxCell".len();
    }

    let mut model = DocumentModel::new();
    for (index, &start) in starts.iter().enumerate() {
        let segment_end = starts.get(index + 1).copied().unwrap_or(region.len());
        if let Some(node) = parse_cell(&region[start..segment_end]) {
            model.insert(node);
        }
    }
    model
}

fn parse_cell(segment: &str) -> Option<Node> {
    let open_end = segment.find('>')?;
    let open_tag = &segment["<mxCell".len()..open_end];
    let self_closing = open_tag.trim_end().ends_with('/');
    let attrs = parse_attributes(open_tag);

    let node_id = NodeId::new(unescape(attr(&attrs, "id")?)).ok()?;
    let kind = if attr(&attrs, "vertex") == Some("1") {
        NodeKind::Vertex
    } else if attr(&attrs, "edge") == Some("1") {
        NodeKind::Edge
    } else {
        NodeKind::Unknown
    };

    let mut node = Node::new(node_id, kind);
    node.set_label(attr(&attrs, "value").map(unescape));
    node.set_style(attr(&attrs, "style").map(unescape));
    node.set_parent_id(id_attr(&attrs, "parent"));
    node.set_source_id(id_attr(&attrs, "source"));
    node.set_target_id(id_attr(&attrs, "target"));

    if !self_closing {
        node.set_geometry(parse_geometry(&segment[open_end..]));
    }
    Some(node)
}

fn parse_geometry(body: &str) -> Option<Geometry> {
    let start = memmem::find(body.as_bytes(), b"<mxGeometry")?;
    let tag = &body[start + "<mxGeometry".len()..];
    let tag = &tag[..tag.find('>')?];
    let attrs = parse_attributes(tag);

    let x = number_attr(&attrs, "x");
    let y = number_attr(&attrs, "y");
    let width = number_attr(&attrs, "width");
    let height = number_attr(&attrs, "height");
    if x.is_none() && y.is_none() && width.is_none() && height.is_none() {
        // Relative connector geometry carries no coordinates.
        return None;
    }
    Some(Geometry::new(
        x.unwrap_or(0.0),
        y.unwrap_or(0.0),
        width.unwrap_or(0.0),
        height.unwrap_or(0.0),
    ))
}

fn parse_attributes(tag: &str) -> Vec<(&str, &str)> {
    let bytes = tag.as_bytes();
    let mut attrs = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        let key_start = i;
        while i < bytes.len() && is_name_byte(bytes[i]) {
            i += 1;
        }
        if i == key_start {
            i += 1;
            continue;
        }
        let key = &tag[key_start..i];
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'"' {
            continue;
        }
        i += 1;
        let value_start = i;
        let Some(rel) = memchr::memchr(b'"', &bytes[i..]) else {
            break;
        };
        attrs.push((key, &tag[value_start..value_start + rel]));
        i = value_start + rel + 1;
    }
    attrs
}

fn is_name_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-' | b':' | b'.')
}

fn attr<'a>(attrs: &[(&'a str, &'a str)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| *value)
}

fn id_attr(attrs: &[(&str, &str)], name: &str) -> Option<NodeId> {
    attr(attrs, name).and_then(|value| NodeId::new(unescape(value)).ok())
}

fn number_attr(attrs: &[(&str, &str)], name: &str) -> Option<f64> {
    attr(attrs, name).and_then(|value| value.trim().parse().ok())
}

/// Serialize a model back to the editor's XML dialect.
pub fn write_document(model: &DocumentModel) -> String {
    let mut out = String::new();
    out.push_str("<mxGraphModel>\n  <root>\n");
    out.push_str("    <mxCell id=\"0\"/>\n");
    out.push_str("    <mxCell id=\"1\" parent=\"0\"/>\n");
    for node in model
        .order()
        .iter()
        .filter(|id| !is_reserved_id(id.as_str()))
        .filter_map(|id| model.get(id))
    {
        write_cell(&mut out, node);
    }
    out.push_str("  </root>\n</mxGraphModel>\n");
    out
}

fn write_cell(out: &mut String, node: &Node) {
    out.push_str("    <mxCell id=\"");
    out.push_str(&escape_attr(node.node_id().as_str()));
    out.push('"');
    if let Some(label) = node.label() {
        push_attr(out, "value", label);
    }
    if let Some(style) = node.style() {
        push_attr(out, "style", style);
    }
    match node.kind() {
        NodeKind::Vertex => out.push_str(" vertex=\"1\""),
        NodeKind::Edge => out.push_str(" edge=\"1\""),
        NodeKind::Unknown => {}
    }
    push_attr(
        out,
        "parent",
        node.parent_id().map(NodeId::as_str).unwrap_or(RESERVED_LAYER_ID),
    );
    if let Some(source_id) = node.source_id() {
        push_attr(out, "source", source_id.as_str());
    }
    if let Some(target_id) = node.target_id() {
        push_attr(out, "target", target_id.as_str());
    }

    if let Some(geometry) = node.geometry() {
        out.push_str(">\n      <mxGeometry x=\"");
        out.push_str(&format_length(geometry.x()));
        out.push_str("\" y=\"");
        out.push_str(&format_length(geometry.y()));
        out.push_str("\" width=\"");
        out.push_str(&format_length(geometry.width()));
        out.push_str("\" height=\"");
        out.push_str(&format_length(geometry.height()));
        out.push_str("\" as=\"geometry\"/>\n    </mxCell>\n");
    } else if node.kind() == NodeKind::Edge {
        out.push_str(">\n      <mxGeometry relative=\"1\" as=\"geometry\"/>\n    </mxCell>\n");
    } else {
        out.push_str("/>\n");
    }
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape_attr(value));
    out.push('"');
}

fn format_length(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(value: &str) -> String {
    if !value.contains('&') {
        return value.to_owned();
    }
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let Some(end) = rest.find(';') else {
            out.push_str(rest);
            return out;
        };
        match &rest[1..end] {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            entity if entity.starts_with('#') => match decode_numeric_entity(entity) {
                Some(c) => out.push(c),
                None => out.push_str(&rest[..=end]),
            },
            _ => out.push_str(&rest[..=end]),
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    out
}

fn decode_numeric_entity(entity: &str) -> Option<char> {
    let digits = &entity[1..];
    let code = if let Some(hex) = digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse().ok()?
    };
    char::from_u32(code)
}
