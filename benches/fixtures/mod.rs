// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Galene-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Galene and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

#![allow(dead_code)]

// Shared deterministic benchmark fixtures (no RNG).

use std::fmt::Write as _;

#[derive(Debug, Clone, Copy)]
pub enum Case {
    Small,
    Medium,
    Large,
}

impl Case {
    pub fn id(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }

    pub fn node_count(self) -> usize {
        match self {
            Self::Small => 10,
            Self::Medium => 200,
            Self::Large => 2000,
        }
    }

    pub fn edge_count(self) -> usize {
        // A sparse chain plus cross links, proportional to node count.
        self.node_count() + self.node_count() / 4
    }
}

/// A serialized document with `nodes` vertices laid out on a grid and
/// `edges` connectors chaining and cross-linking them.
pub fn document(nodes: usize, edges: usize) -> String {
    let mut out = String::new();
    out.push_str("<mxGraphModel>\n  <root>\n");
    out.push_str("    <mxCell id=\"0\"/>\n");
    out.push_str("    <mxCell id=\"1\" parent=\"0\"/>\n");
    for index in 0..nodes {
        let x = (index % 16) * 160;
        let y = (index / 16) * 120;
        let _ = write!(
            out,
            "    <mxCell id=\"node-{index}\" value=\"Service {index}\" style=\"rounded=1;whiteSpace=wrap;html=1;\" vertex=\"1\" parent=\"1\">\n      <mxGeometry x=\"{x}\" y=\"{y}\" width=\"120\" height=\"60\" as=\"geometry\"/>\n    </mxCell>\n"
        );
    }
    for index in 0..edges {
        let from = index % nodes.max(1);
        let to = (index.wrapping_mul(7).wrapping_add(3)) % nodes.max(1);
        let _ = write!(
            out,
            "    <mxCell id=\"edge-{index}\" style=\"endArrow=classic;html=1;\" edge=\"1\" parent=\"1\" source=\"node-{from}\" target=\"node-{to}\">\n      <mxGeometry relative=\"1\" as=\"geometry\"/>\n    </mxCell>\n"
        );
    }
    out.push_str("  </root>\n</mxGraphModel>\n");
    out
}

pub fn case_document(case: Case) -> String {
    document(case.node_count(), case.edge_count())
}

/// The same document after a deterministic spread of human edits: every 5th
/// node relabeled, every 7th moved, every 11th deleted.
pub fn edited_document(case: Case) -> String {
    let nodes = case.node_count();
    let edges = case.edge_count();
    let mut out = String::new();
    out.push_str("<mxGraphModel>\n  <root>\n");
    out.push_str("    <mxCell id=\"0\"/>\n");
    out.push_str("    <mxCell id=\"1\" parent=\"0\"/>\n");
    for index in 0..nodes {
        if index % 11 == 10 {
            continue;
        }
        let moved = index % 7 == 6;
        let x = (index % 16) * 160 + usize::from(moved) * 40;
        let y = (index / 16) * 120;
        let label = if index % 5 == 4 {
            format!("Renamed {index}")
        } else {
            format!("Service {index}")
        };
        let _ = write!(
            out,
            "    <mxCell id=\"node-{index}\" value=\"{label}\" style=\"rounded=1;whiteSpace=wrap;html=1;\" vertex=\"1\" parent=\"1\">\n      <mxGeometry x=\"{x}\" y=\"{y}\" width=\"120\" height=\"60\" as=\"geometry\"/>\n    </mxCell>\n"
        );
    }
    for index in 0..edges {
        let from = index % nodes.max(1);
        let to = (index.wrapping_mul(7).wrapping_add(3)) % nodes.max(1);
        let _ = write!(
            out,
            "    <mxCell id=\"edge-{index}\" style=\"endArrow=classic;html=1;\" edge=\"1\" parent=\"1\" source=\"node-{from}\" target=\"node-{to}\">\n      <mxGeometry relative=\"1\" as=\"geometry\"/>\n    </mxCell>\n"
        );
    }
    out.push_str("  </root>\n</mxGraphModel>\n");
    out
}
