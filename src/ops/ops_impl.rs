// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Galene-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Galene and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

/// Per-op mutation rules used by `apply_operations`.
/// Keeps `ops::mod` focused on the public op types and batch orchestration.
fn apply_op(model: &mut DocumentModel, ids: &mut IdAllocator, op: &Op) -> Result<(), OpError> {
    match op {
        Op::AddNode {
            id,
            kind,
            label,
            position,
            size,
            style,
            parent,
        } => {
            let node_id = match id {
                Some(explicit) => {
                    let node_id = parse_node_id(explicit)?;
                    if model.contains(&node_id) {
                        return Err(OpError::AlreadyExists {
                            id: explicit.clone(),
                        });
                    }
                    node_id
                }
                None => ids.allocate(model, "node"),
            };

            let mut node = Node::vertex(node_id);
            if !label.is_empty() {
                node.set_label(Some(label.clone()));
            }
            node.set_style(Some(
                style.clone().unwrap_or_else(|| kind.default_style().to_owned()),
            ));
            let parent_id = match parent {
                Some(parent) => parse_node_id(parent)?,
                None => parse_node_id(RESERVED_LAYER_ID)?,
            };
            node.set_parent_id(Some(parent_id));
            let at = position.unwrap_or(Point {
                x: DEFAULT_NODE_X,
                y: DEFAULT_NODE_Y,
            });
            let extent = size.unwrap_or(Size {
                width: DEFAULT_NODE_WIDTH,
                height: DEFAULT_NODE_HEIGHT,
            });
            node.set_geometry(Some(Geometry::new(at.x, at.y, extent.width, extent.height)));

            model.insert(node);
            Ok(())
        }
        Op::ModifyNode { id, changes } => {
            let node_id = parse_node_id(id)?;
            let node = model
                .get_mut(&node_id)
                .ok_or_else(|| OpError::NotFound { id: id.clone() })?;

            if let Some(label) = &changes.label {
                node.set_label(Some(label.clone()));
            }
            if let Some(style) = &changes.style {
                node.set_style(Some(style.clone()));
            }
            if changes.position.is_some() || changes.size.is_some() {
                let mut geometry = node.geometry().copied().unwrap_or_else(|| {
                    Geometry::new(
                        DEFAULT_NODE_X,
                        DEFAULT_NODE_Y,
                        DEFAULT_NODE_WIDTH,
                        DEFAULT_NODE_HEIGHT,
                    )
                });
                if let Some(position) = changes.position {
                    geometry.set_position(position.x, position.y);
                }
                if let Some(size) = changes.size {
                    geometry.set_size(size.width, size.height);
                }
                node.set_geometry(Some(geometry));
            }
            Ok(())
        }
        Op::DeleteNode { id } => {
            let node_id = parse_node_id(id)?;
            // No cascade: edges referencing the node are left dangling.
            model
                .remove(&node_id)
                .map(|_| ())
                .ok_or_else(|| OpError::NotFound { id: id.clone() })
        }
        Op::AddEdge {
            id,
            source,
            target,
            label,
            style,
        } => {
            let source = source
                .as_deref()
                .ok_or(OpError::MissingField { field: "source" })?;
            let target = target
                .as_deref()
                .ok_or(OpError::MissingField { field: "target" })?;
            let source_id = parse_node_id(source)?;
            let target_id = parse_node_id(target)?;

            let edge_id = match id {
                Some(explicit) => {
                    let edge_id = parse_node_id(explicit)?;
                    if model.contains(&edge_id) {
                        return Err(OpError::AlreadyExists {
                            id: explicit.clone(),
                        });
                    }
                    edge_id
                }
                None => ids.allocate(model, "edge"),
            };

            let mut edge = Node::edge(edge_id);
            edge.set_label(label.clone());
            edge.set_style(Some(
                style.clone().unwrap_or_else(|| DEFAULT_EDGE_STYLE.to_owned()),
            ));
            edge.set_parent_id(parse_node_id(RESERVED_LAYER_ID).ok());
            edge.set_source_id(Some(source_id));
            edge.set_target_id(Some(target_id));

            model.insert(edge);
            Ok(())
        }
        Op::ModifyEdge { id, changes } => {
            let edge_id = parse_node_id(id)?;
            let source_id = changes.source.as_deref().map(parse_node_id).transpose()?;
            let target_id = changes.target.as_deref().map(parse_node_id).transpose()?;
            let edge = model
                .get_mut(&edge_id)
                .ok_or_else(|| OpError::NotFound { id: id.clone() })?;

            if let Some(source_id) = source_id {
                edge.set_source_id(Some(source_id));
            }
            if let Some(target_id) = target_id {
                edge.set_target_id(Some(target_id));
            }
            if let Some(label) = &changes.label {
                edge.set_label(Some(label.clone()));
            }
            if let Some(style) = &changes.style {
                edge.set_style(Some(style.clone()));
            }
            Ok(())
        }
        Op::DeleteEdge { id } => {
            let edge_id = parse_node_id(id)?;
            model
                .remove(&edge_id)
                .map(|_| ())
                .ok_or_else(|| OpError::NotFound { id: id.clone() })
        }
    }
}
