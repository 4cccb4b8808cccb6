use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::MemoryStore;
use crate::graph::{NodeKey, NodeKind};

#[derive(Debug, Deserialize)]
struct RawNotebook {
    #[serde(default)]
    entities: Vec<RawEntity>,
    #[serde(default)]
    attributes: Vec<RawAttribute>,
    #[serde(default)]
    links: Vec<RawLink>,
}

#[derive(Debug, Deserialize)]
struct RawEntity {
    id: Uuid,
    name: String,
    #[serde(default)]
    graph: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct RawAttribute {
    id: Uuid,
    owner: Uuid,
    name: String,
    #[serde(default)]
    graph: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    #[serde(default)]
    id: Option<Uuid>,
    source: NodeKey,
    target: NodeKey,
    #[serde(default)]
    note: Option<String>,
    #[serde(default, rename = "createdAt", alias = "created_at")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    graph: Option<Uuid>,
}

impl MemoryStore {
    pub fn from_notebook_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read notebook file {}", path.display()))?;
        Self::from_notebook_json(&raw)
            .with_context(|| format!("failed to parse notebook file {}", path.display()))
    }

    /// Builds a store from the notebook export format. Attributes whose owner
    /// and links whose endpoints are unknown are skipped.
    pub fn from_notebook_json(raw: &str) -> Result<Self> {
        let notebook: RawNotebook =
            serde_json::from_str(raw).context("invalid notebook JSON")?;

        if notebook.entities.is_empty() && !notebook.attributes.is_empty() {
            return Err(anyhow!("notebook has attributes but no entities to own them"));
        }

        let mut store = MemoryStore::new();
        let mut entity_ids = HashSet::with_capacity(notebook.entities.len());
        for entity in notebook.entities {
            if !entity_ids.insert(entity.id) {
                tracing::debug!(id = %entity.id, "skipping duplicate entity");
                continue;
            }
            store.insert_entity(entity.id, &entity.name, entity.graph);
        }

        let mut attribute_ids = HashSet::with_capacity(notebook.attributes.len());
        for attribute in notebook.attributes {
            if !entity_ids.contains(&attribute.owner) {
                tracing::debug!(
                    id = %attribute.id,
                    owner = %attribute.owner,
                    "skipping orphaned attribute"
                );
                continue;
            }
            if !attribute_ids.insert(attribute.id) {
                continue;
            }
            store.insert_attribute(attribute.id, attribute.owner, &attribute.name, attribute.graph);
        }

        let known = |key: &NodeKey| match key.kind {
            NodeKind::Entity => entity_ids.contains(&key.id),
            NodeKind::Attribute => attribute_ids.contains(&key.id),
        };

        let mut links = notebook.links;
        links.retain(|link| {
            let keep = known(&link.source) && known(&link.target);
            if !keep {
                tracing::debug!(
                    source = %link.source,
                    target = %link.target,
                    "skipping dangling link"
                );
            }
            keep
        });

        for link in links {
            store.insert_link(
                link.id.unwrap_or_else(Uuid::new_v4),
                link.source,
                link.target,
                link.note.filter(|note| !note.trim().is_empty()),
                link.created_at,
                link.graph,
            );
        }

        tracing::debug!(
            entities = store.entity_count(),
            attributes = store.attribute_count(),
            links = store.link_count(),
            "notebook parsed"
        );
        Ok(store)
    }
}
