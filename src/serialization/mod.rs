//! Conversions between a `Hierarchy` and the persisted JSON world format.
//!
//! Loading rebuilds the hierarchy wholesale. Entities are read in document
//! order and a stack of `(remaining children, parent)` frames tells which
//! entity each one belongs to. If anything goes wrong, the target hierarchy is
//! left empty.

pub mod format;

use std::io::{Read, Write};

use crate::errors::*;
use crate::hierarchy::prelude::Hierarchy;
use crate::spatial::prelude::Transform;
use crate::Entity;

use self::format::{HierarchyWriter, WorldDocument};

/// Serializes the hierarchy into a compact JSON string.
pub fn to_string(hierarchy: &Hierarchy) -> Result<String> {
    Ok(serde_json::to_string(&HierarchyWriter(hierarchy))?)
}

/// Serializes the hierarchy into a pretty-printed JSON string.
pub fn to_string_pretty(hierarchy: &Hierarchy) -> Result<String> {
    Ok(serde_json::to_string_pretty(&HierarchyWriter(hierarchy))?)
}

/// Serializes the hierarchy as JSON into the writer.
pub fn to_writer<W: Write>(writer: W, hierarchy: &Hierarchy) -> Result<()> {
    Ok(serde_json::to_writer(writer, &HierarchyWriter(hierarchy))?)
}

/// Builds a new hierarchy with default settings from a JSON world.
pub fn from_str<T: AsRef<str>>(json: T) -> Result<Hierarchy> {
    let mut hierarchy = Hierarchy::default();
    load_str(&mut hierarchy, json)?;
    Ok(hierarchy)
}

/// Builds a new hierarchy with default settings from a JSON world read out of
/// the reader.
pub fn from_reader<R: Read>(reader: R) -> Result<Hierarchy> {
    let mut hierarchy = Hierarchy::default();
    load_reader(&mut hierarchy, reader)?;
    Ok(hierarchy)
}

/// Replaces the content of `hierarchy` with the JSON world. On failure the
/// hierarchy is left empty.
pub fn load_str<T: AsRef<str>>(hierarchy: &mut Hierarchy, json: T) -> Result<()> {
    let document = serde_json::from_str(json.as_ref());
    load(hierarchy, document.map_err(Error::from))
}

/// Replaces the content of `hierarchy` with the JSON world read out of the
/// reader. On failure the hierarchy is left empty.
pub fn load_reader<R: Read>(hierarchy: &mut Hierarchy, reader: R) -> Result<()> {
    let document = serde_json::from_reader(reader);
    load(hierarchy, document.map_err(Error::from))
}

fn load(hierarchy: &mut Hierarchy, document: Result<WorldDocument>) -> Result<()> {
    hierarchy.clear();

    let result = document.and_then(|document| build(hierarchy, document));
    match result {
        Ok(()) => {
            hierarchy.mark_saved();
            info!(
                "[Hierarchy] loaded a world with {} entities.",
                hierarchy.object_count()
            );
            Ok(())
        }
        Err(err) => {
            warn!("[Hierarchy] failed to load world. {}", err);
            hierarchy.clear();
            hierarchy.mark_saved();
            Err(err)
        }
    }
}

fn build(hierarchy: &mut Hierarchy, document: WorldDocument) -> Result<()> {
    let mut stack: Vec<(usize, Entity)> = Vec::new();

    for (name, record) in document.entries {
        let parent = stack.last().map(|&(_, v)| v);
        // Detached until complete, so `Created` carries the loaded transform.
        let ent = hierarchy.spawn(&name);
        let transform = Transform::from(record.components.transform);
        hierarchy
            .set_local_transform(ent, transform)
            .map_err(|err| Error::Malformed(format!("entity '{}' {}", name, err)))?;

        hierarchy.set_components(ent, record.components.extra)?;
        hierarchy.add(ent, parent)?;

        if let Some(top) = stack.last_mut() {
            top.0 -= 1;
        }

        while let Some(&(0, _)) = stack.last() {
            stack.pop();
        }

        if record.child_count > 0 {
            stack.push((record.child_count, ent));
        }
    }

    if !stack.is_empty() {
        let missing: usize = stack.iter().map(|&(v, _)| v).sum();
        warn!(
            "[Hierarchy] world ends with {} children still expected, ignored.",
            missing
        );
    }

    Ok(())
}
