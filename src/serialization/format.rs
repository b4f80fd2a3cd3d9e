//! The persisted world format.
//!
//! A world file is a single JSON object. Its keys are the display names of
//! entities in flat sequence order, and each value tells how many children the
//! entity has and which components it carries:
//!
//! ```json
//! {
//!     "Room": {
//!         "child_count": 1,
//!         "components": {
//!             "transform_": {
//!                 "position_": [0.0, 0.0, 0.0],
//!                 "rotation_": [0.0, 0.0, 0.0, 1.0],
//!                 "scale_": [1.0, 1.0, 1.0]
//!             }
//!         }
//!     },
//!     "Lamp": { "child_count": 0, "components": {} }
//! }
//! ```
//!
//! Names are not unique, so the same key could appear more than once.

use std::fmt;

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::hierarchy::prelude::Hierarchy;
use crate::math::Quaternion;
use crate::spatial::prelude::Transform;

/// The local transform of an entity. Rotations are stored as `[x, y, z, w]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformRecord {
    #[serde(rename = "position_")]
    pub position: [f32; 3],
    #[serde(rename = "rotation_")]
    pub rotation: [f32; 4],
    #[serde(rename = "scale_")]
    pub scale: [f32; 3],
}

impl Default for TransformRecord {
    fn default() -> Self {
        TransformRecord::from(&Transform::default())
    }
}

impl<'a> From<&'a Transform> for TransformRecord {
    fn from(transform: &'a Transform) -> Self {
        let q = transform.rotation;
        TransformRecord {
            position: transform.position.into(),
            rotation: [q.v.x, q.v.y, q.v.z, q.s],
            scale: transform.scale.into(),
        }
    }
}

impl From<TransformRecord> for Transform {
    fn from(record: TransformRecord) -> Self {
        let r = record.rotation;
        Transform::new(
            record.position,
            Quaternion::new(r[3], r[0], r[1], r[2]),
            record.scale,
        )
    }
}

/// Every component of an entity. Components other than the transform are
/// kept as opaque JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    #[serde(rename = "transform_", default)]
    pub transform: TransformRecord,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub child_count: usize,
    #[serde(default)]
    pub components: Components,
}

/// A parsed world file, with its entries in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldDocument {
    pub entries: Vec<(String, EntityRecord)>,
}

impl<'de> Deserialize<'de> for WorldDocument {
    fn deserialize<D>(deserializer: D) -> ::std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(DocumentVisitor)
    }
}

struct DocumentVisitor;

impl<'de> Visitor<'de> for DocumentVisitor {
    type Value = WorldDocument;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map from entity names to entity records")
    }

    fn visit_map<A>(self, mut access: A) -> ::std::result::Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        // Collects into a vector, since a map type would drop duplicated names.
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(entry) = access.next_entry::<String, EntityRecord>()? {
            entries.push(entry);
        }

        Ok(WorldDocument { entries })
    }
}

impl Serialize for WorldDocument {
    fn serialize<S>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, record) in &self.entries {
            map.serialize_entry(name, record)?;
        }

        map.end()
    }
}

#[derive(Serialize)]
struct ComponentsRef<'a> {
    #[serde(rename = "transform_")]
    transform: TransformRecord,
    #[serde(flatten)]
    extra: &'a Map<String, Value>,
}

#[derive(Serialize)]
struct EntityRecordRef<'a> {
    child_count: usize,
    components: ComponentsRef<'a>,
}

/// Streams a `Hierarchy` into the world format without building a
/// `WorldDocument` first.
pub struct HierarchyWriter<'a>(pub &'a Hierarchy);

impl<'a> Serialize for HierarchyWriter<'a> {
    fn serialize<S>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::Error;

        let hierarchy = self.0;
        let mut map = serializer.serialize_map(Some(hierarchy.object_count()))?;
        for ent in hierarchy.iter() {
            let v = hierarchy
                .get(ent)
                .ok_or_else(|| S::Error::custom(format!("{} is dead.", ent)))?;

            let transform = hierarchy
                .local_transform(ent)
                .ok_or_else(|| S::Error::custom(format!("{} has no transform.", ent)))?;

            let record = EntityRecordRef {
                child_count: v.children().len(),
                components: ComponentsRef {
                    transform: TransformRecord::from(&transform),
                    extra: v.components(),
                },
            };

            map.serialize_entry(v.name(), &record)?;
        }

        map.end()
    }
}
