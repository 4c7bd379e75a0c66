//! Type definitions and the config model query API.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::error::{ConfigError, Result};
use crate::path::PropertyPath;

/// One indexed document field, tagged by property kind.
///
/// Every variant carries the property path from the document root to the
/// value; `nested` additionally carries an inner property map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropertyDefinition {
    /// Scalar values coerced by RDF datatype
    Simple { via: PropertyPath },

    /// Values bucketed by language tag
    LanguageString { via: PropertyPath },

    /// File IRIs resolved to extracted text content
    Attachment { via: PropertyPath },

    /// Related resources rendered as sub-documents
    Nested {
        via: PropertyPath,
        properties: BTreeMap<String, PropertyDefinition>,
    },
}

impl PropertyDefinition {
    /// The path from the document root to this property's value(s).
    pub fn path(&self) -> &PropertyPath {
        match self {
            PropertyDefinition::Simple { via }
            | PropertyDefinition::LanguageString { via }
            | PropertyDefinition::Attachment { via }
            | PropertyDefinition::Nested { via, .. } => via,
        }
    }

    /// All root-anchored paths reachable through this property.
    ///
    /// Nested properties concatenate their link path with each inner
    /// flattened path, so a predicate appearing anywhere inside a nested
    /// sub-property yields a single path from the document root to that
    /// predicate. A nested property with no inner properties contributes
    /// its bare link path.
    pub fn flattened_paths(&self) -> Vec<PropertyPath> {
        match self {
            PropertyDefinition::Simple { via }
            | PropertyDefinition::LanguageString { via }
            | PropertyDefinition::Attachment { via } => vec![via.clone()],
            PropertyDefinition::Nested { via, properties } => {
                if properties.is_empty() {
                    return vec![via.clone()];
                }
                properties
                    .values()
                    .flat_map(|inner| inner.flattened_paths())
                    .map(|inner_path| via.join(&inner_path))
                    .collect()
            }
        }
    }
}

/// One index definition, keyed by a stable type name in [`TypeConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeDefinition {
    /// RDF class IRIs considered authoritative for membership
    #[serde(default)]
    pub rdf_types: Vec<String>,

    /// Document fields by name
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyDefinition>,

    /// Sibling type names fused by a composite index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite_types: Option<Vec<String>>,

    /// Opaque Search-Engine mappings blob, passed through on index creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mappings: Option<JsonValue>,

    /// Opaque Search-Engine settings blob, passed through on index creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<JsonValue>,
}

impl TypeDefinition {
    /// Whether this definition fuses multiple RDF types.
    pub fn is_composite(&self) -> bool {
        self.composite_types.is_some()
    }
}

/// The config model: all type definitions plus precomputed flattened paths
/// and related rdf_types, built once at startup.
#[derive(Debug, Clone)]
pub struct TypeConfig {
    definitions: BTreeMap<String, TypeDefinition>,
    /// Per type: every flattened root-anchored path (for composites, the
    /// union over members)
    flattened: BTreeMap<String, Vec<PropertyPath>>,
    /// Per type: every rdf_type authoritative for membership (for
    /// composites, the union over members)
    related_types: BTreeMap<String, Vec<String>>,
}

impl TypeConfig {
    /// Build and validate the config model from a definition map.
    pub fn new(definitions: BTreeMap<String, TypeDefinition>) -> Result<Self> {
        for (name, def) in &definitions {
            match &def.composite_types {
                Some(members) => {
                    if members.is_empty() {
                        return Err(ConfigError::EmptyComposite(name.clone()));
                    }
                    for member in members {
                        match definitions.get(member) {
                            None => {
                                return Err(ConfigError::UnknownCompositeMember {
                                    composite: name.clone(),
                                    member: member.clone(),
                                })
                            }
                            Some(m) if m.is_composite() => {
                                return Err(ConfigError::NestedComposite {
                                    composite: name.clone(),
                                    member: member.clone(),
                                })
                            }
                            Some(_) => {}
                        }
                    }
                }
                None => {
                    if def.rdf_types.is_empty() {
                        return Err(ConfigError::EmptyRdfTypes(name.clone()));
                    }
                }
            }
        }

        let mut flattened = BTreeMap::new();
        let mut related_types = BTreeMap::new();
        for (name, def) in &definitions {
            let mut paths: Vec<PropertyPath> = def
                .properties
                .values()
                .flat_map(|p| p.flattened_paths())
                .collect();
            let mut types = def.rdf_types.clone();

            if let Some(members) = &def.composite_types {
                for member in members {
                    // Validated above: every member exists
                    let member_def = &definitions[member];
                    paths.extend(
                        member_def
                            .properties
                            .values()
                            .flat_map(|p| p.flattened_paths()),
                    );
                    for t in &member_def.rdf_types {
                        if !types.contains(t) {
                            types.push(t.clone());
                        }
                    }
                }
            }

            paths.dedup();
            flattened.insert(name.clone(), paths);
            related_types.insert(name.clone(), types);
        }

        Ok(Self {
            definitions,
            flattened,
            related_types,
        })
    }

    /// Build the config model from a raw JSON definition map.
    pub fn from_json(value: JsonValue) -> Result<Self> {
        let definitions: BTreeMap<String, TypeDefinition> = serde_json::from_value(value)?;
        Self::new(definitions)
    }

    /// All configured type names.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(|s| s.as_str())
    }

    /// The definition for a type name.
    pub fn definition(&self, type_name: &str) -> Option<&TypeDefinition> {
        self.definitions.get(type_name)
    }

    /// All rdf_types authoritative for membership in this index, including
    /// every composite member's types.
    pub fn related_rdf_types(&self, type_name: &str) -> &[String] {
        self.related_types
            .get(type_name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `iri` is one of the type's authoritative rdf_types.
    pub fn matches_type(&self, type_name: &str, iri: &str) -> bool {
        self.related_rdf_types(type_name).iter().any(|t| t == iri)
    }

    /// Whether the predicate appears, forward or inverse, at any position
    /// of any flattened property path of this type.
    pub fn matches_property(&self, type_name: &str, iri: &str) -> bool {
        self.flattened_paths(type_name)
            .iter()
            .any(|path| path.contains_predicate(iri))
    }

    /// All flattened paths of this type.
    pub fn flattened_paths(&self, type_name: &str) -> &[PropertyPath] {
        self.flattened
            .get(type_name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// All flattened paths of this type that contain the predicate.
    pub fn full_property_paths_for(&self, type_name: &str, iri: &str) -> Vec<&PropertyPath> {
        self.flattened_paths(type_name)
            .iter()
            .filter(|path| path.contains_predicate(iri))
            .collect()
    }

    /// Whether this type fuses multiple RDF types.
    pub fn is_composite_index(&self, type_name: &str) -> bool {
        self.definitions
            .get(type_name)
            .map(|d| d.is_composite())
            .unwrap_or(false)
    }

    /// The sub-definitions of a composite type, `(member_name, definition)`
    /// pairs in declaration order. Empty for non-composite types.
    pub fn composite_definitions(&self, type_name: &str) -> Vec<(&str, &TypeDefinition)> {
        let Some(def) = self.definitions.get(type_name) else {
            return Vec::new();
        };
        let Some(members) = &def.composite_types else {
            return Vec::new();
        };
        members
            .iter()
            .filter_map(|m| self.definitions.get(m).map(|d| (m.as_str(), d)))
            .collect()
    }
}
