//! Fail-fast mapping validation, run once per adapter construction.
//!
//! An adapter names the canonical keys and entity sources it depends on; if
//! any are absent the adapter must refuse to construct rather than fail on
//! the first request. Both checks re-run the schema-version gate first so a
//! stale map is reported as a version problem, not a missing key.

use crate::error::MappingError;
use crate::schema_map::{SchemaMap, SOURCE_KEY_SUFFIX};

/// Ensure every key in `required_keys` is mapped.
///
/// Collects all missing keys before failing so one run reports the full set.
///
/// # Errors
///
/// Returns `MappingError::IncompatibleVersion` if the map's version fails the
/// gate, or `MappingError::MissingKeys` naming `consumer` and every absent
/// key.
pub fn ensure_mappings(
    map: &SchemaMap,
    required_keys: &[&str],
    consumer: &str,
) -> Result<(), MappingError> {
    map.version().ensure_supported()?;

    let missing: Vec<String> = required_keys
        .iter()
        .filter(|key| map.try_target(key).is_none())
        .map(|key| (*key).to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(MappingError::MissingKeys {
            consumer: consumer.to_string(),
            keys: missing,
        })
    }
}

/// Ensure every entity in `entities` declares a `__source`.
///
/// # Errors
///
/// Returns `MappingError::IncompatibleVersion` if the version gate fails,
/// `MappingError::Invalid` if an entity name is empty, or
/// `MappingError::MissingKeys` listing every absent `__source` key.
pub fn ensure_entity_sources(
    map: &SchemaMap,
    entities: &[&str],
    consumer: &str,
) -> Result<(), MappingError> {
    map.version().ensure_supported()?;

    let mut missing = Vec::new();
    for entity in entities {
        if entity.trim().is_empty() {
            return Err(MappingError::invalid(format!(
                "`{consumer}` requested a source for an empty entity name"
            )));
        }
        let key = format!("{entity}.{SOURCE_KEY_SUFFIX}");
        if map.try_target(&key).is_none() {
            missing.push(key);
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(MappingError::MissingKeys {
            consumer: consumer.to_string(),
            keys: missing,
        })
    }
}
