//! Annotation read/parse helpers shared by every reconciler, so that the rules for
//! "what counts as true/false/zero" live in exactly one place.

use std::collections::BTreeMap;

use snafu::{OptionExt, ResultExt};

use crate::error::{self, Result};

/// Parses a canonical `"true"`/`"false"` annotation value.
///
/// Any other spelling is a hard parse error: callers must propagate it rather
/// than silently defaulting, per the namespace-filter design (SPEC_FULL §4.1).
pub fn parse_bool_annotation(value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => error::InvalidBoolAnnotationSnafu {
            value: other.to_string(),
        }
        .fail(),
    }
}

/// Reads a named annotation out of an annotation map, if present.
pub fn get_annotation<'a>(
    annotations: Option<&'a BTreeMap<String, String>>,
    key: &str,
) -> Option<&'a str> {
    annotations.and_then(|m| m.get(key)).map(String::as_str)
}

/// Interprets a target's `pdb-create` annotation. Absence means "allowed to
/// create"; any value other than `"true"`/`"false"` is a semantic error (see
/// Open Question decision #2 in DESIGN.md: we do not silently proceed).
pub fn pdb_creation_allowed(annotations: Option<&BTreeMap<String, String>>) -> Result<bool> {
    match get_annotation(annotations, crate::constants::PDB_CREATE_ANNOTATION) {
        None => Ok(true),
        Some(value) => parse_bool_annotation(value),
    }
}

/// Interprets a `maxUnavailable` value (as carried by a Deployment or
/// StatefulSet rolling-update strategy) for the "does this workload already
/// tolerate disruption" check in SPEC_FULL §4.2.
///
/// An absent value is not non-zero: the caller should treat "no
/// `maxUnavailable` set" as zero (the API server default), not as "non-zero".
pub fn max_unavailable_is_nonzero(value: &k8s_openapi::apimachinery::pkg::util::intstr::IntOrString) -> bool {
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
    match value {
        IntOrString::Int(i) => *i != 0,
        IntOrString::String(s) => s != "0" && s != "0%",
    }
}

/// Parses the surge-replica annotation on a target, if present.
pub fn surge_replicas(annotations: Option<&BTreeMap<String, String>>) -> Result<Option<i32>> {
    match get_annotation(annotations, crate::constants::SURGE_REPLICAS_ANNOTATION) {
        None => Ok(None),
        Some(value) => value
            .parse::<i32>()
            .ok()
            .context(error::InvalidSurgeAnnotationSnafu {
                value: value.to_string(),
            })
            .map(Some),
    }
}

/// Returns whether a PDB carries the controller-ownership marker.
pub fn is_controller_owned(annotations: Option<&BTreeMap<String, String>>) -> bool {
    get_annotation(annotations, crate::constants::PDB_OWNED_BY_ANNOTATION)
        == Some(crate::constants::PDB_OWNED_BY_VALUE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
    use maplit::btreemap;

    #[test]
    fn parses_canonical_bools() {
        assert!(parse_bool_annotation("true").unwrap());
        assert!(!parse_bool_annotation("false").unwrap());
        assert!(parse_bool_annotation("yes").is_err());
    }

    #[test]
    fn pdb_creation_allowed_defaults_to_true() {
        assert!(pdb_creation_allowed(None).unwrap());
        let annotations = btreemap! { "pdb-create".to_string() => "false".to_string() };
        assert!(!pdb_creation_allowed(Some(&annotations)).unwrap());
    }

    #[test]
    fn pdb_creation_allowed_rejects_garbage() {
        let annotations = btreemap! { "pdb-create".to_string() => "nope".to_string() };
        assert!(pdb_creation_allowed(Some(&annotations)).is_err());
    }

    #[test]
    fn max_unavailable_zero_forms() {
        assert!(!max_unavailable_is_nonzero(&IntOrString::Int(0)));
        assert!(!max_unavailable_is_nonzero(&IntOrString::String("0".to_string())));
        assert!(!max_unavailable_is_nonzero(&IntOrString::String("0%".to_string())));
        assert!(max_unavailable_is_nonzero(&IntOrString::Int(1)));
        assert!(max_unavailable_is_nonzero(&IntOrString::String("25%".to_string())));
    }

    #[test]
    fn surge_replicas_parses_or_none() {
        assert_eq!(surge_replicas(None).unwrap(), None);
        let annotations = btreemap! { "evictionSurgeReplicas".to_string() => "4".to_string() };
        assert_eq!(surge_replicas(Some(&annotations)).unwrap(), Some(4));
    }
}
