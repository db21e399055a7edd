//! Namespace scoping predicate (SPEC_FULL §4.1). Every reconciler gates its work
//! through [`is_enabled`] before touching anything in a namespace.

use k8s_openapi::api::core::v1::Namespace;
use kube::ResourceExt;

use crate::annotations::{get_annotation, parse_bool_annotation};
use crate::constants::NAMESPACE_ENABLE_ANNOTATION;
use crate::error::Result;

/// Controls whether namespaces are in scope by default.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FilterMode {
    /// Namespaces are out of scope unless explicitly enabled: by the enable
    /// annotation, or by appearing in `extra_excluded` (an allowlist in this
    /// mode — the name widens scope rather than narrowing it).
    OptIn,
    /// Namespaces are in scope unless explicitly disabled by annotation.
    /// `extra_excluded` is not consulted in this mode.
    OptOut,
}

impl FilterMode {
    pub fn from_str_opt(value: &str) -> Option<Self> {
        match value {
            "opt-in" => Some(Self::OptIn),
            "opt-out" => Some(Self::OptOut),
            _ => None,
        }
    }
}

/// Evaluates whether a namespace is in scope for the eviction-autoscaler
/// pipeline, given its annotations.
///
/// This function does not special-case any namespace by name; callers that
/// must never touch `kube-system` enforce that separately (see
/// `namespace_cleanup`).
pub fn is_enabled(namespace: &Namespace, mode: FilterMode, extra_excluded: &[String]) -> Result<bool> {
    let name = namespace.name_any();
    let annotation = get_annotation(namespace.metadata.annotations.as_ref(), NAMESPACE_ENABLE_ANNOTATION);

    match mode {
        FilterMode::OptIn => {
            if extra_excluded.iter().any(|n| n == &name) {
                return Ok(true);
            }
            match annotation {
                None => Ok(false),
                Some(value) => parse_bool_annotation(value),
            }
        }
        FilterMode::OptOut => match annotation {
            None => Ok(true),
            Some(value) => parse_bool_annotation(value),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use maplit::btreemap;

    fn ns(name: &str, enable: Option<&str>) -> Namespace {
        Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                annotations: enable.map(|v| {
                    btreemap! { NAMESPACE_ENABLE_ANNOTATION.to_string() => v.to_string() }
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn opt_in_defaults_disabled() {
        let namespace = ns("team-a", None);
        assert!(!is_enabled(&namespace, FilterMode::OptIn, &[]).unwrap());
    }

    #[test]
    fn opt_in_enabled_by_annotation() {
        let namespace = ns("team-a", Some("true"));
        assert!(is_enabled(&namespace, FilterMode::OptIn, &[]).unwrap());
    }

    #[test]
    fn opt_out_defaults_enabled() {
        let namespace = ns("team-a", None);
        assert!(is_enabled(&namespace, FilterMode::OptOut, &[]).unwrap());
    }

    #[test]
    fn opt_out_disabled_by_annotation() {
        let namespace = ns("team-a", Some("false"));
        assert!(!is_enabled(&namespace, FilterMode::OptOut, &[]).unwrap());
    }

    #[test]
    fn opt_in_allowlist_widens_scope_without_annotation() {
        let namespace = ns("team-a", None);
        let allowlist = vec!["team-a".to_string()];
        assert!(is_enabled(&namespace, FilterMode::OptIn, &allowlist).unwrap());
    }

    #[test]
    fn opt_out_ignores_allowlist() {
        let namespace = ns("team-a", Some("false"));
        let allowlist = vec!["team-a".to_string()];
        assert!(!is_enabled(&namespace, FilterMode::OptOut, &allowlist).unwrap());
    }

    #[test]
    fn garbage_annotation_propagates_error() {
        let namespace = ns("team-a", Some("enabled-ish"));
        assert!(is_enabled(&namespace, FilterMode::OptOut, &[]).is_err());
    }
}
