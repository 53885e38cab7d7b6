//! ClusterDeployment selection.
//!
//! A ClusterDeployment is selected when its labels satisfy the integration's
//! selector and none of its annotations equals one of the skip pairs.

use crate::error::ControllerError;
use crds::{AnnotationToSkip, ClusterDeployment, ClusterDeploymentSelector, DeadmansSnitchIntegration, LabelSelectorRequirement};
use std::collections::BTreeMap;

/// Reject operators and value lists Kubernetes itself would reject
pub fn validate_selector(selector: &ClusterDeploymentSelector) -> Result<(), ControllerError> {
    for requirement in &selector.match_expressions {
        let LabelSelectorRequirement { key, operator, values } = requirement;
        if key.is_empty() {
            return Err(ControllerError::InvalidSelector("requirement with empty key".to_string()));
        }
        match operator.as_str() {
            "In" | "NotIn" if values.is_empty() => {
                return Err(ControllerError::InvalidSelector(format!(
                    "{} requirement on '{}' needs at least one value",
                    operator, key
                )));
            }
            "Exists" | "DoesNotExist" if !values.is_empty() => {
                return Err(ControllerError::InvalidSelector(format!(
                    "{} requirement on '{}' must not have values",
                    operator, key
                )));
            }
            "In" | "NotIn" | "Exists" | "DoesNotExist" => {}
            other => {
                return Err(ControllerError::InvalidSelector(format!(
                    "unknown operator '{}' on '{}'",
                    other, key
                )));
            }
        }
    }
    Ok(())
}

/// Whether `labels` satisfy an already validated selector
pub fn selector_matches(selector: &ClusterDeploymentSelector, labels: &BTreeMap<String, String>) -> bool {
    let labels_ok = selector
        .match_labels
        .iter()
        .all(|(key, value)| labels.get(key) == Some(value));

    labels_ok
        && selector.match_expressions.iter().all(|requirement| {
            let value = labels.get(&requirement.key);
            match requirement.operator.as_str() {
                "In" => value.is_some_and(|v| requirement.values.contains(v)),
                "NotIn" => value.is_none_or(|v| !requirement.values.contains(v)),
                "Exists" => value.is_some(),
                "DoesNotExist" => value.is_none(),
                _ => false,
            }
        })
}

/// Whether any annotation equals any skip pair
pub fn is_skipped(skip: &[AnnotationToSkip], annotations: Option<&BTreeMap<String, String>>) -> bool {
    let Some(annotations) = annotations else {
        return false;
    };
    skip.iter()
        .any(|pair| annotations.get(&pair.name) == Some(&pair.value))
}

/// The ClusterDeployments `integration` selects
pub fn matching_cluster_deployments<'a>(
    integration: &DeadmansSnitchIntegration,
    cluster_deployments: &'a [ClusterDeployment],
) -> Result<Vec<&'a ClusterDeployment>, ControllerError> {
    let selector = &integration.spec.cluster_deployment_selector;
    validate_selector(selector)?;

    let empty = BTreeMap::new();
    Ok(cluster_deployments
        .iter()
        .filter(|cd| selector_matches(selector, cd.metadata.labels.as_ref().unwrap_or(&empty)))
        .filter(|cd| {
            !is_skipped(
                &integration.spec.cluster_deployment_annotations_to_skip,
                cd.metadata.annotations.as_ref(),
            )
        })
        .collect())
}
