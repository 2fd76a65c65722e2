use anyhow::{bail, Result};
use regex::Regex;
use std::collections::{HashMap, HashSet, VecDeque};

use super::Declaration;

/// DNS-1123 subdomain: names of most namespaced objects.
const DNS1123_SUBDOMAIN: &str = r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$";
/// DNS-1123 label: namespace names.
const DNS1123_LABEL: &str = r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$";

/// Validate a declaration before anything is submitted.
pub fn validate(declaration: &Declaration) -> Result<()> {
    validate_unique_addresses(declaration)?;
    validate_dependency_references(declaration)?;
    validate_no_cycles(declaration)?;
    validate_object_names(declaration)?;
    validate_sensitive_paths(declaration)?;
    Ok(())
}

fn validate_unique_addresses(declaration: &Declaration) -> Result<()> {
    let mut seen = HashSet::new();
    for spec in declaration.resources() {
        if !seen.insert(spec.address.as_str()) {
            bail!("Resource '{}' is declared more than once", spec.address);
        }
    }
    Ok(())
}

/// Ensure all depends_on references point to declared resources.
fn validate_dependency_references(declaration: &Declaration) -> Result<()> {
    for spec in declaration.resources() {
        for dep in &spec.depends_on {
            if dep == &spec.address {
                bail!("Resource '{}' depends on itself", spec.address);
            }
            if declaration.get(dep).is_none() {
                bail!(
                    "Resource '{}' depends on '{}', which is not declared",
                    spec.address,
                    dep
                );
            }
        }
    }
    Ok(())
}

/// Detect circular dependencies using Kahn's algorithm.
fn validate_no_cycles(declaration: &Declaration) -> Result<()> {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();

    for spec in declaration.resources() {
        in_degree.entry(spec.address.as_str()).or_insert(0);
        adjacency.entry(spec.address.as_str()).or_default();
    }

    for spec in declaration.resources() {
        for dep in &spec.depends_on {
            adjacency
                .entry(dep.as_str())
                .or_default()
                .push(spec.address.as_str());
            *in_degree.entry(spec.address.as_str()).or_insert(0) += 1;
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(&name, _)| name)
        .collect();

    let mut visited = 0;
    while let Some(node) = queue.pop_front() {
        visited += 1;
        if let Some(neighbors) = adjacency.get(node) {
            for &neighbor in neighbors {
                if let Some(deg) = in_degree.get_mut(neighbor) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(neighbor);
                    }
                }
            }
        }
    }

    if visited != in_degree.len() {
        let stuck: Vec<&str> = in_degree
            .iter()
            .filter(|(_, &degree)| degree > 0)
            .map(|(&name, _)| name)
            .collect();
        bail!("Circular dependency detected between resources: {}", stuck.join(", "));
    }

    Ok(())
}

fn validate_object_names(declaration: &Declaration) -> Result<()> {
    let subdomain = Regex::new(DNS1123_SUBDOMAIN)?;
    let label = Regex::new(DNS1123_LABEL)?;

    for spec in declaration.resources() {
        let identity = &spec.identity;
        let is_namespace = identity.kind == "Namespace" && identity.namespace.is_none();
        let (pattern, max_len) = if is_namespace { (&label, 63) } else { (&subdomain, 253) };

        if identity.name.len() > max_len || !pattern.is_match(&identity.name) {
            bail!(
                "Resource '{}' has invalid object name '{}' (must be a lowercase RFC 1123 name)",
                spec.address,
                identity.name
            );
        }
        if let Some(ns) = &identity.namespace {
            if ns.len() > 63 || !label.is_match(ns) {
                bail!("Resource '{}' has invalid namespace '{}'", spec.address, ns);
            }
        }
    }
    Ok(())
}

/// Every declared sensitive path must exist, otherwise redaction would
/// silently miss the value it was meant to hide.
fn validate_sensitive_paths(declaration: &Declaration) -> Result<()> {
    for spec in declaration.resources() {
        for pointer in &spec.sensitive_paths {
            if spec.manifest.pointer(pointer).is_none() {
                bail!(
                    "Resource '{}' marks '{}' as sensitive but the manifest has no such field",
                    spec.address,
                    pointer
                );
            }
        }
    }
    Ok(())
}
