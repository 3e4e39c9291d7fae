//! Creation ordering for declared resources
//!
//! Resources are created in declaration order, except that a resource is
//! never created before the resources its [`ManagedResource::create_after`]
//! names. Destruction runs the same order reversed.

use crate::error::{CloudError, Result};
use crate::resource::ManagedResource;
use std::collections::{HashMap, HashSet};

/// Returns indices into `resources` in a valid creation order.
///
/// # Errors
///
/// - [`CloudError::DuplicateResource`] if two resources share a key
/// - [`CloudError::ResourceNotFound`] if `create_after` names an undeclared key
/// - [`CloudError::CircularDependency`] if the dependencies form a cycle
pub fn creation_order(resources: &[&dyn ManagedResource]) -> Result<Vec<usize>> {
    let mut index_by_key: HashMap<String, usize> = HashMap::new();
    for (i, resource) in resources.iter().enumerate() {
        if index_by_key.insert(resource.key(), i).is_some() {
            return Err(CloudError::DuplicateResource(resource.key()));
        }
    }

    let mut deps: Vec<HashSet<usize>> = Vec::with_capacity(resources.len());
    for resource in resources {
        let mut set = HashSet::new();
        for key in resource.create_after(resources) {
            let dep = *index_by_key
                .get(&key)
                .ok_or_else(|| CloudError::ResourceNotFound(key.clone()))?;
            if key != resource.key() {
                set.insert(dep);
            }
        }
        deps.push(set);
    }

    let mut order = Vec::with_capacity(resources.len());
    let mut placed = vec![false; resources.len()];

    // Repeatedly take the first (in declaration order) resource whose
    // dependencies are all placed.
    while order.len() < resources.len() {
        let next = (0..resources.len())
            .find(|&i| !placed[i] && deps[i].iter().all(|&d| placed[d]));

        match next {
            Some(i) => {
                placed[i] = true;
                order.push(i);
            }
            None => {
                let stuck: Vec<String> = (0..resources.len())
                    .filter(|&i| !placed[i])
                    .map(|i| resources[i].key())
                    .collect();
                return Err(CloudError::CircularDependency(stuck.join(", ")));
            }
        }
    }

    tracing::debug!(
        "Creation order: {}",
        order
            .iter()
            .map(|&i| resources[i].key())
            .collect::<Vec<_>>()
            .join(" -> ")
    );
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Node {
        name: &'static str,
        after: Vec<&'static str>,
    }

    impl ManagedResource for Node {
        fn resource_type(&self) -> &str {
            "node"
        }

        fn name(&self) -> &str {
            self.name
        }

        fn create_after(&self, _resources: &[&dyn ManagedResource]) -> Vec<String> {
            self.after.iter().map(|n| format!("node:{}", n)).collect()
        }
    }

    fn node(name: &'static str, after: &[&'static str]) -> Node {
        Node {
            name,
            after: after.to_vec(),
        }
    }

    #[test]
    fn test_dependency_moves_ahead() {
        let upload = node("upload", &["bucket"]);
        let bucket = node("bucket", &[]);
        let resources: Vec<&dyn ManagedResource> = vec![&upload, &bucket];

        let order = creation_order(&resources).unwrap();
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn test_declaration_order_kept_without_dependencies() {
        let a = node("a", &[]);
        let b = node("b", &[]);
        let c = node("c", &[]);
        let resources: Vec<&dyn ManagedResource> = vec![&a, &b, &c];

        assert_eq!(creation_order(&resources).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_cycle_detected() {
        let a = node("a", &["b"]);
        let b = node("b", &["a"]);
        let resources: Vec<&dyn ManagedResource> = vec![&a, &b];

        let err = creation_order(&resources).unwrap_err();
        assert!(matches!(err, CloudError::CircularDependency(_)));
    }

    #[test]
    fn test_unknown_dependency() {
        let a = node("a", &["ghost"]);
        let resources: Vec<&dyn ManagedResource> = vec![&a];

        let err = creation_order(&resources).unwrap_err();
        assert!(matches!(err, CloudError::ResourceNotFound(key) if key == "node:ghost"));
    }

    #[test]
    fn test_duplicate_key() {
        let a = node("a", &[]);
        let a2 = node("a", &[]);
        let resources: Vec<&dyn ManagedResource> = vec![&a, &a2];

        assert!(matches!(
            creation_order(&resources),
            Err(CloudError::DuplicateResource(_))
        ));
    }
}
