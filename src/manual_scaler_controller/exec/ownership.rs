// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OwnershipError {
    #[error("object is already owned by another controller {kind}/{name}")]
    AlreadyOwned { kind: String, name: String },
    #[error("owner misses {0}")]
    MissingOwnerKey(&'static str),
}

fn group_of(api_version: &str) -> &str {
    match api_version.split_once('/') {
        Some((group, _)) => group,
        None => "",
    }
}

fn same_owner_object(a: &OwnerReference, b: &OwnerReference) -> bool {
    group_of(&a.api_version) == group_of(&b.api_version) && a.kind == b.kind && a.name == b.name
}

/// Returns a copy of resource whose owner references contain owner exactly once.
///
/// An existing reference to the same group/kind/name is replaced (uid included, so a
/// recreated owner takes over its stale reference), which makes repeated calls
/// idempotent. When owner is a controller reference and resource is already
/// controlled by a different object, the resource is left alone and AlreadyOwned
/// is returned.
pub fn with_owner_reference<K>(resource: &K, owner: &OwnerReference) -> Result<K, OwnershipError>
where
    K: Resource + Clone,
{
    if owner.uid.is_empty() {
        return Err(OwnershipError::MissingOwnerKey(".metadata.uid"));
    }
    if owner.name.is_empty() {
        return Err(OwnershipError::MissingOwnerKey(".metadata.name"));
    }
    let mut updated = resource.clone();
    let refs = updated.meta_mut().owner_references.get_or_insert_with(Vec::new);
    if owner.controller == Some(true) {
        if let Some(controller) = refs
            .iter()
            .find(|r| r.controller == Some(true) && !same_owner_object(r, owner))
        {
            return Err(OwnershipError::AlreadyOwned {
                kind: controller.kind.clone(),
                name: controller.name.clone(),
            });
        }
    }
    match refs.iter_mut().find(|r| same_owner_object(r, owner)) {
        Some(existing) => *existing = owner.clone(),
        None => refs.push(owner.clone()),
    }
    Ok(updated)
}

/// Computes the JSON merge patch (RFC 7386) that turns base into desired.
///
/// Only fields that differ appear in the patch, and fields removed in desired map
/// to null. Arrays are replaced as a whole, as merge patches cannot address elements.
pub fn compute_merge_patch(base: &Value, desired: &Value) -> Value {
    match (base, desired) {
        (Value::Object(base), Value::Object(desired)) => Value::Object(diff_objects(base, desired)),
        _ => desired.clone(),
    }
}

fn diff_objects(base: &Map<String, Value>, desired: &Map<String, Value>) -> Map<String, Value> {
    let mut patch = Map::new();
    for key in base.keys() {
        if !desired.contains_key(key) {
            patch.insert(key.clone(), Value::Null);
        }
    }
    for (key, desired_val) in desired {
        match base.get(key) {
            Some(base_val) if base_val == desired_val => {}
            Some(Value::Object(base_obj)) => match desired_val {
                Value::Object(desired_obj) => {
                    let nested = diff_objects(base_obj, desired_obj);
                    if !nested.is_empty() {
                        patch.insert(key.clone(), Value::Object(nested));
                    }
                }
                _ => {
                    patch.insert(key.clone(), desired_val.clone());
                }
            },
            _ => {
                patch.insert(key.clone(), desired_val.clone());
            }
        }
    }
    patch
}

/// Applies a JSON merge patch (RFC 7386) to target in place.
pub fn apply_merge_patch(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(patch_obj) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            if let Value::Object(target_obj) = target {
                for (key, patch_val) in patch_obj {
                    if patch_val.is_null() {
                        target_obj.remove(key);
                    } else {
                        apply_merge_patch(target_obj.entry(key.clone()).or_insert(Value::Null), patch_val);
                    }
                }
            }
        }
        _ => *target = patch.clone(),
    }
}
