use std::collections::BTreeMap;

/// Computes the node group label payload that brings `remote` to `local`.
///
/// Unlike tags, a changed value only lands in the add-or-update map: EKS overwrites existing
/// labels in place, so removing them as well would drop the label.
pub fn diff_labels(
    local: &BTreeMap<String, String>,
    remote: &BTreeMap<String, String>,
) -> (BTreeMap<String, String>, Vec<String>) {
    let add_or_update = local
        .iter()
        .filter(|(k, v)| remote.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let remove = remote
        .keys()
        .filter(|k| !local.contains_key(*k))
        .cloned()
        .collect();

    (add_or_update, remove)
}
