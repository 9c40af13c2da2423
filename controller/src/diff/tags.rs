use std::collections::BTreeMap;

/// Computes the tag mutations that bring `remote` to `local`.
///
/// The first map holds every local tag that is missing remotely or carries a different value.
/// The second list holds every remote key that is absent locally, plus every key whose value
/// changed; some endpoints only accept a new value once the old one has been removed.
pub fn diff_tags(
    local: &BTreeMap<String, String>,
    remote: &BTreeMap<String, String>,
) -> (BTreeMap<String, String>, Vec<String>) {
    let add = local
        .iter()
        .filter(|(k, v)| remote.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let remove = remote
        .iter()
        .filter(|(k, v)| local.get(*k) != Some(*v))
        .map(|(k, _)| k.clone())
        .collect();

    (add, remove)
}

/// `diff_tags` over optional maps, treating an absent map as empty.
pub fn diff_optional_tags(
    local: Option<&BTreeMap<String, String>>,
    remote: Option<&BTreeMap<String, String>>,
) -> (BTreeMap<String, String>, Vec<String>) {
    let empty = BTreeMap::new();
    diff_tags(local.unwrap_or(&empty), remote.unwrap_or(&empty))
}
