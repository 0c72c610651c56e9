//! Field-path addressing for aggregation stages.
//!
//! Resources are stored as `{_id, content}`. Client-facing keys are dotted paths
//! relative to `content`, except for `id_`, which names the identifier itself.

use std::collections::HashSet;

use crate::schema::{FieldLabel, ID_FIELD};

/// Root of the resource content inside a stored document.
pub const CONTENT_ROOT: &str = "content";

/// Identifier field of a stored document.
pub const STORED_ID: &str = "_id";

/// Branch names used by the parallel stage for non-facet outputs.
pub const HITS_BRANCH: &str = "hits";
pub const COUNT_BRANCH: &str = "count";

/// Path of `key` in a stored document, as used by match stages.
pub fn stored_path(key: &str) -> String {
    if key == ID_FIELD {
        STORED_ID.to_string()
    } else {
        format!("{}.{}", CONTENT_ROOT, key)
    }
}

/// Path of `key` in a hit, after `_id` has been renamed to `id_`.
pub fn hit_path(key: &str) -> String {
    if key == ID_FIELD {
        ID_FIELD.to_string()
    } else {
        format!("{}.{}", CONTENT_ROOT, key)
    }
}

/// Split a content key into the `$getField` input expression and the final segment.
///
/// `study.type` under `content` becomes (`$content.study`, `type`), so the last
/// segment is addressed by name rather than through a dotted path.
pub fn getfield_args(root: &str, key: &str) -> (String, String) {
    match key.rsplit_once('.') {
        Some((parent, leaf)) => (format!("${}.{}", root, parent), leaf.to_string()),
        None => (format!("${}", root), key.to_string()),
    }
}

/// Make a display name usable as an output field name of the parallel stage.
///
/// Output names may not contain dots or start with `$`; whitespace is replaced
/// too so the name can be referenced as `$<name>` in the reshape stage.
pub fn escape_branch_name(name: &str) -> String {
    let escaped: String = name
        .chars()
        .map(|c| match c {
            '.' | '$' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();
    if escaped.is_empty() {
        "_".to_string()
    } else {
        escaped
    }
}

/// Branch names for each facet, in order, guaranteed unique among themselves and
/// distinct from the hits and count branches.
pub fn facet_branch_names(facets: &[FieldLabel]) -> Vec<String> {
    let mut taken: HashSet<String> = [HITS_BRANCH, COUNT_BRANCH]
        .iter()
        .map(|s| s.to_string())
        .collect();

    facets
        .iter()
        .map(|facet| {
            let base = escape_branch_name(&facet.display_name());
            let mut candidate = base.clone();
            let mut suffix = 2;
            while taken.contains(&candidate) {
                candidate = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            taken.insert(candidate.clone());
            candidate
        })
        .collect()
}
