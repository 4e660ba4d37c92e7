//! Helpers over `serde_json::Value` trees: dot-path addressing and
//! RFC 7396 merge patches.

use serde_json::{Map, Value};

/// Look up `a.b.c` in an object tree. An empty path returns the root.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.').try_fold(root, |node, key| node.as_object()?.get(key))
}

/// Set `a.b.c`, creating intermediate objects and replacing any non-object
/// found on the way. An empty path replaces the root.
pub fn set_path(root: &mut Value, path: &str, value: Value) {
    if path.is_empty() {
        *root = value;
        return;
    }

    let mut node = root;
    let mut keys = path.split('.').peekable();
    while let Some(key) = keys.next() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Some(map) = node.as_object_mut() else { return };
        if keys.peek().is_none() {
            map.insert(key.to_string(), value);
            return;
        }
        node = map.entry(key.to_string()).or_insert(Value::Null);
    }
}

/// Remove `a.b.c`, returning the removed value.
pub fn remove_path(root: &mut Value, path: &str) -> Option<Value> {
    let (parent, leaf) = match path.rsplit_once('.') {
        Some((parent, leaf)) => (get_path_mut(root, parent)?, leaf),
        None => (root, path),
    };
    parent.as_object_mut()?.remove(leaf)
}

fn get_path_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    path.split('.').try_fold(root, |node, key| node.as_object_mut()?.get_mut(key))
}

/// RFC 7396 JSON Merge Patch.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    if let Value::Object(patch_map) = patch {
        if let Value::Object(target_map) = target {
            for (key, patch_val) in patch_map {
                if patch_val.is_null() {
                    target_map.remove(key);
                } else {
                    let entry = target_map.entry(key.clone()).or_insert(Value::Null);
                    merge_patch(entry, patch_val);
                }
            }
        } else {
            // Target is not an object; start from an empty one so nulls are dropped.
            *target = Value::Object(Map::new());
            merge_patch(target, patch);
        }
    } else {
        *target = patch.clone();
    }
}
