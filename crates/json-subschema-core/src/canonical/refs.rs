//! `$ref` resolution ahead of canonicalization.
//!
//! Only root-relative JSON Pointers (`#/...`) are supported. Non-recursive
//! references are inlined; a reference that closes a cycle is left in
//! place and its target is resolved into a named definition, so the
//! canonicalizer can emit a [`Canonical::Ref`](super::Canonical::Ref) leaf
//! for it. The definitions form the arena the driver walks coinductively.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};

use crate::config::CompareOptions;
use crate::error::SubtypeError;

/// Escape a single path segment per RFC 6901 (`~` → `~0`, `/` → `~1`).
pub(crate) fn escape_pointer_segment(segment: &str) -> Cow<'_, str> {
    if segment.contains('~') || segment.contains('/') {
        Cow::Owned(segment.replace('~', "~0").replace('/', "~1"))
    } else {
        Cow::Borrowed(segment)
    }
}

/// Build a JSON Pointer path by appending escaped segments to a parent.
pub(crate) fn build_path(parent: &str, segments: &[&str]) -> String {
    let mut path = parent.to_string();
    for segment in segments {
        path.push('/');
        path.push_str(&escape_pointer_segment(segment));
    }
    path
}

/// Result of reference resolution.
#[derive(Debug)]
pub(crate) struct ResolvedSchema {
    /// The schema with all non-recursive refs inlined. Remaining `$ref`
    /// nodes point at entries of `defs`.
    pub schema: Value,
    /// Resolved bodies of the pointers that participate in cycles,
    /// keyed by their pointer text (e.g. `#/$defs/Node`).
    pub defs: BTreeMap<String, Value>,
}

struct RefContext<'a> {
    root: &'a Value,
    options: &'a CompareOptions,
    visiting: HashSet<String>,
    recursive: Vec<String>,
}

/// Resolve every `$ref` reachable from `schema`.
pub(crate) fn resolve(
    schema: &Value,
    options: &CompareOptions,
) -> Result<ResolvedSchema, SubtypeError> {
    let mut ctx = RefContext {
        root: schema,
        options,
        visiting: HashSet::new(),
        recursive: Vec::new(),
    };
    let resolved = resolve_node(schema, "#", 0, &mut ctx)?;

    // Resolve the bodies of recursive targets; their own resolution may
    // surface further cycle participants.
    let mut defs: BTreeMap<String, Value> = BTreeMap::new();
    let mut pending = ctx.recursive;
    while let Some(pointer) = pending.pop() {
        if defs.contains_key(&pointer) {
            continue;
        }
        let target =
            resolve_pointer(schema, &pointer).ok_or_else(|| SubtypeError::UnresolvableRef {
                path: pointer.clone(),
                reference: pointer.clone(),
            })?;
        let mut def_ctx = RefContext {
            root: schema,
            options,
            // Seed with the definition's own pointer so a direct self
            // reference stays a reference instead of unrolling once more.
            visiting: HashSet::from([pointer.clone()]),
            recursive: Vec::new(),
        };
        let body = resolve_node(&target, &pointer, 0, &mut def_ctx)?;
        pending.extend(def_ctx.recursive);
        defs.insert(pointer, body);
    }

    Ok(ResolvedSchema {
        schema: resolved,
        defs,
    })
}

fn resolve_node(
    node: &Value,
    path: &str,
    depth: usize,
    ctx: &mut RefContext<'_>,
) -> Result<Value, SubtypeError> {
    if depth > ctx.options.max_depth {
        return Err(SubtypeError::RecursionDepthExceeded {
            path: path.to_string(),
            max_depth: ctx.options.max_depth,
        });
    }

    let Some(obj) = node.as_object() else {
        return Ok(node.clone());
    };

    if let Some(ref_str) = obj.get("$ref").and_then(Value::as_str) {
        return resolve_single_ref(ref_str, path, depth, ctx);
    }

    let mut result = obj.clone();
    recurse_children(&mut result, path, depth, ctx)?;
    Ok(Value::Object(result))
}

fn resolve_single_ref(
    ref_str: &str,
    path: &str,
    depth: usize,
    ctx: &mut RefContext<'_>,
) -> Result<Value, SubtypeError> {
    if !ref_str.starts_with('#') {
        return Err(SubtypeError::Unsupported {
            path: path.to_string(),
            feature: format!("non-local $ref: {}", ref_str),
        });
    }
    if ref_str != "#" && !ref_str.starts_with("#/") {
        return Err(SubtypeError::Unsupported {
            path: path.to_string(),
            feature: format!("non-pointer fragment $ref: {}", ref_str),
        });
    }

    // A revisit closes a cycle: keep the reference and record the target.
    if ctx.visiting.contains(ref_str) {
        ctx.recursive.push(ref_str.to_string());
        return Ok(Value::Object(Map::from_iter([(
            "$ref".to_string(),
            Value::String(ref_str.to_string()),
        )])));
    }

    let target = resolve_pointer(ctx.root, ref_str).ok_or_else(|| SubtypeError::UnresolvableRef {
        path: path.to_string(),
        reference: ref_str.to_string(),
    })?;

    ctx.visiting.insert(ref_str.to_string());
    let resolved = resolve_node(&target, path, depth + 1, ctx)?;
    ctx.visiting.remove(ref_str);
    Ok(resolved)
}

/// Resolve a JSON Pointer against a root document.
pub(crate) fn resolve_pointer(root: &Value, pointer: &str) -> Option<Value> {
    let path = pointer.strip_prefix('#')?;
    if path.is_empty() {
        return Some(root.clone());
    }
    let path = path.strip_prefix('/')?;

    let mut current = root;
    for segment in path.split('/') {
        let key = segment.replace("~1", "/").replace("~0", "~");
        match current {
            Value::Object(obj) => current = obj.get(&key)?,
            Value::Array(arr) => {
                let idx: usize = key.parse().ok()?;
                current = arr.get(idx)?;
            }
            _ => return None,
        }
    }
    Some(current.clone())
}

/// Recurse into all schema-bearing children of an object.
fn recurse_children(
    obj: &mut Map<String, Value>,
    path: &str,
    depth: usize,
    ctx: &mut RefContext<'_>,
) -> Result<(), SubtypeError> {
    // Map-of-schemas keywords.
    for key in ["properties", "patternProperties", "$defs", "definitions"] {
        if let Some(Value::Object(map)) = obj.remove(key) {
            let mut new_map = Map::new();
            for (k, v) in map {
                let child_path = build_path(path, &[key, &k]);
                new_map.insert(k, resolve_node(&v, &child_path, depth + 1, ctx)?);
            }
            obj.insert(key.to_string(), Value::Object(new_map));
        }
    }

    // Single-schema keywords.
    for key in ["additionalProperties", "additionalItems", "not", "items"] {
        if let Some(val) = obj.remove(key) {
            if val.is_object() {
                let child_path = build_path(path, &[key]);
                obj.insert(
                    key.to_string(),
                    resolve_node(&val, &child_path, depth + 1, ctx)?,
                );
            } else if let Value::Array(arr) = val {
                // Draft-04 tuple form of `items`.
                let mut new_arr = Vec::with_capacity(arr.len());
                for (i, item) in arr.into_iter().enumerate() {
                    let child_path = build_path(path, &[key, &i.to_string()]);
                    new_arr.push(resolve_node(&item, &child_path, depth + 1, ctx)?);
                }
                obj.insert(key.to_string(), Value::Array(new_arr));
            } else {
                obj.insert(key.to_string(), val);
            }
        }
    }

    // Array-of-schemas keywords.
    for key in ["anyOf", "oneOf", "allOf"] {
        if let Some(Value::Array(arr)) = obj.remove(key) {
            let mut new_arr = Vec::with_capacity(arr.len());
            for (i, item) in arr.into_iter().enumerate() {
                let child_path = build_path(path, &[key, &i.to_string()]);
                new_arr.push(resolve_node(&item, &child_path, depth + 1, ctx)?);
            }
            obj.insert(key.to_string(), Value::Array(new_arr));
        }
    }

    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
