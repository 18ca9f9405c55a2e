// Protect hook.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use qsl_core::hooks::QslAfterHook;
use qsl_core::{HookContext, HookResult};
use serde_json::Value;

/// Removes secrets from results before they leave the service.
#[derive(Default)]
pub struct ProtectHook {
    /// Dotted paths, e.g. `user.password`
    paths: Vec<String>,
    /// Keys removed at any depth
    deep_fields: HashSet<String>,
}

impl ProtectHook {
    pub fn from_fields(fields: &[&str]) -> Self {
        Self {
            paths: fields.iter().map(|s| s.to_string()).collect(),
            deep_fields: HashSet::new(),
        }
    }

    pub fn from_deep_fields(fields: &[&str]) -> Self {
        Self::default().with_deep_fields(fields)
    }

    pub fn with_paths(mut self, paths: &[&str]) -> Self {
        self.paths.extend(paths.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_deep_fields(mut self, fields: &[&str]) -> Self {
        self.deep_fields.extend(fields.iter().map(|s| s.to_string()));
        self
    }

    pub fn strip(&self, mut v: Value) -> Value {
        for p in &self.paths {
            remove_path(&mut v, p);
        }
        if !self.deep_fields.is_empty() {
            remove_deep_fields(&mut v, &self.deep_fields);
        }
        v
    }
}

fn remove_path(root: &mut Value, path: &str) {
    let parts: Vec<&str> = path
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let Some((last, parents)) = parts.split_last() else {
        return;
    };

    let mut cur = root;
    for p in parents {
        match cur {
            Value::Object(map) => {
                let Some(next) = map.get_mut(*p) else {
                    return;
                };
                cur = next;
            }
            _ => return,
        }
    }

    if let Value::Object(map) = cur {
        map.remove(*last);
    }
}

fn remove_deep_fields(v: &mut Value, fields: &HashSet<String>) {
    match v {
        Value::Object(map) => {
            for f in fields {
                map.remove(f);
            }
            for child in map.values_mut() {
                remove_deep_fields(child, fields);
            }
        }
        Value::Array(items) => {
            for child in items.iter_mut() {
                remove_deep_fields(child, fields);
            }
        }
        _ => {}
    }
}

#[async_trait]
impl<P> QslAfterHook<Value, P> for ProtectHook
where
    P: Clone + Send + Sync + 'static,
{
    async fn run(&self, ctx: &mut HookContext<Value, P>) -> Result<()> {
        let Some(res) = ctx.result.take() else {
            return Ok(());
        };

        ctx.result = Some(match res {
            // `{ data: [...] }` pages as well as single records
            HookResult::One(Value::Object(mut map)) if map.get("data").is_some_and(Value::is_array) => {
                if let Some(Value::Array(items)) = map.remove("data") {
                    let stripped = items.into_iter().map(|x| self.strip(x)).collect();
                    map.insert("data".to_string(), Value::Array(stripped));
                }
                HookResult::One(Value::Object(map))
            }
            other => other.map_records(|v| self.strip(v)),
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn paths_and_deep_fields() {
        let hook = ProtectHook::from_fields(&["user.password"]).with_deep_fields(&["secret"]);
        let out = hook.strip(json!({
            "token": "t",
            "user": {"username": "alice", "password": "h"},
            "nested": [{"secret": 1, "keep": 2}]
        }));
        assert_eq!(
            out,
            json!({"token": "t", "user": {"username": "alice"}, "nested": [{"keep": 2}]})
        );
    }

    #[test]
    fn missing_paths_are_ignored() {
        let hook = ProtectHook::from_fields(&["a.b.c", ""]);
        assert_eq!(hook.strip(json!({"a": 1})), json!({"a": 1}));
    }
}
