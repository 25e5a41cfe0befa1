//! Request-scoped parameter validator and expander.
//!
//! A `ParamTester` owns the parameters of one request together with two
//! behaviours: the callback run once validation passes, and an optional async
//! expand function that rewrites selected fields (typically a vault lookup).
//!
//! Keys are given as comma-separated lists. A dotted key (`user.id`) names a
//! field inside a nested object, one level per dot.

use std::fmt;
use std::future::Future;

use futures::future::{try_join_all, BoxFuture, FutureExt};
use serde_json::Value;
use tracing::{debug, warn};

use super::ParamBag;
use crate::errors::ParamError;

/// Error text stored when `expand` runs without an expand function.
pub const EXPANDER_NOT_SET: &str = "set_expandfunction first before call expand";

type Callback = Box<dyn Fn(ParamBag) -> BoxFuture<'static, Value> + Send + Sync>;
type ExpandFn = Box<dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

pub struct ParamTester {
    params: ParamBag,
    callback: Callback,
    expand_fn: Option<ExpandFn>,
    missing: Vec<String>,
}

impl ParamTester {
    /// Wrap `params`. The default callback returns `null`.
    pub fn new(params: ParamBag) -> Self {
        Self {
            params,
            callback: Box::new(|_| async { Value::Null }.boxed()),
            expand_fn: None,
            missing: Vec::new(),
        }
    }

    /// Replace the callback. It receives a snapshot of the parameters.
    pub fn set_callback<F, Fut>(&mut self, callback: F)
    where
        F: Fn(ParamBag) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        self.callback = Box::new(move |params| callback(params).boxed());
    }

    pub fn add_param(&mut self, key: impl Into<String>, value: Value) {
        self.params.insert(key.into(), value);
    }

    /// Check that every key in `required` is present in `target`.
    ///
    /// All keys are evaluated; afterwards [`missing`](Self::missing) lists the
    /// leaf name of each key that failed, replacing the previous list.
    pub fn check_has_keys(&mut self, required: &[&str], target: &ParamBag) -> bool {
        check_keys(required, target, &mut self.missing)
    }

    /// Validate `required_csv` against the parameters and run the callback.
    pub async fn check_and_eval(&mut self, required_csv: &str) -> Result<Value, ParamError> {
        let keys = split_keys(required_csv);
        if check_keys(&keys, &self.params, &mut self.missing) {
            Ok(self.evaluate().await)
        } else {
            debug!(missing = ?self.missing, "required parameters missing");
            Err(ParamError::MissingParameters {
                missing: self.missing.clone(),
            })
        }
    }

    /// [`check_and_eval`](Self::check_and_eval) with a replacement callback.
    pub async fn check_and_eval_with<F, Fut>(
        &mut self,
        required_csv: &str,
        callback: F,
    ) -> Result<Value, ParamError>
    where
        F: Fn(ParamBag) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        self.set_callback(callback);
        self.check_and_eval(required_csv).await
    }

    pub fn set_expand_function<F, Fut>(&mut self, expand_fn: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.expand_fn = Some(Box::new(move |value| expand_fn(value).boxed()));
    }

    /// Replace each field named in `expand_csv` with the expand function
    /// applied to its current value.
    ///
    /// Expansions run concurrently and are written back only once all of them
    /// succeeded; the first failure is returned and leaves the parameters
    /// untouched. A missing key or an unset expand function is not an error:
    /// it is recorded in the `error` parameter instead.
    pub async fn expand(&mut self, expand_csv: &str) -> anyhow::Result<()> {
        let Some(expand_fn) = self.expand_fn.as_ref() else {
            warn!("expand called without an expand function");
            self.params
                .insert("error".to_string(), Value::String(EXPANDER_NOT_SET.to_string()));
            return Ok(());
        };

        let keys = split_keys(expand_csv);
        if !check_keys(&keys, &self.params, &mut self.missing) {
            warn!(missing = ?self.missing, "cannot expand missing parameters");
            self.params.insert(
                "error".to_string(),
                Value::String(format!("expand error: {expand_csv}")),
            );
            return Ok(());
        }

        let pending = keys.iter().map(|key| {
            let current = lookup(&self.params, key).cloned().unwrap_or_default();
            expand_fn(current)
        });
        let expanded = try_join_all(pending).await?;

        for (key, value) in keys.iter().zip(expanded) {
            if let Some(slot) = lookup_mut(&mut self.params, key) {
                *slot = value;
            }
        }
        debug!(keys = ?keys, "parameters expanded");
        Ok(())
    }

    pub fn get_params(&self) -> &ParamBag {
        &self.params
    }

    pub fn get_params_mut(&mut self) -> &mut ParamBag {
        &mut self.params
    }

    pub fn into_params(self) -> ParamBag {
        self.params
    }

    /// Keys that failed the most recent validation.
    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    /// Run the callback without validating.
    pub async fn evaluate(&self) -> Value {
        (self.callback)(self.params.clone()).await
    }
}

impl fmt::Debug for ParamTester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamTester")
            .field("params", &self.params)
            .field("missing", &self.missing)
            .field("has_expand_fn", &self.expand_fn.is_some())
            .finish_non_exhaustive()
    }
}

fn split_keys(csv: &str) -> Vec<&str> {
    csv.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .collect()
}

fn check_keys(required: &[&str], target: &ParamBag, missing: &mut Vec<String>) -> bool {
    missing.clear();
    required
        .iter()
        .fold(true, |all, key| has_key(target, key, missing) && all)
}

fn has_key(target: &ParamBag, key: &str, missing: &mut Vec<String>) -> bool {
    match key.split_once('.') {
        Some((parent, rest)) => match target.get(parent).and_then(Value::as_object) {
            Some(child) => has_key(child, rest, missing),
            None => {
                let leaf = rest.rsplit('.').next().unwrap_or(rest);
                missing.push(leaf.to_string());
                false
            }
        },
        None => {
            let present = target.contains_key(key);
            if !present {
                missing.push(key.to_string());
            }
            present
        }
    }
}

fn lookup<'a>(bag: &'a ParamBag, key: &str) -> Option<&'a Value> {
    match key.split_once('.') {
        Some((parent, rest)) => lookup(bag.get(parent)?.as_object()?, rest),
        None => bag.get(key),
    }
}

fn lookup_mut<'a>(bag: &'a mut ParamBag, key: &str) -> Option<&'a mut Value> {
    match key.split_once('.') {
        Some((parent, rest)) => lookup_mut(bag.get_mut(parent)?.as_object_mut()?, rest),
        None => bag.get_mut(key),
    }
}
