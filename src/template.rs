//! `{{ name }}` substitution over JSON data.
//!
//! Jinja syntax rendered with auto-escaping off, so `<`, `>`, `&` and quotes
//! are emitted as given. Every `{{ name }}` reads `data.name`; unknown
//! variables, and attributes of unknown variables, render as empty.

use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde_json::Value;

use crate::errors::TemplateError;

pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.set_keep_trailing_newline(true);
        Self { env }
    }

    /// Render `template` against `data`. Fails if the template does not parse.
    pub async fn render(&self, template: &str, data: &Value) -> Result<String, TemplateError> {
        Ok(self.env.render_str(template, data)?)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_substitutes_spaced_placeholders() {
        let engine = TemplateEngine::new();
        let out = engine
            .render("{{ foo }} and {{var}}", &json!({ "foo": "bar", "var": "newvalue" }))
            .await
            .unwrap();
        assert_eq!(out, "bar and newvalue");
    }

    #[tokio::test]
    async fn test_does_not_escape() {
        let engine = TemplateEngine::new();
        let out = engine
            .render("{{ body }}", &json!({ "body": "<b>fish & 'chips'</b>" }))
            .await
            .unwrap();
        assert_eq!(out, "<b>fish & 'chips'</b>");
    }

    #[tokio::test]
    async fn test_missing_variable_renders_empty() {
        let engine = TemplateEngine::new();
        let out = engine
            .render(r#"{"to":"{{ to }}"}"#, &json!({}))
            .await
            .unwrap();
        assert_eq!(out, r#"{"to":""}"#);
    }

    #[tokio::test]
    async fn test_unclosed_block_is_an_error() {
        let engine = TemplateEngine::new();
        let result = engine.render("{% if ok %}never closed", &json!({ "ok": true })).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_keys_named_like_builtins_read_from_data() {
        let engine = TemplateEngine::new();
        let data = json!({ "log": "L", "and": "A", "len": 3, "lookup": "K", "eq": "E" });
        let out = engine
            .render("{{ log }}|{{ and }}|{{ len }}|{{ lookup }}|{{ eq }}", &data)
            .await
            .unwrap();
        assert_eq!(out, "L|A|3|K|E");
    }

    #[tokio::test]
    async fn test_backslash_before_placeholder_is_literal() {
        let engine = TemplateEngine::new();
        let out = engine
            .render(r#"{"p":"C:\\{{ d }}"}"#, &json!({ "d": "x" }))
            .await
            .unwrap();
        assert_eq!(out, r#"{"p":"C:\\x"}"#);
    }

    #[tokio::test]
    async fn test_nested_lookup_and_missing_parent() {
        let engine = TemplateEngine::new();
        let data = json!({ "hasura": { "action": "notify" } });
        let out = engine
            .render("{{ hasura.action }}/{{ user.id }}\n", &data)
            .await
            .unwrap();
        assert_eq!(out, "notify/\n");
    }
}
