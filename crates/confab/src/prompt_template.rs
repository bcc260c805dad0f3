use serde::Serialize;
use tera::{Context, Error as TeraError, Tera};

/// The fixed per-turn system instruction, rendered with the toolsets
/// bound to the agent.
pub const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_load_prompt() {
        let template = "Hello, {{ name }}! You are {{ age }} years old.";
        let mut context = HashMap::new();
        context.insert("name".to_string(), "Alice".to_string());
        context.insert("age".to_string(), 30.to_string());

        let result = load_prompt(template, &context).unwrap();
        assert_eq!(result, "Hello, Alice! You are 30 years old.");
    }

    #[test]
    fn test_load_prompt_missing_variable() {
        let template = "Hello, {{ name }}! You are {{ age }} years old.";
        let mut context = HashMap::new();
        context.insert("name".to_string(), "Alice".to_string());
        // 'age' is missing from context
        let result = load_prompt(template, &context);
        assert!(result.is_err());
    }

    #[test]
    fn test_system_template_renders_toolsets() {
        #[derive(Serialize)]
        struct ToolsetInfo {
            name: String,
            description: String,
            instructions: String,
        }
        let mut context = HashMap::new();
        context.insert(
            "toolsets",
            vec![ToolsetInfo {
                name: "remote".to_string(),
                description: "Remote tools".to_string(),
                instructions: "Call them sparingly".to_string(),
            }],
        );

        let rendered = load_prompt(SYSTEM_TEMPLATE, &context).unwrap();
        assert!(rendered.contains("remote"));
        assert!(rendered.contains("Call them sparingly"));
    }
}
