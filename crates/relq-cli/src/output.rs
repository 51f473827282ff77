use crate::cli::OutputFormat;
use crate::params::to_json;
use comfy_table::{presets::UTF8_FULL, Table};
use relq_query::{Cacheability, CompiledCommand};
use serde_json::json;

pub fn render(command: &CompiledCommand, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => {
            let parameters: Vec<_> = command
                .parameters
                .iter()
                .map(|p| {
                    json!({
                        "name": p.name,
                        "store_type": p.store_type,
                        "value": to_json(&p.value),
                    })
                })
                .collect();
            let document = json!({
                "command_text": command.command_text,
                "parameters": parameters,
                "cacheability": command.cacheability,
            });
            Ok(serde_json::to_string_pretty(&document)?)
        }
        OutputFormat::Text => {
            let mut out = format!("{}\n", command.command_text);
            if !command.parameters.is_empty() {
                let mut table = Table::new();
                table.load_preset(UTF8_FULL);
                table.set_header(vec!["Parameter", "Store type", "Value"]);
                for p in &command.parameters {
                    table.add_row(vec![
                        format!("@{}", p.name),
                        p.store_type.clone(),
                        to_json(&p.value).to_string(),
                    ]);
                }
                out.push_str(&format!("\n{}\n", table));
            }
            out.push_str(&format!("\nCacheability: {}\n", describe(&command.cacheability)));
            Ok(out)
        }
    }
}

fn describe(cacheability: &Cacheability) -> String {
    match cacheability {
        Cacheability::ByShape => "by shape".to_string(),
        Cacheability::ByNullness(names) => format!("by shape and nullness of {}", names.join(", ")),
        Cacheability::PerValues => "per values (not cached)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relq_query::{BoundParameter, Value};

    fn command() -> CompiledCommand {
        CompiledCommand {
            command_text: "SELECT 1 FROM [Blogs] AS [b] WHERE [b].[Id] IN (@p0, @p1)".into(),
            parameters: vec![
                BoundParameter {
                    name: "p0".into(),
                    store_type: "int".into(),
                    value: Value::Int(1),
                },
                BoundParameter {
                    name: "p1".into(),
                    store_type: "int".into(),
                    value: Value::Int(2),
                },
            ],
            cacheability: Cacheability::PerValues,
        }
    }

    #[test]
    fn test_text_output() {
        let text = render(&command(), OutputFormat::Text).unwrap();

        assert!(text.starts_with("SELECT 1 FROM [Blogs]"));
        assert!(text.contains("@p1"));
        assert!(text.ends_with("Cacheability: per values (not cached)\n"));
    }

    #[test]
    fn test_json_output() {
        let text = render(&command(), OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(parsed["parameters"][1]["value"], 2);
        assert_eq!(parsed["cacheability"]["kind"], "per_values");
    }
}
