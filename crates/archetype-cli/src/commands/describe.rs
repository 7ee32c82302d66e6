use anyhow::Result;

use archetype_core::metadata::{Metadata, Settings};

use crate::SourceArgs;

/// Print a settings document pre-filled with every declared default.
///
/// The document goes to stdout, so `archetype describe -r ... > settings.yml`
/// yields a file ready for `apply -s @settings.yml`.
pub fn run(source: &SourceArgs) -> Result<()> {
    let (_, metadata) = super::open(source)?;
    print!("{}", render(&metadata)?);
    Ok(())
}

/// The settings skeleton as YAML, preceded by one comment line per parameter.
fn render(metadata: &Metadata) -> Result<String> {
    let mut text = String::new();
    if !metadata.parameters.is_empty() {
        text.push_str("# parameters:\n");
        for (name, parameter) in &metadata.parameters {
            let kind = if parameter.kind.is_empty() {
                "any"
            } else {
                parameter.kind.as_str()
            };
            text.push_str(&format!("#   {name} ({kind})"));
            if !parameter.description.is_empty() {
                text.push_str(&format!(": {}", parameter.description));
            }
            text.push('\n');
        }
    }
    text.push_str(&serde_yaml::to_string(&Settings::skeleton(metadata))?);
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = r#"
version: 1
parameters:
  name:
    type: string
    default: myapp
    description: project name
  replicas:
    type: number
"#;

    #[test]
    fn test_render_skeleton() {
        let metadata = Metadata::parse(METADATA, "test").unwrap();
        let text = render(&metadata).unwrap();
        assert!(text.starts_with("# parameters:\n#   name (string): project name\n#   replicas (number)\n"));

        let settings: Settings = serde_yaml::from_str(&text).unwrap();
        assert_eq!(settings, Settings::skeleton(&metadata));
    }

    #[test]
    fn test_render_empty_metadata() {
        let text = render(&Metadata::default()).unwrap();
        assert!(!text.contains('#'));
        assert!(text.contains("version: 0"));
    }
}
