use crate::config::Configuration;
use miette::Diagnostic;
use std::fmt;
use tera::{Context, Tera};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum TemplateError {
    #[error("Error occurred attempting to render template '{name}'")]
    #[diagnostic(
        code(kickstack::template::render),
        help("Template variables are the lowercase environment keys, e.g. backend_port")
    )]
    Render {
        name: &'static str,
        #[source]
        source: tera::Error,
    },
}

/// Produces the bytes of one generated file from the run's [`Configuration`].
///
/// Implementations are pure: the same configuration always yields the same bytes.
pub trait ContentProducer: fmt::Debug {
    fn produce(&self, config: &Configuration) -> Result<Vec<u8>, TemplateError>;
}

/// Static template text written as-is.
#[derive(Debug, Clone, Copy)]
pub struct Verbatim(pub &'static str);
impl ContentProducer for Verbatim {
    fn produce(&self, _config: &Configuration) -> Result<Vec<u8>, TemplateError> {
        Ok(self.0.as_bytes().to_vec())
    }
}

/// Tera template rendered against the configuration's environment values.
#[derive(Debug, Clone, Copy)]
pub struct Rendered {
    pub name: &'static str,
    pub source: &'static str,
}
impl ContentProducer for Rendered {
    fn produce(&self, config: &Configuration) -> Result<Vec<u8>, TemplateError> {
        let ctx = make_tera_context(config);

        let rendered =
            Tera::one_off(self.source, &ctx, false).map_err(|error| TemplateError::Render {
                name: self.name,
                source: error,
            })?;

        Ok(rendered.into_bytes())
    }
}

/// A dotenv file with one `KEY=value` line per declared variable, in declaration order.
#[derive(Debug, Clone, Copy)]
pub struct EnvFile {
    pub banner: &'static str,
}
impl EnvFile {
    /// The committed template, `.env.example`.
    pub fn example() -> Self {
        Self {
            banner: "# Copy to \".env\" for docker compose usage.\n\
                     # (kickstack also writes a .env with these same values.)\n",
        }
    }
    /// The working copy, `.env`.
    pub fn local() -> Self {
        Self {
            banner: "# Environment for docker compose, generated next to .env.example.\n\
                     # Keep it out of version control.\n",
        }
    }
}
impl ContentProducer for EnvFile {
    fn produce(&self, config: &Configuration) -> Result<Vec<u8>, TemplateError> {
        let mut out = String::from(self.banner);
        let mut current_section = None;

        for (key, value) in config.settings().env_vars() {
            let section = env_section(key);

            if current_section != Some(section) {
                out.push_str(&format!(
                    "\n# --------------------\n# {}\n# --------------------\n",
                    section
                ));
                current_section = Some(section);
            }

            if let Some(comment) = env_comment(key) {
                out.push_str(&format!("\n# {}\n", comment));
            }

            out.push_str(&format!("{}={}\n", key, value));
        }

        Ok(out.into_bytes())
    }
}

fn env_section(key: &str) -> &'static str {
    match key {
        "POSTGRES_USER" | "POSTGRES_PASSWORD" | "POSTGRES_DB" | "POSTGRES_PORT" => "Postgres",
        "NEXT_TELEMETRY_DISABLED" => "Next.js",
        _ => "Backend / Frontend",
    }
}

fn env_comment(key: &str) -> Option<&'static str> {
    match key {
        "NEXT_PUBLIC_API_URL" => {
            Some("Frontend calls backend from your browser, so localhost is correct here.")
        }
        "CORS_ORIGINS" => Some("Comma-separated list for CORS (backend)"),
        "NEXT_TELEMETRY_DISABLED" => Some("Disable anonymous telemetry (avoids the prompt/noise in logs)"),
        _ => None,
    }
}

/// Makes a [`Tera`] [`Context`] holding every environment value under its lowercase key.
fn make_tera_context(config: &Configuration) -> Context {
    let mut ctx = Context::new();

    for (key, value) in config.settings().env_vars() {
        ctx.insert(key.to_lowercase(), &value);
    }

    ctx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OverwritePolicy, Overrides, Settings, ENV_KEYS};
    use indexmap::IndexMap;

    fn config_with(assignments: &[&str]) -> Configuration {
        let assignments: Vec<String> = assignments.iter().map(|s| s.to_string()).collect();
        let overrides = Overrides::from_assignments(&assignments).expect("valid assignments");
        let settings = Settings::from_overrides(&overrides).expect("valid overrides");

        Configuration::new("/repo", OverwritePolicy::KeepExisting, settings)
    }

    fn parse_env(bytes: &[u8]) -> IndexMap<String, String> {
        std::str::from_utf8(bytes)
            .expect("utf8")
            .lines()
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| {
                let (key, value) = line.split_once('=').expect("KEY=value line");
                (key.to_string(), value.to_string())
            })
            .collect()
    }

    #[test]
    fn test_env_file_lists_every_key_once_in_order() {
        let config = config_with(&[]);

        let vars = parse_env(&EnvFile::example().produce(&config).expect("renders"));
        let keys: Vec<&str> = vars.keys().map(String::as_str).collect();

        assert_eq!(keys, ENV_KEYS);
        assert_eq!(vars["POSTGRES_DB"], "app");
        assert_eq!(vars["NEXT_PUBLIC_API_URL"], "http://localhost:8000");
    }

    #[test]
    fn test_example_and_local_env_agree() {
        let config = config_with(&["POSTGRES_PASSWORD=s3cret", "BACKEND_PORT=8080"]);

        let example = parse_env(&EnvFile::example().produce(&config).expect("renders"));
        let local = parse_env(&EnvFile::local().produce(&config).expect("renders"));

        assert_eq!(example, local);
        assert_eq!(local["POSTGRES_PASSWORD"], "s3cret");
        assert_eq!(local["NEXT_PUBLIC_API_URL"], "http://localhost:8080");
    }

    #[test]
    fn test_env_file_is_byte_identical_across_runs() {
        let config = config_with(&["CORS_ORIGINS=http://a.test,http://b.test"]);

        let first = EnvFile::local().produce(&config).expect("renders");
        let second = EnvFile::local().produce(&config).expect("renders");

        assert_eq!(first, second);
    }

    #[test]
    fn test_rendered_substitutes_values() {
        let template = Rendered {
            name: "inline",
            source: "backend on {{ backend_port }}, db {{ postgres_db }}",
        };

        let rendered = template
            .produce(&config_with(&["BACKEND_PORT=9100"]))
            .expect("renders");

        assert_eq!(rendered, b"backend on 9100, db app");
    }

    #[test]
    fn test_rendered_unknown_variable_is_an_error() {
        let template = Rendered {
            name: "broken",
            source: "{{ redis_port }}",
        };

        let result = template.produce(&config_with(&[]));

        assert!(matches!(
            result,
            Err(TemplateError::Render { name: "broken", .. })
        ));
    }
}
