//! The built-in FastAPI + Postgres + Next.js starter.
//!
//! Template text lives under `blueprint/` at the crate root and is embedded at compile time.
//! Files ending in `.tera` are rendered against the run's configuration; everything else is
//! written verbatim.

use crate::{
    template::{EnvFile, Rendered, Verbatim},
    vfs::{Scaffold, VirtualFile},
};

macro_rules! blueprint_file {
    ($path:literal) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/blueprint/", $path))
    };
}

/// The fixed catalog, in reporting order.
pub fn scaffold() -> Scaffold {
    Scaffold::new(vec![
        // root
        VirtualFile::new(
            "docker-compose.yml",
            Verbatim(blueprint_file!("docker-compose.yml")),
        ),
        VirtualFile::new(".env.example", EnvFile::example()),
        VirtualFile::new(".env", EnvFile::local()),
        VirtualFile::new(".gitignore", Verbatim(blueprint_file!("gitignore"))),
        VirtualFile::new(
            "README.md",
            Rendered {
                name: "README.md",
                source: blueprint_file!("README.md.tera"),
            },
        ),
        // backend
        VirtualFile::new(
            "backend/Dockerfile",
            Verbatim(blueprint_file!("backend/Dockerfile")),
        ),
        VirtualFile::new(
            "backend/.dockerignore",
            Verbatim(blueprint_file!("backend/dockerignore")),
        ),
        VirtualFile::new(
            "backend/requirements.txt",
            Verbatim(blueprint_file!("backend/requirements.txt")),
        ),
        VirtualFile::new("backend/app/__init__.py", Verbatim("")),
        VirtualFile::new(
            "backend/app/main.py",
            Rendered {
                name: "backend/app/main.py",
                source: blueprint_file!("backend/app/main.py.tera"),
            },
        ),
        VirtualFile::new(
            "backend/app/db.py",
            Verbatim(blueprint_file!("backend/app/db.py")),
        ),
        // frontend
        VirtualFile::new(
            "frontend/Dockerfile",
            Verbatim(blueprint_file!("frontend/Dockerfile")),
        ),
        VirtualFile::new(
            "frontend/.dockerignore",
            Verbatim(blueprint_file!("frontend/dockerignore")),
        ),
        VirtualFile::new(
            "frontend/package.json",
            Verbatim(blueprint_file!("frontend/package.json")),
        ),
        VirtualFile::new(
            "frontend/next.config.js",
            Verbatim(blueprint_file!("frontend/next.config.js")),
        ),
        // pre-populated so `next dev` does not rewrite it on first boot
        VirtualFile::new(
            "frontend/tsconfig.json",
            Verbatim(blueprint_file!("frontend/tsconfig.json")),
        ),
        VirtualFile::new(
            "frontend/next-env.d.ts",
            Verbatim(blueprint_file!("frontend/next-env.d.ts")),
        ),
        VirtualFile::new(
            "frontend/app/layout.tsx",
            Verbatim(blueprint_file!("frontend/app/layout.tsx")),
        ),
        VirtualFile::new(
            "frontend/app/page.tsx",
            Verbatim(blueprint_file!("frontend/app/page.tsx")),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Configuration, OverwritePolicy, Overrides, Settings};
    use std::{collections::HashSet, path::Path};

    fn render(path: &str, config: &Configuration) -> String {
        let scaffold = scaffold();
        let file = scaffold
            .files()
            .iter()
            .find(|file| file.path().to_string() == path)
            .expect("file is in the scaffold");

        String::from_utf8(file.produce(config).expect("renders")).expect("utf8")
    }

    fn default_config() -> Configuration {
        Configuration::new("/repo", OverwritePolicy::KeepExisting, Settings::default())
    }

    #[test]
    fn test_paths_are_unique_and_resolvable() {
        let scaffold = scaffold();
        let mut seen = HashSet::new();

        for file in scaffold.files() {
            assert!(seen.insert(file.path().to_string()), "duplicate {}", file.path());
            file.path()
                .resolve_under(Path::new("/repo"))
                .expect("registry paths stay under the root");
        }

        assert_eq!(scaffold.len(), 19);
    }

    #[test]
    fn test_every_template_renders_with_defaults() {
        let config = default_config();

        for file in scaffold().files() {
            file.produce(&config).expect("renders with defaults");
        }
    }

    #[test]
    fn test_backend_exposes_diagnostic_endpoints() {
        let main = render("backend/app/main.py", &default_config());

        for endpoint in ["/health", "/hello", "/db/ping"] {
            assert!(main.contains(&format!("{{API_PREFIX}}{}", endpoint)));
        }
        assert!(main.contains("API_PREFIX = \"/api\""));
        assert!(main.contains("os.getenv(\"CORS_ORIGINS\", \"http://localhost:3000\")"));
    }

    #[test]
    fn test_overrides_land_inside_string_literals() {
        let overrides = Overrides::from_assignments(&[
            "CORS_ORIGINS=http://a.test, http://b.test".to_string(),
            "POSTGRES_DB=hack_db".to_string(),
        ])
        .expect("valid");
        let config = Configuration::new(
            "/repo",
            OverwritePolicy::KeepExisting,
            Settings::from_overrides(&overrides).expect("valid"),
        );

        let main = render("backend/app/main.py", &config);
        let readme = render("README.md", &config);

        assert!(main.contains(
            "cors_origins = _split_csv(os.getenv(\"CORS_ORIGINS\", \"http://a.test,http://b.test\"))\n"
        ));
        assert!(readme.contains("(database `hack_db`)"));
    }

    #[test]
    fn test_tsconfig_carries_next_additions() {
        let tsconfig = render("frontend/tsconfig.json", &default_config());

        assert!(tsconfig.contains(".next/types/**/*.ts"));
        assert!(tsconfig.contains("{ \"name\": \"next\" }"));
        assert!(tsconfig.contains("\"esModuleInterop\": true"));
    }

    #[test]
    fn test_readme_reflects_resolved_ports() {
        let overrides = Overrides::from_assignments(&[
            "FRONTEND_PORT=3100".to_string(),
            "BACKEND_PORT=8100".to_string(),
        ])
        .expect("valid");
        let config = Configuration::new(
            "/repo",
            OverwritePolicy::KeepExisting,
            Settings::from_overrides(&overrides).expect("valid"),
        );

        let readme = render("README.md", &config);

        assert!(readme.contains("http://localhost:3100"));
        assert!(readme.contains("http://localhost:8100"));
    }
}
