//! Theme catalog loaded once at startup from a JSON file or URL.

use std::{fmt, path::PathBuf};

use rand::{Rng, seq::IndexedRandom};
use reqwest::Url;
use thiserror::Error;
use tracing::{info, warn};

use crate::dao::models::ThemeEntity;

/// Location of the JSON theme list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeSource {
    /// Local JSON file.
    File(PathBuf),
    /// JSON served over HTTP(S).
    Url(Url),
}

impl ThemeSource {
    /// Interpret `raw` as a URL when it uses an HTTP scheme, as a path otherwise.
    pub fn parse(raw: &str) -> Self {
        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => ThemeSource::Url(url),
            _ => ThemeSource::File(PathBuf::from(raw)),
        }
    }
}

impl fmt::Display for ThemeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThemeSource::File(path) => write!(f, "{}", path.display()),
            ThemeSource::Url(url) => write!(f, "{url}"),
        }
    }
}

#[derive(Debug, Error)]
enum CatalogError {
    #[error("failed to read theme file")]
    Read(#[from] std::io::Error),
    #[error("failed to fetch themes")]
    Fetch(#[from] reqwest::Error),
    #[error("theme server answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed theme list")]
    Parse(#[from] serde_json::Error),
}

/// Read-only list of themes available for the session.
#[derive(Debug, Clone, Default)]
pub struct ThemeCatalog {
    themes: Vec<ThemeEntity>,
}

impl ThemeCatalog {
    /// Catalog holding `themes` in order.
    pub fn new(themes: Vec<ThemeEntity>) -> Self {
        Self { themes }
    }

    /// Load the catalog, degrading to an empty list on any failure.
    pub async fn load(source: &ThemeSource) -> Self {
        match fetch(source).await {
            Ok(themes) => {
                info!(source = %source, count = themes.len(), "loaded theme catalog");
                Self::new(themes)
            }
            Err(err) => {
                warn!(
                    source = %source,
                    error = %err,
                    "failed to load theme catalog; no themes available"
                );
                Self::default()
            }
        }
    }

    /// Every theme, in file order.
    pub fn themes(&self) -> &[ThemeEntity] {
        &self.themes
    }

    /// Whether no theme could be loaded.
    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
    }

    /// Theme with the given id.
    pub fn find(&self, id: u32) -> Option<&ThemeEntity> {
        self.themes.iter().find(|theme| theme.id == id)
    }

    /// Pick a theme uniformly at random.
    pub fn pick(&self, rng: &mut impl Rng) -> Option<&ThemeEntity> {
        self.themes.choose(rng)
    }
}

async fn fetch(source: &ThemeSource) -> Result<Vec<ThemeEntity>, CatalogError> {
    let raw = match source {
        ThemeSource::File(path) => tokio::fs::read_to_string(path).await?,
        ThemeSource::Url(url) => {
            let response = reqwest::get(url.clone()).await?;
            if !response.status().is_success() {
                return Err(CatalogError::Status(response.status()));
            }
            response.text().await?
        }
    };

    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn theme(id: u32, description: &str) -> ThemeEntity {
        ThemeEntity {
            id,
            description: description.into(),
            min_value: 1,
            max_value: 100,
        }
    }

    #[test]
    fn source_distinguishes_urls_from_paths() {
        assert!(matches!(
            ThemeSource::parse("https://example.com/themes.json"),
            ThemeSource::Url(_)
        ));
        assert_eq!(
            ThemeSource::parse("themes.json"),
            ThemeSource::File(PathBuf::from("themes.json"))
        );
        assert!(matches!(
            ThemeSource::parse("C:/games/themes.json"),
            ThemeSource::File(_)
        ));
    }

    #[tokio::test]
    async fn loads_themes_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": 1, "descricao": "Altura de prédios", "valor_minimo": 1, "valor_maximo": 100}},
               {{"id": 2, "descricao": "Preço de carros", "valor_minimo": 1, "valor_maximo": 100}}]"#
        )
        .unwrap();

        let catalog = ThemeCatalog::load(&ThemeSource::File(file.path().to_path_buf())).await;
        assert_eq!(catalog.themes().len(), 2);
        assert_eq!(catalog.find(2).unwrap().description, "Preço de carros");
        assert!(catalog.find(3).is_none());
    }

    #[tokio::test]
    async fn missing_file_yields_empty_catalog() {
        let catalog =
            ThemeCatalog::load(&ThemeSource::File(PathBuf::from("/definitely/not/here.json")))
                .await;
        assert!(catalog.is_empty());
    }

    #[tokio::test]
    async fn malformed_file_yields_empty_catalog() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let catalog = ThemeCatalog::load(&ThemeSource::File(file.path().to_path_buf())).await;
        assert!(catalog.is_empty());
    }

    #[test]
    fn pick_draws_from_catalog() {
        let catalog = ThemeCatalog::new(vec![theme(1, "a"), theme(2, "b"), theme(3, "c")]);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..20 {
            let picked = catalog.pick(&mut rng).unwrap();
            assert!(catalog.themes().contains(picked));
        }
        assert!(ThemeCatalog::default().pick(&mut rng).is_none());
    }
}
