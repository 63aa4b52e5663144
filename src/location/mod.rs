//! Brazilian state and municipality lookup (IBGE localities API).
//!
//! Read-only. Keeps the state list and the cities of the last selected
//! state, so forms can offer and check location values.

use anyhow::Result;
use serde::Deserialize;

use crate::api::client::{decode_json, execute, join_url, ApiError};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct State {
    pub id: u32,
    /// Two-letter code (UF)
    pub sigla: String,
    pub nome: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct City {
    pub id: u32,
    pub nome: String,
}

/// Sort key that ignores case and Portuguese diacritics, so "Águas" sorts with "A".
pub fn collation_key(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' | 'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'u',
            'ç' | 'Ç' => 'c',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

pub fn sort_states(states: &mut [State]) {
    states.sort_by(|a, b| a.sigla.cmp(&b.sigla));
}

pub fn sort_cities(cities: &mut [City]) {
    cities.sort_by_cached_key(|c| collation_key(&c.nome));
}

/// Location lookup state: the state list and the cities of the last selected state.
pub struct LocationDirectory {
    http: reqwest::Client,
    base_url: String,
    states: Vec<State>,
    cities: Vec<City>,
}

impl LocationDirectory {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        join_url(base_url, "/")?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.to_string(),
            states: Vec::new(),
            cities: Vec::new(),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = join_url(&self.base_url, path)?;
        let url_str = url.to_string();
        tracing::debug!("Location GET {}", url_str);
        let resp = execute(self.http.get(url), &url_str).await?;
        decode_json(resp, &url_str).await
    }

    /// Fetch all states, sorted by code.
    pub async fn load_states(&mut self) -> Result<&[State], ApiError> {
        let mut states: Vec<State> = self.get("/").await?;
        sort_states(&mut states);
        self.states = states;
        Ok(&self.states)
    }

    /// Select a state and fetch its municipalities, sorted by name.
    pub async fn select_state(&mut self, uf: &str) -> Result<&[City], ApiError> {
        let uf = uf.trim().to_uppercase();
        if uf.is_empty() {
            return Err(ApiError::InvalidArgument("state code must not be empty"));
        }
        let mut cities: Vec<City> = self.get(&format!("/{}/municipios", uf)).await?;
        sort_cities(&mut cities);
        self.cities = cities;
        Ok(&self.cities)
    }

    /// Whether the selected state's cities include `name` (case and accent insensitive).
    pub fn has_city(&self, name: &str) -> bool {
        let key = collation_key(name.trim());
        self.cities.iter().any(|c| collation_key(&c.nome) == key)
    }

    /// Check that `city` belongs to `uf`. Lookup failures are logged and let through;
    /// only a successful lookup that lacks the city is an error.
    pub async fn check_city(&mut self, uf: &str, city: &str) -> Result<()> {
        let lookup = self.select_state(uf).await.map(|cities| cities.is_empty());
        match lookup {
            Ok(true) => {
                anyhow::bail!("Unknown state '{}'", uf);
            }
            Ok(false) => {
                if !self.has_city(city) {
                    anyhow::bail!("'{}' is not a municipality of {}", city, uf.to_uppercase());
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Location lookup unavailable, skipping city check: {:#}", e);
                Ok(())
            }
        }
    }
}

/// List states (prints to stdout).
pub async fn list_states(base_url: &str) -> Result<()> {
    let mut dir = LocationDirectory::new(base_url)?;
    for state in dir.load_states().await? {
        println!("{}  {}", state.sigla, state.nome);
    }
    Ok(())
}

/// List municipalities of a state (prints to stdout).
pub async fn list_cities(base_url: &str, uf: &str) -> Result<()> {
    let mut dir = LocationDirectory::new(base_url)?;
    let cities = dir.select_state(uf).await?;
    if cities.is_empty() {
        println!("(no municipalities found for {})", uf.to_uppercase());
    }
    for city in cities {
        println!("{}", city.nome);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city(id: u32, nome: &str) -> City {
        City {
            id,
            nome: nome.to_string(),
        }
    }

    #[test]
    fn test_states_sorted_by_code() {
        let json = r#"[
            {"id": 35, "sigla": "SP", "nome": "São Paulo", "regiao": {"id": 3}},
            {"id": 12, "sigla": "AC", "nome": "Acre"},
            {"id": 41, "sigla": "PR", "nome": "Paraná"}
        ]"#;
        let mut states: Vec<State> = serde_json::from_str(json).unwrap();
        sort_states(&mut states);
        let codes: Vec<&str> = states.iter().map(|s| s.sigla.as_str()).collect();
        assert_eq!(codes, vec!["AC", "PR", "SP"]);
    }

    #[test]
    fn test_cities_sorted_ignoring_accents() {
        let mut cities = vec![
            city(1, "Campinas"),
            city(2, "Águas de Lindóia"),
            city(3, "Barueri"),
            city(4, "Avaré"),
        ];
        sort_cities(&mut cities);
        let names: Vec<&str> = cities.iter().map(|c| c.nome.as_str()).collect();
        assert_eq!(names, vec!["Águas de Lindóia", "Avaré", "Barueri", "Campinas"]);
    }

    #[test]
    fn test_has_city_is_accent_insensitive() {
        let mut dir = LocationDirectory::new("https://example.org/estados").unwrap();
        dir.cities = vec![city(1, "São José dos Campos")];
        assert!(dir.has_city("sao jose dos campos"));
        assert!(dir.has_city(" São José dos Campos "));
        assert!(!dir.has_city("Campos"));
    }

    #[tokio::test]
    async fn test_check_city_lets_through_when_lookup_fails() {
        // Nothing listens on port 9, so the lookup fails and the check passes.
        let mut dir = LocationDirectory::new("http://127.0.0.1:9/estados").unwrap();
        assert!(dir.check_city("SP", "Campinas").await.is_ok());
    }
}
