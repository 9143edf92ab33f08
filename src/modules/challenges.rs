use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ChallengeConfig;
use crate::error::{FeedError, Result};

/// Challenge details as served by the challenge API.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Challenge {
    pub key: String,
    pub name: String,
    pub description: String,
    pub country: Option<String>,
    pub coding_challenge: Option<serde_json::Value>,
}

#[async_trait]
pub trait ChallengeService: Send + Sync {
    async fn get_challenge(&self, key: &str) -> Result<Challenge>;
}

/// Challenges declared in the config file.
pub struct CatalogChallengeService {
    challenges: Vec<Challenge>,
}

impl CatalogChallengeService {
    pub fn new(entries: &[ChallengeConfig]) -> Self {
        let challenges = entries
            .iter()
            .map(|c| Challenge {
                key: c.key.clone(),
                name: c.name.clone(),
                description: c.description.clone(),
                country: c.country.clone(),
                coding_challenge: c.coding_challenge.then(|| serde_json::json!({})),
            })
            .collect();
        Self { challenges }
    }
}

#[async_trait]
impl ChallengeService for CatalogChallengeService {
    async fn get_challenge(&self, key: &str) -> Result<Challenge> {
        self.challenges
            .iter()
            .find(|c| c.key == key)
            .cloned()
            .ok_or_else(|| FeedError::ChallengeNotFound(key.to_string()))
    }
}

#[derive(Deserialize)]
struct ChallengeList {
    #[serde(default)]
    data: Vec<Challenge>,
}

/// Looks challenges up via `GET <base>/api/Challenges/?key=<key>`.
pub struct HttpChallengeService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChallengeService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into() }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/Challenges/", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChallengeService for HttpChallengeService {
    async fn get_challenge(&self, key: &str) -> Result<Challenge> {
        let url = self.endpoint();
        debug!(%url, key, "Fetching challenge");
        let list: ChallengeList = self
            .client
            .get(&url)
            .query(&[("key", key)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        list.data
            .into_iter()
            .next()
            .ok_or_else(|| FeedError::ChallengeNotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> CatalogChallengeService {
        CatalogChallengeService::new(&[
            ChallengeConfig {
                key: "scoreBoardChallenge".into(),
                name: "Score Board".into(),
                description: "Find the carefully hidden 'Score Board' page.".into(),
                country: None,
                coding_challenge: true,
            },
            ChallengeConfig {
                key: "errorHandlingChallenge".into(),
                name: "Error Handling".into(),
                description: "Provoke an error.".into(),
                country: Some("errorHandlingChallenge".into()),
                coding_challenge: false,
            },
        ])
    }

    #[tokio::test]
    async fn test_catalog_lookup_by_key() {
        let c = catalog().get_challenge("scoreBoardChallenge").await.unwrap();
        assert_eq!(c.name, "Score Board");
        assert!(c.coding_challenge.is_some());

        let c = catalog().get_challenge("errorHandlingChallenge").await.unwrap();
        assert!(c.coding_challenge.is_none());
        assert_eq!(c.country.as_deref(), Some("errorHandlingChallenge"));
    }

    #[tokio::test]
    async fn test_catalog_unknown_key() {
        let err = catalog().get_challenge("missing").await.unwrap_err();
        assert!(matches!(err, FeedError::ChallengeNotFound(k) if k == "missing"));
    }

    #[test]
    fn test_api_row_with_null_coding_challenge() {
        let list: ChallengeList = serde_json::from_str(
            r#"{"status":"success","data":[{"key":"k1","name":"Test","description":"d","codingChallenge":null,"difficulty":1}]}"#,
        )
        .unwrap();
        assert_eq!(list.data[0].name, "Test");
        assert!(list.data[0].coding_challenge.is_none());
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let svc = HttpChallengeService::new("http://localhost:3000/");
        assert_eq!(svc.endpoint(), "http://localhost:3000/api/Challenges/");
    }
}
