/// Cinemeta catalog provider
///
/// API Flow:
/// 1. Meta: /meta/{type}/{id}.json → full metadata for one id
/// 2. Search: /catalog/{type}/top/search={query}.json → ranked previews
use crate::{
    error::{AppError, AppResult},
    models::{BaseTitle, CinemetaCatalogResponse, CinemetaMeta, CinemetaMetaResponse, TitleType},
    services::providers::MetadataProvider,
};
use reqwest::Client as HttpClient;

#[derive(Clone)]
pub struct CinemetaProvider {
    http_client: HttpClient,
    api_url: String,
}

impl CinemetaProvider {
    pub fn new(api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch meta under exactly one type
    async fn fetch_meta_as(&self, title_type: TitleType, id: &str) -> AppResult<BaseTitle> {
        let url = format!(
            "{}/meta/{}/{}.json",
            self.api_url,
            title_type,
            urlencoding::encode(id)
        );
        tracing::debug!(url = %url, "Requesting Cinemeta meta");

        let response = self.http_client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::warn!(status = %status, id = %id, title_type = %title_type, "Cinemeta meta request failed");
            return Err(AppError::NotFound(format!(
                "Cinemeta has no {} with id {} (status {})",
                title_type, id, status
            )));
        }

        let body: CinemetaMetaResponse = response.json().await?;

        body.meta
            .and_then(|meta| meta.into_base_title(title_type))
            .ok_or_else(|| {
                AppError::NotFound(format!("Cinemeta has no {} with id {}", title_type, id))
            })
    }

    async fn search_request(&self, query: &str, title_type: TitleType) -> AppResult<Vec<BaseTitle>> {
        let url = format!(
            "{}/catalog/{}/top/search={}.json",
            self.api_url,
            title_type,
            urlencoding::encode(query)
        );

        let response = self.http_client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::ExternalApi(format!(
                "Cinemeta search returned status {}",
                status
            )));
        }

        let body: CinemetaCatalogResponse = response.json().await?;

        Ok(body
            .metas
            .into_iter()
            .filter_map(|raw| serde_json::from_value::<CinemetaMeta>(raw).ok())
            .filter_map(|meta| meta.into_base_title(title_type))
            .collect())
    }
}

#[async_trait::async_trait]
impl MetadataProvider for CinemetaProvider {
    async fn fetch_meta(&self, title_type: TitleType, id: &str) -> AppResult<BaseTitle> {
        match self.fetch_meta_as(title_type, id).await {
            Ok(meta) => {
                tracing::info!(id = %id, name = %meta.name, provider = "cinemeta", "Meta fetched");
                Ok(meta)
            }
            Err(AppError::NotFound(_)) => {
                let fallback = title_type.other();
                tracing::debug!(id = %id, fallback = %fallback, "Probing the other catalog type");
                self.fetch_meta_as(fallback, id).await
            }
            Err(e) => Err(e),
        }
    }

    /// Never fails: any upstream problem reads as "no matches"
    async fn search_titles(&self, query: &str, title_type: TitleType) -> AppResult<Vec<BaseTitle>> {
        match self.search_request(query, title_type).await {
            Ok(titles) => {
                tracing::debug!(
                    query = %query,
                    results = titles.len(),
                    provider = "cinemeta",
                    "Title search completed"
                );
                Ok(titles)
            }
            Err(e) => {
                tracing::warn!(error = %e, query = %query, "Cinemeta search failed, treating as no match");
                Ok(Vec::new())
            }
        }
    }

    fn name(&self) -> &'static str {
        "cinemeta"
    }
}
