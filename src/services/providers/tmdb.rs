/// TMDB provider, used only to map free text to an IMDb id
///
/// API Flow:
/// 1. Search: /search/{movie|tv}?query=..&year=.. → TMDB id of the best hit
/// 2. External ids: /{movie|tv}/{id}/external_ids → IMDb id
use crate::{
    error::AppResult,
    models::{BaseTitle, TitleType, TmdbExternalIds, TmdbSearchResponse},
    services::providers::ExternalIdProvider,
};
use reqwest::Client as HttpClient;

#[derive(Clone)]
pub struct TmdbProvider {
    http_client: HttpClient,
    api_url: String,
}

impl TmdbProvider {
    pub fn new(api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl ExternalIdProvider for TmdbProvider {
    async fn resolve_external_id(
        &self,
        title: &str,
        year: Option<i32>,
        title_type: TitleType,
        credential: &str,
    ) -> AppResult<Option<BaseTitle>> {
        let segment = title_type.tmdb_segment();
        let url = format!("{}/search/{}", self.api_url, segment);

        let mut query = vec![("query", title.to_string())];
        if let Some(year) = year {
            query.push(("year", year.to_string()));
        }

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(credential)
            .header("accept", "application/json")
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), title = %title, "TMDB search rejected");
            return Ok(None);
        }

        let search: TmdbSearchResponse = response.json().await?;
        let Some(first) = search.results.into_iter().next() else {
            return Ok(None);
        };

        let details_url = format!("{}/{}/{}/external_ids", self.api_url, segment, first.id);
        let response = self
            .http_client
            .get(&details_url)
            .bearer_auth(credential)
            .header("accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), tmdb_id = first.id, "TMDB external ids rejected");
            return Ok(None);
        }

        let external: TmdbExternalIds = response.json().await?;
        let Some(imdb_id) = external.imdb_id.filter(|id| !id.is_empty()) else {
            return Ok(None);
        };

        tracing::info!(
            title = %title,
            imdb_id = %imdb_id,
            provider = "tmdb",
            "Resolved title through TMDB"
        );

        let name = first.display_name().unwrap_or(title).to_string();
        Ok(Some(
            BaseTitle::new(imdb_id, title_type, name).with_year(first.year()),
        ))
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_resolve_external_id_two_step() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .and(query_param("query", "Interstellar"))
            .and(query_param("year", "2014"))
            .and(header("authorization", "Bearer token-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"id": 157336, "title": "Interstellar", "release_date": "2014-11-05"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/movie/157336/external_ids"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"imdb_id": "tt0816692"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = TmdbProvider::new(server.uri());
        let result = provider
            .resolve_external_id("Interstellar", Some(2014), TitleType::Movie, "token-1")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.id, "tt0816692");
        assert_eq!(result.name, "Interstellar");
        assert_eq!(result.year, Some(2014));
        assert_eq!(result.title_type, TitleType::Movie);
    }

    #[tokio::test]
    async fn test_series_use_tv_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/tv"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"id": 1396, "name": "Breaking Bad", "first_air_date": "2008-01-20"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tv/1396/external_ids"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"imdb_id": "tt0903747"})),
            )
            .mount(&server)
            .await;

        let provider = TmdbProvider::new(server.uri());
        let result = provider
            .resolve_external_id("Breaking Bad", None, TitleType::Series, "t")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.id, "tt0903747");
        assert_eq!(result.year, Some(2008));
    }

    #[tokio::test]
    async fn test_no_results_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .mount(&server)
            .await;

        let provider = TmdbProvider::new(server.uri());
        let result = provider
            .resolve_external_id("Nothing", None, TitleType::Movie, "t")
            .await
            .unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_missing_imdb_id_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"id": 42, "title": "Obscure"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/movie/42/external_ids"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"imdb_id": null})))
            .mount(&server)
            .await;

        let provider = TmdbProvider::new(server.uri());
        let result = provider
            .resolve_external_id("Obscure", None, TitleType::Movie, "t")
            .await
            .unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let provider = TmdbProvider::new(server.uri());
        let result = provider
            .resolve_external_id("Heat", Some(1995), TitleType::Movie, "bad")
            .await
            .unwrap();

        assert!(result.is_none());
    }
}
