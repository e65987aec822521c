use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

const BASE_URL: &str = "https://api.themoviedb.org/3";
const LANG: &str = "ru-RU";

/// Ошибки похода в TMDb. Пустой список результатов ошибкой не считается.
#[derive(Debug, Error)]
pub enum TmdbError {
    #[error("TMDb request failed with status: {0}")]
    Status(StatusCode),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("malformed TMDb response: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct TmdbClient {
    api_key: String,
    base_url: String,
    http: Client,
    // детали и жанры меняются редко, держим их в небольшом TTL-кэше
    detail_cache: Cache<u64, Movie>,
    genre_cache: Cache<u8, Arc<Vec<Genre>>>,
}

impl TmdbClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, BASE_URL.to_string())
    }

    /// Базовый URL переопределяется в тестах (wiremock).
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            http: Client::new(),
            detail_cache: Cache::builder()
                .max_capacity(1_000)
                .time_to_live(Duration::from_secs(10 * 60))
                .build(),
            genre_cache: Cache::builder()
                .max_capacity(1)
                .time_to_live(Duration::from_secs(24 * 60 * 60))
                .build(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path_query: &str) -> Result<T, TmdbError> {
        let url = format!("{}{}", self.base_url, path_query);
        let resp = self.http.get(url).bearer_auth(&self.api_key).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TmdbError::Status(status));
        }
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Поиск фильмов, максимум `limit` (1..10).
    pub async fn search_movies(&self, query: &str, limit: usize) -> Result<Vec<Movie>, TmdbError> {
        let mut data: SearchResp = self
            .get_json(&format!(
                "/search/movie?query={}&language={LANG}&include_adult=false&page=1",
                urlencoding::encode(query)
            ))
            .await?;
        data.results.truncate(limit.min(10));
        Ok(data.results)
    }

    /// Детали фильма — полное описание, рейтинг, постер.
    pub async fn movie_details(&self, id: u64) -> Result<Option<Movie>, TmdbError> {
        if let Some(m) = self.detail_cache.get(&id).await {
            return Ok(Some(m));
        }
        match self.get_json::<Movie>(&format!("/movie/{id}?language={LANG}")).await {
            Ok(m) => {
                self.detail_cache.insert(id, m.clone()).await;
                Ok(Some(m))
            }
            Err(TmdbError::Status(s)) if s == StatusCode::NOT_FOUND => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Имена актёров из верхушки каста (до `limit`).
    pub async fn movie_credits(&self, id: u64, limit: usize) -> Result<Vec<String>, TmdbError> {
        let data: CreditsResp = self
            .get_json(&format!("/movie/{id}/credits?language={LANG}"))
            .await?;
        Ok(data.cast.into_iter().take(limit).map(|c| c.name).collect())
    }

    /// Самое популярное за день.
    pub async fn trending(&self, limit: usize) -> Result<Vec<Movie>, TmdbError> {
        let mut data: SearchResp = self
            .get_json(&format!("/trending/movie/day?language={LANG}"))
            .await?;
        data.results.truncate(limit.min(10));
        Ok(data.results)
    }

    /// Первый найденный человек по имени (с его известными работами).
    pub async fn search_person(&self, query: &str) -> Result<Option<Person>, TmdbError> {
        let data: PersonSearchResp = self
            .get_json(&format!(
                "/search/person?query={}&language={LANG}&include_adult=false&page=1",
                urlencoding::encode(query)
            ))
            .await?;
        Ok(data.results.into_iter().next())
    }

    /// Список жанров. Тянется лениво при первом обращении, дальше из кэша.
    pub async fn genres(&self) -> Result<Arc<Vec<Genre>>, TmdbError> {
        if let Some(g) = self.genre_cache.get(&0).await {
            return Ok(g);
        }
        let data: GenresResp = self
            .get_json(&format!("/genre/movie/list?language={LANG}"))
            .await?;
        let list = Arc::new(data.genres);
        self.genre_cache.insert(0, list.clone()).await;
        Ok(list)
    }

    /// Популярные фильмы жанра.
    pub async fn discover_by_genre(&self, genre_id: u64, limit: usize) -> Result<Vec<Movie>, TmdbError> {
        let mut data: SearchResp = self
            .get_json(&format!(
                "/discover/movie?with_genres={genre_id}&sort_by=popularity.desc&language={LANG}"
            ))
            .await?;
        data.results.truncate(limit.min(10));
        Ok(data.results)
    }
}

/* ======= DTOs ======= */

#[derive(Deserialize, Debug)]
struct SearchResp {
    results: Vec<Movie>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Movie {
    pub id: u64,
    pub title: String,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub vote_average: Option<f64>,
}

impl Movie {
    /// Год релиза из даты вида `YYYY-MM-DD`.
    pub fn year(&self) -> Option<&str> {
        self.release_date.as_deref().and_then(|d| d.get(..4))
    }
}

#[derive(Deserialize, Debug)]
struct PersonSearchResp {
    results: Vec<Person>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Person {
    pub name: String,
    #[serde(default)]
    pub known_for: Vec<KnownFor>,
}

/// В `known_for` вперемешку фильмы и сериалы; у сериалов `title` нет.
#[derive(Deserialize, Debug, Clone)]
pub struct KnownFor {
    pub id: u64,
    pub media_type: Option<String>,
    pub title: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub vote_average: Option<f64>,
}

impl Person {
    /// Известные работы, только фильмы.
    pub fn known_movies(&self) -> Vec<Movie> {
        self.known_for
            .iter()
            .filter(|k| k.media_type.as_deref() == Some("movie"))
            .filter_map(|k| {
                Some(Movie {
                    id: k.id,
                    title: k.title.clone()?,
                    overview: k.overview.clone(),
                    poster_path: k.poster_path.clone(),
                    release_date: k.release_date.clone(),
                    vote_average: k.vote_average,
                })
            })
            .collect()
    }
}

#[derive(Deserialize, Debug)]
struct CreditsResp {
    #[serde(default)]
    cast: Vec<CastMember>,
}

#[derive(Deserialize, Debug)]
struct CastMember {
    name: String,
}

#[derive(Deserialize, Debug)]
struct GenresResp {
    genres: Vec<Genre>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Genre {
    pub id: u64,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TmdbClient {
        TmdbClient::with_base_url("test-key".to_string(), server.uri())
    }

    fn movie_json(id: u64, title: &str, date: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": title,
            "overview": "описание",
            "poster_path": "/p.jpg",
            "release_date": date,
            "vote_average": 8.4,
        })
    }

    #[tokio::test]
    async fn search_parses_typed_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "page": 1,
                "results": [movie_json(27205, "Начало", "2010-07-16"), movie_json(603, "Матрица", "1999-03-31")],
                "total_results": 2,
            })))
            .mount(&server)
            .await;

        let found = client_for(&server).search_movies("Начало", 10).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].title, "Начало");
        assert_eq!(found[0].year(), Some("2010"));
    }

    #[tokio::test]
    async fn search_truncates_to_limit() {
        let server = MockServer::start().await;
        let results: Vec<_> = (0..10).map(|i| movie_json(i, "Фильм", "2020-01-01")).collect();
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": results })))
            .mount(&server)
            .await;

        let found = client_for(&server).search_movies("фильм", 3).await.unwrap();
        assert_eq!(found.len(), 3);
    }

    #[tokio::test]
    async fn http_error_is_status_not_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client_for(&server).search_movies("Начало", 10).await.unwrap_err();
        assert!(matches!(err, TmdbError::Status(s) if s.as_u16() == 500));
    }

    #[tokio::test]
    async fn malformed_body_is_typed_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>rate limited</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).search_movies("Начало", 10).await.unwrap_err();
        assert!(matches!(err, TmdbError::Malformed(_)));
    }

    #[tokio::test]
    async fn details_miss_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let details = client_for(&server).movie_details(1).await.unwrap();
        assert!(details.is_none());
    }

    #[tokio::test]
    async fn details_are_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/27205"))
            .respond_with(ResponseTemplate::new(200).set_body_json(movie_json(27205, "Начало", "2010-07-16")))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let first = client.movie_details(27205).await.unwrap().unwrap();
        let second = client.movie_details(27205).await.unwrap().unwrap();
        assert_eq!(first.title, second.title);
    }

    #[tokio::test]
    async fn person_known_for_keeps_movies_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/person"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "name": "Киану Ривз",
                    "known_for": [
                        { "id": 603, "media_type": "movie", "title": "Матрица", "release_date": "1999-03-31" },
                        { "id": 100, "media_type": "tv", "name": "Сериал" },
                    ],
                }],
            })))
            .mount(&server)
            .await;

        let person = client_for(&server).search_person("Киану").await.unwrap().unwrap();
        let movies = person.known_movies();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].title, "Матрица");
    }

    #[tokio::test]
    async fn genres_fetched_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/genre/movie/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "genres": [{ "id": 28, "name": "боевик" }, { "id": 18, "name": "драма" }],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.genres().await.unwrap().len(), 2);
        assert_eq!(client.genres().await.unwrap()[0].name, "боевик");
    }
}
