pub mod movie;

pub use movie::Movie;

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Film not found: {0}")]
    NotFound(String),

    #[error("Request to the film API failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Film API sent a malformed body: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Thin client over the public Ghibli film API.
#[derive(Debug, Clone)]
pub struct MovieCatalog {
    client: reqwest::Client,
    base: String,
}

impl MovieCatalog {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    fn films_url(&self) -> String {
        format!("{}/films", self.base)
    }

    fn film_url(&self, id: &str) -> String {
        format!("{}/films/{}", self.base, id.trim())
    }

    /// `GET {base}/films`, in the order the API returns them.
    pub async fn list(&self) -> Result<Vec<Movie>, CatalogError> {
        let url = self.films_url();
        log::debug!("Fetching film list from {url}");

        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let movies = decode_films(&body)?;
        log::debug!("Fetched {} films", movies.len());
        Ok(movies)
    }

    /// `GET {base}/films/{id}`. The API answers unknown ids with 404 and
    /// malformed ones with 400; both are a miss from the caller's view.
    pub async fn get(&self, id: &str) -> Result<Movie, CatalogError> {
        let url = self.film_url(id);
        log::debug!("Fetching film {id} from {url}");

        let response = self.client.get(&url).send().await?;
        if matches!(
            response.status(),
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST
        ) {
            return Err(CatalogError::NotFound(id.to_string()));
        }

        let body = response.error_for_status()?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Decodes the listing record by record; a record that does not fit is
/// logged and left out instead of failing the whole list.
fn decode_films(body: &str) -> Result<Vec<Movie>, CatalogError> {
    let records: Vec<serde_json::Value> = serde_json::from_str(body)?;
    let total = records.len();

    let movies: Vec<Movie> = records
        .into_iter()
        .enumerate()
        .filter_map(|(position, record)| match serde_json::from_value(record) {
            Ok(movie) => Some(movie),
            Err(err) => {
                log::warn!("Skipping film record #{position}: {err}");
                None
            }
        })
        .collect();

    if movies.len() < total {
        log::warn!("Kept {} of {total} film records", movies.len());
    }
    Ok(movies)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_ignore_trailing_slash() {
        let catalog = MovieCatalog::new("https://ghibliapi.dev/");
        assert_eq!(catalog.films_url(), "https://ghibliapi.dev/films");
        assert_eq!(
            catalog.film_url("58611129-2dbc-4a81-a72f-77ddfc1b1b49"),
            "https://ghibliapi.dev/films/58611129-2dbc-4a81-a72f-77ddfc1b1b49"
        );
    }

    #[test]
    fn listing_with_partial_records_still_decodes() {
        let body = r#"[
            {"id": "1", "title": "Castle in the Sky", "director": "Hayao Miyazaki", "release_date": "1986"},
            {"id": "2"}
        ]"#;
        let movies = decode_films(body).unwrap();
        assert_eq!(movies.len(), 2);
        assert_eq!(movies[1].director(), None);
    }

    #[test]
    fn odd_field_types_do_not_sink_the_listing() {
        let body = r#"[
            {"id": "1", "title": "Castle in the Sky", "director": "Hayao Miyazaki", "release_date": "1986", "rt_score": "95"},
            {"id": "2", "title": "Grave of the Fireflies", "rt_score": 97.5},
            {"id": "3", "title": "My Neighbor Totoro", "running_time": 86}
        ]"#;
        let movies = decode_films(body).unwrap();
        assert_eq!(movies.len(), 3);
        assert_eq!(movies[1].rt_score, Some(98));
        assert_eq!(movies[2].running_time.as_deref(), Some("86"));
    }

    #[test]
    fn undecodable_record_is_skipped() {
        let body = r#"[
            {"id": "1", "title": "Castle in the Sky"},
            {"id": 2, "title": "Grave of the Fireflies"},
            "not a film",
            {"id": "4", "title": "Kiki's Delivery Service", "director": ["Hayao Miyazaki"]},
            {"id": "5", "title": "Only Yesterday"}
        ]"#;
        let movies = decode_films(body).unwrap();
        let ids: Vec<&str> = movies.iter().map(|movie| movie.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "5"]);
    }

    #[test]
    fn non_array_body_is_malformed() {
        let err = decode_films(r#"{"message": "oops"}"#).unwrap_err();
        assert!(matches!(err, CatalogError::Malformed(_)));
    }
}
