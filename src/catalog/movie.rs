use serde::{Deserialize, Deserializer, Serialize};

/// One film as served by the Ghibli API.
///
/// Everything but the id is optional so that a single broken record does not
/// fail the whole listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub original_title: Option<String>,
    #[serde(default)]
    pub original_title_romanised: Option<String>,
    #[serde(default)]
    pub director: Option<String>,
    #[serde(default)]
    pub producer: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default, deserialize_with = "text_from_string_or_number")]
    pub running_time: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub movie_banner: Option<String>,
    #[serde(default, deserialize_with = "rating_from_string_or_number")]
    pub rt_score: Option<u32>,
}

impl Movie {
    pub fn title(&self) -> &str {
        non_blank(&self.title).unwrap_or("Untitled")
    }

    pub fn director(&self) -> Option<&str> {
        non_blank(&self.director)
    }

    pub fn image(&self) -> Option<&str> {
        non_blank(&self.image)
    }

    /// The part of `release_date` before the first `-`, as a number.
    pub fn release_year(&self) -> Option<i32> {
        let date = non_blank(&self.release_date)?;
        date.split('-').next()?.trim().parse().ok()
    }
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Number(f64),
    Text(String),
    Other(serde::de::IgnoredAny),
}

// The API sends "rt_score": "97"; plain and decimal numbers are taken too,
// anything else counts as no rating.
fn rating_from_string_or_number<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let number = match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Number(n)) => Some(n),
        Some(Loose::Text(text)) => text.trim().parse::<f64>().ok(),
        Some(Loose::Other(_)) | None => None,
    };
    Ok(number
        .filter(|n| n.is_finite() && *n >= 0.0 && *n <= f64::from(u32::MAX))
        .map(|n| n.round() as u32))
}

fn text_from_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Text(text)) => Some(text),
        Some(Loose::Number(n)) => Some(n.to_string()),
        Some(Loose::Other(_)) | None => None,
    })
}
