use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// Post record as served by the upstream feed. Field names follow the feed's
// JSON verbatim, including its spacing and spelling. Only the fields the
// leaderboard reads are typed; everything else stays raw in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "PostID", default, deserialize_with = "lenient_id")]
    pub post_id: String,
    #[serde(
        rename = "slack id",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub slack_id: Option<String>,
    #[serde(
        rename = "Game Name",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub game_name: Option<String>,
    #[serde(
        rename = "posterShomatoSeeds",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub seeds: Option<Vec<i64>>,
    #[serde(
        rename = "GameThumbnail",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub game_thumbnail: Option<String>,
    #[serde(
        rename = "Attachements",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub attachments: Option<Vec<Attachment>>,
    /// Display-only fields, kept untouched so posts round-trip.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// A field of the wrong type reads as absent instead of failing the whole feed.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(id) => id,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

impl Post {
    /// Sum of the seed sequence. Absent or empty sequences score 0, and the
    /// sum saturates instead of overflowing.
    pub fn total_seeds(&self) -> i64 {
        self.seeds
            .as_deref()
            .unwrap_or_default()
            .iter()
            .fold(0i64, |total, seeds| total.saturating_add(*seeds))
    }

    /// Explicit game thumbnail if set, otherwise the first attachment.
    pub fn thumbnail(&self) -> Option<&str> {
        self.game_thumbnail
            .as_deref()
            .filter(|url| !url.is_empty())
            .or_else(|| {
                self.attachments
                    .as_ref()
                    .and_then(|attachments| attachments.first())
                    .and_then(|attachment| attachment.url.as_deref())
                    .filter(|url| !url.is_empty())
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub slack_id: String,
    pub game_name: String,
    pub total_seeds: i64,
    pub game_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}
