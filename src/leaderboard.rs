use itertools::Itertools;
use std::cmp::Reverse;
use std::collections::HashMap;

use crate::feed::models::{LeaderboardEntry, Post};
use crate::utils::encode_uri_component;

pub const GAMES_BASE_URL: &str = "https://shiba.hackclub.com/games";

pub fn game_link(slack_id: &str, game_name: &str) -> String {
    format!(
        "{}/{}/{}",
        GAMES_BASE_URL,
        slack_id,
        encode_uri_component(game_name)
    )
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.is_empty())
}

/// One entry per author, built from their best-scoring post, ranked by seeds.
///
/// Posts without an author, without a game name, or without a positive seed
/// total are skipped. An author's entry is only replaced by a strictly better
/// post, and authors with equal totals keep their first-seen order.
pub fn generate(posts: &[Post]) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for post in posts {
        let (Some(slack_id), Some(game_name)) = (non_empty(&post.slack_id), non_empty(&post.game_name))
        else {
            continue;
        };
        let total_seeds = post.total_seeds();
        if total_seeds <= 0 {
            continue;
        }

        let entry = LeaderboardEntry {
            slack_id: slack_id.to_string(),
            game_name: game_name.to_string(),
            total_seeds,
            game_link: game_link(slack_id, game_name),
            thumbnail: post.thumbnail().map(str::to_string),
        };

        match positions.get(slack_id) {
            Some(&idx) if entries[idx].total_seeds < total_seeds => entries[idx] = entry,
            Some(_) => {}
            None => {
                positions.insert(slack_id, entries.len());
                entries.push(entry);
            }
        }
    }

    // sorted_by_key is stable, ties keep insertion order
    entries
        .into_iter()
        .sorted_by_key(|entry| Reverse(entry.total_seeds))
        .collect()
}
