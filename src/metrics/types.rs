use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counts of classified click targets within one or more sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionCounts {
    pub likes: u32,
    pub retweets: u32,
    pub postings: u32,
    pub follows: u32,
    pub follows_by_tweet: u32,
    pub media_clicks: u32,
    pub hashtag_clicks: u32,
    pub detail_views: u32,
    pub author_profile_clicks: u32,
}

impl InteractionCounts {
    /// Count one event by its `target`; unknown or missing targets are skipped.
    pub fn record(&mut self, target: Option<&str>) {
        match target {
            Some("like") => self.likes += 1,
            Some("retweet") => self.retweets += 1,
            Some("posting") => self.postings += 1,
            Some("follow") => self.follows += 1,
            Some("followByTweet") => self.follows_by_tweet += 1,
            Some("clickOnMedia") => self.media_clicks += 1,
            Some("clickOnHashtag") => self.hashtag_clicks += 1,
            Some("openDetailsView") => self.detail_views += 1,
            Some("visitAuthorsProfile") => self.author_profile_clicks += 1,
            _ => {}
        }
    }

    pub fn total(&self) -> u32 {
        self.likes
            + self.retweets
            + self.postings
            + self.follows
            + self.follows_by_tweet
            + self.media_clicks
            + self.hashtag_clicks
            + self.detail_views
            + self.author_profile_clicks
    }

    pub fn merge(&mut self, other: &InteractionCounts) {
        self.likes += other.likes;
        self.retweets += other.retweets;
        self.postings += other.postings;
        self.follows += other.follows;
        self.follows_by_tweet += other.follows_by_tweet;
        self.media_clicks += other.media_clicks;
        self.hashtag_clicks += other.hashtag_clicks;
        self.detail_views += other.detail_views;
        self.author_profile_clicks += other.author_profile_clicks;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetrics {
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: i64,
    pub event_count: usize,
    /// Tweets scrolled past, from the first to the last scroll estimate.
    pub scrolled_tweets: Option<i64>,
    pub interactions: InteractionCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMetrics {
    pub session_count: usize,
    pub total_duration_secs: i64,
    pub mean_duration_secs: f64,
    pub interactions: InteractionCounts,
}
