//! Shared domain models.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// A game as returned by the search provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    /// Provider-unique identifier.
    pub id: u64,
    /// Display title.
    pub name: String,
    /// Original release date, carried as epoch seconds on the wire.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub first_release_date: DateTime<Utc>,
}

impl Game {
    /// Release year, used to disambiguate games sharing a title.
    pub fn release_year(&self) -> i32 {
        self.first_release_date.year()
    }

    /// Returns a user-facing label combining title and release year.
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.release_year())
    }
}

/// A game paired with a rating.
///
/// The game reference is absent until a row has been resolved through an
/// explicit selection; recommendation responses always carry it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatedGame {
    /// Resolved game, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<Game>,
    /// Rating on the 1..=10 scale the UI exposes.
    pub rating: f64,
}

impl RatedGame {
    /// An unresolved entry holding only a rating.
    pub fn unresolved(rating: f64) -> Self {
        Self { game: None, rating }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn game_round_trips_epoch_seconds() {
        let json = r#"{"id":7334,"name":"Bloodborne","first_release_date":1427328000}"#;
        let game: Game = serde_json::from_str(json).expect("valid game json");
        assert_eq!(game.id, 7334);
        assert_eq!(game.release_year(), 2015);

        let value = serde_json::to_value(&game).expect("serializable");
        assert_eq!(value["first_release_date"], 1427328000);
    }

    #[test]
    fn display_name_includes_year() {
        let game = Game {
            id: 1,
            name: "Halo".to_string(),
            first_release_date: Utc.with_ymd_and_hms(2001, 11, 15, 0, 0, 0).unwrap(),
        };
        assert_eq!(game.display_name(), "Halo (2001)");
    }

    #[test]
    fn unresolved_rated_game_skips_game_field() {
        let rated = RatedGame::unresolved(7.5);
        let value = serde_json::to_value(&rated).expect("serializable");
        assert!(value.get("game").is_none());
        assert_eq!(value["rating"], 7.5);
    }
}
