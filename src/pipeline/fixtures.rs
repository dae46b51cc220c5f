//! Canned xmlstats payloads shared by the pipeline tests.

pub const TEAMS: &str = r#"[
    {"team_id": "boston-celtics", "abbreviation": "BOS", "active": true,
     "first_name": "Boston", "last_name": "Celtics", "full_name": "Boston Celtics",
     "conference": "East", "division": "Atlantic", "city": "Boston", "state": "Massachusetts"},
    {"team_id": "philadelphia-76ers", "abbreviation": "PHI", "active": true,
     "first_name": "Philadelphia", "last_name": "76ers", "full_name": "Philadelphia 76ers",
     "conference": "East", "division": "Atlantic", "city": "Philadelphia", "state": "Pennsylvania"}
]"#;

pub const PHI_ROSTER: &str = r#"{
    "team": {"team_id": "philadelphia-76ers", "abbreviation": "PHI", "full_name": "Philadelphia 76ers"},
    "players": [
        {"display_name": "Ben Simmons", "first_name": "Ben", "last_name": "Simmons",
         "position": "PG", "birthplace": "Melbourne, Australia", "uniform_number": "25"},
        {"display_name": "Joel Embiid", "first_name": "Joel", "last_name": "Embiid",
         "position": "C", "birthplace": "Yaounde, Cameroon", "uniform_number": "21"}
    ]
}"#;

pub const BOS_ROSTER: &str = r#"{
    "team": {"team_id": "boston-celtics", "abbreviation": "BOS", "full_name": "Boston Celtics"},
    "players": [
        {"display_name": "Aron Baynes", "first_name": "Aron", "last_name": "Baynes",
         "position": "C", "birthplace": "GISBORNE, AUSTRALIA", "uniform_number": "46"},
        {"display_name": "Kyrie Irving", "first_name": "Kyrie", "last_name": "Irving",
         "position": "PG", "birthplace": "Melbourne, Australia", "uniform_number": "11"}
    ]
}"#;

pub const GAME_ID: &str = "20171020-boston-celtics-at-philadelphia-76ers";

pub const BOXSCORE: &str = r#"{
    "away_team": {"team_id": "boston-celtics", "abbreviation": "BOS", "full_name": "Boston Celtics"},
    "home_team": {"team_id": "philadelphia-76ers", "abbreviation": "PHI", "full_name": "Philadelphia 76ers"},
    "away_period_scores": [24, 22, 26, 25],
    "home_period_scores": [25, 20, 27, 24],
    "away_stats": [
        {"display_name": "Aron Baynes", "team_abbreviation": "BOS", "position": "C", "minutes": 22,
         "points": 6, "assists": 1, "offensive_rebounds": 2, "defensive_rebounds": 6,
         "steals": 0, "blocks": 1, "turnovers": 1, "is_starter": true},
        {"display_name": "Jayson Tatum", "team_abbreviation": "BOS", "position": "SF", "minutes": 36,
         "points": 22, "assists": 3, "offensive_rebounds": 1, "defensive_rebounds": 7,
         "steals": 1, "blocks": 1, "turnovers": 2, "is_starter": true}
    ],
    "home_stats": [
        {"display_name": "Ben Simmons", "team_abbreviation": "PHI", "position": "PG", "minutes": 38,
         "points": 18, "assists": 8, "offensive_rebounds": 3, "defensive_rebounds": 9,
         "steals": 2, "blocks": 0, "turnovers": 4, "is_starter": true}
    ],
    "away_totals": {"points": 97, "assists": 20},
    "home_totals": {"points": 96, "assists": 24},
    "event_information": {"site": {"name": "Wells Fargo Center"}, "attendance": 20590}
}"#;

pub const NOT_FOUND: &str =
    r#"{"error": {"code": "404", "description": "The requested resource was not found."}}"#;
