use std::sync::Arc;

use axum::response::Json;
use axum::routing::post;
use axum::Router;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::AppState;

pub const SUGGESTION_COUNT: usize = 10;

/// Sample contexts offered under the search bar. Each fits the 32 character
/// context limit.
const CANDIDATES: &[&str] = &[
    "a bakery in paris",
    "retro arcade high scores",
    "lighthouse keeper's diary",
    "mars colony job board",
    "haunted hotel reviews",
    "vintage synthesizer shop",
    "dragon adoption agency",
    "underwater restaurant menu",
    "time travel tour operator",
    "cat cafe reservations",
    "medieval blacksmith forge",
    "indie band tour page",
    "botanical garden map",
    "space station weather",
    "secret society recruiting",
    "pirate radio schedule",
    "robot repair workshop",
    "mountain hut booking",
    "jazz club line-up",
    "alien embassy visas",
    "wizard school syllabus",
    "sourdough starter tracker",
    "cyberpunk noodle stand",
    "antique map collector",
    "moon hotel brochure",
    "detective agency cases",
    "volcano observatory",
    "chess club tournament",
    "ghost tour bookings",
    "tiny house builder",
];

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/suggestions", post(suggestions))
}

#[derive(Debug, Serialize)]
struct Suggestions {
    suggestions: Vec<&'static str>,
}

async fn suggestions() -> Json<Suggestions> {
    Json(Suggestions {
        suggestions: sample(SUGGESTION_COUNT),
    })
}

/// Draw `count` distinct candidates.
fn sample(count: usize) -> Vec<&'static str> {
    CANDIDATES
        .choose_multiple(&mut rand::thread_rng(), count)
        .copied()
        .collect()
}
