pub mod hallucinate;
pub mod health;
pub mod history;
pub mod suggestions;
