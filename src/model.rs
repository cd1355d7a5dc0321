use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    pub medium: String,
    pub original: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub time: String,
    pub days: Vec<String>,
}

/// A show as the rest of the app sees it.
///
/// `local_id` is assigned by the store and changes whenever the show list is
/// repopulated; `api_id` is the catalog identity and never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Show {
    pub local_id: i64,
    pub api_id: i64,
    pub name: String,
    pub summary: String,
    pub images: ImageData,
    pub genres: Vec<String>,
    pub schedule: Schedule,
    pub is_favorite: bool,
    pub rating: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub id: i64,
    pub name: String,
    pub number: i64,
    pub season: i64,
    pub summary: String,
    pub image: ImageData,
    pub rating: f32,
}
