//! Built-in curated collection: a small set of public-domain classics
//! hosted on Wikimedia, available even when every upstream API is down.

use async_trait::async_trait;
use rand::seq::SliceRandom;

use super::{ArtSource, SourceError};
use crate::models::{ArtSourceId, Artwork};

struct CuratedWork {
    id: &'static str,
    title: &'static str,
    artist: &'static str,
    date: &'static str,
    url: &'static str,
}

const COLLECTION: &[CuratedWork] = &[
    CuratedWork {
        id: "starry-night",
        title: "The Starry Night",
        artist: "Vincent van Gogh",
        date: "1889",
        url: "https://upload.wikimedia.org/wikipedia/commons/e/ea/Van_Gogh_-_Starry_Night_-_Google_Art_Project.jpg",
    },
    CuratedWork {
        id: "great-wave",
        title: "The Great Wave off Kanagawa",
        artist: "Katsushika Hokusai",
        date: "1831",
        url: "https://upload.wikimedia.org/wikipedia/commons/0/0d/Great_Wave_off_Kanagawa2.jpg",
    },
    CuratedWork {
        id: "girl-pearl-earring",
        title: "Girl with a Pearl Earring",
        artist: "Johannes Vermeer",
        date: "1665",
        url: "https://upload.wikimedia.org/wikipedia/commons/d/d7/Meisje_met_de_parel.jpg",
    },
    CuratedWork {
        id: "water-lilies",
        title: "Water Lilies",
        artist: "Claude Monet",
        date: "1906",
        url: "https://upload.wikimedia.org/wikipedia/commons/a/aa/Claude_Monet_-_Water_Lilies_-_1906%2C_Ryerson.jpg",
    },
    CuratedWork {
        id: "wanderer-fog",
        title: "Wanderer above the Sea of Fog",
        artist: "Caspar David Friedrich",
        date: "1818",
        url: "https://upload.wikimedia.org/wikipedia/commons/b/b9/Caspar_David_Friedrich_-_Wanderer_above_the_sea_of_fog.jpg",
    },
    CuratedWork {
        id: "night-watch",
        title: "The Night Watch",
        artist: "Rembrandt van Rijn",
        date: "1642",
        url: "https://upload.wikimedia.org/wikipedia/commons/2/28/The_Night_Watch_-_HD.jpg",
    },
    CuratedWork {
        id: "american-gothic",
        title: "American Gothic",
        artist: "Grant Wood",
        date: "1930",
        url: "https://upload.wikimedia.org/wikipedia/commons/c/cc/Grant_Wood_-_American_Gothic_-_Google_Art_Project.jpg",
    },
    CuratedWork {
        id: "birth-of-venus",
        title: "The Birth of Venus",
        artist: "Sandro Botticelli",
        date: "1486",
        url: "https://upload.wikimedia.org/wikipedia/commons/0/0b/Sandro_Botticelli_-_La_nascita_di_Venere_-_Google_Art_Project_-_edited.jpg",
    },
    CuratedWork {
        id: "kiss",
        title: "The Kiss",
        artist: "Gustav Klimt",
        date: "1908",
        url: "https://upload.wikimedia.org/wikipedia/commons/4/40/The_Kiss_-_Gustav_Klimt_-_Google_Cultural_Institute.jpg",
    },
    CuratedWork {
        id: "impression-sunrise",
        title: "Impression, Sunrise",
        artist: "Claude Monet",
        date: "1872",
        url: "https://upload.wikimedia.org/wikipedia/commons/5/59/Monet_-_Impression%2C_Sunrise.jpg",
    },
    CuratedWork {
        id: "composition-viii",
        title: "Composition VIII",
        artist: "Wassily Kandinsky",
        date: "1923",
        url: "https://upload.wikimedia.org/wikipedia/commons/7/73/Vassily_Kandinsky%2C_1923_-_Composition_8.jpg",
    },
    CuratedWork {
        id: "arnolfini-portrait",
        title: "The Arnolfini Portrait",
        artist: "Jan van Eyck",
        date: "1434",
        url: "https://upload.wikimedia.org/wikipedia/commons/3/33/Van_Eyck_-_Arnolfini_Portrait.jpg",
    },
];

pub struct CuratedSource;

impl CuratedSource {
    pub fn new() -> Self {
        Self
    }

    fn to_artwork(work: &CuratedWork) -> Artwork {
        Artwork {
            id: ArtSourceId::Curated.artwork_id(work.id),
            title: work.title.to_string(),
            artist: work.artist.to_string(),
            date: work.date.to_string(),
            image_url: work.url.to_string(),
            thumbnail_url: work.url.to_string(),
            source: ArtSourceId::Curated,
            score: None,
            department: Some("Paintings".to_string()),
        }
    }
}

impl Default for CuratedSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtSource for CuratedSource {
    fn id(&self) -> ArtSourceId {
        ArtSourceId::Curated
    }

    fn supports_random(&self) -> bool {
        true
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Artwork>, SourceError> {
        let needle = query.to_lowercase();
        Ok(COLLECTION
            .iter()
            .filter(|w| {
                w.title.to_lowercase().contains(&needle)
                    || w.artist.to_lowercase().contains(&needle)
            })
            .skip(offset)
            .take(limit)
            .map(Self::to_artwork)
            .collect())
    }

    async fn random(&self) -> Result<Artwork, SourceError> {
        let work = {
            let mut rng = rand::thread_rng();
            COLLECTION.choose(&mut rng)
        };
        work.map(Self::to_artwork)
            .ok_or_else(|| SourceError::Shape("empty collection".into()))
    }
}
