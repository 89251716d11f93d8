use serde::{Deserialize, Serialize};

/// A curated archive collection offered in the admin UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct CollectionDescriptor {
    /// Archive collection key, e.g. `feature_films`.
    pub key: String,
    pub display_name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub description: String,
    /// Last known item count. `None` until the first successful count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approximate_count: Option<u64>,
}

impl CollectionDescriptor {
    fn builtin(key: &str, display_name: &str, icon: &str, description: &str) -> Self {
        Self {
            key: key.to_string(),
            display_name: display_name.to_string(),
            icon: icon.to_string(),
            description: description.to_string(),
            approximate_count: None,
        }
    }
}

fn builtins() -> Vec<CollectionDescriptor> {
    vec![
        CollectionDescriptor::builtin(
            "feature_films",
            "Feature Films",
            "film",
            "Full-length public domain feature films",
        ),
        CollectionDescriptor::builtin(
            "SciFi_Horror",
            "Sci-Fi / Horror",
            "ghost",
            "Classic science fiction and horror",
        ),
        CollectionDescriptor::builtin(
            "film_noir",
            "Film Noir",
            "moon",
            "Crime dramas of the noir era",
        ),
        CollectionDescriptor::builtin(
            "comedy_films",
            "Comedy",
            "smile",
            "Comedies and screwball classics",
        ),
        CollectionDescriptor::builtin(
            "silent_films",
            "Silent Films",
            "volume-x",
            "Films from the silent era",
        ),
        CollectionDescriptor::builtin(
            "classic_cartoons",
            "Cartoons",
            "palette",
            "Classic animated shorts",
        ),
        CollectionDescriptor::builtin(
            "classic_tv",
            "Classic TV",
            "tv",
            "Vintage television episodes",
        ),
    ]
}

/// Known collections: the built-in set plus configured additions.
///
/// A configured descriptor whose key matches a built-in replaces it in place.
#[derive(Debug, Clone)]
pub struct CollectionRegistry {
    collections: Vec<CollectionDescriptor>,
}

impl Default for CollectionRegistry {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl CollectionRegistry {
    pub fn new(configured: &[CollectionDescriptor]) -> Self {
        let mut collections = builtins();
        for descriptor in configured {
            match collections
                .iter_mut()
                .find(|c| c.key.eq_ignore_ascii_case(&descriptor.key))
            {
                Some(existing) => *existing = descriptor.clone(),
                None => collections.push(descriptor.clone()),
            }
        }
        Self { collections }
    }

    pub fn all(&self) -> &[CollectionDescriptor] {
        &self.collections
    }

    pub fn get(&self, key: &str) -> Option<&CollectionDescriptor> {
        self.collections
            .iter()
            .find(|c| c.key.eq_ignore_ascii_case(key))
    }

    /// Display name of the first known collection in `keys`.
    pub fn category_for(&self, keys: &[String]) -> Option<String> {
        keys.iter()
            .find_map(|k| self.get(k))
            .map(|c| c.display_name.clone())
    }
}
