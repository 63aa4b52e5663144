//! Own-profile editing with optimistic cache writes.

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::api::client::{ApiError, T2rClient};
use crate::api::{get_profile_data, print_profile, update_profile_data};
use crate::cache::QueryCache;
use crate::config::Config;
use crate::location::LocationDirectory;
use crate::models::{Profile, ProfileUpdate};
use crate::validation::{self, ValidationError};

#[async_trait]
pub trait ProfileBackend: Send + Sync {
    async fn fetch_profile(&self) -> Result<Profile, ApiError>;
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), ApiError>;
}

#[async_trait]
impl ProfileBackend for T2rClient {
    async fn fetch_profile(&self) -> Result<Profile, ApiError> {
        get_profile_data(self).await
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), ApiError> {
        update_profile_data(self, update).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("profile update failed: {0}")]
    Api(#[from] ApiError),
}

/// Fields to change; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub about_me: Option<String>,
    pub date_of_birth: Option<String>,
    pub current_state: Option<String>,
    pub current_city: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.about_me.is_none()
            && self.date_of_birth.is_none()
            && self.current_state.is_none()
            && self.current_city.is_none()
    }

    /// Overlay the changes on an update prefilled from the current profile.
    pub fn apply(&self, update: &mut ProfileUpdate) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            update.name = name.trim().to_string();
        }
        if let Some(about) = &self.about_me {
            update.about_me = about.trim().to_string();
        }
        if let Some(date) = &self.date_of_birth {
            update.date_of_birth = validation::parse_date(date)?;
        }
        if let Some(state) = &self.current_state {
            update.current_state = state.trim().to_uppercase();
        }
        if let Some(city) = &self.current_city {
            update.current_city = city.trim().to_string();
        }
        Ok(())
    }
}

/// Write `update` into the cache, then send it. On failure the cache is
/// restored to exactly what it held before.
pub async fn update_profile_optimistic<B: ProfileBackend + ?Sized>(
    backend: &B,
    cache: &mut QueryCache<Profile>,
    update: &ProfileUpdate,
) -> Result<(), ProfileError> {
    validation::validate_profile_update(update)?;

    let snapshot = cache.snapshot();
    cache.update(|profile| update.apply_to(profile));

    if let Err(e) = backend.update_profile(update).await {
        tracing::warn!("Profile update rejected, rolling back: {}", e);
        cache.restore(snapshot);
        return Err(e.into());
    }
    Ok(())
}

/// Load the profile into the cache if it is not there yet.
pub async fn load_profile<'a, B: ProfileBackend + ?Sized>(
    backend: &B,
    cache: &'a mut QueryCache<Profile>,
) -> Result<&'a Profile, ApiError> {
    if let Some(generation) = cache.ensure() {
        match backend.fetch_profile().await {
            Ok(profile) => {
                cache.apply(generation, profile);
            }
            Err(e) => {
                cache.fail(generation);
                return Err(e);
            }
        }
    }
    match cache.get() {
        Some(profile) => Ok(profile),
        None => Err(ApiError::InvalidArgument("profile is not loaded")),
    }
}

/// Check the updated city against its state before anything is written.
async fn check_location(location_url: &str, update: &ProfileUpdate) -> Result<()> {
    let mut locations = LocationDirectory::new(location_url)?;
    locations
        .check_city(&update.current_state, &update.current_city)
        .await
}

/// `profile update`: apply the given changes and print the result.
pub async fn update_profile(changes: ProfileChanges) -> Result<()> {
    if changes.is_empty() {
        anyhow::bail!("Nothing to update. Pass at least one of --name, --about, --birth-date, --state, --city.");
    }

    let config = Config::load()?;
    let client = T2rClient::from_config(&config)?;
    let mut cache = QueryCache::new();
    let current = load_profile(&client, &mut cache)
        .await
        .context("Failed to load profile")?;

    let mut update = ProfileUpdate::from_profile(current);
    changes.apply(&mut update)?;
    check_location(&config.location_url, &update).await?;

    update_profile_optimistic(&client, &mut cache, &update).await?;

    println!("Profile updated.");
    if let Some(profile) = cache.get() {
        print_profile(profile);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InterlocutorType;
    use chrono::NaiveDate;
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    struct FakeBackend {
        profile: Profile,
        fail_update: bool,
        updates: Mutex<Vec<ProfileUpdate>>,
    }

    impl FakeBackend {
        fn new(fail_update: bool) -> Self {
            Self {
                profile: profile(),
                fail_update,
                updates: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ProfileBackend for FakeBackend {
        async fn fetch_profile(&self) -> Result<Profile, ApiError> {
            Ok(self.profile.clone())
        }

        async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), ApiError> {
            self.updates.lock().unwrap().push(update.clone());
            if self.fail_update {
                return Err(ApiError::Status {
                    status: 500,
                    url: "http://localhost:8080/interlocutor".to_string(),
                    body: String::new(),
                });
            }
            Ok(())
        }
    }

    fn profile() -> Profile {
        Profile {
            id: "u1".to_string(),
            name: "Yusuf".to_string(),
            about_me: "Teacher".to_string(),
            email: "yusuf@example.com".to_string(),
            interlocutor_type: InterlocutorType::Immigrant,
            date_of_birth: NaiveDate::from_ymd_opt(1985, 7, 2).unwrap(),
            current_state: "PR".to_string(),
            current_city: "Curitiba".to_string(),
            profile_picture: Some("pic.png".to_string()),
        }
    }

    fn changed_update() -> ProfileUpdate {
        let mut update = ProfileUpdate::from_profile(&profile());
        update.current_state = "SC".to_string();
        update.current_city = "Florianópolis".to_string();
        update
    }

    #[tokio::test]
    async fn test_optimistic_write_visible_on_success() {
        let backend = FakeBackend::new(false);
        let mut cache = QueryCache::new();
        load_profile(&backend, &mut cache).await.unwrap();

        assert_ok!(update_profile_optimistic(&backend, &mut cache, &changed_update()).await);
        let cached = cache.get().unwrap();
        assert_eq!(cached.current_city, "Florianópolis");
        assert_eq!(cached.email, "yusuf@example.com");
        assert_eq!(backend.updates.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_server_error_restores_exact_snapshot() {
        let backend = FakeBackend::new(true);
        let mut cache = QueryCache::new();
        load_profile(&backend, &mut cache).await.unwrap();
        let before = cache.snapshot();

        let err = update_profile_optimistic(&backend, &mut cache, &changed_update())
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileError::Api(ApiError::Status { status: 500, .. })));
        assert_eq!(cache.snapshot(), before);
    }

    #[tokio::test]
    async fn test_invalid_update_never_reaches_backend() {
        let backend = FakeBackend::new(false);
        let mut cache = QueryCache::new();
        load_profile(&backend, &mut cache).await.unwrap();

        let mut update = changed_update();
        update.current_state = "SCX".to_string();
        let err = assert_err!(update_profile_optimistic(&backend, &mut cache, &update).await);
        assert!(matches!(err, ProfileError::Invalid(_)));
        assert!(backend.updates.lock().unwrap().is_empty());
        assert_eq!(cache.get(), Some(&profile()));
    }

    #[tokio::test]
    async fn test_load_profile_fetches_once() {
        let backend = FakeBackend::new(false);
        let mut cache = QueryCache::new();
        load_profile(&backend, &mut cache).await.unwrap();
        cache.update(|p| p.name = "Local".to_string());
        let again = load_profile(&backend, &mut cache).await.unwrap();
        assert_eq!(again.name, "Local");
    }

    #[tokio::test]
    async fn test_location_check_on_update() {
        let mut update = changed_update();
        update.current_state = "SP".to_string();
        update.current_city = "Campinas".to_string();
        // Lookup service unreachable: the city is not checked.
        assert_ok!(check_location("http://127.0.0.1:9/estados", &update).await);
        assert_err!(check_location("not a url", &update).await);
    }

    #[test]
    fn test_changes_overlay() {
        let mut update = ProfileUpdate::from_profile(&profile());
        let changes = ProfileChanges {
            current_state: Some(" rs ".to_string()),
            date_of_birth: Some("1986-01-20".to_string()),
            ..Default::default()
        };
        assert!(!changes.is_empty());
        changes.apply(&mut update).unwrap();
        assert_eq!(update.current_state, "RS");
        assert_eq!(update.date_of_birth, NaiveDate::from_ymd_opt(1986, 1, 20).unwrap());
        assert_eq!(update.name, "Yusuf");

        let bad = ProfileChanges {
            date_of_birth: Some("20/01/1986".to_string()),
            ..Default::default()
        };
        assert!(bad.apply(&mut update).is_err());
    }
}
