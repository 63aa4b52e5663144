//! Interlocutor endpoints: sign-in, sign-up, own profile, people search.

use anyhow::{Context, Result};

use super::client::{ApiError, T2rClient, AUTH_ROUTE};
use crate::config::Config;
use crate::location::LocationDirectory;
use crate::models::{
    InterlocutorSummary, Profile, ProfileUpdate, SearchFilters, SignInRequest, SignInResponse,
    SignUpForm,
};
use crate::validation;

/// Create an account (prints the outcome).
pub async fn sign_up(form: SignUpForm) -> Result<()> {
    validation::validate_sign_up(&form)?;

    let config = Config::load()?;
    let mut locations = LocationDirectory::new(&config.location_url)?;
    locations
        .check_city(&form.current_state, &form.current_city)
        .await?;

    let client = T2rClient::anonymous(&config)?;
    match create_interlocutor_data(&client, &form).await {
        Ok(()) => {
            println!("Account created. Sign in with: t2r-cli login --email {}", form.email);
            Ok(())
        }
        Err(e) => {
            tracing::debug!("Sign-up failed: {:#}", e);
            // Surface the server's problem title when it sent one
            match e.problem_title() {
                Some(title) => anyhow::bail!("{}", title),
                None => Err(e).context("Sign-up failed"),
            }
        }
    }
}

/// Show the signed-in user's profile.
pub async fn show_profile() -> Result<()> {
    let client = T2rClient::load()?;
    let profile = get_profile_data(&client).await?;
    print_profile(&profile);
    Ok(())
}

pub fn print_profile(profile: &Profile) {
    println!();
    println!("Name:          {}", profile.name);
    println!("E-mail:        {}", profile.email);
    println!("Type:          {}", profile.interlocutor_type);
    println!("Date of birth: {}", profile.date_of_birth.format("%d/%m/%Y"));
    println!(
        "Location:      {}, {}",
        profile.current_city, profile.current_state
    );
    if !profile.about_me.is_empty() {
        println!("About me:      {}", profile.about_me);
    }
    println!("ID:            {}", profile.id);
}

/// Search people by location and name (prints results).
pub async fn search(filters: SearchFilters) -> Result<()> {
    let client = T2rClient::load()?;
    let results = search_data(&client, &filters).await?;

    if results.is_empty() {
        println!("No profiles found.");
        return Ok(());
    }

    for person in &results {
        println!(
            "{} [{}] -- {}, {}",
            person.name,
            person.interlocutor_type.description,
            person.current_city,
            person.current_state
        );
        if !person.about_me.is_empty() {
            println!("  {}", super::chat::preview(&person.about_me, 100));
        }
        println!("  ID: {}  (start a chat: t2r-cli new-chat {})", person.id, person.id);
        println!();
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Data-returning API functions
// ---------------------------------------------------------------------------

/// `POST /interlocutor/auth`
pub async fn sign_in_data(
    client: &T2rClient,
    email: &str,
    password: &str,
) -> Result<SignInResponse, ApiError> {
    let body = SignInRequest {
        email: email.to_string(),
        password: password.to_string(),
    };
    client.post_json(AUTH_ROUTE, &body).await
}

/// `POST /interlocutor`
pub async fn create_interlocutor_data(client: &T2rClient, form: &SignUpForm) -> Result<(), ApiError> {
    client.post("/interlocutor", form).await?;
    Ok(())
}

/// `GET /interlocutor/profile`
pub async fn get_profile_data(client: &T2rClient) -> Result<Profile, ApiError> {
    client.get_json("/interlocutor/profile").await
}

/// `PUT /interlocutor`
pub async fn update_profile_data(client: &T2rClient, update: &ProfileUpdate) -> Result<(), ApiError> {
    client.put("/interlocutor", update).await
}

/// `POST /interlocutor/search`. Blank filters are sent as null.
pub async fn search_data(
    client: &T2rClient,
    filters: &SearchFilters,
) -> Result<Vec<InterlocutorSummary>, ApiError> {
    client
        .post_json("/interlocutor/search", &normalize_filters(filters))
        .await
}

fn normalize_filters(filters: &SearchFilters) -> SearchFilters {
    let clean = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    };
    SearchFilters {
        current_state: clean(&filters.current_state).map(|s| s.to_uppercase()),
        current_city: clean(&filters.current_city),
        name: clean(&filters.name),
    }
}
