//! Interlocutor (user profile) models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which side of the matching domain a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterlocutorType {
    Refugee,
    Immigrant,
    Collaborator,
}

impl InterlocutorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterlocutorType::Refugee => "refugee",
            InterlocutorType::Immigrant => "immigrant",
            InterlocutorType::Collaborator => "collaborator",
        }
    }
}

impl fmt::Display for InterlocutorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterlocutorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "refugee" => Ok(InterlocutorType::Refugee),
            "immigrant" => Ok(InterlocutorType::Immigrant),
            "collaborator" => Ok(InterlocutorType::Collaborator),
            other => Err(other.to_string()),
        }
    }
}

/// The signed-in user's own profile (`GET /interlocutor/profile`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub about_me: String,
    pub email: String,
    pub interlocutor_type: InterlocutorType,
    pub date_of_birth: NaiveDate,
    pub current_state: String,
    pub current_city: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

/// Body of `PUT /interlocutor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: String,
    pub about_me: String,
    pub date_of_birth: NaiveDate,
    pub current_state: String,
    pub current_city: String,
}

impl ProfileUpdate {
    /// Start an update from the current profile values (form prefill).
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            name: profile.name.clone(),
            about_me: profile.about_me.clone(),
            date_of_birth: profile.date_of_birth,
            current_state: profile.current_state.clone(),
            current_city: profile.current_city.clone(),
        }
    }

    /// Write the editable fields onto a cached profile.
    pub fn apply_to(&self, profile: &mut Profile) {
        profile.name = self.name.clone();
        profile.about_me = self.about_me.clone();
        profile.date_of_birth = self.date_of_birth;
        profile.current_state = self.current_state.clone();
        profile.current_city = self.current_city.clone();
    }
}

/// Body of `POST /interlocutor` (account creation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpForm {
    pub name: String,
    pub about_me: String,
    pub email: String,
    pub password: String,
    pub date_of_birth: NaiveDate,
    pub current_state: String,
    pub current_city: String,
    pub interlocutor_type: InterlocutorType,
}

/// Body of `POST /interlocutor/auth`.
#[derive(Debug, Clone, Serialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Response of `POST /interlocutor/auth`.
#[derive(Debug, Clone, Deserialize)]
pub struct SignInResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Body of `POST /interlocutor/search`. Unset filters are sent as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    pub current_state: Option<String>,
    pub current_city: Option<String>,
    pub name: Option<String>,
}

/// Interlocutor type as embedded in search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterlocutorKind {
    pub id: i64,
    pub description: InterlocutorType,
}

/// One row of a people search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterlocutorSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub about_me: String,
    pub interlocutor_type: InterlocutorKind,
    pub current_state: String,
    pub current_city: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile {
            id: "u1".to_string(),
            name: "Amina".to_string(),
            about_me: "Cook from Aleppo".to_string(),
            email: "amina@example.com".to_string(),
            interlocutor_type: InterlocutorType::Refugee,
            date_of_birth: NaiveDate::from_ymd_opt(1990, 3, 14).unwrap(),
            current_state: "SP".to_string(),
            current_city: "Campinas".to_string(),
            profile_picture: None,
        }
    }

    #[test]
    fn test_profile_from_wire() {
        let json = r#"{
            "id": "u1",
            "name": "Amina",
            "aboutMe": "Cook from Aleppo",
            "email": "amina@example.com",
            "interlocutorType": "refugee",
            "dateOfBirth": "1990-03-14",
            "currentState": "SP",
            "currentCity": "Campinas",
            "profilePicture": null
        }"#;
        let p: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(p, profile());
    }

    #[test]
    fn test_update_apply_keeps_identity_fields() {
        let mut p = profile();
        let mut update = ProfileUpdate::from_profile(&p);
        update.current_city = "Santos".to_string();
        update.name = "Amina K.".to_string();
        update.apply_to(&mut p);
        assert_eq!(p.current_city, "Santos");
        assert_eq!(p.name, "Amina K.");
        assert_eq!(p.email, "amina@example.com");
        assert_eq!(p.interlocutor_type, InterlocutorType::Refugee);
    }

    #[test]
    fn test_update_serializes_iso_date() {
        let update = ProfileUpdate::from_profile(&profile());
        let v = serde_json::to_value(&update).unwrap();
        assert_eq!(v["dateOfBirth"], "1990-03-14");
        assert_eq!(v["currentState"], "SP");
        assert!(v.get("email").is_none());
    }

    #[test]
    fn test_search_filters_send_nulls() {
        let filters = SearchFilters {
            current_state: Some("RJ".to_string()),
            ..Default::default()
        };
        let v = serde_json::to_value(&filters).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"currentState": "RJ", "currentCity": null, "name": null})
        );
    }

    #[test]
    fn test_interlocutor_type_parse() {
        assert_eq!(
            "Immigrant".parse::<InterlocutorType>(),
            Ok(InterlocutorType::Immigrant)
        );
        assert!("tourist".parse::<InterlocutorType>().is_err());
    }

    #[test]
    fn test_sign_in_response_without_expiry() {
        let r: SignInResponse = serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        assert_eq!(r.access_token, "abc");
        assert!(r.expires_in.is_none());
    }
}
