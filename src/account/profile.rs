use serde::Serialize;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::account::model::User;

const REGISTRATION_DATE: &[FormatItem<'static>] =
    format_description!("[day padding:none] [month repr:long] [year]");

/// What the profile screen renders: display strings only, with fallbacks
/// already applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileData {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub registration_date: String,
    pub avatar_initials: String,
}

impl From<&User> for ProfileData {
    fn from(user: &User) -> Self {
        let display_name = user
            .full_name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| user.username.clone());
        Self {
            avatar_initials: initials(&display_name),
            full_name: display_name,
            email: user.email.clone(),
            phone: user.phone.clone().unwrap_or_else(|| "not provided".into()),
            registration_date: format_registration_date(user.created_at),
        }
    }
}

/// First letter of up to the first two words, upper-cased.
fn initials(name: &str) -> String {
    name.split_whitespace()
        .take(2)
        .filter_map(|word| word.chars().next())
        .collect::<String>()
        .to_uppercase()
}

fn format_registration_date(created_at: OffsetDateTime) -> String {
    created_at.format(REGISTRATION_DATE).unwrap_or_default()
}
