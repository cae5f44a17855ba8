//! Profile summarization: structured profile → descriptive bio text.
//!
//! The summary feeds the embedding model, so it must be deterministic:
//! identical input produces byte-identical text. Missing fields become
//! omitted clauses, never errors.

use chrono::{Datelike, Utc};

use crate::profile::Profile;

/// Summarize a profile using the current calendar year for age computation.
pub fn summarize(profile: &Profile) -> String {
    summarize_at(profile, Utc::now().year())
}

/// Summarize a profile against an explicit current year.
///
/// Clauses, in order: identity intro, activities, favorite colors, pets,
/// spoken languages, intent. Clauses with no contributing data are omitted;
/// the non-empty clauses are joined by ". " with a single trailing period.
pub fn summarize_at(profile: &Profile, current_year: i32) -> String {
    let mut clauses: Vec<String> = Vec::new();

    // Identity intro: name, age, gender, height, religion, education.
    let mut intro: Vec<String> = Vec::new();
    if let Some(name) = non_empty(&profile.first_name) {
        intro.push(format!("I'm {name}"));
    }
    if let Some(age) = age_from_birth_date(profile.date_of_birth.as_deref(), current_year) {
        intro.push(format!("a {age}-year-old"));
    }
    if let Some(gender) = non_empty(&profile.gender) {
        intro.push(gender.to_lowercase());
    }
    if let Some(height) = profile.height.and_then(format_height) {
        intro.push(format!("{height} tall"));
    }
    if let Some(religion) = non_empty(&profile.religion) {
        intro.push(capitalize(religion));
    }
    if let Some(education) = non_empty(&profile.education) {
        intro.push(format!("with a {education}"));
    }
    if !intro.is_empty() {
        clauses.push(intro.join(", "));
    }

    // Hobbies and interests merge into one activities clause.
    let activities: Vec<&str> = profile
        .hobbies
        .iter()
        .chain(profile.interests.iter())
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .collect();
    if !activities.is_empty() {
        clauses.push(format!("who loves {}", activities.join(", ")));
    }

    if !profile.favorite_colors.is_empty() {
        clauses.push(format!(
            "I love the colors {}",
            profile.favorite_colors.join(", ")
        ));
    }
    if !profile.pets.is_empty() {
        clauses.push(format!("I have {}", profile.pets.join(", ")));
    }
    if !profile.spoken_languages.is_empty() {
        clauses.push(format!("I speak {}", profile.spoken_languages.join(", ")));
    }

    if let Some(intent) = intent_clause(profile) {
        clauses.push(intent);
    }

    if clauses.is_empty() {
        return String::new();
    }
    format!("{}.", clauses.join(". "))
}

/// Intent clause: desired gender, merged "looking for" + "what brings you
/// here" set (insertion-ordered dedup), and an age range when both bounds
/// are present.
fn intent_clause(profile: &Profile) -> Option<String> {
    let brings = non_empty(&profile.what_brings_you_here);
    if profile.looking_for.is_empty() && brings.is_none() {
        return None;
    }

    let mut purposes: Vec<&str> = Vec::new();
    for p in profile
        .looking_for
        .iter()
        .map(String::as_str)
        .chain(brings.into_iter())
    {
        if !p.is_empty() && !purposes.contains(&p) {
            purposes.push(p);
        }
    }

    let purpose_str = if purposes.is_empty() {
        "connections".to_string()
    } else {
        purposes.join(" or ")
    };

    let mut clause = String::from("I'm here looking for");
    if let Some(gender_interest) = non_empty(&profile.gender_interest) {
        clause.push(' ');
        clause.push_str(&gender_interest.to_lowercase());
    }
    clause.push(' ');
    clause.push_str(&purpose_str);

    if let (Some(min), Some(max)) = (profile.min_age, profile.max_age) {
        clause.push_str(&format!(" aged {min} to {max}"));
    }
    Some(clause)
}

/// Age from the year component of a date string; malformed input means
/// "no age known", not an error.
fn age_from_birth_date(date_of_birth: Option<&str>, current_year: i32) -> Option<i32> {
    let dob = date_of_birth?;
    let year: i32 = dob.split('-').next()?.parse().ok()?;
    Some(current_year - year)
}

/// Centimetres to a feet-and-inches string, e.g. 170.0 → `5'6"`.
fn format_height(cm: f64) -> Option<String> {
    if !cm.is_finite() || cm <= 0.0 {
        return None;
    }
    let total_inches = cm / 2.54;
    let feet = (total_inches / 12.0).floor() as i64;
    let inches = (total_inches % 12.0).floor() as i64;
    Some(format!("{feet}'{inches}\""))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}
