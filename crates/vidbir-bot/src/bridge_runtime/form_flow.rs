//! Intake form conversation: a linear prompt sequence collecting name,
//! age, city, and phone, with numeric-age validation and an under-16
//! rejection branch.

use serde_json::{json, Value};

use vidbir_core::{ApplicantId, NewApplicant};

use vidbir_telegram::Message;

pub(super) const START_REPLY: &str = "Привіт! Як тебе звати?";
pub(super) const ALREADY_APPLIED_REPLY: &str =
    "⚠️ Ви вже подали заявку. Очікуйте на відповідь від адміністратора.";
pub(super) const CANCELLED_REPLY: &str = "🚫 Розмову скасовано.";
pub(super) const SUBMITTED_REPLY: &str =
    "📨 Твоя заявка відправлена. Очікуй відповідь від адміністратора.";

const AGE_PROMPT: &str = "Скільки тобі років?";
const AGE_RETRY: &str = "Будь ласка, введи число.";
const CITY_PROMPT: &str = "З якого ти міста?";
const PHONE_PROMPT: &str = "📱 Хочеш поділитися номером? Натисни кнопку або введи вручну.";
const UNDERAGE_REPLY: &str =
    "Вибач, але ти не можеш приєднатися. Проте у нас є реферальна система — заробляй, запрошуючи інших!";
const TEXT_ONLY_RETRY: &str = "Будь ласка, надішли текстове повідомлення.";

const MIN_AGE: i64 = 16;

/// Where a chat currently is in the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum FormState {
    AwaitingName,
    AwaitingAge { name: String },
    AwaitingCity { name: String, age: i64 },
    AwaitingPhone { name: String, age: i64, city: String },
}

/// Collected answers, ready to become an applicant row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct FormProfile {
    pub name: String,
    pub age: i64,
    pub city: String,
    pub phone: Option<String>,
}

impl FormProfile {
    pub(super) fn into_new_applicant(
        self,
        applicant_id: ApplicantId,
        username: Option<String>,
    ) -> NewApplicant {
        NewApplicant {
            telegram_id: applicant_id,
            name: self.name,
            age: self.age,
            city: self.city,
            username,
            phone: self.phone,
        }
    }
}

/// What the runtime should do after feeding one message into the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum StepOutcome {
    /// Ask the next question (or repeat the current one on bad input).
    Prompt {
        next: FormState,
        reply: String,
        request_contact: bool,
    },
    /// The conversation ends without an application.
    Rejected { reply: String },
    /// All answers collected.
    Completed { profile: FormProfile },
}

fn prompt(next: FormState, reply: &str) -> StepOutcome {
    StepOutcome::Prompt {
        next,
        reply: reply.to_string(),
        request_contact: false,
    }
}

/// Advances the form by one answer.
pub(super) fn advance(state: FormState, message: &Message) -> StepOutcome {
    match state {
        FormState::AwaitingName => match message.text.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => prompt(
                FormState::AwaitingAge {
                    name: name.to_string(),
                },
                AGE_PROMPT,
            ),
            _ => prompt(FormState::AwaitingName, TEXT_ONLY_RETRY),
        },
        FormState::AwaitingAge { name } => {
            let parsed = message
                .text
                .as_deref()
                .and_then(|text| text.trim().parse::<i64>().ok());
            match parsed {
                Some(age) if age < MIN_AGE => StepOutcome::Rejected {
                    reply: UNDERAGE_REPLY.to_string(),
                },
                Some(age) => prompt(FormState::AwaitingCity { name, age }, CITY_PROMPT),
                None => prompt(FormState::AwaitingAge { name }, AGE_RETRY),
            }
        }
        FormState::AwaitingCity { name, age } => match message.text.as_deref().map(str::trim) {
            Some(city) if !city.is_empty() => StepOutcome::Prompt {
                next: FormState::AwaitingPhone {
                    name,
                    age,
                    city: city.to_string(),
                },
                reply: PHONE_PROMPT.to_string(),
                request_contact: true,
            },
            _ => prompt(FormState::AwaitingCity { name, age }, TEXT_ONLY_RETRY),
        },
        FormState::AwaitingPhone { name, age, city } => {
            // The share-contact button or a typed number both work.
            let phone = message
                .contact
                .as_ref()
                .map(|contact| contact.phone_number.clone())
                .or_else(|| {
                    message
                        .text
                        .as_deref()
                        .map(str::trim)
                        .filter(|text| !text.is_empty())
                        .map(str::to_string)
                });
            StepOutcome::Completed {
                profile: FormProfile {
                    name,
                    age,
                    city,
                    phone,
                },
            }
        }
    }
}

/// One-time keyboard with the share-contact button.
pub(super) fn contact_keyboard() -> Value {
    json!({
        "keyboard": [[{ "text": "📱 Поділитися телефоном", "request_contact": true }]],
        "resize_keyboard": true,
        "one_time_keyboard": true,
    })
}

/// Staff-group summary card for a fresh application.
pub(super) fn render_summary(profile: &NewApplicant) -> String {
    let username_line = profile
        .username
        .as_deref()
        .map(|username| format!("@{username}"))
        .unwrap_or_else(|| "немає".to_string());
    let profile_link = profile
        .username
        .as_deref()
        .map(|username| format!("https://t.me/{username}"))
        .unwrap_or_else(|| "❓ Немає username".to_string());
    format!(
        "✅ Новий користувач:\n\
         👤 Ім’я: {name}\n\
         🎂 Вік: {age}\n\
         🏙️ Місто: {city}\n\
         📞 Телефон: {phone}\n\
         🔗 Username: {username_line}\n\
         💬 Профіль: {profile_link}\n\
         🆔 Telegram ID: {telegram_id}",
        name = profile.name,
        age = profile.age,
        city = profile.city,
        phone = profile.phone.as_deref().unwrap_or("не надано"),
        telegram_id = profile.telegram_id,
    )
}
