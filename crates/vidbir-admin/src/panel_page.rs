//! HTML rendering for the applications table.

use anyhow::{Context, Result};
use minijinja::{context, Environment};

use vidbir_core::{Applicant, ApplicantStatus};

const PANEL_TEMPLATE: &str = r#"<!doctype html>
<html>
<head>
  <meta charset="utf-8">
  <title>Надіслані заявки</title>
  <style>
    body { font-family: sans-serif; margin: 2em; }
    table { border-collapse: collapse; }
    th, td { border: 1px solid #999; padding: 6px 10px; }
    form { display: inline; }
    .status-New { color: gray; }
    .status-InProgress { color: blue; }
    .status-Accepted { color: green; }
    .status-Declined { color: red; }
  </style>
</head>
<body>
<h2>Надіслані заявки</h2>
<form method="get" action="/">
  <input type="hidden" name="token" value="{{ token }}">
  <select name="status">
    <option value="" {% if not filter %}selected{% endif %}>Усі</option>
    {% for option in statuses %}
    <option value="{{ option }}" {% if filter == option %}selected{% endif %}>{{ option }}</option>
    {% endfor %}
  </select>
  <button type="submit">Фільтрувати</button>
</form>
<table>
  <tr>
    <th>Ім’я</th><th>Вік</th><th>Місто</th><th>Телефон</th><th>Username</th>
    <th>Статус</th><th>Прийнято</th><th>Оновити</th><th></th>
  </tr>
  {% for user in users %}
  <tr>
    <td>{{ user.name }}</td>
    <td>{{ user.age }}</td>
    <td>{{ user.city }}</td>
    <td>{{ user.phone or "—" }}</td>
    <td>
      {% if user.username %}
        <a href="https://t.me/{{ user.username }}" target="_blank">@{{ user.username }}</a>
      {% else %}
        —
      {% endif %}
    </td>
    <td class="status-{{ user.status | replace(' ', '') }}">{{ user.status }}</td>
    <td>
      {% if user.accepted_city %}{{ user.accepted_city }}, {{ user.accepted_date }}{% else %}—{% endif %}
    </td>
    <td>
      <form method="post" action="/update">
        <input type="hidden" name="token" value="{{ token }}">
        <input type="hidden" name="telegram_id" value="{{ user.telegram_id }}">
        <select name="status">
          {% for option in statuses %}
          <option value="{{ option }}" {% if user.status == option %}selected{% endif %}>{{ option }}</option>
          {% endfor %}
        </select>
        <input type="text" name="accepted_city" placeholder="Місто" size="10">
        <input type="text" name="accepted_date" placeholder="РРРР-ММ-ДД" size="10">
        <button type="submit">💾</button>
      </form>
    </td>
    <td>
      <form method="post" action="/delete">
        <input type="hidden" name="token" value="{{ token }}">
        <input type="hidden" name="telegram_id" value="{{ user.telegram_id }}">
        <button type="submit">🗑️</button>
      </form>
    </td>
  </tr>
  {% endfor %}
</table>
</body>
</html>
"#;

const STATUS_OPTIONS: [ApplicantStatus; 4] = [
    ApplicantStatus::New,
    ApplicantStatus::InProgress,
    ApplicantStatus::Accepted,
    ApplicantStatus::Declined,
];

/// Renders the applications table.
pub fn render_panel_page(
    applicants: &[Applicant],
    filter: Option<ApplicantStatus>,
    token: &str,
) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("panel", PANEL_TEMPLATE)
        .context("failed to register panel template")?;
    let template = env.get_template("panel").context("panel template missing")?;
    let statuses = STATUS_OPTIONS
        .iter()
        .map(|status| status.as_str())
        .collect::<Vec<_>>();
    template
        .render(context! {
            users => applicants,
            statuses => statuses,
            filter => filter.map(|status| status.as_str()),
            token => token,
        })
        .context("failed to render panel template")
}
