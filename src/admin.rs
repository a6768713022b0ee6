//! Server-rendered admin UI shell mounted under the configured base path.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Serialize;
use tera::{Context, Tera};

use crate::api::auth::redirect_found;
use crate::auth::models::SessionUser;
use crate::config::API_PREFIX;
use crate::content::models::Document;
use crate::error::AppError;
use crate::resolver::{render_html, Audience, ContentResolver, Resolved};
use crate::state::AppState;

const BASE: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{% block title %}Outstatic{% endblock title %}</title>
  <style>
    body { font-family: system-ui, sans-serif; margin: 0; color: #1f2937; }
    header { display: flex; gap: 1rem; align-items: center; padding: .75rem 1.5rem; border-bottom: 1px solid #e5e7eb; }
    header .user { margin-left: auto; }
    main { padding: 1.5rem; max-width: 960px; }
    table { border-collapse: collapse; width: 100%; }
    th, td { text-align: left; padding: .4rem .6rem; border-bottom: 1px solid #f3f4f6; }
    .invalid { color: #b91c1c; }
    .draft { color: #6b7280; }
  </style>
</head>
<body>
  <header>
    <a href="{{ base | safe }}"><strong>Outstatic</strong></a>
    <span class="user">{% if user.name %}{{ user.name }}{% else %}{{ user.login }}{% endif %}</span>
    <form method="post" action="{{ logout_url | safe }}"><button type="submit">Log out</button></form>
  </header>
  <main>{% block content %}{% endblock content %}</main>
</body>
</html>
"#;

const DASHBOARD: &str = r#"{% extends "base.html" %}
{% block content %}
<h1>Collections</h1>
{% if collections | length == 0 %}
<p>No collections yet.</p>
{% else %}
<table>
  <tr><th>Name</th><th>Kind</th><th>Custom fields</th></tr>
  {% for c in collections %}
  <tr>
    <td><a href="{{ base | safe }}/{{ c.name }}">{{ c.name }}</a></td>
    <td>{{ c.kind.type }}</td>
    <td>{{ c.fields | length }}</td>
  </tr>
  {% endfor %}
</table>
{% endif %}
{% endblock content %}
"#;

const COLLECTION: &str = r#"{% extends "base.html" %}
{% block title %}{{ collection.name }} · Outstatic{% endblock title %}
{% block content %}
<h1>{{ collection.name }}</h1>
{% if documents | length == 0 %}
<p>No documents.</p>
{% else %}
<table>
  <tr><th>Title</th><th>Slug</th><th>Status</th><th>Published</th><th></th></tr>
  {% for d in documents %}
  <tr class="{{ d.frontMatter.status }}">
    <td><a href="{{ base | safe }}/{{ collection.name }}/{{ d.slug }}">{% if d.frontMatter.title %}{{ d.frontMatter.title }}{% else %}(untitled){% endif %}</a></td>
    <td>{{ d.slug }}</td>
    <td>{{ d.frontMatter.status }}</td>
    <td>{{ d.frontMatter.publishedAt | default(value="") }}</td>
    <td>{% if d.issues | length > 0 %}<span class="invalid" title="{% for i in d.issues %}{{ i.field }}: {{ i.message }}&#10;{% endfor %}">invalid</span>{% endif %}</td>
  </tr>
  {% endfor %}
</table>
{% endif %}
{% endblock content %}
"#;

const DOCUMENT: &str = r#"{% extends "base.html" %}
{% block title %}{{ document.frontMatter.title }} · Outstatic{% endblock title %}
{% block content %}
<p><a href="{{ base | safe }}/{{ document.collection }}">&larr; {{ document.collection }}</a></p>
<h1>{% if document.frontMatter.title %}{{ document.frontMatter.title }}{% else %}(untitled){% endif %}</h1>
{% if document.issues | length > 0 %}
<ul class="invalid">
  {% for i in document.issues %}<li><strong>{{ i.field }}</strong>: {{ i.message }}</li>{% endfor %}
</ul>
{% endif %}
<table>
  <tr><th>Slug</th><td>{{ document.slug }}.{{ document.format }}</td></tr>
  <tr><th>Status</th><td>{{ document.frontMatter.status }}</td></tr>
  {% if document.frontMatter.publishedAt %}<tr><th>Published</th><td>{{ document.frontMatter.publishedAt }}</td></tr>{% endif %}
  {% if document.frontMatter.description %}<tr><th>Description</th><td>{{ document.frontMatter.description }}</td></tr>{% endif %}
  {% for name, value in fields %}<tr><th>{{ name }}</th><td>{{ value }}</td></tr>{% endfor %}
</table>
<article>{{ html | safe }}</article>
{% endblock content %}
"#;

const MESSAGE: &str = r#"{% extends "base.html" %}
{% block title %}{{ heading }} · Outstatic{% endblock title %}
{% block content %}
<h1>{{ heading }}</h1>
<p>{{ message }}</p>
{% endblock content %}
"#;

/// Renders admin pages from the embedded templates.
pub struct AdminShell {
    tera: Tera,
    base: String,
}

#[derive(Serialize)]
struct Page<'a> {
    base: &'a str,
    logout_url: String,
    user: &'a SessionUser,
}

impl AdminShell {
    pub fn new(base: &str) -> Result<Self, AppError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("base.html", BASE),
            ("dashboard.html", DASHBOARD),
            ("collection.html", COLLECTION),
            ("document.html", DOCUMENT),
            ("message.html", MESSAGE),
        ])
        .map_err(|e| AppError::Internal(format!("Admin templates failed to load: {e}")))?;
        Ok(Self {
            tera,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    fn context(&self, user: &SessionUser) -> Result<Context, AppError> {
        let page = Page {
            base: &self.base,
            logout_url: format!("{API_PREFIX}/auth/logout"),
            user,
        };
        Context::from_serialize(page)
            .map_err(|e| AppError::Internal(format!("Admin context failed: {e}")))
    }

    fn render(&self, template: &str, context: &Context) -> Result<String, AppError> {
        self.tera
            .render(template, context)
            .map_err(|e| AppError::Internal(format!("Rendering {template} failed: {e}")))
    }

    /// HTML for an admin path (`""`, `"{collection}"` or
    /// `"{collection}/{slug}"`), or `None` when nothing lives there.
    pub async fn page(
        &self,
        resolver: &ContentResolver,
        user: &SessionUser,
        path: &str,
    ) -> Result<Option<String>, AppError> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut context = self.context(user)?;

        match segments.as_slice() {
            [] => {
                context.insert("collections", &resolver.list_collections().await?);
                self.render("dashboard.html", &context).map(Some)
            }
            [collection] => match resolver.resolve(collection, None, Audience::Admin).await? {
                Some(Resolved::List {
                    collection,
                    documents,
                }) => {
                    context.insert("collection", &collection);
                    context.insert("documents", &documents);
                    self.render("collection.html", &context).map(Some)
                }
                Some(Resolved::Document { document }) => self.document(context, &document).map(Some),
                None => Ok(None),
            },
            [collection, slug] => {
                match resolver.resolve(collection, Some(slug), Audience::Admin).await? {
                    Some(Resolved::Document { document }) => {
                        self.document(context, &document).map(Some)
                    }
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    fn document(
        &self,
        mut context: Context,
        document: &Document,
    ) -> Result<String, AppError> {
        let fields: BTreeMap<&str, String> = document
            .front_matter
            .custom
            .iter()
            .map(|(name, value)| (name.as_str(), display_value(value)))
            .collect();
        context.insert("document", document);
        context.insert("fields", &fields);
        context.insert("html", &render_html(document));
        self.render("document.html", &context)
    }

    pub fn message(&self, user: &SessionUser, heading: &str, message: &str) -> Result<String, AppError> {
        let mut context = self.context(user)?;
        context.insert("heading", heading);
        context.insert("message", message);
        self.render("message.html", &context)
    }
}

fn display_value(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Sequence(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Axum handler for `GET {admin_base}`.
pub async fn admin_index(State(state): State<AppState>, jar: PrivateCookieJar) -> Response {
    admin_response(&state, jar, "").await
}

/// Axum handler for `GET {admin_base}/{*path}`.
pub async fn admin_page(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Path(path): Path<String>,
) -> Response {
    admin_response(&state, jar, &path).await
}

async fn admin_response(state: &AppState, jar: PrivateCookieJar, path: &str) -> Response {
    let login_url = format!("{API_PREFIX}/auth/login");
    let Ok(session) = state.sessions.current_user(&jar) else {
        return redirect_found(&login_url).into_response();
    };
    let resolver = state.resolver.for_session(&session);
    let user = &session.user;

    let outcome = match state.admin.page(&resolver, user, path).await {
        Ok(Some(html)) => return Html(html).into_response(),
        Ok(None) | Err(AppError::NotFound(_)) | Err(AppError::Permission(_)) => state
            .admin
            .message(user, "Not found", "There is nothing at this address.")
            .map(|html| (StatusCode::NOT_FOUND, html)),
        Err(AppError::Auth(msg)) => {
            tracing::info!("Git host rejected the session token: {msg}");
            return (state.sessions.logout(jar), redirect_found(&login_url)).into_response();
        }
        Err(err) => {
            let retryable = err.is_retryable();
            let status = err.into_response().status();
            let message = if retryable {
                "The git host did not respond. Try again in a moment."
            } else {
                "Something went wrong while loading this page."
            };
            state
                .admin
                .message(user, "Error", message)
                .map(|html| (status, html))
        }
    };

    match outcome {
        Ok((status, html)) => (status, Html(html)).into_response(),
        Err(err) => err.into_response(),
    }
}
