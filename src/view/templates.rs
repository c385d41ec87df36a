use minijinja::{Environment, Template};
use once_cell::sync::Lazy;

use strum::{EnumIter, IntoEnumIterator};
use tracing::{error, info};

use crate::error::{LeaderboardError, LeaderboardResult};
use crate::utils::encode_css_url;

static TEMPLATES_ENVIRONMENT: Lazy<Environment> = Lazy::new(|| {
    info!("Initializing templating engine environment.");
    let mut env = Environment::new();
    env.add_filter("css_url", |url: String| encode_css_url(&url));

    // Use strum to iterate over the variants of the enum.
    for template in PageTemplate::iter() {
        if let Err(e) = env.add_template(template.name(), template.template()) {
            error!("Could not load template {}: {e}", template.name());
        }
    }

    info!("Templates loaded in templating engine environment.");
    env
});

// Names end in .html so minijinja auto-escapes everything rendered into them.
#[derive(Debug, Clone, Copy, EnumIter)]
pub enum PageTemplate {
    Layout,
    Leaderboard,
    Loading,
    Error,
}

impl PageTemplate {
    pub fn name(&self) -> &'static str {
        match self {
            PageTemplate::Layout => "layout.html",
            PageTemplate::Leaderboard => "leaderboard.html",
            PageTemplate::Loading => "loading.html",
            PageTemplate::Error => "error.html",
        }
    }

    pub fn get(&self) -> LeaderboardResult<Template<'static, 'static>> {
        TEMPLATES_ENVIRONMENT
            .get_template(self.name())
            .map_err(|e| LeaderboardError::Parse(e.to_string()))
    }

    pub fn template(&self) -> &'static str {
        match self {
            PageTemplate::Layout => {
                r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Shomato Seeds Leaderboard</title>
</head>
<body>
{% block body %}{% endblock %}
  <footer>🔄 Auto-updates every 10 minutes • 💾 Data cached locally</footer>
</body>
</html>"#
            }
            PageTemplate::Leaderboard => {
                r#"{% extends "layout.html" %}
{% block body %}
  <header>
    <h1>🌱 Shomato Seeds Leaderboard</h1>
    <p>Top seed collectors from the Shiba community</p>
  </header>
  <section class="champions">
    <h2>🏆 Champions</h2>
    <p>Ranked by total shomato seeds collected</p>
    {%- if last_updated %}
    <div class="last-updated">Last updated <time>{{ last_updated }}</time></div>
    {%- endif %}
    <form method="post" action="/refresh">
      <button type="submit"{% if refreshing %} disabled{% endif %}>{% if refreshing %}🔄 Refreshing...{% else %}🔄 Refresh{% endif %}</button>
    </form>
    {%- for entry in entries %}
    <a class="entry" href="{{ entry.gameLink }}" target="_blank" rel="noopener noreferrer"
      {%- if entry.thumbnail %} style="background-image: url('{{ entry.thumbnail|css_url }}')"{% endif %}>
      <span class="rank">{{ entry.rank }}</span>
      <h3>{{ entry.gameName }}</h3>
      <span class="slack-id">{{ entry.slackId }}</span>
      <span class="seeds">{{ entry.totalSeeds }} 🌱 seeds</span>
    </a>
    {%- else %}
    <div class="empty">
      <div>🌱</div>
      <div>No seeds collected yet!</div>
      <div>Start building games to earn shomato seeds</div>
    </div>
    {%- endfor %}
  </section>
{% endblock %}"#
            }
            PageTemplate::Loading => {
                r#"{% extends "layout.html" %}
{% block body %}
  <div class="spinner" aria-label="Loading"></div>
{% endblock %}"#
            }
            PageTemplate::Error => {
                r#"{% extends "layout.html" %}
{% block body %}
  <div class="error">
    <div>Oops! Something went wrong</div>
    <div>{{ message }}</div>
    <form method="get" action="/">
      <button type="submit">Try Again</button>
    </form>
  </div>
{% endblock %}"#
            }
        }
    }
}
