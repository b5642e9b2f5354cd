//! HTML pages served by the dashboard and the OAuth callback
//!
//! Templates are compiled into the binary. Their names end in `.html`, so
//! minijinja escapes every interpolated value.

use minijinja::Environment;
use serde::Serialize;

pub const DASHBOARD: &str = "dashboard.html";
pub const OAUTH_CALLBACK: &str = "oauth_callback.html";
pub const OAUTH_ERROR: &str = "oauth_error.html";

const SOURCES: &[(&str, &str)] = &[
    (DASHBOARD, include_str!("dashboard.html")),
    (OAUTH_CALLBACK, include_str!("oauth_callback.html")),
    (OAUTH_ERROR, include_str!("oauth_error.html")),
];

fn environment() -> Result<Environment<'static>, minijinja::Error> {
    let mut environment = Environment::new();
    for &(name, source) in SOURCES {
        environment.add_template(name, source)?;
    }
    Ok(environment)
}

/// Render the named page with `context`.
pub fn render<S: Serialize>(name: &str, context: S) -> Result<String, minijinja::Error> {
    environment()?.get_template(name)?.render(context)
}
