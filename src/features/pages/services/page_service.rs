use std::sync::Arc;

use minijinja::{context, Environment};
use thiserror::Error;

use crate::core::config::MapConfig;
use crate::core::error::{AppError, Result};
use crate::features::categories::CategoryService;
use crate::features::incidents::models::IncidentStatus;

const INDEX_TEMPLATE: &str = "index.html";

/// Errors raised while rendering a page
#[derive(Debug, Error)]
pub enum PageError {
    #[error("Template '{0}' not found")]
    NotFound(String),

    #[error("Failed to render template: {0}")]
    Render(String),
}

impl From<PageError> for AppError {
    fn from(e: PageError) -> Self {
        tracing::error!("Page rendering failed: {}", e);
        AppError::Internal(e.to_string())
    }
}

/// Renders the server-side HTML pages
pub struct PageService {
    env: Environment<'static>,
    categories: Arc<CategoryService>,
    map: MapConfig,
}

impl PageService {
    pub fn new(categories: Arc<CategoryService>, map: MapConfig) -> Result<Self> {
        Ok(Self {
            env: build_environment()?,
            categories,
            map,
        })
    }

    /// The map page with the report form
    pub async fn render_index(&self) -> Result<String> {
        let categories = self.categories.list(false).await?;
        let categories: Vec<_> = categories
            .into_iter()
            .map(|c| {
                context! {
                    slug => c.slug,
                    name => c.name,
                    color => c.color,
                }
            })
            .collect();

        let statuses: Vec<String> = [
            IncidentStatus::Reported,
            IncidentStatus::Verified,
            IncidentStatus::Resolved,
        ]
        .iter()
        .map(ToString::to_string)
        .collect();

        self.render(
            INDEX_TEMPLATE,
            context! {
                map_center_lat => self.map.center_lat,
                map_center_lng => self.map.center_lng,
                map_zoom => self.map.zoom,
                categories => categories,
                statuses => statuses,
            },
        )
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        Ok(render(&self.env, name, ctx)?)
    }
}

fn build_environment() -> std::result::Result<Environment<'static>, PageError> {
    let mut env = Environment::new();
    env.add_template(
        INDEX_TEMPLATE,
        include_str!("../../../../templates/index.html"),
    )
    .map_err(|e| PageError::Render(e.to_string()))?;
    Ok(env)
}

fn render(
    env: &Environment<'static>,
    name: &str,
    ctx: minijinja::Value,
) -> std::result::Result<String, PageError> {
    env.get_template(name)
        .map_err(|_| PageError::NotFound(name.to_string()))?
        .render(ctx)
        .map_err(|e| PageError::Render(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_renders_map_settings_and_categories() {
        let env = build_environment().unwrap();
        let html = render(
            &env,
            INDEX_TEMPLATE,
            context! {
                map_center_lat => 14.5995,
                map_center_lng => 120.9842,
                map_zoom => 13,
                categories => vec![context! { slug => "pothole", name => "Pothole", color => "#ff8800" }],
                statuses => vec!["reported"],
            },
        )
        .unwrap();

        assert!(html.contains("14.5995"));
        assert!(html.contains("120.9842"));
        assert!(html.contains(r#"value="pothole""#));
        assert!(html.contains("Pothole"));
    }

    #[test]
    fn test_unknown_template() {
        let env = build_environment().unwrap();
        assert!(matches!(
            render(&env, "missing.html", context! {}),
            Err(PageError::NotFound(_))
        ));
    }
}
