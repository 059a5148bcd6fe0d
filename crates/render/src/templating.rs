//! Minijinja rendering of report templates.
//!
//! Report templates are compiled into the binary and rendered against a
//! [`ReportContext`] built from the canonical project.

use chrono::{DateTime, Utc};
use serde::Serialize;

use taskpulse_core::{CanonicalProject, CanonicalTask};
use taskpulse_ingest::analytics;

use crate::traits::RenderError;

/// Number of open tasks listed in the "next up" section.
const OPEN_TASK_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct CountRow {
    pub label: String,
    pub count: usize,
}

/// Everything a report template can reference.
#[derive(Debug, Clone, Serialize)]
pub struct ReportContext<'a> {
    pub title: String,
    pub template: String,
    pub generated_at: String,
    pub project: &'a CanonicalProject,
    pub completion_rate: u8,
    pub total_points: f64,
    pub completed_points: f64,
    pub velocity: f64,
    pub by_status: Vec<CountRow>,
    pub by_priority: Vec<CountRow>,
    /// Unfinished tasks, most urgent first.
    pub open_tasks: Vec<&'a CanonicalTask>,
}

impl<'a> ReportContext<'a> {
    pub fn build(
        project: &'a CanonicalProject,
        title: String,
        template: &str,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let points = analytics::story_points_summary(&project.tasks);

        let mut open_tasks: Vec<&CanonicalTask> =
            project.tasks.iter().filter(|t| !t.status.is_done()).collect();
        open_tasks.sort_by_key(|t| t.priority);
        open_tasks.truncate(OPEN_TASK_LIMIT);

        Self {
            title,
            template: template.to_string(),
            generated_at: generated_at.to_rfc3339(),
            project,
            completion_rate: analytics::completion_rate(&project.tasks),
            total_points: points.total,
            completed_points: points.completed,
            velocity: analytics::velocity(&project.sprints),
            by_status: analytics::status_breakdown(&project.tasks)
                .into_iter()
                .map(|(label, count)| CountRow { label, count })
                .collect(),
            by_priority: analytics::priority_breakdown(&project.tasks)
                .into_iter()
                .map(|(priority, count)| CountRow {
                    label: priority.to_string(),
                    count,
                })
                .collect(),
            open_tasks,
        }
    }
}

/// Renders report templates using minijinja.
#[derive(Debug, Default)]
pub struct TemplateRenderer {
    _private: (),
}

impl TemplateRenderer {
    /// Create a renderer. Each render builds a fresh environment with the
    /// `round`, `pct` and `date` filters.
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_filter("round", round_filter);
        env.add_filter("pct", pct_filter);
        env.add_filter("date", date_filter);
        env
    }

    /// Render a template string against a report context.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Template`] if the template fails to parse or render.
    pub fn render(&self, template_str: &str, ctx: &ReportContext<'_>) -> Result<String, RenderError> {
        Self::build_env()
            .render_str(template_str, ctx)
            .map_err(|e| RenderError::Template(e.to_string()))
    }

    /// Check that a template parses.
    pub fn validate(&self, template_str: &str) -> Result<(), RenderError> {
        let env = Self::build_env();
        env.template_from_str(template_str)
            .map_err(|e| RenderError::Template(e.to_string()))?;
        Ok(())
    }
}

/// Round a float to N decimal places.
fn round_filter(value: f64, decimals: Option<u32>) -> String {
    let n = decimals.unwrap_or(0);
    format!("{:.prec$}", value, prec = n as usize)
}

fn pct_filter(value: f64) -> String {
    format!("{}%", value.round() as i64)
}

/// `YYYY-MM-DD` of an RFC 3339 timestamp; other strings pass through.
fn date_filter(value: String) -> String {
    DateTime::parse_from_rfc3339(&value)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or(value)
}
