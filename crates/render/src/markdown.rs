//! Built-in Markdown report renderer.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use taskpulse_core::CanonicalProject;

use crate::templating::{ReportContext, TemplateRenderer};
use crate::traits::{ProgressFn, RenderError, RenderRequest, Renderer};

const STANDARD: &str = include_str!("../templates/standard.md.j2");
const EXECUTIVE: &str = include_str!("../templates/executive.md.j2");

/// Keys probed in the job configuration for a report title.
const TITLE_KEYS: &[&str] = &["title", "reportTitle", "report_title"];

/// Renders `standard` and `executive` Markdown reports.
#[derive(Debug)]
pub struct MarkdownRenderer {
    templates: HashMap<String, &'static str>,
    engine: TemplateRenderer,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub const TEMPLATES: [&'static str; 2] = ["standard", "executive"];

    pub fn new() -> Self {
        let templates = HashMap::from([
            ("standard".to_string(), STANDARD),
            ("executive".to_string(), EXECUTIVE),
        ]);
        Self {
            templates,
            engine: TemplateRenderer::new(),
        }
    }

    /// Whether `template` is one of [`Self::TEMPLATES`].
    pub fn supports(&self, template: &str) -> bool {
        self.templates.contains_key(template)
    }

    /// `report-{job_id}.md`
    pub fn file_name(request: &RenderRequest) -> String {
        format!("report-{}.md", request.job_id)
    }

    fn title(project: &CanonicalProject, request: &RenderRequest) -> String {
        TITLE_KEYS
            .iter()
            .find_map(|k| request.configuration.get(*k).and_then(|v| v.as_str()))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("{} report", project.name))
    }
}

#[async_trait]
impl Renderer for MarkdownRenderer {
    fn name(&self) -> &str {
        "markdown"
    }

    async fn render(
        &self,
        project: &CanonicalProject,
        request: &RenderRequest,
        progress: ProgressFn,
    ) -> Result<PathBuf, RenderError> {
        let source = self
            .templates
            .get(&request.template)
            .copied()
            .ok_or_else(|| RenderError::UnknownTemplate(request.template.clone()))?;

        let ctx = ReportContext::build(project, Self::title(project, request), &request.template, Utc::now());
        progress(10);

        let body = self.engine.render(source, &ctx)?;
        progress(50);

        tokio::fs::create_dir_all(&request.output_dir).await?;
        let path = request.output_dir.join(Self::file_name(request));
        tokio::fs::write(&path, body.as_bytes()).await?;
        progress(90);

        info!(
            job_id = %request.job_id,
            template = %request.template,
            path = %path.display(),
            bytes = body.len(),
            "Report rendered"
        );
        progress(100);
        Ok(path)
    }
}
