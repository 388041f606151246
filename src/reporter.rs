use crate::{
    config::LayoutConfig,
    graph::{EntityGroup, KnowledgeGraph, EMPTY_GRAPH_MESSAGE, LABEL_DIMMED, LABEL_OPACITY, LINK_DIMMED, LINK_HIGHLIGHTED, LINK_OPACITY, NODE_DIMMED, NODE_OPACITY},
    infographic::{self, EMPTY_INFOGRAPHIC_MESSAGE},
    layout::{ForceSimulation, Frame, LayoutParams},
    model::{AnalysisResult, Sentiment},
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fmt::Write,
    fs,
    path::{Path, PathBuf},
};

const NODE_RADIUS: f64 = 8.0;
const GRAPH_PADDING: f64 = 40.0;
const CHART_WIDTH: f64 = 600.0;
const CHART_HEIGHT: f64 = 320.0;

#[derive(Debug, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub analysis: AnalysisResult,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub report_id: String,
    pub generated_at: String,
    pub version: String,
    pub source: String,
    pub llm_provider: String,
    pub llm_model: String,
    pub entity_count: usize,
    pub relationship_count: usize,
    pub dropped_links: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Html,
    Markdown,
    All,
}

impl ExportFormat {
    fn includes(&self, other: ExportFormat) -> bool {
        *self == ExportFormat::All || *self == other
    }
}

pub struct Reporter {
    layout: LayoutConfig,
}

impl Reporter {
    pub fn new(layout: LayoutConfig) -> Self {
        Self { layout }
    }

    pub fn generate_report(&self, analysis: AnalysisResult, source: &str, provider: &str, model: &str) -> Report {
        let graph = KnowledgeGraph::from_data(&analysis.knowledge_graph_data);

        let metadata = ReportMetadata {
            report_id: uuid::Uuid::new_v4().to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            source: source.to_string(),
            llm_provider: provider.to_string(),
            llm_model: model.to_string(),
            entity_count: graph.node_count(),
            relationship_count: graph.link_count(),
            dropped_links: graph.dropped_links(),
        };

        Report { metadata, analysis }
    }

    pub fn export_report(&self, report: &Report, output_dir: &Path, format: ExportFormat) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(output_dir)?;
        let mut exported_files = Vec::new();

        if format.includes(ExportFormat::Json) {
            let json_path = output_dir.join("analysis.json");
            fs::write(&json_path, serde_json::to_string_pretty(report)?)?;
            exported_files.push(json_path);
        }

        if format.includes(ExportFormat::Html) {
            let html_path = output_dir.join("report.html");
            fs::write(&html_path, self.generate_html_report(report))?;
            exported_files.push(html_path);
        }

        if format.includes(ExportFormat::Markdown) {
            let md_path = output_dir.join("summary.md");
            fs::write(&md_path, self.generate_markdown_summary(report))?;
            exported_files.push(md_path);
        }

        tracing::info!(files = exported_files.len(), dir = %output_dir.display(), "report exported");
        Ok(exported_files)
    }

    /// Lay out the knowledge graph to rest. `None` when there are no entities.
    pub fn layout_graph(&self, graph: &KnowledgeGraph) -> Option<Frame> {
        let mut simulation = ForceSimulation::new(graph, LayoutParams::from(&self.layout))?;
        let frame = simulation.run_until_settled(self.layout.max_ticks);
        simulation.stop();
        Some(frame)
    }

    pub fn generate_html_report(&self, report: &Report) -> String {
        let analysis = &report.analysis;
        let sections = [
            ("Sentiment Analysis", sentiment_badge(analysis.sentiment)),
            ("Audio Summary", paragraphs(&analysis.audio_summary)),
            ("Synthesized Narrative", paragraphs(&analysis.narrative)),
            ("Key Facts Infographic", self.infographic_section(analysis)),
            ("Key Players &amp; Relationships", self.graph_section(analysis)),
        ];

        let mut body = String::new();
        for (title, content) in sections {
            let _ = write!(
                body,
                "<section class=\"card\">\n<h3>{}</h3>\n{}\n</section>\n",
                title, content
            );
        }

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>News Analysis Report</title>
    <style>
        body {{ font-family: system-ui, sans-serif; margin: 0; padding: 40px; background: #0f172a; color: #cbd5e1; line-height: 1.6; }}
        .header {{ border-bottom: 1px solid #334155; padding-bottom: 20px; margin-bottom: 30px; }}
        .header h1 {{ color: #e2e8f0; margin: 0 0 8px 0; }}
        .meta {{ color: #64748b; font-size: 0.9em; }}
        .card {{ margin: 24px 0; padding: 20px; background: #1e293b; border: 1px solid #334155; border-radius: 12px; }}
        .card h3 {{ margin: 0 0 16px 0; color: #e2e8f0; }}
        .badge {{ display: inline-block; padding: 12px 18px; border-radius: 8px; border: 1px solid; font-size: 1.1em; font-weight: 600; }}
        .badge-positive {{ background: rgba(20, 83, 45, 0.5); border-color: #15803d; color: #86efac; }}
        .badge-negative {{ background: rgba(127, 29, 29, 0.5); border-color: #b91c1c; color: #fca5a5; }}
        .badge-neutral {{ background: rgba(51, 65, 85, 0.5); border-color: #475569; color: #cbd5e1; }}
        .placeholder {{ color: #64748b; font-style: italic; }}
        .chart-title {{ text-align: center; color: #cbd5e1; font-weight: 600; }}
        .legend {{ display: flex; gap: 16px; margin-bottom: 12px; font-size: 0.9em; }}
        .legend span::before {{ content: ""; display: inline-block; width: 10px; height: 10px; border-radius: 50%; margin-right: 6px; background: var(--swatch); }}
        .knowledge-graph .node {{ cursor: pointer; }}
    </style>
</head>
<body>
    <div class="header">
        <h1>News Analysis Report</h1>
        <div class="meta">Generated {generated} &middot; {provider} / {model} &middot; source: {source}</div>
    </div>
{body}{script}
</body>
</html>
"#,
            generated = escape(&report.metadata.generated_at),
            provider = escape(&report.metadata.llm_provider),
            model = escape(&report.metadata.llm_model),
            source = escape(&report.metadata.source),
            body = body,
            script = hover_script(),
        )
    }

    fn infographic_section(&self, analysis: &AnalysisResult) -> String {
        let data = &analysis.infographic_data;
        match infographic::layout(data, CHART_WIDTH, CHART_HEIGHT) {
            Some(chart) => format!(
                "<h4 class=\"chart-title\">{}</h4>\n{}",
                escape(&data.title),
                infographic::render_svg(&chart)
            ),
            None => placeholder(EMPTY_INFOGRAPHIC_MESSAGE),
        }
    }

    fn graph_section(&self, analysis: &AnalysisResult) -> String {
        let graph = KnowledgeGraph::from_data(&analysis.knowledge_graph_data);
        let Some(frame) = self.layout_graph(&graph) else {
            return placeholder(EMPTY_GRAPH_MESSAGE);
        };

        let mut legend = String::from("<div class=\"legend\">");
        for group in EntityGroup::LEGEND {
            let _ = write!(
                legend,
                "<span style=\"--swatch: {}\">{}</span>",
                group.color(),
                group.name()
            );
        }
        legend.push_str("</div>");

        format!("{}\n{}", legend, render_knowledge_graph_svg(&graph, &frame))
    }

    pub fn generate_markdown_summary(&self, report: &Report) -> String {
        let analysis = &report.analysis;
        let mut md = format!(
            "# News Analysis Summary\n\n**Generated:** {}\n**Source:** {}\n**Model:** {} / {}\n\n",
            report.metadata.generated_at,
            report.metadata.source,
            report.metadata.llm_provider,
            report.metadata.llm_model
        );

        md.push_str(&format!("## Sentiment Analysis\n\n**{}**\n\n", analysis.sentiment));
        md.push_str(&format!("## Audio Summary\n\n{}\n\n", analysis.audio_summary.trim()));
        md.push_str(&format!("## Synthesized Narrative\n\n{}\n\n", analysis.narrative.trim()));

        md.push_str("## Key Facts Infographic\n\n");
        if analysis.infographic_data.data.is_empty() {
            md.push_str(&format!("_{}_\n\n", EMPTY_INFOGRAPHIC_MESSAGE));
        } else {
            md.push_str(&format!("**{}**\n\n| Label | Value |\n|---|---|\n", markdown_cell(&analysis.infographic_data.title)));
            for point in &analysis.infographic_data.data {
                md.push_str(&format!("| {} | {} |\n", markdown_cell(&point.label), format_number(point.value)));
            }
            md.push('\n');
        }

        md.push_str("## Key Players & Relationships\n\n");
        let graph = KnowledgeGraph::from_data(&analysis.knowledge_graph_data);
        if graph.is_empty() {
            md.push_str(&format!("_{}_\n", EMPTY_GRAPH_MESSAGE));
        } else {
            for entity in graph.entities() {
                md.push_str(&format!("- **{}** ({})\n", entity.id, entity.group.name()));
            }
            if graph.link_count() > 0 {
                md.push('\n');
            }
            for (source, target, relationship) in graph.links() {
                md.push_str(&format!(
                    "- {} *{}* {}\n",
                    graph.entity(source).id,
                    relationship.label,
                    graph.entity(target).id
                ));
            }
        }

        md
    }
}

/// Render a laid-out knowledge graph. Each node carries the indices of its
/// neighbours so the page script can highlight on hover.
pub fn render_knowledge_graph_svg(graph: &KnowledgeGraph, frame: &Frame) -> String {
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for node in &frame.nodes {
        min_x = min_x.min(node.x);
        min_y = min_y.min(node.y);
        max_x = max_x.max(node.x);
        max_y = max_y.max(node.y);
    }
    if frame.nodes.is_empty() {
        (min_x, min_y, max_x, max_y) = (0.0, 0.0, 0.0, 0.0);
    }

    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg class="knowledge-graph" viewBox="{x} {y} {w} {h}" width="100%" xmlns="http://www.w3.org/2000/svg">"#,
        x = format_number(min_x - GRAPH_PADDING),
        y = format_number(min_y - GRAPH_PADDING),
        w = format_number(max_x - min_x + 2.0 * GRAPH_PADDING),
        h = format_number(max_y - min_y + 2.0 * GRAPH_PADDING)
    );

    let resting = graph.highlight(None);

    svg.push_str("<g class=\"links\">");
    for (i, (link, (_, _, relationship))) in frame.links.iter().zip(graph.links()).enumerate() {
        let _ = write!(
            svg,
            r##"<line class="link" data-source="{s}" data-target="{t}" x1="{x1}" y1="{y1}" x2="{x2}" y2="{y2}" stroke="#64748b" stroke-width="1.5" stroke-opacity="{lo}"/><text class="link-label" data-source="{s}" data-target="{t}" x="{lx}" y="{ly}" text-anchor="middle" fill="#94a3b8" font-size="10" opacity="{to}">{label}</text>"##,
            s = link.source,
            t = link.target,
            x1 = format_number(link.x1),
            y1 = format_number(link.y1),
            x2 = format_number(link.x2),
            y2 = format_number(link.y2),
            lo = format_number(resting.link_opacity[i]),
            lx = format_number(link.label_x),
            ly = format_number(link.label_y),
            to = format_number(resting.label_opacity[i]),
            label = escape(&relationship.label)
        );
    }
    svg.push_str("</g><g class=\"nodes\">");

    for (i, (node, index)) in frame.nodes.iter().zip(graph.graph().node_indices()).enumerate() {
        let entity = graph.entity(index);
        let neighbors: Vec<String> = graph
            .neighbors(index)
            .into_iter()
            .filter_map(|id| graph.index_of(id))
            .map(|n| n.index().to_string())
            .collect();
        let _ = write!(
            svg,
            r##"<g class="node" data-index="{i}" data-neighbors="{n}" opacity="{o}"><circle cx="{x}" cy="{y}" r="{r}" fill="{fill}" stroke="#0f172a" stroke-width="1.5"><title>{id}</title></circle><text x="{tx}" y="{ty}" fill="#e2e8f0" font-size="12">{id}</text></g>"##,
            i = i,
            n = neighbors.join(" "),
            o = format_number(resting.node_opacity[i]),
            x = format_number(node.x),
            y = format_number(node.y),
            r = format_number(NODE_RADIUS),
            fill = entity.group.color(),
            tx = format_number(node.x + NODE_RADIUS + 4.0),
            ty = format_number(node.y + 4.0),
            id = escape(&entity.id)
        );
    }
    svg.push_str("</g></svg>");
    svg
}

fn hover_script() -> String {
    format!(
        r#"    <script>
        document.querySelectorAll('svg.knowledge-graph').forEach(function (svg) {{
            var nodes = svg.querySelectorAll('.node');
            var links = svg.querySelectorAll('.link');
            var labels = svg.querySelectorAll('.link-label');
            function apply(index) {{
                var near = null;
                if (index !== null) {{
                    near = nodes[index].dataset.neighbors.split(' ').filter(Boolean);
                    near.push(String(index));
                }}
                nodes.forEach(function (n) {{
                    n.setAttribute('opacity', near === null || near.indexOf(n.dataset.index) >= 0 ? {node} : {node_dim});
                }});
                links.forEach(function (l, i) {{
                    var hit = index !== null && (l.dataset.source == index || l.dataset.target == index);
                    l.setAttribute('stroke-opacity', index === null ? {link} : hit ? {link_hi} : {link_dim});
                    labels[i].setAttribute('opacity', index === null || hit ? {label} : {label_dim});
                }});
            }}
            nodes.forEach(function (n) {{
                n.addEventListener('mouseenter', function () {{ apply(Number(n.dataset.index)); }});
                n.addEventListener('mouseleave', function () {{ apply(null); }});
            }});
        }});
    </script>"#,
        node = NODE_OPACITY,
        node_dim = NODE_DIMMED,
        link = LINK_OPACITY,
        link_hi = LINK_HIGHLIGHTED,
        link_dim = LINK_DIMMED,
        label = LABEL_OPACITY,
        label_dim = LABEL_DIMMED,
    )
}

fn sentiment_badge(sentiment: Sentiment) -> String {
    let class = match sentiment {
        Sentiment::Positive => "badge-positive",
        Sentiment::Negative => "badge-negative",
        Sentiment::Neutral => "badge-neutral",
    };
    format!("<div class=\"badge {}\">{}</div>", class, sentiment)
}

fn paragraphs(text: &str) -> String {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", escape(p).replace('\n', "<br>")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Table cells end at `|` and at line breaks.
fn markdown_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn placeholder(message: &str) -> String {
    format!("<p class=\"placeholder\">{}</p>", escape(message))
}

/// Safe for element text and double-quoted attribute values alike.
pub(crate) fn escape(text: &str) -> String {
    html_escape::encode_double_quoted_attribute(text).into_owned()
}

/// At most two decimals, without trailing zeros.
pub(crate) fn format_number(value: f64) -> String {
    let formatted = format!("{:.2}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" => "0".to_string(),
        other => other.to_string(),
    }
}
