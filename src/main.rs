use anyhow::{anyhow, bail};
use clap::{ArgGroup, Parser, Subcommand};
use news_examer::{
    audio::{CommandSynthesizer, PlaybackState},
    graph::EMPTY_GRAPH_MESSAGE,
    layout::{LayoutParams, TICK_INTERVAL},
    orchestrator::{Rejected, View},
    reporter::{render_knowledge_graph_svg, ExportFormat},
    AnalysisClient, AnalysisResult, ArticleFetcher, AudioController, Config, ForceSimulation, KnowledgeGraph,
    LayoutAnimation, Orchestrator, Reporter,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "news-examer")]
#[command(about = "Analyze news articles into narratives, sentiment, key facts and entity graphs")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Log request and response payloads
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze an article and export the report
    #[command(group(ArgGroup::new("input").required(true).args(["file", "url", "sample", "text"])))]
    Analyze {
        /// Read the article text from a file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Fetch the article from a URL
        #[arg(short, long)]
        url: Option<String>,

        /// Analyze the built-in sample article
        #[arg(long)]
        sample: bool,

        /// Article text given inline
        #[arg(short, long)]
        text: Option<String>,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory for reports
        #[arg(short, long, default_value = "./news-analysis")]
        output: PathBuf,

        /// Generate only specific report format
        #[arg(long, value_enum, default_value = "all")]
        format: ReportFormat,
    },
    /// Lay out the knowledge graph of a saved analysis and write it as SVG
    Graph {
        /// analysis.json written by `analyze`
        #[arg(short, long)]
        input: PathBuf,

        /// Output SVG path
        #[arg(short, long, default_value = "knowledge-graph.svg")]
        output: PathBuf,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Read the audio summary of a saved analysis aloud
    Speak {
        /// analysis.json written by `analyze`
        #[arg(short, long)]
        input: PathBuf,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Generate a default configuration file
    Config {
        /// Output path for the config file (defaults to ~/.news-examer.toml)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum ReportFormat {
    Json,
    Html,
    Markdown,
    All,
}

impl From<ReportFormat> for ExportFormat {
    fn from(format: ReportFormat) -> Self {
        match format {
            ReportFormat::Json => ExportFormat::Json,
            ReportFormat::Html => ExportFormat::Html,
            ReportFormat::Markdown => ExportFormat::Markdown,
            ReportFormat::All => ExportFormat::All,
        }
    }
}

enum Input {
    File(PathBuf),
    Url(String),
    Sample,
    Text(String),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let directive = if cli.debug { "news_examer=debug" } else { "news_examer=info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    match cli.command {
        Commands::Analyze { file, url, sample, text, config, output, format } => {
            let input = match (file, url, text) {
                (Some(path), _, _) => Input::File(path),
                (_, Some(url), _) => Input::Url(url),
                (_, _, Some(text)) => Input::Text(text),
                _ if sample => Input::Sample,
                _ => bail!("no input given"),
            };
            analyze_article(input, config, output, format.into()).await?;
        }
        Commands::Graph { input, output, config } => {
            render_graph(&input, &output, config).await?;
        }
        Commands::Speak { input, config } => {
            speak_summary(&input, config).await?;
        }
        Commands::Config { output } => {
            generate_config(output)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from(&path),
        None => Config::load(),
    }
}

fn rejected(rejected: Rejected) -> anyhow::Error {
    match rejected {
        Rejected::Busy => anyhow!("another request is still in progress"),
        Rejected::Invalid(message) => anyhow!(message),
    }
}

async fn analyze_article(
    input: Input,
    config_path: Option<PathBuf>,
    output_path: PathBuf,
    format: ExportFormat,
) -> anyhow::Result<()> {
    println!("🚀 Starting News Examer Analysis");
    println!("================================");

    let start_time = Instant::now();
    let config = load_config(config_path)?;

    // Fail on missing credentials before touching the input
    let client = AnalysisClient::new(config.llm.clone()).map_err(|e| {
        tracing::error!(error = %e, "analysis client unavailable");
        anyhow!(e.user_message())
    })?;
    println!("🤖 Provider: {:?} ({})", client.provider(), client.model());

    let mut orchestrator = Orchestrator::new();
    let source = match input {
        Input::File(path) => {
            println!("📄 Reading article: {}", path.display());
            let text = std::fs::read_to_string(&path)?;
            orchestrator.set_text(text).map_err(rejected)?;
            path.display().to_string()
        }
        Input::Url(url) => {
            println!("🌐 Fetching article: {}", url);
            let fetcher = ArticleFetcher::new(&config.fetch)?;
            orchestrator.fetch(&fetcher, &url).await.map_err(rejected)?;
            if let Some(error) = orchestrator.error() {
                bail!("{}", error);
            }
            println!("   {} characters of readable text", orchestrator.text().chars().count());
            url
        }
        Input::Sample => {
            println!("📰 Using the sample article");
            orchestrator.use_sample().map_err(rejected)?;
            "sample".to_string()
        }
        Input::Text(text) => {
            orchestrator.set_text(text).map_err(rejected)?;
            "inline text".to_string()
        }
    };

    println!("\n🔍 Analyzing...");
    orchestrator.analyze(&client).await.map_err(rejected)?;

    let result = match orchestrator.view() {
        View::Report(result) => result.clone(),
        View::Error(message) => bail!("{}", message),
        View::Busy(_) | View::Welcome => bail!("the analysis did not produce a result"),
    };

    println!("   Sentiment: {}", result.sentiment);
    println!("   Key facts: {}", result.infographic_data.data.len());
    println!(
        "   Entities: {}, relationships: {}",
        result.knowledge_graph_data.nodes.len(),
        result.knowledge_graph_data.links.len()
    );

    println!("\n📊 Generating reports...");
    let reporter = Reporter::new(config.layout.clone());
    let provider = format!("{:?}", client.provider());
    let report = reporter.generate_report(result, &source, &provider, client.model());
    let exported_files = reporter.export_report(&report, &output_path, format)?;

    let duration = start_time.elapsed();
    println!("\n✅ Analysis completed in {:.2}s", duration.as_secs_f64());
    println!("📁 Reports exported to:");
    for file in exported_files {
        println!("   - {}", file.display());
    }

    Ok(())
}

async fn render_graph(input: &Path, output: &Path, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let analysis = AnalysisResult::from_file(input)?;
    let graph = KnowledgeGraph::from_data(&analysis.knowledge_graph_data);

    let Some(simulation) = ForceSimulation::new(&graph, LayoutParams::from(&config.layout)) else {
        println!("ℹ️  {}", EMPTY_GRAPH_MESSAGE);
        return Ok(());
    };

    println!(
        "🕸️  Laying out {} entities and {} relationships...",
        graph.node_count(),
        graph.link_count()
    );
    let mut animation = LayoutAnimation::spawn(simulation, TICK_INTERVAL);

    let frame = tokio::select! {
        frame = animation.settled() => frame,
        _ = tokio::signal::ctrl_c() => {
            animation.stop();
            animation.settled().await
        }
    };
    animation.finish().await;

    std::fs::write(output, render_knowledge_graph_svg(&graph, &frame))?;
    println!("✅ Graph written to {} after {} ticks", output.display(), frame.tick);
    Ok(())
}

async fn speak_summary(input: &Path, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let analysis = AnalysisResult::from_file(input)?;

    let synthesizer = CommandSynthesizer::new(config.speech.command.clone(), config.speech.args.clone());
    let mut audio = AudioController::new(analysis.audio_summary, synthesizer);

    println!("🔊 Speaking the audio summary (Ctrl-C to stop)...");
    audio.play();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    while audio.state() != PlaybackState::Idle {
        tokio::select! {
            _ = &mut ctrl_c => {
                audio.stop();
                println!("⏹️  Stopped");
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {
                if let Some(id) = audio.synthesizer_mut().poll_finished() {
                    audio.on_finished(id);
                }
            }
        }
    }

    Ok(())
}

fn generate_config(output_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config_path = output_path.unwrap_or_else(|| {
        Config::default_config_path().unwrap_or_else(|_| PathBuf::from("news-examer.toml"))
    });

    println!("📝 Generating configuration file: {}", config_path.display());

    let documented_config = Config::create_documented_config();
    std::fs::write(&config_path, documented_config)?;

    println!("✅ Configuration file created successfully!");
    println!("💡 Edit the file to customize your analysis settings.");
    println!();
    println!("🔧 Key configuration areas:");
    println!("  • LLM provider settings (Gemini, OpenAI, Ollama)");
    println!("  • Knowledge graph layout tuning");
    println!("  • URL fetch timeout and user agent");
    println!("  • Speech command for the audio summary");

    Ok(())
}
