use std::path::PathBuf;
use clap::Parser;
use familiar_odm::{load_from_path, OdmConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "odm-graph-export")]
#[command(about = "Export the schema ownership graph (main relations) to DOT")]
struct Cli {
    /// Path to schema definitions (defaults to [registry].path)
    #[arg(short, long)]
    schema_dir: Option<PathBuf>,

    /// Config file
    #[arg(short, long)]
    config: Option<String>,

    /// Output file (defaults to ownership.dot, "-" for stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let config = match OdmConfig::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli, config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli, config: OdmConfig) -> Result<(), Box<dyn std::error::Error>> {
    let schema_dir = cli.schema_dir.unwrap_or_else(|| config.registry_path());

    let registry = load_from_path(&schema_dir, &config.load_config())?;
    let graph = registry.ownership_graph();

    eprintln!(
        "Graph loaded: {} schemas, {} ownership edges",
        graph.schema_count(),
        graph.edge_count()
    );

    let dot_content = graph.to_dot();

    let output_path = cli.output.unwrap_or_else(|| PathBuf::from("ownership.dot"));
    if output_path.as_os_str() == "-" {
        print!("{}", dot_content);
    } else {
        std::fs::write(&output_path, &dot_content)?;
        eprintln!("✅ Exported DOT to: {:?}", output_path);
    }

    Ok(())
}
