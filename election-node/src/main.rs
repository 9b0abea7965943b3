use clap::Parser;
use election_node::config::NodeConfig;
use election_node::Node;

/// A peer in the election coordination cluster: discovers the ring, takes
/// part in leader election, and (while leader) serves client mutations.
#[derive(Parser)]
#[command(name = "electiond", author, version, about)]
struct Cli {
    #[command(flatten)]
    config: NodeConfig,

    /// Optional TOML file layered under the flags above (§10.3).
    #[arg(long)]
    config_file: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::try_init().ok();

    let cli = Cli::parse();
    let config = match &cli.config_file {
        Some(path) => cli.config.overlay_file(path)?,
        None => cli.config,
    };

    let node = Node::new(config)?;
    node.run().await?;
    Ok(())
}
