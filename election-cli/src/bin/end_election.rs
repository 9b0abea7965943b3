use clap::Parser;
use election_core::ClientMessage;
use election_cli::ConnectArgs;

/// End an ongoing election and print the winner.
#[derive(Parser)]
#[command(about = "End an ongoing election")]
struct Cli {
    /// Election id to end.
    #[arg(long)]
    id: String,

    #[command(flatten)]
    connect: ConnectArgs,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::try_init().ok();
    let cli = Cli::parse();

    let leader = cli.connect.resolve_leader()?;
    let msg = ClientMessage::EndElection { id: cli.id };
    let reply = election_cli::send_msg(&leader, &msg)?;
    println!("{reply}");
    Ok(())
}
