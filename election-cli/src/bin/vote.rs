use clap::Parser;
use election_core::ClientMessage;
use election_cli::ConnectArgs;

/// Cast a vote in an ongoing election.
#[derive(Parser)]
#[command(about = "Vote in an election")]
struct Cli {
    /// Your unique voter id.
    #[arg(long)]
    id: String,

    /// Candidate you want to vote for.
    #[arg(long)]
    candidate: String,

    /// Id of the election to vote in.
    #[arg(long)]
    election_id: String,

    #[command(flatten)]
    connect: ConnectArgs,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::try_init().ok();
    let cli = Cli::parse();

    let leader = cli.connect.resolve_leader()?;
    let msg = ClientMessage::Vote {
        election_id: cli.election_id,
        id: cli.id,
        candidate: cli.candidate,
    };
    let reply = election_cli::send_msg(&leader, &msg)?;
    println!("{reply}");
    Ok(())
}
